use clap::Parser;
use identd::cli::{Cli, Command};

// ---------------------------------------------------------------------------
// Test 1: Default config path is "identd.toml"
// ---------------------------------------------------------------------------
#[test]
fn default_config_path() {
    let cli = Cli::try_parse_from(["identd"]).unwrap();
    assert_eq!(cli.config.to_str().unwrap(), "identd.toml");
    assert!(cli.command.is_none());
    assert!(cli.log_level.is_none());
}

// ---------------------------------------------------------------------------
// Test 2: Custom config with -c / --config
// ---------------------------------------------------------------------------
#[test]
fn custom_config_flags() {
    let cli = Cli::try_parse_from(["identd", "-c", "/etc/identd.toml"]).unwrap();
    assert_eq!(cli.config.to_str().unwrap(), "/etc/identd.toml");
    let cli = Cli::try_parse_from(["identd", "--config", "other.toml"]).unwrap();
    assert_eq!(cli.config.to_str().unwrap(), "other.toml");
}

// ---------------------------------------------------------------------------
// Test 3: Log level override
// ---------------------------------------------------------------------------
#[test]
fn log_level_override() {
    let cli = Cli::try_parse_from(["identd", "--log-level", "debug", "run"]).unwrap();
    assert_eq!(cli.log_level.as_deref(), Some("debug"));
    assert!(matches!(cli.command, Some(Command::Run)));
}

// ---------------------------------------------------------------------------
// Test 4: show-config format defaults to toml
// ---------------------------------------------------------------------------
#[test]
fn show_config_format() {
    let cli = Cli::try_parse_from(["identd", "show-config"]).unwrap();
    match cli.command {
        Some(Command::ShowConfig { format }) => assert_eq!(format, "toml"),
        _ => panic!("expected ShowConfig command"),
    }
    let cli = Cli::try_parse_from(["identd", "show-config", "--format", "json"]).unwrap();
    match cli.command {
        Some(Command::ShowConfig { format }) => assert_eq!(format, "json"),
        _ => panic!("expected ShowConfig command"),
    }
}

// ---------------------------------------------------------------------------
// Test 5: get and respond take positional arguments
// ---------------------------------------------------------------------------
#[test]
fn get_and_respond() {
    let cli = Cli::try_parse_from(["identd", "get", "advanced.port"]).unwrap();
    match cli.command {
        Some(Command::Get { key }) => assert_eq!(key, "advanced.port"),
        _ => panic!("expected Get command"),
    }
    let cli = Cli::try_parse_from(["identd", "respond", "6667, 54321"]).unwrap();
    match cli.command {
        Some(Command::Respond { line }) => assert_eq!(line, "6667, 54321"),
        _ => panic!("expected Respond command"),
    }
    assert!(Cli::try_parse_from(["identd", "get"]).is_err());
}

// ---------------------------------------------------------------------------
// Test 6: query defaults and validation
// ---------------------------------------------------------------------------
#[test]
fn query_defaults() {
    let cli =
        Cli::try_parse_from(["identd", "query", "--local", "6667", "--remote", "54321"]).unwrap();
    match cli.command {
        Some(Command::Query {
            addr,
            local,
            remote,
            timeout,
        }) => {
            assert_eq!(addr, "127.0.0.1:113");
            assert_eq!(local, 6667);
            assert_eq!(remote, 54321);
            assert_eq!(timeout, 5);
        }
        _ => panic!("expected Query command"),
    }
}

#[test]
fn query_rejects_bad_port() {
    assert!(Cli::try_parse_from(["identd", "query", "--local", "70000", "--remote", "1"]).is_err());
    assert!(Cli::try_parse_from(["identd", "query", "--local", "1"]).is_err());
}

// ---------------------------------------------------------------------------
// Test 7: check-config parses
// ---------------------------------------------------------------------------
#[test]
fn check_config() {
    let cli = Cli::try_parse_from(["identd", "check-config"]).unwrap();
    assert!(matches!(cli.command, Some(Command::CheckConfig)));
}

#[test]
fn unknown_subcommand_rejected() {
    assert!(Cli::try_parse_from(["identd", "hash-password"]).is_err());
}
