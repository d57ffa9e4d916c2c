//! Host operating system and account name, as reported in USERID replies.

/// Source of the values identd reports when no override is configured.
pub trait SystemInfo: Send + Sync {
    /// Lower-case operating system name, e.g. `linux` or `windows`.
    fn os_name(&self) -> String;
    /// Name of the local account running the client.
    fn user_name(&self) -> String;
}

/// Reads the values from the running process.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostSystem;

impl SystemInfo for HostSystem {
    fn os_name(&self) -> String {
        std::env::consts::OS.to_string()
    }

    fn user_name(&self) -> String {
        ["USER", "USERNAME", "LOGNAME"]
            .iter()
            .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Fixed values, for tests and embedding hosts that know better.
#[derive(Debug, Clone)]
pub struct StaticSystem {
    pub os: String,
    pub user: String,
}

impl StaticSystem {
    pub fn new(os: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            user: user.into(),
        }
    }
}

impl SystemInfo for StaticSystem {
    fn os_name(&self) -> String {
        self.os.clone()
    }

    fn user_name(&self) -> String {
        self.user.clone()
    }
}

/// Map an operating system name to its RFC 1340 system token.
pub fn system_token(os_name: &str) -> &'static str {
    let os = os_name.to_ascii_lowercase();
    if os.starts_with("windows") {
        "WIN32"
    } else if os.starts_with("mac") {
        "MACOS"
    } else if os.starts_with("linux") {
        "UNIX"
    } else if os.contains("bsd") {
        "UNIX-BSD"
    } else if os == "os/2" {
        "OS/2"
    } else if os.contains("unix") {
        "UNIX"
    } else if os == "irix" {
        "IRIX"
    } else {
        "UNKNOWN"
    }
}
