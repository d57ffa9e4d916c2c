#[allow(dead_code)]
mod helpers;

use identd::connections::{ConnectionId, ConnectionInfo, ConnectionRegistry};
use identd::server::{ServerError, ServerStatus, TcpBinder};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

#[tokio::test]
async fn answers_userid_for_known_connection() {
    let server = helpers::build_server(
        helpers::loopback_config(),
        helpers::registry_with_irc_connection(),
        Arc::new(TcpBinder),
    );
    server.start().unwrap();
    let addr = server.local_addr().unwrap();

    let reply = helpers::send_request(addr, "6667, 54321\r\n").await;
    assert_eq!(reply, "6667, 54321 : USERID : UNIX : alice\r\n");

    server.shutdown().await;
}

#[tokio::test]
async fn unknown_port_pair_gets_no_user() {
    let server = helpers::build_server(
        helpers::loopback_config(),
        helpers::registry_with_irc_connection(),
        Arc::new(TcpBinder),
    );
    server.start().unwrap();
    let addr = server.local_addr().unwrap();

    let reply = helpers::send_request(addr, "1234, 6667\r\n").await;
    assert_eq!(reply, "1234, 6667 : ERROR : NO-USER\r\n");

    server.shutdown().await;
}

#[tokio::test]
async fn malformed_request_gets_unknown_error() {
    let server = helpers::build_server(
        helpers::loopback_config(),
        Arc::new(ConnectionRegistry::new()),
        Arc::new(TcpBinder),
    );
    server.start().unwrap();
    let addr = server.local_addr().unwrap();

    let reply = helpers::send_request(addr, "hello\r\n").await;
    assert_eq!(reply, "hello : ERROR : UNKNOWN-ERROR\r\n");

    let reply = helpers::send_request(addr, "abc, 12\n").await;
    assert_eq!(reply, "abc, 12 : ERROR : UNKNOWN-ERROR\r\n");

    let reply = helpers::send_request(addr, "70000, 12\r\n").await;
    assert_eq!(reply, "70000, 12 : ERROR : INVALID-PORT\r\n");

    server.shutdown().await;
}

#[tokio::test]
async fn request_without_newline_is_answered_at_eof() {
    let server = helpers::build_server(
        helpers::loopback_config(),
        helpers::registry_with_irc_connection(),
        Arc::new(TcpBinder),
    );
    server.start().unwrap();
    let addr = server.local_addr().unwrap();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"6667,54321").await.unwrap();
    stream.shutdown().await.unwrap();
    let mut buf = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut stream, &mut buf)
        .await
        .unwrap();
    assert_eq!(
        String::from_utf8(buf).unwrap(),
        "6667, 54321 : USERID : UNIX : alice\r\n"
    );

    server.shutdown().await;
}

#[tokio::test]
async fn start_and_stop_are_idempotent() {
    let server = helpers::build_server(
        helpers::loopback_config(),
        Arc::new(ConnectionRegistry::new()),
        Arc::new(TcpBinder),
    );
    assert_eq!(server.status(), ServerStatus::Stopped);

    server.start().unwrap();
    let first = server.local_addr().unwrap();
    server.start().unwrap();
    assert_eq!(server.local_addr(), Some(first));
    assert!(server.is_running());
    assert_eq!(server.status(), ServerStatus::Running);

    server.stop();
    server.stop();
    assert!(!server.is_running());
    assert_eq!(server.local_addr(), None);
    assert_eq!(server.status(), ServerStatus::Stopped);
}

#[tokio::test]
async fn restart_after_stop_accepts_again() {
    let server = helpers::build_server(
        helpers::loopback_config(),
        helpers::registry_with_irc_connection(),
        Arc::new(TcpBinder),
    );
    server.start().unwrap();
    server.shutdown().await;
    server.start().unwrap();
    let addr = server.local_addr().unwrap();

    let reply = helpers::send_request(addr, "6667, 54321\r\n").await;
    assert!(reply.contains("USERID"), "got {reply:?}");

    server.shutdown().await;
}

#[tokio::test]
async fn stop_then_start_rebinds_same_port() {
    let config = helpers::fixed_port_config();
    let port = config.port;
    let server = helpers::build_server(
        config,
        helpers::registry_with_irc_connection(),
        Arc::new(TcpBinder),
    );

    server.start().unwrap();
    server.stop();
    server.start().unwrap();
    assert!(server.is_running());
    let addr = server.local_addr().unwrap();
    assert_eq!(addr.port(), port);

    let reply = helpers::send_request(addr, "6667, 54321\r\n").await;
    assert!(reply.contains("USERID"), "got {reply:?}");

    for _ in 0..5 {
        server.stop();
        server.start().unwrap();
    }
    assert!(server.is_running());

    server.shutdown().await;
}

#[tokio::test]
async fn stop_closes_the_listening_socket() {
    let config = helpers::fixed_port_config();
    let server = helpers::build_server(
        config,
        Arc::new(ConnectionRegistry::new()),
        Arc::new(TcpBinder),
    );
    server.start().unwrap();
    let addr = server.local_addr().unwrap();
    server.stop();

    // No await between stop and the bind.
    assert!(std::net::TcpListener::bind(addr).is_ok());
}

#[tokio::test]
async fn shutdown_releases_the_port() {
    let server = helpers::build_server(
        helpers::loopback_config(),
        Arc::new(ConnectionRegistry::new()),
        Arc::new(TcpBinder),
    );
    server.start().unwrap();
    let addr = server.local_addr().unwrap();
    server.shutdown().await;

    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn concurrent_sessions_get_their_own_replies() {
    let registry = Arc::new(ConnectionRegistry::new());
    for i in 0..20u16 {
        registry.insert(
            ConnectionInfo::new(ConnectionId(u64::from(i) + 1), 40000 + i, format!("nick{i}"), "u")
                .with_remote_port(6667),
        );
    }
    let mut config = helpers::loopback_config();
    config.use_nickname = true;
    let server = helpers::build_server(config, registry, Arc::new(TcpBinder));
    server.start().unwrap();
    let addr = server.local_addr().unwrap();

    let mut tasks = Vec::new();
    for i in 0..20u16 {
        tasks.push(tokio::spawn(async move {
            let request = format!("{}, 6667\r\n", 40000 + i);
            (i, helpers::send_request(addr, &request).await)
        }));
    }
    for task in tasks {
        let (i, reply) = task.await.unwrap();
        assert_eq!(
            reply,
            format!("{}, 6667 : USERID : UNIX : nick{}\r\n", 40000 + i, i)
        );
    }

    let srv = server.clone();
    assert!(helpers::wait_until(move || srv.session_count() == 0).await);
    server.shutdown().await;
}

#[tokio::test]
async fn stop_closes_open_sessions() {
    let server = helpers::build_server(
        helpers::loopback_config(),
        Arc::new(ConnectionRegistry::new()),
        Arc::new(TcpBinder),
    );
    server.start().unwrap();
    let addr = server.local_addr().unwrap();

    // Connect but never send a request.
    let mut idle = TcpStream::connect(addr).await.unwrap();
    let srv = server.clone();
    assert!(helpers::wait_until(move || srv.session_count() == 1).await);

    server.shutdown().await;
    let srv = server.clone();
    assert!(helpers::wait_until(move || srv.session_count() == 0).await);

    let mut buf = Vec::new();
    let read = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        tokio::io::AsyncReadExt::read_to_end(&mut idle, &mut buf),
    )
    .await
    .expect("session was not closed");
    assert!(read.is_err() || buf.is_empty());
}

#[tokio::test]
async fn permission_denied_latches_failure() {
    let binder = Arc::new(helpers::DeniedBinder::default());
    let server = helpers::build_server(
        helpers::loopback_config(),
        Arc::new(ConnectionRegistry::new()),
        binder.clone(),
    );

    assert!(matches!(server.start(), Err(ServerError::Bind { .. })));
    assert!(server.has_failed());
    assert_eq!(server.status(), ServerStatus::Failed);

    assert!(matches!(
        server.start(),
        Err(ServerError::PermanentlyFailed)
    ));
    assert_eq!(binder.attempts.load(Ordering::SeqCst), 1);
    assert!(!server.is_running());
}

#[tokio::test]
async fn other_bind_errors_can_be_retried() {
    let binder = Arc::new(helpers::FlakyBinder::new(1));
    let server = helpers::build_server(
        helpers::loopback_config(),
        Arc::new(ConnectionRegistry::new()),
        binder.clone(),
    );

    assert!(matches!(server.start(), Err(ServerError::Bind { .. })));
    assert!(!server.has_failed());

    server.start().unwrap();
    assert!(server.is_running());
    assert_eq!(binder.attempts.load(Ordering::SeqCst), 2);
    server.shutdown().await;
}

#[test]
fn start_outside_runtime_is_rejected() {
    let server = helpers::build_server(
        helpers::loopback_config(),
        Arc::new(ConnectionRegistry::new()),
        Arc::new(TcpBinder),
    );
    assert!(matches!(server.start(), Err(ServerError::NoRuntime)));
    assert!(!server.has_failed());
}
