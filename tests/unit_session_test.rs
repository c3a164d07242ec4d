use stagelink::config::ConsoleConfig;
use stagelink::console::{ConnectionStatus, ConsoleSession};
use stagelink::core::errors::{DisconnectReason, RelayError};
use stagelink::core::events::ConsoleEvent;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::timeout;

const CONFIRMATION: &str = "Logged in as User 'operator'";

fn test_config(addr: SocketAddr) -> ConsoleConfig {
    ConsoleConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        username: "operator".to_string(),
        password: "secret".to_string(),
        connect_timeout: Duration::from_secs(5),
        settle_delay: Duration::from_millis(10),
        pacing_interval: Duration::from_millis(50),
    }
}

async fn bind_console() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Reads lines until the login exchange has been consumed, asserting the
/// wire format of the handshake.
async fn consume_login(lines: &mut tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>) {
    let login = lines.next_line().await.unwrap().unwrap();
    assert_eq!(login, "login operator");
    let password = lines.next_line().await.unwrap().unwrap();
    assert_eq!(password, "secret");
}

async fn next_event(rx: &mut broadcast::Receiver<ConsoleEvent>) -> ConsoleEvent {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for console event")
        .expect("event bus closed unexpectedly")
}

#[tokio::test]
async fn test_connect_refused_reports_cause() {
    // Bind then drop to obtain a port with nothing listening.
    let (listener, addr) = bind_console().await;
    drop(listener);

    let err = ConsoleSession::connect(&test_config(addr)).await.unwrap_err();
    assert!(matches!(err, RelayError::ConnectFailed { .. }));
}

#[tokio::test]
async fn test_login_gating_emits_nothing_before_confirmation() {
    let (listener, addr) = bind_console().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();

        // Banner noise arrives before the relay has even logged in.
        write
            .write_all(b"\x1B[2J\x1B[1;1HgrandMA2 remote shell\n\n   \n")
            .await
            .unwrap();
        consume_login(&mut lines).await;
        write
            .write_all(format!("\x1B[32m{CONFIRMATION}\x1B[0m\nFader 1 at 100\n").as_bytes())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let session = ConsoleSession::connect(&test_config(addr)).await.unwrap();
    let mut rx = session.subscribe();

    // The confirming line itself is emitted: the gate flips first, then
    // the line passes the emit check.
    match next_event(&mut rx).await {
        ConsoleEvent::Line(line) => assert_eq!(line, CONFIRMATION),
        other => panic!("expected the confirmation line, got {other:?}"),
    }
    match next_event(&mut rx).await {
        ConsoleEvent::Line(line) => assert_eq!(line, "Fader 1 at 100"),
        other => panic!("expected a status line, got {other:?}"),
    }
    assert_eq!(session.status(), ConnectionStatus::Ready);

    session.disconnect();
    server.abort();
}

#[tokio::test]
async fn test_status_is_awaiting_login_until_confirmation() {
    let (listener, addr) = bind_console().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, _write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        consume_login(&mut lines).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let session = ConsoleSession::connect(&test_config(addr)).await.unwrap();
    assert_eq!(session.status(), ConnectionStatus::AwaitingLogin);
    assert!(session.is_connected());

    session.disconnect();
    server.abort();
}

#[tokio::test]
async fn test_commands_are_fifo_trimmed_and_paced() {
    let (listener, addr) = bind_console().await;
    let (result_tx, result_rx) = tokio::sync::oneshot::channel();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, _write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        consume_login(&mut lines).await;

        let mut received = Vec::new();
        for _ in 0..3 {
            let line = lines.next_line().await.unwrap().unwrap();
            received.push((line, Instant::now()));
        }
        result_tx.send(received).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let config = test_config(addr);
    let session = ConsoleSession::connect(&config).await.unwrap();
    session.send_command("  Go 1  ");
    session.send_command("Go 2");
    session.send_command("Go 3");

    let received = timeout(Duration::from_secs(2), result_rx)
        .await
        .unwrap()
        .unwrap();

    let texts: Vec<&str> = received.iter().map(|(line, _)| line.as_str()).collect();
    assert_eq!(texts, vec!["Go 1", "Go 2", "Go 3"]);

    // Consecutive writes are separated by at least the pacing interval;
    // allow a small scheduling tolerance on the reader's timestamps.
    for pair in received.windows(2) {
        let gap = pair[1].1.duration_since(pair[0].1);
        assert!(
            gap >= Duration::from_millis(40),
            "commands arrived {}ms apart, expected pacing of ~50ms",
            gap.as_millis()
        );
    }

    session.disconnect();
    server.abort();
}

#[tokio::test]
async fn test_remote_close_fires_disconnected_exactly_once() {
    let (listener, addr) = bind_console().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        // Close without ever confirming the login.
        drop(stream);
    });

    let session = ConsoleSession::connect(&test_config(addr)).await.unwrap();
    let mut rx = session.subscribe();

    match next_event(&mut rx).await {
        ConsoleEvent::Disconnected(reason) => assert_eq!(reason, DisconnectReason::RemoteClosed),
        other => panic!("expected a disconnect event, got {other:?}"),
    }
    assert!(matches!(
        rx.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
    assert!(!session.is_connected());
    assert_eq!(session.status(), ConnectionStatus::Disconnected);

    server.await.unwrap();
}

#[tokio::test]
async fn test_login_failure_phrase_ends_the_session() {
    let (listener, addr) = bind_console().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        consume_login(&mut lines).await;
        write
            .write_all(b"Login failed - please check credentials\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let session = ConsoleSession::connect(&test_config(addr)).await.unwrap();
    let mut rx = session.subscribe();

    match next_event(&mut rx).await {
        ConsoleEvent::Disconnected(reason) => {
            assert_eq!(reason, DisconnectReason::LoginRejected)
        }
        other => panic!("expected a login rejection, got {other:?}"),
    }
    server.abort();
}

#[tokio::test]
async fn test_local_disconnect_is_idempotent() {
    let (listener, addr) = bind_console().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(stream);
    });

    let session = ConsoleSession::connect(&test_config(addr)).await.unwrap();
    let mut rx = session.subscribe();

    session.disconnect();
    session.disconnect();

    match next_event(&mut rx).await {
        ConsoleEvent::Disconnected(reason) => assert_eq!(reason, DisconnectReason::LocalClose),
        other => panic!("expected a local close, got {other:?}"),
    }
    assert!(!session.is_connected());

    // Commands after disconnect are silently dropped.
    session.send_command("Go 1");
    assert!(matches!(
        rx.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
    server.abort();
}

#[tokio::test]
async fn test_password_line_is_omitted_when_empty() {
    let (listener, addr) = bind_console().await;
    let (result_tx, result_rx) = tokio::sync::oneshot::channel();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, _write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        let login = lines.next_line().await.unwrap().unwrap();
        // The very next line must be a command, not a password.
        let next = lines.next_line().await.unwrap().unwrap();
        result_tx.send((login, next)).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let mut config = test_config(addr);
    config.password = String::new();
    let session = ConsoleSession::connect(&config).await.unwrap();
    session.send_command("Go 1");

    let (login, next) = timeout(Duration::from_secs(2), result_rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(login, "login operator");
    assert_eq!(next, "Go 1");

    session.disconnect();
    server.abort();
}

#[tokio::test]
async fn test_lines_blank_after_cleaning_are_discarded() {
    let (listener, addr) = bind_console().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        consume_login(&mut lines).await;
        write
            .write_all(format!("{CONFIRMATION}\n\x1B[0m\nreal line\n").as_bytes())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let session = ConsoleSession::connect(&test_config(addr)).await.unwrap();
    let mut rx = session.subscribe();

    match next_event(&mut rx).await {
        ConsoleEvent::Line(line) => assert_eq!(line, CONFIRMATION),
        other => panic!("unexpected event {other:?}"),
    }
    // The escape-only line vanishes; the next emission is the real line.
    match next_event(&mut rx).await {
        ConsoleEvent::Line(line) => assert_eq!(line, "real line"),
        other => panic!("unexpected event {other:?}"),
    }

    session.disconnect();
    server.abort();
}
