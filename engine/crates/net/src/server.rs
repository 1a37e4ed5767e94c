use std::sync::atomic::{AtomicU64, Ordering};

use session::SessionId;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::channels::{NetEnds, NetToTick, PlayerTx, RegisterSession, RegisterTx, UnregisterTx};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(0);

/// Newline-delimited JSON over TCP: one packet per line each way.
pub async fn run_line_server(listener: TcpListener, ends: NetEnds, max_line: usize) -> std::io::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "line server listening");

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let session_id = SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::info!(session = %session_id, %peer_addr, "new connection");

        let player_tx = ends.player_tx.clone();
        let register_tx = ends.register_tx.clone();
        let unregister_tx = ends.unregister_tx.clone();
        tokio::spawn(async move {
            handle_session(stream, session_id, player_tx, register_tx, unregister_tx, max_line).await;
        });
    }
}

async fn handle_session(
    stream: TcpStream,
    session_id: SessionId,
    player_tx: PlayerTx,
    register_tx: RegisterTx,
    unregister_tx: UnregisterTx,
    max_line: usize,
) {
    let (reader, mut writer) = stream.into_split();
    let (write_tx, mut write_rx) = tokio::sync::mpsc::unbounded_channel::<String>();

    let _ = register_tx.send(RegisterSession {
        session_id,
        write_tx,
    });
    let _ = player_tx.send(NetToTick::NewConnection { session_id });

    let writer_handle = tokio::spawn(async move {
        while let Some(text) = write_rx.recv().await {
            let line = format!("{text}\n");
            if writer.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.len() > max_line {
                    tracing::debug!(session = %session_id, len = line.len(), "oversized packet dropped");
                    continue;
                }
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                let _ = player_tx.send(NetToTick::Packet {
                    session_id,
                    text: text.to_string(),
                });
            }
            Ok(None) | Err(_) => break,
        }
    }

    let _ = player_tx.send(NetToTick::Disconnected { session_id });
    let _ = unregister_tx.send(session_id);
    writer_handle.abort();
    tracing::info!(session = %session_id, "session ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::wire_channels;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn server_forwards_packets_and_disconnects() {
        let (net, _router, mut tick) = wire_channels();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(run_line_server(listener, net, 1024));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        assert!(matches!(
            tick.player_rx.recv().await.unwrap(),
            NetToTick::NewConnection { .. }
        ));

        stream.write_all(b"{\"type\":\"ping\"}\n\n").await.unwrap();
        match tick.player_rx.recv().await.unwrap() {
            NetToTick::Packet { text, .. } => assert_eq!(text, r#"{"type":"ping"}"#),
            other => panic!("expected Packet, got {other:?}"),
        }

        drop(stream);
        assert!(matches!(
            tick.player_rx.recv().await.unwrap(),
            NetToTick::Disconnected { .. }
        ));
        server.abort();
    }

    #[tokio::test]
    async fn oversized_lines_are_dropped() {
        let (net, _router, mut tick) = wire_channels();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(run_line_server(listener, net, 8));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let _ = tick.player_rx.recv().await;

        stream.write_all(b"0123456789abcdef\nshort\n").await.unwrap();
        match tick.player_rx.recv().await.unwrap() {
            NetToTick::Packet { text, .. } => assert_eq!(text, "short"),
            other => panic!("expected Packet, got {other:?}"),
        }
        server.abort();
    }

    #[tokio::test]
    async fn server_writes_registered_output() {
        let (net, mut router, _tick) = wire_channels();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(run_line_server(listener, net, 1024));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let reg = router.register_rx.recv().await.unwrap();
        reg.write_tx.send(r#"{"type":"pong"}"#.to_string()).unwrap();

        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"{\"type\":\"pong\"}\n");
        server.abort();
    }
}
