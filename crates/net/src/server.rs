use crate::client::ClientId;
use crate::error::NetError;
use crate::outbox::{Outbox, PeerQueue, Peers};
use crate::packet::{ClientPacket, decode_line};
use crossbeam_channel::{Receiver, Sender};
use std::net::SocketAddr;
use std::thread::JoinHandle;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

/// Longest inbound packet line accepted. Longer lines close the connection.
pub const MAX_LINE_BYTES: usize = 16 * 1024;

/// Something the network thread observed. Drained by the simulation thread
/// once per tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetEvent {
    Connected(ClientId),
    Packet(ClientId, ClientPacket),
    Disconnected(ClientId),
}

/// Handle to the network thread.
///
/// The thread owns a Tokio runtime, the listener and every socket. Dropping
/// the handle shuts the thread down and closes all connections.
#[derive(Debug)]
pub struct NetServer {
    local_addr: SocketAddr,
    events: Receiver<NetEvent>,
    peers: Peers,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl NetServer {
    /// Bind `addr` and start accepting on a dedicated thread.
    pub fn bind(addr: SocketAddr) -> Result<Self, NetError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("realm-net-io")
            .enable_all()
            .build()
            .map_err(NetError::Runtime)?;
        let listener = runtime
            .block_on(TcpListener::bind(addr))
            .map_err(|source| NetError::Bind { addr, source })?;
        let local_addr = listener.local_addr().map_err(|source| NetError::Bind { addr, source })?;

        let (events_tx, events) = crossbeam_channel::unbounded();
        let peers = Peers::default();
        let (shutdown, shutdown_rx) = oneshot::channel();

        let thread = std::thread::Builder::new()
            .name("realm-net".into())
            .spawn({
                let outbox = Outbox::new(peers.clone());
                move || runtime.block_on(accept_loop(listener, events_tx, outbox, shutdown_rx))
            })
            .map_err(NetError::Runtime)?;

        tracing::info!(%local_addr, "listening");
        Ok(Self {
            local_addr,
            events,
            peers,
            shutdown: Some(shutdown),
            thread: Some(thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Inbound queue. Use `try_iter` from the tick loop.
    pub fn events(&self) -> &Receiver<NetEvent> {
        &self.events
    }

    /// Everything that arrived since the last call, in arrival order.
    pub fn drain(&self) -> Vec<NetEvent> {
        self.events.try_iter().collect()
    }

    pub fn outbox(&self) -> Outbox {
        Outbox::new(self.peers.clone())
    }

    pub fn client_count(&self) -> usize {
        self.peers.read().len()
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("network thread panicked");
            }
            tracing::info!(addr = %self.local_addr, "network stopped");
        }
    }
}

impl Drop for NetServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn accept_loop(
    listener: TcpListener,
    events: Sender<NetEvent>,
    outbox: Outbox,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    tokio::spawn(serve_client(stream, addr, events.clone(), outbox.clone()));
                }
                Err(err) => tracing::warn!(error = %err, "accept failed"),
            },
        }
    }
    outbox.disconnect_all();
}

/// Result of reading one inbound line.
enum Inbound {
    Line,
    TooLong,
    Closed,
}

/// Read up to and including the next `\n`, never buffering more than
/// [`MAX_LINE_BYTES`] of it.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Inbound>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let limit = MAX_LINE_BYTES as u64 + 1;
    if reader.take(limit).read_until(b'\n', buf).await? == 0 {
        return Ok(Inbound::Closed);
    }
    if buf.last() != Some(&b'\n') && buf.len() > MAX_LINE_BYTES {
        return Ok(Inbound::TooLong);
    }
    Ok(Inbound::Line)
}

async fn serve_client(stream: TcpStream, addr: SocketAddr, events: Sender<NetEvent>, outbox: Outbox) {
    let client = ClientId::new();
    let (reader, mut writer) = stream.into_split();
    let PeerQueue { mut lines, kick } = outbox.register(client);

    if events.send(NetEvent::Connected(client)).is_err() {
        outbox.unregister(client);
        return;
    }
    tracing::info!(%client, %addr, "client connected");

    let writer_task = tokio::spawn(async move {
        while let Some(line) = lines.recv().await {
            if let Err(err) = writer.write_all(line.as_bytes()).await {
                tracing::debug!(%client, error = %err, "write failed");
                break;
            }
        }
    });

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        let read = tokio::select! {
            _ = kick.notified() => break,
            read = read_line(&mut reader, &mut buf) => read,
        };
        match read {
            Ok(Inbound::Line) => {
                let Ok(line) = std::str::from_utf8(&buf) else {
                    tracing::warn!(%client, "packet dropped: not utf-8");
                    continue;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match decode_line(line) {
                    Ok(packet) => {
                        if events.send(NetEvent::Packet(client, packet)).is_err() {
                            break;
                        }
                    }
                    Err(err) => tracing::warn!(%client, error = %err, "packet dropped"),
                }
            }
            Ok(Inbound::TooLong) => {
                tracing::warn!(%client, limit = MAX_LINE_BYTES, "line too long, disconnecting");
                break;
            }
            Ok(Inbound::Closed) => break,
            Err(err) => {
                tracing::debug!(%client, error = %err, "read failed");
                break;
            }
        }
    }

    outbox.unregister(client);
    writer_task.abort();
    let _ = events.send(NetEvent::Disconnected(client));
    tracing::info!(%client, "client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::ServerPacket;
    use realm_common::EntityId;
    use realm_input::Control;
    use std::io::{BufRead, BufReader as StdBufReader, Write};
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    fn localhost() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn loopback_session() {
        let server = NetServer::bind(localhost()).unwrap();
        let mut stream = std::net::TcpStream::connect(server.local_addr()).unwrap();
        stream.set_read_timeout(Some(WAIT)).unwrap();

        let client = match server.events().recv_timeout(WAIT).unwrap() {
            NetEvent::Connected(client) => client,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(server.client_count(), 1);

        stream.write_all(b"{\"type\":\"controlPressed\",\"control\":\"up\"}\n").unwrap();
        stream.write_all(b"garbage\n").unwrap();
        stream.write_all(b"{\"type\":\"controlReleased\",\"control\":\"up\"}\n").unwrap();
        assert_eq!(
            server.events().recv_timeout(WAIT).unwrap(),
            NetEvent::Packet(client, ClientPacket::ControlPressed { control: Control::Up })
        );
        assert_eq!(
            server.events().recv_timeout(WAIT).unwrap(),
            NetEvent::Packet(client, ClientPacket::ControlReleased { control: Control::Up })
        );

        let welcome = ServerPacket::Welcome {
            client,
            entity: EntityId(9),
            world: "default".into(),
            area: "default".into(),
        };
        server.outbox().send_to(client, &welcome).unwrap();
        let mut line = String::new();
        StdBufReader::new(stream.try_clone().unwrap()).read_line(&mut line).unwrap();
        let received: ServerPacket = serde_json::from_str(&line).unwrap();
        assert_eq!(received, welcome);

        drop(stream);
        assert_eq!(server.events().recv_timeout(WAIT).unwrap(), NetEvent::Disconnected(client));
        assert_eq!(server.client_count(), 0);
        server.shutdown();
    }

    fn connect(server: &NetServer) -> (std::net::TcpStream, ClientId) {
        let stream = std::net::TcpStream::connect(server.local_addr()).unwrap();
        stream.set_read_timeout(Some(WAIT)).unwrap();
        match server.events().recv_timeout(WAIT).unwrap() {
            NetEvent::Connected(client) => (stream, client),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn overlong_line_closes_connection() {
        let server = NetServer::bind(localhost()).unwrap();
        let (mut stream, client) = connect(&server);

        let flood = vec![b'a'; MAX_LINE_BYTES + 64];
        // The server may hang up before everything is written.
        let _ = stream.write_all(&flood);
        assert_eq!(server.events().recv_timeout(WAIT).unwrap(), NetEvent::Disconnected(client));
        assert_eq!(server.client_count(), 0);
    }

    #[test]
    fn line_at_the_limit_is_accepted() {
        let server = NetServer::bind(localhost()).unwrap();
        let (mut stream, client) = connect(&server);

        let packet = b"{\"type\":\"controlPressed\",\"control\":\"left\"}";
        let mut line = packet.to_vec();
        line.resize(MAX_LINE_BYTES - 1, b' ');
        line.push(b'\n');
        stream.write_all(&line).unwrap();
        assert_eq!(
            server.events().recv_timeout(WAIT).unwrap(),
            NetEvent::Packet(client, ClientPacket::ControlPressed { control: Control::Left })
        );
    }

    #[test]
    fn outbox_disconnect_closes_socket() {
        let server = NetServer::bind(localhost()).unwrap();
        let (stream, client) = connect(&server);

        assert!(server.outbox().disconnect(client));
        assert_eq!(server.events().recv_timeout(WAIT).unwrap(), NetEvent::Disconnected(client));
        let mut rest = String::new();
        // The server side closed, so the read ends instead of timing out.
        assert_eq!(StdBufReader::new(stream).read_line(&mut rest).unwrap(), 0);
        assert!(!server.outbox().disconnect(client));
    }

    #[test]
    fn bind_conflict_is_reported() {
        let first = NetServer::bind(localhost()).unwrap();
        let err = NetServer::bind(first.local_addr()).unwrap_err();
        assert!(matches!(err, NetError::Bind { .. }));
    }
}
