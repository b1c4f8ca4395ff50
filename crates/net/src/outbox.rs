use crate::client::ClientId;
use crate::error::NetError;
use crate::packet::{ServerPacket, encode_line};
use parking_lot::RwLock;
use realm_kernel::{BroadcastSink, EntityMoved};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};

/// Lines a client may have queued before it is considered stalled and
/// dropped. Leaves room for the world state sent on join.
pub const OUTBOUND_QUEUE: usize = 1024;

/// Writer side of one connection as seen by the simulation thread.
#[derive(Debug, Clone)]
pub(crate) struct Peer {
    lines: Sender<Arc<str>>,
    kick: Arc<Notify>,
}

pub(crate) type Peers = Arc<RwLock<HashMap<ClientId, Peer>>>;

/// Connection-side handles returned by [`Outbox::register`].
#[derive(Debug)]
pub struct PeerQueue {
    /// Encoded lines to write to the socket, in order.
    pub lines: Receiver<Arc<str>>,
    /// Fires once when the outbox gave up on this client.
    pub kick: Arc<Notify>,
}

/// Outbound hand-off used by the simulation thread.
///
/// Sending only enqueues onto bounded per-client channels with `try_send`,
/// so it never waits on a socket. A client whose queue is full is
/// unregistered and its connection told to close.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    peers: Peers,
}

impl Outbox {
    pub(crate) fn new(peers: Peers) -> Self {
        Self { peers }
    }

    /// Start queueing for `client`. The caller owns the receiving end.
    pub fn register(&self, client: ClientId) -> PeerQueue {
        let (lines, rx) = mpsc::channel(OUTBOUND_QUEUE);
        let kick = Arc::new(Notify::new());
        self.peers.write().insert(
            client,
            Peer {
                lines,
                kick: kick.clone(),
            },
        );
        PeerQueue { lines: rx, kick }
    }

    pub fn unregister(&self, client: ClientId) {
        self.peers.write().remove(&client);
    }

    /// Close every connection, e.g. on shutdown.
    pub(crate) fn disconnect_all(&self) {
        for (_, peer) in self.peers.write().drain() {
            peer.kick.notify_one();
        }
    }

    pub fn client_count(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_connected(&self, client: ClientId) -> bool {
        self.peers.read().contains_key(&client)
    }

    pub fn send_to(&self, client: ClientId, packet: &ServerPacket) -> Result<(), NetError> {
        let line: Arc<str> = encode_line(packet)?.into();
        let sent = {
            let peers = self.peers.read();
            let peer = peers.get(&client).ok_or(NetError::UnknownClient(client))?;
            peer.lines.try_send(line)
        };
        match sent {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(%client, queued = OUTBOUND_QUEUE, "client not reading, disconnecting");
                self.disconnect(client);
                Err(NetError::Backlogged(client))
            }
            Err(TrySendError::Closed(_)) => Err(NetError::UnknownClient(client)),
        }
    }

    /// Queue `packet` for every connected client. Returns how many accepted it.
    pub fn send_all(&self, packet: &ServerPacket) -> Result<usize, NetError> {
        let line: Arc<str> = encode_line(packet)?.into();
        let mut delivered = 0;
        let mut stalled = Vec::new();
        {
            let peers = self.peers.read();
            for (client, peer) in peers.iter() {
                match peer.lines.try_send(line.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => stalled.push(*client),
                    Err(TrySendError::Closed(_)) => {}
                }
            }
        }
        for client in stalled {
            tracing::warn!(%client, queued = OUTBOUND_QUEUE, "client not reading, disconnecting");
            self.disconnect(client);
        }
        Ok(delivered)
    }

    /// Stop queueing for `client` and tell its connection to close.
    /// Returns false when it was not connected.
    pub fn disconnect(&self, client: ClientId) -> bool {
        match self.peers.write().remove(&client) {
            Some(peer) => {
                peer.kick.notify_one();
                true
            }
            None => false,
        }
    }
}

impl BroadcastSink for Outbox {
    fn broadcast(&mut self, message: EntityMoved) {
        let entity = message.entity_id;
        match self.send_all(&ServerPacket::EntityMove(message)) {
            Ok(delivered) => tracing::trace!(%entity, delivered, "entity move queued"),
            Err(err) => tracing::error!(%entity, error = %err, "entity move not encoded"),
        }
    }
}
