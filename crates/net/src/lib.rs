//! Network transport for the world server.
//!
//! # Invariants
//! - Sockets live on the network thread only; the simulation thread sees
//!   [`NetEvent`]s and writes through an [`Outbox`].
//! - Outbound sends never block the caller. A client whose bounded queue
//!   fills up is disconnected.
//! - Inbound lines longer than [`MAX_LINE_BYTES`] close the connection.
//! - Every `Connected` is eventually followed by one `Disconnected` for the
//!   same client, unless the server itself shuts down.

mod client;
mod error;
mod outbox;
mod packet;
mod server;

pub use client::ClientId;
pub use error::NetError;
pub use outbox::{OUTBOUND_QUEUE, Outbox, PeerQueue};
pub use packet::{ClientPacket, ServerPacket, decode_line, encode_line};
pub use server::{MAX_LINE_BYTES, NetEvent, NetServer};
