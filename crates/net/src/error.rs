use crate::client::ClientId;
use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("network runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("malformed packet: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("{0} is not connected")]
    UnknownClient(ClientId),
    #[error("{0} stopped reading and was disconnected")]
    Backlogged(ClientId),
}
