//! Wire format: one JSON object per line, tagged by `type`.

use crate::client::ClientId;
use crate::error::NetError;
use realm_common::{EntityId, ObjectId};
use realm_input::Control;
use realm_kernel::EntityMoved;
use serde::{Deserialize, Serialize};

/// Client → server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientPacket {
    ControlPressed { control: Control },
    ControlReleased { control: Control },
    Interact { object: ObjectId },
}

/// Server → client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerPacket {
    Welcome {
        client: ClientId,
        entity: EntityId,
        world: String,
        area: String,
    },
    EntityMove(EntityMoved),
}

/// Serialize `packet` as a newline-terminated line.
pub fn encode_line(packet: &ServerPacket) -> Result<String, NetError> {
    let mut line = serde_json::to_string(packet)?;
    line.push('\n');
    Ok(line)
}

pub fn decode_line(line: &str) -> Result<ClientPacket, NetError> {
    Ok(serde_json::from_str(line.trim_end())?)
}
