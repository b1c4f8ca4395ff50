use realm_common::{Direction, EntityId, IVec2};
use serde::{Deserialize, Serialize};

/// A movement control a client can hold down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Control {
    Up,
    Down,
    Left,
    Right,
}

impl Control {
    pub fn direction(self) -> Direction {
        match self {
            Self::Up => Direction::Up,
            Self::Down => Direction::Down,
            Self::Left => Direction::Left,
            Self::Right => Direction::Right,
        }
    }
}

/// A request to change an entity's movement.
///
/// Intents arrive from the network thread and are applied on the simulation
/// thread before the next tick; world logic never sees raw packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    ControlPressed { entity: EntityId, control: Control },
    ControlReleased { entity: EntityId, control: Control },
    /// Set speed directly (tools, scripted drivers).
    SetSpeed { entity: EntityId, speed: IVec2 },
    Face { entity: EntityId, facing: Direction },
    /// Forget held controls, e.g. when the client disconnects.
    Reset { entity: EntityId },
}

impl Intent {
    pub fn entity(&self) -> EntityId {
        match self {
            Self::ControlPressed { entity, .. }
            | Self::ControlReleased { entity, .. }
            | Self::SetSpeed { entity, .. }
            | Self::Face { entity, .. }
            | Self::Reset { entity } => *entity,
        }
    }
}
