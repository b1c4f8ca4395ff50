use crate::world::AreaId;
use realm_common::{EntityId, ObjectId};

pub type KernelResult<T> = Result<T, KernelError>;

#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("world not loaded: {0}")]
    UnknownWorld(String),
    #[error("world already loaded: {0}")]
    DuplicateWorld(String),
    #[error("area not found: {0}")]
    UnknownArea(AreaId),
    #[error("tile grid of {rows}x{columns} is too large")]
    GridTooLarge { rows: usize, columns: usize },
    #[error("area name already in use: {0}")]
    DuplicateArea(String),
    #[error("entity not found: {0}")]
    UnknownEntity(EntityId),
    #[error("entity already present: {0}")]
    DuplicateEntity(EntityId),
    #[error("object not found: {0}")]
    UnknownObject(ObjectId),
    #[error("object already present: {0}")]
    DuplicateObject(ObjectId),
    #[error("{object} is out of reach of {entity}")]
    OutOfReach { entity: EntityId, object: ObjectId },
}
