#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("object type already registered: {0}")]
    DuplicateType(String),
    #[error("unknown object type: {0}")]
    UnknownType(String),
}
