//! Object types and their behaviors.
//!
//! An object type is resolved once, from its descriptor and optional script,
//! into a single behavior shared by every instance of that type.
//!
//! # Invariants
//! - Backends form a closed set: none, native closures, Rhai scripts.
//! - A script that fails to compile never prevents its type from loading.

mod descriptor;
mod error;
mod native;
mod registry;
mod scripted;

pub use descriptor::{NO_SPRITE, ObjectDescriptor};
pub use error::ScriptError;
pub use native::NativeBehavior;
pub use registry::{BehaviorBackend, ObjectType, ObjectTypeRegistry};
pub use scripted::{MAX_OPERATIONS, RhaiBehavior, ScriptLanguage};
