//! Client input: controls, intents and the mapping onto entity movement.
//!
//! # Invariants
//! - Intents are applied on the simulation thread, between ticks.
//! - Speed and facing only change through the kernel setters, so change
//!   flags stay accurate.

mod intent;
mod mapper;

pub use intent::{Control, Intent};
pub use mapper::{DEFAULT_WALK_SPEED, InputError, InputMapper};
