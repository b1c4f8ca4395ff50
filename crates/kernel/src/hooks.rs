//! Behavior hooks: the lifecycle interface behind which native and scripted
//! object behavior lives.
//!
//! A behavior is resolved once per object type and shared by every instance.
//! Entry points it does not implement are no-ops. Errors never escape the
//! dispatcher: they are logged and the call counts as a no-op.

use crate::entity::Entity;
use crate::object::WorldObject;
use crate::world::World;
use std::fmt;

pub type HookResult = Result<(), HookError>;

/// The three lifecycle entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    Create,
    Interact,
    Tick,
}

impl Hook {
    /// Function name a scripted backend looks up for this hook.
    pub fn name(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Interact => "interact",
            Self::Tick => "tick",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("{backend} behavior failed to compile: {message}")]
    Compile {
        backend: &'static str,
        message: String,
    },
    #[error("{hook} hook failed: {message}")]
    Invocation { hook: Hook, message: String },
}

/// What a hook is being run for.
pub enum HookSubject<'a> {
    World(&'a mut World),
    Entity {
        area: &'a str,
        entity: &'a mut Entity,
    },
    Object {
        area: &'a str,
        object: &'a mut WorldObject,
    },
}

pub struct HookContext<'a> {
    pub tick: u64,
    pub subject: HookSubject<'a>,
}

impl<'a> HookContext<'a> {
    pub fn new(tick: u64, subject: HookSubject<'a>) -> Self {
        Self { tick, subject }
    }
}

pub trait Behavior: Send + Sync {
    fn create(&self, _ctx: &mut HookContext<'_>) -> HookResult {
        Ok(())
    }

    fn interact(&self, _ctx: &mut HookContext<'_>) -> HookResult {
        Ok(())
    }

    fn tick(&self, _ctx: &mut HookContext<'_>) -> HookResult {
        Ok(())
    }
}

/// Run one hook, logging and swallowing any failure. Returns whether the hook
/// completed without error.
pub fn dispatch(behavior: &dyn Behavior, hook: Hook, ctx: &mut HookContext<'_>) -> bool {
    let result = match hook {
        Hook::Create => behavior.create(ctx),
        Hook::Interact => behavior.interact(ctx),
        Hook::Tick => behavior.tick(ctx),
    };
    match result {
        Ok(()) => true,
        Err(err) => {
            tracing::error!(%hook, tick = ctx.tick, error = %err, "behavior hook failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realm_common::{IVec2, ObjectId};

    struct Silent;
    impl Behavior for Silent {}

    struct Broken;
    impl Behavior for Broken {
        fn tick(&self, _ctx: &mut HookContext<'_>) -> HookResult {
            Err(HookError::Invocation {
                hook: Hook::Tick,
                message: "boom".into(),
            })
        }
    }

    struct Nudge;
    impl Behavior for Nudge {
        fn interact(&self, ctx: &mut HookContext<'_>) -> HookResult {
            if let HookSubject::Object { object, .. } = &mut ctx.subject {
                let p = object.position();
                object.set_position(p + IVec2::new(1, 0));
            }
            Ok(())
        }
    }

    fn object() -> WorldObject {
        WorldObject::new(ObjectId(1), "sign", IVec2::ZERO)
    }

    #[test]
    fn missing_entry_points_are_no_ops() {
        let mut obj = object();
        let mut ctx = HookContext::new(
            1,
            HookSubject::Object {
                area: "a",
                object: &mut obj,
            },
        );
        assert!(dispatch(&Silent, Hook::Interact, &mut ctx));
        assert!(dispatch(&Silent, Hook::Create, &mut ctx));
        assert!(dispatch(&Silent, Hook::Tick, &mut ctx));
    }

    #[test]
    fn failures_are_swallowed() {
        let mut obj = object();
        let mut ctx = HookContext::new(
            3,
            HookSubject::Object {
                area: "a",
                object: &mut obj,
            },
        );
        assert!(!dispatch(&Broken, Hook::Tick, &mut ctx));
        // Other entry points of the same behavior still work.
        assert!(dispatch(&Broken, Hook::Interact, &mut ctx));
    }

    #[test]
    fn hooks_can_mutate_their_subject() {
        let mut obj = object();
        {
            let mut ctx = HookContext::new(
                1,
                HookSubject::Object {
                    area: "a",
                    object: &mut obj,
                },
            );
            dispatch(&Nudge, Hook::Interact, &mut ctx);
        }
        assert_eq!(obj.position(), IVec2::new(1, 0));
    }

    #[test]
    fn hook_names() {
        assert_eq!(Hook::Create.name(), "create");
        assert_eq!(Hook::Interact.to_string(), "interact");
        assert_eq!(Hook::Tick.name(), "tick");
    }
}
