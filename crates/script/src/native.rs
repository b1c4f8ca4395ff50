use realm_kernel::{Behavior, HookContext, HookResult};
use std::fmt;

type NativeHook = Box<dyn Fn(&mut HookContext<'_>) -> HookResult + Send + Sync>;

/// Behavior assembled from Rust closures. Unset entry points are no-ops.
#[derive(Default)]
pub struct NativeBehavior {
    create: Option<NativeHook>,
    interact: Option<NativeHook>,
    tick: Option<NativeHook>,
}

impl NativeBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_create(mut self, f: impl Fn(&mut HookContext<'_>) -> HookResult + Send + Sync + 'static) -> Self {
        self.create = Some(Box::new(f));
        self
    }

    pub fn on_interact(mut self, f: impl Fn(&mut HookContext<'_>) -> HookResult + Send + Sync + 'static) -> Self {
        self.interact = Some(Box::new(f));
        self
    }

    pub fn on_tick(mut self, f: impl Fn(&mut HookContext<'_>) -> HookResult + Send + Sync + 'static) -> Self {
        self.tick = Some(Box::new(f));
        self
    }
}

fn run(hook: &Option<NativeHook>, ctx: &mut HookContext<'_>) -> HookResult {
    match hook {
        Some(f) => f(ctx),
        None => Ok(()),
    }
}

impl Behavior for NativeBehavior {
    fn create(&self, ctx: &mut HookContext<'_>) -> HookResult {
        run(&self.create, ctx)
    }

    fn interact(&self, ctx: &mut HookContext<'_>) -> HookResult {
        run(&self.interact, ctx)
    }

    fn tick(&self, ctx: &mut HookContext<'_>) -> HookResult {
        run(&self.tick, ctx)
    }
}

impl fmt::Debug for NativeBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBehavior")
            .field("create", &self.create.is_some())
            .field("interact", &self.interact.is_some())
            .field("tick", &self.tick.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realm_common::{IVec2, ObjectId};
    use realm_kernel::{HookSubject, WorldObject};

    #[test]
    fn unset_hooks_do_nothing() {
        let behavior = NativeBehavior::new().on_tick(|ctx| {
            if let HookSubject::Object { object, .. } = &mut ctx.subject {
                object.set_position(IVec2::new(9, 9));
            }
            Ok(())
        });
        let mut obj = WorldObject::new(ObjectId(1), "lamp", IVec2::ZERO);
        let mut ctx = HookContext::new(
            1,
            HookSubject::Object {
                area: "a",
                object: &mut obj,
            },
        );
        behavior.interact(&mut ctx).unwrap();
        behavior.create(&mut ctx).unwrap();
        behavior.tick(&mut ctx).unwrap();
        drop(ctx);
        assert_eq!(obj.position(), IVec2::new(9, 9));
    }
}
