//! Rhai-backed behavior.
//!
//! Hooks are plain script functions named `create`, `interact` and `tick`
//! taking no arguments. The subject is bound to `this` as a map:
//!
//! | subject | fields |
//! |---|---|
//! | entity | `id`, `area`, `x`, `y`, `hspeed`, `vspeed`, `facing`, `tick` |
//! | object | `id`, `area`, `type`, `x`, `y`, `tick` |
//! | world  | `name`, `tick` |
//!
//! After the call, `x`/`y` (and `hspeed`/`vspeed` for entities) are read back
//! and applied. A function the script does not define is a no-op.

use realm_common::IVec2;
use realm_kernel::{Behavior, Hook, HookContext, HookError, HookResult, HookSubject};
use rhai::{AST, CallFnOptions, Dynamic, Engine, EvalAltResult, INT, Map, Scope};
use std::fmt;

const BACKEND: &str = "rhai";

/// Upper bound on script operations per call, so a runaway loop fails the
/// hook instead of stalling the tick.
pub const MAX_OPERATIONS: u64 = 100_000;

/// Script languages a behavior can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptLanguage {
    Rhai,
}

impl ScriptLanguage {
    pub const ALL: [ScriptLanguage; 1] = [ScriptLanguage::Rhai];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Rhai => "rhai",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|lang| lang.extension() == ext)
    }
}

impl fmt::Display for ScriptLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

pub struct RhaiBehavior {
    type_name: String,
    engine: Engine,
    ast: AST,
}

impl RhaiBehavior {
    /// Compile `source` and run its top-level statements once.
    pub fn compile(type_name: impl Into<String>, source: &str) -> Result<Self, HookError> {
        let type_name = type_name.into();
        let mut engine = Engine::new();
        engine.set_max_operations(MAX_OPERATIONS);
        let owner = type_name.clone();
        engine.register_fn("log", move |message: &str| {
            tracing::info!(object_type = %owner, "{message}");
        });

        let ast = engine.compile(source).map_err(|err| HookError::Compile {
            backend: BACKEND,
            message: err.to_string(),
        })?;
        engine.run_ast(&ast).map_err(|err| HookError::Compile {
            backend: BACKEND,
            message: err.to_string(),
        })?;
        Ok(Self { type_name, engine, ast })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    fn call(&self, hook: Hook, ctx: &mut HookContext<'_>) -> HookResult {
        let mut this = Dynamic::from_map(subject_map(ctx));
        let mut scope = Scope::new();
        let options = CallFnOptions::new().eval_ast(false).bind_this_ptr(&mut this);
        let result = self
            .engine
            .call_fn_with_options::<Dynamic>(options, &mut scope, &self.ast, hook.name(), ());

        match result {
            Ok(_) => {}
            Err(err) if matches!(err.as_ref(), EvalAltResult::ErrorFunctionNotFound(..)) => return Ok(()),
            Err(err) => {
                return Err(HookError::Invocation {
                    hook,
                    message: err.to_string(),
                });
            }
        }

        if let Some(map) = this.try_cast::<Map>() {
            apply_map(ctx, &map);
        }
        Ok(())
    }
}

impl Behavior for RhaiBehavior {
    fn create(&self, ctx: &mut HookContext<'_>) -> HookResult {
        self.call(Hook::Create, ctx)
    }

    fn interact(&self, ctx: &mut HookContext<'_>) -> HookResult {
        self.call(Hook::Interact, ctx)
    }

    fn tick(&self, ctx: &mut HookContext<'_>) -> HookResult {
        self.call(Hook::Tick, ctx)
    }
}

impl fmt::Debug for RhaiBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RhaiBehavior")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

fn subject_map(ctx: &HookContext<'_>) -> Map {
    let mut map = Map::new();
    map.insert("tick".into(), Dynamic::from(ctx.tick as INT));
    match &ctx.subject {
        HookSubject::World(world) => {
            map.insert("name".into(), world.name().to_string().into());
        }
        HookSubject::Entity { area, entity } => {
            map.insert("id".into(), Dynamic::from(entity.id().0 as INT));
            map.insert("area".into(), area.to_string().into());
            insert_point(&mut map, "x", "y", entity.position());
            insert_point(&mut map, "hspeed", "vspeed", entity.speed());
            map.insert("facing".into(), format!("{:?}", entity.facing()).to_lowercase().into());
        }
        HookSubject::Object { area, object } => {
            map.insert("id".into(), Dynamic::from(object.id().0 as INT));
            map.insert("area".into(), area.to_string().into());
            map.insert("type".into(), object.type_name().to_string().into());
            insert_point(&mut map, "x", "y", object.position());
        }
    }
    map
}

fn insert_point(map: &mut Map, x: &str, y: &str, value: IVec2) {
    map.insert(x.into(), Dynamic::from(value.x as INT));
    map.insert(y.into(), Dynamic::from(value.y as INT));
}

fn read_point(map: &Map, x: &str, y: &str, fallback: IVec2) -> IVec2 {
    let read = |key: &str, default: i32| {
        map.get(key)
            .and_then(|v| v.as_int().ok())
            .map_or(default, |v| v as i32)
    };
    IVec2::new(read(x, fallback.x), read(y, fallback.y))
}

fn apply_map(ctx: &mut HookContext<'_>, map: &Map) {
    match &mut ctx.subject {
        HookSubject::World(_) => {}
        HookSubject::Entity { entity, .. } => {
            let position = read_point(map, "x", "y", entity.position());
            if position != entity.position() {
                entity.set_position(position);
                entity.force_update();
            }
            let speed = read_point(map, "hspeed", "vspeed", entity.speed());
            entity.set_speed(speed);
        }
        HookSubject::Object { object, .. } => {
            let position = read_point(map, "x", "y", object.position());
            object.set_position(position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realm_common::{EntityId, ObjectId};
    use realm_kernel::{Entity, World, WorldObject, hooks};

    fn object_ctx<'a>(obj: &'a mut WorldObject) -> HookContext<'a> {
        HookContext::new(
            5,
            HookSubject::Object {
                area: "square",
                object: obj,
            },
        )
    }

    #[test]
    fn language_from_extension() {
        assert_eq!(ScriptLanguage::from_extension("rhai"), Some(ScriptLanguage::Rhai));
        assert_eq!(ScriptLanguage::from_extension("js"), None);
    }

    #[test]
    fn compile_error_is_reported() {
        let err = RhaiBehavior::compile("broken", "fn tick( {").unwrap_err();
        assert!(matches!(err, HookError::Compile { backend: "rhai", .. }));
    }

    #[test]
    fn missing_function_is_a_no_op() {
        let behavior = RhaiBehavior::compile("sign", "fn tick() { this.x += 1; }").unwrap();
        let mut obj = WorldObject::new(ObjectId(1), "sign", IVec2::new(4, 4));
        let mut ctx = object_ctx(&mut obj);
        assert!(behavior.interact(&mut ctx).is_ok());
        assert!(behavior.create(&mut ctx).is_ok());
    }

    #[test]
    fn tick_moves_object() {
        let behavior = RhaiBehavior::compile(
            "drifter",
            r#"
            fn tick() {
                if this.area == "square" && this.type == "drifter" {
                    this.x += 1;
                    this.y -= this.tick;
                }
            }
            "#,
        )
        .unwrap();
        let mut obj = WorldObject::new(ObjectId(1), "drifter", IVec2::new(4, 10));
        behavior.tick(&mut object_ctx(&mut obj)).unwrap();
        assert_eq!(obj.position(), IVec2::new(5, 5));
    }

    #[test]
    fn entity_speed_written_back_raises_flag() {
        let behavior = RhaiBehavior::compile("npc", "fn tick() { this.hspeed = 2; }").unwrap();
        let mut entity = Entity::new(EntityId(1), IVec2::ZERO);
        let mut ctx = HookContext::new(
            1,
            HookSubject::Entity {
                area: "a",
                entity: &mut entity,
            },
        );
        behavior.tick(&mut ctx).unwrap();
        drop(ctx);
        assert_eq!(entity.speed(), IVec2::new(2, 0));
        assert!(entity.flags().speed_changed);
        assert!(!entity.flags().force_update);
    }

    #[test]
    fn runtime_error_is_swallowed_by_dispatch() {
        let behavior = RhaiBehavior::compile("bad", "fn interact() { undefined_call(); }").unwrap();
        let mut obj = WorldObject::new(ObjectId(1), "bad", IVec2::ZERO);
        let mut ctx = object_ctx(&mut obj);
        assert!(matches!(
            behavior.interact(&mut ctx),
            Err(HookError::Invocation { hook: Hook::Interact, .. })
        ));
        assert!(!hooks::dispatch(&behavior, Hook::Interact, &mut ctx));
    }

    #[test]
    fn runaway_script_is_stopped() {
        let behavior = RhaiBehavior::compile("spin", "fn tick() { loop { } }").unwrap();
        let mut obj = WorldObject::new(ObjectId(1), "spin", IVec2::ZERO);
        assert!(behavior.tick(&mut object_ctx(&mut obj)).is_err());
    }

    #[test]
    fn world_subject_and_log() {
        let behavior = RhaiBehavior::compile("world", r#"fn tick() { log(`tick ${this.tick} in ${this.name}`); }"#).unwrap();
        let mut world = World::new("default");
        let mut ctx = HookContext::new(2, HookSubject::World(&mut world));
        assert!(behavior.tick(&mut ctx).is_ok());
    }
}
