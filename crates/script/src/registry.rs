use crate::descriptor::ObjectDescriptor;
use crate::error::ScriptError;
use crate::native::NativeBehavior;
use crate::scripted::{RhaiBehavior, ScriptLanguage};
use realm_common::{IVec2, ObjectId};
use realm_kernel::{Behavior, WorldObject};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Which backend an object type's behavior comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorBackend {
    /// No behavior; every hook is a no-op.
    None,
    Native,
    Script(ScriptLanguage),
}

impl fmt::Display for BehaviorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Native => f.write_str("native"),
            Self::Script(lang) => write!(f, "script:{lang}"),
        }
    }
}

/// A registered object type: its descriptor plus the behavior shared by all
/// of its instances.
#[derive(Clone)]
pub struct ObjectType {
    descriptor: ObjectDescriptor,
    backend: BehaviorBackend,
    behavior: Option<Arc<dyn Behavior>>,
}

impl ObjectType {
    pub fn descriptor(&self) -> &ObjectDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn backend(&self) -> BehaviorBackend {
        self.backend
    }

    pub fn behavior(&self) -> Option<&Arc<dyn Behavior>> {
        self.behavior.as_ref()
    }
}

impl fmt::Debug for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectType")
            .field("descriptor", &self.descriptor)
            .field("backend", &self.backend)
            .finish()
    }
}

/// Factory for world objects, keyed by type name.
#[derive(Debug, Default)]
pub struct ObjectTypeRegistry {
    types: BTreeMap<String, ObjectType>,
}

impl ObjectTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type without behavior.
    pub fn register(&mut self, descriptor: ObjectDescriptor) -> Result<(), ScriptError> {
        self.insert(descriptor, BehaviorBackend::None, None)
    }

    pub fn register_native(&mut self, descriptor: ObjectDescriptor, behavior: NativeBehavior) -> Result<(), ScriptError> {
        let behavior: Arc<dyn Behavior> = Arc::new(behavior);
        self.insert(descriptor, BehaviorBackend::Native, Some(behavior))
    }

    /// Register a scripted type. A script that fails to compile is logged and
    /// the type is registered without behavior.
    pub fn register_scripted(
        &mut self,
        descriptor: ObjectDescriptor,
        language: ScriptLanguage,
        source: &str,
    ) -> Result<(), ScriptError> {
        let behavior: Option<Arc<dyn Behavior>> = match language {
            ScriptLanguage::Rhai => match RhaiBehavior::compile(descriptor.name.clone(), source) {
                Ok(b) => Some(Arc::new(b) as Arc<dyn Behavior>),
                Err(err) => {
                    tracing::error!(object_type = %descriptor.name, %language, error = %err, "script rejected");
                    None
                }
            },
        };
        let backend = match behavior {
            Some(_) => BehaviorBackend::Script(language),
            None => BehaviorBackend::None,
        };
        self.insert(descriptor, backend, behavior)
    }

    fn insert(
        &mut self,
        descriptor: ObjectDescriptor,
        backend: BehaviorBackend,
        behavior: Option<Arc<dyn Behavior>>,
    ) -> Result<(), ScriptError> {
        if self.types.contains_key(&descriptor.name) {
            return Err(ScriptError::DuplicateType(descriptor.name));
        }
        tracing::debug!(object_type = %descriptor.name, %backend, "object type registered");
        self.types.insert(
            descriptor.name.clone(),
            ObjectType {
                descriptor,
                backend,
                behavior,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ObjectType> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectType> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Build a new instance of `type_name`. The `create` hook runs when the
    /// object is placed into a world.
    pub fn instantiate(&self, type_name: &str, id: ObjectId, position: IVec2) -> Result<WorldObject, ScriptError> {
        let ty = self
            .types
            .get(type_name)
            .ok_or_else(|| ScriptError::UnknownType(type_name.to_string()))?;
        Ok(WorldObject::new(id, type_name, position)
            .with_sprite(ty.descriptor.sprite().map(str::to_string))
            .with_bounds(ty.descriptor.bounds())
            .with_behavior(ty.behavior.clone()))
    }
}
