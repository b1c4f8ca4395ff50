use realm_common::Bounds;
use serde::{Deserialize, Serialize};

/// Sprite value meaning "no sprite".
pub const NO_SPRITE: &str = "none";

/// Declarative description of an object type, as stored in `object.json`.
///
/// Bounds are numbers in JSON and may be fractional; they are truncated
/// toward zero when turned into a [`Bounds`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    pub name: String,
    #[serde(default = "no_sprite")]
    pub sprite: String,
    #[serde(default)]
    pub bounds_offset_x: f64,
    #[serde(default)]
    pub bounds_offset_y: f64,
    #[serde(default)]
    pub bounds_width: f64,
    #[serde(default)]
    pub bounds_height: f64,
}

fn no_sprite() -> String {
    NO_SPRITE.to_string()
}

impl ObjectDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sprite: no_sprite(),
            bounds_offset_x: 0.0,
            bounds_offset_y: 0.0,
            bounds_width: 0.0,
            bounds_height: 0.0,
        }
    }

    pub fn with_sprite(mut self, sprite: impl Into<String>) -> Self {
        self.sprite = sprite.into();
        self
    }

    pub fn with_bounds(mut self, offset_x: f64, offset_y: f64, width: f64, height: f64) -> Self {
        self.bounds_offset_x = offset_x;
        self.bounds_offset_y = offset_y;
        self.bounds_width = width;
        self.bounds_height = height;
        self
    }

    pub fn sprite(&self) -> Option<&str> {
        (self.sprite != NO_SPRITE).then_some(self.sprite.as_str())
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(
            self.bounds_offset_x as i32,
            self.bounds_offset_y as i32,
            self.bounds_width as i32,
            self.bounds_height as i32,
        )
    }
}
