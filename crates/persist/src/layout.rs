//! On-disk file shapes and their conversion to and from the world model.

use realm_common::{Bounds, Direction, EntityId, IVec2, IdAllocator, ObjectId};
use realm_kernel::{Area, AreaId, Entity, KernelResult, TileGrid, World};
use realm_script::ObjectTypeRegistry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileFile {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldFile {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectPlacement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(rename = "type")]
    pub type_name: String,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpawn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub hspeed: i32,
    #[serde(default)]
    pub vspeed: i32,
    #[serde(default)]
    pub facing: Direction,
    #[serde(default)]
    pub bounds: Bounds,
}

/// Contents of `area.json`. `tiles` is row-major; `null` marks an empty cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaFile {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    #[serde(default)]
    pub tiles: Vec<Vec<Option<String>>>,
    #[serde(default)]
    pub objects: Vec<ObjectPlacement>,
    #[serde(default)]
    pub entities: Vec<EntitySpawn>,
}

impl AreaFile {
    /// Capture a live area, including ids so a restore keeps them.
    pub fn capture(area: &Area) -> Self {
        let tiles = area.tiles().iter_rows().map(<[_]>::to_vec).collect();
        let objects = area
            .objects()
            .map(|o| ObjectPlacement {
                id: Some(o.id().0),
                type_name: o.type_name().to_string(),
                x: o.position().x,
                y: o.position().y,
            })
            .collect();
        let entities = area
            .entities()
            .map(|e| EntitySpawn {
                id: Some(e.id().0),
                x: e.position().x,
                y: e.position().y,
                hspeed: e.speed().x,
                vspeed: e.speed().y,
                facing: e.facing(),
                bounds: e.bounds(),
            })
            .collect();
        Self {
            name: area.name().to_string(),
            rows: area.tiles().rows(),
            columns: area.tiles().columns(),
            tiles,
            objects,
            entities,
        }
    }

    /// Tile grid of `rows × columns`; cells outside that shape are ignored.
    pub fn tile_grid(&self) -> KernelResult<TileGrid> {
        let mut grid = TileGrid::new(self.rows, self.columns)?;
        let mut dropped = 0usize;
        for (r, row) in self.tiles.iter().enumerate() {
            for (c, tile) in row.iter().enumerate() {
                if !grid.set(r, c, tile.clone()) {
                    dropped += 1;
                }
            }
        }
        if dropped > 0 {
            tracing::warn!(area = %self.name, dropped, "tiles outside the grid ignored");
        }
        Ok(grid)
    }

    /// Add this area to `world`, spawning its entities and placing its
    /// objects. Objects of unknown types and clashing entities are logged
    /// and skipped.
    pub fn build(&self, world: &mut World, types: &ObjectTypeRegistry, ids: &IdAllocator, tick: u64) -> KernelResult<AreaId> {
        let area = world.add_area(Area::new(&self.name, self.tile_grid()?))?;

        for spawn in &self.entities {
            let id = match spawn.id {
                Some(raw) => {
                    let id = EntityId(raw);
                    if !ids.reserve_entity(id) {
                        tracing::warn!(area = %self.name, %id, "entity skipped: id out of range");
                        continue;
                    }
                    id
                }
                None => ids.next_entity(),
            };
            let entity = Entity::new(id, IVec2::new(spawn.x, spawn.y))
                .with_speed(IVec2::new(spawn.hspeed, spawn.vspeed))
                .with_facing(spawn.facing)
                .with_bounds(spawn.bounds);
            if let Err(err) = world.spawn_entity(area, entity) {
                tracing::warn!(area = %self.name, error = %err, "entity skipped");
            }
        }

        for placement in &self.objects {
            let id = match placement.id {
                Some(raw) => {
                    let id = ObjectId(raw);
                    if !ids.reserve_object(id) {
                        tracing::warn!(area = %self.name, %id, "object skipped: id out of range");
                        continue;
                    }
                    id
                }
                None => ids.next_object(),
            };
            let position = IVec2::new(placement.x, placement.y);
            let object = match types.instantiate(&placement.type_name, id, position) {
                Ok(object) => object,
                Err(err) => {
                    tracing::warn!(area = %self.name, error = %err, "object skipped");
                    continue;
                }
            };
            if let Err(err) = world.place_object(area, object, tick) {
                tracing::warn!(area = %self.name, error = %err, "object skipped");
            }
        }

        Ok(area)
    }
}
