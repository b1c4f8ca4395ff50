use crate::entity::Entity;
use crate::error::{KernelError, KernelResult};
use crate::object::WorldObject;
use realm_common::{EntityId, ObjectId};
use std::collections::BTreeMap;

/// Row-major grid of tile names. Empty cells hold `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TileGrid {
    rows: usize,
    columns: usize,
    cells: Vec<Option<String>>,
}

/// Largest number of cells a single area may hold.
pub const MAX_TILE_CELLS: usize = 1 << 22;

impl TileGrid {
    /// Empty grid of `rows × columns`. Fails when the shape overflows or
    /// exceeds [`MAX_TILE_CELLS`].
    pub fn new(rows: usize, columns: usize) -> KernelResult<Self> {
        let cells = rows
            .checked_mul(columns)
            .filter(|&n| n <= MAX_TILE_CELLS)
            .ok_or(KernelError::GridTooLarge { rows, columns })?;
        Ok(Self {
            rows,
            columns,
            cells: vec![None; cells],
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn get(&self, row: usize, column: usize) -> Option<&str> {
        self.index(row, column)
            .and_then(|i| self.cells[i].as_deref())
    }

    /// Set a cell. Returns false when the coordinate is outside the grid.
    pub fn set(&mut self, row: usize, column: usize, tile: Option<String>) -> bool {
        match self.index(row, column) {
            Some(i) => {
                self.cells[i] = tile;
                true
            }
            None => false,
        }
    }

    /// Iterate rows as slices of cells.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[Option<String>]> {
        // chunks(0) panics; an empty grid simply has no rows.
        self.cells.chunks(self.columns.max(1)).take(self.rows)
    }

    fn index(&self, row: usize, column: usize) -> Option<usize> {
        (row < self.rows && column < self.columns).then(|| row * self.columns + column)
    }
}

/// A named region of a world: a tile grid plus the entities and objects in it.
///
/// Membership changes go through [`crate::World`], which keeps its
/// entity/object → area index consistent with the sets held here.
#[derive(Debug, Clone)]
pub struct Area {
    pub(crate) name: String,
    tiles: TileGrid,
    pub(crate) entities: BTreeMap<EntityId, Entity>,
    pub(crate) objects: BTreeMap<ObjectId, WorldObject>,
}

impl Area {
    pub fn new(name: impl Into<String>, tiles: TileGrid) -> Self {
        Self {
            name: name.into(),
            tiles,
            entities: BTreeMap::new(),
            objects: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tiles(&self) -> &TileGrid {
        &self.tiles
    }

    pub fn tiles_mut(&mut self) -> &mut TileGrid {
        &mut self.tiles
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn contains_entity(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn objects(&self) -> impl Iterator<Item = &WorldObject> {
        self.objects.values()
    }

    pub fn object(&self, id: ObjectId) -> Option<&WorldObject> {
        self.objects.get(&id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut WorldObject> {
        self.objects.get_mut(&id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}
