//! Server content directory.
//!
//! Layout inside the data directory:
//! ```text
//! tiles/<tile>/tile.json
//! objects/<type>/object.json        - object type descriptor
//! objects/<type>/object.<ext>       - optional behavior script
//! worlds/<world>/world.json
//! worlds/<world>/areas/<area>/area.json
//! ```
//!
//! Loading is forgiving: a broken tile, object type, world or area is logged
//! and skipped, and startup continues with whatever did load. Saving reports
//! every failure to the caller.

use crate::layout::{AreaFile, TileFile, WorldFile};
use realm_common::IdAllocator;
use realm_kernel::{World, WorldRegistry};
use realm_script::{ObjectDescriptor, ObjectTypeRegistry, ScriptLanguage};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Tiles written by [`ContentDir::write_defaults`].
pub const DEFAULT_TILES: [&str; 5] = ["grass1", "grass2", "grass3", "grass4", "water"];
pub const DEFAULT_WORLD: &str = "default";
pub const DEFAULT_AREA: &str = "default";

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// What a load pass found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub tiles: usize,
    pub object_types: usize,
    pub worlds: usize,
    pub areas: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct ContentDir {
    root: PathBuf,
}

impl ContentDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn tiles_dir(&self) -> PathBuf {
        self.root.join("tiles")
    }

    fn objects_dir(&self) -> PathBuf {
        self.root.join("objects")
    }

    fn worlds_dir(&self) -> PathBuf {
        self.root.join("worlds")
    }

    fn world_dir(&self, world: &str) -> PathBuf {
        self.worlds_dir().join(world)
    }

    /// Whether any world content exists yet.
    pub fn has_worlds(&self) -> bool {
        self.worlds_dir().is_dir()
    }

    /// Write the stock tiles and a `default` world with one `default` area.
    /// Existing files are left alone.
    pub fn write_defaults(&self) -> Result<(), LayoutError> {
        for tile in DEFAULT_TILES {
            let path = self.tiles_dir().join(tile).join("tile.json");
            if !path.exists() {
                write_json(&path, &TileFile { name: tile.to_string() })?;
            }
        }
        create_dir(&self.objects_dir())?;

        let world_path = self.world_dir(DEFAULT_WORLD).join("world.json");
        if !world_path.exists() {
            write_json(&world_path, &WorldFile { name: DEFAULT_WORLD.to_string() })?;
        }
        let area_path = self.area_path(DEFAULT_WORLD, DEFAULT_AREA);
        if !area_path.exists() {
            write_json(&area_path, &default_area())?;
        }
        tracing::info!(root = %self.root.display(), "default content written");
        Ok(())
    }

    fn area_path(&self, world: &str, area: &str) -> PathBuf {
        self.world_dir(world).join("areas").join(area).join("area.json")
    }

    /// Tile names found under `tiles/`.
    pub fn load_tiles(&self, report: &mut LoadReport) -> BTreeSet<String> {
        let mut tiles = BTreeSet::new();
        for dir in subdirectories(&self.tiles_dir()) {
            match read_json::<TileFile>(&dir.join("tile.json")) {
                Ok(tile) => {
                    tiles.insert(tile.name);
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to load tile");
                    report.skipped += 1;
                }
            }
        }
        report.tiles = tiles.len();
        tiles
    }

    /// Register every object type found under `objects/`. The first
    /// `object.<ext>` with a known script extension becomes its behavior.
    pub fn load_object_types(&self, types: &mut ObjectTypeRegistry, report: &mut LoadReport) {
        for dir in subdirectories(&self.objects_dir()) {
            let descriptor = match read_json::<ObjectDescriptor>(&dir.join("object.json")) {
                Ok(d) => d,
                Err(err) => {
                    tracing::error!(error = %err, "failed to load object type");
                    report.skipped += 1;
                    continue;
                }
            };
            let script = ScriptLanguage::ALL.into_iter().find_map(|lang| {
                let path = dir.join(format!("object.{}", lang.extension()));
                path.is_file().then_some((lang, path))
            });
            let result = match script {
                Some((lang, path)) => match std::fs::read_to_string(&path) {
                    Ok(source) => types.register_scripted(descriptor, lang, &source),
                    Err(err) => {
                        tracing::error!(path = %path.display(), error = %err, "failed to read script");
                        types.register(descriptor)
                    }
                },
                None => types.register(descriptor),
            };
            match result {
                Ok(()) => report.object_types += 1,
                Err(err) => {
                    tracing::error!(dir = %dir.display(), error = %err, "object type skipped");
                    report.skipped += 1;
                }
            }
        }
    }

    /// Load every world under `worlds/`.
    pub fn load_worlds(
        &self,
        types: &ObjectTypeRegistry,
        tiles: &BTreeSet<String>,
        ids: &IdAllocator,
        report: &mut LoadReport,
    ) -> WorldRegistry {
        let mut registry = WorldRegistry::new();
        for dir in subdirectories(&self.worlds_dir()) {
            let meta = match read_json::<WorldFile>(&dir.join("world.json")) {
                Ok(meta) => meta,
                Err(err) => {
                    tracing::error!(error = %err, "failed to load world");
                    report.skipped += 1;
                    continue;
                }
            };
            let mut world = World::new(meta.name);
            for area_dir in subdirectories(&dir.join("areas")) {
                let file = match read_json::<AreaFile>(&area_dir.join("area.json")) {
                    Ok(file) => file,
                    Err(err) => {
                        tracing::error!(error = %err, "failed to load area");
                        report.skipped += 1;
                        continue;
                    }
                };
                warn_unknown_tiles(&file, tiles);
                match file.build(&mut world, types, ids, 0) {
                    Ok(_) => report.areas += 1,
                    Err(err) => {
                        tracing::error!(world = %world.name(), area = %file.name, error = %err, "area skipped");
                        report.skipped += 1;
                    }
                }
            }
            match registry.add(world) {
                Ok(()) => report.worlds += 1,
                Err(err) => {
                    tracing::error!(error = %err, "world skipped");
                    report.skipped += 1;
                }
            }
        }
        registry
    }

    /// Convenience for startup: write defaults when no world exists, then
    /// load tiles, object types and worlds.
    pub fn load_all(&self, types: &mut ObjectTypeRegistry, ids: &IdAllocator) -> Result<(WorldRegistry, LoadReport), LayoutError> {
        if !self.has_worlds() {
            self.write_defaults()?;
        }
        let mut report = LoadReport::default();
        let tiles = self.load_tiles(&mut report);
        self.load_object_types(types, &mut report);
        let registry = self.load_worlds(types, &tiles, ids, &mut report);
        tracing::info!(?report, "content loaded");
        Ok((registry, report))
    }

    /// Write `world` back in the directory layout, replacing its files.
    pub fn save_world(&self, world: &World) -> Result<(), LayoutError> {
        let dir = self.world_dir(world.name());
        write_json(&dir.join("world.json"), &WorldFile { name: world.name().to_string() })?;
        for (_, area) in world.areas() {
            write_json(&self.area_path(world.name(), area.name()), &AreaFile::capture(area))?;
        }
        tracing::info!(world = %world.name(), areas = world.area_count(), "world saved");
        Ok(())
    }
}

fn default_area() -> AreaFile {
    const ROWS: usize = 16;
    const COLUMNS: usize = 20;
    let tiles = (0..ROWS)
        .map(|r| {
            (0..COLUMNS)
                .map(|c| {
                    let edge = r == 0 || c == 0 || r == ROWS - 1 || c == COLUMNS - 1;
                    let tile = if edge { "water" } else { DEFAULT_TILES[(r * 7 + c * 3) % 4] };
                    Some(tile.to_string())
                })
                .collect()
        })
        .collect();
    AreaFile {
        name: DEFAULT_AREA.to_string(),
        rows: ROWS,
        columns: COLUMNS,
        tiles,
        objects: Vec::new(),
        entities: Vec::new(),
    }
}

fn warn_unknown_tiles(file: &AreaFile, known: &BTreeSet<String>) {
    let unknown: BTreeSet<&str> = file
        .tiles
        .iter()
        .flatten()
        .flatten()
        .map(String::as_str)
        .filter(|t| !known.contains(*t))
        .collect();
    if !unknown.is_empty() {
        tracing::warn!(area = %file.name, ?unknown, "area references unknown tiles");
    }
}

/// Sorted subdirectories of `dir`; missing or unreadable directories yield none.
fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

fn create_dir(path: &Path) -> Result<(), LayoutError> {
    std::fs::create_dir_all(path).map_err(|source| LayoutError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LayoutError> {
    let text = std::fs::read_to_string(path).map_err(|source| LayoutError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| LayoutError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), LayoutError> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    let text = serde_json::to_string_pretty(value).map_err(|source| LayoutError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, text).map_err(|source| LayoutError::Io {
        path: path.to_path_buf(),
        source,
    })
}
