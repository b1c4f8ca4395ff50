//! Persistence boundary: world content on disk and registry snapshots.
//!
//! # Invariants
//! - Loading never aborts on a single broken item; it is logged and skipped.
//! - Save and archive failures are returned to the caller.
//! - Archived snapshots are hash-chained and verified before use.

mod archive;
mod content;
mod layout;
mod snapshot;

pub use archive::{ArchiveError, ArchiveMeta, IntegrityManifest, ManifestEntry, SnapshotArchive};
pub use content::{ContentDir, DEFAULT_AREA, DEFAULT_TILES, DEFAULT_WORLD, LayoutError, LoadReport};
pub use layout::{AreaFile, EntitySpawn, ObjectPlacement, TileFile, WorldFile};
pub use snapshot::{RegistrySnapshot, WorldSnapshot};
