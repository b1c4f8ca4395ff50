//! File-backed snapshot archive.
//!
//! Layout inside the archive directory:
//! ```text
//! archive.meta.json            - metadata and schema version
//! snapshots/
//!   000001.snapshot.cbor.zst   - CBOR+zstd compressed registry snapshots
//! integrity/
//!   manifest.json              - hash chain manifest
//! ```

use crate::snapshot::RegistrySnapshot;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const SNAPSHOT_SCHEMA_VERSION: u32 = 1;
const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("integrity check failed for {file}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        file: String,
        expected: String,
        actual: String,
    },
    #[error("schema version mismatch: archive has v{file_version}, expected v{expected_version}")]
    SchemaMismatch { file_version: u32, expected_version: u32 },
    #[error("no snapshots found")]
    NoSnapshots,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveMeta {
    pub schema_version: u32,
    pub snapshot_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub filename: String,
    pub tick: u64,
    pub sha256: String,
    pub prev_hash: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityManifest {
    pub entries: Vec<ManifestEntry>,
}

pub struct SnapshotArchive {
    root: PathBuf,
    meta: ArchiveMeta,
    manifest: IntegrityManifest,
}

impl SnapshotArchive {
    /// Open the archive at `path`, creating an empty one if needed. Fails
    /// when the stored schema version is not the one this build writes.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let mut archive = Self {
            root: path.as_ref().to_path_buf(),
            meta: ArchiveMeta {
                schema_version: SNAPSHOT_SCHEMA_VERSION,
                snapshot_count: 0,
            },
            manifest: IntegrityManifest::default(),
        };
        fs::create_dir_all(archive.snapshots_dir())?;
        fs::create_dir_all(archive.root.join("integrity"))?;

        if !archive.meta_path().exists() {
            archive.persist()?;
            return Ok(archive);
        }

        archive.meta = read_json(&archive.meta_path())?;
        if archive.meta.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(ArchiveError::SchemaMismatch {
                file_version: archive.meta.schema_version,
                expected_version: SNAPSHOT_SCHEMA_VERSION,
            });
        }
        if archive.manifest_path().exists() {
            archive.manifest = read_json(&archive.manifest_path())?;
        }
        Ok(archive)
    }

    /// Append a snapshot. Returns its 1-based index.
    pub fn write(&mut self, snapshot: &RegistrySnapshot) -> Result<u32, ArchiveError> {
        let index = self.meta.snapshot_count + 1;
        let filename = format!("{index:06}.snapshot.cbor.zst");
        let packed = pack(snapshot)?;
        let entry = ManifestEntry {
            sha256: sha256_hex(&packed),
            prev_hash: self.manifest.entries.last().map(|e| e.sha256.clone()),
            tick: snapshot.tick,
            filename,
        };
        fs::write(self.snapshots_dir().join(&entry.filename), &packed)?;

        self.manifest.entries.push(entry);
        self.meta.snapshot_count = index;
        self.persist()?;
        tracing::info!(index, tick = snapshot.tick, bytes = packed.len(), "snapshot archived");
        Ok(index)
    }

    pub fn latest(&self) -> Result<RegistrySnapshot, ArchiveError> {
        match self.meta.snapshot_count {
            0 => Err(ArchiveError::NoSnapshots),
            last => self.load(last),
        }
    }

    /// Load snapshot `index`, checking its hash against the manifest first.
    pub fn load(&self, index: u32) -> Result<RegistrySnapshot, ArchiveError> {
        let entry = index
            .checked_sub(1)
            .and_then(|i| self.manifest.entries.get(i as usize))
            .ok_or(ArchiveError::NoSnapshots)?;
        let packed = self.read_checked(entry)?;
        unpack(&packed)
    }

    /// Check every file against its recorded hash and each entry's link to
    /// its predecessor.
    pub fn verify(&self) -> Result<(), ArchiveError> {
        let mut previous: Option<&str> = None;
        for entry in &self.manifest.entries {
            if entry.prev_hash.as_deref() != previous {
                return Err(ArchiveError::IntegrityMismatch {
                    file: entry.filename.clone(),
                    expected: previous.unwrap_or("None").to_string(),
                    actual: entry.prev_hash.clone().unwrap_or_else(|| "None".into()),
                });
            }
            self.read_checked(entry)?;
            previous = Some(entry.sha256.as_str());
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> &ArchiveMeta {
        &self.meta
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.manifest.entries
    }

    fn snapshots_dir(&self) -> PathBuf {
        self.root.join("snapshots")
    }

    fn meta_path(&self) -> PathBuf {
        self.root.join("archive.meta.json")
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join("integrity").join("manifest.json")
    }

    fn read_checked(&self, entry: &ManifestEntry) -> Result<Vec<u8>, ArchiveError> {
        let data = fs::read(self.snapshots_dir().join(&entry.filename))?;
        let actual = sha256_hex(&data);
        if actual != entry.sha256 {
            return Err(ArchiveError::IntegrityMismatch {
                file: entry.filename.clone(),
                expected: entry.sha256.clone(),
                actual,
            });
        }
        Ok(data)
    }

    fn persist(&self) -> Result<(), ArchiveError> {
        write_json(&self.meta_path(), &self.meta)?;
        write_json(&self.manifest_path(), &self.manifest)
    }
}

/// CBOR, then zstd.
fn pack(snapshot: &RegistrySnapshot) -> Result<Vec<u8>, ArchiveError> {
    let mut cbor = Vec::new();
    ciborium::into_writer(snapshot, &mut cbor).map_err(|e| ArchiveError::CborEncode(e.to_string()))?;
    Ok(zstd::encode_all(cbor.as_slice(), ZSTD_LEVEL)?)
}

fn unpack(packed: &[u8]) -> Result<RegistrySnapshot, ArchiveError> {
    let cbor = zstd::decode_all(packed)?;
    ciborium::from_reader(cbor.as_slice()).map_err(|e| ArchiveError::CborDecode(e.to_string()))
}

fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArchiveError> {
    Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ArchiveError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{AreaFile, EntitySpawn};
    use crate::snapshot::WorldSnapshot;
    use realm_common::{Bounds, Direction};

    fn sample(tick: u64) -> RegistrySnapshot {
        RegistrySnapshot {
            tick,
            worlds: vec![WorldSnapshot {
                name: "default".into(),
                areas: vec![AreaFile {
                    name: "default".into(),
                    rows: 1,
                    columns: 1,
                    tiles: vec![vec![Some("grass1".into())]],
                    objects: Vec::new(),
                    entities: vec![EntitySpawn {
                        id: Some(1),
                        x: 5,
                        y: 0,
                        hspeed: 5,
                        vspeed: 0,
                        facing: Direction::Right,
                        bounds: Bounds::default(),
                    }],
                }],
            }],
        }
    }

    #[test]
    fn open_creates_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = SnapshotArchive::open(tmp.path().join("snapshots")).unwrap();
        assert_eq!(archive.meta().snapshot_count, 0);
        assert!(archive.root().join("snapshots").is_dir());
        assert!(matches!(archive.latest(), Err(ArchiveError::NoSnapshots)));
    }

    #[test]
    fn write_then_reopen_latest() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("archive");
        {
            let mut archive = SnapshotArchive::open(&path).unwrap();
            assert_eq!(archive.write(&sample(10)).unwrap(), 1);
            assert_eq!(archive.write(&sample(20)).unwrap(), 2);
        }
        let archive = SnapshotArchive::open(&path).unwrap();
        assert_eq!(archive.latest().unwrap(), sample(20));
        assert_eq!(archive.load(1).unwrap().tick, 10);
        assert_eq!(archive.entries()[1].prev_hash.as_deref(), Some(archive.entries()[0].sha256.as_str()));
        archive.verify().unwrap();
    }

    #[test]
    fn corruption_fails_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("archive");
        let mut archive = SnapshotArchive::open(&path).unwrap();
        archive.write(&sample(1)).unwrap();

        let file = path.join("snapshots").join("000001.snapshot.cbor.zst");
        let mut data = std::fs::read(&file).unwrap();
        if let Some(byte) = data.last_mut() {
            *byte ^= 0xff;
        }
        std::fs::write(&file, &data).unwrap();

        let archive = SnapshotArchive::open(&path).unwrap();
        assert!(matches!(archive.verify(), Err(ArchiveError::IntegrityMismatch { .. })));
        assert!(archive.latest().is_err());
    }

    #[test]
    fn schema_mismatch_fails_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("archive");
        SnapshotArchive::open(&path).unwrap();

        let meta_path = path.join("archive.meta.json");
        let mut meta: ArchiveMeta = serde_json::from_reader(std::fs::File::open(&meta_path).unwrap()).unwrap();
        meta.schema_version = 999;
        serde_json::to_writer_pretty(std::fs::File::create(&meta_path).unwrap(), &meta).unwrap();

        match SnapshotArchive::open(&path) {
            Err(ArchiveError::SchemaMismatch { file_version, .. }) => assert_eq!(file_version, 999),
            Err(e) => panic!("expected SchemaMismatch, got: {e}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }
}
