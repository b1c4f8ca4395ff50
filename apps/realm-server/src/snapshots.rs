use crossbeam_channel::{Sender, TrySendError};
use realm_persist::{RegistrySnapshot, SnapshotArchive};
use std::thread::JoinHandle;

/// Captures waiting for the writer. A capture that finds the queue full is
/// skipped rather than delaying the tick.
const PENDING_SNAPSHOTS: usize = 2;

/// Archive writer running on its own thread.
///
/// The tick only captures the registry and hands the copy over; encoding,
/// compression and file I/O happen here.
pub struct SnapshotWriter {
    queue: Option<Sender<RegistrySnapshot>>,
    thread: Option<JoinHandle<SnapshotArchive>>,
}

impl SnapshotWriter {
    pub fn spawn(mut archive: SnapshotArchive) -> std::io::Result<Self> {
        let (queue, pending) = crossbeam_channel::bounded::<RegistrySnapshot>(PENDING_SNAPSHOTS);
        let thread = std::thread::Builder::new().name("realm-snapshots".into()).spawn(move || {
            for snapshot in pending {
                match archive.write(&snapshot) {
                    Ok(index) => tracing::info!(index, tick = snapshot.tick, "snapshot written"),
                    Err(err) => tracing::error!(tick = snapshot.tick, error = %err, "snapshot failed"),
                }
            }
            archive
        })?;
        Ok(Self {
            queue: Some(queue),
            thread: Some(thread),
        })
    }

    /// Queue `snapshot` without blocking. Returns false when it was dropped.
    pub fn submit(&self, snapshot: RegistrySnapshot) -> bool {
        let Some(queue) = &self.queue else {
            return false;
        };
        match queue.try_send(snapshot) {
            Ok(()) => true,
            Err(TrySendError::Full(snapshot)) => {
                tracing::warn!(tick = snapshot.tick, "snapshot writer busy, capture skipped");
                false
            }
            Err(TrySendError::Disconnected(snapshot)) => {
                tracing::error!(tick = snapshot.tick, "snapshot writer gone");
                false
            }
        }
    }

    /// Write everything still queued and hand the archive back.
    pub fn finish(mut self) -> Option<SnapshotArchive> {
        self.stop()
    }

    fn stop(&mut self) -> Option<SnapshotArchive> {
        self.queue.take();
        let thread = self.thread.take()?;
        match thread.join() {
            Ok(archive) => Some(archive),
            Err(_) => {
                tracing::error!("snapshot writer panicked");
                None
            }
        }
    }
}

impl Drop for SnapshotWriter {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realm_kernel::WorldRegistry;

    #[test]
    fn queued_snapshots_are_written_before_finish_returns() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::spawn(SnapshotArchive::open(dir.path()).unwrap()).unwrap();

        assert!(writer.submit(RegistrySnapshot::capture(&WorldRegistry::new(), 5)));
        let archive = writer.finish().unwrap();
        assert_eq!(archive.entries().len(), 1);
        assert_eq!(archive.latest().unwrap().tick, 5);
    }

    #[test]
    fn dropping_flushes_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        {
            let writer = SnapshotWriter::spawn(SnapshotArchive::open(dir.path()).unwrap()).unwrap();
            writer.submit(RegistrySnapshot::capture(&WorldRegistry::new(), 9));
        }
        let archive = SnapshotArchive::open(dir.path()).unwrap();
        assert_eq!(archive.latest().unwrap().tick, 9);
    }
}
