//! Sharded merge runtime.
//!
//! Merges run on a small pool of worker threads. Each worker owns one
//! shard and its own bounded queue; a record is routed to the shard chosen
//! by its key digest. Merges of one key therefore run strictly in
//! submission order, while different keys proceed in parallel. The bounded
//! queues give back-pressure: a blocking submit waits for room, a
//! non-blocking one reports `QueueFull`.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::{Catalog, StorageError};
use crate::error::RuntimeError;
use crate::identity::CatalogKey;
use crate::merge::{MergeEngine, MergeOutcome};
use crate::record::CanonicalRecord;
use crate::source::SourceId;

/// Runtime sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeRuntimeConfig {
    /// Number of shards, one worker thread each.
    pub workers: usize,
    /// Maximum queued records per shard.
    pub queue_capacity: usize,
}

impl Default for MergeRuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 256,
        }
    }
}

struct MergeJob {
    key: CatalogKey,
    record: CanonicalRecord,
}

/// Result of one merge, tagged with the source of the merged record.
#[derive(Debug)]
pub struct MergeDone {
    pub source: SourceId,
    pub key: CatalogKey,
    pub result: Result<MergeOutcome, StorageError>,
}

struct Shard {
    tx: Sender<MergeJob>,
    worker: JoinHandle<()>,
}

impl Shard {
    fn start(
        idx: usize,
        queue_capacity: usize,
        engine: Arc<MergeEngine>,
        catalog: Arc<dyn Catalog>,
        results: Sender<MergeDone>,
    ) -> Result<Self, RuntimeError> {
        let (tx, rx) = bounded::<MergeJob>(queue_capacity);
        let worker = thread::Builder::new()
            .name(format!("hwcatalog-merge-{idx}"))
            .spawn(move || {
                // Exits once every sender is dropped and the queue is drained.
                while let Ok(MergeJob { key, record }) = rx.recv() {
                    let result = engine.merge(&key, &record, catalog.as_ref());
                    let _ = results.send(MergeDone {
                        source: record.source_id,
                        key,
                        result,
                    });
                }
            })
            .map_err(|e| RuntimeError::Spawn {
                message: e.to_string(),
            })?;
        Ok(Self { tx, worker })
    }
}

/// A pool of per-shard merge workers over one catalog.
pub struct MergeRuntime {
    shards: Vec<Shard>,
    queue_capacity: usize,
    results: Receiver<MergeDone>,
}

impl MergeRuntime {
    /// Starts one worker per shard.
    ///
    /// # Errors
    /// Returns [`RuntimeError::Spawn`] when a worker thread cannot be
    /// created; workers already started are shut down.
    pub fn start(
        config: MergeRuntimeConfig,
        engine: Arc<MergeEngine>,
        catalog: Arc<dyn Catalog>,
    ) -> Result<Self, RuntimeError> {
        let workers = config.workers.max(1);
        let queue_capacity = config.queue_capacity.max(1);
        let (results_tx, results) = unbounded();

        let mut runtime = Self {
            shards: Vec::with_capacity(workers),
            queue_capacity,
            results,
        };
        for idx in 0..workers {
            let shard = Shard::start(
                idx,
                queue_capacity,
                Arc::clone(&engine),
                Arc::clone(&catalog),
                results_tx.clone(),
            )?;
            runtime.shards.push(shard);
        }
        Ok(runtime)
    }

    /// Number of shards.
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard_for(&self, key: &CatalogKey) -> Result<(usize, &Shard), RuntimeError> {
        let idx = key.shard(self.shards.len());
        self.shards
            .get(idx)
            .map(|s| (idx, s))
            .ok_or(RuntimeError::Disconnected { shard: idx })
    }

    /// Queues a merge, waiting for room in the shard's queue.
    ///
    /// # Errors
    /// Returns [`RuntimeError::Disconnected`] when the shard's worker has
    /// exited.
    pub fn submit(&self, key: CatalogKey, record: CanonicalRecord) -> Result<(), RuntimeError> {
        let (idx, shard) = self.shard_for(&key)?;
        shard
            .tx
            .send(MergeJob { key, record })
            .map_err(|_| RuntimeError::Disconnected { shard: idx })
    }

    /// Queues a merge without waiting.
    ///
    /// # Errors
    /// Returns [`RuntimeError::QueueFull`] when the shard's queue is at
    /// capacity, and [`RuntimeError::Disconnected`] when its worker has
    /// exited.
    pub fn try_submit(&self, key: CatalogKey, record: CanonicalRecord) -> Result<(), RuntimeError> {
        let (idx, shard) = self.shard_for(&key)?;
        match shard.tx.try_send(MergeJob { key, record }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(RuntimeError::QueueFull {
                shard: idx,
                capacity: self.queue_capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(RuntimeError::Disconnected { shard: idx }),
        }
    }

    /// Results that are ready, without waiting.
    pub fn drain_ready(&self) -> Vec<MergeDone> {
        self.results.try_iter().collect()
    }

    /// Waits for every queued merge, stops the workers and returns the
    /// results not yet drained.
    #[must_use]
    pub fn finish(mut self) -> Vec<MergeDone> {
        self.shutdown();
        self.results.try_iter().collect()
    }

    fn shutdown(&mut self) {
        for (idx, shard) in std::mem::take(&mut self.shards).into_iter().enumerate() {
            // Closing the queue lets the worker drain it and exit.
            drop(shard.tx);
            if shard.worker.join().is_err() {
                warn!(shard = idx, "Merge worker panicked");
            }
        }
    }
}

impl Drop for MergeRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::component::ComponentKind;
    use crate::merge::EntryStatus;
    use crate::schema::CanonicalField;

    fn record(model: &str, cores: i64) -> CanonicalRecord {
        CanonicalRecord::empty(
            ComponentKind::Cpu,
            SourceId::cpu_dataset(),
            Utc::now(),
            SourceId::cpu_dataset().default_tier(),
        )
        .with(CanonicalField::Vendor, "Intel")
        .with(CanonicalField::Model, model)
        .with(CanonicalField::CoreCount, cores)
    }

    fn key(model: &str) -> CatalogKey {
        CatalogKey::new("intel", ComponentKind::Cpu, model, "")
    }

    fn runtime(workers: usize, queue_capacity: usize, catalog: Arc<InMemoryCatalog>) -> MergeRuntime {
        MergeRuntime::start(
            MergeRuntimeConfig {
                workers,
                queue_capacity,
            },
            Arc::new(MergeEngine::default()),
            catalog,
        )
        .unwrap()
    }

    #[test]
    fn every_submitted_record_is_merged() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let rt = runtime(3, 4, Arc::clone(&catalog));
        assert_eq!(rt.shard_count(), 3);
        for i in 0..50 {
            let model = format!("i-5-{i}");
            rt.submit(key(&model), record(&model, 4)).unwrap();
        }
        let done = rt.finish();
        assert_eq!(done.len(), 50);
        assert!(done.iter().all(|d| d.source == SourceId::cpu_dataset()));
        assert!(done
            .iter()
            .all(|d| matches!(d.result, Ok(MergeOutcome { status: EntryStatus::Created, .. }))));
        assert_eq!(catalog.len().unwrap(), 50);
    }

    #[test]
    fn merges_of_one_key_keep_submission_order() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let rt = runtime(4, 2, Arc::clone(&catalog));
        let base = Utc::now();
        for i in 0..20_i64 {
            let mut r = record("i-9-9900-k", i);
            r.source_fetch_time = base + chrono::Duration::seconds(i);
            rt.submit(key("i-9-9900-k"), r).unwrap();
        }
        let done = rt.finish();
        assert_eq!(done.len(), 20);
        let entry = catalog.get(&key("i-9-9900-k")).unwrap().unwrap();
        assert_eq!(entry.integer(CanonicalField::CoreCount), Some(19));
        assert_eq!(entry.revision, 20);
    }

    /// Holds every write until the gate's sender is dropped.
    struct GatedCatalog {
        inner: InMemoryCatalog,
        gate: Receiver<()>,
    }

    impl Catalog for GatedCatalog {
        fn get(&self, key: &CatalogKey) -> Result<Option<crate::catalog::CatalogEntry>, StorageError> {
            self.inner.get(key)
        }

        fn upsert_with(
            &self,
            key: &CatalogKey,
            update: &mut crate::catalog::EntryUpdate<'_>,
        ) -> Result<bool, StorageError> {
            let _ = self.gate.recv();
            self.inner.upsert_with(key, update)
        }

        fn keys(&self) -> Result<Vec<CatalogKey>, StorageError> {
            self.inner.keys()
        }

        fn entries(&self) -> Result<Vec<crate::catalog::CatalogEntry>, StorageError> {
            self.inner.entries()
        }
    }

    #[test]
    fn try_submit_reports_a_full_queue() {
        let (release, gate) = bounded::<()>(0);
        let catalog = Arc::new(GatedCatalog {
            inner: InMemoryCatalog::new(),
            gate,
        });
        let rt = MergeRuntime::start(
            MergeRuntimeConfig {
                workers: 1,
                queue_capacity: 1,
            },
            Arc::new(MergeEngine::default()),
            catalog.clone(),
        )
        .unwrap();

        // The worker blocks on the first record; the second fills the queue.
        rt.submit(key("i-3-530"), record("i-3-530", 2)).unwrap();
        rt.submit(key("i-5-750"), record("i-5-750", 4)).unwrap();
        assert!(matches!(
            rt.try_submit(key("i-7-920"), record("i-7-920", 4)),
            Err(RuntimeError::QueueFull { shard: 0, capacity: 1 })
        ));

        drop(release);
        assert_eq!(rt.finish().len(), 2);
        assert_eq!(catalog.len().unwrap(), 2);
    }

    #[test]
    fn zero_sizes_are_clamped() {
        let rt = runtime(0, 0, Arc::new(InMemoryCatalog::new()));
        assert_eq!(rt.shard_count(), 1);
        rt.submit(key("i-3-530"), record("i-3-530", 2)).unwrap();
        assert_eq!(rt.finish().len(), 1);
    }
}
