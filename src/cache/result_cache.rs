//! Result cache with single-writer discipline
//!
//! The orchestrating [`ResultCache`] is the only handle that writes to the
//! store. Handles given to workers via [`ResultCache::worker`] queue their
//! writes on a channel instead; the orchestrator commits the queue on
//! [`ResultCache::sync`]. Writes that fail are kept and retried on the next
//! sync.
//!
//! Caching is bypassed for task 0 (ad-hoc runs), for non-empty parameter
//! sets (parameters are not part of the key), and for contexts without a
//! stable identity. Store failures never surface: a failed read is a miss.

use crate::cache::key::CacheKey;
use crate::cache::store::{CacheStore, MemoryStore};
use crate::computation::TrialResult;
use crate::context::BuildContext;
use crate::params::{ParameterSet, Task};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

type PendingWrite = (CacheKey, TrialResult);

struct PendingWrites {
    tx: mpsc::UnboundedSender<PendingWrite>,
    rx: Mutex<mpsc::UnboundedReceiver<PendingWrite>>,
    retry: Mutex<Vec<PendingWrite>>,
}

#[derive(Clone)]
enum CacheRole {
    Primary(Arc<PendingWrites>),
    Worker(mpsc::UnboundedSender<PendingWrite>),
}

/// Best-effort cache of trial results keyed by build identity and task
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    enabled: bool,
    role: CacheRole,
}

impl ResultCache {
    /// Orchestrator handle over `store`
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            store,
            enabled: true,
            role: CacheRole::Primary(Arc::new(PendingWrites {
                tx,
                rx: Mutex::new(rx),
                retry: Mutex::new(Vec::new()),
            })),
        }
    }

    /// A cache that never hits and never stores
    pub fn disabled() -> Self {
        Self::new(Arc::new(MemoryStore::new())).with_enabled(false)
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether this handle writes to the store directly
    pub fn is_primary(&self) -> bool {
        matches!(self.role, CacheRole::Primary(_))
    }

    /// Handle for a worker: reads from the shared store, defers writes
    pub fn worker(&self) -> Self {
        let tx = match &self.role {
            CacheRole::Primary(pending) => pending.tx.clone(),
            CacheRole::Worker(tx) => tx.clone(),
        };
        Self {
            store: Arc::clone(&self.store),
            enabled: self.enabled,
            role: CacheRole::Worker(tx),
        }
    }

    /// Key for a lookup, or `None` when the policy bypasses caching
    pub fn key_for(
        &self,
        context: &BuildContext,
        task: Task,
        params: &ParameterSet,
    ) -> Option<CacheKey> {
        if !self.enabled || !params.is_empty() || task == 0 {
            return None;
        }
        CacheKey::derive(context, task)
    }

    /// Previously computed result, if any
    pub fn get(
        &self,
        context: &BuildContext,
        task: Task,
        params: &ParameterSet,
    ) -> Option<TrialResult> {
        let key = self.key_for(context, task, params)?;
        match self.store.get(key.as_str()) {
            Ok(Some(result)) => {
                debug!("Cache hit for {}", key);
                Some(result)
            }
            Ok(None) => {
                debug!("Cache miss for {}", key);
                None
            }
            Err(e) => {
                debug!("Treating unreadable cache entry {} as a miss: {}", key, e);
                None
            }
        }
    }

    /// Record a result and hand it back unchanged
    pub fn put(
        &self,
        context: &BuildContext,
        task: Task,
        params: &ParameterSet,
        result: TrialResult,
    ) -> TrialResult {
        let Some(key) = self.key_for(context, task, params) else {
            return result;
        };

        match &self.role {
            CacheRole::Primary(pending) => {
                if let Err(e) = self.store.put(key.as_str(), &result) {
                    warn!("Deferring cache write for {}: {}", key, e);
                    pending.retry.lock().push((key, result.clone()));
                }
            }
            CacheRole::Worker(tx) => {
                if tx.send((key, result.clone())).is_err() {
                    warn!("Dropping cache write: orchestrator cache is gone");
                }
            }
        }
        result
    }

    /// Commit queued worker writes and flush the store.
    ///
    /// Returns the number of entries committed. A no-op on worker handles.
    pub fn sync(&self) -> usize {
        let CacheRole::Primary(pending) = &self.role else {
            return 0;
        };

        let mut writes = std::mem::take(&mut *pending.retry.lock());
        {
            let mut rx = pending.rx.lock();
            while let Ok(write) = rx.try_recv() {
                writes.push(write);
            }
        }

        let mut committed = 0;
        let mut failed = Vec::new();
        for (key, result) in writes {
            match self.store.put(key.as_str(), &result) {
                Ok(()) => committed += 1,
                Err(e) => {
                    warn!("Cache write for {} failed, retrying at next sync: {}", key, e);
                    failed.push((key, result));
                }
            }
        }
        pending.retry.lock().extend(failed);

        if let Err(e) = self.store.sync() {
            warn!("Cache sync failed, retrying at next sync: {}", e);
        }

        committed
    }

    /// Writes waiting for a successful commit
    pub fn pending_retries(&self) -> usize {
        match &self.role {
            CacheRole::Primary(pending) => pending.retry.lock().len(),
            CacheRole::Worker(_) => 0,
        }
    }
}
