//! Sticky execution cache.
//!
//! A bounded LRU mapping `(workflow_id, run_id)` to a live workflow
//! execution so a worker that already holds the reconstructed state can
//! skip full-history replay. This is the only mutable state shared across
//! workflows in the process. Entries are locked for the duration of a
//! decision task; eviction of a mid-task entry blocks until the task
//! finishes.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use windlass_core::types::WorkflowExecution;

use crate::event_handler::WorkflowEventHandler;

/// Cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkflowExecutionKey {
    pub workflow_id: String,
    pub run_id: String,
}

impl From<&WorkflowExecution> for WorkflowExecutionKey {
    fn from(execution: &WorkflowExecution) -> Self {
        Self {
            workflow_id: execution.workflow_id.clone(),
            run_id: execution.run_id.clone(),
        }
    }
}

/// A cached execution: the event handler holding all reconstructed state,
/// plus the high-water mark of applied history.
pub struct CachedExecution {
    pub handler: WorkflowEventHandler,
    pub last_processed_event_id: i64,
}

struct CacheInner {
    entries: HashMap<WorkflowExecutionKey, Arc<Mutex<CachedExecution>>>,
    lru: VecDeque<WorkflowExecutionKey>,
}

/// Bounded LRU of workflow executions.
pub struct WorkflowCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl WorkflowCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                lru: VecDeque::new(),
            }),
        }
    }

    /// Capacity from process configuration.
    pub fn with_configured_capacity() -> Self {
        Self::new(windlass_core::process::sticky_workflow_cache_size())
    }

    pub fn get(&self, key: &WorkflowExecutionKey) -> Option<Arc<Mutex<CachedExecution>>> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = inner.entries.get(key).cloned()?;
        if let Some(pos) = inner.lru.iter().position(|k| k == key) {
            inner.lru.remove(pos);
        }
        inner.lru.push_back(key.clone());
        Some(entry)
    }

    /// Insert or refresh an entry, evicting the least recently used
    /// entries over capacity. Locking the victim first means a mid-task
    /// entry blocks eviction until its task completes.
    pub fn insert(&self, key: WorkflowExecutionKey, entry: Arc<Mutex<CachedExecution>>) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.entries.insert(key.clone(), entry).is_none() {
            inner.lru.push_back(key.clone());
        } else if let Some(pos) = inner.lru.iter().position(|k| k == &key) {
            inner.lru.remove(pos);
            inner.lru.push_back(key.clone());
        }

        while inner.entries.len() > self.capacity {
            let Some(victim_key) = inner.lru.iter().find(|k| **k != key).cloned() else {
                break;
            };
            if let Some(victim) = inner.entries.remove(&victim_key) {
                let _task_done = victim.lock().unwrap_or_else(PoisonError::into_inner);
            }
            inner.lru.retain(|k| k != &victim_key);
            tracing::debug!(workflow_id = %victim_key.workflow_id, "evicted workflow from sticky cache");
        }
    }

    pub fn remove(&self, key: &WorkflowExecutionKey) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.entries.remove(key);
        inner.lru.retain(|k| k != key);
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::WorkerOptions;
    use crate::registry::Registry;
    use windlass_core::types::{WorkflowInfo, WorkflowType};
    use windlass_core::WorkflowExecution;

    fn entry(workflow_id: &str) -> Arc<Mutex<CachedExecution>> {
        let info = WorkflowInfo {
            workflow_execution: WorkflowExecution::new(workflow_id, "run"),
            workflow_type: WorkflowType { name: "T".into() },
            task_list: "tl".into(),
            domain: "d".into(),
            execution_start_to_close_timeout: std::time::Duration::from_secs(60),
            task_start_to_close_timeout: std::time::Duration::from_secs(10),
            attempt: 1,
            continued_execution_run_id: None,
            parent_workflow_execution: None,
            cron_schedule: None,
            memo: None,
            search_attributes: None,
        };
        Arc::new(Mutex::new(CachedExecution {
            handler: WorkflowEventHandler::new(
                info,
                Arc::new(Registry::new()),
                &WorkerOptions::default(),
            ),
            last_processed_event_id: 0,
        }))
    }

    fn key(workflow_id: &str) -> WorkflowExecutionKey {
        WorkflowExecutionKey {
            workflow_id: workflow_id.into(),
            run_id: "run".into(),
        }
    }

    #[test]
    fn get_returns_inserted_entry() {
        let cache = WorkflowCache::new(4);
        cache.insert(key("a"), entry("a"));
        assert!(cache.get(&key("a")).is_some());
        assert!(cache.get(&key("b")).is_none());
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = WorkflowCache::new(2);
        cache.insert(key("a"), entry("a"));
        cache.insert(key("b"), entry("b"));

        // Touch "a" so "b" becomes the LRU victim.
        cache.get(&key("a"));
        cache.insert(key("c"), entry("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("a")).is_some());
        assert!(cache.get(&key("b")).is_none());
        assert!(cache.get(&key("c")).is_some());
    }

    #[test]
    fn remove_drops_entry() {
        let cache = WorkflowCache::new(2);
        cache.insert(key("a"), entry("a"));
        cache.remove(&key("a"));
        assert!(cache.is_empty());
    }

    #[test]
    fn reinsert_refreshes_recency() {
        let cache = WorkflowCache::new(2);
        cache.insert(key("a"), entry("a"));
        cache.insert(key("b"), entry("b"));
        cache.insert(key("a"), entry("a"));
        cache.insert(key("c"), entry("c"));

        assert!(cache.get(&key("a")).is_some());
        assert!(cache.get(&key("b")).is_none());
    }
}
