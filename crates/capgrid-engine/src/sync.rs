//! Optimistic edit application and store synchronization
//!
//! Owns the local allocation state while edits are outstanding. Accepted
//! edits are applied immediately, queued for persistence and later either
//! confirmed or rolled back:
//!
//! ```text
//! submit -> Applied(optimistic) -> Persisting -> Confirmed
//!                                            \-> RolledBack (budget spent)
//! ```
//!
//! Every edit gets a monotonically increasing sequence number. A persist
//! completing out of order checks its number against the cell's current
//! one; a stale success is discarded silently instead of clobbering a
//! newer optimistic value.

use crate::error::{StoreError, SyncError};
use crate::events::{EventBus, SyncEvent};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::store::{AllocationFilter, AllocationStore};
use crate::types::{CellKey, EngineConfig};
use capgrid_model::{Allocation, AllocationId, WeekKey};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A queued write for one cell
#[derive(Debug, Clone, Copy, PartialEq)]
struct PersistAction {
    cell: CellKey,
    seq: u64,
    hours: f64,
    attempts: u32,
}

/// Bookkeeping for a cell with an unconfirmed edit
///
/// `previous_hours` is the last value the store confirmed. A superseding
/// edit keeps the original snapshot so rollback always lands on known-good
/// ground, never on an in-flight value.
#[derive(Debug, Clone, Copy)]
struct PendingEdit {
    seq: u64,
    previous_hours: f64,
    hours: f64,
}

/// Counters for one `flush` pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Persists confirmed by the store
    pub confirmed: usize,
    /// Edits rolled back after definitive failure
    pub rolled_back: usize,
    /// Stale actions discarded by the sequence check
    pub stale_skipped: usize,
    /// Actions requeued for another attempt
    pub retried: usize,
}

/// Applies edits optimistically and reconciles them with the store
pub struct OptimisticSyncManager {
    store: Arc<dyn AllocationStore>,
    policy: RetryPolicy,
    batch_size: usize,
    bus: EventBus,
    local: RwLock<HashMap<AllocationId, Allocation>>,
    pending: DashMap<CellKey, PendingEdit>,
    failed: DashMap<CellKey, String>,
    queue: Mutex<VecDeque<PersistAction>>,
    next_seq: AtomicU64,
}

impl OptimisticSyncManager {
    /// Create a manager over the given store
    #[must_use]
    pub fn new(store: Arc<dyn AllocationStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            policy: RetryPolicy::new(config.retry_budget, config.persist_timeout),
            batch_size: config.batch_size.max(1),
            bus: EventBus::new(config.event_capacity),
            local: RwLock::new(HashMap::new()),
            pending: DashMap::new(),
            failed: DashMap::new(),
            queue: Mutex::new(VecDeque::new()),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Subscribe to edit lifecycle events
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SyncEvent> {
        self.bus.subscribe()
    }

    /// Prime or refresh local state from the store
    ///
    /// Server values win for every cell without a pending edit; cells with
    /// in-flight edits keep their optimistic value. Safe to call while
    /// edits are outstanding.
    pub async fn refresh(&self, filter: AllocationFilter) -> Result<usize, SyncError> {
        let fresh = self.store.get_allocations(filter).await?;
        let count = fresh.len();

        let mut local = self.local.write();
        for server in fresh {
            let id = server.id;
            let merged = self.overlay_pending(server);
            local.insert(id, merged);
        }
        tracing::info!(count, "refreshed allocations from store");
        Ok(count)
    }

    /// Snapshot of the current (fully-applied optimistic) allocation state
    ///
    /// This is the view utilization and conflict math read; it is never an
    /// interleaving of a partially applied edit.
    #[must_use]
    pub fn allocations(&self) -> Vec<Allocation> {
        let local = self.local.read();
        let mut all: Vec<Allocation> = local.values().cloned().collect();
        all.sort_by_key(|a| a.id);
        all
    }

    /// One allocation by id
    #[must_use]
    pub fn allocation(&self, id: AllocationId) -> Option<Allocation> {
        self.local.read().get(&id).cloned()
    }

    /// Displayed value of one cell
    #[must_use]
    pub fn cell_value(&self, cell: CellKey) -> Option<f64> {
        self.local
            .read()
            .get(&cell.allocation_id)
            .map(|a| a.week_hours_for(cell.week))
    }

    /// Number of cells with unconfirmed edits
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Failure message for a cell whose last persist was rolled back
    #[must_use]
    pub fn failure_for(&self, cell: CellKey) -> Option<String> {
        self.failed.get(&cell).map(|e| e.value().clone())
    }

    /// Apply a validated edit optimistically and queue it for persistence
    ///
    /// Returns the edit's sequence number. A newer edit to a cell that is
    /// still persisting supersedes the in-flight one: it inherits the
    /// original pre-edit snapshot, and the old persist's eventual result
    /// is ignored by the sequence check.
    ///
    /// # Errors
    /// - `SyncError::NotLoaded` if the allocation is not in local state
    /// - `SyncError::Model` if the hours violate the cell range
    pub fn submit(
        &self,
        allocation_id: AllocationId,
        week: WeekKey,
        hours: f64,
    ) -> Result<u64, SyncError> {
        let cell = CellKey::new(allocation_id, week);
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        {
            let mut local = self.local.write();
            let allocation = local
                .get_mut(&allocation_id)
                .ok_or(SyncError::NotLoaded(allocation_id))?;
            let current = allocation.week_hours_for(week);
            allocation.set_week_hours(week, hours)?;

            self.pending
                .entry(cell)
                .and_modify(|p| {
                    // Supersede: keep the original snapshot
                    p.seq = seq;
                    p.hours = hours;
                })
                .or_insert(PendingEdit {
                    seq,
                    previous_hours: current,
                    hours,
                });
        }

        // A fresh edit clears the cell's failure marker
        self.failed.remove(&cell);

        self.queue.lock().push_back(PersistAction {
            cell,
            seq,
            hours,
            attempts: 0,
        });

        tracing::debug!(cell = %cell, seq, hours, "edit applied optimistically");
        self.bus.emit(SyncEvent::Applied { cell, seq, hours });
        Ok(seq)
    }

    /// Drain the persist queue until empty
    ///
    /// Actions are processed in batches. A retryable failure requeues the
    /// failed action (attempt counter bumped) and the rest of its batch at
    /// the front of the queue; once the budget is spent the edit is rolled
    /// back. Local edits remain possible throughout because no lock is
    /// held across a store call.
    pub async fn flush(&self) -> FlushStats {
        let mut stats = FlushStats::default();

        loop {
            let batch = self.take_batch();
            if batch.is_empty() {
                break;
            }

            let mut batch = VecDeque::from(batch);
            while let Some(action) = batch.pop_front() {
                // Superseded while queued: drop without a store call
                if !self.is_current(&action) {
                    tracing::debug!(cell = %action.cell, seq = action.seq, "stale action skipped");
                    stats.stale_skipped += 1;
                    continue;
                }

                let attempt = action.attempts + 1;
                let result = self
                    .policy
                    .run_with_timeout(self.store.upsert_allocation_week(
                        action.cell.allocation_id,
                        action.cell.week,
                        action.hours,
                    ))
                    .await;

                match result {
                    Ok(server_allocation) => {
                        if self.confirm(&action, server_allocation) {
                            stats.confirmed += 1;
                        } else {
                            stats.stale_skipped += 1;
                        }
                    }
                    Err(error) => match self.policy.decide(attempt, &error) {
                        RetryDecision::Retry => {
                            tracing::warn!(
                                cell = %action.cell,
                                attempt,
                                %error,
                                "persist failed, requeueing"
                            );
                            stats.retried += 1;
                            // Failed action first, then the rest of the
                            // batch, all back at the front
                            let mut queue = self.queue.lock();
                            for leftover in batch.drain(..).rev() {
                                queue.push_front(leftover);
                            }
                            queue.push_front(PersistAction {
                                attempts: attempt,
                                ..action
                            });
                            break;
                        }
                        RetryDecision::GiveUp => {
                            self.rollback(&action, attempt, &error);
                            stats.rolled_back += 1;
                        }
                    },
                }
            }
        }

        stats
    }

    /// First unprocessed batch, up to `batch_size` actions
    fn take_batch(&self) -> Vec<PersistAction> {
        let mut queue = self.queue.lock();
        let n = self.batch_size.min(queue.len());
        queue.drain(..n).collect()
    }

    /// Whether an action still represents its cell's newest edit
    fn is_current(&self, action: &PersistAction) -> bool {
        self.pending
            .get(&action.cell)
            .is_some_and(|p| p.seq == action.seq)
    }

    /// Handle a successful persist; false means the success was stale
    fn confirm(&self, action: &PersistAction, server: Allocation) -> bool {
        if !self.is_current(action) {
            // A newer edit took over the cell while this one was in
            // flight; its write must not surface (StaleWriteError).
            tracing::debug!(cell = %action.cell, seq = action.seq, "stale success discarded");
            return false;
        }
        self.pending.remove(&action.cell);

        // Reconcile server-side recomputation without touching cells that
        // acquired newer pending edits in the meantime.
        let id = server.id;
        let merged = self.overlay_pending(server);
        self.local.write().insert(id, merged);

        tracing::debug!(cell = %action.cell, seq = action.seq, "edit confirmed");
        self.bus.emit(SyncEvent::Confirmed {
            cell: action.cell,
            seq: action.seq,
            hours: action.hours,
        });
        true
    }

    /// Restore the snapshot after a definitive failure
    fn rollback(&self, action: &PersistAction, attempts: u32, error: &StoreError) {
        if !self.is_current(action) {
            tracing::debug!(cell = %action.cell, seq = action.seq, "stale failure ignored");
            return;
        }
        let Some((_, pending)) = self.pending.remove(&action.cell) else {
            return;
        };

        {
            let mut local = self.local.write();
            if let Some(allocation) = local.get_mut(&action.cell.allocation_id) {
                // The snapshot passed validation when it was taken
                let _ = allocation.set_week_hours(action.cell.week, pending.previous_hours);
            }
        }

        let reason = SyncError::PersistFailed {
            cell: action.cell,
            attempts,
            source: error.clone(),
        }
        .to_string();
        tracing::warn!(cell = %action.cell, seq = action.seq, %error, "edit rolled back");
        self.failed.insert(action.cell, reason.clone());

        self.bus.emit(SyncEvent::RolledBack {
            cell: action.cell,
            seq: action.seq,
            restored_hours: pending.previous_hours,
        });
        self.bus.emit(SyncEvent::Failed {
            cell: action.cell,
            seq: action.seq,
            reason,
        });
    }

    /// Overlay pending optimistic values onto a server-fresh record
    fn overlay_pending(&self, mut server: Allocation) -> Allocation {
        let id = server.id;
        for entry in &self.pending {
            let cell = *entry.key();
            if cell.allocation_id == id {
                let _ = server.set_week_hours(cell.week, entry.value().hours);
            }
        }
        server
    }
}

impl std::fmt::Debug for OptimisticSyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimisticSyncManager")
            .field("batch_size", &self.batch_size)
            .field("pending", &self.pending.len())
            .field("queued", &self.queue.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use capgrid_model::{ProjectId, ResourceId};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn week() -> WeekKey {
        WeekKey::parse("2025-03-03").unwrap()
    }

    async fn manager_with_allocation() -> (Arc<MemoryStore>, OptimisticSyncManager) {
        let store = Arc::new(MemoryStore::new());
        let mut allocation = Allocation::new(
            AllocationId(1),
            ProjectId(10),
            ResourceId(1),
            date(2025, 1, 1),
            date(2025, 6, 30),
        );
        allocation.set_week_hours(week(), 20.0).unwrap();
        store.insert_allocation(allocation);

        let manager = OptimisticSyncManager::new(store.clone(), &EngineConfig::default());
        manager.refresh(AllocationFilter::all()).await.unwrap();
        (store, manager)
    }

    #[tokio::test]
    async fn submit_applies_immediately() {
        let (_store, manager) = manager_with_allocation().await;
        let cell = CellKey::new(AllocationId(1), week());

        manager.submit(AllocationId(1), week(), 25.5).unwrap();
        assert_eq!(manager.cell_value(cell), Some(25.5));
        assert_eq!(manager.pending_count(), 1);
    }

    #[tokio::test]
    async fn flush_confirms_and_clears_pending() {
        let (store, manager) = manager_with_allocation().await;

        manager.submit(AllocationId(1), week(), 25.5).unwrap();
        let stats = manager.flush().await;

        assert_eq!(stats.confirmed, 1);
        assert_eq!(manager.pending_count(), 0);
        let stored = store
            .get_allocations(AllocationFilter::all())
            .await
            .unwrap();
        assert_eq!(stored[0].week_hours_for(week()), 25.5);
    }

    #[tokio::test]
    async fn submit_to_unloaded_allocation_fails() {
        let (_store, manager) = manager_with_allocation().await;
        let err = manager.submit(AllocationId(99), week(), 5.0).unwrap_err();
        assert!(matches!(err, SyncError::NotLoaded(AllocationId(99))));
    }

    #[tokio::test]
    async fn retry_budget_exhaustion_rolls_back() {
        let (store, manager) = manager_with_allocation().await;
        let cell = CellKey::new(AllocationId(1), week());
        store.fail_next_upserts(StoreError::Unavailable("down".into()), 10);

        let mut events = manager.subscribe();
        manager.submit(AllocationId(1), week(), 25.5).unwrap();
        let stats = manager.flush().await;

        assert_eq!(stats.rolled_back, 1);
        assert_eq!(stats.retried, 2); // attempts 1 and 2 requeued, 3rd gave up
        assert_eq!(manager.cell_value(cell), Some(20.0));
        assert!(manager.failure_for(cell).is_some());

        // Applied, RolledBack, Failed - exactly once each
        assert!(matches!(events.recv().await.unwrap(), SyncEvent::Applied { .. }));
        assert!(matches!(
            events.recv().await.unwrap(),
            SyncEvent::RolledBack { restored_hours, .. } if restored_hours == 20.0
        ));
        assert!(matches!(events.recv().await.unwrap(), SyncEvent::Failed { .. }));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn transient_failure_recovers_within_budget() {
        let (store, manager) = manager_with_allocation().await;
        store.fail_next_upserts(StoreError::Unavailable("blip".into()), 2);

        manager.submit(AllocationId(1), week(), 25.5).unwrap();
        let stats = manager.flush().await;

        assert_eq!(stats.confirmed, 1);
        assert_eq!(stats.retried, 2);
        assert_eq!(stats.rolled_back, 0);
    }

    #[tokio::test]
    async fn non_retryable_failure_rolls_back_without_retry() {
        let (store, manager) = manager_with_allocation().await;
        let cell = CellKey::new(AllocationId(1), week());
        store.fail_next_upserts(StoreError::Conflict(AllocationId(1)), 1);

        manager.submit(AllocationId(1), week(), 25.5).unwrap();
        let stats = manager.flush().await;

        assert_eq!(stats.rolled_back, 1);
        assert_eq!(stats.retried, 0);
        assert_eq!(manager.cell_value(cell), Some(20.0));
    }

    #[tokio::test]
    async fn superseding_edit_keeps_original_snapshot() {
        let (store, manager) = manager_with_allocation().await;
        let cell = CellKey::new(AllocationId(1), week());

        // Both edits will fail; rollback must land on 20.0 (the value
        // before edit A), not on 23.0 (edit A's in-flight value).
        store.fail_next_upserts(StoreError::Unavailable("down".into()), 10);
        manager.submit(AllocationId(1), week(), 23.0).unwrap();
        manager.submit(AllocationId(1), week(), 27.0).unwrap();
        assert_eq!(manager.cell_value(cell), Some(27.0));

        manager.flush().await;
        assert_eq!(manager.cell_value(cell), Some(20.0));
    }

    #[tokio::test]
    async fn stale_success_does_not_clobber_newer_edit() {
        let (_store, manager) = manager_with_allocation().await;
        let cell = CellKey::new(AllocationId(1), week());

        // Edit A is queued but not yet flushed when edit B supersedes it.
        manager.submit(AllocationId(1), week(), 23.0).unwrap();
        manager.submit(AllocationId(1), week(), 27.0).unwrap();

        let stats = manager.flush().await;

        // A's action is skipped as stale; only B persists.
        assert_eq!(stats.stale_skipped, 1);
        assert_eq!(stats.confirmed, 1);
        assert_eq!(manager.cell_value(cell), Some(27.0));
    }

    #[tokio::test]
    async fn double_submit_of_same_value_confirms_once() {
        let (store, manager) = manager_with_allocation().await;
        let cell = CellKey::new(AllocationId(1), week());

        manager.submit(AllocationId(1), week(), 25.5).unwrap();
        manager.submit(AllocationId(1), week(), 25.5).unwrap();
        let stats = manager.flush().await;

        assert_eq!(stats.confirmed, 1);
        assert_eq!(stats.stale_skipped, 1);
        assert_eq!(manager.pending_count(), 0);
        assert_eq!(manager.cell_value(cell), Some(25.5));
        // Only the surviving action reached the store
        assert_eq!(store.upsert_count(), 1);
    }

    #[tokio::test]
    async fn refresh_preserves_pending_optimistic_values() {
        let (store, manager) = manager_with_allocation().await;
        let cell = CellKey::new(AllocationId(1), week());

        manager.submit(AllocationId(1), week(), 25.5).unwrap();

        // Server recomputed something else in the meantime
        store
            .upsert_allocation_week(AllocationId(1), week().next(), 8.0)
            .await
            .unwrap();
        manager.refresh(AllocationFilter::all()).await.unwrap();

        // Pending cell keeps its optimistic value; the other cell updates
        assert_eq!(manager.cell_value(cell), Some(25.5));
        assert_eq!(
            manager.cell_value(CellKey::new(AllocationId(1), week().next())),
            Some(8.0)
        );
    }

    #[tokio::test]
    async fn new_submit_clears_previous_failure_marker() {
        let (store, manager) = manager_with_allocation().await;
        let cell = CellKey::new(AllocationId(1), week());

        store.fail_next_upserts(StoreError::Unavailable("down".into()), 10);
        manager.submit(AllocationId(1), week(), 25.5).unwrap();
        manager.flush().await;
        assert!(manager.failure_for(cell).is_some());

        manager.submit(AllocationId(1), week(), 24.0).unwrap();
        assert!(manager.failure_for(cell).is_none());

        let stats = manager.flush().await;
        assert_eq!(stats.confirmed, 1);
        assert_eq!(manager.cell_value(cell), Some(24.0));
    }

    #[tokio::test]
    async fn edits_to_different_cells_are_independent() {
        let (store, manager) = manager_with_allocation().await;
        let mut other = Allocation::new(
            AllocationId(2),
            ProjectId(20),
            ResourceId(1),
            date(2025, 1, 1),
            date(2025, 6, 30),
        );
        other.set_week_hours(week(), 5.0).unwrap();
        store.insert_allocation(other);
        manager.refresh(AllocationFilter::all()).await.unwrap();

        // First upsert fails terminally, second succeeds
        store.fail_next_upserts(StoreError::Conflict(AllocationId(1)), 1);
        manager.submit(AllocationId(1), week(), 25.0).unwrap();
        manager.submit(AllocationId(2), week(), 7.0).unwrap();

        let stats = manager.flush().await;
        assert_eq!(stats.rolled_back, 1);
        assert_eq!(stats.confirmed, 1);
        assert_eq!(
            manager.cell_value(CellKey::new(AllocationId(1), week())),
            Some(20.0)
        );
        assert_eq!(
            manager.cell_value(CellKey::new(AllocationId(2), week())),
            Some(7.0)
        );
    }
}
