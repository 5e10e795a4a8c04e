//! Engine facade
//!
//! The single entry point UI and report layers talk to:
//! - Utilization figures for a resource over a span of weeks
//! - Conflict analysis with ranked resolution suggestions
//! - Edit validation and optimistic submission
//! - The edit lifecycle event stream

use crate::conflict::{ConflictAnalysis, ConflictDetector};
use crate::error::EngineError;
use crate::events::SyncEvent;
use crate::store::{AllocationFilter, AllocationStore};
use crate::sync::{FlushStats, OptimisticSyncManager};
use crate::types::{EngineConfig, Utilization};
use crate::validator::{AllocationValidator, EditContext, ValidationIssue, ValidationOutcome};
use capgrid_model::{capacity, Allocation, AllocationId, Project, Resource, ResourceId, WeekKey};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity allocation and conflict engine
///
/// Owns the optimistic sync manager and read-only resource/project
/// directories used for validation context and suggestion messages.
pub struct CapacityEngine {
    config: EngineConfig,
    store: Arc<dyn AllocationStore>,
    sync: OptimisticSyncManager,
    validator: AllocationValidator,
    detector: ConflictDetector,
    resources: RwLock<HashMap<ResourceId, Resource>>,
    projects: RwLock<Vec<Project>>,
}

impl CapacityEngine {
    /// Create an engine over the given store
    #[must_use]
    pub fn new(store: Arc<dyn AllocationStore>, config: EngineConfig) -> Self {
        Self {
            sync: OptimisticSyncManager::new(store.clone(), &config),
            config,
            store,
            validator: AllocationValidator::new(),
            detector: ConflictDetector::new(),
            resources: RwLock::new(HashMap::new()),
            projects: RwLock::new(Vec::new()),
        }
    }

    /// Load allocations, resources and projects from the store
    ///
    /// # Errors
    /// Any store failure during the initial fetches.
    pub async fn load(&self, filter: AllocationFilter) -> Result<(), EngineError> {
        let resources = self.store.list_resources().await?;
        let projects = self.store.list_projects().await?;
        let count = self.sync.refresh(filter).await?;

        *self.resources.write() = resources.into_iter().map(|r| (r.id, r)).collect();
        *self.projects.write() = projects;

        tracing::info!(allocations = count, "engine loaded");
        Ok(())
    }

    /// Utilization of a resource over the given weeks
    ///
    /// Sums the per-week totals of the resource's active allocations and
    /// reports them against effective capacity times the week count.
    #[must_use]
    pub fn compute_utilization(
        &self,
        resource: &Resource,
        allocations: &[Allocation],
        week_keys: &[WeekKey],
    ) -> Utilization {
        let hours: f64 = week_keys
            .iter()
            .map(|&w| capgrid_model::weekly_total(allocations, resource.id, w))
            .sum();
        let span_capacity = resource.effective_capacity() * week_keys.len() as f64;
        Utilization {
            hours,
            percent: capacity::utilization(hours, span_capacity),
        }
    }

    /// Conflict analysis for a resource over the given weeks
    ///
    /// Reads the sync manager's consistent snapshot, so results always
    /// reflect fully-applied optimistic state.
    ///
    /// # Errors
    /// `EngineError::UnknownResource` if the resource was never loaded.
    pub fn detect_conflicts(
        &self,
        resource_id: ResourceId,
        week_keys: &[WeekKey],
    ) -> Result<ConflictAnalysis, EngineError> {
        let resource = self
            .resource(resource_id)
            .ok_or(EngineError::UnknownResource(resource_id))?;
        let allocations = self.sync.allocations();
        let projects = self.projects.read().clone();

        Ok(self.detector.detect(
            resource_id,
            &allocations,
            resource.weekly_capacity,
            resource.non_project_hours,
            week_keys,
            &projects,
        ))
    }

    /// Validate a raw cell input without applying it
    ///
    /// # Errors
    /// `EngineError::UnknownResource` when the allocation's resource is
    /// not loaded, or `SyncError::NotLoaded` for an unknown allocation.
    pub fn validate_edit(
        &self,
        allocation_id: AllocationId,
        week: WeekKey,
        raw_input: &str,
    ) -> Result<Vec<ValidationIssue>, EngineError> {
        Ok(self.validate(allocation_id, week, raw_input)?.issues)
    }

    /// Validate and, if nothing blocks, apply and enqueue an edit
    ///
    /// Capacity warnings do not block; the edit is applied optimistically
    /// and the warnings are returned alongside the sequence number.
    /// Persistence happens on the next [`Self::sync`] call.
    ///
    /// # Errors
    /// - `SyncError::Rejected` for format/range failures (nothing applied)
    /// - `EngineError::UnknownResource` / `SyncError::NotLoaded` for
    ///   unknown ids
    pub fn submit_edit(
        &self,
        allocation_id: AllocationId,
        week: WeekKey,
        raw_input: &str,
    ) -> Result<Vec<ValidationIssue>, EngineError> {
        let outcome = self.validate(allocation_id, week, raw_input)?;
        if outcome.is_blocked() {
            return Err(crate::error::SyncError::Rejected(outcome.issues).into());
        }
        let hours = outcome
            .hours
            .ok_or_else(|| crate::error::SyncError::Rejected(outcome.issues.clone()))?;

        self.sync
            .submit(allocation_id, week, hours)
            .map_err(EngineError::from)?;
        Ok(outcome.issues)
    }

    /// Flush queued persist actions to the store
    pub async fn sync(&self) -> FlushStats {
        self.sync.flush().await
    }

    /// Subscribe to edit lifecycle events
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sync.subscribe()
    }

    /// Consistent snapshot of the current allocation state
    #[inline]
    #[must_use]
    pub fn allocations(&self) -> Vec<Allocation> {
        self.sync.allocations()
    }

    /// Loaded resource record
    #[must_use]
    pub fn resource(&self, id: ResourceId) -> Option<Resource> {
        self.resources.read().get(&id).cloned()
    }

    /// Direct access to the sync manager
    #[inline]
    #[must_use]
    pub fn sync_manager(&self) -> &OptimisticSyncManager {
        &self.sync
    }

    /// Engine configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn validate(
        &self,
        allocation_id: AllocationId,
        week: WeekKey,
        raw_input: &str,
    ) -> Result<ValidationOutcome, EngineError> {
        let allocation = self
            .sync
            .allocation(allocation_id)
            .ok_or(crate::error::SyncError::NotLoaded(allocation_id))?;
        let resource = self
            .resource(allocation.resource_id)
            .ok_or(EngineError::UnknownResource(allocation.resource_id))?;
        let allocations = self.sync.allocations();

        Ok(self.validator.validate(
            raw_input,
            &EditContext {
                allocation_id,
                resource: &resource,
                week,
                allocations: &allocations,
            },
        ))
    }
}

impl std::fmt::Debug for CapacityEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapacityEngine")
            .field("config", &self.config)
            .field("sync", &self.sync)
            .finish_non_exhaustive()
    }
}
