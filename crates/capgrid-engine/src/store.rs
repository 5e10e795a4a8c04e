//! Record-store collaborator interface
//!
//! The engine never persists anything itself; it talks to an external
//! key-value record store through [`AllocationStore`]. The in-memory
//! implementation backs the tests and supports scripted failure injection
//! so retry and rollback paths can be exercised deterministically.

use crate::error::StoreError;
use async_trait::async_trait;
use capgrid_model::{Allocation, AllocationId, Project, ProjectId, Resource, ResourceId, WeekKey};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Filter for allocation lookups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationFilter {
    /// Restrict to one resource
    pub resource_id: Option<ResourceId>,
    /// Restrict to one project
    pub project_id: Option<ProjectId>,
}

impl AllocationFilter {
    /// Match all allocations
    #[inline]
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a resource
    #[inline]
    #[must_use]
    pub fn for_resource(resource_id: ResourceId) -> Self {
        Self {
            resource_id: Some(resource_id),
            project_id: None,
        }
    }

    /// Restrict to a project
    #[inline]
    #[must_use]
    pub fn for_project(project_id: ProjectId) -> Self {
        Self {
            resource_id: None,
            project_id: Some(project_id),
        }
    }

    /// Whether an allocation passes this filter
    #[must_use]
    pub fn matches(&self, allocation: &Allocation) -> bool {
        self.resource_id
            .map_or(true, |r| allocation.resource_id == r)
            && self.project_id.map_or(true, |p| allocation.project_id == p)
    }
}

/// External record store the engine persists through
#[async_trait]
pub trait AllocationStore: Send + Sync {
    /// Fetch allocations matching a filter
    async fn get_allocations(
        &self,
        filter: AllocationFilter,
    ) -> Result<Vec<Allocation>, StoreError>;

    /// Replace one week cell of one allocation, returning the fresh record
    ///
    /// # Errors
    /// - `StoreError::NotFound` if the allocation id is unknown
    /// - `StoreError::Conflict` if the record was concurrently deleted
    async fn upsert_allocation_week(
        &self,
        allocation_id: AllocationId,
        week: WeekKey,
        hours: f64,
    ) -> Result<Allocation, StoreError>;

    /// Read-only resource lookup for names and capacities
    async fn list_resources(&self) -> Result<Vec<Resource>, StoreError>;

    /// Read-only project lookup for names and priorities
    async fn list_projects(&self) -> Result<Vec<Project>, StoreError>;
}

/// In-memory [`AllocationStore`] with scripted failure injection
///
/// Each queued failure is consumed by the next `upsert_allocation_week`
/// call, which lets tests script sequences like "fail twice, then
/// succeed" to exercise the retry budget.
#[derive(Debug, Default)]
pub struct MemoryStore {
    allocations: DashMap<AllocationId, Allocation>,
    resources: DashMap<ResourceId, Resource>,
    projects: DashMap<ProjectId, Project>,
    upsert_failures: Mutex<VecDeque<StoreError>>,
    upsert_count: Mutex<u64>,
}

impl MemoryStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an allocation record
    pub fn insert_allocation(&self, allocation: Allocation) {
        self.allocations.insert(allocation.id, allocation);
    }

    /// Seed a resource record
    pub fn insert_resource(&self, resource: Resource) {
        self.resources.insert(resource.id, resource);
    }

    /// Seed a project record
    pub fn insert_project(&self, project: Project) {
        self.projects.insert(project.id, project);
    }

    /// Delete an allocation, as a concurrent remote actor would
    pub fn remove_allocation(&self, id: AllocationId) {
        self.allocations.remove(&id);
    }

    /// Queue `times` copies of `error` for upcoming upsert calls
    pub fn fail_next_upserts(&self, error: StoreError, times: usize) {
        let mut failures = self.upsert_failures.lock();
        for _ in 0..times {
            failures.push_back(error.clone());
        }
    }

    /// Number of upsert calls that reached the store (including failures)
    #[must_use]
    pub fn upsert_count(&self) -> u64 {
        *self.upsert_count.lock()
    }
}

#[async_trait]
impl AllocationStore for MemoryStore {
    async fn get_allocations(
        &self,
        filter: AllocationFilter,
    ) -> Result<Vec<Allocation>, StoreError> {
        let mut result: Vec<Allocation> = self
            .allocations
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        result.sort_by_key(|a| a.id);
        Ok(result)
    }

    async fn upsert_allocation_week(
        &self,
        allocation_id: AllocationId,
        week: WeekKey,
        hours: f64,
    ) -> Result<Allocation, StoreError> {
        *self.upsert_count.lock() += 1;

        if let Some(error) = self.upsert_failures.lock().pop_front() {
            return Err(error);
        }

        let mut entry = self
            .allocations
            .get_mut(&allocation_id)
            .ok_or(StoreError::NotFound(allocation_id))?;
        entry
            .set_week_hours(week, hours)
            .map_err(|e| StoreError::Rejected(e.to_string()))?;
        Ok(entry.clone())
    }

    async fn list_resources(&self) -> Result<Vec<Resource>, StoreError> {
        let mut result: Vec<Resource> =
            self.resources.iter().map(|e| e.value().clone()).collect();
        result.sort_by_key(|r| r.id);
        Ok(result)
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let mut result: Vec<Project> = self.projects.iter().map(|e| e.value().clone()).collect();
        result.sort_by_key(|p| p.id);
        Ok(result)
    }
}
