//! CapGrid Model - data model and capacity math
//!
//! The pure foundation of the capacity engine:
//! - Record types for resources, projects and allocations
//! - Monday-anchored week keys and grid column generation
//! - Effective capacity, utilization and distribution math
//!
//! Everything in this crate is synchronous and side-effect free; the
//! stateful editing machinery lives in `capgrid-engine`.
//!
//! # Example
//!
//! ```rust
//! use capgrid_model::{capacity, Resource, ResourceId};
//!
//! let resource = Resource::new(ResourceId(1), "Dana").with_weekly_capacity(40.0);
//! assert_eq!(resource.effective_capacity(), 32.0);
//!
//! let percent = capacity::utilization(25.5, resource.effective_capacity());
//! assert_eq!(percent, 79.7);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod allocation;
pub mod capacity;
pub mod error;
pub mod ids;
pub mod project;
pub mod resource;
pub mod week;

// Re-exports for convenience
pub use allocation::{Allocation, AllocationStatus, MAX_WEEK_HOURS};
pub use capacity::DEFAULT_NON_PROJECT_HOURS;
pub use error::ModelError;
pub use ids::{AllocationId, ProjectId, ResourceId};
pub use project::{Project, ProjectPriority, ProjectStatus};
pub use resource::Resource;
pub use week::{generate_week_columns, weekly_total, WeekColumn, WeekKey};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the CapGrid model
    pub use crate::{
        Allocation, AllocationId, AllocationStatus, ModelError, Project, ProjectId,
        ProjectPriority, Resource, ResourceId, WeekColumn, WeekKey,
    };
}
