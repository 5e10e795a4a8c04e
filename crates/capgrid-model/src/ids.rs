//! Identifier newtypes
//!
//! Resources, projects and allocations are keyed by numeric ids owned by
//! the external record store. Newtypes keep them from being mixed up at
//! call sites.

use serde::{Deserialize, Serialize};

/// Unique resource (person) identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub u64);

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique project identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique allocation identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllocationId(pub u64);

impl std::fmt::Display for AllocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_as_plain_numbers() {
        assert_eq!(ResourceId(7).to_string(), "7");
        assert_eq!(ProjectId(42).to_string(), "42");
        assert_eq!(AllocationId(9001).to_string(), "9001");
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&AllocationId(3)).unwrap();
        assert_eq!(json, "3");

        let back: AllocationId = serde_json::from_str("3").unwrap();
        assert_eq!(back, AllocationId(3));
    }
}
