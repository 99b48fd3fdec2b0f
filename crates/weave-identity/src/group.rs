//! Fabric/group binding.
//!
//! Each identity is scoped to exactly one group id. Uniqueness across
//! fabrics is the caller-side registry's policy; this component only
//! requires a well-formed string.

use std::fmt;

use crate::error::{IdentityError, Result};

/// Group id assigned when a commissioner manages a single fabric and does
/// not name one explicitly.
pub const DEFAULT_GROUP_ID: &str = "fabric.default";

/// Identifier scoping a fabric identity to one group.
///
/// Immutable after construction. Distinct fabrics require distinct
/// `FabricIdentity` instances, each carrying its own `GroupId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupId(String);

impl GroupId {
    /// Validate and wrap a group id string.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::GroupId` if the string is empty or only
    /// whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(IdentityError::GroupId(
                "group id must be a non-empty string".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// The default group id for single-fabric use.
    #[must_use]
    pub fn default_group() -> Self {
        Self(DEFAULT_GROUP_ID.to_string())
    }

    /// The group id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
