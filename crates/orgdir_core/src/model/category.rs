//! Activity category model.
//!
//! # Responsibility
//! - Describe one node of the category forest as an id-addressed row.
//!
//! # Invariants
//! - `name` is unique across the forest.
//! - `parent_id = None` marks a root; otherwise it references an existing
//!   category. Depth limits are enforced by `hierarchy`, not by this type.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a category.
pub type CategoryId = Uuid;

/// One category row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// Parent category. `None` means root-level.
    pub parent_id: Option<CategoryId>,
}

impl Category {
    /// Creates a category with a generated stable id.
    pub fn new(name: impl Into<String>, parent_id: Option<CategoryId>) -> Self {
        Self::with_id(Uuid::new_v4(), name, parent_id)
    }

    /// Creates a category with a caller-provided id.
    ///
    /// Used by update paths, where the row identity already exists.
    pub fn with_id(id: CategoryId, name: impl Into<String>, parent_id: Option<CategoryId>) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
