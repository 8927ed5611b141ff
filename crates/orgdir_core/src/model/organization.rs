//! Organization storage records and response DTOs.
//!
//! # Responsibility
//! - `OrganizationRecord`: everything loaded for one organization, in storage
//!   terms (full category rows, owning location id).
//! - `OrganizationDto`: the read-only record returned to callers.
//!
//! # Invariants
//! - DTOs expose the location address only, never raw coordinates.
//! - DTO categories are flat `{id, name}` pairs; tree structure stays in
//!   storage.

use crate::model::category::{Category, CategoryId};
use crate::model::location::LocationId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of an organization.
pub type OrganizationId = Uuid;

/// Loaded organization row bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationRecord {
    pub id: OrganizationId,
    pub name: String,
    pub location_id: LocationId,
    /// Address of the owning location, joined at load time.
    pub address: String,
    pub phones: Vec<String>,
    /// Tagged categories, sorted by name.
    pub categories: Vec<Category>,
}

/// Write model for creating an organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrganization {
    pub id: OrganizationId,
    pub name: String,
    pub location_id: LocationId,
    pub phones: Vec<String>,
    pub category_ids: Vec<CategoryId>,
}

impl NewOrganization {
    /// Creates a write model with a generated id and no phones or tags.
    pub fn new(name: impl Into<String>, location_id: LocationId) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            location_id,
            phones: Vec::new(),
            category_ids: Vec::new(),
        }
    }
}

/// Flat category reference exposed on organization DTOs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
}

impl From<&Category> for CategoryRef {
    fn from(value: &Category) -> Self {
        Self {
            id: value.id,
            name: value.name.clone(),
        }
    }
}

/// Assembled organization returned by every directory query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationDto {
    pub id: OrganizationId,
    pub name: String,
    pub address: String,
    pub phones: Vec<String>,
    pub categories: Vec<CategoryRef>,
}
