//! Category administration use-case service.
//!
//! # Responsibility
//! - Create, rename, re-parent and delete categories.
//! - Expose subtree reads for administrative callers.
//!
//! # Invariants
//! - Names are trimmed and never blank.
//! - Every write passes the hierarchy validator inside its own transaction
//!   (see `repo::category_repo`); a rejected write changes nothing.

use crate::hierarchy::{descendants, HierarchyError};
use crate::model::category::{Category, CategoryId};
use crate::repo::category_repo::CategoryRepository;
use crate::repo::RepoError;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from category service operations.
#[derive(Debug)]
pub enum CategoryServiceError {
    /// Name is blank after trim.
    InvalidName,
    /// Another category already uses this name.
    NameTaken(String),
    /// Target category does not exist.
    CategoryNotFound(CategoryId),
    /// Parent category does not exist.
    ParentNotFound(CategoryId),
    /// Write would exceed the level bound.
    DepthViolation {
        category_id: CategoryId,
        levels: usize,
        max_levels: usize,
    },
    /// Re-parenting would create a cycle.
    CycleDetected {
        category_id: CategoryId,
        parent_id: CategoryId,
    },
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for CategoryServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName => write!(f, "category name must not be blank"),
            Self::NameTaken(name) => write!(f, "category name already taken: {name}"),
            Self::CategoryNotFound(id) => write!(f, "category not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent category not found: {id}"),
            Self::DepthViolation {
                category_id,
                levels,
                max_levels,
            } => write!(
                f,
                "category {category_id} would create {levels} tree levels; at most {max_levels} allowed"
            ),
            Self::CycleDetected {
                category_id,
                parent_id,
            } => write!(
                f,
                "category {category_id} cannot be placed under its descendant {parent_id}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CategoryServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CategoryServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Conflict { value, .. } => Self::NameTaken(value),
            RepoError::NotFound {
                entity: "category",
                id,
            } => Self::CategoryNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<HierarchyError> for CategoryServiceError {
    fn from(value: HierarchyError) -> Self {
        match value {
            HierarchyError::CategoryNotFound(id) => Self::CategoryNotFound(id),
            HierarchyError::ParentNotFound(id) => Self::ParentNotFound(id),
            HierarchyError::DepthViolation {
                category_id,
                levels,
                max_levels,
            } => Self::DepthViolation {
                category_id,
                levels,
                max_levels,
            },
            HierarchyError::CycleDetected {
                category_id,
                parent_id,
            } => Self::CycleDetected {
                category_id,
                parent_id,
            },
            HierarchyError::Repo(err) => err.into(),
        }
    }
}

/// Category administration facade.
pub struct CategoryService<R: CategoryRepository> {
    repo: R,
}

impl<R: CategoryRepository> CategoryService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one category under an optional parent.
    ///
    /// # Errors
    /// - `ParentNotFound`, `DepthViolation`, `NameTaken`, `InvalidName`.
    pub fn create_category(
        &self,
        name: impl Into<String>,
        parent_id: Option<CategoryId>,
    ) -> Result<Category, CategoryServiceError> {
        let name = normalize_category_name(name.into())?;
        let category = Category::new(name, parent_id);
        self.repo.insert_category(&category)?;
        Ok(category)
    }

    /// Renames and/or re-parents one category.
    ///
    /// The whole subtree moves with the category, so the check covers the
    /// subtree height as well as the new ancestors.
    pub fn update_category(
        &self,
        id: CategoryId,
        name: impl Into<String>,
        parent_id: Option<CategoryId>,
    ) -> Result<Category, CategoryServiceError> {
        let name = normalize_category_name(name.into())?;
        let category = Category::with_id(id, name, parent_id);
        self.repo.update_category(&category)?;
        Ok(category)
    }

    /// Deletes one category, its sub-categories and their tag links.
    pub fn delete_category(&self, id: CategoryId) -> Result<(), CategoryServiceError> {
        self.repo.delete_category(id).map_err(Into::into)
    }

    /// Loads one category.
    pub fn get_category(&self, id: CategoryId) -> Result<Category, CategoryServiceError> {
        self.repo
            .category(id)?
            .ok_or(CategoryServiceError::CategoryNotFound(id))
    }

    /// Lists direct children of `parent_id`, or roots when `None`.
    pub fn list_children(
        &self,
        parent_id: Option<CategoryId>,
    ) -> Result<Vec<Category>, CategoryServiceError> {
        if let Some(parent_id) = parent_id {
            if self.repo.category(parent_id)?.is_none() {
                return Err(CategoryServiceError::CategoryNotFound(parent_id));
            }
        }
        self.repo.list_children(parent_id).map_err(Into::into)
    }

    /// Returns `id` and every category below it.
    pub fn descendants(
        &self,
        id: CategoryId,
    ) -> Result<HashSet<CategoryId>, CategoryServiceError> {
        descendants(id, &self.repo).map_err(Into::into)
    }
}

fn normalize_category_name(value: String) -> Result<String, CategoryServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CategoryServiceError::InvalidName);
    }
    Ok(trimmed.to_string())
}
