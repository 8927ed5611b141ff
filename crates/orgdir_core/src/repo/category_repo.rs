//! Category repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist category inserts, updates and deletes.
//! - Run the hierarchy validator inside the write transaction.
//!
//! # Invariants
//! - Every write opens an IMMEDIATE transaction before validating, so the
//!   ancestor walk and the write see the same snapshot and concurrent
//!   writers are serialized.
//! - A rejected write leaves the store untouched.
//! - Deleting a category cascades to its sub-categories and tag links.

use crate::hierarchy::{validate_category, CategoryGraph, HierarchyError};
use crate::model::category::{Category, CategoryId};
use crate::repo::{
    ensure_directory_schema, list_categories_by_parent, list_child_category_ids, load_category,
    map_unique_violation, RepoError, RepoResult,
};
use log::{info, warn};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};

/// Result type for validated category writes.
pub type CategoryWriteResult<T> = Result<T, HierarchyError>;

/// Repository interface for category administration.
pub trait CategoryRepository: CategoryGraph {
    /// Inserts one category after validating it against the forest.
    fn insert_category(&self, candidate: &Category) -> CategoryWriteResult<()>;
    /// Replaces name and parent of an existing category after validation.
    fn update_category(&self, candidate: &Category) -> CategoryWriteResult<()>;
    /// Deletes one category together with its subtree.
    fn delete_category(&self, id: CategoryId) -> RepoResult<()>;
    /// Lists direct children of `parent_id`, or roots when `None`.
    fn list_children(&self, parent_id: Option<CategoryId>) -> RepoResult<Vec<Category>>;
}

/// Category reads bound to one connection or transaction.
pub struct SqliteCategoryGraph<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCategoryGraph<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CategoryGraph for SqliteCategoryGraph<'_> {
    fn category(&self, id: CategoryId) -> RepoResult<Option<Category>> {
        load_category(self.conn, id)
    }

    fn child_ids(&self, parent_ids: &[CategoryId]) -> RepoResult<Vec<CategoryId>> {
        list_child_category_ids(self.conn, parent_ids)
    }
}

/// SQLite-backed category repository.
pub struct SqliteCategoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCategoryRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_directory_schema(conn)?;
        Ok(Self { conn })
    }

    fn begin_write(&self) -> RepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl CategoryGraph for SqliteCategoryRepository<'_> {
    fn category(&self, id: CategoryId) -> RepoResult<Option<Category>> {
        load_category(self.conn, id)
    }

    fn child_ids(&self, parent_ids: &[CategoryId]) -> RepoResult<Vec<CategoryId>> {
        list_child_category_ids(self.conn, parent_ids)
    }
}

impl CategoryRepository for SqliteCategoryRepository<'_> {
    fn insert_category(&self, candidate: &Category) -> CategoryWriteResult<()> {
        let tx = self.begin_write()?;
        if let Err(err) = validate_category(candidate, &SqliteCategoryGraph::new(&tx)) {
            warn!("event=category_write module=repo status=rejected op=insert reason={err}");
            return Err(err);
        }

        tx.execute(
            "INSERT INTO categories (id, name, parent_id)
             VALUES (?1, ?2, ?3);",
            params![
                candidate.id.to_string(),
                candidate.name,
                candidate.parent_id.map(|value| value.to_string()),
            ],
        )
        .map_err(|err| map_unique_violation(err, "categories.name", &candidate.name))?;

        tx.commit()?;
        info!(
            "event=category_write module=repo status=ok op=insert root={}",
            candidate.is_root()
        );
        Ok(())
    }

    fn update_category(&self, candidate: &Category) -> CategoryWriteResult<()> {
        let tx = self.begin_write()?;
        let graph = SqliteCategoryGraph::new(&tx);
        if graph.category(candidate.id)?.is_none() {
            return Err(HierarchyError::CategoryNotFound(candidate.id));
        }
        if let Err(err) = validate_category(candidate, &graph) {
            warn!("event=category_write module=repo status=rejected op=update reason={err}");
            return Err(err);
        }

        tx.execute(
            "UPDATE categories
             SET name = ?2,
                 parent_id = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                candidate.id.to_string(),
                candidate.name,
                candidate.parent_id.map(|value| value.to_string()),
            ],
        )
        .map_err(|err| map_unique_violation(err, "categories.name", &candidate.name))?;

        tx.commit()?;
        info!("event=category_write module=repo status=ok op=update");
        Ok(())
    }

    fn delete_category(&self, id: CategoryId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM categories WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "category",
                id,
            });
        }
        info!("event=category_write module=repo status=ok op=delete");
        Ok(())
    }

    fn list_children(&self, parent_id: Option<CategoryId>) -> RepoResult<Vec<Category>> {
        list_categories_by_parent(self.conn, parent_id)
    }
}
