//! Read-side storage contract for the directory query engine.
//!
//! # Responsibility
//! - Resolve candidate organization ids for each lookup shape.
//! - Load assembled organization records and geolocated locations.
//!
//! # Invariants
//! - Every id list is de-duplicated and ordered by `name ASC, id ASC`.
//! - Name matching folds case with Unicode lowercase and treats SQL
//!   wildcard characters literally.

use crate::geo::BoundingBox;
use crate::hierarchy::CategoryGraph;
use crate::model::category::{Category, CategoryId};
use crate::model::location::{Location, LocationId};
use crate::model::organization::{OrganizationId, OrganizationRecord};
use crate::repo::{
    collect_organization_ids, ensure_directory_schema, list_child_category_ids,
    list_geolocated_locations, load_category, load_location, load_organization, parse_uuid,
    placeholders, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

/// Repository interface for directory lookups.
pub trait DirectoryRepository: CategoryGraph {
    /// Loads one location by id.
    fn location(&self, id: LocationId) -> RepoResult<Option<Location>>;
    /// Lists ids of organizations attached to one location.
    fn organization_ids_at_location(&self, id: LocationId) -> RepoResult<Vec<OrganizationId>>;
    /// Loads one organization with address, phones and categories.
    fn organization(&self, id: OrganizationId) -> RepoResult<Option<OrganizationRecord>>;
    /// Lists ids of organizations tagged with exactly `category_id`.
    fn organization_ids_by_category(
        &self,
        category_id: CategoryId,
    ) -> RepoResult<Vec<OrganizationId>>;
    /// Lists ids of organizations tagged with any of `category_ids`.
    fn organization_ids_by_categories(
        &self,
        category_ids: &[CategoryId],
    ) -> RepoResult<Vec<OrganizationId>>;
    /// Lists ids of organizations whose name contains `fragment`,
    /// ignoring case.
    fn organization_ids_by_name(&self, fragment: &str) -> RepoResult<Vec<OrganizationId>>;
    /// Lists locations with both coordinates set, optionally narrowed to an
    /// inclusive box.
    fn geolocated_locations(&self, within: Option<&BoundingBox>) -> RepoResult<Vec<Location>>;
}

/// SQLite-backed directory repository.
pub struct SqliteDirectoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDirectoryRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_directory_schema(conn)?;
        Ok(Self { conn })
    }
}

impl CategoryGraph for SqliteDirectoryRepository<'_> {
    fn category(&self, id: CategoryId) -> RepoResult<Option<Category>> {
        load_category(self.conn, id)
    }

    fn child_ids(&self, parent_ids: &[CategoryId]) -> RepoResult<Vec<CategoryId>> {
        list_child_category_ids(self.conn, parent_ids)
    }
}

impl DirectoryRepository for SqliteDirectoryRepository<'_> {
    fn location(&self, id: LocationId) -> RepoResult<Option<Location>> {
        load_location(self.conn, id)
    }

    fn organization_ids_at_location(&self, id: LocationId) -> RepoResult<Vec<OrganizationId>> {
        let mut stmt = self.conn.prepare(
            "SELECT id
             FROM organizations
             WHERE location_id = ?1
             ORDER BY name ASC, id ASC;",
        )?;
        collect_organization_ids(&mut stmt, [id.to_string()])
    }

    fn organization(&self, id: OrganizationId) -> RepoResult<Option<OrganizationRecord>> {
        load_organization(self.conn, id)
    }

    fn organization_ids_by_category(
        &self,
        category_id: CategoryId,
    ) -> RepoResult<Vec<OrganizationId>> {
        self.organization_ids_by_categories(&[category_id])
    }

    fn organization_ids_by_categories(
        &self,
        category_ids: &[CategoryId],
    ) -> RepoResult<Vec<OrganizationId>> {
        if category_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT o.id
             FROM organizations o
             WHERE EXISTS (
                SELECT 1
                FROM organization_categories oc
                WHERE oc.organization_id = o.id
                  AND oc.category_id IN ({})
             )
             ORDER BY o.name ASC, o.id ASC;",
            placeholders(category_ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        collect_organization_ids(
            &mut stmt,
            params_from_iter(
                category_ids
                    .iter()
                    .map(|id| Value::Text(id.to_string())),
            ),
        )
    }

    fn organization_ids_by_name(&self, fragment: &str) -> RepoResult<Vec<OrganizationId>> {
        // SQLite LIKE only folds ASCII, so matching happens here.
        let needle = fragment.to_lowercase();
        let mut stmt = self.conn.prepare(
            "SELECT id, name
             FROM organizations
             ORDER BY name ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let name: String = row.get(1)?;
            if name.to_lowercase().contains(&needle) {
                let id_text: String = row.get(0)?;
                ids.push(parse_uuid(&id_text, "organizations.id")?);
            }
        }
        Ok(ids)
    }

    fn geolocated_locations(&self, within: Option<&BoundingBox>) -> RepoResult<Vec<Location>> {
        list_geolocated_locations(self.conn, within)
    }
}
