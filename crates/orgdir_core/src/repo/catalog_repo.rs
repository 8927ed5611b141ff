//! Administrative writes for locations and organizations.
//!
//! # Responsibility
//! - Create/update locations and create/replace/delete organizations.
//! - Keep phone and tag-link rows consistent with their organization.
//!
//! # Invariants
//! - Multi-row writes run in one IMMEDIATE transaction; failures roll back.
//! - Deleting an organization removes its phones and tag links and leaves the
//!   location and categories untouched.
//! - Inputs are expected to be normalized by the service layer.

use crate::model::category::CategoryId;
use crate::model::location::{Location, LocationId};
use crate::model::organization::{NewOrganization, OrganizationId, OrganizationRecord};
use crate::repo::{
    ensure_directory_schema, load_location, load_organization, map_unique_violation, RepoError,
    RepoResult,
};
use log::info;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};

/// Repository interface for catalog administration.
pub trait CatalogRepository {
    /// Persists one location.
    fn create_location(&self, location: &Location) -> RepoResult<()>;
    /// Replaces both coordinates of an existing location.
    fn update_location_coordinates(
        &self,
        id: LocationId,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> RepoResult<()>;
    /// Loads one location by id.
    fn location(&self, id: LocationId) -> RepoResult<Option<Location>>;
    /// Persists one organization with its phones and tags.
    fn create_organization(&self, organization: &NewOrganization)
        -> RepoResult<OrganizationRecord>;
    /// Replaces the whole phone list of an organization.
    fn replace_phones(&self, id: OrganizationId, phones: &[String]) -> RepoResult<()>;
    /// Replaces the whole tag list of an organization.
    fn replace_categories(&self, id: OrganizationId, category_ids: &[CategoryId])
        -> RepoResult<()>;
    /// Deletes one organization and its dependent rows.
    fn delete_organization(&self, id: OrganizationId) -> RepoResult<()>;
    /// Loads one organization with address, phones and categories.
    fn organization(&self, id: OrganizationId) -> RepoResult<Option<OrganizationRecord>>;
}

/// SQLite-backed catalog repository.
pub struct SqliteCatalogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCatalogRepository<'conn> {
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

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn create_location(&self, location: &Location) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO locations (id, address, latitude, longitude)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                location.id.to_string(),
                location.address,
                location.latitude,
                location.longitude,
            ],
        )?;
        info!(
            "event=location_write module=repo status=ok op=create geolocated={}",
            location.geo_point().is_some()
        );
        Ok(())
    }

    fn update_location_coordinates(
        &self,
        id: LocationId,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE locations
             SET latitude = ?2,
                 longitude = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), latitude, longitude],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "location",
                id,
            });
        }
        info!("event=location_write module=repo status=ok op=update_coordinates");
        Ok(())
    }

    fn location(&self, id: LocationId) -> RepoResult<Option<Location>> {
        load_location(self.conn, id)
    }

    fn create_organization(
        &self,
        organization: &NewOrganization,
    ) -> RepoResult<OrganizationRecord> {
        let tx = self.begin_write()?;
        if !location_exists_in_tx(&tx, organization.location_id)? {
            return Err(RepoError::NotFound {
                entity: "location",
                id: organization.location_id,
            });
        }

        tx.execute(
            "INSERT INTO organizations (id, name, location_id)
             VALUES (?1, ?2, ?3);",
            params![
                organization.id.to_string(),
                organization.name,
                organization.location_id.to_string(),
            ],
        )
        .map_err(|err| map_unique_violation(err, "organizations.name", &organization.name))?;
        insert_phones_in_tx(&tx, organization.id, &organization.phones)?;
        insert_tags_in_tx(&tx, organization.id, &organization.category_ids)?;

        let record = load_organization(&tx, organization.id)?.ok_or(RepoError::NotFound {
            entity: "organization",
            id: organization.id,
        })?;
        tx.commit()?;
        info!(
            "event=organization_write module=repo status=ok op=create phones={} tags={}",
            record.phones.len(),
            record.categories.len()
        );
        Ok(record)
    }

    fn replace_phones(&self, id: OrganizationId, phones: &[String]) -> RepoResult<()> {
        let tx = self.begin_write()?;
        ensure_organization_in_tx(&tx, id)?;
        tx.execute(
            "DELETE FROM organization_phones WHERE organization_id = ?1;",
            [id.to_string()],
        )?;
        insert_phones_in_tx(&tx, id, phones)?;
        tx.commit()?;
        info!(
            "event=organization_write module=repo status=ok op=replace_phones count={}",
            phones.len()
        );
        Ok(())
    }

    fn replace_categories(
        &self,
        id: OrganizationId,
        category_ids: &[CategoryId],
    ) -> RepoResult<()> {
        let tx = self.begin_write()?;
        ensure_organization_in_tx(&tx, id)?;
        tx.execute(
            "DELETE FROM organization_categories WHERE organization_id = ?1;",
            [id.to_string()],
        )?;
        insert_tags_in_tx(&tx, id, category_ids)?;
        tx.commit()?;
        info!(
            "event=organization_write module=repo status=ok op=replace_tags count={}",
            category_ids.len()
        );
        Ok(())
    }

    fn delete_organization(&self, id: OrganizationId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM organizations WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "organization",
                id,
            });
        }
        info!("event=organization_write module=repo status=ok op=delete");
        Ok(())
    }

    fn organization(&self, id: OrganizationId) -> RepoResult<Option<OrganizationRecord>> {
        load_organization(self.conn, id)
    }
}

fn location_exists_in_tx(tx: &Transaction<'_>, id: LocationId) -> RepoResult<bool> {
    let exists: i64 = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM locations WHERE id = ?1);",
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn ensure_organization_in_tx(tx: &Transaction<'_>, id: OrganizationId) -> RepoResult<()> {
    let exists: i64 = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM organizations WHERE id = ?1);",
        [id.to_string()],
        |row| row.get(0),
    )?;
    if exists == 1 {
        Ok(())
    } else {
        Err(RepoError::NotFound {
            entity: "organization",
            id,
        })
    }
}

fn insert_phones_in_tx(
    tx: &Transaction<'_>,
    id: OrganizationId,
    phones: &[String],
) -> RepoResult<()> {
    let id_text = id.to_string();
    for phone in phones {
        tx.execute(
            "INSERT INTO organization_phones (organization_id, phone)
             VALUES (?1, ?2);",
            params![id_text, phone],
        )
        .map_err(|err| map_unique_violation(err, "organization_phones.phone", phone))?;
    }
    Ok(())
}

fn insert_tags_in_tx(
    tx: &Transaction<'_>,
    id: OrganizationId,
    category_ids: &[CategoryId],
) -> RepoResult<()> {
    let id_text = id.to_string();
    for category_id in category_ids {
        let exists: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?1);",
            [category_id.to_string()],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::NotFound {
                entity: "category",
                id: *category_id,
            });
        }
        tx.execute(
            "INSERT OR IGNORE INTO organization_categories (organization_id, category_id)
             VALUES (?1, ?2);",
            params![id_text, category_id.to_string()],
        )?;
    }
    Ok(())
}
