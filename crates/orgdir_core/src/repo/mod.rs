//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//! - Share row decoding and schema readiness checks between repositories.
//!
//! # Invariants
//! - Repositories only accept fully migrated connections.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::geo::BoundingBox;
use crate::model::category::{Category, CategoryId};
use crate::model::location::{Location, LocationId};
use crate::model::organization::{OrganizationId, OrganizationRecord};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod catalog_repo;
pub mod category_repo;
pub mod directory_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for directory persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Referenced row does not exist.
    NotFound { entity: &'static str, id: Uuid },
    /// Unique column already holds this value.
    Conflict { field: &'static str, value: String },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict { field, value } => {
                write!(f, "value `{value}` already taken for {field}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "directory repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "directory repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "directory repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    ("categories", &["id", "name", "parent_id"]),
    ("locations", &["id", "address", "latitude", "longitude"]),
    ("organizations", &["id", "name", "location_id"]),
    ("organization_phones", &["organization_id", "phone"]),
    ("organization_categories", &["organization_id", "category_id"]),
];

/// Verifies the connection is migrated and carries the directory tables.
pub(crate) fn ensure_directory_schema(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &(table, columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Maps a UNIQUE/PRIMARY KEY failure to `Conflict`, passing anything else
/// through as a DB error.
pub(crate) fn map_unique_violation(
    err: rusqlite::Error,
    field: &'static str,
    value: &str,
) -> RepoError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err {
        if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        {
            return RepoError::Conflict {
                field,
                value: value.to_string(),
            };
        }
    }
    err.into()
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn parse_category_row(row: &Row<'_>) -> RepoResult<Category> {
    let id_text: String = row.get("id")?;
    let parent_id = row
        .get::<_, Option<String>>("parent_id")?
        .map(|value| parse_uuid(&value, "categories.parent_id"))
        .transpose()?;
    Ok(Category {
        id: parse_uuid(&id_text, "categories.id")?,
        name: row.get("name")?,
        parent_id,
    })
}

fn parse_location_row(row: &Row<'_>) -> RepoResult<Location> {
    let id_text: String = row.get("id")?;
    Ok(Location {
        id: parse_uuid(&id_text, "locations.id")?,
        address: row.get("address")?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
    })
}

pub(crate) fn load_category(conn: &Connection, id: CategoryId) -> RepoResult<Option<Category>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, parent_id
         FROM categories
         WHERE id = ?1;",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_category_row(row)?));
    }
    Ok(None)
}

/// Lists child ids of any parent in `parent_ids`, ordered by name.
pub(crate) fn list_child_category_ids(
    conn: &Connection,
    parent_ids: &[CategoryId],
) -> RepoResult<Vec<CategoryId>> {
    if parent_ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT id
         FROM categories
         WHERE parent_id IN ({})
         ORDER BY name ASC, id ASC;",
        placeholders(parent_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(
        parent_ids.iter().map(|id| Value::Text(id.to_string())),
    ))?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, "categories.id")?);
    }
    Ok(ids)
}

pub(crate) fn list_categories_by_parent(
    conn: &Connection,
    parent_id: Option<CategoryId>,
) -> RepoResult<Vec<Category>> {
    let mut categories = Vec::new();
    if let Some(parent_id) = parent_id {
        let mut stmt = conn.prepare(
            "SELECT id, name, parent_id
             FROM categories
             WHERE parent_id = ?1
             ORDER BY name ASC, id ASC;",
        )?;
        let mut rows = stmt.query([parent_id.to_string()])?;
        while let Some(row) = rows.next()? {
            categories.push(parse_category_row(row)?);
        }
    } else {
        let mut stmt = conn.prepare(
            "SELECT id, name, parent_id
             FROM categories
             WHERE parent_id IS NULL
             ORDER BY name ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            categories.push(parse_category_row(row)?);
        }
    }
    Ok(categories)
}

pub(crate) fn load_location(conn: &Connection, id: LocationId) -> RepoResult<Option<Location>> {
    let mut stmt = conn.prepare(
        "SELECT id, address, latitude, longitude
         FROM locations
         WHERE id = ?1;",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_location_row(row)?));
    }
    Ok(None)
}

/// Lists locations with both coordinates set, optionally narrowed to an
/// inclusive box, ordered by address.
pub(crate) fn list_geolocated_locations(
    conn: &Connection,
    within: Option<&BoundingBox>,
) -> RepoResult<Vec<Location>> {
    let mut sql = String::from(
        "SELECT id, address, latitude, longitude
         FROM locations
         WHERE latitude IS NOT NULL
           AND longitude IS NOT NULL",
    );
    let mut bind_values: Vec<Value> = Vec::new();
    if let Some(bbox) = within {
        sql.push_str(" AND latitude BETWEEN ? AND ? AND longitude BETWEEN ? AND ?");
        bind_values.extend([
            Value::Real(bbox.south_west.latitude),
            Value::Real(bbox.north_east.latitude),
            Value::Real(bbox.south_west.longitude),
            Value::Real(bbox.north_east.longitude),
        ]);
    }
    sql.push_str(" ORDER BY address ASC, id ASC;");

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut locations = Vec::new();
    while let Some(row) = rows.next()? {
        locations.push(parse_location_row(row)?);
    }
    Ok(locations)
}

/// Loads one organization with its address, phones and category rows.
pub(crate) fn load_organization(
    conn: &Connection,
    id: OrganizationId,
) -> RepoResult<Option<OrganizationRecord>> {
    let id_text = id.to_string();
    let head = conn
        .query_row(
            "SELECT o.name AS name, o.location_id AS location_id, l.address AS address
             FROM organizations o
             INNER JOIN locations l ON l.id = o.location_id
             WHERE o.id = ?1;",
            [id_text.as_str()],
            |row| {
                Ok((
                    row.get::<_, String>("name")?,
                    row.get::<_, String>("location_id")?,
                    row.get::<_, String>("address")?,
                ))
            },
        )
        .optional()?;
    let Some((name, location_id_text, address)) = head else {
        return Ok(None);
    };

    Ok(Some(OrganizationRecord {
        id,
        name,
        location_id: parse_uuid(&location_id_text, "organizations.location_id")?,
        address,
        phones: load_phones(conn, id_text.as_str())?,
        categories: load_organization_categories(conn, id_text.as_str())?,
    }))
}

fn load_phones(conn: &Connection, organization_id: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT phone
         FROM organization_phones
         WHERE organization_id = ?1
         ORDER BY phone ASC;",
    )?;
    let mut rows = stmt.query([organization_id])?;
    let mut phones = Vec::new();
    while let Some(row) = rows.next()? {
        phones.push(row.get(0)?);
    }
    Ok(phones)
}

fn load_organization_categories(
    conn: &Connection,
    organization_id: &str,
) -> RepoResult<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT c.id AS id, c.name AS name, c.parent_id AS parent_id
         FROM organization_categories oc
         INNER JOIN categories c ON c.id = oc.category_id
         WHERE oc.organization_id = ?1
         ORDER BY c.name ASC, c.id ASC;",
    )?;
    let mut rows = stmt.query([organization_id])?;
    let mut categories = Vec::new();
    while let Some(row) = rows.next()? {
        categories.push(parse_category_row(row)?);
    }
    Ok(categories)
}

/// Collects the first column of every row as an organization id.
pub(crate) fn collect_organization_ids(
    stmt: &mut rusqlite::Statement<'_>,
    params: impl rusqlite::Params,
) -> RepoResult<Vec<OrganizationId>> {
    let mut rows = stmt.query(params)?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, "organizations.id")?);
    }
    Ok(ids)
}

pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
