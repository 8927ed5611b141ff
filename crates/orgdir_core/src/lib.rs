//! Core of the organization directory.
//! This crate is the single source of truth for directory invariants: the
//! depth-bounded category forest, geospatial lookups and the assembled
//! organization records returned to callers.

pub mod config;
pub mod db;
pub mod geo;
pub mod hierarchy;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, DirectoryConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use geo::{BoundingBox, GeoPoint};
pub use hierarchy::{HierarchyError, MAX_CATEGORY_LEVELS};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::category::{Category, CategoryId};
pub use model::location::{Location, LocationId};
pub use model::organization::{
    CategoryRef, NewOrganization, OrganizationDto, OrganizationId, OrganizationRecord,
};
pub use repo::catalog_repo::{CatalogRepository, SqliteCatalogRepository};
pub use repo::category_repo::{CategoryRepository, SqliteCategoryRepository};
pub use repo::directory_repo::{DirectoryRepository, SqliteDirectoryRepository};
pub use repo::{RepoError, RepoResult};
pub use service::catalog_service::{CatalogService, CatalogServiceError};
pub use service::category_service::{CategoryService, CategoryServiceError};
pub use service::directory_service::{DirectoryError, DirectoryService};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
