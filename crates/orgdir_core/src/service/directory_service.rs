//! Directory query façade.
//!
//! # Responsibility
//! - Serve the directory lookups: by location, by exact category, by
//!   category subtree, by name fragment, by radius, by bounding box, by id.
//! - Distinguish "referenced id does not exist" from "valid input, nothing
//!   there" with separate error variants.
//!
//! # Invariants
//! - Every operation fails closed: no partial or truncated result is
//!   returned.
//! - Only assembled `OrganizationDto` values leave this module.
//! - Storage faults pass through unchanged in `DirectoryError::Repo`.

use crate::geo::{within_bounding_box, within_radius, BoundingBox, GeoPoint};
use crate::hierarchy::{descendants, HierarchyError};
use crate::model::category::CategoryId;
use crate::model::location::{Location, LocationId};
use crate::model::organization::{OrganizationDto, OrganizationId};
use crate::repo::directory_repo::DirectoryRepository;
use crate::repo::RepoError;
use crate::service::aggregator::{assemble, assemble_all};
use log::{debug, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Errors and empty outcomes from directory queries.
#[derive(Debug)]
pub enum DirectoryError {
    /// Referenced location does not exist.
    LocationNotFound(LocationId),
    /// Subtree root category does not exist.
    CategoryNotFound(CategoryId),
    /// Referenced organization does not exist.
    OrganizationNotFound(OrganizationId),
    /// Location exists but hosts no organizations.
    NoOrganizationsAtLocation(LocationId),
    /// Criteria were valid but matched no organizations.
    NoOrganizationsFound,
    /// Geographic criteria matched no geolocated location.
    NoLocationsFound,
    /// Coordinates or radius are not usable numbers.
    InvalidGeoQuery(String),
    /// Category graph walk failed.
    Hierarchy(HierarchyError),
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for DirectoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocationNotFound(id) => write!(f, "location not found: {id}"),
            Self::CategoryNotFound(id) => write!(f, "category not found: {id}"),
            Self::OrganizationNotFound(id) => write!(f, "organization not found: {id}"),
            Self::NoOrganizationsAtLocation(id) => {
                write!(f, "no organizations at location {id}")
            }
            Self::NoOrganizationsFound => write!(f, "no organizations found"),
            Self::NoLocationsFound => write!(f, "no locations found"),
            Self::InvalidGeoQuery(message) => write!(f, "invalid geo query: {message}"),
            Self::Hierarchy(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DirectoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Hierarchy(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for DirectoryError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<HierarchyError> for DirectoryError {
    fn from(value: HierarchyError) -> Self {
        match value {
            HierarchyError::CategoryNotFound(id) => Self::CategoryNotFound(id),
            HierarchyError::Repo(err) => Self::Repo(err),
            other => Self::Hierarchy(other),
        }
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Directory query service facade.
pub struct DirectoryService<R: DirectoryRepository> {
    repo: R,
}

impl<R: DirectoryRepository> DirectoryService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Organizations attached to one location.
    ///
    /// # Errors
    /// - `LocationNotFound` when the id does not exist.
    /// - `NoOrganizationsAtLocation` when it exists but is empty.
    pub fn organizations_at_location(
        &self,
        location_id: LocationId,
    ) -> DirectoryResult<Vec<OrganizationDto>> {
        if self.repo.location(location_id)?.is_none() {
            return Err(DirectoryError::LocationNotFound(location_id));
        }
        let organizations = self.assemble_location(location_id)?;
        if organizations.is_empty() {
            return Err(DirectoryError::NoOrganizationsAtLocation(location_id));
        }
        info!(
            "event=directory_query module=service status=ok query=location results={}",
            organizations.len()
        );
        Ok(organizations)
    }

    /// Organizations tagged with exactly `category_id`.
    ///
    /// An unknown category is not an error here; it simply matches nothing.
    pub fn organizations_by_category(
        &self,
        category_id: CategoryId,
    ) -> DirectoryResult<Vec<OrganizationDto>> {
        let ids = self.repo.organization_ids_by_category(category_id)?;
        self.finish("category", &ids)
    }

    /// Organizations tagged with `category_id` or any of its descendants,
    /// each listed once.
    ///
    /// # Errors
    /// - `CategoryNotFound` when the subtree root does not exist.
    pub fn organizations_in_category_tree(
        &self,
        category_id: CategoryId,
    ) -> DirectoryResult<Vec<OrganizationDto>> {
        let closure = descendants(category_id, &self.repo)?;
        let mut category_ids = closure.into_iter().collect::<Vec<_>>();
        category_ids.sort_unstable();
        debug!(
            "event=directory_query module=service status=expanded query=category_tree categories={}",
            category_ids.len()
        );
        let ids = self.repo.organization_ids_by_categories(&category_ids)?;
        self.finish("category_tree", &ids)
    }

    /// Organizations whose name contains `fragment`, ignoring case.
    pub fn search_organizations_by_name(
        &self,
        fragment: &str,
    ) -> DirectoryResult<Vec<OrganizationDto>> {
        let ids = self.repo.organization_ids_by_name(fragment)?;
        self.finish("name", &ids)
    }

    /// Organizations at locations within `radius_km` of the given point,
    /// nearest location first.
    ///
    /// # Errors
    /// - `InvalidGeoQuery` for out-of-range or non-finite input.
    /// - `NoLocationsFound` when no geolocated location is in range.
    /// - `NoOrganizationsFound` when every location in range is empty.
    pub fn organizations_within_radius(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> DirectoryResult<Vec<OrganizationDto>> {
        let started_at = Instant::now();
        let center = GeoPoint::new(latitude, longitude);
        if !center.is_valid() {
            return Err(DirectoryError::InvalidGeoQuery(format!(
                "center ({latitude}, {longitude}) is not a valid coordinate"
            )));
        }
        if !radius_km.is_finite() || radius_km < 0.0 {
            return Err(DirectoryError::InvalidGeoQuery(format!(
                "radius {radius_km} km must be a finite non-negative number"
            )));
        }

        let prefilter = BoundingBox::around(center, radius_km);
        let candidates = self.repo.geolocated_locations(prefilter.as_ref())?;
        let scanned = candidates.len();
        let locations = within_radius(candidates, center, radius_km)
            .into_iter()
            .map(|hit| hit.location)
            .collect::<Vec<_>>();
        debug!(
            "event=geo_query module=service status=filtered query=radius prefilter={} scanned={} matched={} elapsed_ms={}",
            prefilter.is_some(),
            scanned,
            locations.len(),
            started_at.elapsed().as_millis()
        );
        self.finish_locations("radius", &locations)
    }

    /// Organizations at locations inside the inclusive box spanned by the
    /// north-east and south-west corners.
    ///
    /// An inverted box (south-west north or east of north-east) matches no
    /// location and yields `NoLocationsFound`.
    pub fn organizations_within_bounding_box(
        &self,
        ne_latitude: f64,
        ne_longitude: f64,
        sw_latitude: f64,
        sw_longitude: f64,
    ) -> DirectoryResult<Vec<OrganizationDto>> {
        let corners = [ne_latitude, ne_longitude, sw_latitude, sw_longitude];
        if corners.iter().any(|value| !value.is_finite()) {
            return Err(DirectoryError::InvalidGeoQuery(format!(
                "bounding box corners {corners:?} must be finite"
            )));
        }

        let bbox = BoundingBox::from_corners(ne_latitude, ne_longitude, sw_latitude, sw_longitude);
        if bbox.is_inverted() {
            debug!("event=geo_query module=service status=inverted query=bounding_box");
        }
        let candidates = self.repo.geolocated_locations(Some(&bbox))?;
        let locations = within_bounding_box(candidates, &bbox);
        self.finish_locations("bounding_box", &locations)
    }

    /// One organization by id.
    pub fn organization_by_id(&self, id: OrganizationId) -> DirectoryResult<OrganizationDto> {
        self.repo
            .organization(id)?
            .map(|record| assemble(&record))
            .ok_or(DirectoryError::OrganizationNotFound(id))
    }

    fn assemble_location(&self, location_id: LocationId) -> DirectoryResult<Vec<OrganizationDto>> {
        let ids = self.repo.organization_ids_at_location(location_id)?;
        assemble_all(&self.repo, &ids)
    }

    fn finish(&self, query: &str, ids: &[OrganizationId]) -> DirectoryResult<Vec<OrganizationDto>> {
        if ids.is_empty() {
            info!("event=directory_query module=service status=empty query={query}");
            return Err(DirectoryError::NoOrganizationsFound);
        }
        let organizations = assemble_all(&self.repo, ids)?;
        info!(
            "event=directory_query module=service status=ok query={query} results={}",
            organizations.len()
        );
        Ok(organizations)
    }

    /// Concatenates per-location results, skipping empty locations.
    fn finish_locations(
        &self,
        query: &str,
        locations: &[Location],
    ) -> DirectoryResult<Vec<OrganizationDto>> {
        if locations.is_empty() {
            info!("event=geo_query module=service status=no_locations query={query}");
            return Err(DirectoryError::NoLocationsFound);
        }

        let mut organizations = Vec::new();
        for location in locations {
            organizations.extend(self.assemble_location(location.id)?);
        }
        if organizations.is_empty() {
            info!(
                "event=geo_query module=service status=empty query={query} locations={}",
                locations.len()
            );
            return Err(DirectoryError::NoOrganizationsFound);
        }
        info!(
            "event=geo_query module=service status=ok query={query} locations={} results={}",
            locations.len(),
            organizations.len()
        );
        Ok(organizations)
    }
}
