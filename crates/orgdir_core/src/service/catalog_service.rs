//! Catalog administration use-case service.
//!
//! # Responsibility
//! - Validate and normalize location and organization input.
//! - Create locations and organizations; replace phones and tags; delete
//!   organizations.
//!
//! # Invariants
//! - Addresses and organization names are trimmed and never blank.
//! - Coordinates are finite and within degree ranges when present.
//! - Phones are normalized, validated and de-duplicated before storage.

use crate::model::category::CategoryId;
use crate::model::location::{Location, LocationId};
use crate::model::organization::{NewOrganization, OrganizationDto, OrganizationId};
use crate::repo::catalog_repo::CatalogRepository;
use crate::repo::RepoError;
use crate::service::aggregator::assemble;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9 ()\-]{5,20}$").expect("valid phone regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

const MIN_PHONE_DIGITS: usize = 5;

/// Errors from catalog service operations.
#[derive(Debug)]
pub enum CatalogServiceError {
    /// Address is blank after trim.
    InvalidAddress,
    /// Latitude/longitude outside degree ranges or not finite.
    InvalidCoordinates { latitude: f64, longitude: f64 },
    /// Only one of latitude/longitude was supplied.
    IncompleteCoordinates,
    /// Organization name is blank after trim.
    InvalidName,
    /// Phone does not look like a phone number.
    InvalidPhone(String),
    /// Another organization already uses this name.
    NameTaken(String),
    /// Another organization already owns this phone.
    PhoneTaken(String),
    /// Referenced location does not exist.
    LocationNotFound(LocationId),
    /// Referenced category does not exist.
    CategoryNotFound(CategoryId),
    /// Target organization does not exist.
    OrganizationNotFound(OrganizationId),
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for CatalogServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAddress => write!(f, "address must not be blank"),
            Self::InvalidCoordinates {
                latitude,
                longitude,
            } => write!(f, "invalid coordinates ({latitude}, {longitude})"),
            Self::IncompleteCoordinates => {
                write!(f, "latitude and longitude must be set together")
            }
            Self::InvalidName => write!(f, "organization name must not be blank"),
            Self::InvalidPhone(phone) => write!(f, "invalid phone number: {phone}"),
            Self::NameTaken(name) => write!(f, "organization name already taken: {name}"),
            Self::PhoneTaken(phone) => write!(f, "phone number already taken: {phone}"),
            Self::LocationNotFound(id) => write!(f, "location not found: {id}"),
            Self::CategoryNotFound(id) => write!(f, "category not found: {id}"),
            Self::OrganizationNotFound(id) => write!(f, "organization not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CatalogServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CatalogServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: "location",
                id,
            } => Self::LocationNotFound(id),
            RepoError::NotFound {
                entity: "category",
                id,
            } => Self::CategoryNotFound(id),
            RepoError::NotFound {
                entity: "organization",
                id,
            } => Self::OrganizationNotFound(id),
            RepoError::Conflict {
                field: "organizations.name",
                value,
            } => Self::NameTaken(value),
            RepoError::Conflict {
                field: "organization_phones.phone",
                value,
            } => Self::PhoneTaken(value),
            other => Self::Repo(other),
        }
    }
}

/// Catalog administration facade.
pub struct CatalogService<R: CatalogRepository> {
    repo: R,
}

impl<R: CatalogRepository> CatalogService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one location, geolocated when both coordinates are given.
    pub fn create_location(
        &self,
        address: impl Into<String>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<Location, CatalogServiceError> {
        let address = address.into();
        let address = address.trim();
        if address.is_empty() {
            return Err(CatalogServiceError::InvalidAddress);
        }
        let (latitude, longitude) = validate_coordinates(latitude, longitude)?;
        let location = Location {
            latitude,
            longitude,
            ..Location::new(address)
        };
        self.repo.create_location(&location)?;
        Ok(location)
    }

    /// Sets or clears both coordinates of one location.
    pub fn update_location_coordinates(
        &self,
        id: LocationId,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<Location, CatalogServiceError> {
        let (latitude, longitude) = validate_coordinates(latitude, longitude)?;
        self.repo
            .update_location_coordinates(id, latitude, longitude)?;
        self.repo
            .location(id)?
            .ok_or(CatalogServiceError::LocationNotFound(id))
    }

    /// Creates one organization with phones and category tags.
    ///
    /// # Errors
    /// - `LocationNotFound` / `CategoryNotFound` for dangling references.
    /// - `NameTaken` / `PhoneTaken` for unique conflicts.
    pub fn create_organization(
        &self,
        request: NewOrganization,
    ) -> Result<OrganizationDto, CatalogServiceError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(CatalogServiceError::InvalidName);
        }
        let normalized = NewOrganization {
            id: request.id,
            name: name.to_string(),
            location_id: request.location_id,
            phones: normalize_phones(&request.phones)?,
            category_ids: dedup_ids(&request.category_ids),
        };
        let record = self.repo.create_organization(&normalized)?;
        Ok(assemble(&record))
    }

    /// Replaces the phone list of one organization.
    pub fn replace_phones(
        &self,
        id: OrganizationId,
        phones: &[String],
    ) -> Result<OrganizationDto, CatalogServiceError> {
        let phones = normalize_phones(phones)?;
        self.repo.replace_phones(id, &phones)?;
        self.load(id)
    }

    /// Replaces the category tags of one organization.
    pub fn replace_categories(
        &self,
        id: OrganizationId,
        category_ids: &[CategoryId],
    ) -> Result<OrganizationDto, CatalogServiceError> {
        self.repo.replace_categories(id, &dedup_ids(category_ids))?;
        self.load(id)
    }

    /// Deletes one organization with its phones and tag links.
    pub fn delete_organization(&self, id: OrganizationId) -> Result<(), CatalogServiceError> {
        self.repo.delete_organization(id).map_err(Into::into)
    }

    fn load(&self, id: OrganizationId) -> Result<OrganizationDto, CatalogServiceError> {
        self.repo
            .organization(id)?
            .map(|record| assemble(&record))
            .ok_or(CatalogServiceError::OrganizationNotFound(id))
    }
}

/// Trims a phone, collapses inner whitespace and checks its shape.
///
/// Returns `None` for anything that is not a plausible phone number.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let collapsed = WHITESPACE_RE.replace_all(raw.trim(), " ").to_string();
    if !PHONE_RE.is_match(&collapsed) {
        return None;
    }
    let digits = collapsed.chars().filter(char::is_ascii_digit).count();
    (digits >= MIN_PHONE_DIGITS).then_some(collapsed)
}

/// Normalizes every phone, dropping repeats while keeping first-seen order.
pub fn normalize_phones(raw: &[String]) -> Result<Vec<String>, CatalogServiceError> {
    let mut phones: Vec<String> = Vec::with_capacity(raw.len());
    for value in raw {
        let phone = normalize_phone(value)
            .ok_or_else(|| CatalogServiceError::InvalidPhone(value.trim().to_string()))?;
        if !phones.contains(&phone) {
            phones.push(phone);
        }
    }
    Ok(phones)
}

fn validate_coordinates(
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<(Option<f64>, Option<f64>), CatalogServiceError> {
    match (latitude, longitude) {
        (None, None) => Ok((None, None)),
        (Some(latitude), Some(longitude)) => {
            let in_range = latitude.is_finite()
                && longitude.is_finite()
                && (-90.0..=90.0).contains(&latitude)
                && (-180.0..=180.0).contains(&longitude);
            if in_range {
                Ok((Some(latitude), Some(longitude)))
            } else {
                Err(CatalogServiceError::InvalidCoordinates {
                    latitude,
                    longitude,
                })
            }
        }
        _ => Err(CatalogServiceError::IncompleteCoordinates),
    }
}

fn dedup_ids(ids: &[CategoryId]) -> Vec<CategoryId> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(*id);
        }
    }
    unique
}
