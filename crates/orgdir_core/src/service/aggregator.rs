//! Organization DTO assembly.
//!
//! # Invariants
//! - `assemble` is a pure mapping; it never touches storage.
//! - Output order follows input id order.
//! - An id that does not resolve fails the whole batch.

use crate::model::organization::{
    CategoryRef, OrganizationDto, OrganizationId, OrganizationRecord,
};
use crate::repo::directory_repo::DirectoryRepository;
use crate::service::directory_service::DirectoryError;

/// Maps one loaded organization onto its response shape.
pub fn assemble(record: &OrganizationRecord) -> OrganizationDto {
    OrganizationDto {
        id: record.id,
        name: record.name.clone(),
        address: record.address.clone(),
        phones: record.phones.clone(),
        categories: record.categories.iter().map(CategoryRef::from).collect(),
    }
}

/// Loads and assembles every id in order.
///
/// # Errors
/// - `OrganizationNotFound` for the first id that does not resolve.
pub fn assemble_all<R>(
    repo: &R,
    ids: &[OrganizationId],
) -> Result<Vec<OrganizationDto>, DirectoryError>
where
    R: DirectoryRepository + ?Sized,
{
    ids.iter()
        .map(|id| {
            repo.organization(*id)?
                .map(|record| assemble(&record))
                .ok_or(DirectoryError::OrganizationNotFound(*id))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::assemble;
    use crate::model::category::Category;
    use crate::model::organization::{CategoryRef, OrganizationRecord};
    use uuid::Uuid;

    #[test]
    fn assemble_flattens_categories_and_keeps_address_only() {
        let root = Category::new("Food", None);
        let child = Category::new("Dairy", Some(root.id));
        let record = OrganizationRecord {
            id: Uuid::new_v4(),
            name: "Horns and Hooves".to_string(),
            location_id: Uuid::new_v4(),
            address: "Lenina 1, office 3".to_string(),
            phones: vec!["2-222-222".to_string(), "8-923-666-13-13".to_string()],
            categories: vec![child.clone(), root.clone()],
        };

        let dto = assemble(&record);

        assert_eq!(dto.id, record.id);
        assert_eq!(dto.name, "Horns and Hooves");
        assert_eq!(dto.address, "Lenina 1, office 3");
        assert_eq!(dto.phones, record.phones);
        assert_eq!(
            dto.categories,
            vec![
                CategoryRef {
                    id: child.id,
                    name: "Dairy".to_string()
                },
                CategoryRef {
                    id: root.id,
                    name: "Food".to_string()
                },
            ]
        );
    }

    #[test]
    fn assemble_handles_organization_without_phones_or_tags() {
        let record = OrganizationRecord {
            id: Uuid::new_v4(),
            name: "Empty Shell".to_string(),
            location_id: Uuid::new_v4(),
            address: "Nowhere 0".to_string(),
            phones: Vec::new(),
            categories: Vec::new(),
        };

        let dto = assemble(&record);
        assert!(dto.phones.is_empty());
        assert!(dto.categories.is_empty());
    }
}
