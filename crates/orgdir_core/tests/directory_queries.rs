use orgdir_core::db::open_db_in_memory;
use orgdir_core::{
    CatalogService, Category, CategoryId, CategoryService, DirectoryError, DirectoryService,
    Location, NewOrganization, OrganizationDto, SqliteCatalogRepository, SqliteCategoryRepository,
    SqliteDirectoryRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn categories(conn: &Connection) -> CategoryService<SqliteCategoryRepository<'_>> {
    CategoryService::new(SqliteCategoryRepository::try_new(conn).unwrap())
}

fn catalog(conn: &Connection) -> CatalogService<SqliteCatalogRepository<'_>> {
    CatalogService::new(SqliteCatalogRepository::try_new(conn).unwrap())
}

fn directory(conn: &Connection) -> DirectoryService<SqliteDirectoryRepository<'_>> {
    DirectoryService::new(SqliteDirectoryRepository::try_new(conn).unwrap())
}

fn add_organization(
    conn: &Connection,
    name: &str,
    location: &Location,
    phones: &[&str],
    tags: &[&Category],
) -> OrganizationDto {
    let mut request = NewOrganization::new(name, location.id);
    request.phones = phones.iter().map(|phone| phone.to_string()).collect();
    request.category_ids = tags.iter().map(|category| category.id).collect();
    catalog(conn).create_organization(request).unwrap()
}

fn names(organizations: &[OrganizationDto]) -> Vec<&str> {
    organizations
        .iter()
        .map(|organization| organization.name.as_str())
        .collect()
}

struct Fixture {
    food: Category,
    meat: Category,
    dairy: Category,
    cheese: Category,
    cars: Category,
    lenina: Location,
    blyukhera: Location,
    vacant: Location,
}

fn seed(conn: &Connection) -> Fixture {
    let categories = categories(conn);
    let food = categories.create_category("Food", None).unwrap();
    let meat = categories.create_category("Meat", Some(food.id)).unwrap();
    let dairy = categories.create_category("Dairy", Some(food.id)).unwrap();
    let cheese = categories.create_category("Cheese", Some(dairy.id)).unwrap();
    let cars = categories.create_category("Cars", None).unwrap();

    let catalog = catalog(conn);
    let lenina = catalog
        .create_location("Lenina 1, office 3", Some(55.7558), Some(37.6173))
        .unwrap();
    let blyukhera = catalog
        .create_location("Blyukhera 32/1", Some(55.0302), Some(82.9204))
        .unwrap();
    let vacant = catalog.create_location("Vacant 7", None, None).unwrap();

    add_organization(
        conn,
        "Horns and Hooves",
        &lenina,
        &["2-222-222", "3-333-333"],
        &[&meat],
    );
    add_organization(
        conn,
        "Milk Farm",
        &lenina,
        &["8-923-666-13-13"],
        &[&food, &dairy],
    );
    add_organization(conn, "Auto Parts", &blyukhera, &[], &[&cars]);

    Fixture {
        food,
        meat,
        dairy,
        cheese,
        cars,
        lenina,
        blyukhera,
        vacant,
    }
}

#[test]
fn by_location_lists_attached_organizations_by_name() {
    let conn = setup();
    let fixture = seed(&conn);
    let directory = directory(&conn);

    let at_lenina = directory.organizations_at_location(fixture.lenina.id).unwrap();
    assert_eq!(names(&at_lenina), vec!["Horns and Hooves", "Milk Farm"]);
    assert!(at_lenina
        .iter()
        .all(|organization| organization.address == "Lenina 1, office 3"));

    let at_blyukhera = directory
        .organizations_at_location(fixture.blyukhera.id)
        .unwrap();
    assert_eq!(names(&at_blyukhera), vec!["Auto Parts"]);
}

#[test]
fn by_location_distinguishes_unknown_from_empty() {
    let conn = setup();
    let fixture = seed(&conn);
    let directory = directory(&conn);

    assert!(matches!(
        directory.organizations_at_location(fixture.vacant.id),
        Err(DirectoryError::NoOrganizationsAtLocation(id)) if id == fixture.vacant.id
    ));
    let ghost = Uuid::new_v4();
    assert!(matches!(
        directory.organizations_at_location(ghost),
        Err(DirectoryError::LocationNotFound(id)) if id == ghost
    ));
}

#[test]
fn exact_category_does_not_expand_descendants() {
    let conn = setup();
    let fixture = seed(&conn);
    let directory = directory(&conn);

    let meat = directory.organizations_by_category(fixture.meat.id).unwrap();
    assert_eq!(names(&meat), vec!["Horns and Hooves"]);

    let food = directory.organizations_by_category(fixture.food.id).unwrap();
    assert_eq!(names(&food), vec!["Milk Farm"]);

    assert!(matches!(
        directory.organizations_by_category(fixture.cheese.id),
        Err(DirectoryError::NoOrganizationsFound)
    ));
}

#[test]
fn subtree_includes_descendant_tags_once() {
    let conn = setup();
    let fixture = seed(&conn);
    let directory = directory(&conn);

    let food_tree = directory
        .organizations_in_category_tree(fixture.food.id)
        .unwrap();
    assert_eq!(names(&food_tree), vec!["Horns and Hooves", "Milk Farm"]);

    let dairy_tree = directory
        .organizations_in_category_tree(fixture.dairy.id)
        .unwrap();
    assert_eq!(names(&dairy_tree), vec!["Milk Farm"]);

    let cars_tree = directory
        .organizations_in_category_tree(fixture.cars.id)
        .unwrap();
    assert_eq!(names(&cars_tree), vec!["Auto Parts"]);
}

#[test]
fn tagging_with_any_descendant_surfaces_in_subtree_query() {
    let conn = setup();
    let fixture = seed(&conn);
    let directory = directory(&conn);

    assert!(matches!(
        directory.organizations_in_category_tree(fixture.cheese.id),
        Err(DirectoryError::NoOrganizationsFound)
    ));

    let cheese_shop = add_organization(
        &conn,
        "Cheese Shop",
        &fixture.vacant,
        &[],
        &[&fixture.cheese],
    );

    for root in [fixture.cheese.id, fixture.dairy.id, fixture.food.id] {
        let found = directory.organizations_in_category_tree(root).unwrap();
        assert!(found.iter().any(|organization| organization.id == cheese_shop.id));
    }
}

#[test]
fn parent_subtree_matches_child_tag_but_exact_parent_does_not() {
    let conn = setup();
    let categories = categories(&conn);
    let a = categories.create_category("A", None).unwrap();
    let b = categories.create_category("B", Some(a.id)).unwrap();
    let location = catalog(&conn).create_location("Main st 1", None, None).unwrap();
    let tagged = add_organization(&conn, "Tagged With B", &location, &[], &[&b]);
    let directory = directory(&conn);

    let subtree = directory.organizations_in_category_tree(a.id).unwrap();
    assert_eq!(subtree, vec![tagged]);
    assert!(matches!(
        directory.organizations_by_category(a.id),
        Err(DirectoryError::NoOrganizationsFound)
    ));
}

#[test]
fn unknown_category_is_empty_for_exact_but_not_found_for_subtree() {
    let conn = setup();
    seed(&conn);
    let directory = directory(&conn);
    let ghost = CategoryId::new_v4();

    assert!(matches!(
        directory.organizations_by_category(ghost),
        Err(DirectoryError::NoOrganizationsFound)
    ));
    assert!(matches!(
        directory.organizations_in_category_tree(ghost),
        Err(DirectoryError::CategoryNotFound(id)) if id == ghost
    ));
}

#[test]
fn name_search_is_case_insensitive_substring() {
    let conn = setup();
    let fixture = seed(&conn);
    add_organization(&conn, "Рога и Копыта", &fixture.vacant, &[], &[]);
    add_organization(&conn, "100% Juice", &fixture.vacant, &[], &[]);
    let directory = directory(&conn);

    let hooves = directory.search_organizations_by_name("HOOVES").unwrap();
    assert_eq!(names(&hooves), vec!["Horns and Hooves"]);

    let farm = directory.search_organizations_by_name("k fa").unwrap();
    assert_eq!(names(&farm), vec!["Milk Farm"]);

    let cyrillic = directory.search_organizations_by_name("копыта").unwrap();
    assert_eq!(names(&cyrillic), vec!["Рога и Копыта"]);

    let percent = directory.search_organizations_by_name("%").unwrap();
    assert_eq!(names(&percent), vec!["100% Juice"]);

    assert!(matches!(
        directory.search_organizations_by_name("_"),
        Err(DirectoryError::NoOrganizationsFound)
    ));
    assert!(matches!(
        directory.search_organizations_by_name("bakery"),
        Err(DirectoryError::NoOrganizationsFound)
    ));
}

#[test]
fn organization_by_id_returns_assembled_record() {
    let conn = setup();
    let fixture = seed(&conn);
    let directory = directory(&conn);
    let milk = directory
        .search_organizations_by_name("Milk Farm")
        .unwrap()
        .remove(0);

    let loaded = directory.organization_by_id(milk.id).unwrap();
    assert_eq!(loaded, milk);
    assert_eq!(loaded.address, "Lenina 1, office 3");
    assert_eq!(loaded.phones, vec!["8-923-666-13-13"]);
    assert_eq!(
        loaded
            .categories
            .iter()
            .map(|category| category.id)
            .collect::<Vec<_>>(),
        vec![fixture.dairy.id, fixture.food.id]
    );

    let ghost = Uuid::new_v4();
    assert!(matches!(
        directory.organization_by_id(ghost),
        Err(DirectoryError::OrganizationNotFound(id)) if id == ghost
    ));
}
