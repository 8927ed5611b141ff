use orgdir_core::db::{open_db, open_db_in_memory};
use orgdir_core::{
    Category, CategoryId, CategoryService, CategoryServiceError, SqliteCategoryRepository,
    MAX_CATEGORY_LEVELS,
};
use rusqlite::Connection;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn service(conn: &Connection) -> CategoryService<SqliteCategoryRepository<'_>> {
    CategoryService::new(SqliteCategoryRepository::try_new(conn).unwrap())
}

fn category_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM categories;", [], |row| row.get(0))
        .unwrap()
}

fn max_depth(conn: &Connection) -> i64 {
    conn.query_row(
        "WITH RECURSIVE chain(id, depth) AS (
            SELECT id, 1 FROM categories WHERE parent_id IS NULL
            UNION ALL
            SELECT c.id, chain.depth + 1
            FROM categories c
            INNER JOIN chain ON c.parent_id = chain.id
        )
        SELECT COALESCE(MAX(depth), 0) FROM chain;",
        [],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn fourth_level_insert_is_rejected_and_store_is_unchanged() {
    let conn = setup();
    let service = service(&conn);

    let a = service.create_category("Food", None).unwrap();
    let b = service.create_category("Meat", Some(a.id)).unwrap();
    let c = service.create_category("Sausages", Some(b.id)).unwrap();
    assert_eq!(MAX_CATEGORY_LEVELS, 3);

    let err = service.create_category("Smoked", Some(c.id)).unwrap_err();
    match err {
        CategoryServiceError::DepthViolation {
            levels, max_levels, ..
        } => {
            assert_eq!(levels, 4);
            assert_eq!(max_levels, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(category_count(&conn), 3);
    assert!(service.list_children(Some(c.id)).unwrap().is_empty());
}

#[test]
fn reparenting_subtree_counts_its_own_height() {
    let conn = setup();
    let service = service(&conn);

    let food = service.create_category("Food", None).unwrap();
    let meat = service.create_category("Meat", Some(food.id)).unwrap();
    let cars = service.create_category("Cars", None).unwrap();
    let parts = service.create_category("Parts", Some(cars.id)).unwrap();

    let err = service
        .update_category(cars.id, "Cars", Some(meat.id))
        .unwrap_err();
    assert!(matches!(err, CategoryServiceError::DepthViolation { levels: 4, .. }));

    let moved = service
        .update_category(cars.id, "Vehicles", Some(food.id))
        .unwrap();
    assert_eq!(moved.parent_id, Some(food.id));
    assert_eq!(service.get_category(cars.id).unwrap().name, "Vehicles");
    assert_eq!(service.get_category(parts.id).unwrap().parent_id, Some(cars.id));
    assert_eq!(max_depth(&conn), 3);
}

#[test]
fn reparenting_under_own_descendant_is_a_cycle() {
    let conn = setup();
    let service = service(&conn);

    let a = service.create_category("A", None).unwrap();
    let b = service.create_category("B", Some(a.id)).unwrap();

    let under_child = service.update_category(a.id, "A", Some(b.id)).unwrap_err();
    assert!(matches!(
        under_child,
        CategoryServiceError::CycleDetected { category_id, parent_id }
            if category_id == a.id && parent_id == b.id
    ));

    let under_self = service.update_category(a.id, "A", Some(a.id)).unwrap_err();
    assert!(matches!(
        under_self,
        CategoryServiceError::CycleDetected { .. }
    ));
    assert!(service.get_category(a.id).unwrap().is_root());
}

#[test]
fn write_validation_reports_missing_references_and_names() {
    let conn = setup();
    let service = service(&conn);
    let ghost = CategoryId::new_v4();

    assert!(matches!(
        service.create_category("Orphan", Some(ghost)),
        Err(CategoryServiceError::ParentNotFound(id)) if id == ghost
    ));
    assert!(matches!(
        service.update_category(ghost, "Ghost", None),
        Err(CategoryServiceError::CategoryNotFound(id)) if id == ghost
    ));
    assert!(matches!(
        service.create_category("   ", None),
        Err(CategoryServiceError::InvalidName)
    ));

    service.create_category("Food", None).unwrap();
    assert!(matches!(
        service.create_category(" Food ", None),
        Err(CategoryServiceError::NameTaken(name)) if name == "Food"
    ));
    assert_eq!(category_count(&conn), 1);
}

#[test]
fn descendants_cover_whole_subtree_and_are_idempotent() {
    let conn = setup();
    let service = service(&conn);

    let food = service.create_category("Food", None).unwrap();
    let meat = service.create_category("Meat", Some(food.id)).unwrap();
    let dairy = service.create_category("Dairy", Some(food.id)).unwrap();
    let cheese = service.create_category("Cheese", Some(dairy.id)).unwrap();
    let cars = service.create_category("Cars", None).unwrap();

    let closure = service.descendants(food.id).unwrap();
    assert_eq!(
        closure,
        HashSet::from([food.id, meat.id, dairy.id, cheese.id])
    );
    assert!(!closure.contains(&cars.id));

    for id in &closure {
        let nested = service.descendants(*id).unwrap();
        assert!(nested.is_subset(&closure));
        assert!(nested.contains(id));
    }

    assert_eq!(service.descendants(cheese.id).unwrap(), HashSet::from([cheese.id]));
    assert!(matches!(
        service.descendants(CategoryId::new_v4()),
        Err(CategoryServiceError::CategoryNotFound(_))
    ));
}

#[test]
fn list_children_orders_by_name_and_delete_cascades() {
    let conn = setup();
    let service = service(&conn);

    let food = service.create_category("Food", None).unwrap();
    let meat = service.create_category("Meat", Some(food.id)).unwrap();
    let dairy = service.create_category("Dairy", Some(food.id)).unwrap();
    service.create_category("Cheese", Some(dairy.id)).unwrap();
    let cars = service.create_category("Cars", None).unwrap();

    let roots = service.list_children(None).unwrap();
    assert_eq!(
        roots.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![cars.id, food.id]
    );
    let children = service.list_children(Some(food.id)).unwrap();
    assert_eq!(
        children.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        vec!["Dairy", "Meat"]
    );

    service.delete_category(food.id).unwrap();
    assert_eq!(category_count(&conn), 1);
    assert!(matches!(
        service.get_category(meat.id),
        Err(CategoryServiceError::CategoryNotFound(_))
    ));
    assert!(matches!(
        service.delete_category(food.id),
        Err(CategoryServiceError::CategoryNotFound(_))
    ));
    assert!(matches!(
        service.list_children(Some(food.id)),
        Err(CategoryServiceError::CategoryNotFound(_))
    ));
}

#[test]
fn concurrent_writers_cannot_jointly_exceed_level_bound() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.sqlite3");

    // Food (root); Drinks (root) -> Juice.
    let conn = open_db(&path).unwrap();
    let seed = service(&conn);
    let food = seed.create_category("Food", None).unwrap();
    let drinks = seed.create_category("Drinks", None).unwrap();
    let juice = seed.create_category("Juice", Some(drinks.id)).unwrap();
    drop(seed);
    drop(conn);

    // Each write alone keeps three levels; together they would make four.
    let barrier = Arc::new(Barrier::new(2));
    let move_drinks = spawn_writer(&path, &barrier, move |service| {
        service
            .update_category(drinks.id, "Drinks", Some(food.id))
            .map(|_| ())
    });
    let add_fresh = spawn_writer(&path, &barrier, move |service| {
        service
            .create_category("Fresh", Some(juice.id))
            .map(|_| ())
    });
    let results = [move_drinks.join().unwrap(), add_fresh.join().unwrap()];

    let accepted = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(accepted, 1, "exactly one writer must win: {results:?}");
    assert!(results.iter().any(|result| matches!(
        result,
        Err(CategoryServiceError::DepthViolation { .. })
    )));

    let conn = open_db(&path).unwrap();
    assert!(max_depth(&conn) <= MAX_CATEGORY_LEVELS as i64);
}

fn spawn_writer<F>(
    path: &Path,
    barrier: &Arc<Barrier>,
    write: F,
) -> thread::JoinHandle<Result<(), CategoryServiceError>>
where
    F: FnOnce(&CategoryService<SqliteCategoryRepository<'_>>) -> Result<(), CategoryServiceError>
        + Send
        + 'static,
{
    let path = path.to_path_buf();
    let barrier = Arc::clone(barrier);
    thread::spawn(move || {
        let conn = open_db(&path).unwrap();
        let service = service(&conn);
        barrier.wait();
        write(&service)
    })
}

#[test]
fn category_rows_round_trip_through_repository() {
    let conn = setup();
    let service = service(&conn);
    let root = service.create_category("  Food  ", None).unwrap();

    let loaded: Category = service.get_category(root.id).unwrap();
    assert_eq!(loaded, Category::with_id(root.id, "Food", None));
}
