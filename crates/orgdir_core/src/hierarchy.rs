//! Category forest rules: depth validation and descendant closure.
//!
//! # Responsibility
//! - Gate every category insert/update against the level bound.
//! - Expand a category into the full set of its descendants.
//!
//! # Invariants
//! - The forest never holds more than `MAX_CATEGORY_LEVELS` levels
//!   (root, child, grandchild).
//! - Both algorithms read through a `CategoryGraph`; callers guarding a
//!   write must pass a graph bound to the write transaction.
//! - Closure expansion is general: it iterates to a fixed point and does not
//!   assume the level bound.

use crate::model::category::{Category, CategoryId};
use crate::repo::{RepoError, RepoResult};
use log::debug;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Maximum number of levels in the category forest.
pub const MAX_CATEGORY_LEVELS: usize = 3;

/// Id-addressed read access to category rows.
pub trait CategoryGraph {
    /// Loads one category by id.
    fn category(&self, id: CategoryId) -> RepoResult<Option<Category>>;
    /// Lists ids of categories whose parent is any of `parent_ids`.
    fn child_ids(&self, parent_ids: &[CategoryId]) -> RepoResult<Vec<CategoryId>>;
}

/// Errors from hierarchy validation and expansion.
#[derive(Debug)]
pub enum HierarchyError {
    /// Expansion root does not exist.
    CategoryNotFound(CategoryId),
    /// Candidate references a parent that does not exist.
    ParentNotFound(CategoryId),
    /// Write would push the forest past the level bound.
    DepthViolation {
        category_id: CategoryId,
        levels: usize,
        max_levels: usize,
    },
    /// Re-parenting would make a category its own ancestor.
    CycleDetected {
        category_id: CategoryId,
        parent_id: CategoryId,
    },
    /// Storage failure while walking the graph.
    Repo(RepoError),
}

impl Display for HierarchyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CategoryNotFound(id) => write!(f, "category not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent category not found: {id}"),
            Self::DepthViolation {
                category_id,
                levels,
                max_levels,
            } => write!(
                f,
                "category {category_id} would create {levels} tree levels; at most {max_levels} allowed"
            ),
            Self::CycleDetected {
                category_id,
                parent_id,
            } => write!(
                f,
                "category {category_id} cannot be placed under its descendant {parent_id}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for HierarchyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for HierarchyError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for HierarchyError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// Checks that writing `candidate` keeps the forest within the level bound.
///
/// A root candidate always passes. Otherwise the parent must exist, must not
/// be the candidate or one of its descendants, and the candidate's ancestor
/// levels plus its own subtree height must fit in `MAX_CATEGORY_LEVELS`.
/// Never mutates anything.
pub fn validate_category<G>(candidate: &Category, graph: &G) -> Result<(), HierarchyError>
where
    G: CategoryGraph + ?Sized,
{
    let Some(parent_id) = candidate.parent_id else {
        return Ok(());
    };

    if parent_id == candidate.id {
        return Err(HierarchyError::CycleDetected {
            category_id: candidate.id,
            parent_id,
        });
    }

    let ancestors = ancestor_chain(graph, parent_id, MAX_CATEGORY_LEVELS)?;
    if ancestors.is_empty() {
        return Err(HierarchyError::ParentNotFound(parent_id));
    }
    if ancestors.iter().any(|ancestor| ancestor.id == candidate.id) {
        return Err(HierarchyError::CycleDetected {
            category_id: candidate.id,
            parent_id,
        });
    }

    let below = subtree_height(candidate.id, graph)?;
    let levels = ancestors.len() + 1 + below;
    debug!(
        "event=category_validate module=hierarchy status=checked ancestors={} below={} levels={}",
        ancestors.len(),
        below,
        levels
    );
    if levels > MAX_CATEGORY_LEVELS {
        return Err(HierarchyError::DepthViolation {
            category_id: candidate.id,
            levels,
            max_levels: MAX_CATEGORY_LEVELS,
        });
    }
    Ok(())
}

/// Walks parent references upward starting at `start`, returning at most
/// `max_depth` resolved categories nearest-first.
///
/// The walk stops at a root, at an unresolved reference, or when a node
/// repeats.
pub fn ancestor_chain<G>(
    graph: &G,
    start: CategoryId,
    max_depth: usize,
) -> RepoResult<Vec<Category>>
where
    G: CategoryGraph + ?Sized,
{
    let mut chain: Vec<Category> = Vec::new();
    let mut cursor = Some(start);
    while let Some(current) = cursor {
        if chain.len() >= max_depth || chain.iter().any(|node| node.id == current) {
            break;
        }
        let Some(node) = graph.category(current)? else {
            break;
        };
        cursor = node.parent_id;
        chain.push(node);
    }
    Ok(chain)
}

/// Returns `root` plus every category reachable by following child links.
///
/// # Errors
/// - `CategoryNotFound` when `root` does not exist.
pub fn descendants<G>(root: CategoryId, graph: &G) -> Result<HashSet<CategoryId>, HierarchyError>
where
    G: CategoryGraph + ?Sized,
{
    if graph.category(root)?.is_none() {
        return Err(HierarchyError::CategoryNotFound(root));
    }
    let levels = expand_levels(root, graph)?;
    debug!(
        "event=category_descendants module=hierarchy status=ok rounds={} size={}",
        levels.len() - 1,
        levels.iter().map(Vec::len).sum::<usize>()
    );
    Ok(levels.into_iter().flatten().collect())
}

/// Number of levels strictly below `id`; zero for a leaf or unknown id.
pub fn subtree_height<G>(id: CategoryId, graph: &G) -> RepoResult<usize>
where
    G: CategoryGraph + ?Sized,
{
    Ok(expand_levels(id, graph)?.len() - 1)
}

/// Breadth-first expansion until a round adds no new id. The first level is
/// always `[root]`.
fn expand_levels<G>(root: CategoryId, graph: &G) -> RepoResult<Vec<Vec<CategoryId>>>
where
    G: CategoryGraph + ?Sized,
{
    let mut seen = HashSet::from([root]);
    let mut levels = vec![vec![root]];
    loop {
        let fresh = match levels.last() {
            Some(frontier) => graph
                .child_ids(frontier)?
                .into_iter()
                .filter(|id| seen.insert(*id))
                .collect::<Vec<_>>(),
            None => break,
        };
        if fresh.is_empty() {
            break;
        }
        levels.push(fresh);
    }
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::{
        ancestor_chain, descendants, subtree_height, validate_category, CategoryGraph,
        HierarchyError, MAX_CATEGORY_LEVELS,
    };
    use crate::model::category::{Category, CategoryId};
    use crate::repo::RepoResult;
    use std::collections::{HashMap, HashSet};

    #[derive(Default)]
    struct MemoryGraph {
        nodes: HashMap<CategoryId, Category>,
    }

    impl MemoryGraph {
        fn add(&mut self, name: &str, parent: Option<&Category>) -> Category {
            let category = Category::new(name, parent.map(|p| p.id));
            self.nodes.insert(category.id, category.clone());
            category
        }
    }

    impl CategoryGraph for MemoryGraph {
        fn category(&self, id: CategoryId) -> RepoResult<Option<Category>> {
            Ok(self.nodes.get(&id).cloned())
        }

        fn child_ids(&self, parent_ids: &[CategoryId]) -> RepoResult<Vec<CategoryId>> {
            Ok(self
                .nodes
                .values()
                .filter(|node| node.parent_id.is_some_and(|p| parent_ids.contains(&p)))
                .map(|node| node.id)
                .collect())
        }
    }

    #[test]
    fn root_candidate_passes_trivially() {
        let graph = MemoryGraph::default();
        validate_category(&Category::new("Food", None), &graph).unwrap();
    }

    #[test]
    fn third_level_passes_and_fourth_level_is_rejected() {
        let mut graph = MemoryGraph::default();
        let a = graph.add("A", None);
        let b = graph.add("B", Some(&a));
        validate_category(&Category::new("C", Some(b.id)), &graph).unwrap();
        let c = graph.add("C", Some(&b));

        let d = Category::new("D", Some(c.id));
        let err = validate_category(&d, &graph).unwrap_err();
        assert!(matches!(
            err,
            HierarchyError::DepthViolation { category_id, levels: 4, max_levels }
                if category_id == d.id && max_levels == MAX_CATEGORY_LEVELS
        ));
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let graph = MemoryGraph::default();
        let orphan = Category::new("Orphan", Some(uuid::Uuid::new_v4()));
        let err = validate_category(&orphan, &graph).unwrap_err();
        assert!(matches!(err, HierarchyError::ParentNotFound(id) if Some(id) == orphan.parent_id));
    }

    #[test]
    fn reparenting_under_descendant_is_a_cycle() {
        let mut graph = MemoryGraph::default();
        let a = graph.add("A", None);
        let b = graph.add("B", Some(&a));

        let moved = Category::with_id(a.id, "A", Some(b.id));
        let err = validate_category(&moved, &graph).unwrap_err();
        assert!(matches!(err, HierarchyError::CycleDetected { category_id, .. } if category_id == a.id));

        let onto_self = Category::with_id(b.id, "B", Some(b.id));
        assert!(matches!(
            validate_category(&onto_self, &graph).unwrap_err(),
            HierarchyError::CycleDetected { .. }
        ));
    }

    #[test]
    fn moving_a_subtree_counts_its_own_height() {
        let mut graph = MemoryGraph::default();
        let a = graph.add("A", None);
        let x = graph.add("X", None);
        let y = graph.add("Y", Some(&x));

        // X -> Y under A would give A -> X -> Y: three levels, fine.
        validate_category(&Category::with_id(x.id, "X", Some(a.id)), &graph).unwrap();

        let b = graph.add("B", Some(&a));
        // X -> Y under B would give A -> B -> X -> Y.
        let err = validate_category(&Category::with_id(x.id, "X", Some(b.id)), &graph).unwrap_err();
        assert!(matches!(err, HierarchyError::DepthViolation { levels: 4, .. }));
        assert_eq!(subtree_height(x.id, &graph).unwrap(), 1);
        assert_eq!(subtree_height(y.id, &graph).unwrap(), 0);
    }

    #[test]
    fn ancestor_chain_is_nearest_first_and_bounded() {
        let mut graph = MemoryGraph::default();
        let a = graph.add("A", None);
        let b = graph.add("B", Some(&a));
        let c = graph.add("C", Some(&b));

        let chain = ancestor_chain(&graph, c.id, 5).unwrap();
        let names = chain.iter().map(|node| node.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["C", "B", "A"]);
        assert_eq!(ancestor_chain(&graph, c.id, 2).unwrap().len(), 2);
    }

    #[test]
    fn descendants_include_root_and_whole_subtree_only() {
        let mut graph = MemoryGraph::default();
        let food = graph.add("Food", None);
        let meat = graph.add("Meat", Some(&food));
        let dairy = graph.add("Dairy", Some(&food));
        let cheese = graph.add("Cheese", Some(&dairy));
        let cars = graph.add("Cars", None);
        graph.add("Parts", Some(&cars));

        let closure = descendants(food.id, &graph).unwrap();
        let expected = HashSet::from([food.id, meat.id, dairy.id, cheese.id]);
        assert_eq!(closure, expected);

        for id in &closure {
            let nested = descendants(*id, &graph).unwrap();
            assert!(nested.is_subset(&closure));
            assert!(nested.contains(id));
        }
    }

    #[test]
    fn descendants_of_unknown_root_fail() {
        let graph = MemoryGraph::default();
        let missing = uuid::Uuid::new_v4();
        let err = descendants(missing, &graph).unwrap_err();
        assert!(matches!(err, HierarchyError::CategoryNotFound(id) if id == missing));
    }

    #[test]
    fn expansion_is_not_capped_at_the_level_bound() {
        let mut graph = MemoryGraph::default();
        let mut parent = graph.add("L0", None);
        let root = parent.clone();
        for level in 1..6 {
            parent = graph.add(&format!("L{level}"), Some(&parent));
        }
        assert_eq!(descendants(root.id, &graph).unwrap().len(), 6);
    }

    #[test]
    fn expansion_terminates_on_cyclic_rows() {
        let mut graph = MemoryGraph::default();
        let a = graph.add("A", None);
        let b = graph.add("B", Some(&a));
        graph
            .nodes
            .insert(a.id, Category::with_id(a.id, "A", Some(b.id)));

        let closure = descendants(a.id, &graph).unwrap();
        assert_eq!(closure, HashSet::from([a.id, b.id]));
    }
}
