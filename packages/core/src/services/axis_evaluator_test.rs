use super::*;
use crate::db::{IdMap, MemoryStore};
use crate::encoding::encode;
use crate::models::{AncestorScope, AxisStatus, NodeData, NodeIndex, SiblingFilter, Tree};

/// `root -> A -> B -> C`
fn chain() -> (Tree, Vec<NodeIndex>) {
    let mut tree = Tree::new(NodeData::new("root"));
    let a = tree.add_child(tree.root(), NodeData::new("A")).unwrap();
    let b = tree.add_child(a, NodeData::new("B")).unwrap();
    let c = tree.add_child(b, NodeData::new("C")).unwrap();
    let root = tree.root();
    (tree, vec![root, a, b, c])
}

/// `P(X, Y, Z)`
fn siblings() -> (Tree, Vec<NodeIndex>) {
    let mut tree = Tree::new(NodeData::new("P"));
    let root = tree.root();
    let x = tree.add_child(root, NodeData::new("X")).unwrap();
    let y = tree.add_child(root, NodeData::new("Y")).unwrap();
    let z = tree.add_child(root, NodeData::new("Z")).unwrap();
    (tree, vec![root, x, y, z])
}

async fn ordered(mut tree: Tree) -> (Arc<MemoryStore>, IdMap) {
    encode(&mut tree);
    let store = Arc::new(MemoryStore::new(Layout::Ordered));
    let ids = store.insert_tree(&tree).await.unwrap();
    (store, ids)
}

fn evaluator(store: Arc<MemoryStore>, options: AxisOptions) -> AxisEvaluator {
    AxisEvaluator::new(store, options)
}

fn id(ids: &IdMap, index: NodeIndex) -> NodeId {
    ids.get(index).unwrap()
}

fn id_set(ids: &IdMap, indices: &[NodeIndex]) -> Vec<NodeId> {
    let mut set: Vec<NodeId> = indices.iter().map(|i| id(ids, *i)).collect();
    set.sort_unstable();
    set
}

#[tokio::test]
async fn test_chain_scenario_range() {
    let (tree, n) = chain();
    let (store, ids) = ordered(tree).await;
    let eval = evaluator(store, AxisOptions::range());

    let ancestors = eval.ancestor(id(&ids, n[3])).await.unwrap();
    assert_eq!(ancestors.status, AxisStatus::Matched);
    assert_eq!(ancestors.sorted_ids(), id_set(&ids, &[n[0], n[1], n[2]]));

    let descendants = eval.descendant(id(&ids, n[0])).await.unwrap();
    assert_eq!(descendants.ids(), vec![3, 2, 1]);
}

#[tokio::test]
async fn test_sibling_scenario() {
    let (tree, n) = siblings();
    let (store, ids) = ordered(tree).await;

    for options in [AxisOptions::closure(), AxisOptions::range()] {
        let eval = evaluator(store.clone(), options);

        let after_x = eval.following_sibling(id(&ids, n[1])).await.unwrap();
        assert_eq!(after_x.ids(), vec![id(&ids, n[2]), id(&ids, n[3])]);

        let before_z = eval.preceding_sibling(id(&ids, n[3])).await.unwrap();
        assert_eq!(before_z.ids(), vec![id(&ids, n[1]), id(&ids, n[2])]);

        let after_z = eval.following_sibling(id(&ids, n[3])).await.unwrap();
        assert_eq!(after_z.status, AxisStatus::Matched);
        assert!(after_z.rows.is_empty());

        let before_x = eval.preceding_sibling(id(&ids, n[1])).await.unwrap();
        assert!(before_x.rows.is_empty());
    }
}

#[tokio::test]
async fn test_boundaries() {
    let (tree, n) = chain();
    let (store, ids) = ordered(tree).await;
    let eval = evaluator(store, AxisOptions::default());

    let root = id(&ids, n[0]);
    let root_ancestors = eval.ancestor(root).await.unwrap();
    assert!(root_ancestors.rows.is_empty());
    assert_eq!(root_ancestors.status, AxisStatus::NoParent { id: root });

    let root_siblings = eval.following_sibling(root).await.unwrap();
    assert_eq!(root_siblings.status, AxisStatus::NoParent { id: root });

    let leaf = eval.descendant(id(&ids, n[3])).await.unwrap();
    assert_eq!(leaf.status, AxisStatus::Matched);
    assert!(leaf.rows.is_empty());
}

#[tokio::test]
async fn test_unknown_id_reports_not_found() {
    let (tree, _) = chain();
    let (store, _) = ordered(tree).await;
    let eval = evaluator(store, AxisOptions::default());

    for axis in Axis::ALL {
        let result = eval.evaluate(999, axis).await.unwrap();
        assert_eq!(result.status, AxisStatus::NodeNotFound { id: 999 });
        assert!(result.rows.is_empty());
    }
}

#[tokio::test]
async fn test_auto_strategy_follows_layout() {
    let ordered_store = Arc::new(MemoryStore::new(Layout::Ordered));
    let edge_store = Arc::new(MemoryStore::new(Layout::Edge));

    assert_eq!(
        AxisEvaluator::new(ordered_store, AxisOptions::default()).strategy_name(),
        "range"
    );
    assert_eq!(
        AxisEvaluator::new(edge_store, AxisOptions::default()).strategy_name(),
        "closure"
    );
}

#[tokio::test]
async fn test_range_on_edge_layout_is_an_error() {
    let (tree, n) = chain();
    let store = Arc::new(MemoryStore::new(Layout::Edge));
    let ids = store.insert_tree(&tree).await.unwrap();

    let eval = AxisEvaluator::new(store, AxisOptions::range());
    let root = id(&ids, n[0]);
    let leaf = id(&ids, n[3]);

    for (context, axis) in [
        (root, Axis::Descendant),
        (root, Axis::Ancestor),
        (root, Axis::FollowingSibling),
        (leaf, Axis::PrecedingSibling),
        (999, Axis::Descendant),
        (999, Axis::Ancestor),
    ] {
        let result = eval.evaluate(context, axis).await;
        assert!(
            matches!(result, Err(AxisError::LayoutMismatch { .. })),
            "{} of {} gave {:?}",
            axis,
            context,
            result
        );
    }
}

#[tokio::test]
async fn test_strategies_agree_on_every_node_and_axis() {
    let mut tree = Tree::new(NodeData::new("bib"));
    let root = tree.root();
    for v in 0..3 {
        let venue = tree.add_child(root, NodeData::new("venue")).unwrap();
        for y in 0..2 {
            let year = tree.add_child(venue, NodeData::new("year")).unwrap();
            for p in 0..(v + y + 1) {
                let kind = if p % 2 == 0 { "article" } else { "inproceedings" };
                let publication = tree.add_child(year, NodeData::new(kind)).unwrap();
                tree.add_child(publication, NodeData::new("title")).unwrap();
            }
        }
    }

    let (store, _) = ordered(tree).await;
    let closure = evaluator(store.clone(), AxisOptions::closure());
    let range = evaluator(store.clone(), AxisOptions::range());

    let total = store.node_count().await.unwrap();
    for context in 1..=total {
        for axis in Axis::ALL {
            let a = closure.evaluate(context, axis).await.unwrap();
            let b = range.evaluate(context, axis).await.unwrap();
            assert_eq!(a.status, b.status, "{} {}", context, axis);
            assert_eq!(a.sorted_ids(), b.sorted_ids(), "{} {}", context, axis);
        }
    }
}

#[tokio::test]
async fn test_same_type_sibling_filter() {
    let mut tree = Tree::new(NodeData::new("year"));
    let root = tree.root();
    let first = tree.add_child(root, NodeData::new("article")).unwrap();
    tree.add_child(root, NodeData::new("inproceedings")).unwrap();
    let third = tree.add_child(root, NodeData::new("article")).unwrap();

    let (store, ids) = ordered(tree).await;
    for options in [AxisOptions::closure(), AxisOptions::range()] {
        let eval = evaluator(
            store.clone(),
            options.with_sibling_filter(SiblingFilter::SameTypeAsContext),
        );
        let result = eval.following_sibling(id(&ids, first)).await.unwrap();
        assert_eq!(result.ids(), vec![id(&ids, third)]);
    }
}

#[tokio::test]
async fn test_shared_value_ancestor_scope() {
    let mut tree = Tree::new(NodeData::new("bib"));
    let root = tree.root();
    let first = tree.add_child(root, NodeData::new("article")).unwrap();
    let author = tree
        .add_child(first, NodeData::new("author").with_content("Nikolaus Augsten"))
        .unwrap();
    let second = tree.add_child(root, NodeData::new("article")).unwrap();
    tree.add_child(second, NodeData::new("author").with_content("Nikolaus Augsten"))
        .unwrap();
    let third = tree.add_child(root, NodeData::new("article")).unwrap();
    tree.add_child(third, NodeData::new("author").with_content("Someone Else"))
        .unwrap();

    let (store, ids) = ordered(tree).await;

    let identity = evaluator(store.clone(), AxisOptions::default());
    let by_node = identity.ancestor(id(&ids, author)).await.unwrap();
    assert_eq!(by_node.sorted_ids(), id_set(&ids, &[root, first]));

    for options in [AxisOptions::closure(), AxisOptions::range()] {
        let shared = evaluator(
            store.clone(),
            options.with_ancestor_scope(AncestorScope::shared_value(["author"])),
        );
        let by_value = shared.ancestor(id(&ids, author)).await.unwrap();
        assert_eq!(by_value.sorted_ids(), id_set(&ids, &[root, first, second]));
    }
}

#[tokio::test]
async fn test_encoding_survives_rebuild() {
    let (mut first, _) = chain();
    encode(&mut first);
    let before: Vec<_> = first.iter().map(|(_, node)| node.order).collect();

    let (mut rebuilt, _) = chain();
    encode(&mut rebuilt);
    let after: Vec<_> = rebuilt.iter().map(|(_, node)| node.order).collect();

    assert_eq!(before, after);
}
