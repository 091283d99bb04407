//! Axis evaluation benchmarks
//!
//! Run with: `cargo bench -p xaccel-core`
//!
//! Compares the three ways of answering the descendant axis:
//! - closure strategy (DFS over parent/child edges)
//! - range strategy (one order-column scan)
//! - bounded evaluator (range scan with leaf pruning and a depth bound)
//!
//! plus the cost of encoding a tree and the libsql bulk insert.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::runtime::Runtime;
use xaccel_core::db::{DatabaseService, Layout, MemoryStore, StructuralStore, TursoStore};
use xaccel_core::encoding::encode;
use xaccel_core::models::{AxisOptions, NodeData, NodeId, Tree};
use xaccel_core::services::{AxisEvaluator, BoundedEvaluator, BoundedOptions, DepthBound};

/// Bibliography-shaped tree: venues → years → publications → five fields
fn generate_bibliography(publications: usize) -> Tree {
    let mut tree = Tree::new(NodeData::new("bib"));
    let root = tree.root();

    for venue in ["sigmod", "vldb", "icde"] {
        let venue_node = tree
            .add_child(root, NodeData::new("venue").with_content(venue))
            .unwrap();
        for year in 2000..2010 {
            let year_node = tree
                .add_child(
                    venue_node,
                    NodeData::new("year")
                        .with_content(year.to_string())
                        .with_label(format!("{}_{}", venue, year)),
                )
                .unwrap();
            for i in 0..publications / 30 {
                let publication = tree
                    .add_child(year_node, NodeData::new("article"))
                    .unwrap();
                for field in ["author", "author", "title", "pages", "year"] {
                    tree.add_child(
                        publication,
                        NodeData::new(field).with_content(format!("{} {}", field, i)),
                    )
                    .unwrap();
                }
            }
        }
    }

    tree
}

async fn ordered_store(tree: &Tree) -> (Arc<MemoryStore>, NodeId) {
    let store = Arc::new(MemoryStore::new(Layout::Ordered));
    let ids = store.insert_tree(tree).await.unwrap();
    (store, ids.get(tree.root()).unwrap())
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for size in [300, 3000] {
        let tree = generate_bibliography(size);
        group.bench_with_input(BenchmarkId::from_parameter(tree.len()), &tree, |b, tree| {
            b.iter(|| {
                let mut tree = tree.clone();
                black_box(encode(&mut tree))
            });
        });
    }

    group.finish();
}

fn bench_descendants(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut tree = generate_bibliography(3000);
    encode(&mut tree);
    let (store, root) = rt.block_on(ordered_store(&tree));

    let closure = AxisEvaluator::new(store.clone(), AxisOptions::closure());
    let range = AxisEvaluator::new(store.clone(), AxisOptions::range());
    let bounded = BoundedEvaluator::new(
        store,
        BoundedOptions::default().with_depth_bound(DepthBound::default()),
    );

    let mut group = c.benchmark_group("descendant_from_root");
    group.sample_size(20);

    group.bench_function("closure", |b| {
        b.iter(|| rt.block_on(async { black_box(closure.descendant(root).await.unwrap()) }));
    });
    group.bench_function("range", |b| {
        b.iter(|| rt.block_on(async { black_box(range.descendant(root).await.unwrap()) }));
    });
    group.bench_function("bounded", |b| {
        b.iter(|| rt.block_on(async { black_box(bounded.descendant(root).await.unwrap()) }));
    });

    group.finish();
}

/// libsql bulk insert of an encoded tree into a fresh ordered store
fn bench_turso_insert(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut tree = generate_bibliography(300);
    encode(&mut tree);

    let mut group = c.benchmark_group("turso_insert");
    group.sample_size(10); // Fewer samples for expensive operations

    group.bench_function(BenchmarkId::from_parameter(tree.len()), |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let mut total = std::time::Duration::ZERO;

                for _ in 0..iters {
                    let temp_dir = TempDir::new().unwrap();
                    let db = DatabaseService::new(temp_dir.path().join("bench.db"))
                        .await
                        .unwrap();
                    let store = TursoStore::create(Arc::new(db), Layout::Ordered)
                        .await
                        .unwrap();

                    let start = std::time::Instant::now();
                    let ids = store.insert_tree(&tree).await;
                    total += start.elapsed();

                    black_box(ids.unwrap());
                }

                total
            })
        });
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_descendants, bench_turso_insert);
criterion_main!(benches);
