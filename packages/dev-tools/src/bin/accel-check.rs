//! Axis Check Binary
//!
//! Loads an XML document, encodes it, persists it into a libsql store and then
//! either answers one axis query or cross-checks the evaluation strategies.
//!
//! # Usage
//!
//! ```bash
//! # Verify the encoding and compare closure vs range on every node
//! cargo run --bin accel-check -- dblp.xml
//!
//! # Descendants of the node labelled vldb_2023
//! cargo run --bin accel-check -- dblp.xml vldb_2023 descendant
//!
//! # Keep the database on disk and cap deep descendant scans
//! XACCEL_DB_PATH=/tmp/dblp.db XACCEL_MAX_DEPTH=3 cargo run --bin accel-check -- dblp.xml
//! ```
//!
//! # Environment Variables
//!
//! - `XACCEL_CONFIG`: JSON config file read before the overrides below
//! - `XACCEL_DB_PATH`, `XACCEL_LAYOUT`, `XACCEL_STRATEGY`,
//!   `XACCEL_MAX_DEPTH`, `XACCEL_SUBTREE_THRESHOLD`: see `xaccel_core::config`
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")
//!
//! A document whose root is (or holds) a `bib` element is grouped by venue
//! and year first; anything else is loaded as is.

use std::env;
use std::sync::Arc;

use anyhow::{bail, Context};
use serde::Serialize;
use xaccel_core::config::AcceleratorConfig;
use xaccel_core::db::{DatabaseService, IdMap, Layout, StructuralStore, TursoStore};
use xaccel_core::encoding::{encode, EncodingSummary};
use xaccel_core::loader::dblp::find_bibliography;
use xaccel_core::loader::{group_publications, parse_file};
use xaccel_core::models::{Axis, AxisResult, NodeId, Tree};
use xaccel_core::services::{
    compare_bounded, verify_encoding, AxisEvaluator, BoundedEvaluator, EncodingReport,
    StrategyComparison,
};

const ENV_CONFIG_FILE: &str = "XACCEL_CONFIG";

#[derive(Serialize)]
struct LoadReport<'a> {
    document: &'a str,
    grouped: bool,
    encoding: EncodingSummary,
    verification: EncodingReport,
    layout: Layout,
}

#[derive(Serialize)]
struct QueryReport {
    label: String,
    exact: AxisResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    bounded: Option<AxisResult>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(document) = args.first() else {
        bail!("usage: accel-check <xml-file> [label] [axis]");
    };
    let label = args.get(1);
    let axis: Axis = match args.get(2) {
        Some(name) => name.parse()?,
        None => Axis::Descendant,
    };

    let config = load_config()?;
    tracing::info!(
        layout = %config.layout,
        database = ?config.database_path,
        "Loaded configuration"
    );

    let source = parse_file(document).with_context(|| format!("Failed to load {}", document))?;
    let grouped = find_bibliography(&source).is_some();
    let mut tree = if grouped {
        group_publications(&source)?
    } else {
        source
    };

    let encoding = encode(&mut tree);
    let verification = verify_encoding(&tree).context("Encoding invariants violated")?;

    let (store, ids) = persist(&config, &tree).await?;
    print_json(&LoadReport {
        document,
        grouped,
        encoding,
        verification,
        layout: store.layout(),
    })?;

    match label {
        Some(label) => run_query(&config, store, label, axis).await,
        None => run_comparison(&config, store, &all_ids(&tree, &ids)).await,
    }
}

fn load_config() -> anyhow::Result<AcceleratorConfig> {
    let mut config = match env::var(ENV_CONFIG_FILE) {
        Ok(path) => AcceleratorConfig::from_json_file(&path)?,
        Err(_) => AcceleratorConfig::default(),
    };
    config.apply_overrides(|name| env::var(name).ok())?;
    Ok(config)
}

async fn persist(
    config: &AcceleratorConfig,
    tree: &Tree,
) -> anyhow::Result<(Arc<TursoStore>, IdMap)> {
    let db = match &config.database_path {
        Some(path) => {
            tracing::info!("📦 Database: {}", path.display());
            DatabaseService::new(path.clone()).await?
        }
        None => DatabaseService::new_in_memory().await?,
    };

    let store = TursoStore::create(Arc::new(db), config.layout).await?;
    let ids = store
        .insert_tree(tree)
        .await
        .context("Failed to persist tree (use a fresh XACCEL_DB_PATH for each run)")?;

    Ok((Arc::new(store), ids))
}

async fn run_query(
    config: &AcceleratorConfig,
    store: Arc<TursoStore>,
    label: &str,
    axis: Axis,
) -> anyhow::Result<()> {
    let contexts = store.find_by_label(label).await?;
    if contexts.is_empty() {
        bail!("No node labelled '{}'", label);
    }

    let evaluator = AxisEvaluator::new(store.clone(), config.axis_options());
    let bounded = (config.depth_bound().is_some() && store.layout() == Layout::Ordered)
        .then(|| BoundedEvaluator::new(store.clone(), config.bounded_options()));

    for context in contexts {
        let exact = evaluator.evaluate(context.id, axis).await?;
        let bounded = match &bounded {
            Some(bounded) => Some(bounded.evaluate(context.id, axis).await?),
            None => None,
        };

        print_json(&QueryReport {
            label: label.to_string(),
            exact,
            bounded,
        })?;
    }

    Ok(())
}

async fn run_comparison(
    config: &AcceleratorConfig,
    store: Arc<TursoStore>,
    contexts: &[NodeId],
) -> anyhow::Result<()> {
    if !store.layout().supports_range() {
        tracing::warn!("Edge layout cannot run the range strategy; skipping comparison");
        return Ok(());
    }

    let strategies = StrategyComparison::run(store.clone(), contexts, &Axis::ALL).await?;
    print_json(&strategies)?;

    let bounded = compare_bounded(store, config.bounded_options(), contexts).await?;
    print_json(&bounded)?;

    if !strategies.is_consistent() || !bounded.is_consistent() {
        bail!(
            "{} strategy mismatches, {} bounded mismatches",
            strategies.mismatches.len(),
            bounded.mismatches.len()
        );
    }

    tracing::info!(checked = strategies.checked, "✅ Strategies agree");
    Ok(())
}

fn all_ids(tree: &Tree, ids: &IdMap) -> Vec<NodeId> {
    tree.indices().filter_map(|index| ids.get(index)).collect()
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
