//! End-to-end tests: XML text → grouped tree → encoding → libsql → axis queries

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use xaccel_core::config::AcceleratorConfig;
use xaccel_core::db::{DatabaseService, Layout, StructuralStore, TursoStore};
use xaccel_core::encoding::encode;
use xaccel_core::loader::{group_publications, parse_file};
use xaccel_core::models::{AncestorScope, AxisOptions, SiblingFilter};
use xaccel_core::services::{
    check_pairwise_nesting, verify_encoding, AxisEvaluator, BoundedEvaluator,
};

const DBLP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<dblp>
  <bib>
    <article key="journals/pvldb/SchmittKAMM23" mdate="2023-06-01">
      <author>Daniel Ulrich Schmitt</author>
      <author>Nikolaus Augsten</author>
      <title>Two-Level Join</title>
      <year>2023</year>
    </article>
    <inproceedings key="conf/icde/AugstenBG10">
      <author>Nikolaus Augsten</author>
      <author>Michael H&ouml;hlen</author>
      <title>TASM: Top-k Approximate Subtree Matching</title>
      <year>2010</year>
    </inproceedings>
    <article key="journals/pvldb/HutterAK22">
      <author>Thomas H&uuml;tter</author>
      <title>JEDI</title>
      <year>2023</year>
    </article>
    <article key="journals/tods/Elsewhere">
      <year>2023</year>
    </article>
  </bib>
</dblp>"#;

async fn load_into(config: &AcceleratorConfig, xml_path: &PathBuf) -> Result<Arc<TursoStore>> {
    let source = parse_file(xml_path).context("parse document")?;
    let mut tree = group_publications(&source)?;
    encode(&mut tree);
    verify_encoding(&tree)?;
    check_pairwise_nesting(&tree)?;

    let db = match &config.database_path {
        Some(path) => DatabaseService::new(path.clone()).await?,
        None => DatabaseService::new_in_memory().await?,
    };
    let store = TursoStore::create(Arc::new(db), config.layout).await?;
    store.insert_tree(&tree).await?;
    Ok(Arc::new(store))
}

fn write_document(temp_dir: &TempDir) -> Result<PathBuf> {
    let path = temp_dir.path().join("dblp.xml");
    std::fs::write(&path, DBLP)?;
    Ok(path)
}

#[tokio::test]
async fn test_grouped_bibliography_is_queryable() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let xml_path = write_document(&temp_dir)?;
    let config = AcceleratorConfig {
        database_path: Some(temp_dir.path().join("dblp.db")),
        ..Default::default()
    };
    let store = load_into(&config, &xml_path).await?;

    // bib, 2 venues, 2 years, 3 publications, 11 fields
    assert_eq!(store.node_count().await?, 19);

    let evaluator = AxisEvaluator::new(store.clone(), config.axis_options());
    let year = store.find_by_label("vldb_2023").await?;
    let year_id = year.first().context("vldb_2023 missing")?.id;

    let publications = evaluator.descendant(year_id).await?;
    let titles: Vec<_> = publications
        .rows
        .iter()
        .filter(|row| row.node_type == "title")
        .filter_map(|row| row.content.clone())
        .collect();
    assert_eq!(titles, vec!["Two-Level Join", "JEDI"]);

    let icde = store.find_by_label("AugstenBG10").await?;
    let icde = icde.first().context("AugstenBG10 missing")?;
    let attributes = store.attributes(icde.id).await?;
    assert!(attributes.contains(&"key=conf/icde/AugstenBG10".to_string()));

    let authors = AxisEvaluator::new(
        store.clone(),
        AxisOptions::default().with_sibling_filter(SiblingFilter::SameTypeAsContext),
    );
    let children = store.children(icde.id).await?;
    let first_author = children.first().context("no fields")?;
    let coauthors = authors.following_sibling(first_author.id).await?;
    assert_eq!(coauthors.rows.len(), 1);
    assert_eq!(coauthors.rows[0].content.as_deref(), Some("Michael Höhlen"));
    Ok(())
}

#[tokio::test]
async fn test_shared_author_ancestors() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let xml_path = write_document(&temp_dir)?;
    let store = load_into(&AcceleratorConfig::default(), &xml_path).await?;

    let authors = store.find_by_type("author").await?;
    let augsten = authors
        .iter()
        .find(|row| row.content.as_deref() == Some("Nikolaus Augsten"))
        .context("author missing")?;

    let by_node = AxisEvaluator::new(store.clone(), AxisOptions::default());
    let by_value = AxisEvaluator::new(
        store.clone(),
        AxisOptions::default().with_ancestor_scope(AncestorScope::shared_value(["author"])),
    );

    // publication, year, venue, bib
    assert_eq!(by_node.ancestor(augsten.id).await?.rows.len(), 4);

    // both publications, both years, both venues, bib
    let shared = by_value.ancestor(augsten.id).await?;
    assert_eq!(shared.rows.len(), 7);
    let venues: Vec<_> = shared
        .rows
        .iter()
        .filter(|row| row.node_type == "venue")
        .filter_map(|row| row.content.as_deref())
        .collect();
    assert_eq!(venues.len(), 2);

    let bounded = BoundedEvaluator::new(
        store.clone(),
        config_with_shared_scope().bounded_options(),
    );
    assert_eq!(
        bounded.ancestor(augsten.id).await?.sorted_ids(),
        shared.sorted_ids()
    );
    Ok(())
}

fn config_with_shared_scope() -> AcceleratorConfig {
    AcceleratorConfig {
        ancestor_scope: AncestorScope::shared_value(["author"]),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_edge_layout_from_config() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let xml_path = write_document(&temp_dir)?;

    let mut config = AcceleratorConfig::default();
    config.apply_overrides(|name| match name {
        "XACCEL_LAYOUT" => Some("edge".to_string()),
        _ => None,
    })?;
    assert_eq!(config.layout, Layout::Edge);

    let store = load_into(&config, &xml_path).await?;
    let evaluator = AxisEvaluator::new(store.clone(), config.axis_options());
    assert_eq!(evaluator.strategy_name(), "closure");

    let root = store
        .find_by_type("bib")
        .await?
        .first()
        .map(|row| row.id)
        .context("root missing")?;
    assert_eq!(evaluator.descendant(root).await?.rows.len(), 18);

    let bounded = BoundedEvaluator::new(store, config.bounded_options());
    assert!(bounded.descendant(root).await.is_err());
    Ok(())
}
