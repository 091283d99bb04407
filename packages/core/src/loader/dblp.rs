//! DBLP venue grouping
//!
//! Reshapes a flat DBLP bibliography into `bib → venue → year → publication`.
//! Only SIGMOD, VLDB and ICDE publications with a year are kept; everything
//! else is dropped and counted.

use crate::loader::xml::LoadError;
use crate::models::{NodeData, NodeIndex, Tree};
use serde::{Deserialize, Serialize};
use std::fmt;

const PUBLICATION_TYPES: [&str; 2] = ["article", "inproceedings"];
const SKIPPED_FIELDS: [&str; 2] = ["mdate", "orcid"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Sigmod,
    Vldb,
    Icde,
}

impl Venue {
    /// Venue of a DBLP record key such as `journals/pvldb/SchmittKAMM23`
    pub fn classify(key: &str) -> Option<Venue> {
        if key.starts_with("conf/sigmod") || key.starts_with("journals/pacmmod") {
            Some(Venue::Sigmod)
        } else if key.starts_with("conf/vldb") || key.starts_with("journals/pvldb") {
            Some(Venue::Vldb)
        } else if key.starts_with("conf/icde") {
            Some(Venue::Icde)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::Sigmod => "sigmod",
            Venue::Vldb => "vldb",
            Venue::Icde => "icde",
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts of a grouping run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingSummary {
    pub venues: usize,
    pub years: usize,
    pub publications: usize,
    pub dropped: usize,
}

/// Locate the `bib` element: the root itself or one of its children
pub fn find_bibliography(tree: &Tree) -> Option<NodeIndex> {
    let root = tree.root();
    if tree.data(root).ok()?.node_type == "bib" {
        return Some(root);
    }

    tree.children(root)
        .ok()?
        .iter()
        .copied()
        .find(|child| matches!(tree.data(*child), Ok(data) if data.node_type == "bib"))
}

/// Build the grouped tree from a parsed bibliography
pub fn group_publications(source: &Tree) -> Result<Tree, LoadError> {
    group_publications_with_summary(source).map(|(tree, _)| tree)
}

pub fn group_publications_with_summary(
    source: &Tree,
) -> Result<(Tree, GroupingSummary), LoadError> {
    let bib = find_bibliography(source).ok_or_else(|| LoadError::MissingBibliography {
        root: source
            .data(source.root())
            .map(|data| data.node_type.clone())
            .unwrap_or_default(),
    })?;

    // venue -> year -> publications, each in order of first appearance
    let mut groups: Vec<(Venue, Vec<(String, Vec<NodeIndex>)>)> = Vec::new();
    let mut summary = GroupingSummary::default();

    for &publication in source.children(bib)? {
        let data = source.data(publication)?;
        if !PUBLICATION_TYPES.contains(&data.node_type.as_str()) {
            continue;
        }

        let venue = data.attributes.get("key").and_then(|key| Venue::classify(key));
        let year = publication_year(source, publication)?;
        let (Some(venue), Some(year)) = (venue, year) else {
            summary.dropped += 1;
            continue;
        };

        let slot = match groups.iter().position(|(v, _)| *v == venue) {
            Some(i) => i,
            None => {
                groups.push((venue, Vec::new()));
                groups.len() - 1
            }
        };
        let years = &mut groups[slot].1;
        match years.iter_mut().find(|(y, _)| *y == year) {
            Some((_, publications)) => publications.push(publication),
            None => years.push((year, vec![publication])),
        }
        summary.publications += 1;
    }

    let mut grouped = Tree::new(NodeData::new("bib"));
    let root = grouped.root();

    for (venue, years) in &groups {
        let venue_node =
            grouped.add_child(root, NodeData::new("venue").with_content(venue.as_str()))?;
        summary.venues += 1;

        for (year, publications) in years {
            let year_node = grouped.add_child(
                venue_node,
                NodeData::new("year")
                    .with_content(year.clone())
                    .with_label(format!("{}_{}", venue, year)),
            )?;
            summary.years += 1;

            for &publication in publications {
                copy_publication(source, publication, &mut grouped, year_node)?;
            }
        }
    }

    tracing::info!(
        venues = summary.venues,
        years = summary.years,
        publications = summary.publications,
        dropped = summary.dropped,
        "Grouped bibliography by venue and year"
    );

    Ok((grouped, summary))
}

fn publication_year(tree: &Tree, publication: NodeIndex) -> Result<Option<String>, LoadError> {
    for &field in tree.children(publication)? {
        let data = tree.data(field)?;
        if data.node_type == "year" {
            return Ok(data.persisted_content().map(|text| text.trim().to_string()));
        }
    }
    Ok(None)
}

/// Copy a publication with its direct fields; the label is the short key
fn copy_publication(
    source: &Tree,
    publication: NodeIndex,
    target: &mut Tree,
    parent: NodeIndex,
) -> Result<(), LoadError> {
    let data = source.data(publication)?;

    let mut copied = NodeData::new(data.node_type.clone());
    copied.attributes = data.attributes.clone();
    if let Some(key) = data.attributes.get("key") {
        let short_key = key.rsplit('/').next().unwrap_or(key);
        copied = copied.with_label(short_key);
    }
    let node = target.add_child(parent, copied)?;

    for &field in source.children(publication)? {
        let field_data = source.data(field)?;
        if SKIPPED_FIELDS.contains(&field_data.node_type.as_str()) {
            continue;
        }

        let mut field_copy = NodeData::new(field_data.node_type.clone());
        field_copy.content = field_data.content.clone();
        target.add_child(node, field_copy)?;
    }

    Ok(())
}
