//! Document Loading
//!
//! Turns XML text into a [`Tree`](crate::models::Tree) ready for encoding.
//! `dblp` reshapes a bibliography into the venue/year hierarchy.

pub mod dblp;
mod xml;

pub use dblp::{group_publications, GroupingSummary, Venue};
pub use xml::{parse_document, parse_file, resolve_entity, LoadError};
