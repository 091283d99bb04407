//! XML document reader
//!
//! Streams a document with quick-xml and builds a [`Tree`] in one pass:
//! every element becomes a node, attributes are copied, trimmed text becomes
//! content, and an `id` (or else `key`) attribute becomes the node's label.

use crate::models::{NodeData, NodeIndex, Tree, TreeError};
use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::Reader;
use std::path::Path;
use thiserror::Error;

/// Errors raised while turning a document into a tree
#[derive(Error, Debug)]
pub enum LoadError {
    /// The reader rejected the input
    #[error("XML syntax error at byte {position}: {source}")]
    Syntax {
        position: u64,
        source: quick_xml::Error,
    },

    /// An attribute could not be decoded
    #[error("Malformed attribute on <{element}>: {message}")]
    Attribute { element: String, message: String },

    /// Text or attribute value with an unknown entity or bad escape
    #[error("Cannot unescape text in <{element}>: {message}")]
    Unescape { element: String, message: String },

    /// Input ended before any element
    #[error("Document has no root element")]
    EmptyDocument,

    /// Input ended inside an element
    #[error("Document ended inside <{element}>")]
    UnclosedElement { element: String },

    /// A second top-level element followed the root
    #[error("Second root element <{element}> after the document root")]
    MultipleRoots { element: String },

    /// No `bib` element to group publications from
    #[error("No <bib> element found under <{root}>")]
    MissingBibliography { root: String },

    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tree construction failed: {0}")]
    Tree(#[from] TreeError),
}

/// Named entities of the DBLP DTD that appear in publication records, plus the
/// five XML built-ins
pub fn resolve_entity(name: &str) -> Option<&'static str> {
    let value = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "auml" => "ä",
        "ouml" => "ö",
        "uuml" => "ü",
        "Auml" => "Ä",
        "Ouml" => "Ö",
        "Uuml" => "Ü",
        "szlig" => "ß",
        "aacute" => "á",
        "eacute" => "é",
        "iacute" => "í",
        "oacute" => "ó",
        "uacute" => "ú",
        "Aacute" => "Á",
        "Eacute" => "É",
        "Iacute" => "Í",
        "Oacute" => "Ó",
        "Uacute" => "Ú",
        "ccedil" => "ç",
        "Ccedil" => "Ç",
        "ntilde" => "ñ",
        "Ntilde" => "Ñ",
        "aring" => "å",
        "Aring" => "Å",
        "reg" => "®",
        "micro" => "µ",
        "times" => "×",
        _ => return None,
    };
    Some(value)
}

/// Parse `xml` into a tree rooted at its document element
///
/// # Errors
///
/// Syntax errors (including mismatched end tags), unknown entities, a missing
/// or duplicated root element, and input ending inside an element.
pub fn parse_document(xml: &str) -> Result<Tree, LoadError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut tree: Option<Tree> = None;
    let mut open: Vec<(NodeIndex, String)> = Vec::new();
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|source| LoadError::Syntax {
                position: reader.buffer_position() as u64,
                source,
            })?;

        match event {
            XmlEvent::Start(e) => {
                let (name, data) = element_data(&e)?;
                let index = attach(&mut tree, &open, &name, data)?;
                open.push((index, name));
            }
            XmlEvent::Empty(e) => {
                let (name, data) = element_data(&e)?;
                attach(&mut tree, &open, &name, data)?;
            }
            XmlEvent::End(_) => {
                open.pop();
            }
            XmlEvent::Text(t) => {
                if let (Some(tree), Some((index, name))) = (tree.as_mut(), open.last()) {
                    let text = t.unescape_with(resolve_entity).map_err(|e| LoadError::Unescape {
                        element: name.clone(),
                        message: e.to_string(),
                    })?;
                    append_text(tree, *index, &text)?;
                }
            }
            XmlEvent::CData(t) => {
                if let (Some(tree), Some((index, _))) = (tree.as_mut(), open.last()) {
                    let text = String::from_utf8_lossy(&t).into_owned();
                    append_text(tree, *index, &text)?;
                }
            }
            XmlEvent::Eof => break,
            _ => (),
        }
        buf.clear();
    }

    if let Some((_, element)) = open.pop() {
        return Err(LoadError::UnclosedElement { element });
    }

    let tree = tree.ok_or(LoadError::EmptyDocument)?;
    tracing::debug!(nodes = tree.len(), "Parsed XML document");
    Ok(tree)
}

/// Read and parse the document at `path`
pub fn parse_file(path: impl AsRef<Path>) -> Result<Tree, LoadError> {
    let xml = std::fs::read_to_string(path.as_ref())?;
    parse_document(&xml)
}

fn element_data(e: &BytesStart<'_>) -> Result<(String, NodeData), LoadError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut data = NodeData::new(name.clone());

    for attr in e.attributes() {
        let attr = attr.map_err(|err| LoadError::Attribute {
            element: name.clone(),
            message: err.to_string(),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value_with(resolve_entity)
            .map_err(|err| LoadError::Unescape {
                element: name.clone(),
                message: err.to_string(),
            })?
            .into_owned();
        data = data.with_attribute(key, value);
    }

    let label = data
        .attributes
        .get("id")
        .or_else(|| data.attributes.get("key"))
        .cloned();
    if let Some(label) = label {
        data = data.with_label(label);
    }

    Ok((name, data))
}

/// Add an element under the innermost open element, or make it the root
fn attach(
    tree: &mut Option<Tree>,
    open: &[(NodeIndex, String)],
    name: &str,
    data: NodeData,
) -> Result<NodeIndex, LoadError> {
    match (tree.as_mut(), open.last()) {
        (Some(tree), Some((parent, _))) => Ok(tree.add_child(*parent, data)?),
        (Some(_), None) => Err(LoadError::MultipleRoots {
            element: name.to_string(),
        }),
        (None, _) => {
            let root = Tree::new(data);
            let index = root.root();
            *tree = Some(root);
            Ok(index)
        }
    }
}

/// Text split by child elements is joined with a single space
fn append_text(tree: &mut Tree, index: NodeIndex, text: &str) -> Result<(), LoadError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(());
    }

    let data = &mut tree.node_mut(index)?.data;
    match data.content.as_mut() {
        Some(content) => {
            content.push(' ');
            content.push_str(text);
        }
        None => data.content = Some(text.to_string()),
    }
    Ok(())
}
