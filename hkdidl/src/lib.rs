//! # hkdidl - DIDL-Lite metadata helpers
//!
//! Lightweight extraction of human readable fields from the DIDL-Lite
//! documents that UPnP renderers attach to their transport URIs.
//!
//! Renderers routinely send truncated, double-escaped or otherwise broken
//! metadata. Nothing in this crate panics or bubbles such failures up to the
//! display layer: the lenient helpers log and return `None`, and callers fall
//! back to the raw URI.

use thiserror::Error;
use tracing::warn;
use xmltree::{Element, XMLNode};

/// Qualified name of the element carrying the item title.
pub const TITLE_ELEMENT: &str = "dc:title";

#[derive(Error, Debug)]
pub enum DidlError {
    #[error("Malformed DIDL-Lite document: {0}")]
    Parse(String),
}

/// Parses a metadata document into an element tree.
pub fn parse_document(document: &str) -> Result<Element, DidlError> {
    Element::parse(document.as_bytes()).map_err(|e| DidlError::Parse(e.to_string()))
}

/// Returns the qualified name (`prefix:name`) of an element.
fn qualified_name(elem: &Element) -> String {
    match &elem.prefix {
        Some(prefix) => format!("{}:{}", prefix, elem.name),
        None => elem.name.clone(),
    }
}

/// Collects every element of the tree (root included) whose qualified name
/// matches `qname`, in document order.
pub fn find_elements<'a>(root: &'a Element, qname: &str) -> Vec<&'a Element> {
    let mut found = Vec::new();
    collect_elements(root, qname, &mut found);
    found
}

fn collect_elements<'a>(elem: &'a Element, qname: &str, found: &mut Vec<&'a Element>) {
    if qualified_name(elem) == qname {
        found.push(elem);
    }
    for child in &elem.children {
        if let XMLNode::Element(child) = child {
            collect_elements(child, qname, found);
        }
    }
}

/// Concatenated text content of an element and all of its descendants.
pub fn text_content(elem: &Element) -> String {
    let mut buf = String::new();
    append_text(elem, &mut buf);
    buf
}

fn append_text(elem: &Element, buf: &mut String) {
    for child in &elem.children {
        match child {
            XMLNode::Text(text) | XMLNode::CData(text) => buf.push_str(text),
            XMLNode::Element(child) => append_text(child, buf),
            _ => {}
        }
    }
}

/// Text of the single element named `qname` in `document`.
///
/// Returns `None` when the document does not parse, and when the element is
/// missing or occurs more than once: an ambiguous document is treated as if
/// the field was absent.
pub fn extract_unique_text(document: &str, qname: &str) -> Option<String> {
    let root = match parse_document(document) {
        Ok(root) => root,
        Err(err) => {
            warn!(error = %err, document, "Cannot parse metadata document");
            return None;
        }
    };

    let found = find_elements(&root, qname);
    match found.as_slice() {
        [single] => Some(text_content(single)),
        _ => {
            warn!(
                element = qname,
                occurrences = found.len(),
                document,
                "No unique element found in metadata document"
            );
            None
        }
    }
}

/// Extracts the `dc:title` of a DIDL-Lite document.
///
/// ```
/// let didl = r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/"
///     xmlns:dc="http://purl.org/dc/elements/1.1/">
///   <item id="1" parentID="0" restricted="1"><dc:title>So What</dc:title></item>
/// </DIDL-Lite>"#;
/// assert_eq!(hkdidl::extract_title(didl).as_deref(), Some("So What"));
/// assert_eq!(hkdidl::extract_title("<broken"), None);
/// ```
pub fn extract_title(document: &str) -> Option<String> {
    extract_unique_text(document, TITLE_ELEMENT)
}
