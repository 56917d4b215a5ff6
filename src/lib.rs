//! Query HTML with CSS selectors.
//!
//! Every function here takes the page as a string, parses it, runs one query and returns
//! owned results. Nothing is cached or shared between calls, so calls can run on any number
//! of threads at once. The plain functions never fail: a malformed selector or an element
//! that cannot be turned into a record gives the empty result documented on each function.
//! The `try_` variants report those failures as an [`Error`] instead.

use tracing::{debug, span, Level};

pub use css::{compile, SelectorGroup, SelectorSyntaxError};
pub use element::Element;
pub use error::{Error, SerializationError};
pub use html::{document, Document, NodeId};

/// Element records
mod element;
/// Error types
mod error;
/// Selector matching over a parsed document
pub mod select;

/// Title and body markup of a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseResult {
    pub title: String,
    pub body: String,
}

/// A parsed page plus the elements matching a selector, in document order
struct Query {
    doc: Document,
    found: Vec<NodeId>,
}

impl Query {
    fn run(html: &str, selector: &str) -> Result<Self, Error> {
        let group: SelectorGroup = selector.parse()?;
        let doc = document(html);
        let found = select::select(&doc, doc.root(), &group);
        Ok(Self { doc, found })
    }

    fn first(html: &str, selector: &str) -> Result<(Document, Option<NodeId>), Error> {
        let group: SelectorGroup = selector.parse()?;
        let doc = document(html);
        let first = select::select_first(&doc, doc.root(), &group);
        Ok((doc, first))
    }
}

/// Log a failure and swap it for the empty result
fn or_empty<T: Default>(operation: &str, result: Result<T, Error>) -> T {
    result.unwrap_or_else(|e| {
        debug!(operation, error = %e, "query failed, returning empty result");
        T::default()
    })
}

/// Title and `<body>` inner markup. Parsing cannot fail, so neither can this.
pub fn parse(html: &str) -> ParseResult {
    let span = span!(Level::DEBUG, "parse", bytes = html.len());
    let _enter = span.enter();
    let doc = document(html);
    ParseResult {
        title: doc.title(),
        body: doc.body().map(|b| doc.inner_html(b)).unwrap_or_default(),
    }
}

pub fn try_select(html: &str, selector: &str) -> Result<Vec<Element>, Error> {
    let query = Query::run(html, selector)?;
    Ok(element::records(&query.doc, &query.found))
}

/// Records for every match. Empty if the selector is malformed.
pub fn select(html: &str, selector: &str) -> Vec<Element> {
    let span = span!(Level::DEBUG, "select", selector);
    let _enter = span.enter();
    or_empty("select", try_select(html, selector))
}

pub fn try_select_first(html: &str, selector: &str) -> Result<Option<Element>, Error> {
    let (doc, first) = Query::first(html, selector)?;
    match first {
        Some(id) => Ok(Some(Element::from_node(&doc, id)?)),
        None => Ok(None),
    }
}

/// Record for the first match, if there is one
pub fn select_first(html: &str, selector: &str) -> Option<Element> {
    let span = span!(Level::DEBUG, "select_first", selector);
    let _enter = span.enter();
    or_empty("select_first", try_select_first(html, selector))
}

pub fn try_get_text(html: &str, selector: &str) -> Result<String, Error> {
    let query = Query::run(html, selector)?;
    let mut text = String::new();
    for &id in &query.found {
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(&query.doc.text(id));
    }
    Ok(text)
}

/// Text of every match, joined with single spaces
pub fn get_text(html: &str, selector: &str) -> String {
    let span = span!(Level::DEBUG, "get_text", selector);
    let _enter = span.enter();
    or_empty("get_text", try_get_text(html, selector))
}

pub fn try_get_html(html: &str, selector: &str) -> Result<String, Error> {
    let query = Query::run(html, selector)?;
    Ok(query
        .found
        .iter()
        .map(|&id| query.doc.outer_html(id))
        .collect())
}

/// Outer markup of every match, concatenated
pub fn get_html(html: &str, selector: &str) -> String {
    let span = span!(Level::DEBUG, "get_html", selector);
    let _enter = span.enter();
    or_empty("get_html", try_get_html(html, selector))
}

pub fn try_get_attributes_by_query(
    html: &str,
    selector: &str,
    name: &str,
) -> Result<Vec<String>, Error> {
    let query = Query::run(html, selector)?;
    Ok(query
        .found
        .iter()
        .filter_map(|&id| query.doc.element(id)?.get_attribute(name))
        .filter(|value| !value.is_empty())
        .cloned()
        .collect())
}

/// Value of attribute `name` on every match that has it. Matches without the attribute, or
/// with an empty value, are skipped.
pub fn get_attributes_by_query(html: &str, selector: &str, name: &str) -> Vec<String> {
    let span = span!(Level::DEBUG, "get_attributes_by_query", selector, name);
    let _enter = span.enter();
    or_empty(
        "get_attributes_by_query",
        try_get_attributes_by_query(html, selector, name),
    )
}

pub fn try_get_attribute_by_query(html: &str, selector: &str, name: &str) -> Result<String, Error> {
    let (doc, first) = Query::first(html, selector)?;
    Ok(first
        .and_then(|id| doc.element(id)?.get_attribute(name).cloned())
        .unwrap_or_default())
}

/// Value of attribute `name` on the first match. An empty string both when the attribute is
/// missing and when it is present but empty.
pub fn get_attribute_by_query(html: &str, selector: &str, name: &str) -> String {
    let span = span!(Level::DEBUG, "get_attribute_by_query", selector, name);
    let _enter = span.enter();
    or_empty(
        "get_attribute_by_query",
        try_get_attribute_by_query(html, selector, name),
    )
}

pub fn try_next_sibling(html: &str, selector: &str) -> Result<Option<Element>, Error> {
    let (doc, first) = Query::first(html, selector)?;
    match first.and_then(|id| doc.next_element_sibling(id)) {
        Some(sibling) => Ok(Some(Element::from_node(&doc, sibling)?)),
        None => Ok(None),
    }
}

/// Record for the element following the first match, skipping text and comments
pub fn next_sibling(html: &str, selector: &str) -> Option<Element> {
    let span = span!(Level::DEBUG, "next_sibling", selector);
    let _enter = span.enter();
    or_empty("next_sibling", try_next_sibling(html, selector))
}

#[cfg(test)]
mod tests;
