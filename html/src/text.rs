//! Text extraction.
//!
//! The "text" of a node is what a reader sees: text nodes in document order, whitespace
//! runs collapsed to one space, words on either side of a `<br>` or a block-level element kept
//! apart, and the whole thing trimmed. Comments and script or style bodies never contribute.

use crate::dom::{DOMNodeType, Document, Edge, NodeId};
use crate::elements::{is_block_element, is_raw_text_element};

fn is_collapsible(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0c' | '\u{a0}')
}

fn is_invisible(c: char) -> bool {
    matches!(c, '\u{200b}' | '\u{ad}')
}

fn ends_with_space(accum: &str) -> bool {
    accum.is_empty() || accum.ends_with(' ')
}

/// Append `text` with whitespace runs collapsed. Leading whitespace is dropped when `accum`
/// already ends in a space.
fn append_normalised(accum: &mut String, text: &str) {
    let mut last_was_space = ends_with_space(accum);
    for c in text.chars() {
        if is_collapsible(c) {
            if !last_was_space {
                accum.push(' ');
                last_was_space = true;
            }
        } else if !is_invisible(c) {
            accum.push(c);
            last_was_space = false;
        }
    }
}

impl Document {
    /// Normalised text of `id` and all of its descendants
    pub fn text(&self, id: NodeId) -> String {
        let mut accum = String::new();
        // Set while inside a script or style element
        let mut skipping: Option<NodeId> = None;
        for edge in self.traverse(id) {
            match (skipping, edge) {
                (Some(raw), Edge::Close(closed)) if raw == closed => skipping = None,
                (Some(_), _) => {}
                (None, Edge::Open(node)) => self.open_text(node, &mut accum, &mut skipping),
                (None, Edge::Close(node)) => {
                    if self.tag_name(node).map_or(false, is_block_element)
                        && !ends_with_space(&accum)
                    {
                        accum.push(' ');
                    }
                }
            }
        }
        accum.trim_matches(' ').to_string()
    }

    fn open_text(&self, id: NodeId, accum: &mut String, skipping: &mut Option<NodeId>) {
        match &self.node(id).node_type {
            DOMNodeType::Text(text) => append_normalised(accum, text),
            DOMNodeType::Comment(_) | DOMNodeType::Document => {}
            DOMNodeType::Element(element) => {
                let name = element.tag_name.as_str();
                // Script and style bodies are data, not text
                if is_raw_text_element(name) {
                    *skipping = Some(id);
                } else if (name == "br" || is_block_element(name)) && !ends_with_space(accum) {
                    accum.push(' ');
                }
            }
        }
    }

    /// Normalised text of the direct text children of `id` only
    pub fn own_text(&self, id: NodeId) -> String {
        let mut accum = String::new();
        if self.tag_name(id).map_or(false, is_raw_text_element) {
            return accum;
        }
        for &child in self.children(id) {
            match &self.node(child).node_type {
                DOMNodeType::Text(text) => append_normalised(&mut accum, text),
                DOMNodeType::Element(element) if element.tag_name == "br" => {
                    if !ends_with_space(&accum) {
                        accum.push(' ');
                    }
                }
                _ => {}
            }
        }
        accum.trim_matches(' ').to_string()
    }

    /// All descendant text concatenated exactly as written
    pub fn whole_text(&self, id: NodeId) -> String {
        self.subtree(id)
            .filter_map(|node| match &self.node(node).node_type {
                DOMNodeType::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
fn body_text(input: &str) -> String {
    let doc = crate::document(input);
    doc.body().map(|b| doc.text(b)).unwrap_or_default()
}

#[cfg(test)]
#[test]
fn test_whitespace_collapsing() {
    assert_eq!(body_text("  Hello \n\t  <b>big</b>   world  "), "Hello big world");
    assert_eq!(body_text("a&nbsp;&nbsp;b"), "a b");
    assert_eq!(body_text("x<!-- hidden -->y"), "xy");
    assert_eq!(body_text(""), "");
}

#[cfg(test)]
#[test]
fn test_block_separation() {
    assert_eq!(body_text("<p>one</p><p>two</p>"), "one two");
    assert_eq!(body_text("line<br>break"), "line break");
    assert_eq!(body_text("in<span>line</span>"), "inline");
    assert_eq!(body_text("<ul><li>A</li><li>B</li></ul>"), "A B");
    assert_eq!(body_text("a<script>var x = 1;</script>b<style>p {}</style>"), "ab");
    assert_eq!(body_text("<p>a</p><script/>var x = '<p>';</script><p>b</p>"), "a b");
}

#[cfg(test)]
#[test]
fn test_own_and_whole_text() {
    let doc = crate::document("<div> a <b>b</b>  c<br>d </div>");
    let div = doc.subtree(doc.root()).find(|&id| doc.tag_name(id) == Some("div")).unwrap();
    assert_eq!(doc.own_text(div), "a c d");
    assert_eq!(doc.whole_text(div), " a b  cd ");
    assert_eq!(doc.text(div), "a b c d");
}

#[cfg(test)]
#[test]
fn test_deep_nesting() {
    let depth = 100_000;
    let input = format!("{}x{}", "<b>".repeat(depth), "</b>".repeat(depth));
    assert_eq!(body_text(&input), "x");
    let input = format!("{}y", "<div>".repeat(depth));
    assert_eq!(body_text(&input), "y");
}
