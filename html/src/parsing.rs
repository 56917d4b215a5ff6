//! Tree construction.
//!
//! Tokens are folded into a [`Document`] using a stack of open elements. Malformed markup is
//! never an error: stray end tags are dropped, unclosed elements are closed when an ancestor
//! closes or input ends, and a handful of implied-end-tag rules (`<p>`, `<li>`, table cells,
//! ...) keep common tag soup close to what browsers build. The result always has a
//! `html > (head, body)` skeleton.

use crate::dom::{DOMAttributes, DOMElement, DOMNodeType, Document, NodeId};
use crate::elements::{
    closes_p, is_head_content, is_heading, is_special, is_void_element, SCOPE_BOUNDARY,
};
use crate::tokenizer::{Token, Tokenizer};
use tracing::{span, trace, Level};

/// How far down the stack of open elements a scope check looks. Anything deeper counts as
/// out of scope, which keeps deeply nested input linear.
const MAX_SCOPE_DEPTH: usize = 100;

/// How far down the stack an end tag looks for the element it closes
const MAX_CLOSE_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum InsertionMode {
    BeforeHtml,
    BeforeHead,
    InHead,
    AfterHead,
    InBody,
}

struct TreeBuilder {
    document: Document,
    open_elements: Vec<NodeId>,
    mode: InsertionMode,
    html: Option<NodeId>,
    head: Option<NodeId>,
    body: Option<NodeId>,
}

/// Parse `input` into a [`Document`]. Never fails; the worst case is a document whose body
/// holds the input as text.
pub fn document(input: &str) -> Document {
    let span = span!(Level::DEBUG, "Building document", bytes = input.len());
    let _enter = span.enter();
    let mut builder = TreeBuilder::new();
    for token in Tokenizer::new(input) {
        builder.process(token);
    }
    builder.finish()
}

fn split_leading_whitespace(text: &str) -> (&str, &str) {
    let end = text
        .find(|c: char| !c.is_ascii_whitespace())
        .unwrap_or(text.len());
    text.split_at(end)
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            document: Document::new(),
            open_elements: vec![],
            mode: InsertionMode::BeforeHtml,
            html: None,
            head: None,
            body: None,
        }
    }

    fn current_node(&self) -> NodeId {
        self.open_elements
            .last()
            .copied()
            .unwrap_or_else(|| self.document.root())
    }

    fn current_node_is(&self, name: &str) -> bool {
        self.document.tag_name(self.current_node()) == Some(name)
    }

    fn tag_name(&self, id: NodeId) -> &str {
        self.document.tag_name(id).unwrap_or_default()
    }

    fn insert_element(&mut self, name: &str, attributes: Vec<(String, String)>) -> NodeId {
        let element = DOMElement::new(name, Some(DOMAttributes::from_pairs(attributes)));
        let parent = self.current_node();
        let id = self.document.append(parent, DOMNodeType::Element(element));
        if is_void_element(name) {
            trace!(element = name, "void element left childless");
        } else {
            self.open_elements.push(id);
        }
        id
    }

    fn insert_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let parent = self.current_node();
        self.document.append_text(parent, text);
    }

    fn insert_comment(&mut self, data: String) {
        let parent = self.current_node();
        self.document.append(parent, DOMNodeType::Comment(data));
    }

    /// Copy attributes from a repeated `<html>` or `<body>` tag; existing keys win
    fn merge_attributes(&mut self, target: Option<NodeId>, attributes: Vec<(String, String)>) {
        if let Some(element) = target.and_then(|id| self.document.element_mut(id)) {
            for (key, value) in attributes {
                element.attributes.insert_if_absent(key, value);
            }
        }
    }

    /// Pop elements off the stack until one named `name` has been popped
    fn pop_until_tag(&mut self, name: &str) {
        while let Some(id) = self.open_elements.pop() {
            if self.tag_name(id) == name {
                break;
            }
        }
    }

    /// Pop elements off the stack until `target` has been popped
    fn pop_until(&mut self, target: NodeId) {
        while let Some(id) = self.open_elements.pop() {
            if id == target {
                break;
            }
        }
    }

    fn has_in_scope(&self, name: &str, extra_boundary: &[&str]) -> bool {
        for &id in self.open_elements.iter().rev().take(MAX_SCOPE_DEPTH) {
            let current = self.tag_name(id);
            if current == name {
                return true;
            }
            if SCOPE_BOUNDARY.contains(&current) || extra_boundary.contains(&current) {
                return false;
            }
        }
        false
    }

    /// Close a `<p>` if one is open in button scope
    fn close_p_element(&mut self) {
        if self.has_in_scope("p", &["button"]) {
            trace!("implicitly closing <p>");
            self.pop_until_tag("p");
        }
    }

    /// A new `<li>` (or `<dd>`/`<dt>`) closes the previous item unless a special element such
    /// as a nested list sits in between
    fn close_list_item(&mut self, names: &[&str]) {
        let target = self
            .open_elements
            .iter()
            .rev()
            .take(MAX_SCOPE_DEPTH)
            .copied()
            .find_map(|id| {
                let current = self.tag_name(id);
                if names.contains(&current) {
                    Some(Some(id))
                } else if is_special(current) && !matches!(current, "address" | "div" | "p") {
                    Some(None)
                } else {
                    None
                }
            });
        if let Some(Some(id)) = target {
            trace!(element = self.tag_name(id), "implicitly closing list item");
            self.pop_until(id);
        }
    }

    /// Pop back to the outermost element named in `names` that is open inside the nearest
    /// element named in `boundary`
    fn close_within(&mut self, names: &[&str], boundary: &[&str]) {
        let mut target = None;
        for &id in self.open_elements.iter().rev().take(MAX_SCOPE_DEPTH) {
            let current = self.tag_name(id);
            if names.contains(&current) {
                target = Some(id);
            } else if boundary.contains(&current) {
                break;
            }
        }
        if let Some(id) = target {
            trace!(element = self.tag_name(id), "implicitly closing table content");
            self.pop_until(id);
        }
    }

    fn insert_html(&mut self, attributes: Vec<(String, String)>) {
        let id = self.insert_element("html", attributes);
        self.html = Some(id);
        self.mode = InsertionMode::BeforeHead;
    }

    fn insert_head(&mut self, attributes: Vec<(String, String)>) {
        let id = self.insert_element("head", attributes);
        self.head = Some(id);
        self.mode = InsertionMode::InHead;
    }

    fn insert_body(&mut self, attributes: Vec<(String, String)>) {
        let id = self.insert_element("body", attributes);
        self.body = Some(id);
        self.mode = InsertionMode::InBody;
    }

    fn leave_head(&mut self) {
        if let Some(head) = self.head {
            if self.open_elements.contains(&head) {
                self.pop_until(head);
            }
        }
        self.mode = InsertionMode::AfterHead;
    }

    /// Take the step an unexpected token would cause in the current mode, synthesising
    /// whatever part of the skeleton is missing
    fn advance(&mut self) {
        match self.mode {
            InsertionMode::BeforeHtml => {
                trace!("synthesising <html>");
                self.insert_html(vec![]);
            }
            InsertionMode::BeforeHead => {
                trace!("synthesising <head>");
                self.insert_head(vec![]);
            }
            InsertionMode::InHead => self.leave_head(),
            InsertionMode::AfterHead => {
                trace!("synthesising <body>");
                self.insert_body(vec![]);
            }
            InsertionMode::InBody => {}
        }
    }

    fn process(&mut self, token: Token) {
        match self.mode {
            InsertionMode::BeforeHtml => self.before_html(token),
            InsertionMode::BeforeHead => self.before_head(token),
            InsertionMode::InHead => self.in_head(token),
            InsertionMode::AfterHead => self.after_head(token),
            InsertionMode::InBody => self.in_body(token),
        }
    }

    fn before_html(&mut self, token: Token) {
        match token {
            Token::Doctype(name) => trace!(%name, "doctype"),
            Token::Comment(data) => self.insert_comment(data),
            Token::Text(text) => {
                let (_, rest) = split_leading_whitespace(&text);
                if !rest.is_empty() {
                    self.advance();
                    self.process(Token::Text(rest.to_string()));
                }
            }
            Token::StartTag {
                name, attributes, ..
            } if name == "html" => self.insert_html(attributes),
            Token::EndTag { name } => trace!(%name, "ignoring end tag before <html>"),
            token => {
                self.advance();
                self.process(token);
            }
        }
    }

    fn before_head(&mut self, token: Token) {
        match token {
            Token::Doctype(_) => {}
            Token::Comment(data) => self.insert_comment(data),
            Token::Text(text) => {
                let (_, rest) = split_leading_whitespace(&text);
                if !rest.is_empty() {
                    self.advance();
                    self.process(Token::Text(rest.to_string()));
                }
            }
            Token::StartTag {
                name, attributes, ..
            } => match name.as_str() {
                "html" => self.merge_attributes(self.html, attributes),
                "head" => self.insert_head(attributes),
                _ => {
                    self.advance();
                    self.process(Token::StartTag {
                        name,
                        attributes,
                        self_closing: false,
                    });
                }
            },
            Token::EndTag { name } => trace!(%name, "ignoring end tag before <head>"),
        }
    }

    fn in_head(&mut self, token: Token) {
        match token {
            Token::Doctype(_) => {}
            Token::Comment(data) => self.insert_comment(data),
            Token::Text(text) => {
                // Text inside an open <title>, <style>, ... belongs to it; otherwise only
                // leading whitespace stays in the head
                if !self.current_node_is("head") {
                    return self.insert_text(&text);
                }
                let (space, rest) = split_leading_whitespace(&text);
                self.insert_text(space);
                if !rest.is_empty() {
                    self.leave_head();
                    self.process(Token::Text(rest.to_string()));
                }
            }
            Token::StartTag {
                name, attributes, ..
            } => match name.as_str() {
                "html" => self.merge_attributes(self.html, attributes),
                "head" => trace!("ignoring repeated <head>"),
                _ if is_head_content(&name) => {
                    self.insert_element(&name, attributes);
                }
                _ => {
                    self.leave_head();
                    self.process(Token::StartTag {
                        name,
                        attributes,
                        self_closing: false,
                    });
                }
            },
            Token::EndTag { name } => {
                if name == "head" {
                    self.leave_head();
                } else if !self.close_element(&name) {
                    trace!(%name, "ignoring stray end tag in <head>");
                }
            }
        }
    }

    fn after_head(&mut self, token: Token) {
        match token {
            Token::Doctype(_) => {}
            Token::Comment(data) => self.insert_comment(data),
            Token::Text(text) => {
                let (space, rest) = split_leading_whitespace(&text);
                self.insert_text(space);
                if !rest.is_empty() {
                    self.advance();
                    self.process(Token::Text(rest.to_string()));
                }
            }
            Token::StartTag {
                name, attributes, ..
            } => match name.as_str() {
                "html" => self.merge_attributes(self.html, attributes),
                "body" => self.insert_body(attributes),
                "head" => trace!("ignoring <head> after head"),
                _ if is_head_content(&name) => {
                    // Late head content goes back into the head
                    if let Some(head) = self.head {
                        self.open_elements.push(head);
                        self.mode = InsertionMode::InHead;
                    }
                    self.insert_element(&name, attributes);
                }
                _ => {
                    self.advance();
                    self.process(Token::StartTag {
                        name,
                        attributes,
                        self_closing: false,
                    });
                }
            },
            Token::EndTag { name } => trace!(%name, "ignoring end tag after <head>"),
        }
    }

    fn in_body(&mut self, token: Token) {
        match token {
            Token::Doctype(_) => trace!("ignoring doctype in body"),
            Token::Comment(data) => self.insert_comment(data),
            Token::Text(text) => self.insert_text(&text),
            Token::StartTag {
                name,
                attributes,
                self_closing,
            } => {
                if self_closing && !is_void_element(&name) {
                    trace!(element = %name, "self-closing syntax ignored on non-void element");
                }
                match name.as_str() {
                    "html" => self.merge_attributes(self.html, attributes),
                    "body" => self.merge_attributes(self.body, attributes),
                    "head" => trace!("ignoring <head> in body"),
                    _ => {
                        self.apply_implied_end_tags(&name);
                        self.insert_element(&name, attributes);
                    }
                }
            }
            Token::EndTag { name } => match name.as_str() {
                "html" | "body" | "head" => trace!(%name, "ignoring end tag in body"),
                _ => {
                    if !self.close_element(&name) {
                        trace!(%name, "ignoring stray end tag");
                    }
                }
            },
        }
    }

    /// Close whatever a start tag named `name` implicitly ends
    fn apply_implied_end_tags(&mut self, name: &str) {
        if closes_p(name) {
            self.close_p_element();
        }
        match name {
            "li" => self.close_list_item(&["li"]),
            "dd" | "dt" => self.close_list_item(&["dd", "dt"]),
            "option" => {
                if self.current_node_is("option") {
                    self.open_elements.pop();
                }
            }
            "tr" => self.close_within(&["tr", "td", "th"], &["table"]),
            "td" | "th" => self.close_within(&["td", "th"], &["tr", "table"]),
            _ if is_heading(name) => {
                if is_heading(self.tag_name(self.current_node())) {
                    trace!(element = name, "closing heading opened inside another heading");
                    self.open_elements.pop();
                }
            }
            _ => {}
        }
    }

    /// Close the nearest open element named `name`, along with everything opened inside it.
    /// Never closes `html`, `head` or `body`, nor anything more than [`MAX_CLOSE_DEPTH`]
    /// levels down. Returns `false` if nothing matched.
    fn close_element(&mut self, name: &str) -> bool {
        let target = self
            .open_elements
            .iter()
            .rev()
            .take(MAX_CLOSE_DEPTH)
            .copied()
            .take_while(|&id| !matches!(self.tag_name(id), "html" | "head" | "body"))
            .find(|&id| self.tag_name(id) == name);
        match target {
            Some(id) => {
                self.pop_until(id);
                true
            }
            None => false,
        }
    }

    fn finish(mut self) -> Document {
        while self.body.is_none() {
            self.advance();
        }
        trace!(
            unclosed = self.open_elements.len(),
            "closing elements still open at end of input"
        );
        self.open_elements.clear();
        self.document
    }
}

#[cfg(test)]
fn body_markup(input: &str) -> String {
    let doc = document(input);
    doc.body().map(|b| doc.inner_html(b)).unwrap_or_default()
}

#[cfg(test)]
#[test]
fn test_skeleton_is_synthesised() {
    let doc = document("<p>hi</p>");
    assert_eq!(
        doc.outer_html(doc.root()),
        "<html><head></head><body><p>hi</p></body></html>"
    );

    let doc = document("");
    assert_eq!(
        doc.outer_html(doc.root()),
        "<html><head></head><body></body></html>"
    );

    let doc = document("just text");
    assert_eq!(doc.body().map(|b| doc.text(b)), Some("just text".to_string()));
}

#[cfg(test)]
#[test]
fn test_head_content_placement() {
    let doc = document("<title>T</title><meta charset=utf-8><p>x</p><link rel=x>");
    let head = doc.head().unwrap();
    assert_eq!(
        doc.inner_html(head),
        r#"<title>T</title><meta charset="utf-8">"#
    );
    assert_eq!(
        doc.inner_html(doc.body().unwrap()),
        r#"<p>x</p><link rel="x">"#
    );
    assert_eq!(doc.title(), "T");
}

#[cfg(test)]
#[test]
fn test_late_head_content_returns_to_head() {
    let doc = document("<html><head></head> <title>Late</title><body>b</body></html>");
    assert_eq!(doc.inner_html(doc.head().unwrap()), "<title>Late</title>");
    assert_eq!(doc.inner_html(doc.body().unwrap()), "b");
}

#[cfg(test)]
#[test]
fn test_misnested_close_tags() {
    assert_eq!(body_markup("<a><b>text</a>after"), "<a><b>text</b></a>after");
    assert_eq!(body_markup("<div>x</span>y</div>"), "<div>xy</div>");
    assert_eq!(body_markup("</p>x"), "x");
    assert_eq!(body_markup("<div><span>unclosed"), "<div><span>unclosed</span></div>");
}

#[cfg(test)]
#[test]
fn test_implied_paragraph_close() {
    assert_eq!(
        body_markup("<div><p>a<p>b</div>"),
        "<div><p>a</p><p>b</p></div>"
    );
    assert_eq!(body_markup("<p>a<ul><li>b</ul>"), "<p>a</p><ul><li>b</li></ul>");
    assert_eq!(body_markup("<p>a<span>b<p>c"), "<p>a<span>b</span></p><p>c</p>");
}

#[cfg(test)]
#[test]
fn test_list_items() {
    assert_eq!(
        body_markup("<ul><li>a<li>b</ul>"),
        "<ul><li>a</li><li>b</li></ul>"
    );
    assert_eq!(
        body_markup("<ul><li>a<ul><li>b</ul><li>c</ul>"),
        "<ul><li>a<ul><li>b</li></ul></li><li>c</li></ul>"
    );
    assert_eq!(
        body_markup("<dl><dt>t<dd>d<dt>u</dl>"),
        "<dl><dt>t</dt><dd>d</dd><dt>u</dt></dl>"
    );
}

#[cfg(test)]
#[test]
fn test_table_cells() {
    assert_eq!(
        body_markup("<table><tr><td>1<td>2<tr><td>3</table>"),
        "<table><tr><td>1</td><td>2</td></tr><tr><td>3</td></tr></table>"
    );
}

#[cfg(test)]
#[test]
fn test_void_elements_stay_empty() {
    assert_eq!(body_markup("<br><span>x</span>"), "<br><span>x</span>");
    assert_eq!(body_markup("<img src=a>text</img>"), r#"<img src="a">text"#);
    assert_eq!(body_markup("<div/>x"), "<div>x</div>");
}

#[cfg(test)]
#[test]
fn test_repeated_html_and_body_merge_attributes() {
    let doc = document(r#"<body class="a"><p>x</p><body id="b" class="c">"#);
    let body = doc.body().unwrap();
    let element = doc.element(body).unwrap();
    assert_eq!(element.get_attribute("class"), Some(&"a".to_string()));
    assert_eq!(element.get_attribute("id"), Some(&"b".to_string()));
}

#[cfg(test)]
#[test]
fn test_content_after_body_close() {
    assert_eq!(body_markup("<body>a</body></html>b"), "ab");
}

#[cfg(test)]
#[test]
fn test_deep_nesting_builds_in_linear_time() {
    let depth = 50_000;
    let started = std::time::Instant::now();
    let doc = document(&format!("{}{}", "<div>".repeat(depth), "</span>".repeat(depth)));
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
    let body = doc.body().unwrap();
    assert_eq!(doc.subtree(body).count(), depth + 1);
}

#[cfg(test)]
#[test]
fn test_scope_search_is_bounded() {
    // A <p> buried deeper than the scope limit is left open
    let input = format!("<p>a{}<p>b", "<span>".repeat(MAX_SCOPE_DEPTH + 1));
    let doc = document(&input);
    let body = doc.body().unwrap();
    assert_eq!(doc.element_children(body).count(), 1);
    let input = format!("<p>a{}<p>b", "<span>".repeat(MAX_SCOPE_DEPTH - 2));
    let doc = document(&input);
    let body = doc.body().unwrap();
    assert_eq!(doc.element_children(body).count(), 2);
}
