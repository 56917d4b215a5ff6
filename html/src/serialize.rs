//! Markup serialization. Output is compact: no indentation or added line breaks.

use crate::dom::{DOMElement, DOMNodeType, Document, Edge, NodeId};
use crate::elements::{is_raw_text_element, is_void_element};

impl Document {
    /// Markup of `id` itself plus its descendants
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_subtree(id, &mut out);
        out
    }

    /// Markup of the children of `id`
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_subtree(child, &mut out);
        }
        out
    }

    fn write_subtree(&self, id: NodeId, out: &mut String) {
        for edge in self.traverse(id) {
            match edge {
                Edge::Open(node) => self.write_open(node, out),
                Edge::Close(node) => {
                    if let Some(element) = self.element(node) {
                        if !is_void_element(&element.tag_name) {
                            out.push_str("</");
                            out.push_str(&element.tag_name);
                            out.push('>');
                        }
                    }
                }
            }
        }
    }

    fn write_open(&self, id: NodeId, out: &mut String) {
        match &self.node(id).node_type {
            DOMNodeType::Document => {}
            DOMNodeType::Element(element) => write_start_tag(element, out),
            DOMNodeType::Text(text) => {
                let raw = self
                    .parent(id)
                    .and_then(|p| self.tag_name(p))
                    .map_or(false, is_raw_text_element);
                if raw {
                    out.push_str(text);
                } else {
                    write_escaped(text, false, out);
                }
            }
            DOMNodeType::Comment(data) => {
                out.push_str("<!--");
                out.push_str(data);
                out.push_str("-->");
            }
        }
    }
}

fn write_start_tag(element: &DOMElement, out: &mut String) {
    out.push('<');
    out.push_str(&element.tag_name);
    for (key, value) in element.attributes.iter() {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        write_escaped(value, true, out);
        out.push('"');
    }
    out.push('>');
}

fn write_escaped(text: &str, in_attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if in_attribute => out.push_str("&quot;"),
            '<' if !in_attribute => out.push_str("&lt;"),
            '>' if !in_attribute => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
fn body_html(input: &str) -> String {
    let doc = crate::document(input);
    doc.body().map(|b| doc.inner_html(b)).unwrap_or_default()
}

#[cfg(test)]
#[test]
fn test_void_elements() {
    assert_eq!(body_html("a<br>b<img src=x.png>"), r#"a<br>b<img src="x.png">"#);
    assert_eq!(body_html("<br/><hr></hr>"), "<br><hr>");
}

#[cfg(test)]
#[test]
fn test_escaping() {
    assert_eq!(
        body_html(r#"<a title='say "hi" &amp; <go>'>1 &lt; 2 &amp; 3&nbsp;</a>"#),
        r#"<a title="say &quot;hi&quot; &amp; <go>">1 &lt; 2 &amp; 3&nbsp;</a>"#
    );
}

#[cfg(test)]
#[test]
fn test_raw_text_not_escaped() {
    let doc = crate::document("<body><script>if (a < b && c) {}</script></body>");
    let body = doc.body().unwrap();
    assert_eq!(doc.inner_html(body), "<script>if (a < b && c) {}</script>");
}

#[cfg(test)]
#[test]
fn test_outer_and_inner() {
    let doc = crate::document(r#"<div id="p" class="a b"><h2>Title</h2><!-- note --></div>"#);
    let div = doc.body().and_then(|b| doc.element_children(b).next()).unwrap();
    assert_eq!(doc.inner_html(div), "<h2>Title</h2><!-- note -->");
    assert_eq!(
        doc.outer_html(div),
        r#"<div id="p" class="a b"><h2>Title</h2><!-- note --></div>"#
    );
}

#[cfg(test)]
#[test]
fn test_deep_nesting() {
    let depth = 100_000;
    let html = body_html(&format!("{}x", "<span>".repeat(depth)));
    assert_eq!(html.len(), depth * "<span></span>".len() + 1);
    assert!(html.starts_with("<span><span>"));
    assert!(html.ends_with("x</span></span>"));
}
