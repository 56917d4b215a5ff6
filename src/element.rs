use crate::error::SerializationError;
use html::{Document, NodeId};
use indexmap::IndexMap;
use tracing::warn;

/// Flattened, owned view of one matched element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lower-cased tag name
    pub tag: String,
    /// Normalised text of the element and its descendants
    pub text: String,
    /// Markup of the children
    pub html: String,
    /// Markup of the element itself
    pub outer_html: String,
    /// Attributes in source order
    pub attributes: IndexMap<String, String>,
    /// Number of element children; text and comments are not counted
    pub child_count: u32,
}

impl Element {
    pub fn from_node(doc: &Document, id: NodeId) -> Result<Element, SerializationError> {
        let element = doc.element(id).ok_or(SerializationError::NotAnElement)?;
        let children = doc.element_children(id).count();
        let child_count =
            u32::try_from(children).map_err(|_| SerializationError::ChildCountOverflow(children))?;
        Ok(Element {
            tag: element.tag_name.clone(),
            text: doc.text(id),
            html: doc.inner_html(id),
            outer_html: doc.outer_html(id),
            attributes: element.attributes.0.clone(),
            child_count,
        })
    }
}

/// Records for `ids`, in order, leaving out any node that cannot be turned into one
pub(crate) fn records(doc: &Document, ids: &[NodeId]) -> Vec<Element> {
    ids.iter()
        .filter_map(|&id| match Element::from_node(doc, id) {
            Ok(element) => Some(element),
            Err(e) => {
                warn!(node = ?id, error = %e, "dropping element record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[test]
fn test_from_node() {
    let doc = html::document(r#"<ul id="list" class="c"><li>A</li> <!--x--> <li>B <b>b</b></li></ul>"#);
    let ul = doc.subtree(doc.root()).find(|&id| doc.tag_name(id) == Some("ul")).unwrap();
    let element = Element::from_node(&doc, ul).unwrap();
    assert_eq!(element.tag, "ul");
    assert_eq!(element.text, "A B b");
    assert_eq!(element.child_count, 2);
    assert_eq!(element.html, "<li>A</li> <!--x--> <li>B <b>b</b></li>");
    assert_eq!(
        element.outer_html,
        r#"<ul id="list" class="c"><li>A</li> <!--x--> <li>B <b>b</b></li></ul>"#
    );
    assert_eq!(
        element.attributes.iter().collect::<Vec<_>>(),
        vec![
            (&"id".to_string(), &"list".to_string()),
            (&"class".to_string(), &"c".to_string())
        ]
    );
}

#[cfg(test)]
#[test]
fn test_non_elements_are_dropped() {
    let doc = html::document("<p>text</p>");
    assert_eq!(
        Element::from_node(&doc, doc.root()),
        Err(SerializationError::NotAnElement)
    );
    let p = doc.subtree(doc.root()).find(|&id| doc.tag_name(id) == Some("p")).unwrap();
    let text = doc.children(p)[0];
    let kept = records(&doc, &[doc.root(), p, text]);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].tag, "p");
}
