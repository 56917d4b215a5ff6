//! Arena-backed DOM.
//!
//! Every node of a parsed page lives in one [`Document`] and is addressed by a [`NodeId`].
//! Parents own their children through the child list; the `parent` link is only an index
//! back into the same arena, so navigation in either direction is O(1) without reference
//! cycles.

use indexmap::IndexMap;
use std::fmt::Display;

/// Handle to a node of a [`Document`]. Only meaningful for the document that created it.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DOMNode {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Index of this node in its parent's child list
    position: usize,
    pub node_type: DOMNodeType,
}

impl DOMNode {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn as_element(&self) -> Option<&DOMElement> {
        match &self.node_type {
            DOMNodeType::Element(element) => Some(element),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DOMNodeType {
    Document,
    Element(DOMElement),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DOMElement {
    pub tag_name: String,
    pub attributes: DOMAttributes,
}

impl DOMElement {
    pub fn new(name: impl Display, attributes: Option<DOMAttributes>) -> Self {
        Self {
            tag_name: name.to_string().to_ascii_lowercase(),
            attributes: attributes.unwrap_or_else(DOMAttributes::empty),
        }
    }

    pub fn get_attribute(&self, name: &str) -> Option<&String> {
        self.attributes.get(name)
    }

    pub fn id(&self) -> Option<&str> {
        self.attributes.get("id").map(String::as_str)
    }

    /// Whitespace separated entries of the `class` attribute
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .get("class")
            .map(|c| c.split_ascii_whitespace())
            .into_iter()
            .flatten()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }
}

/// Attributes of one element. Keys are lower-case and unique; iteration follows source order.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct DOMAttributes(pub IndexMap<String, String>);

impl DOMAttributes {
    pub fn empty() -> Self {
        Self(IndexMap::new())
    }

    /// Build from key/value pairs, keeping the first occurrence of a repeated key
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut attributes = Self::empty();
        for (key, value) in pairs {
            attributes.insert_if_absent(key.into(), value.into());
        }
        attributes
    }

    /// Case-insensitive lookup
    pub fn get(&self, name: &str) -> Option<&String> {
        if name.bytes().any(|b| b.is_ascii_uppercase()) {
            self.0.get(name.to_ascii_lowercase().as_str())
        } else {
            self.0.get(name)
        }
    }

    pub fn insert_if_absent(&mut self, key: String, value: String) {
        self.0.entry(key.to_ascii_lowercase()).or_insert(value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A parsed page. Node `0` is always the document node itself.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Document {
    nodes: Vec<DOMNode>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// A document holding only its root node
    pub fn new() -> Self {
        Self {
            nodes: vec![DOMNode {
                parent: None,
                children: vec![],
                position: 0,
                node_type: DOMNodeType::Document,
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes, including the document node
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// # Panics
    /// If `id` was handed out by a different document.
    pub fn node(&self, id: NodeId) -> &DOMNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&DOMNode> {
        self.nodes.get(id.0)
    }

    pub fn element(&self, id: NodeId) -> Option<&DOMElement> {
        self.get(id).and_then(DOMNode::as_element)
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag_name.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(DOMNode::parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(DOMNode::children).unwrap_or_default()
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |&child| self.element(child).is_some())
    }

    /// Siblings after `id`, nearest first
    pub fn following_siblings(&self, id: NodeId) -> &[NodeId] {
        match self.get(id).and_then(|n| Some((n.parent?, n.position))) {
            Some((parent, position)) => &self.node(parent).children[position + 1..],
            None => &[],
        }
    }

    /// Siblings before `id`, in document order
    pub fn preceding_siblings(&self, id: NodeId) -> &[NodeId] {
        match self.get(id).and_then(|n| Some((n.parent?, n.position))) {
            Some((parent, position)) => &self.node(parent).children[..position],
            None => &[],
        }
    }

    pub fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.following_siblings(id)
            .iter()
            .copied()
            .find(|&sibling| self.element(sibling).is_some())
    }

    pub fn previous_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.previous_element_siblings(id).next()
    }

    /// Element siblings before `id`, nearest first
    pub fn previous_element_siblings(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.preceding_siblings(id)
            .iter()
            .rev()
            .copied()
            .filter(move |&sibling| self.element(sibling).is_some())
    }

    /// Parent, grandparent, ... up to and including the document node
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            document: self,
            next: self.parent(id),
        }
    }

    /// `id` followed by all of its descendants in document order (depth-first, pre-order)
    pub fn subtree(&self, id: NodeId) -> Subtree<'_> {
        Subtree {
            document: self,
            stack: if self.get(id).is_some() { vec![id] } else { vec![] },
        }
    }

    /// Open and close events for `id` and everything below it, in document order. Walks with
    /// an explicit stack, so nesting depth is bounded only by memory.
    pub fn traverse(&self, id: NodeId) -> Traverse<'_> {
        Traverse {
            document: self,
            stack: if self.get(id).is_some() {
                vec![Edge::Open(id)]
            } else {
                vec![]
            },
        }
    }

    /// The top-level element, `<html>` once normalised
    pub fn document_element(&self) -> Option<NodeId> {
        self.element_children(self.root()).next()
    }

    pub fn head(&self) -> Option<NodeId> {
        self.html_child("head")
    }

    pub fn body(&self) -> Option<NodeId> {
        self.html_child("body")
    }

    fn html_child(&self, name: &str) -> Option<NodeId> {
        let html = self.document_element()?;
        self.element_children(html)
            .find(|&child| self.tag_name(child) == Some(name))
    }

    /// Normalised text of the first `<title>`, or an empty string
    pub fn title(&self) -> String {
        self.subtree(self.root())
            .find(|&id| self.tag_name(id) == Some("title"))
            .map(|id| self.text(id))
            .unwrap_or_default()
    }

    // Construction, used by the tree builder

    pub(crate) fn append(&mut self, parent: NodeId, node_type: DOMNodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        let position = self.nodes[parent.0].children.len();
        self.nodes.push(DOMNode {
            parent: Some(parent),
            children: vec![],
            position,
            node_type,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Append text under `parent`, merging with a text node that is already its last child
    pub(crate) fn append_text(&mut self, parent: NodeId, text: &str) {
        if let Some(&last) = self.nodes[parent.0].children.last() {
            if let DOMNodeType::Text(existing) = &mut self.nodes[last.0].node_type {
                existing.push_str(text);
                return;
            }
        }
        self.append(parent, DOMNodeType::Text(text.to_string()));
    }

    pub(crate) fn element_mut(&mut self, id: NodeId) -> Option<&mut DOMElement> {
        match &mut self.nodes.get_mut(id.0)?.node_type {
            DOMNodeType::Element(element) => Some(element),
            _ => None,
        }
    }
}

pub struct Ancestors<'a> {
    document: &'a Document,
    next: Option<NodeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.document.parent(current);
        Some(current)
    }
}

/// Lazy pre-order walk; see [`Document::subtree`]
pub struct Subtree<'a> {
    document: &'a Document,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Subtree<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.stack.pop()?;
        self.stack
            .extend(self.document.children(current).iter().rev().copied());
        Some(current)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Edge {
    Open(NodeId),
    Close(NodeId),
}

/// See [`Document::traverse`]
pub struct Traverse<'a> {
    document: &'a Document,
    stack: Vec<Edge>,
}

impl<'a> Iterator for Traverse<'a> {
    type Item = Edge;

    fn next(&mut self) -> Option<Edge> {
        let edge = self.stack.pop()?;
        if let Edge::Open(id) = edge {
            self.stack.push(Edge::Close(id));
            self.stack.extend(
                self.document
                    .children(id)
                    .iter()
                    .rev()
                    .map(|&child| Edge::Open(child)),
            );
        }
        Some(edge)
    }
}

#[cfg(test)]
fn sample() -> (Document, NodeId, NodeId, NodeId, NodeId) {
    // <div><p>one</p><!--c--><span>two</span></div>
    let mut doc = Document::new();
    let root = doc.root();
    let div = doc.append(root, DOMNodeType::Element(DOMElement::new("div", None)));
    let p = doc.append(div, DOMNodeType::Element(DOMElement::new("p", None)));
    doc.append_text(p, "one");
    doc.append(div, DOMNodeType::Comment("c".to_string()));
    let span = doc.append(div, DOMNodeType::Element(DOMElement::new("SPAN", None)));
    doc.append_text(span, "two");
    (doc, div, p, span, root)
}

#[cfg(test)]
#[test]
fn test_navigation() {
    let (doc, div, p, span, root) = sample();
    assert_eq!(doc.parent(p), Some(div));
    assert_eq!(doc.tag_name(span), Some("span"));
    assert_eq!(doc.element_children(div).collect::<Vec<_>>(), vec![p, span]);
    assert_eq!(doc.next_element_sibling(p), Some(span));
    assert_eq!(doc.next_element_sibling(span), None);
    assert_eq!(doc.previous_element_sibling(span), Some(p));
    assert_eq!(doc.previous_element_sibling(p), None);
    assert_eq!(doc.ancestors(p).collect::<Vec<_>>(), vec![div, root]);
    assert_eq!(doc.document_element(), Some(div));
}

#[cfg(test)]
#[test]
fn test_subtree_is_preorder() {
    let (doc, div, p, span, root) = sample();
    let order: Vec<NodeId> = doc.subtree(root).collect();
    assert_eq!(order.len(), doc.node_count());
    assert_eq!(order[0], root);
    assert_eq!(order[1], div);
    assert_eq!(order[2], p);
    let span_index = order.iter().position(|&id| id == span).unwrap();
    assert!(span_index > 2);
    assert_eq!(doc.subtree(p).count(), 2);
}

#[cfg(test)]
#[test]
fn test_traverse_pairs_open_and_close() {
    let (doc, div, p, span, _) = sample();
    let edges: Vec<Edge> = doc.traverse(div).collect();
    assert_eq!(edges.len(), 2 * doc.subtree(div).count());
    assert_eq!(edges[0], Edge::Open(div));
    assert_eq!(edges[1], Edge::Open(p));
    assert_eq!(edges[edges.len() - 1], Edge::Close(div));
    let close_p = edges.iter().position(|&e| e == Edge::Close(p)).unwrap();
    let open_span = edges.iter().position(|&e| e == Edge::Open(span)).unwrap();
    assert!(close_p < open_span);
}

#[cfg(test)]
#[test]
fn test_text_merging() {
    let mut doc = Document::new();
    let root = doc.root();
    let div = doc.append(root, DOMNodeType::Element(DOMElement::new("div", None)));
    doc.append_text(div, "a");
    doc.append_text(div, "b");
    assert_eq!(doc.children(div).len(), 1);
    assert_eq!(
        doc.node(doc.children(div)[0]).node_type,
        DOMNodeType::Text("ab".to_string())
    );
}

#[cfg(test)]
#[test]
fn test_attributes() {
    let attributes = DOMAttributes::from_pairs([("Class", "a  b"), ("id", "x"), ("class", "c")]);
    assert_eq!(attributes.len(), 2);
    let element = DOMElement::new("div", Some(attributes));
    assert_eq!(element.get_attribute("CLASS"), Some(&"a  b".to_string()));
    assert_eq!(element.classes().collect::<Vec<_>>(), vec!["a", "b"]);
    assert!(element.has_class("b"));
    assert!(!element.has_class("c"));
    assert_eq!(element.id(), Some("x"));
    assert_eq!(
        element.attributes.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
        vec!["class", "id"]
    );
}
