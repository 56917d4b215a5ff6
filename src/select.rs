//! Matching compiled selectors against a [`Document`].
//!
//! Candidates are visited in document order and each one is tested against the group as a
//! whole, so results come out ordered and without duplicates. A chain is checked right to
//! left: the rightmost compound against the candidate, then each combinator walks to the
//! parent, an ancestor or an earlier sibling and recurses on the rest of the chain.
//!
//! Partial results are cached per node for the lifetime of one query. Without that, a
//! failing descendant chain retries every combination of ancestors.

use css::{
    Combinator, CompoundSelector, Nth, PseudoClass, RelativeSelector, Selector, SelectorGroup,
    SimpleSelector,
};
use html::{DOMElement, DOMNodeType, Document, NodeId};
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::trace;

/// Every element in the subtree of `scope` (including `scope`) matching `group`, in document
/// order
pub fn select(doc: &Document, scope: NodeId, group: &SelectorGroup) -> Vec<NodeId> {
    let matcher = Matcher::new(doc);
    let found: Vec<NodeId> = doc
        .subtree(scope)
        .filter(|&id| matcher.does_group_apply(id, group))
        .collect();
    trace!(matches = found.len(), "selected");
    found
}

/// First element of [`select`]; stops walking at the first hit
pub fn select_first(doc: &Document, scope: NodeId, group: &SelectorGroup) -> Option<NodeId> {
    let matcher = Matcher::new(doc);
    doc.subtree(scope)
        .find(|&id| matcher.does_group_apply(id, group))
}

/// Check a single node against `group`
pub fn matches(doc: &Document, id: NodeId, group: &SelectorGroup) -> bool {
    Matcher::new(doc).does_group_apply(id, group)
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
enum Walk {
    /// The node itself matches the chain prefix
    Here,
    /// The node or one of its ancestors does
    Ancestors,
    /// The node or one of its earlier element siblings does
    Siblings,
}

/// (walk, selector index within the list, node, number of compounds in the prefix)
type MemoKey = (Walk, usize, NodeId, usize);

/// Matches one selector list against one document. The cache is keyed by the selector's
/// index, so a matcher must not be shared between lists.
struct Matcher<'a> {
    doc: &'a Document,
    memo: RefCell<HashMap<MemoKey, bool>>,
}

impl<'a> Matcher<'a> {
    fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            memo: RefCell::new(HashMap::new()),
        }
    }

    fn does_group_apply(&self, id: NodeId, group: &SelectorGroup) -> bool {
        group
            .selectors
            .iter()
            .enumerate()
            .any(|(rule, s)| self.does_rule_apply(rule, id, s))
    }

    /// Check if the provided [`Selector`] selects this node
    fn does_rule_apply(&self, rule: usize, id: NodeId, selector: &Selector) -> bool {
        self.does_chain_apply(rule, id, selector.compounds(), selector.combinators())
    }

    fn cached(&self, key: MemoKey, compute: impl FnOnce() -> bool) -> bool {
        let known = self.memo.borrow().get(&key).copied();
        if let Some(known) = known {
            return known;
        }
        let result = compute();
        self.memo.borrow_mut().insert(key, result);
        result
    }

    /// `compounds` and `combinators` are a prefix of a selector chain; the last compound has
    /// to match `id`
    fn does_chain_apply(
        &self,
        rule: usize,
        id: NodeId,
        compounds: &[CompoundSelector],
        combinators: &[Combinator],
    ) -> bool {
        let (subject, compounds) = match compounds.split_last() {
            Some(split) => split,
            None => return false,
        };
        if !self.does_compound_apply(id, subject) {
            return false;
        }
        let (combinator, combinators) = match combinators.split_last() {
            Some(split) => split,
            None => return true,
        };
        let doc = self.doc;
        let step = |start: Option<NodeId>| {
            start.map_or(false, |node| self.does_prefix_apply(rule, node, compounds, combinators))
        };
        match combinator {
            Combinator::Child => step(doc.parent(id)),
            Combinator::NextSibling => step(doc.previous_element_sibling(id)),
            Combinator::Descendant => {
                self.does_walk_apply(Walk::Ancestors, rule, doc.parent(id), compounds, combinators)
            }
            Combinator::SubsequentSibling => self.does_walk_apply(
                Walk::Siblings,
                rule,
                doc.previous_element_sibling(id),
                compounds,
                combinators,
            ),
        }
    }

    fn does_prefix_apply(
        &self,
        rule: usize,
        id: NodeId,
        compounds: &[CompoundSelector],
        combinators: &[Combinator],
    ) -> bool {
        self.cached((Walk::Here, rule, id, compounds.len()), || {
            self.does_chain_apply(rule, id, compounds, combinators)
        })
    }

    /// Whether `start` or a node reached from it by repeatedly stepping to the parent
    /// (or previous element sibling) matches the prefix. Every node passed on the way shares
    /// the answer, so it is cached for all of them.
    fn does_walk_apply(
        &self,
        walk: Walk,
        rule: usize,
        start: Option<NodeId>,
        compounds: &[CompoundSelector],
        combinators: &[Combinator],
    ) -> bool {
        let k = compounds.len();
        let mut passed = vec![];
        let mut current = start;
        let result = loop {
            let node = match current {
                Some(node) => node,
                None => break false,
            };
            let known = self.memo.borrow().get(&(walk, rule, node, k)).copied();
            if let Some(known) = known {
                break known;
            }
            passed.push(node);
            if self.does_prefix_apply(rule, node, compounds, combinators) {
                break true;
            }
            current = match walk {
                Walk::Siblings => self.doc.previous_element_sibling(node),
                _ => self.doc.parent(node),
            };
        };
        let mut memo = self.memo.borrow_mut();
        for node in passed {
            memo.insert((walk, rule, node, k), result);
        }
        result
    }

    /// Only elements can match; the document, text and comments never do
    fn does_compound_apply(&self, id: NodeId, compound: &CompoundSelector) -> bool {
        match self.doc.element(id) {
            Some(element) => compound
                .0
                .iter()
                .all(|s| self.does_simple_selector_apply(id, element, s)),
            None => false,
        }
    }

    /// Check if the provided [`SimpleSelector`] selects this element
    fn does_simple_selector_apply(
        &self,
        id: NodeId,
        element: &DOMElement,
        selector: &SimpleSelector,
    ) -> bool {
        match selector {
            SimpleSelector::Type(name) => &element.tag_name == name,
            SimpleSelector::Universal => true,
            SimpleSelector::ID(expected) => id_is(element, expected),
            SimpleSelector::Class(class) => has_class(element, class),
            SimpleSelector::Attribute(attribute) => element
                .get_attribute(&attribute.name)
                .map_or(false, |value| attribute.op.matches(value)),
            SimpleSelector::PseudoClass(pseudo) => {
                self.does_pseudo_class_apply(id, element, pseudo)
            }
        }
    }

    fn does_pseudo_class_apply(
        &self,
        id: NodeId,
        element: &DOMElement,
        pseudo: &PseudoClass,
    ) -> bool {
        let doc = self.doc;
        match pseudo {
            PseudoClass::Contains(text) => doc.text(id).contains(text.as_str()),
            PseudoClass::ContainsOwn(text) => doc.own_text(id).contains(text.as_str()),
            PseudoClass::Matches(pattern) => pattern.is_match(&doc.text(id)),
            PseudoClass::MatchesOwn(pattern) => pattern.is_match(&doc.own_text(id)),
            PseudoClass::FirstChild => {
                self.has_element_parent(id) && doc.previous_element_sibling(id).is_none()
            }
            PseudoClass::LastChild => {
                self.has_element_parent(id) && doc.next_element_sibling(id).is_none()
            }
            PseudoClass::OnlyChild => {
                self.has_element_parent(id)
                    && doc.previous_element_sibling(id).is_none()
                    && doc.next_element_sibling(id).is_none()
            }
            PseudoClass::NthChild(nth) => self.is_nth(id, nth, None, false),
            PseudoClass::NthLastChild(nth) => self.is_nth(id, nth, None, true),
            PseudoClass::NthOfType(nth) => self.is_nth(id, nth, Some(&element.tag_name), false),
            PseudoClass::NthLastOfType(nth) => {
                self.is_nth(id, nth, Some(&element.tag_name), true)
            }
            PseudoClass::OnlyOfType => {
                let first = Nth::new(0, 1);
                self.is_nth(id, &first, Some(&element.tag_name), false)
                    && self.is_nth(id, &first, Some(&element.tag_name), true)
            }
            PseudoClass::Eq(n) => self.sibling_index(id) == *n,
            PseudoClass::Lt(n) => self.sibling_index(id) < *n,
            PseudoClass::Gt(n) => self.sibling_index(id) > *n,
            PseudoClass::Empty => doc
                .children(id)
                .iter()
                .all(|&child| matches!(doc.node(child).node_type, DOMNodeType::Comment(_))),
            PseudoClass::Root => doc.parent(id) == Some(doc.root()),
            PseudoClass::Not(compound) => !self.does_compound_apply(id, compound),
            PseudoClass::Has(relative) => self.does_any_relative_apply(id, relative),
        }
    }

    fn has_element_parent(&self, id: NodeId) -> bool {
        self.doc
            .parent(id)
            .map_or(false, |parent| self.doc.element(parent).is_some())
    }

    /// Zero-based position among element siblings
    fn sibling_index(&self, id: NodeId) -> usize {
        self.doc.previous_element_siblings(id).count()
    }

    /// 1-based position of `id` among its element siblings (only those named `of_type`, if
    /// given), counted from the end when `from_last`, tested against `nth`
    fn is_nth(&self, id: NodeId, nth: &Nth, of_type: Option<&str>, from_last: bool) -> bool {
        if !self.has_element_parent(id) {
            return false;
        }
        let doc = self.doc;
        let counts = |sibling: NodeId| match of_type {
            Some(name) => doc.tag_name(sibling) == Some(name),
            None => doc.element(sibling).is_some(),
        };
        let siblings = if from_last {
            doc.following_siblings(id)
        } else {
            doc.preceding_siblings(id)
        };
        let before = siblings.iter().filter(|&&s| counts(s)).count();
        nth.matches(before + 1)
    }

    /// `:has()`. Each argument gets a fresh matcher, since its selectors are numbered
    /// independently of the list this matcher serves.
    fn does_any_relative_apply(&self, id: NodeId, relative: &[RelativeSelector]) -> bool {
        let doc = self.doc;
        relative.iter().any(|r| {
            let inner = Matcher::new(doc);
            let applies = |candidate: NodeId| inner.does_rule_apply(0, candidate, &r.selector);
            match r.combinator {
                Combinator::Descendant => doc.subtree(id).skip(1).any(applies),
                Combinator::Child => doc.element_children(id).any(applies),
                Combinator::NextSibling => doc.next_element_sibling(id).map_or(false, applies),
                Combinator::SubsequentSibling => doc
                    .following_siblings(id)
                    .iter()
                    .copied()
                    .filter(|&s| doc.element(s).is_some())
                    .any(applies),
            }
        })
    }
}

/// Check if the `class` attribute is present and contains the specified class
fn has_class(element: &DOMElement, class: &str) -> bool {
    element.has_class(class)
}

/// Check if the `id` attribute exists and is an exact match for the provided ID
fn id_is(element: &DOMElement, id: &str) -> bool {
    element.id() == Some(id)
}

#[cfg(test)]
fn tags(doc: &Document, ids: &[NodeId]) -> Vec<String> {
    ids.iter()
        .map(|&id| {
            let element = doc.element(id).unwrap();
            match element.id() {
                Some(name) => format!("{}#{}", element.tag_name, name),
                None => element.tag_name.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
fn run(input: &str, selector: &str) -> Vec<String> {
    let doc = html::document(input);
    let group = css::compile(selector).unwrap();
    tags(&doc, &select(&doc, doc.root(), &group))
}

#[cfg(test)]
#[test]
fn test_simple_selectors() {
    let page = r#"<div id="a" class="x y"><p class="y">1</p><a href="/r" lang="en-US">2</a></div>"#;
    assert_eq!(run(page, "p"), vec!["p"]);
    assert_eq!(run(page, "*").len(), 6);
    assert_eq!(run(page, "#a"), vec!["div#a"]);
    assert_eq!(run(page, ".y"), vec!["div#a", "p"]);
    assert_eq!(run(page, ".x.y"), vec!["div#a"]);
    assert_eq!(run(page, ".Y"), Vec::<String>::new());
    assert_eq!(run(page, "[href]"), vec!["a"]);
    assert_eq!(run(page, "[HREF=/r]"), vec!["a"]);
    assert_eq!(run(page, "[lang|=en]"), vec!["a"]);
    assert_eq!(run(page, "[class~=x]"), vec!["div#a"]);
}

#[cfg(test)]
#[test]
fn test_combinators() {
    let page = "<section><h1 id=t>T</h1><p id=a>A</p><div><p id=b>B</p></div><p id=c>C</p></section>";
    assert_eq!(run(page, "section p"), vec!["p#a", "p#b", "p#c"]);
    assert_eq!(run(page, "section > p"), vec!["p#a", "p#c"]);
    assert_eq!(run(page, "h1 + p"), vec!["p#a"]);
    assert_eq!(run(page, "h1 ~ p"), vec!["p#a", "p#c"]);
    assert_eq!(run(page, "h1 ~ div > p"), vec!["p#b"]);
    assert_eq!(run(page, "div + p"), vec!["p#c"]);
    assert_eq!(run(page, "body section div p"), vec!["p#b"]);
}

#[cfg(test)]
#[test]
fn test_descendant_backtracks() {
    // Descendant steps retry farther ancestors when a nearer candidate fails
    let page = r#"<div class="a b-wrap"><div class="b"><div class="a"><span>x</span></div></div></div>"#;
    assert_eq!(run(page, ".b .a span"), vec!["span"]);
    assert_eq!(run(page, ".b > .a span"), vec!["span"]);
    assert_eq!(run(page, ".a > .b span"), vec!["span"]);
    assert_eq!(run(page, ".a > .a span"), Vec::<String>::new());
}

#[cfg(test)]
#[test]
fn test_group_is_ordered_and_deduplicated() {
    let page = r#"<ul><li class="item" id=1>a</li><li id=2>b</li><li class="item" id=3>c</li></ul>"#;
    assert_eq!(run(page, "li, .item"), vec!["li#1", "li#2", "li#3"]);
    assert_eq!(run(page, ".item, ul"), vec!["ul", "li#1", "li#3"]);
}

#[cfg(test)]
#[test]
fn test_pseudo_classes() {
    let page = "<ul><li id=1>Apple pie</li><li id=2>Banana <b>split</b></li><li id=3><!--c--></li></ul><p></p>";
    assert_eq!(run(page, "li:contains(split)"), vec!["li#2"]);
    assert_eq!(run(page, "li:contains(apple)"), Vec::<String>::new());
    assert_eq!(run(page, "li:containsOwn(split)"), Vec::<String>::new());
    assert_eq!(run(page, "li:containsOwn(Banana)"), vec!["li#2"]);
    assert_eq!(run(page, "li:first-child"), vec!["li#1"]);
    assert_eq!(run(page, "li:last-child"), vec!["li#3"]);
    assert_eq!(run(page, "b:only-child"), vec!["b"]);
    assert_eq!(run(page, ":empty"), vec!["head", "li#3", "p"]);
    assert_eq!(run(page, ":root"), vec!["html"]);
    assert_eq!(run(page, "li:not(#2):not(:empty)"), vec!["li#1"]);
}

#[cfg(test)]
#[test]
fn test_scope_and_first() {
    let doc = html::document("<div id=a><p>1</p></div><div id=b><p>2</p><p>3</p></div>");
    let group = css::compile("div, p").unwrap();
    let b = select(&doc, doc.root(), &css::compile("#b").unwrap())[0];
    assert_eq!(tags(&doc, &select(&doc, b, &group)), vec!["div#b", "p", "p"]);
    let first = select_first(&doc, doc.root(), &group).unwrap();
    assert_eq!(doc.element(first).unwrap().id(), Some("a"));
    assert!(matches(&doc, b, &group));
    assert!(!matches(&doc, doc.root(), &group));
}

#[cfg(test)]
#[test]
fn test_nth_pseudo_classes() {
    let page = "<ul><li id=1>a</li><li id=2>b</li><b id=x>-</b><li id=3>c</li><li id=4>d</li></ul>";
    assert_eq!(run(page, "li:nth-child(2)"), vec!["li#2"]);
    assert_eq!(run(page, "li:nth-child(odd)"), vec!["li#1", "li#4"]);
    assert_eq!(run(page, "li:nth-last-child(1)"), vec!["li#4"]);
    assert_eq!(run(page, "li:nth-of-type(3)"), vec!["li#3"]);
    assert_eq!(run(page, "li:nth-of-type(-n+2)"), vec!["li#1", "li#2"]);
    assert_eq!(run(page, "li:nth-last-of-type(2n)"), vec!["li#1", "li#3"]);
    assert_eq!(run(page, "li:first-of-type"), vec!["li#1"]);
    assert_eq!(run(page, "li:last-of-type"), vec!["li#4"]);
    assert_eq!(run(page, "ul > :only-of-type"), vec!["b#x"]);
    // The top-level element has no element parent
    assert_eq!(run(page, "html:nth-child(1)"), Vec::<String>::new());
}

#[cfg(test)]
#[test]
fn test_index_pseudo_classes() {
    let page = "<ul><li id=1>a</li><li id=2>b</li><li id=3>c</li></ul>";
    assert_eq!(run(page, "li:eq(0)"), vec!["li#1"]);
    assert_eq!(run(page, "li:lt(2)"), vec!["li#1", "li#2"]);
    assert_eq!(run(page, "li:gt(0)"), vec!["li#2", "li#3"]);
    assert_eq!(run(page, "li:gt(2)"), Vec::<String>::new());
}

#[cfg(test)]
#[test]
fn test_has() {
    let page = "<div id=a><p>x</p></div><div id=b><span><p>y</p></span></div><div id=c></div><p id=d></p>";
    assert_eq!(run(page, "div:has(p)"), vec!["div#a", "div#b"]);
    assert_eq!(run(page, "div:has(> p)"), vec!["div#a"]);
    assert_eq!(run(page, "div:has(+ p)"), vec!["div#c"]);
    assert_eq!(run(page, "div:has(~ div)"), vec!["div#a", "div#b"]);
    assert_eq!(run(page, "div:has(span p, > p)"), vec!["div#a", "div#b"]);
    assert_eq!(run(page, "div:not(:has(p))"), vec!["div#c"]);
}

#[cfg(test)]
#[test]
fn test_matches() {
    let page = "<p id=a>Price: $12.50</p><p id=b>Price: <b>free</b></p>";
    assert_eq!(run(page, r"p:matches(\$\d+\.\d\d)"), vec!["p#a"]);
    assert_eq!(run(page, "p:matches(^Price: free$)"), vec!["p#b"]);
    assert_eq!(run(page, "p:matchesOwn(free)"), Vec::<String>::new());
    assert_eq!(run(page, "p:matchesOwn(^Price:$)"), vec!["p#b"]);
}

#[cfg(test)]
#[test]
fn test_failing_chains_stay_fast() {
    let depth = 2_000;
    let page = format!("{}<span>x</span>", "<div>".repeat(depth));
    let started = std::time::Instant::now();
    assert_eq!(run(&page, "p div div div div div div div span"), Vec::<String>::new());
    assert_eq!(run(&page, "p ~ div div div span"), Vec::<String>::new());
    assert_eq!(run(&page, "body div div div div div div div span"), vec!["span"]);
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
}
