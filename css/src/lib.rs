//! CSS selectors.
//!
//! [`compile`] turns selector text such as `div.item > a[href^=http], li:contains(Price)`
//! into a [`SelectorGroup`]. Compiled selectors are plain immutable data and can be shared
//! between threads and reused for any number of matches.

use regex::Regex;
use std::str::FromStr;
use thiserror::Error;

/// Comma separated alternatives. An element matches if any alternative matches.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct SelectorGroup {
    pub selectors: Vec<Selector>,
}

/// A chain of compound selectors joined by combinators, stored left to right.
/// `combinators()[i]` sits between `compounds()[i]` and `compounds()[i + 1]`.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Selector {
    compounds: Vec<CompoundSelector>,
    combinators: Vec<Combinator>,
}

impl Selector {
    pub fn new(first: CompoundSelector) -> Self {
        Self {
            compounds: vec![first],
            combinators: vec![],
        }
    }

    /// Extend the chain to the right
    pub fn then(mut self, combinator: Combinator, next: CompoundSelector) -> Self {
        self.combinators.push(combinator);
        self.compounds.push(next);
        self
    }

    pub fn compounds(&self) -> &[CompoundSelector] {
        &self.compounds
    }

    pub fn combinators(&self) -> &[Combinator] {
        &self.combinators
    }
}

/// Simple selectors that must all match the same element
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct CompoundSelector(pub Vec<SimpleSelector>);

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Combinator {
    // ( )
    Descendant,
    // (>)
    Child,
    // (+)
    NextSibling,
    // (~)
    SubsequentSibling,
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub enum SimpleSelector {
    /// Lower-cased tag name
    Type(String),
    Universal,
    ID(String),
    Class(String),
    Attribute(AttributeSelector),
    PseudoClass(PseudoClass),
}

/// `[name]`, `[name=value]`, ... The name is lower-cased; the value is compared as written.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct AttributeSelector {
    pub name: String,
    pub op: AttributeOperator,
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub enum AttributeOperator {
    // [att]
    Has,
    // [att=val]
    Equals(String),
    // [att~=val]
    // whitespace separated list containing val
    Includes(String),
    // [att|=val]
    // exactly val, or begins with val-
    DashMatch(String),
    // [att^=val]
    Prefix(String),
    // [att$=val]
    Suffix(String),
    // [att*=val]
    Substring(String),
}

impl AttributeOperator {
    /// Test an attribute value against this operator. Operators other than `Has` and
    /// `Equals` never match an empty operand.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            AttributeOperator::Has => true,
            AttributeOperator::Equals(expected) => value == expected,
            AttributeOperator::Includes(word) => {
                !word.is_empty()
                    && !word.contains(|c: char| c.is_ascii_whitespace())
                    && value.split_ascii_whitespace().any(|w| w == word)
            }
            AttributeOperator::DashMatch(prefix) => {
                !prefix.is_empty()
                    && (value == prefix
                        || value
                            .strip_prefix(prefix.as_str())
                            .map_or(false, |rest| rest.starts_with('-')))
            }
            AttributeOperator::Prefix(prefix) => {
                !prefix.is_empty() && value.starts_with(prefix.as_str())
            }
            AttributeOperator::Suffix(suffix) => {
                !suffix.is_empty() && value.ends_with(suffix.as_str())
            }
            AttributeOperator::Substring(needle) => {
                !needle.is_empty() && value.contains(needle.as_str())
            }
        }
    }
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub enum PseudoClass {
    /// Normalised text of the element and its descendants contains the argument
    Contains(String),
    /// Same as `Contains`, restricted to the element's own text
    ContainsOwn(String),
    /// Normalised text of the element and its descendants matches the pattern
    Matches(Pattern),
    MatchesOwn(Pattern),
    FirstChild,
    LastChild,
    OnlyChild,
    /// `:nth-child(an+b)`, counting element siblings from the first
    NthChild(Nth),
    NthLastChild(Nth),
    /// Like `NthChild`, counting only siblings with the same tag name.
    /// `:first-of-type` is `NthOfType(1)`.
    NthOfType(Nth),
    NthLastOfType(Nth),
    OnlyOfType,
    /// Zero-based position among element siblings equals, is below or is above `n`
    Eq(usize),
    Lt(usize),
    Gt(usize),
    /// No element or text children; comments are allowed
    Empty,
    Root,
    Not(CompoundSelector),
    /// Some element related to this one matches any of the selectors
    Has(Vec<RelativeSelector>),
}

/// An argument of `:has()`. `combinator` relates the element carrying `:has` to the element
/// `selector` has to match; a bare selector means any descendant.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct RelativeSelector {
    pub combinator: Combinator,
    pub selector: Selector,
}

/// The `an+b` argument of the `:nth-*` pseudo-classes
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Nth {
    pub step: i32,
    pub offset: i32,
}

impl Nth {
    pub fn new(step: i32, offset: i32) -> Self {
        Self { step, offset }
    }

    /// Whether the 1-based `position` equals `step * n + offset` for some `n >= 0`
    pub fn matches(&self, position: usize) -> bool {
        let position = match i64::try_from(position) {
            Ok(position) => position,
            Err(_) => return false,
        };
        let (step, offset) = (i64::from(self.step), i64::from(self.offset));
        if step == 0 {
            return position == offset;
        }
        let diff = position - offset;
        diff % step == 0 && diff / step >= 0
    }
}

/// A compiled regular expression. Compares equal to another pattern with the same source.
#[derive(Clone, Debug)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Regex::new(source).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Pattern {}

/// Returned by [`compile`] for selector text that cannot be parsed
#[derive(Error, PartialEq, Eq, Clone, Debug)]
#[error("malformed selector at offset {position} near {fragment:?}")]
pub struct SelectorSyntaxError {
    /// Byte offset into the selector text
    pub position: usize,
    /// The unparsed remainder at `position`
    pub fragment: String,
}

impl FromStr for SelectorGroup {
    type Err = SelectorSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        compile(s)
    }
}

#[macro_export]
macro_rules! simple_selector {
    (#$x:ident) => {
        $crate::SimpleSelector::ID(stringify!($x).to_string())
    };
    (.$x:ident) => {
        $crate::SimpleSelector::Class(stringify!($x).to_string())
    };
    (*) => {
        $crate::SimpleSelector::Universal
    };
    ([$x:ident]) => {
        $crate::SimpleSelector::Attribute($crate::AttributeSelector {
            name: stringify!($x).to_string(),
            op: $crate::AttributeOperator::Has,
        })
    };
    ($x:ident) => {
        $crate::SimpleSelector::Type(stringify!($x).to_string())
    };
}

#[macro_export]
macro_rules! compound_selector {
    ($($sel:expr),* $(,)?) => {
        $crate::CompoundSelector(vec![$($sel),*])
    };
}

#[macro_export]
macro_rules! combinator_selector {
    ($l:expr, $($c:expr, $r:expr),+ $(,)?) => {
        $crate::Selector::new($l)$(.then($c, $r))+
    };
}

mod parsing;
#[cfg(test)]
mod tests;

pub use parsing::compile;
