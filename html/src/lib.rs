//! Lenient HTML parsing.
//!
//! [`document`] turns any input into a [`Document`]; malformed markup is repaired rather than
//! rejected. The document can then be walked, serialized back to markup or flattened to text.

/// Arena node storage and navigation
mod dom;
/// Void, raw-text and block element categories
mod elements;
/// Character reference decoding
mod entities;
/// Tree construction from tokens
mod parsing;
mod serialize;
mod text;
/// Markup to token stream
pub mod tokenizer;

pub use dom::*;
pub use elements::{
    is_block_element, is_escapable_raw_text_element, is_raw_text_element, is_void_element,
};
pub use entities::decode;
pub use parsing::document;
pub use tokenizer::{Token, Tokenizer};

/// Build [`DOMAttributes`] from `key => value` pairs
#[macro_export]
macro_rules! attributes {
    ($($key:ident => $value:expr),* $(,)?) => {
        $crate::DOMAttributes::from_pairs([$((stringify!($key), $value)),*])
    };
}

#[cfg(test)]
mod tests;
