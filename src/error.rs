use css::SelectorSyntaxError;
use thiserror::Error;

/// Failure to turn a node into an [`Element`](crate::Element) record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
    #[error("node is not an element")]
    NotAnElement,
    #[error("element has {0} children, more than a record can hold")]
    ChildCountOverflow(usize),
}

/// Everything that can go wrong underneath the query functions. The plain query functions
/// never return it; the `try_` variants do.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Selector(#[from] SelectorSyntaxError),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}
