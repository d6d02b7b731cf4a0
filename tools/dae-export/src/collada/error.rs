//! COLLADA parse and resolution errors

use thiserror::Error;

/// Fatal problems found while reading or resolving a COLLADA document.
#[derive(Debug, Error)]
pub enum ColladaError {
    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("<{element}> found outside of <{expected}>")]
    UnexpectedElement {
        element: &'static str,
        expected: &'static str,
    },

    #[error("unresolved {kind} reference '{id}'")]
    UnresolvedReference { kind: &'static str, id: String },

    #[error("invalid number '{token}' in <{element}>")]
    BadNumber { element: &'static str, token: String },

    #[error("<{element}> '{id}' declares {declared} values but contains {found}")]
    CountMismatch {
        element: &'static str,
        id: String,
        declared: usize,
        found: usize,
    },

    #[error("accessor on '{source_id}' needs {needed} values but the array holds {available}")]
    AccessorOutOfRange {
        source_id: String,
        needed: usize,
        available: usize,
    },

    #[error("index {index} is out of range for source '{source_id}' ({count} elements)")]
    IndexOutOfRange {
        source_id: String,
        index: usize,
        count: usize,
    },

    #[error("source '{source_id}' holds {found} data but {expected} data was expected")]
    WrongArrayType {
        source_id: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{semantic} source '{source_id}' has stride {stride}, at least {min} required")]
    BadStride {
        semantic: &'static str,
        source_id: String,
        stride: usize,
        min: usize,
    },

    #[error("{owner} '{id}' has no {semantic} input")]
    MissingInput {
        owner: &'static str,
        id: String,
        semantic: &'static str,
    },

    #[error("polylist in '{geometry}' has a polygon with {count} vertices; only triangles are supported")]
    NonTriangle { geometry: String, count: u32 },

    #[error("triangle group in '{geometry}' has {found} indices, expected {expected}")]
    IndexCount {
        geometry: String,
        expected: usize,
        found: usize,
    },

    #[error("{0}")]
    Invalid(String),
}
