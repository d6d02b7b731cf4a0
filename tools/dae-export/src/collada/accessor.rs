//! Typed reads over a [`Source`] through its accessor
//!
//! An accessor views a flat array as `count` chunks of `stride` values
//! starting at `offset`. Named params pick components out of each chunk by
//! position; unnamed params are holes. The viewed array may belong to the
//! source itself or to a sibling source in the same container.

use glam::Mat4;
use smallvec::SmallVec;

use super::document::{fragment, ArrayData, Source};
use super::ColladaError;

/// Components of one accessor element.
pub type Components = SmallVec<[f32; 4]>;

/// Find a source by URL among the sources of a mesh, skin or animation.
pub fn find_source<'a>(sources: &'a [Source], url: &str) -> Result<&'a Source, ColladaError> {
    let id = fragment(url);
    sources
        .iter()
        .find(|s| s.id == id)
        .ok_or_else(|| ColladaError::UnresolvedReference {
            kind: "source",
            id: id.to_string(),
        })
}

/// Validated view of a source.
#[derive(Debug, Clone)]
pub struct SourceView<'a> {
    id: &'a str,
    data: &'a ArrayData,
    count: usize,
    stride: usize,
    offset: usize,
    /// Chunk positions of the named params, empty when the whole chunk is used
    picks: SmallVec<[usize; 4]>,
}

impl<'a> SourceView<'a> {
    /// Build a view, resolving the accessed array among `siblings` when it
    /// is not the source's own.
    pub fn new(source: &'a Source, siblings: &'a [Source]) -> Result<Self, ColladaError> {
        Self::with_siblings(source, siblings)
    }

    pub fn with_siblings(
        source: &'a Source,
        siblings: impl IntoIterator<Item = &'a Source>,
    ) -> Result<Self, ColladaError> {
        let Some(accessor) = &source.accessor else {
            return Ok(Self {
                id: &source.id,
                data: &source.data,
                count: source.data.len(),
                stride: 1,
                offset: 0,
                picks: SmallVec::new(),
            });
        };

        let array_id = fragment(&accessor.source);
        let own = array_id.is_empty()
            || source.array_id.as_deref() == Some(array_id)
            || source.id == array_id;
        let data = if own {
            &source.data
        } else {
            siblings
                .into_iter()
                .find(|s| s.array_id.as_deref() == Some(array_id))
                .map(|s| &s.data)
                .ok_or_else(|| ColladaError::UnresolvedReference {
                    kind: "array",
                    id: array_id.to_string(),
                })?
        };

        let stride = accessor.stride.max(1);
        let needed = stride
            .checked_mul(accessor.count)
            .and_then(|n| n.checked_add(accessor.offset));
        if !needed.is_some_and(|n| n <= data.len()) {
            return Err(ColladaError::AccessorOutOfRange {
                source_id: source.id.clone(),
                needed: needed.unwrap_or(usize::MAX),
                available: data.len(),
            });
        }

        let mut picks = SmallVec::new();
        if accessor.params.iter().any(|p| p.name.is_none()) {
            for (position, param) in accessor.params.iter().enumerate().take(stride) {
                if param.name.is_some() {
                    picks.push(position);
                }
            }
        } else if !accessor.params.is_empty() {
            picks.extend(0..accessor.params.len().min(stride));
        }

        Ok(Self {
            id: &source.id,
            data,
            count: accessor.count,
            stride,
            offset: accessor.offset,
            picks,
        })
    }

    pub fn id(&self) -> &str {
        self.id
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of logical components per element.
    pub fn width(&self) -> usize {
        if self.picks.is_empty() {
            self.stride
        } else {
            self.picks.len()
        }
    }

    fn range(&self, index: usize) -> Result<std::ops::Range<usize>, ColladaError> {
        if index >= self.count {
            return Err(ColladaError::IndexOutOfRange {
                source_id: self.id.to_string(),
                index,
                count: self.count,
            });
        }
        let start = self.offset + index * self.stride;
        Ok(start..start + self.stride)
    }

    fn float_data(&self) -> Result<&'a [f32], ColladaError> {
        match self.data {
            ArrayData::Float(values) => Ok(values),
            other => Err(ColladaError::WrongArrayType {
                source_id: self.id.to_string(),
                expected: "float",
                found: other.type_name(),
            }),
        }
    }

    /// Raw chunk of `stride` floats for element `index`.
    pub fn floats(&self, index: usize) -> Result<&'a [f32], ColladaError> {
        let range = self.range(index)?;
        Ok(&self.float_data()?[range])
    }

    /// The named components of element `index`, in param order.
    pub fn components(&self, index: usize) -> Result<Components, ColladaError> {
        let chunk = self.floats(index)?;
        if self.picks.is_empty() {
            return Ok(chunk.iter().copied().collect());
        }
        Ok(self.picks.iter().map(|&p| chunk[p]).collect())
    }

    /// First value of element `index`.
    pub fn float(&self, index: usize) -> Result<f32, ColladaError> {
        let chunk = self.floats(index)?;
        Ok(chunk[self.picks.first().copied().unwrap_or(0)])
    }

    /// Name of element `index` for string-backed sources.
    pub fn name(&self, index: usize) -> Result<&'a str, ColladaError> {
        let range = self.range(index)?;
        match self.data {
            ArrayData::Name(names) => Ok(&names[range.start + self.picks.first().copied().unwrap_or(0)]),
            other => Err(ColladaError::WrongArrayType {
                source_id: self.id.to_string(),
                expected: "name",
                found: other.type_name(),
            }),
        }
    }

    /// All names, one per element.
    pub fn names(&self) -> Result<Vec<&'a str>, ColladaError> {
        (0..self.count).map(|i| self.name(i)).collect()
    }

    /// Element `index` read as a row-major 4x4 matrix.
    pub fn matrix(&self, index: usize) -> Result<Mat4, ColladaError> {
        if self.stride < 16 {
            return Err(ColladaError::BadStride {
                semantic: "matrix",
                source_id: self.id.to_string(),
                stride: self.stride,
                min: 16,
            });
        }
        let chunk = self.floats(index)?;
        Ok(row_major_matrix(&chunk[..16]))
    }
}

/// Convert 16 row-major floats into a matrix.
pub fn row_major_matrix(values: &[f32]) -> Mat4 {
    let mut cols = [0.0f32; 16];
    cols.copy_from_slice(&values[..16]);
    Mat4::from_cols_array(&cols).transpose()
}
