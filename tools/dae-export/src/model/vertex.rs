//! Output vertices and exact-equality welding

use hashbrown::HashMap;

/// One output vertex. Elements not in the vertex declaration keep their
/// defaults so they never split otherwise identical vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub colour: [f32; 4],
    pub weights: [f32; 4],
    pub joint_indices: [u32; 4],
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            normal: [0.0; 3],
            uv: [0.0; 2],
            colour: [1.0; 4],
            weights: [0.0; 4],
            joint_indices: [0; 4],
        }
    }
}

/// Hashable image of a vertex. Two vertices have equal keys exactly when
/// every field compares equal as floats, except that `-0.0` is folded into
/// `0.0` and every NaN is folded into one value. NaN vertices therefore weld
/// together even though they never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct VertexKey([u32; 20]);

fn float_bits(value: f32) -> u32 {
    if value == 0.0 {
        0
    } else if value.is_nan() {
        f32::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

impl Vertex {
    fn key(&self) -> VertexKey {
        let mut key = [0u32; 20];
        let floats = self
            .position
            .iter()
            .chain(&self.normal)
            .chain(&self.uv)
            .chain(&self.colour)
            .chain(&self.weights);
        for (slot, value) in key.iter_mut().zip(floats) {
            *slot = float_bits(*value);
        }
        key[16..].copy_from_slice(&self.joint_indices);
        VertexKey(key)
    }
}

/// Vertex list with an index of the vertices already present.
#[derive(Debug, Clone, Default)]
pub struct VertexWelder {
    vertices: Vec<Vertex>,
    lookup: HashMap<VertexKey, u32>,
}

impl VertexWelder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of an equal vertex already in the list, appending it if there
    /// is none.
    pub fn insert(&mut self, vertex: Vertex) -> u32 {
        let next = self.vertices.len() as u32;
        let index = *self.lookup.entry(vertex.key()).or_insert(next);
        if index == next {
            self.vertices.push(vertex);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn into_vertices(self) -> Vec<Vertex> {
        self.vertices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f32, y: f32, z: f32) -> Vertex {
        Vertex {
            position: [x, y, z],
            ..Default::default()
        }
    }

    #[test]
    fn test_identical_vertices_share_index() {
        let mut welder = VertexWelder::new();
        assert_eq!(welder.insert(at(1.0, 2.0, 3.0)), 0);
        assert_eq!(welder.insert(at(4.0, 5.0, 6.0)), 1);
        assert_eq!(welder.insert(at(1.0, 2.0, 3.0)), 0);
        assert_eq!(welder.len(), 2);
    }

    #[test]
    fn test_any_field_difference_splits() {
        let mut welder = VertexWelder::new();
        let a = at(0.0, 0.0, 0.0);
        let mut b = a;
        b.joint_indices[3] = 1;
        let mut c = a;
        c.uv[1] = f32::EPSILON;
        assert_eq!(welder.insert(a), 0);
        assert_eq!(welder.insert(b), 1);
        assert_eq!(welder.insert(c), 2);
    }

    #[test]
    fn test_negative_zero_equals_zero() {
        let mut welder = VertexWelder::new();
        assert_eq!(welder.insert(at(0.0, 1.0, 0.0)), 0);
        assert_eq!(welder.insert(at(-0.0, 1.0, -0.0)), 0);
        assert_eq!(welder.vertices()[0].position, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_nan_payloads_weld_together() {
        let mut welder = VertexWelder::new();
        let quiet = f32::NAN;
        let other = f32::from_bits(0xffc0_0001);
        assert!(other.is_nan());
        assert_ne!(quiet.to_bits(), other.to_bits());

        assert_eq!(welder.insert(at(quiet, 1.0, 0.0)), 0);
        assert_eq!(welder.insert(at(other, 1.0, 0.0)), 0);
        assert_eq!(welder.insert(at(1.0, 1.0, 0.0)), 1);
        assert_eq!(welder.len(), 2);
    }
}
