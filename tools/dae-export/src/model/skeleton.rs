//! Skeleton flattening
//!
//! Every JOINT node of the exported scene becomes one skeleton entry, in
//! depth-first document order. Parents are linked by index in a second pass
//! so entry order never has to follow the hierarchy.

use hashbrown::HashMap;

use crate::collada::{ColladaError, Document, NodeIndex, VisualScene};

/// One entry of the flattened skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonNode {
    pub id: String,
    pub name: String,
    pub sid: Option<String>,
    /// Index of the nearest JOINT ancestor, -1 for skeleton roots
    pub parent: i32,
    /// Scene node this entry was built from
    pub node: NodeIndex,
}

/// Joint collected before parent resolution.
#[derive(Debug, Clone)]
pub struct JointEntry {
    pub id: String,
    pub name: String,
    pub sid: Option<String>,
    pub parent_id: Option<String>,
    pub node: NodeIndex,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skeleton {
    pub nodes: Vec<SkeletonNode>,
}

impl Skeleton {
    /// Collect the JOINT nodes of a scene.
    pub fn from_scene(doc: &Document, scene: &VisualScene) -> Result<Self, ColladaError> {
        let mut entries = Vec::new();
        // (node, nearest joint ancestor id)
        let mut stack: Vec<(NodeIndex, Option<String>)> =
            scene.roots.iter().rev().map(|&root| (root, None)).collect();

        while let Some((index, ancestor)) = stack.pop() {
            let node = doc.node(index);
            let child_ancestor = if node.is_joint() {
                entries.push(JointEntry {
                    id: node.id.clone(),
                    name: node.display_name().to_string(),
                    sid: node.sid.clone(),
                    parent_id: ancestor,
                    node: index,
                });
                Some(node.id.clone())
            } else {
                ancestor
            };
            for &child in node.children.iter().rev() {
                stack.push((child, child_ancestor.clone()));
            }
        }

        Self::resolve(entries)
    }

    /// Link parent ids to indices.
    pub fn resolve(entries: Vec<JointEntry>) -> Result<Self, ColladaError> {
        let parents = Self::parent_indices(&entries)?;
        let nodes = entries
            .into_iter()
            .zip(parents)
            .map(|(entry, parent)| SkeletonNode {
                id: entry.id,
                name: entry.name,
                sid: entry.sid,
                parent,
                node: entry.node,
            })
            .collect();
        Ok(Self { nodes })
    }

    fn parent_indices(entries: &[JointEntry]) -> Result<Vec<i32>, ColladaError> {
        let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            index_of.entry(entry.id.as_str()).or_insert(index);
        }

        entries
            .iter()
            .map(|entry| match &entry.parent_id {
                None => Ok(-1),
                Some(parent) => index_of.get(parent.as_str()).map(|&i| i as i32).ok_or_else(|| {
                    ColladaError::UnresolvedReference {
                        kind: "joint",
                        id: parent.clone(),
                    }
                }),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parents(&self) -> Vec<i32> {
        self.nodes.iter().map(|n| n.parent).collect()
    }

    /// Skeleton index for a skin joint name: sid first, then id, then name.
    pub fn find(&self, name: &str) -> Option<usize> {
        let name = name.strip_prefix('#').unwrap_or(name);
        self.nodes
            .iter()
            .position(|n| n.sid.as_deref() == Some(name))
            .or_else(|| self.nodes.iter().position(|n| n.id == name))
            .or_else(|| self.nodes.iter().position(|n| n.name == name))
    }
}
