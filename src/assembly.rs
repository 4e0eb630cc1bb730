//! Assembly graph: a tree of named parts with nested poses
//!
//! Each node owns a shape handle and a pose *local to its parent*; a node's
//! world pose is the composition of every ancestor's local pose with its own.
//! The root is created with the assembly, keeps the identity pose forever,
//! and is never a free optimization variable.
//!
//! The graph exclusively owns its nodes. Constraints refer to nodes by path,
//! never by pointer, so there is no ownership cycle between the constraint
//! list and the tree it relates.

use crate::error::{AssemblyError, AssemblyResult};
use crate::geometry::ShapeId;
use crate::pose::Pose;
use std::collections::HashMap;
use std::fmt;

/// Handle to a node inside one [`Assembly`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

struct Node {
    name: String,
    shape: Option<ShapeId>,
    local_pose: Pose,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    anchors: HashMap<String, String>,
    alive: bool,
}

/// A tree of rigid parts. See the module docs.
pub struct Assembly {
    nodes: Vec<Node>,
}

impl Assembly {
    const ROOT: NodeId = NodeId(0);

    /// Create an assembly whose root carries no shape of its own.
    pub fn new() -> Self {
        Self::build_root(None)
    }

    /// Create an assembly whose root itself carries a shape (a fixed base
    /// part that other parts mate against).
    pub fn with_root_shape(shape: ShapeId) -> Self {
        Self::build_root(Some(shape))
    }

    fn build_root(shape: Option<ShapeId>) -> Self {
        Assembly {
            nodes: vec![Node {
                name: "root".to_string(),
                shape,
                local_pose: Pose::identity(),
                parent: None,
                children: Vec::new(),
                anchors: HashMap::new(),
                alive: true,
            }],
        }
    }

    /// The root node. Its pose is always identity.
    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    /// Add a part under `parent_path` (empty string for the root).
    ///
    /// Fails with [`AssemblyError::NameConflict`] if a sibling with the same
    /// name exists, with [`AssemblyError::NotFound`] if the parent path does
    /// not resolve. The graph is untouched on failure.
    pub fn add_part(
        &mut self,
        parent_path: &str,
        name: &str,
        shape: ShapeId,
        initial_pose: Pose,
    ) -> AssemblyResult<NodeId> {
        if name.is_empty() || name.contains('/') {
            return Err(AssemblyError::InvalidInput(format!(
                "part name '{name}' must be non-empty and must not contain '/'"
            )));
        }
        let parent = self.resolve(parent_path)?;
        if self.child_by_name(parent, name).is_some() {
            return Err(AssemblyError::NameConflict {
                parent: self.node_path(parent),
                name: name.to_string(),
            });
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.to_string(),
            shape: Some(shape),
            local_pose: initial_pose,
            parent: Some(parent),
            children: Vec::new(),
            anchors: HashMap::new(),
            alive: true,
        });
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    /// Resolve a `/`-separated path from the root. The empty path is the root.
    pub fn resolve(&self, path: &str) -> AssemblyResult<NodeId> {
        let mut current = Self::ROOT;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = self
                .child_by_name(current, segment)
                .ok_or_else(|| AssemblyError::not_found(path))?;
        }
        Ok(current)
    }

    /// World pose of a node: composition of all ancestor local poses.
    pub fn world_pose(&self, node: NodeId) -> AssemblyResult<Pose> {
        let mut chain = self.checked(node)?;
        let mut pose = self.nodes[chain.0].local_pose;
        while let Some(parent) = self.nodes[chain.0].parent {
            pose = self.nodes[parent.0].local_pose.compose(&pose);
            chain = parent;
        }
        Ok(pose)
    }

    /// Set a node's pose relative to its parent.
    ///
    /// The root's pose is pinned to identity and cannot be changed. This is
    /// the only mutator the solve driver calls, once per affected node; it is
    /// a plain assignment, so repeated calls with the same pose accumulate no
    /// error.
    pub fn set_local_pose(&mut self, node: NodeId, pose: Pose) -> AssemblyResult<()> {
        self.checked(node)?;
        if node == Self::ROOT {
            return Err(AssemblyError::InvalidInput(
                "the root pose is fixed at identity".to_string(),
            ));
        }
        self.nodes[node.0].local_pose = pose;
        Ok(())
    }

    /// A node's pose relative to its parent.
    pub fn local_pose(&self, node: NodeId) -> AssemblyResult<Pose> {
        Ok(self.nodes[self.checked(node)?.0].local_pose)
    }

    /// The shape handle carried by a node, if any.
    pub fn shape(&self, node: NodeId) -> AssemblyResult<Option<ShapeId>> {
        Ok(self.nodes[self.checked(node)?.0].shape)
    }

    /// A node's name within its sibling group.
    pub fn name(&self, node: NodeId) -> AssemblyResult<&str> {
        Ok(self.nodes[self.checked(node)?.0].name.as_str())
    }

    /// A node's parent, `None` for the root.
    pub fn parent(&self, node: NodeId) -> AssemblyResult<Option<NodeId>> {
        Ok(self.nodes[self.checked(node)?.0].parent)
    }

    /// Number of edges between a node and the root.
    pub fn depth(&self, node: NodeId) -> AssemblyResult<usize> {
        let mut current = self.checked(node)?;
        let mut depth = 0;
        while let Some(parent) = self.nodes[current.0].parent {
            depth += 1;
            current = parent;
        }
        Ok(depth)
    }

    /// Full `/`-separated path of a node from the root (empty for the root).
    pub fn node_path(&self, node: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = node;
        while let Some(parent) = self.nodes[current.0].parent {
            segments.push(self.nodes[current.0].name.clone());
            current = parent;
        }
        segments.reverse();
        segments.join("/")
    }

    /// Tag a named anchor on a node, forwarding to a kernel feature selector.
    ///
    /// Constraints may then address the feature by tag instead of repeating
    /// the selector.
    pub fn set_anchor(&mut self, path: &str, tag: &str, selector: &str) -> AssemblyResult<()> {
        let node = self.resolve(path)?;
        self.nodes[node.0]
            .anchors
            .insert(tag.to_string(), selector.to_string());
        Ok(())
    }

    /// Translate a feature name through a node's anchor table. Unknown tags
    /// pass through unchanged as plain kernel selectors.
    pub fn anchor_selector(&self, node: NodeId, feature: &str) -> AssemblyResult<String> {
        let node = self.checked(node)?;
        Ok(self.nodes[node.0]
            .anchors
            .get(feature)
            .cloned()
            .unwrap_or_else(|| feature.to_string()))
    }

    /// Remove a node and all of its descendants. The root cannot be removed.
    pub fn remove(&mut self, path: &str) -> AssemblyResult<()> {
        let node = self.resolve(path)?;
        if node == Self::ROOT {
            return Err(AssemblyError::InvalidInput(
                "the root cannot be removed".to_string(),
            ));
        }
        if let Some(parent) = self.nodes[node.0].parent {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            self.nodes[current.0].alive = false;
            stack.extend(self.nodes[current.0].children.iter().copied());
        }
        Ok(())
    }

    /// All live nodes, root first, in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.alive)
            .map(|(i, _)| NodeId(i))
    }

    fn child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.nodes[parent.0]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c.0].alive && self.nodes[c.0].name == name)
    }

    fn checked(&self, node: NodeId) -> AssemblyResult<NodeId> {
        match self.nodes.get(node.0) {
            Some(n) if n.alive => Ok(node),
            _ => Err(AssemblyError::not_found(node.to_string())),
        }
    }
}

impl Default for Assembly {
    fn default() -> Self {
        Self::new()
    }
}
