//! Parameter vector manager: flat vector ↔ graph poses
//!
//! Flattens the poses of every *movable* node — referenced by at least one
//! constraint and not the root — into one real-valued vector for the
//! optimizer, and scatters a vector back into the graph afterwards.
//!
//! The parameter block of a node holds its **world** pose (6 elements, see
//! [`Pose::to_vector`]). Optimizing world poses keeps every cost term a
//! function of only the blocks of the two bodies it references, even when
//! free nodes are nested; the write-back converts to local poses against the
//! parent's already-updated world pose.
//!
//! Ordering is deterministic: nodes appear in order of first reference over
//! the constraint set's creation order, so the same constraints and poses
//! always produce the same layout.

use crate::assembly::{Assembly, NodeId};
use crate::constraint::ConstraintSet;
use crate::error::AssemblyResult;
use crate::pose::Pose;
use nalgebra::DVector;
use std::collections::HashMap;

/// Assignment of free nodes to fixed 6-element slices of the flat vector.
pub struct ParameterLayout {
    free: Vec<NodeId>,
    slots: HashMap<NodeId, usize>,
}

impl ParameterLayout {
    /// Determine the free node set and build the initial vector from current
    /// world poses.
    ///
    /// Nodes never referenced by any constraint are absent from the layout
    /// and keep their declared pose through a solve.
    pub fn collect(
        assembly: &Assembly,
        constraints: &ConstraintSet,
    ) -> AssemblyResult<(ParameterLayout, DVector<f64>)> {
        let mut free = Vec::new();
        let mut slots = HashMap::new();

        for (_, constraint) in constraints.iter() {
            for reference in [&constraint.a, &constraint.b] {
                let node = assembly.resolve(&reference.path)?;
                if node == assembly.root() || slots.contains_key(&node) {
                    continue;
                }
                slots.insert(node, free.len());
                free.push(node);
            }
        }

        let mut x0 = DVector::zeros(free.len() * Pose::DOF);
        for (slot, &node) in free.iter().enumerate() {
            let world = assembly.world_pose(node)?;
            x0.rows_mut(slot * Pose::DOF, Pose::DOF)
                .copy_from(&world.to_vector());
        }

        Ok((ParameterLayout { free, slots }, x0))
    }

    /// Number of free nodes.
    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    /// Total degrees of freedom in the flat vector.
    pub fn dof(&self) -> usize {
        self.free.len() * Pose::DOF
    }

    /// The slot a node occupies, if it is free.
    pub fn slot(&self, node: NodeId) -> Option<usize> {
        self.slots.get(&node).copied()
    }

    /// Free nodes in slot order.
    pub fn free_nodes(&self) -> &[NodeId] {
        &self.free
    }

    /// The world pose stored for `slot` in `x`.
    pub fn pose_at(&self, x: &DVector<f64>, slot: usize) -> Pose {
        Pose::from_slice(x.rows(slot * Pose::DOF, Pose::DOF).as_slice())
    }

    /// Write the optimized world poses back into the graph as local poses.
    ///
    /// Parents are written before children so a nested free node ends up at
    /// exactly the world placement the optimizer chose for it.
    pub fn scatter(&self, assembly: &mut Assembly, x: &DVector<f64>) -> AssemblyResult<()> {
        let mut ordered: Vec<(usize, NodeId)> = Vec::with_capacity(self.free.len());
        for (slot, &node) in self.free.iter().enumerate() {
            ordered.push((slot, node));
        }
        ordered.sort_by_key(|&(_, node)| assembly.depth(node).unwrap_or(usize::MAX));

        for (slot, node) in ordered {
            let world = self.pose_at(x, slot);
            let parent_world = match assembly.parent(node)? {
                Some(parent) => assembly.world_pose(parent)?,
                None => Pose::identity(),
            };
            assembly.set_local_pose(node, parent_world.inverse().compose(&world))?;
        }
        Ok(())
    }
}
