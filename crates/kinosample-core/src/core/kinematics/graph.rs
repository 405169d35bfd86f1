use super::dof::DegreeOfFreedom;
use crate::core::models::ids::{AtomId, VertexId};
use nalgebra::Isometry3;

/// A rigid body in the kinematic tree: a cluster of atoms that move together.
///
/// The parent link and the accumulated transform are written once during tree
/// construction and forward propagation respectively; virtual vertices (used
/// for global whole-body DOFs) own no atoms.
#[derive(Debug, Clone)]
pub struct KinematicVertex {
    /// Atoms belonging to this rigid body (empty for virtual vertices).
    pub atoms: Vec<AtomId>,
    /// Parent vertex in the spanning tree; `None` only for the root.
    pub parent: Option<VertexId>,
    /// Index (into the tree's edge list) of the edge from the parent to this
    /// vertex; `None` only for the root.
    pub parent_edge: Option<usize>,
    /// Indices of the edges leading to this vertex's children.
    pub children: Vec<usize>,
    /// Accumulated rigid transform relative to the root.
    pub transform: Isometry3<f64>,
}

impl KinematicVertex {
    pub fn new(atoms: Vec<AtomId>) -> Self {
        Self {
            atoms,
            parent: None,
            parent_edge: None,
            children: Vec::new(),
            transform: Isometry3::identity(),
        }
    }

    pub fn is_virtual(&self) -> bool {
        self.atoms.is_empty()
    }
}

/// A directed tree edge from a parent vertex to a child vertex, carrying one
/// degree of freedom.
#[derive(Debug, Clone)]
pub struct KinematicEdge {
    pub start: VertexId,
    pub end: VertexId,
    /// Index of the underlying bond in the molecule, or `None` for global
    /// virtual DOFs.
    pub bond: Option<usize>,
    pub dof: DegreeOfFreedom,
    /// Position of this edge's DOF in the full DOF vector.
    pub dof_index: usize,
    /// Position in the reduced cycle-only DOF vector, or `None` when this
    /// edge lies on no cycle path.
    pub cycle_index: Option<usize>,
}

/// A cycle-closing edge: a bond whose endpoints are already connected through
/// the spanning tree.
///
/// `vertex1` is always the body owning the bond's first atom. The common
/// ancestor is precomputed at construction time; the Jacobian builder walks
/// both endpoint chains up to it.
#[derive(Debug, Clone, Copy)]
pub struct CycleEdge {
    /// Index of the closing bond in the molecule.
    pub bond: usize,
    pub vertex1: VertexId,
    pub vertex2: VertexId,
    pub common_ancestor: VertexId,
}
