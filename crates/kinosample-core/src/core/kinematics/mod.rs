//! The kinematic abstraction of a molecule: rigid bodies as vertices of a
//! rooted spanning tree, rotatable bonds as edges carrying degrees of
//! freedom, and cycle-closing edges for the non-covalent contacts that
//! constrain the tree.

pub mod dof;
pub mod graph;
pub mod tree;
