//! # Core Module
//!
//! Fundamental building blocks for kinematic conformational sampling: the
//! molecular data model and the rigid-body spanning tree it is abstracted
//! into.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Atoms, bonds (covalent and
//!   non-covalent constraint bonds), and the `Molecule` container.
//! - **Kinematic Abstraction** ([`kinematics`]) - Rigid-body vertices,
//!   rotatable-bond edges with degrees of freedom, cycle-closing edges, and
//!   the rooted spanning tree connecting them.
//! - **Geometry Utilities** ([`utils`]) - Small free-function helpers on
//!   `nalgebra` types shared by the kinematics and engine layers.

pub mod kinematics;
pub mod models;
pub mod utils;
