//! The sampling engine: constraint Jacobians over the kinematic tree's cycle
//! DOFs, the SVD-backed nullspace of admissible motions, rigidity
//! classification of DOFs and bonds, and the `Configuration` type that ties
//! those pieces to a concrete DOF-value vector.

pub mod config;
pub mod configuration;
pub mod error;
pub mod jacobian;
pub mod nullspace;
pub mod rigidity;
