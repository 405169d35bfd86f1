//! # Kinosample Core Library
//!
//! A library for kinematics-based conformational sampling of biomolecules
//! (proteins and nucleic acids) modeled as trees of rigid bodies connected by
//! rotatable bonds, subject to closure constraints from non-covalent contacts.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict two-layer architecture to ensure a
//! clear separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless data models
//!   (`Molecule`, `Bond`), the kinematic spanning tree over rigid bodies
//!   (`KinematicTree`), and the degree-of-freedom abstraction that turns DOF
//!   values into rigid transforms and per-point derivatives.
//!
//! - **[`engine`]: The Logic Core.** This stateful layer owns the
//!   cycle-closure constraint machinery: the Jacobian builder, the SVD-based
//!   nullspace with rigidity classification, and `Configuration` objects that
//!   cache both per sampled state and expose projection and rigidity queries
//!   to sampling moves and planners.

pub mod core;
pub mod engine;
