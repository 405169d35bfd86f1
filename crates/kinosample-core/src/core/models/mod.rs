//! Data structures describing the molecular system: atoms with live and
//! reference coordinates, covalent and constraint bonds, and the `Molecule`
//! container with its covalent adjacency cache.

pub mod atom;
pub mod bond;
pub mod ids;
pub mod molecule;
