use crate::core::kinematics::tree::TopologyError;
use crate::core::models::molecule::MoleculeError;
use thiserror::Error;

/// Errors surfaced by the sampling engine.
///
/// Construction and analysis failures from the lower layers are wrapped
/// transparently; the remaining variants originate in the engine itself.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Kinematic topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("Molecule error: {0}")]
    Molecule(#[from] MoleculeError),

    #[error("Vector length {actual} does not match the expected {expected} entries")]
    DofCountMismatch { expected: usize, actual: usize },
}
