use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Numerical thresholds for the SVD-backed nullspace analysis.
///
/// Both tolerances are absolute. `svd_cutoff` separates numerically zero
/// singular values from nonzero ones when determining the matrix rank;
/// `rigid_tol` is the magnitude below which a nullspace-basis entry counts as
/// zero during rigidity classification. They default to the values that have
/// proven robust for protein-scale systems and rarely need tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NullspaceParameters {
    /// Singular values below this threshold are treated as zero.
    pub svd_cutoff: f64,
    /// Basis entries below this threshold are treated as zero.
    pub rigid_tol: f64,
}

impl Default for NullspaceParameters {
    fn default() -> Self {
        Self {
            svd_cutoff: 1e-12,
            rigid_tol: 1e-10,
        }
    }
}

impl NullspaceParameters {
    pub fn with_svd_cutoff(mut self, svd_cutoff: f64) -> Self {
        self.svd_cutoff = svd_cutoff;
        self
    }

    pub fn with_rigid_tol(mut self, rigid_tol: f64) -> Self {
        self.rigid_tol = rigid_tol;
        self
    }
}

/// Which rigidified bonds participate when atoms are merged into rigid
/// clusters after a rigidity analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CollapseRigidEdges {
    /// Keep the original rigid-body partition.
    #[default]
    Off,
    /// Merge bodies across rigidified covalent bonds.
    Covalent,
    /// Merge bodies across all rigidified bonds, non-covalent ones included.
    All,
}

#[derive(Debug, Error)]
#[error("Invalid collapse mode '{0}' (expected off/0, covalent/1 or all/2)")]
pub struct ParseCollapseError(String);

impl FromStr for CollapseRigidEdges {
    type Err = ParseCollapseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "0" | "off" => Ok(Self::Off),
            "1" | "covalent" => Ok(Self::Covalent),
            "2" | "all" => Ok(Self::All),
            other => Err(ParseCollapseError(other.to_string())),
        }
    }
}

impl fmt::Display for CollapseRigidEdges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Off => "off",
                Self::Covalent => "covalent",
                Self::All => "all",
            }
        )
    }
}

/// Top-level engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParameters {
    pub nullspace: NullspaceParameters,
    pub collapse_rigid_edges: CollapseRigidEdges,
    /// When false, clash-avoiding Jacobians omit the cycle-closure rows and
    /// constrain the clash directions only. Used for testing constraint
    /// limitations; leave on for sampling.
    pub project_constraints: bool,
}

impl Default for SamplingParameters {
    fn default() -> Self {
        Self {
            nullspace: NullspaceParameters::default(),
            collapse_rigid_edges: CollapseRigidEdges::default(),
            project_constraints: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tolerances() {
        let params = NullspaceParameters::default();
        assert_eq!(params.svd_cutoff, 1e-12);
        assert_eq!(params.rigid_tol, 1e-10);
    }

    #[test]
    fn builder_setters_override_defaults() {
        let params = NullspaceParameters::default()
            .with_svd_cutoff(1e-9)
            .with_rigid_tol(1e-6);
        assert_eq!(params.svd_cutoff, 1e-9);
        assert_eq!(params.rigid_tol, 1e-6);
    }

    #[test]
    fn collapse_mode_parses_names_and_numbers() {
        assert_eq!(
            "off".parse::<CollapseRigidEdges>().unwrap(),
            CollapseRigidEdges::Off
        );
        assert_eq!(
            "1".parse::<CollapseRigidEdges>().unwrap(),
            CollapseRigidEdges::Covalent
        );
        assert_eq!(
            "ALL".parse::<CollapseRigidEdges>().unwrap(),
            CollapseRigidEdges::All
        );
        assert!("3".parse::<CollapseRigidEdges>().is_err());
    }

    #[test]
    fn sampling_defaults_project_constraints() {
        let params = SamplingParameters::default();
        assert!(params.project_constraints);
        assert_eq!(params.collapse_rigid_edges, CollapseRigidEdges::Off);
    }
}
