use super::ids::AtomId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Classifies a bond as covalent or one of the non-covalent contact types
/// that close kinematic cycles.
///
/// Each kind drives a different number of rows in the cycle-closure
/// constraint Jacobian: a hydrogen bond (and a covalent ring-closure bond,
/// which uses the same default block) constrains three translations and two
/// rotations, a distance bond constrains translations only, and a
/// hydrophobic contact constrains a single direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BondKind {
    Covalent,
    Hydrogen,
    Hydrophobic,
    Distance,
}

impl BondKind {
    /// Number of rows this bond contributes to the cycle constraint Jacobian
    /// when it closes a cycle.
    pub fn constraint_rows(&self) -> usize {
        match self {
            BondKind::Covalent | BondKind::Hydrogen => 5,
            BondKind::Distance => 3,
            BondKind::Hydrophobic => 1,
        }
    }

    /// Number of rows this bond contributes to its kind-specific auxiliary
    /// Jacobian used for rigidity classification.
    pub fn auxiliary_rows(&self) -> usize {
        match self {
            BondKind::Covalent | BondKind::Hydrogen => 1,
            BondKind::Distance => 3,
            BondKind::Hydrophobic => 5,
        }
    }

    pub fn is_covalent(&self) -> bool {
        matches!(self, BondKind::Covalent)
    }
}

impl Default for BondKind {
    fn default() -> Self {
        BondKind::Covalent
    }
}

#[derive(Debug, Error)]
#[error("Invalid bond kind string")]
pub struct ParseBondKindError;

impl FromStr for BondKind {
    type Err = ParseBondKindError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cov" | "covalent" => Ok(Self::Covalent),
            "h" | "hb" | "hydrogen" => Ok(Self::Hydrogen),
            "hy" | "hydrophobic" => Ok(Self::Hydrophobic),
            "d" | "distance" => Ok(Self::Distance),
            _ => Err(ParseBondKindError),
        }
    }
}

impl fmt::Display for BondKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Covalent => "Covalent",
                Self::Hydrogen => "Hydrogen",
                Self::Hydrophobic => "Hydrophobic",
                Self::Distance => "Distance",
            }
        )
    }
}

/// A covalent or non-covalent connection between two atoms.
///
/// The `rigidified` flag is set by rigidity analysis when the current set of
/// closure constraints leaves the bond no rotational freedom; it is cleared
/// at the start of every analysis run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bond {
    pub atom1_id: AtomId,
    pub atom2_id: AtomId,
    pub kind: BondKind,
    pub rigidified: bool,
}

impl Bond {
    pub fn new(atom1_id: AtomId, atom2_id: AtomId, kind: BondKind) -> Self {
        Self {
            atom1_id,
            atom2_id,
            kind,
            rigidified: false,
        }
    }

    pub fn contains(&self, atom_id: AtomId) -> bool {
        self.atom1_id == atom_id || self.atom2_id == atom_id
    }
}
