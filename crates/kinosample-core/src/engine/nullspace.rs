//! Nullspace of the cycle constraint Jacobian.
//!
//! The right-singular vectors belonging to numerically zero singular values
//! span the internal motions that keep every cycle-closure constraint intact
//! to first order. The same basis doubles as the input to rigidity analysis:
//! a DOF (or an auxiliary constraint row block) with no projection onto the
//! basis admits no constraint-preserving motion at all.

use crate::engine::config::NullspaceParameters;
use crate::engine::error::EngineError;
use crate::engine::jacobian::CycleJacobians;
use nalgebra::{DMatrix, DVector};
use tracing::debug;

/// An orthonormal nullspace basis of a constraint Jacobian, together with
/// the rigidity classification derived from it.
#[derive(Debug, Clone)]
pub struct Nullspace {
    num_dofs: usize,
    rank: usize,
    /// Orthonormal basis, one column per nullspace dimension.
    basis: DMatrix<f64>,
    svd_cutoff: f64,
    rigid_tol: f64,
    /// Per-DOF rigidity over the matrix's column space.
    rigid_dofs: Vec<bool>,
    num_coordinated_dofs: usize,
    rigid_hbonds: Vec<bool>,
    rigid_distance_bonds: Vec<bool>,
    rigid_hydrophobic_bonds: Vec<bool>,
}

impl Nullspace {
    /// Computes the nullspace of `matrix` by singular value decomposition.
    ///
    /// nalgebra's thin SVD of an m-by-n matrix with m < n only returns
    /// min(m, n) right-singular vectors, which would silently truncate the
    /// nullspace. Padding the matrix with zero rows up to n-by-n leaves the
    /// singular values and right-singular vectors unchanged and makes the
    /// full basis available.
    pub fn from_matrix(matrix: &DMatrix<f64>, params: NullspaceParameters) -> Self {
        let mut nullspace = Self {
            num_dofs: 0,
            rank: 0,
            basis: DMatrix::zeros(0, 0),
            svd_cutoff: params.svd_cutoff,
            rigid_tol: params.rigid_tol,
            rigid_dofs: Vec::new(),
            num_coordinated_dofs: 0,
            rigid_hbonds: Vec::new(),
            rigid_distance_bonds: Vec::new(),
            rigid_hydrophobic_bonds: Vec::new(),
        };
        nullspace.update_from_matrix(matrix);
        nullspace
    }

    /// Recomputes the decomposition for a new matrix, keeping the
    /// tolerances. Any previous rigidity classification is discarded.
    pub fn update_from_matrix(&mut self, matrix: &DMatrix<f64>) {
        let (m, n) = matrix.shape();
        let work = if m < n {
            matrix.clone().resize_vertically(n, 0.0)
        } else {
            matrix.clone()
        };
        let svd = work.svd(false, true);
        let v_t = svd.v_t.expect("V^T was requested from the SVD");

        // Singular values come out sorted in decreasing order.
        let rank = svd
            .singular_values
            .iter()
            .filter(|&&sigma| sigma > self.svd_cutoff)
            .count();
        let dimension = n - rank;
        let mut basis = DMatrix::zeros(n, dimension);
        for j in 0..dimension {
            basis.set_column(j, &v_t.row(rank + j).transpose());
        }

        self.rigid_dofs = (0..n)
            .map(|i| basis.row(i).iter().all(|v| v.abs() < self.rigid_tol))
            .collect();
        self.num_coordinated_dofs = self.rigid_dofs.iter().filter(|&&r| !r).count();
        self.num_dofs = n;
        self.rank = rank;
        self.basis = basis;
        self.rigid_hbonds.clear();
        self.rigid_distance_bonds.clear();
        self.rigid_hydrophobic_bonds.clear();
        debug!(
            num_dofs = n,
            rank,
            dimension,
            num_coordinated_dofs = self.num_coordinated_dofs,
            "Nullspace computed"
        );
    }

    /// Number of columns of the decomposed matrix.
    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    /// Numerical rank of the decomposed matrix.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Dimension of the nullspace.
    pub fn dimension(&self) -> usize {
        self.basis.ncols()
    }

    pub fn basis(&self) -> &DMatrix<f64> {
        &self.basis
    }

    /// Orthogonal projection of `vector` onto the nullspace.
    ///
    /// A zero-dimensional nullspace projects everything to the zero vector.
    ///
    /// # Errors
    ///
    /// Fails when the vector length does not match the column space.
    pub fn project(&self, vector: &DVector<f64>) -> Result<DVector<f64>, EngineError> {
        if vector.len() != self.num_dofs {
            return Err(EngineError::DofCountMismatch {
                expected: self.num_dofs,
                actual: vector.len(),
            });
        }
        if self.basis.ncols() == 0 {
            return Ok(DVector::zeros(self.num_dofs));
        }
        Ok(&self.basis * (self.basis.transpose() * vector))
    }

    /// Classifies each cycle-closing bond as rigidified or rotatable by
    /// multiplying its auxiliary constraint rows against the basis.
    ///
    /// A bond whose auxiliary block annihilates the whole basis has no
    /// residual motion: every admissible velocity leaves it fixed.
    pub fn rigidity_analysis(&mut self, jacobians: &CycleJacobians) {
        self.rigid_hbonds = self.rigid_blocks(jacobians.hbond.as_ref(), 1);
        self.rigid_distance_bonds = self.rigid_blocks(jacobians.distance.as_ref(), 3);
        self.rigid_hydrophobic_bonds = self.rigid_blocks(jacobians.hydrophobic.as_ref(), 5);
        debug!(
            num_rigid_dofs = self.num_dofs - self.num_coordinated_dofs,
            num_rigid_hbonds = self.rigid_hbonds.iter().filter(|&&r| r).count(),
            num_rigid_distance_bonds =
                self.rigid_distance_bonds.iter().filter(|&&r| r).count(),
            num_rigid_hydrophobic_bonds =
                self.rigid_hydrophobic_bonds.iter().filter(|&&r| r).count(),
            "Rigidity analysis complete"
        );
    }

    fn rigid_blocks(&self, matrix: Option<&DMatrix<f64>>, rows_per_bond: usize) -> Vec<bool> {
        let Some(matrix) = matrix else {
            return Vec::new();
        };
        let product = matrix * &self.basis;
        (0..matrix.nrows() / rows_per_bond)
            .map(|bond| {
                (0..rows_per_bond).all(|r| {
                    product
                        .row(bond * rows_per_bond + r)
                        .iter()
                        .all(|v| v.abs() < self.rigid_tol)
                })
            })
            .collect()
    }

    pub fn is_dof_rigid(&self, cycle_dof: usize) -> bool {
        self.rigid_dofs.get(cycle_dof).copied().unwrap_or(false)
    }

    /// Number of cycle DOFs that retain coordinated motion.
    pub fn num_coordinated_dofs(&self) -> usize {
        self.num_coordinated_dofs
    }

    pub fn num_rigid_dofs(&self) -> usize {
        self.num_dofs - self.num_coordinated_dofs
    }

    /// Rigidity of the n-th hydrogen (or covalent closure) bond, in
    /// cycle-edge order. Empty until [`Self::rigidity_analysis`] ran.
    pub fn is_hbond_rigid(&self, index: usize) -> bool {
        self.rigid_hbonds.get(index).copied().unwrap_or(false)
    }

    pub fn is_distance_bond_rigid(&self, index: usize) -> bool {
        self.rigid_distance_bonds.get(index).copied().unwrap_or(false)
    }

    pub fn is_hydrophobic_bond_rigid(&self, index: usize) -> bool {
        self.rigid_hydrophobic_bonds
            .get(index)
            .copied()
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> NullspaceParameters {
        NullspaceParameters::default()
    }

    #[test]
    fn wide_matrix_recovers_full_nullspace_despite_thin_svd() {
        // One constraint row over three DOFs: the nullspace is the x-y plane.
        let matrix = DMatrix::from_row_slice(1, 3, &[0.0, 0.0, 1.0]);
        let ns = Nullspace::from_matrix(&matrix, params());
        assert_eq!(ns.rank(), 1);
        assert_eq!(ns.dimension(), 2);
        for j in 0..2 {
            let column = ns.basis().column(j);
            assert!(column[2].abs() < 1e-12);
            assert!((column.norm() - 1.0).abs() < 1e-12);
        }
        // The basis is orthonormal.
        let gram = ns.basis().transpose() * ns.basis();
        assert!((gram - DMatrix::identity(2, 2)).norm() < 1e-12);
        assert!(!ns.is_dof_rigid(0));
        assert!(!ns.is_dof_rigid(1));
        assert!(ns.is_dof_rigid(2));
        assert_eq!(ns.num_coordinated_dofs(), 2);
    }

    #[test]
    fn projection_zeroes_constrained_directions() {
        let matrix = DMatrix::from_row_slice(1, 3, &[0.0, 0.0, 1.0]);
        let ns = Nullspace::from_matrix(&matrix, params());
        let projected = ns.project(&DVector::from_vec(vec![1.0, 2.0, 3.0])).unwrap();
        assert!((projected[0] - 1.0).abs() < 1e-10);
        assert!((projected[1] - 2.0).abs() < 1e-10);
        assert!(projected[2].abs() < 1e-10);
    }

    #[test]
    fn full_rank_matrix_has_empty_nullspace() {
        let matrix = DMatrix::identity(2, 2);
        let ns = Nullspace::from_matrix(&matrix, params());
        assert_eq!(ns.rank(), 2);
        assert_eq!(ns.dimension(), 0);
        assert!(ns.is_dof_rigid(0));
        assert!(ns.is_dof_rigid(1));
        let projected = ns.project(&DVector::from_vec(vec![4.0, -1.0])).unwrap();
        assert!(projected.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn projection_is_idempotent() {
        let matrix = DMatrix::from_row_slice(2, 4, &[1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, -1.0]);
        let ns = Nullspace::from_matrix(&matrix, params());
        assert_eq!(ns.dimension(), 2);
        let v = DVector::from_vec(vec![0.3, -1.2, 2.0, 0.7]);
        let once = ns.project(&v).unwrap();
        let twice = ns.project(&once).unwrap();
        assert!((&once - &twice).norm() < 1e-10);
        // The projection satisfies the constraints.
        assert!((&matrix * &once).norm() < 1e-10);
    }

    #[test]
    fn project_rejects_wrong_length() {
        let matrix = DMatrix::identity(2, 2);
        let ns = Nullspace::from_matrix(&matrix, params());
        assert!(matches!(
            ns.project(&DVector::zeros(3)),
            Err(EngineError::DofCountMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn update_from_matrix_replaces_previous_decomposition() {
        let mut ns = Nullspace::from_matrix(&DMatrix::identity(2, 2), params());
        assert_eq!(ns.dimension(), 0);
        ns.update_from_matrix(&DMatrix::from_row_slice(1, 3, &[0.0, 0.0, 1.0]));
        assert_eq!(ns.num_dofs(), 3);
        assert_eq!(ns.rank(), 1);
        assert_eq!(ns.dimension(), 2);
    }

    #[test]
    fn rank_respects_svd_cutoff() {
        // A nearly singular second row drops below an aggressive cutoff.
        let matrix = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1e-9]);
        let strict = Nullspace::from_matrix(&matrix, params());
        assert_eq!(strict.rank(), 2);
        let loose = Nullspace::from_matrix(&matrix, params().with_svd_cutoff(1e-6));
        assert_eq!(loose.rank(), 1);
        assert_eq!(loose.dimension(), 1);
    }

    #[test]
    fn auxiliary_blocks_classify_bond_rigidity() {
        // Nullspace of the constraint is span{(0, 1, 0), (0, 0, 1)}.
        let cycle = DMatrix::from_row_slice(1, 3, &[1.0, 0.0, 0.0]);
        let mut ns = Nullspace::from_matrix(&cycle, params());
        // First hbond row only touches the constrained DOF, second one moves
        // with the basis.
        let hbond = DMatrix::from_row_slice(2, 3, &[2.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        let jacobians = CycleJacobians {
            cycle,
            hbond: Some(hbond),
            distance: None,
            hydrophobic: None,
        };
        ns.rigidity_analysis(&jacobians);
        assert!(ns.is_hbond_rigid(0));
        assert!(!ns.is_hbond_rigid(1));
        assert!(ns.rigid_distance_bonds.is_empty());
    }
}
