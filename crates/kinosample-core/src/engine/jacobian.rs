//! Constraint Jacobian construction over the cycle DOFs.
//!
//! Every cycle-closing bond contributes a block of constraint rows whose
//! shape depends on the bond kind, plus a kind-specific auxiliary block used
//! only for rigidity classification. Columns are the dense cycle-DOF indices
//! assigned at tree construction; entries come from walking both endpoint
//! chains of the closing bond up to their common ancestor and evaluating the
//! DOF derivatives at the bond's end-effector frame.

use crate::core::kinematics::dof::DegreeOfFreedom;
use crate::core::kinematics::tree::KinematicTree;
use crate::core::models::bond::BondKind;
use crate::core::models::ids::AtomId;
use crate::core::models::molecule::Molecule;
use crate::core::utils::geometry::orthonormal_tangents;
use crate::engine::error::EngineError;
use nalgebra::{DMatrix, Point3, Unit, Vector3};
use tracing::debug;

/// The cycle constraint Jacobian and the per-kind auxiliary Jacobians of one
/// configuration.
///
/// All matrices share the same column space (the cycle DOFs). An auxiliary
/// matrix is present only when at least one cycle-closing bond of the
/// matching kind exists.
#[derive(Debug, Clone)]
pub struct CycleJacobians {
    /// Constraint rows of all cycle-closing bonds, stacked in cycle-edge
    /// order.
    pub cycle: DMatrix<f64>,
    /// One rotation-about-axis row per hydrogen (or covalent closure) bond.
    pub hbond: Option<DMatrix<f64>>,
    /// Three rotational rows per distance bond.
    pub distance: Option<DMatrix<f64>>,
    /// Five rows (two tangential, three rotational) per hydrophobic bond.
    pub hydrophobic: Option<DMatrix<f64>>,
}

/// End-effector geometry of one cycle-closing bond: the two end atoms, their
/// frame neighbors, and the constraint normal with its tangent plane.
struct ConstraintFrame {
    p1: Point3<f64>,
    p2: Point3<f64>,
    p1_prev: Point3<f64>,
    p2_prev: Point3<f64>,
    normal: Vector3<f64>,
    t1: Vector3<f64>,
    t2: Vector3<f64>,
}

impl ConstraintFrame {
    fn build(
        molecule: &Molecule,
        atom1: AtomId,
        atom2: AtomId,
    ) -> Result<Self, EngineError> {
        let p1 = molecule.position(atom1);
        let p2 = molecule.position(atom2);
        let p1_prev = molecule.position(molecule.frame_neighbor(atom1, atom2)?);
        let p2_prev = molecule.position(molecule.frame_neighbor(atom2, atom1)?);
        let normal = Unit::new_normalize(p2 - p1);
        let (t1, t2) = orthonormal_tangents(&normal);
        Ok(Self {
            p1,
            p2,
            p1_prev,
            p2_prev,
            normal: normal.into_inner(),
            t1,
            t2,
        })
    }
}

/// The scalar entries one DOF contributes to every matrix it can appear in.
/// Which of them are written, and where, is decided by the bond kind.
struct BlockEntries {
    trans: Vector3<f64>,
    rot1: f64,
    rot2: f64,
    axis: f64,
    one_d: f64,
    tan1: f64,
    tan2: f64,
}

/// Entries for a DOF on the chain of the bond's first atom (`first_side`) or
/// its second atom. The two sides carry opposite signs so that motion of the
/// two end-effectors toward each other cancels.
fn side_entries(
    dof: &DegreeOfFreedom,
    molecule: &Molecule,
    frame: &ConstraintFrame,
    first_side: bool,
) -> BlockEntries {
    let d1 = dof.derivative(molecule, &frame.p1);
    let d2 = dof.derivative(molecule, &frame.p2);
    if first_side {
        let d1_prev = dof.derivative(molecule, &frame.p1_prev);
        BlockEntries {
            trans: 0.5 * (d1 + d2),
            rot1: (frame.p2 - frame.p1).dot(&(d1 - d1_prev)),
            rot2: (frame.p2 - frame.p2_prev).dot(&(d1 - d2)),
            axis: (frame.p1_prev - frame.p2_prev).dot(&d1_prev),
            one_d: frame.normal.dot(&d1),
            tan1: frame.t1.dot(&d1),
            tan2: frame.t2.dot(&d1),
        }
    } else {
        let d2_prev = dof.derivative(molecule, &frame.p2_prev);
        BlockEntries {
            trans: -0.5 * (d1 + d2),
            rot1: (frame.p1 - frame.p1_prev).dot(&(d2 - d1)),
            rot2: (frame.p1 - frame.p2).dot(&(d2 - d2_prev)),
            axis: -(frame.p1_prev - frame.p2_prev).dot(&d2_prev),
            one_d: -frame.normal.dot(&d2),
            tan1: -frame.t1.dot(&d2),
            tan2: -frame.t2.dot(&d2),
        }
    }
}

/// Row offsets of the current cycle edge's blocks in each matrix.
#[derive(Clone, Copy)]
struct RowOffsets {
    cycle: usize,
    hbond: usize,
    distance: usize,
    hydrophobic: usize,
}

struct Matrices {
    cycle: DMatrix<f64>,
    hbond: DMatrix<f64>,
    distance: DMatrix<f64>,
    hydrophobic: DMatrix<f64>,
}

fn write_block(
    matrices: &mut Matrices,
    kind: BondKind,
    rows: RowOffsets,
    col: usize,
    entries: &BlockEntries,
) {
    match kind {
        BondKind::Hydrophobic => {
            matrices.cycle[(rows.cycle, col)] = entries.one_d;
            matrices.hydrophobic[(rows.hydrophobic, col)] = entries.tan1;
            matrices.hydrophobic[(rows.hydrophobic + 1, col)] = entries.tan2;
            matrices.hydrophobic[(rows.hydrophobic + 2, col)] = entries.rot1;
            matrices.hydrophobic[(rows.hydrophobic + 3, col)] = entries.rot2;
            matrices.hydrophobic[(rows.hydrophobic + 4, col)] = entries.axis;
        }
        BondKind::Distance => {
            matrices.cycle[(rows.cycle, col)] = entries.trans.x;
            matrices.cycle[(rows.cycle + 1, col)] = entries.trans.y;
            matrices.cycle[(rows.cycle + 2, col)] = entries.trans.z;
            matrices.distance[(rows.distance, col)] = entries.rot1;
            matrices.distance[(rows.distance + 1, col)] = entries.rot2;
            matrices.distance[(rows.distance + 2, col)] = entries.axis;
        }
        BondKind::Hydrogen | BondKind::Covalent => {
            matrices.cycle[(rows.cycle, col)] = entries.trans.x;
            matrices.cycle[(rows.cycle + 1, col)] = entries.trans.y;
            matrices.cycle[(rows.cycle + 2, col)] = entries.trans.z;
            matrices.cycle[(rows.cycle + 3, col)] = entries.rot1;
            matrices.cycle[(rows.cycle + 4, col)] = entries.rot2;
            matrices.hbond[(rows.hbond, col)] = entries.axis;
        }
    }
}

/// Builds the cycle and auxiliary Jacobians for the molecule's current atom
/// positions.
///
/// Returns `Ok(None)` when the tree has no cycle-closing edges, in which
/// case every DOF is unconstrained.
///
/// # Errors
///
/// Fails when an end atom of a closing bond lacks the covalent neighbor
/// needed for its constraint frame.
pub fn build_cycle_jacobians(
    molecule: &Molecule,
    tree: &KinematicTree,
) -> Result<Option<CycleJacobians>, EngineError> {
    if tree.cycle_edges().is_empty() {
        return Ok(None);
    }

    let mut cycle_rows = 0;
    let mut hbond_rows = 0;
    let mut distance_rows = 0;
    let mut hydrophobic_rows = 0;
    for cycle_edge in tree.cycle_edges() {
        let kind = molecule.bonds()[cycle_edge.bond].kind;
        cycle_rows += kind.constraint_rows();
        match kind {
            BondKind::Hydrogen | BondKind::Covalent => hbond_rows += kind.auxiliary_rows(),
            BondKind::Distance => distance_rows += kind.auxiliary_rows(),
            BondKind::Hydrophobic => hydrophobic_rows += kind.auxiliary_rows(),
        }
    }
    let cols = tree.num_cycle_dofs();
    debug!(
        rows = cycle_rows,
        cols,
        hbond_rows,
        distance_rows,
        hydrophobic_rows,
        "Building cycle Jacobians"
    );

    let mut matrices = Matrices {
        cycle: DMatrix::zeros(cycle_rows, cols),
        hbond: DMatrix::zeros(hbond_rows, cols),
        distance: DMatrix::zeros(distance_rows, cols),
        hydrophobic: DMatrix::zeros(hydrophobic_rows, cols),
    };

    let mut rows = RowOffsets {
        cycle: 0,
        hbond: 0,
        distance: 0,
        hydrophobic: 0,
    };
    for cycle_edge in tree.cycle_edges() {
        let bond = &molecule.bonds()[cycle_edge.bond];
        let kind = bond.kind;
        let frame = ConstraintFrame::build(molecule, bond.atom1_id, bond.atom2_id)?;

        for (side_start, first_side) in [(cycle_edge.vertex1, true), (cycle_edge.vertex2, false)] {
            let mut vertex = side_start;
            while vertex != cycle_edge.common_ancestor {
                let node = tree.vertex(vertex);
                let Some(parent_edge) = node.parent_edge else {
                    break;
                };
                let edge = &tree.edges()[parent_edge];
                if let Some(col) = edge.cycle_index {
                    let entries = side_entries(&edge.dof, molecule, &frame, first_side);
                    write_block(&mut matrices, kind, rows, col, &entries);
                }
                match node.parent {
                    Some(parent) => vertex = parent,
                    None => break,
                }
            }
        }

        rows.cycle += kind.constraint_rows();
        match kind {
            BondKind::Hydrogen | BondKind::Covalent => rows.hbond += kind.auxiliary_rows(),
            BondKind::Distance => rows.distance += kind.auxiliary_rows(),
            BondKind::Hydrophobic => rows.hydrophobic += kind.auxiliary_rows(),
        }
    }

    Ok(Some(CycleJacobians {
        cycle: matrices.cycle,
        hbond: (hbond_rows > 0).then_some(matrices.hbond),
        distance: (distance_rows > 0).then_some(matrices.distance),
        hydrophobic: (hydrophobic_rows > 0).then_some(matrices.hydrophobic),
    }))
}

/// Builds the clash-avoiding Jacobian: the cycle-closure constraints widened
/// to all DOF columns, stacked with one row per colliding atom pair that
/// penalizes motion along the clash normal.
///
/// Clashes can involve previously free dihedrals, so the column space is the
/// full DOF vector rather than the cycle DOFs. When `project_constraints` is
/// false the cycle block stays zero and only the clash rows constrain
/// motion.
pub fn build_clash_avoiding_jacobian(
    molecule: &Molecule,
    tree: &KinematicTree,
    cycle: Option<&CycleJacobians>,
    collisions: &[(AtomId, AtomId)],
    project_constraints: bool,
) -> DMatrix<f64> {
    let cycle_rows = cycle.map(|j| j.cycle.nrows()).unwrap_or(0);
    let cols = tree.num_dofs();
    let mut jacobian = DMatrix::zeros(cycle_rows + collisions.len(), cols);

    if project_constraints {
        if let Some(cycle) = cycle {
            for edge in tree.edges() {
                if let Some(cycle_col) = edge.cycle_index {
                    for row in 0..cycle_rows {
                        jacobian[(row, edge.dof_index)] = cycle.cycle[(row, cycle_col)];
                    }
                }
            }
        }
    }

    for (offset, &(atom1, atom2)) in collisions.iter().enumerate() {
        let row = cycle_rows + offset;
        let p1 = molecule.position(atom1);
        let p2 = molecule.position(atom2);
        let clash_normal = (p2 - p1).normalize();

        let (Some(vertex1), Some(vertex2)) = (tree.body_of(atom1), tree.body_of(atom2)) else {
            continue;
        };
        let common_ancestor = tree.find_common_ancestor(vertex1, vertex2);
        for (side_start, sign) in [(vertex1, 1.0), (vertex2, -1.0)] {
            let point = if sign > 0.0 { p1 } else { p2 };
            let mut vertex = side_start;
            while vertex != common_ancestor {
                let node = tree.vertex(vertex);
                let Some(parent_edge) = node.parent_edge else {
                    break;
                };
                let edge = &tree.edges()[parent_edge];
                let derivative = edge.dof.derivative(molecule, &point);
                jacobian[(row, edge.dof_index)] = sign * clash_normal.dot(&derivative);
                match node.parent {
                    Some(parent) => vertex = parent,
                    None => break,
                }
            }
        }
    }

    jacobian
}
