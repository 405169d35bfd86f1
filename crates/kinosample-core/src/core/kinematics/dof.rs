use crate::core::models::ids::AtomId;
use crate::core::models::molecule::Molecule;
use crate::core::utils::geometry::rotation_about_point;
use nalgebra::{Isometry3, Point3, Translation3, Unit, UnitQuaternion, Vector3};

/// Rotational DOF values this close to zero leave the end vertex untouched.
const IDENTITY_TOL: f64 = 1e-4;

/// A single scalar degree of freedom attached to a kinematic edge.
///
/// A DOF knows how to answer two questions about the current geometry: how a
/// given point in space moves per unit change of the DOF value (the
/// `derivative`, consumed by the Jacobian builder), and which relative rigid
/// transform a concrete value induces on the edge's end vertex (the
/// `local_transform`, consumed by forward propagation).
///
/// The scalar values themselves live in `Configuration`; a
/// `DegreeOfFreedom` is immutable tree data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DegreeOfFreedom {
    /// Rotation about the covalent bond axis from `atom1` to `atom2`.
    Torsion { atom1: AtomId, atom2: AtomId },
    /// Whole-body translation along a fixed axis (global virtual DOF, no
    /// underlying bond).
    Translation { axis: Unit<Vector3<f64>> },
    /// Whole-body rotation about a fixed axis through the origin (global
    /// virtual DOF, no underlying bond).
    Rotation { axis: Unit<Vector3<f64>> },
    /// Sugar-pucker pseudorotation, modeled as an amplitude-weighted rotation
    /// about the ring anchor axis from `anchor1` to `anchor2`.
    SugarPucker {
        anchor1: AtomId,
        anchor2: AtomId,
        amplitude: f64,
    },
}

impl DegreeOfFreedom {
    /// Instantaneous velocity of `point` induced by a unit change of this
    /// DOF, evaluated at the molecule's live positions.
    pub fn derivative(&self, molecule: &Molecule, point: &Point3<f64>) -> Vector3<f64> {
        match *self {
            DegreeOfFreedom::Torsion { atom1, atom2 } => {
                let p1 = molecule.position(atom1);
                let p2 = molecule.position(atom2);
                let axis = (p2 - p1).normalize();
                axis.cross(&(point - p1))
            }
            DegreeOfFreedom::Translation { axis } => axis.into_inner(),
            DegreeOfFreedom::Rotation { axis } => axis.cross(&point.coords),
            DegreeOfFreedom::SugarPucker {
                anchor1,
                anchor2,
                amplitude,
            } => {
                let p1 = molecule.position(anchor1);
                let p2 = molecule.position(anchor2);
                let axis = (p2 - p1).normalize();
                amplitude * axis.cross(&(point - p1))
            }
        }
    }

    /// Relative transform of the end vertex for the given DOF value,
    /// evaluated at the molecule's reference positions.
    pub fn local_transform(&self, molecule: &Molecule, value: f64) -> Isometry3<f64> {
        match *self {
            DegreeOfFreedom::Torsion { atom1, atom2 } => {
                if value.abs() < IDENTITY_TOL {
                    return Isometry3::identity();
                }
                let p1 = molecule.atom(atom1).map(|a| a.reference_position);
                let p2 = molecule.atom(atom2).map(|a| a.reference_position);
                match (p1, p2) {
                    (Some(p1), Some(p2)) => {
                        let axis = Unit::new_normalize(p2 - p1);
                        rotation_about_point(&axis, value, &p1)
                    }
                    _ => Isometry3::identity(),
                }
            }
            DegreeOfFreedom::Translation { axis } => {
                Translation3::from(axis.into_inner() * value).into()
            }
            DegreeOfFreedom::Rotation { axis } => {
                if value.abs() < IDENTITY_TOL {
                    return Isometry3::identity();
                }
                Isometry3::from_parts(
                    Translation3::identity(),
                    UnitQuaternion::from_axis_angle(&axis, value),
                )
            }
            DegreeOfFreedom::SugarPucker {
                anchor1,
                anchor2,
                amplitude,
            } => {
                let scaled = amplitude * value;
                if scaled.abs() < IDENTITY_TOL {
                    return Isometry3::identity();
                }
                let p1 = molecule.atom(anchor1).map(|a| a.reference_position);
                let p2 = molecule.atom(anchor2).map(|a| a.reference_position);
                match (p1, p2) {
                    (Some(p1), Some(p2)) => {
                        let axis = Unit::new_normalize(p2 - p1);
                        rotation_about_point(&axis, scaled, &p1)
                    }
                    _ => Isometry3::identity(),
                }
            }
        }
    }
}
