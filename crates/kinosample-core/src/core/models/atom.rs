use nalgebra::Point3;

/// Represents an atom in a molecular structure.
///
/// Each atom carries two coordinate sets: the `reference_position` is the
/// coordinate of the atom in the zero-DOF reference structure, while
/// `position` is the live coordinate produced by applying a configuration's
/// DOF values to the kinematic tree. Jacobian construction always reads the
/// live positions; transform composition reads the reference positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The name of the atom (e.g., "CA", "N", "O4'").
    pub name: String,
    /// The live 3D coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
    /// The coordinates of the atom in the reference (all-DOFs-zero) structure.
    pub reference_position: Point3<f64>,
}

impl Atom {
    /// Creates a new `Atom` at the given reference position.
    ///
    /// The live position is initialized to the reference position, i.e. the
    /// atom starts out in the zero-DOF structure.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the atom.
    /// * `position` - The 3D coordinates of the atom.
    pub fn new(name: &str, position: Point3<f64>) -> Self {
        Self {
            name: name.to_string(),
            position,
            reference_position: position,
        }
    }
}
