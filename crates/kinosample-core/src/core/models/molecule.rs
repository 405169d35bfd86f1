use super::atom::Atom;
use super::bond::{Bond, BondKind};
use super::ids::AtomId;
use nalgebra::Point3;
use slotmap::{SecondaryMap, SlotMap};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum MoleculeError {
    /// An end atom of a cycle-closing bond has no covalent neighbor besides
    /// the other end atom, so no local constraint frame can be built. This is
    /// malformed input data, not a recoverable condition.
    #[error("Atom '{atom}' has no covalent neighbor to define a constraint frame")]
    MissingFrameNeighbor { atom: String },

    #[error("Atom id is not part of this molecule")]
    UnknownAtom,
}

/// A complete molecular system: atoms, bonds, and the covalent adjacency
/// cache used for frame-atom lookups during Jacobian construction.
///
/// This struct is the central data structure of the `core` layer. Atom
/// positions are mutable and are rewritten whenever a configuration is
/// applied to the kinematic tree; everything else is fixed topology built
/// once per molecule.
#[derive(Debug, Clone, Default)]
pub struct Molecule {
    /// Primary storage for atoms using a slot map for efficient ID management.
    atoms: SlotMap<AtomId, Atom>,
    /// All bonds, covalent and non-covalent, in insertion order.
    bonds: Vec<Bond>,
    /// Cached covalent adjacency, indexed by atom ID.
    adjacency: SecondaryMap<AtomId, Vec<AtomId>>,
}

impl Molecule {
    /// Creates a new, empty molecule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an atom and returns its ID.
    pub fn add_atom(&mut self, atom: Atom) -> AtomId {
        let id = self.atoms.insert(atom);
        self.adjacency.insert(id, Vec::new());
        id
    }

    /// Adds a bond of the given kind and returns its index.
    ///
    /// Covalent bonds are entered into the adjacency cache; non-covalent
    /// constraint bonds are not (they never define frame neighbors).
    pub fn add_bond(&mut self, atom1_id: AtomId, atom2_id: AtomId, kind: BondKind) -> usize {
        if kind.is_covalent() {
            if let Some(neighbors) = self.adjacency.get_mut(atom1_id) {
                neighbors.push(atom2_id);
            }
            if let Some(neighbors) = self.adjacency.get_mut(atom2_id) {
                neighbors.push(atom1_id);
            }
        }
        self.bonds.push(Bond::new(atom1_id, atom2_id, kind));
        self.bonds.len() - 1
    }

    /// Retrieves an immutable reference to an atom by its ID.
    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    /// Retrieves a mutable reference to an atom by its ID.
    pub fn atom_mut(&mut self, id: AtomId) -> Option<&mut Atom> {
        self.atoms.get_mut(id)
    }

    /// Returns an iterator over all atoms in the molecule.
    pub fn atoms_iter(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.atoms.iter()
    }

    /// Returns the number of atoms.
    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// Returns a slice of all bonds.
    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    /// Retrieves a mutable reference to a bond by its index.
    pub fn bond_mut(&mut self, index: usize) -> Option<&mut Bond> {
        self.bonds.get_mut(index)
    }

    /// Clears the `rigidified` flag on every bond.
    ///
    /// Called at the start of each rigidity analysis so flags always reflect
    /// the configuration that was last analyzed.
    pub fn clear_rigidified(&mut self) {
        for bond in &mut self.bonds {
            bond.rigidified = false;
        }
    }

    /// Returns the live position of an atom.
    ///
    /// # Panics
    ///
    /// Panics if the ID is stale. All IDs handed out by [`Self::add_atom`]
    /// stay valid for the lifetime of the molecule.
    pub fn position(&self, id: AtomId) -> Point3<f64> {
        self.atoms[id].position
    }

    /// Returns the covalently bonded neighbors of an atom.
    pub fn covalent_neighbors(&self, id: AtomId) -> &[AtomId] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolves the frame neighbor of `atom`: the covalently bonded neighbor
    /// with the lexicographically smallest name, excluding `exclude`.
    ///
    /// Used to build a non-redundant local frame for the rotational
    /// constraint rows of a cycle-closing bond between `atom` and `exclude`.
    ///
    /// # Errors
    ///
    /// Returns [`MoleculeError::MissingFrameNeighbor`] when no such neighbor
    /// exists (malformed molecule).
    pub fn frame_neighbor(&self, atom: AtomId, exclude: AtomId) -> Result<AtomId, MoleculeError> {
        let mut best: Option<AtomId> = None;
        for &neighbor in self.covalent_neighbors(atom) {
            if neighbor == exclude {
                continue;
            }
            match best {
                None => best = Some(neighbor),
                Some(current) => {
                    if self.atoms[neighbor].name < self.atoms[current].name {
                        best = Some(neighbor);
                    }
                }
            }
        }
        best.ok_or_else(|| MoleculeError::MissingFrameNeighbor {
            atom: self
                .atoms
                .get(atom)
                .map(|a| a.name.clone())
                .unwrap_or_default(),
        })
    }
}
