use super::dof::DegreeOfFreedom;
use super::graph::{CycleEdge, KinematicEdge, KinematicVertex};
use crate::core::models::ids::{AtomId, VertexId};
use crate::core::models::molecule::Molecule;
use nalgebra::{Isometry3, Unit, Vector3};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::VecDeque;
use thiserror::Error;
use tracing::debug;

/// Errors raised while constructing or driving the kinematic spanning tree.
///
/// All construction-time variants indicate malformed input topology; they are
/// terminal and surface immediately rather than being silently recovered.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TopologyError {
    #[error("Atom '{atom}' is not assigned to any rigid body")]
    AtomWithoutBody { atom: String },

    #[error("Atom '{atom}' is assigned to more than one rigid body")]
    DuplicateBodyAssignment { atom: String },

    #[error("Rigid body {body} is not reachable from the root through covalent bonds")]
    DisconnectedBody { body: usize },

    #[error("Rigid body {body} was assigned a parent twice")]
    ParentReassigned { body: usize },

    #[error("Cannot build a kinematic tree without rigid bodies")]
    EmptyTree,

    #[error("Sugar ring references rigid body {body}, which does not exist")]
    SugarBodyOutOfRange { body: usize },

    #[error("DOF vector length {actual} does not match the tree's {expected} DOFs")]
    DofCountMismatch { expected: usize, actual: usize },
}

/// A ribose body that receives an internal pucker DOF during construction.
#[derive(Debug, Clone, Copy)]
pub struct SugarRing {
    /// Index into the `bodies` argument of [`KinematicTree::build`].
    pub body: usize,
    /// First ring anchor atom spanning the pucker axis (C1').
    pub anchor1: AtomId,
    /// Second ring anchor atom spanning the pucker axis (C4').
    pub anchor2: AtomId,
    /// Pseudorotation amplitude scaling the pucker motion.
    pub amplitude: f64,
}

/// Options controlling spanning-tree construction.
#[derive(Debug, Clone, Default)]
pub struct TreeOptions {
    /// Prepend three global rotation DOFs (virtual edges with no bond) that
    /// turn the whole molecule about the coordinate axes through the origin.
    pub global_rotation: bool,
    /// Prepend three global translation DOFs (virtual edges with no bond)
    /// that move the whole molecule along the coordinate axes.
    pub global_translation: bool,
    /// Bodies modeling ribose rings; each one's parent chain gains a pucker
    /// DOF on a virtual edge directly above the body.
    pub sugar_rings: Vec<SugarRing>,
}

/// The rooted spanning tree of rigid bodies plus its cycle-closing edges.
///
/// Tree edges each carry one degree of freedom and receive a dense global
/// DOF index in construction order. Edges lying on a path between a
/// cycle-closing edge's endpoint and its lowest common ancestor additionally
/// receive a dense cycle-DOF index; these are the columns of the cycle
/// constraint Jacobian. Both enumerations are fixed once construction
/// succeeds.
#[derive(Debug, Clone)]
pub struct KinematicTree {
    vertices: SlotMap<VertexId, KinematicVertex>,
    edges: Vec<KinematicEdge>,
    cycle_edges: Vec<CycleEdge>,
    root: VertexId,
    body_of: SecondaryMap<AtomId, VertexId>,
    num_cycle_dofs: usize,
}

impl KinematicTree {
    /// Builds the spanning tree for `molecule` over the given rigid-body
    /// partition of its atoms.
    ///
    /// The first body becomes the root. Covalent bonds between bodies are
    /// turned into directed torsion edges by breadth-first traversal; every
    /// remaining inter-body bond (covalent ring closures and all non-covalent
    /// contacts) becomes a cycle-closing edge annotated with the lowest
    /// common ancestor of its endpoints.
    ///
    /// # Errors
    ///
    /// Returns a [`TopologyError`] when the partition does not cover every
    /// atom exactly once or when some body is unreachable from the root.
    pub fn build(
        molecule: &Molecule,
        bodies: Vec<Vec<AtomId>>,
        options: TreeOptions,
    ) -> Result<Self, TopologyError> {
        if bodies.is_empty() {
            return Err(TopologyError::EmptyTree);
        }

        let mut vertices: SlotMap<VertexId, KinematicVertex> = SlotMap::with_key();
        let mut body_of: SecondaryMap<AtomId, VertexId> = SecondaryMap::new();
        let mut body_ids = Vec::with_capacity(bodies.len());
        for atoms in bodies {
            let id = vertices.insert(KinematicVertex::new(atoms));
            for &atom in &vertices[id].atoms {
                if body_of.insert(atom, id).is_some() {
                    return Err(TopologyError::DuplicateBodyAssignment {
                        atom: atom_name(molecule, atom),
                    });
                }
            }
            body_ids.push(id);
        }
        for (atom, _) in molecule.atoms_iter() {
            if !body_of.contains_key(atom) {
                return Err(TopologyError::AtomWithoutBody {
                    atom: atom_name(molecule, atom),
                });
            }
        }

        let mut sugar_of: SecondaryMap<VertexId, SugarRing> = SecondaryMap::new();
        for ring in &options.sugar_rings {
            let &body = body_ids
                .get(ring.body)
                .ok_or(TopologyError::SugarBodyOutOfRange { body: ring.body })?;
            sugar_of.insert(body, *ring);
        }

        let root_body = body_ids[0];
        let mut edges: Vec<KinematicEdge> = Vec::new();

        // Optional virtual DOFs form a chain of empty vertices above the
        // root body; their edges carry no bond. Rotations come before
        // translations, matching the usual rigid-body parameterization; a
        // pucker DOF for a sugar-flagged root body comes last.
        let mut virtual_dofs = Vec::new();
        if options.global_rotation {
            for axis in [Vector3::x(), Vector3::y(), Vector3::z()] {
                virtual_dofs.push(DegreeOfFreedom::Rotation {
                    axis: Unit::new_normalize(axis),
                });
            }
        }
        if options.global_translation {
            for axis in [Vector3::x(), Vector3::y(), Vector3::z()] {
                virtual_dofs.push(DegreeOfFreedom::Translation {
                    axis: Unit::new_normalize(axis),
                });
            }
        }
        if let Some(ring) = sugar_of.get(root_body) {
            virtual_dofs.push(pucker_dof(ring));
        }
        let root = if virtual_dofs.is_empty() {
            root_body
        } else {
            let mut upper = vertices.insert(KinematicVertex::new(Vec::new()));
            let base = upper;
            let last = virtual_dofs.len() - 1;
            for (position, dof) in virtual_dofs.into_iter().enumerate() {
                let lower = if position == last {
                    root_body
                } else {
                    vertices.insert(KinematicVertex::new(Vec::new()))
                };
                let dof_index = edges.len();
                edges.push(KinematicEdge {
                    start: upper,
                    end: lower,
                    bond: None,
                    dof,
                    dof_index,
                    cycle_index: None,
                });
                vertices[upper].children.push(dof_index);
                vertices[lower].parent = Some(upper);
                vertices[lower].parent_edge = Some(dof_index);
                upper = lower;
            }
            base
        };

        // Candidate covalent bonds per body, in bond insertion order, for a
        // deterministic breadth-first spanning tree.
        let mut body_bonds: SecondaryMap<VertexId, Vec<usize>> = SecondaryMap::new();
        for id in vertices.keys() {
            body_bonds.insert(id, Vec::new());
        }
        for (idx, bond) in molecule.bonds().iter().enumerate() {
            if !bond.kind.is_covalent() {
                continue;
            }
            let (v1, v2) = (body_of[bond.atom1_id], body_of[bond.atom2_id]);
            if v1 == v2 {
                continue;
            }
            body_bonds[v1].push(idx);
            body_bonds[v2].push(idx);
        }

        let mut used_bonds = vec![false; molecule.bonds().len()];
        let mut visited: SecondaryMap<VertexId, bool> = SecondaryMap::new();
        visited.insert(root_body, true);
        let mut queue = VecDeque::from([root_body]);
        while let Some(vertex) = queue.pop_front() {
            for &bond_idx in &body_bonds[vertex].clone() {
                let bond = &molecule.bonds()[bond_idx];
                let (near, far) = if body_of[bond.atom1_id] == vertex {
                    (bond.atom1_id, bond.atom2_id)
                } else {
                    (bond.atom2_id, bond.atom1_id)
                };
                let child = body_of[far];
                if visited.get(child).copied().unwrap_or(false) {
                    continue;
                }
                if vertices[child].parent.is_some() {
                    return Err(TopologyError::ParentReassigned {
                        body: body_ids.iter().position(|&b| b == child).unwrap_or(0),
                    });
                }
                // A sugar body hangs below an extra virtual vertex whose
                // parent edge carries the pucker DOF.
                let attach = match sugar_of.get(child) {
                    Some(_) => vertices.insert(KinematicVertex::new(Vec::new())),
                    None => child,
                };
                let dof_index = edges.len();
                edges.push(KinematicEdge {
                    start: vertex,
                    end: attach,
                    bond: Some(bond_idx),
                    dof: DegreeOfFreedom::Torsion {
                        atom1: near,
                        atom2: far,
                    },
                    dof_index,
                    cycle_index: None,
                });
                used_bonds[bond_idx] = true;
                vertices[vertex].children.push(dof_index);
                vertices[attach].parent = Some(vertex);
                vertices[attach].parent_edge = Some(dof_index);
                if let Some(ring) = sugar_of.get(child) {
                    let pucker_index = edges.len();
                    edges.push(KinematicEdge {
                        start: attach,
                        end: child,
                        bond: None,
                        dof: pucker_dof(ring),
                        dof_index: pucker_index,
                        cycle_index: None,
                    });
                    vertices[attach].children.push(pucker_index);
                    vertices[child].parent = Some(attach);
                    vertices[child].parent_edge = Some(pucker_index);
                }
                visited.insert(child, true);
                queue.push_back(child);
            }
        }

        for (index, &body) in body_ids.iter().enumerate() {
            if !visited.get(body).copied().unwrap_or(false) {
                return Err(TopologyError::DisconnectedBody { body: index });
            }
        }

        let mut tree = Self {
            vertices,
            edges,
            cycle_edges: Vec::new(),
            root,
            body_of,
            num_cycle_dofs: 0,
        };

        // Every unused inter-body bond closes a cycle.
        for (idx, bond) in molecule.bonds().iter().enumerate() {
            if used_bonds[idx] {
                continue;
            }
            let v1 = tree.body_of[bond.atom1_id];
            let v2 = tree.body_of[bond.atom2_id];
            if v1 == v2 {
                continue;
            }
            let common_ancestor = tree.find_common_ancestor(v1, v2);
            tree.cycle_edges.push(CycleEdge {
                bond: idx,
                vertex1: v1,
                vertex2: v2,
                common_ancestor,
            });
        }

        tree.assign_cycle_indices();
        debug!(
            num_bodies = body_ids.len(),
            num_dofs = tree.edges.len(),
            num_cycle_edges = tree.cycle_edges.len(),
            num_cycle_dofs = tree.num_cycle_dofs,
            "Kinematic tree constructed"
        );
        Ok(tree)
    }

    /// Cycle-DOF indices are a dense sub-enumeration, in global DOF order, of
    /// the edges lying on some endpoint-to-ancestor path of a cycle edge.
    fn assign_cycle_indices(&mut self) {
        let mut on_cycle = vec![false; self.edges.len()];
        for cycle_edge in &self.cycle_edges {
            for side in [cycle_edge.vertex1, cycle_edge.vertex2] {
                let mut vertex = side;
                while vertex != cycle_edge.common_ancestor {
                    let Some(parent_edge) = self.vertices[vertex].parent_edge else {
                        break;
                    };
                    on_cycle[parent_edge] = true;
                    match self.vertices[vertex].parent {
                        Some(parent) => vertex = parent,
                        None => break,
                    }
                }
            }
        }
        let mut next = 0;
        for (idx, edge) in self.edges.iter_mut().enumerate() {
            edge.cycle_index = if on_cycle[idx] {
                let assigned = next;
                next += 1;
                Some(assigned)
            } else {
                None
            };
        }
        self.num_cycle_dofs = next;
    }

    /// Finds the lowest common ancestor of two vertices by walking both
    /// parent chains; the root is a common ancestor of every pair, so the
    /// walk always terminates.
    pub fn find_common_ancestor(&self, v1: VertexId, v2: VertexId) -> VertexId {
        let mut chain = Vec::new();
        let mut vertex = v1;
        loop {
            chain.push(vertex);
            match self.vertices[vertex].parent {
                Some(parent) => vertex = parent,
                None => break,
            }
        }
        let mut vertex = v2;
        loop {
            if chain.contains(&vertex) {
                return vertex;
            }
            match self.vertices[vertex].parent {
                Some(parent) => vertex = parent,
                None => return self.root,
            }
        }
    }

    /// Applies a DOF-value vector: recomputes every vertex transform by
    /// pre-order forward propagation from the root, then rewrites all live
    /// atom positions from the reference structure.
    pub fn apply_configuration(
        &mut self,
        molecule: &mut Molecule,
        dofs: &[f64],
    ) -> Result<(), TopologyError> {
        if dofs.len() != self.edges.len() {
            return Err(TopologyError::DofCountMismatch {
                expected: self.edges.len(),
                actual: dofs.len(),
            });
        }
        self.vertices[self.root].transform = Isometry3::identity();
        let mut stack = vec![self.root];
        while let Some(vertex) = stack.pop() {
            for &edge_idx in &self.vertices[vertex].children.clone() {
                let (end, local) = {
                    let edge = &self.edges[edge_idx];
                    (
                        edge.end,
                        edge.dof.local_transform(molecule, dofs[edge.dof_index]),
                    )
                };
                self.vertices[end].transform = self.vertices[vertex].transform * local;
                stack.push(end);
            }
        }
        for (_, vertex) in self.vertices.iter() {
            for &atom in &vertex.atoms {
                if let Some(atom) = molecule.atom_mut(atom) {
                    atom.position = vertex.transform * atom.reference_position;
                }
            }
        }
        Ok(())
    }

    /// Number of tree-edge DOFs.
    pub fn num_dofs(&self) -> usize {
        self.edges.len()
    }

    /// Number of DOFs participating in at least one cycle.
    pub fn num_cycle_dofs(&self) -> usize {
        self.num_cycle_dofs
    }

    pub fn edges(&self) -> &[KinematicEdge] {
        &self.edges
    }

    pub fn cycle_edges(&self) -> &[CycleEdge] {
        &self.cycle_edges
    }

    pub fn root(&self) -> VertexId {
        self.root
    }

    pub fn vertex(&self, id: VertexId) -> &KinematicVertex {
        &self.vertices[id]
    }

    /// The rigid body owning an atom.
    pub fn body_of(&self, atom: AtomId) -> Option<VertexId> {
        self.body_of.get(atom).copied()
    }
}

fn pucker_dof(ring: &SugarRing) -> DegreeOfFreedom {
    DegreeOfFreedom::SugarPucker {
        anchor1: ring.anchor1,
        anchor2: ring.anchor2,
        amplitude: ring.amplitude,
    }
}

fn atom_name(molecule: &Molecule, atom: AtomId) -> String {
    molecule
        .atom(atom)
        .map(|a| a.name.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::bond::BondKind;
    use nalgebra::Point3;

    /// Chain A0-A1-A2-A3 with one atom per body.
    fn chain() -> (Molecule, Vec<AtomId>) {
        let mut mol = Molecule::new();
        let positions = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        let atoms: Vec<AtomId> = positions
            .iter()
            .enumerate()
            .map(|(i, p)| mol.add_atom(Atom::new(&format!("A{}", i), Point3::from(*p))))
            .collect();
        for w in atoms.windows(2) {
            mol.add_bond(w[0], w[1], BondKind::Covalent);
        }
        (mol, atoms)
    }

    fn single_atom_bodies(atoms: &[AtomId]) -> Vec<Vec<AtomId>> {
        atoms.iter().map(|&a| vec![a]).collect()
    }

    #[test]
    fn chain_without_closure_has_no_cycle_dofs() {
        let (mol, atoms) = chain();
        let tree = KinematicTree::build(&mol, single_atom_bodies(&atoms), TreeOptions::default())
            .unwrap();
        assert_eq!(tree.num_dofs(), 3);
        assert_eq!(tree.num_cycle_dofs(), 0);
        assert!(tree.cycle_edges().is_empty());
        assert!(tree.edges().iter().all(|e| e.cycle_index.is_none()));
    }

    #[test]
    fn hydrogen_bond_closure_marks_path_edges_as_cycle_dofs() {
        let (mut mol, atoms) = chain();
        mol.add_bond(atoms[3], atoms[0], BondKind::Hydrogen);
        let tree = KinematicTree::build(&mol, single_atom_bodies(&atoms), TreeOptions::default())
            .unwrap();
        assert_eq!(tree.cycle_edges().len(), 1);
        let cycle = tree.cycle_edges()[0];
        assert_eq!(cycle.vertex1, tree.body_of(atoms[3]).unwrap());
        assert_eq!(cycle.common_ancestor, tree.body_of(atoms[0]).unwrap());
        assert_eq!(tree.num_cycle_dofs(), 3);
        let indices: Vec<_> = tree.edges().iter().map(|e| e.cycle_index).collect();
        assert_eq!(indices, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn branch_closure_finds_root_as_common_ancestor() {
        let mut mol = Molecule::new();
        let a0 = mol.add_atom(Atom::new("A0", Point3::new(0.0, 0.0, 0.0)));
        let b1 = mol.add_atom(Atom::new("B1", Point3::new(1.0, 0.0, 0.0)));
        let c1 = mol.add_atom(Atom::new("C1", Point3::new(0.0, 1.0, 0.0)));
        mol.add_bond(a0, b1, BondKind::Covalent);
        mol.add_bond(a0, c1, BondKind::Covalent);
        mol.add_bond(b1, c1, BondKind::Hydrogen);
        let tree = KinematicTree::build(
            &mol,
            vec![vec![a0], vec![b1], vec![c1]],
            TreeOptions::default(),
        )
        .unwrap();
        let cycle = tree.cycle_edges()[0];
        assert_eq!(cycle.common_ancestor, tree.body_of(a0).unwrap());
        assert_eq!(tree.num_cycle_dofs(), 2);
    }

    #[test]
    fn surplus_covalent_bond_becomes_cycle_edge() {
        let (mut mol, atoms) = chain();
        mol.add_bond(atoms[3], atoms[0], BondKind::Covalent);
        let tree = KinematicTree::build(&mol, single_atom_bodies(&atoms), TreeOptions::default())
            .unwrap();
        // Exactly one covalent bond is left over from the spanning tree and
        // must close a cycle with the default row block.
        assert_eq!(tree.num_dofs(), 3);
        assert_eq!(tree.cycle_edges().len(), 1);
        assert_eq!(mol.bonds()[tree.cycle_edges()[0].bond].kind, BondKind::Covalent);
    }

    #[test]
    fn unassigned_atom_is_a_construction_error() {
        let (mol, atoms) = chain();
        let bodies = single_atom_bodies(&atoms[..3]);
        let err = KinematicTree::build(&mol, bodies, TreeOptions::default()).unwrap_err();
        assert_eq!(
            err,
            TopologyError::AtomWithoutBody {
                atom: "A3".to_string()
            }
        );
    }

    #[test]
    fn doubly_assigned_atom_is_a_construction_error() {
        let (mol, atoms) = chain();
        let mut bodies = single_atom_bodies(&atoms);
        bodies[1].push(atoms[0]);
        let err = KinematicTree::build(&mol, bodies, TreeOptions::default()).unwrap_err();
        assert_eq!(
            err,
            TopologyError::DuplicateBodyAssignment {
                atom: "A0".to_string()
            }
        );
    }

    #[test]
    fn disconnected_body_is_a_construction_error() {
        let mut mol = Molecule::new();
        let a = mol.add_atom(Atom::new("A0", Point3::origin()));
        let b = mol.add_atom(Atom::new("A1", Point3::new(5.0, 0.0, 0.0)));
        let err = KinematicTree::build(&mol, vec![vec![a], vec![b]], TreeOptions::default())
            .unwrap_err();
        assert_eq!(err, TopologyError::DisconnectedBody { body: 1 });
    }

    #[test]
    fn apply_configuration_rotates_downstream_atoms() {
        let mut mol = Molecule::new();
        let a0 = mol.add_atom(Atom::new("A0", Point3::new(0.0, 0.0, 0.0)));
        let a1 = mol.add_atom(Atom::new("A1", Point3::new(1.0, 0.0, 0.0)));
        let a2 = mol.add_atom(Atom::new("A2", Point3::new(1.0, 1.0, 0.0)));
        mol.add_bond(a0, a1, BondKind::Covalent);
        let mut tree = KinematicTree::build(
            &mol,
            vec![vec![a0], vec![a1, a2]],
            TreeOptions::default(),
        )
        .unwrap();
        tree.apply_configuration(&mut mol, &[std::f64::consts::FRAC_PI_2])
            .unwrap();
        // A1 sits on the rotation axis, A2 swings around it.
        assert!((mol.position(a1) - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((mol.position(a2) - Point3::new(1.0, 0.0, 1.0)).norm() < 1e-12);
        // Applying zeros restores the reference structure.
        tree.apply_configuration(&mut mol, &[0.0]).unwrap();
        assert!((mol.position(a2) - Point3::new(1.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn apply_configuration_rejects_wrong_dof_count() {
        let (mut mol, atoms) = chain();
        let mut tree =
            KinematicTree::build(&mol, single_atom_bodies(&atoms), TreeOptions::default())
                .unwrap();
        let err = tree.apply_configuration(&mut mol, &[0.0]).unwrap_err();
        assert_eq!(
            err,
            TopologyError::DofCountMismatch {
                expected: 3,
                actual: 1
            }
        );
    }

    #[test]
    fn global_translation_adds_three_leading_virtual_dofs() {
        let (mut mol, atoms) = chain();
        let options = TreeOptions {
            global_translation: true,
            ..TreeOptions::default()
        };
        let mut tree =
            KinematicTree::build(&mol, single_atom_bodies(&atoms), options).unwrap();
        assert_eq!(tree.num_dofs(), 6);
        assert!(tree.edges()[..3].iter().all(|e| e.bond.is_none()));
        assert!(tree.vertex(tree.root()).is_virtual());
        tree.apply_configuration(&mut mol, &[1.0, 2.0, 3.0, 0.0, 0.0, 0.0])
            .unwrap();
        assert!((mol.position(atoms[0]) - Point3::new(1.0, 2.0, 3.0)).norm() < 1e-12);
        assert!((mol.position(atoms[2]) - Point3::new(2.0, 3.0, 3.0)).norm() < 1e-12);
    }

    #[test]
    fn global_rotation_dofs_turn_the_whole_molecule() {
        let (mut mol, atoms) = chain();
        let options = TreeOptions {
            global_rotation: true,
            global_translation: true,
            ..TreeOptions::default()
        };
        let mut tree =
            KinematicTree::build(&mol, single_atom_bodies(&atoms), options).unwrap();
        assert_eq!(tree.num_dofs(), 9);
        // A quarter turn about z maps (x, y, z) to (-y, x, z).
        let mut dofs = vec![0.0; 9];
        dofs[2] = std::f64::consts::FRAC_PI_2;
        tree.apply_configuration(&mut mol, &dofs).unwrap();
        assert!((mol.position(atoms[1]) - Point3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
        assert!((mol.position(atoms[2]) - Point3::new(-1.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn sugar_body_gains_a_pucker_dof_on_its_parent_chain() {
        let (mut mol, atoms) = chain();
        mol.add_bond(atoms[3], atoms[0], BondKind::Hydrogen);
        let options = TreeOptions {
            sugar_rings: vec![SugarRing {
                body: 2,
                anchor1: atoms[1],
                anchor2: atoms[2],
                amplitude: 0.5,
            }],
            ..TreeOptions::default()
        };
        let tree = KinematicTree::build(&mol, single_atom_bodies(&atoms), options).unwrap();
        assert_eq!(tree.num_dofs(), 4);
        let pucker = &tree.edges()[2];
        assert!(pucker.bond.is_none());
        assert!(matches!(
            pucker.dof,
            DegreeOfFreedom::SugarPucker { amplitude, .. } if amplitude == 0.5
        ));
        // The pucker edge sits between a virtual vertex and the sugar body
        // and joins the cycle path like any other chain edge.
        assert!(tree.vertex(pucker.start).is_virtual());
        assert_eq!(pucker.end, tree.body_of(atoms[2]).unwrap());
        assert_eq!(tree.num_cycle_dofs(), 4);
        assert_eq!(pucker.cycle_index, Some(2));
    }

    #[test]
    fn pucker_values_rotate_the_sugar_body_scaled_by_amplitude() {
        let (mut mol, atoms) = chain();
        let options = TreeOptions {
            sugar_rings: vec![SugarRing {
                body: 2,
                anchor1: atoms[1],
                anchor2: atoms[2],
                amplitude: 0.5,
            }],
            ..TreeOptions::default()
        };
        let mut tree =
            KinematicTree::build(&mol, single_atom_bodies(&atoms), options).unwrap();
        // Amplitude 0.5 turns a pucker value of pi into a quarter turn about
        // the A1 to A2 axis (+y through A1).
        let mut dofs = vec![0.0; 4];
        dofs[2] = std::f64::consts::PI;
        tree.apply_configuration(&mut mol, &dofs).unwrap();
        assert!((mol.position(atoms[1]) - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
        // A2 lies on the pucker axis; A3 swings around it.
        assert!((mol.position(atoms[2]) - Point3::new(1.0, 1.0, 0.0)).norm() < 1e-12);
        assert!((mol.position(atoms[3]) - Point3::new(1.0, 1.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn sugar_flag_on_the_root_body_appends_a_virtual_pucker_edge() {
        let (mol, atoms) = chain();
        let options = TreeOptions {
            sugar_rings: vec![SugarRing {
                body: 0,
                anchor1: atoms[0],
                anchor2: atoms[1],
                amplitude: 1.0,
            }],
            ..TreeOptions::default()
        };
        let tree = KinematicTree::build(&mol, single_atom_bodies(&atoms), options).unwrap();
        assert_eq!(tree.num_dofs(), 4);
        assert!(tree.vertex(tree.root()).is_virtual());
        assert!(matches!(
            tree.edges()[0].dof,
            DegreeOfFreedom::SugarPucker { .. }
        ));
        assert_eq!(tree.edges()[0].end, tree.body_of(atoms[0]).unwrap());
    }

    #[test]
    fn sugar_ring_with_unknown_body_is_a_construction_error() {
        let (mol, atoms) = chain();
        let options = TreeOptions {
            sugar_rings: vec![SugarRing {
                body: 9,
                anchor1: atoms[0],
                anchor2: atoms[1],
                amplitude: 1.0,
            }],
            ..TreeOptions::default()
        };
        let err = KinematicTree::build(&mol, single_atom_bodies(&atoms), options).unwrap_err();
        assert_eq!(err, TopologyError::SugarBodyOutOfRange { body: 9 });
    }

    #[test]
    fn global_virtual_edges_never_join_cycles() {
        let (mut mol, atoms) = chain();
        mol.add_bond(atoms[3], atoms[0], BondKind::Hydrogen);
        let options = TreeOptions {
            global_translation: true,
            ..TreeOptions::default()
        };
        let tree = KinematicTree::build(&mol, single_atom_bodies(&atoms), options).unwrap();
        assert_eq!(tree.num_cycle_dofs(), 3);
        assert!(tree.edges()[..3].iter().all(|e| e.cycle_index.is_none()));
    }
}
