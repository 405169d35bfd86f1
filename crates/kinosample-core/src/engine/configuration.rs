//! A configuration is one point in DOF space together with the constraint
//! analysis derived at that point: the cycle Jacobians, their nullspace, and
//! the rigidity classification. Configurations form an exploration tree
//! managed by [`SampleTree`].

use crate::core::kinematics::tree::KinematicTree;
use crate::core::models::bond::BondKind;
use crate::core::models::ids::AtomId;
use crate::core::models::molecule::Molecule;
use crate::engine::config::{CollapseRigidEdges, NullspaceParameters, SamplingParameters};
use crate::engine::error::EngineError;
use crate::engine::jacobian::{self, CycleJacobians};
use crate::engine::nullspace::Nullspace;
use crate::engine::rigidity::{rigid_clusters, RigidityReport};
use nalgebra::DVector;
use slotmap::{new_key_type, SlotMap};
use tracing::{debug, instrument};

/// Projected gradients shorter than this are left unscaled to avoid
/// amplifying numerical noise.
const NORM_EPS: f64 = 1e-7;

new_key_type! {
    pub struct ConfigId;
}

/// One sampled point in DOF space.
///
/// The Jacobians and the nullspace are caches over the DOF values; any DOF
/// mutation invalidates them. Each configuration owns its own caches, so
/// several configurations can be analyzed side by side.
#[derive(Debug, Clone)]
pub struct Configuration {
    dofs: Vec<f64>,
    global_dofs: Option<Vec<f64>>,
    jacobians: Option<CycleJacobians>,
    nullspace: Option<Nullspace>,
    analysis_computed: bool,
    parent: Option<ConfigId>,
    children: Vec<ConfigId>,
    tree_depth: usize,
}

impl Configuration {
    /// A configuration at the reference structure (all DOFs zero).
    pub fn new(num_dofs: usize) -> Self {
        Self::from_dofs(vec![0.0; num_dofs])
    }

    pub fn from_dofs(dofs: Vec<f64>) -> Self {
        Self {
            dofs,
            global_dofs: None,
            jacobians: None,
            nullspace: None,
            analysis_computed: false,
            parent: None,
            children: Vec::new(),
            tree_depth: 0,
        }
    }

    pub fn dofs(&self) -> &[f64] {
        &self.dofs
    }

    pub fn dof(&self, index: usize) -> Option<f64> {
        self.dofs.get(index).copied()
    }

    /// Sets one DOF value and invalidates the cached analysis.
    pub fn set_dof(&mut self, index: usize, value: f64) {
        if let Some(slot) = self.dofs.get_mut(index) {
            *slot = value;
            self.global_dofs = None;
            self.jacobians = None;
            self.nullspace = None;
            self.analysis_computed = false;
        }
    }

    /// Absolute DOF values of this configuration: the reference structure's
    /// values plus this configuration's offsets. Computed lazily and cached.
    ///
    /// # Errors
    ///
    /// Fails when `reference` has a different length than the DOF vector.
    pub fn global_dof_values(&mut self, reference: &[f64]) -> Result<&[f64], EngineError> {
        if reference.len() != self.dofs.len() {
            return Err(EngineError::DofCountMismatch {
                expected: self.dofs.len(),
                actual: reference.len(),
            });
        }
        let dofs = &self.dofs;
        Ok(self.global_dofs.get_or_insert_with(|| {
            reference
                .iter()
                .zip(dofs)
                .map(|(base, offset)| base + offset)
                .collect()
        }))
    }

    pub fn parent(&self) -> Option<ConfigId> {
        self.parent
    }

    pub fn children(&self) -> &[ConfigId] {
        &self.children
    }

    pub fn tree_depth(&self) -> usize {
        self.tree_depth
    }

    /// Applies this configuration's DOF values to the molecule and computes
    /// the cycle Jacobians and their nullspace at the resulting geometry.
    ///
    /// Idempotent: a repeated call with valid caches re-applies the DOF
    /// values (the molecule may have been moved by another configuration in
    /// the meantime) but skips the Jacobian and SVD work.
    ///
    /// # Errors
    ///
    /// Fails when the DOF vector does not match the tree, or when a
    /// cycle-closing bond lacks a constraint frame.
    #[instrument(skip_all, fields(num_dofs = self.dofs.len(), depth = self.tree_depth))]
    pub fn update(
        &mut self,
        molecule: &mut Molecule,
        tree: &mut KinematicTree,
        params: &NullspaceParameters,
    ) -> Result<(), EngineError> {
        if self.dofs.len() != tree.num_dofs() {
            return Err(EngineError::DofCountMismatch {
                expected: tree.num_dofs(),
                actual: self.dofs.len(),
            });
        }
        tree.apply_configuration(molecule, &self.dofs)?;
        if self.analysis_computed {
            return Ok(());
        }
        self.jacobians = jacobian::build_cycle_jacobians(molecule, tree)?;
        self.nullspace = self
            .jacobians
            .as_ref()
            .map(|jacobians| Nullspace::from_matrix(&jacobians.cycle, *params));
        if let Some(nullspace) = &self.nullspace {
            debug!(
                rank = nullspace.rank(),
                dimension = nullspace.dimension(),
                "Configuration updated"
            );
        }
        self.analysis_computed = true;
        Ok(())
    }

    pub fn jacobians(&self) -> Option<&CycleJacobians> {
        self.jacobians.as_ref()
    }

    pub fn nullspace(&self) -> Option<&Nullspace> {
        self.nullspace.as_ref()
    }

    /// Releases the cached nullspace and Jacobians. Long sampling runs keep
    /// many configurations alive; dropping the analysis of exhausted ones
    /// bounds memory use.
    pub fn drop_analysis(&mut self) {
        self.jacobians = None;
        self.nullspace = None;
        self.analysis_computed = false;
    }

    /// Projects a gradient onto the admissible-motion space of this
    /// configuration and rescales it to its pre-projection norm.
    ///
    /// Accepts either a cycle-DOF-length vector or a full-DOF-length vector.
    /// In the full-length case the cycle entries are projected while all
    /// non-cycle entries pass through unchanged. Without a computed
    /// nullspace (no cycles, or [`Self::update`] not called yet) the input
    /// is returned as is.
    ///
    /// The rescale is skipped for projections shorter than a small
    /// threshold; a gradient almost orthogonal to the nullspace would
    /// otherwise blow up.
    pub fn project_on_cycle_nullspace(
        &self,
        tree: &KinematicTree,
        vector: &[f64],
    ) -> Result<Vec<f64>, EngineError> {
        let Some(nullspace) = &self.nullspace else {
            return Ok(vector.to_vec());
        };

        if vector.len() == nullspace.num_dofs() {
            let input = DVector::from_column_slice(vector);
            let projected = rescaled_projection(nullspace, &input)?;
            return Ok(projected.iter().copied().collect());
        }

        if vector.len() != tree.num_dofs() {
            return Err(EngineError::DofCountMismatch {
                expected: tree.num_dofs(),
                actual: vector.len(),
            });
        }

        // Contract to cycle space, project there, then expand back with the
        // non-cycle entries passing through.
        let mut contracted = DVector::zeros(nullspace.num_dofs());
        for edge in tree.edges() {
            if let Some(cycle_index) = edge.cycle_index {
                contracted[cycle_index] = vector[edge.dof_index];
            }
        }
        let projected = rescaled_projection(nullspace, &contracted)?;
        let mut expanded = vector.to_vec();
        for edge in tree.edges() {
            if let Some(cycle_index) = edge.cycle_index {
                expanded[edge.dof_index] = projected[cycle_index];
            }
        }
        Ok(expanded)
    }

    /// Computes the nullspace of the clash-avoiding Jacobian: admissible
    /// motions that honor the cycle closures and do not push any of the
    /// given colliding atom pairs further into each other.
    ///
    /// The result lives in the full DOF space and is not cached; clash sets
    /// change from trial to trial.
    pub fn clash_avoiding_nullspace(
        &mut self,
        molecule: &mut Molecule,
        tree: &mut KinematicTree,
        collisions: &[(AtomId, AtomId)],
        params: &SamplingParameters,
    ) -> Result<Nullspace, EngineError> {
        self.update(molecule, tree, &params.nullspace)?;
        let jacobian = jacobian::build_clash_avoiding_jacobian(
            molecule,
            tree,
            self.jacobians.as_ref(),
            collisions,
            params.project_constraints,
        );
        Ok(Nullspace::from_matrix(&jacobian, params.nullspace))
    }

    /// Runs rigidity analysis at this configuration: brings the Jacobians
    /// and nullspace up to date via [`Self::update`], classifies every cycle
    /// DOF and cycle-closing bond, marks rigidified bonds on the molecule,
    /// and optionally collapses rigid bodies into clusters.
    ///
    /// Covalent tree bonds whose DOF is rigid are marked rigidified too;
    /// closing bonds are marked from their auxiliary blocks.
    ///
    /// # Errors
    ///
    /// Fails when the DOF vector does not match the tree, or when a
    /// cycle-closing bond lacks a constraint frame.
    pub fn rigidity_analysis(
        &mut self,
        molecule: &mut Molecule,
        tree: &mut KinematicTree,
        params: &SamplingParameters,
    ) -> Result<RigidityReport, EngineError> {
        self.update(molecule, tree, &params.nullspace)?;
        molecule.clear_rigidified();

        let (Some(jacobians), Some(nullspace)) =
            (self.jacobians.as_ref(), self.nullspace.as_mut())
        else {
            // Without cycles nothing is constrained.
            let clusters = (params.collapse_rigid_edges != CollapseRigidEdges::Off)
                .then(|| rigid_clusters(molecule, tree, params.collapse_rigid_edges));
            return Ok(RigidityReport {
                num_rigid_dofs: 0,
                num_coordinated_dofs: 0,
                num_rigid_hbonds: 0,
                num_rigid_distance_bonds: 0,
                num_rigid_hydrophobic_bonds: 0,
                clusters,
            });
        };
        nullspace.rigidity_analysis(jacobians);

        // Closing bonds, classified per kind in cycle-edge order.
        let mut hbond_idx = 0;
        let mut distance_idx = 0;
        let mut hydrophobic_idx = 0;
        let mut num_rigid_hbonds = 0;
        let mut num_rigid_distance_bonds = 0;
        let mut num_rigid_hydrophobic_bonds = 0;
        for cycle_edge in tree.cycle_edges() {
            let kind = molecule.bonds()[cycle_edge.bond].kind;
            let rigid = match kind {
                BondKind::Hydrogen | BondKind::Covalent => {
                    let rigid = nullspace.is_hbond_rigid(hbond_idx);
                    hbond_idx += 1;
                    if rigid {
                        num_rigid_hbonds += 1;
                    }
                    rigid
                }
                BondKind::Distance => {
                    let rigid = nullspace.is_distance_bond_rigid(distance_idx);
                    distance_idx += 1;
                    if rigid {
                        num_rigid_distance_bonds += 1;
                    }
                    rigid
                }
                BondKind::Hydrophobic => {
                    let rigid = nullspace.is_hydrophobic_bond_rigid(hydrophobic_idx);
                    hydrophobic_idx += 1;
                    if rigid {
                        num_rigid_hydrophobic_bonds += 1;
                    }
                    rigid
                }
            };
            if rigid {
                if let Some(bond) = molecule.bond_mut(cycle_edge.bond) {
                    bond.rigidified = true;
                }
            }
        }

        // Tree bonds whose cycle DOF is rigid.
        for edge in tree.edges() {
            if let (Some(bond_idx), Some(cycle_index)) = (edge.bond, edge.cycle_index) {
                if nullspace.is_dof_rigid(cycle_index) {
                    if let Some(bond) = molecule.bond_mut(bond_idx) {
                        bond.rigidified = true;
                    }
                }
            }
        }

        let clusters = (params.collapse_rigid_edges != CollapseRigidEdges::Off)
            .then(|| rigid_clusters(molecule, tree, params.collapse_rigid_edges));
        Ok(RigidityReport {
            num_rigid_dofs: nullspace.num_rigid_dofs(),
            num_coordinated_dofs: nullspace.num_coordinated_dofs(),
            num_rigid_hbonds,
            num_rigid_distance_bonds,
            num_rigid_hydrophobic_bonds,
            clusters,
        })
    }
}

fn rescaled_projection(
    nullspace: &Nullspace,
    vector: &DVector<f64>,
) -> Result<DVector<f64>, EngineError> {
    let norm_before = vector.norm();
    let mut projected = nullspace.project(vector)?;
    let norm_after = projected.norm();
    if norm_after > NORM_EPS {
        projected *= norm_before / norm_after;
    }
    Ok(projected)
}

/// Arena of configurations linked into an exploration tree.
///
/// Nodes refer to each other by [`ConfigId`]; removing a node detaches it
/// from its parent and orphans its children rather than cascading.
#[derive(Debug, Default)]
pub struct SampleTree {
    configurations: SlotMap<ConfigId, Configuration>,
}

impl SampleTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a configuration with no parent at depth zero.
    pub fn insert_root(&mut self, dofs: Vec<f64>) -> ConfigId {
        self.configurations.insert(Configuration::from_dofs(dofs))
    }

    /// Inserts a child of `parent` with the given DOF values. Returns `None`
    /// when the parent does not exist.
    pub fn spawn_child(&mut self, parent: ConfigId, dofs: Vec<f64>) -> Option<ConfigId> {
        let depth = self.configurations.get(parent)?.tree_depth + 1;
        let mut configuration = Configuration::from_dofs(dofs);
        configuration.parent = Some(parent);
        configuration.tree_depth = depth;
        let id = self.configurations.insert(configuration);
        self.configurations[parent].children.push(id);
        Some(id)
    }

    /// Inserts a sibling copy of `id`: same DOF values and global-DOF cache,
    /// same parent, no cached analysis and no children.
    pub fn clone_of(&mut self, id: ConfigId) -> Option<ConfigId> {
        let source = self.configurations.get(id)?;
        let mut copy = Configuration::from_dofs(source.dofs.clone());
        copy.global_dofs = source.global_dofs.clone();
        copy.parent = source.parent;
        copy.tree_depth = source.tree_depth;
        let parent = copy.parent;
        let new_id = self.configurations.insert(copy);
        if let Some(parent) = parent {
            self.configurations[parent].children.push(new_id);
        }
        Some(new_id)
    }

    /// Removes a configuration, detaching it from its parent and orphaning
    /// its children.
    pub fn remove(&mut self, id: ConfigId) -> Option<Configuration> {
        let removed = self.configurations.remove(id)?;
        if let Some(parent) = removed.parent {
            if let Some(parent) = self.configurations.get_mut(parent) {
                parent.children.retain(|&child| child != id);
            }
        }
        for &child in &removed.children {
            if let Some(child) = self.configurations.get_mut(child) {
                child.parent = None;
            }
        }
        Some(removed)
    }

    pub fn get(&self, id: ConfigId) -> Option<&Configuration> {
        self.configurations.get(id)
    }

    pub fn get_mut(&mut self, id: ConfigId) -> Option<&mut Configuration> {
        self.configurations.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConfigId, &Configuration)> {
        self.configurations.iter()
    }
}
