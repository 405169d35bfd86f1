//! Rigid-cluster decomposition.
//!
//! After a rigidity analysis has marked bonds as rigidified, atoms can be
//! merged into larger rigid clusters: every rigid body is a cluster seed,
//! and rigidified bonds weld the bodies they connect together. The collapse
//! level decides whether only covalent bonds or all bonds participate.

use crate::core::kinematics::tree::KinematicTree;
use crate::core::models::ids::AtomId;
use crate::core::models::molecule::Molecule;
use crate::engine::config::CollapseRigidEdges;
use slotmap::SecondaryMap;
use tracing::debug;

/// Union-find over densely indexed atoms, with path halving and union by
/// size.
struct DisjointSets {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSets {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
    }
}

/// Result of merging rigid bodies across rigidified bonds.
#[derive(Debug, Clone)]
pub struct RigidClusters {
    /// Dense cluster label per atom.
    pub labels: SecondaryMap<AtomId, usize>,
    pub num_clusters: usize,
    /// Label of the largest cluster.
    pub largest_cluster: usize,
    /// Atom count of the largest cluster.
    pub largest_size: usize,
}

impl RigidClusters {
    pub fn cluster_of(&self, atom: AtomId) -> Option<usize> {
        self.labels.get(atom).copied()
    }
}

/// Summary of one rigidity analysis run.
#[derive(Debug, Clone)]
pub struct RigidityReport {
    /// Cycle DOFs with no admissible motion at all.
    pub num_rigid_dofs: usize,
    /// Cycle DOFs that still move, coordinated with others.
    pub num_coordinated_dofs: usize,
    pub num_rigid_hbonds: usize,
    pub num_rigid_distance_bonds: usize,
    pub num_rigid_hydrophobic_bonds: usize,
    /// Present when cluster collapse was requested.
    pub clusters: Option<RigidClusters>,
}

/// Merges the tree's rigid bodies across rigidified bonds into clusters.
///
/// Every atom keeps the cluster of its body when `level` is
/// [`CollapseRigidEdges::Off`]; higher levels additionally weld bodies
/// together across rigidified covalent bonds, or across all rigidified
/// bonds.
pub fn rigid_clusters(
    molecule: &Molecule,
    tree: &KinematicTree,
    level: CollapseRigidEdges,
) -> RigidClusters {
    let mut dense: SecondaryMap<AtomId, usize> = SecondaryMap::new();
    let mut order: Vec<AtomId> = Vec::with_capacity(molecule.num_atoms());
    for (atom, _) in molecule.atoms_iter() {
        dense.insert(atom, order.len());
        order.push(atom);
    }
    let mut sets = DisjointSets::new(order.len());

    let mut stack = vec![tree.root()];
    while let Some(vertex_id) = stack.pop() {
        let vertex = tree.vertex(vertex_id);
        if let Some((&first, rest)) = vertex.atoms.split_first() {
            for &atom in rest {
                sets.union(dense[first], dense[atom]);
            }
        }
        for &edge_idx in &vertex.children {
            stack.push(tree.edges()[edge_idx].end);
        }
    }

    for bond in molecule.bonds() {
        if !bond.rigidified {
            continue;
        }
        let merge = match level {
            CollapseRigidEdges::Off => false,
            CollapseRigidEdges::Covalent => bond.kind.is_covalent(),
            CollapseRigidEdges::All => true,
        };
        if merge {
            sets.union(dense[bond.atom1_id], dense[bond.atom2_id]);
        }
    }

    // Relabel roots densely in atom iteration order.
    let mut labels: SecondaryMap<AtomId, usize> = SecondaryMap::new();
    let mut root_label: Vec<Option<usize>> = vec![None; order.len()];
    let mut sizes: Vec<usize> = Vec::new();
    for &atom in &order {
        let root = sets.find(dense[atom]);
        let label = match root_label[root] {
            Some(label) => label,
            None => {
                let label = sizes.len();
                root_label[root] = Some(label);
                sizes.push(0);
                label
            }
        };
        sizes[label] += 1;
        labels.insert(atom, label);
    }
    let (largest_cluster, &largest_size) = sizes
        .iter()
        .enumerate()
        .max_by_key(|&(_, size)| size)
        .unwrap_or((0, &0));
    debug!(
        num_clusters = sizes.len(),
        largest_size,
        ?level,
        "Rigid clusters computed"
    );
    RigidClusters {
        labels,
        num_clusters: sizes.len(),
        largest_cluster,
        largest_size,
    }
}
