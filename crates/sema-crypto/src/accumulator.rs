//! Append-only K-ary Merkle accumulator over identity commitments.
//!
//! Only filled nodes are stored. Everything to the right of the last
//! leaf is covered by the zero-subtree table, so the full `K^D` tree
//! is never materialised.

use ark_bn254::Fr;
use sema_types::{CircuitParams, FieldElement, MerklePath, SemaError, SemaResult};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::field::{canonical_fr, element_to_fr, fr_to_element};
use crate::hasher::FieldHasher;

/// Every root the accumulator has produced after an insertion.
#[derive(Clone, Debug, Default)]
pub struct RootHistory {
    roots: Vec<FieldElement>,
    index: HashSet<FieldElement>,
}

impl RootHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, root: FieldElement) {
        self.roots.push(root);
        self.index.insert(root);
    }

    pub fn contains(&self, root: &FieldElement) -> bool {
        self.index.contains(root)
    }

    pub fn latest(&self) -> Option<&FieldElement> {
        self.roots.last()
    }

    /// Number of insertions recorded, including ones that repeated an earlier root.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldElement> {
        self.roots.iter()
    }
}

pub struct MembershipAccumulator {
    depth: usize,
    arity: usize,
    zero_value: FieldElement,
    hasher: Arc<dyn FieldHasher>,
    /// `zeros[l]` is the root of an empty subtree whose leaves sit `l` levels below.
    zeros: Vec<Fr>,
    /// `levels[0]` are the leaves, `levels[depth]` holds the root once anything is inserted.
    levels: Vec<Vec<Fr>>,
    capacity: u64,
    history: RootHistory,
}

impl MembershipAccumulator {
    pub fn new(
        depth: usize,
        arity: usize,
        zero_value: FieldElement,
        hasher: Arc<dyn FieldHasher>,
    ) -> SemaResult<Self> {
        if depth == 0 {
            return Err(SemaError::InvalidParameters("depth must be at least 1".into()));
        }
        if arity < 2 {
            return Err(SemaError::InvalidParameters("arity must be at least 2".into()));
        }
        let capacity = CircuitParams::new(depth, arity, hasher.scheme())
            .capacity()
            .ok_or_else(|| {
                SemaError::InvalidParameters(format!(
                    "capacity {}^{} does not fit in 64 bits",
                    arity, depth
                ))
            })?;
        let zero = canonical_fr(&zero_value)
            .map_err(|e| SemaError::InvalidParameters(format!("zero value: {}", e)))?;

        let mut zeros = Vec::with_capacity(depth + 1);
        zeros.push(zero);
        for level in 0..depth {
            let children = vec![zeros[level]; arity];
            zeros.push(hasher.hash(&children));
        }

        debug!(depth, arity, capacity, scheme = %hasher.scheme(), "Created membership accumulator");

        Ok(Self {
            depth,
            arity,
            zero_value,
            hasher,
            zeros,
            levels: vec![Vec::new(); depth + 1],
            capacity,
            history: RootHistory::new(),
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn zero_value(&self) -> FieldElement {
        self.zero_value
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn params(&self) -> CircuitParams {
        CircuitParams::new(self.depth, self.arity, self.hasher.scheme())
    }

    pub fn hasher(&self) -> &Arc<dyn FieldHasher> {
        &self.hasher
    }

    /// Index the next insertion will receive.
    pub fn len(&self) -> u64 {
        self.levels[0].len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.levels[0].is_empty()
    }

    pub fn leaf(&self, index: u64) -> Option<FieldElement> {
        let index = usize::try_from(index).ok()?;
        self.levels[0].get(index).map(fr_to_element)
    }

    pub fn history(&self) -> &RootHistory {
        &self.history
    }

    fn node(&self, level: usize, index: usize) -> Fr {
        self.levels[level]
            .get(index)
            .copied()
            .unwrap_or(self.zeros[level])
    }

    /// Append a commitment and return its leaf index.
    ///
    /// Duplicates are accepted and occupy separate leaves.
    pub fn insert(&mut self, commitment: &FieldElement) -> SemaResult<u64> {
        let leaf_index = self.len();
        if leaf_index >= self.capacity {
            return Err(SemaError::TreeFull {
                capacity: self.capacity,
            });
        }
        let leaf = canonical_fr(commitment)?;

        self.levels[0].push(leaf);
        let mut index = leaf_index as usize;
        for level in 0..self.depth {
            let parent = index / self.arity;
            let first = parent * self.arity;
            let children: Vec<Fr> = (first..first + self.arity)
                .map(|i| self.node(level, i))
                .collect();
            let hash = self.hasher.hash(&children);

            let above = &mut self.levels[level + 1];
            if parent == above.len() {
                above.push(hash);
            } else {
                above[parent] = hash;
            }
            index = parent;
        }

        let root = self.root();
        self.history.push(root);
        debug!(leaf_index, root = %root.short(), "Inserted commitment");
        Ok(leaf_index)
    }

    pub fn root(&self) -> FieldElement {
        fr_to_element(&self.node(self.depth, 0))
    }

    pub fn is_known_root(&self, root: &FieldElement) -> bool {
        self.history.contains(root)
    }

    pub fn path(&self, leaf_index: u64) -> SemaResult<MerklePath> {
        let next_index = self.len();
        if leaf_index >= next_index {
            return Err(SemaError::IndexOutOfRange {
                index: leaf_index,
                next_index,
            });
        }

        let mut sibling_groups = Vec::with_capacity(self.depth);
        let mut position_indices = Vec::with_capacity(self.depth);
        let mut index = leaf_index as usize;

        for level in 0..self.depth {
            let position = index % self.arity;
            let first = index - position;
            let siblings = (0..self.arity)
                .filter(|slot| *slot != position)
                .map(|slot| fr_to_element(&self.node(level, first + slot)))
                .collect();

            sibling_groups.push(siblings);
            position_indices.push(position as u32);
            index /= self.arity;
        }

        Ok(MerklePath {
            leaf_index,
            sibling_groups,
            position_indices,
        })
    }

    pub fn verify_path(&self, leaf: &FieldElement, path: &MerklePath, root: &FieldElement) -> bool {
        match compute_root_from_path(self.hasher.as_ref(), self.arity, leaf, path) {
            Ok(computed) => computed == *root,
            Err(_) => false,
        }
    }
}

/// Fold a membership path back up to the root it commits to.
pub fn compute_root_from_path(
    hasher: &dyn FieldHasher,
    arity: usize,
    leaf: &FieldElement,
    path: &MerklePath,
) -> SemaResult<FieldElement> {
    if path.sibling_groups.len() != path.position_indices.len() {
        return Err(SemaError::InvalidParameters(
            "path sibling groups and positions differ in length".into(),
        ));
    }

    let mut current = element_to_fr(leaf);
    for (siblings, &position) in path.sibling_groups.iter().zip(&path.position_indices) {
        let position = position as usize;
        if siblings.len() != arity - 1 || position >= arity {
            return Err(SemaError::InvalidParameters(format!(
                "path level does not match arity {}",
                arity
            )));
        }
        let mut children: Vec<Fr> = siblings.iter().map(element_to_fr).collect();
        children.insert(position, current);
        current = hasher.hash(&children);
    }
    Ok(fr_to_element(&current))
}

impl std::fmt::Debug for MembershipAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipAccumulator")
            .field("depth", &self.depth)
            .field("arity", &self.arity)
            .field("scheme", &self.hasher.scheme())
            .field("leaves", &self.len())
            .field("root", &self.root())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::default_zero_value;
    use crate::hasher::{Blake3FieldHasher, PoseidonHasher};
    use proptest::prelude::*;

    fn poseidon_tree(depth: usize, arity: usize) -> MembershipAccumulator {
        MembershipAccumulator::new(depth, arity, default_zero_value(), Arc::new(PoseidonHasher)).unwrap()
    }

    /// Full recomputation of the root from the leaf list, level by level.
    fn naive_root(hasher: &dyn FieldHasher, depth: usize, arity: usize, zero: Fr, leaves: &[Fr]) -> Fr {
        let mut level: Vec<Fr> = leaves.to_vec();
        let mut empty = zero;
        for _ in 0..depth {
            let groups = level.len().div_ceil(arity).max(1);
            let mut next = Vec::with_capacity(groups);
            for g in 0..groups {
                let children: Vec<Fr> = (0..arity)
                    .map(|j| level.get(g * arity + j).copied().unwrap_or(empty))
                    .collect();
                next.push(hasher.hash(&children));
            }
            empty = hasher.hash(&vec![empty; arity]);
            level = next;
        }
        level[0]
    }

    #[test]
    fn test_parameter_validation() {
        let hasher: Arc<dyn FieldHasher> = Arc::new(PoseidonHasher);
        let zero = default_zero_value();
        assert!(matches!(
            MembershipAccumulator::new(0, 5, zero, hasher.clone()),
            Err(SemaError::InvalidParameters(_))
        ));
        assert!(matches!(
            MembershipAccumulator::new(20, 1, zero, hasher.clone()),
            Err(SemaError::InvalidParameters(_))
        ));
        assert!(matches!(
            MembershipAccumulator::new(64, 16, zero, hasher.clone()),
            Err(SemaError::InvalidParameters(_))
        ));
        assert!(MembershipAccumulator::new(20, 5, zero, hasher).is_ok());
    }

    #[test]
    fn test_empty_root_not_known() {
        let tree = poseidon_tree(4, 3);
        assert!(tree.is_empty());
        assert!(!tree.is_known_root(&tree.root()));
        assert!(tree.history().is_empty());
    }

    #[test]
    fn test_insert_indices_and_history() {
        let mut tree = poseidon_tree(20, 5);
        let mut roots = Vec::new();
        for i in 0..5u64 {
            let index = tree.insert(&FieldElement::from_u64(100 + i)).unwrap();
            assert_eq!(index, i);
            roots.push(tree.root());
        }
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.history().len(), 5);
        for root in &roots {
            assert!(tree.is_known_root(root));
        }
        assert_eq!(tree.history().latest(), Some(&tree.root()));
        assert_eq!(tree.leaf(3), Some(FieldElement::from_u64(103)));
        assert_eq!(tree.leaf(5), None);
    }

    #[test]
    fn test_incremental_matches_naive() {
        let hasher = PoseidonHasher;
        let mut tree = poseidon_tree(3, 3);
        let zero = element_to_fr(&default_zero_value());
        let mut leaves = Vec::new();
        for i in 0..11u64 {
            tree.insert(&FieldElement::from_u64(i + 1)).unwrap();
            leaves.push(Fr::from(i + 1));
            let expected = naive_root(&hasher, 3, 3, zero, &leaves);
            assert_eq!(tree.root(), fr_to_element(&expected));
        }
    }

    #[test]
    fn test_tree_full() {
        let mut tree = poseidon_tree(2, 2);
        for i in 0..4u64 {
            tree.insert(&FieldElement::from_u64(i)).unwrap();
        }
        let root = tree.root();
        let err = tree.insert(&FieldElement::from_u64(99)).unwrap_err();
        assert!(matches!(err, SemaError::TreeFull { capacity: 4 }));

        // Still usable after the failed insert.
        assert_eq!(tree.root(), root);
        assert_eq!(tree.len(), 4);
        assert!(tree.path(3).is_ok());
    }

    #[test]
    fn test_path_out_of_range() {
        let mut tree = poseidon_tree(4, 3);
        assert!(matches!(
            tree.path(0),
            Err(SemaError::IndexOutOfRange { index: 0, next_index: 0 })
        ));
        tree.insert(&FieldElement::from_u64(7)).unwrap();
        assert!(tree.path(0).is_ok());
        assert!(matches!(
            tree.path(1),
            Err(SemaError::IndexOutOfRange { index: 1, next_index: 1 })
        ));
    }

    #[test]
    fn test_paths_verify() {
        let mut tree = poseidon_tree(20, 5);
        for i in 0..5u64 {
            tree.insert(&FieldElement::from_u64(1000 + i)).unwrap();
        }
        let root = tree.root();
        for i in 0..5u64 {
            let path = tree.path(i).unwrap();
            assert_eq!(path.depth(), 20);
            assert_eq!(path.position_indices[0], i as u32);
            assert!(path.sibling_groups.iter().all(|g| g.len() == 4));
            assert!(tree.verify_path(&FieldElement::from_u64(1000 + i), &path, &root));
        }

        let path = tree.path(4).unwrap();
        assert!(!tree.verify_path(&FieldElement::from_u64(1003), &path, &root));
    }

    #[test]
    fn test_stale_path_fails_against_new_root() {
        let mut tree = poseidon_tree(4, 2);
        tree.insert(&FieldElement::from_u64(1)).unwrap();
        let stale_path = tree.path(0).unwrap();
        let stale_root = tree.root();

        tree.insert(&FieldElement::from_u64(2)).unwrap();
        assert!(tree.verify_path(&FieldElement::from_u64(1), &stale_path, &stale_root));
        assert!(!tree.verify_path(&FieldElement::from_u64(1), &stale_path, &tree.root()));
        assert!(tree.is_known_root(&stale_root));
    }

    #[test]
    fn test_blake3_tree() {
        let mut tree =
            MembershipAccumulator::new(8, 4, default_zero_value(), Arc::new(Blake3FieldHasher)).unwrap();
        tree.insert(&FieldElement::from_u64(5)).unwrap();
        let path = tree.path(0).unwrap();
        assert!(tree.verify_path(&FieldElement::from_u64(5), &path, &tree.root()));
        assert_ne!(tree.root(), poseidon_tree(8, 4).root());
    }

    #[test]
    fn test_rejects_non_canonical_commitment() {
        let mut tree = poseidon_tree(4, 2);
        assert!(tree.insert(&FieldElement([0xff; 32])).is_err());
        assert!(tree.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_same_sequence_same_roots(values in prop::collection::vec(any::<u64>(), 1..12)) {
            let mut a = poseidon_tree(6, 3);
            let mut b = poseidon_tree(6, 3);
            for v in &values {
                a.insert(&FieldElement::from_u64(*v)).unwrap();
                b.insert(&FieldElement::from_u64(*v)).unwrap();
                prop_assert_eq!(a.root(), b.root());
            }
        }

        #[test]
        fn prop_duplicate_gets_new_leaf(values in prop::collection::vec(any::<u64>(), 1..8), dup in any::<u64>()) {
            let mut once = poseidon_tree(5, 4);
            let mut twice = poseidon_tree(5, 4);
            for v in &values {
                once.insert(&FieldElement::from_u64(*v)).unwrap();
                twice.insert(&FieldElement::from_u64(*v)).unwrap();
            }
            let commitment = FieldElement::from_u64(dup);
            let first = once.insert(&commitment).unwrap();
            twice.insert(&commitment).unwrap();
            let second = twice.insert(&commitment).unwrap();

            prop_assert_eq!(second, first + 1);
            prop_assert_ne!(once.root(), twice.root());
        }
    }
}
