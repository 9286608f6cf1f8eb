use sema_crypto::{FieldHasher, MembershipAccumulator};
use sema_types::{CircuitParams, FieldElement, MerklePath, SemaResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Shared membership accumulator.
///
/// Inserts take the write lock, so leaf indices are handed out strictly in
/// order. Reads share the read lock and see a consistent tree.
pub struct MembershipRegistry {
    tree: Arc<RwLock<MembershipAccumulator>>,
    params: CircuitParams,
    hasher: Arc<dyn FieldHasher>,
    registrations: AtomicU64,
    rejected_registrations: AtomicU64,
}

impl MembershipRegistry {
    pub fn new(tree: MembershipAccumulator) -> Self {
        let params = tree.params();
        let hasher = tree.hasher().clone();
        info!(%params, capacity = tree.capacity(), "Membership registry ready");

        Self {
            tree: Arc::new(RwLock::new(tree)),
            params,
            hasher,
            registrations: AtomicU64::new(0),
            rejected_registrations: AtomicU64::new(0),
        }
    }

    pub fn params(&self) -> CircuitParams {
        self.params
    }

    pub fn hasher(&self) -> &Arc<dyn FieldHasher> {
        &self.hasher
    }

    /// The only write path into the accumulator.
    pub async fn insert_identity(&self, commitment: &FieldElement) -> SemaResult<u64> {
        let result = {
            let mut tree = self.tree.write().await;
            tree.insert(commitment)
        };

        match &result {
            Ok(index) => {
                self.registrations.fetch_add(1, Ordering::Relaxed);
                info!(leaf_index = index, commitment = %commitment.short(), "Registered identity");
            }
            Err(e) => {
                self.rejected_registrations.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Identity registration rejected");
            }
        }
        result
    }

    pub async fn path(&self, leaf_index: u64) -> SemaResult<MerklePath> {
        self.tree.read().await.path(leaf_index)
    }

    /// Path together with the root it leads to, taken under one read lock.
    pub async fn path_with_root(&self, leaf_index: u64) -> SemaResult<(MerklePath, FieldElement)> {
        let tree = self.tree.read().await;
        let path = tree.path(leaf_index)?;
        Ok((path, tree.root()))
    }

    pub async fn current_root(&self) -> FieldElement {
        self.tree.read().await.root()
    }

    /// Roots are never forgotten, so a `true` here stays true.
    pub async fn is_known_root(&self, root: &FieldElement) -> bool {
        self.tree.read().await.is_known_root(root)
    }

    pub async fn len(&self) -> u64 {
        self.tree.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tree.read().await.is_empty()
    }

    pub async fn leaf(&self, index: u64) -> Option<FieldElement> {
        self.tree.read().await.leaf(index)
    }

    pub async fn capacity(&self) -> u64 {
        self.tree.read().await.capacity()
    }

    pub fn registrations(&self) -> u64 {
        self.registrations.load(Ordering::Relaxed)
    }

    pub fn rejected_registrations(&self) -> u64 {
        self.rejected_registrations.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sema_crypto::{default_zero_value, PoseidonHasher};
    use sema_types::SemaError;

    fn registry(depth: usize, arity: usize) -> Arc<MembershipRegistry> {
        let tree =
            MembershipAccumulator::new(depth, arity, default_zero_value(), Arc::new(PoseidonHasher))
                .unwrap();
        Arc::new(MembershipRegistry::new(tree))
    }

    #[tokio::test]
    async fn test_register_and_query() {
        let registry = registry(20, 5);
        assert!(registry.is_empty().await);
        let empty_root = registry.current_root().await;
        assert!(!registry.is_known_root(&empty_root).await);

        let index = registry.insert_identity(&FieldElement::from_u64(1)).await.unwrap();
        assert_eq!(index, 0);
        let root = registry.current_root().await;
        assert!(registry.is_known_root(&root).await);

        let (path, path_root) = registry.path_with_root(0).await.unwrap();
        assert_eq!(path_root, root);
        assert_eq!(path.depth(), 20);
        assert_eq!(registry.registrations(), 1);
        assert_eq!(registry.leaf(0).await, Some(FieldElement::from_u64(1)));
    }

    #[tokio::test]
    async fn test_full_tree_counts_rejection() {
        let registry = registry(1, 2);
        registry.insert_identity(&FieldElement::from_u64(1)).await.unwrap();
        registry.insert_identity(&FieldElement::from_u64(2)).await.unwrap();
        let err = registry.insert_identity(&FieldElement::from_u64(3)).await.unwrap_err();
        assert!(matches!(err, SemaError::TreeFull { capacity: 2 }));
        assert_eq!(registry.rejected_registrations(), 1);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_get_unique_indices() {
        let registry = registry(10, 4);
        let mut handles = Vec::new();
        for i in 0..32u64 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.insert_identity(&FieldElement::from_u64(i)).await.unwrap()
            }));
        }

        let mut indices = Vec::new();
        for handle in handles {
            indices.push(handle.await.unwrap());
        }
        indices.sort_unstable();
        assert_eq!(indices, (0..32u64).collect::<Vec<_>>());
        assert_eq!(registry.len().await, 32);
    }
}
