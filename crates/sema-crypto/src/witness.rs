//! Circuit witness assembly and native relation checking.

use ark_bn254::Fr;
use sema_types::{CircuitParams, FieldElement, MerklePath, PublicSignals, SemaError, SemaResult};
use zeroize::Zeroize;

use crate::field::{canonical_fr, element_to_fr, fr_to_element};
use crate::hasher::FieldHasher;
use crate::identity::{nullifier_hash, Identity};

/// Everything the prover knows that the verifier must not learn.
#[derive(Clone)]
pub struct PrivateInputs {
    pub trapdoor: Fr,
    pub nullifier_secret: Fr,
    pub public_key: Fr,
    /// `arity - 1` siblings per level, leaf level first.
    pub siblings: Vec<Vec<Fr>>,
    /// Slot of the running node within its parent, per level.
    pub positions: Vec<usize>,
}

impl Drop for PrivateInputs {
    fn drop(&mut self) {
        self.trapdoor.zeroize();
        self.nullifier_secret.zeroize();
        self.public_key.zeroize();
    }
}

/// A complete assignment for the signaling circuit.
///
/// `public_signals` holds the values the prover claims; [`Witness::check`]
/// recomputes them from the private inputs.
#[derive(Clone)]
pub struct Witness {
    private: PrivateInputs,
    public_signals: PublicSignals,
    params: CircuitParams,
}

impl Witness {
    /// Assemble a witness and compute `root` and `nullifierHash` from it.
    pub fn build(
        identity: &Identity,
        signal_hash: &FieldElement,
        path: &MerklePath,
        external_nullifier: &FieldElement,
        hasher: &dyn FieldHasher,
    ) -> SemaResult<Self> {
        let depth = path.depth();
        if depth == 0 || path.position_indices.len() != depth {
            return Err(SemaError::InvalidParameters(
                "membership path is empty or inconsistent".into(),
            ));
        }
        let arity = path.sibling_groups[0].len() + 1;
        let signal = canonical_fr(signal_hash)?;
        let en = canonical_fr(external_nullifier)?;

        let private = PrivateInputs {
            trapdoor: identity.trapdoor(),
            nullifier_secret: identity.nullifier_secret(),
            public_key: identity.public_key(),
            siblings: path
                .sibling_groups
                .iter()
                .map(|group| group.iter().map(element_to_fr).collect())
                .collect(),
            positions: path.position_indices.iter().map(|p| *p as usize).collect(),
        };

        let root = fold_root(hasher, arity, identity.commitment_fr(hasher), &private)?;
        let nullifier = nullifier_hash(hasher, en, private.nullifier_secret, depth);

        Ok(Self {
            private,
            public_signals: PublicSignals::new(
                fr_to_element(&root),
                fr_to_element(&nullifier),
                fr_to_element(&signal),
                fr_to_element(&en),
            ),
            params: CircuitParams::new(depth, arity, hasher.scheme()),
        })
    }

    /// Witness with caller-chosen public signals; not checked until [`Witness::check`].
    pub fn from_parts(private: PrivateInputs, public_signals: PublicSignals, params: CircuitParams) -> Self {
        Self {
            private,
            public_signals,
            params,
        }
    }

    pub fn private_inputs(&self) -> &PrivateInputs {
        &self.private
    }

    pub fn public_signals(&self) -> PublicSignals {
        self.public_signals
    }

    pub fn params(&self) -> CircuitParams {
        self.params
    }

    /// Verify the circuit relation natively.
    pub fn check(&self, hasher: &dyn FieldHasher) -> SemaResult<()> {
        if hasher.scheme() != self.params.hash_scheme {
            return Err(SemaError::ArtifactMismatch(format!(
                "witness built for {}, hasher is {}",
                self.params.hash_scheme,
                hasher.scheme()
            )));
        }
        if self.private.siblings.len() != self.params.depth
            || self.private.positions.len() != self.params.depth
        {
            return Err(SemaError::InvalidParameters(format!(
                "witness path has {} levels, expected {}",
                self.private.siblings.len(),
                self.params.depth
            )));
        }

        let commitment = hasher.hash(&[
            self.private.trapdoor,
            self.private.nullifier_secret,
            self.private.public_key,
        ]);
        let root = fold_root(hasher, self.params.arity, commitment, &self.private)?;
        if fr_to_element(&root) != self.public_signals.root {
            return Err(SemaError::InvalidParameters(
                "witness root does not match membership path".into(),
            ));
        }

        let en = canonical_fr(&self.public_signals.external_nullifier)?;
        let nullifier = nullifier_hash(hasher, en, self.private.nullifier_secret, self.params.depth);
        if fr_to_element(&nullifier) != self.public_signals.nullifier_hash {
            return Err(SemaError::InvalidParameters(
                "witness nullifier hash does not match identity".into(),
            ));
        }

        canonical_fr(&self.public_signals.signal_hash)?;
        Ok(())
    }
}

fn fold_root(hasher: &dyn FieldHasher, arity: usize, leaf: Fr, private: &PrivateInputs) -> SemaResult<Fr> {
    let mut current = leaf;
    for (siblings, &position) in private.siblings.iter().zip(&private.positions) {
        if siblings.len() + 1 != arity || position >= arity {
            return Err(SemaError::InvalidParameters(format!(
                "path level does not match arity {}",
                arity
            )));
        }
        let mut children = siblings.clone();
        children.insert(position, current);
        current = hasher.hash(&children);
    }
    Ok(current)
}
