use ark_bn254::Fr;
use ark_r1cs_std::{
    alloc::AllocVar,
    boolean::Boolean,
    eq::EqGadget,
    fields::{fp::FpVar, FieldVar},
    select::CondSelectGadget,
};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use sema_types::{HashScheme, SemaError, SemaResult};

use crate::field::element_to_fr;
use crate::poseidon::poseidon_hash_gadget;
use crate::witness::Witness;

/// Proves membership of `H(trapdoor, nullifierSecret, publicKey)` under a
/// public root and binds the nullifier hash and signal hash to it.
///
/// Public inputs, in order: root, nullifier hash, signal hash, external nullifier.
#[derive(Clone)]
pub struct SignalCircuit {
    depth: usize,
    arity: usize,
    trapdoor: Option<Fr>,
    nullifier_secret: Option<Fr>,
    public_key: Option<Fr>,
    siblings: Vec<Vec<Option<Fr>>>,
    positions: Vec<Option<usize>>,
    root: Option<Fr>,
    nullifier_hash: Option<Fr>,
    signal_hash: Option<Fr>,
    external_nullifier: Option<Fr>,
}

impl SignalCircuit {
    /// Shape-only instance for key generation.
    pub fn empty(depth: usize, arity: usize) -> Self {
        Self {
            depth,
            arity,
            trapdoor: None,
            nullifier_secret: None,
            public_key: None,
            siblings: vec![vec![None; arity - 1]; depth],
            positions: vec![None; depth],
            root: None,
            nullifier_hash: None,
            signal_hash: None,
            external_nullifier: None,
        }
    }

    pub fn from_witness(witness: &Witness) -> SemaResult<Self> {
        let params = witness.params();
        if params.hash_scheme != HashScheme::Poseidon {
            return Err(SemaError::ArtifactMismatch(format!(
                "circuit requires poseidon, witness uses {}",
                params.hash_scheme
            )));
        }
        let private = witness.private_inputs();
        if private.siblings.len() != params.depth
            || private.siblings.iter().any(|g| g.len() + 1 != params.arity)
        {
            return Err(SemaError::ProofGenerationFailed(
                "witness path shape does not match circuit parameters".into(),
            ));
        }
        let signals = witness.public_signals();

        Ok(Self {
            depth: params.depth,
            arity: params.arity,
            trapdoor: Some(private.trapdoor),
            nullifier_secret: Some(private.nullifier_secret),
            public_key: Some(private.public_key),
            siblings: private
                .siblings
                .iter()
                .map(|group| group.iter().copied().map(Some).collect())
                .collect(),
            positions: private.positions.iter().copied().map(Some).collect(),
            root: Some(element_to_fr(&signals.root)),
            nullifier_hash: Some(element_to_fr(&signals.nullifier_hash)),
            signal_hash: Some(element_to_fr(&signals.signal_hash)),
            external_nullifier: Some(element_to_fr(&signals.external_nullifier)),
        })
    }
}

impl ConstraintSynthesizer<Fr> for SignalCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let trapdoor = FpVar::new_witness(cs.clone(), || {
            self.trapdoor.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let nullifier_secret = FpVar::new_witness(cs.clone(), || {
            self.nullifier_secret.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let public_key = FpVar::new_witness(cs.clone(), || {
            self.public_key.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let mut siblings = Vec::with_capacity(self.depth);
        for group in &self.siblings {
            let mut vars = Vec::with_capacity(self.arity - 1);
            for sibling in group {
                vars.push(FpVar::new_witness(cs.clone(), || {
                    sibling.ok_or(SynthesisError::AssignmentMissing)
                })?);
            }
            siblings.push(vars);
        }

        let mut selectors = Vec::with_capacity(self.depth);
        for position in &self.positions {
            let mut bits = Vec::with_capacity(self.arity);
            for slot in 0..self.arity {
                bits.push(Boolean::new_witness(cs.clone(), || {
                    position
                        .map(|p| p == slot)
                        .ok_or(SynthesisError::AssignmentMissing)
                })?);
            }
            selectors.push(bits);
        }

        let root = FpVar::new_input(cs.clone(), || {
            self.root.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let nullifier_hash = FpVar::new_input(cs.clone(), || {
            self.nullifier_hash.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let signal_hash = FpVar::new_input(cs.clone(), || {
            self.signal_hash.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let external_nullifier = FpVar::new_input(cs.clone(), || {
            self.external_nullifier.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let commitment = poseidon_hash_gadget(
            cs.clone(),
            &[trapdoor, nullifier_secret.clone(), public_key],
        )?;

        let mut current = commitment;
        for (group, bits) in siblings.iter().zip(&selectors) {
            let children = place_node(&current, group, bits)?;
            current = poseidon_hash_gadget(cs.clone(), &children)?;
        }
        current.enforce_equal(&root)?;

        let depth = FpVar::Constant(Fr::from(self.depth as u64));
        let computed_nullifier =
            poseidon_hash_gadget(cs.clone(), &[external_nullifier, nullifier_secret, depth])?;
        computed_nullifier.enforce_equal(&nullifier_hash)?;

        // Keeps signal_hash in a constraint so the proof is bound to it.
        let _signal_square = signal_hash.square()?;

        Ok(())
    }
}

/// Rebuild the `arity` children of a parent with `node` at the one-hot selected slot.
fn place_node(
    node: &FpVar<Fr>,
    siblings: &[FpVar<Fr>],
    bits: &[Boolean<Fr>],
) -> Result<Vec<FpVar<Fr>>, SynthesisError> {
    let arity = bits.len();

    let mut selected = FpVar::<Fr>::zero();
    for bit in bits {
        selected += FpVar::from(bit.clone());
    }
    selected.enforce_equal(&FpVar::one())?;

    let mut children = Vec::with_capacity(arity);
    for slot in 0..arity {
        let sibling = if slot == 0 {
            siblings[0].clone()
        } else if slot == arity - 1 {
            siblings[arity - 2].clone()
        } else {
            // The node sits further right, so this slot still holds sibling `slot`.
            let node_after = Boolean::kary_or(&bits[slot + 1..])?;
            FpVar::conditionally_select(&node_after, &siblings[slot], &siblings[slot - 1])?
        };
        children.push(FpVar::conditionally_select(&bits[slot], node, &sibling)?);
    }
    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::MembershipAccumulator;
    use crate::field::{default_zero_value, external_nullifier, signal_hash};
    use crate::hasher::PoseidonHasher;
    use crate::identity::Identity;
    use ark_relations::r1cs::ConstraintSystem;
    use sema_types::FieldElement;
    use std::sync::Arc;

    fn witness_at(depth: usize, arity: usize, fillers: u64) -> Witness {
        let mut tree =
            MembershipAccumulator::new(depth, arity, default_zero_value(), Arc::new(PoseidonHasher))
                .unwrap();
        for i in 0..fillers {
            tree.insert(&FieldElement::from_u64(i + 1)).unwrap();
        }
        let identity = Identity::generate().unwrap();
        let index = tree.insert(&identity.commitment(&PoseidonHasher)).unwrap();
        let path = tree.path(index).unwrap();
        Witness::build(
            &identity,
            &signal_hash(b"yes"),
            &path,
            &external_nullifier("voting-1"),
            &PoseidonHasher,
        )
        .unwrap()
    }

    fn satisfied(circuit: SignalCircuit) -> bool {
        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        cs.is_satisfied().unwrap()
    }

    #[test]
    fn test_valid_witness_satisfies() {
        for slot in 0..5u64 {
            let witness = witness_at(3, 5, slot);
            assert!(satisfied(SignalCircuit::from_witness(&witness).unwrap()), "slot {}", slot);
        }
    }

    #[test]
    fn test_binary_tree_satisfies() {
        let witness = witness_at(4, 2, 5);
        assert!(satisfied(SignalCircuit::from_witness(&witness).unwrap()));
    }

    #[test]
    fn test_public_input_count() {
        let witness = witness_at(3, 3, 1);
        let cs = ConstraintSystem::<Fr>::new_ref();
        SignalCircuit::from_witness(&witness)
            .unwrap()
            .generate_constraints(cs.clone())
            .unwrap();
        // One constant plus four public signals.
        assert_eq!(cs.num_instance_variables(), 5);
    }

    #[test]
    fn test_wrong_root_unsatisfied() {
        let witness = witness_at(3, 4, 2);
        let mut signals = witness.public_signals();
        signals.root = FieldElement::from_u64(12345);
        let bad = Witness::from_parts(witness.private_inputs().clone(), signals, witness.params());
        assert!(!satisfied(SignalCircuit::from_witness(&bad).unwrap()));
    }

    #[test]
    fn test_wrong_nullifier_unsatisfied() {
        let witness = witness_at(3, 4, 2);
        let mut signals = witness.public_signals();
        signals.nullifier_hash = FieldElement::from_u64(12345);
        let bad = Witness::from_parts(witness.private_inputs().clone(), signals, witness.params());
        assert!(!satisfied(SignalCircuit::from_witness(&bad).unwrap()));
    }

    #[test]
    fn test_wrong_position_unsatisfied() {
        let witness = witness_at(3, 4, 2);
        let mut private = witness.private_inputs().clone();
        private.positions[0] = (private.positions[0] + 1) % 4;
        let bad = Witness::from_parts(private, witness.public_signals(), witness.params());
        assert!(!satisfied(SignalCircuit::from_witness(&bad).unwrap()));
    }
}
