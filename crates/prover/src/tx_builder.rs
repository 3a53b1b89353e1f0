//! Builders of proof and contest transactions.

use alloy_primitives::{Address, B256, Bytes};
use alloy_sol_types::SolCall;
use rollup_prover_types::{
    ContestRequest, GeneratedProof, TIER_GUARDIAN_ID, Transition,
};

use crate::{
    bindings::{self, IGuardianProver, IRollupL1},
    error::{Error, Result},
    sender::{TxCandidate, TxOptions},
};

/// Builds chain-ready transactions from proofs and contests.
#[cfg_attr(test, mockall::automock)]
pub trait TxBuilder: Send + Sync {
    /// Builds the transaction submitting `proof`.
    fn build_prove(
        &self,
        opts: &TxOptions,
        proof: &GeneratedProof,
        graffiti: B256,
    ) -> Result<TxCandidate>;

    /// Builds the transaction contesting the current transition of a block.
    ///
    /// `transition` is the one the local L2 chain considers canonical.
    fn build_contest(
        &self,
        opts: &TxOptions,
        request: &ContestRequest,
        transition: &Transition,
    ) -> Result<TxCandidate>;
}

/// [`TxBuilder`] calling `proveBlock` on the rollup contract.
///
/// Guardian tier proofs go through the guardian prover contract's `approve` instead.
#[derive(Debug, Clone)]
pub struct ProveBlockTxBuilder {
    rollup: Address,
    guardian_prover: Option<Address>,
    gas_limit: Option<u64>,
}

impl ProveBlockTxBuilder {
    /// Create a new builder.
    pub fn new(rollup: Address, guardian_prover: Option<Address>, gas_limit: Option<u64>) -> Self {
        Self {
            rollup,
            guardian_prover,
            gas_limit,
        }
    }
}

impl TxBuilder for ProveBlockTxBuilder {
    fn build_prove(
        &self,
        opts: &TxOptions,
        proof: &GeneratedProof,
        graffiti: B256,
    ) -> Result<TxCandidate> {
        let transition = Transition {
            parent_hash: proof.header.parent_hash,
            block_hash: proof.header.hash,
            state_root: proof.header.state_root,
            graffiti,
        };

        let (to, data) = if proof.tier == TIER_GUARDIAN_ID {
            let guardian_prover = self.guardian_prover.ok_or_else(|| {
                Error::Config("guardian tier requires a guardian prover contract".to_string())
            })?;
            let call = IGuardianProver::approveCall {
                meta: proof.meta.clone().into(),
                tran: transition.into(),
                proof: bindings::TierProof {
                    tier: proof.tier,
                    data: proof.proof.clone(),
                },
            };
            (guardian_prover, call.abi_encode())
        } else {
            let input =
                bindings::encode_prove_input(&proof.meta, &transition, proof.tier, proof.proof.clone());
            let call = IRollupL1::proveBlockCall {
                blockId: proof.block_id,
                input: input.into(),
            };
            (self.rollup, call.abi_encode())
        };

        Ok(TxCandidate::new(opts, to, data.into()).with_gas_limit(self.gas_limit))
    }

    fn build_contest(
        &self,
        opts: &TxOptions,
        request: &ContestRequest,
        transition: &Transition,
    ) -> Result<TxCandidate> {
        let input =
            bindings::encode_prove_input(&request.meta, transition, request.tier, Bytes::new());
        let call = IRollupL1::proveBlockCall {
            blockId: request.block_id,
            input: input.into(),
        };
        Ok(TxCandidate::new(opts, self.rollup, call.abi_encode().into())
            .with_gas_limit(self.gas_limit))
    }
}

#[cfg(test)]
mod tests {
    use alloy_sol_types::SolType;
    use rollup_prover_types::{BlockMetadata, L2Header, TIER_SGX_ID};

    use super::*;

    fn opts() -> TxOptions {
        TxOptions {
            from: Address::repeat_byte(0x01),
            max_fee_per_gas: None,
        }
    }

    fn generated(tier: u16) -> GeneratedProof {
        GeneratedProof {
            block_id: 4,
            tier,
            meta: BlockMetadata {
                id: 4,
                ..Default::default()
            },
            header: L2Header {
                number: 4,
                hash: B256::repeat_byte(0x44),
                parent_hash: B256::repeat_byte(0x33),
                state_root: B256::repeat_byte(0x55),
                timestamp: 0,
            },
            proof: Bytes::from(vec![9u8; 4]),
        }
    }

    #[test]
    fn test_build_prove_targets_rollup() {
        let rollup = Address::repeat_byte(0xee);
        let builder = ProveBlockTxBuilder::new(rollup, None, Some(3_000_000));
        let tx = builder
            .build_prove(&opts(), &generated(TIER_SGX_ID), B256::repeat_byte(0x77))
            .unwrap();

        assert_eq!(tx.to, rollup);
        assert_eq!(tx.from, Address::repeat_byte(0x01));
        assert_eq!(tx.gas_limit, Some(3_000_000));

        let call = IRollupL1::proveBlockCall::abi_decode(&tx.data).unwrap();
        assert_eq!(call.blockId, 4);
        let (_, tran, proof) =
            <(bindings::BlockMetadata, bindings::Transition, bindings::TierProof) as SolType>::abi_decode_params(&call.input)
                .unwrap();
        assert_eq!(tran.parentHash, B256::repeat_byte(0x33));
        assert_eq!(tran.blockHash, B256::repeat_byte(0x44));
        assert_eq!(tran.stateRoot, B256::repeat_byte(0x55));
        assert_eq!(tran.graffiti, B256::repeat_byte(0x77));
        assert_eq!(proof.tier, TIER_SGX_ID);
        assert_eq!(proof.data, Bytes::from(vec![9u8; 4]));
    }

    #[test]
    fn test_build_prove_guardian_requires_contract() {
        let builder = ProveBlockTxBuilder::new(Address::ZERO, None, None);
        let result = builder.build_prove(&opts(), &generated(TIER_GUARDIAN_ID), B256::ZERO);
        assert!(matches!(result, Err(Error::Config(_))));

        let guardian = Address::repeat_byte(0x99);
        let builder = ProveBlockTxBuilder::new(Address::ZERO, Some(guardian), None);
        let tx = builder
            .build_prove(&opts(), &generated(TIER_GUARDIAN_ID), B256::ZERO)
            .unwrap();
        assert_eq!(tx.to, guardian);
        assert!(IGuardianProver::approveCall::abi_decode(&tx.data).is_ok());
    }

    #[test]
    fn test_build_contest_has_empty_proof() {
        let builder = ProveBlockTxBuilder::new(Address::repeat_byte(0xee), None, None);
        let request = ContestRequest {
            block_id: 8,
            proposed_in: 100,
            parent_hash: B256::repeat_byte(0x07),
            meta: BlockMetadata::default(),
            tier: TIER_SGX_ID,
        };
        let transition = Transition {
            parent_hash: B256::repeat_byte(0x07),
            block_hash: B256::repeat_byte(0x08),
            ..Default::default()
        };
        let tx = builder.build_contest(&opts(), &request, &transition).unwrap();

        let call = IRollupL1::proveBlockCall::abi_decode(&tx.data).unwrap();
        assert_eq!(call.blockId, 8);
        let (_, tran, proof) =
            <(bindings::BlockMetadata, bindings::Transition, bindings::TierProof) as SolType>::abi_decode_params(&call.input)
                .unwrap();
        assert_eq!(tran.blockHash, B256::repeat_byte(0x08));
        assert_eq!(proof.tier, TIER_SGX_ID);
        assert!(proof.data.is_empty());
    }
}
