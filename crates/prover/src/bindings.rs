//! Solidity bindings of the protocol contracts and their conversion to domain types.

use alloy_primitives::{B256, Bytes, U256};
use alloy_sol_types::{SolEventInterface, SolValue, sol};
use rollup_prover_types as types;

use crate::error::Result;

sol! {
    #[derive(Debug, Default, PartialEq, Eq)]
    struct BlockMetadata {
        bytes32 l1Hash;
        bytes32 difficulty;
        bytes32 blobHash;
        bytes32 extraData;
        bytes32 depositsHash;
        address coinbase;
        uint64 id;
        uint32 gasLimit;
        uint64 timestamp;
        uint64 l1Height;
        uint16 minTier;
        bool blobUsed;
        bytes32 parentMetaHash;
        address sender;
    }

    #[derive(Debug, Default, PartialEq, Eq)]
    struct EthDeposit {
        address recipient;
        uint96 amount;
        uint64 id;
    }

    #[derive(Debug, Default, PartialEq, Eq)]
    struct Transition {
        bytes32 parentHash;
        bytes32 blockHash;
        bytes32 stateRoot;
        bytes32 graffiti;
    }

    #[derive(Debug, Default, PartialEq, Eq)]
    struct TransitionState {
        bytes32 key;
        bytes32 blockHash;
        bytes32 stateRoot;
        address prover;
        uint96 validityBond;
        address contester;
        uint96 contestBond;
        uint64 timestamp;
        uint16 tier;
        uint8 contestations;
    }

    #[derive(Debug, Default, PartialEq, Eq)]
    struct TierProof {
        uint16 tier;
        bytes data;
    }

    #[derive(Debug, Default, PartialEq, Eq)]
    struct SlotA {
        uint64 genesisHeight;
        uint64 genesisTimestamp;
        uint64 lastSyncedBlockId;
        uint64 lastSyncedAt;
    }

    #[derive(Debug, Default, PartialEq, Eq)]
    struct SlotB {
        uint64 numBlocks;
        uint64 lastVerifiedBlockId;
        bool provingPaused;
        uint8 reservedB1;
        uint16 reservedB2;
        uint32 reservedB3;
        uint64 lastUnpausedAt;
    }

    #[derive(Debug, Default, PartialEq, Eq)]
    struct Block {
        bytes32 metaHash;
        address assignedProver;
        uint96 livenessBond;
        uint64 blockId;
        uint64 proposedAt;
        uint64 proposedIn;
        uint32 nextTransitionId;
        uint32 verifiedTransitionId;
    }

    #[derive(Debug, Default, PartialEq, Eq)]
    struct TierInfo {
        bytes32 verifierName;
        uint96 validityBond;
        uint96 contestBond;
        uint24 cooldownWindow;
        uint16 provingWindow;
        uint8 maxBlocksToVerifyPerProof;
    }

    interface IRollupL1 {
        event BlockProposed(
            uint256 indexed blockId,
            address indexed assignedProver,
            uint96 livenessBond,
            BlockMetadata meta,
            EthDeposit[] depositsProcessed
        );
        event TransitionProved(
            uint256 indexed blockId,
            Transition tran,
            address prover,
            uint96 validityBond,
            uint16 tier
        );
        event TransitionContested(
            uint256 indexed blockId,
            Transition tran,
            address contester,
            uint96 contestBond,
            uint16 tier
        );
        event BlockVerified(
            uint256 indexed blockId,
            address indexed assignedProver,
            address indexed prover,
            bytes32 blockHash,
            bytes32 stateRoot,
            uint16 tier,
            uint8 contestations
        );

        function getStateVariables() external view returns (SlotA memory a, SlotB memory b);
        function getBlock(uint64 blockId) external view returns (Block memory blk, TransitionState memory ts);
        function getTransition(uint64 blockId, bytes32 parentHash) external view returns (TransitionState memory);
        function proveBlock(uint64 blockId, bytes calldata input) external;
    }

    interface ITierProvider {
        function getTierIds() external view returns (uint16[] memory);
        function getTier(uint16 tierId) external view returns (TierInfo memory);
    }

    interface IERC20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    interface IGuardianProver {
        function approve(BlockMetadata calldata meta, Transition calldata tran, TierProof calldata proof) external returns (bool);
    }
}

/// Returns the topic0 of the event kind.
pub fn event_signature(kind: types::EventKind) -> B256 {
    use alloy_sol_types::SolEvent;

    match kind {
        types::EventKind::BlockProposed => IRollupL1::BlockProposed::SIGNATURE_HASH,
        types::EventKind::TransitionProved => IRollupL1::TransitionProved::SIGNATURE_HASH,
        types::EventKind::TransitionContested => IRollupL1::TransitionContested::SIGNATURE_HASH,
        types::EventKind::BlockVerified => IRollupL1::BlockVerified::SIGNATURE_HASH,
    }
}

/// Decodes a rollup contract log into a chain event.
pub fn decode_event(
    topics: &[B256],
    data: &[u8],
    origin: types::EventOrigin,
) -> Result<types::ChainEvent> {
    let event = match IRollupL1::IRollupL1Events::decode_raw_log(topics, data)? {
        IRollupL1::IRollupL1Events::BlockProposed(e) => {
            types::ChainEvent::BlockProposed(types::BlockProposedEvent {
                block_id: e.blockId.saturating_to::<u64>(),
                assigned_prover: e.assignedProver,
                liveness_bond: U256::from(e.livenessBond),
                meta: e.meta.into(),
                origin,
            })
        }
        IRollupL1::IRollupL1Events::TransitionProved(e) => {
            types::ChainEvent::TransitionProved(types::TransitionProvedEvent {
                block_id: e.blockId.saturating_to::<u64>(),
                transition: e.tran.into(),
                prover: e.prover,
                validity_bond: U256::from(e.validityBond),
                tier: e.tier,
                origin,
            })
        }
        IRollupL1::IRollupL1Events::TransitionContested(e) => {
            types::ChainEvent::TransitionContested(types::TransitionContestedEvent {
                block_id: e.blockId.saturating_to::<u64>(),
                transition: e.tran.into(),
                contester: e.contester,
                contest_bond: U256::from(e.contestBond),
                tier: e.tier,
                origin,
            })
        }
        IRollupL1::IRollupL1Events::BlockVerified(e) => {
            types::ChainEvent::BlockVerified(types::BlockVerifiedEvent {
                block_id: e.blockId.saturating_to::<u64>(),
                assigned_prover: e.assignedProver,
                prover: e.prover,
                block_hash: e.blockHash,
                state_root: e.stateRoot,
                tier: e.tier,
                contestations: e.contestations,
                origin,
            })
        }
    };
    Ok(event)
}

/// ABI-encodes the `input` argument of `proveBlock`.
pub fn encode_prove_input(
    meta: &types::BlockMetadata,
    transition: &types::Transition,
    tier: types::TierId,
    proof: Bytes,
) -> Vec<u8> {
    let proof = TierProof { tier, data: proof };
    (
        BlockMetadata::from(meta.clone()),
        Transition::from(transition.clone()),
        proof,
    )
        .abi_encode_params()
}

/// Builds a domain tier from the provider's tier info. Windows are expressed in minutes.
pub fn tier_from_info(id: types::TierId, info: TierInfo) -> types::Tier {
    types::Tier {
        id,
        validity_bond: U256::from(info.validityBond),
        contest_bond: U256::from(info.contestBond),
        cooldown_window: std::time::Duration::from_secs(info.cooldownWindow.to::<u64>() * 60),
        proving_window: std::time::Duration::from_secs(u64::from(info.provingWindow) * 60),
        max_blocks_to_verify: info.maxBlocksToVerifyPerProof,
    }
}

impl From<BlockMetadata> for types::BlockMetadata {
    fn from(m: BlockMetadata) -> Self {
        Self {
            l1_hash: m.l1Hash,
            difficulty: m.difficulty,
            blob_hash: m.blobHash,
            extra_data: m.extraData,
            deposits_hash: m.depositsHash,
            coinbase: m.coinbase,
            id: m.id,
            gas_limit: m.gasLimit,
            timestamp: m.timestamp,
            l1_height: m.l1Height,
            min_tier: m.minTier,
            blob_used: m.blobUsed,
            parent_meta_hash: m.parentMetaHash,
            sender: m.sender,
        }
    }
}

impl From<types::BlockMetadata> for BlockMetadata {
    fn from(m: types::BlockMetadata) -> Self {
        Self {
            l1Hash: m.l1_hash,
            difficulty: m.difficulty,
            blobHash: m.blob_hash,
            extraData: m.extra_data,
            depositsHash: m.deposits_hash,
            coinbase: m.coinbase,
            id: m.id,
            gasLimit: m.gas_limit,
            timestamp: m.timestamp,
            l1Height: m.l1_height,
            minTier: m.min_tier,
            blobUsed: m.blob_used,
            parentMetaHash: m.parent_meta_hash,
            sender: m.sender,
        }
    }
}

impl From<Transition> for types::Transition {
    fn from(t: Transition) -> Self {
        Self {
            parent_hash: t.parentHash,
            block_hash: t.blockHash,
            state_root: t.stateRoot,
            graffiti: t.graffiti,
        }
    }
}

impl From<types::Transition> for Transition {
    fn from(t: types::Transition) -> Self {
        Self {
            parentHash: t.parent_hash,
            blockHash: t.block_hash,
            stateRoot: t.state_root,
            graffiti: t.graffiti,
        }
    }
}

impl From<TransitionState> for types::TransitionState {
    fn from(t: TransitionState) -> Self {
        Self {
            key: t.key,
            block_hash: t.blockHash,
            state_root: t.stateRoot,
            prover: t.prover,
            validity_bond: U256::from(t.validityBond),
            contester: t.contester,
            contest_bond: U256::from(t.contestBond),
            timestamp: t.timestamp,
            tier: t.tier,
            contestations: t.contestations,
        }
    }
}
