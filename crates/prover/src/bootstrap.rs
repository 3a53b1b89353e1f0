//! Startup resolution of the L1 cursor.

use rollup_prover_types::L1Header;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    error::{Error, Result},
    rpc::ProverRpc,
    state::SharedState,
};

/// How the L1 cursor was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorSource {
    /// Nothing was verified yet, the cursor is the rollup's genesis L1 block.
    Genesis,
    /// The L1 block the starting L2 block was proposed in.
    L1Origin,
    /// The starting L2 block's origin is not indexed yet, the cursor is the L1 head.
    LatestHead,
}

/// Resolved L1 cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L1Cursor {
    pub genesis_height_l1: u64,
    pub header: L1Header,
    pub source: CursorSource,
}

/// Resolves the L1 block to resume from and stores it in `state`.
///
/// Must run once, before any event handler. Waiting for the L2 execution engine and
/// reading the protocol state are fatal on failure. An L1 origin that is not indexed
/// yet degrades to the L1 head.
pub async fn init_l1_current(
    rpc: &dyn ProverRpc,
    state: &SharedState,
    starting_block_id: Option<u64>,
    shutdown_token: &CancellationToken,
) -> Result<L1Cursor> {
    rpc.wait_till_l2_synced(shutdown_token).await?;

    let vars = rpc.protocol_state_variables().await?;
    let starting_block_id = starting_block_id.unwrap_or(vars.last_verified_block_id);

    let (header, source) = if starting_block_id == 0 {
        let header = rpc.l1_header_by_number(Some(vars.genesis_height)).await?;
        (header, CursorSource::Genesis)
    } else {
        match rpc.l1_origin_by_id(starting_block_id).await {
            Ok(origin) => {
                let header = rpc.l1_header_by_hash(origin.l1_block_hash).await?;
                (header, CursorSource::L1Origin)
            }
            Err(Error::NotFound) => {
                warn!(
                    block_id = starting_block_id,
                    "L1 origin not found, starting from the L1 head"
                );
                let header = rpc.l1_header_by_number(None).await?;
                (header, CursorSource::LatestHead)
            }
            Err(e) => return Err(e),
        }
    };

    state.set_l1_current(header.clone());
    info!(
        starting_block_id,
        l1_number = header.number,
        l1_hash = %header.hash,
        ?source,
        "L1 cursor initialized"
    );

    Ok(L1Cursor {
        genesis_height_l1: vars.genesis_height,
        header,
        source,
    })
}
