//! State shared between the prover's stages.

use rollup_prover_types::{L1Header, Tier, TierId};
use tokio::sync::watch;

/// Read-mostly state shared by handlers, submitters and subscriptions.
///
/// The tier catalog is fixed after initialization. The L1 cursor only moves forward.
#[derive(Debug)]
pub struct SharedState {
    tiers: Vec<Tier>,
    l1_current: watch::Sender<Option<L1Header>>,
}

impl SharedState {
    /// Creates the shared state from the protocol's tier catalog.
    pub fn new(mut tiers: Vec<Tier>) -> Self {
        tiers.sort_by_key(|t| t.id);
        let (l1_current, _) = watch::channel(None);
        Self { tiers, l1_current }
    }

    /// Tiers ordered by id.
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Returns the tier with the given id.
    pub fn tier(&self, id: TierId) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.id == id)
    }

    /// Returns the L1 block the prover has processed up to, if initialized.
    pub fn l1_current(&self) -> Option<L1Header> {
        self.l1_current.borrow().clone()
    }

    /// Moves the L1 cursor to `header`.
    ///
    /// Returns `false` and leaves the cursor untouched if `header` is behind it.
    pub fn set_l1_current(&self, header: L1Header) -> bool {
        let mut accepted = false;
        self.l1_current.send_if_modified(|current| match current {
            Some(c) if c.number > header.number => false,
            Some(c) if *c == header => {
                accepted = true;
                false
            }
            _ => {
                *current = Some(header);
                accepted = true;
                true
            }
        });
        accepted
    }

    /// Subscribes to cursor updates.
    pub fn subscribe_l1_current(&self) -> watch::Receiver<Option<L1Header>> {
        self.l1_current.subscribe()
    }
}
