//! Long running services wired together by `main`.
//!
//! ```text
//!   L1 logs ──► EventSubscription ──► handlers ──┬─► SubmitterService ──► tier workers ──► L1
//!                                               ├─► ContestService ──────────────────────► L1
//!                                               └─► ExpiryService ──► (back to the handlers' channels)
//! ```

pub mod contest;
pub mod dispatch;
pub mod expiry;
pub mod prover;

pub use contest::ContestService;
pub use dispatch::SubmitterService;
pub use expiry::ExpiryService;
pub use prover::{Collaborators, Prover};
