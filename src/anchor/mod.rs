//! Anchoring
//!
//! Commits ledger record hashes into a secondary tamper-evident store (the
//! local proof-of-work chain or an external chain) and keeps a side log of
//! where each hash went.

pub mod entry;
pub mod external;
pub mod gateway;
pub mod tx;

pub use crate::config::AnchorMode;
pub use entry::{AnchorEntry, AnchorInfo, AnchorSource, AnchorsLog};
pub use external::{ExternalChainClient, ExternalReceipt, JsonRpcChainClient};
pub use gateway::{AnchorLookup, AnchorOutcome, AnchorStatus, AnchoringGateway, SkipReason};
