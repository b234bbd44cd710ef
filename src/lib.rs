pub mod anchor;
pub mod api;
pub mod config;
pub mod error;
pub mod integration;
pub mod ledger;
pub mod localchain;

pub use error::LedgerError;
