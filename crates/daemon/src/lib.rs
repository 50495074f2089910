/// FBA ledger daemon library
///
/// HTTP JSON API over an [`fba_core::FbaNode`].

pub mod api;

pub use api::{router, ApiServer};
