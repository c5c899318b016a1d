//! Core engine: the refresh cycle and the recommendation lifecycle.

pub mod fusion;
pub mod ledger;
pub mod pipeline;
pub mod verifier;
