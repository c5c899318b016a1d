//! Forecasting model.
//!
//! Ratings feed expected goals/points, which feed the Monte Carlo
//! simulator. Everything here is pure and synchronous: the only source of
//! randomness is the `Rng` the caller passes in.

pub mod expected;
pub mod ratings;
pub mod simulator;
