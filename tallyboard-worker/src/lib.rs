//! # Tallyboard Worker Library
//!
//! Background maintenance for Tallyboard: periodic sweeps that keep stored
//! state consistent with the clock.
//!
//! ## Modules
//!
//! - `config`: Environment configuration
//! - `sweeps`: The [`sweeps::Sweep`] trait and the built-in sweeps
//! - `runner`: Interval loop with graceful shutdown

pub mod config;
pub mod runner;
pub mod sweeps;
