//! Core domain + application logic for the number check bot.
//!
//! This crate is framework-agnostic. Telegram and the registry backends live
//! behind ports (traits) implemented in adapter crates.

pub mod compare;
pub mod config;
pub mod delivery;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod navigation;
pub mod normalize;
pub mod paginate;
pub mod registry;
pub mod report;
pub mod security;
pub mod session;
pub mod usage;

pub use errors::{Error, Result};
