//! Constructs: one module per tier, each declaring its resources into a
//! template and returning a typed handle for the tiers that depend on it.

pub mod access;
pub mod compute;
pub mod database;
pub mod network;
pub mod site;
