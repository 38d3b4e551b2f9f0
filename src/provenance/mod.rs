//! Provenance: content hashing and the synthesis event log.

pub mod eventlog;
pub mod hasher;
