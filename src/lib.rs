//! snackstack: typed AWS infrastructure declarations.
//!
//! Declares a default-VPC web service (PostgreSQL, Fargate behind a load
//! balancer) and an Amplify-hosted single-page app, and synthesizes them
//! to CloudFormation templates with BLAKE3-tracked provenance.

pub mod cli;
pub mod constructs;
pub mod core;
pub mod provenance;
