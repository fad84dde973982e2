//! Graft: Change-Set Management and Code Migration
//!
//! A change-set engine for Smalltalk-style code backends: expands
//! package, class, and method scopes into atomic changes, reduces
//! change lists, applies them concurrently with per-change outcomes,
//! and drives backend-proposed suggestion chains to recover from
//! compilation errors.

pub mod apply;
pub mod backend;
pub mod change;
pub mod changeset;
pub mod config;
pub mod error;
pub mod logging;
pub mod migrate;
pub mod planner;
pub mod recovery;
pub mod types;
