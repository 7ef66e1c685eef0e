#![warn(
    clippy::pedantic,
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    rust_2021_compatibility
)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]

//! `MokaJIT` turns the bytecode of a single JVM method into a block graph of a
//! high-level, SSA-like intermediate representation, in the style of the C1 client compiler.
//!
//! Graph construction runs in two passes over the bytecode:
//! 1. [`block_map::BlockMap`] discovers basic blocks, their successors, the exception
//!    handlers covering them, and loop headers.
//! 2. [`builder::GraphBuilder`] abstractly interprets the bytecode block by block,
//!    inserting phis at merge points, inlining small callees, and duplicating
//!    `jsr` subroutines on demand.
//!
//! ## Features
#![doc = document_features::document_features!()]

pub mod block_map;
pub mod builder;
pub mod bytecode;
pub mod ir;
pub(crate) mod macros;
pub mod options;
pub mod runtime;
pub mod types;

pub use builder::{BuildError, GraphBuilder, MethodGraphExt};
pub use options::CompilerOptions;

/// Test utilities
#[cfg(test)]
pub(crate) mod tests;
