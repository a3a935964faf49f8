//! # kiln-graph
//!
//! Pure data structures for the module dependency graph: no resolution, no
//! transforms, no I/O beyond path canonicalisation in [`ModuleId::new`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    ModuleGraph                       │
//! │   arena: Vec<Module>   index: ModuleId -> ModuleIdx  │
//! │   entries: name -> ModuleIdx (declaration order)     │
//! └───────────────┬──────────────────────────────────────┘
//!                 │
//!        ┌────────┴────────┐
//!        ▼                 ▼
//!   ┌─────────┐      ┌────────────┐
//!   │ Module  │─────▶│ ImportEdge │  (specifier, kind, target idx)
//!   │ (node)  │◀─────│            │  importers: back-refs by idx
//!   └─────────┘      └────────────┘
//! ```
//!
//! Edges refer to modules by [`ModuleIdx`], never by ownership, so cycles
//! are ordinary data. Eviction compacts the arena and remaps every index.
//!
//! ## Linear order
//!
//! [`ModuleGraph::exec_order`] is a depth-first post-order from the entries
//! in declaration order, following each module's edges in source order. An
//! edge into a module that is still on the DFS stack is skipped, so the first
//! discovered edge into a cycle wins; static back-edges are reported as
//! [`CycleWarning`]s.

mod dependency_chain;
mod graph;
mod import;
mod module;
mod module_id;
mod order;
mod traversal;

pub use dependency_chain::DependencyChain;
pub use graph::{ModuleGraph, ModuleIdx};
pub use import::{ImportEdge, ImportKind, ImportRecord};
pub use module::{ContentHash, Module, ModuleKind};
pub use module_id::{ModuleId, ModuleIdError};
pub use order::{CycleWarning, ExecOrder};
pub use traversal::Reachability;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("module not in graph: {0}")]
    UnknownModule(ModuleId),

    #[error("module index {0} is out of bounds")]
    InvalidIndex(usize),

    #[error("entry '{0}' declared twice")]
    DuplicateEntry(String),

    #[error(transparent)]
    ModuleId(#[from] ModuleIdError),
}

pub type Result<T> = std::result::Result<T, Error>;
