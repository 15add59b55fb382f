//! Graph model, role mapping, and entity resolution for LinkForge
//!
//! Normalized rows become a typed model of nodes and edges via a role
//! assignment (which column is the id, which pair of columns makes a row an
//! edge, and so on). The entity resolver then deduplicates nodes — exact keys
//! first, fuzzy labels second — rewrites edge endpoints to the surviving
//! canonical ids, and infers implicit edges between nodes that share a
//! linkable attribute.

pub mod export;
mod model;
mod resolve;
mod roles;
mod union_find;

pub use model::{Edge, Graph, Node, PropertyMap};
pub use resolve::{resolve, MergeRecord, ResolveOptions, ResolveResult};
pub use roles::{map_roles, suggest_roles, MapResult, Role, RoleAssignment};
