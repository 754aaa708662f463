//! Decoder for legacy DTS shape files (versions 15 to 24).
//!
//! The crate is IO-free: callers hand over a byte slice and a [`Layout`] and get back an owned
//! [`Shape`]. Rendering and archive access live elsewhere.

#![forbid(unsafe_code)]

pub mod codec;
pub mod cursor;
mod error;
pub mod graph;
mod integer_set;
mod material;
mod mesh;
mod model;
mod schema;
pub mod skin_migration;
mod version;

pub use codec::Layout;
pub use error::*;
pub use integer_set::*;
pub use material::*;
pub use mesh::*;
pub use model::*;
pub use schema::*;
pub use version::*;

#[cfg(test)]
mod fixtures;




#[cfg(test)]
mod graph_tests;
