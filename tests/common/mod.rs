//! Common test utilities and helpers
//!
//! - Binary path resolution (via `get_kiln_binary`)
//! - Project fixtures (via `helpers`)

pub(crate) mod helpers;

#[allow(unused_imports)]
pub(crate) use helpers::get_kiln_binary;
