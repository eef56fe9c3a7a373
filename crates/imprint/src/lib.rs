#![doc = include_str!("../README.md")]

mod allocator;
mod cache;
mod error;
mod fingerprint;
mod registry;
mod resolver;
mod seed;
mod store;
mod time;

pub use crate::allocator::*;
pub use crate::cache::*;
pub use crate::error::*;
pub use crate::fingerprint::*;
pub use crate::registry::*;
pub use crate::resolver::*;
pub use crate::seed::*;
pub use crate::store::*;
pub use crate::time::*;
