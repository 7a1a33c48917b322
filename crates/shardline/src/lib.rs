#![doc = include_str!("../README.md")]

mod config;
mod convert;
mod cursor;
mod error;
mod pipeline;
mod policy;
pub mod queue;
#[cfg(test)]
mod tests;
mod worker;

pub use crate::config::*;
pub use crate::convert::*;
pub use crate::error::*;
pub use crate::pipeline::*;
pub use crate::policy::*;
