#![doc = include_str!("../README.md")]

mod event;
mod record;

pub use crate::event::*;
pub use crate::record::*;
