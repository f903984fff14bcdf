//! The component registry contract.
//!
//! This module provides:
//! - The `Component` trait implemented by whatever registers components
//! - Identity-compared `ComponentKey` handles used as store keys
//! - `CreationToken`s carrying dependent release callbacks

mod definition;
mod token;

pub use definition::{Component, ComponentKey, FnComponent, Instance};
pub use token::CreationToken;
