//! Embedding crate
//!
//! `token` maps integer ids to learned vectors scaled by `sqrt(d_model)`;
//! `positional` adds the fixed sinusoidal position signal and dropout.

pub mod positional;
pub mod token;

pub use positional::*;
pub use token::*;
