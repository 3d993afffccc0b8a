//! The spigot payloads
//!
//! This library supports message generation for the spigot project: weighted
//! message templates, named pools of substitution candidates and the
//! placeholder substitution that turns a template into a ready-to-send JSON
//! body.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(missing_docs)]
#![allow(clippy::multiple_crate_versions)]

pub use id_pool::IdPool;
pub use message::MessageGenerator;
pub use template::TemplateStore;

pub mod id_pool;
pub mod message;
pub mod template;

/// Errors related to template construction
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// A template weight was negative or not finite
    #[error("template weight must be a non-negative, finite number: {0}")]
    InvalidWeight(f64),
    /// The template weights summed to zero
    #[error("total template weight must be greater than zero")]
    ZeroTotalWeight,
}
