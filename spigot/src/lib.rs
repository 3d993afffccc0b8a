//! The spigot HTTP traffic generator.
//!
//! Spigot issues JSON-bodied POST requests at a fixed global rate against a
//! set of logical connections, cycled round-robin. Message bodies are drawn
//! from weighted templates with placeholder substitution, see
//! [`spigot_payload`]. This library backs the `spigot` binary and is not
//! considered useful otherwise.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(unused_extern_crates)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![allow(clippy::multiple_crate_versions)]

pub mod config;
pub mod connection;
pub mod dispatcher;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, combinators::BoxBody};

/// The request body type sent by every connection.
pub(crate) type RequestBody = BoxBody<Bytes, hyper::Error>;

/// Wrap bytes into a boxed request body.
pub(crate) fn full<T: Into<Bytes>>(chunk: T) -> RequestBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}
