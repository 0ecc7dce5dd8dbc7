//! Pick dominant colors from images and reuse them in other tools.
//!
//! Images are decoded and thumbnailed in parallel ([`pipeline::ingest`]),
//! reduced to a small palette by k-means ([`pipeline::extract`]), and
//! selected colors are formatted for the clipboard while a short history of
//! recent picks is kept ([`selection`], [`history`]).

pub mod cli;
pub mod color;
pub mod config;
pub mod error;
pub mod history;
pub mod pipeline;
pub mod registry;
pub mod selection;
pub mod store;
pub mod tui;

pub use error::{Error, Result};
