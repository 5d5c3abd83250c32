//! Core of an endless minesweeper field.
//!
//! Mines are never stored: [`FieldOracle`] derives them from tile coordinates and a seed. Only the tiles a player
//! has uncovered are kept, in a [`RevealStore`] that answers rectangle queries for whatever part of the field is on
//! screen. [`GameSession`] ties the pieces together and [`ViewportWindow`] feeds a renderer.

pub use config::*;
pub use engine::*;
pub use error::*;
pub use generator::*;
pub use oracle::*;
pub use session::*;
pub use store::*;
pub use tile::*;
pub use types::*;
pub use viewport::*;

mod config;
mod engine;
mod error;
mod generator;
mod oracle;
mod session;
mod store;
mod tile;
mod types;
mod viewport;
