//! Import of KiCad `.kicad_pcb` boards and `.kicad_mod` footprints.
//!
//! Three layers, each using only the one below it:
//!
//! - [`parsers::sexpr`] turns text into generic [`Node`] trees,
//! - [`parsers::query`] finds nodes by token, value or `/`-separated path,
//! - [`parsers::pcbnew`] builds the typed [`Board`] model.
//!
//! [`import`] derives placement, part and package summaries from a board.
//! [`load_footprint`] reads a single library footprint as a package.

pub mod error;
pub mod import;
pub mod parsers;
pub mod types;

pub use error::{ImportError, RecordError};
pub use import::{generate_import, ImportConfig};
pub use parsers::query::{
    find_nodes_by_path, find_nodes_by_path_and_value, find_nodes_by_token,
    find_nodes_by_token_and_value, find_nodes_by_value, get_value_by_path, get_values_by_path,
};
pub use parsers::sexpr::{parse, Node};
pub use types::{Board, Footprint, Location, Package, Pad};

use std::path::Path;

/// Read a board file and build its model.
///
/// Invalid UTF-8 is replaced rather than rejected.
pub fn load(path: &Path) -> Result<Board, ImportError> {
    let data = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&data);
    Ok(Board::parse(&text))
}

/// Read a footprint library file as a package: top-side SMD pads only, in
/// the package frame.
pub fn load_footprint(path: &Path) -> Result<Package, ImportError> {
    let data = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&data);
    let footprint = Footprint::parse_library(&text)?;
    Ok(Package::from_footprint(&footprint))
}
