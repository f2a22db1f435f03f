//! PCB building blocks for hwforge
//!
//! A board is assembled from prefabricated blocks snapped onto a fixed grid.
//! This crate holds the block model and catalog, the row-major auto-placer,
//! and the stateless design-rule checker used by the PCB stage and by
//! `hwforge drc`.

mod catalog;
mod drc;
mod error;
mod model;
mod placement;

pub use catalog::BlockCatalog;
pub use drc::{known_i2c_address, validate_block_combination, DrcCode, DrcIssue, DrcResult};
pub use error::BlockError;
pub use model::{BlockCategory, BlockDefinition, Bus, PowerSpec};
pub use placement::{
    auto_place, board_size, derive_net_list, find_overlaps, BoardSize, Net, PlacedBlock,
    BOARD_MARGIN_MM, DEFAULT_GRID_COLUMNS, GRID_UNIT_MM,
};
