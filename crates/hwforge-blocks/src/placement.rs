//! Grid placement, board sizing, and net derivation

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::model::{BlockDefinition, Bus};

/// Edge length of one grid cell.
pub const GRID_UNIT_MM: f64 = 12.7;

/// Copper-free margin on each side of the board.
pub const BOARD_MARGIN_MM: f64 = 2.0;

pub const DEFAULT_GRID_COLUMNS: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedBlock {
    pub block_slug: String,
    pub grid_x: u32,
    pub grid_y: u32,
    pub width_units: u32,
    pub height_units: u32,
}

impl PlacedBlock {
    /// Every grid cell covered by this block's footprint.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.grid_y..self.grid_y + self.height_units)
            .flat_map(move |y| (self.grid_x..self.grid_x + self.width_units).map(move |x| (x, y)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSize {
    pub width_mm: f64,
    pub height_mm: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Net {
    pub name: String,
    /// Slugs of the blocks on this net, MCU first
    pub members: Vec<String>,
}

/// Place blocks in order on a grid `columns` cells wide.
///
/// Each block goes to the first free origin in row-major order where its whole
/// footprint fits. Blocks wider than `columns` widen the grid instead of being
/// dropped.
#[must_use]
pub fn auto_place(blocks: &[&BlockDefinition], columns: u32) -> Vec<PlacedBlock> {
    let columns = blocks
        .iter()
        .map(|b| b.width_units)
        .max()
        .unwrap_or(1)
        .max(columns)
        .max(1);

    let mut occupied: HashSet<(u32, u32)> = HashSet::new();
    let mut placed = Vec::with_capacity(blocks.len());

    for block in blocks {
        let (w, h) = (block.width_units.max(1), block.height_units.max(1));
        let mut y = 0;
        let origin = loop {
            let free = (0..=columns - w).find(|&x| {
                (y..y + h).all(|cy| (x..x + w).all(|cx| !occupied.contains(&(cx, cy))))
            });
            if let Some(x) = free {
                break (x, y);
            }
            y += 1;
        };

        let item = PlacedBlock {
            block_slug: block.slug.clone(),
            grid_x: origin.0,
            grid_y: origin.1,
            width_units: w,
            height_units: h,
        };
        occupied.extend(item.cells());
        placed.push(item);
    }

    placed
}

/// Board outline: grid extent times the cell size, plus margins.
#[must_use]
pub fn board_size(placed: &[PlacedBlock]) -> BoardSize {
    let cols = placed
        .iter()
        .map(|p| p.grid_x + p.width_units)
        .max()
        .unwrap_or(0);
    let rows = placed
        .iter()
        .map(|p| p.grid_y + p.height_units)
        .max()
        .unwrap_or(0);

    BoardSize {
        width_mm: f64::from(cols) * GRID_UNIT_MM + 2.0 * BOARD_MARGIN_MM,
        height_mm: f64::from(rows) * GRID_UNIT_MM + 2.0 * BOARD_MARGIN_MM,
    }
}

/// Pairs of placed blocks whose footprints share at least one cell.
#[must_use]
pub fn find_overlaps(placed: &[PlacedBlock]) -> Vec<(String, String)> {
    let mut owner: HashMap<(u32, u32), usize> = HashMap::new();
    let mut pairs: Vec<(usize, usize)> = Vec::new();

    for (idx, block) in placed.iter().enumerate() {
        for cell in block.cells() {
            if let Some(&other) = owner.get(&cell) {
                if !pairs.contains(&(other, idx)) {
                    pairs.push((other, idx));
                }
            } else {
                owner.insert(cell, idx);
            }
        }
    }

    pairs
        .into_iter()
        .map(|(a, b)| (placed[a].block_slug.clone(), placed[b].block_slug.clone()))
        .collect()
}

/// One net per shared bus (MCU plus every peripheral on it), a `3V3` rail
/// joining suppliers and consumers, and a `GND` net joining everything.
#[must_use]
pub fn derive_net_list(blocks: &[&BlockDefinition]) -> Vec<Net> {
    let mcu = blocks.iter().find(|b| b.is_mcu());
    let mut by_bus: BTreeMap<Bus, Vec<String>> = BTreeMap::new();

    for block in blocks.iter().filter(|b| !b.is_mcu()) {
        for bus in &block.buses {
            by_bus.entry(*bus).or_default().push(block.slug.clone());
        }
    }

    let mut nets: Vec<Net> = by_bus
        .into_iter()
        .map(|(bus, peripherals)| {
            let mut members: Vec<String> = mcu.map(|m| m.slug.clone()).into_iter().collect();
            members.extend(peripherals);
            Net {
                name: bus.to_string(),
                members,
            }
        })
        .collect();

    let rail: Vec<String> = blocks
        .iter()
        .filter(|b| b.power.provides_ma > 0 || b.power.consumes_ma > 0)
        .map(|b| b.slug.clone())
        .collect();
    if !rail.is_empty() {
        nets.push(Net {
            name: "3V3".to_string(),
            members: rail,
        });
    }
    if !blocks.is_empty() {
        nets.push(Net {
            name: "GND".to_string(),
            members: blocks.iter().map(|b| b.slug.clone()).collect(),
        });
    }

    nets
}
