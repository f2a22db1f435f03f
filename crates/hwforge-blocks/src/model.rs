use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Functional category of a block.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BlockCategory {
    Mcu,
    Power,
    Sensor,
    Display,
    Actuator,
    Communication,
    Input,
    Output,
    Storage,
    Connector,
}

/// Electrical bus a block attaches to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Bus {
    I2c,
    Spi,
    Uart,
    Gpio,
    Analog,
    Usb,
}

/// Current supplied to (`provides_ma`) or drawn from (`consumes_ma`) the
/// board's main rail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PowerSpec {
    pub provides_ma: u32,
    pub consumes_ma: u32,
}

/// A catalog entry. Footprints are measured in grid units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDefinition {
    pub slug: String,
    pub name: String,
    pub category: BlockCategory,
    #[serde(default)]
    pub description: String,
    #[serde(default = "one")]
    pub width_units: u32,
    #[serde(default = "one")]
    pub height_units: u32,
    #[serde(default)]
    pub power: PowerSpec,
    #[serde(default)]
    pub i2c_addresses: Vec<u8>,
    /// Address can be changed (solder jumper or address pin).
    #[serde(default)]
    pub i2c_address_configurable: bool,
    /// MCU pins this block claims.
    #[serde(default)]
    pub gpio_pins: Vec<String>,
    #[serde(default)]
    pub spi_cs_pins: Vec<String>,
    #[serde(default)]
    pub buses: Vec<Bus>,
    #[serde(default)]
    pub has_i2c_pullups: bool,
}

fn one() -> u32 {
    1
}

impl BlockDefinition {
    #[must_use]
    pub fn is_mcu(&self) -> bool {
        self.category == BlockCategory::Mcu
    }

    #[must_use]
    pub fn is_power(&self) -> bool {
        self.category == BlockCategory::Power
    }

    #[must_use]
    pub fn uses_i2c(&self) -> bool {
        self.buses.contains(&Bus::I2c) || !self.i2c_addresses.is_empty()
    }
}
