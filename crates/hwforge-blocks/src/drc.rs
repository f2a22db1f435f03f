//! Stateless design-rule checks over a combination of blocks

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::model::BlockDefinition;

/// Fraction of supply capacity above which a warning is raised.
const NEAR_CAPACITY_RATIO: f64 = 0.8;

/// Default I2C addresses of common parts, keyed by catalog slug. Used to
/// catch collisions for blocks whose catalog entry omits its address.
const KNOWN_I2C_ADDRESSES: &[(&str, u8)] = &[
    ("bme280", 0x76),
    ("bmp280", 0x76),
    ("mpu6050", 0x68),
    ("ds3231-rtc", 0x68),
    ("ssd1306-oled", 0x3C),
    ("sh1106-oled", 0x3C),
    ("servo-driver", 0x40),
    ("ina219", 0x40),
    ("vl53l0x", 0x29),
    ("tsl2561", 0x39),
];

#[must_use]
pub fn known_i2c_address(slug: &str) -> Option<u8> {
    KNOWN_I2C_ADDRESSES
        .iter()
        .find(|(known, _)| *known == slug)
        .map(|(_, addr)| *addr)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DrcCode {
    // errors
    I2cAddressConflict,
    GpioConflict,
    SpiCsConflict,
    NoMcu,
    MultipleMcu,
    MissingPowerRail,
    PowerBudgetExceeded,
    // warnings
    PowerNearCapacity,
    MultiplePowerProviders,
    I2cAddressConflictConfigurable,
    NoI2cPullups,
}

impl DrcCode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::I2cAddressConflict => "I2C_ADDRESS_CONFLICT",
            Self::GpioConflict => "GPIO_CONFLICT",
            Self::SpiCsConflict => "SPI_CS_CONFLICT",
            Self::NoMcu => "NO_MCU",
            Self::MultipleMcu => "MULTIPLE_MCU",
            Self::MissingPowerRail => "MISSING_POWER_RAIL",
            Self::PowerBudgetExceeded => "POWER_BUDGET_EXCEEDED",
            Self::PowerNearCapacity => "POWER_NEAR_CAPACITY",
            Self::MultiplePowerProviders => "MULTIPLE_POWER_PROVIDERS",
            Self::I2cAddressConflictConfigurable => "I2C_ADDRESS_CONFLICT_CONFIGURABLE",
            Self::NoI2cPullups => "NO_I2C_PULLUPS",
        }
    }
}

impl fmt::Display for DrcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrcIssue {
    pub code: DrcCode,
    pub message: String,
    /// Slugs of the blocks involved
    pub blocks: Vec<String>,
}

impl DrcIssue {
    fn new(code: DrcCode, message: impl Into<String>, blocks: Vec<String>) -> Self {
        Self {
            code,
            message: message.into(),
            blocks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DrcResult {
    /// `true` iff `errors` is empty
    pub valid: bool,
    pub errors: Vec<DrcIssue>,
    pub warnings: Vec<DrcIssue>,
}

impl DrcResult {
    #[must_use]
    pub fn has_code(&self, code: DrcCode) -> bool {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .any(|issue| issue.code == code)
    }
}

fn slugs(blocks: &[&BlockDefinition]) -> Vec<String> {
    blocks.iter().map(|b| b.slug.clone()).collect()
}

/// Check a combination of blocks against the electrical rule table.
#[must_use]
pub fn validate_block_combination(blocks: &[&BlockDefinition]) -> DrcResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    check_mcu(blocks, &mut errors);
    check_power(blocks, &mut errors, &mut warnings);
    check_i2c(blocks, &mut errors, &mut warnings);
    check_pins(blocks, &mut errors);

    DrcResult {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

fn check_mcu(blocks: &[&BlockDefinition], errors: &mut Vec<DrcIssue>) {
    let mcus: Vec<&BlockDefinition> = blocks.iter().copied().filter(|b| b.is_mcu()).collect();
    match mcus.len() {
        0 => errors.push(DrcIssue::new(
            DrcCode::NoMcu,
            "Design has no microcontroller block",
            Vec::new(),
        )),
        1 => {}
        n => errors.push(DrcIssue::new(
            DrcCode::MultipleMcu,
            format!("Design has {n} microcontroller blocks; exactly one is supported"),
            slugs(&mcus),
        )),
    }
}

fn check_power(
    blocks: &[&BlockDefinition],
    errors: &mut Vec<DrcIssue>,
    warnings: &mut Vec<DrcIssue>,
) {
    let providers: Vec<&BlockDefinition> = blocks
        .iter()
        .copied()
        .filter(|b| b.power.provides_ma > 0)
        .collect();

    if providers.is_empty() {
        errors.push(DrcIssue::new(
            DrcCode::MissingPowerRail,
            "No block supplies power to the board",
            Vec::new(),
        ));
        return;
    }
    if providers.len() > 1 {
        warnings.push(DrcIssue::new(
            DrcCode::MultiplePowerProviders,
            "More than one block supplies power; make sure only one drives the rail at a time",
            slugs(&providers),
        ));
    }

    let supply: u32 = providers.iter().map(|b| b.power.provides_ma).sum();
    let demand: u32 = blocks.iter().map(|b| b.power.consumes_ma).sum();

    if demand > supply {
        errors.push(DrcIssue::new(
            DrcCode::PowerBudgetExceeded,
            format!("Blocks draw {demand} mA but the supply provides {supply} mA"),
            slugs(blocks),
        ));
    } else if f64::from(demand) > f64::from(supply) * NEAR_CAPACITY_RATIO {
        warnings.push(DrcIssue::new(
            DrcCode::PowerNearCapacity,
            format!("Blocks draw {demand} mA of {supply} mA available (over 80%)"),
            slugs(blocks),
        ));
    }
}

fn check_i2c(
    blocks: &[&BlockDefinition],
    errors: &mut Vec<DrcIssue>,
    warnings: &mut Vec<DrcIssue>,
) {
    let mut by_address: BTreeMap<u8, Vec<&BlockDefinition>> = BTreeMap::new();
    for block in blocks {
        let addresses = if block.i2c_addresses.is_empty() {
            known_i2c_address(&block.slug).into_iter().collect()
        } else {
            block.i2c_addresses.clone()
        };
        for addr in addresses {
            by_address.entry(addr).or_default().push(block);
        }
    }

    for (addr, users) in &by_address {
        if users.len() < 2 {
            continue;
        }
        let fixed = users.iter().filter(|b| !b.i2c_address_configurable).count();
        // Resolvable when every block but one can move to another address.
        if fixed <= 1 {
            warnings.push(DrcIssue::new(
                DrcCode::I2cAddressConflictConfigurable,
                format!("I2C address 0x{addr:02X} is shared; reconfigure all but one block"),
                slugs(users),
            ));
        } else {
            errors.push(DrcIssue::new(
                DrcCode::I2cAddressConflict,
                format!("I2C address 0x{addr:02X} is used by {fixed} fixed-address blocks"),
                slugs(users),
            ));
        }
    }

    let i2c_users: Vec<&BlockDefinition> = blocks
        .iter()
        .copied()
        .filter(|b| !b.is_mcu() && b.uses_i2c())
        .collect();
    if !i2c_users.is_empty() && !blocks.iter().any(|b| b.has_i2c_pullups) {
        warnings.push(DrcIssue::new(
            DrcCode::NoI2cPullups,
            "I2C devices present but no block provides bus pull-up resistors",
            slugs(&i2c_users),
        ));
    }
}

fn check_pins(blocks: &[&BlockDefinition], errors: &mut Vec<DrcIssue>) {
    let mut gpio: BTreeMap<&str, Vec<&BlockDefinition>> = BTreeMap::new();
    let mut spi_cs: BTreeMap<&str, Vec<&BlockDefinition>> = BTreeMap::new();

    for block in blocks.iter().copied().filter(|b| !b.is_mcu()) {
        for pin in &block.gpio_pins {
            gpio.entry(pin.as_str()).or_default().push(block);
        }
        for pin in &block.spi_cs_pins {
            spi_cs.entry(pin.as_str()).or_default().push(block);
        }
    }

    for (pin, users) in gpio.iter().filter(|(_, users)| users.len() > 1) {
        errors.push(DrcIssue::new(
            DrcCode::GpioConflict,
            format!("Pin {pin} is claimed by {} blocks", users.len()),
            slugs(users),
        ));
    }
    for (pin, users) in spi_cs.iter().filter(|(_, users)| users.len() > 1) {
        errors.push(DrcIssue::new(
            DrcCode::SpiCsConflict,
            format!("SPI chip-select {pin} is shared by {} blocks", users.len()),
            slugs(users),
        ));
    }
}
