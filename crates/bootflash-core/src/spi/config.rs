//! SPI bus configuration

/// SPI clock polarity / phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpiMode {
    /// CPOL=0, CPHA=0
    #[default]
    Mode0,
    /// CPOL=0, CPHA=1
    Mode1,
    /// CPOL=1, CPHA=0
    Mode2,
    /// CPOL=1, CPHA=1
    Mode3,
}

impl SpiMode {
    /// Build from the numeric mode 0..=3
    pub fn from_index(mode: u8) -> Option<Self> {
        match mode {
            0 => Some(Self::Mode0),
            1 => Some(Self::Mode1),
            2 => Some(Self::Mode2),
            3 => Some(Self::Mode3),
            _ => None,
        }
    }
}

/// Bus parameters a flash is detected and driven with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiConfig {
    /// SPI unit of the SoC
    pub unit: u8,
    /// Chip select line, becomes the descriptor's slave id
    pub chip_select: u8,
    /// Clock used for identification, in kHz
    pub initial_speed_khz: u32,
    /// Highest clock the board allows, in kHz
    pub max_speed_khz: u32,
    /// Byte clocked out while receiving (0x00 or 0xFF depending on IO1 idle level)
    pub idle_byte: u8,
    /// Clock polarity / phase
    pub mode: SpiMode,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            unit: 0,
            chip_select: 0,
            initial_speed_khz: 1_000,
            max_speed_khz: 25_000,
            idle_byte: 0xFF,
            mode: SpiMode::Mode3,
        }
    }
}
