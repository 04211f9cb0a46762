//! Serial line parameters and their normalization onto supported values.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

// =============================================================================
// ENUMERATED LINE PARAMETERS
// =============================================================================

/// Baud rates the pseudo-device can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BaudRate {
    B9600,
    B19200,
    B38400,
    B57600,
    #[default]
    B115200,
    B230400,
    B460800,
    B921600,
}

impl BaudRate {
    pub const SUPPORTED: [BaudRate; 8] = [
        BaudRate::B9600,
        BaudRate::B19200,
        BaudRate::B38400,
        BaudRate::B57600,
        BaudRate::B115200,
        BaudRate::B230400,
        BaudRate::B460800,
        BaudRate::B921600,
    ];

    /// Exact lookup of a numeric rate.
    pub fn from_rate(rate: u32) -> Option<Self> {
        Self::SUPPORTED.into_iter().find(|b| b.rate() == rate)
    }

    pub fn rate(self) -> u32 {
        match self {
            BaudRate::B9600 => 9600,
            BaudRate::B19200 => 19200,
            BaudRate::B38400 => 38400,
            BaudRate::B57600 => 57600,
            BaudRate::B115200 => 115200,
            BaudRate::B230400 => 230400,
            BaudRate::B460800 => 460800,
            BaudRate::B921600 => 921600,
        }
    }
}

/// Character size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

impl DataBits {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            5 => Some(DataBits::Five),
            6 => Some(DataBits::Six),
            7 => Some(DataBits::Seven),
            8 => Some(DataBits::Eight),
            _ => None,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    #[default]
    One,
    Two,
}

impl StopBits {
    pub fn bits(self) -> u8 {
        match self {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

impl Parity {
    /// Accepts `N`/`O`/`E` and `none`/`odd`/`even`, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "n" | "none" => Some(Parity::None),
            "o" | "odd" => Some(Parity::Odd),
            "e" | "even" => Some(Parity::Even),
            _ => None,
        }
    }

    /// Single-letter form used in `8N1` notation.
    pub fn letter(self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        }
    }
}

// =============================================================================
// NORMALIZED SETTINGS
// =============================================================================

/// Line parameters after normalization; every field is a supported value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SerialSettings {
    pub baud: BaudRate,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: bool,
}

impl fmt::Display for SerialSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}{}{}",
            self.baud.rate(),
            self.data_bits.bits(),
            self.parity.letter(),
            self.stop_bits.bits()
        )?;
        if self.flow_control {
            f.write_str(" rtscts")?;
        }
        Ok(())
    }
}

// =============================================================================
// RAW CONFIG SECTION
// =============================================================================

/// `[serial]` section as written by the user.
///
/// Values are kept raw here; [`SerialConfig::settings`] maps them onto the
/// supported set, falling back to 115200 8N1 for anything unrecognized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub baudrate: u32,
    /// 5-8; anything else falls back to 8.
    pub data_bits: u8,
    /// 2 selects two stop bits; anything else means one.
    pub stop_bits: u8,
    /// none, odd, even (or N, O, E).
    pub parity: String,
    /// Hardware (RTS/CTS) flow control.
    pub flow_control: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baudrate: 115200,
            data_bits: 8,
            stop_bits: 1,
            parity: "none".into(),
            flow_control: false,
        }
    }
}

impl SerialConfig {
    /// Normalize the raw values. Each fallback is logged once per call.
    pub fn settings(&self) -> SerialSettings {
        let baud = BaudRate::from_rate(self.baudrate).unwrap_or_else(|| {
            warn!(
                requested = self.baudrate,
                "unsupported baud rate, using 115200"
            );
            BaudRate::default()
        });

        let data_bits = DataBits::from_bits(self.data_bits).unwrap_or_else(|| {
            warn!(requested = self.data_bits, "unsupported data bits, using 8");
            DataBits::default()
        });

        let stop_bits = match self.stop_bits {
            2 => StopBits::Two,
            1 => StopBits::One,
            other => {
                warn!(requested = other, "unsupported stop bits, using 1");
                StopBits::One
            }
        };

        let parity = Parity::from_name(&self.parity).unwrap_or_else(|| {
            warn!(requested = %self.parity, "unknown parity, using none");
            Parity::None
        });

        SerialSettings {
            baud,
            data_bits,
            stop_bits,
            parity,
            flow_control: self.flow_control,
        }
    }
}
