use std::fmt::Display;
use std::str::FromStr;

use crate::error::InputParseError;

const ALLOWED_KBPS: [u16; 12] = [64, 80, 96, 112, 128, 144, 160, 192, 224, 256, 288, 320];

/// A target bitrate picked from the fixed menu.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bitrate(u16);

impl Bitrate {
    pub fn new(kbps: u16) -> Result<Self, InputParseError> {
        if ALLOWED_KBPS.contains(&kbps) {
            Ok(Bitrate(kbps))
        } else {
            Err(InputParseError::InvalidBitrate(kbps.to_string()))
        }
    }

    pub fn all() -> Vec<Bitrate> {
        ALLOWED_KBPS.iter().map(|k| Bitrate(*k)).collect()
    }

    pub fn kbps(&self) -> u16 {
        self.0
    }

    /// Value handed to the encoder, e.g. `128k`.
    pub fn encoder_value(&self) -> String {
        format!("{}k", self.0)
    }
}

impl Default for Bitrate {
    fn default() -> Self {
        Bitrate(128)
    }
}

impl FromStr for Bitrate {
    type Err = InputParseError;

    // accepts "128", "128k", "128kbps" and "128 kbps"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let digits = lower
            .strip_suffix("kbps")
            .or_else(|| lower.strip_suffix('k'))
            .unwrap_or(lower.as_str())
            .trim();
        match digits.parse::<u16>() {
            Ok(kbps) => Bitrate::new(kbps).map_err(|_| InputParseError::InvalidBitrate(String::from(s))),
            Err(_) => Err(InputParseError::InvalidBitrate(String::from(s))),
        }
    }
}

impl Display for Bitrate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} kbps", self.0)
    }
}
