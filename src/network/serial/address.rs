//! Hardware addresses and RFCOMM channels

use std::fmt;
use std::str::FromStr;

use crate::constants::{MAX_SERIAL_CHANNEL, MIN_SERIAL_CHANNEL};
use crate::error::TransportError;

/// A 48-bit Bluetooth device address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HardwareAddress([u8; 6]);

impl HardwareAddress {
    /// The wildcard address `00:00:00:00:00:00`
    pub const ANY: HardwareAddress = HardwareAddress([0; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for HardwareAddress {
    type Err = TransportError;

    /// Accepts six two-digit hex groups separated by `:` or `-`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TransportError::InvalidHardwareAddress(s.to_string());

        let bytes = s.as_bytes();
        if bytes.len() != 17 || !s.is_ascii() {
            return Err(invalid());
        }

        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            let start = i * 3;
            if i > 0 && !matches!(bytes[start - 1], b':' | b'-') {
                return Err(invalid());
            }

            let group = &s[start..start + 2];
            if !group.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(group, 16).map_err(|_| invalid())?;
        }

        Ok(Self(octets))
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl From<[u8; 6]> for HardwareAddress {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

/// An RFCOMM channel number (1-30)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel(u8);

impl Channel {
    pub fn new(channel: u32) -> Result<Self, TransportError> {
        match u8::try_from(channel) {
            Ok(c) if (MIN_SERIAL_CHANNEL..=MAX_SERIAL_CHANNEL).contains(&c) => Ok(Self(c)),
            _ => Err(TransportError::InvalidChannel(channel)),
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Peer of a wireless-serial connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SerialEndpoint {
    pub address: HardwareAddress,
    pub channel: Channel,
}

impl SerialEndpoint {
    pub fn new(address: HardwareAddress, channel: Channel) -> Self {
        Self { address, channel }
    }
}

impl fmt::Display for SerialEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.address, self.channel)
    }
}
