//! Station/channel identification for seismic streams

use crate::error::{CrotalusError, CrotalusResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// SEED-style stream identifier (`NET.STA.LOC.CHA`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId {
    pub network: String,
    pub station: String,
    /// Location code, frequently empty
    pub location: String,
    pub channel: String,
}

/// Ground-motion quantity recorded by a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroundMotion {
    /// Broadband or short-period velocity (m/s)
    Velocity,
    /// Accelerometer (m/s²)
    Acceleration,
    /// Displacement (m), usually derived by integration
    Displacement,
    /// Unknown or non-seismic sensor
    Other,
}

impl ChannelId {
    pub fn new(network: &str, station: &str, location: &str, channel: &str) -> Self {
        Self {
            network: network.to_string(),
            station: station.to_string(),
            location: location.to_string(),
            channel: channel.to_string(),
        }
    }

    /// Infer the recorded quantity from the SEED instrument code
    /// (second letter of the channel code)
    pub fn ground_motion(&self) -> GroundMotion {
        match self.channel.chars().nth(1) {
            Some('H') | Some('L') => GroundMotion::Velocity,
            Some('N') | Some('G') => GroundMotion::Acceleration,
            Some('D') => GroundMotion::Displacement,
            _ => GroundMotion::Other,
        }
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

impl FromStr for ChannelId {
    type Err = CrotalusError;

    fn from_str(s: &str) -> CrotalusResult<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [network, station, location, channel] if !station.is_empty() && !channel.is_empty() => {
                Ok(ChannelId::new(network, station, location, channel))
            }
            _ => Err(CrotalusError::config(
                "channel",
                format!("'{}' is not a NET.STA.LOC.CHA identifier", s),
            )),
        }
    }
}
