/***
 * The raw sensor the station samples.
 *
 *  Hardware is outside this crate; anything that can produce a raw
 *  temperature and a raw pressure on demand can drive a station.
 */

use std::fmt;

use thiserror::Error;


/// The two channels a station reads each cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Temperature,
    Pressure,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Temperature => f.write_str("temperature"),
            Channel::Pressure => f.write_str("pressure"),
        }
    }
}

/// A failed read. The station treats every variant as transient.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("{channel} read failed: {reason}")]
    ReadFailed { channel: Channel, reason: String },

    #[error("sensor is not responding")]
    Unavailable,
}

/// Source of raw readings for a station.
pub trait RawSensor: Send {
    /// Temperature in hundredths of a Kelvin (0 to 65535).
    fn reading(&mut self) -> Result<u16, SensorError>;

    /// Pressure in inches of mercury.
    fn pressure(&mut self) -> Result<f64, SensorError>;
}

impl<S: RawSensor + ?Sized> RawSensor for Box<S> {
    fn reading(&mut self) -> Result<u16, SensorError> {
        (**self).reading()
    }

    fn pressure(&mut self) -> Result<f64, SensorError> {
        (**self).pressure()
    }
}

/// Synthetic sensor for running without hardware.
///
/// Every temperature read advances the internal clock by one second; the
/// pressure read uses the same clock, so a pair read in one cycle belongs
/// together.
#[derive(Debug, Default)]
pub struct SimulatedSensor {
    elapsed_secs: f64,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume the simulated clock at `elapsed_secs`.
    pub fn starting_at(elapsed_secs: f64) -> Self {
        Self { elapsed_secs }
    }
}

impl RawSensor for SimulatedSensor {
    fn reading(&mut self) -> Result<u16, SensorError> {
        self.elapsed_secs += 1.0;
        let t = self.elapsed_secs;

        // 15-25 °C with a slow drift
        let kelvin = 293.15 + 4.5 * (t / 120.0).sin() + 0.5 * (t / 37.0).cos();
        let raw = (kelvin * 100.0).round().clamp(0.0, f64::from(u16::MAX));

        Ok(raw as u16)
    }

    fn pressure(&mut self) -> Result<f64, SensorError> {
        let t = self.elapsed_secs;

        Ok(29.92 + 0.3 * (t / 600.0).sin() + 0.02 * (t / 53.0).cos())
    }
}
