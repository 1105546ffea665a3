
/***
 * Measurements
 *
 *  A MeasurementState is the raw pair read in one sampling cycle. Only the raw
 *  values are stored; every physical unit is derived from them on access, so
 *  the five values reported for one state always come from the same pair.
 *
 *  A Snapshot is a MeasurementState as installed by the station: it adds the
 *  cycle number and the time it was taken. Snapshots are shared behind `Arc`
 *  and never change once built.
 */

use chrono::{DateTime, Local};

// Kelvin to Celsius, in sensor units (1/100 K)
pub const KTOC: i32 = -27315;

pub const MILLIBARS_PER_INCH_HG: f64 = 33.8637526;

/// Raw reading in 1/100 K to Kelvin.
pub fn kelvin(raw_kelvin_hundredths: u16) -> f64 {
    f64::from(raw_kelvin_hundredths) / 100.0
}

/// Raw reading in 1/100 K to degrees Celsius.
pub fn celsius(raw_kelvin_hundredths: u16) -> f64 {
    f64::from(i32::from(raw_kelvin_hundredths) + KTOC) / 100.0
}

pub fn fahrenheit_from_celsius(celsius: f64) -> f64 {
    celsius * 1.8 + 32.0
}

pub fn millibars_from_inches(inches_hg: f64) -> f64 {
    inches_hg * MILLIBARS_PER_INCH_HG
}

/// One sampling cycle's raw readings.
///
/// There are no setters: replacing a state means building a new one.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeasurementState {
    raw_kelvin_hundredths: u16,
    raw_pressure: f64,
}

impl MeasurementState {
    pub const fn new(raw_kelvin_hundredths: u16, raw_pressure: f64) -> Self {
        Self {
            raw_kelvin_hundredths,
            raw_pressure,
        }
    }

    pub fn raw_kelvin_hundredths(&self) -> u16 {
        self.raw_kelvin_hundredths
    }

    pub fn raw_pressure(&self) -> f64 {
        self.raw_pressure
    }

    pub fn kelvin(&self) -> f64 {
        kelvin(self.raw_kelvin_hundredths)
    }

    pub fn celsius(&self) -> f64 {
        celsius(self.raw_kelvin_hundredths)
    }

    pub fn fahrenheit(&self) -> f64 {
        fahrenheit_from_celsius(self.celsius())
    }

    /// The sensor reports pressure in inches of mercury already.
    pub fn pressure_inches(&self) -> f64 {
        self.raw_pressure
    }

    pub fn pressure_millibars(&self) -> f64 {
        millibars_from_inches(self.raw_pressure)
    }
}

/// A measurement as installed by the station for a given cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    cycle: u64,
    taken_at: DateTime<Local>,
    measurement: MeasurementState,
}

impl Snapshot {
    pub fn new(cycle: u64, measurement: MeasurementState) -> Self {
        Self::with_time(cycle, measurement, Local::now())
    }

    pub fn with_time(cycle: u64, measurement: MeasurementState, taken_at: DateTime<Local>) -> Self {
        Self {
            cycle,
            taken_at,
            measurement,
        }
    }

    /// Cycle 0 is the prime (or initial) snapshot; each installed cycle adds one.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn time(&self) -> DateTime<Local> {
        self.taken_at
    }

    pub fn measurement(&self) -> MeasurementState {
        self.measurement
    }
}
