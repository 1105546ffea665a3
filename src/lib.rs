/***
 * Weather station
 *
 *  A station samples a raw sensor once per period, derives the unit
 *  conversions, installs the result as the current snapshot and hands it to
 *  every subscribed observer.
 *
 *  The station is the only writer of the current snapshot. Readers get an
 *  `Arc` to an immutable value, so a reader sees either the previous or the
 *  new snapshot, never a mix of both.
 */

pub mod config;
pub mod measurements;
pub mod observer;
pub mod sensor;
pub mod station;

pub use measurements::{MeasurementState, Snapshot};
pub use observer::{Observer, ObserverRegistry, SubscribeError, SubscriptionId};
pub use sensor::{Channel, RawSensor, SensorError, SimulatedSensor};
pub use station::{Sampler, Station, SAMPLE_PERIOD};
