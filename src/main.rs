use std::{env, sync::Arc};

use anyhow::Context;
use log::info;
use tokio::sync::mpsc;

use weather_station::{config, SimulatedSensor, Snapshot, Station};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let config = config::parse_config(&args)?;

    let station = Arc::new(Station::new(SimulatedSensor::new()));

    station.subscribe("console", |s: &Snapshot| -> anyhow::Result<()> {
        let m = s.measurement();
        info!(
            "{} #{:<4} {:6.2} K {:6.2} C {:6.2} F {:6.2} inHg {:7.2} mbar",
            s.time().format("%d %b %H:%M:%S"),
            s.cycle(),
            m.kelvin(),
            m.celsius(),
            m.fahrenheit(),
            m.pressure_inches(),
            m.pressure_millibars(),
        );
        Ok(())
    })?;

    // report each delivered cycle so main can stop after the requested count
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    station.subscribe("counter", move |s: &Snapshot| -> anyhow::Result<()> {
        done_tx.send(s.cycle()).context("main is no longer listening")?;
        Ok(())
    })?;

    let limit = config.cycles.unwrap_or(u64::MAX);
    let sampler = station.start()?;
    info!("Welcome to the weather station! Ctrl-C to quit.");

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("could not listen for Ctrl-C")?;
            info!("interrupted");
        }
        _ = async {
            while let Some(cycle) = done_rx.recv().await {
                if cycle >= limit {
                    break;
                }
            }
        } => {
            info!("finished {} cycles", station.current().cycle());
        }
    }

    sampler.stop()?;
    if station.skipped_cycles() > 0 {
        info!("{} cycles skipped on sensor faults", station.skipped_cycles());
    }

    Ok(())
}
