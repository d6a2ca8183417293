use anyhow::Result;
use clap::Parser;
use log::info;

use metro_sim::simulation::{City, Direction, Simulation, StationId};

#[derive(Parser)]
#[command(name = "metro_sim")]
#[command(about = "Growing transit-network simulation")]
struct Cli {
    /// Maximum number of simulation ticks to run
    #[arg(long, default_value = "1000")]
    ticks: u64,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Print a city summary every N ticks
    #[arg(long, default_value = "100")]
    report_every: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut city = match cli.seed {
        Some(seed) => City::fixture_with_seed(seed),
        None => City::fixture(),
    };
    city.free_wagons = 2;

    // Lay a starter line over the first three stations and commission one
    // train on it; everything after that is up to the simulation.
    let line = city.add_line()?;
    for index in 0..3 {
        city.add_station_to_line(line, StationId(index), None)?;
    }
    city.add_train(Some(line), None, Direction::Forward)?;

    let mut sim = Simulation::new(city);
    info!("starting: {}", sim.city.summary());

    while sim.should_continue(cli.ticks) {
        sim.step(&[]);
        if sim.city.time % cli.report_every == 0 {
            info!("{}", sim.city.summary());
        }
    }

    info!("finished: {}", sim.city.summary());
    info!(
        "{} passengers arrived, {} still underway, longest current wait {:?}",
        sim.city.travel_times.len(),
        sim.city.passengers.len(),
        sim.city.max_waiting_time(),
    );
    Ok(())
}
