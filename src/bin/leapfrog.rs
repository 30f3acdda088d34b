use anyhow::{Context, Result};
use clap::Parser;
use symzelll::integrator::{LeapFrog, Params, default_cutoff};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
/// Leap-frog integration of repulsive particles in a periodic unit square.
struct Cli {
    /// Number of particles.
    #[arg(short = 'n', long = "particles", default_value_t = 100)]
    n: usize,
    /// Seed for the initial particle positions.
    #[arg(short, long, default_value_t = 0)]
    seed: u64,
    /// Interaction and neighbour search cutoff. Defaults to sqrt(3 / particles).
    #[arg(short, long)]
    cutoff: Option<f64>,
    /// Coupling constant of the velocity update.
    #[arg(short = 'k', long, default_value_t = 1e-3)]
    coupling: f64,
    /// Number of timesteps.
    #[arg(short, long, default_value_t = 1000)]
    timesteps: usize,
}

impl Cli {
    fn params(&self) -> Params {
        Params {
            n: self.n,
            seed: self.seed,
            cutoff: self.cutoff.unwrap_or_else(|| default_cutoff(self.n)),
            coupling: self.coupling,
            timesteps: self.timesteps,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let params = cli.params();
    params.validate().context("invalid simulation parameters")?;

    let mut sim = LeapFrog::<2>::new(&params).context("failed to set up the simulation")?;
    let start = std::time::Instant::now();
    sim.run().context("simulation failed")?;

    log::info!(
        "{} timesteps of {} particles in {:.3?}, kinetic energy {:e}",
        sim.steps_done(),
        sim.particles().len(),
        start.elapsed(),
        sim.kinetic_energy()?
    );
    Ok(())
}
