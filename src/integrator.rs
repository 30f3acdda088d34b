//! Leap-frog driver for a short repulsive particle simulation.
//!
//! Each timestep rebuilds the neighbour index, kicks velocities with a pairwise sum over
//! neighbours and then drifts positions by the updated velocities:
//!
//! ```text
//! v[i] += c * sum(j, norm(dx) < r_cut && norm(dx) > 0, -exp(-norm(dx)) * dx / norm(dx))
//! p[i] += v[i]
//! ```
use crate::cellgrid::{Domain, generate_points_random};
use crate::error::{Error, Result};
use crate::expr::{Expr, Statement, Symbol, exp, norm, sum};
use crate::particles::Particles;
use std::sync::atomic::{AtomicBool, Ordering};

/// Name of the velocity variable used by [`LeapFrog`].
pub const VELOCITY: &str = "velocity";

/// Simulation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Params {
    /// Number of particles.
    pub n: usize,
    /// Seed for the initial positions.
    pub seed: u64,
    /// Interaction cutoff, also used for the neighbour index.
    pub cutoff: f64,
    /// Coupling constant `c` of the velocity update.
    pub coupling: f64,
    pub timesteps: usize,
}

impl Params {
    /// Default parameters for `n` particles, with cutoff `sqrt(3 / n)`.
    pub fn with_particles(n: usize) -> Self {
        Self {
            n,
            cutoff: default_cutoff(n),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.n == 0 {
            return Err(Error::InvalidParameter(
                "number of particles must be positive".into(),
            ));
        }
        if !(self.cutoff.is_finite() && self.cutoff > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "cutoff must be positive and finite, got {}",
                self.cutoff
            )));
        }
        if !self.coupling.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "coupling must be finite, got {}",
                self.coupling
            )));
        }
        Ok(())
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            n: 100,
            seed: 0,
            cutoff: default_cutoff(100),
            coupling: 1e-3,
            timesteps: 1000,
        }
    }
}

/// `sqrt(3 / n)`, about the distance to the nearest few neighbours in a unit box.
pub fn default_cutoff(n: usize) -> f64 {
    (3.0 / n as f64).sqrt()
}

/// `velocity[i] += coupling * sum(j, 0 < |dx| < cutoff, -exp(-|dx|) * dx / |dx|)`
pub fn repulsive_kernel<const N: usize>(cutoff: f64, coupling: f64) -> Statement<N> {
    let dx = Expr::dx();
    let distance = norm(dx.clone());
    let within = distance.clone().lt(cutoff).and(distance.clone().gt(0.0));

    Symbol::variable(VELOCITY)
        .add_assign(coupling * sum(within, -exp(-distance.clone()) * dx / distance))
}

/// `position[i] += velocity[i]`
pub fn drift<const N: usize>() -> Statement<N> {
    Symbol::position().add_assign(Symbol::variable(VELOCITY).i())
}

/// Position of a [`LeapFrog`] driver within its timestep loop.
///
/// `Init -> (RebuildIndex -> EvaluateVelocity -> EvaluatePosition) x timesteps -> Done`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    RebuildIndex,
    EvaluateVelocity,
    EvaluatePosition,
    Done,
}

/// Leap-frog integration of [`repulsive_kernel()`] and [`drift()`].
///
/// ```
/// use symzelll::integrator::{LeapFrog, Params};
///
/// let params = Params { timesteps: 3, ..Params::with_particles(50) };
/// let mut sim = LeapFrog::<2>::new(&params).unwrap();
/// sim.run().unwrap();
/// assert_eq!(sim.steps_done(), 3);
/// assert!(sim.kinetic_energy().unwrap() > 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct LeapFrog<const N: usize = 2> {
    particles: Particles<N>,
    kick: Statement<N>,
    drift: Statement<N>,
    stage: Stage,
    steps_done: usize,
    timesteps: usize,
}

impl<const N: usize> LeapFrog<N> {
    /// Place `params.n` particles uniformly at random in the periodic unit box, at rest.
    pub fn new(params: &Params) -> Result<Self> {
        params.validate()?;

        let domain = Domain::unit();
        let mut particles = Particles::new(0);
        for point in generate_points_random(params.n, &domain, Some(params.seed)) {
            particles.push(point);
        }
        particles.declare_vector(VELOCITY)?;
        particles.init_neighbour_search(domain, params.cutoff)?;

        log::info!(
            "leap-frog: {} particles, seed {}, cutoff {}, coupling {}, {} timesteps",
            params.n,
            params.seed,
            params.cutoff,
            params.coupling,
            params.timesteps
        );
        Self::from_particles(particles, params)
    }

    /// Drive a prepared container. It needs a vector variable named [`VELOCITY`] and an
    /// initialised neighbour search with a cutoff of at least `params.cutoff`.
    pub fn from_particles(particles: Particles<N>, params: &Params) -> Result<Self> {
        params.validate()?;
        let index_cutoff = particles.cutoff().ok_or(Error::NoNeighbourSearch)?;
        if index_cutoff < params.cutoff {
            return Err(Error::InvalidParameter(format!(
                "interaction cutoff {} exceeds the neighbour search cutoff {index_cutoff}",
                params.cutoff
            )));
        }

        let kick = repulsive_kernel(params.cutoff, params.coupling);
        let drift = drift();
        kick.check(&particles)?;
        drift.check(&particles)?;
        log::debug!("kick: {kick}");
        log::debug!("drift: {drift}");

        Ok(Self {
            particles,
            kick,
            drift,
            stage: Stage::Init,
            steps_done: 0,
            timesteps: params.timesteps,
        })
    }

    /// Perform the current stage and move on to the next one.
    pub fn advance(&mut self) -> Result<Stage> {
        self.stage = match self.stage {
            Stage::Init if self.timesteps == 0 => Stage::Done,
            Stage::Init => Stage::RebuildIndex,
            Stage::RebuildIndex => {
                self.particles.rebuild_index()?;
                Stage::EvaluateVelocity
            }
            Stage::EvaluateVelocity => {
                self.particles.evaluate(&self.kick)?;
                Stage::EvaluatePosition
            }
            Stage::EvaluatePosition => {
                self.particles.evaluate(&self.drift)?;
                self.steps_done += 1;
                if log::log_enabled!(log::Level::Trace) {
                    log::trace!(
                        "step {}/{}: kinetic energy {:e}",
                        self.steps_done,
                        self.timesteps,
                        self.kinetic_energy()?
                    );
                }
                if self.steps_done >= self.timesteps {
                    Stage::Done
                } else {
                    Stage::RebuildIndex
                }
            }
            Stage::Done => Stage::Done,
        };
        Ok(self.stage)
    }

    /// Run one full timestep. Returns `false` if all timesteps were already done.
    pub fn step(&mut self) -> Result<bool> {
        if self.stage == Stage::Init {
            self.advance()?;
        }
        if self.stage == Stage::Done {
            return Ok(false);
        }
        let target = self.steps_done + 1;
        while self.steps_done < target {
            self.advance()?;
        }
        Ok(true)
    }

    /// Run all remaining timesteps.
    pub fn run(&mut self) -> Result<()> {
        while self.step()? {}
        log::debug!("leap-frog finished after {} timesteps", self.steps_done);
        Ok(())
    }

    /// Like [`LeapFrog::run()`] but stop early once `cancel` is set.
    ///
    /// The flag is only checked between timesteps. Returns whether all timesteps are done.
    pub fn run_until(&mut self, cancel: &AtomicBool) -> Result<bool> {
        loop {
            if self.stage == Stage::Done {
                return Ok(true);
            }
            if cancel.load(Ordering::Relaxed) {
                log::info!(
                    "leap-frog cancelled after {} of {} timesteps",
                    self.steps_done,
                    self.timesteps
                );
                return Ok(false);
            }
            self.step()?;
        }
    }

    /// `sum(|v|^2 / 2)` over all particles.
    pub fn kinetic_energy(&self) -> Result<f64> {
        Ok(self
            .particles
            .vector(VELOCITY)?
            .iter()
            .map(|v| 0.5 * v.norm_squared())
            .sum())
    }

    pub fn particles(&self) -> &Particles<N> {
        &self.particles
    }

    pub fn into_particles(self) -> Particles<N> {
        self.particles
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn steps_done(&self) -> usize {
        self.steps_done
    }

    pub fn timesteps(&self) -> usize {
        self.timesteps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{SVector, Vector2};

    fn two_particles() -> Particles<2> {
        let mut particles = Particles::new(0);
        particles.push([0.1, 0.1]);
        particles.push([0.2, 0.1]);
        particles.declare_vector(VELOCITY).unwrap();
        particles.init_neighbour_search(Domain::unit(), 0.5).unwrap();
        particles
    }

    #[test]
    fn test_params() {
        let params = Params::default();
        assert_eq!(params.n, 100);
        assert_relative_eq!(params.cutoff, 0.03f64.sqrt());
        assert!(params.validate().is_ok());

        for invalid in [
            Params { n: 0, ..params },
            Params { cutoff: 0.0, ..params },
            Params { cutoff: f64::NAN, ..params },
            Params { coupling: f64::INFINITY, ..params },
        ] {
            assert!(matches!(invalid.validate(), Err(Error::InvalidParameter(_))));
            assert!(LeapFrog::<2>::new(&invalid).is_err());
        }
    }

    #[test]
    fn test_two_particles_repel() {
        let params = Params {
            n: 2,
            seed: 0,
            cutoff: 0.5,
            coupling: 1e-3,
            timesteps: 1,
        };
        let mut sim = LeapFrog::from_particles(two_particles(), &params).unwrap();
        let before = sim.particles().positions().to_vec();
        sim.run().unwrap();
        assert_eq!(sim.stage(), Stage::Done);

        let kick = 1e-3 * (-0.1f64).exp();
        let v = sim.particles().vector(VELOCITY).unwrap();
        assert_relative_eq!(v[0], Vector2::new(-kick, 0.0), epsilon = 1e-15);
        assert_relative_eq!(v[1], Vector2::new(kick, 0.0), epsilon = 1e-15);

        let after = sim.particles().positions();
        for i in 0..2 {
            assert_relative_eq!(after[i] - before[i], v[i], epsilon = 1e-15);
        }
    }

    #[test]
    fn test_stages() {
        let params = Params {
            cutoff: 0.5,
            timesteps: 2,
            ..Params::default()
        };
        let mut sim = LeapFrog::from_particles(two_particles(), &params).unwrap();
        assert_eq!(sim.stage(), Stage::Init);

        let stages: Vec<Stage> = (0..8).map(|_| sim.advance().unwrap()).collect();
        assert_eq!(
            stages,
            [
                Stage::RebuildIndex,
                Stage::EvaluateVelocity,
                Stage::EvaluatePosition,
                Stage::RebuildIndex,
                Stage::EvaluateVelocity,
                Stage::EvaluatePosition,
                Stage::Done,
                Stage::Done,
            ]
        );
        assert_eq!(sim.steps_done(), 2);
        assert!(!sim.step().unwrap());

        let params = Params { timesteps: 0, ..params };
        let mut sim = LeapFrog::from_particles(two_particles(), &params).unwrap();
        assert!(!sim.step().unwrap());
        assert_eq!(sim.stage(), Stage::Done);
    }

    #[test]
    fn test_from_particles_requirements() {
        let params = Params {
            cutoff: 0.5,
            ..Params::default()
        };

        let mut bare = Particles::<2>::new(2);
        bare.declare_vector(VELOCITY).unwrap();
        assert!(matches!(
            LeapFrog::from_particles(bare.clone(), &params),
            Err(Error::NoNeighbourSearch)
        ));

        bare.init_neighbour_search(Domain::unit(), 0.25).unwrap();
        assert!(matches!(
            LeapFrog::from_particles(bare, &params),
            Err(Error::InvalidParameter(_))
        ));

        let mut no_velocity = Particles::<2>::new(2);
        no_velocity.init_neighbour_search(Domain::unit(), 0.5).unwrap();
        assert!(matches!(
            LeapFrog::from_particles(no_velocity, &params),
            Err(Error::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_deterministic() {
        let params = Params {
            timesteps: 5,
            ..Params::with_particles(64)
        };
        let mut a = LeapFrog::<2>::new(&params).unwrap();
        let mut b = LeapFrog::<2>::new(&params).unwrap();
        a.run().unwrap();
        b.run().unwrap();
        assert_eq!(a.particles().positions(), b.particles().positions());

        let mut c = LeapFrog::<2>::new(&Params { seed: 1, ..params }).unwrap();
        c.run().unwrap();
        assert_ne!(a.particles().positions(), c.particles().positions());
    }

    #[test]
    fn test_momentum_conserved() {
        let params = Params {
            timesteps: 10,
            ..Params::with_particles(200)
        };
        let mut sim = LeapFrog::<2>::new(&params).unwrap();
        sim.run().unwrap();

        let momentum: SVector<f64, 2> = sim.particles().vector(VELOCITY).unwrap().iter().sum();
        assert!(momentum.norm() < 1e-12, "{momentum:?}");
        assert!(sim.kinetic_energy().unwrap() > 0.0);

        let domain = sim.particles().domain().unwrap();
        for p in sim.particles().positions() {
            assert!(domain.contains(<[f64; 2]>::from(*p)));
        }
    }

    #[test]
    fn test_run_until_cancelled() {
        let params = Params {
            timesteps: 10,
            ..Params::with_particles(20)
        };
        let mut sim = LeapFrog::<2>::new(&params).unwrap();

        let cancel = AtomicBool::new(true);
        assert!(!sim.run_until(&cancel).unwrap());
        assert_eq!(sim.steps_done(), 0);

        sim.step().unwrap();
        assert!(!sim.run_until(&cancel).unwrap());
        assert_eq!(sim.steps_done(), 1);
        assert_eq!(sim.stage(), Stage::RebuildIndex);

        cancel.store(false, Ordering::Relaxed);
        assert!(sim.run_until(&cancel).unwrap());
        assert_eq!(sim.steps_done(), 10);
    }
}
