use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::errors::PegError;
use crate::game::{Control, Game, Player};
use crate::value_function::ValueFunction;

/// Seed value for both iteration buffers. 1 is the value of a state from
/// which the evader escapes forever, the fixed point is approached from
/// above.
const INITIAL_VALUE: f64 = 1.0;

///
/// Parameters of the fixed-point iteration. This is handed to the solver
/// explicitly; the discount factor `beta = exp(-time_step)` is derived.
///
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig
{
    pub time_step: f64,
    pub control_resolution: u32,
    pub allow_standing_still: bool,
    pub max_iterations: u32,
}

impl Default for SolverConfig
{
    fn default() -> Self {
        Self { time_step: 0.1, control_resolution: 50, allow_standing_still: true, max_iterations: 150 }
    }
}

impl SolverConfig
{
    #[inline(always)]
    pub fn beta(&self) -> f64
    {
        (-self.time_step).exp()
    }
}

///
/// Value iteration for the discretized Isaacs minimax game: sweeps the grid
/// applying the update
///
/// `v(x) <- max over evader headings { min over pursuer headings {
///     beta * V(x') + 1 - beta } }`
///
/// against the previous iterate `V` until no cell moves by more than the
/// tolerance, or the iteration cap is hit. Two buffers are kept alive so a
/// sweep never reads values written by itself.
///
pub struct Solver<'a, G: Game>
{
    domain: &'a Domain,
    game: &'a G,
    config: SolverConfig,
}

impl<'a, G: Game> Solver<'a, G>
{
    pub fn new(domain: &'a Domain, game: &'a G, config: SolverConfig) -> Result<Self, PegError>
    {
        if config.time_step <= 0.0
        {
            return Err(PegError::InvalidTimeStep);
        }
        if config.control_resolution == 0
        {
            return Err(PegError::InvalidControlResolution);
        }
        Ok(Self { domain, game, config })
    }

    #[inline(always)]
    pub fn config(&self) -> &SolverConfig
    {
        &self.config
    }

    ///
    /// Runs the fixed-point iteration and returns the converged value
    /// function together with the number of sweeps used. A count equal to
    /// `max_iterations` means the caller should treat the result as a
    /// non-converged approximation. A non-positive tolerance is rejected
    /// before any sweep is performed.
    ///
    pub fn compute_value_function(&self, tolerance: f64) -> Result<ValueFunction, PegError>
    {
        if tolerance <= 0.0
        {
            return Err(PegError::InvalidTolerance);
        }

        let mut current = ValueFunction::with_value(self.domain.clone(), INITIAL_VALUE);
        let mut next = ValueFunction::with_value(self.domain.clone(), INITIAL_VALUE);

        // The half-sweep with mirror writes is only valid on the
        // reflection-symmetric hyper-cube with the planar two-player state
        // layout.
        let symmetric = self.domain.symmetric() && self.domain.dim() == 4;

        let mut changed = true;
        let mut iterations = 0u32;
        while changed && iterations < self.config.max_iterations
        {
            iterations += 1;
            changed = if symmetric
            {
                self.symmetric_sweep(&current, &mut next, tolerance)
            }
            else
            {
                self.full_sweep(&current, &mut next, tolerance)
            };
            std::mem::swap(&mut current, &mut next);
        }

        if symmetric
        {
            Self::mirror_result(&mut current);
        }
        current.set_iterations(iterations);
        Ok(current)
    }

    ///
    /// One sweep over the lower half of the first two dimensions. Every
    /// computed value is also written at the `(i, max-j, k, max-l)`
    /// reflection, and the row beyond the swept half of dimension 0 is
    /// filled by copying the last swept row under the all-dimension
    /// reflection. Returns whether any visited cell moved by more than the
    /// tolerance.
    ///
    fn symmetric_sweep(&self, current: &ValueFunction, next: &mut ValueFunction, tolerance: f64) -> bool
    {
        let max = self.domain.maximal_grid_index();
        let mut changed = false;
        for i in 0..=max[0] / 2
        {
            for j in 0..=max[1] / 2
            {
                for k in 0..=max[2]
                {
                    for l in 0..=max[3]
                    {
                        let index = [i, j, k, l];
                        if !self.domain.is_feasible_index(&index)
                        {
                            continue;
                        }
                        let old = current.value(&index);
                        let new = if self.game.is_terminal_index(&index)
                        {
                            0.0
                        }
                        else
                        {
                            self.cell_value(current, &self.domain.point(&index))
                        };
                        if !changed
                        {
                            changed = (old - new).abs() > tolerance;
                        }
                        next.set_value(&index, new);
                        next.set_value(&[i, max[1] - j, k, max[3] - l], new);
                    }
                }
            }
        }

        // Copy the last line.
        let boundary = max[0] / 2 + 1;
        for j in 0..=max[1]
        {
            for k in 0..=max[2]
            {
                for l in 0..=max[3]
                {
                    let value = next.value(&[boundary - 1, j, k, l]);
                    next.set_value(&[boundary, max[1] - j, max[2] - k, max[3] - l], value);
                }
            }
        }
        changed
    }

    ///
    /// One full-grid sweep. Cells only read the previous iterate, so the
    /// per-cell minimax searches are distributed across threads.
    ///
    fn full_sweep(&self, current: &ValueFunction, next: &mut ValueFunction, tolerance: f64) -> bool
    {
        let values: Vec<f64> = (0..current.len())
            .into_par_iter()
            .map(|flat| {
                let index = current.from_array_index(flat);
                if !self.domain.is_feasible_index(&index)
                {
                    return current.values()[flat];
                }
                if self.game.is_terminal_index(&index)
                {
                    return 0.0;
                }
                self.cell_value(current, &self.domain.point(&index))
            })
            .collect();
        let changed = current
            .values()
            .iter()
            .zip(values.iter())
            .any(|(old, new)| (old - new).abs() > tolerance);
        next.values_mut().copy_from_slice(&values);
        changed
    }

    ///
    /// Mirrors the lower half of dimension 0 across the all-dimension
    /// reflection, filling the rows the half-sweep never visited.
    ///
    fn mirror_result(result: &mut ValueFunction)
    {
        let max = result.domain().maximal_grid_index();
        for i in 0..=max[0] / 2
        {
            for j in 0..=max[1]
            {
                for k in 0..=max[2]
                {
                    for l in 0..=max[3]
                    {
                        let value = result.value(&[i, j, k, l]);
                        result.set_value(&[max[0] - i, max[1] - j, max[2] - k, max[3] - l], value);
                    }
                }
            }
        }
    }

    ///
    /// The minimax update at one non-terminal grid node. The evader
    /// maximizes over his admissible headings the worst (minimal) discounted
    /// value the pursuer can reply with; this nesting order is part of the
    /// approximation scheme and must not be swapped. Headings that would
    /// leave the domain are skipped. Each player's kinematics are
    /// independent, so the pursuer replies are evaluated on top of the state
    /// with the evader already moved.
    ///
    /// The search sentinels leak out when a player is boxed in: a node where
    /// the evader has no admissible heading (possible with
    /// `allow_standing_still = false`) yields `f64::NEG_INFINITY`, and one
    /// where some evader heading leaves the pursuer without an admissible
    /// reply yields `f64::INFINITY`.
    ///
    fn cell_value(&self, vfunc: &ValueFunction, x: &[f64]) -> f64
    {
        let beta = self.config.beta();
        let step = self.config.time_step;
        let resolution = self.config.control_resolution;
        let mut after_evader = vec![0.0; x.len()];
        let mut after_both = vec![0.0; x.len()];

        let mut value = f64::NEG_INFINITY;
        let first: Control = if self.config.allow_standing_still { 0 } else { 1 };
        for evader_control in first..=resolution
        {
            self.game.step(x, 0, evader_control, step, &mut after_evader);
            if !self.domain.is_feasible_for(&after_evader, Player::Evader)
            {
                continue;
            }
            let mut reply_value = f64::INFINITY;
            for pursuer_control in 1..=resolution
            {
                self.game.step(&after_evader, pursuer_control, 0, step, &mut after_both);
                if !self.domain.is_feasible_for(&after_both, Player::Pursuer)
                {
                    continue;
                }
                let candidate = beta * vfunc.eval(&after_both) + 1.0 - beta;
                if candidate < reply_value
                {
                    reply_value = candidate;
                }
            }
            if reply_value > value
            {
                value = reply_value;
            }
        }
        value
    }
}

#[cfg(test)]
use crate::game::TagGame;

#[cfg(test)]
fn reference_setup(nodes: usize) -> (Domain, TagGame, SolverConfig)
{
    let domain = Domain::new(-2.0, 2.0, nodes, 4).unwrap();
    let game = TagGame::new(domain.clone(), 2.0, 1.0, 8, None).unwrap();
    let config = SolverConfig {
        time_step: domain.width() / 2.0,
        control_resolution: 8,
        allow_standing_still: true,
        max_iterations: 150,
    };
    (domain, game, config)
}

#[test]
fn check_rejects_invalid_parameters()
{
    let (domain, game, config) = reference_setup(5);

    let solver = Solver::new(&domain, &game, config).unwrap();
    assert_eq!(solver.compute_value_function(0.0).unwrap_err(), PegError::InvalidTolerance);
    assert_eq!(solver.compute_value_function(-1.0).unwrap_err(), PegError::InvalidTolerance);

    let mut bad = config;
    bad.time_step = 0.0;
    assert!(matches!(Solver::new(&domain, &game, bad), Err(PegError::InvalidTimeStep)));
    let mut bad = config;
    bad.control_resolution = 0;
    assert!(matches!(Solver::new(&domain, &game, bad), Err(PegError::InvalidControlResolution)));
}

#[test]
fn check_all_terminal_domain_converges_to_zero()
{
    // Two nodes per dimension: every pair of grid positions is within one
    // cell, so every state is terminal and the field collapses to 0.
    let (domain, game, mut config) = reference_setup(2);
    config.control_resolution = 6;
    config.max_iterations = 5;
    let solver = Solver::new(&domain, &game, config).unwrap();
    let value = solver.compute_value_function(1e-3).unwrap();

    assert_eq!(value.iterations(), Some(2));
    for flat in 0..value.len()
    {
        let index = value.from_array_index(flat);
        assert_eq!(value.value(&index), 0.0);
    }
}

#[test]
fn check_reference_scenario_converges()
{
    let (domain, game, config) = reference_setup(5);
    let solver = Solver::new(&domain, &game, config).unwrap();
    let value = solver.compute_value_function(1e-1).unwrap();

    let iterations = value.iterations().unwrap();
    assert!(iterations > 1 && iterations < config.max_iterations);

    assert_eq!(value.len(), 625);
    let max = domain.maximal_grid_index();
    for flat in 0..value.len()
    {
        let index = value.from_array_index(flat);
        let v = value.value(&index);
        assert!(v.is_finite(), "cell {:?} = {}", index, v);
        assert!(v >= 0.0 && v <= 1.0 + 1e-9, "cell {:?} = {}", index, v);
        if game.is_terminal_index(&index)
        {
            assert_eq!(v, 0.0, "terminal cell {:?}", index);
        }
        // The solved field carries the reflection symmetries of the game.
        // The all-dimension reflection is exact by construction; the planar
        // one holds up to interpolation round-off.
        let full = [max[0] - index[0], max[1] - index[1], max[2] - index[2], max[3] - index[3]];
        let planar = [index[0], max[1] - index[1], index[2], max[3] - index[3]];
        assert_eq!(value.value(&full), v, "full reflection of {:?}", index);
        assert!(
            crate::utilities::approx_eq(value.value(&planar), v, 1e-9),
            "planar reflection of {:?}",
            index
        );
    }

    // A non-terminal cell pays at least one discounted step: its value is
    // bounded below by `1 - beta`.
    let corner = value.value(&[0, 0, 4, 4]);
    assert!(corner >= 1.0 - config.beta() && corner <= 1.0 + 1e-9);

    // Interpolation over the solved field stays inside the value range.
    let sample = value.eval(&[-1.3, 0.7, 1.1, -0.2]);
    assert!(sample >= 0.0 && sample <= 1.0 + 1e-9);
}

#[test]
fn check_solver_is_deterministic()
{
    let (domain, game, config) = reference_setup(5);
    let solver = Solver::new(&domain, &game, config).unwrap();
    let a = solver.compute_value_function(1e-1).unwrap();
    let b = solver.compute_value_function(1e-1).unwrap();
    assert_eq!(a, b);
}

#[test]
fn check_full_sweep_matches_expectations()
{
    // Symmetry disabled: the parallel full-grid path must also converge,
    // pin terminal cells to 0 and stay inside the value range.
    let (mut domain, _, mut config) = reference_setup(3);
    domain.set_symmetric(false);
    let game = TagGame::new(domain.clone(), 2.0, 1.0, 8, None).unwrap();
    config.time_step = domain.width() / 2.0;

    let solver = Solver::new(&domain, &game, config).unwrap();
    let value = solver.compute_value_function(1e-2).unwrap();
    assert!(value.iterations().unwrap() < config.max_iterations);
    for flat in 0..value.len()
    {
        let index = value.from_array_index(flat);
        let v = value.value(&index);
        assert!(v >= 0.0 && v <= 1.0 + 1e-9, "cell {:?} = {}", index, v);
        if game.is_terminal_index(&index)
        {
            assert_eq!(v, 0.0);
        }
    }

    let a = solver.compute_value_function(1e-2).unwrap();
    assert_eq!(a, value);
}

#[test]
fn check_cell_value_sentinels_without_admissible_moves()
{
    // One heading and no standing still: a player on the far face can only
    // leave the domain, so the search sentinels survive.
    let (domain, _, mut config) = reference_setup(5);
    let game = TagGame::new(domain.clone(), 2.0, 1.0, 1, None).unwrap();
    config.control_resolution = 1;
    config.allow_standing_still = false;
    let solver = Solver::new(&domain, &game, config).unwrap();
    let current = ValueFunction::with_value(domain.clone(), 1.0);

    // Evader boxed in.
    assert_eq!(solver.cell_value(&current, &[0.0, 0.0, 2.0, 0.0]), f64::NEG_INFINITY);
    // Evader can move, pursuer has no reply.
    assert_eq!(solver.cell_value(&current, &[2.0, 0.0, 0.0, 0.0]), f64::INFINITY);
}

#[test]
fn check_reference_scenario_values()
{
    // Solved field for the 5-node [-2,2]^4 tag scenario (resolution 8,
    // Vp = 2, Ve = 1, step = width / 2) at tolerance 1e-1.
    let expected = [
        0.0, 0.0, 0.548982, 0.758593, 0.828536, 0.0, 0.0, 0.621726, 0.817027, 0.877604,
        0.662549, 0.666853, 0.748748, 0.881505, 0.930589, 0.871548, 0.886901, 0.912161,
        0.943614, 0.964081, 0.934109, 0.95462, 0.967783, 0.972028, 0.972572, 0.0, 0.0, 0.0,
        0.512795, 0.671657, 0.0, 0.0, 0.0, 0.598567, 0.746888, 0.570931, 0.577638, 0.630711,
        0.732895, 0.842416, 0.813235, 0.837222, 0.871092, 0.899737, 0.921564, 0.895358, 0.92682,
        0.944266, 0.948774, 0.948886, 0.393469, 0.0, 0.0, 0.0, 0.393469, 0.522364, 0.0, 0.0,
        0.0, 0.522364, 0.700087, 0.613456, 0.577638, 0.613456, 0.700087, 0.873785, 0.852343,
        0.832992, 0.852343, 0.873785, 0.917592, 0.917592, 0.910886, 0.917592, 0.917592,
        0.671657, 0.512795, 0.0, 0.0, 0.0, 0.746888, 0.598567, 0.0, 0.0, 0.0, 0.842416,
        0.732895, 0.630711, 0.577638, 0.570931, 0.921564, 0.899737, 0.871092, 0.837222,
        0.813235, 0.948886, 0.948774, 0.944266, 0.92682, 0.895358, 0.828536, 0.758593, 0.548982,
        0.0, 0.0, 0.877604, 0.817027, 0.621726, 0.0, 0.0, 0.930589, 0.881505, 0.748748,
        0.666853, 0.662549, 0.964081, 0.943614, 0.912161, 0.886901, 0.871548, 0.972572,
        0.972028, 0.967783, 0.95462, 0.934109, 0.0, 0.0, 0.548982, 0.740683, 0.790739, 0.0, 0.0,
        0.548982, 0.762018, 0.836322, 0.0, 0.0, 0.626824, 0.826226, 0.886439, 0.660631,
        0.677534, 0.762341, 0.883835, 0.912369, 0.833549, 0.868214, 0.899457, 0.914079,
        0.917004, 0.0, 0.0, 0.0, 0.512795, 0.632121, 0.0, 0.0, 0.0, 0.512795, 0.675802, 0.0,
        0.0, 0.0, 0.604317, 0.758648, 0.58517, 0.598676, 0.646184, 0.738691, 0.835095, 0.790376,
        0.824307, 0.85143, 0.862171, 0.862857, 0.393469, 0.0, 0.0, 0.0, 0.393469, 0.393469, 0.0,
        0.0, 0.0, 0.393469, 0.524722, 0.0, 0.0, 0.0, 0.524722, 0.698624, 0.625104, 0.595172,
        0.625104, 0.698624, 0.819193, 0.819193, 0.808034, 0.819193, 0.819193, 0.632121,
        0.512795, 0.0, 0.0, 0.0, 0.675802, 0.512795, 0.0, 0.0, 0.0, 0.758648, 0.604317, 0.0,
        0.0, 0.0, 0.835095, 0.738691, 0.646184, 0.598676, 0.58517, 0.862857, 0.862171, 0.85143,
        0.824307, 0.790376, 0.790739, 0.740683, 0.548982, 0.0, 0.0, 0.836322, 0.762018,
        0.548982, 0.0, 0.0, 0.886439, 0.826226, 0.626824, 0.0, 0.0, 0.912369, 0.883835,
        0.762341, 0.677534, 0.660631, 0.917004, 0.914079, 0.899457, 0.868214, 0.833549,
        0.393469, 0.516456, 0.663431, 0.791378, 0.819193, 0.0, 0.0, 0.591735, 0.780037,
        0.821041, 0.0, 0.0, 0.548982, 0.770922, 0.845649, 0.0, 0.0, 0.646184, 0.828251,
        0.861952, 0.690401, 0.737988, 0.803467, 0.848378, 0.862857, 0.393469, 0.393469,
        0.511154, 0.623345, 0.695297, 0.0, 0.0, 0.0, 0.56996, 0.695297, 0.0, 0.0, 0.0, 0.512795,
        0.690257, 0.0, 0.0, 0.0, 0.625104, 0.757364, 0.632121, 0.668667, 0.725501, 0.76014,
        0.768896, 0.519369, 0.493996, 0.393469, 0.493996, 0.519369, 0.493996, 0.0, 0.0, 0.0,
        0.493996, 0.393469, 0.0, 0.0, 0.0, 0.393469, 0.493996, 0.0, 0.0, 0.0, 0.493996,
        0.519369, 0.493996, 0.393469, 0.493996, 0.519369, 0.768896, 0.76014, 0.725501, 0.668667,
        0.632121, 0.757364, 0.625104, 0.0, 0.0, 0.0, 0.690257, 0.512795, 0.0, 0.0, 0.0,
        0.695297, 0.56996, 0.0, 0.0, 0.0, 0.695297, 0.623345, 0.511154, 0.393469, 0.393469,
        0.862857, 0.848378, 0.803467, 0.737988, 0.690401, 0.861952, 0.828251, 0.646184, 0.0,
        0.0, 0.845649, 0.770922, 0.548982, 0.0, 0.0, 0.821041, 0.780037, 0.591735, 0.0, 0.0,
        0.819193, 0.791378, 0.663431, 0.516456, 0.393469, 0.833549, 0.868214, 0.899457,
        0.914079, 0.917004, 0.660631, 0.677534, 0.762341, 0.883835, 0.912369, 0.0, 0.0,
        0.626824, 0.826226, 0.886439, 0.0, 0.0, 0.548982, 0.762018, 0.836322, 0.0, 0.0,
        0.548982, 0.740683, 0.790739, 0.790376, 0.824307, 0.85143, 0.862171, 0.862857, 0.58517,
        0.598676, 0.646184, 0.738691, 0.835095, 0.0, 0.0, 0.0, 0.604317, 0.758648, 0.0, 0.0,
        0.0, 0.512795, 0.675802, 0.0, 0.0, 0.0, 0.512795, 0.632121, 0.819193, 0.819193,
        0.808034, 0.819193, 0.819193, 0.698624, 0.625104, 0.595172, 0.625104, 0.698624,
        0.524722, 0.0, 0.0, 0.0, 0.524722, 0.393469, 0.0, 0.0, 0.0, 0.393469, 0.393469, 0.0,
        0.0, 0.0, 0.393469, 0.862857, 0.862171, 0.85143, 0.824307, 0.790376, 0.835095, 0.738691,
        0.646184, 0.598676, 0.58517, 0.758648, 0.604317, 0.0, 0.0, 0.0, 0.675802, 0.512795, 0.0,
        0.0, 0.0, 0.632121, 0.512795, 0.0, 0.0, 0.0, 0.917004, 0.914079, 0.899457, 0.868214,
        0.833549, 0.912369, 0.883835, 0.762341, 0.677534, 0.660631, 0.886439, 0.826226,
        0.626824, 0.0, 0.0, 0.836322, 0.762018, 0.548982, 0.0, 0.0, 0.790739, 0.740683,
        0.548982, 0.0, 0.0, 0.934109, 0.95462, 0.967783, 0.972028, 0.972572, 0.871548, 0.886901,
        0.912161, 0.943614, 0.964081, 0.662549, 0.666853, 0.748748, 0.881505, 0.930589, 0.0,
        0.0, 0.621726, 0.817027, 0.877604, 0.0, 0.0, 0.548982, 0.758593, 0.828536, 0.895358,
        0.92682, 0.944266, 0.948774, 0.948886, 0.813235, 0.837222, 0.871092, 0.899737, 0.921564,
        0.570931, 0.577638, 0.630711, 0.732895, 0.842416, 0.0, 0.0, 0.0, 0.598567, 0.746888,
        0.0, 0.0, 0.0, 0.512795, 0.671657, 0.917592, 0.917592, 0.910886, 0.917592, 0.917592,
        0.873785, 0.852343, 0.832992, 0.852343, 0.873785, 0.700087, 0.613456, 0.577638,
        0.613456, 0.700087, 0.522364, 0.0, 0.0, 0.0, 0.522364, 0.393469, 0.0, 0.0, 0.0,
        0.393469, 0.948886, 0.948774, 0.944266, 0.92682, 0.895358, 0.921564, 0.899737, 0.871092,
        0.837222, 0.813235, 0.842416, 0.732895, 0.630711, 0.577638, 0.570931, 0.746888,
        0.598567, 0.0, 0.0, 0.0, 0.671657, 0.512795, 0.0, 0.0, 0.0, 0.972572, 0.972028,
        0.967783, 0.95462, 0.934109, 0.964081, 0.943614, 0.912161, 0.886901, 0.871548, 0.930589,
        0.881505, 0.748748, 0.666853, 0.662549, 0.877604, 0.817027, 0.621726, 0.0, 0.0,
        0.828536, 0.758593, 0.548982, 0.0, 0.0,
    ];

    let (domain, game, config) = reference_setup(5);
    let solver = Solver::new(&domain, &game, config).unwrap();
    let value = solver.compute_value_function(1e-1).unwrap();

    assert_eq!(value.len(), expected.len());
    for (flat, (&actual, &want)) in value.values().iter().zip(expected.iter()).enumerate()
    {
        assert!(
            (actual - want).abs() <= 1e-1,
            "cell {:?}: {} vs {}",
            value.from_array_index(flat),
            actual,
            want
        );
    }
}
