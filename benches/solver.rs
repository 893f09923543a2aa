use criterion::{criterion_group, criterion_main, Criterion};
use pegrust::{domain::Domain, errors::PegError, game::TagGame, solver::{Solver, SolverConfig}, value_function::ValueFunction};

fn build_tag_setup() -> Result<(Domain, TagGame, SolverConfig), PegError>
{
    // 5 nodes per dimension, faster pursuer.
    let domain = Domain::new(-2.0, 2.0, 5, 4)?;
    let game = TagGame::new(domain.clone(), 2.0, 1.0, 8, None)?;
    let config = SolverConfig {
        time_step: domain.width() / 2.0,
        control_resolution: 8,
        allow_standing_still: true,
        max_iterations: 150,
    };
    Ok((domain, game, config))
}

fn solve_tag(domain: &Domain, game: &TagGame, config: SolverConfig) -> Result<ValueFunction, PegError>
{
    let solver = Solver::new(domain, game, config)?;
    solver.compute_value_function(1e-1)
}

fn run_symmetric(c: &mut Criterion)
{
    let (domain, game, config) = build_tag_setup().unwrap();
    c.bench_function("tag_symmetric", |b| b.iter(|| solve_tag(&domain, &game, config).unwrap()));
}

fn run_full_sweep(c: &mut Criterion)
{
    let (mut domain, _, config) = build_tag_setup().unwrap();
    domain.set_symmetric(false);
    let game = TagGame::new(domain.clone(), 2.0, 1.0, 8, None).unwrap();
    c.bench_function("tag_full_sweep", |b| b.iter(|| solve_tag(&domain, &game, config).unwrap()));
}

criterion_group!(benches, run_symmetric, run_full_sweep);
criterion_main!(benches);
