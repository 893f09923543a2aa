//! A value-iteration solver for discretized pursuit-evasion games on a
//! uniform hyper-cube grid.
//!
//! The solver computes the discounted value `v = 1 - exp(-T)` of the
//! time-to-capture `T` for the Isaacs minimax game: at every grid node the
//! evader picks the heading maximizing the value the pursuer can push it
//! down to one time step later. Off-grid states are handled by multilinear
//! interpolation.
//!
//! ```
//! use pegrust::domain::Domain;
//! use pegrust::game::TagGame;
//! use pegrust::solver::{Solver, SolverConfig};
//!
//! let domain = Domain::new(-2.0, 2.0, 5, 4).unwrap();
//! let game = TagGame::new(domain.clone(), 2.0, 1.0, 8, None).unwrap();
//! let config = SolverConfig {
//!     time_step: domain.width() / 2.0,
//!     control_resolution: 8,
//!     allow_standing_still: true,
//!     max_iterations: 150,
//! };
//! let solver = Solver::new(&domain, &game, config).unwrap();
//! let value = solver.compute_value_function(1e-1).unwrap();
//! assert!(value.iterations().unwrap() < 150);
//! assert!(value.eval(&[0.0, 0.0, 0.0, 0.0]) >= 0.0);
//! ```

pub mod domain;
pub mod errors;
pub mod game;
pub mod linear_combination;
pub mod solver;
pub mod utilities;
pub mod value_function;

pub use domain::Domain;
pub use errors::PegError;
pub use game::{Control, Game, Player, TagGame};
pub use linear_combination::{LinearCombination, Term};
pub use solver::{Solver, SolverConfig};
pub use value_function::ValueFunction;
