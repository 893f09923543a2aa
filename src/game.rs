use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::errors::PegError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Player
{
    Pursuer,
    Evader,
}

///
/// A discretized heading choice. `1..=resolution` index equally spaced
/// headings on the full circle; `0` means standing still.
///
pub type Control = u32;

///
/// One-step dynamics and the capture condition of a pursuit-evasion game.
/// The solver only relies on this contract; it never looks inside the
/// kinematics.
///
pub trait Game: Sync
{
    ///
    /// Applies both players' controls for `step_size` time and writes the
    /// resulting state to `out`. Control 0 freezes that player. No
    /// feasibility check is performed on the result.
    ///
    fn step(&self, x: &[f64], pursuer: Control, evader: Control, step_size: f64, out: &mut [f64]);

    ///
    /// Capture test on a continuous state.
    ///
    fn is_terminal(&self, x: &[f64]) -> bool;

    ///
    /// Capture test on a grid index, used by the solver sweep.
    ///
    fn is_terminal_index(&self, index: &[usize]) -> bool;
}

///
/// Classic tag in the euclidian plane: both players move with simple motion
/// (constant speed, free heading) and the pursuer captures by closing within
/// the capture radius. State layout is `[xp, yp, xe, ye]`.
///
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TagGame
{
    domain: Domain,
    pursuer_velocity: f64,
    evader_velocity: f64,
    control_resolution: u32,
    capture_radius: f64,
}

impl TagGame
{
    ///
    /// Creates a tag game over a 4-dimensional domain. `capture_radius`
    /// defaults to one cell width, which makes the grid capture rule "the
    /// players' grid indices differ by at most one per axis".
    ///
    pub fn new(
        domain: Domain,
        pursuer_velocity: f64,
        evader_velocity: f64,
        control_resolution: u32,
        capture_radius: Option<f64>,
    ) -> Result<Self, PegError>
    {
        if domain.dim() != 4
        {
            return Err(PegError::DimensionMismatch);
        }
        if pursuer_velocity < 0.0 || evader_velocity < 0.0
        {
            return Err(PegError::InvalidVelocity);
        }
        if control_resolution == 0
        {
            return Err(PegError::InvalidControlResolution);
        }
        let capture_radius = capture_radius.unwrap_or(domain.width());
        Ok(Self { domain, pursuer_velocity, evader_velocity, control_resolution, capture_radius })
    }

    #[inline(always)]
    pub fn domain(&self) -> &Domain
    {
        &self.domain
    }

    pub fn velocity(&self, player: Player) -> f64
    {
        match player
        {
            Player::Pursuer => self.pursuer_velocity,
            Player::Evader => self.evader_velocity,
        }
    }

    #[inline(always)]
    pub fn control_resolution(&self) -> u32
    {
        self.control_resolution
    }

    #[inline(always)]
    pub fn capture_radius(&self) -> f64
    {
        self.capture_radius
    }

    #[inline]
    fn heading(&self, control: Control) -> f64
    {
        TAU * control as f64 / self.control_resolution as f64
    }
}

impl Game for TagGame
{
    fn step(&self, x: &[f64], pursuer: Control, evader: Control, step_size: f64, out: &mut [f64])
    {
        if pursuer != 0
        {
            let dir = self.heading(pursuer);
            out[0] = x[0] + step_size * self.pursuer_velocity * dir.cos();
            out[1] = x[1] + step_size * self.pursuer_velocity * dir.sin();
        }
        else
        {
            out[0] = x[0];
            out[1] = x[1];
        }

        if evader != 0
        {
            let dir = self.heading(evader);
            out[2] = x[2] + step_size * self.evader_velocity * dir.cos();
            out[3] = x[3] + step_size * self.evader_velocity * dir.sin();
        }
        else
        {
            out[2] = x[2];
            out[3] = x[3];
        }
    }

    fn is_terminal(&self, x: &[f64]) -> bool
    {
        (x[0] - x[2]).abs() <= self.capture_radius && (x[1] - x[3]).abs() <= self.capture_radius
    }

    fn is_terminal_index(&self, index: &[usize]) -> bool
    {
        let cells = (self.capture_radius / self.domain.width()).round() as i64;
        (index[0] as i64 - index[2] as i64).abs() <= cells
            && (index[1] as i64 - index[3] as i64).abs() <= cells
    }
}

#[cfg(test)]
fn test_game() -> TagGame
{
    let domain = Domain::new(-2.0, 2.0, 5, 4).unwrap();
    TagGame::new(domain, 2.0, 1.0, 4, None).unwrap()
}

#[test]
fn check_new_rejects_bad_parameters()
{
    let domain = Domain::new(-2.0, 2.0, 5, 4).unwrap();
    assert_eq!(
        TagGame::new(Domain::new(0.0, 1.0, 3, 2).unwrap(), 1.0, 1.0, 8, None).unwrap_err(),
        PegError::DimensionMismatch
    );
    assert_eq!(
        TagGame::new(domain.clone(), -1.0, 1.0, 8, None).unwrap_err(),
        PegError::InvalidVelocity
    );
    assert_eq!(
        TagGame::new(domain, 1.0, 1.0, 0, None).unwrap_err(),
        PegError::InvalidControlResolution
    );
}

#[test]
fn check_step_moves_along_headings()
{
    let game = test_game();
    let x = [0.0, 0.0, 0.0, 0.0];
    let mut out = [0.0; 4];

    // Pursuer control 1 of 4 is a quarter turn: straight up at speed 2.
    game.step(&x, 1, 0, 0.5, &mut out);
    assert!(crate::utilities::states_equal(&out, &[0.0, 1.0, 0.0, 0.0], 1e-9));

    // Evader control 4 of 4 is the full turn: along +x at speed 1.
    game.step(&x, 0, 4, 0.5, &mut out);
    assert!(crate::utilities::states_equal(&out, &[0.0, 0.0, 0.5, 0.0], 1e-9));

    // Both standing still.
    game.step(&[1.0, -1.0, 0.5, 0.25], 0, 0, 0.5, &mut out);
    assert!(crate::utilities::states_equal(&out, &[1.0, -1.0, 0.5, 0.25], 0.0));
}

#[test]
fn check_terminal_state()
{
    // Cell width 1, default capture radius 1.
    let game = test_game();
    assert!(game.is_terminal(&[0.0, 0.0, 0.9, 0.9]));
    assert!(game.is_terminal(&[0.0, 0.0, -1.0, 1.0]));
    assert!(!game.is_terminal(&[0.0, 0.0, 1.1, 0.0]));
    assert!(!game.is_terminal(&[-2.0, -2.0, 2.0, 2.0]));
}

#[test]
fn check_terminal_index()
{
    let game = test_game();
    assert!(game.is_terminal_index(&[0, 0, 0, 0]));
    assert!(game.is_terminal_index(&[0, 0, 1, 1]));
    assert!(game.is_terminal_index(&[3, 2, 2, 1]));
    assert!(!game.is_terminal_index(&[0, 0, 2, 1]));
    assert!(!game.is_terminal_index(&[0, 0, 1, 2]));
    assert!(!game.is_terminal_index(&[4, 4, 0, 0]));
}

#[test]
fn check_custom_capture_radius()
{
    let domain = Domain::new(-2.0, 2.0, 5, 4).unwrap();
    let game = TagGame::new(domain, 2.0, 1.0, 8, Some(2.0)).unwrap();
    assert!(game.is_terminal(&[0.0, 0.0, 1.9, 1.9]));
    assert!(!game.is_terminal(&[0.0, 0.0, 2.1, 0.0]));
    assert!(game.is_terminal_index(&[0, 0, 2, 2]));
    assert!(!game.is_terminal_index(&[0, 0, 3, 0]));
}
