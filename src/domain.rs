use serde::{Deserialize, Serialize};

use crate::errors::PegError;
use crate::game::Player;
use crate::linear_combination::LinearCombination;

///
/// A bounded hyper-cube state space `[min, max]^dim` discretized by a
/// regular grid with `segments + 1` nodes per dimension. Maps between
/// continuous states and grid indices and decomposes feasible points into
/// convex combinations of the vertices of their containing cell.
///
/// The state is laid out player-wise: the pursuer owns the first `dim / 2`
/// coordinates, the evader the remaining ones.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Domain
{
    min: f64,
    max: f64,
    segments: usize,
    dim: usize,
    symmetric: bool,
}

impl Domain
{
    ///
    /// Creates a domain with `nodes` grid nodes per dimension. A domain
    /// needs at least two nodes per dimension and `min < max`.
    ///
    pub fn new(min: f64, max: f64, nodes: usize, dim: usize) -> Result<Self, PegError>
    {
        if !(min < max) || nodes < 2
        {
            return Err(PegError::DegenerateDomain);
        }
        if dim == 0
        {
            return Err(PegError::DimensionMismatch);
        }
        Ok(Self { min, max, segments: nodes - 1, dim, symmetric: true })
    }

    #[inline(always)]
    pub fn min(&self) -> f64
    {
        self.min
    }

    #[inline(always)]
    pub fn max(&self) -> f64
    {
        self.max
    }

    #[inline(always)]
    pub fn dim(&self) -> usize
    {
        self.dim
    }

    #[inline(always)]
    pub fn segments(&self) -> usize
    {
        self.segments
    }

    ///
    /// Distance between two neighboring grid nodes along one dimension.
    ///
    #[inline(always)]
    pub fn width(&self) -> f64
    {
        (self.max - self.min) / self.segments as f64
    }

    ///
    /// Whether the solver may exploit the reflection symmetries of the
    /// hyper-cube. True by default; disable for dynamics that are not
    /// reflection-symmetric over this domain.
    ///
    #[inline(always)]
    pub fn symmetric(&self) -> bool
    {
        self.symmetric
    }

    pub fn set_symmetric(&mut self, symmetric: bool)
    {
        self.symmetric = symmetric;
    }

    ///
    /// The inclusive upper bound of valid grid indices, `segments` in every
    /// dimension.
    ///
    pub fn maximal_grid_index(&self) -> Vec<usize>
    {
        vec![self.segments; self.dim]
    }

    ///
    /// Rounds each coordinate to the nearest grid line. No feasibility check
    /// is performed; the result is unspecified for infeasible states.
    ///
    pub fn grid_index(&self, x: &[f64]) -> Vec<usize>
    {
        let width = self.width();
        x.iter().map(|&c| ((c - self.min) / width).round() as usize).collect()
    }

    ///
    /// The grid node located at `index`. Indices are not checked; an index
    /// beyond `maximal_grid_index` yields a point outside the domain.
    ///
    pub fn point(&self, index: &[usize]) -> Vec<f64>
    {
        let width = self.width();
        index.iter().map(|&i| self.min + i as f64 * width).collect()
    }

    pub fn is_feasible(&self, x: &[f64]) -> bool
    {
        x.len() == self.dim && x.iter().all(|&c| c >= self.min && c <= self.max)
    }

    pub fn is_feasible_index(&self, index: &[usize]) -> bool
    {
        index.len() == self.dim && index.iter().all(|&i| i <= self.segments)
    }

    ///
    /// Feasibility restricted to the coordinates owned by one player. Used
    /// for control admissibility, where each player only has to keep his own
    /// position inside the domain.
    ///
    pub fn is_feasible_for(&self, x: &[f64], player: Player) -> bool
    {
        let half = self.dim / 2;
        let range = match player
        {
            Player::Pursuer => 0..half,
            Player::Evader => half..self.dim,
        };
        x.len() == self.dim && x[range].iter().all(|&c| c >= self.min && c <= self.max)
    }

    ///
    /// True if `x` is feasible and lies within 1% of the cell width of a
    /// grid line in every dimension.
    ///
    pub fn is_grid_point(&self, x: &[f64]) -> bool
    {
        if x.len() != self.dim
        {
            return false;
        }
        let width = self.width();
        for &c in x
        {
            if c < self.min || c > self.max
            {
                return false;
            }
            let cell = (c - self.min) / width;
            if (cell - cell.round()).abs() > 0.01
            {
                return false;
            }
        }
        true
    }

    // Clamped to the last grid line: for some widths `(max - min) / width`
    // rounds past `segments` in doubles, and a corner beyond the grid would
    // not be a domain vertex.
    #[inline]
    fn floor_to_cell_index(&self, c: f64) -> usize
    {
        (((c - self.min) / self.width()).floor() as usize).min(self.segments)
    }

    #[inline]
    fn ceil_to_cell_index(&self, c: f64) -> usize
    {
        (((c - self.min) / self.width()).ceil() as usize).min(self.segments)
    }

    ///
    /// Decomposes a feasible point into a packed convex combination of the
    /// vertices of its containing grid cell, with the standard multilinear
    /// interpolation weights.
    ///
    /// Corners are enumerated by bitmask: bit `dim - 1 - k` selects the
    /// ceil grid line in dimension `k` (so the all-floor corner comes
    /// first). Corner masks selecting the ceil line of a dimension that is
    /// already on a grid line would duplicate the floor corner and are
    /// skipped. The result is unspecified for infeasible input.
    ///
    pub fn convex_decomposition(&self, x: &[f64]) -> LinearCombination
    {
        let d = self.dim;
        let width = self.width();

        let mut floor_index = vec![0usize; d];
        let mut ceil_index = vec![0usize; d];
        let mut lambda = vec![0.0; d];
        for k in 0..d
        {
            floor_index[k] = self.floor_to_cell_index(x[k]);
            ceil_index[k] = self.ceil_to_cell_index(x[k]);
            let floor_point = self.min + floor_index[k] as f64 * width;
            lambda[k] = 1.0 - (x[k] - floor_point) / width;
        }

        let mut ret = LinearCombination::with_capacity(1 << d);
        'corner: for mask in 0..(1usize << d)
        {
            let mut factor = 1.0;
            let mut point = vec![0.0; d];
            let mut index = vec![0usize; d];
            for k in 0..d
            {
                let ceil_side = mask & (1 << (d - 1 - k)) != 0;
                if ceil_side && floor_index[k] == ceil_index[k]
                {
                    // Duplicate of the floor corner, weight would be 0.
                    continue 'corner;
                }
                let i = if ceil_side { ceil_index[k] } else { floor_index[k] };
                factor *= if ceil_side { 1.0 - lambda[k] } else { lambda[k] };
                point[k] = self.min + i as f64 * width;
                index[k] = i;
            }
            ret.push(factor, Some(point), Some(index));
        }
        ret.pack();
        ret
    }
}

#[test]
fn check_new_rejects_degenerate_domains()
{
    assert_eq!(Domain::new(1.0, 1.0, 5, 4).unwrap_err(), PegError::DegenerateDomain);
    assert_eq!(Domain::new(2.0, -2.0, 5, 4).unwrap_err(), PegError::DegenerateDomain);
    assert_eq!(Domain::new(0.0, 1.0, 1, 4).unwrap_err(), PegError::DegenerateDomain);
    assert_eq!(Domain::new(0.0, 1.0, 5, 0).unwrap_err(), PegError::DimensionMismatch);
    assert!(Domain::new(0.0, 1.0, 2, 1).is_ok());
}

#[test]
fn check_maximal_grid_index()
{
    for nodes in [10usize, 20, 2]
    {
        let domain = Domain::new(0.0, 1.0, nodes, 4).unwrap();
        assert_eq!(domain.maximal_grid_index(), vec![nodes - 1; 4]);
    }
}

#[test]
fn check_grid_index()
{
    let domain = Domain::new(-1.0, 1.0, 21, 4).unwrap();
    let points = [
        [0.0, 0.0, 0.0, 0.0],
        [0.0, 0.0, 0.1, 0.0],
        [0.0, 0.0, 0.1, 0.1],
        [1.0, 0.5, 0.0, 1.0],
        [-1.0, -1.0, -0.5, -0.2],
        [-1.0, -1.0, -1.0, -1.0],
    ];
    let expected = [
        [10, 10, 10, 10],
        [10, 10, 11, 10],
        [10, 10, 11, 11],
        [20, 15, 10, 20],
        [0, 0, 5, 8],
        [0, 0, 0, 0],
    ];
    for (point, index) in points.iter().zip(expected.iter())
    {
        assert_eq!(domain.grid_index(point), index.to_vec());
    }
}

#[test]
fn check_point()
{
    let domain = Domain::new(0.0, 1.0, 11, 4).unwrap();
    assert!(crate::utilities::states_equal(&domain.point(&[0, 0, 0, 0]), &[0.0; 4], 0.0));
    assert!(crate::utilities::states_equal(
        &domain.point(&[5, 4, 3, 0]),
        &[0.5, 0.4, 0.3, 0.0],
        1e-9
    ));

    let domain = Domain::new(-1.0, 1.0, 11, 4).unwrap();
    assert!(crate::utilities::states_equal(&domain.point(&[0, 0, 0, 0]), &[-1.0; 4], 0.0));
    assert!(crate::utilities::states_equal(
        &domain.point(&[1, 1, 1, 0]),
        &[-0.8, -0.8, -0.8, -1.0],
        1e-9
    ));
}

#[test]
fn check_is_feasible()
{
    let domain = Domain::new(-1.0, 1.0, 21, 4).unwrap();
    assert!(domain.is_feasible(&[0.0, 0.0, 0.0, 0.0]));
    assert!(domain.is_feasible(&[-1.0, 1.0, -1.0, 1.0]));
    assert!(!domain.is_feasible(&[-1.1, 0.0, 0.0, 0.0]));
    assert!(!domain.is_feasible(&[0.0, 0.0, 0.0, 1.1]));
    assert!(!domain.is_feasible(&[0.0, 0.0, 0.0]));

    assert!(domain.is_feasible_index(&[0, 0, 0, 0]));
    assert!(domain.is_feasible_index(&[20, 20, 20, 20]));
    assert!(!domain.is_feasible_index(&[21, 0, 0, 0]));
    assert!(!domain.is_feasible_index(&[0, 0, 0]));
}

#[test]
fn check_is_feasible_for_player()
{
    let domain = Domain::new(-1.0, 1.0, 21, 4).unwrap();
    // Pursuer outside, evader inside.
    let x = [-1.5, 0.0, 0.5, 0.5];
    assert!(!domain.is_feasible_for(&x, Player::Pursuer));
    assert!(domain.is_feasible_for(&x, Player::Evader));
    // Evader outside, pursuer inside.
    let y = [0.0, 0.0, 0.5, 1.5];
    assert!(domain.is_feasible_for(&y, Player::Pursuer));
    assert!(!domain.is_feasible_for(&y, Player::Evader));
}

#[test]
fn check_is_grid_point()
{
    let domain = Domain::new(0.0, 1.0, 11, 4).unwrap();
    let on_grid = [
        [0.0001, 0.0, 0.0, 0.0],
        [0.0, 0.0, 0.1, 0.0],
        [0.0, 0.0001, 0.1, 0.1],
        [0.0, 0.5, 1.0, 1.0],
        [1.0, 0.99999, 1.0, 1.0],
    ];
    let off_grid = [
        [0.02, 0.0, 0.0, 0.0],
        [0.0, 0.0, -0.1, 0.0],
        [0.0, 0.0, 0.1, 0.87],
        [0.0, 0.55, 1.0, 1.0],
        [1.0, 1.0, 1.1, 1.0],
    ];
    for point in &on_grid
    {
        assert!(domain.is_grid_point(point), "on grid {:?}", point);
    }
    for point in &off_grid
    {
        assert!(!domain.is_grid_point(point), "off grid {:?}", point);
    }
}

#[test]
fn check_convex_decomposition_reproduces_point()
{
    let domain = Domain::new(-1.0, 1.0, 2, 4).unwrap();
    let points = [
        [0.0, 0.0, 0.0, 0.0],
        [0.1, 0.9, -0.5, -1.0],
        [1.0, 1.0, 1.0, 1.0],
        [-1.0, -1.0, -1.0, -1.0],
        [0.5, 0.5, 0.5, 0.5],
    ];
    for point in &points
    {
        let lc = domain.convex_decomposition(point);
        assert!(
            crate::utilities::states_equal(&lc.eval(), point, 1e-9),
            "decomposition of {:?}",
            point
        );
        assert!((lc.factor_sum() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn check_convex_decomposition_on_grid_point()
{
    let domain = Domain::new(-2.0, 2.0, 5, 4).unwrap();
    let lc = domain.convex_decomposition(&[1.0, -2.0, 0.0, 2.0]);
    assert_eq!(lc.len(), 1);
    assert!((lc.terms()[0].factor - 1.0).abs() < 1e-12);
    assert_eq!(lc.terms()[0].index.as_ref().unwrap(), &vec![3, 0, 2, 4]);
}

#[test]
fn check_convex_decomposition_indices_match_corners()
{
    let domain = Domain::new(-2.0, 2.0, 10, 4).unwrap();
    let lc = domain.convex_decomposition(&[0.1, 0.9, -0.5, -1.0]);
    assert_eq!(lc.len(), 16);
    for term in lc.iter()
    {
        let corner = term.point.as_ref().unwrap();
        let index = term.index.as_ref().unwrap();
        assert_eq!(&domain.grid_index(corner), index);
    }
}

#[test]
fn check_convex_decomposition_clamps_boundary_cells()
{
    // 50 nodes: (max - min) / width rounds just above the last grid line,
    // so the ceil corner at `max` must be clamped onto the grid.
    let domain = Domain::new(-2.0, 2.0, 50, 4).unwrap();
    let x = [2.0; 4];
    let lc = domain.convex_decomposition(&x);
    for term in lc.iter()
    {
        assert!(domain.is_feasible_index(term.index.as_ref().unwrap()));
    }
    assert!((lc.factor_sum() - 1.0).abs() < 1e-9);
    assert!(crate::utilities::states_equal(&lc.eval(), &x, 1e-9));
}

#[test]
fn check_convex_decomposition_interior_cell_weights()
{
    // One dimension, midpoint of a cell: two corners with weight 1/2.
    let domain = Domain::new(0.0, 1.0, 3, 1).unwrap();
    let lc = domain.convex_decomposition(&[0.25]);
    assert_eq!(lc.len(), 2);
    assert!((lc.terms()[0].factor - 0.5).abs() < 1e-12);
    assert!((lc.terms()[1].factor - 0.5).abs() < 1e-12);
    assert_eq!(lc.terms()[0].index.as_ref().unwrap(), &vec![0]);
    assert_eq!(lc.terms()[1].index.as_ref().unwrap(), &vec![1]);
}
