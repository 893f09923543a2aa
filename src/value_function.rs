use serde::{Deserialize, Serialize};

use crate::domain::Domain;

///
/// A dense scalar field over the grid of a `Domain`, addressed through a
/// mixed-radix flat index (radix `segments + 1` per dimension, dimension 0
/// most significant). Cells that were never written hold NaN, the
/// "undefined" value: it is distinct from every number and deliberately
/// poisons any interpolation touching an unset cell.
///
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValueFunction
{
    domain: Domain,
    values: Vec<f64>,
    iterations: Option<u32>,
}

impl ValueFunction
{
    ///
    /// Creates a value function with every cell undefined.
    ///
    pub fn new(domain: Domain) -> Self
    {
        Self::with_value(domain, f64::NAN)
    }

    ///
    /// Creates a value function with every cell set to `value`.
    ///
    pub fn with_value(domain: Domain, value: f64) -> Self
    {
        let size = (domain.segments() + 1).pow(domain.dim() as u32);
        Self { domain, values: vec![value; size], iterations: None }
    }

    #[inline(always)]
    pub fn domain(&self) -> &Domain
    {
        &self.domain
    }

    #[inline(always)]
    pub fn len(&self) -> usize
    {
        self.values.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool
    {
        self.values.is_empty()
    }

    #[inline(always)]
    pub fn values(&self) -> &[f64]
    {
        &self.values
    }

    #[inline(always)]
    pub(crate) fn values_mut(&mut self) -> &mut [f64]
    {
        &mut self.values
    }

    ///
    /// Number of sweeps the solver used to produce this field. `None` for a
    /// hand-built function. A count equal to the solver's iteration cap
    /// signals possible non-convergence.
    ///
    #[inline(always)]
    pub fn iterations(&self) -> Option<u32>
    {
        self.iterations
    }

    pub(crate) fn set_iterations(&mut self, iterations: u32)
    {
        self.iterations = Some(iterations);
    }

    ///
    /// Flattens a grid index. Indices shorter than the domain dimension are
    /// treated as having zero in the missing high-order dimensions.
    ///
    pub fn to_array_index(&self, index: &[usize]) -> usize
    {
        let radix = self.domain.segments() + 1;
        let mut ret = 0;
        let mut multiple = 1;
        for &i in index.iter().rev()
        {
            ret += i * multiple;
            multiple *= radix;
        }
        ret
    }

    ///
    /// Inverse of `to_array_index`, always full length.
    ///
    pub fn from_array_index(&self, flat: usize) -> Vec<usize>
    {
        let radix = self.domain.segments() + 1;
        let mut rest = flat;
        let mut index = vec![0usize; self.domain.dim()];
        for k in (0..self.domain.dim()).rev()
        {
            index[k] = rest % radix;
            rest /= radix;
        }
        index
    }

    #[inline]
    pub fn value(&self, index: &[usize]) -> f64
    {
        self.values[self.to_array_index(index)]
    }

    #[inline]
    pub fn set_value(&mut self, index: &[usize], value: f64)
    {
        let i = self.to_array_index(index);
        self.values[i] = value;
    }

    ///
    /// Multilinear interpolation of the field at a feasible point `x`.
    /// Evaluating a point whose interpolation cell touches any undefined
    /// vertex yields NaN.
    ///
    pub fn eval(&self, x: &[f64]) -> f64
    {
        let lc = self.domain.convex_decomposition(x);
        let mut ret = 0.0;
        for term in lc.iter()
        {
            if let Some(index) = &term.index
            {
                ret += term.factor * self.value(index);
            }
        }
        ret
    }

    ///
    /// Interpolation followed by the time transform `T(v) = -ln(1 - v)`,
    /// turning the bounded value into an expected time to capture.
    ///
    pub fn eval_time(&self, x: &[f64]) -> f64
    {
        -(1.0 - self.eval(x)).ln()
    }
}

impl PartialEq for ValueFunction
{
    ///
    /// Equality over the same domain with element-wise agreement of the
    /// dense arrays. Two undefined cells compare equal; an undefined cell
    /// never equals a number.
    ///
    fn eq(&self, other: &Self) -> bool {
        self.domain == other.domain
            && self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(other.values.iter())
                .all(|(a, b)| a == b || (a.is_nan() && b.is_nan()))
    }
}

#[test]
fn check_new_is_undefined_everywhere()
{
    let domain = Domain::new(0.0, 1.0, 3, 4).unwrap();
    let v = ValueFunction::new(domain);
    assert_eq!(v.len(), 81);
    for flat in 0..v.len()
    {
        let index = v.from_array_index(flat);
        assert!(v.value(&index).is_nan());
    }
}

#[test]
fn check_set_value_leaves_other_cells_alone()
{
    let n = 10;
    let domain = Domain::new(0.0, 1.0, n + 1, 4).unwrap();
    let mut v = ValueFunction::new(domain);

    let touched = [
        [0, 0, 0, 0],
        [0, 0, 5, 8],
        [2, 5, 10, 0],
        [4, 10, 8, 10],
        [10, 1, 3, 1],
        [10, 10, 10, 10],
    ];
    for (i, index) in touched.iter().enumerate()
    {
        v.set_value(index, i as f64);
    }

    for flat in 0..v.len()
    {
        let index = v.from_array_index(flat);
        let value = v.value(&index);
        match touched.iter().position(|t| t.to_vec() == index)
        {
            Some(i) => assert_eq!(value, i as f64),
            None => assert!(value.is_nan(), "cell {:?} was altered", index),
        }
    }
}

#[test]
fn check_to_array_index_is_sequential()
{
    let n = 11;
    let domain = Domain::new(0.0, 1.0, n + 1, 4).unwrap();
    let v = ValueFunction::new(domain);

    let mut counter = 0;
    for i0 in 0..=n
    {
        for i1 in 0..=n
        {
            for i2 in 0..=n
            {
                for i3 in 0..=n
                {
                    let index = [i0, i1, i2, i3];
                    assert_eq!(v.to_array_index(&index), counter);
                    assert_eq!(v.from_array_index(counter), index.to_vec());
                    counter += 1;
                }
            }
        }
    }
    assert_eq!(counter, v.len());
}

#[test]
fn check_to_array_index_partial()
{
    let domain = Domain::new(0.0, 1.0, 12, 4).unwrap();
    let v = ValueFunction::new(domain);
    assert_eq!(v.to_array_index(&[]), 0);
    assert_eq!(v.to_array_index(&[3]), 3);
    assert_eq!(v.to_array_index(&[1, 2]), 14);
    assert_eq!(v.to_array_index(&[0, 0, 1, 2]), 14);
}

#[test]
fn check_eval()
{
    let domain = Domain::new(0.0, 1.0, 11, 4).unwrap();
    let mut v = ValueFunction::with_value(domain, 0.0);

    assert!(v.eval(&[0.5, 0.5, 0.5, 0.5]).abs() < 1e-9);

    v.set_value(&[0, 0, 0, 0], 1.0);
    assert!((v.eval(&[0.0, 0.0, 0.0, 0.0]) - 1.0).abs() < 1e-9);
    assert!(v.eval(&[0.5, 0.5, 0.5, 0.5]).abs() < 1e-9);
    // 1% off the origin in two dimensions: weight 0.9 * 0.9 on the hot cell.
    assert!((v.eval(&[0.01, 0.01, 0.0, 0.0]) - 0.81).abs() < 1e-9);
}

#[test]
fn check_eval_at_domain_max()
{
    // 50 nodes per dimension puts the upper face just past the last grid
    // line in doubles; evaluation there must stay on the grid.
    let domain = Domain::new(-2.0, 2.0, 50, 4).unwrap();
    let v = ValueFunction::with_value(domain, 0.25);
    assert!((v.eval(&[2.0; 4]) - 0.25).abs() < 1e-9);
}

#[test]
fn check_eval_propagates_undefined_cells()
{
    let domain = Domain::new(0.0, 1.0, 11, 4).unwrap();
    let mut v = ValueFunction::new(domain);
    v.set_value(&[0, 0, 0, 0], 1.0);
    // The cell around this point touches unset vertices.
    assert!(v.eval(&[0.05, 0.0, 0.0, 0.0]).is_nan());
    // On the hot grid node itself only the set vertex contributes.
    assert!((v.eval(&[0.0, 0.0, 0.0, 0.0]) - 1.0).abs() < 1e-9);
}

#[test]
fn check_eval_time()
{
    let domain = Domain::new(0.0, 1.0, 11, 4).unwrap();
    let v = ValueFunction::with_value(domain.clone(), 0.0);
    assert!(v.eval_time(&[0.5; 4]).abs() < 1e-9);
    let v = ValueFunction::with_value(domain, 0.5);
    assert!((v.eval_time(&[0.5; 4]) - std::f64::consts::LN_2).abs() < 1e-9);
}

#[test]
fn check_equality_treats_undefined_as_distinct()
{
    let domain = Domain::new(0.0, 1.0, 3, 2).unwrap();
    let a = ValueFunction::new(domain.clone());
    let b = ValueFunction::new(domain.clone());
    assert_eq!(a, b);

    let mut c = ValueFunction::new(domain.clone());
    c.set_value(&[0, 0], 0.0);
    assert_ne!(a, c);

    let other = Domain::new(0.0, 2.0, 3, 2).unwrap();
    assert_ne!(a, ValueFunction::new(other));
}
