use serde::{Deserialize, Serialize};

///
/// One weighted corner of a convex decomposition. A `None` point marks an
/// entry that was discarded while building the decomposition (e.g. a
/// duplicate corner on a grid line); `pack` removes such entries.
///
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Term
{
    pub factor: f64,
    pub point: Option<Vec<f64>>,
    pub index: Option<Vec<usize>>,
}

///
/// A list of (factor, point) pairs representing a convex combination of grid
/// vertices. Produced by `Domain::convex_decomposition`, consumed by
/// `ValueFunction::eval`.
///
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LinearCombination
{
    terms: Vec<Term>,
}

impl LinearCombination
{
    pub fn new() -> Self
    {
        Self { terms: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self
    {
        Self { terms: Vec::with_capacity(capacity) }
    }

    pub fn push(&mut self, factor: f64, point: Option<Vec<f64>>, index: Option<Vec<usize>>)
    {
        self.terms.push(Term { factor, point, index });
    }

    #[inline(always)]
    pub fn len(&self) -> usize
    {
        self.terms.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool
    {
        self.terms.is_empty()
    }

    #[inline]
    pub fn terms(&self) -> &[Term]
    {
        &self.terms
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Term>
    {
        self.terms.iter()
    }

    ///
    /// Sum of the factors of all non-null entries. 1 for a decomposition of
    /// a feasible point.
    ///
    pub fn factor_sum(&self) -> f64
    {
        self.terms.iter().filter(|t| t.point.is_some()).map(|t| t.factor).sum()
    }

    ///
    /// Evaluates `sum factor_i * point_i`. The output dimension is taken from
    /// the first non-null point. Malformed entries (points of a different
    /// dimension) poison the affected components with NaN instead of
    /// panicking; callers relying on that propagation must not "fix" it.
    ///
    pub fn eval(&self) -> Vec<f64>
    {
        let dim = match self.terms.iter().find_map(|t| t.point.as_ref())
        {
            Some(point) => point.len(),
            None => return Vec::new(),
        };
        let mut result = vec![0.0; dim];
        for term in &self.terms
        {
            if let Some(point) = &term.point
            {
                #[allow(clippy::needless_range_loop)]
                for j in 0..dim
                {
                    result[j] += term.factor * point.get(j).copied().unwrap_or(f64::NAN);
                }
            }
        }
        result
    }

    ///
    /// Removes entries with a null point or a zero factor, compacting the
    /// remaining entries to the front. Idempotent.
    ///
    pub fn pack(&mut self)
    {
        self.terms.retain(|t| t.point.is_some() && t.factor != 0.0);
    }
}

#[test]
fn check_eval_cancellation()
{
    // Pairs of +/- unit points with equal factors must cancel to zero.
    let dim = 4;
    let mut lc = LinearCombination::new();
    for i in 0..2 * dim
    {
        let mut point = vec![0.0; dim];
        point[i / 2] = if i % 2 == 0 { 1.0 } else { -1.0 };
        lc.push(0.125, Some(point), None);
    }
    let result = lc.eval();
    assert!(crate::utilities::states_equal(&result, &[0.0; 4], 1e-9));
}

#[test]
fn check_eval_poisons_mismatched_dimension()
{
    let mut lc = LinearCombination::new();
    lc.push(0.5, Some(vec![1.0, 2.0]), None);
    lc.push(0.5, Some(vec![1.0]), None);
    let result = lc.eval();
    assert_eq!(result.len(), 2);
    assert!((result[0] - 1.0).abs() < 1e-12);
    assert!(result[1].is_nan());
}

#[test]
fn check_pack_is_idempotent()
{
    let mut lc = LinearCombination::new();
    lc.push(0.25, Some(vec![0.0, 0.0]), Some(vec![0, 0]));
    lc.push(0.0, Some(vec![1.0, 0.0]), Some(vec![1, 0]));
    lc.push(0.75, None, None);
    lc.push(0.75, Some(vec![0.0, 1.0]), Some(vec![0, 1]));
    lc.pack();
    assert_eq!(lc.len(), 2);
    assert!((lc.terms()[0].factor - 0.25).abs() < 1e-12);
    assert!((lc.terms()[1].factor - 0.75).abs() < 1e-12);
    let packed: Vec<Term> = lc.terms().to_vec();
    lc.pack();
    assert_eq!(lc.len(), packed.len());
}

#[test]
fn check_eval_empty()
{
    let lc = LinearCombination::new();
    assert!(lc.eval().is_empty());
    assert!(lc.is_empty());
}
