use num_traits::Float;

///
/// True if `a` and `b` differ by no more than `tol`.
///
#[inline]
pub fn approx_eq<T: Float>(a: T, b: T, tol: T) -> bool
{
    (a - b).abs() <= tol
}

///
/// Component-wise state comparison with tolerance. States of different
/// dimension are never equal.
///
pub fn states_equal(a: &[f64], b: &[f64], tol: f64) -> bool
{
    if a.len() != b.len()
    {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| approx_eq(*x, *y, tol))
}

#[test]
fn check_states_equal()
{
    let a = [0.0, 0.1, 0.2, 0.3];
    let b = [0.0, 0.1, 0.2, 0.3];
    let c = [0.0, 0.01, 0.25, 0.2];
    assert!(states_equal(&a, &a, 0.0));
    assert!(states_equal(&a, &b, 0.0));
    assert!(states_equal(&a, &c, 0.1));
    assert!(!states_equal(&a, &c, 1e-9));
    assert!(!states_equal(&a, &c[..3], 1.0));
}
