use itertools::izip;
use multiversion::multiversion;

/// Numerically stable `ln(exp(a) + exp(b))`.
#[inline]
pub fn logaddexp(a: f64, b: f64) -> f64 {
    if a == b {
        return a + 2f64.ln();
    }
    let diff = a - b;
    if diff > 0. {
        a + (-diff).exp().ln_1p()
    } else if diff < 0. {
        b + diff.exp().ln_1p()
    } else {
        // diff is NAN
        diff
    }
}

#[multiversion(targets("x86_64+avx+avx2+fma", "arm+neon"))]
pub(crate) fn vector_dot(a: &[f64], b: &[f64]) -> f64 {
    assert!(a.len() == b.len());

    let mut result = 0f64;
    for (x, y) in a.iter().zip(b) {
        result += x * y;
    }
    result
}

/// Compute `(a · x, a · y)` in one pass.
#[multiversion(targets("x86_64+avx+avx2+fma", "arm+neon"))]
pub(crate) fn scalar_prods(a: &[f64], x: &[f64], y: &[f64]) -> (f64, f64) {
    let n = a.len();
    assert!(x.len() == n);
    assert!(y.len() == n);

    izip!(a, x, y).fold((0f64, 0f64), |(s1, s2), (a, x, y)| {
        (s1 + a * x, s2 + a * y)
    })
}

/// Compute `((a - b) · x, (a - b) · y)` without materializing `a - b`.
#[multiversion(targets("x86_64+avx+avx2+fma", "arm+neon"))]
pub(crate) fn scalar_prods_of_diff(a: &[f64], b: &[f64], x: &[f64], y: &[f64]) -> (f64, f64) {
    let n = a.len();
    assert!(b.len() == n);
    assert!(x.len() == n);
    assert!(y.len() == n);

    izip!(a, b, x, y).fold((0f64, 0f64), |(s1, s2), (a, b, x, y)| {
        let diff = a - b;
        (s1 + diff * x, s2 + diff * y)
    })
}

#[multiversion(targets("x86_64+avx+avx2+fma", "arm+neon"))]
pub(crate) fn axpy(x: &[f64], y: &mut [f64], a: f64) {
    assert!(y.len() == x.len());

    izip!(x, y).for_each(|(x, y)| {
        *y += a * x;
    });
}

#[multiversion(targets("x86_64+avx+avx2+fma", "arm+neon"))]
pub(crate) fn axpy_out(x: &[f64], y: &[f64], a: f64, out: &mut [f64]) {
    let n = x.len();
    assert!(y.len() == n);
    assert!(out.len() == n);

    izip!(x, y, out).for_each(|(x, y, out)| {
        *out = a * x + y;
    });
}

#[multiversion(targets("x86_64+avx+avx2+fma", "arm+neon"))]
pub(crate) fn multiply(x: &[f64], y: &[f64], out: &mut [f64]) {
    let n = x.len();
    assert!(y.len() == n);
    assert!(out.len() == n);

    izip!(x, y, out).for_each(|(x, y, out)| {
        *out = x * y;
    });
}
