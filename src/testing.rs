//! Helpers shared by the statistical unit tests.

/// Asserts that `heads` out of `n` trials is within 5 standard deviations of
/// the count expected for probability `p`.
pub(crate) fn assert_near(heads: usize, n: usize, p: f64) {
    let mean = n as f64 * p;
    let sd = (n as f64 * p * (1.0 - p)).sqrt();
    assert!(
        (heads as f64 - mean).abs() <= 5.0 * sd + 1.0,
        "heads = {}, expected {:.1} +- {:.1}",
        heads,
        mean,
        5.0 * sd
    );
}
