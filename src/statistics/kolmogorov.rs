use std::collections::BTreeMap;

// Largest absolute pointwise difference between two probability vectors,
// compared over their common prefix. `None` when there is nothing to compare.
pub fn kolmogorov_distance(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n == 0 {
        return None;
    }
    Some(a[..n].iter().zip(&b[..n]).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max))
}

// Lays time weights out by state index, states never visited count as zero.
// Weights are divided by `total` when it is positive.
pub fn dense_distribution(weights: &BTreeMap<usize, f64>, total: f64) -> Vec<f64> {
    let Some(&max_state) = weights.keys().next_back() else {
        return Vec::new();
    };
    let scale = if total > 0.0 { total } else { 1.0 };
    let mut dense = vec![0.0; max_state + 1];
    for (&state, &weight) in weights {
        dense[state] = weight / scale;
    }
    dense
}
