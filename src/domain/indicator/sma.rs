//! Simple Moving Average.
//!
//! SMA(n)[i] = sum(x[i-n+1..=i]) / n. Warmup: first (n-1) values are `None`.

pub fn calculate_sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, &v) in values.iter().enumerate() {
        sum += v;
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 < period {
            out.push(None);
        } else {
            let window = &values[i + 1 - period..=i];
            if window.iter().any(|x| x.is_nan()) {
                out.push(None);
            } else {
                out.push(Some(sum / period as f64));
            }
        }
    }
    out
}
