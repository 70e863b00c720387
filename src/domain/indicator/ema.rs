//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = x[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) values are `None`.

pub fn calculate_ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 || values.is_empty() {
        return vec![None; values.len()];
    }

    let mut out = Vec::with_capacity(values.len());
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, &v) in values.iter().enumerate() {
        if i < period - 1 {
            sum += v;
            out.push(None);
        } else if i == period - 1 {
            sum += v;
            ema = sum / period as f64;
            out.push(Some(ema));
        } else {
            ema = next_ema(ema, v, period);
            out.push(Some(ema));
        }
    }

    out.into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect()
}

/// One smoothing step from the previous EMA.
pub fn next_ema(prev: f64, value: f64, period: usize) -> f64 {
    let k = 2.0 / (period as f64 + 1.0);
    value * k + prev * (1.0 - k)
}
