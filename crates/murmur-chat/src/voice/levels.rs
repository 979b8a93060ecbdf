/// Root-mean-square amplitude of a buffer of PCM samples
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Convert an average power reading in dBFS to a 0..=1 meter level
pub fn power_to_linear(db: f32) -> f32 {
    if db.is_nan() {
        return 0.0;
    }
    10f32.powf(db / 20.0).clamp(0.0, 1.0)
}
