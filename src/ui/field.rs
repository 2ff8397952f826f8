use crate::simulation::models::LearnedModels;
use rayon::prelude::*;

const CHARS: [char; 10] = [' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Maps a contentment value in `[0, 1]` onto the ASCII ramp.
#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[must_use]
pub fn ramp_char(value: f64) -> char {
    let value = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
    let idx = (value * (CHARS.len() - 1) as f64).round() as usize;
    CHARS[idx.min(CHARS.len() - 1)]
}

/// Renders the learned contentment over the observation square `[-1, 1]²`.
///
/// Each cell's centre is encoded into beliefs and scored by the contentment
/// model. Row 0 is `y = 1`. Observations beyond the first two are zero.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn compute_contentment_grid(models: &LearnedModels, rows: usize, cols: usize) -> Vec<String> {
    if rows == 0 || cols == 0 {
        return Vec::new();
    }
    let dims = models.observation.observation_dims();

    // Use rayon to compute rows in parallel
    (0..rows)
        .into_par_iter()
        .map(|r| {
            let mut observation = vec![0.0; dims];
            let y = 1.0 - 2.0 * (r as f64 + 0.5) / rows as f64;
            let mut line = String::with_capacity(cols);
            for c in 0..cols {
                let x = -1.0 + 2.0 * (c as f64 + 0.5) / cols as f64;
                for (slot, v) in observation.iter_mut().zip([x, y]) {
                    *slot = v;
                }
                let value = models
                    .observation
                    .encode(&observation)
                    .and_then(|beliefs| models.contentment.predict(&beliefs))
                    .unwrap_or(0.0);
                line.push(ramp_char(value));
            }
            line
        })
        .collect()
}
