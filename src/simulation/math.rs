//! Small vector helpers shared by the learned models.

use rand::Rng;
use std::f64::consts::PI;

/// Clamps every component into `[lo, hi]`.
pub fn clip(values: &mut [f64], lo: f64, hi: f64) {
    for v in values {
        *v = v.clamp(lo, hi);
    }
}

/// Sum of squared component differences.
#[must_use]
pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Sum of squared components.
#[must_use]
pub fn squared_magnitude(a: &[f64]) -> f64 {
    a.iter().map(|x| x * x).sum()
}

/// Approximate standard normal via Box-Muller.
pub fn gaussian(rng: &mut impl Rng) -> f64 {
    let u1 = rng.random::<f64>().max(1e-15);
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Serializes an `Array2<f64>` as a nested array of rows.
pub mod rows {
    use ndarray::Array2;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(matrix: &Array2<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        let rows: Vec<Vec<f64>> = matrix.outer_iter().map(|row| row.to_vec()).collect();
        rows.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Array2<f64>, D::Error> {
        let rows = Vec::<Vec<f64>>::deserialize(deserializer)?;
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != cols) {
            return Err(D::Error::custom("ragged matrix rows"));
        }
        let count = rows.len();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Array2::from_shape_vec((count, cols), flat).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_clip_bounds() {
        let mut v = vec![-3.0, 0.25, 7.0];
        clip(&mut v, -1.0, 1.0);
        assert_eq!(v, vec![-1.0, 0.25, 1.0]);
    }

    #[test]
    fn test_squared_distance() {
        assert!((squared_distance(&[1.0, 2.0], &[0.0, 0.0]) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_gaussian_is_roughly_standard() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| gaussian(&mut rng)).collect();
        let mean = samples.iter().sum::<f64>() / f64::from(n);
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / f64::from(n);
        assert!(mean.abs() < 0.05, "mean drifted: {mean}");
        assert!((var - 1.0).abs() < 0.1, "variance drifted: {var}");
    }

    #[test]
    fn test_rows_round_trip_keeps_shape() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Holder {
            #[serde(with = "rows")]
            m: ndarray::Array2<f64>,
        }
        let h = Holder {
            m: ndarray::Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap(),
        };
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, r#"{"m":[[1.0,2.0,3.0],[4.0,5.0,6.0]]}"#);
        let back: Holder = serde_json::from_str(&json).unwrap();
        assert_eq!(back.m, h.m);
    }

    #[test]
    fn test_rows_rejects_ragged() {
        #[derive(serde::Deserialize)]
        struct Holder {
            #[serde(with = "rows")]
            #[allow(dead_code)]
            m: ndarray::Array2<f64>,
        }
        assert!(serde_json::from_str::<Holder>(r#"{"m":[[1.0],[2.0,3.0]]}"#).is_err());
    }
}
