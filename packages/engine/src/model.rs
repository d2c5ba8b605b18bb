//! Trained linear model loading and scoring.
//!
//! The model artifact is produced offline by the model-search tooling and
//! consumed here read-only: feature names, standardization parameters,
//! coefficients, and an intercept. Scoring standardizes the feature vector
//! with the persisted per-feature mean/scale, dots with the coefficients,
//! and adds the intercept; the caller clamps to ≥ 0.

use std::path::Path;

use serde::Deserialize;

use crate::EngineError;

/// Serialized model artifact shape.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelArtifact {
    /// Declared feature names, in scoring order.
    pub features: Vec<String>,
    /// Per-feature standardization means.
    pub scaler_mean: Vec<f64>,
    /// Per-feature standardization scales.
    pub scaler_scale: Vec<f64>,
    /// Per-feature coefficients.
    pub coefficients: Vec<f64>,
    /// Model intercept.
    pub intercept: f64,
    /// Opaque training metrics carried along for the health surface.
    #[serde(default)]
    pub training_metrics: Option<serde_json::Value>,
}

/// A loaded, validated linear model.
#[derive(Debug, Clone)]
pub struct RegressionModel {
    artifact: ModelArtifact,
}

impl RegressionModel {
    /// Loads the model artifact from `path`.
    ///
    /// A missing artifact is not fatal — the engine degrades to
    /// baseline-only predictions and flags it — so this returns `Ok(None)`
    /// when the file does not exist. A present-but-inconsistent artifact
    /// (length mismatches between features and parameters) is fatal.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Model`] if the artifact cannot be parsed or
    /// its parameter lengths disagree with the feature list.
    pub fn load(path: &Path) -> Result<Option<Self>, EngineError> {
        if !path.exists() {
            log::warn!(
                "Model artifact {} not found; predictions fall back to baseline intensity",
                path.display()
            );
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path).map_err(|e| EngineError::Model {
            message: format!("Failed to read model artifact: {e}"),
        })?;
        let artifact: ModelArtifact =
            serde_json::from_str(&raw).map_err(|e| EngineError::Model {
                message: format!("Failed to parse model artifact: {e}"),
            })?;

        let n = artifact.features.len();
        if artifact.scaler_mean.len() != n
            || artifact.scaler_scale.len() != n
            || artifact.coefficients.len() != n
        {
            return Err(EngineError::Model {
                message: format!(
                    "Model artifact parameter lengths disagree: {n} features, {} means, {} scales, {} coefficients",
                    artifact.scaler_mean.len(),
                    artifact.scaler_scale.len(),
                    artifact.coefficients.len()
                ),
            });
        }

        log::info!("Loaded trained model with {n} features");
        Ok(Some(Self { artifact }))
    }

    /// Builds a model directly from an artifact (test support).
    #[must_use]
    pub const fn from_artifact(artifact: ModelArtifact) -> Self {
        Self { artifact }
    }

    /// The declared feature names, in scoring order.
    #[must_use]
    pub fn features(&self) -> &[String] {
        &self.artifact.features
    }

    /// Scores one feature vector (already in declared feature order).
    ///
    /// The result is unclamped; callers floor at 0.
    #[must_use]
    pub fn score(&self, x: &[f64]) -> f64 {
        debug_assert_eq!(x.len(), self.artifact.features.len());
        let mut acc = self.artifact.intercept;
        for (i, &value) in x.iter().enumerate() {
            let scale = self.artifact.scaler_scale[i];
            let scaled = if scale == 0.0 {
                0.0
            } else {
                (value - self.artifact.scaler_mean[i]) / scale
            };
            acc += self.artifact.coefficients[i] * scaled;
        }
        acc
    }

    /// Scores `n` row-major feature vectors in one pass.
    #[must_use]
    pub fn score_matrix(&self, x: &[f64], n: usize) -> Vec<f64> {
        let width = self.artifact.features.len();
        debug_assert_eq!(x.len(), n * width);
        (0..n)
            .map(|row| self.score(&x[row * width..(row + 1) * width]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> RegressionModel {
        RegressionModel::from_artifact(ModelArtifact {
            features: vec!["a".to_string(), "b".to_string()],
            scaler_mean: vec![1.0, 2.0],
            scaler_scale: vec![2.0, 4.0],
            coefficients: vec![10.0, -1.0],
            intercept: 100.0,
            training_metrics: None,
        })
    }

    #[test]
    fn score_standardizes_then_dots() {
        let m = model();
        // a: (3-1)/2 = 1 → +10; b: (6-2)/4 = 1 → -1; intercept 100.
        assert!((m.score(&[3.0, 6.0]) - 109.0).abs() < 1e-12);
    }

    #[test]
    fn matrix_scoring_matches_row_scoring() {
        let m = model();
        let rows = [[3.0, 6.0], [0.0, 0.0], [-5.0, 2.0]];
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let batch = m.score_matrix(&flat, rows.len());
        for (row, &got) in rows.iter().zip(&batch) {
            assert!((m.score(row) - got).abs() < 1e-12);
        }
    }

    #[test]
    fn missing_artifact_degrades_to_none() {
        let loaded = RegressionModel::load(Path::new("/nonexistent-gridscore/model.json"));
        assert!(matches!(loaded, Ok(None)));
    }

    #[test]
    fn inconsistent_artifact_is_fatal() {
        let dir = std::env::temp_dir().join("gridscore_model_test");
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("bad_model.json");
        std::fs::write(
            &path,
            r#"{"features": ["a", "b"], "scaler_mean": [0.0],
                "scaler_scale": [1.0, 1.0], "coefficients": [1.0, 1.0],
                "intercept": 0.0}"#,
        )
        .expect("write");
        assert!(matches!(
            RegressionModel::load(&path),
            Err(EngineError::Model { .. })
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
