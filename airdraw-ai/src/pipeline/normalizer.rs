//! Feature normalization
//!
//! Applies a per-channel transform fitted offline to a resampled series. Two
//! interchangeable strategies sit behind [`FeatureTransform`]:
//!
//! - [`AffineStats`]: raw mean/std arrays, `(x - mean) / std`
//! - [`FittedScaler`]: an exported scaler with its own row-wise transform
//!
//! The strategy is chosen once, when [`NormalizationModel::load`] reads the
//! configured artifact. Nothing here ever re-fits parameters.
//!
//! **Artifact formats:**
//! - `.npz` with arrays `mean` and `std` (numpy.savez output)
//! - `.json` with `{"mean": [...], "std": [...]}`
//! - `.json` scaler export tagged by `kind`:
//!   - `standard`: `mean`, `scale`; `(x - mean) / scale`
//!   - `min_max`: `min`, `scale`; `x * scale + min`
//!   - `robust`: `center`, `scale`; `(x - center) / scale`

use crate::error::{Error, Result};
use crate::types::FixedSeries;
use airdraw_common::CHANNEL_COUNT;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use ndarray_npy::NpzReader;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// A per-feature transform applied to (rows, F) data
pub trait FeatureTransform: Send + Sync {
    /// Number of features F the transform was fitted on
    fn feature_count(&self) -> usize;

    /// Transform every row. Caller guarantees `rows.ncols() == feature_count()`.
    fn transform_rows(&self, rows: ArrayView2<'_, f64>) -> Array2<f64>;
}

/// Per-channel mean and standard deviation
#[derive(Debug, Clone, PartialEq)]
pub struct AffineStats {
    mean: Array1<f64>,
    std: Array1<f64>,
}

impl AffineStats {
    /// # Errors
    /// * `ShapeMismatch` if mean and std differ in length
    /// * `Config` if any std is zero or non-finite
    pub fn new(mean: Array1<f64>, std: Array1<f64>) -> Result<Self> {
        if mean.len() != std.len() {
            return Err(Error::ShapeMismatch(format!(
                "mean has {} entries but std has {}",
                mean.len(),
                std.len()
            )));
        }
        check_finite("mean", mean.view())?;
        check_divisor("std", std.view())?;
        Ok(Self { mean, std })
    }

    /// Read `mean` and `std` arrays from a numpy `.npz` archive
    pub fn load_npz(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            Error::Config(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let mut npz = NpzReader::new(file).map_err(|e| {
            Error::Config(format!("Failed to read npz {}: {}", path.display(), e))
        })?;

        let mean = read_npz_vector(&mut npz, "mean", path)?;
        let std = read_npz_vector(&mut npz, "std", path)?;
        Self::new(mean, std)
    }

    pub fn mean(&self) -> ArrayView1<'_, f64> {
        self.mean.view()
    }

    pub fn std(&self) -> ArrayView1<'_, f64> {
        self.std.view()
    }

    /// Inverse transform: `x * std + mean`
    pub fn denormalize(&self, series: &FixedSeries) -> Result<FixedSeries> {
        check_feature_count(self.feature_count(), series)?;
        let restored = &series.view() * &self.std + &self.mean;
        FixedSeries::from_array(restored)
    }
}

impl FeatureTransform for AffineStats {
    fn feature_count(&self) -> usize {
        self.mean.len()
    }

    fn transform_rows(&self, rows: ArrayView2<'_, f64>) -> Array2<f64> {
        (&rows - &self.mean) / &self.std
    }
}

/// Which fitted scaler produced the parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalerKind {
    Standard,
    MinMax,
    Robust,
}

impl ScalerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScalerKind::Standard => "standard",
            ScalerKind::MinMax => "min_max",
            ScalerKind::Robust => "robust",
        }
    }
}

/// Scaler fitted offline, applied row by row
#[derive(Debug, Clone, PartialEq)]
pub struct FittedScaler {
    kind: ScalerKind,
    /// mean (standard), min (min_max) or center (robust)
    offset: Array1<f64>,
    scale: Array1<f64>,
}

impl FittedScaler {
    pub fn new(kind: ScalerKind, offset: Array1<f64>, scale: Array1<f64>) -> Result<Self> {
        if offset.len() != scale.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} scaler has {} offsets but {} scales",
                kind.as_str(),
                offset.len(),
                scale.len()
            )));
        }
        check_finite("offset", offset.view())?;
        match kind {
            ScalerKind::MinMax => check_finite("scale", scale.view())?,
            ScalerKind::Standard | ScalerKind::Robust => check_divisor("scale", scale.view())?,
        }
        Ok(Self {
            kind,
            offset,
            scale,
        })
    }

    pub fn kind(&self) -> ScalerKind {
        self.kind
    }

    fn transform_value(&self, x: f64, offset: f64, scale: f64) -> f64 {
        match self.kind {
            ScalerKind::Standard | ScalerKind::Robust => (x - offset) / scale,
            ScalerKind::MinMax => x * scale + offset,
        }
    }
}

impl FeatureTransform for FittedScaler {
    fn feature_count(&self) -> usize {
        self.offset.len()
    }

    fn transform_rows(&self, rows: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut out = rows.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            Zip::from(&mut row)
                .and(&self.offset)
                .and(&self.scale)
                .for_each(|x, &offset, &scale| *x = self.transform_value(*x, offset, scale));
        }
        out
    }
}

/// The normalization loaded at startup
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizationModel {
    Affine(AffineStats),
    Scaler(FittedScaler),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NormalizationArtifact {
    Scaler(ScalerArtifact),
    Affine(AffineArtifact),
}

/// Bare mean/std stats. A stray `kind` means a malformed scaler export.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AffineArtifact {
    mean: Vec<f64>,
    std: Vec<f64>,
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ScalerArtifact {
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    MinMax { min: Vec<f64>, scale: Vec<f64> },
    Robust { center: Vec<f64>, scale: Vec<f64> },
}

impl NormalizationModel {
    /// Load whichever artifact is configured, selecting the strategy by
    /// file extension and (for JSON) document shape.
    pub fn load(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let model = match extension.as_deref() {
            Some("npz") => NormalizationModel::Affine(AffineStats::load_npz(path)?),
            Some("json") => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::from_json(&content).map_err(|e| match e {
                    Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
                    other => other,
                })?
            }
            _ => {
                return Err(Error::Config(format!(
                    "Unsupported normalization artifact {} (expected .npz or .json)",
                    path.display()
                )))
            }
        };

        info!(
            path = %path.display(),
            strategy = model.strategy_name(),
            features = model.feature_count(),
            "Normalization model loaded"
        );
        Ok(model)
    }

    /// Parse a JSON artifact (mean/std stats or a tagged scaler export)
    pub fn from_json(content: &str) -> Result<Self> {
        let artifact: NormalizationArtifact = serde_json::from_str(content).map_err(|e| {
            Error::Config(format!("Unrecognized normalization artifact: {}", e))
        })?;

        let model = match artifact {
            NormalizationArtifact::Affine(AffineArtifact { mean, std }) => {
                NormalizationModel::Affine(AffineStats::new(mean.into(), std.into())?)
            }
            NormalizationArtifact::Scaler(ScalerArtifact::Standard { mean, scale }) => {
                NormalizationModel::Scaler(FittedScaler::new(
                    ScalerKind::Standard,
                    mean.into(),
                    scale.into(),
                )?)
            }
            NormalizationArtifact::Scaler(ScalerArtifact::MinMax { min, scale }) => {
                NormalizationModel::Scaler(FittedScaler::new(
                    ScalerKind::MinMax,
                    min.into(),
                    scale.into(),
                )?)
            }
            NormalizationArtifact::Scaler(ScalerArtifact::Robust { center, scale }) => {
                NormalizationModel::Scaler(FittedScaler::new(
                    ScalerKind::Robust,
                    center.into(),
                    scale.into(),
                )?)
            }
        };
        Ok(model)
    }

    pub fn strategy_name(&self) -> &'static str {
        match self {
            NormalizationModel::Affine(_) => "affine",
            NormalizationModel::Scaler(s) => s.kind().as_str(),
        }
    }

    fn transform(&self) -> &dyn FeatureTransform {
        match self {
            NormalizationModel::Affine(stats) => stats as &dyn FeatureTransform,
            NormalizationModel::Scaler(scaler) => scaler as &dyn FeatureTransform,
        }
    }

    pub fn feature_count(&self) -> usize {
        self.transform().feature_count()
    }

    /// Apply the loaded transform, preserving shape
    pub fn normalize(&self, series: &FixedSeries) -> Result<FixedSeries> {
        normalize(series, self.transform())
    }
}

/// Apply `transform` to every row of `series`
///
/// # Errors
/// * `ShapeMismatch` if the transform was fitted on a different channel count
pub fn normalize(series: &FixedSeries, transform: &dyn FeatureTransform) -> Result<FixedSeries> {
    check_feature_count(transform.feature_count(), series)?;

    // (T, F) is already the (T*1, F) row layout scalers expect
    let rows = series.view();
    let transformed = transform.transform_rows(rows);
    debug!(rows = transformed.nrows(), "Series normalized");

    FixedSeries::from_array(transformed)
}

fn check_feature_count(features: usize, series: &FixedSeries) -> Result<()> {
    if features != series.channels() || features != CHANNEL_COUNT {
        return Err(Error::ShapeMismatch(format!(
            "normalization fitted on {} features, series has {}",
            features,
            series.channels()
        )));
    }
    Ok(())
}

fn check_finite(name: &str, values: ArrayView1<'_, f64>) -> Result<()> {
    if let Some((i, v)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(Error::Config(format!("{}[{}] is not finite ({})", name, i, v)));
    }
    Ok(())
}

fn check_divisor(name: &str, values: ArrayView1<'_, f64>) -> Result<()> {
    check_finite(name, values)?;
    if let Some(i) = values.iter().position(|&v| v == 0.0) {
        return Err(Error::Config(format!("{}[{}] is zero", name, i)));
    }
    Ok(())
}

/// Read a 1-D array stored as `name` or `name.npy`, as f64 or f32
fn read_npz_vector(npz: &mut NpzReader<File>, name: &str, path: &Path) -> Result<Array1<f64>> {
    let names = npz.names().map_err(|e| {
        Error::Config(format!("Failed to list arrays in {}: {}", path.display(), e))
    })?;
    let with_suffix = format!("{}.npy", name);
    let entry = names
        .iter()
        .find(|n| n.as_str() == name || n.as_str() == with_suffix)
        .cloned()
        .ok_or_else(|| {
            Error::Config(format!("{} has no '{}' array", path.display(), name))
        })?;

    if let Ok(values) = npz.by_name::<ndarray::OwnedRepr<f64>, ndarray::Ix1>(&entry) {
        return Ok(values);
    }
    let values: Array1<f32> = npz.by_name(&entry).map_err(|e| {
        Error::Config(format!(
            "'{}' in {} is not a 1-D float array: {}",
            name,
            path.display(),
            e
        ))
    })?;
    Ok(values.mapv(f64::from))
}
