//! Blood-pressure regression
//!
//! A two-output ridge regression over standardized physiological features,
//! fitted once on a seeded synthetic cohort and read-only afterwards.
//! Inference is a pure function of the feature vector.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::error::ScanError;

const N_FEATURES: usize = 7;

const SYSTOLIC_RANGE: (f64, f64) = (85.0, 190.0);
const DIASTOLIC_RANGE: (f64, f64) = (50.0, 120.0);
/// Minimum pulse pressure enforced on the output (mmHg)
const MIN_PULSE_PRESSURE: f64 = 20.0;

/// Complete feature vector; HRV fallbacks are applied by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BpFeatures {
    pub hr_bpm: f32,
    pub rmssd_ms: f32,
    pub sdnn_ms: f32,
    pub pnn50: f32,
    pub age: f32,
    /// 1.0 for male, 0.0 otherwise
    pub gender_male: f32,
    pub bmi: f32,
}

impl BpFeatures {
    fn to_array(self) -> [f64; N_FEATURES] {
        [
            self.hr_bpm as f64,
            self.rmssd_ms as f64,
            self.sdnn_ms as f64,
            self.pnn50 as f64,
            self.age as f64,
            self.gender_male as f64,
            self.bmi as f64,
        ]
    }
}

/// AHA blood-pressure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BpCategory {
    Normal,
    Elevated,
    HypertensionStage1,
    HypertensionStage2,
}

impl BpCategory {
    pub fn classify(systolic: u32, diastolic: u32) -> Self {
        if systolic >= 140 || diastolic >= 90 {
            BpCategory::HypertensionStage2
        } else if systolic >= 130 || diastolic >= 80 {
            BpCategory::HypertensionStage1
        } else if systolic >= 120 {
            BpCategory::Elevated
        } else {
            BpCategory::Normal
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BpCategory::Normal => "Normal",
            BpCategory::Elevated => "Elevated",
            BpCategory::HypertensionStage1 => "Hypertension Stage 1",
            BpCategory::HypertensionStage2 => "Hypertension Stage 2",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BpResult {
    /// mmHg, within [85, 190]
    pub systolic: u32,
    /// mmHg, within [50, 120] and at least 20 below systolic
    pub diastolic: u32,
    pub category: BpCategory,
    pub label: String,
}

/// Trained blood-pressure model
#[derive(Debug, Clone)]
pub struct BloodPressureEstimator {
    feature_mean: [f64; N_FEATURES],
    feature_std: [f64; N_FEATURES],
    /// `N_FEATURES x 2` weights on standardized features (systolic, diastolic)
    weights: DMatrix<f64>,
    intercept: [f64; 2],
}

impl BloodPressureEstimator {
    /// Fit the model on a synthetic cohort drawn from `config.seed`.
    pub fn train(config: &ModelConfig) -> Result<Self, ScanError> {
        let n = config.training_samples;
        if n < N_FEATURES + 1 {
            return Err(ScanError::Model(format!(
                "need more than {} training samples, got {}",
                N_FEATURES, n
            )));
        }

        let (x, y) = synthetic_cohort(n, config.seed)?;

        // Standardize columns
        let mut feature_mean = [0.0; N_FEATURES];
        let mut feature_std = [1.0; N_FEATURES];
        let mut xs = x.clone();
        for j in 0..N_FEATURES {
            let col = x.column(j);
            let mean = col.mean();
            let std = col.map(|v| (v - mean).powi(2)).mean().sqrt();
            let std = if std > 1e-9 { std } else { 1.0 };
            feature_mean[j] = mean;
            feature_std[j] = std;
            xs.column_mut(j).apply(|v| *v = (*v - mean) / std);
        }

        // Center targets; intercept absorbs the mean
        let intercept = [y.column(0).mean(), y.column(1).mean()];
        let mut yc = y;
        for (k, mean) in intercept.iter().enumerate() {
            yc.column_mut(k).apply(|v| *v -= mean);
        }

        // (XᵀX + λI) W = XᵀY
        let xt = xs.transpose();
        let gram = &xt * &xs + DMatrix::<f64>::identity(N_FEATURES, N_FEATURES) * config.ridge_lambda;
        let rhs = &xt * &yc;
        let weights = gram
            .cholesky()
            .ok_or_else(|| ScanError::Model("ridge system is not positive definite".to_string()))?
            .solve(&rhs);

        log::info!(
            "BP model trained on {} synthetic samples (seed={}, lambda={})",
            n,
            config.seed,
            config.ridge_lambda
        );

        Ok(Self {
            feature_mean,
            feature_std,
            weights,
            intercept,
        })
    }

    pub fn predict(&self, features: &BpFeatures) -> BpResult {
        let raw = features.to_array();
        let z = DVector::from_iterator(
            N_FEATURES,
            raw.iter()
                .zip(self.feature_mean.iter().zip(self.feature_std.iter()))
                .map(|(&v, (&m, &s))| if v.is_finite() { (v - m) / s } else { 0.0 }),
        );

        let sys = self.intercept[0] + self.weights.column(0).dot(&z);
        let dia = self.intercept[1] + self.weights.column(1).dot(&z);
        let (systolic, diastolic) = postprocess(sys, dia);
        let category = BpCategory::classify(systolic, diastolic);

        BpResult {
            systolic,
            diastolic,
            category,
            label: category.label().to_string(),
        }
    }
}

/// Clamp to clinical ranges, keep a minimum pulse pressure, round to mmHg.
fn postprocess(sys: f64, dia: f64) -> (u32, u32) {
    let sys = if sys.is_finite() { sys } else { 120.0 };
    let dia = if dia.is_finite() { dia } else { 80.0 };

    let sys = sys.clamp(SYSTOLIC_RANGE.0, SYSTOLIC_RANGE.1).round();
    let dia = dia
        .clamp(DIASTOLIC_RANGE.0, DIASTOLIC_RANGE.1)
        .min(sys - MIN_PULSE_PRESSURE)
        .round();

    (sys as u32, dia as u32)
}

/// Seeded synthetic cohort: features `[hr, rmssd, sdnn, pnn50, age, male, bmi]`
/// and targets `[systolic, diastolic]`.
fn synthetic_cohort(n: usize, seed: u64) -> Result<(DMatrix<f64>, DMatrix<f64>), ScanError> {
    let dist = |mean: f64, std: f64| {
        Normal::new(mean, std).map_err(|e| ScanError::Model(format!("bad distribution: {}", e)))
    };
    let hr_dist = dist(72.0, 11.0)?;
    let rmssd_dist = dist(38.0, 16.0)?;
    let sdnn_dist = dist(48.0, 16.0)?;
    let pnn50_dist = dist(16.0, 11.0)?;
    let bmi_dist = dist(25.0, 4.0)?;
    let sys_noise = dist(0.0, 8.0)?;
    let dia_noise = dist(0.0, 6.0)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut x = DMatrix::<f64>::zeros(n, N_FEATURES);
    let mut y = DMatrix::<f64>::zeros(n, 2);

    for i in 0..n {
        let age: f64 = rng.gen_range(18.0..80.0);
        let male = if rng.gen_bool(0.5) { 1.0 } else { 0.0 };
        let bmi = bmi_dist.sample(&mut rng).clamp(16.0, 45.0);
        let hr = hr_dist.sample(&mut rng).clamp(45.0, 130.0);
        // HRV declines with age
        let age_factor = 1.0 - 0.006 * (age - 40.0);
        let rmssd = (rmssd_dist.sample(&mut rng) * age_factor).clamp(8.0, 120.0);
        let sdnn = (sdnn_dist.sample(&mut rng) * age_factor).clamp(10.0, 150.0);
        let pnn50 = (pnn50_dist.sample(&mut rng) * age_factor).clamp(0.0, 60.0);

        let sys = 100.0
            + 0.45 * age
            + 1.1 * (bmi - 22.0)
            + 0.25 * (hr - 70.0)
            - 0.08 * (rmssd - 30.0)
            - 0.05 * (sdnn - 20.0)
            + 5.0 * male
            + sys_noise.sample(&mut rng);
        let dia = 65.0
            + 0.2 * age
            + 0.7 * (bmi - 22.0)
            + 0.15 * (hr - 70.0)
            - 0.05 * (rmssd - 30.0)
            + 3.0 * male
            + dia_noise.sample(&mut rng);

        for (j, v) in [hr, rmssd, sdnn, pnn50, age, male, bmi].into_iter().enumerate() {
            x[(i, j)] = v;
        }
        y[(i, 0)] = sys;
        y[(i, 1)] = dia;
    }

    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::OnceLock;

    fn model() -> &'static BloodPressureEstimator {
        static MODEL: OnceLock<BloodPressureEstimator> = OnceLock::new();
        MODEL.get_or_init(|| BloodPressureEstimator::train(&ModelConfig::default()).unwrap())
    }

    fn typical() -> BpFeatures {
        BpFeatures {
            hr_bpm: 70.0,
            rmssd_ms: 30.0,
            sdnn_ms: 20.0,
            pnn50: 10.0,
            age: 40.0,
            gender_male: 1.0,
            bmi: 24.0,
        }
    }

    #[test]
    fn test_typical_adult_in_plausible_range() {
        let bp = model().predict(&typical());
        assert!((105..=145).contains(&bp.systolic), "systolic {}", bp.systolic);
        assert!((65..=100).contains(&bp.diastolic), "diastolic {}", bp.diastolic);
    }

    #[test]
    fn test_learned_trends() {
        let base = model().predict(&typical());
        let older = model().predict(&BpFeatures { age: 75.0, bmi: 33.0, ..typical() });
        assert!(older.systolic > base.systolic);
        assert!(older.diastolic >= base.diastolic);
    }

    #[test]
    fn test_training_is_deterministic() {
        let a = BloodPressureEstimator::train(&ModelConfig::default()).unwrap();
        let b = BloodPressureEstimator::train(&ModelConfig::default()).unwrap();
        assert_eq!(a.predict(&typical()), b.predict(&typical()));
    }

    #[test]
    fn test_too_few_samples() {
        let config = ModelConfig { training_samples: 3, ..ModelConfig::default() };
        assert!(matches!(BloodPressureEstimator::train(&config), Err(ScanError::Model(_))));
    }

    #[test]
    fn test_postprocess_limits() {
        assert_eq!(postprocess(300.0, 200.0), (190, 120));
        assert_eq!(postprocess(50.0, 10.0), (85, 50));
        // Diastolic pushed below systolic - 20
        assert_eq!(postprocess(100.0, 95.0), (100, 80));
        assert_eq!(postprocess(f64::NAN, f64::NAN), (120, 80));
    }

    #[test]
    fn test_categories() {
        assert_eq!(BpCategory::classify(115, 75), BpCategory::Normal);
        assert_eq!(BpCategory::classify(125, 75), BpCategory::Elevated);
        assert_eq!(BpCategory::classify(125, 82), BpCategory::HypertensionStage1);
        assert_eq!(BpCategory::classify(145, 70), BpCategory::HypertensionStage2);
    }

    proptest! {
        #[test]
        fn diastolic_always_below_systolic(
            hr in 30.0f32..200.0,
            rmssd in 0.0f32..250.0,
            sdnn in 0.0f32..250.0,
            pnn50 in 0.0f32..100.0,
            age in 10.0f32..120.0,
            male in prop::bool::ANY,
            bmi in 8.0f32..120.0,
        ) {
            let bp = model().predict(&BpFeatures {
                hr_bpm: hr,
                rmssd_ms: rmssd,
                sdnn_ms: sdnn,
                pnn50,
                age,
                gender_male: if male { 1.0 } else { 0.0 },
                bmi,
            });
            prop_assert!(bp.diastolic < bp.systolic);
            prop_assert!((85..=190).contains(&bp.systolic));
            prop_assert!((50..=120).contains(&bp.diastolic));
        }
    }
}
