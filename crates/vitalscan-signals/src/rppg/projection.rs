//! Colour-space projections for rPPG
//!
//! Implements:
//! - **CHROM**: Chrominance-based method (De Haan & Jeanne, 2013)
//! - **POS**: Plane-Orthogonal-to-Skin (Wang et al., 2017)
//!
//! Both expect channels already normalised by their local mean, i.e. relative
//! traces centred on 1.0.

use ndarray::{s, Array1};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::dsp::{self, ButterworthBandpass};

/// rPPG projection method, selected once per scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionMethod {
    /// Chrominance-ratio projection (De Haan 2013)
    Chrom,
    /// Plane-Orthogonal-to-Skin with overlap-add (Wang 2017)
    #[default]
    Pos,
}

impl ProjectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectionMethod::Chrom => "chrom",
            ProjectionMethod::Pos => "pos",
        }
    }
}

impl fmt::Display for ProjectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chrom" | "a" => Ok(ProjectionMethod::Chrom),
            "pos" | "b" => Ok(ProjectionMethod::Pos),
            other => Err(format!("unknown projection method '{}'", other)),
        }
    }
}

/// CHROM method (Chrominance-based)
///
/// X = 3R - 2G and Y = 1.5R + G - 1.5B are bandpassed separately, then
/// combined as S = X_f - α·Y_f with α = std(X_f) / std(Y_f).
pub fn chrom_projection(
    r: &Array1<f32>,
    g: &Array1<f32>,
    b: &Array1<f32>,
    bandpass: &ButterworthBandpass,
) -> Array1<f32> {
    let x = (r * 3.0) - (g * 2.0);
    let y = (r * 1.5) + g - (b * 1.5);

    let x_f = bandpass.filtfilt(&x);
    let y_f = bandpass.filtfilt(&y);

    let std_x = dsp::std(&x_f);
    let std_y = dsp::std(&y_f);
    let alpha = if std_y <= f32::EPSILON { 0.0 } else { std_x / std_y };

    &x_f - &(y_f * alpha)
}

/// POS method (Plane-Orthogonal-to-Skin)
///
/// For every window of `window` samples the colour is temporally normalised,
/// projected onto the plane orthogonal to the skin tone
/// (S1 = G - B, S2 = -2R + G + B), tuned as h = S1 + (σ1/σ2)·S2, and
/// overlap-added into the output after removing its mean.
pub fn pos_projection(
    r: &Array1<f32>,
    g: &Array1<f32>,
    b: &Array1<f32>,
    window: usize,
) -> Array1<f32> {
    let n = r.len();
    let mut h = Array1::<f32>::zeros(n);
    if n < 2 {
        return h;
    }

    let l = window.clamp(2, n);

    for start in 0..=(n - l) {
        let end = start + l;
        let rw = r.slice(s![start..end]);
        let gw = g.slice(s![start..end]);
        let bw = b.slice(s![start..end]);

        let rm = rw.mean().unwrap_or(0.0);
        let gm = gw.mean().unwrap_or(0.0);
        let bm = bw.mean().unwrap_or(0.0);
        if rm.abs() <= f32::EPSILON || gm.abs() <= f32::EPSILON || bm.abs() <= f32::EPSILON {
            continue;
        }

        let rn = rw.mapv(|v| v / rm);
        let gn = gw.mapv(|v| v / gm);
        let bn = bw.mapv(|v| v / bm);

        let s1 = &gn - &bn;
        let s2 = &gn + &bn - &(rn * 2.0);

        let std1 = dsp::std(&s1);
        let std2 = dsp::std(&s2);
        let alpha = if std2 <= f32::EPSILON { 0.0 } else { std1 / std2 };

        let window_pulse = &s1 + &(s2 * alpha);
        let mean = window_pulse.mean().unwrap_or(0.0);

        let mut target = h.slice_mut(s![start..end]);
        target.zip_mut_with(&window_pulse, |acc, &v| *acc += v - mean);
    }

    h
}
