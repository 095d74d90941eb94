//! Peak detection with distance and prominence constraints
//!
//! Follows the selection order of the classic `find_peaks` routine: local
//! maxima (plateaus resolve to their middle sample), then the minimum
//! distance filter keeping the tallest peaks first, then the prominence
//! filter.

/// Peak selection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakParams {
    /// Minimum distance between neighbouring peaks in samples (>= 1)
    pub distance: usize,
    /// Minimum prominence a peak must have
    pub prominence: f32,
}

/// Indices of all local maxima, plateau peaks reported at their middle.
fn local_maxima(x: &[f32]) -> Vec<usize> {
    let n = x.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }

    let mut i = 1;
    let i_max = n - 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < i_max && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                let left = i;
                let right = ahead - 1;
                peaks.push((left + right) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Drop peaks closer than `distance` samples to a taller kept peak.
fn select_by_distance(x: &[f32], peaks: &[usize], distance: usize) -> Vec<usize> {
    if distance <= 1 || peaks.len() < 2 {
        return peaks.to_vec();
    }

    let mut keep = vec![true; peaks.len()];

    // Tallest first; ties resolved towards the later peak
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| x[peaks[a]].total_cmp(&x[peaks[b]]).then(a.cmp(&b)));

    for &idx in order.iter().rev() {
        if !keep[idx] {
            continue;
        }

        let mut k = idx;
        while k > 0 && peaks[idx] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }

        let mut k = idx + 1;
        while k < peaks.len() && peaks[k] - peaks[idx] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}

/// Topographic prominence of each peak.
pub fn peak_prominences(x: &[f32], peaks: &[usize]) -> Vec<f32> {
    peaks
        .iter()
        .map(|&peak| {
            let height = x[peak];

            let mut left_min = height;
            let mut i = peak;
            loop {
                if x[i] > height {
                    break;
                }
                left_min = left_min.min(x[i]);
                if i == 0 {
                    break;
                }
                i -= 1;
            }

            let mut right_min = height;
            let mut i = peak;
            while i < x.len() && x[i] <= height {
                right_min = right_min.min(x[i]);
                i += 1;
            }

            height - left_min.max(right_min)
        })
        .collect()
}

/// Indices of peaks in `x` satisfying `params`, in ascending order.
pub fn find_peaks(x: &[f32], params: &PeakParams) -> Vec<usize> {
    let maxima = local_maxima(x);
    let spaced = select_by_distance(x, &maxima, params.distance.max(1));
    let prominences = peak_prominences(x, &spaced);

    spaced
        .into_iter()
        .zip(prominences)
        .filter_map(|(p, prom)| (prom >= params.prominence).then_some(p))
        .collect()
}
