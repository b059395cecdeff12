//! Local-maximum search with minimum-distance pruning

/// Indices of strict local maxima.
///
/// A peak needs a strictly lower left neighbour and a strictly lower sample
/// after any flat run. Flat tops report their middle index (left-biased for
/// even widths). The first and last samples are never peaks.
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }

    let i_max = x.len() - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut i_ahead = i + 1;
            while i_ahead < i_max && x[i_ahead] == x[i] {
                i_ahead += 1;
            }

            if x[i_ahead] < x[i] {
                let left = i;
                let right = i_ahead - 1;
                peaks.push((left + right) / 2);
                i = i_ahead;
            }
        }
        i += 1;
    }

    peaks
}

/// Local maxima at least `distance` samples apart.
///
/// Higher peaks win. Equal heights are visited latest-first, so the later of
/// two tied neighbours survives.
pub fn find_peaks(x: &[f64], distance: usize) -> Vec<usize> {
    let peaks = local_maxima(x);
    if distance <= 1 || peaks.len() < 2 {
        return peaks;
    }

    // Stable ascending order by height, walked from the top
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| x[peaks[a]].total_cmp(&x[peaks[b]]));

    let mut keep = vec![true; peaks.len()];
    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }

        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }

        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks.into_iter()
        .zip(keep)
        .filter_map(|(peak, kept)| kept.then_some(peak))
        .collect()
}

/// Height of each peak above the higher of its two flanking minima.
///
/// Each flank extends until a sample higher than the peak or the edge of
/// the signal.
pub fn prominences(x: &[f64], peaks: &[usize]) -> Vec<f64> {
    peaks.iter()
        .map(|&peak| {
            let height = x[peak];
            let left = flank_min(x[..peak].iter().rev(), height);
            let right = flank_min(x[peak + 1..].iter(), height);
            height - left.max(right)
        })
        .collect()
}

fn flank_min<'a>(flank: impl Iterator<Item = &'a f64>, height: f64) -> f64 {
    flank.take_while(|&&v| v <= height).fold(height, |min, &v| min.min(v))
}

/// Up to `count` peaks ranked by absolute value, ties in input order
pub fn top_by_magnitude(x: &[f64], peaks: &[usize], count: usize) -> Vec<usize> {
    let mut ranked = peaks.to_vec();
    ranked.sort_by(|&a, &b| x[b].abs().total_cmp(&x[a].abs()));
    ranked.truncate(count);
    ranked
}

/// Index of the largest absolute value; the first one on ties
pub fn argmax_abs<I>(values: I) -> Option<usize>
where
    I: IntoIterator<Item = f64>,
{
    let mut best: Option<(usize, f64)> = None;
    for (i, value) in values.into_iter().enumerate() {
        let magnitude = value.abs();
        match best {
            Some((_, current)) if magnitude <= current => {}
            _ => best = Some((i, magnitude)),
        }
    }
    best.map(|(i, _)| i)
}
