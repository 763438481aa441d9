//! Curve thinning.
//!
//! Removes knots that add nothing visible to a sampled curve. Working in
//! scaled coordinates, a run of points is dropped while the chord from the
//! last kept point to each of them stays within the angular tolerance of
//! that kept point's incoming direction. The first point past the tolerance
//! is kept and becomes the next anchor.

/// Tolerance and axis scales for [`thin`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thinning {
    /// Maximum angular deviation, in degrees
    pub tolerance_deg: f64,
    pub x_scale: f64,
    pub y_scale: f64,
}

impl Thinning {
    /// Scales for a curve over `[0, duration]`: time by the duration and
    /// values by their range.
    pub fn for_curve(tolerance_deg: f64, duration: f64, values: &[f64]) -> Self {
        let (lo, hi) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        let range = hi - lo;
        Self {
            tolerance_deg,
            x_scale: if duration > 0.0 { duration } else { 1.0 },
            y_scale: if range > 0.0 && range.is_finite() { range } else { 1.0 },
        }
    }

    fn angle(&self, x0: f64, y0: f64, x1: f64, y1: f64) -> f64 {
        let dx = (x1 - x0) / self.x_scale;
        let dy = (y1 - y0) / self.y_scale;
        dy.atan2(dx).to_degrees()
    }
}

/// Thin `times`/`values` in place, leaving indices `..=from` and the last
/// point untouched. Returns the number of points removed.
///
/// Applying it twice with the same `from` and rule removes nothing more.
pub fn thin(times: &mut Vec<f64>, values: &mut Vec<f64>, from: usize, rule: &Thinning) -> usize {
    let n = times.len().min(values.len());
    let from = from.max(1);
    if n < from + 3 {
        return 0;
    }

    let mut keep = vec![true; n];
    let mut previous = from - 1;
    let mut anchor = from;
    let mut next = anchor + 1;
    while next < n - 1 {
        let reference = rule.angle(times[previous], values[previous], times[anchor], values[anchor]);
        let mut candidate = next;
        while candidate < n - 1 {
            let chord = rule.angle(times[anchor], values[anchor], times[candidate], values[candidate]);
            if (chord - reference).abs() > rule.tolerance_deg {
                break;
            }
            keep[candidate] = false;
            candidate += 1;
        }
        if candidate == n - 1 {
            break;
        }
        previous = anchor;
        anchor = candidate;
        next = anchor + 1;
    }

    let mut index = 0;
    times.retain(|_| {
        index += 1;
        keep[index - 1]
    });
    let mut index = 0;
    values.retain(|_| {
        index += 1;
        keep[index - 1]
    });
    keep.iter().filter(|k| !**k).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rule() -> Thinning {
        Thinning {
            tolerance_deg: 0.1,
            x_scale: 1.0,
            y_scale: 1.0,
        }
    }

    #[test]
    fn test_straight_line_collapses() {
        let mut times: Vec<f64> = (0..100).map(|i| i as f64 / 99.0).collect();
        let mut values: Vec<f64> = times.iter().map(|t| 2.0 * t + 1.0).collect();
        let removed = thin(&mut times, &mut values, 1, &rule());
        assert_eq!(removed, 97);
        assert_eq!(times, vec![0.0, 1.0 / 99.0, 1.0]);
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn test_corner_is_kept() {
        // up then flat: the first flat point breaks the tolerance
        let mut times: Vec<f64> = (0..21).map(|i| i as f64).collect();
        let mut values: Vec<f64> = times.iter().map(|t| t.min(10.0)).collect();
        thin(&mut times, &mut values, 1, &rule());
        assert!(times.contains(&11.0));
        assert_eq!(times.first(), Some(&0.0));
        assert_eq!(times.last(), Some(&20.0));
    }

    #[test]
    fn test_short_curves_untouched() {
        let mut times = vec![0.0, 1.0, 2.0];
        let mut values = vec![0.0, 1.0, 2.0];
        assert_eq!(thin(&mut times, &mut values, 1, &rule()), 0);
        assert_eq!(times.len(), 3);
    }

    #[test]
    fn test_scales_from_curve() {
        let r = Thinning::for_curve(0.1, 5.0, &[1.0, -3.0, 2.0]);
        assert_eq!(r.x_scale, 5.0);
        assert_eq!(r.y_scale, 5.0);
        let flat = Thinning::for_curve(0.1, 5.0, &[1.0, 1.0]);
        assert_eq!(flat.y_scale, 1.0);
    }

    #[test]
    fn test_dropped_points_stay_near_chords() {
        let dense_t: Vec<f64> = (0..2000).map(|i| 5.0 * i as f64 / 1999.0).collect();
        let dense_v: Vec<f64> = dense_t.iter().map(|t| (-t).exp()).collect();
        let r = Thinning::for_curve(0.1, 5.0, &dense_v);
        let (mut times, mut values) = (dense_t.clone(), dense_v.clone());
        let removed = thin(&mut times, &mut values, 1, &r);
        assert!(removed > 500, "only {} removed", removed);

        for (t, v) in dense_t.iter().zip(&dense_v) {
            let k = times.partition_point(|x| x <= t).clamp(1, times.len() - 1);
            let (ax, ay) = (times[k - 1] / r.x_scale, values[k - 1] / r.y_scale);
            let (bx, by) = (times[k] / r.x_scale, values[k] / r.y_scale);
            let (px, py) = (t / r.x_scale, v / r.y_scale);
            let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
            let distance = cross.abs() / (bx - ax).hypot(by - ay);
            assert!(distance < 1e-2, "t = {}: {}", t, distance);
        }
    }

    proptest! {
        #[test]
        fn prop_thinning_is_idempotent(
            steps in prop::collection::vec((0.01f64..1.0, -1.0f64..1.0), 3..200),
            from in 1usize..4,
        ) {
            let mut times = vec![0.0];
            let mut values = vec![0.0];
            for (dt, dv) in steps {
                times.push(times[times.len() - 1] + dt);
                values.push(values[values.len() - 1] + dv);
            }
            let head: Vec<f64> = times.iter().take(from + 1).copied().collect();
            let last = times[times.len() - 1];

            let r = Thinning { tolerance_deg: 5.0, x_scale: 1.0, y_scale: 1.0 };
            thin(&mut times, &mut values, from, &r);
            let (once_t, once_v) = (times.clone(), values.clone());
            prop_assert_eq!(thin(&mut times, &mut values, from, &r), 0);
            prop_assert_eq!(&times, &once_t);
            prop_assert_eq!(&values, &once_v);
            prop_assert!(times.starts_with(&head));
            prop_assert_eq!(times[times.len() - 1], last);
        }
    }
}
