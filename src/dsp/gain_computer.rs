//! Static gain computer
//!
//! Maps an input level in dB to a gain reduction in dB (0 = no reduction,
//! positive values attenuate). Below `threshold - knee/2` nothing happens,
//! above `threshold + knee/2` the curve is the straight `1/ratio` line, and
//! in between a quadratic knee joins the two with matching slope.

/// Stateless transfer curve for one compressor band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainComputer {
    threshold_db: f32,
    ratio: f32,
    knee_db: f32,
}

impl GainComputer {
    /// Create a gain computer. `ratio` below 1 and negative knees are clamped.
    pub fn new(threshold_db: f32, ratio: f32, knee_db: f32) -> Self {
        Self {
            threshold_db,
            ratio: ratio.max(1.0),
            knee_db: knee_db.max(0.0),
        }
    }

    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn knee_db(&self) -> f32 {
        self.knee_db
    }

    /// Gain reduction in dB (>= 0) for an input level in dB
    #[inline]
    pub fn reduction_db(&self, level_db: f32) -> f32 {
        let slope = 1.0 - 1.0 / self.ratio;
        let over = level_db - self.threshold_db;
        let half_knee = self.knee_db * 0.5;

        if over <= -half_knee {
            // Also covers -inf (silence)
            0.0
        } else if over >= half_knee {
            over * slope
        } else {
            // Soft knee: quadratic from 0 at the knee start to the line at the knee end
            let x = over + half_knee;
            slope * x * x / (2.0 * self.knee_db)
        }
    }

    /// Output level in dB for an input level in dB
    #[inline]
    pub fn output_db(&self, level_db: f32) -> f32 {
        level_db - self.reduction_db(level_db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use test_case::test_case;

    #[test]
    fn test_no_reduction_below_knee() {
        let gc = GainComputer::new(-20.0, 4.0, 6.0);
        for level in [-120.0, -60.0, -30.0, -23.0] {
            assert_eq!(gc.reduction_db(level), 0.0, "level {}", level);
        }
        assert_eq!(gc.reduction_db(f32::NEG_INFINITY), 0.0);
    }

    #[test_case(-17.0, 2.25 ; "at knee end")]
    #[test_case(-12.0, 6.0 ; "8 dB over")]
    #[test_case(0.0, 15.0 ; "full scale")]
    #[test_case(6.0, 19.5 ; "above full scale")]
    fn test_straight_line_above_knee(level: f32, expected: f32) {
        let gc = GainComputer::new(-20.0, 4.0, 6.0);
        assert_abs_diff_eq!(gc.reduction_db(level), expected, epsilon = 1e-4);
    }

    #[test]
    fn test_hard_knee() {
        let gc = GainComputer::new(-20.0, 4.0, 0.0);
        assert_eq!(gc.reduction_db(-20.0), 0.0);
        // 8 dB over a 4:1 threshold leaves 2 dB, i.e. 6 dB of reduction
        assert_abs_diff_eq!(gc.reduction_db(-12.0), 6.0, epsilon = 1e-5);
        assert_abs_diff_eq!(gc.output_db(-12.0), -18.0, epsilon = 1e-5);
    }

    #[test]
    fn test_knee_is_continuous_at_both_edges() {
        let gc = GainComputer::new(-18.0, 8.0, 12.0);
        let eps = 1e-3;
        for edge in [-24.0f32, -12.0] {
            let below = gc.reduction_db(edge - eps);
            let above = gc.reduction_db(edge + eps);
            assert!((below - above).abs() < 1e-2, "jump at {}: {} vs {}", edge, below, above);
        }
    }

    #[test]
    fn test_knee_is_monotonic() {
        let gc = GainComputer::new(-10.0, 4.0, 10.0);
        let mut last = 0.0;
        let mut level = -20.0;
        while level <= 0.0 {
            let r = gc.reduction_db(level);
            assert!(r >= last);
            last = r;
            level += 0.25;
        }
    }

    #[test]
    fn test_unity_ratio_never_reduces() {
        let gc = GainComputer::new(-30.0, 1.0, 6.0);
        assert_eq!(gc.reduction_db(0.0), 0.0);
        let clamped = GainComputer::new(-30.0, 0.5, -1.0);
        assert_eq!(clamped.ratio(), 1.0);
        assert_eq!(clamped.knee_db(), 0.0);
    }
}
