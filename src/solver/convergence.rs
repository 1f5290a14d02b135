//! Short-cycle convergence detection shared by the MWM and NAQP solvers.
//!
//! Message passing on the bipartite assignment factor graph does not always
//! settle to a fixed point; it commonly enters a short limit cycle instead.
//! This detector watches the objective-value history for a repeated value
//! within a trailing window, verifies the repetition is a genuine cycle (not
//! a coincidental tie), and if so reports how many further iterations are
//! needed to land back on the cycle's best point.

/// Width of the trailing window searched for a repeated objective value.
const WINDOW: usize = 50;
/// Number of most-recent objectives excluded from the search window, so a
/// value is only considered "repeated" if it reoccurs after a genuine gap.
const SKIP_RECENT: usize = 5;

/// Tracks the objective-value history of a belief-propagation run and
/// detects short limit cycles.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConvergenceDetector {
    history: Vec<f64>,
}

impl ConvergenceDetector {
    pub(crate) fn new() -> Self {
        Self { history: Vec::new() }
    }

    pub(crate) fn push(&mut self, objective: f64) {
        self.history.push(objective);
    }

    pub(crate) fn history(&self) -> &[f64] {
        &self.history
    }

    /// If the current objective closes a short cycle, returns the number of
    /// further iterations needed to land on the cycle's best (highest
    /// objective) point -- `argmax(objective[-pivot..]) + 1`, possibly `0`
    /// if the current point already is the best in the cycle.
    pub(crate) fn check(&self) -> Option<usize> {
        let n = self.history.len();
        let window_start = n.saturating_sub(WINDOW);
        let window_end = n.saturating_sub(SKIP_RECENT);
        if window_start >= window_end {
            return None;
        }
        let patterns = &self.history[window_start..window_end];
        let actual = self.history[n - 1];

        let rev_idx = patterns.iter().rev().position(|&v| v == actual)?;
        let pivot = rev_idx + SKIP_RECENT;
        if pivot == 0 || n < 2 * pivot {
            return None;
        }

        let (earlier, recent) = (&self.history[n - 2 * pivot..n - pivot], &self.history[n - pivot..n]);
        if earlier != recent {
            return None;
        }

        let argmax = recent
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
            .0;
        Some(argmax + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_a_simple_two_cycle() {
        let mut detector = ConvergenceDetector::new();
        // Needs SKIP_RECENT=5 objectives of gap before a repeat is considered.
        let sequence = [1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0];
        let mut last_hit = None;
        for (i, &v) in sequence.iter().enumerate() {
            detector.push(v);
            if let Some(extra) = detector.check() {
                last_hit = Some((i, extra));
            }
        }
        assert!(last_hit.is_some(), "expected the two-cycle to eventually be detected");
    }

    #[test]
    fn no_repeat_means_no_convergence() {
        let mut detector = ConvergenceDetector::new();
        for i in 0..60 {
            detector.push(i as f64);
        }
        assert_eq!(detector.check(), None);
    }
}
