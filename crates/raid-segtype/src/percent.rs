//! Sync progress as an exact fraction.

use std::fmt;

/// Completion expressed as `numerator / denominator` without rounding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Percent {
    pub numerator: u64,
    pub denominator: u64,
}

impl Percent {
    #[must_use]
    pub const fn new(numerator: u64, denominator: u64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Progress in hundredths of a percent (`10_000` is complete), truncated.
    ///
    /// An empty fraction (`0/0`) counts as complete: there is nothing left to sync.
    #[must_use]
    pub fn hundredths(&self) -> u64 {
        if self.denominator == 0 {
            return 10_000;
        }
        let scaled = u128::from(self.numerator) * 10_000 / u128::from(self.denominator);
        u64::try_from(scaled).unwrap_or(u64::MAX)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.numerator >= self.denominator
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> f64 {
        if self.denominator == 0 {
            return 100.0;
        }
        self.numerator as f64 * 100.0 / self.denominator as f64
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = self.hundredths();
        write!(f, "{}.{:02}%", h / 100, h % 100)
    }
}

/// Running sums across the segments of one volume.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PercentTotals {
    pub numerator: u64,
    pub denominator: u64,
}

impl PercentTotals {
    pub const fn add(&mut self, p: Percent) {
        self.numerator = self.numerator.saturating_add(p.numerator);
        self.denominator = self.denominator.saturating_add(p.denominator);
    }

    #[must_use]
    pub const fn percent(&self) -> Percent {
        Percent::new(self.numerator, self.denominator)
    }
}
