//! Rational beat positions as written by JSON-tree charts.

/// A beat written as `whole + numerator / denominator`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BeatTriplet {
    /// Whole beats.
    pub whole: i64,
    /// Numerator of the fractional part. May exceed the denominator.
    pub numerator: i64,
    /// Denominator of the fractional part.
    pub denominator: i64,
}

impl BeatTriplet {
    /// Creates a new triplet.
    #[must_use]
    pub const fn new(whole: i64, numerator: i64, denominator: i64) -> Self {
        Self {
            whole,
            numerator,
            denominator,
        }
    }

    /// Carries numerator overflow into the whole beats, so that `0 <= numerator < denominator`.
    /// A numerator equal to the denominator carries a whole beat.
    ///
    /// A non-positive denominator has no fractional part and is normalized to `n/1`.
    /// Returns `None` if the whole beats overflow.
    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        if self.denominator <= 0 {
            return Some(Self::new(self.whole, 0, 1));
        }
        let (carry, numerator) = self.split_numerator();
        Some(Self::new(
            self.whole.checked_add(carry)?,
            numerator,
            self.denominator,
        ))
    }

    /// The beat as a float.
    #[must_use]
    pub fn to_beats(self) -> f32 {
        if self.denominator <= 0 {
            return self.whole as f32;
        }
        let (carry, numerator) = self.split_numerator();
        (self.whole as f64 + carry as f64 + numerator as f64 / self.denominator as f64) as f32
    }

    fn split_numerator(self) -> (i64, i64) {
        use num::Integer;

        self.numerator.div_mod_floor(&self.denominator)
    }
}

impl From<[i64; 3]> for BeatTriplet {
    fn from([whole, numerator, denominator]: [i64; 3]) -> Self {
        Self::new(whole, numerator, denominator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflowing_numerator_carries() {
        assert_eq!(
            BeatTriplet::new(1, 7, 4).normalized(),
            Some(BeatTriplet::new(2, 3, 4))
        );
        assert_eq!(
            BeatTriplet::new(1, 4, 4).normalized(),
            Some(BeatTriplet::new(2, 0, 4))
        );
        assert!((BeatTriplet::new(1, 7, 4).to_beats() - 2.75).abs() < f32::EPSILON);
    }

    #[test]
    fn zero_numerator_is_exact() {
        assert_eq!(BeatTriplet::new(17, 0, 3).to_beats(), 17.0);
    }

    #[test]
    fn whole_overflow_is_detected() {
        assert_eq!(BeatTriplet::new(i64::MAX, 5, 4).normalized(), None);
        assert_eq!(
            BeatTriplet::new(i64::MAX, 3, 4).normalized().map(|t| t.whole),
            Some(i64::MAX)
        );
        assert!(BeatTriplet::new(i64::MAX, 5, 4).to_beats().is_finite());
    }

    #[test]
    fn zero_denominator_drops_fraction() {
        assert_eq!(BeatTriplet::from([3, 1, 0]).to_beats(), 3.0);
    }
}
