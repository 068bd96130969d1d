//! The fixed table of easing curves unit events may use.
//!
//! Every curve maps `[0, 1]` onto a curve with `f(0) == 0` and `f(1) == 1`.
//! Charts refer to curves by a numeric id in `1..=29`.

use std::f32::consts::PI;

use crate::error::{ChartError, Result};

/// An easing curve.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum EasingFunction {
    #[default]
    Linear,
    OutSine,
    InSine,
    OutQuad,
    InQuad,
    InOutSine,
    InOutQuad,
    OutCubic,
    InCubic,
    OutQuart,
    InQuart,
    InOutCubic,
    InOutQuart,
    OutQuint,
    InQuint,
    OutExpo,
    InExpo,
    OutCirc,
    InCirc,
    OutBack,
    InBack,
    InOutCirc,
    InOutBack,
    OutElastic,
    InElastic,
    OutBounce,
    InBounce,
    InOutBounce,
    InOutElastic,
}

const BACK: f32 = 1.701_58;
const BACK_IN_OUT: f32 = BACK * 1.525;
const ELASTIC: f32 = 2.0 * PI / 3.0;
const ELASTIC_IN_OUT: f32 = 2.0 * PI / 4.5;

fn out_bounce(t: f32) -> f32 {
    const N: f32 = 7.5625;
    const D: f32 = 2.75;
    if t < 1.0 / D {
        N * t * t
    } else if t < 2.0 / D {
        let t = t - 1.5 / D;
        N * t * t + 0.75
    } else if t < 2.5 / D {
        let t = t - 2.25 / D;
        N * t * t + 0.9375
    } else {
        let t = t - 2.625 / D;
        N * t * t + 0.984_375
    }
}

impl EasingFunction {
    /// Curves in id order, the id being the index plus one.
    pub const TABLE: [Self; 29] = [
        Self::Linear,
        Self::OutSine,
        Self::InSine,
        Self::OutQuad,
        Self::InQuad,
        Self::InOutSine,
        Self::InOutQuad,
        Self::OutCubic,
        Self::InCubic,
        Self::OutQuart,
        Self::InQuart,
        Self::InOutCubic,
        Self::InOutQuart,
        Self::OutQuint,
        Self::InQuint,
        Self::OutExpo,
        Self::InExpo,
        Self::OutCirc,
        Self::InCirc,
        Self::OutBack,
        Self::InBack,
        Self::InOutCirc,
        Self::InOutBack,
        Self::OutElastic,
        Self::InElastic,
        Self::OutBounce,
        Self::InBounce,
        Self::InOutBounce,
        Self::InOutElastic,
    ];

    /// Looks up a curve by its chart id.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::UnknownEasingId`] for ids outside `1..=29`.
    pub fn from_id(id: i64) -> Result<Self> {
        usize::try_from(id)
            .ok()
            .and_then(|id| id.checked_sub(1))
            .and_then(|index| Self::TABLE.get(index).copied())
            .ok_or(ChartError::UnknownEasingId { id, offset: 0 })
    }

    /// The chart id of this curve.
    #[must_use]
    pub fn id(self) -> i64 {
        Self::TABLE
            .iter()
            .position(|&curve| curve == self)
            .map_or(1, |index| index as i64 + 1)
    }

    /// Evaluates the curve at `t`, clamped to `[0, 1]`.
    #[must_use]
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        let inv = 1.0 - t;
        match self {
            Self::Linear => t,
            Self::OutSine => (t * PI / 2.0).sin(),
            Self::InSine => 1.0 - (t * PI / 2.0).cos(),
            Self::OutQuad => 1.0 - inv.powi(2),
            Self::InQuad => t.powi(2),
            Self::InOutSine => -((PI * t).cos() - 1.0) / 2.0,
            Self::InOutQuad => in_out(t, |t| t.powi(2)),
            Self::OutCubic => 1.0 - inv.powi(3),
            Self::InCubic => t.powi(3),
            Self::OutQuart => 1.0 - inv.powi(4),
            Self::InQuart => t.powi(4),
            Self::InOutCubic => in_out(t, |t| t.powi(3)),
            Self::InOutQuart => in_out(t, |t| t.powi(4)),
            Self::OutQuint => 1.0 - inv.powi(5),
            Self::InQuint => t.powi(5),
            Self::OutExpo => {
                if t >= 1.0 {
                    1.0
                } else {
                    1.0 - 2f32.powf(-10.0 * t)
                }
            }
            Self::InExpo => {
                if t <= 0.0 {
                    0.0
                } else {
                    2f32.powf(10.0 * t - 10.0)
                }
            }
            Self::OutCirc => (1.0 - inv.powi(2)).sqrt(),
            Self::InCirc => 1.0 - (1.0 - t.powi(2)).sqrt(),
            Self::OutBack => 1.0 + (BACK + 1.0) * (t - 1.0).powi(3) + BACK * (t - 1.0).powi(2),
            Self::InBack => (BACK + 1.0) * t.powi(3) - BACK * t.powi(2),
            Self::InOutCirc => {
                if t < 0.5 {
                    (1.0 - (1.0 - (2.0 * t).powi(2)).sqrt()) / 2.0
                } else {
                    ((1.0 - (-2.0 * t + 2.0).powi(2)).max(0.0).sqrt() + 1.0) / 2.0
                }
            }
            Self::InOutBack => {
                if t < 0.5 {
                    (2.0 * t).powi(2) * ((BACK_IN_OUT + 1.0) * 2.0 * t - BACK_IN_OUT) / 2.0
                } else {
                    ((2.0 * t - 2.0).powi(2) * ((BACK_IN_OUT + 1.0) * (t * 2.0 - 2.0) + BACK_IN_OUT)
                        + 2.0)
                        / 2.0
                }
            }
            Self::OutElastic => {
                if t <= 0.0 || t >= 1.0 {
                    t
                } else {
                    2f32.powf(-10.0 * t) * ((t * 10.0 - 0.75) * ELASTIC).sin() + 1.0
                }
            }
            Self::InElastic => {
                if t <= 0.0 || t >= 1.0 {
                    t
                } else {
                    -(2f32.powf(10.0 * t - 10.0)) * ((t * 10.0 - 10.75) * ELASTIC).sin()
                }
            }
            Self::OutBounce => out_bounce(t),
            Self::InBounce => 1.0 - out_bounce(inv),
            Self::InOutBounce => {
                if t < 0.5 {
                    (1.0 - out_bounce(1.0 - 2.0 * t)) / 2.0
                } else {
                    (1.0 + out_bounce(2.0 * t - 1.0)) / 2.0
                }
            }
            Self::InOutElastic => {
                if t <= 0.0 || t >= 1.0 {
                    t
                } else if t < 0.5 {
                    -(2f32.powf(20.0 * t - 10.0) * ((20.0 * t - 11.125) * ELASTIC_IN_OUT).sin())
                        / 2.0
                } else {
                    2f32.powf(-20.0 * t + 10.0) * ((20.0 * t - 11.125) * ELASTIC_IN_OUT).sin() / 2.0
                        + 1.0
                }
            }
        }
    }

    /// Evaluates only the `[low, high]` part of the curve, stretched back onto `[0, 1]`.
    ///
    /// Falls back to `t` itself when the part has no height.
    #[must_use]
    pub fn ease_range(self, t: f32, low: f32, high: f32) -> f32 {
        if low == 0.0 && high == 1.0 {
            return self.apply(t);
        }
        let from = self.apply(low);
        let to = self.apply(high);
        if (to - from).abs() <= f32::EPSILON {
            return t;
        }
        (self.apply(low + (high - low) * t) - from) / (to - from)
    }
}

/// Mirrors an ease-in curve into an ease-in-out one.
fn in_out(t: f32, ease_in: impl Fn(f32) -> f32) -> f32 {
    if t < 0.5 {
        ease_in(2.0 * t) / 2.0
    } else {
        1.0 - ease_in(2.0 - 2.0 * t) / 2.0
    }
}
