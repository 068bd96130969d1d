//! Player input and its projection onto units.

use glam::Vec2;

/// Phase of a touch point in the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TouchPhase {
    /// The touch started this frame.
    Began,
    /// The touch moved this frame.
    Moved,
    /// The touch stayed where it was.
    Stationary,
    /// The touch was lifted.
    Ended,
    /// The touch was taken away by the system.
    Canceled,
}

impl TouchPhase {
    /// Whether the touch is still on the screen.
    #[must_use]
    pub const fn is_live(self) -> bool {
        !matches!(self, Self::Ended | Self::Canceled)
    }
}

/// One touch point in one frame, in chart coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TouchSample {
    /// Identifier stable across the frames of one touch.
    pub id: u64,
    /// Position.
    pub position: Vec2,
    /// Phase.
    pub phase: TouchPhase,
}

impl TouchSample {
    /// A new sample.
    #[must_use]
    pub const fn new(id: u64, position: Vec2, phase: TouchPhase) -> Self {
        Self {
            id,
            position,
            phase,
        }
    }
}

/// Where a unit is and how it is turned, in chart coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LanePose {
    /// Point the unit line passes through.
    pub anchor: Vec2,
    /// Rotation in degrees, counterclockwise.
    pub rotation_deg: f32,
}

impl LanePose {
    /// A new pose.
    #[must_use]
    pub const fn new(anchor: Vec2, rotation_deg: f32) -> Self {
        Self {
            anchor,
            rotation_deg,
        }
    }

    /// Unit vector along the line. Multiples of 180 degrees are exactly horizontal.
    #[must_use]
    pub fn direction(&self) -> Vec2 {
        let half_turns = self.rotation_deg / 180.0;
        if half_turns.fract() == 0.0 {
            let sign = if half_turns.rem_euclid(2.0) == 0.0 { 1.0 } else { -1.0 };
            return Vec2::new(sign, 0.0);
        }
        Vec2::from_angle(self.rotation_deg.to_radians())
    }

    /// Position of the foot of the perpendicular from `point`, measured along the line from the anchor.
    #[must_use]
    pub fn project(&self, point: Vec2) -> f32 {
        (point - self.anchor).dot(self.direction())
    }
}

/// Whether `touch` lands within `half_width` of a note at `note_x` on `lane`.
#[must_use]
pub fn touches_note(lane: &LanePose, touch: Vec2, note_x: f32, half_width: f32) -> bool {
    (lane.project(touch) - note_x).abs() <= half_width
}
