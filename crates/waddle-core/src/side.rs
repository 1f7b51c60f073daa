use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// A foot of the biped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Both sides, left first.
    pub const BOTH: [Self; 2] = [Self::Left, Self::Right];

    /// The opposite foot.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Lateral sign of the foot in the trunk frame (+1 left, -1 right).
    #[must_use]
    pub const fn sign(self) -> f64 {
        match self {
            Self::Left => 1.0,
            Self::Right => -1.0,
        }
    }

    /// Index into `[left, right]` pairs.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.pad("left"),
            Self::Right => f.pad("right"),
        }
    }
}

// ---------------------------------------------------------------------------
// SupportSide
// ---------------------------------------------------------------------------

/// Which feet are load-bearing during a support phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportSide {
    Left,
    Right,
    Both,
}

impl SupportSide {
    /// Whether `side` is on the ground in this phase.
    #[must_use]
    pub const fn contains(self, side: Side) -> bool {
        match (self, side) {
            (Self::Both, _) | (Self::Left, Side::Left) | (Self::Right, Side::Right) => true,
            (Self::Left, Side::Right) | (Self::Right, Side::Left) => false,
        }
    }

    /// The foot in the air, if any.
    #[must_use]
    pub const fn swing(self) -> Option<Side> {
        match self {
            Self::Left => Some(Side::Right),
            Self::Right => Some(Side::Left),
            Self::Both => None,
        }
    }

    #[must_use]
    pub const fn is_both(self) -> bool {
        matches!(self, Self::Both)
    }
}

impl From<Side> for SupportSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Left => Self::Left,
            Side::Right => Self::Right,
        }
    }
}

impl fmt::Display for SupportSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.pad("left"),
            Self::Right => f.pad("right"),
            Self::Both => f.pad("both"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_is_involution() {
        for side in Side::BOTH {
            assert_eq!(side.other().other(), side);
            assert_ne!(side.other(), side);
        }
    }

    #[test]
    fn sign_matches_lateral_convention() {
        assert!((Side::Left.sign() - 1.0).abs() < f64::EPSILON);
        assert!((Side::Right.sign() + 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn support_contains() {
        assert!(SupportSide::Both.contains(Side::Left));
        assert!(SupportSide::Both.contains(Side::Right));
        assert!(SupportSide::Left.contains(Side::Left));
        assert!(!SupportSide::Left.contains(Side::Right));
        assert!(!SupportSide::Right.contains(Side::Left));
    }

    #[test]
    fn swing_foot_is_opposite_of_support() {
        assert_eq!(SupportSide::Left.swing(), Some(Side::Right));
        assert_eq!(SupportSide::Right.swing(), Some(Side::Left));
        assert_eq!(SupportSide::Both.swing(), None);
    }

    #[test]
    fn serde_uses_snake_case() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            side: SupportSide,
        }
        let text = toml::to_string(&Wrapper {
            side: SupportSide::Both,
        })
        .unwrap();
        assert!(text.contains("\"both\""));
        let back: Wrapper = toml::from_str("side = \"left\"").unwrap();
        assert_eq!(back.side, SupportSide::Left);
    }
}
