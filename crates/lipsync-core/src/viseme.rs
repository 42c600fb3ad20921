//! Mouth-shape symbols produced by the cue analyzer.
//!
//! The analyzer emits one of nine letters per cue. Each letter also has a
//! stable image index that downstream consumers (the `cast_image` action)
//! use to pick a mouth picture.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CueError;

/// Index used for any letter that has no image of its own.
pub const FALLBACK_INDEX: u8 = 8;

/// A viseme (mouth shape) symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Viseme {
    /// Closed mouth for "P", "B" and "M" sounds.
    A,
    /// Slightly open mouth, clenched teeth.
    B,
    /// Open mouth.
    C,
    /// Wide open mouth.
    D,
    /// Slightly rounded mouth.
    E,
    /// Puckered lips.
    F,
    /// Upper teeth touching the lower lip ("F", "V").
    G,
    /// Tongue raised behind the upper teeth ("L").
    H,
    /// Idle position, used for pauses.
    X,
}

impl Viseme {
    /// All symbols in image-index order.
    pub const ALL: [Self; 9] = [
        Self::A,
        Self::B,
        Self::C,
        Self::D,
        Self::E,
        Self::F,
        Self::G,
        Self::H,
        Self::X,
    ];

    /// The single-letter form used in cue files and on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
            Self::F => "F",
            Self::G => "G",
            Self::H => "H",
            Self::X => "X",
        }
    }

    /// Image index for this shape (`A` = 0 ... `X` = 8).
    pub const fn index(self) -> u8 {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
            Self::E => 4,
            Self::F => 5,
            Self::G => 6,
            Self::H => 7,
            Self::X => FALLBACK_INDEX,
        }
    }

    /// Reverse of [`Viseme::index`]. Unknown indices map to the idle shape.
    pub fn from_index(index: u8) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.index() == index)
            .unwrap_or(Self::X)
    }
}

impl fmt::Display for Viseme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Viseme {
    type Err = CueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s.trim())
            .ok_or_else(|| CueError::UnknownViseme(s.to_string()))
    }
}

impl TryFrom<String> for Viseme {
    type Error = CueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Viseme> for String {
    fn from(value: Viseme) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip_covers_alphabet() {
        for (i, v) in Viseme::ALL.iter().enumerate() {
            assert_eq!(usize::from(v.index()), i);
            assert_eq!(Viseme::from_index(v.index()), *v);
        }
    }

    #[test]
    fn test_unknown_index_falls_back_to_idle() {
        assert_eq!(Viseme::from_index(42), Viseme::X);
    }

    #[test]
    fn test_parse_rejects_unknown_symbol() {
        let err = "Z".parse::<Viseme>().unwrap_err();
        assert!(matches!(err, CueError::UnknownViseme(ref s) if s == "Z"));
    }

    #[test]
    fn test_serde_uses_letter() {
        let json = serde_json::to_string(&Viseme::G).unwrap();
        assert_eq!(json, "\"G\"");
        let back: Viseme = serde_json::from_str("\"H\"").unwrap();
        assert_eq!(back, Viseme::H);
        assert!(serde_json::from_str::<Viseme>("\"nope\"").is_err());
    }
}
