use std::fmt;

/// The gestures the engine can recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    None,
    Rock,
    Pointing,
    Scissors,
    Waving,
}

/// The label shown for a frame, in priority order: calibration first, then
/// hand presence, then motion, then the voted finger count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureLabel {
    Calibrating,
    NoHand,
    Waving,
    Rock,
    Pointing,
    Scissors,
    /// A hand is present but the voted count is unknown or unmapped.
    Searching,
}

impl GestureLabel {
    /// Maps a voted finger count onto a label.
    pub fn from_fingers(fingers: Option<u32>) -> Self {
        match fingers {
            Some(0) => Self::Rock,
            Some(1) => Self::Pointing,
            Some(2) => Self::Scissors,
            _ => Self::Searching,
        }
    }

    pub fn gesture(&self) -> Gesture {
        match self {
            Self::Waving => Gesture::Waving,
            Self::Rock => Gesture::Rock,
            Self::Pointing => Gesture::Pointing,
            Self::Scissors => Gesture::Scissors,
            Self::Calibrating | Self::NoHand | Self::Searching => Gesture::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calibrating => "Calibrating...",
            Self::NoHand => "No hand detected",
            Self::Waving => "Waving",
            Self::Rock => "Rock",
            Self::Pointing => "Pointing",
            Self::Scissors => "Scissors",
            Self::Searching => "Searching...",
        }
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
