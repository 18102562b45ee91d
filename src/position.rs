//! Pane position vocabulary: where a pane sits in the split grid.

use std::fmt;

/// Horizontal placement within a tab's split layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HorizontalPos {
    Left,
    Center,
    Right,
}

/// Vertical placement within a tab's split layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerticalPos {
    Upper,
    Middle,
    Lower,
}

impl fmt::Display for HorizontalPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HorizontalPos::Left => write!(f, "left"),
            HorizontalPos::Center => write!(f, "center"),
            HorizontalPos::Right => write!(f, "right"),
        }
    }
}

impl fmt::Display for VerticalPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerticalPos::Upper => write!(f, "upper"),
            VerticalPos::Middle => write!(f, "middle"),
            VerticalPos::Lower => write!(f, "lower"),
        }
    }
}

/// A spoken target position like "upper left" or "bottom right".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanePosition {
    pub horizontal: HorizontalPos,
    pub vertical: VerticalPos,
}

impl PanePosition {
    pub fn new(horizontal: HorizontalPos, vertical: VerticalPos) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }
}

impl fmt::Display for PanePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.vertical, self.horizontal)
    }
}
