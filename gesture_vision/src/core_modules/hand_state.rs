// THEORY:
// The `hand_state` module gives the engine its memory. A segmentation pass only
// knows about the current frame; `HandState` carries what has been learned about
// the single tracked hand from one frame to the next.
//
// Key principles:
// 1.  **Lazy Birth**: no state exists until the first usable silhouette. The
//     pipeline keeps it in an `Option` and seeds it from the first extremities.
// 2.  **Decoupled Cadences**: extremities refresh on every frame, the horizontal
//     center is only resampled by the wave check, and the finger count only
//     changes when a vote window closes.
// 3.  **Presence, not Death**: a frame without a silhouette flips `is_in_frame`
//     and bumps a miss counter. The state itself survives unless the pipeline is
//     configured to drop it after a sustained absence.

use crate::core_modules::gesture_vote::most_frequent;
use imageproc::geometry::convex_hull;
use imageproc::point::Point;

/// The four extremal points of a silhouette's convex hull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extremities {
    pub top: Point<i32>,
    pub bottom: Point<i32>,
    pub left: Point<i32>,
    pub right: Point<i32>,
}

impl Extremities {
    /// Extremal hull points of `contour`, or `None` when the hull is degenerate:
    /// fewer than three points, or no horizontal or vertical extent.
    pub fn from_contour(contour: &[Point<i32>]) -> Option<Self> {
        if contour.len() < 3 {
            return None;
        }
        let hull = convex_hull(contour);
        if hull.len() < 3 {
            return None;
        }

        let extremities = Self {
            top: *hull.iter().min_by_key(|p| p.y)?,
            bottom: *hull.iter().max_by_key(|p| p.y)?,
            left: *hull.iter().min_by_key(|p| p.x)?,
            right: *hull.iter().max_by_key(|p| p.x)?,
        };
        (extremities.width() > 0 && extremities.height() > 0).then_some(extremities)
    }

    /// Horizontal midpoint of the left and right extremities.
    pub fn center_x(&self) -> i32 {
        (self.left.x + self.right.x) / 2
    }

    pub fn width(&self) -> i32 {
        self.right.x - self.left.x
    }

    pub fn height(&self) -> i32 {
        self.bottom.y - self.top.y
    }
}

/// Everything remembered about the tracked hand between frames.
#[derive(Debug, Clone, PartialEq)]
pub struct HandState {
    extremities: Extremities,
    center_x: i32,
    prev_center_x: i32,
    is_in_frame: bool,
    is_waving: bool,
    fingers: Option<u32>,
    gesture_votes: Vec<u32>,
    frames_missing: u32,
}

impl HandState {
    /// Creates the state for a hand seen for the first time.
    pub fn seed(extremities: Extremities) -> Self {
        Self {
            extremities,
            center_x: extremities.center_x(),
            prev_center_x: 0,
            is_in_frame: true,
            is_waving: false,
            fingers: None,
            gesture_votes: Vec::new(),
            frames_missing: 0,
        }
    }

    /// Replaces the extremities. The center is left to `check_wave`.
    pub fn update_extremities(&mut self, extremities: Extremities) {
        self.extremities = extremities;
    }

    /// Resamples the horizontal center and decides whether the hand is waving.
    pub fn check_wave(&mut self, new_center_x: i32, threshold: i32) {
        self.prev_center_x = self.center_x;
        self.center_x = new_center_x;
        self.is_waving = (self.center_x - self.prev_center_x).abs() > threshold;
    }

    pub fn record_vote(&mut self, finger_count: u32) {
        self.gesture_votes.push(finger_count);
    }

    /// Closes the current vote window. `fingers` only changes when the window
    /// held at least one sample.
    pub fn cast_vote(&mut self) -> Option<u32> {
        if let Some(winner) = most_frequent(&self.gesture_votes) {
            self.fingers = Some(winner);
        }
        self.gesture_votes.clear();
        self.fingers
    }

    pub fn mark_in_frame(&mut self) {
        self.is_in_frame = true;
        self.frames_missing = 0;
    }

    /// Flags the hand as absent and returns the length of the current absence.
    pub fn mark_missing(&mut self) -> u32 {
        self.is_in_frame = false;
        self.frames_missing = self.frames_missing.saturating_add(1);
        self.frames_missing
    }

    pub fn extremities(&self) -> &Extremities {
        &self.extremities
    }

    pub fn center_x(&self) -> i32 {
        self.center_x
    }

    pub fn prev_center_x(&self) -> i32 {
        self.prev_center_x
    }

    pub fn is_in_frame(&self) -> bool {
        self.is_in_frame
    }

    pub fn is_waving(&self) -> bool {
        self.is_waving
    }

    pub fn fingers(&self) -> Option<u32> {
        self.fingers
    }

    pub fn gesture_votes(&self) -> &[u32] {
        &self.gesture_votes
    }

    pub fn frames_missing(&self) -> u32 {
        self.frames_missing
    }
}
