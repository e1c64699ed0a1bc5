//! 68-point face landmarks (iBUG / multi-PIE layout) with named groups.
//!
//! Coordinates are in source-image pixel space.

use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

/// Number of points in a full landmark set
pub const NUM_FACIAL_LANDMARKS: usize = 68;

const JAW: Range<usize> = 0..17;
const LEFT_EYEBROW: Range<usize> = 17..22;
const RIGHT_EYEBROW: Range<usize> = 22..27;
const NOSE: Range<usize> = 27..36;
const LEFT_EYE: Range<usize> = 36..42;
const RIGHT_EYE: Range<usize> = 42..48;
const MOUTH: Range<usize> = 48..68;

#[derive(Error, Debug, PartialEq)]
pub enum LandmarkError {
    #[error("Expected {expected} landmarks, got {actual}")]
    WrongCount { expected: usize, actual: usize },
    #[error("Landmark {0} is not finite")]
    NonFinite(usize),
}

/// A point in image pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn midpoint(&self, other: &Point2) -> Point2 {
        Point2::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Landmarks for one detected face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point2>", into = "Vec<Point2>")]
pub struct FaceLandmarks {
    points: Vec<Point2>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<Point2>) -> Result<Self, LandmarkError> {
        if points.len() != NUM_FACIAL_LANDMARKS {
            return Err(LandmarkError::WrongCount {
                expected: NUM_FACIAL_LANDMARKS,
                actual: points.len(),
            });
        }
        if let Some(i) = points.iter().position(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(LandmarkError::NonFinite(i));
        }
        Ok(Self { points })
    }

    pub fn positions(&self) -> &[Point2] {
        &self.points
    }

    pub fn jaw(&self) -> &[Point2] {
        &self.points[JAW]
    }

    pub fn left_eyebrow(&self) -> &[Point2] {
        &self.points[LEFT_EYEBROW]
    }

    pub fn right_eyebrow(&self) -> &[Point2] {
        &self.points[RIGHT_EYEBROW]
    }

    pub fn nose(&self) -> &[Point2] {
        &self.points[NOSE]
    }

    pub fn left_eye(&self) -> &[Point2] {
        &self.points[LEFT_EYE]
    }

    pub fn right_eye(&self) -> &[Point2] {
        &self.points[RIGHT_EYE]
    }

    pub fn mouth(&self) -> &[Point2] {
        &self.points[MOUTH]
    }

    /// Midpoint between the outer corner of the left eye and the inner
    /// corner of the right eye (left eye point 0, right eye point 3).
    pub fn eye_center(&self) -> Option<Point2> {
        let left = self.left_eye().first()?;
        let right = self.right_eye().get(3)?;
        Some(left.midpoint(right))
    }
}

impl TryFrom<Vec<Point2>> for FaceLandmarks {
    type Error = LandmarkError;

    fn try_from(points: Vec<Point2>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<FaceLandmarks> for Vec<Point2> {
    fn from(landmarks: FaceLandmarks) -> Self {
        landmarks.points
    }
}
