//! Model placement (scale / position / rotation) and its controller

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::trace;

use crate::landmarks::FaceLandmarks;
use crate::product::Category;

pub const SCALE_MIN: f64 = 0.1;
pub const SCALE_MAX: f64 = 2.0;
/// Lateral/vertical bound for x and y
pub const POSITION_XY_LIMIT: f64 = 3.0;
pub const POSITION_Z_MIN: f64 = -5.0;
pub const POSITION_Z_MAX: f64 = 0.0;
/// Depth used for landmark-driven glasses placement
pub const FACE_DEPTH: f64 = -1.0;

/// Model transform handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub scale: f64,
    pub position: [f64; 3],
    /// Euler angles in radians
    pub rotation: [f64; 3],
}

impl Default for Placement {
    fn default() -> Self {
        Category::Unknown.default_placement()
    }
}

impl Placement {
    /// Copy of this placement with every field inside its bounds
    pub fn clamped(self) -> Self {
        Self {
            scale: clamp_scale(self.scale),
            position: [
                clamp_position(Axis::X, self.position[0]),
                clamp_position(Axis::Y, self.position[1]),
                clamp_position(Axis::Z, self.position[2]),
            ],
            rotation: self.rotation.map(clamp_rotation),
        }
    }

    pub fn is_within_bounds(&self) -> bool {
        *self == self.clamped()
    }
}

/// A single axis of position or rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }
}

/// Viewport extents in pixels, used to normalize landmark coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Map a pixel coordinate to [-1, 1] on both axes, y pointing up
    pub fn normalize(&self, x: f64, y: f64) -> (f64, f64) {
        let nx = (x / self.width - 0.5) * 2.0;
        let ny = -(y / self.height - 0.5) * 2.0;
        (nx, ny)
    }

    fn is_usable(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }
}

fn clamp_finite(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        // NaN has no meaningful nearest bound
        min.max(0.0).min(max)
    } else {
        value.clamp(min, max)
    }
}

fn clamp_scale(value: f64) -> f64 {
    if value.is_nan() {
        return 1.0;
    }
    value.clamp(SCALE_MIN, SCALE_MAX)
}

fn clamp_rotation(value: f64) -> f64 {
    clamp_finite(value, -PI, PI)
}

fn clamp_position(axis: Axis, value: f64) -> f64 {
    match axis {
        Axis::X | Axis::Y => clamp_finite(value, -POSITION_XY_LIMIT, POSITION_XY_LIMIT),
        Axis::Z => clamp_finite(value, POSITION_Z_MIN, POSITION_Z_MAX),
    }
}

/// Holds the placement for the active product
#[derive(Debug, Clone)]
pub struct PlacementController {
    category: Category,
    current: Placement,
}

impl PlacementController {
    /// Controller initialized to the category default
    pub fn new(category: Category) -> Self {
        Self {
            category,
            current: category.default_placement(),
        }
    }

    pub fn placement(&self) -> Placement {
        self.current
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Switch to a new product category, discarding the previous pose
    pub fn rebind(&mut self, category: Category) {
        self.category = category;
        self.reset();
    }

    /// Restore the category default in one step
    pub fn reset(&mut self) {
        self.current = self.category.default_placement();
    }

    /// Set the uniform scale, returning the stored (clamped) value
    pub fn set_scale(&mut self, scale: f64) -> f64 {
        self.current.scale = clamp_scale(scale);
        self.current.scale
    }

    /// Set one position axis, returning the stored (clamped) value
    pub fn set_position(&mut self, axis: Axis, value: f64) -> f64 {
        let v = clamp_position(axis, value);
        self.current.position[axis.index()] = v;
        v
    }

    /// Set one rotation axis in radians, returning the stored (clamped) value
    pub fn set_rotation(&mut self, axis: Axis, value: f64) -> f64 {
        let v = clamp_rotation(value);
        self.current.rotation[axis.index()] = v;
        v
    }

    /// Move the model to a point in the scene, keeping scale and rotation
    pub fn place_at(&mut self, point: [f64; 3]) -> [f64; 3] {
        for (axis, value) in [Axis::X, Axis::Y, Axis::Z].into_iter().zip(point) {
            self.current.position[axis.index()] = clamp_position(axis, value);
        }
        self.current.position
    }

    /// Replace the whole placement, clamping each field
    pub fn set(&mut self, placement: Placement) -> Placement {
        self.current = placement.clamped();
        self.current
    }

    /// Move glasses to sit between the eyes.
    ///
    /// Only position changes; scale and rotation are kept. Returns false (and
    /// leaves the placement untouched) for non-glasses products, incomplete
    /// landmark groups or an unusable viewport.
    pub fn follow_landmarks(&mut self, landmarks: &FaceLandmarks, viewport: Viewport) -> bool {
        if self.category != Category::Glasses || !viewport.is_usable() {
            return false;
        }
        if landmarks.nose().is_empty() || landmarks.left_eye().is_empty() || landmarks.right_eye().is_empty() {
            return false;
        }
        let Some(center) = landmarks.eye_center() else {
            return false;
        };

        // Uncalibrated pixel -> scene mapping
        let (x, y) = viewport.normalize(center.x, center.y);
        self.current.position = [
            clamp_position(Axis::X, x),
            clamp_position(Axis::Y, y),
            FACE_DEPTH,
        ];
        trace!(x = x, y = y, "Glasses placement follows face");
        true
    }
}
