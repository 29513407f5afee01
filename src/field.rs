//! Field queries.
//!
//! Both queries only read the state of the [`Source`] and return owned
//! vectors, so they can be called any number of times between two updates.

use nalgebra::{
    Point2,
    Vector2,
};
use serde::{
    Deserialize,
    Serialize,
};

use crate::source::Source;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldConstants {
    #[serde(default = "default_coupling")]
    pub coupling: f64,

    /// Scales the static field for display.
    #[serde(default = "default_static_scale")]
    pub static_scale: f64,
}

impl FieldConstants {
    /// `k_static` in `E = k_static / r^2`
    pub fn static_constant(&self) -> f64 {
        self.coupling * self.static_scale
    }
}

impl Default for FieldConstants {
    fn default() -> Self {
        Self {
            coupling: default_coupling(),
            static_scale: default_static_scale(),
        }
    }
}

fn default_coupling() -> f64 {
    1.0
}

fn default_static_scale() -> f64 {
    1.0
}

/// The point a degenerate query coincided with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum QueryReference {
    #[strum(to_string = "current position")]
    CurrentPosition,
    #[strum(to_string = "start position")]
    StartPosition,
    #[strum(to_string = "retarded position")]
    RetardedPosition,
}

#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
#[error("Field is undefined at {point}: query point coincides with the {reference}")]
pub struct DegenerateQueryError {
    pub point: Point2<f64>,
    pub reference: QueryReference,
}

impl Source {
    /// Instantaneous Coulomb-like field at `point`.
    ///
    /// This is measured from the *current* position of the source and is not
    /// retarded.
    pub fn static_field_at(&self, point: &Point2<f64>) -> Result<Vector2<f64>, DegenerateQueryError> {
        let delta = point - self.position();
        let r = delta.norm();

        if r == 0.0 {
            return Err(DegenerateQueryError {
                point: *point,
                reference: QueryReference::CurrentPosition,
            });
        }

        let magnitude = self.field_constants().static_constant() / (r * r);
        Ok(delta / r * magnitude)
    }

    /// Radiated (retarded) field at `point`.
    ///
    /// Distance is measured from the *start* position. The field is
    /// transverse to the line from the retarded position to `point`, and its
    /// strength follows the recorded acceleration along y, attenuated by
    /// `|Δx| / r` and falling off with `1 / sqrt(r)`.
    pub fn dynamic_field_at(&self, point: &Point2<f64>) -> Result<Vector2<f64>, DegenerateQueryError> {
        let start = self.start_position();
        let r = nalgebra::distance(point, start);

        if r == 0.0 {
            return Err(DegenerateQueryError {
                point: *point,
                reference: QueryReference::StartPosition,
            });
        }

        let retarded = self.history().query_distance(r);

        let delta = point - retarded.position;
        let length = delta.norm();
        if length == 0.0 {
            return Err(DegenerateQueryError {
                point: *point,
                reference: QueryReference::RetardedPosition,
            });
        }

        // polarization is fixed by which side of the retarded position we're on
        let sign = if delta.x < 0.0 { -1.0 } else { 1.0 };
        let direction = Vector2::new(-delta.y, delta.x) * (sign / length);

        let off_axis_factor = (point.x - start.x).abs() / r;
        let magnitude = retarded.acceleration.y * off_axis_factor / r.sqrt();

        Ok(direction * magnitude)
    }
}
