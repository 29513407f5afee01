use std::f64::consts::TAU;

use nalgebra::{
    Point2,
    Vector2,
};
use serde::{
    Deserialize,
    Serialize,
};

/// Drives the kinematics of the source.
///
/// The source asks the active movement for its velocity once per tick and
/// samples [`acceleration`](Movement::acceleration) right after for the
/// history.
pub trait Movement {
    /// Advances the movement by `dt` and returns the velocity that takes the
    /// source from `position` to where it should be after this tick.
    ///
    /// `center` is the point the source started at.
    fn velocity(&mut self, dt: f64, position: &Point2<f64>, center: &Point2<f64>) -> Vector2<f64>;

    fn acceleration(&self) -> Vector2<f64>;

    /// Peak acceleration this movement can currently produce.
    fn max_acceleration(&self) -> f64;

    fn movement_type(&self) -> MovementType;
}

/// Tag identifying which kind of movement produced a recorded state.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
pub enum MovementType {
    Manual,
    Sinusoidal,
}

/// Source position is set from outside, see
/// [`Source::move_to_new_position`](crate::source::Source::move_to_new_position).
#[derive(Clone, Copy, Debug, Default)]
pub struct ManualMovement {
    requested_position: Option<Point2<f64>>,
}

impl ManualMovement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the source to be at `position` after the next tick. A later
    /// request before that tick replaces this one.
    pub fn move_to(&mut self, position: Point2<f64>) {
        self.requested_position = Some(position);
    }

    pub fn requested_position(&self) -> Option<&Point2<f64>> {
        self.requested_position.as_ref()
    }

    pub(crate) fn take_requested_position(&mut self) -> Option<Point2<f64>> {
        self.requested_position.take()
    }
}

impl Movement for ManualMovement {
    fn velocity(&mut self, dt: f64, position: &Point2<f64>, _center: &Point2<f64>) -> Vector2<f64> {
        match self.requested_position {
            Some(requested) if dt > 0.0 => (requested - position) / dt,
            _ => Vector2::zeros(),
        }
    }

    fn acceleration(&self) -> Vector2<f64> {
        Vector2::zeros()
    }

    fn max_acceleration(&self) -> f64 {
        0.0
    }

    fn movement_type(&self) -> MovementType {
        MovementType::Manual
    }
}

/// Which parameter changes are waiting to be applied by a
/// [`SinusoidalMovement`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingChange {
    None,
    Frequency,
    Amplitude,
    Both,
}

/// Oscillation along the y axis about the center point.
///
/// The offset from the center is `amplitude * sin(2π * frequency * t)`.
/// Parameter changes are requested and only take effect once doing so doesn't
/// make the source jump.
#[derive(Clone, Copy, Debug)]
pub struct SinusoidalMovement {
    frequency: f64,
    amplitude: f64,
    running_time: f64,

    pending_frequency: Option<f64>,
    pending_amplitude: Option<f64>,
}

impl SinusoidalMovement {
    pub fn new(frequency: f64, amplitude: f64) -> Self {
        Self {
            frequency,
            amplitude,
            running_time: 0.0,
            pending_frequency: None,
            pending_amplitude: None,
        }
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    pub fn running_time(&self) -> f64 {
        self.running_time
    }

    fn angular_frequency(&self) -> f64 {
        TAU * self.frequency
    }

    fn phase(&self) -> f64 {
        self.angular_frequency() * self.running_time
    }

    /// Current displacement from the center along the y axis.
    pub fn offset(&self) -> f64 {
        self.amplitude * self.phase().sin()
    }

    pub fn pending(&self) -> PendingChange {
        match (self.pending_frequency, self.pending_amplitude) {
            (None, None) => PendingChange::None,
            (Some(_), None) => PendingChange::Frequency,
            (None, Some(_)) => PendingChange::Amplitude,
            (Some(_), Some(_)) => PendingChange::Both,
        }
    }

    pub fn pending_frequency(&self) -> Option<f64> {
        self.pending_frequency
    }

    pub fn pending_amplitude(&self) -> Option<f64> {
        self.pending_amplitude
    }

    /// Requests a new frequency. It is applied on the next tick.
    ///
    /// Non-finite or non-positive frequencies are ignored.
    pub fn request_frequency(&mut self, frequency: f64) {
        if frequency.is_finite() && frequency > 0.0 {
            self.pending_frequency = Some(frequency);
        }
        else {
            tracing::warn!(frequency, "ignoring invalid frequency");
        }
    }

    /// Requests a new amplitude. It is applied the next time the oscillation
    /// passes its center.
    ///
    /// Non-finite or negative amplitudes are ignored.
    pub fn request_amplitude(&mut self, amplitude: f64) {
        if amplitude.is_finite() && amplitude >= 0.0 {
            self.pending_amplitude = Some(amplitude);
        }
        else {
            tracing::warn!(amplitude, "ignoring invalid amplitude");
        }
    }

    /// Applies a pending frequency change.
    ///
    /// The running time is rescaled such that the phase, and therefore the
    /// position, stays the same.
    pub fn apply_pending_frequency(&mut self) -> bool {
        let Some(frequency) = self.pending_frequency.take()
        else {
            return false;
        };

        self.running_time += self.running_time * (self.frequency / frequency - 1.0);
        tracing::info!(from = self.frequency, to = frequency, "frequency changed");
        self.frequency = frequency;

        true
    }

    /// Applies a pending amplitude change, if the trajectory went from
    /// `previous_offset` to `current_offset` through (or onto) the center.
    pub fn apply_pending_amplitude(&mut self, previous_offset: f64, current_offset: f64) -> bool {
        if previous_offset * current_offset > 0.0 {
            return false;
        }

        let Some(amplitude) = self.pending_amplitude.take()
        else {
            return false;
        };

        tracing::info!(from = self.amplitude, to = amplitude, "amplitude changed");
        self.amplitude = amplitude;

        true
    }
}

impl Movement for SinusoidalMovement {
    /// Secant velocity `(target - position) / dt` towards the point of the
    /// sinusoid at the advanced running time, not the analytic `A·ω·cos(ωt)`.
    /// Anything derived from it, such as the relativistic mass, sees this
    /// chord velocity.
    fn velocity(&mut self, dt: f64, position: &Point2<f64>, center: &Point2<f64>) -> Vector2<f64> {
        if dt <= 0.0 {
            return Vector2::zeros();
        }

        self.running_time += dt;

        let target = center + Vector2::new(0.0, self.offset());
        (target - position) / dt
    }

    fn acceleration(&self) -> Vector2<f64> {
        Vector2::new(0.0, -self.angular_frequency().powi(2) * self.offset())
    }

    fn max_acceleration(&self) -> f64 {
        self.amplitude * self.angular_frequency().powi(2)
    }

    fn movement_type(&self) -> MovementType {
        MovementType::Sinusoidal
    }
}

#[derive(Clone, Copy, Debug)]
pub enum AnyMovement {
    Manual(ManualMovement),
    Sinusoidal(SinusoidalMovement),
}

impl Movement for AnyMovement {
    fn velocity(&mut self, dt: f64, position: &Point2<f64>, center: &Point2<f64>) -> Vector2<f64> {
        match self {
            AnyMovement::Manual(manual_movement) => manual_movement.velocity(dt, position, center),
            AnyMovement::Sinusoidal(sinusoidal_movement) => {
                sinusoidal_movement.velocity(dt, position, center)
            }
        }
    }

    fn acceleration(&self) -> Vector2<f64> {
        match self {
            AnyMovement::Manual(manual_movement) => manual_movement.acceleration(),
            AnyMovement::Sinusoidal(sinusoidal_movement) => sinusoidal_movement.acceleration(),
        }
    }

    fn max_acceleration(&self) -> f64 {
        match self {
            AnyMovement::Manual(manual_movement) => manual_movement.max_acceleration(),
            AnyMovement::Sinusoidal(sinusoidal_movement) => sinusoidal_movement.max_acceleration(),
        }
    }

    fn movement_type(&self) -> MovementType {
        match self {
            AnyMovement::Manual(_) => MovementType::Manual,
            AnyMovement::Sinusoidal(_) => MovementType::Sinusoidal,
        }
    }
}

impl From<ManualMovement> for AnyMovement {
    fn from(value: ManualMovement) -> Self {
        Self::Manual(value)
    }
}

impl From<SinusoidalMovement> for AnyMovement {
    fn from(value: SinusoidalMovement) -> Self {
        Self::Sinusoidal(value)
    }
}
