use nalgebra::{
    Point2,
    Vector2,
};

use crate::{
    config::SourceConfig,
    field::FieldConstants,
    history::{
        HistorySlot,
        MotionHistory,
    },
    movement::{
        AnyMovement,
        Movement,
        MovementType,
    },
    physics::{
        SuperluminalSpeed,
        relativistic_mass,
    },
};

#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
pub enum InvalidSourceConfig {
    #[error("Propagation speed must be finite, but is {propagation_speed}")]
    NonFinitePropagationSpeed { propagation_speed: f64 },

    #[error("Propagation speed {propagation_speed} yields a step size of zero")]
    ZeroStepSize { propagation_speed: f64 },

    #[error("Step size {step_size} exceeds history capacity {capacity}")]
    StepSizeExceedsCapacity { step_size: usize, capacity: usize },

    #[error("History capacity must not be zero")]
    ZeroCapacity,

    #[error("Start position must be finite, but is {start_position}")]
    NonFiniteStartPosition { start_position: Point2<f64> },
}

/// A point charge whose disturbance propagates outwards with a finite speed.
///
/// The motion is recorded into a [`MotionHistory`] every tick, which is then
/// read by the field queries to look up retarded states.
#[derive(Clone, derive_more::Debug)]
pub struct Source {
    position: Point2<f64>,
    velocity: Vector2<f64>,
    start_position: Point2<f64>,

    propagation_speed: f64,
    /// `floor(propagation_speed)`: history slots the disturbance travels per
    /// tick.
    step_size: usize,

    #[debug(ignore)]
    history: MotionHistory,
    movement: AnyMovement,
    recording: bool,

    field_constants: FieldConstants,

    tick: usize,
    time: f64,
}

impl Source {
    pub fn new(
        start_position: Point2<f64>,
        propagation_speed: f64,
        history_capacity: usize,
        movement: impl Into<AnyMovement>,
    ) -> Result<Self, InvalidSourceConfig> {
        if !start_position.coords.iter().all(|c| c.is_finite()) {
            return Err(InvalidSourceConfig::NonFiniteStartPosition { start_position });
        }
        if !propagation_speed.is_finite() {
            return Err(InvalidSourceConfig::NonFinitePropagationSpeed { propagation_speed });
        }
        if history_capacity == 0 {
            return Err(InvalidSourceConfig::ZeroCapacity);
        }

        let step_size = propagation_speed.floor().max(0.0) as usize;
        if step_size == 0 {
            return Err(InvalidSourceConfig::ZeroStepSize { propagation_speed });
        }
        if step_size > history_capacity {
            return Err(InvalidSourceConfig::StepSizeExceedsCapacity {
                step_size,
                capacity: history_capacity,
            });
        }

        let movement = movement.into();
        let history = MotionHistory::new(
            history_capacity,
            HistorySlot::stationary(start_position, movement.movement_type()),
        );

        tracing::debug!(
            ?start_position,
            propagation_speed,
            step_size,
            history_capacity,
            movement = %movement.movement_type(),
            "created source"
        );

        Ok(Self {
            position: start_position,
            velocity: Vector2::zeros(),
            start_position,
            propagation_speed,
            step_size,
            history,
            movement,
            recording: true,
            field_constants: FieldConstants::default(),
            tick: 0,
            time: 0.0,
        })
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self, InvalidSourceConfig> {
        let mut source = Self::new(
            config.start_position,
            config.propagation_speed,
            config.history_capacity,
            config.movement.to_movement(),
        )?;
        source.recording = config.recording;
        source.field_constants = config.field;
        Ok(source)
    }

    /// Advances the source by one tick.
    ///
    /// `time` is the simulation time at the end of this tick, `dt` the time
    /// elapsed since the last one.
    pub fn update(&mut self, time: f64, dt: f64) {
        let previous_position = self.position;

        self.velocity = self
            .movement
            .velocity(dt, &self.position, &self.start_position);

        match &mut self.movement {
            AnyMovement::Manual(manual_movement) => {
                if let Some(requested) = manual_movement.take_requested_position() {
                    self.position = requested;
                }
            }
            AnyMovement::Sinusoidal(_) => {
                self.position += self.velocity * dt;
            }
        }

        if self.recording {
            let snapshot = HistorySlot {
                position: self.position,
                acceleration: self.movement.acceleration(),
                max_acceleration: self.movement.max_acceleration(),
                movement: self.movement.movement_type(),
            };
            self.history.shift(&snapshot, self.step_size);
        }

        if let AnyMovement::Sinusoidal(sinusoidal_movement) = &mut self.movement {
            sinusoidal_movement.apply_pending_frequency();

            let previous_offset = previous_position.y - self.start_position.y;
            let current_offset = self.position.y - self.start_position.y;
            sinusoidal_movement.apply_pending_amplitude(previous_offset, current_offset);
        }

        self.tick += 1;
        self.time = time;

        tracing::trace!(tick = self.tick, time, position = ?self.position, "updated source");
    }

    /// Switches the movement for all future ticks. Recorded history is left
    /// as is.
    pub fn set_movement_strategy(&mut self, movement: impl Into<AnyMovement>) {
        self.movement = movement.into();
        tracing::debug!(movement = %self.movement.movement_type(), "switched movement");
    }

    /// Only has an effect if the sinusoidal movement is active.
    pub fn request_frequency(&mut self, frequency: f64) {
        match &mut self.movement {
            AnyMovement::Sinusoidal(sinusoidal_movement) => {
                sinusoidal_movement.request_frequency(frequency)
            }
            AnyMovement::Manual(_) => {
                tracing::trace!(frequency, "ignoring frequency request for manual movement")
            }
        }
    }

    /// Only has an effect if the sinusoidal movement is active.
    pub fn request_amplitude(&mut self, amplitude: f64) {
        match &mut self.movement {
            AnyMovement::Sinusoidal(sinusoidal_movement) => {
                sinusoidal_movement.request_amplitude(amplitude)
            }
            AnyMovement::Manual(_) => {
                tracing::trace!(amplitude, "ignoring amplitude request for manual movement")
            }
        }
    }

    /// Only has an effect if the manual movement is active. The source will be
    /// at `position` after the next tick.
    pub fn move_to_new_position(&mut self, position: Point2<f64>) {
        match &mut self.movement {
            AnyMovement::Manual(manual_movement) => manual_movement.move_to(position),
            AnyMovement::Sinusoidal(_) => {
                tracing::trace!(?position, "ignoring move request for sinusoidal movement")
            }
        }
    }

    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
    }

    pub fn recording(&self) -> bool {
        self.recording
    }

    pub fn set_field_constants(&mut self, field_constants: FieldConstants) {
        self.field_constants = field_constants;
    }

    pub fn field_constants(&self) -> &FieldConstants {
        &self.field_constants
    }

    pub fn position(&self) -> &Point2<f64> {
        &self.position
    }

    pub fn velocity(&self) -> &Vector2<f64> {
        &self.velocity
    }

    pub fn start_position(&self) -> &Point2<f64> {
        &self.start_position
    }

    pub fn movement(&self) -> &AnyMovement {
        &self.movement
    }

    pub fn history(&self) -> &MotionHistory {
        &self.history
    }

    pub fn propagation_speed(&self) -> f64 {
        self.propagation_speed
    }

    pub fn step_size(&self) -> usize {
        self.step_size
    }

    pub fn tick(&self) -> usize {
        self.tick
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn position_at(&self, index: isize) -> &Point2<f64> {
        &self.history.query(index).position
    }

    /// Retarded position as seen from `point`.
    pub fn position_at_point(&self, point: &Point2<f64>) -> &Point2<f64> {
        &self.retarded_state_at(point).position
    }

    /// Acceleration along the axis of oscillation.
    pub fn acceleration_at(&self, index: isize) -> f64 {
        self.history.query(index).acceleration.y
    }

    pub fn max_acceleration_at(&self, index: isize) -> f64 {
        self.history.query(index).max_acceleration
    }

    pub fn movement_type_at(&self, point: &Point2<f64>) -> MovementType {
        self.retarded_state_at(point).movement
    }

    pub fn is_disturbance_absent_up_to(&self, index: isize) -> bool {
        self.history.is_disturbance_absent_up_to(index)
    }

    fn retarded_state_at(&self, point: &Point2<f64>) -> &HistorySlot {
        self.history
            .query_distance(nalgebra::distance(point, &self.start_position))
    }

    /// Mass of a particle with `rest_mass` moving with the source's current
    /// velocity.
    pub fn relativistic_mass(&self, rest_mass: f64) -> Result<f64, SuperluminalSpeed> {
        relativistic_mass(rest_mass, &self.velocity, self.propagation_speed)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Point2;

    use crate::{
        config::{
            MovementConfig,
            SourceConfig,
        },
        movement::{
            AnyMovement,
            ManualMovement,
            MovementType,
            PendingChange,
            SinusoidalMovement,
        },
        source::{
            InvalidSourceConfig,
            Source,
        },
    };

    const DT: f64 = 0.01;

    fn sinusoidal_source() -> Source {
        Source::new(
            Point2::origin(),
            6.0,
            2000,
            SinusoidalMovement::new(1.0, 1.0),
        )
        .unwrap()
    }

    fn step(source: &mut Source) {
        source.update(source.time() + DT, DT);
    }

    fn sinusoidal(source: &Source) -> &SinusoidalMovement {
        match source.movement() {
            AnyMovement::Sinusoidal(sinusoidal_movement) => sinusoidal_movement,
            AnyMovement::Manual(_) => panic!("expected sinusoidal movement"),
        }
    }

    #[test]
    fn it_validates_construction() {
        assert_eq!(
            Source::new(Point2::origin(), 0.5, 10, ManualMovement::new()).unwrap_err(),
            InvalidSourceConfig::ZeroStepSize {
                propagation_speed: 0.5
            }
        );
        assert_eq!(
            Source::new(Point2::origin(), 11.0, 10, ManualMovement::new()).unwrap_err(),
            InvalidSourceConfig::StepSizeExceedsCapacity {
                step_size: 11,
                capacity: 10
            }
        );
        assert_eq!(
            Source::new(Point2::origin(), 6.0, 0, ManualMovement::new()).unwrap_err(),
            InvalidSourceConfig::ZeroCapacity
        );
        assert!(Source::new(Point2::origin(), f64::NAN, 10, ManualMovement::new()).is_err());
        assert!(Source::new(Point2::new(f64::INFINITY, 0.0), 6.0, 10, ManualMovement::new()).is_err());

        let source = Source::new(Point2::origin(), 6.9, 10, ManualMovement::new()).unwrap();
        assert_eq!(source.step_size(), 6);
    }

    #[test]
    fn it_starts_at_rest() {
        let source = sinusoidal_source();
        assert_eq!(source.tick(), 0);
        assert_eq!(*source.position(), Point2::origin());
        assert!(source.is_disturbance_absent_up_to(1999));
        assert_eq!(source.movement_type_at(&Point2::new(3.0, 4.0)), MovementType::Sinusoidal);
    }

    #[test]
    fn it_records_the_oscillation() {
        let mut source = sinusoidal_source();
        for _ in 0..25 {
            step(&mut source);
        }

        // a quarter period in, at the peak
        assert_relative_eq!(source.position().y, 1.0, epsilon = 1e-9);
        assert_relative_eq!(source.position_at(0).y, source.position().y);

        // every tick moves the history outwards by 6 slots
        assert_relative_eq!(source.position_at(6).y, (std::f64::consts::TAU * 0.24).sin(), epsilon = 1e-9);
        assert!(source.acceleration_at(0) < 0.0);
        assert!(!source.is_disturbance_absent_up_to(-1));
        assert!(!source.is_disturbance_absent_up_to(1999));

        // 25 ticks of 6 slots each, nothing has been recorded past that
        assert!(source.acceleration_at(149) != 0.0);
        assert_eq!(source.acceleration_at(150), 0.0);

        let omega = std::f64::consts::TAU;
        assert_relative_eq!(source.max_acceleration_at(0), omega * omega, epsilon = 1e-12);
        assert_eq!(source.max_acceleration_at(1999), 0.0);
    }

    #[test]
    fn it_clamps_history_indices() {
        let mut source = sinusoidal_source();
        for _ in 0..400 {
            step(&mut source);
        }
        assert_eq!(source.acceleration_at(2000 + 500), source.acceleration_at(2000 - 1));
        assert_eq!(source.acceleration_at(-10), source.acceleration_at(0));
        assert_eq!(source.position_at(-10), source.position_at(0));
    }

    #[test]
    fn it_defers_amplitude_changes_until_center_crossing() {
        let mut source = sinusoidal_source();
        for _ in 0..5 {
            step(&mut source);
        }
        assert!(source.position().y > 0.0);

        source.request_amplitude(2.0);
        assert_eq!(sinusoidal(&source).pending(), PendingChange::Amplitude);

        // moving away from and back towards the center, but always above it
        while source.time() < 0.45 {
            let previous = source.position().y;
            step(&mut source);
            assert!(previous > 0.0 && source.position().y > 0.0);
            assert_eq!(sinusoidal(&source).amplitude(), 1.0);
        }

        let mut changed_at = None;
        while source.time() < 0.55 {
            step(&mut source);
            if changed_at.is_none() && sinusoidal(&source).amplitude() == 2.0 {
                changed_at = Some(*source.position());
            }
        }
        assert_eq!(sinusoidal(&source).amplitude(), 2.0);
        assert_eq!(sinusoidal(&source).pending(), PendingChange::None);

        // the change happened right at the center
        let changed_at = changed_at.unwrap();
        assert!(changed_at.y.abs() < std::f64::consts::TAU * DT);
    }

    #[test]
    fn it_changes_frequency_without_jumping() {
        let mut source = sinusoidal_source();
        for _ in 0..10 {
            step(&mut source);
        }

        source.request_frequency(1.7);
        assert_eq!(sinusoidal(&source).frequency(), 1.0);

        let before = *source.position();
        step(&mut source);
        let after = *source.position();

        // this tick still used the old frequency, the new one applies from here
        assert_eq!(sinusoidal(&source).frequency(), 1.7);
        assert_eq!(sinusoidal(&source).pending(), PendingChange::None);
        assert_relative_eq!(after.y, (std::f64::consts::TAU * 0.11).sin(), epsilon = 1e-9);
        assert_relative_eq!(sinusoidal(&source).offset(), after.y, epsilon = 1e-9);
        assert!((after.y - before.y).abs() < std::f64::consts::TAU * DT);

        let before = *source.position();
        step(&mut source);
        let after = *source.position();
        assert!((after.y - before.y).abs() < std::f64::consts::TAU * 1.7 * DT);
    }

    #[test]
    fn it_ignores_mismatched_requests() {
        let mut source = sinusoidal_source();
        step(&mut source);
        let position = *source.position();

        source.move_to_new_position(Point2::new(100.0, 100.0));
        step(&mut source);
        assert!(nalgebra::distance(source.position(), &position) < 1.0);

        let mut source = Source::new(Point2::origin(), 6.0, 100, ManualMovement::new()).unwrap();
        source.request_frequency(3.0);
        source.request_amplitude(3.0);
        step(&mut source);
        assert!(matches!(source.movement(), AnyMovement::Manual(manual) if manual.requested_position().is_none()));
        assert_eq!(*source.position(), Point2::origin());
    }

    #[test]
    fn it_moves_manually() {
        let mut source = Source::new(Point2::origin(), 6.0, 100, ManualMovement::new()).unwrap();

        source.move_to_new_position(Point2::new(1.0, 2.0));
        // only the latest request counts
        source.move_to_new_position(Point2::new(0.5, 0.25));
        assert_eq!(*source.position(), Point2::origin());

        source.update(0.5, 0.5);
        assert_eq!(*source.position(), Point2::new(0.5, 0.25));
        assert_relative_eq!(source.velocity().x, 1.0);
        assert_relative_eq!(source.velocity().y, 0.5);

        // manual movement doesn't radiate
        assert!(source.is_disturbance_absent_up_to(99));
        assert_eq!(*source.position_at(0), Point2::new(0.5, 0.25));
        assert_eq!(*source.position_at(6), Point2::origin());

        source.update(1.0, 0.5);
        assert_eq!(*source.position(), Point2::new(0.5, 0.25));
        assert_eq!(*source.velocity(), nalgebra::Vector2::zeros());
    }

    #[test]
    fn it_switches_strategies_without_rewriting_history() {
        let mut source = sinusoidal_source();
        for _ in 0..10 {
            step(&mut source);
        }
        source.set_movement_strategy(ManualMovement::new());
        step(&mut source);

        assert_eq!(source.movement_type_at(&Point2::new(3.0, 0.0)), MovementType::Manual);
        assert_eq!(source.movement_type_at(&Point2::new(6.0, 0.0)), MovementType::Sinusoidal);
        // beyond what has been recorded, the initial state still shows
        assert_eq!(source.movement_type_at(&Point2::new(100.0, 0.0)), MovementType::Sinusoidal);

        assert_eq!(source.acceleration_at(0), 0.0);
        assert!(source.acceleration_at(6) != 0.0);
        assert_eq!(source.position_at_point(&Point2::new(-7.0, 0.0)), source.position_at(7));
    }

    #[test]
    fn it_stops_recording() {
        let mut source = sinusoidal_source();
        source.set_recording(false);
        for _ in 0..10 {
            step(&mut source);
        }
        assert!(!source.recording());
        assert!(source.position().y > 0.0);
        assert!(source.is_disturbance_absent_up_to(1999));
        assert_eq!(*source.position_at(0), Point2::origin());
    }

    #[test]
    fn it_computes_relativistic_mass_from_velocity() {
        let mut source = Source::new(Point2::origin(), 6.0, 100, ManualMovement::new()).unwrap();
        assert_eq!(source.relativistic_mass(2.0), Ok(2.0));

        source.move_to_new_position(Point2::new(3.6, 0.0));
        source.update(1.0, 1.0);
        assert_relative_eq!(source.relativistic_mass(1.0).unwrap(), 1.25, epsilon = 1e-12);

        source.move_to_new_position(Point2::new(20.0, 0.0));
        source.update(2.0, 1.0);
        assert!(source.relativistic_mass(1.0).is_err());
    }

    #[test]
    fn it_builds_from_config() {
        let config = SourceConfig {
            start_position: Point2::new(1.0, 2.0),
            propagation_speed: 3.0,
            history_capacity: 50,
            recording: false,
            movement: MovementConfig::Manual,
            ..Default::default()
        };
        let source = Source::from_config(&config).unwrap();

        assert_eq!(*source.start_position(), Point2::new(1.0, 2.0));
        assert_eq!(source.step_size(), 3);
        assert_eq!(source.history().capacity(), 50);
        assert!(!source.recording());
        assert!(matches!(source.movement(), AnyMovement::Manual(_)));
    }
}
