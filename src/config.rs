use std::time::Duration;

use nalgebra::Point2;
use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    field::FieldConstants,
    movement::{
        AnyMovement,
        ManualMovement,
        SinusoidalMovement,
    },
};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub run: RunConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_start_position")]
    pub start_position: Point2<f64>,

    /// In distance units per tick. Its integer part is the number of history
    /// slots the disturbance travels per tick.
    #[serde(default = "default_propagation_speed")]
    pub propagation_speed: f64,

    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    #[serde(default = "default_to_true")]
    pub recording: bool,

    #[serde(default)]
    pub field: FieldConstants,

    #[serde(default)]
    pub movement: MovementConfig,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            start_position: default_start_position(),
            propagation_speed: default_propagation_speed(),
            history_capacity: default_history_capacity(),
            recording: true,
            field: Default::default(),
            movement: Default::default(),
        }
    }
}

fn default_start_position() -> Point2<f64> {
    Point2::origin()
}

fn default_propagation_speed() -> f64 {
    6.0
}

fn default_history_capacity() -> usize {
    2000
}

fn default_to_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum MovementConfig {
    Manual,
    Sinusoidal { frequency: f64, amplitude: f64 },
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self::Sinusoidal {
            frequency: 0.02,
            amplitude: 50.0,
        }
    }
}

impl MovementConfig {
    pub fn to_movement(&self) -> AnyMovement {
        match self {
            Self::Manual => ManualMovement::new().into(),
            Self::Sinusoidal {
                frequency,
                amplitude,
            } => SinusoidalMovement::new(*frequency, *amplitude).into(),
        }
    }
}

/// How the tick driver advances the source.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Simulated time per tick
    #[serde(default = "default_dt")]
    pub dt: f64,

    #[serde(default)]
    pub stop_condition: StopCondition,

    /// Wall-clock time between ticks
    #[serde(default)]
    pub step_interval: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dt: default_dt(),
            stop_condition: Default::default(),
            step_interval: Duration::ZERO,
        }
    }
}

fn default_dt() -> f64 {
    1.0
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum StopCondition {
    #[default]
    Never,
    StepLimit {
        limit: usize,
    },
    SimulatedTimeLimit {
        limit: f64,
    },
}

impl StopCondition {
    /// `tick` counts the ticks of the current run, `time` is the simulated
    /// time of the source and `dt` the time step of the run.
    ///
    /// The time limit is met within half a time step, since `time` is summed
    /// from `dt` and picks up rounding errors.
    pub fn is_met(&self, tick: usize, time: f64, dt: f64) -> bool {
        match self {
            StopCondition::Never => false,
            StopCondition::StepLimit { limit } => tick >= *limit,
            StopCondition::SimulatedTimeLimit { limit } => time >= *limit - 0.5 * dt.abs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use nalgebra::Point2;

    use crate::config::{
        Config,
        MovementConfig,
        RunConfig,
        SourceConfig,
        StopCondition,
    };

    #[test]
    fn it_fills_in_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.source, SourceConfig::default());
        assert_eq!(config.run, RunConfig::default());
        assert_eq!(config.source.history_capacity, 2000);
        assert_eq!(config.source.propagation_speed, 6.0);
        assert!(config.source.recording);
    }

    #[test]
    fn it_parses_toml() {
        let config: Config = toml::from_str(
            r#"
            [source]
            start_position = [10.0, -4.0]
            propagation_speed = 3.5
            movement = "Manual"

            [source.field]
            static_scale = 20.0

            [run]
            dt = 0.5
            stop_condition = { StepLimit = { limit = 100 } }
            "#,
        )
        .unwrap();

        assert_eq!(config.source.start_position, Point2::new(10.0, -4.0));
        assert_eq!(config.source.propagation_speed, 3.5);
        assert_eq!(config.source.history_capacity, 2000);
        assert_eq!(config.source.movement, MovementConfig::Manual);
        assert_eq!(config.source.field.static_scale, 20.0);
        assert_eq!(config.source.field.coupling, 1.0);
        assert_eq!(config.run.dt, 0.5);
        assert_eq!(config.run.stop_condition, StopCondition::StepLimit { limit: 100 });
    }

    #[test]
    fn it_round_trips_through_toml() {
        let mut config = Config::default();
        config.source.movement = MovementConfig::Sinusoidal {
            frequency: 0.5,
            amplitude: 3.0,
        };
        config.run.step_interval = Duration::from_millis(16);
        config.run.stop_condition = StopCondition::SimulatedTimeLimit { limit: 12.5 };

        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(deserialized.source, config.source);
        assert_eq!(deserialized.run, config.run);
    }

    #[test]
    fn it_evaluates_stop_conditions() {
        assert!(!StopCondition::Never.is_met(usize::MAX, f64::INFINITY, 1.0));

        let steps = StopCondition::StepLimit { limit: 10 };
        assert!(!steps.is_met(9, 100.0, 1.0));
        assert!(steps.is_met(10, 0.0, 1.0));

        let none = StopCondition::StepLimit { limit: 0 };
        assert!(none.is_met(0, 0.0, 1.0));

        let time = StopCondition::SimulatedTimeLimit { limit: 2.0 };
        assert!(!time.is_met(1000, 1.99, 0.01));
        assert!(time.is_met(0, 2.0, 0.01));
    }

    #[test]
    fn it_tolerates_rounding_in_summed_time() {
        let time_limit = StopCondition::SimulatedTimeLimit { limit: 1.0 };

        let mut time = 0.0;
        let mut ticks = 0;
        while !time_limit.is_met(ticks, time, 0.1) {
            time += 0.1;
            ticks += 1;
        }

        assert_eq!(ticks, 10);
    }
}
