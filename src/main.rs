use std::{
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};

use clap::{
    Parser,
    Subcommand,
};
use color_eyre::eyre::{
    Context,
    Error,
    bail,
};
use dotenvy::dotenv;
use nalgebra::Point2;
use radiating_charge::{
    Source,
    config::{
        Config,
        MovementConfig,
        StopCondition,
    },
    executor::{
        Executor,
        OnUpdate,
    },
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Error> {
    let _ = dotenv();
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match args.command {
        Command::Run(args) => args.run()?,
        Command::DumpDefaultConfig { output, format } => {
            let config = Config::default();
            let config = match format.as_str() {
                "toml" => toml::to_string_pretty(&config)?,
                "json" => serde_json::to_string_pretty(&config)?,
                _ => bail!("Invalid format: {format}"),
            };
            if let Some(output) = &output {
                std::fs::write(output, &config)?;
            }
            else {
                println!("{config}");
            }
        }
    }

    Ok(())
}

#[derive(Debug, Parser)]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs the source headless and prints the fields at the probe points.
    Run(RunArgs),
    DumpDefaultConfig {
        #[clap(short, long)]
        output: Option<PathBuf>,
        #[clap(short, long, default_value = "toml")]
        format: String,
    },
}

#[derive(Debug, clap::Args)]
struct RunArgs {
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Number of ticks to run. Overrides the stop condition from the config.
    #[clap(short, long)]
    steps: Option<usize>,

    #[clap(long)]
    dt: Option<f64>,

    /// Wall-clock milliseconds between ticks
    #[clap(long)]
    interval_ms: Option<u64>,

    /// Point (`x,y`) to print field values for. Can be given multiple times.
    #[clap(short, long, value_parser = parse_point)]
    probe: Vec<Point2<f64>>,

    /// Start with the manual movement instead of the configured one.
    #[clap(long)]
    manual: bool,

    /// Frequency to request after `--change-at` ticks.
    #[clap(long)]
    frequency: Option<f64>,

    /// Amplitude to request after `--change-at` ticks.
    #[clap(long)]
    amplitude: Option<f64>,

    /// Position (`x,y`) to move to after `--change-at` ticks.
    #[clap(long, value_parser = parse_point)]
    move_to: Option<Point2<f64>>,

    #[clap(long, default_value = "0")]
    change_at: usize,
}

impl RunArgs {
    /// Loads the config and applies the overrides from the command line.
    fn resolve_config(&self) -> Result<Config, Error> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => Config::default(),
        };

        if self.manual {
            config.source.movement = MovementConfig::Manual;
        }
        if let Some(steps) = self.steps {
            config.run.stop_condition = StopCondition::StepLimit { limit: steps };
        }
        if let Some(dt) = self.dt {
            config.run.dt = dt;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.run.step_interval = Duration::from_millis(interval_ms);
        }
        if !(config.run.dt > 0.0) {
            bail!("Time step must be positive, but is {}", config.run.dt);
        }
        if config.run.stop_condition == StopCondition::Never {
            bail!("The run would never stop. Pass --steps or set run.stop_condition in the config");
        }

        Ok(config)
    }

    fn has_changes(&self) -> bool {
        self.frequency.is_some() || self.amplitude.is_some() || self.move_to.is_some()
    }

    fn run(self) -> Result<(), Error> {
        let mut config = self.resolve_config()?;

        let source = Source::from_config(&config.source)?;
        let executor = Executor::new(source);

        let change_at = match config.run.stop_condition {
            StopCondition::StepLimit { limit } => self.change_at.min(limit),
            _ => self.change_at,
        };

        if self.has_changes() && change_at > 0 {
            let mut first_run = config.run;
            first_run.stop_condition = StopCondition::StepLimit { limit: change_at };
            executor.start(&first_run, on_update());
            executor.wait_until_stopped();

            if let StopCondition::StepLimit { limit } = &mut config.run.stop_condition {
                *limit -= change_at;
            }
        }

        if self.has_changes() {
            let mut source = executor.write();
            if let Some(frequency) = self.frequency {
                source.request_frequency(frequency);
            }
            if let Some(amplitude) = self.amplitude {
                source.request_amplitude(amplitude);
            }
            if let Some(position) = self.move_to {
                source.move_to_new_position(position);
            }
        }

        executor.start(&config.run, on_update());
        executor.wait_until_stopped();

        print_report(&executor.read(), &self.probe);

        Ok(())
    }
}

fn on_update() -> Option<OnUpdate> {
    Some(Box::new(|source: &Source| {
        tracing::debug!(
            tick = source.tick(),
            time = source.time(),
            position = ?source.position(),
            "tick"
        );
    }))
}

fn load_config(path: &Path) -> Result<Config, Error> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Could not read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&text)
        .wrap_err_with(|| format!("Could not parse config file: {}", path.display()))?;
    tracing::debug!(path = %path.display(), ?config, "loaded config");
    Ok(config)
}

fn parse_point(s: &str) -> Result<Point2<f64>, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("Expected a point `x,y`, but got `{s}`"))?;
    let parse = |c: &str| {
        c.trim()
            .parse::<f64>()
            .map_err(|error| format!("Invalid coordinate `{c}`: {error}"))
    };
    Ok(Point2::new(parse(x)?, parse(y)?))
}

fn print_report(source: &Source, probes: &[Point2<f64>]) {
    println!(
        "tick {}, time {}, position ({}, {}), movement {}",
        source.tick(),
        source.time(),
        source.position().x,
        source.position().y,
        source.movement_type_at(source.start_position()),
    );

    for probe in probes {
        println!("probe ({}, {}):", probe.x, probe.y);

        match source.static_field_at(probe) {
            Ok(field) => println!("  static:  ({:e}, {:e})", field.x, field.y),
            Err(error) => println!("  static:  {error}"),
        }
        match source.dynamic_field_at(probe) {
            Ok(field) => println!("  dynamic: ({:e}, {:e})", field.x, field.y),
            Err(error) => println!("  dynamic: {error}"),
        }

        let distance = nalgebra::distance(probe, source.start_position());
        let index = distance.floor() as isize;
        println!("  movement: {}", source.movement_type_at(probe));
        println!(
            "  disturbance absent up to here: {}",
            source.is_disturbance_absent_up_to(index)
        );
    }
}
