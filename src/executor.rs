//! Tick driver running a [`Source`] on a background thread.
//!
//! The source lives behind a [`RwLock`]: the reactor thread takes the write
//! lock for each [`Source::update`], while any number of readers can query
//! fields between updates.

use std::{
    ops::{
        Deref,
        DerefMut,
    },
    sync::{
        Arc,
        mpsc,
    },
    thread,
    time::{
        Duration,
        Instant,
    },
};

use parking_lot::{
    Condvar,
    Mutex,
    RwLock,
    RwLockReadGuard,
    RwLockWriteGuard,
};

use crate::{
    config::{
        RunConfig,
        StopCondition,
    },
    source::Source,
};

pub type OnUpdate = Box<dyn FnMut(&Source) + Send + Sync + 'static>;

#[derive(Clone, Debug)]
pub struct Executor {
    state: Arc<RwLock<State>>,
    outstanding: Arc<Outstanding>,
    command_tx: mpsc::Sender<Command>,
}

impl Executor {
    pub fn new(source: Source) -> Self {
        let state = Arc::new(RwLock::new(State {
            source,
            running_state: None,
        }));
        let outstanding = Arc::new(Outstanding::default());

        let (command_tx, command_rx) = mpsc::channel();

        let _join_handle = thread::spawn({
            let state = state.clone();
            let outstanding = outstanding.clone();
            move || {
                run_reactor(command_rx, state, outstanding);
            }
        });

        Self {
            state,
            outstanding,
            command_tx,
        }
    }

    fn send_command(&self, command: Command) {
        if self.command_tx.send(command).is_err() {
            tracing::warn!("executor reactor is gone");
            self.outstanding.finish_all();
        }
    }

    pub fn read(&self) -> ReadGuard<'_> {
        ReadGuard {
            guard: self.state.read(),
        }
    }

    pub fn write(&self) -> WriteGuard<'_> {
        WriteGuard {
            guard: self.state.write(),
        }
    }

    /// Advances the source by a single tick of `dt`. Ignored while a run is
    /// active.
    pub fn single_step(&self, dt: f64) {
        self.outstanding.begin();
        self.send_command(Command::Step { dt });
    }

    /// Starts a run. If a run is already active, it takes over the new
    /// settings but keeps counting its ticks.
    pub fn start(&self, run_config: &RunConfig, on_update: Option<OnUpdate>) {
        self.outstanding.begin();
        self.send_command(Command::Start {
            dt: run_config.dt,
            step_interval: run_config.step_interval,
            stop_condition: run_config.stop_condition,
            on_update,
        });
    }

    pub fn stop(&self) {
        self.send_command(Command::Stop);
    }

    /// Blocks until every run and single step requested so far is done. A run
    /// is done when its [`StopCondition`] is met or [`stop`](Self::stop) was
    /// called.
    pub fn wait_until_stopped(&self) {
        self.outstanding.wait();
    }
}

/// Number of requested runs and single steps the reactor hasn't finished yet.
///
/// Counted up by the caller before the command is sent, and down by the
/// reactor once it's done with it, so commands still queued are accounted for.
#[derive(Debug, Default)]
struct Outstanding {
    count: Mutex<usize>,
    condvar: Condvar,
}

impl Outstanding {
    fn begin(&self) {
        *self.count.lock() += 1;
    }

    fn finish(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.condvar.notify_all();
        }
    }

    fn finish_all(&self) {
        *self.count.lock() = 0;
        self.condvar.notify_all();
    }

    fn wait(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.condvar.wait(&mut count);
        }
    }
}

#[derive(Debug)]
struct State {
    source: Source,
    running_state: Option<RunningState>,
}

#[derive(derive_more::Debug)]
struct RunningState {
    next_step: Instant,
    step_interval: Duration,
    dt: f64,
    stop_condition: StopCondition,
    /// Tick at which this run started
    first_tick: usize,
    #[debug(ignore)]
    on_update: Option<OnUpdate>,
}

impl RunningState {
    fn is_finished(&self, source: &Source) -> bool {
        self.stop_condition
            .is_met(source.tick() - self.first_tick, source.time(), self.dt)
    }
}

enum Command {
    Start {
        dt: f64,
        step_interval: Duration,
        stop_condition: StopCondition,
        on_update: Option<OnUpdate>,
    },
    Stop,
    Step {
        dt: f64,
    },
}

fn step(source: &mut Source, dt: f64) {
    let time = source.time() + dt;
    source.update(time, dt);
}

fn run_reactor(
    command_rx: mpsc::Receiver<Command>,
    state: Arc<RwLock<State>>,
    outstanding: Arc<Outstanding>,
) {
    loop {
        let mut state_guard = state.upgradable_read();

        if let Some(running_state) = &state_guard.running_state {
            let now = Instant::now();
            let mut recv_timeout = running_state.next_step.saturating_duration_since(now);

            if running_state.next_step <= now {
                let finished = state_guard.with_upgraded(|state| {
                    let source = &mut state.source;
                    let Some(running_state) = state.running_state.as_mut()
                    else {
                        return false;
                    };

                    // a run can be started with its stop condition already met
                    let finished = running_state.is_finished(source) || {
                        step(source, running_state.dt);
                        if let Some(on_update) = &mut running_state.on_update {
                            on_update(source);
                        }

                        running_state.next_step = now + running_state.step_interval;
                        recv_timeout = running_state.step_interval;

                        running_state.is_finished(source)
                    };

                    if finished {
                        tracing::debug!(tick = source.tick(), time = source.time(), "run finished");
                        state.running_state = None;
                    }
                    finished
                });

                if finished {
                    drop(state_guard);
                    outstanding.finish();
                    continue;
                }
            }

            drop(state_guard);

            match command_rx.recv_timeout(recv_timeout) {
                Ok(command) => {
                    match command {
                        Command::Start {
                            dt,
                            step_interval,
                            stop_condition,
                            on_update,
                        } => {
                            let mut state_guard = state.write();
                            if let Some(running_state) = state_guard.running_state.as_mut() {
                                running_state.dt = dt;
                                running_state.step_interval = step_interval;
                                running_state.stop_condition = stop_condition;
                                running_state.on_update = on_update;
                            }
                            // merged into the active run, which finishes for both
                            outstanding.finish();
                        }
                        Command::Stop => {
                            let mut state_guard = state.write();
                            let was_running = state_guard.running_state.take().is_some();
                            drop(state_guard);
                            if was_running {
                                tracing::debug!("run stopped");
                                outstanding.finish();
                            }
                        }
                        Command::Step { .. } => {
                            tracing::debug!("ignoring single step while running");
                            outstanding.finish();
                        }
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {}
            }
        }
        else {
            drop(state_guard);

            match command_rx.recv() {
                Ok(command) => {
                    match command {
                        Command::Start {
                            dt,
                            step_interval,
                            stop_condition,
                            on_update,
                        } => {
                            let mut state_guard = state.write();
                            let first_tick = state_guard.source.tick();
                            tracing::debug!(dt, ?step_interval, ?stop_condition, "starting run");
                            state_guard.running_state = Some(RunningState {
                                next_step: Instant::now(),
                                step_interval,
                                dt,
                                stop_condition,
                                first_tick,
                                on_update,
                            });
                        }
                        Command::Stop => {}
                        Command::Step { dt } => {
                            let mut state_guard = state.write();
                            step(&mut state_guard.source, dt);
                            drop(state_guard);
                            outstanding.finish();
                        }
                    }
                }
                Err(mpsc::RecvError) => break,
            }
        }
    }

    outstanding.finish_all();
}

#[derive(Debug)]
pub struct ReadGuard<'a> {
    guard: RwLockReadGuard<'a, State>,
}

impl<'a> ReadGuard<'a> {
    pub fn running(&self) -> bool {
        self.guard.running_state.is_some()
    }
}

impl<'a> Deref for ReadGuard<'a> {
    type Target = Source;

    fn deref(&self) -> &Self::Target {
        &self.guard.source
    }
}

pub struct WriteGuard<'a> {
    guard: RwLockWriteGuard<'a, State>,
}

impl<'a> Deref for WriteGuard<'a> {
    type Target = Source;

    fn deref(&self) -> &Self::Target {
        &self.guard.source
    }
}

impl<'a> DerefMut for WriteGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard.source
    }
}
