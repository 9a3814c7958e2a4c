use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::analytics::RunSummary;
use crate::config::SimConfig;
use crate::engine::Simulation;
use crate::error::{SimError, SimResult};
use crate::models::ModelRegistry;
use crate::scheduler::StepOutcome;
use crate::snapshot::Snapshot;

const PACING_SLICE: Duration = Duration::from_millis(10);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs a [`Simulation`] on a background thread.
///
/// The scheduler thread holds the simulation lock for one round (or event)
/// at a time and publishes a [`Snapshot`] after each. Observers read
/// snapshots and never block the scheduler for long.
pub struct Runtime {
    simulation: Option<Arc<Mutex<Simulation>>>,
    snapshot: Arc<Mutex<Snapshot>>,
    last_error: Arc<Mutex<Option<SimError>>>,
    stop: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<SimResult<RunSummary>>>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            simulation: None,
            snapshot: Arc::new(Mutex::new(Snapshot::default())),
            last_error: Arc::new(Mutex::new(None)),
            stop: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Build a fresh simulation for `project`, replacing any previous one.
    /// On failure the runtime is left uninitialized.
    pub fn init(
        &mut self,
        project: &str,
        registry: Arc<ModelRegistry>,
        config: SimConfig,
    ) -> SimResult<()> {
        self.shutdown();
        *lock(&self.last_error) = None;
        match Simulation::init(project, registry, config) {
            Ok(sim) => {
                *lock(&self.snapshot) = sim.snapshot();
                self.simulation = Some(Arc::new(Mutex::new(sim)));
                Ok(())
            }
            Err(e) => {
                error!("Failed to initialize project '{}': {}", project, e);
                *lock(&self.snapshot) = Snapshot::default();
                Err(e)
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.simulation.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start running up to `steps` rounds or events, paced to at most
    /// `refresh_rate` steps per second (0 means unpaced). Returns `Ok(false)`
    /// if a run is already in progress.
    pub fn run(&mut self, steps: u64, refresh_rate: f64) -> SimResult<bool> {
        let sim = self.simulation.clone().ok_or(SimError::NotInitialized)?;
        if self.is_running() {
            return Ok(false);
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }

        self.stop.store(false, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        *lock(&self.last_error) = None;

        let snapshot = Arc::clone(&self.snapshot);
        let last_error = Arc::clone(&self.last_error);
        let stop = Arc::clone(&self.stop);
        let running = Arc::clone(&self.running);
        let interval = (refresh_rate > 0.0).then(|| Duration::from_secs_f64(1.0 / refresh_rate));

        self.worker = Some(thread::spawn(move || {
            let result = drive(&sim, steps, interval, &stop, &snapshot);
            if let Err(e) = &result {
                error!("Simulation stopped: {}", e);
                *lock(&last_error) = Some(e.clone());
            }
            running.store(false, Ordering::SeqCst);
            result
        }));
        Ok(true)
    }

    /// Ask the scheduler thread to stop at the next step boundary. Returns
    /// whether a run was in progress.
    pub fn stop(&self) -> bool {
        self.stop.store(true, Ordering::SeqCst);
        self.is_running()
    }

    /// Block until the current run finishes and return its outcome.
    pub fn wait(&mut self) -> Option<SimResult<RunSummary>> {
        let worker = self.worker.take()?;
        match worker.join() {
            Ok(result) => Some(result),
            Err(_) => {
                warn!("Scheduler thread panicked");
                self.running.store(false, Ordering::SeqCst);
                None
            }
        }
    }

    /// The state published after the last completed step.
    pub fn snapshot(&self) -> Snapshot {
        lock(&self.snapshot).clone()
    }

    pub fn last_error(&self) -> Option<SimError> {
        lock(&self.last_error).clone()
    }

    /// Run `f` against the simulation while no step is executing.
    pub fn with_simulation<R>(&self, f: impl FnOnce(&mut Simulation) -> R) -> SimResult<R> {
        let sim = self.simulation.as_ref().ok_or(SimError::NotInitialized)?;
        let mut guard = lock(sim);
        let result = f(&mut guard);
        *lock(&self.snapshot) = guard.snapshot();
        Ok(result)
    }

    /// Stop any run, then notify the custom global that the application is
    /// exiting.
    pub fn shutdown(&mut self) {
        self.stop();
        let _ = self.wait();
        if let Some(sim) = self.simulation.take() {
            lock(&sim).exit();
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn drive(
    sim: &Mutex<Simulation>,
    steps: u64,
    interval: Option<Duration>,
    stop: &AtomicBool,
    snapshot: &Mutex<Snapshot>,
) -> SimResult<RunSummary> {
    {
        let mut guard = lock(sim);
        guard.begin_run();
        *lock(snapshot) = guard.snapshot();
    }
    info!("Scheduler thread started for {} steps", steps);

    let mut done = 0;
    let mut terminated = false;
    while done < steps && !stop.load(Ordering::SeqCst) {
        let started = Instant::now();
        let outcome = {
            let mut guard = lock(sim);
            match guard.step() {
                Ok(outcome) => {
                    *lock(snapshot) = guard.snapshot();
                    outcome
                }
                Err(e) => {
                    guard.end_run();
                    lock(snapshot).is_running = false;
                    return Err(e);
                }
            }
        };
        match outcome {
            StepOutcome::Continue => done += 1,
            StepOutcome::QueueEmpty => break,
            StepOutcome::Stopped => {
                done += 1;
                break;
            }
            StepOutcome::Terminated => {
                done += 1;
                terminated = true;
                break;
            }
        }
        if let Some(interval) = interval {
            pace(started + interval, stop);
        }
    }

    let mut guard = lock(sim);
    guard.end_run();
    *lock(snapshot) = guard.snapshot();
    info!("Scheduler thread finished after {} steps", done);
    Ok(guard.summary(done, terminated))
}

/// Sleep until `deadline` in short slices so a stop request is honored
/// promptly.
fn pace(deadline: Instant, stop: &AtomicBool) {
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(PACING_SLICE));
    }
}
