pub mod clock;
pub mod config;

pub use clock::{ManualClock, SystemClock, WallClock};
pub use config::{ConvergencePolicy, SimConfig};

use crate::agents::Agent;
use crate::error::Result;
use crate::problem::Problem;
use crate::report::SimulationResult;
use crate::statistics::DataCollector;
use crate::supervisor::Supervisor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::ControlFlow;
use std::time::Duration;
use tracing::{info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    ModelTime,
    EventCount,
    Converged,
    WallClock,
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::ModelTime => "model time limit",
            StopReason::EventCount => "event count limit",
            StopReason::Converged => "convergence",
            StopReason::WallClock => "wall clock limit",
            StopReason::Cancelled => "cancellation",
        };
        f.write_str(text)
    }
}

// Snapshot handed to the hook between events.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub event_count: u64,
    pub model_time: f64,
    pub generation_error: f64,
    pub elapsed: Duration,
}

pub struct Simulation {
    config: SimConfig,
    supervisor: Supervisor,
    collector: DataCollector,
    clock: Box<dyn WallClock>,
}

impl Simulation {
    pub fn new(problem: Problem) -> Self {
        Self::with_clock(problem, SystemClock::start())
    }

    pub fn with_clock(problem: Problem, clock: impl WallClock + 'static) -> Self {
        let Problem {
            network,
            links,
            tracked,
            config,
            handlers,
        } = problem;
        let collector = DataCollector::new(&tracked, &network, &config);
        Self {
            config,
            supervisor: Supervisor::new(network, links, handlers),
            collector,
            clock: Box::new(clock),
        }
    }

    pub fn run(self) -> Result<SimulationResult> {
        self.run_with(|_| ControlFlow::Continue(()))
    }

    // Runs until a limit is hit or `hook` breaks. The hook sees every gap
    // between two events and nothing finer.
    pub fn run_with<F>(mut self, mut hook: F) -> Result<SimulationResult>
    where
        F: FnMut(&Progress) -> ControlFlow<()>,
    {
        info!("Starting simulation: {}", self.config.name);
        info!(
            "Limits: {} events, model time {}, wall clock {:?}",
            self.config.max_event_count, self.config.max_model_time, self.config.max_wall_clock
        );

        let reason = loop {
            if let Some(reason) = self.stop_reason() {
                break reason;
            }
            if hook(&self.progress()).is_break() {
                break StopReason::Cancelled;
            }
            self.step()?;
        };

        let result = self.finish(reason);
        info!(
            "Simulation '{}' stopped by {} after {} events (model time {:.4}, error {:.6})",
            result.name, reason, result.event_count, result.model_time, result.generation_error
        );
        Ok(result)
    }

    // Selects the next event, accounts for the time leading up to it and
    // fires it.
    pub fn step(&mut self) -> Result<bool> {
        let event = self.supervisor.get_next_event()?;
        let delta = event.model_time - self.supervisor.now();
        self.collector.add_state(delta, self.supervisor.network());
        let fired = self.supervisor.fire_event(event)?;
        self.collector.record_transitions(event.model_time, self.supervisor.network());
        if !fired {
            trace!("event of agent #{} at {:.6} had no effect", event.agent.0, event.model_time);
        }
        Ok(fired)
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.collector.stop_reason().or_else(|| {
            (self.clock.elapsed() >= self.config.max_wall_clock).then_some(StopReason::WallClock)
        })
    }

    pub fn progress(&self) -> Progress {
        Progress {
            event_count: self.collector.event_count(),
            model_time: self.collector.model_time(),
            generation_error: self.collector.generation_error(),
            elapsed: self.clock.elapsed(),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn collector(&self) -> &DataCollector {
        &self.collector
    }

    fn finish(&self, stop_reason: StopReason) -> SimulationResult {
        let (calls_created, calls_dropped) = self
            .supervisor
            .network()
            .iter()
            .filter_map(|(_, agent)| match agent {
                Agent::Source(source) => Some((source.calls_created(), source.calls_dropped())),
                _ => None,
            })
            .fold((0, 0), |(c, d), (sc, sd)| (c + sc, d + sd));

        SimulationResult {
            name: self.config.name.clone(),
            wall_clock_secs: self.clock.elapsed().as_secs_f64(),
            event_count: self.collector.event_count(),
            model_time: self.collector.model_time(),
            generation_error: self.collector.generation_error(),
            stop_reason,
            calls_created,
            calls_dropped,
            distributions: self.collector.distributions(),
            traces: self.collector.traces(),
        }
    }
}
