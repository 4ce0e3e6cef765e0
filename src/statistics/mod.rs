pub mod kolmogorov;

pub use kolmogorov::{dense_distribution, kolmogorov_distance};

use crate::agents::{AgentIndex, AgentKind, ModellingAgent, Network};
use crate::report::{AgentDistribution, OccupancyTrace};
use crate::simulation::{SimConfig, StopReason};
use crate::simulation::config::ConvergencePolicy;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug)]
struct TrackedAgent {
    idx: AgentIndex,
    id: String,
    // State to accumulated model time.
    weights: BTreeMap<usize, f64>,
    previous: Option<Vec<f64>>,
}

// Time-weighted occupancy histograms for the tracked agents, plus the
// convergence test that decides when they have settled.
#[derive(Debug)]
pub struct DataCollector {
    tracked: Vec<TrackedAgent>,
    model_time: f64,
    event_count: u64,
    next_checkpoint: u64,
    checks_performed: u64,
    generation_error: f64,
    policy: ConvergencePolicy,
    max_model_time: f64,
    max_event_count: u64,
    traces: Vec<(AgentIndex, OccupancyTrace)>,
}

impl DataCollector {
    pub fn new(tracked: &[AgentIndex], network: &Network, config: &SimConfig) -> Self {
        let tracked = tracked
            .iter()
            .filter_map(|&idx| {
                network.get(idx).map(|agent| TrackedAgent {
                    idx,
                    id: agent.id().to_string(),
                    weights: BTreeMap::new(),
                    previous: None,
                })
            })
            .collect();
        Self {
            tracked,
            model_time: 0.0,
            event_count: 0,
            next_checkpoint: config.convergence.check_step,
            checks_performed: 0,
            generation_error: 1.0,
            policy: config.convergence,
            max_model_time: config.max_model_time,
            max_event_count: config.max_event_count,
            traces: Self::trace_targets(network, config),
        }
    }

    fn trace_targets(network: &Network, config: &SimConfig) -> Vec<(AgentIndex, OccupancyTrace)> {
        if !config.trace_service_blocks {
            return Vec::new();
        }
        network
            .iter()
            .filter(|(_, agent)| agent.kind() == AgentKind::ServiceBlock)
            .map(|(idx, agent)| (idx, OccupancyTrace::new(agent.id())))
            .collect()
    }

    // Call after an event fired, with the time it fired at.
    pub fn record_transitions(&mut self, t: f64, network: &Network) {
        for (idx, trace) in &mut self.traces {
            if let Some(block) = network.get(*idx) {
                trace.record(t, block.current_state());
            }
        }
    }

    // Records that `delta` model time passed with every tracked agent in
    // its current state. Call before the event that ends the interval fires.
    pub fn add_state(&mut self, delta: f64, network: &Network) {
        self.model_time += delta;
        self.event_count += 1;

        for agent in &mut self.tracked {
            if let Some(live) = network.get(agent.idx) {
                *agent.weights.entry(live.current_state()).or_insert(0.0) += delta;
            }
        }

        if self.event_count >= self.next_checkpoint {
            self.check_convergence();
        }
    }

    fn check_convergence(&mut self) {
        for agent in &mut self.tracked {
            let current = dense_distribution(&agent.weights, self.model_time);
            if let Some(distance) = agent.previous.as_deref().and_then(|prev| kolmogorov_distance(&current, prev)) {
                // Running minimum over every agent and every check.
                self.generation_error = self.generation_error.min(distance);
            }
            agent.previous = Some(current);
        }

        self.checks_performed += 1;
        self.next_checkpoint += self.policy.check_step * self.policy.step_growth_multiplier * self.checks_performed;
        debug!(
            "Convergence check #{} at event {}: error {:.6}, next check at {}",
            self.checks_performed, self.event_count, self.generation_error, self.next_checkpoint
        );
    }

    pub fn is_done(&self) -> bool {
        self.stop_reason().is_some()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        if self.model_time >= self.max_model_time {
            Some(StopReason::ModelTime)
        } else if self.event_count >= self.max_event_count {
            Some(StopReason::EventCount)
        } else if self.generation_error <= self.policy.min_error {
            Some(StopReason::Converged)
        } else {
            None
        }
    }

    pub fn model_time(&self) -> f64 {
        self.model_time
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn generation_error(&self) -> f64 {
        self.generation_error
    }

    pub fn next_checkpoint(&self) -> u64 {
        self.next_checkpoint
    }

    pub fn checks_performed(&self) -> u64 {
        self.checks_performed
    }

    // Raw time weights of a tracked agent.
    pub fn histogram(&self, idx: AgentIndex) -> Option<&BTreeMap<usize, f64>> {
        self.tracked.iter().find(|a| a.idx == idx).map(|a| &a.weights)
    }

    pub fn traces(&self) -> Vec<OccupancyTrace> {
        self.traces.iter().map(|(_, trace)| trace.clone()).collect()
    }

    pub fn distributions(&self) -> Vec<AgentDistribution> {
        self.tracked
            .iter()
            .map(|a| AgentDistribution::from_weights(a.id.clone(), &a.weights, self.model_time))
            .collect()
    }
}
