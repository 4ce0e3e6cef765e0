pub mod logger;

use crate::simulation::StopReason;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

// Empirical occupancy distribution of one tracked agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDistribution {
    pub agent_id: String,
    // State to share of model time spent in it.
    pub probabilities: BTreeMap<usize, f64>,
    pub mean: f64,
}

impl AgentDistribution {
    pub fn from_weights(agent_id: impl Into<String>, weights: &BTreeMap<usize, f64>, model_time: f64) -> Self {
        let probabilities: BTreeMap<usize, f64> = if model_time > 0.0 {
            weights.iter().map(|(&s, &w)| (s, w / model_time)).collect()
        } else {
            weights.clone()
        };
        let mean = probabilities.iter().map(|(&s, &p)| s as f64 * p).sum();
        Self {
            agent_id: agent_id.into(),
            probabilities,
            mean,
        }
    }

    pub fn probability(&self, state: usize) -> f64 {
        self.probabilities.get(&state).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    pub time: f64,
    pub state: usize,
}

// Occupancy of a service block each time it changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyTrace {
    pub agent_id: String,
    pub points: Vec<TracePoint>,
}

impl OccupancyTrace {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            points: Vec::new(),
        }
    }

    // Appends only when `state` differs from the last recorded one; the block
    // starts out empty.
    pub fn record(&mut self, time: f64, state: usize) -> bool {
        let last = self.points.last().map_or(0, |p| p.state);
        if state == last {
            return false;
        }
        self.points.push(TracePoint { time, state });
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub name: String,
    pub wall_clock_secs: f64,
    pub event_count: u64,
    pub model_time: f64,
    pub generation_error: f64,
    pub stop_reason: StopReason,
    pub calls_created: u64,
    pub calls_dropped: u64,
    pub distributions: Vec<AgentDistribution>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traces: Vec<OccupancyTrace>,
}

impl SimulationResult {
    pub fn distribution(&self, agent_id: &str) -> Option<&AgentDistribution> {
        self.distributions.iter().find(|d| d.agent_id == agent_id)
    }

    pub fn trace(&self, agent_id: &str) -> Option<&OccupancyTrace> {
        self.traces.iter().find(|t| t.agent_id == agent_id)
    }

    pub fn drop_rate(&self) -> f64 {
        if self.calls_created > 0 {
            self.calls_dropped as f64 / self.calls_created as f64
        } else {
            0.0
        }
    }
}

pub fn render_text(result: &SimulationResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Simulation '{}'", result.name);
    let _ = writeln!(out, "  stopped by:       {}", result.stop_reason);
    let _ = writeln!(out, "  wall clock:       {:.3} s", result.wall_clock_secs);
    let _ = writeln!(out, "  events:           {}", result.event_count);
    let _ = writeln!(out, "  model time:       {:.4}", result.model_time);
    let _ = writeln!(out, "  generation error: {:.6}", result.generation_error);
    let _ = writeln!(
        out,
        "  calls:            {} created, {} dropped ({:.2}%)",
        result.calls_created,
        result.calls_dropped,
        result.drop_rate() * 100.0
    );

    for dist in &result.distributions {
        let _ = writeln!(out, "\n  {} (mean occupancy {:.4})", dist.agent_id, dist.mean);
        for (state, p) in &dist.probabilities {
            let _ = writeln!(out, "    {:>5}  {:.6}", state, p);
        }
    }
    for trace in &result.traces {
        let _ = writeln!(out, "\n  {} trace ({} changes)", trace.agent_id, trace.points.len());
        for point in &trace.points {
            let _ = writeln!(out, "    {:<12.6} - {}", point.time, point.state);
        }
    }
    out
}
