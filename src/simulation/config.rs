use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

// Wall clock budgets are written as plain seconds in problem files.
mod seconds {
    use super::*;

    pub fn serialize<S: Serializer>(budget: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(budget.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

// When to re-measure the distance between successive empirical distributions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergencePolicy {
    // Events before the first check.
    pub check_step: u64,
    // After check `k` the next one is `check_step * step_growth_multiplier * k` events later.
    pub step_growth_multiplier: u64,
    // Stop once the generation error drops to this value.
    pub min_error: f64,
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        Self {
            check_step: 10_000,
            step_growth_multiplier: 3,
            min_error: 0.000_01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub name: String,
    #[serde(with = "seconds", alias = "max_wall_clock_secs")]
    pub max_wall_clock: Duration,
    pub max_event_count: u64,
    pub max_model_time: f64,
    // Master seed for every distribution in the problem. `None` draws from entropy.
    pub seed: Option<u64>,
    pub convergence: ConvergencePolicy,
    // Keep a (time, occupancy) trace for every service block.
    pub trace_service_blocks: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            name: "default_sim".to_string(),
            max_wall_clock: Duration::from_secs(30 * 60),
            max_event_count: 1_000_000,
            max_model_time: 1_000.0,
            seed: None,
            convergence: ConvergencePolicy::default(),
            trace_service_blocks: false,
        }
    }
}

impl SimConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_limits(mut self, max_event_count: u64, max_model_time: f64) -> Self {
        self.max_event_count = max_event_count;
        self.max_model_time = max_model_time;
        self
    }

    pub fn with_wall_clock(mut self, max_wall_clock: Duration) -> Self {
        self.max_wall_clock = max_wall_clock;
        self
    }

    pub fn with_trace(mut self, trace_service_blocks: bool) -> Self {
        self.trace_service_blocks = trace_service_blocks;
        self
    }

    pub fn with_convergence(mut self, check_step: u64, step_growth_multiplier: u64, min_error: f64) -> Self {
        self.convergence = ConvergencePolicy {
            check_step,
            step_growth_multiplier,
            min_error,
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: SimConfig = serde_json::from_str(r#"{ "name": "mm1", "max_event_count": 500 }"#).unwrap();
        assert_eq!(config.name, "mm1");
        assert_eq!(config.max_event_count, 500);
        assert_eq!(config.max_model_time, 1_000.0);
        assert_eq!(config.convergence.check_step, 10_000);
        assert_eq!(config.max_wall_clock, Duration::from_secs(1800));
    }

    #[test]
    fn wall_clock_budget_is_read_in_seconds() {
        let config: SimConfig = serde_json::from_str(r#"{ "max_wall_clock": 60 }"#).unwrap();
        assert_eq!(config.max_wall_clock, Duration::from_secs(60));

        let config: SimConfig = serde_json::from_str(r#"{ "max_wall_clock_secs": 1.5 }"#).unwrap();
        assert_eq!(config.max_wall_clock, Duration::from_millis(1500));

        assert!(serde_json::from_str::<SimConfig>(r#"{ "max_wall_clock": -1 }"#).is_err());

        let json = serde_json::to_value(SimConfig::default()).unwrap();
        assert_eq!(json["max_wall_clock"], serde_json::json!(1800.0));
    }

    #[test]
    fn builders_chain() {
        let config = SimConfig::default()
            .with_name("x")
            .with_seed(9)
            .with_limits(10, 5.0)
            .with_convergence(10, 3, 0.01);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.max_event_count, 10);
        assert_eq!(config.convergence.step_growth_multiplier, 3);
    }
}
