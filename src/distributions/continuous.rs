use super::Distribution;
use super::uniform::UniformSource;
use crate::error::{Result, SimError};
use rand::Rng;

fn positive(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SimError::invalid(name, format!("must be a positive real, got {value}")))
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(SimError::invalid(name, format!("must be a non-negative real, got {value}")))
    }
}

#[derive(Debug)]
pub struct Exponential {
    rate: f64,
    source: Box<dyn UniformSource>,
}

impl Exponential {
    pub fn new(rate: f64, source: Box<dyn UniformSource>) -> Result<Self> {
        Ok(Self {
            rate: positive("rate", rate)?,
            source,
        })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl Distribution for Exponential {
    fn generate(&mut self) -> f64 {
        -self.source.next_uniform().ln() / self.rate
    }

    fn name(&self) -> &str {
        "Exponential"
    }
}

// Truncated at zero since durations can't be negative.
#[derive(Debug)]
pub struct Normal {
    sampler: rand_distr::Normal<f64>,
    source: Box<dyn UniformSource>,
}

impl Normal {
    pub fn new(mean: f64, std_dev: f64, source: Box<dyn UniformSource>) -> Result<Self> {
        if !mean.is_finite() {
            return Err(SimError::invalid("mean", format!("must be finite, got {mean}")));
        }
        let sampler = rand_distr::Normal::new(mean, positive("std_dev", std_dev)?)
            .map_err(|e| SimError::invalid("std_dev", e.to_string()))?;
        Ok(Self { sampler, source })
    }
}

impl Distribution for Normal {
    fn generate(&mut self) -> f64 {
        self.source.sample(&self.sampler).max(0.0)
    }

    fn name(&self) -> &str {
        "Normal"
    }
}

#[derive(Debug)]
pub struct Rayleigh {
    sigma: f64,
    source: Box<dyn UniformSource>,
}

impl Rayleigh {
    pub fn new(sigma: f64, source: Box<dyn UniformSource>) -> Result<Self> {
        Ok(Self {
            sigma: positive("sigma", sigma)?,
            source,
        })
    }
}

impl Distribution for Rayleigh {
    fn generate(&mut self) -> f64 {
        self.sigma * (-self.source.next_uniform().ln()).sqrt()
    }

    fn name(&self) -> &str {
        "Rayleigh"
    }
}

#[derive(Debug)]
pub struct Uniform {
    sampler: rand_distr::Uniform<f64>,
    source: Box<dyn UniformSource>,
}

impl Uniform {
    pub fn new(low: f64, high: f64, source: Box<dyn UniformSource>) -> Result<Self> {
        let low = non_negative("low", low)?;
        let high = non_negative("high", high)?;
        if high <= low {
            return Err(SimError::invalid("high", format!("must exceed low ({low}), got {high}")));
        }
        Ok(Self {
            sampler: rand_distr::Uniform::new(low, high),
            source,
        })
    }
}

impl Distribution for Uniform {
    fn generate(&mut self) -> f64 {
        self.source.sample(&self.sampler)
    }

    fn name(&self) -> &str {
        "Uniform"
    }
}

#[derive(Debug, Clone)]
pub struct Deterministic {
    value: f64,
}

impl Deterministic {
    pub fn new(value: f64) -> Result<Self> {
        Ok(Self {
            value: non_negative("value", value)?,
        })
    }
}

impl Distribution for Deterministic {
    fn generate(&mut self) -> f64 {
        self.value
    }

    fn name(&self) -> &str {
        "Deterministic"
    }
}

// Gamma with an integer shape and scale 1 / rate.
#[derive(Debug)]
pub struct Erlang {
    sampler: rand_distr::Gamma<f64>,
    source: Box<dyn UniformSource>,
}

impl Erlang {
    pub fn new(shape: u64, rate: f64, source: Box<dyn UniformSource>) -> Result<Self> {
        if shape == 0 {
            return Err(SimError::invalid("shape", "must be at least 1"));
        }
        let rate = positive("rate", rate)?;
        let sampler = rand_distr::Gamma::new(shape as f64, 1.0 / rate)
            .map_err(|e| SimError::invalid("rate", e.to_string()))?;
        Ok(Self { sampler, source })
    }
}

impl Distribution for Erlang {
    fn generate(&mut self) -> f64 {
        self.source.sample(&self.sampler)
    }

    fn name(&self) -> &str {
        "Erlang"
    }
}
