pub mod continuous;
pub mod uniform;

pub use uniform::{RngSource, SequenceSource, SourceFactory, UniformSource};

use crate::assembly::args::{self, Arg, Bindings, ParamKind, Signature};
use crate::error::{Result, SimError};
use crate::spec::DistributionSpec;
use continuous::{Deterministic, Erlang, Exponential, Normal, Rayleigh, Uniform};
use std::collections::HashMap;
use std::fmt;

// A stochastic generator of non-negative durations.
pub trait Distribution: Send + fmt::Debug {
    fn generate(&mut self) -> f64;
    fn name(&self) -> &str;
}

type BuildDistribution = fn(&mut Bindings, Box<dyn UniformSource>) -> Result<Box<dyn Distribution>>;

#[derive(Debug)]
pub struct DistributionRegistry {
    kinds: HashMap<String, &'static [Signature<BuildDistribution>]>,
}

const EXPONENTIAL: &[Signature<BuildDistribution>] = &[Signature {
    params: &[ParamKind::Real],
    build: |b, src| Ok(Box::new(Exponential::new(b.real()?, src)?)),
}];

const NORMAL: &[Signature<BuildDistribution>] = &[Signature {
    params: &[ParamKind::Real, ParamKind::Real],
    build: |b, src| Ok(Box::new(Normal::new(b.real()?, b.real()?, src)?)),
}];

const RAYLEIGH: &[Signature<BuildDistribution>] = &[Signature {
    params: &[ParamKind::Real],
    build: |b, src| Ok(Box::new(Rayleigh::new(b.real()?, src)?)),
}];

const UNIFORM: &[Signature<BuildDistribution>] = &[Signature {
    params: &[ParamKind::Real, ParamKind::Real],
    build: |b, src| Ok(Box::new(Uniform::new(b.real()?, b.real()?, src)?)),
}];

const DETERMINISTIC: &[Signature<BuildDistribution>] = &[Signature {
    params: &[ParamKind::Real],
    build: |b, _| Ok(Box::new(Deterministic::new(b.real()?)?)),
}];

const ERLANG: &[Signature<BuildDistribution>] = &[Signature {
    params: &[ParamKind::Unsigned, ParamKind::Real],
    build: |b, src| Ok(Box::new(Erlang::new(b.unsigned()?, b.real()?, src)?)),
}];

impl DistributionRegistry {
    pub fn new() -> Self {
        let mut registry = Self { kinds: HashMap::new() };
        registry.register_builtin();
        registry
    }

    fn register_builtin(&mut self) {
        self.register("exponential", EXPONENTIAL);
        self.register("exponentialdistribution", EXPONENTIAL);
        self.register("normal", NORMAL);
        self.register("normaldistribution", NORMAL);
        self.register("rayleigh", RAYLEIGH);
        self.register("rayleighdistribution", RAYLEIGH);
        self.register("uniform", UNIFORM);
        self.register("uniformdistribution", UNIFORM);
        self.register("deterministic", DETERMINISTIC);
        self.register("constant", DETERMINISTIC);
        self.register("erlang", ERLANG);
        self.register("erlangdistribution", ERLANG);
    }

    pub fn register(&mut self, name: &str, signatures: &'static [Signature<BuildDistribution>]) {
        self.kinds.insert(name.to_lowercase(), signatures);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(&name.to_lowercase())
    }

    pub fn create(&self, spec: &DistributionSpec, sources: &mut SourceFactory) -> Result<Box<dyn Distribution>> {
        let signatures = self
            .kinds
            .get(&spec.type_name.to_lowercase())
            .ok_or_else(|| SimError::UnknownDistribution {
                type_name: spec.type_name.clone(),
            })?;

        let args: Vec<Arg> = spec.arguments.iter().cloned().map(Arg::Value).collect();
        let signature = args::select(&spec.type_name, signatures, &args)?;
        let mut bound = args::bind_all(&spec.type_name, signature.params, args)?;
        (signature.build)(&mut bound, sources.next_source())
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.kinds.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn global() -> &'static DistributionRegistry {
        use std::sync::OnceLock;
        static REGISTRY: OnceLock<DistributionRegistry> = OnceLock::new();
        REGISTRY.get_or_init(DistributionRegistry::new)
    }
}

impl Default for DistributionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
