pub mod args;

use crate::agents::buffer::{Buffer, DISCIPLINES, Discipline, SharedBuffer};
use crate::agents::service_block::{FiniteServers, InfiniteServers, PollingServer, ServiceBlock, SingleServer};
use crate::agents::{Agent, AgentIndex, ModellingAgent, Orbit, Source};
use crate::distributions::{DistributionRegistry, SourceFactory};
use crate::error::{Result, SimError};
use crate::problem::Problem;
use crate::simulation::SimConfig;
use crate::spec::{AgentSpec, ProblemSpec};
use args::{Arg, Bindings, ParamKind, Signature};
use std::collections::HashMap;
use tracing::{debug, info};

type BuildAgent = fn(&str, &mut Bindings) -> Result<Agent>;

const DIST: ParamKind = ParamKind::Distribution;

const SOURCE: &[Signature<BuildAgent>] = &[Signature {
    params: &[DIST],
    build: |id, b| Ok(Source::new(id, b.distribution()?).into()),
}];

const FINITE_SOURCE: &[Signature<BuildAgent>] = &[Signature {
    params: &[DIST],
    build: |id, b| Ok(Source::finite(id, b.distribution()?).into()),
}];

const SERVICE_BLOCK: &[Signature<BuildAgent>] = &[Signature {
    params: &[DIST],
    build: |id, b| Ok(ServiceBlock::Single(SingleServer::new(id, b.distribution()?)).into()),
}];

const INF_SERVICE_BLOCKS: &[Signature<BuildAgent>] = &[Signature {
    params: &[DIST],
    build: |id, b| Ok(ServiceBlock::Infinite(InfiniteServers::new(id, b.distribution()?)).into()),
}];

const FIN_SERVICE_BLOCKS: &[Signature<BuildAgent>] = &[Signature {
    params: &[DIST, ParamKind::Unsigned],
    build: |id, b| {
        let distribution = b.distribution()?;
        let servers = usize::try_from(b.unsigned()?)
            .map_err(|_| SimError::invalid("servers", "server count does not fit in memory"))?;
        Ok(ServiceBlock::Finite(FiniteServers::new(id, distribution, servers)?).into())
    },
}];

const POLLING_SERVICE_BLOCK: &[Signature<BuildAgent>] = &[Signature {
    params: &[DIST, ParamKind::Real],
    build: |id, b| {
        let distribution = b.distribution()?;
        Ok(ServiceBlock::Polling(PollingServer::new(id, distribution, b.real()?)?).into())
    },
}];

fn buffer(id: &str, discipline: Discipline, capacity: Option<u64>) -> Result<Agent> {
    let capacity = usize::try_from(capacity.unwrap_or(0))
        .map_err(|_| SimError::invalid("capacity", "buffer capacity does not fit in memory"))?;
    Ok(SharedBuffer::new(Buffer::new(id, discipline, capacity)).into())
}

const QUEUE_BUFFER: &[Signature<BuildAgent>] = &[
    Signature {
        params: &[],
        build: |id, _| buffer(id, Discipline::Queue, None),
    },
    Signature {
        params: &[ParamKind::Unsigned],
        build: |id, b| buffer(id, Discipline::Queue, Some(b.unsigned()?)),
    },
];

const STACK_BUFFER: &[Signature<BuildAgent>] = &[
    Signature {
        params: &[],
        build: |id, _| buffer(id, Discipline::Stack, None),
    },
    Signature {
        params: &[ParamKind::Unsigned],
        build: |id, b| buffer(id, Discipline::Stack, Some(b.unsigned()?)),
    },
];

const GENERIC_BUFFER: &[Signature<BuildAgent>] = &[
    Signature {
        params: &[ParamKind::Choice(DISCIPLINES)],
        build: |id, b| buffer(id, Discipline::from_choice(b.choice()?), None),
    },
    Signature {
        params: &[ParamKind::Choice(DISCIPLINES), ParamKind::Optional(&ParamKind::Unsigned)],
        build: |id, b| {
            let discipline = Discipline::from_choice(b.choice()?);
            buffer(id, discipline, b.optional_unsigned()?)
        },
    },
];

const ORBIT: &[Signature<BuildAgent>] = &[Signature {
    params: &[DIST],
    build: |id, b| Ok(Orbit::new(id, b.distribution()?).into()),
}];

// Agent types constructible from a specification, keyed by lowercase name.
#[derive(Debug)]
pub struct AgentRegistry {
    kinds: HashMap<String, &'static [Signature<BuildAgent>]>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        let mut registry = Self { kinds: HashMap::new() };
        registry.register_builtin();
        registry
    }

    fn register_builtin(&mut self) {
        self.register("Source", SOURCE);
        self.register("FiniteSource", FINITE_SOURCE);
        self.register("ServiceBlock", SERVICE_BLOCK);
        self.register("InfServiceBlocks", INF_SERVICE_BLOCKS);
        self.register("FinServiceBlocks", FIN_SERVICE_BLOCKS);
        self.register("PollingServiceBlock", POLLING_SERVICE_BLOCK);
        self.register("QueueBuffer", QUEUE_BUFFER);
        self.register("StackBuffer", STACK_BUFFER);
        self.register("Buffer", GENERIC_BUFFER);
        self.register("Orbit", ORBIT);
    }

    pub fn register(&mut self, name: &str, signatures: &'static [Signature<BuildAgent>]) {
        self.kinds.insert(name.to_lowercase(), signatures);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(&name.to_lowercase())
    }

    fn signatures(&self, name: &str) -> Result<&'static [Signature<BuildAgent>]> {
        self.kinds
            .get(&name.to_lowercase())
            .copied()
            .ok_or_else(|| SimError::UnknownType {
                type_name: name.to_string(),
            })
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.kinds.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn global() -> &'static AgentRegistry {
        use std::sync::OnceLock;
        static REGISTRY: OnceLock<AgentRegistry> = OnceLock::new();
        REGISTRY.get_or_init(AgentRegistry::new)
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// Turns a [`ProblemSpec`] into a live [`Problem`].
#[derive(Debug)]
pub struct Assembler<'r> {
    agents: &'r AgentRegistry,
    distributions: &'r DistributionRegistry,
    sources: SourceFactory,
}

impl Assembler<'static> {
    // Built-in registries, randomness per the config's seed.
    pub fn for_config(config: &SimConfig) -> Self {
        let sources = match config.seed {
            Some(seed) => SourceFactory::seeded(seed),
            None => SourceFactory::from_entropy(),
        };
        Self::with_sources(sources)
    }

    pub fn with_sources(sources: SourceFactory) -> Self {
        Self::with_registries(AgentRegistry::global(), DistributionRegistry::global(), sources)
    }
}

impl<'r> Assembler<'r> {
    pub fn with_registries(
        agents: &'r AgentRegistry,
        distributions: &'r DistributionRegistry,
        sources: SourceFactory,
    ) -> Self {
        Self {
            agents,
            distributions,
            sources,
        }
    }

    // Builds one agent, ignoring any bound-buffer entries.
    pub fn build_agent(&mut self, spec: &AgentSpec) -> Result<Agent> {
        let signatures = self.agents.signatures(&spec.type_name)?;

        let mut args = Vec::with_capacity(spec.arguments.len() + 1);
        if let Some(dist) = &spec.distribution {
            args.push(Arg::Distribution(self.distributions.create(dist, &mut self.sources)?));
        }
        args.extend(spec.arguments.iter().cloned().map(Arg::Value));

        let signature = args::select(&spec.type_name, signatures, &args)?;
        let mut bound = args::bind_all(&spec.type_name, signature.params, args)?;
        let agent = (signature.build)(&spec.id, &mut bound)?;
        debug!("Built {} '{}' ({})", agent.kind(), spec.id, agent.event_tag());
        Ok(agent)
    }

    fn build_into(&mut self, spec: &AgentSpec, problem: &mut Problem) -> Result<AgentIndex> {
        let mut agent = self.build_agent(spec)?;

        if !spec.buffers.is_empty() && !agent.as_service_block().is_some_and(ServiceBlock::can_bind_buffers) {
            return Err(SimError::invalid(
                "buffers",
                format!("'{}' ({}) cannot bind buffers", spec.id, spec.type_name),
            ));
        }

        for buffer_spec in &spec.buffers {
            let idx = self.build_into(buffer_spec, problem)?;
            let buffer = problem
                .network()
                .get(idx)
                .and_then(Agent::as_buffer)
                .cloned()
                .ok_or_else(|| SimError::NotABuffer {
                    id: buffer_spec.id.clone(),
                    kind: buffer_spec.type_name.clone(),
                })?;
            if let Some(block) = agent.as_service_block_mut() {
                block.bind_buffer(buffer)?;
            }
        }

        problem.add_agent(agent)
    }

    pub fn assemble(&mut self, spec: &ProblemSpec) -> Result<Problem> {
        let mut problem = Problem::new(spec.config.clone());

        for agent in &spec.agents {
            self.build_into(agent, &mut problem)?;
        }
        for (from, targets) in &spec.links {
            for to in targets {
                problem.link(from, to)?;
            }
        }
        for id in &spec.tracked {
            problem.track(id)?;
        }
        problem.validate()?;

        info!(
            "Assembled problem '{}': {} agents, {} tracked",
            problem.config().name,
            problem.network().len(),
            problem.tracked().len()
        );
        Ok(problem)
    }
}

// Assembles with the built-in registries, seeded from the problem's config.
pub fn assemble(spec: &ProblemSpec) -> Result<Problem> {
    Assembler::for_config(&spec.config).assemble(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentKind, EventTag};
    use crate::error::ErrorCategory;
    use crate::spec::{ArgValue, DistributionSpec};

    fn assembler() -> Assembler<'static> {
        Assembler::with_sources(SourceFactory::seeded(7))
    }

    fn exp() -> DistributionSpec {
        DistributionSpec::exponential(1.0)
    }

    #[test]
    fn type_names_are_case_insensitive() {
        let registry = AgentRegistry::new();
        assert!(registry.contains("finservicEBLOCKS"));
        assert!(registry.list().contains(&"pollingserviceblock".to_string()));
    }

    #[test]
    fn distribution_is_prepended_to_the_arguments() {
        let spec = AgentSpec::new("pool", "FinServiceBlocks")
            .with_distribution(exp())
            .with_args(vec![ArgValue::Int(3)]);
        let agent = assembler().build_agent(&spec).unwrap();
        assert_eq!(agent.event_tag(), EventTag::FinServiceBlocks);
        match agent.as_service_block() {
            Some(ServiceBlock::Finite(pool)) => assert_eq!(pool.servers(), 3),
            other => panic!("unexpected agent {other:?}"),
        }
    }

    #[test]
    fn whole_floats_convert_to_counts() {
        let spec = AgentSpec::new("q", "QueueBuffer").with_args(vec![ArgValue::Float(4.0)]);
        let agent = assembler().build_agent(&spec).unwrap();
        assert_eq!(agent.as_buffer().unwrap().lock().capacity(), Some(4));
    }

    #[test]
    fn generic_buffer_parses_its_discipline_by_name() {
        let spec = AgentSpec::new("s", "Buffer").with_args(vec!["STACK".into(), ArgValue::Null]);
        let agent = assembler().build_agent(&spec).unwrap();
        assert_eq!(agent.event_tag(), EventTag::StackBuffer);
        assert_eq!(agent.as_buffer().unwrap().lock().capacity(), None);
    }

    #[test]
    fn unknown_type_and_arity_errors() {
        let err = assembler().build_agent(&AgentSpec::new("x", "Teleporter")).unwrap_err();
        assert!(matches!(err, SimError::UnknownType { .. }));

        let err = assembler().build_agent(&AgentSpec::new("x", "Source")).unwrap_err();
        assert!(matches!(err, SimError::NoMatchingConstructor { arity: 0, .. }));

        let spec = AgentSpec::new("x", "QueueBuffer").with_args(vec!["ten".into()]);
        let err = assembler().build_agent(&spec).unwrap_err();
        assert!(matches!(err, SimError::NoMatchingConstructor { arity: 1, .. }));
    }

    #[test]
    fn negative_capacity_fails_after_selection() {
        let spec = AgentSpec::new("q", "StackBuffer").with_args(vec![ArgValue::Int(-1)]);
        let err = assembler().build_agent(&spec).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ArgumentConversion);
    }

    #[test]
    fn bound_buffers_join_the_network() {
        let spec = ProblemSpec::queueing_system(1.0, 2.0, Some(2), Some(5), SimConfig::default());
        let problem = assembler().assemble(&spec).unwrap();

        let network = problem.network();
        assert_eq!(network.len(), 3);
        let queue = network.find("queue").unwrap();
        assert_eq!(network.get(queue).unwrap().kind(), AgentKind::Buffer);

        let block = network.get(network.find("block").unwrap()).unwrap();
        let bound = block.as_service_block().unwrap().buffers();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].id(), "queue");
    }

    #[test]
    fn only_service_blocks_bind_buffers() {
        let spec = ProblemSpec::new(SimConfig::default()).agent(
            AgentSpec::new("src", "Source")
                .with_distribution(exp())
                .with_buffer(AgentSpec::new("q", "QueueBuffer")),
        );
        let err = assembler().assemble(&spec).unwrap_err();
        assert!(matches!(err, SimError::InvalidParameter { name: "buffers", .. }));
    }

    #[test]
    fn infinite_servers_refuse_buffers() {
        let spec = ProblemSpec::new(SimConfig::default()).agent(
            AgentSpec::new("inf", "InfServiceBlocks")
                .with_distribution(exp())
                .with_buffer(AgentSpec::new("q", "QueueBuffer")),
        );
        let err = assembler().assemble(&spec).unwrap_err();
        assert!(matches!(err, SimError::InvalidParameter { name: "buffers", .. }));
    }

    #[test]
    fn non_buffer_in_buffer_slot_is_rejected() {
        let spec = ProblemSpec::new(SimConfig::default()).agent(
            AgentSpec::new("sb", "ServiceBlock")
                .with_distribution(exp())
                .with_buffer(AgentSpec::new("o", "Orbit").with_distribution(exp())),
        );
        let err = assembler().assemble(&spec).unwrap_err();
        assert!(matches!(err, SimError::NotABuffer { id, .. } if id == "o"));
    }

    #[test]
    fn links_must_point_at_known_agents() {
        let spec = ProblemSpec::new(SimConfig::default())
            .agent(AgentSpec::new("src", "Source").with_distribution(exp()))
            .link("src", "ghost");
        let err = assembler().assemble(&spec).unwrap_err();
        assert!(matches!(err, SimError::UnknownLinkTarget { to, .. } if to == "ghost"));
    }

    #[test]
    fn handlers_follow_the_agents_present() {
        let spec = ProblemSpec::queueing_system(1.0, 2.0, None, None, SimConfig::default());
        let problem = assembler().assemble(&spec).unwrap();
        assert!(problem.handlers().get(EventTag::Source).is_some());
        assert!(problem.handlers().get(EventTag::InfServiceBlocks).is_some());
        assert!(problem.handlers().get(EventTag::Orbit).is_none());
    }
}
