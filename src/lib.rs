pub mod agents;
pub mod assembly;
pub mod distributions;
pub mod error;
pub mod problem;
pub mod report;
pub mod simulation;
pub mod spec;
pub mod statistics;
pub mod supervisor;

pub use assembly::{AgentRegistry, Assembler};
pub use error::{Result, SimError};
pub use problem::Problem;
pub use report::SimulationResult;
pub use simulation::{SimConfig, Simulation, StopReason};
pub use spec::ProblemSpec;

pub mod prelude {
    pub use crate::agents::{Agent, AgentIndex, AgentKind, EventTag, ModellingAgent, Network};
    pub use crate::assembly::{AgentRegistry, Assembler, assemble};
    pub use crate::distributions::{Distribution, DistributionRegistry, SourceFactory, UniformSource};
    pub use crate::error::{Result, SimError};
    pub use crate::problem::Problem;
    pub use crate::report::{AgentDistribution, OccupancyTrace, SimulationResult, TracePoint};
    pub use crate::simulation::{ManualClock, SimConfig, Simulation, StopReason, SystemClock, WallClock};
    pub use crate::spec::{AgentSpec, ArgValue, DistributionSpec, ProblemSpec};
}
