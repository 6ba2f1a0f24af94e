//! Counsel Agent - Worker agents, the supervisor-routed execution graph, and the run driver

pub mod driver;
pub mod graph;
pub mod memory;
pub mod settings;
pub mod state;
pub mod supervisor;
pub mod worker;

pub use driver::{
    AppBuilder, AppCache, AppSlot, BuildError, DriverConfig, FailureKind, RunDriver, RunError, RunOutcome, RunStatus,
};
pub use graph::{ExecutionGraph, GraphBuilder, GraphError, Router, RunResult, WorkerNode, DEFAULT_MAX_HOPS};
pub use memory::{InMemorySessionStore, SessionMemory, DEFAULT_TTL};
pub use settings::{FileSettingsStore, InMemorySettingsStore, SettingsManager, SettingsStore};
pub use state::{ConversationState, Route, StateUpdate};
pub use supervisor::{InvalidRoutePolicy, RouteError, Supervisor};
pub use worker::{AgentError, AgentOutput, TraceStep, WorkerAgent, DEFAULT_MAX_ITERATIONS};
