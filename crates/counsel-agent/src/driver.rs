//! Run driver - settings to graph to answer, with coarse outcomes
//!
//! Builds are all-or-nothing: the cache slot for an application is replaced
//! only after every agent and the graph built successfully, and a slot always
//! pairs a document with the graph built from it.

use crate::graph::{ExecutionGraph, GraphBuilder, GraphError, DEFAULT_MAX_HOPS};
use crate::memory::SessionMemory;
use crate::state::ConversationState;
use crate::supervisor::{InvalidRoutePolicy, Supervisor};
use crate::worker::{AgentError, WorkerAgent, DEFAULT_MAX_ITERATIONS};
use counsel_core::{ConfigDocument, ConfigurationError, SessionKey, Turn};
use counsel_llm::ModelSettings;
use counsel_tools::{CapabilityRegistry, ToolContext};
use dashmap::DashMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const NO_SETTINGS: &str = "Initialization failed. No settings available.";
pub const APP_NOT_CONFIGURED: &str = "Initialization failed. App not configured.";
pub const TRY_AGAIN: &str = "Please Try Again! If the issue persists, contact support.";

/// Graph limits applied to every build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub max_hops: usize,
    pub max_iterations: usize,
    pub invalid_route: InvalidRoutePolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            invalid_route: InvalidRoutePolicy::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("session memory: {0}")]
    Memory(#[from] counsel_core::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Ok,
    InternalError,
}

impl RunStatus {
    pub fn code(&self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::InternalError => 500,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("200 OK"),
            Self::InternalError => f.write_str("500 Internal Server Error"),
        }
    }
}

impl Serialize for RunStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Why a run failed. Kept out of the serialized outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NoSettings,
    Build,
    Execution,
}

impl FailureKind {
    pub fn message(&self) -> &'static str {
        match self {
            Self::NoSettings => NO_SETTINGS,
            Self::Build => APP_NOT_CONFIGURED,
            Self::Execution => TRY_AGAIN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub result: String,
    pub status: RunStatus,
    #[serde(skip)]
    pub failure: Option<FailureKind>,
}

impl RunOutcome {
    pub fn ok(result: impl Into<String>) -> Self {
        Self { result: result.into(), status: RunStatus::Ok, failure: None }
    }

    pub fn failure(kind: FailureKind) -> Self {
        Self {
            result: kind.message().to_string(),
            status: RunStatus::InternalError,
            failure: Some(kind),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == RunStatus::Ok
    }

    /// True when the settings handed to the run could not be built.
    pub fn is_build_failure(&self) -> bool {
        self.failure == Some(FailureKind::Build)
    }
}

/// A document and the graph built from it.
#[derive(Debug)]
pub struct AppSlot {
    pub settings: ConfigDocument,
    pub graph: ExecutionGraph,
}

/// Application id → last successfully built slot.
#[derive(Default)]
pub struct AppCache {
    slots: DashMap<String, Arc<AppSlot>>,
}

impl AppCache {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, app_id: &str) -> Option<Arc<AppSlot>> {
        self.slots.get(app_id).map(|s| s.clone())
    }

    pub fn store(&self, app_id: &str, slot: Arc<AppSlot>) {
        self.slots.insert(app_id.to_string(), slot);
    }

    pub fn len(&self) -> usize { self.slots.len() }
    pub fn is_empty(&self) -> bool { self.slots.is_empty() }
}

/// Model overrides from the document's `params`: `model`, `max_tokens`, `temperature`.
fn model_settings(base: &ModelSettings, params: &Map<String, Value>) -> ModelSettings {
    let mut model = base.clone();
    if let Some(name) = params.get("model").and_then(Value::as_str) {
        model.model = name.to_string();
    }
    if let Some(max_tokens) = params.get("max_tokens").and_then(Value::as_u64) {
        match u32::try_from(max_tokens) {
            Ok(max_tokens) => model.max_tokens = max_tokens,
            Err(_) => warn!(max_tokens, "Ignoring out-of-range max_tokens override"),
        }
    }
    if let Some(temperature) = params.get("temperature").and_then(Value::as_f64) {
        model.temperature = Some(temperature as f32);
    }
    model
}

/// Turns a configuration document into an execution graph.
pub struct AppBuilder {
    registry: Arc<CapabilityRegistry>,
    tools: ToolContext,
    config: DriverConfig,
}

impl AppBuilder {
    pub fn new(registry: Arc<CapabilityRegistry>, tools: ToolContext) -> Self {
        Self { registry, tools, config: DriverConfig::default() }
    }

    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub async fn build(&self, settings: &ConfigDocument) -> Result<ExecutionGraph, BuildError> {
        let supervisor_settings = settings.validate()?;
        let model = model_settings(&self.tools.model, &settings.params);
        let ctx = self.tools.clone().with_model(model.clone());

        let supervisor = Supervisor::from_settings(supervisor_settings, ctx.provider.clone(), model)?
            .with_policy(self.config.invalid_route);
        let mut graph = GraphBuilder::new(Arc::new(supervisor)).max_hops(self.config.max_hops);

        for member in &supervisor_settings.members {
            let agent_settings = settings.agent(member)?;
            let mut agent = WorkerAgent::build(member, &agent_settings, &self.registry, &ctx).await?;
            if agent_settings.parent_settings.max_iterations.is_none() {
                agent = agent.with_max_iterations(self.config.max_iterations);
            }
            graph = graph.node(Arc::new(agent))?;
        }

        Ok(graph.build()?)
    }
}

pub struct RunDriver {
    builder: AppBuilder,
    cache: Arc<AppCache>,
    memory: Arc<dyn SessionMemory>,
}

impl RunDriver {
    pub fn new(builder: AppBuilder, memory: Arc<dyn SessionMemory>) -> Self {
        Self { builder, cache: Arc::new(AppCache::new()), memory }
    }

    pub fn with_cache(mut self, cache: Arc<AppCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<AppCache> {
        &self.cache
    }

    /// Serve one query.
    ///
    /// With settings, the graph is rebuilt first; without, the cached graph
    /// for `app_id` is reused. Failures come back as fixed messages with a
    /// 500 status; details only reach the log.
    pub async fn run(
        &self,
        app_id: &str,
        session: &SessionKey,
        query: &str,
        settings: Option<ConfigDocument>,
    ) -> RunOutcome {
        let slot = match settings.filter(|s| !s.is_empty()) {
            None => match self.cache.get(app_id) {
                Some(slot) => {
                    debug!(app = app_id, "Reusing last settings");
                    slot
                }
                None => {
                    error!(app = app_id, "No settings provided and no last settings available");
                    return RunOutcome::failure(FailureKind::NoSettings);
                }
            },
            Some(settings) => {
                debug!(app = app_id, "Updating settings");
                match self.builder.build(&settings).await {
                    Ok(graph) => {
                        let slot = Arc::new(AppSlot { settings, graph });
                        self.cache.store(app_id, slot.clone());
                        info!(app = app_id, "Agents and graph rebuilt");
                        slot
                    }
                    Err(e) => {
                        error!(app = app_id, "Error initializing agents: {}", e);
                        return RunOutcome::failure(FailureKind::Build);
                    }
                }
            }
        };

        match self.execute(&slot, session, query).await {
            Ok(answer) => {
                info!(app = app_id, session = %session, "Driver function executed successfully");
                RunOutcome::ok(answer)
            }
            Err(e) => {
                error!(app = app_id, session = %session, "Error with run driver: {}", e);
                RunOutcome::failure(FailureKind::Execution)
            }
        }
    }

    async fn execute(&self, slot: &AppSlot, session: &SessionKey, query: &str) -> Result<String, RunError> {
        let history = self.memory.load(session).await?;
        let state = ConversationState::new(query, history);
        let result = slot.graph.invoke(state).await?;

        let answer = result.answer();
        let mut turn = Turn::ai(answer.clone());
        if let Some(worker) = result.last_worker() {
            turn = turn.with_name(worker);
        }
        self.memory.append(session, turn).await?;
        Ok(answer)
    }
}
