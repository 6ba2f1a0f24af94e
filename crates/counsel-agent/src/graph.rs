//! Execution graph - supervisor entry, worker nodes, FINISH terminal
//!
//! ```text
//!            ┌──────────── next ────────────┐
//!            ▼                              │
//!   agent_supervisor ──FINISH──▶ end        │
//!            │                              │
//!            └──▶ worker ───────────────────┘
//! ```
//!
//! One node runs at a time. Workers always return to the supervisor.

use crate::state::{ConversationState, Route, StateUpdate};
use crate::supervisor::RouteError;
use crate::worker::AgentError;
use counsel_core::SUPERVISOR_NODE;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_MAX_HOPS: usize = 25;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("run exceeded {max_hops} node executions")]
    HopLimit { max_hops: usize },

    #[error(transparent)]
    Routing(#[from] RouteError),

    #[error("worker '{node}' failed: {source}")]
    Worker {
        node: String,
        #[source]
        source: AgentError,
    },

    #[error("no node registered for member '{0}'")]
    MissingNode(String),

    #[error("node '{0}' registered twice")]
    DuplicateNode(String),

    #[error("node name '{0}' is reserved for the supervisor")]
    ReservedName(String),
}

/// A worker: reads the state, contributes exactly one turn.
#[async_trait::async_trait]
pub trait WorkerNode: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, state: &ConversationState) -> Result<StateUpdate, AgentError>;
}

/// The supervisor: reads the state, sets `next` and nothing else.
#[async_trait::async_trait]
pub trait Router: Send + Sync {
    fn members(&self) -> &[String];
    async fn route(&self, state: &ConversationState) -> Result<StateUpdate, RouteError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub state: ConversationState,
    /// Nodes in execution order, supervisor visits included.
    pub path: Vec<String>,
}

impl RunResult {
    /// Content of the last worker turn, empty when no worker ran.
    pub fn answer(&self) -> String {
        self.state.last_worker_turn().map(|t| t.content.clone()).unwrap_or_default()
    }

    pub fn last_worker(&self) -> Option<&str> {
        self.state.last_worker_turn().and_then(|t| t.name.as_deref())
    }
}

pub struct GraphBuilder {
    router: Arc<dyn Router>,
    nodes: HashMap<String, Arc<dyn WorkerNode>>,
    max_hops: usize,
}

impl GraphBuilder {
    pub fn new(router: Arc<dyn Router>) -> Self {
        Self { router, nodes: HashMap::new(), max_hops: DEFAULT_MAX_HOPS }
    }

    pub fn node(mut self, node: Arc<dyn WorkerNode>) -> Result<Self, GraphError> {
        let name = node.name().to_string();
        if name == SUPERVISOR_NODE {
            return Err(GraphError::ReservedName(name));
        }
        if self.nodes.contains_key(&name) {
            return Err(GraphError::DuplicateNode(name));
        }
        self.nodes.insert(name, node);
        Ok(self)
    }

    pub fn max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    /// Every member the router may pick must have a node.
    pub fn build(self) -> Result<ExecutionGraph, GraphError> {
        for member in self.router.members() {
            if !self.nodes.contains_key(member) {
                return Err(GraphError::MissingNode(member.clone()));
            }
        }
        info!("Workflow compiled with {} worker nodes", self.nodes.len());
        Ok(ExecutionGraph { router: self.router, nodes: self.nodes, max_hops: self.max_hops })
    }
}

pub struct ExecutionGraph {
    router: Arc<dyn Router>,
    nodes: HashMap<String, Arc<dyn WorkerNode>>,
    max_hops: usize,
}

impl std::fmt::Debug for ExecutionGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut nodes: Vec<&String> = self.nodes.keys().collect();
        nodes.sort();
        f.debug_struct("ExecutionGraph")
            .field("nodes", &nodes)
            .field("max_hops", &self.max_hops)
            .finish()
    }
}

impl ExecutionGraph {
    pub fn builder(router: Arc<dyn Router>) -> GraphBuilder {
        GraphBuilder::new(router)
    }

    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    /// Loop supervisor → worker → supervisor until the supervisor finishes.
    pub async fn invoke(&self, mut state: ConversationState) -> Result<RunResult, GraphError> {
        let mut path = Vec::new();
        loop {
            self.hop(&mut path, SUPERVISOR_NODE)?;
            let update = self.router.route(&state).await?;
            state.apply(update);

            let worker = match &state.next {
                Some(Route::Worker(name)) => name.clone(),
                Some(Route::Finish) | None => break,
            };
            let node = self
                .nodes
                .get(&worker)
                .ok_or_else(|| GraphError::MissingNode(worker.clone()))?;

            self.hop(&mut path, &worker)?;
            let update = node
                .run(&state)
                .await
                .map_err(|source| GraphError::Worker { node: worker.clone(), source })?;
            state.apply(update);
        }

        debug!("Graph finished after {} hops: {:?}", path.len(), path);
        Ok(RunResult { state, path })
    }

    fn hop(&self, path: &mut Vec<String>, node: &str) -> Result<(), GraphError> {
        if path.len() >= self.max_hops {
            return Err(GraphError::HopLimit { max_hops: self.max_hops });
        }
        path.push(node.to_string());
        Ok(())
    }
}
