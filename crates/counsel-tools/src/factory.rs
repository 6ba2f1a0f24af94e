//! Tool factory: resolve declarative tool references into capabilities
//!
//! Configuration names a `module`, an optional `class`, and a `function`.
//! Instead of loading code by name, the registry maps those names onto
//! statically typed factories; configuration selects a key, never a code path.

use crate::providers::{
    DocumentIndex, InMemoryDocumentIndex, InMemoryKnowledgeBase, KnowledgeBase, SearchProvider,
    UnconfiguredSearch,
};
use crate::registry::{Capability, CapabilitySet, Tool};
use crate::tools;
use counsel_core::{setting_str, AgentSettings, ConfigurationError, ToolSpec};
use counsel_llm::{LlmProvider, ModelSettings, PromptChain, PromptStore};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Everything a tool constructor may need.
#[derive(Clone)]
pub struct ToolContext {
    pub provider: Arc<dyn LlmProvider>,
    pub prompts: Arc<dyn PromptStore>,
    pub model: ModelSettings,
    pub search: Arc<dyn SearchProvider>,
    pub knowledge: Arc<dyn KnowledgeBase>,
    pub index: Arc<dyn DocumentIndex>,
}

impl ToolContext {
    pub fn new(provider: Arc<dyn LlmProvider>, prompts: Arc<dyn PromptStore>) -> Self {
        Self {
            provider,
            prompts,
            model: ModelSettings::default(),
            search: Arc::new(UnconfiguredSearch),
            knowledge: Arc::new(InMemoryKnowledgeBase::new()),
            index: Arc::new(InMemoryDocumentIndex::new()),
        }
    }

    pub fn with_model(mut self, model: ModelSettings) -> Self {
        self.model = model;
        self
    }

    pub fn with_search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = search;
        self
    }

    pub fn with_knowledge_base(mut self, knowledge: Arc<dyn KnowledgeBase>) -> Self {
        self.knowledge = knowledge;
        self
    }

    pub fn with_document_index(mut self, index: Arc<dyn DocumentIndex>) -> Self {
        self.index = index;
        self
    }

    /// Build the chain named by `settings.prompt_id`.
    pub async fn chain(&self, settings: &Map<String, Value>) -> Result<PromptChain, ConfigurationError> {
        let prompt_id = setting_str(settings, "prompt_id")
            .ok_or_else(|| ConfigurationError::invalid_setting("prompt_id", "missing"))?;
        PromptChain::from_store(self.prompts.as_ref(), prompt_id, self.provider.clone(), self.model.clone())
            .await
            .map_err(|e| ConfigurationError::prompt(prompt_id, e.to_string()))
    }
}

/// Builds one kind of tool from its settings.
#[async_trait::async_trait]
pub trait ToolFactory: Send + Sync {
    async fn build(&self, spec: &ToolSpec, ctx: &ToolContext) -> Result<Arc<dyn Tool>, ConfigurationError>;
}

/// Adapter for factories that need no async work.
pub struct FnFactory<F>(F);

impl<F> FnFactory<F>
where
    F: Fn(&ToolSpec, &ToolContext) -> Result<Arc<dyn Tool>, ConfigurationError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait::async_trait]
impl<F> ToolFactory for FnFactory<F>
where
    F: Fn(&ToolSpec, &ToolContext) -> Result<Arc<dyn Tool>, ConfigurationError> + Send + Sync,
{
    async fn build(&self, spec: &ToolSpec, ctx: &ToolContext) -> Result<Arc<dyn Tool>, ConfigurationError> {
        (self.0)(spec, ctx)
    }
}

#[derive(Default)]
struct ModuleEntry {
    functions: HashMap<String, Arc<dyn ToolFactory>>,
    classes: HashMap<String, HashMap<String, Arc<dyn ToolFactory>>>,
}

/// module → {functions, classes → methods} → factory.
#[derive(Default)]
pub struct CapabilityRegistry {
    modules: HashMap<String, ModuleEntry>,
}

impl CapabilityRegistry {
    pub fn new() -> Self { Self::default() }

    /// Registry holding every built-in tool.
    ///
    /// Edit this function to add or remove tools reachable from configuration.
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        registry.register_function("echo", "echo", FnFactory::new(|_, _| {
            Ok(Arc::new(tools::echo::EchoTool) as Arc<dyn Tool>)
        }));

        // --- Research ---
        registry.register_method("web_search_tool", "WebSearchTool", "wb_tool", tools::web_search::WebSearchFactory);
        registry.register_method("kb_search", "KBSearchTool", "kb_tool", tools::kb_search::KbSearchFactory);
        registry.register_method(
            "juris_reference_tool",
            "JurisReferenceTool",
            "juris_tool",
            tools::juris_reference::JurisReferenceFactory,
        );

        // --- Drafting and review ---
        registry.register_method("drafting_tool", "DraftTool", "draft_tool", tools::drafting::DraftFactory);
        registry.register_method("QA_tool", "QualityAssuranceTool", "qa_tool", tools::qa::QualityAssuranceFactory);

        // --- Memory ---
        registry.register_method("memory_tool", "MemoryTool", "memory_tool", tools::memory::MemoryActionFactory);
        registry.register_method("memory_tool", "MemoryTool", "update_schema", tools::memory::UpdateSchemaFactory);

        registry
    }

    /// Register a module-level function tool. Replaces an existing entry.
    pub fn register_function(&mut self, module: &str, function: &str, factory: impl ToolFactory + 'static) {
        self.modules
            .entry(module.to_string())
            .or_default()
            .functions
            .insert(function.to_string(), Arc::new(factory));
    }

    /// Register a method of a class-based tool. Replaces an existing entry.
    pub fn register_method(&mut self, module: &str, class: &str, method: &str, factory: impl ToolFactory + 'static) {
        self.modules
            .entry(module.to_string())
            .or_default()
            .classes
            .entry(class.to_string())
            .or_default()
            .insert(method.to_string(), Arc::new(factory));
    }

    /// Registry keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        for (module, entry) in &self.modules {
            keys.extend(entry.functions.keys().map(|f| format!("{}.{}", module, f)));
            for (class, methods) in &entry.classes {
                keys.extend(methods.keys().map(|m| format!("{}.{}.{}", module, class, m)));
            }
        }
        keys.sort();
        keys
    }

    /// Find the factory a spec refers to.
    pub fn resolve(&self, spec: &ToolSpec) -> Result<Arc<dyn ToolFactory>, ConfigurationError> {
        let module = self.modules.get(&spec.module).ok_or_else(|| ConfigurationError::UnknownModule {
            module: spec.module.clone(),
        })?;

        match &spec.class {
            Some(class) => {
                let methods = module.classes.get(class).ok_or_else(|| ConfigurationError::UnknownClass {
                    module: spec.module.clone(),
                    class: class.clone(),
                })?;
                methods.get(&spec.function).cloned().ok_or_else(|| ConfigurationError::MissingMethod {
                    class: class.clone(),
                    function: spec.function.clone(),
                })
            }
            None => module.functions.get(&spec.function).cloned().ok_or_else(|| {
                ConfigurationError::UnknownFunction {
                    module: spec.module.clone(),
                    function: spec.function.clone(),
                }
            }),
        }
    }

    /// Build one capability. `key` names the entry in the agent's `Tools`
    /// mapping and is the fallback tool name.
    pub async fn build_capability(
        &self,
        key: &str,
        spec: &ToolSpec,
        ctx: &ToolContext,
    ) -> Result<Capability, ConfigurationError> {
        let factory = self.resolve(spec)?;
        let tool = factory.build(spec, ctx).await?;

        let mut capability = Capability::new(tool).with_name(spec.name.as_deref().unwrap_or(key));
        if let Some(description) = &spec.description {
            capability = capability.with_description(description.clone());
        }
        debug!("Tool '{}' initialized from {}", capability.name(), spec.registry_key());
        Ok(capability)
    }

    /// Build every tool of an agent. Failing entries are logged and skipped.
    pub async fn build_capability_set(&self, settings: &AgentSettings, ctx: &ToolContext) -> CapabilitySet {
        let mut set = CapabilitySet::new();
        for (key, entry) in &settings.tools {
            let built = match ToolSpec::from_value(key, entry) {
                Ok(spec) => match self.build_capability(key, &spec, ctx).await {
                    Ok(capability) => set.push(capability),
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            };
            match built {
                Ok(()) => info!(tool = %key, "Tool initialized successfully"),
                Err(e) => error!(tool = %key, "Error initializing tool: {}", e),
            }
        }
        set
    }
}
