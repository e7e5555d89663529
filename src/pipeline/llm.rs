//! Default agent runtime: one chat completion per task, in graph order.
//!
//! ## Message Layout
//!
//! Each task request contains (in order):
//! 1. **System message** — the agent's role, goal and backstory
//! 2. **User message** — the task description, the expected output, and one
//!    quoted context block per declared dependency
//!
//! Only the outputs of a task's declared dependencies are forwarded, so
//! `generate_pdf` sees the structured notes but not the image suggestion.
//!
//! ## Retry Strategy
//!
//! Transient provider failures (429, 5xx, timeouts) are retried with
//! exponential backoff: `retry_backoff_ms * 2^(attempt-1)`. When a task
//! exhausts its attempts the whole run fails; there is no partial output.

use crate::config::NotesConfig;
use crate::crew::{Crew, CrewOutput, Task, TaskKind, TaskOutput, TaskRuntime};
use crate::error::NotesError;
use crate::progress::ProgressCallback;
use crate::prompts::context_block;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Default model when a provider is named or auto-selected without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// [`TaskRuntime`] backed by an `edgequake-llm` provider.
pub struct LlmRuntime {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
    progress: Option<ProgressCallback>,
}

impl LlmRuntime {
    /// Wrap an already-constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &NotesConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
            progress: config.progress_callback.clone(),
        }
    }

    /// Resolve a provider from the config/environment and wrap it.
    pub fn from_config(config: &NotesConfig) -> Result<Self, NotesError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    /// Run one task with retry/backoff, returning its output.
    async fn run_task(&self, task: &Task, messages: &[ChatMessage]) -> Result<TaskOutput, NotesError> {
        let start = Instant::now();
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "Task {}: retry {}/{} after {}ms",
                    task.kind, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let call = self.provider.chat(messages, Some(&self.options));
            match timeout(Duration::from_secs(self.api_timeout_secs), call).await {
                Ok(Ok(response)) => {
                    let duration = start.elapsed();
                    debug!(
                        "Task {}: {} input tokens, {} output tokens, {:?}",
                        task.kind, response.prompt_tokens, response.completion_tokens, duration
                    );
                    return Ok(TaskOutput {
                        task: task.kind,
                        text: response.content,
                        input_tokens: response.prompt_tokens,
                        output_tokens: response.completion_tokens,
                        duration_ms: duration.as_millis() as u64,
                        attempts: attempt + 1,
                    });
                }
                Ok(Err(e)) => {
                    let err_msg = format!("{}", e);
                    warn!("Task {}: attempt {} failed — {}", task.kind, attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
                Err(_) => {
                    let err_msg = format!("timed out after {}s", self.api_timeout_secs);
                    warn!("Task {}: attempt {} {}", task.kind, attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(NotesError::Orchestration {
            task: task.kind.to_string(),
            attempts: self.max_retries + 1,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

#[async_trait]
impl TaskRuntime for LlmRuntime {
    async fn kickoff(&self, crew: &Crew) -> Result<CrewOutput, NotesError> {
        crew.validate()?;
        let total = crew.tasks.len();
        let mut outputs: Vec<TaskOutput> = Vec::with_capacity(total);
        let mut by_kind: HashMap<TaskKind, String> = HashMap::new();

        for (index, task) in crew.tasks.iter().enumerate() {
            info!("Running task {}/{}: {}", index + 1, total, task.kind);
            let messages = build_messages(task, &by_kind);
            let output = self.run_task(task, &messages).await?;

            if let Some(ref cb) = self.progress {
                cb.on_task_complete(task.kind.id(), index, total, output.text.len());
            }
            by_kind.insert(task.kind, output.text.clone());
            outputs.push(output);
        }

        Ok(CrewOutput::from_tasks(outputs))
    }
}

/// Build the system + user messages for one task.
pub(crate) fn build_messages(
    task: &Task,
    completed: &HashMap<TaskKind, String>,
) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(task.agent.system_prompt()),
        ChatMessage::user(user_prompt(task, completed)),
    ]
}

/// Task description, expected output and dependency context as one prompt.
pub(crate) fn user_prompt(
    task: &Task,
    completed: &HashMap<TaskKind, String>,
) -> String {
    let mut parts = vec![
        task.description.clone(),
        format!("Expected output: {}", task.expected_output),
    ];
    for dep in &task.context {
        if let Some(text) = completed.get(dep) {
            parts.push(context_block(dep.id(), text));
        }
    }
    parts.join("\n\n")
}

/// Build `CompletionOptions` from the run config.
fn build_options(config: &NotesConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, NotesError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        NotesError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`)
/// 2. **Named provider + model** (`config.provider_name`)
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`)
/// 4. **OpenAI key present** (`OPENAI_API_KEY`)
/// 5. **Full auto-detection** (`ProviderFactory::from_env`)
pub fn resolve_provider(config: &NotesConfig) -> Result<Arc<dyn LLMProvider>, NotesError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| NotesError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`, saturating.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}
