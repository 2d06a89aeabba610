//! The chat request pipeline.
//!
//! One question runs through greeting detection, the jurisdiction pre-flight
//! count, an optional clarification pre-pass, embedding, retrieval, context
//! assembly, prompt building and generation. Each stage awaits the previous
//! one; nothing is retried.
//!
//! Output is delivered as [`PipelineEvent`]s over an unbounded channel so the
//! HTTP layer can forward fragments as soon as the model produces them.

use crate::config::{LlmConfig, PipelineConfig, ResponseMode};
use crate::jurisdiction::Jurisdiction;
use crate::prompt;
use crate::provider::{ChatRequest, ChatResponse, Message, Provider, ProviderError};
use crate::rag::{assemble_context, EmbedderError, Retriever, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, info, warn};

const CLARIFY_MAX_TOKENS: u32 = 512;

/// Failures of the pipeline as a whole.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The embedding or generation service failed or could not be reached.
    #[error("Upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Document retrieval failed: {0}")]
    Retrieval(String),

    #[error("Malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),

    /// The selected jurisdiction has nothing indexed. Not a failure; served as 204.
    #[error("No documents indexed for the selected jurisdiction")]
    NoDocumentsForJurisdiction,
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl From<EmbedderError> for PipelineError {
    fn from(err: EmbedderError) -> Self {
        match err {
            EmbedderError::Malformed(msg) => PipelineError::MalformedUpstreamResponse(msg),
            other => PipelineError::UpstreamUnavailable(other.to_string()),
        }
    }
}

impl From<ProviderError> for PipelineError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Malformed(msg) => PipelineError::MalformedUpstreamResponse(msg),
            ProviderError::Json(e) => PipelineError::MalformedUpstreamResponse(e.to_string()),
            other => PipelineError::UpstreamUnavailable(other.to_string()),
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        PipelineError::Retrieval(err.to_string())
    }
}

/// Output of a pipeline run, in emission order.
#[derive(Debug)]
pub enum PipelineEvent {
    /// A fragment of the answer
    Chunk(String),
    /// The answer is complete
    Done,
    /// The run stopped; fragments already sent form a truncated answer
    Failed(PipelineError),
}

/// Sequences retrieval and generation for one question at a time.
///
/// Holds only shared read-only state, so one instance serves all requests.
pub struct ChatPipeline {
    retriever: Retriever,
    provider: Arc<dyn Provider>,
    llm: LlmConfig,
    config: PipelineConfig,
}

impl ChatPipeline {
    pub fn new(
        retriever: Retriever,
        provider: Arc<dyn Provider>,
        llm: LlmConfig,
        config: PipelineConfig,
    ) -> Self {
        Self {
            retriever,
            provider,
            llm,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the pipeline on a background task.
    ///
    /// Errors arrive as a final [`PipelineEvent::Failed`]. Dropping the
    /// returned handle aborts the task, cancelling any in-flight upstream call.
    pub fn spawn(
        self: &Arc<Self>,
        query: String,
        jurisdiction: Option<Jurisdiction>,
    ) -> (UnboundedReceiver<PipelineEvent>, AbortOnDropHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pipeline = Arc::clone(self);

        let handle = tokio::spawn(async move {
            if let Err(e) = pipeline.run(&query, jurisdiction, &tx).await {
                let _ = tx.send(PipelineEvent::Failed(e));
            }
        });

        (rx, AbortOnDropHandle::new(handle))
    }

    /// Answers one question, sending fragments and a final `Done` to `sink`.
    pub async fn run(
        &self,
        query: &str,
        jurisdiction: Option<Jurisdiction>,
        sink: &UnboundedSender<PipelineEvent>,
    ) -> Result<()> {
        let label = prompt::jurisdiction_label(jurisdiction);
        info!(jurisdiction = label, "Handling question");

        if prompt::is_greeting(query) {
            debug!("Greeting detected, skipping retrieval");
            return finish_with(sink, prompt::greeting_reply(jurisdiction));
        }

        if self.config.preflight {
            if let Some(j) = jurisdiction {
                match self.retriever.count(Some(j.label())).await {
                    Ok(0) => {
                        info!(
                            jurisdiction = label,
                            "No documents indexed, skipping generation"
                        );
                        return Err(PipelineError::NoDocumentsForJurisdiction);
                    }
                    Ok(count) => debug!(count, "Pre-flight document count"),
                    Err(e) => warn!(error = %e, "Pre-flight count failed, continuing"),
                }
            }
        }

        if self.config.clarify_first {
            if let Some(follow_up) = self.clarify(query).await? {
                debug!("Clarification requested by the model");
                return finish_with(sink, follow_up);
            }
        }

        let embedding = self.retriever.embed(query).await?;

        let rows = match self
            .retriever
            .retrieve(
                embedding,
                self.config.match_threshold,
                self.config.match_count,
                jurisdiction.map(Jurisdiction::label),
            )
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Retrieval failed, answering without context");
                Vec::new()
            }
        };

        let context = assemble_context(
            &rows,
            self.config.max_context_chars,
            self.config.source_tags,
        );
        if context.is_empty() {
            info!("No context available, sending not-found reply");
            return finish_with(sink, prompt::NOT_FOUND_REPLY.to_string());
        }
        info!(
            rows = rows.len(),
            context_chars = context.chars().count(),
            "Context assembled"
        );

        let request = self.request(prompt::build_prompt(
            query,
            &context,
            jurisdiction,
            self.config.answer_format,
        ));

        match self.config.response_mode {
            ResponseMode::Streaming => {
                let callback = Box::new(|response: ChatResponse| {
                    if response.done {
                        debug!("Generation stream complete");
                    } else if !response.content.is_empty() {
                        let _ = sink.send(PipelineEvent::Chunk(response.content));
                    }
                });
                self.provider.chat(request, callback).await?;
                let _ = sink.send(PipelineEvent::Done);
                Ok(())
            }
            ResponseMode::Buffered => match self.provider.complete(request).await {
                Ok(answer) => finish_with(sink, answer),
                Err(e) => {
                    warn!(error = %e, "Generation failed, sending failure reply");
                    finish_with(sink, prompt::GENERATION_FAILURE_REPLY.to_string())
                }
            },
        }
    }

    /// Clarification pre-pass; `None` means the question can be answered.
    async fn clarify(&self, query: &str) -> Result<Option<String>> {
        let request = self
            .request(prompt::build_clarification_prompt(query))
            .with_max_tokens(CLARIFY_MAX_TOKENS.min(self.llm.max_tokens));

        match self.provider.complete(request).await {
            Ok(answer) => Ok(prompt::parse_clarification(&answer)),
            Err(ProviderError::Malformed(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn request(&self, prompt: String) -> ChatRequest {
        ChatRequest::new(self.llm.model.clone(), vec![Message::user(prompt)])
            .with_temperature(self.llm.temperature)
            .with_max_tokens(self.llm.max_tokens)
    }
}

fn finish_with(sink: &UnboundedSender<PipelineEvent>, text: String) -> Result<()> {
    let _ = sink.send(PipelineEvent::Chunk(text));
    let _ = sink.send(PipelineEvent::Done);
    Ok(())
}
