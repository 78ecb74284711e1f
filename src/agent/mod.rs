//! Context search agent
//!
//! Turns a free-text or JSON message into a search, and the ranked results
//! into a reply. Message transport is left to the caller.

use crate::retrieval::{ContextSearcher, RankedResult, RetrievalMode, SearchRequest};
use anyhow::{bail, Context};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

pub const NO_RESULTS_REPLY: &str = "No relevant documents found for your query.";

const RESULT_SEPARATOR: &str = "\n\n---\n\n";

/// Opaque text-in/text-out language model used to summarize results
pub trait Summarizer: Send + Sync {
    fn summarize(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Structured form of an incoming message
#[derive(Debug, Clone, Deserialize)]
struct AgentQuery {
    query: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    rerank: Option<bool>,
}

pub struct ContextSearchAgent {
    searcher: Arc<ContextSearcher>,
    summarizer: Option<Arc<dyn Summarizer>>,
}

impl ContextSearchAgent {
    pub fn new(searcher: Arc<ContextSearcher>) -> Self {
        Self {
            searcher,
            summarizer: None,
        }
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Answer one message. Failures are reported in the reply text.
    pub fn handle_message(&self, message: &str) -> String {
        match self.answer(message) {
            Ok(reply) => reply,
            Err(e) => format!("ContextSearchAgent error: {:#}", e),
        }
    }

    fn answer(&self, message: &str) -> anyhow::Result<String> {
        let request = self.parse_request(message)?;
        if request.query.trim().is_empty() {
            bail!("Query cannot be empty");
        }

        debug!(
            "Agent query '{}' via {} (top_k={}, rerank={})",
            request.query, request.mode, request.top_k, request.rerank
        );

        let results = self.searcher.search(&request)?;
        if results.is_empty() {
            return Ok(NO_RESULTS_REPLY.to_string());
        }

        let rendered = render_results(&results);
        match &self.summarizer {
            Some(summarizer) => {
                let reply = summarizer
                    .summarize(&summary_prompt(&request.query, &rendered))
                    .context("Summarization failed")?;
                Ok(reply.trim().to_string())
            }
            None => Ok(rendered),
        }
    }

    /// A JSON object is read as a structured query; anything else is the
    /// query text itself.
    fn parse_request(&self, message: &str) -> anyhow::Result<SearchRequest> {
        let message = message.trim();

        if message.starts_with('{') {
            let parsed: AgentQuery =
                serde_json::from_str(message).context("Invalid JSON query")?;

            let mut request = self.searcher.request(parsed.query.trim());
            if let Some(method) = parsed.method {
                request.mode = method
                    .parse::<RetrievalMode>()
                    .map_err(anyhow::Error::msg)?;
            }
            if let Some(top_k) = parsed.top_k {
                request.top_k = top_k;
            }
            if let Some(rerank) = parsed.rerank {
                request.rerank = rerank;
            }
            return Ok(request);
        }

        Ok(self.searcher.request(message))
    }
}

/// Number the results as `Result i:` blocks separated by rules
pub fn render_results(results: &[RankedResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| format!("Result {}:\n{}", i + 1, result.chunk.trim()))
        .collect::<Vec<_>>()
        .join(RESULT_SEPARATOR)
}

pub fn summary_prompt(query: &str, rendered: &str) -> String {
    format!(
        "You are a helpful assistant. Summarize the following search results in a clear, \
         concise, and natural way.\n\
         Explain the main points relevant to this query:\n\n\
         Query: {}\n\n\
         Search Results:\n{}\n\n\
         Please provide a friendly summary for a user.",
        query, rendered
    )
}
