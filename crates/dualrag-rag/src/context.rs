//! Prompt assembly under a context token budget

use dualrag_core::{count_tokens, Chunk, RetrievalResult};

pub const DEFAULT_MAX_CONTEXT_TOKENS: usize = 2000;

/// Tokens reserved per chunk for its `[Document i - source]` marker
pub const MARKER_TOKEN_ALLOWANCE: usize = 8;

const NO_CONTEXT: &str = "No relevant context was retrieved from the document collection.";

const GROUNDED_INSTRUCTIONS: &str = "Instructions:
- Answer based primarily on the provided context
- If the context doesn't contain enough information, say so
- Be concise but thorough
- Cite which document sections support your answer when relevant";

const UNGROUNDED_INSTRUCTIONS: &str = "Instructions:
- State explicitly that no relevant context was found in the document collection
- Do not claim that your answer is supported by the documents
- If you answer from general knowledge, say so";

/// A prompt and the chunks it actually contains
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    pub prompt: String,
    pub included: Vec<Chunk>,
}

/// Formats retrieved chunks and a query into one prompt
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    max_context_tokens: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONTEXT_TOKENS)
    }
}

impl ContextAssembler {
    pub fn new(max_context_tokens: usize) -> Self {
        Self { max_context_tokens }
    }

    pub fn max_context_tokens(&self) -> usize {
        self.max_context_tokens
    }

    /// Smallest budget that holds `top_k` chunks of `chunk_size` tokens each
    pub fn required_budget(top_k: usize, chunk_size: usize) -> usize {
        top_k * (chunk_size + MARKER_TOKEN_ALLOWANCE)
    }

    /// Whether `top_k` full chunks of `chunk_size` tokens always fit
    pub fn holds(&self, top_k: usize, chunk_size: usize) -> bool {
        Self::required_budget(top_k, chunk_size) <= self.max_context_tokens
    }

    pub fn assemble(&self, query: &str, retrieval: &RetrievalResult) -> String {
        self.assemble_with_grounding(query, retrieval).prompt
    }

    /// Build the prompt, keeping whole chunks in similarity order until the
    /// next one would overflow the budget.
    pub fn assemble_with_grounding(&self, query: &str, retrieval: &RetrievalResult) -> AssembledPrompt {
        let mut sections = Vec::new();
        let mut included = Vec::new();
        let mut used = 0;

        for chunk in retrieval.chunks() {
            let section = format!(
                "[Document {} - {}]\n{}",
                included.len() + 1,
                chunk.source,
                chunk.text
            );
            let cost = count_tokens(&section);
            if used + cost > self.max_context_tokens {
                tracing::debug!(
                    included = included.len(),
                    dropped = retrieval.len() - included.len(),
                    budget = self.max_context_tokens,
                    "context budget reached"
                );
                break;
            }
            used += cost;
            sections.push(section);
            included.push(chunk.clone());
        }

        let prompt = if included.is_empty() {
            format!(
                "You are a helpful AI assistant. Answer the user's question based on the provided context.\n\n\
                 Context:\n{}\n\n\
                 Question: {}\n\n\
                 {}\n\n\
                 Answer:",
                NO_CONTEXT, query, UNGROUNDED_INSTRUCTIONS
            )
        } else {
            format!(
                "You are a helpful AI assistant. Answer the user's question based on the provided context.\n\n\
                 Context:\n{}\n\n\
                 Question: {}\n\n\
                 {}\n\n\
                 Answer:",
                sections.join("\n\n"),
                query,
                GROUNDED_INSTRUCTIONS
            )
        };

        AssembledPrompt { prompt, included }
    }
}

/// Assemble a prompt for `query` from `retrieval` within `max_context_tokens`
pub fn assemble(query: &str, retrieval: &RetrievalResult, max_context_tokens: usize) -> String {
    ContextAssembler::new(max_context_tokens).assemble(query, retrieval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dualrag_core::ScoredChunk;

    fn hit(source: &str, sequence_index: usize, text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                text: text.to_string(),
                source: source.to_string(),
                sequence_index,
                start_offset: 0,
                end_offset: text.len(),
            },
            score,
        }
    }

    fn retrieval() -> RetrievalResult {
        RetrievalResult {
            hits: vec![
                hit("ollama_guide.txt", 0, "Ollama installs with curl", 0.9),
                hit("rag_explained.txt", 3, "RAG reduces hallucination by grounding answers", 0.7),
            ],
        }
    }

    #[test]
    fn test_chunks_in_similarity_order() {
        let prompt = assemble("How do I install Ollama?", &retrieval(), 1500);
        let first = prompt.find("[Document 1 - ollama_guide.txt]").unwrap();
        let second = prompt.find("[Document 2 - rag_explained.txt]").unwrap();
        assert!(first < second);
        assert!(prompt.contains("Question: How do I install Ollama?"));
        assert!(prompt.trim_end().ends_with("Answer:"));
    }

    #[test]
    fn test_budget_drops_least_relevant_whole_chunks() {
        // first section: 4 marker tokens + 4 text tokens
        let assembled = ContextAssembler::new(10).assemble_with_grounding("q", &retrieval());
        assert_eq!(assembled.included.len(), 1);
        assert!(assembled.prompt.contains("Ollama installs with curl"));
        assert!(!assembled.prompt.contains("hallucination"));
    }

    #[test]
    fn test_query_never_truncated() {
        let long_query = "word ".repeat(50);
        let prompt = assemble(long_query.trim(), &retrieval(), 8);
        assert!(prompt.contains(long_query.trim()));
    }

    #[test]
    fn test_empty_retrieval_states_no_context() {
        let assembled = ContextAssembler::default().assemble_with_grounding("What is RAG?", &RetrievalResult::empty());
        assert!(assembled.included.is_empty());
        assert!(assembled.prompt.contains(NO_CONTEXT));
        assert!(assembled.prompt.contains("State explicitly that no relevant context was found"));
    }

    #[test]
    fn test_default_budget_holds_default_retrieval() {
        let chunking = crate::ChunkingConfig::default();
        let assembler = ContextAssembler::default();
        assert!(assembler.holds(crate::DEFAULT_TOP_K, chunking.chunk_size));

        let text = vec!["token"; chunking.chunk_size].join(" ");
        let hits = (0..crate::DEFAULT_TOP_K)
            .map(|i| hit("ollama_guide.md", i, &text, 0.9 - i as f32 * 0.1))
            .collect();
        let assembled = assembler.assemble_with_grounding("q", &RetrievalResult { hits });
        assert_eq!(assembled.included.len(), crate::DEFAULT_TOP_K);
    }

    #[test]
    fn test_nothing_fits_states_no_context() {
        let prompt = assemble("q", &retrieval(), 3);
        assert!(prompt.contains(NO_CONTEXT));
        assert!(!prompt.contains("[Document"));
    }
}
