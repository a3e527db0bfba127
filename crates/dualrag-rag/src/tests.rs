//! End-to-end and snapshot tests for the RAG pipeline

#[cfg(test)]
mod pipeline_tests {
    use crate::testing::{keyword_spec, KeywordEmbedder, ScriptedBackend};
    use crate::{
        ChunkingConfig, Chunker, ContextAssembler, DocumentIndexer, Embedder, IndexEntry,
        InferenceGateway, Orchestrator, Retriever, VectorIndex,
    };
    use dualrag_core::{
        BackendKind, Chunk, Document, Error, GenerationConfig, RetrievalResult, RetryPolicy,
    };
    use insta::{assert_snapshot, assert_yaml_snapshot};
    use std::sync::Arc;
    use std::time::Duration;

    struct Pipeline {
        index: Arc<VectorIndex>,
        indexer: DocumentIndexer,
        orchestrator: Arc<Orchestrator>,
        local: Arc<ScriptedBackend>,
    }

    fn pipeline() -> Pipeline {
        let retry = RetryPolicy {
            initial_backoff: Duration::from_millis(1),
            ..RetryPolicy::default()
        };
        let embedder = Arc::new(Embedder::new(Arc::new(KeywordEmbedder::new()), retry.clone()));
        let index = Arc::new(VectorIndex::in_memory(keyword_spec()));
        let chunker = Chunker::new(ChunkingConfig::default()).unwrap();
        let indexer = DocumentIndexer::new(chunker, embedder.clone(), index.clone());

        let cloud = Arc::new(ScriptedBackend::new(BackendKind::Cloud, "gpt-3.5-turbo"));
        let local = Arc::new(ScriptedBackend::new(BackendKind::Local, "llama3"));
        let gateway = InferenceGateway::new(
            cloud,
            local.clone(),
            BackendKind::Local,
            GenerationConfig::default(),
            retry,
        )
        .unwrap();

        let orchestrator = Arc::new(Orchestrator::new(
            Retriever::new(embedder, index.clone()),
            ContextAssembler::default(),
            Arc::new(gateway),
        ));

        Pipeline {
            index,
            indexer,
            orchestrator,
            local,
        }
    }

    fn three_documents() -> Vec<Document> {
        vec![
            Document::new("ollama_guide.txt", "Ollama installs with curl"),
            Document::new("rag_explained.txt", "RAG reduces hallucination"),
            Document::new("local_vs_cloud.txt", "Local models are private"),
        ]
    }

    #[tokio::test]
    async fn test_install_question_finds_install_chunk() {
        let p = pipeline();
        let report = p.indexer.index_documents(&three_documents()).await.unwrap();
        assert_yaml_snapshot!(report, @r###"
        documents_indexed: 3
        documents_unchanged: 0
        documents_failed: 0
        chunks_indexed: 3
        errors: []
        "###);

        let answer = p
            .orchestrator
            .answer_with_k("How do I install a local model?", 1)
            .await
            .unwrap();

        assert_eq!(answer.backend_used, BackendKind::Local);
        assert_yaml_snapshot!(answer.grounding_chunks, @r###"
        - text: Ollama installs with curl
          source: ollama_guide.txt
          sequence_index: 0
          start_offset: 0
          end_offset: 25
        "###);
        assert!(answer.prompt.contains("[Document 1 - ollama_guide.txt]\nOllama installs with curl"));
        assert!(!answer.prompt.contains("RAG reduces hallucination"));
    }

    #[tokio::test]
    async fn test_empty_index_still_answers() {
        let p = pipeline();
        let answer = p.orchestrator.answer("What is RAG?").await.unwrap();

        assert!(!answer.is_grounded());
        assert_eq!(answer.model, "llama3");
        assert_snapshot!(answer.prompt, @r###"
        You are a helpful AI assistant. Answer the user's question based on the provided context.

        Context:
        No relevant context was retrieved from the document collection.

        Question: What is RAG?

        Instructions:
        - State explicitly that no relevant context was found in the document collection
        - Do not claim that your answer is supported by the documents
        - If you answer from general knowledge, say so

        Answer:
        "###);
    }

    #[tokio::test]
    async fn test_equal_scores_order_by_sequence_index() {
        let p = pipeline();
        let chunk = |sequence_index: usize, text: &str| Chunk {
            text: text.to_string(),
            source: "rag_explained.txt".to_string(),
            sequence_index,
            start_offset: 0,
            end_offset: text.len(),
        };
        p.index
            .insert(vec![
                IndexEntry::new(chunk(5, "later RAG section"), vec![0.0, 0.0, 0.0, 1.0, 0.0]),
                IndexEntry::new(chunk(0, "setup notes"), vec![1.0, 0.0, 0.0, 0.0, 0.0]),
                IndexEntry::new(chunk(2, "earlier RAG section"), vec![0.0, 0.0, 0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        let result: RetrievalResult = p
            .orchestrator
            .retriever()
            .retrieve("retrieval", 2)
            .await
            .unwrap();
        let order: Vec<usize> = result.chunks().map(|c| c.sequence_index).collect();
        assert_eq!(order, vec![2, 5]);
        assert_eq!(result.hits[0].score, result.hits[1].score);
    }

    #[tokio::test]
    async fn test_generation_failure_is_answer_failed() {
        let p = pipeline();
        p.local.fail_next(Error::BackendRejected {
            backend: BackendKind::Local,
            status: Some(404),
            message: "model 'llama3' not found".to_string(),
        });

        let err = p.orchestrator.answer("What is RAG?").await.unwrap_err();
        assert!(matches!(err, Error::AnswerFailed { .. }));
        assert!(matches!(
            err.root_cause(),
            Error::BackendRejected { status: Some(404), .. }
        ));
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let p = pipeline();
        let err = p.orchestrator.answer("   ").await.unwrap_err();
        assert!(matches!(err.root_cause(), Error::InvalidConfiguration(_)));
        assert!(p.local.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_answers_do_not_interfere() {
        let p = pipeline();
        p.indexer.index_documents(&three_documents()).await.unwrap();

        let (a, b) = tokio::join!(
            p.orchestrator.answer_with_k("How do I install a local model?", 1),
            p.orchestrator.answer_with_k("Is retrieval about hallucination?", 1),
        );
        assert_eq!(a.unwrap().grounding_chunks[0].source, "ollama_guide.txt");
        assert_eq!(b.unwrap().grounding_chunks[0].source, "rag_explained.txt");
    }

    #[tokio::test]
    async fn test_abandoned_answer_leaves_pipeline_usable() {
        let p = pipeline();
        p.indexer.index_documents(&three_documents()).await.unwrap();
        let backend_before = p.orchestrator.gateway().current();
        let _release = p.local.hold();

        let task = {
            let orchestrator = Arc::clone(&p.orchestrator);
            tokio::spawn(async move { orchestrator.answer("How do I install a local model?").await })
        };
        p.local.wait_until_called().await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert_eq!(p.orchestrator.gateway().current(), backend_before);
        assert_eq!(p.index.len(), 3);

        let answer = p
            .orchestrator
            .answer_with_k("How do I install a local model?", 1)
            .await
            .unwrap();
        assert_eq!(answer.backend_used, BackendKind::Local);
        assert_eq!(answer.grounding_chunks[0].source, "ollama_guide.txt");
    }

    #[tokio::test]
    async fn test_default_settings_ground_on_every_retrieved_chunk() {
        let p = pipeline();
        let text = "Ollama installs with curl ".repeat(350);
        let report = p
            .indexer
            .index_documents(&[Document::new("ollama_guide.txt", text.trim())])
            .await
            .unwrap();
        assert_eq!(report.chunks_indexed, 3);

        let answer = p.orchestrator.answer("How do I install Ollama?").await.unwrap();
        assert_eq!(answer.grounding_chunks.len(), crate::DEFAULT_TOP_K);
    }
}
