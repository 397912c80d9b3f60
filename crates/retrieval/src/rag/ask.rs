//! Question answering with sentinel-triggered escalation.

use crate::passage::{Passage, RankedResultSet};
use crate::rag::types::{EscalationState, RagAnswer, Stage};
use crate::session::Session;
use futures::future::join_all;
use ragfall_core::{AppError, AppResult};
use ragfall_llm::LlmRequest;
use ragfall_prompt::SENTINEL;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::Instrument;

/// Answer `question` against `session`.
///
/// Failures in the first pass abort with no retry. After escalation a
/// single failing paraphrase is skipped; if none can be retrieved the
/// result is `AppError::Escalation`. A failing web search degrades to an
/// empty web context.
pub async fn ask(session: &Session, question: &str) -> AppResult<RagAnswer> {
    if question.trim().is_empty() {
        return Err(AppError::InvalidInput("Question must not be empty".to_string()));
    }

    tracing::info!("Answering: {}", question);
    let settings = session.settings();

    let first = retrieve(session, question)
        .instrument(tracing::info_span!("stage", name = %Stage::FirstPassRetrieve))
        .await
        .map_err(|e| failed(Stage::FirstPassRetrieve, e))?;

    let context_set = first.reverse_for_context();
    let context = context_set.joined();
    tracing::debug!("First-pass context: {} passages, {} bytes", context_set.len(), context.len());

    let answer = complete(session, question, context, &session.prompts().answer)
        .instrument(tracing::info_span!("stage", name = %Stage::FirstPassAnswer))
        .await
        .map_err(|e| failed(Stage::FirstPassAnswer, e))?;

    if answer != SENTINEL {
        let sources = context_set
            .passages
            .into_iter()
            .take(settings.sources_shown)
            .collect();
        tracing::info!("Answered from first-pass context");
        return Ok(RagAnswer::first_pass(question, answer, sources));
    }

    tracing::info!("First pass could not answer; escalating");
    escalate(session, question).await
}

async fn escalate(session: &Session, question: &str) -> AppResult<RagAnswer> {
    let settings = session.settings();

    let queries = with_timeout(settings.llm_timeout, session.rewriter().rewrite(question), || {
        AppError::model(format!(
            "query rewriting timed out after {}s",
            settings.llm_timeout.as_secs_f32()
        ))
    })
    .instrument(tracing::info_span!("stage", name = %Stage::Rewrite))
    .await
    .map_err(|e| failed(Stage::Rewrite, e))?;

    let sets = multi_retrieve(session, &queries)
        .instrument(tracing::info_span!(
            "stage",
            name = %Stage::MultiRetrieve,
            queries = queries.len()
        ))
        .await
        .map_err(|e| failed(Stage::MultiRetrieve, e))?;

    let sources = {
        let _span = tracing::info_span!("stage", name = %Stage::Fuse, sets = sets.len()).entered();
        fuse(session, &sets)
    };
    tracing::debug!("Fused {} result sets into {} passages", sets.len(), sources.len());

    let web_text = web_augment(session, question)
        .instrument(tracing::info_span!("stage", name = %Stage::WebAugment))
        .await;

    let fused_text = sources
        .iter()
        .map(|p| p.content.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let context = [web_text.as_str(), fused_text.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let answer = complete(session, question, context, &session.prompts().fallback)
        .instrument(tracing::info_span!("stage", name = %Stage::FallbackAnswer))
        .await
        .map_err(|e| failed(Stage::FallbackAnswer, e))?;

    tracing::info!("Answered after escalation");

    Ok(RagAnswer {
        question: question.to_string(),
        answer,
        sources,
        escalation: EscalationState::Escalated,
        rewritten_queries: queries,
        fused_sets: sets.len(),
        web_context_used: !web_text.is_empty(),
    })
}

/// Retrieve every paraphrase concurrently; result order follows `queries`.
async fn multi_retrieve(session: &Session, queries: &[String]) -> AppResult<Vec<RankedResultSet>> {
    if queries.is_empty() {
        return Err(AppError::Escalation(
            "the rewriter returned no queries".to_string(),
        ));
    }

    let results = join_all(queries.iter().map(|query| retrieve(session, query))).await;

    let mut sets = Vec::with_capacity(queries.len());
    for (query, result) in queries.iter().zip(results) {
        match result {
            Ok(set) => sets.push(set.reverse_for_context()),
            Err(e) => tracing::warn!("Skipping rewritten query {:?}: {}", query, e),
        }
    }

    if sets.is_empty() {
        return Err(AppError::Escalation(format!(
            "retrieval failed for all {} rewritten queries",
            queries.len()
        )));
    }

    Ok(sets)
}

/// RRF over passage contents, then re-attach metadata from the first
/// passage seen with each content.
fn fuse(session: &Session, sets: &[RankedResultSet]) -> Vec<Passage> {
    let contents: Vec<Vec<&str>> = sets
        .iter()
        .map(|set| set.passages.iter().map(|p| p.content.as_str()).collect())
        .collect();
    let fused = session.fusion().fuse(&contents, session.settings().top_k);

    let mut by_content: HashMap<&str, &Passage> = HashMap::new();
    for passage in sets.iter().flat_map(|set| set.passages.iter()) {
        by_content.entry(passage.content.as_str()).or_insert(passage);
    }

    fused
        .into_iter()
        .map(|content| match by_content.get(content.as_str()) {
            Some(passage) => (*passage).clone(),
            None => Passage::new(content),
        })
        .collect()
}

async fn web_augment(session: &Session, question: &str) -> String {
    let Some(web) = session.web() else {
        return String::new();
    };
    let settings = session.settings();

    let result = with_timeout(
        settings.web_timeout,
        web.retrieve_web(question, settings.web_max_results),
        || {
            AppError::WebSearch(format!(
                "no response within {}s",
                settings.web_timeout.as_secs_f32()
            ))
        },
    )
    .await;

    match result {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(stage = %Stage::WebAugment, "Continuing without web results: {}", e);
            String::new()
        }
    }
}

async fn retrieve(session: &Session, query: &str) -> AppResult<RankedResultSet> {
    let settings = session.settings();
    with_timeout(
        settings.search_timeout,
        session.similarity().retrieve(query, settings.limit),
        || {
            AppError::Retrieval(format!(
                "similarity search timed out after {}s",
                settings.search_timeout.as_secs_f32()
            ))
        },
    )
    .await
}

async fn complete(
    session: &Session,
    question: &str,
    context: String,
    system: &str,
) -> AppResult<String> {
    let settings = session.settings();
    let request = LlmRequest::new(question, &settings.model)
        .with_context(context)
        .with_system(system)
        .with_temperature(settings.temperature)
        .with_max_tokens(settings.max_tokens);

    let response = with_timeout(settings.llm_timeout, session.llm().complete(&request), || {
        AppError::model(format!(
            "no response within {}s",
            settings.llm_timeout.as_secs_f32()
        ))
    })
    .await?;

    tracing::debug!(
        "Model {} used {} tokens",
        response.model,
        response.usage.total_tokens
    );
    Ok(response.content)
}

async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = AppResult<T>>,
    on_timeout: impl FnOnce() -> AppError,
) -> AppResult<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}

fn failed(stage: Stage, error: AppError) -> AppError {
    tracing::error!(stage = %stage, "Stage failed: {}", error);
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionSettings;
    use crate::similarity::SimilaritySearch;
    use crate::web::WebSearch;
    use async_trait::async_trait;
    use ragfall_llm::{LlmClient, LlmResponse, LlmUsage};
    use ragfall_prompt::PromptSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Returns canned passages per query; listed queries fail.
    #[derive(Default)]
    struct MockStore {
        results: HashMap<String, Vec<Passage>>,
        failing: Vec<String>,
        delay: Option<Duration>,
        calls: Mutex<Vec<String>>,
    }

    impl MockStore {
        fn with(mut self, query: &str, contents: &[&str]) -> Self {
            self.results.insert(
                query.to_string(),
                contents.iter().map(|c| Passage::new(*c)).collect(),
            );
            self
        }

        fn failing(mut self, query: &str) -> Self {
            self.failing.push(query.to_string());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SimilaritySearch for MockStore {
        async fn retrieve(&self, query: &str, _limit: usize) -> AppResult<RankedResultSet> {
            self.calls.lock().unwrap().push(query.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.iter().any(|q| q == query) {
                return Err(AppError::Retrieval(format!("backend down for {}", query)));
            }
            Ok(RankedResultSet::new(
                query,
                self.results.get(query).cloned().unwrap_or_default(),
            ))
        }

        async fn count(&self) -> AppResult<usize> {
            Ok(self.results.values().map(Vec::len).sum())
        }
    }

    struct MockWeb {
        reply: AppResult<String>,
        delay: Option<Duration>,
        calls: Mutex<Vec<String>>,
    }

    impl MockWeb {
        fn ok(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                delay: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(AppError::WebSearch("rate limited".to_string())),
                delay: None,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl WebSearch for MockWeb {
        async fn retrieve_web(&self, query: &str, _max_results: usize) -> AppResult<String> {
            self.calls.lock().unwrap().push(query.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(AppError::WebSearch(e.to_string())),
            }
        }
    }

    /// Replies according to the system prompt of each request.
    struct ScriptedLlm {
        answer: AppResult<String>,
        rewrite: String,
        fallback: String,
        rewrites: AtomicUsize,
        delay: Option<Duration>,
        requests: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedLlm {
        fn new(answer: &str) -> Self {
            Self {
                answer: Ok(answer.to_string()),
                rewrite: "[]".to_string(),
                fallback: "fallback answer".to_string(),
                rewrites: AtomicUsize::new(0),
                delay: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn rewrite(mut self, reply: &str) -> Self {
            self.rewrite = reply.to_string();
            self
        }

        fn fallback(mut self, reply: &str) -> Self {
            self.fallback = reply.to_string();
            self
        }

        fn rewrite_calls(&self) -> usize {
            self.rewrites.load(Ordering::SeqCst)
        }

        /// User message sent with the given system prompt.
        fn message_for(&self, system: &str) -> Option<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .find(|(s, _)| s == system)
                .map(|(_, m)| m.clone())
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            let system = request.system.clone().unwrap_or_default();
            self.requests
                .lock()
                .unwrap()
                .push((system.clone(), request.user_message()));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let content = match system.as_str() {
                "ANSWER" => match &self.answer {
                    Ok(text) => text.clone(),
                    Err(_) => return Err(AppError::model_status(503, "model loading")),
                },
                "REWRITE" => {
                    self.rewrites.fetch_add(1, Ordering::SeqCst);
                    self.rewrite.clone()
                }
                "FALLBACK" => self.fallback.clone(),
                other => panic!("unexpected system prompt {:?}", other),
            };

            Ok(LlmResponse {
                content,
                model: request.model.clone(),
                usage: LlmUsage::new(10, 5),
            })
        }
    }

    fn prompts() -> PromptSet {
        PromptSet {
            answer: "ANSWER".to_string(),
            fallback: "FALLBACK".to_string(),
            rewrite: "REWRITE".to_string(),
        }
    }

    fn session(store: Arc<MockStore>, web: Option<Arc<MockWeb>>, llm: Arc<ScriptedLlm>) -> Session {
        session_with(store, web, llm, SessionSettings::default())
    }

    fn session_with(
        store: Arc<MockStore>,
        web: Option<Arc<MockWeb>>,
        llm: Arc<ScriptedLlm>,
        settings: SessionSettings,
    ) -> Session {
        let web = web.map(|w| w as Arc<dyn WebSearch>);
        Session::from_parts(store, web, llm, prompts(), settings)
    }

    #[tokio::test]
    async fn test_first_pass_answer_does_not_escalate() {
        let store = Arc::new(MockStore::default().with("q", &["p0", "p1", "p2", "p3", "p4"]));
        let llm = Arc::new(ScriptedLlm::new("Atene, 1896."));
        let web = Arc::new(MockWeb::ok("unused"));

        let answer = ask(&session(store.clone(), Some(web.clone()), llm.clone()), "q")
            .await
            .unwrap();

        assert_eq!(answer.answer, "Atene, 1896.");
        assert_eq!(answer.escalation, EscalationState::FirstPass);
        assert_eq!(llm.rewrite_calls(), 0);
        assert_eq!(store.calls(), vec!["q"]);
        assert!(web.calls.lock().unwrap().is_empty());

        // Sources are the head of the reversed list.
        let sources: Vec<&str> = answer.sources.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(sources, vec!["p4", "p3", "p2"]);
    }

    #[tokio::test]
    async fn test_first_pass_context_puts_closest_last() {
        let store = Arc::new(MockStore::default().with("q", &["closest", "middle", "farthest"]));
        let llm = Arc::new(ScriptedLlm::new("ok"));

        ask(&session(store, None, llm.clone()), "q").await.unwrap();

        assert_eq!(
            llm.message_for("ANSWER").unwrap(),
            "Question: q\nContext: farthest middle closest"
        );
    }

    #[tokio::test]
    async fn test_non_sentinel_answers_never_escalate() {
        let replies = [
            "",
            "Non posso rispondere",
            "non posso rispondere.",
            " Non posso rispondere.",
        ];
        for reply in replies {
            let store = Arc::new(MockStore::default().with("q", &["p"]));
            let llm = Arc::new(ScriptedLlm::new(reply));

            let answer = ask(&session(store, None, llm.clone()), "q").await.unwrap();
            assert_eq!(answer.escalation, EscalationState::FirstPass, "reply {:?}", reply);
            assert_eq!(llm.rewrite_calls(), 0);
        }
    }

    #[tokio::test]
    async fn test_sentinel_escalates_and_rewrites_once() {
        let store = Arc::new(
            MockStore::default()
                .with("q", &["irrelevant"])
                .with("a", &["x", "shared"])
                .with("b", &["y", "shared"]),
        );
        let llm = Arc::new(ScriptedLlm::new(SENTINEL).rewrite(r#"["a", "b"]"#).fallback("final"));
        let web = Arc::new(MockWeb::ok("[Web] snippet"));

        let answer = ask(&session(store.clone(), Some(web.clone()), llm.clone()), "q")
            .await
            .unwrap();

        assert_eq!(llm.rewrite_calls(), 1);
        assert_eq!(answer.answer, "final");
        assert_eq!(answer.escalation, EscalationState::Escalated);
        assert_eq!(answer.rewritten_queries, vec!["a", "b"]);
        assert_eq!(answer.fused_sets, 2);
        assert!(answer.web_context_used);

        // Web search uses the original question, never a rewrite.
        assert_eq!(web.calls.lock().unwrap().as_slice(), ["q".to_string()]);
        assert_eq!(store.calls(), vec!["q", "a", "b"]);

        assert_eq!(answer.sources[0].content, "shared");
        assert_eq!(
            llm.message_for("FALLBACK").unwrap(),
            "Question: q\nContext: [Web] snippet shared x y"
        );
        assert_eq!(
            llm.message_for("REWRITE").unwrap(),
            "Question: q\nContext: "
        );
    }

    #[tokio::test]
    async fn test_partial_multi_retrieve_failure_is_tolerated() {
        let store = Arc::new(
            MockStore::default()
                .with("q", &["p"])
                .with("r1", &["one"])
                .with("r3", &["three"])
                .failing("r2"),
        );
        let llm = Arc::new(ScriptedLlm::new(SENTINEL).rewrite(r#"["r1", "r2", "r3"]"#));

        let answer = ask(&session(store, None, llm), "q").await.unwrap();

        assert_eq!(answer.fused_sets, 2);
        let sources: Vec<&str> = answer.sources.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(sources, vec!["one", "three"]);
    }

    #[tokio::test]
    async fn test_all_rewrites_failing_is_escalation_error() {
        let store = Arc::new(MockStore::default().with("q", &["p"]).failing("r1").failing("r2"));
        let llm = Arc::new(ScriptedLlm::new(SENTINEL).rewrite(r#"["r1", "r2"]"#));

        let err = ask(&session(store, None, llm.clone()), "q").await.unwrap_err();
        assert!(matches!(err, AppError::Escalation(_)));
        assert!(llm.message_for("FALLBACK").is_none());
    }

    #[tokio::test]
    async fn test_empty_rewrite_list_is_escalation_error() {
        let store = Arc::new(MockStore::default().with("q", &["p"]));
        let llm = Arc::new(ScriptedLlm::new(SENTINEL).rewrite("[]"));

        let err = ask(&session(store.clone(), None, llm), "q").await.unwrap_err();
        assert!(matches!(err, AppError::Escalation(_)));
        assert_eq!(store.calls(), vec!["q"]);
    }

    #[tokio::test]
    async fn test_malformed_rewrite_stops_before_retrieval() {
        let store = Arc::new(MockStore::default().with("q", &["p"]));
        let llm = Arc::new(ScriptedLlm::new(SENTINEL).rewrite(r#""a bare string""#));

        let err = ask(&session(store.clone(), None, llm), "q").await.unwrap_err();
        assert!(matches!(err, AppError::RewriteParse(_)));
        assert_eq!(store.calls(), vec!["q"]);
    }

    #[tokio::test]
    async fn test_empty_question_makes_no_calls() {
        let store = Arc::new(MockStore::default());
        let llm = Arc::new(ScriptedLlm::new("unused"));

        for question in ["", "   ", "\n\t"] {
            let err = ask(&session(store.clone(), None, llm.clone()), question)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(_)));
        }
        assert!(store.calls().is_empty());
        assert!(llm.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_first_pass_failures_abort() {
        let store = Arc::new(MockStore::default().failing("q"));
        let llm = Arc::new(ScriptedLlm::new("unused"));
        let err = ask(&session(store, None, llm.clone()), "q").await.unwrap_err();
        assert!(matches!(err, AppError::Retrieval(_)));
        assert!(llm.requests.lock().unwrap().is_empty());

        let store = Arc::new(MockStore::default().with("q", &["p"]));
        let mut llm = ScriptedLlm::new("unused");
        llm.answer = Err(AppError::model("down"));
        let llm = Arc::new(llm);
        let err = ask(&session(store, None, llm.clone()), "q").await.unwrap_err();
        assert!(matches!(err, AppError::Model { status: Some(503), .. }));
        assert_eq!(llm.rewrite_calls(), 0);
    }

    #[tokio::test]
    async fn test_search_timeout_is_retrieval_error() {
        let mut store = MockStore::default().with("q", &["p"]);
        store.delay = Some(Duration::from_secs(5));
        let llm = Arc::new(ScriptedLlm::new("unused"));
        let settings = SessionSettings {
            search_timeout: Duration::from_millis(50),
            ..SessionSettings::default()
        };

        let err = ask(&session_with(Arc::new(store), None, llm, settings), "q")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Retrieval(_)));
    }

    #[tokio::test]
    async fn test_llm_timeout_is_model_error() {
        let store = Arc::new(MockStore::default().with("q", &["p"]));
        let mut llm = ScriptedLlm::new("late");
        llm.delay = Some(Duration::from_secs(5));
        let settings = SessionSettings {
            llm_timeout: Duration::from_millis(50),
            ..SessionSettings::default()
        };

        let err = ask(&session_with(store, None, Arc::new(llm), settings), "q")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Model { status: None, .. }));
    }

    #[tokio::test]
    async fn test_web_failure_degrades_to_fused_context() {
        let store = Arc::new(MockStore::default().with("q", &["p"]).with("r", &["fused"]));
        let llm = Arc::new(ScriptedLlm::new(SENTINEL).rewrite(r#"["r"]"#).fallback("done"));
        let web = Arc::new(MockWeb::failing());

        let answer = ask(&session(store, Some(web), llm.clone()), "q").await.unwrap();

        assert_eq!(answer.answer, "done");
        assert!(!answer.web_context_used);
        assert_eq!(
            llm.message_for("FALLBACK").unwrap(),
            "Question: q\nContext: fused"
        );
    }

    #[tokio::test]
    async fn test_web_timeout_degrades_to_fused_context() {
        let store = Arc::new(MockStore::default().with("q", &["p"]).with("r", &["fused"]));
        let llm = Arc::new(ScriptedLlm::new(SENTINEL).rewrite(r#"["r"]"#).fallback("done"));
        let mut web = MockWeb::ok("[Web] too late");
        web.delay = Some(Duration::from_secs(5));
        let web = Arc::new(web);
        let settings = SessionSettings {
            web_timeout: Duration::from_millis(50),
            ..SessionSettings::default()
        };

        let session = session_with(store, Some(web.clone()), llm.clone(), settings);
        let answer = ask(&session, "q").await.unwrap();

        assert_eq!(answer.answer, "done");
        assert!(!answer.web_context_used);
        assert_eq!(web.calls.lock().unwrap().as_slice(), ["q"]);
        assert_eq!(
            llm.message_for("FALLBACK").unwrap(),
            "Question: q\nContext: fused"
        );
    }

    #[tokio::test]
    async fn test_fusion_respects_top_k_and_keeps_metadata() {
        let mut store = MockStore::default().with("q", &["p"]);
        store.results.insert(
            "r".to_string(),
            vec![
                Passage::new("a").with_title("Giochi olimpici").with_distance(0.1),
                Passage::new("b"),
                Passage::new("c"),
            ],
        );
        let llm = Arc::new(ScriptedLlm::new(SENTINEL).rewrite(r#"["r"]"#));
        let settings = SessionSettings {
            top_k: 2,
            ..SessionSettings::default()
        };

        let answer = ask(&session_with(Arc::new(store), None, llm, settings), "q")
            .await
            .unwrap();

        // Reversed set feeds fusion: c, b, a.
        let sources: Vec<&str> = answer.sources.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(sources, vec!["c", "b"]);

        let store = Arc::new(MockStore {
            results: [(
                "r".to_string(),
                vec![Passage::new("a").with_title("Giochi olimpici")],
            ), ("q".to_string(), vec![Passage::new("p")])]
            .into_iter()
            .collect(),
            ..MockStore::default()
        });
        let llm = Arc::new(ScriptedLlm::new(SENTINEL).rewrite(r#"["r"]"#));
        let answer = ask(&session(store, None, llm), "q").await.unwrap();
        assert_eq!(answer.sources[0].title.as_deref(), Some("Giochi olimpici"));
    }
}
