//! Pipeline orchestration: request → mode → components → response.
//!
//! Every run builds its own planner, executor, compiler and retriever, so one
//! [`ResearchPipeline`] can serve concurrent requests without shared state.
//! Each mode runs under the configured overall time budget.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use fathom_provider::{LanguageModel, PromptRequest};
use fathom_retrieval::WebRetriever;
use fathom_shared::{
    AppConfig, ChatTurn, FathomError, MAX_SOURCES_CAP, ResearchConfig, ResearchRequest,
    ResearchResponse, Result, RetrievalConfig, RunId, SearchMode, SearchResult, SourceRecord,
};

use crate::compiler::ReportCompiler;
use crate::executor::{ExecutionProgress, TaskExecutor};
use crate::planner::ResearchPlanner;
use crate::summarizer::{SearchSummarizer, fallback_summary};

const CHAT_SYSTEM: &str = "You are a helpful research assistant. Answer clearly and \
accurately, and say so when you are not sure.";

/// Stage a pipeline run is in, reported through [`ProgressReporter::phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchPhase {
    Planning,
    Executing,
    Compiling,
    Retrieving,
    Summarizing,
    Chatting,
}

impl std::fmt::Display for ResearchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Planning => "Planning research",
            Self::Executing => "Executing subtasks",
            Self::Compiling => "Compiling report",
            Self::Retrieving => "Retrieving sources",
            Self::Summarizing => "Summarizing sources",
            Self::Chatting => "Waiting for reply",
        };
        f.write_str(label)
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, phase: ResearchPhase);
    /// Called after each deep-research subtask.
    fn subtask_finished(&self, task_id: &str, current: usize, total: usize);
    /// Called when a run completes successfully.
    fn done(&self, elapsed: Duration);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _phase: ResearchPhase) {}
    fn subtask_finished(&self, _task_id: &str, _current: usize, _total: usize) {}
    fn done(&self, _elapsed: Duration) {}
}

/// Web-search options after defaults and clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub mode: SearchMode,
    pub max_sources: usize,
    pub fast: bool,
}

impl SearchOptions {
    /// Options from `config` defaults.
    pub fn defaults(config: &ResearchConfig) -> Self {
        Self {
            mode: config.default_search_mode,
            max_sources: clamp_sources(config.default_max_sources),
            fast: config.default_fast_mode,
        }
    }

    fn from_request(request: &ResearchRequest, config: &ResearchConfig) -> Self {
        let defaults = Self::defaults(config);
        Self {
            mode: request.search_mode.unwrap_or(defaults.mode),
            max_sources: request
                .max_sources
                .map(clamp_sources)
                .unwrap_or(defaults.max_sources),
            fast: request.fast_mode.unwrap_or(defaults.fast),
        }
    }
}

fn clamp_sources(n: usize) -> usize {
    n.clamp(1, MAX_SOURCES_CAP)
}

/// Entry point for every research mode.
pub struct ResearchPipeline {
    model: Arc<dyn LanguageModel>,
    retrieval: RetrievalConfig,
    config: ResearchConfig,
}

impl ResearchPipeline {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        retrieval: RetrievalConfig,
        config: ResearchConfig,
    ) -> Self {
        Self {
            model,
            retrieval,
            config,
        }
    }

    /// Build a pipeline from loaded application config.
    pub fn from_config(model: Arc<dyn LanguageModel>, app: &AppConfig) -> Self {
        Self::new(model, RetrievalConfig::from(app), ResearchConfig::from(app))
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Plan, execute and compile a full research report on `topic`.
    pub async fn deep_research(
        &self,
        topic: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<String> {
        self.within_budget("deep research", self.run_deep_research(topic, progress))
            .await
    }

    /// Retrieve sources for `query` and summarize them.
    pub async fn web_search(
        &self,
        query: &str,
        options: SearchOptions,
        progress: &dyn ProgressReporter,
    ) -> Result<SearchResult> {
        self.within_budget("web search", self.run_web_search(query, options, progress))
            .await
    }

    /// Summarize a previously fetched result; its sources pass through unchanged.
    pub async fn summarize_results(
        &self,
        query: &str,
        results: SearchResult,
        mode: SearchMode,
        progress: &dyn ProgressReporter,
    ) -> Result<SearchResult> {
        self.within_budget(
            "summary",
            self.run_summary(query, results, mode, progress),
        )
        .await
    }

    /// Answer `message` in the context of prior turns.
    pub async fn chat(
        &self,
        message: &str,
        history: &[ChatTurn],
        progress: &dyn ProgressReporter,
    ) -> Result<String> {
        self.within_budget("chat", self.run_chat(message, history, progress))
            .await
    }

    /// Dispatch a request envelope to the matching mode.
    ///
    /// Precedence: summary-only, deep research, chat (non-empty history),
    /// then web search.
    pub async fn handle(
        &self,
        request: &ResearchRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<ResearchResponse> {
        self.within_budget("request", self.dispatch(request, progress))
            .await
    }

    /// Like [`handle`](Self::handle), but errors become a failure envelope.
    pub async fn respond(
        &self,
        request: &ResearchRequest,
        progress: &dyn ProgressReporter,
    ) -> ResearchResponse {
        match self.handle(request, progress).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "request failed");
                ResearchResponse::Failure {
                    error: e.to_string(),
                    summary: failure_summary(request),
                }
            }
        }
    }

    async fn within_budget<T>(
        &self,
        label: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let budget = self.config.pipeline_timeout;
        match tokio::time::timeout(budget, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(label, budget_ms = budget.as_millis(), "pipeline timed out");
                Err(FathomError::timeout(format!(
                    "{label} did not finish within {} ms",
                    budget.as_millis()
                )))
            }
        }
    }

    async fn dispatch(
        &self,
        request: &ResearchRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<ResearchResponse> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(FathomError::input("query must not be empty"));
        }

        if request.summary_mode.unwrap_or(false) {
            let results = request.search_results.clone().ok_or_else(|| {
                FathomError::input("summary mode requires searchResults")
            })?;
            let mode = request
                .search_mode
                .unwrap_or(self.config.default_search_mode);
            let result = self.run_summary(query, results, mode, progress).await?;
            return Ok(ResearchResponse::Search(result));
        }

        if request.deep_research.unwrap_or(false) {
            let response = self.run_deep_research(query, progress).await?;
            return Ok(ResearchResponse::Report { response });
        }

        if let Some(history) = request.chat_history.as_deref().filter(|h| !h.is_empty()) {
            let response = self.run_chat(query, history, progress).await?;
            return Ok(ResearchResponse::Report { response });
        }

        let options = SearchOptions::from_request(request, &self.config);
        let result = self.run_web_search(query, options, progress).await?;
        Ok(ResearchResponse::Search(result))
    }

    #[instrument(skip_all, fields(topic = %topic.trim()))]
    async fn run_deep_research(
        &self,
        topic: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<String> {
        let start = Instant::now();
        let run_id = RunId::new();
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(FathomError::input("research topic must not be empty"));
        }

        info!(%run_id, model = self.model.model_name(), "starting deep research");

        progress.phase(ResearchPhase::Planning);
        let subtasks = ResearchPlanner::new(self.model.as_ref()).plan(topic).await?;

        progress.phase(ResearchPhase::Executing);
        let adapter = PipelineExecutionProgress { inner: progress };
        let results = TaskExecutor::new(self.model.as_ref(), self.config.pacing)
            .execute(topic, &subtasks, &adapter)
            .await;

        progress.phase(ResearchPhase::Compiling);
        let report = ReportCompiler::new(self.model.as_ref())
            .compile(topic, &results)
            .await?;

        let elapsed = start.elapsed();
        progress.done(elapsed);
        info!(
            %run_id,
            subtasks = subtasks.len(),
            report_chars = report.len(),
            elapsed_ms = elapsed.as_millis(),
            "deep research complete"
        );

        Ok(report)
    }

    #[instrument(skip_all, fields(query = %query.trim(), mode = %options.mode, max_sources = options.max_sources, fast = options.fast))]
    async fn run_web_search(
        &self,
        query: &str,
        options: SearchOptions,
        progress: &dyn ProgressReporter,
    ) -> Result<SearchResult> {
        let start = Instant::now();
        let run_id = RunId::new();
        let query = query.trim();
        if query.is_empty() {
            return Err(FathomError::input("search query must not be empty"));
        }

        info!(%run_id, "starting web search");

        progress.phase(ResearchPhase::Retrieving);
        let sources = WebRetriever::new(self.retrieval.clone())?
            .fast_mode(options.fast)
            .retrieve(query, clamp_sources(options.max_sources))
            .await?;

        progress.phase(ResearchPhase::Summarizing);
        let summary = self.summarize_or_degrade(query, &sources, options.mode).await?;

        let elapsed = start.elapsed();
        progress.done(elapsed);
        info!(
            %run_id,
            sources = sources.len(),
            elapsed_ms = elapsed.as_millis(),
            "web search complete"
        );

        Ok(SearchResult::new(summary, sources))
    }

    #[instrument(skip_all, fields(query = %query.trim(), sources = results.sources.len(), mode = %mode))]
    async fn run_summary(
        &self,
        query: &str,
        results: SearchResult,
        mode: SearchMode,
        progress: &dyn ProgressReporter,
    ) -> Result<SearchResult> {
        let start = Instant::now();
        let query = query.trim();
        if query.is_empty() {
            return Err(FathomError::input("query must not be empty"));
        }

        progress.phase(ResearchPhase::Summarizing);
        let summary = self
            .summarize_or_degrade(query, &results.sources, mode)
            .await?;

        progress.done(start.elapsed());
        Ok(SearchResult::new(summary, results.sources))
    }

    #[instrument(skip_all, fields(turns = history.len()))]
    async fn run_chat(
        &self,
        message: &str,
        history: &[ChatTurn],
        progress: &dyn ProgressReporter,
    ) -> Result<String> {
        let start = Instant::now();
        let message = message.trim();
        if message.is_empty() {
            return Err(FathomError::input("message must not be empty"));
        }

        progress.phase(ResearchPhase::Chatting);
        let request = PromptRequest::new(chat_prompt(message, history)).with_system(CHAT_SYSTEM);
        let reply = self.model.invoke(request).await?;

        progress.done(start.elapsed());
        Ok(reply.trim().to_string())
    }

    /// Summarize, falling back to deterministic text unless the provider is
    /// unreachable altogether.
    async fn summarize_or_degrade(
        &self,
        query: &str,
        sources: &[SourceRecord],
        mode: SearchMode,
    ) -> Result<String> {
        match SearchSummarizer::new(self.model.as_ref())
            .summarize(query, sources, mode)
            .await
        {
            Ok(summary) => Ok(summary),
            Err(FathomError::Provider(e)) if !e.is_unavailable() => {
                warn!(error = %e, "summarization failed, using fallback summary");
                Ok(fallback_summary(query, sources))
            }
            Err(e) => Err(e),
        }
    }
}

/// Best-effort summary for a failed request, worded for the mode that failed.
fn failure_summary(request: &ResearchRequest) -> String {
    let query = request.query.trim();
    if request.summary_mode.unwrap_or(false) {
        let sources: &[SourceRecord] = request
            .search_results
            .as_ref()
            .map(|r| r.sources.as_slice())
            .unwrap_or_default();
        return fallback_summary(query, sources);
    }

    let researched = request.deep_research.unwrap_or(false)
        || request.chat_history.as_ref().is_some_and(|h| !h.is_empty());
    if researched {
        format!(
            "The topic \"{query}\" could not be researched right now. \
             Try again later or narrow the question."
        )
    } else {
        fallback_summary(query, &[])
    }
}

/// Single prompt carrying the prior turns followed by the new message.
pub fn chat_prompt(message: &str, history: &[ChatTurn]) -> String {
    if history.is_empty() {
        return message.to_string();
    }

    let transcript = history
        .iter()
        .map(|turn| {
            let speaker = if turn.is_user { "User" } else { "Assistant" };
            format!("{speaker}: {}", turn.content.trim())
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!("Conversation so far:\n{transcript}\n\nUser: {message}")
}

// ---------------------------------------------------------------------------
// Execution progress adapter
// ---------------------------------------------------------------------------

/// Adapts a `ProgressReporter` to the `ExecutionProgress` interface.
struct PipelineExecutionProgress<'a> {
    inner: &'a dyn ProgressReporter,
}

impl ExecutionProgress for PipelineExecutionProgress<'_> {
    fn subtask_finished(&self, task_id: &str, current: usize, total: usize) {
        self.inner.subtask_finished(task_id, current, total);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::test_support::ScriptedModel;
    use fathom_shared::ProviderError;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PLAN: &str = r#"Here is the plan:
[{"id": "1", "description": "Review the literature"},
 {"id": "2", "description": "Gather data"},
 {"id": "3", "description": "Analyse the data"},
 {"id": "4", "description": "Synthesize conclusions"}]"#;

    fn system_of(req: &PromptRequest) -> &str {
        req.system.as_deref().unwrap_or_default()
    }

    /// Planner/analyst/editor answers; the analyst fails on `failing_task`.
    fn research_model(failing_task: Option<&'static str>) -> Arc<ScriptedModel> {
        Arc::new(ScriptedModel::new(move |req| {
            let system = system_of(req);
            if system.starts_with("You are a research planner") {
                Ok(PLAN.into())
            } else if system.starts_with("You are a research analyst") {
                match failing_task {
                    Some(id) if req.prompt.contains(&format!("Subtask {id}:")) => {
                        Err(ProviderError::Upstream {
                            status: 500,
                            message: "boom".into(),
                        })
                    }
                    _ => Ok("Solid finding.".into()),
                }
            } else if system.starts_with("You are a research editor") {
                Ok("# Introduction\nA report.\n# Conclusion\nDone.".into())
            } else {
                Ok("generic".into())
            }
        }))
    }

    fn research_config() -> ResearchConfig {
        ResearchConfig {
            pacing: Duration::ZERO,
            ..ResearchConfig::default()
        }
    }

    fn pipeline(model: Arc<ScriptedModel>) -> ResearchPipeline {
        ResearchPipeline::new(model, RetrievalConfig::default(), research_config())
    }

    async fn failing_sources_config(server: &MockServer) -> RetrievalConfig {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(server)
            .await;
        RetrievalConfig {
            fetch_timeout: Duration::from_millis(300),
            allow_private_hosts: true,
            templates: (0..6)
                .map(|i| format!("{}/page{i}?q={{query}}", server.uri()))
                .collect(),
            ..RetrievalConfig::default()
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        phases: Mutex<Vec<ResearchPhase>>,
        subtasks: Mutex<Vec<String>>,
        done: Mutex<usize>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, phase: ResearchPhase) {
            self.phases.lock().unwrap().push(phase);
        }
        fn subtask_finished(&self, task_id: &str, _current: usize, _total: usize) {
            self.subtasks.lock().unwrap().push(task_id.to_string());
        }
        fn done(&self, _elapsed: Duration) {
            *self.done.lock().unwrap() += 1;
        }
    }

    #[tokio::test]
    async fn deep_research_happy_path() {
        let model = research_model(None);
        let progress = RecordingProgress::default();
        let report = pipeline(model.clone())
            .deep_research("renewable energy storage", &progress)
            .await
            .unwrap();

        assert!(report.contains("Introduction"));
        assert_eq!(model.call_count(), 6);
        assert_eq!(
            *progress.phases.lock().unwrap(),
            vec![
                ResearchPhase::Planning,
                ResearchPhase::Executing,
                ResearchPhase::Compiling
            ]
        );
        assert_eq!(*progress.subtasks.lock().unwrap(), vec!["1", "2", "3", "4"]);
        assert_eq!(*progress.done.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn deep_research_survives_a_failing_subtask() {
        let model = research_model(Some("3"));
        let report = pipeline(model.clone())
            .deep_research("renewable energy storage", &SilentProgress)
            .await
            .unwrap();
        assert!(report.contains("Introduction"));

        let calls = model.calls();
        let compile_prompt = &calls.last().unwrap().prompt;
        assert!(compile_prompt.contains("### Task 3\nError conducting research for task 3"));
        assert!(compile_prompt.contains("### Task 4\nSolid finding."));
    }

    #[tokio::test]
    async fn planning_failure_is_fatal() {
        let model = Arc::new(ScriptedModel::new(|_| Ok("no list here".into())));
        let err = pipeline(model.clone())
            .deep_research("tides", &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, FathomError::Planning { .. }));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn compile_failure_is_fatal() {
        let model = Arc::new(ScriptedModel::new(|req| {
            let system = system_of(req);
            if system.starts_with("You are a research planner") {
                Ok(PLAN.into())
            } else if system.starts_with("You are a research editor") {
                Err(ProviderError::RateLimited("slow down".into()))
            } else {
                Ok("finding".into())
            }
        }));
        let err = pipeline(model.clone())
            .deep_research("tides", &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, FathomError::Provider(ProviderError::RateLimited(_))));
        assert_eq!(model.call_count(), 6);
    }

    #[tokio::test]
    async fn empty_query_is_rejected_without_calls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let model = Arc::new(ScriptedModel::new(|_| Ok("unused".into())));
        let retrieval = RetrievalConfig {
            allow_private_hosts: true,
            templates: vec![format!("{}/?q={{query}}", server.uri())],
            ..RetrievalConfig::default()
        };
        let pipeline = ResearchPipeline::new(model.clone(), retrieval, research_config());

        for request in [
            ResearchRequest::new("   "),
            ResearchRequest {
                deep_research: Some(true),
                ..ResearchRequest::new("")
            },
        ] {
            let err = pipeline.handle(&request, &SilentProgress).await.unwrap_err();
            assert!(matches!(err, FathomError::Input { .. }));
        }
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn web_search_degrades_to_synthetic_sources_and_summarizes() {
        let server = MockServer::start().await;
        let retrieval = failing_sources_config(&server).await;
        let model = Arc::new(ScriptedModel::new(|_| Ok("A summary.".into())));
        let pipeline = ResearchPipeline::new(model.clone(), retrieval, research_config());

        let options = SearchOptions {
            mode: SearchMode::Quick,
            max_sources: 3,
            fast: false,
        };
        let result = pipeline
            .web_search("solar power", options, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(result.summary, "A summary.");
        assert_eq!(result.sources.len(), 3);
        assert_eq!(result.total_pages, 3);
        assert!(result.sources.iter().all(|s| s.synthetic));
        assert_eq!(model.calls()[0].max_tokens, Some(600));
    }

    #[tokio::test]
    async fn web_search_falls_back_when_summarizer_is_rate_limited() {
        let server = MockServer::start().await;
        let retrieval = failing_sources_config(&server).await;
        let model = Arc::new(ScriptedModel::new(|_| {
            Err(ProviderError::RateLimited("busy".into()))
        }));
        let pipeline = ResearchPipeline::new(model, retrieval, research_config());

        let response = pipeline
            .handle(
                &ResearchRequest {
                    max_sources: Some(2),
                    ..ResearchRequest::new("solar power")
                },
                &SilentProgress,
            )
            .await
            .unwrap();

        match response {
            ResearchResponse::Search(result) => {
                assert!(result.summary.contains("are limited"));
                assert_eq!(result.sources.len(), 2);
            }
            other => panic!("expected search result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unavailable_provider_surfaces_as_failure_envelope() {
        let server = MockServer::start().await;
        let retrieval = failing_sources_config(&server).await;
        let model = Arc::new(ScriptedModel::new(|_| {
            Err(ProviderError::Unavailable("API key is not configured".into()))
        }));
        let pipeline = ResearchPipeline::new(model, retrieval, research_config());
        let request = ResearchRequest {
            max_sources: Some(2),
            ..ResearchRequest::new("solar power")
        };

        let err = pipeline.handle(&request, &SilentProgress).await.unwrap_err();
        assert!(matches!(err, FathomError::Provider(ref e) if e.is_unavailable()));

        match pipeline.respond(&request, &SilentProgress).await {
            ResearchResponse::Failure { error, summary } => {
                assert!(error.contains("provider unavailable"));
                assert!(summary.contains("solar power"));
            }
            other => panic!("expected failure envelope, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_deep_research_explains_the_topic_could_not_be_researched() {
        let model = Arc::new(ScriptedModel::new(|_| Ok("no list here".into())));
        let request = ResearchRequest {
            deep_research: Some(true),
            ..ResearchRequest::new("ocean acidification")
        };

        match pipeline(model).respond(&request, &SilentProgress).await {
            ResearchResponse::Failure { error, summary } => {
                assert!(error.starts_with("planning error"));
                assert!(summary.contains("\"ocean acidification\" could not be researched"));
                assert!(!summary.contains("No sources"));
            }
            other => panic!("expected failure envelope, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn summary_mode_passes_sources_through() {
        let model = Arc::new(ScriptedModel::new(|_| Ok("Condensed.".into())));
        let sources = vec![
            SourceRecord::new("One", "https://one.example", "first body"),
            SourceRecord::new("Two", "https://two.example", "second body").synthetic(),
        ];
        let request = ResearchRequest {
            summary_mode: Some(true),
            search_mode: Some(SearchMode::Exploratory),
            search_results: Some(SearchResult {
                summary: "old".into(),
                sources: sources.clone(),
                total_pages: 99,
            }),
            ..ResearchRequest::new("tides")
        };

        let response = pipeline(model.clone())
            .handle(&request, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(
            response,
            ResearchResponse::Search(SearchResult {
                summary: "Condensed.".into(),
                sources,
                total_pages: 2,
            })
        );
        assert_eq!(model.calls()[0].max_tokens, Some(2500));
    }

    #[tokio::test]
    async fn summary_mode_requires_results() {
        let model = Arc::new(ScriptedModel::new(|_| Ok("unused".into())));
        let request = ResearchRequest {
            summary_mode: Some(true),
            ..ResearchRequest::new("tides")
        };
        let err = pipeline(model.clone())
            .handle(&request, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, FathomError::Input { .. }));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn chat_history_is_carried_into_the_prompt() {
        let model = Arc::new(ScriptedModel::new(|_| Ok(" Sure. ".into())));
        let request = ResearchRequest {
            chat_history: Some(vec![
                ChatTurn {
                    is_user: true,
                    content: "What causes tides?".into(),
                },
                ChatTurn {
                    is_user: false,
                    content: "Mostly the Moon.".into(),
                },
            ]),
            ..ResearchRequest::new("And the Sun?")
        };

        let response = pipeline(model.clone())
            .handle(&request, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(
            response,
            ResearchResponse::Report {
                response: "Sure.".into()
            }
        );

        let prompt = &model.calls()[0].prompt;
        assert_eq!(
            prompt,
            "Conversation so far:\nUser: What causes tides?\nAssistant: Mostly the Moon.\n\nUser: And the Sun?"
        );
    }

    #[tokio::test]
    async fn deep_research_takes_precedence_over_chat() {
        let model = research_model(None);
        let request = ResearchRequest {
            deep_research: Some(true),
            chat_history: Some(vec![ChatTurn {
                is_user: true,
                content: "hi".into(),
            }]),
            ..ResearchRequest::new("tides")
        };
        let response = pipeline(model.clone())
            .handle(&request, &SilentProgress)
            .await
            .unwrap();
        assert!(matches!(response, ResearchResponse::Report { ref response } if response.contains("Introduction")));
        assert_eq!(model.call_count(), 6);
    }

    #[tokio::test]
    async fn overall_budget_yields_timeout() {
        let model =
            Arc::new(ScriptedModel::new(|_| Ok("late".into())).with_delay(Duration::from_millis(500)));
        let pipeline = ResearchPipeline::new(
            model,
            RetrievalConfig::default(),
            ResearchConfig {
                pipeline_timeout: Duration::from_millis(50),
                ..research_config()
            },
        );
        let err = pipeline
            .chat("hello", &[], &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, FathomError::Timeout { .. }));
    }

    #[test]
    fn max_sources_is_clamped() {
        let config = research_config();
        let over = ResearchRequest {
            max_sources: Some(50),
            ..ResearchRequest::new("q")
        };
        let zero = ResearchRequest {
            max_sources: Some(0),
            ..ResearchRequest::new("q")
        };
        assert_eq!(SearchOptions::from_request(&over, &config).max_sources, 10);
        assert_eq!(SearchOptions::from_request(&zero, &config).max_sources, 1);
        assert_eq!(
            SearchOptions::from_request(&ResearchRequest::new("q"), &config),
            SearchOptions::defaults(&config)
        );
    }

    #[test]
    fn chat_prompt_without_history_is_the_message() {
        assert_eq!(chat_prompt("hello", &[]), "hello");
    }
}
