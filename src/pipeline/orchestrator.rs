use crate::agent::AgentFactory;
use crate::backend::BackendSpec;
use crate::consensus::Consensus;
use crate::error::{PipelineError, SetupError};
use crate::github::IssueTracker;
use crate::progress;
use crate::prompt::PromptRenderer;
use chrono::Local;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::types::{Mode, PipelineOutcome, PipelineRun, Stage, StageResult};

const WORK_DIR: &str = "work";
const PLAN_HEADINGS: [&str; 2] = ["Implementation Plan:", "Consensus Plan:"];

/// Runs the five-stage planning pipeline:
/// understander -> bold -> (critique + reducer) -> consensus -> publish.
///
/// All collaborators sit behind traits so stage sequencing and the failure
/// model can be exercised without spawning real agent processes.
pub struct Orchestrator {
    run: PipelineRun,
    work_dir: PathBuf,
    renderer: PromptRenderer,
    agents: Arc<dyn AgentFactory>,
    consensus: Arc<dyn Consensus>,
    tracker: Arc<dyn IssueTracker>,
}

struct InitState {
    prefix: String,
    issue: Option<u64>,
    feature_text: String,
}

impl Orchestrator {
    pub fn new(
        run: PipelineRun,
        repo_root: &Path,
        agents: Arc<dyn AgentFactory>,
        consensus: Arc<dyn Consensus>,
        tracker: Arc<dyn IssueTracker>,
    ) -> Self {
        Self {
            run,
            work_dir: repo_root.join(crate::prompt::CONCLAVE_DIR).join(WORK_DIR),
            renderer: PromptRenderer::new(repo_root),
            agents,
            consensus,
            tracker,
        }
    }

    pub async fn run(self) -> Result<PipelineOutcome, PipelineError> {
        // INIT: everything that can fail by misconfiguration fails here,
        // before a single agent is invoked.
        let backends = self.run.backend_overrides.resolve()?;
        let init = self.init()?;
        std::fs::create_dir_all(&self.work_dir)?;

        debug!(
            "Pipeline '{}' starting: understander={} bold={} critique={} reducer={}",
            init.prefix, backends.understander, backends.bold, backends.critique, backends.reducer
        );

        // UNDERSTANDING
        let understander = self
            .phase(Stage::Understander.label(), || {
                self.run_stage(
                    Stage::Understander,
                    &backends.understander,
                    &init,
                    None,
                )
            })
            .await?;
        let understander = self.require(understander)?;

        // PROPOSING
        let bold = self
            .phase(Stage::Bold.label(), || {
                self.run_stage(
                    Stage::Bold,
                    &backends.bold,
                    &init,
                    Some(understander.output_path.clone()),
                )
            })
            .await?;
        let bold = self.require(bold)?;

        // DEBATING: both units run to completion and both verdicts are
        // inspected, so a double failure surfaces both messages.
        let (critique, reducer) = self
            .phase("Debate (critique + reducer)", || async {
                Ok(tokio::join!(
                    self.run_stage(
                        Stage::Critique,
                        &backends.critique,
                        &init,
                        Some(bold.output_path.clone()),
                    ),
                    self.run_stage(
                        Stage::Reducer,
                        &backends.reducer,
                        &init,
                        Some(bold.output_path.clone()),
                    ),
                ))
            })
            .await?;
        let (critique, reducer) = self.join_debate(critique, reducer)?;

        // SYNTHESIZING
        let consensus_path = self
            .phase("Consensus synthesis", || {
                self.consensus.synthesize(
                    &bold.output_path,
                    &critique.output_path,
                    &reducer.output_path,
                )
            })
            .await?;
        info!("Consensus plan at {}", consensus_path.display());

        // PUBLISHING: best effort, never reverts a successful run.
        let issue_url = match init.issue {
            Some(number) => self.publish(number, &consensus_path, &init.feature_text),
            None => None,
        };

        Ok(PipelineOutcome {
            consensus_path,
            issue_number: init.issue,
            issue_url,
        })
    }

    /// Resolve the artifact prefix, the tracked issue (if any), and the
    /// effective feature text for this run.
    fn init(&self) -> Result<InitState, PipelineError> {
        match self.run.mode {
            Mode::DryRun => Ok(InitState {
                prefix: timestamp_prefix(),
                issue: None,
                feature_text: self.run.feature_text.clone(),
            }),
            Mode::Create => {
                let title = format!("Plan: {}", truncate(&self.run.feature_text, 72));
                match self.tracker.create(&title) {
                    Ok(number) => {
                        info!("Created placeholder issue #{}", number);
                        Ok(InitState {
                            prefix: format!("issue-{number}"),
                            issue: Some(number),
                            feature_text: self.run.feature_text.clone(),
                        })
                    }
                    Err(e) => {
                        warn!("Issue creation failed ({}), continuing without one", e);
                        Ok(InitState {
                            prefix: timestamp_prefix(),
                            issue: None,
                            feature_text: self.run.feature_text.clone(),
                        })
                    }
                }
            }
            Mode::Refine(number) => {
                let body = self
                    .tracker
                    .fetch(number)
                    .map_err(|e| SetupError::RefineFetchFailed {
                        issue: number,
                        source: e,
                    })?;

                if !PLAN_HEADINGS.iter().any(|h| body.contains(h)) {
                    warn!(
                        "Issue #{} body has no plan section headings; refining anyway",
                        number
                    );
                }

                let mut feature_text = body;
                let focus = self.run.feature_text.trim();
                if !focus.is_empty() {
                    feature_text.push_str("\n\n## Refinement Focus\n\n");
                    feature_text.push_str(focus);
                }

                Ok(InitState {
                    prefix: format!("issue-refine-{number}"),
                    issue: Some(number),
                    feature_text,
                })
            }
        }
    }

    /// Run one phase under a stage header, timer, and working indicator.
    /// The indicator is fully stopped before any result is reported.
    async fn phase<T, F, Fut>(&self, label: &str, body: F) -> Result<T, PipelineError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, PipelineError>>,
    {
        progress::stage_header(label);
        let indicator = if self.run.verbose {
            None
        } else {
            progress::start_indicator(label)
        };

        let result = body().await;

        if let Some(indicator) = indicator {
            indicator.stop().await;
        }
        result
    }

    /// Render the stage prompt and invoke its agent. The returned result
    /// still needs its success contract checked by the caller.
    async fn run_stage(
        &self,
        stage: Stage,
        spec: &BackendSpec,
        init: &InitState,
        context: Option<PathBuf>,
    ) -> Result<StageResult, PipelineError> {
        let input_path = self
            .work_dir
            .join(format!("{}-{}-input.md", init.prefix, stage.slug()));
        let output_path = self
            .work_dir
            .join(format!("{}-{}.md", init.prefix, stage.slug()));

        self.renderer.render(
            &input_path,
            stage.slug(),
            stage.uses_guideline(),
            &init.feature_text,
            context.as_deref(),
        )?;

        let agent = self.agents.agent(spec);
        debug!("Invoking {} ({}) for {}", agent.name(), spec, stage.slug());

        let timer = progress::start_timer(stage.slug());
        let outcome = agent.run(&input_path, &output_path).await?;
        let duration = timer.finish();

        Ok(StageResult {
            stage,
            input_path,
            output_path,
            exit_code: outcome.exit_code,
            duration,
        })
    }

    fn require(&self, result: StageResult) -> Result<StageResult, PipelineError> {
        if result.succeeded() {
            info!(
                "Stage '{}' completed in {:.1}s",
                result.stage.slug(),
                result.duration.as_secs_f64()
            );
            Ok(result)
        } else {
            Err(PipelineError::StageFailure {
                stage: result.stage.slug(),
                detail: result.failure_detail(),
            })
        }
    }

    /// Evaluate both parallel units. A failed unit discards its sibling's
    /// output even when that sibling succeeded.
    fn join_debate(
        &self,
        critique: Result<StageResult, PipelineError>,
        reducer: Result<StageResult, PipelineError>,
    ) -> Result<(StageResult, StageResult), PipelineError> {
        let mut failures = Vec::new();

        let mut check = |result: Result<StageResult, PipelineError>| match result {
            Ok(r) if r.succeeded() => Some(r),
            Ok(r) => {
                failures.push(format!("{}: {}", r.stage.slug(), r.failure_detail()));
                None
            }
            Err(e) => {
                failures.push(e.to_string());
                None
            }
        };

        let critique = check(critique);
        let reducer = check(reducer);

        match (critique, reducer) {
            (Some(c), Some(r)) => {
                info!(
                    "Debate completed: critique {:.1}s, reducer {:.1}s",
                    c.duration.as_secs_f64(),
                    r.duration.as_secs_f64()
                );
                Ok((c, r))
            }
            _ => Err(PipelineError::DebateFailed { failures }),
        }
    }

    /// Publish the consensus plan to the tracked issue. Failures are logged
    /// and swallowed; the local artifact remains the result.
    fn publish(&self, number: u64, consensus_path: &Path, feature_text: &str) -> Option<String> {
        let plan = match std::fs::read_to_string(consensus_path) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("Could not read consensus plan for publishing: {}", e);
                return None;
            }
        };

        let mut title = extract_plan_title(&plan, feature_text);
        let tag = format!("[#{number}]");
        if !title.starts_with(&tag) {
            title = format!("{tag} {title}");
        }

        match self.tracker.publish(number, &title, consensus_path) {
            Ok(url) => {
                info!("Published plan to issue #{}: {}", number, url);
                Some(url)
            }
            Err(e) => {
                warn!("Publishing to issue #{} failed: {}", number, e);
                None
            }
        }
    }
}

fn timestamp_prefix() -> String {
    Local::now().format("%Y%m%d-%H%M%S").to_string()
}

/// Pull a title from the plan's first `# Implementation Plan:` or
/// `# Consensus Plan:` heading, falling back to the truncated feature text.
fn extract_plan_title(plan: &str, feature_text: &str) -> String {
    if let Ok(re) = Regex::new(r"(?m)^#+\s*(?:Implementation|Consensus)\s+Plan:\s*(.+)$") {
        if let Some(title) = re.captures(plan).and_then(|c| c.get(1)) {
            return title.as_str().trim().to_string();
        }
    }
    truncate(feature_text.lines().next().unwrap_or_default(), 72)
}

fn truncate(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentOutcome};
    use crate::backend::BackendConfig;
    use crate::error::TrackerError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct FakeAgent {
        model: String,
        fail: bool,
    }

    #[async_trait]
    impl Agent for FakeAgent {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn run(&self, input: &Path, output: &Path) -> Result<AgentOutcome, crate::error::AgentError> {
            assert!(input.exists(), "stage input must be rendered before invocation");
            let exit_code = if self.fail {
                1
            } else {
                std::fs::write(output, format!("output from {}\n", self.model))?;
                0
            };
            Ok(AgentOutcome {
                exit_code,
                duration: Duration::from_millis(1),
            })
        }
    }

    /// Fails any stage whose resolved model name is "broken".
    struct FakeFactory;

    impl AgentFactory for FakeFactory {
        fn agent(&self, spec: &BackendSpec) -> Arc<dyn Agent> {
            Arc::new(FakeAgent {
                model: spec.model.clone(),
                fail: spec.model == "broken",
            })
        }
    }

    struct FakeConsensus {
        invoked: AtomicBool,
        plan: String,
    }

    impl FakeConsensus {
        fn new(plan: &str) -> Self {
            Self {
                invoked: AtomicBool::new(false),
                plan: plan.to_string(),
            }
        }
    }

    #[async_trait]
    impl Consensus for FakeConsensus {
        async fn synthesize(
            &self,
            bold: &Path,
            critique: &Path,
            reducer: &Path,
        ) -> Result<PathBuf, PipelineError> {
            self.invoked.store(true, Ordering::SeqCst);
            for upstream in [bold, critique, reducer] {
                assert!(upstream.exists(), "consensus inputs must exist");
            }
            let path = bold.parent().unwrap().join("consensus-plan.md");
            std::fs::write(&path, &self.plan)?;
            Ok(path)
        }
    }

    #[derive(Default)]
    struct FakeTracker {
        create_result: Option<u64>,
        body: String,
        create_calls: AtomicUsize,
        published: Mutex<Option<(u64, String)>>,
    }

    impl IssueTracker for FakeTracker {
        fn create(&self, _title: &str) -> Result<u64, TrackerError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            self.create_result
                .ok_or_else(|| TrackerError::GhCli("no network".to_string()))
        }

        fn fetch(&self, _issue: u64) -> Result<String, TrackerError> {
            if self.body.is_empty() {
                Err(TrackerError::GhCli("not found".to_string()))
            } else {
                Ok(self.body.clone())
            }
        }

        fn publish(&self, issue: u64, title: &str, _body_path: &Path) -> Result<String, TrackerError> {
            *self.published.lock().unwrap() = Some((issue, title.to_string()));
            Ok(format!("https://github.com/acme/widgets/issues/{issue}"))
        }
    }

    fn repo_fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let agents = dir.path().join(".conclave/agents");
        std::fs::create_dir_all(&agents).unwrap();
        for stage in ["understander", "bold", "critique", "reducer"] {
            std::fs::write(
                agents.join(format!("{stage}.md")),
                format!("---\nname: {stage}\n---\nYou are the {stage} agent.\n"),
            )
            .unwrap();
        }
        std::fs::write(
            dir.path().join(".conclave/guidelines.md"),
            "Keep plans incremental.\n",
        )
        .unwrap();
        dir
    }

    fn orchestrator(
        repo: &Path,
        run: PipelineRun,
        consensus: Arc<FakeConsensus>,
        tracker: Arc<FakeTracker>,
    ) -> Orchestrator {
        Orchestrator::new(run, repo, Arc::new(FakeFactory), consensus, tracker)
    }

    fn plain_run(mode: Mode, overrides: BackendConfig) -> PipelineRun {
        PipelineRun {
            feature_text: "Add rate limiting".to_string(),
            mode,
            verbose: true,
            backend_overrides: overrides,
        }
    }

    fn work_files(repo: &Path) -> Vec<String> {
        let work = repo.join(".conclave/work");
        if !work.exists() {
            return Vec::new();
        }
        std::fs::read_dir(work)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect()
    }

    #[tokio::test]
    async fn successful_run_shares_one_prefix() {
        let repo = repo_fixture();
        let consensus = Arc::new(FakeConsensus::new("# Consensus Plan: Rate limiting\nbody"));
        let tracker = Arc::new(FakeTracker::default());

        let outcome = orchestrator(
            repo.path(),
            plain_run(Mode::DryRun, BackendConfig::default()),
            consensus.clone(),
            tracker,
        )
        .run()
        .await
        .unwrap();

        assert!(outcome.consensus_path.exists());
        assert!(outcome.issue_number.is_none());

        let files = work_files(repo.path());
        let outputs: Vec<_> = files
            .iter()
            .filter(|f| !f.contains("-input") && *f != "consensus-plan.md")
            .collect();
        assert_eq!(outputs.len(), 4, "four intermediate stage artifacts: {files:?}");

        let prefix = outputs[0].split('-').take(2).collect::<Vec<_>>().join("-");
        for file in &files {
            if *file != "consensus-plan.md" {
                assert!(file.starts_with(&prefix), "{file} lacks prefix {prefix}");
            }
        }
    }

    #[tokio::test]
    async fn malformed_backend_fails_before_any_stage() {
        let repo = repo_fixture();
        let overrides = BackendConfig {
            critique: Some("claude".to_string()),
            ..Default::default()
        };
        let consensus = Arc::new(FakeConsensus::new("plan"));

        let err = orchestrator(
            repo.path(),
            plain_run(Mode::DryRun, overrides),
            consensus.clone(),
            Arc::new(FakeTracker::default()),
        )
        .run()
        .await
        .unwrap_err();

        assert_eq!(err.exit_code(), 2);
        assert!(matches!(
            err,
            PipelineError::Setup(SetupError::InvalidBackendSpec { ref stage, .. }) if stage == "critique"
        ));
        assert!(work_files(repo.path()).is_empty(), "no stage files may exist");
        assert!(!consensus.invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn critique_failure_discards_reducer_and_skips_consensus() {
        let repo = repo_fixture();
        let overrides = BackendConfig {
            critique: Some("claude:broken".to_string()),
            ..Default::default()
        };
        let consensus = Arc::new(FakeConsensus::new("plan"));

        let err = orchestrator(
            repo.path(),
            plain_run(Mode::DryRun, overrides),
            consensus.clone(),
            Arc::new(FakeTracker::default()),
        )
        .run()
        .await
        .unwrap_err();

        assert_eq!(err.exit_code(), 1);
        let message = err.to_string();
        assert!(message.contains("critique"), "{message}");
        assert!(!message.contains("reducer"), "{message}");
        assert!(!consensus.invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn double_debate_failure_surfaces_both() {
        let repo = repo_fixture();
        let overrides = BackendConfig {
            critique: Some("claude:broken".to_string()),
            reducer: Some("codex:broken".to_string()),
            ..Default::default()
        };
        let consensus = Arc::new(FakeConsensus::new("plan"));

        let err = orchestrator(
            repo.path(),
            plain_run(Mode::DryRun, overrides),
            consensus.clone(),
            Arc::new(FakeTracker::default()),
        )
        .run()
        .await
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("critique"), "{message}");
        assert!(message.contains("reducer"), "{message}");
    }

    #[tokio::test]
    async fn create_mode_uses_issue_prefix_and_publishes_tagged_title() {
        let repo = repo_fixture();
        let consensus = Arc::new(FakeConsensus::new("# Consensus Plan: Rate limiting\nbody"));
        let tracker = Arc::new(FakeTracker {
            create_result: Some(77),
            ..Default::default()
        });

        let outcome = orchestrator(
            repo.path(),
            plain_run(Mode::Create, BackendConfig::default()),
            consensus,
            tracker.clone(),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(outcome.issue_number, Some(77));
        assert!(outcome.issue_url.as_deref().unwrap().ends_with("/77"));

        for file in work_files(repo.path()) {
            if file != "consensus-plan.md" {
                assert!(file.starts_with("issue-77-"), "{file}");
            }
        }

        let (number, title) = tracker.published.lock().unwrap().clone().unwrap();
        assert_eq!(number, 77);
        assert_eq!(title, "[#77] Rate limiting");
    }

    #[tokio::test]
    async fn create_mode_falls_back_to_timestamp_on_tracker_failure() {
        let repo = repo_fixture();
        let consensus = Arc::new(FakeConsensus::new("plan"));
        let tracker = Arc::new(FakeTracker::default()); // create fails

        let outcome = orchestrator(
            repo.path(),
            plain_run(Mode::Create, BackendConfig::default()),
            consensus,
            tracker.clone(),
        )
        .run()
        .await
        .unwrap();

        assert!(outcome.issue_number.is_none());
        assert!(outcome.issue_url.is_none());
        assert_eq!(tracker.create_calls.load(Ordering::SeqCst), 1);
        for file in work_files(repo.path()) {
            assert!(!file.starts_with("issue-"), "{file}");
        }
    }

    #[tokio::test]
    async fn dry_run_never_touches_tracker() {
        let repo = repo_fixture();
        let consensus = Arc::new(FakeConsensus::new("plan"));
        let tracker = Arc::new(FakeTracker {
            create_result: Some(9),
            ..Default::default()
        });

        orchestrator(
            repo.path(),
            plain_run(Mode::DryRun, BackendConfig::default()),
            consensus,
            tracker.clone(),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(tracker.create_calls.load(Ordering::SeqCst), 0);
        assert!(tracker.published.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn refine_mode_without_plan_headings_still_runs() {
        let repo = repo_fixture();
        let consensus = Arc::new(FakeConsensus::new("# Implementation Plan: Tighter limits\nbody"));
        let tracker = Arc::new(FakeTracker {
            body: "Just prose, no plan sections here.".to_string(),
            ..Default::default()
        });

        let run = PipelineRun {
            feature_text: "focus on burst traffic".to_string(),
            mode: Mode::Refine(5),
            verbose: true,
            backend_overrides: BackendConfig::default(),
        };

        let outcome = orchestrator(repo.path(), run, consensus, tracker.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.issue_number, Some(5));
        for file in work_files(repo.path()) {
            if file != "consensus-plan.md" {
                assert!(file.starts_with("issue-refine-5-"), "{file}");
            }
        }

        // Refinement focus reaches the rendered prompts.
        let input = repo
            .path()
            .join(".conclave/work/issue-refine-5-understander-input.md");
        let rendered = std::fs::read_to_string(input).unwrap();
        assert!(rendered.contains("Just prose"));
        assert!(rendered.contains("Refinement Focus"));
        assert!(rendered.contains("burst traffic"));

        let (_, title) = tracker.published.lock().unwrap().clone().unwrap();
        assert_eq!(title, "[#5] Tighter limits");
    }

    #[tokio::test]
    async fn refine_fetch_failure_is_fatal_setup_error() {
        let repo = repo_fixture();
        let consensus = Arc::new(FakeConsensus::new("plan"));
        let tracker = Arc::new(FakeTracker::default()); // empty body → fetch error

        let run = PipelineRun {
            feature_text: String::new(),
            mode: Mode::Refine(12),
            verbose: true,
            backend_overrides: BackendConfig::default(),
        };

        let err = orchestrator(repo.path(), run, consensus, tracker)
            .run()
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), 2);
        assert!(matches!(
            err,
            PipelineError::Setup(SetupError::RefineFetchFailed { issue: 12, .. })
        ));
        assert!(work_files(repo.path()).is_empty());
    }

    #[tokio::test]
    async fn colliding_fallback_prefixes_overwrite_artifacts() {
        // Fallback prefixes have second granularity, so two runs started
        // within the same second share one file family and the second run
        // overwrites the first. This is a known limitation; the files are
        // not disambiguated. Retried on a fresh fixture in the rare case
        // the pair straddles a second boundary.
        for attempt in 0.. {
            let repo = repo_fixture();
            let tracker = Arc::new(FakeTracker::default());

            for _ in 0..2 {
                orchestrator(
                    repo.path(),
                    plain_run(Mode::DryRun, BackendConfig::default()),
                    Arc::new(FakeConsensus::new("plan")),
                    tracker.clone(),
                )
                .run()
                .await
                .unwrap();
            }

            let files = work_files(repo.path());
            let prefixes: std::collections::HashSet<String> = files
                .iter()
                .filter(|f| *f != "consensus-plan.md")
                .map(|f| f.split('-').take(2).collect::<Vec<_>>().join("-"))
                .collect();

            if prefixes.len() == 1 {
                // Both runs collided: still exactly one family of four
                // inputs and four outputs, the first run's clobbered.
                assert_eq!(files.len(), 9, "{files:?}");
                return;
            }
            assert!(attempt < 10, "runs kept straddling second boundaries");
        }
    }

    #[test]
    fn title_extraction() {
        assert_eq!(
            extract_plan_title("# Consensus Plan: Do the thing\nrest", "feature"),
            "Do the thing"
        );
        assert_eq!(
            extract_plan_title("## Implementation Plan:   Spaced out  \n", "feature"),
            "Spaced out"
        );
        assert_eq!(extract_plan_title("no headings here", "fallback text"), "fallback text");
        let long = "x".repeat(100);
        assert_eq!(extract_plan_title("nothing", &long).chars().count(), 72);
    }
}
