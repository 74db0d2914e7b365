use crate::compile::compile;
use crate::execute::execute;
use crate::limit::{self, ResourceLimiter};
use crate::output::OutputCapper;
use crate::rules::RuleSet;
use crate::submission::{CompileOutcome, Outcome, Submission, Verdict};
use crate::validate::Validator;
use crate::workspace::Workspace;
use crate::RunnerConfig;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, trace};

/// Validate, compile and run one submission at a time.
///
/// Holds no per-submission state, so one runner can serve concurrent callers.
pub struct Runner {
    config: RunnerConfig,
    validator: Validator,
    limiter: Arc<dyn ResourceLimiter>,
    capper: OutputCapper,
    work_root: PathBuf,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Result<Self> {
        Self::with_limiter(config, limit::platform_default())
    }

    pub fn with_limiter(config: RunnerConfig, limiter: Arc<dyn ResourceLimiter>) -> Result<Self> {
        config.validate()?;

        let validator = match config.rules {
            Some(ref path) => Validator::new(&config.limits, &RuleSet::load(path)?)?,
            None => Validator::with_built_in_rules(&config.limits)?,
        };

        let work_root = match config.work_root {
            Some(ref root) => root.clone(),
            None => env::temp_dir(),
        };
        if !work_root.is_dir() {
            anyhow::bail!("work root is not a directory: path = {}", work_root.display());
        }

        info!(
            rules_version = validator.rules().version(),
            keywords = validator.rules().keyword_count(),
            patterns = validator.rules().pattern_count(),
            limiter = limiter.name(),
            work_root = %work_root.display(),
            "runner ready"
        );

        Ok(Self {
            capper: OutputCapper::new(config.limits.max_output_bytes),
            config,
            validator,
            limiter,
            work_root,
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Runs the whole pipeline. Every failure is reported as an [`Outcome`].
    #[tracing::instrument(level = "debug", skip_all, fields(nonce))]
    pub async fn run_submission(&self, submission: &Submission) -> Outcome {
        let nonce: u32 = rand::random();
        tracing::Span::current().record("nonce", nonce);

        if let Verdict::Rejected(rejection) = self.validator.validate(submission) {
            return Outcome::Rejected(rejection);
        }

        let outcome = match self.compile_and_execute(submission).await {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!(?err, "pipeline fault");
                Outcome::RuntimeError(format!("{:#}", err))
            }
        };

        trace!(kind = outcome.kind());
        outcome
    }

    async fn compile_and_execute(&self, submission: &Submission) -> Result<Outcome> {
        let workspace = Workspace::create(&self.work_root)?;
        workspace.write_source(submission.source())?;

        let compiled = compile(&workspace, &self.config, Arc::clone(&self.limiter))
            .await
            .context("compile stage failed")?;

        if let CompileOutcome::Failed(diagnostics) = compiled {
            return Ok(Outcome::CompileFailed(self.capper.cap(diagnostics)));
        }

        let outcome = execute(
            &workspace,
            submission.args(),
            submission.stdin(),
            &self.config.limits,
            Arc::clone(&self.limiter),
        )
        .await;

        Ok(match Outcome::from(outcome) {
            Outcome::Completed(output) => Outcome::Completed(self.capper.cap(output)),
            other => other,
        })
    }
}
