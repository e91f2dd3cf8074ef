//! The install-and-run orchestrator
//!
//! One request walks `Fetching -> Verifying -> (CacheHit | Installing) ->
//! Executing -> Success`, dropping to `Failed` from any state. Every failure
//! is classified and reported in the returned [`InstallOutcome`]; nothing
//! here returns an error to the caller.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use e14z_cache::{CacheManager, InstallRecord, KeyGuard};
use e14z_config::{constants::JOURNAL_DIR, Config};
use e14z_errors::{Error, ErrorCategory, InstallError, RegistryError, SecurityError};
use e14z_events::{AppEvent, EventEmitter, EventSender, InstallEvent, SecurityEvent};
use e14z_guard::Verifier;
use e14z_sandbox::{detect_auth_env_vars, ExecOutput, ExecRequest, McpProbe, ProbeReport, ProcessRunner};
use e14z_types::{
    ExecutionDetails, HealthTier, InstallOptions, InstallOutcome, InstallPhase, InstallSpec,
    PackageDescriptor, PackageMetadata,
};
use tokio::fs;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::plan::InstallPlan;
use crate::registry::Registry;
use crate::resources::{acquire_semaphore_permit, create_semaphore};
use crate::retry::{execute_with_retry_notify, RetryNotice, RetryPolicy};
use crate::transaction::{recover_journals, InstallationTransaction, OperationKind};

/// A failed request plus whatever was known when it failed
struct Failure {
    error: Error,
    cache_dir: Option<PathBuf>,
    details: Option<ExecutionDetails>,
}

impl Failure {
    fn at(mut self, dir: &std::path::Path) -> Self {
        self.cache_dir = Some(dir.to_path_buf());
        self
    }
}

impl From<Error> for Failure {
    fn from(error: Error) -> Self {
        Self {
            error,
            cache_dir: None,
            details: None,
        }
    }
}

impl From<SecurityError> for Failure {
    fn from(error: SecurityError) -> Self {
        Error::from(error).into()
    }
}

/// Result of one launch attempt that got far enough to judge the server
enum Launch {
    Ready {
        report: ProbeReport,
        output: Option<ExecOutput>,
    },
    NeedsAuth {
        variables: Vec<String>,
        stderr_tail: String,
    },
}

/// Resolves, verifies, installs and probes MCP servers
pub struct AutoInstaller {
    config: Arc<Config>,
    registry: Arc<dyn Registry>,
    verifier: Arc<Verifier>,
    cache: CacheManager,
    runner: Arc<dyn ProcessRunner>,
    probe: McpProbe,
    semaphore: Arc<Semaphore>,
    journal_dir: PathBuf,
    tx: Option<EventSender>,
    cancel: CancellationToken,
}

impl EventEmitter for AutoInstaller {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl AutoInstaller {
    /// Build an installer over the given registry and process runner
    ///
    /// # Errors
    ///
    /// Returns an error if the security configuration does not compile.
    pub fn new(
        config: Arc<Config>,
        registry: Arc<dyn Registry>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Result<Self, Error> {
        let verifier = Verifier::from_config(&config.security)?;
        let cache = CacheManager::from_config(&config);
        let journal_dir = cache.root().join(JOURNAL_DIR);
        Ok(Self {
            semaphore: create_semaphore(config.install.max_concurrency),
            verifier: Arc::new(verifier),
            probe: McpProbe::new(),
            registry,
            runner,
            cache,
            journal_dir,
            config,
            tx: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Use a different cache (its root also hosts the journals)
    #[must_use]
    pub fn with_cache(mut self, cache: CacheManager) -> Self {
        self.journal_dir = cache.root().join(JOURNAL_DIR);
        self.cache = match &self.tx {
            Some(tx) => cache.with_event_sender(tx.clone()),
            None => cache,
        };
        self
    }

    #[must_use]
    pub fn with_probe(mut self, probe: McpProbe) -> Self {
        self.probe = probe;
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.cache = self.cache.with_event_sender(tx.clone());
        self.tx = Some(tx);
        self
    }

    /// Cancelling `token` aborts every in-flight request
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    #[must_use]
    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    /// Undo install attempts a previous process left half-done
    ///
    /// # Errors
    ///
    /// Returns an error if the journal directory cannot be read.
    pub async fn recover(&self) -> Result<usize, Error> {
        let recovered = recover_journals(&self.journal_dir).await?;
        for (id, report) in &recovered {
            self.emit(AppEvent::Install(InstallEvent::JournalRecovered {
                transaction_id: id.to_string(),
                removed: report.removed.len(),
            }));
        }
        Ok(recovered.len())
    }

    /// Install the package behind `slug` if needed, start it and list its tools
    ///
    /// Never fails: every error ends up classified in the outcome.
    pub async fn install_and_run(&self, slug: &str, options: InstallOptions) -> InstallOutcome {
        let budget = options.timeout.unwrap_or_else(|| self.config.install.timeout());
        let cancel = self.cancel.child_token();
        let started = Instant::now();

        let result = {
            let pipeline = self.pipeline(slug, &options, &cancel, started);
            tokio::pin!(pipeline);
            tokio::select! {
                result = &mut pipeline => result,
                () = tokio::time::sleep(budget) => {
                    tracing::warn!(slug, ?budget, "request deadline reached, cancelling");
                    cancel.cancel();
                    // let the pipeline roll back before reporting
                    match pipeline.await {
                        Err(failure) if matches!(failure.error, Error::Cancelled) => Err(Failure {
                            error: InstallError::OperationTimeout {
                                message: format!(
                                    "{slug} did not finish within {}ms",
                                    budget.as_millis()
                                ),
                            }
                            .into(),
                            ..failure
                        }),
                        other => other,
                    }
                }
            }
        };

        match result {
            Ok(outcome) => outcome,
            Err(failure) => {
                let classified = failure.error.classify();
                tracing::error!(slug, error = %failure.error, category = %classified.category(), "install_and_run failed");
                self.emit_phase(slug, InstallPhase::Failed);
                self.emit_install_failed(slug, &classified);
                let mut outcome = InstallOutcome::failed(&classified);
                outcome.cache_dir = failure.cache_dir;
                outcome.execution_details = failure.details;
                outcome
            }
        }
    }

    async fn pipeline(
        &self,
        slug: &str,
        options: &InstallOptions,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<InstallOutcome, Failure> {
        let _permit = acquire_semaphore_permit(Arc::clone(&self.semaphore), slug).await?;

        self.emit_phase(slug, InstallPhase::Fetching);
        let (spec, metadata) = self.fetch(slug).await?;

        self.emit_phase(slug, InstallPhase::Verifying);
        let (descriptor, command) = self.resolve(slug, &spec, options, metadata.as_ref())?;

        let (name, version) = descriptor.cache_key();
        let location = self.cache.location(&name, &version);
        let dir = location.package_dir.clone();
        let plan = InstallPlan::new(descriptor, dir.clone(), self.config.install.install_timeout());
        let policy = RetryPolicy::from_config(&self.config.retry);

        // the lease keeps cleanup away until execution is over
        let _lease = self.cache.lease(&name, &version);
        let (cache_hit, install_attempts) = {
            let guard = self.cache.lock(&name, &version).await;
            if self.cache.is_cached_locked(&guard).await? {
                self.emit_phase(slug, InstallPhase::CacheHit);
                (true, 0)
            } else {
                self.emit_phase(slug, InstallPhase::Installing);
                self.cache.init().await?;
                let record = InstallRecord::new(command).with_metadata(metadata.clone());
                let attempts = AtomicU32::new(0);
                let (attempts_ref, plan_ref, guard_ref, record_ref) =
                    (&attempts, &plan, &guard, &record);
                execute_with_retry_notify(
                    &policy,
                    cancel,
                    move |attempt| {
                        attempts_ref.store(attempt, Ordering::Relaxed);
                        self.install_once(slug, plan_ref, guard_ref, record_ref, cancel)
                    },
                    |notice| self.notify_retry(slug, notice),
                )
                .await?;
                (false, attempts.load(Ordering::Relaxed))
            }
        };

        self.emit_phase(slug, InstallPhase::Executing);
        let entry = plan
            .entry_point(metadata.as_ref(), &options.env)
            .await
            .map_err(|e| Failure::from(e).at(&dir))?;
        let mut details = ExecutionDetails {
            command: entry.command.clone(),
            args: entry.args.clone(),
            cache_hit,
            attempts: install_attempts,
            ..ExecutionDetails::default()
        };

        let last_stderr = Mutex::new(String::new());
        let launched = {
            let (entry_ref, stderr_ref) = (&entry, &last_stderr);
            execute_with_retry_notify(
                &policy,
                cancel,
                move |_| self.launch_once(entry_ref, stderr_ref, cancel),
                |notice| self.notify_retry(slug, notice),
            )
            .await
        };
        details.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let launched = match launched {
            Ok(launched) => launched,
            Err(error) => {
                if let Ok(tail) = last_stderr.lock() {
                    details.stderr_tail.clone_from(&tail);
                }
                details.timed_out = error.classify().category() == ErrorCategory::Timeout;
                return Err(Failure {
                    error,
                    cache_dir: Some(dir),
                    details: Some(details),
                });
            }
        };

        match launched {
            Launch::Ready { report, output } => {
                if let Some(output) = &output {
                    details.exit_code = output.code();
                    details.timed_out = output.timed_out();
                    details.stderr_tail = output.stderr_tail();
                }
                details.protocol_version = report.protocol_version;
                details.server_name = report.server_name;
                details.resources_count = report.resources_count;
                details.prompts_count = report.prompts_count;

                let health = if report.tools.len() >= self.config.install.min_tools_for_healthy {
                    HealthTier::Healthy
                } else {
                    HealthTier::Degraded
                };
                self.emit_phase(slug, InstallPhase::Success);
                self.emit(AppEvent::Install(InstallEvent::Completed {
                    slug: slug.to_string(),
                    tools: report.tools.len(),
                    cache_dir: dir.clone(),
                    duration: started.elapsed(),
                }));
                Ok(InstallOutcome::succeeded(report.tools, dir, details, health))
            }
            Launch::NeedsAuth {
                variables,
                stderr_tail,
            } => {
                details.stderr_tail = stderr_tail;
                let error: Error = InstallError::AuthRequired {
                    package: plan.descriptor().full_name(),
                    variables: variables.join(", "),
                }
                .into();
                let classified = error.classify();
                tracing::warn!(slug, ?variables, "package needs credentials");
                self.emit_phase(slug, InstallPhase::Failed);
                self.emit_install_failed(slug, &classified);
                Ok(InstallOutcome::failed(&classified)
                    .with_cache_dir(dir)
                    .with_details(details)
                    .degraded_by_auth(variables))
            }
        }
    }

    fn notify_retry(&self, slug: &str, notice: &RetryNotice<'_>) {
        self.emit_retry(
            slug,
            notice.attempt,
            notice.classified.category(),
            notice.delay,
            notice.classified.message(),
        );
    }

    async fn fetch(&self, slug: &str) -> Result<(InstallSpec, Option<PackageMetadata>), Error> {
        let timeout = self.config.install.registry_timeout();
        let timed_out = || RegistryError::Timeout {
            slug: slug.to_string(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        };

        let spec = tokio::time::timeout(timeout, self.registry.get_install_spec(slug))
            .await
            .map_err(|_| timed_out())??;

        let metadata = match tokio::time::timeout(timeout, self.registry.get_metadata(slug)).await {
            Ok(Ok(metadata)) => metadata,
            Ok(Err(err)) => {
                self.emit_warning_with_context("registry metadata unavailable", err.to_string());
                None
            }
            Err(_) => {
                self.emit_warning_with_context("registry metadata unavailable", timed_out().to_string());
                None
            }
        };
        Ok((spec, metadata))
    }

    /// Pick the install command, parse it and run the security checks
    fn resolve(
        &self,
        slug: &str,
        spec: &InstallSpec,
        options: &InstallOptions,
        metadata: Option<&PackageMetadata>,
    ) -> Result<(PackageDescriptor, String), Failure> {
        let command = match spec.select_command(options.preferred_method.as_deref()) {
            Some(command) if !command.trim().is_empty() => command.to_string(),
            Some(_) => e14z_descriptor::install_command_for(&spec.name),
            None => {
                return Err(Error::from(RegistryError::MethodNotFound {
                    slug: slug.to_string(),
                    method: options.preferred_method.clone().unwrap_or_default(),
                })
                .into())
            }
        };
        let descriptor = e14z_descriptor::parse(&command).map_err(Error::from)?;

        match self.verifier.check(&descriptor, metadata) {
            Ok(result) => {
                self.emit(AppEvent::Security(SecurityEvent::VerificationCompleted {
                    package: descriptor.full_name(),
                    score: result.score(),
                    threats: result.threats().len(),
                    warnings: result.warnings().to_vec(),
                }));
                Ok((descriptor, command))
            }
            Err(err) => {
                let score = match &err {
                    SecurityError::VerificationBlocked { score, .. } => *score,
                    _ => 0,
                };
                self.emit(AppEvent::Security(SecurityEvent::Blocked {
                    package: descriptor.full_name(),
                    score,
                    reason: err.to_string(),
                }));
                Err(err.into())
            }
        }
    }

    /// One install attempt inside its own transaction
    async fn install_once(
        &self,
        slug: &str,
        plan: &InstallPlan,
        guard: &KeyGuard,
        record: &InstallRecord,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let dir = plan.package_dir();
        if fs::try_exists(dir).await.unwrap_or(false) {
            // leftovers of an entry that failed verification
            fs::remove_dir_all(dir)
                .await
                .map_err(|e| Error::io_with_path(&e, dir))?;
        }

        let mut tx =
            InstallationTransaction::begin(&self.journal_dir, guard.name(), guard.version()).await?;
        let result = async {
            tx.record(OperationKind::DirectoryCreated, dir).await?;
            fs::create_dir_all(dir)
                .await
                .map_err(|e| Error::io_with_path(&e, dir))?;
            for step in plan.install_steps() {
                self.run_step(step, cancel).await?;
            }
            for step in plan.follow_up_steps().await {
                self.run_step(step, cancel).await?;
            }
            plan.finalize().await?;
            self.cache.add_locked(guard, record.clone()).await?;
            Ok::<(), Error>(())
        }
        .await;

        match result {
            Ok(()) => tx.commit().await,
            Err(err) => {
                let report = tx.rollback().await;
                self.emit(AppEvent::Install(InstallEvent::RolledBack {
                    slug: slug.to_string(),
                    removed: report.removed.len(),
                    failed: report.failed.len(),
                }));
                if report.is_clean() {
                    Err(err)
                } else {
                    tracing::error!(slug, error = %err, "install failed and rollback was incomplete");
                    Err(InstallError::RollbackIncomplete {
                        package: plan.descriptor().full_name(),
                        failed: report.failed.len(),
                    }
                    .into())
                }
            }
        }
    }

    async fn run_step(&self, step: ExecRequest, cancel: &CancellationToken) -> Result<(), Error> {
        let command_display = step.display();
        tracing::debug!(command = %command_display, "running install step");
        self.runner
            .run(step, cancel.clone())
            .await?
            .check(&command_display)?;
        Ok(())
    }

    /// Start the server, run the MCP handshake and stop it again
    async fn launch_once(
        &self,
        entry: &ExecRequest,
        last_stderr: &Mutex<String>,
        cancel: &CancellationToken,
    ) -> Result<Launch, Error> {
        let mut session = self.runner.spawn(entry.clone(), cancel.clone()).await?;
        let probed = self.probe.probe(session.as_mut()).await;
        let finished = session.finish().await;

        match probed {
            Ok(report) => {
                let output = match finished {
                    Ok(output) => Some(output),
                    Err(err) => {
                        tracing::warn!(command = %entry.command, error = %err, "server did not stop cleanly");
                        None
                    }
                };
                Ok(Launch::Ready { report, output })
            }
            Err(err) => {
                let stderr_tail = finished
                    .as_ref()
                    .map(ExecOutput::stderr_tail)
                    .unwrap_or_default();
                let variables = detect_auth_env_vars(&format!("{stderr_tail}\n{err}"));
                if !variables.is_empty() {
                    return Ok(Launch::NeedsAuth {
                        variables,
                        stderr_tail,
                    });
                }
                if let Ok(mut last) = last_stderr.lock() {
                    *last = stderr_tail;
                }
                Err(err)
            }
        }
    }
}
