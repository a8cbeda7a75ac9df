//! The run state machine.
//!
//! `start` plans, verifies the repository and resolves the branch head, then
//! advances the branch one commit at a time: tree, commit, ref update, and
//! only then the in-memory head. Remote mutations are strictly sequential.
//! Cancellation is observed between commits, never inside one.

use crate::error::RunError;
use crate::plan::generator::{compute_stats, generate_plan_seeded};
use crate::runner::event_log::EventLog;
use crate::runner::files;
use crate::runner::retry::RetryPolicy;
use crate::state::chain::{short_sha, GitChainState};
use crate::state::machine::{is_valid_transition, transition, Cursor};
use cadence_content::{ContentProvider, Generated};
use cadence_core::date::format_date;
use cadence_core::{
    synth, CommitPlan, DayPlan, LogEntry, SimulationConfig, SimulationStats, SimulationStatus,
};
use cadence_host::{branch_ref, GitFile, GitHost, HostError};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

const REPO_DESCRIPTION: &str = "Activity sandbox";

/// State that only exists once the branch head has been resolved.
struct Active {
    config: SimulationConfig,
    chain: GitChainState,
}

pub struct Orchestrator<'a> {
    host: &'a dyn GitHost,
    content: &'a dyn ContentProvider,
    retry: Option<RetryPolicy>,
    log: EventLog,
    status: SimulationStatus,
    plan: CommitPlan,
    stats: Option<SimulationStats>,
    active: Option<Active>,
    cursor: Cursor,
    commits_created: u64,
    /// Messages already committed on the cursor's day.
    day_messages: Vec<String>,
    run_id: String,
}

impl<'a> Orchestrator<'a> {
    pub fn new(host: &'a dyn GitHost, content: &'a dyn ContentProvider) -> Self {
        Self {
            host,
            content,
            retry: None,
            log: EventLog::new(),
            status: SimulationStatus::Idle,
            plan: CommitPlan::default(),
            stats: None,
            active: None,
            cursor: Cursor::default(),
            commits_created: 0,
            day_messages: Vec::new(),
            run_id: ulid::Ulid::new().to_string(),
        }
    }

    /// Override the read retry policy taken from the config's host settings.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_event_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    pub fn plan(&self) -> &CommitPlan {
        &self.plan
    }

    pub fn stats(&self) -> Option<SimulationStats> {
        self.stats
    }

    pub fn logs(&self) -> &[LogEntry] {
        self.log.entries()
    }

    /// The target branch head as last confirmed.
    pub fn chain(&self) -> Option<&GitChainState> {
        self.active.as_ref().map(|a| &a.chain)
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Planned commits that have landed on the target branch.
    pub fn commits_created(&self) -> u64 {
        self.commits_created
    }

    /// Identifies this run in the names of the branches it creates.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry.unwrap_or_default()
    }

    // ── Control ──

    /// Plan, prepare the repository and run until completion, pause or failure.
    ///
    /// Returns the status the run stopped in. On `Err` the status is `ERROR`,
    /// except for a refused transition, which leaves it untouched. A config
    /// that fails validation moves IDLE straight to ERROR.
    pub async fn start(
        &mut self,
        config: SimulationConfig,
        cancel: CancellationToken,
    ) -> Result<SimulationStatus, RunError> {
        if !is_valid_transition(self.status, SimulationStatus::Planning) {
            return Err(RunError::InvalidTransition {
                from: self.status,
                to: SimulationStatus::Planning,
            });
        }
        // An invalid config never reaches PLANNING.
        if let Err(e) = config.validate() {
            return Err(self.fail(e.into()));
        }
        transition(&mut self.status, SimulationStatus::Planning)?;
        if self.retry.is_none() {
            self.retry = Some(RetryPolicy::from_settings(&config.host));
        }
        self.log.info(format!(
            "Planning {} from {} to {}",
            config.full_name(),
            format_date(config.start_date),
            format_date(config.end_date)
        ));

        let plan = match generate_plan_seeded(&config) {
            Ok(plan) => plan,
            Err(e) => return Err(self.fail(e.into())),
        };
        let stats = compute_stats(&plan, config.per_commit_cost_secs);
        self.log.info(format!(
            "Plan ready: {} commits over {} days, about {}",
            stats.total_commits,
            stats.total_days,
            stats.duration_label()
        ));
        self.plan = plan;
        self.stats = Some(stats);

        let chain = match self.prepare(&config).await {
            Ok(chain) => chain,
            Err(e) => return Err(self.fail(e)),
        };
        self.active = Some(Active { config, chain });

        transition(&mut self.status, SimulationStatus::Running)?;
        self.log.info("Simulation started");
        self.drive(cancel).await
    }

    /// Continue a paused run from its cursor.
    pub async fn resume(&mut self, cancel: CancellationToken) -> Result<SimulationStatus, RunError> {
        if self.status != SimulationStatus::Paused {
            return Err(RunError::NotResumable(self.status));
        }
        transition(&mut self.status, SimulationStatus::Running)?;
        self.log.info("Simulation resumed");
        self.drive(cancel).await
    }

    fn fail(&mut self, err: RunError) -> RunError {
        tracing::error!(status = %self.status, error = %err, "run failed");
        self.log.error("Simulation failed", err.to_string());
        if let Err(refused) = transition(&mut self.status, SimulationStatus::Error) {
            // Only a terminal status refuses ERROR; keep it and report the original failure.
            tracing::warn!(error = %refused, "run already finished, status left unchanged");
        }
        err
    }

    fn pause(&mut self, day: &DayPlan) -> Result<SimulationStatus, RunError> {
        transition(&mut self.status, SimulationStatus::Paused)?;
        let date = format_date(day.date);
        let position = if self.cursor.commit < day.count {
            format!("before commit {}/{} of {date}", self.cursor.commit + 1, day.count)
        } else {
            format!("before the issue/pull request of {date}")
        };
        self.log.info(format!(
            "Paused {position} ({} commits so far)",
            self.commits_created
        ));
        Ok(SimulationStatus::Paused)
    }

    // ── Run loop ──

    async fn drive(&mut self, cancel: CancellationToken) -> Result<SimulationStatus, RunError> {
        let Some(mut active) = self.active.take() else {
            return Err(RunError::NotResumable(self.status));
        };
        let result = self.advance(&mut active, &cancel).await;
        self.active = Some(active);
        match result {
            Ok(status) => Ok(status),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn advance(
        &mut self,
        active: &mut Active,
        cancel: &CancellationToken,
    ) -> Result<SimulationStatus, RunError> {
        while self.cursor.day < self.plan.len() {
            let day = self.plan.days[self.cursor.day].clone();

            while self.cursor.commit < day.count {
                if cancel.is_cancelled() {
                    return self.pause(&day);
                }
                self.commit_planned(active, &day).await?;
            }

            if day.open_issue || day.open_pull_request {
                if cancel.is_cancelled() {
                    return self.pause(&day);
                }
                if day.open_issue {
                    self.open_issue(active, &day).await;
                }
                if day.open_pull_request {
                    self.run_pull_request(active, &day).await?;
                }
            }

            self.cursor.next_day();
            self.day_messages.clear();
        }

        transition(&mut self.status, SimulationStatus::Completed)?;
        self.log.success(
            "Simulation complete",
            format!(
                "{} commits, {} at {}",
                self.commits_created,
                active.chain.branch_ref,
                active.chain.short_head()
            ),
        );
        Ok(SimulationStatus::Completed)
    }

    async fn commit_planned(&mut self, active: &mut Active, day: &DayPlan) -> Result<(), RunError> {
        let config = &active.config;
        let index = self.cursor.commit;
        let date = format_date(day.date);
        let seed = format!("{date}#{index}");
        let planned = day
            .messages
            .get(index as usize)
            .cloned()
            .unwrap_or_else(|| synth::plan_message(day.date, index));

        let message = if config.use_ai {
            let context = format!("{} on {date}, something like \"{planned}\"", config.repo);
            let generated = self.content.commit_message(&context).await;
            self.settle("commit message", generated)
        } else {
            planned
        };

        let mut listed = self.day_messages.clone();
        listed.push(message.clone());
        let mut files = vec![GitFile::new(
            files::activity_path(day.date),
            files::activity_content(day.date, &listed),
        )];
        if config.use_ai && synth::fraction(&format!("{seed}/snippet")) < config.snippet_rate {
            let path = synth::snippet_path(&seed, &message);
            let generated = self.content.code_snippet(&path).await;
            let code = self.settle("code snippet", generated);
            files.push(GitFile::new(path, code));
        }
        let co_authors = co_authors_for(config, &seed);
        let when = files::commit_time(day.date, index, day.count);

        let context = format!("commit {}/{} of {date}", index + 1, day.count);
        let (commit, tree) = self
            .write_commit(&active.chain, &files, &message, when, &co_authors, &context)
            .await?;
        active.chain.advance(commit, tree);

        self.cursor.next_commit();
        self.commits_created += 1;
        self.day_messages.push(message.clone());
        let total = self.stats.map(|s| s.total_commits).unwrap_or_default();
        self.log.success(
            format!("[{}/{total}] {date} {message}", self.commits_created),
            format!("{} on {}", active.chain.short_head(), active.chain.branch_ref),
        );
        Ok(())
    }

    /// Issues are not part of the chain: a failure is logged and the run goes on.
    async fn open_issue(&mut self, active: &Active, day: &DayPlan) {
        let date = format_date(day.date);
        let topic = synth::issue_topic(&format!("{}/{date}/issue", active.config.repo));
        let generated = self.content.issue_content(&topic).await;
        let issue = self.settle("issue text", generated);
        let labels = vec![synth::issue_label(&topic).to_string()];

        let host = self.host;
        let created = host.create_issue(&issue.title, &issue.body, &labels).await;
        match created {
            Ok(number) => self.log.success(
                format!("Opened issue #{number}: {}", issue.title),
                format!("{date}, labelled {}", labels.join(", ")),
            ),
            Err(e) => {
                tracing::warn!(date = %date, error = %e, "issue not created");
                self.log
                    .warning(format!("Could not open the issue for {date}"), e.to_string());
            }
        }
    }

    /// Branch off the target head, commit to the branch, open a pull request,
    /// merge it, then re-read the target head the merge produced.
    async fn run_pull_request(&mut self, active: &mut Active, day: &DayPlan) -> Result<(), RunError> {
        let host = self.host;
        let date = format_date(day.date);
        let config = &active.config;
        let branch = files::feature_branch(day.date, &config.repo, &self.run_id);
        let feature_ref = branch_ref(&branch);
        let context = format!("pull request of {date}");

        host.create_ref(&feature_ref, &active.chain.head_commit_sha)
            .await
            .map_err(|e| RunError::host(&context, e))?;
        self.log.info(format!(
            "Created branch {branch} at {}",
            active.chain.short_head()
        ));

        let mut feature = active.chain.fork(&feature_ref);
        let steps = config.pr_commits;
        let mut messages: Vec<String> = Vec::new();
        for i in 0..steps {
            let message = if config.use_ai {
                let context = format!("feature work on {branch}, step {} of {steps}", i + 1);
                let generated = self.content.commit_message(&context).await;
                self.settle("commit message", generated)
            } else {
                synth::commit_message(&format!("{branch}#{i}"))
            };
            messages.push(message.clone());
            let notes = [GitFile::new(
                files::feature_notes_path(&branch),
                files::feature_notes(&branch, &messages),
            )];
            let when = files::feature_commit_time(day.date, i, steps);
            let step = format!("commit {}/{steps} on {branch}", i + 1);
            let (commit, tree) = self
                .write_commit(&feature, &notes, &message, when, &[], &step)
                .await?;
            feature.advance(commit, tree);
            self.log
                .success(format!("{branch}: {message}"), feature.short_head().to_string());
        }

        let title = messages
            .first()
            .cloned()
            .unwrap_or_else(|| format!("Work from {date}"));
        let body = pull_request_body(&date, &messages);
        let number = host
            .create_pull_request(&title, &branch, &config.branch, &body)
            .await
            .map_err(|e| RunError::host(&context, e))?;
        self.log.success(
            format!("Opened pull request #{number}: {title}"),
            format!("{branch} → {}", config.branch),
        );

        host.merge_pull_request(number)
            .await
            .map_err(|e| RunError::host(&context, e))?;

        // The merge moved the target branch on the host's side.
        let target = config.branch_ref();
        active.chain = self
            .resolve_chain(&target)
            .await
            .map_err(|e| RunError::host(format!("re-reading {target} after #{number}"), e))?;
        self.log.success(
            format!("Merged pull request #{number}"),
            format!("{target} now at {}", active.chain.short_head()),
        );
        Ok(())
    }

    // ── Remote steps ──

    async fn prepare(&mut self, config: &SimulationConfig) -> Result<GitChainState, RunError> {
        let host = self.host;
        let retry = self.retry_policy();

        let exists = retry
            .run(move || host.repo_exists())
            .await
            .map_err(|e| RunError::host(format!("checking {}", config.full_name()), e))?;
        if !exists {
            if !config.auto_create_repo {
                return Err(RunError::RepositoryMissing(config.full_name()));
            }
            let name = host
                .create_repo(REPO_DESCRIPTION)
                .await
                .map_err(|e| RunError::host(format!("creating {}", config.full_name()), e))?;
            self.log
                .success(format!("Created repository {name}"), "public, with an initial README");
        }

        let target = config.branch_ref();
        let chain = self
            .resolve_chain(&target)
            .await
            .map_err(|e| RunError::host(format!("resolving {target}"), e))?;
        self.log.info(format!("{target} is at {}", chain.short_head()));
        Ok(chain)
    }

    async fn resolve_chain(&self, git_ref: &str) -> Result<GitChainState, HostError> {
        let host = self.host;
        let retry = self.retry_policy();
        let head = retry.run(move || host.get_ref(git_ref)).await?;
        let head_sha = head.as_str();
        let tree = retry.run(move || host.get_commit(head_sha)).await?;
        Ok(GitChainState::new(git_ref, head, tree))
    }

    /// Create tree and commit on top of `chain`, then move its ref. Returns
    /// `(commit, tree)`; the caller advances the chain.
    async fn write_commit(
        &mut self,
        chain: &GitChainState,
        files: &[GitFile],
        message: &str,
        when: OffsetDateTime,
        co_authors: &[String],
        context: &str,
    ) -> Result<(String, String), RunError> {
        let host = self.host;
        let tree = host
            .create_tree(&chain.base_tree_sha, files)
            .await
            .map_err(|e| RunError::host(context, e))?;
        let commit = host
            .create_commit(message, &tree, &chain.head_commit_sha, when, co_authors)
            .await
            .map_err(|e| RunError::host(context, e))?;
        self.update_ref_confirmed(chain, &commit, context).await?;
        Ok((commit, tree))
    }

    /// A transport failure on the ref update says nothing about whether it
    /// applied, so the ref is read back to find out.
    async fn update_ref_confirmed(
        &mut self,
        chain: &GitChainState,
        commit: &str,
        context: &str,
    ) -> Result<(), RunError> {
        let host = self.host;
        let git_ref = chain.branch_ref.as_str();
        let err = match host.update_ref(git_ref, commit).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        if !err.is_retryable() {
            return Err(RunError::host(context, err));
        }

        let observed = self
            .retry_policy()
            .run(move || host.get_ref(git_ref))
            .await
            .map_err(|e| RunError::host(context, e))?;
        if observed == commit {
            self.log.warning(
                format!("Ref update unacknowledged, confirmed {git_ref} at {}", short_sha(commit)),
                err.to_string(),
            );
            Ok(())
        } else if observed == chain.head_commit_sha {
            Err(RunError::host(context, err))
        } else {
            Err(RunError::RefDiverged {
                git_ref: git_ref.to_string(),
                expected: commit.to_string(),
                observed,
            })
        }
    }

    fn settle<T>(&mut self, what: &str, generated: Generated<T>) -> T {
        if let Some(reason) = generated.fallback {
            tracing::warn!(what, %reason, "content provider fell back");
            self.log.warning(format!("Using fallback {what}"), reason);
        }
        generated.value
    }
}

fn co_authors_for(config: &SimulationConfig, seed: &str) -> Vec<String> {
    if config.co_authors.is_empty()
        || synth::fraction(&format!("{seed}/co-author")) >= config.co_author_rate
    {
        return Vec::new();
    }
    let pick = synth::index(seed, config.co_authors.len());
    vec![config.co_authors[pick].clone()]
}

fn pull_request_body(date: &str, messages: &[String]) -> String {
    let mut body = format!("Feature work from {date}.\n\n");
    for msg in messages {
        body.push_str("- ");
        body.push_str(msg);
        body.push('\n');
    }
    body
}
