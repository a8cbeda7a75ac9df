mod common;

use cadence_conductor::{EventLog, Orchestrator, RetryPolicy, RunError};
use cadence_content::LocalProvider;
use cadence_core::date::parse_date;
use cadence_core::synth;
use cadence_core::{BranchingStrategy, LogLevel, SimulationStatus};
use cadence_host::{HostError, HostOp, MemoryHost};
use common::{config, PauseAfter};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn three_day_run_builds_a_linear_chain() {
    let host = MemoryHost::with_branch("main");
    let root = host.ref_sha("heads/main").unwrap();
    let content = LocalProvider;
    let mut orch = Orchestrator::new(&host, &content);

    let status = orch
        .start(config("2024-01-01", "2024-01-03", 1, 1), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(status, SimulationStatus::Completed);

    let counts: Vec<u32> = orch.plan().iter().map(|d| d.count).collect();
    assert_eq!(counts, vec![1, 1, 1]);
    assert_eq!(orch.stats().unwrap().total_commits, 3);
    assert_eq!(host.count(HostOp::CreateCommit), 3);
    assert_eq!(orch.commits_created(), 3);

    // newest first: Jan 3, Jan 2, Jan 1, root
    let history = host.history("heads/main");
    assert_eq!(history.len(), 4);
    assert_eq!(history[3].sha, root);
    for pair in history.windows(2) {
        assert_eq!(pair[0].parents, vec![pair[1].sha.clone()]);
    }
    for (commit, day) in history[..3].iter().rev().zip(["2024-01-01", "2024-01-02", "2024-01-03"]) {
        let date = parse_date(day).unwrap();
        assert_eq!(commit.date.date(), date);
        assert_eq!(commit.message, synth::plan_message(date, 0));
    }

    let chain = orch.chain().unwrap();
    assert_eq!(Some(chain.head_commit_sha.clone()), host.ref_sha("heads/main"));
    assert_eq!(chain.base_tree_sha, history[0].tree);
    assert!(orch.logs().iter().any(|e| e.message.starts_with("[3/3] 2024-01-03")));
}

#[tokio::test]
async fn every_commit_is_parented_on_the_previous_head() {
    let host = MemoryHost::with_branch("main");
    let content = LocalProvider;
    let mut orch = Orchestrator::new(&host, &content);
    orch.start(config("2024-01-01", "2024-01-07", 1, 4), CancellationToken::new())
        .await
        .unwrap();

    let planned = orch.plan().total_commits() as usize;
    let history = host.history("heads/main");
    assert_eq!(history.len(), planned + 1);
    assert_eq!(host.commit_count(), planned + 1);
    assert!(history.windows(2).all(|w| w[0].parents == vec![w[1].sha.clone()]));
    // commit dates never go backwards along the chain
    assert!(history[..planned].windows(2).all(|w| w[0].date >= w[1].date));

    let last_day = orch.plan().days.iter().rev().find(|d| d.count > 0).unwrap();
    let files = host.tree_files(&history[0].tree);
    let activity = &files[&format!("activity/{}.md", cadence_core::date::format_date(last_day.date))];
    assert_eq!(
        activity.lines().filter(|l| l.starts_with("- ")).count(),
        last_day.count as usize
    );
}

#[tokio::test]
async fn failed_tree_leaves_branch_at_previous_commit() {
    let host = MemoryHost::with_branch("main");
    host.fail_nth(
        HostOp::CreateTree,
        2,
        HostError::status(HostOp::CreateTree, 502, "Bad Gateway"),
    );
    let content = LocalProvider;
    let mut orch = Orchestrator::new(&host, &content);

    let err = orch
        .start(config("2024-01-01", "2024-01-03", 1, 1), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.host_op(), Some(HostOp::CreateTree));
    assert_eq!(orch.status(), SimulationStatus::Error);

    let first = host.history("heads/main")[0].clone();
    assert_eq!(first.date.date(), parse_date("2024-01-01").unwrap());
    assert_eq!(orch.chain().unwrap().head_commit_sha, first.sha);
    assert_eq!(host.count(HostOp::CreateTree), 2);
    assert_eq!(host.count(HostOp::CreateCommit), 1);

    let last = orch.logs().last().unwrap();
    assert_eq!(last.level, LogLevel::Error);
    let details = last.details.as_deref().unwrap();
    assert!(details.contains("createTree") && details.contains("502") && details.contains("2024-01-02"));

    let err = orch.resume(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, RunError::NotResumable(SimulationStatus::Error)));
}

#[tokio::test]
async fn blob_failure_aborts_before_any_tree_call() {
    let host = MemoryHost::with_branch("main");
    host.fail_nth(
        HostOp::CreateBlob,
        2,
        HostError::unavailable(HostOp::CreateBlob, "timed out"),
    );
    let content = LocalProvider;
    let mut orch = Orchestrator::new(&host, &content);
    let err = orch
        .start(config("2024-01-01", "2024-01-03", 1, 1), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.host_op(), Some(HostOp::CreateBlob));
    assert_eq!(host.count(HostOp::CreateTree), 1);
    assert_eq!(host.history("heads/main").len(), 2);
}

#[tokio::test]
async fn lost_ref_update_response_is_confirmed_by_reading_the_ref() {
    let host = MemoryHost::with_branch("main");
    host.lose_response_nth(HostOp::UpdateRef, 2);
    let content = LocalProvider;
    let mut orch = Orchestrator::new(&host, &content);

    let status = orch
        .start(config("2024-01-01", "2024-01-03", 1, 1), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(status, SimulationStatus::Completed);
    assert_eq!(host.history("heads/main").len(), 4);
    // initial resolve + the confirmation read
    assert_eq!(host.count(HostOp::GetRef), 2);
    assert_eq!(host.count(HostOp::UpdateRef), 3);
    assert!(orch
        .logs()
        .iter()
        .any(|e| e.level == LogLevel::Warning && e.message.contains("unacknowledged")));
}

#[tokio::test]
async fn rejected_ref_update_does_not_advance_the_chain() {
    let host = MemoryHost::with_branch("main");
    host.fail_nth(
        HostOp::UpdateRef,
        2,
        HostError::status(HostOp::UpdateRef, 500, "Internal Server Error"),
    );
    let content = LocalProvider;
    let mut orch = Orchestrator::new(&host, &content);

    let err = orch
        .start(config("2024-01-01", "2024-01-03", 1, 1), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.host_op(), Some(HostOp::UpdateRef));
    let head = host.ref_sha("heads/main").unwrap();
    assert_eq!(orch.chain().unwrap().head_commit_sha, head);
    assert_eq!(host.history("heads/main").len(), 2);
    // the second commit exists but is unreachable
    assert_eq!(host.count(HostOp::CreateCommit), 2);
    assert_eq!(host.commit_count(), 3);
    assert_eq!(orch.commits_created(), 1);
}

#[tokio::test]
async fn pause_and_resume_cover_the_remaining_commits() {
    let host = MemoryHost::with_branch("main");
    let content = LocalProvider;
    let first = CancellationToken::new();
    let pausing = PauseAfter::new(&host, 4, first.clone());
    let mut orch = Orchestrator::new(&pausing, &content);

    let status = orch
        .start(config("2024-01-01", "2024-01-05", 2, 2), first)
        .await
        .unwrap();
    assert_eq!(status, SimulationStatus::Paused);
    assert_eq!(orch.commits_created(), 4);
    assert_eq!(orch.cursor().day, 2);
    assert_eq!(orch.cursor().commit, 0);
    assert_eq!(host.history("heads/main").len(), 5);
    assert_eq!(
        orch.chain().unwrap().head_commit_sha,
        host.ref_sha("heads/main").unwrap()
    );

    let status = orch.resume(CancellationToken::new()).await.unwrap();
    assert_eq!(status, SimulationStatus::Completed);
    assert_eq!(orch.commits_created(), 10);
    assert_eq!(host.count(HostOp::CreateCommit), 10);

    let history = host.history("heads/main");
    assert_eq!(history.len(), 11);
    assert!(history.windows(2).all(|w| w[0].parents == vec![w[1].sha.clone()]));
    for day in ["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-04", "2024-01-05"] {
        let date = parse_date(day).unwrap();
        let on_day: Vec<_> = history[..10].iter().filter(|c| c.date.date() == date).collect();
        assert_eq!(on_day.len(), 2, "{day}");
        assert_ne!(on_day[0].date, on_day[1].date);
    }

    let statuses: Vec<&str> = orch
        .logs()
        .iter()
        .filter(|e| e.message.starts_with("Paused") || e.message.starts_with("Simulation"))
        .map(|e| e.message.as_str())
        .collect();
    assert_eq!(
        statuses,
        vec![
            "Simulation started",
            "Paused before commit 1/2 of 2024-01-03 (4 commits so far)",
            "Simulation resumed",
            "Simulation complete",
        ]
    );
}

#[tokio::test]
async fn cancelled_before_start_pauses_at_first_commit() {
    let host = MemoryHost::with_branch("main");
    let content = LocalProvider;
    let mut orch = Orchestrator::new(&host, &content);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let status = orch
        .start(config("2024-01-01", "2024-01-02", 1, 1), cancel)
        .await
        .unwrap();
    assert_eq!(status, SimulationStatus::Paused);
    assert_eq!(host.count(HostOp::CreateTree), 0);

    let status = orch.resume(CancellationToken::new()).await.unwrap();
    assert_eq!(status, SimulationStatus::Completed);
    assert_eq!(host.history("heads/main").len(), 3);
}

#[tokio::test]
async fn invalid_configs_fail_before_any_remote_call() {
    let mut after_end = config("2024-01-05", "2024-01-01", 1, 1);
    after_end.seed = None;
    let mut negative = config("2024-01-01", "2024-01-05", 1, 1);
    negative.min_commits_per_day = -1;
    let mut too_intense = config("2024-01-01", "2024-01-05", 1, 1);
    too_intense.weekend_intensity = 1.5;

    for cfg in [after_end, negative, too_intense] {
        let host = MemoryHost::with_branch("main");
        let content = LocalProvider;
        let mut orch = Orchestrator::new(&host, &content);
        let err = orch.start(cfg, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, RunError::InvalidConfig(_)), "{err}");
        assert_eq!(orch.status(), SimulationStatus::Error);
        assert!(host.calls().is_empty());
        assert!(orch.plan().is_empty());
        assert_eq!(orch.logs().len(), 1);
        assert_eq!(orch.logs()[0].level, LogLevel::Error);
    }
}

#[tokio::test]
async fn missing_repository_is_created_when_configured() {
    let host = MemoryHost::new();
    let content = LocalProvider;
    let mut cfg = config("2024-01-01", "2024-01-02", 1, 1);
    cfg.auto_create_repo = true;

    let mut orch = Orchestrator::new(&host, &content);
    let status = orch.start(cfg, CancellationToken::new()).await.unwrap();
    assert_eq!(status, SimulationStatus::Completed);
    assert!(host.repo_created());
    assert_eq!(
        host.calls()[..4],
        [HostOp::RepoExists, HostOp::CreateRepo, HostOp::GetRef, HostOp::GetCommit]
    );
    assert_eq!(host.history("heads/main").len(), 3);
}

#[tokio::test]
async fn transient_read_failures_are_retried() {
    let host = MemoryHost::with_branch("main");
    host.fail_nth(
        HostOp::GetRef,
        1,
        HostError::status(HostOp::GetRef, 409, "Git Repository is empty."),
    );
    let content = LocalProvider;
    let mut orch = Orchestrator::new(&host, &content);
    let status = orch
        .start(config("2024-01-01", "2024-01-01", 1, 1), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(status, SimulationStatus::Completed);
    assert_eq!(host.count(HostOp::GetRef), 2);

    // with retries disabled the same fault is fatal
    let host = MemoryHost::with_branch("main");
    host.fail_nth(
        HostOp::GetRef,
        1,
        HostError::status(HostOp::GetRef, 409, "Git Repository is empty."),
    );
    let mut orch = Orchestrator::new(&host, &content).with_retry(RetryPolicy::none());
    let err = orch
        .start(config("2024-01-01", "2024-01-01", 1, 1), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.host_op(), Some(HostOp::GetRef));
    assert_eq!(host.count(HostOp::CreateTree), 0);
}

#[tokio::test]
async fn gitflow_pull_requests_merge_and_main_is_reread() {
    let host = MemoryHost::with_branch("main");
    let content = LocalProvider;
    let mut cfg = config("2024-01-01", "2024-01-02", 1, 1);
    cfg.simulate_prs = true;
    cfg.branching_strategy = BranchingStrategy::Gitflow;
    cfg.pr_probability = 1.0;
    cfg.pr_commits = 2;

    let mut orch = Orchestrator::new(&host, &content);
    let status = orch.start(cfg, CancellationToken::new()).await.unwrap();
    assert_eq!(status, SimulationStatus::Completed);

    let pulls = host.pulls();
    assert_eq!(pulls.len(), 2);
    assert!(pulls.iter().all(|p| p.merged && p.base == "main"));
    assert!(pulls.iter().all(|p| p.head.starts_with("feature/")));

    // newest first: merge #2, Jan 2, merge #1, Jan 1, root
    let history = host.history("heads/main");
    assert_eq!(history.len(), 5);
    assert!(history[2].message.ends_with("(#1)"));
    assert_eq!(history[1].parents, vec![history[2].sha.clone()]);
    assert!(history[0].message.ends_with("(#2)"));
    assert_eq!(orch.chain().unwrap().head_commit_sha, history[0].sha);

    // 2 planned + 2×2 feature commits
    assert_eq!(host.count(HostOp::CreateCommit), 6);
    assert_eq!(orch.commits_created(), 2);
    let merged_files = host.tree_files(&history[0].tree);
    assert!(merged_files.keys().any(|p| p.starts_with("notes/2024-01-02-")));
    assert!(merged_files.contains_key("activity/2024-01-02.md"));
}

#[tokio::test]
async fn pull_request_failure_stops_the_run() {
    let host = MemoryHost::with_branch("main");
    host.fail_nth(
        HostOp::MergePullRequest,
        1,
        HostError::status(HostOp::MergePullRequest, 405, "Pull Request is not mergeable"),
    );
    let content = LocalProvider;
    let mut cfg = config("2024-01-01", "2024-01-02", 1, 1);
    cfg.simulate_prs = true;
    cfg.branching_strategy = BranchingStrategy::Gitflow;
    cfg.pr_probability = 1.0;

    let mut orch = Orchestrator::new(&host, &content);
    let err = orch.start(cfg, CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.host_op(), Some(HostOp::MergePullRequest));
    assert_eq!(orch.status(), SimulationStatus::Error);
    assert_eq!(orch.commits_created(), 1);
    assert_eq!(
        orch.chain().unwrap().head_commit_sha,
        host.ref_sha("heads/main").unwrap()
    );
}

#[tokio::test]
async fn weekend_days_are_scaled() {
    let host = MemoryHost::with_branch("main");
    let content = LocalProvider;
    // Friday to Sunday
    let mut cfg = config("2024-01-05", "2024-01-07", 10, 10);
    cfg.weekend_intensity = 0.5;

    let mut orch = Orchestrator::new(&host, &content);
    orch.start(cfg, CancellationToken::new()).await.unwrap();
    let counts: Vec<u32> = orch.plan().iter().map(|d| d.count).collect();
    assert_eq!(counts, vec![10, 5, 5]);
    assert_eq!(host.count(HostOp::CreateCommit), 20);
}

#[tokio::test]
async fn run_log_is_mirrored_to_jsonl() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let host = MemoryHost::with_branch("main");
    let content = LocalProvider;
    let mut orch =
        Orchestrator::new(&host, &content).with_event_log(EventLog::new().with_jsonl(&path));
    orch.start(config("2024-01-01", "2024-01-02", 1, 1), CancellationToken::new())
        .await
        .unwrap();

    let lines = std::fs::read_to_string(&path).unwrap();
    assert_eq!(lines.lines().count(), orch.logs().len());
    let last: serde_json::Value = serde_json::from_str(lines.lines().last().unwrap()).unwrap();
    assert_eq!(last["level"], "success");
    assert_eq!(last["message"], "Simulation complete");
}

#[tokio::test]
async fn rerun_over_the_same_dates_opens_fresh_branches() {
    let host = MemoryHost::with_branch("main");
    let content = LocalProvider;
    let gitflow = || {
        let mut cfg = config("2024-01-01", "2024-01-02", 1, 1);
        cfg.simulate_prs = true;
        cfg.branching_strategy = BranchingStrategy::Gitflow;
        cfg.pr_probability = 1.0;
        cfg
    };

    let mut first = Orchestrator::new(&host, &content);
    assert_eq!(
        first.start(gitflow(), CancellationToken::new()).await.unwrap(),
        SimulationStatus::Completed
    );
    let mut second = Orchestrator::new(&host, &content);
    assert_ne!(first.run_id(), second.run_id());
    assert_eq!(
        second.start(gitflow(), CancellationToken::new()).await.unwrap(),
        SimulationStatus::Completed
    );

    let pulls = host.pulls();
    assert_eq!(pulls.len(), 4);
    assert!(pulls.iter().all(|p| p.merged));
    let mut heads: Vec<&str> = pulls.iter().map(|p| p.head.as_str()).collect();
    heads.sort();
    heads.dedup();
    assert_eq!(heads.len(), 4);
    assert_eq!(
        second.chain().unwrap().head_commit_sha,
        host.ref_sha("heads/main").unwrap()
    );
}

#[tokio::test]
async fn oversized_cost_estimate_still_runs() {
    let host = MemoryHost::with_branch("main");
    let content = LocalProvider;
    let mut cfg = config("2024-01-01", "2024-01-02", 1, 1);
    cfg.per_commit_cost_secs = 1e300;

    let mut orch = Orchestrator::new(&host, &content);
    let status = orch.start(cfg, CancellationToken::new()).await.unwrap();
    assert_eq!(status, SimulationStatus::Completed);
    assert_eq!(orch.stats().unwrap().estimated_duration(), std::time::Duration::MAX);
    assert_eq!(orch.commits_created(), 2);
}
