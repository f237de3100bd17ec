//! Setup-phase integration tests: fetch, install, coordinate.
//!
//! Every external tool is scripted through `common::ScriptedRunner`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::ScriptedRunner;
use lampkit_core::{FailureReason, RepositoryDescriptor, SetupStatus};
use lampkit_detector::NodeTool;
use lampkit_setup::install::BUILD_MARKER;
use lampkit_setup::{
    Coordinator, Credential, FetchError, FetchOutcome, Fetcher, InstallStage, Installer,
    SetupContext,
};
use tempfile::TempDir;

fn ctx(root: &std::path::Path) -> SetupContext {
    SetupContext {
        projects_root: root.to_path_buf(),
        fetcher: Fetcher::default(),
        installer: Installer::default(),
        credential: None,
        stagger: Duration::ZERO,
    }
}

fn descriptors(repos: &[&str]) -> Vec<RepositoryDescriptor> {
    repos
        .iter()
        .enumerate()
        .map(|(i, repo)| RepositoryDescriptor::new("acme", *repo, "/projects").with_index(i))
        .collect()
}

// ---------------------------------------------------------------------------
// 1. Coordinator
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_result_per_entry_in_input_order() {
    let root = TempDir::new().expect("root");
    let runner = Arc::new(ScriptedRunner::new());
    let repos = ["web", "api", "admin", "worker", "docs"];

    let results = Coordinator::new(ctx(root.path()), runner.clone())
        .run(descriptors(&repos))
        .await;

    assert_eq!(results.len(), repos.len());
    for (result, repo) in results.iter().zip(repos) {
        assert_eq!(result.descriptor.repo, repo);
        assert_eq!(result.status, SetupStatus::Succeeded);
        assert!(root.path().join("projects").join(repo).is_dir());
    }
    assert_eq!(runner.calls_for("git"), repos.len());
}

#[tokio::test]
async fn invalid_entry_fails_alone() {
    let root = TempDir::new().expect("root");
    let runner = Arc::new(ScriptedRunner::new());
    let manifest = vec![
        RepositoryDescriptor::new("acme", "api", "/projects"),
        RepositoryDescriptor::new("", "nameless", "/projects").with_index(1),
        RepositoryDescriptor::new("acme", "web", "/projects").with_index(2),
    ];

    let results = Coordinator::new(ctx(root.path()), runner.clone())
        .run(manifest)
        .await;

    assert_eq!(results[0].status, SetupStatus::Succeeded);
    assert_eq!(
        results[1].status,
        SetupStatus::Failed(FailureReason::InvalidDescriptor)
    );
    assert_eq!(results[2].status, SetupStatus::Succeeded);
    assert!(!root.path().join("projects").join("nameless").exists());
    assert!(runner.calls().iter().all(|c| !c.contains("nameless")));
}

#[tokio::test]
async fn install_failure_is_isolated() {
    let repos = ["web", "api", "admin"];

    let baseline = {
        let root = TempDir::new().expect("root");
        let runner = Arc::new(ScriptedRunner::new());
        for repo in repos {
            runner.seed(repo, &[("package.json", "{}")]);
        }
        Coordinator::new(ctx(root.path()), runner)
            .run(descriptors(&repos))
            .await
    };

    let root = TempDir::new().expect("root");
    let runner = Arc::new(ScriptedRunner::new());
    for repo in repos {
        runner.seed(repo, &[("package.json", "{}")]);
    }
    runner.fail("api", "npm");
    let results = Coordinator::new(ctx(root.path()), runner)
        .run(descriptors(&repos))
        .await;

    assert_eq!(
        results[1].status,
        SetupStatus::Failed(FailureReason::DependencyInstallFailed)
    );
    assert!(results[1].detail.as_deref().unwrap_or_default().contains("node:npm"));
    for i in [0, 2] {
        assert_eq!(results[i].status, baseline[i].status);
        assert_eq!(results[i].status, SetupStatus::Succeeded);
    }
}

#[tokio::test]
async fn clone_failure_skips_install() {
    let root = TempDir::new().expect("root");
    let runner = Arc::new(ScriptedRunner::new());
    runner.seed("api", &[("composer.json", "{}")]);
    runner.fail("api", "git");

    let results = Coordinator::new(ctx(root.path()), runner.clone())
        .run(descriptors(&["api"]))
        .await;

    assert_eq!(
        results[0].status,
        SetupStatus::Failed(FailureReason::CloneFailed)
    );
    assert_eq!(runner.calls_for("composer"), 0);
}

#[tokio::test]
async fn timed_out_install_is_install_failure() {
    let root = TempDir::new().expect("root");
    let runner = Arc::new(ScriptedRunner::new());
    runner.seed("api", &[("composer.json", "{}")]);
    runner.time_out("api", "composer");

    let results = Coordinator::new(ctx(root.path()), runner)
        .run(descriptors(&["api"]))
        .await;

    assert_eq!(
        results[0].status,
        SetupStatus::Failed(FailureReason::DependencyInstallFailed)
    );
    assert!(results[0].detail.as_deref().unwrap_or_default().contains("timed out"));
}

#[tokio::test]
async fn empty_manifest_spawns_nothing() {
    let root = TempDir::new().expect("root");
    let runner = Arc::new(ScriptedRunner::new());
    let results = Coordinator::new(ctx(root.path()), runner.clone())
        .run(Vec::new())
        .await;
    assert!(results.is_empty());
    assert!(runner.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn staggered_start_still_joins_every_unit() {
    let root = TempDir::new().expect("root");
    let runner = Arc::new(ScriptedRunner::new());
    let mut setup = ctx(root.path());
    setup.stagger = Duration::from_millis(100);

    let start = tokio::time::Instant::now();
    let results = Coordinator::new(setup, runner)
        .run(descriptors(&["a", "b", "c"]))
        .await;

    // Two gaps between three spawns.
    assert!(tokio::time::Instant::now() - start >= Duration::from_millis(200));
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.is_success()));
}

fn seed_framework_app(runner: &ScriptedRunner, repo: &str) {
    runner.seed(
        repo,
        &[(
            "package.json",
            r#"{"dependencies": {"next": "14"}, "scripts": {"build": "next build"}}"#,
        )],
    );
}

#[tokio::test]
async fn failed_build_keeps_failing_until_it_succeeds() {
    let root = TempDir::new().expect("root");
    let runner = Arc::new(ScriptedRunner::new());
    seed_framework_app(&runner, "web");
    runner.fail_step("web", "npm", "run");
    let coordinator = Coordinator::new(ctx(root.path()), runner.clone());

    for _ in 0..2 {
        let results = coordinator.run(descriptors(&["web"])).await;
        assert_eq!(
            results[0].status,
            SetupStatus::Failed(FailureReason::DependencyInstallFailed)
        );
        assert!(results[0].detail.as_deref().unwrap_or_default().contains("build:npm"));
    }
    // The install itself succeeded once and was not repeated.
    assert_eq!(
        runner.calls().iter().filter(|c| c.starts_with("npm install")).count(),
        1
    );
    let clone = root.path().join("projects").join("web");
    assert!(!clone.join(BUILD_MARKER).exists());

    runner.recover();
    let results = coordinator.run(descriptors(&["web"])).await;
    assert_eq!(results[0].status, SetupStatus::Succeeded);
    assert!(clone.join(BUILD_MARKER).is_file());

    let builds = runner.calls_for("npm");
    let results = coordinator.run(descriptors(&["web"])).await;
    assert_eq!(results[0].status, SetupStatus::Succeeded);
    assert_eq!(runner.calls_for("npm"), builds, "a finished build is not repeated");
}

#[cfg(unix)]
#[tokio::test]
async fn env_bootstrap_failure_is_install_failure() {
    let root = TempDir::new().expect("root");
    let clone = root.path().join("projects").join("api");
    std::fs::create_dir_all(&clone).expect("clone");
    std::fs::write(clone.join(".env.example"), "APP_KEY=\n").expect("env example");
    // Dangling link: `.env` looks absent but cannot be written through.
    std::os::unix::fs::symlink(root.path().join("missing/.env"), clone.join(".env"))
        .expect("symlink");
    let runner = Arc::new(ScriptedRunner::new());

    let results = Coordinator::new(ctx(root.path()), runner.clone())
        .run(descriptors(&["api"]))
        .await;

    assert_eq!(
        results[0].status,
        SetupStatus::Failed(FailureReason::DependencyInstallFailed)
    );
    assert!(results[0].detail.as_deref().unwrap_or_default().contains("env stage failed"));
    assert_eq!(runner.calls_for("git"), 0);
}

// ---------------------------------------------------------------------------
// 2. Fetcher
// ---------------------------------------------------------------------------

#[test]
fn fetch_existing_directory_is_noop_twice() {
    let root = TempDir::new().expect("root");
    let target = root.path().join("projects").join("api");
    std::fs::create_dir_all(&target).expect("mkdir");
    let runner = ScriptedRunner::new();
    let fetcher = Fetcher::default();

    for _ in 0..2 {
        let outcome = fetcher
            .ensure_present(&runner, "acme", "api", &target, None)
            .expect("fetch");
        assert_eq!(outcome, FetchOutcome::AlreadyPresent);
    }
    assert_eq!(runner.calls_for("git"), 0);
}

#[test]
fn fetch_failure_redacts_token_and_removes_partial_clone() {
    let root = TempDir::new().expect("root");
    let target = root.path().join("projects").join("api");
    let runner = ScriptedRunner::new();
    runner.fail("api", "git");
    let token = Credential::new("ghp_supersecret");

    let err = Fetcher::default()
        .ensure_present(&runner, "acme", "api", &target, Some(&token))
        .unwrap_err();

    assert!(matches!(err, FetchError::Clone { .. }));
    let rendered = format!("{err} {err:?}");
    assert!(!rendered.contains("ghp_supersecret"), "token leaked: {rendered}");
    assert!(!target.exists(), "partial clone must be removed");
    assert!(runner.calls().iter().all(|c| !c.contains("ghp_supersecret")));
}

#[test]
fn fetch_refuses_file_at_target() {
    let root = TempDir::new().expect("root");
    let target = root.path().join("api");
    std::fs::write(&target, "not a dir").expect("write");
    let err = Fetcher::default()
        .ensure_present(&ScriptedRunner::new(), "acme", "api", &target, None)
        .unwrap_err();
    assert!(matches!(err, FetchError::TargetNotADirectory { .. }));
}

// ---------------------------------------------------------------------------
// 3. Installer
// ---------------------------------------------------------------------------

#[test]
fn second_install_is_noop() {
    let root = TempDir::new().expect("root");
    let repo = root.path().join("api");
    std::fs::create_dir_all(&repo).expect("mkdir");
    std::fs::write(repo.join("composer.json"), "{}").expect("composer.json");
    std::fs::write(repo.join("package.json"), "{}").expect("package.json");
    std::fs::write(repo.join("yarn.lock"), "").expect("yarn.lock");
    let runner = ScriptedRunner::new();
    let installer = Installer::default();

    let first = installer.install(&runner, &repo).expect("first install");
    assert_eq!(
        first.executed(),
        vec![InstallStage::Php, InstallStage::Node(NodeTool::Yarn)]
    );
    let calls_after_first = runner.calls().len();

    let second = installer.install(&runner, &repo).expect("second install");
    assert!(second.is_noop(), "second run should do nothing: {second:?}");
    assert_eq!(runner.calls().len(), calls_after_first);
}

#[test]
fn framework_build_and_env_bootstrap_run_once() {
    let root = TempDir::new().expect("root");
    let repo = root.path().join("web");
    std::fs::create_dir_all(&repo).expect("mkdir");
    std::fs::write(
        repo.join("package.json"),
        r#"{"dependencies": {"next": "14"}, "scripts": {"build": "next build"}}"#,
    )
    .expect("package.json");
    std::fs::write(repo.join("pnpm-lock.yaml"), "").expect("lock");
    std::fs::write(repo.join(".env.example"), "APP_KEY=\n").expect("env example");
    let runner = ScriptedRunner::new();

    let report = Installer::default().install(&runner, &repo).expect("install");
    assert_eq!(
        report.executed(),
        vec![
            InstallStage::Node(NodeTool::Pnpm),
            InstallStage::Build(NodeTool::Pnpm),
            InstallStage::EnvBootstrap,
        ]
    );
    assert!(runner.calls().contains(&"pnpm run build".to_string()));
    assert_eq!(
        std::fs::read_to_string(repo.join(".env")).expect(".env"),
        "APP_KEY=\n"
    );
}

#[test]
fn npm_failure_is_tagged_with_node_stage() {
    let root = TempDir::new().expect("root");
    let repo = root.path().join("web");
    std::fs::create_dir_all(&repo).expect("mkdir");
    std::fs::write(
        repo.join("package.json"),
        r#"{"devDependencies": {"vite": "5"}, "scripts": {"build": "vite build"}}"#,
    )
    .expect("package.json");

    // Install precedes build, so the Node lane is the stage that fails.
    let runner = ScriptedRunner::new();
    runner.fail("web", "npm");
    let err = Installer::default().install(&runner, &repo).unwrap_err();
    assert_eq!(err.stage(), Some(InstallStage::Node(NodeTool::Npm)));
}

#[test]
fn php_lane_skipped_when_vendor_exists() {
    let root = TempDir::new().expect("root");
    let repo = root.path().join("api");
    std::fs::create_dir_all(repo.join("vendor")).expect("vendor");
    std::fs::write(repo.join("composer.json"), "{}").expect("composer.json");
    let runner = ScriptedRunner::new();

    let report = Installer::default().install(&runner, &repo).expect("install");
    assert!(report.is_noop());
    assert_eq!(runner.calls_for("composer"), 0);
}
