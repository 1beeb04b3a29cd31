//! Integration tests for Relentless

mod sweep_tests {
    use async_trait::async_trait;
    use relentless::cache::{FileStore, ResultCache};
    use relentless::computation::{BuildGate, Computation, TrialOutput, TrialResult};
    use relentless::context::BuildContext;
    use relentless::sweep::{ExecutionMode, SweepOptions};
    use relentless::{ParamValue, ParameterSet, RelentlessResult, Sweep, SweepEngine, SweepRange, Task};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Reports `score = task * 10 + x`
    struct Stub {
        context: BuildContext,
        gate: BuildGate,
        builds: AtomicUsize,
        trials: AtomicUsize,
    }

    impl Stub {
        fn new(revision: &str) -> Arc<Self> {
            Arc::new(Self {
                context: BuildContext::new("/stub").with_revision(revision),
                gate: BuildGate::new(),
                builds: AtomicUsize::new(0),
                trials: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Computation for Stub {
        fn context(&self) -> &BuildContext {
            &self.context
        }

        fn is_built(&self) -> bool {
            self.gate.is_built()
        }

        async fn ensure_built(&self) -> RelentlessResult<()> {
            self.gate
                .ensure_built(|| async {
                    self.builds.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(())
                })
                .await
        }

        async fn run_trial(
            &self,
            task: Task,
            params: &ParameterSet,
            _vis: bool,
        ) -> RelentlessResult<TrialResult> {
            self.ensure_built().await?;
            self.trials.fetch_add(1, Ordering::SeqCst);
            let x = params.get("x").and_then(ParamValue::as_f64).unwrap_or(0.0);
            Ok(TrialResult::from_output(
                task,
                params.clone(),
                TrialOutput {
                    returncode: Some(0),
                    stdout: format!("Score = {}\nNodes = {}", task as f64 * 10.0 + x, task * 7),
                    stderr: String::new(),
                },
                Duration::from_millis(2),
            ))
        }

        fn kind_name(&self) -> &'static str {
            "stub"
        }
    }

    fn engine(stub: Arc<Stub>, cache_file: &Path) -> SweepEngine {
        let cache = ResultCache::new(Arc::new(FileStore::open(cache_file)));
        SweepEngine::new(stub, cache).with_options(SweepOptions {
            workers: 3,
            progress: false,
        })
    }

    #[tokio::test]
    async fn grid_shape_law() {
        let temp = TempDir::new().unwrap();
        let engine = engine(Stub::new("abc"), &temp.path().join("cache.json"));

        let sweep = Sweep::new(2).with_range(SweepRange::values("x", [0, 1]));
        let scores = engine.iterate_score(&sweep).await.unwrap();

        assert_eq!(scores.shape(), &[2, 2]);
        assert_eq!(scores.cells(), &[10.0, 11.0, 20.0, 21.0]);
    }

    #[tokio::test]
    async fn cached_results_survive_a_new_store() {
        let temp = TempDir::new().unwrap();
        let cache_file = temp.path().join("cache.json");

        let first_stub = Stub::new("abc");
        let first = engine(first_stub.clone(), &cache_file)
            .iterate(&Sweep::new(1))
            .await
            .unwrap();
        assert_eq!(first_stub.trials.load(Ordering::SeqCst), 1);
        assert!(cache_file.exists());

        let second_stub = Stub::new("abc");
        let second_engine = engine(second_stub.clone(), &cache_file);
        let plan = Sweep::new(1).plan().unwrap();
        assert_eq!(second_engine.execution_mode(&plan), ExecutionMode::Serial);

        let second = second_engine.iterate(&Sweep::new(1)).await.unwrap();
        assert_eq!(second_stub.trials.load(Ordering::SeqCst), 0);
        assert_eq!(second_stub.builds.load(Ordering::SeqCst), 0);
        assert_eq!(first, second);
        assert_eq!(second.cells()[0].info()["nodes"], "7");
    }

    #[tokio::test]
    async fn new_revision_misses_the_cache() {
        let temp = TempDir::new().unwrap();
        let cache_file = temp.path().join("cache.json");

        engine(Stub::new("abc"), &cache_file)
            .iterate(&Sweep::new(2))
            .await
            .unwrap();

        let moved = Stub::new("def");
        engine(moved.clone(), &cache_file)
            .iterate(&Sweep::new(2))
            .await
            .unwrap();
        assert_eq!(moved.trials.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn parallel_cells_build_once() {
        let temp = TempDir::new().unwrap();
        let stub = Stub::new("abc");
        let engine = engine(stub.clone(), &temp.path().join("cache.json"));

        let sweep = Sweep::new(6).with_range(SweepRange::linear("x", 0.0, 1.0, 4));
        let grid = engine.iterate(&sweep).await.unwrap();

        assert_eq!(grid.shape(), &[6, 4]);
        assert_eq!(stub.builds.load(Ordering::SeqCst), 1);
        assert_eq!(stub.trials.load(Ordering::SeqCst), 24);
    }

    #[tokio::test]
    async fn parameterised_runs_are_never_cached() {
        let temp = TempDir::new().unwrap();
        let stub = Stub::new("abc");
        let engine = engine(stub.clone(), &temp.path().join("cache.json"));

        let sweep = Sweep::new(2).with_param("x", 1);
        engine.iterate(&sweep).await.unwrap();
        engine.iterate(&sweep).await.unwrap();
        assert_eq!(stub.trials.load(Ordering::SeqCst), 4);
    }
}

mod tester_tests {
    use relentless::computation::ComputationKind;
    use relentless::config::{Config, ProjectProfile};
    use relentless::{ParameterSet, RelentlessError, Sweep, SweepRange, Tester, TesterOptions};
    use std::path::Path;
    use tempfile::TempDir;

    fn options(wrapper: &str, build: &str) -> TesterOptions {
        TesterOptions {
            profile: ProjectProfile {
                computation_type: Some(ComputationKind::Simple),
                computation_wrapper: Some(wrapper.to_string()),
                build_command: Some(build.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    async fn tester(dir: &Path, wrapper: &str, build: &str) -> Tester {
        Tester::open(dir.join("solver"), &Config::default(), &options(wrapper, build))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn parameters_reach_the_program_environment() {
        let temp = TempDir::new().unwrap();
        let tester = tester(
            temp.path(),
            "sh -c 'echo \"Score = $(( {task} * 10 + $RELENTLESS_X ))\"'",
            "true",
        )
        .await;

        let sweep = Sweep::new(2).with_range(SweepRange::values("x", [0, 1]));
        let scores = tester.iterate_score(&sweep).await.unwrap();
        assert_eq!(scores.cells(), &[10.0, 11.0, 20.0, 21.0]);
    }

    #[tokio::test]
    async fn build_failure_is_fatal_before_any_trial() {
        let temp = TempDir::new().unwrap();
        let marker = temp.path().join("ran");
        let wrapper = format!("sh -c 'touch {}'", marker.display());
        let tester = tester(temp.path(), &wrapper, "sh -c 'echo broken >&2; exit 1'").await;

        let err = tester.iterate(&Sweep::new(3)).await.unwrap_err();
        match err {
            RelentlessError::BuildFailed { log, .. } => {
                assert!(std::fs::read_to_string(log).unwrap().contains("broken"));
            }
            other => panic!("expected BuildFailed, got {other:?}"),
        }
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn non_zero_exit_is_kept_in_results() {
        let temp = TempDir::new().unwrap();
        let tester = tester(temp.path(), "sh -c 'echo \"Score = 5\"; exit 3'", "true").await;

        let grid = tester.iterate(&Sweep::new(2)).await.unwrap();
        for result in &grid {
            assert_eq!(result.returncode(), Some(3));
            assert_eq!(result.score(), 5.0);
            assert!(result.report(40).contains("Return code was 3"));
        }
    }

    #[tokio::test]
    async fn failed_sweep_leaves_no_trial_running() {
        let temp = TempDir::new().unwrap();
        // Every task but 1 gets a shell, so task 1 cannot be spawned
        for task in 2..=4 {
            let dir = temp.path().join("shells").join(task.to_string());
            std::fs::create_dir_all(&dir).unwrap();
            std::os::unix::fs::symlink("/bin/sh", dir.join("sh")).unwrap();
        }
        let wrapper = format!(
            "{}/shells/{{task}}/sh -c 'sleep 1; touch finished_{{task}}'",
            temp.path().display()
        );
        let tester = tester(temp.path(), &wrapper, "true").await;

        let err = tester.iterate(&Sweep::new(4)).await.unwrap_err();
        assert!(matches!(err, RelentlessError::CommandFailed { .. }));

        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        for task in 2..=4 {
            assert!(!temp.path().join(format!("finished_{}", task)).exists());
        }
    }

    #[tokio::test]
    async fn missing_score_defaults_to_sentinel() {
        let temp = TempDir::new().unwrap();
        let tester = tester(temp.path(), "sh -c 'echo nothing to see'", "true").await;
        assert_eq!(tester.score(1, &ParameterSet::new()).await.unwrap(), -1.0);
    }

    #[tokio::test]
    async fn dependence_requires_one_or_two_ranges() {
        let temp = TempDir::new().unwrap();
        let tester = tester(
            temp.path(),
            "sh -c 'echo \"Score = $RELENTLESS_A\"'",
            "true",
        )
        .await;

        assert!(matches!(
            tester.dependence(&Sweep::new(2)).await,
            Err(RelentlessError::InvalidSweep(_))
        ));

        let sweep = Sweep::new(2).with_range(SweepRange::values("a", [1, 2, 3]));
        let dependence = tester.dependence(&sweep).await.unwrap();
        assert_eq!(dependence.totals.cells(), &[2.0, 4.0, 6.0]);
    }
}

mod revision_tests {
    use relentless::config::{Config, ProjectProfile};
    use relentless::revision::{BuildContextResolver, GitResolver};
    use relentless::{RevisionTester, Sweep, TesterOptions};
    use std::path::Path;
    use std::process::Command;
    use tempfile::TempDir;

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    fn run_git(repo: &Path, args: &[&str]) -> String {
        let out = Command::new("git")
            .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
            .args(args)
            .current_dir(repo)
            .output()
            .expect("failed to run git");
        assert!(out.status.success(), "git command failed: {args:?}");
        String::from_utf8(out.stdout).unwrap().trim().to_string()
    }

    /// Commit a `score.txt` reporting `score`, dated `timestamp`
    fn commit_score(repo: &Path, score: u32, timestamp: i64) -> String {
        std::fs::write(repo.join("score.txt"), format!("Score = {}\n", score)).unwrap();
        run_git(repo, &["add", "score.txt"]);
        let date = format!("{} +0000", timestamp);
        let out = Command::new("git")
            .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
            .args(["commit", "-q", "-m", &format!("score {}", score)])
            .env("GIT_AUTHOR_DATE", &date)
            .env("GIT_COMMITTER_DATE", &date)
            .current_dir(repo)
            .output()
            .unwrap();
        assert!(out.status.success());
        run_git(repo, &["rev-parse", "HEAD"])
    }

    fn options(counter: &Path) -> TesterOptions {
        TesterOptions {
            profile: ProjectProfile {
                computation_wrapper: Some(format!(
                    "sh -c 'echo run >> {}; cat {{working_dir}}/score.txt'",
                    counter.display()
                )),
                build_command: Some("true".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn runs(counter: &Path) -> usize {
        std::fs::read_to_string(counter)
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn revision_results_are_cached_across_testers() {
        if !git_available() {
            eprintln!("Skipping: git not available");
            return;
        }
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        run_git(&repo, &["init", "-q", "-b", "master"]);
        commit_score(&repo, 3, 1_700_000_000);
        let counter = temp.path().join("runs");

        let config = Config::default();
        let first = RevisionTester::open(repo.join("solver"), &config, &options(&counter))
            .await
            .unwrap();
        let scores = first.iterate_score(&Sweep::new(2)).await.unwrap();
        assert_eq!(scores.cells(), &[3.0, 3.0]);
        assert_eq!(runs(&counter), 2);

        let second = RevisionTester::open(repo.join("solver"), &config, &options(&counter))
            .await
            .unwrap();
        let again = second.iterate_score(&Sweep::new(2)).await.unwrap();
        assert_eq!(again, scores);
        assert_eq!(runs(&counter), 2);

        second.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn compare_and_history_follow_commits() {
        if !git_available() {
            eprintln!("Skipping: git not available");
            return;
        }
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        run_git(&repo, &["init", "-q", "-b", "master"]);
        let first = commit_score(&repo, 2, 1_700_000_000);
        let second = commit_score(&repo, 5, 1_700_000_100);
        let counter = temp.path().join("runs");

        let tester = RevisionTester::open(repo.join("solver"), &Config::default(), &options(&counter))
            .await
            .unwrap()
            .with_reference(first.clone());

        let comparison = tester.compare("master", &Sweep::new(2), &["score", "runtime"]).await.unwrap();
        let score = comparison.field("score").unwrap();
        assert_eq!(score.old, vec![2.0, 2.0]);
        assert_eq!(score.new, vec![5.0, 5.0]);
        assert_eq!(score.summary.wins, 2);
        assert!(!comparison.field("runtime").unwrap().maximise);

        let history = tester.score_history(&Sweep::new(2), None, None).await.unwrap();
        let ids: Vec<&str> = history.iter().map(|p| p.commit.id.as_str()).collect();
        assert_eq!(ids, vec![first.as_str(), second.as_str()]);
        assert_eq!(history[0].score, 4.0);
        assert_eq!(history[1].score, 10.0);
        assert!((history[1].intensity - 1.0).abs() < 1e-12);

        let since = tester
            .score_history(&Sweep::new(2), None, Some(&second[..10]))
            .await
            .unwrap();
        assert_eq!(since.len(), 1);

        // Every cell above was already cached by the comparison
        assert_eq!(runs(&counter), 4);

        assert_eq!(
            tester.resolver().resolve("master").await.unwrap(),
            second
        );
        assert!(tester.resolver().checkout_dir(&second).exists());
        tester.cleanup().await.unwrap();
        assert!(!tester.resolver().checkouts().exists());
    }

    #[tokio::test]
    async fn resolver_prefers_local_branch_over_remote() {
        if !git_available() {
            eprintln!("Skipping: git not available");
            return;
        }
        let temp = TempDir::new().unwrap();
        let upstream = temp.path().join("upstream");
        std::fs::create_dir_all(&upstream).unwrap();
        run_git(&upstream, &["init", "-q", "-b", "master"]);
        commit_score(&upstream, 1, 1_700_000_000);
        run_git(&upstream, &["checkout", "-q", "-b", "feature-x"]);
        let remote_tip = commit_score(&upstream, 2, 1_700_000_100);

        let project = temp.path().join("project");
        run_git(
            temp.path(),
            &["clone", "-q", &upstream.to_string_lossy(), &project.to_string_lossy()],
        );
        let resolver = GitResolver::new(&project, temp.path().join("checkouts"));
        assert_eq!(resolver.resolve("feature-x").await.unwrap(), remote_tip);

        run_git(&project, &["checkout", "-q", "-b", "feature-x", "origin/feature-x"]);
        let local_tip = commit_score(&project, 9, 1_700_000_200);
        assert_eq!(resolver.resolve("feature-x").await.unwrap(), local_tip);
    }
}
