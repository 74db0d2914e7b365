mod common;

use common::{entries, fake_config, fake_runner, fixtures, init, scratch, test_limits, GREETER, HELLO};
use fpcbox::{
    Limits, Outcome, RejectReason, Rejection, Runner, RunnerConfig, Submission, TRUNCATION_MARKER,
};

use std::time::{Duration, Instant};

#[tokio::test(flavor = "multi_thread")]
async fn hello_world() {
    init();
    let (fx, root) = (fixtures(), scratch());
    let runner = fake_runner(&fx, root.dir(), test_limits());

    let outcome = runner.run_submission(&Submission::new(HELLO)).await;
    assert_eq!(outcome, Outcome::Completed("Hello, World!\n".into()));
    assert_eq!(entries(root.dir()), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn echo_stdin() {
    init();
    let (fx, root) = (fixtures(), scratch());
    let runner = fake_runner(&fx, root.dir(), test_limits());

    let outcome = runner
        .run_submission(&Submission::new(GREETER).with_stdin("Ping"))
        .await;
    assert_eq!(outcome, Outcome::Completed("Ping\n".into()));
}

#[tokio::test(flavor = "multi_thread")]
async fn rejection_never_reaches_compiler() {
    init();
    let (fx, root) = (fixtures(), scratch());
    let runner = fake_runner(&fx, root.dir(), test_limits());

    let src = "program Hello;\nvar p: integer;\nbegin\n  p := GetMem(64);\nend.\n";
    match runner.run_submission(&Submission::new(src)).await {
        Outcome::Rejected(r) => assert_eq!(r.reason, RejectReason::RestrictedKeyword),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(!fx.dir().join("compiled").exists());
    assert_eq!(entries(root.dir()), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn structural_rejection() {
    init();
    let (fx, root) = (fixtures(), scratch());
    let runner = fake_runner(&fx, root.dir(), test_limits());

    let src = format!("program Hello;\n{}\nend.\n", "begin\n".repeat(100));
    match runner.run_submission(&Submission::new(src)).await {
        Outcome::Rejected(r) => assert_eq!(r.reason, RejectReason::StructuralComplexity),
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn compile_failure_skips_execution() {
    init();
    let (fx, root) = (fixtures(), scratch());
    let runner = fake_runner(&fx, root.dir(), test_limits());

    let src = "program Typo;\nbegin\n  wrtieln('x');\nend.\n";
    match runner.run_submission(&Submission::new(src)).await {
        Outcome::CompileFailed(diag) => assert!(diag.contains("Identifier not found"), "{}", diag),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(fx.dir().join("compiled").exists());
    assert!(!fx.dir().join("ran").exists());
    assert_eq!(entries(root.dir()), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn infinite_loop_times_out() {
    init();
    let (fx, root) = (fixtures(), scratch());
    let runner = fake_runner(&fx, root.dir(), test_limits());

    let t0 = Instant::now();
    let src = "program Spin;\nbegin\n  while true do ;\nend.\n";
    let outcome = runner.run_submission(&Submission::new(src)).await;
    assert_eq!(outcome, Outcome::TimedOut);
    assert!(t0.elapsed() < Duration::from_secs(test_limits().wall_time_secs + 3));
    assert_eq!(entries(root.dir()), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn output_is_capped() {
    init();
    let (fx, root) = (fixtures(), scratch());
    let limits = Limits {
        max_output_bytes: 1000,
        ..test_limits()
    };
    let runner = fake_runner(&fx, root.dir(), limits);

    let src = "program Flood;\nbegin\nend.\n";
    match runner.run_submission(&Submission::new(src)).await {
        Outcome::Completed(out) => {
            assert_eq!(out.len(), 1000 + TRUNCATION_MARKER.len());
            assert!(out.ends_with(TRUNCATION_MARKER));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_submissions_are_isolated() {
    init();
    let (fx, root) = (fixtures(), scratch());
    let runner = fake_runner(&fx, root.dir(), test_limits());

    let src = Submission::new("program Where;\nbegin\nend.\n");
    let (a, b) = tokio::join!(runner.run_submission(&src), runner.run_submission(&src));

    let (a, b) = match (a, b) {
        (Outcome::Completed(a), Outcome::Completed(b)) => (a, b),
        other => panic!("unexpected outcomes: {:?}", other),
    };
    assert_ne!(a, b);
    assert!(a.starts_with(&root.dir().display().to_string()));
    assert!(b.starts_with(&root.dir().display().to_string()));
    assert_eq!(entries(root.dir()), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn compiler_launch_failure_is_runtime_error() {
    init();
    let root = scratch();
    let config = RunnerConfig {
        compiler: "/nonexistent/fpc".into(),
        work_root: Some(root.dir().to_owned()),
        limits: test_limits(),
        ..Default::default()
    };
    let runner = Runner::new(config).unwrap();
    match runner.run_submission(&Submission::new(HELLO)).await {
        Outcome::RuntimeError(msg) => assert!(msg.contains("failed to run compiler"), "{}", msg),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(entries(root.dir()), 0);
}

#[test]
fn runner_keeps_its_config() {
    let (fx, root) = (fixtures(), scratch());
    let limits = Limits {
        max_output_bytes: 1000,
        ..test_limits()
    };
    let runner = fake_runner(&fx, root.dir(), limits.clone());
    assert_eq!(runner.config().limits, limits);
    assert_eq!(runner.config().work_root.as_deref(), Some(root.dir()));

    let rules = runner.validator().rules();
    assert!(rules.version() > 0);
    assert!(rules.keyword_count() > 0);
    assert!(runner.validator().validate(&Submission::new(HELLO)).is_accepted());
}

#[test]
fn construction_rejects_bad_config() {
    let (fx, root) = (fixtures(), scratch());

    let collapsed = Limits {
        cpu_time_secs: 5,
        wall_time_secs: 5,
        ..test_limits()
    };
    assert!(Runner::new(fake_config(&fx, root.dir(), collapsed)).is_err());

    let mut missing_rules = fake_config(&fx, root.dir(), test_limits());
    missing_rules.rules = Some(fx.dir().join("nope.json"));
    assert!(Runner::new(missing_rules).is_err());

    let relative = fake_config(&fx, "relative/root".as_ref(), test_limits());
    assert!(Runner::new(relative).is_err());
}

#[test]
fn outcome_json_shape() {
    let json = serde_json::to_value(Outcome::Completed("hi\n".into())).unwrap();
    assert_eq!(json, serde_json::json!({ "kind": "Completed", "payload": "hi\n" }));

    let json = serde_json::to_value(Outcome::TimedOut).unwrap();
    assert_eq!(json, serde_json::json!({ "kind": "TimedOut" }));

    assert_eq!(Outcome::Completed("hi\n".into()).payload(), "hi\n");
    assert_eq!(Outcome::TimedOut.payload(), "");
    let rejected = Outcome::Rejected(Rejection::new(RejectReason::SizeExceeded, "too big"));
    assert_eq!(rejected.kind(), "Rejected");
    assert_eq!(rejected.payload(), "too big");
}
