// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use proptest::prelude::*;

use super::*;
use crate::package::PackageIds;
use crate::test_utils::{FakeRunner, RecordingListener, shared};

/// A package with leaves named "0", "1", ... and a runner per leaf.
fn setup(runners: Vec<FakeRunner>) -> (TestPackage, Vec<Arc<FakeRunner>>, Arc<dyn ChildFactory>) {
    let ids = PackageIds::new();
    let package = TestPackage::from_files(&ids, (0..runners.len()).map(|i| i.to_string())).unwrap();
    let runners: Vec<Arc<FakeRunner>> = runners.into_iter().map(Arc::new).collect();
    let lookup = runners.clone();
    let factory = move |leaf: &TestPackage| -> Arc<dyn TestEngineRunner> {
        let index: usize = leaf.full_name().unwrap().parse().unwrap();
        Arc::clone(&lookup[index]) as Arc<dyn TestEngineRunner>
    };
    let factory: Arc<dyn ChildFactory> = Arc::new(factory);
    (package, runners, factory)
}

fn names(n: usize) -> Vec<FakeRunner> {
    (0..n).map(|i| FakeRunner::new(&format!("r{i}"))).collect()
}

fn expected(n: usize) -> Vec<String> {
    (0..n).map(|i| FakeRunner::fragment(&format!("r{i}"), 1)).collect()
}

#[test]
fn children_are_created_lazily_once() {
    let (package, _, factory) = setup(names(3));
    let runner = AggregatingRunner::new(package, factory, 1);
    let first = runner.children();
    let second = runner.children();
    assert_eq!(first.len(), 3);
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn level_of_parallelism_is_at_least_one() {
    let (package, _, factory) = setup(names(1));
    assert_eq!(AggregatingRunner::new(package, factory, 0).level_of_parallelism(), 1);
}

#[test]
fn load_and_explore_merge_in_child_order() {
    let (package, _, factory) = setup(names(3));
    let runner = AggregatingRunner::new(package, factory, 4);
    assert_eq!(runner.load().unwrap().fragments(), expected(3).as_slice());
    assert_eq!(runner.explore(&TestFilter::empty()).unwrap().fragments(), expected(3).as_slice());
}

#[test]
fn count_sums_children() {
    let runners = vec![FakeRunner::new("a").cases(2), FakeRunner::new("b").cases(5)];
    let (package, _, factory) = setup(runners);
    let runner = AggregatingRunner::new(package, factory, 1);
    assert_eq!(runner.count_test_cases(&TestFilter::empty()).unwrap(), 7);
}

#[test]
fn sequential_run_visits_children_in_order() {
    let (package, runners, factory) = setup(names(3));
    let runner = AggregatingRunner::new(package, factory, 1);
    let listener = RecordingListener::new();

    let result = runner.run(shared(&listener), &TestFilter::empty()).unwrap();

    assert_eq!(result.fragments(), expected(3).as_slice());
    assert_eq!(
        listener.events(),
        vec!["<test-suite id='r0' />", "<test-suite id='r1' />", "<test-suite id='r2' />"]
    );
    for r in &runners {
        assert_eq!(r.calls(), vec!["run"]);
    }
}

#[test]
fn parallel_run_keeps_child_order_when_later_children_finish_first() {
    let runners = vec![
        FakeRunner::new("r0").delayed(Duration::from_millis(60)),
        FakeRunner::new("r1").delayed(Duration::from_millis(30)),
        FakeRunner::new("r2"),
    ];
    let (package, _, factory) = setup(runners);
    let runner = AggregatingRunner::new(package, factory, 3);
    let listener = RecordingListener::new();

    let result = runner.run(shared(&listener), &TestFilter::empty()).unwrap();

    assert_eq!(result.fragments(), expected(3).as_slice());
    // Completion order differs from declaration order.
    assert_eq!(listener.events()[0], "<test-suite id='r2' />");
}

#[test]
fn first_failure_in_child_order_is_returned() {
    let runners = vec![
        FakeRunner::new("r0"),
        FakeRunner::new("r1").failing_run(),
        FakeRunner::new("r2").failing_run(),
    ];
    let (package, runners, factory) = setup(runners);
    let runner = AggregatingRunner::new(package, factory, 3);

    let err = runner.run(shared(&RecordingListener::new()), &TestFilter::empty()).unwrap_err();

    assert_eq!(err.to_string(), "r1 failed to run");
    // Every child still ran.
    assert!(runners.iter().all(|r| r.calls() == vec!["run"]));
}

#[test]
fn stop_reaches_every_child() {
    let (package, runners, factory) = setup(names(3));
    let runner = AggregatingRunner::new(package, factory, 1);
    runner.load().unwrap();
    runner.stop_run(true);
    for r in &runners {
        assert_eq!(r.calls().last().unwrap(), "stop true");
    }
}

#[test]
fn stop_before_children_exist_creates_nothing() {
    let (package, runners, factory) = setup(names(2));
    let runner = AggregatingRunner::new(package, factory, 1);
    runner.stop_run(false);
    assert!(runners.iter().all(|r| r.calls().is_empty()));
}

// =============================================================================
// UNLOAD AND DISPOSE
// =============================================================================

#[test]
fn unload_attempts_every_child_and_collects_failures() {
    let runners = vec![
        FakeRunner::new("r0").failing_unload(),
        FakeRunner::new("r1"),
        FakeRunner::new("r2").failing_unload(),
    ];
    let (package, runners, factory) = setup(runners);
    let runner = AggregatingRunner::new(package, factory, 1);
    runner.load().unwrap();

    let err = runner.unload().unwrap_err();

    match &err {
        EngineError::Unload(errors) => assert_eq!(errors.len(), 2),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().starts_with("Multiple exceptions occurred while unloading (2)"));
    assert!(runners.iter().all(|r| r.calls().last().unwrap() == "unload"));
}

#[test]
fn dispose_runners_setting_disposes_after_each_run() {
    let runners = vec![FakeRunner::new("r0"), FakeRunner::new("r1").failing_dispose()];
    let (mut package, runners, factory) = setup(runners);
    package.add_setting(keys::DISPOSE_RUNNERS, true);
    let runner = AggregatingRunner::new(package, factory, 2);

    // Dispose failures do not fail the run itself.
    let result = runner.run(shared(&RecordingListener::new()), &TestFilter::empty()).unwrap();
    assert_eq!(result.len(), 2);
    for r in &runners {
        assert_eq!(r.calls(), vec!["run", "dispose"]);
    }

    let err = runner.unload().unwrap_err();
    assert_eq!(err.to_string(), "An exception occurred while unloading: r1 failed to dispose");
    runner.unload().unwrap();
}

#[test]
fn dispose_drops_children() {
    let (package, runners, factory) = setup(names(2));
    let runner = AggregatingRunner::new(package, factory, 1);
    let before = runner.children();
    runner.dispose().unwrap();
    assert!(runners.iter().all(|r| r.calls() == vec!["dispose"]));
    assert!(!Arc::ptr_eq(&before, &runner.children()));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Merge order matches declaration order for any completion timing.
    #[test]
    fn parallel_merge_order_is_stable(
        delays in prop::collection::vec(0u64..15, 2..8),
        level in 2usize..5,
    ) {
        let runners = delays
            .iter()
            .enumerate()
            .map(|(i, d)| FakeRunner::new(&format!("r{i}")).delayed(Duration::from_millis(*d)))
            .collect();
        let (package, _, factory) = setup(runners);
        let runner = AggregatingRunner::new(package, factory, level);

        let result = runner.run(shared(&RecordingListener::new()), &TestFilter::empty()).unwrap();

        let expected = expected(delays.len());
        prop_assert_eq!(result.fragments(), expected.as_slice());
    }
}
