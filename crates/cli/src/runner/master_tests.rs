// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chrono::NaiveDateTime;

use super::*;
use crate::package::{PackageIds, Settings, keys};
use crate::test_utils::{Failing, FakeDriver, FakeDriverService, RecordingListener, fake_context, shared};
use crate::xml::StartTag;

const SUITE_STARTED: &str = "<start-suite id='s1' name='S' fullname='S' type='TestFixture' />";
const TEST_STARTED: &str = "<start-test id='t1' name='T' fullname='S.T' />";

fn in_process(mut package: TestPackage) -> TestPackage {
    package.add_setting(keys::PROCESS_MODEL, "InProcess");
    package.add_setting(keys::DOMAIN_USAGE, "None");
    package
}

fn master(files: &[&str], drivers: Arc<FakeDriverService>) -> Arc<MasterRunner> {
    let package = TestPackage::from_files(&PackageIds::new(), files.iter().copied()).unwrap();
    let runner = MasterRunner::new(in_process(package), RunnerFactory::new(fake_context(drivers)));
    Arc::new(runner.unwrap())
}

fn root_tag(result: &TestEngineResult) -> StartTag {
    StartTag::parse(result.as_single().unwrap()).unwrap()
}

/// Poll until `listener` has seen `event`.
fn wait_for_event(listener: &RecordingListener, event: &str) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !listener.events().iter().any(|e| e == event) {
        assert!(Instant::now() < deadline, "never saw {event}");
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn package_without_files_is_rejected() {
    let package = TestPackage::anonymous(&PackageIds::new());
    let factory = RunnerFactory::new(fake_context(FakeDriverService::new()));

    let err = MasterRunner::new(package, factory).err().unwrap();

    assert!(matches!(err, EngineError::InvalidArgument { param: "package", .. }));
}

#[test]
fn topology_comes_from_factory() {
    let runner = master(&["a.dll", "b.dll"], FakeDriverService::new());
    assert_eq!(runner.topology(), RunnerTopology::Local);
}

#[test]
fn load_wraps_fragments_in_test_run() {
    let runner = master(&["a.dll", "b.dll"], FakeDriverService::new());

    let result = runner.load().unwrap();

    let tag = root_tag(&result);
    assert_eq!(tag.name(), "test-run");
    assert_eq!(tag.attribute("id"), Some(runner.package().id().to_string().as_str()));
    assert_eq!(tag.attribute("name"), None);
    assert_eq!(tag.count("testcasecount"), 2);
    assert_eq!(tag.attribute("result"), None);
    let text = result.as_single().unwrap();
    assert!(text.contains("id='a.dll'") && text.contains("id='b.dll'"));
}

#[test]
fn explore_wraps_fragments_in_test_run() {
    let drivers = FakeDriverService::with(|path| FakeDriver::new(path).cases(4));
    let runner = master(&["a.dll"], drivers);

    let result = runner.explore(&TestFilter::empty()).unwrap();

    assert_eq!(root_tag(&result).count("testcasecount"), 4);
}

#[test]
fn count_delegates_to_engine_runner() {
    let drivers = FakeDriverService::with(|path| FakeDriver::new(path).cases(3));
    let runner = master(&["a.dll", "b.dll"], drivers);
    assert_eq!(runner.count_test_cases(&TestFilter::empty()).unwrap(), 6);
}

#[test]
fn nested_projects_are_regrouped() {
    let ids = PackageIds::new();
    let mut project = TestPackage::new(&ids, "suite.corralproj").unwrap();
    let assemblies = vec![TestPackage::new(&ids, "p0.dll").unwrap(), TestPackage::new(&ids, "p1.dll").unwrap()];
    project.expand(assemblies, Settings::new()).unwrap();
    let project_id = project.id();
    let mut root = in_process(TestPackage::from_files(&ids, ["plain.dll"]).unwrap());
    root.add_sub_package(project);

    let factory = RunnerFactory::new(fake_context(FakeDriverService::new()));
    let runner = MasterRunner::new(root, factory).unwrap();
    let result = runner.load().unwrap();

    let text = result.as_single().unwrap();
    assert_eq!(root_tag(&result).count("testcasecount"), 3);
    assert!(text.contains(&format!(
        "<test-suite type='Project' id='{project_id}' name='suite.corralproj' fullname='suite.corralproj' runstate='Runnable' testcasecount='2'>"
    )));
    assert!(text.find("id='plain.dll'").unwrap() < text.find("type='Project'").unwrap());
}

// =============================================================================
// RUN
// =============================================================================

#[test]
fn run_reports_start_and_finish() {
    let runner = master(&["a.dll", "b.dll"], FakeDriverService::new());
    let listener = RecordingListener::new();

    let result = runner.run(shared(&listener), &TestFilter::empty()).unwrap();

    let events = listener.events();
    let start = StartTag::parse(&events[0]).unwrap();
    assert_eq!(start.name(), "start-run");
    assert_eq!(start.count("count"), 2);
    assert_eq!(start.attribute("engine-version"), Some(ENGINE_VERSION));
    assert_eq!(events.last().map(String::as_str), result.as_single());

    let tag = root_tag(&result);
    assert_eq!(tag.attribute("result"), Some("Passed"));
    assert_eq!(tag.count("total"), 2);
    assert_eq!(tag.count("passed"), 2);
    assert_eq!(tag.attribute("start-time"), start.attribute("start-time"));
    for key in ["start-time", "end-time"] {
        NaiveDateTime::parse_from_str(tag.attribute(key).unwrap(), TIME_FORMAT).unwrap();
    }
    assert!(tag.attribute("duration").unwrap().parse::<f64>().unwrap() >= 0.0);
    assert!(result.as_single().unwrap().contains("><filter/><test-suite type='Assembly' id='a.dll'"));
}

#[test]
fn run_failure_is_returned() {
    let drivers = FakeDriverService::with(|path| FakeDriver::new(path).failing(Failing::Run));
    let runner = master(&["a.dll"], drivers);
    let listener = RecordingListener::new();

    let err = runner.run(shared(&listener), &TestFilter::empty()).unwrap_err();

    assert_eq!(err.to_string(), "An exception occurred in the driver while running tests.");
    assert!(listener.named("test-run").is_empty());
}

#[test]
fn run_async_completes() {
    let runner = master(&["a.dll"], FakeDriverService::new());
    let listener = RecordingListener::new();

    let mut run = runner.run_async(shared(&listener), TestFilter::empty());

    assert!(run.wait(Duration::from_secs(5)));
    assert!(run.is_complete());
    let result = run.into_result().unwrap();
    assert_eq!(root_tag(&result).name(), "test-run");
}

#[test]
fn run_async_reports_failure() {
    let drivers = FakeDriverService::with(|path| FakeDriver::new(path).failing(Failing::Count));
    let runner = master(&["a.dll"], drivers);

    let run = runner.run_async(shared(&RecordingListener::new()), TestFilter::empty());

    let err = run.into_result().unwrap_err();
    assert_eq!(err.to_string(), "An exception occurred in the driver while counting tests.");
}

#[test]
fn forced_stop_cancels_unfinished_items_before_completion() {
    let drivers =
        FakeDriverService::with(|path| FakeDriver::new(path).events(&[SUITE_STARTED, TEST_STARTED]).hanging());
    let runner = master(&["a.dll"], drivers);
    let listener = RecordingListener::new();

    let mut run = runner.run_async(shared(&listener), TestFilter::empty());
    wait_for_event(&listener, TEST_STARTED);
    assert!(!run.wait(Duration::from_millis(10)));

    runner.force_stop();

    assert!(run.wait(Duration::from_secs(5)));
    run.into_result().unwrap();
    let events = listener.events();
    let cancelled: Vec<&String> = events.iter().filter(|e| e.contains("label='Cancelled'")).collect();
    assert_eq!(cancelled.len(), 2);
    assert!(cancelled[0].starts_with("<test-case id='t1'"));
    assert!(cancelled[1].starts_with("<test-suite id='s1'"));
    assert!(events.last().unwrap().starts_with("<test-run "));
}

#[test]
fn request_stop_reaches_drivers() {
    let drivers = FakeDriverService::with(|path| FakeDriver::new(path).events(&[TEST_STARTED]).hanging());
    let runner = master(&["a.dll"], drivers.clone());
    let listener = RecordingListener::new();

    let mut run = runner.run_async(shared(&listener), TestFilter::empty());
    wait_for_event(&listener, TEST_STARTED);
    runner.request_stop();

    assert!(run.wait(Duration::from_secs(5)));
    assert!(drivers.driver("a.dll").unwrap().calls().contains(&"stop false".to_string()));
}

#[test]
fn stop_before_anything_ran_creates_no_runner() {
    let drivers = FakeDriverService::new();
    let runner = master(&["a.dll"], drivers.clone());

    runner.request_stop();
    runner.force_stop();
    runner.unload().unwrap();

    assert!(drivers.requests().is_empty());
}

#[test]
fn dispose_discards_engine_runner() {
    let drivers = FakeDriverService::new();
    let runner = master(&["a.dll"], drivers.clone());
    runner.load().unwrap();

    runner.dispose().unwrap();
    runner.load().unwrap();

    assert_eq!(drivers.requests().len(), 2);
}
