// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared unit test utilities.
//!
//! Fake drivers, runners, agents and launchers for exercising the engine
//! without real test frameworks or processes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::agent::{
    AgentId, AgentLauncher, AgentProcess, AgentProvider, LaunchRequest, TestAgent,
};
use crate::driver::{DriverService, SharedListener, TestDriver, TestEventListener};
use crate::error::{EngineError, Result};
use crate::filter::TestFilter;
use crate::package::{Settings, TestPackage};
use crate::result::TestEngineResult;
use crate::runner::{RunnerContext, TestEngineRunner};
use crate::xml::Element;

// =============================================================================
// LISTENER
// =============================================================================

/// Records every event it receives.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    /// Events whose root element is `name`.
    pub fn named(&self, name: &str) -> Vec<String> {
        let prefix = format!("<{name} ");
        self.events().into_iter().filter(|e| e.starts_with(&prefix)).collect()
    }
}

impl TestEventListener for RecordingListener {
    fn on_test_event(&self, event: &str) {
        self.events.lock().push(event.to_string());
    }
}

pub fn shared(listener: &Arc<RecordingListener>) -> SharedListener {
    Arc::clone(listener) as SharedListener
}

// =============================================================================
// DRIVERS
// =============================================================================

/// Which driver operation should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failing {
    Load,
    Run,
    Explore,
    Count,
}

pub struct FakeDriver {
    path: String,
    cases: usize,
    events: Vec<String>,
    failing: Option<Failing>,
    panics: bool,
    hangs: bool,
    calls: Mutex<Vec<String>>,
    stopped: Mutex<bool>,
    stop_signal: Condvar,
}

impl FakeDriver {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            cases: 1,
            events: Vec::new(),
            failing: None,
            panics: false,
            hangs: false,
            calls: Mutex::new(Vec::new()),
            stopped: Mutex::new(false),
            stop_signal: Condvar::new(),
        }
    }

    pub fn cases(mut self, cases: usize) -> Self {
        self.cases = cases;
        self
    }

    /// Events emitted at the start of `run`.
    pub fn events(mut self, events: &[&str]) -> Self {
        self.events = events.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn failing(mut self, op: Failing) -> Self {
        self.failing = Some(op);
        self
    }

    /// Panic inside `run`.
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    /// Block inside `run` until `stop_run` is called.
    pub fn hanging(mut self) -> Self {
        self.hangs = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    fn check(&self, op: Failing) -> anyhow::Result<()> {
        if self.failing == Some(op) {
            anyhow::bail!("driver {:?} failed for {}", op, self.path);
        }
        Ok(())
    }

    fn fragment(&self, with_result: bool) -> String {
        let mut suite = Element::new("test-suite")
            .attr("type", "Assembly")
            .attr("id", &self.path)
            .attr("fullname", &self.path)
            .attr("runstate", "Runnable")
            .attr("testcasecount", self.cases);
        if with_result {
            suite = suite
                .attr("result", "Passed")
                .attr("total", self.cases)
                .attr("passed", self.cases);
        }
        suite.to_string()
    }
}

impl TestDriver for FakeDriver {
    fn load(&self, path: &str, _settings: &Settings) -> anyhow::Result<String> {
        self.record(format!("load {path}"));
        self.check(Failing::Load)?;
        Ok(self.fragment(false))
    }

    fn count_test_cases(&self, filter: &str) -> anyhow::Result<usize> {
        self.record(format!("count {filter}"));
        self.check(Failing::Count)?;
        Ok(self.cases)
    }

    fn run(&self, listener: &dyn TestEventListener, filter: &str) -> anyhow::Result<String> {
        self.record(format!("run {filter}"));
        if self.panics {
            panic!("driver exploded");
        }
        self.check(Failing::Run)?;
        for event in &self.events {
            listener.on_test_event(event);
        }
        if self.hangs {
            let mut stopped = self.stopped.lock();
            self.stop_signal.wait_while_for(&mut stopped, |s| !*s, Duration::from_secs(5));
        }
        Ok(self.fragment(true))
    }

    fn explore(&self, filter: &str) -> anyhow::Result<String> {
        self.record(format!("explore {filter}"));
        self.check(Failing::Explore)?;
        Ok(self.fragment(false))
    }

    fn stop_run(&self, force: bool) -> anyhow::Result<()> {
        self.record(format!("stop {force}"));
        *self.stopped.lock() = true;
        self.stop_signal.notify_all();
        Ok(())
    }
}

type DriverTemplate = Box<dyn Fn(&str) -> FakeDriver + Send + Sync>;

/// Hands out a [`FakeDriver`] per path and remembers every request.
pub struct FakeDriverService {
    template: DriverTemplate,
    drivers: Mutex<HashMap<String, Arc<FakeDriver>>>,
    requests: Mutex<Vec<(String, Option<String>, bool)>>,
}

impl FakeDriverService {
    pub fn new() -> Arc<Self> {
        Self::with(FakeDriver::new)
    }

    pub fn with(template: impl Fn(&str) -> FakeDriver + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            template: Box::new(template),
            drivers: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn driver(&self, path: &str) -> Option<Arc<FakeDriver>> {
        self.drivers.lock().get(path).cloned()
    }

    pub fn requests(&self) -> Vec<(String, Option<String>, bool)> {
        self.requests.lock().clone()
    }
}

impl DriverService for FakeDriverService {
    fn get_driver(
        &self,
        path: &str,
        target_framework: Option<&str>,
        skip_non_test_assemblies: bool,
    ) -> anyhow::Result<Arc<dyn TestDriver>> {
        self.requests.lock().push((
            path.to_string(),
            target_framework.map(str::to_string),
            skip_non_test_assemblies,
        ));
        if path.contains("missing") {
            anyhow::bail!("no driver for {path}");
        }
        let driver = Arc::new((self.template)(path));
        self.drivers.lock().insert(path.to_string(), Arc::clone(&driver));
        Ok(driver)
    }
}

// =============================================================================
// RUNNERS
// =============================================================================

/// A runner with scripted behaviour that logs every call.
pub struct FakeRunner {
    name: String,
    cases: usize,
    delay: Duration,
    fail_run: bool,
    fail_unload: bool,
    fail_dispose: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cases: 1,
            delay: Duration::ZERO,
            fail_run: false,
            fail_unload: false,
            fail_dispose: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn cases(mut self, cases: usize) -> Self {
        self.cases = cases;
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_run(mut self) -> Self {
        self.fail_run = true;
        self
    }

    pub fn failing_unload(mut self) -> Self {
        self.fail_unload = true;
        self
    }

    pub fn failing_dispose(mut self) -> Self {
        self.fail_dispose = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn fragment(name: &str, cases: usize) -> String {
        format!("<test-suite type='Assembly' id='{name}' name='{name}' testcasecount='{cases}' />")
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

impl TestEngineRunner for FakeRunner {
    fn load(&self) -> Result<TestEngineResult> {
        self.record("load");
        Ok(TestEngineResult::new(Self::fragment(&self.name, self.cases)))
    }

    fn unload(&self) -> Result<()> {
        self.record("unload");
        if self.fail_unload {
            return Err(EngineError::Engine(format!("{} failed to unload", self.name)));
        }
        Ok(())
    }

    fn count_test_cases(&self, _filter: &TestFilter) -> Result<usize> {
        self.record("count");
        Ok(self.cases)
    }

    fn run(&self, listener: SharedListener, _filter: &TestFilter) -> Result<TestEngineResult> {
        self.record("run");
        thread::sleep(self.delay);
        if self.fail_run {
            return Err(EngineError::Engine(format!("{} failed to run", self.name)));
        }
        listener.on_test_event(&format!("<test-suite id='{}' />", self.name));
        Ok(TestEngineResult::new(Self::fragment(&self.name, self.cases)))
    }

    fn explore(&self, _filter: &TestFilter) -> Result<TestEngineResult> {
        self.record("explore");
        Ok(TestEngineResult::new(Self::fragment(&self.name, self.cases)))
    }

    fn stop_run(&self, force: bool) {
        self.record(format!("stop {force}"));
    }

    fn dispose(&self) -> Result<()> {
        self.record("dispose");
        if self.fail_dispose {
            return Err(EngineError::Engine(format!("{} failed to dispose", self.name)));
        }
        Ok(())
    }
}

// =============================================================================
// AGENTS
// =============================================================================

pub struct FakeAgent {
    id: AgentId,
    runner: Option<Arc<dyn TestEngineRunner>>,
    stops: AtomicUsize,
}

impl FakeAgent {
    pub fn new(id: AgentId) -> Self {
        Self { id, runner: None, stops: AtomicUsize::new(0) }
    }

    pub fn with_runner(id: AgentId, runner: Arc<dyn TestEngineRunner>) -> Self {
        Self { id, runner: Some(runner), stops: AtomicUsize::new(0) }
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl TestAgent for FakeAgent {
    fn id(&self) -> AgentId {
        self.id
    }

    fn create_runner(&self, package: &TestPackage) -> anyhow::Result<Arc<dyn TestEngineRunner>> {
        match &self.runner {
            Some(runner) => Ok(Arc::clone(runner)),
            None => Ok(Arc::new(FakeRunner::new(package.name().unwrap_or("remote")))),
        }
    }

    fn stop(&self) -> anyhow::Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeProcess {
    pid: u32,
    killed: AtomicBool,
}

impl FakeProcess {
    pub fn new(pid: u32) -> Self {
        Self { pid, killed: AtomicBool::new(false) }
    }

    pub fn was_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }
}

impl AgentProcess for FakeProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn kill(&self) -> anyhow::Result<()> {
        self.killed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// What a [`FakeLauncher`]'s processes do after launch.
#[derive(Debug, Clone, Copy)]
pub enum LaunchBehavior {
    /// Register once from another thread after the delay.
    Register(Duration),
    /// Register before `launch` returns.
    RegisterDuringLaunch,
    /// Exit with the code, before `launch` returns, without registering.
    ExitBeforeRegister(i32),
    NeverRegister,
    FailToLaunch,
}

pub struct FakeLauncher {
    behavior: LaunchBehavior,
    processes: Mutex<Vec<Arc<FakeProcess>>>,
    agents: Mutex<Vec<Arc<FakeAgent>>>,
    debug_requests: Mutex<Vec<bool>>,
}

impl FakeLauncher {
    pub fn new(behavior: LaunchBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            processes: Mutex::new(Vec::new()),
            agents: Mutex::new(Vec::new()),
            debug_requests: Mutex::new(Vec::new()),
        })
    }

    pub fn processes(&self) -> Vec<Arc<FakeProcess>> {
        self.processes.lock().clone()
    }

    pub fn agents(&self) -> Vec<Arc<FakeAgent>> {
        self.agents.lock().clone()
    }

    pub fn debug_requests(&self) -> Vec<bool> {
        self.debug_requests.lock().clone()
    }
}

impl AgentLauncher for FakeLauncher {
    fn launch(&self, request: LaunchRequest) -> anyhow::Result<Arc<dyn AgentProcess>> {
        if let LaunchBehavior::FailToLaunch = self.behavior {
            anyhow::bail!("could not start agent executable");
        }
        self.debug_requests.lock().push(request.debug);

        let process = {
            let mut processes = self.processes.lock();
            let process = Arc::new(FakeProcess::new(1000 + processes.len() as u32));
            processes.push(Arc::clone(&process));
            process
        };

        match self.behavior {
            LaunchBehavior::Register(delay) => {
                let agent = Arc::new(FakeAgent::new(request.agent_id));
                self.agents.lock().push(Arc::clone(&agent));
                let registrar = request.registrar;
                thread::spawn(move || {
                    thread::sleep(delay);
                    registrar.register(agent).ok();
                });
            }
            LaunchBehavior::RegisterDuringLaunch => {
                let agent = Arc::new(FakeAgent::new(request.agent_id));
                self.agents.lock().push(Arc::clone(&agent));
                request.registrar.register(agent)?;
            }
            LaunchBehavior::ExitBeforeRegister(code) => request.exits.notify(code),
            LaunchBehavior::NeverRegister | LaunchBehavior::FailToLaunch => {}
        }
        Ok(process)
    }
}

/// Provider handing out [`FakeAgent`]s directly.
#[derive(Default)]
pub struct FakeAgentProvider {
    runner: Option<Arc<dyn TestEngineRunner>>,
    fail: bool,
    delay: Duration,
    agents: Mutex<Vec<Arc<FakeAgent>>>,
    released: AtomicUsize,
}

impl FakeAgentProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every agent returns `runner` as its remote runner.
    pub fn with_runner(runner: Arc<dyn TestEngineRunner>) -> Arc<Self> {
        Arc::new(Self { runner: Some(runner), ..Self::default() })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { fail: true, ..Self::default() })
    }

    /// Each acquisition blocks for `delay`, like a slow agent launch.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay, ..Self::default() })
    }

    pub fn agents(&self) -> Vec<Arc<FakeAgent>> {
        self.agents.lock().clone()
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl AgentProvider for FakeAgentProvider {
    fn get_agent(&self, _package: &TestPackage) -> Result<Arc<dyn TestAgent>> {
        thread::sleep(self.delay);
        if self.fail {
            return Err(EngineError::Engine("Unable to acquire remote process agent".into()));
        }
        let agent = Arc::new(match &self.runner {
            Some(runner) => FakeAgent::with_runner(AgentId::new(), Arc::clone(runner)),
            None => FakeAgent::new(AgentId::new()),
        });
        self.agents.lock().push(Arc::clone(&agent));
        Ok(agent)
    }

    fn release_agent(&self, _agent: &dyn TestAgent) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// A runner context over fakes, with a short stop timeout.
pub fn fake_context(drivers: Arc<FakeDriverService>) -> RunnerContext {
    RunnerContext {
        driver_service: drivers,
        agent_provider: FakeAgentProvider::new(),
        stop_timeout: Duration::from_millis(50),
        processor_count: 4,
    }
}
