use anyhow::Result;
use async_trait::async_trait;
use netdispatch::config::ConnectionConfig;
use netdispatch::dispatch::{banner, DeviceResult, Dispatcher, FailureKind, Outcome};
use netdispatch::error::SessionError;
use netdispatch::operation::Operation;
use netdispatch::router::{FileMode, OutputDestination, ResultRouter};
use netdispatch::session::{DeviceSession, SessionProvider};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a scripted host does when contacted.
#[derive(Clone)]
enum Behavior {
    Reply { output: String, delay_ms: u64 },
    Refuse,
    Reject(String),
    Panic,
}

/// In-memory provider that answers according to a per-host script and
/// records how the dispatcher used it.
#[derive(Default)]
struct ScriptedProvider {
    script: HashMap<String, Behavior>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
    closed: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProvider {
    fn with(mut self, host: &str, behavior: Behavior) -> Self {
        self.script.insert(host.to_string(), behavior);
        self
    }
}

fn reply(output: &str, delay_ms: u64) -> Behavior {
    Behavior::Reply {
        output: output.to_string(),
        delay_ms,
    }
}

struct ScriptedSession {
    host: String,
    behavior: Behavior,
    in_flight: Arc<AtomicUsize>,
    closed: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl SessionProvider for ScriptedProvider {
    async fn open(
        &self,
        host: &str,
        _config: &ConnectionConfig,
    ) -> Result<Box<dyn DeviceSession>, SessionError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .script
            .get(host)
            .cloned()
            .unwrap_or_else(|| reply("ok", 0));

        if let Behavior::Refuse = behavior {
            return Err(SessionError::Connect {
                host: host.to_string(),
                reason: "Connection refused".to_string(),
            });
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        Ok(Box::new(ScriptedSession {
            host: host.to_string(),
            behavior,
            in_flight: Arc::clone(&self.in_flight),
            closed: Arc::clone(&self.closed),
        }))
    }
}

#[async_trait]
impl DeviceSession for ScriptedSession {
    async fn execute(&mut self, _operation: &Operation) -> Result<String, SessionError> {
        match &self.behavior {
            Behavior::Reply { output, delay_ms } => {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                Ok(output.clone())
            }
            Behavior::Reject(message) => Err(SessionError::Operation(message.clone())),
            Behavior::Panic => panic!("scripted panic on {}", self.host),
            Behavior::Refuse => unreachable!("refused hosts never get a session"),
        }
    }

    async fn close(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.closed.lock().unwrap().push(self.host.clone());
    }
}

fn hosts(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn config() -> Arc<ConnectionConfig> {
    Arc::new(ConnectionConfig::new("admin", "secret"))
}

fn console_router() -> ResultRouter<Vec<u8>> {
    ResultRouter::with_console(OutputDestination::Console, Vec::new())
}

#[tokio::test]
async fn test_one_result_per_host() -> Result<()> {
    let provider = ScriptedProvider::default()
        .with("r1", reply("Hostname: r1", 30))
        .with("r2", reply("Hostname: r2", 0))
        .with("r3", reply("Hostname: r3", 10));
    let dispatcher = Dispatcher::new(provider).with_max_parallel(3);
    let hosts = hosts(&["r1", "r2", "r3"]);
    let mut router = console_router();

    let summary = dispatcher
        .dispatch(&hosts, config(), Arc::new(Operation::DeviceInfo), &mut router)
        .await;

    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 0);

    let output = String::from_utf8(router.into_console())?;
    assert_eq!(output.matches("Results from device:").count(), 3);
    for host in ["r1", "r2", "r3"] {
        assert!(output.contains(&format!("{}Hostname: {}\n", banner(host), host)));
    }
    Ok(())
}

#[tokio::test]
async fn test_results_arrive_in_completion_order() {
    let provider = ScriptedProvider::default()
        .with("slow", reply("slow", 200))
        .with("fast", reply("fast", 0));
    let dispatcher = Dispatcher::new(provider).with_max_parallel(2);
    let hosts = hosts(&["slow", "fast"]);
    let mut router = console_router();

    dispatcher
        .dispatch(&hosts, config(), Arc::new(Operation::HealthCheck), &mut router)
        .await;

    let output = String::from_utf8(router.into_console()).unwrap();
    let fast = output.find("Results from device: fast").unwrap();
    let slow = output.find("Results from device: slow").unwrap();
    assert!(fast < slow, "fast host should be routed first:\n{output}");
}

#[tokio::test]
async fn test_zero_hosts() {
    let dispatcher = Dispatcher::new(ScriptedProvider::default());
    let mut router = console_router();

    let summary = dispatcher
        .dispatch(&[], config(), Arc::new(Operation::DeviceInfo), &mut router)
        .await;

    assert_eq!(summary.total, 0);
    assert!(router.into_console().is_empty());
}

#[tokio::test]
async fn test_failures_stay_with_their_host() {
    let provider = ScriptedProvider::default()
        .with("10.0.0.1", reply("Hostname: r1", 0))
        .with("10.0.0.2", Behavior::Refuse)
        .with("10.0.0.3", Behavior::Reject("error: commit failed".to_string()));
    let dispatcher = Dispatcher::new(provider);
    let hosts = hosts(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]);

    let results: Vec<_> = {
        use futures::StreamExt;
        dispatcher
            .results(&hosts, config(), Arc::new(Operation::DeviceInfo))
            .collect()
            .await
    };
    let by_host: HashMap<_, _> = results.iter().map(|r| (r.host.as_str(), r)).collect();

    assert_eq!(results.len(), 3);
    assert!(by_host["10.0.0.1"].is_success());
    assert!(matches!(
        &by_host["10.0.0.2"].outcome,
        Outcome::Failure { kind: FailureKind::Connection, message } if message.contains("refused")
    ));
    assert!(matches!(
        &by_host["10.0.0.3"].outcome,
        Outcome::Failure { kind: FailureKind::Operation, message } if message.contains("commit failed")
    ));
    assert!(by_host["10.0.0.2"].payload.starts_with(&banner("10.0.0.2")));
}

#[tokio::test]
async fn test_sessions_closed_on_every_path() {
    let provider = ScriptedProvider::default()
        .with("ok", reply("fine", 0))
        .with("rejected", Behavior::Reject("syntax error".to_string()))
        .with("refused", Behavior::Refuse);
    let closed = Arc::clone(&provider.closed);
    let opened = Arc::clone(&provider.opened);
    let dispatcher = Dispatcher::new(provider);
    let mut router = console_router();

    dispatcher
        .dispatch(
            &hosts(&["ok", "rejected", "refused"]),
            config(),
            Arc::new(Operation::InterfaceErrors),
            &mut router,
        )
        .await;

    assert_eq!(opened.load(Ordering::SeqCst), 3);
    let closed: HashSet<String> = closed.lock().unwrap().iter().cloned().collect();
    assert_eq!(closed, HashSet::from(["ok".to_string(), "rejected".to_string()]));
}

#[tokio::test]
async fn test_pool_size_bounds_concurrency() {
    let mut provider = ScriptedProvider::default();
    let names: Vec<String> = (1..=12).map(|n| format!("10.0.0.{n}")).collect();
    for name in &names {
        provider = provider.with(name, reply("ok", 20));
    }
    let peak = Arc::clone(&provider.peak);
    let dispatcher = Dispatcher::new(provider).with_max_parallel(3);
    let mut router = console_router();

    let summary = dispatcher
        .dispatch(&names, config(), Arc::new(Operation::HealthCheck), &mut router)
        .await;

    assert_eq!(summary.succeeded, 12);
    let peak = peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "saw {peak} sessions at once");
    assert!(peak >= 2, "hosts were not worked on in parallel");
}

#[tokio::test]
async fn test_panicking_host_becomes_failure() {
    let provider = ScriptedProvider::default()
        .with("boom", Behavior::Panic)
        .with("calm", reply("ok", 0));
    let dispatcher = Dispatcher::new(provider);
    let mut router = console_router();

    let summary = dispatcher
        .dispatch(
            &hosts(&["boom", "calm"]),
            config(),
            Arc::new(Operation::DeviceInfo),
            &mut router,
        )
        .await;

    assert_eq!(summary.total, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);

    let output = String::from_utf8(router.into_console()).unwrap();
    assert!(output.contains("Results from device: boom"));
}

#[tokio::test]
async fn test_read_only_operation_repeats() {
    let dispatcher = Dispatcher::new(ScriptedProvider::default().with("r1", reply("uptime 3d", 0)));
    let operation = Arc::new(Operation::HealthCheck);
    let hosts = hosts(&["r1"]);

    let mut first = console_router();
    let mut second = console_router();
    dispatcher
        .dispatch(&hosts, config(), Arc::clone(&operation), &mut first)
        .await;
    dispatcher
        .dispatch(&hosts, config(), operation, &mut second)
        .await;

    assert_eq!(first.into_console(), second.into_console());
}

#[test]
fn test_max_parallel_floor() {
    let dispatcher = Dispatcher::new(ScriptedProvider::default()).with_max_parallel(0);
    assert_eq!(dispatcher.max_parallel(), 1);
    assert!(Dispatcher::new(ScriptedProvider::default()).max_parallel() >= 2);
}

#[tokio::test]
async fn test_single_file_gets_whole_payloads() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("all.txt");
    let names: Vec<String> = (1..=8).map(|n| format!("10.0.0.{n}")).collect();

    // Long, multi-line outputs finishing in a scrambled order
    let mut provider = ScriptedProvider::default();
    let mut expected = HashMap::new();
    for (n, name) in names.iter().enumerate() {
        let output: String = (0..200).map(|line| format!("{name} line {line}\n")).collect();
        provider = provider.with(name, reply(&output, ((n * 7) % 5) as u64 * 10));
        expected.insert(name.clone(), DeviceResult::success(name.as_str(), &output, 0).payload);
    }
    let dispatcher = Dispatcher::new(provider).with_max_parallel(8);
    let mut router = ResultRouter::with_console(
        OutputDestination::File {
            mode: FileMode::Single,
            path: path.clone(),
        },
        Vec::new(),
    );

    let summary = dispatcher
        .dispatch(&names, config(), Arc::new(Operation::HealthCheck), &mut router)
        .await;
    assert_eq!(summary.succeeded, 8);

    // The file must split into whole payloads, each host exactly once
    let contents = fs::read_to_string(&path)?;
    let mut rest = contents.as_str();
    let mut seen = HashSet::new();
    while !rest.is_empty() {
        let (host, payload) = expected
            .iter()
            .find(|(_, payload)| rest.starts_with(payload.as_str()))
            .unwrap_or_else(|| panic!("no whole payload at: {:?}", &rest[..rest.len().min(80)]));
        assert!(seen.insert(host.clone()), "{host} written twice");
        rest = &rest[payload.len()..];
    }
    assert_eq!(seen.len(), 8);
    Ok(())
}

#[tokio::test]
async fn test_multiple_files_through_dispatch() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let base = dir.path().join("out.txt");
    let provider = ScriptedProvider::default()
        .with("10.0.0.1", reply("Hostname: r1", 20))
        .with("10.0.0.2", Behavior::Refuse);
    let dispatcher = Dispatcher::new(provider);
    let mut router = ResultRouter::with_console(
        OutputDestination::File {
            mode: FileMode::Multiple,
            path: base.clone(),
        },
        Vec::new(),
    );

    dispatcher
        .dispatch(
            &hosts(&["10.0.0.1", "10.0.0.2"]),
            config(),
            Arc::new(Operation::DeviceInfo),
            &mut router,
        )
        .await;

    let first = fs::read_to_string(dir.path().join("10.0.0.1_out.txt"))?;
    let second = fs::read_to_string(dir.path().join("10.0.0.2_out.txt"))?;
    assert_eq!(first, format!("{}Hostname: r1\n", banner("10.0.0.1")));
    assert!(second.starts_with(&banner("10.0.0.2")));
    assert!(second.contains("Connection refused"));
    assert!(!first.contains("10.0.0.2"));
    assert!(!base.exists());

    let console = String::from_utf8(router.into_console())?;
    assert_eq!(console.matches("output appended to:").count(), 2);
    Ok(())
}
