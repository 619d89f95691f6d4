//! Remote executor - runs compiled scripts over a transport
//!
//! Blocking runs drive the session on the caller's thread. Non-blocking runs
//! move the session, its script and its sink onto one dedicated worker
//! thread and hand back a [`SessionHandle`]. Sessions share nothing with
//! each other.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use unitscript::{CompiledScript, ScriptReport};

use crate::credential::Credential;
use crate::error::{Result, TransportError};
use crate::sink::{OutputSink, Stream};
use crate::transport::{Output, Session, Target, Transport};

/// How long a session waits for output before checking for cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Whether `run` waits for the session to end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Blocking,
    NonBlocking,
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Authenticating; no script content sent yet
    Connecting,
    /// Script sent, output streaming
    Running,
    Finished,
    /// Transport failure
    Failed,
    /// Stopped locally through [`SessionHandle::cancel`]
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Cancelled)
    }
}

/// What a finished session reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub machine: String,
    /// Exit code of the remote command (-1 when killed)
    pub exit_code: i32,
    /// Footer totals, when the script got that far
    pub report: Option<ScriptReport>,
    pub cancelled: bool,
}

impl SessionOutcome {
    /// Clean exit and no failed units
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.exit_code == 0 && self.report.as_ref().is_some_and(ScriptReport::is_clean)
    }
}

/// Result of [`RemoteExecutor::run`]
#[derive(Debug)]
pub enum Run {
    Completed(SessionOutcome),
    Detached(SessionHandle),
}

#[derive(Debug)]
struct Shared {
    status: Mutex<SessionStatus>,
    cancel: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        Self {
            status: Mutex::new(SessionStatus::Connecting),
            cancel: AtomicBool::new(false),
        }
    }

    fn set(&self, status: SessionStatus) {
        match self.status.lock() {
            Ok(mut guard) => *guard = status,
            Err(poisoned) => *poisoned.into_inner() = status,
        }
    }

    fn get(&self) -> SessionStatus {
        match self.status.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Handle to a non-blocking session
///
/// Dropping the handle (or calling [`detach`](Self::detach)) leaves the
/// session running to completion; output keeps flowing to its sink.
#[derive(Debug)]
pub struct SessionHandle {
    machine: String,
    shared: Arc<Shared>,
    worker: JoinHandle<Result<SessionOutcome>>,
}

impl SessionHandle {
    pub fn machine(&self) -> &str {
        &self.machine
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.get()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Stop relaying and tear down the local end of the session
    ///
    /// Nothing is sent to the remote side and nothing is rolled back; the
    /// host keeps whatever the units that already ran produced.
    pub fn cancel(&self) {
        log::info!("{}: cancelling session", self.machine);
        self.shared.cancel.store(true, Ordering::SeqCst);
    }

    /// Wait for the session to end
    pub fn wait(self) -> Result<SessionOutcome> {
        match self.worker.join() {
            Ok(result) => result,
            Err(_) => {
                self.shared.set(SessionStatus::Failed);
                Err(TransportError::WorkerPanicked {
                    machine: self.machine,
                })
            }
        }
    }

    /// Let the session run on without anyone waiting for it
    pub fn detach(self) {
        log::debug!("{}: session detached", self.machine);
    }
}

/// Runs compiled scripts on remote machines
#[derive(Clone)]
pub struct RemoteExecutor {
    transport: Arc<dyn Transport>,
}

impl RemoteExecutor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Run `script` on `target`
    ///
    /// Blocking mode returns the finished outcome. Non-blocking mode returns
    /// a handle immediately; transport errors then come out of
    /// [`SessionHandle::wait`].
    pub fn run(
        &self,
        target: &Target,
        credential: Credential,
        script: &CompiledScript,
        sink: Box<dyn OutputSink>,
        mode: Mode,
    ) -> Result<Run> {
        match mode {
            Mode::Blocking => self
                .run_blocking(target, &credential, script, sink)
                .map(Run::Completed),
            Mode::NonBlocking => self
                .spawn(target.clone(), credential, script.text().to_string(), sink)
                .map(Run::Detached),
        }
    }

    /// Run a session on the current thread
    pub fn run_blocking(
        &self,
        target: &Target,
        credential: &Credential,
        script: &CompiledScript,
        mut sink: Box<dyn OutputSink>,
    ) -> Result<SessionOutcome> {
        let shared = Shared::new();
        drive(
            self.transport.as_ref(),
            target,
            credential,
            script.text(),
            sink.as_mut(),
            &shared,
        )
    }

    /// Start a session on its own worker thread
    pub fn spawn(
        &self,
        target: Target,
        credential: Credential,
        script: String,
        mut sink: Box<dyn OutputSink>,
    ) -> Result<SessionHandle> {
        let machine = target.machine.clone();
        let shared = Arc::new(Shared::new());
        let transport = Arc::clone(&self.transport);
        let worker_shared = Arc::clone(&shared);

        let worker = std::thread::Builder::new()
            .name(format!("session-{machine}"))
            .spawn(move || {
                drive(
                    transport.as_ref(),
                    &target,
                    &credential,
                    &script,
                    sink.as_mut(),
                    &worker_shared,
                )
            })
            .map_err(|e| TransportError::io(&machine, e))?;

        Ok(SessionHandle {
            machine,
            shared,
            worker,
        })
    }
}

/// Open, send, relay until closed, reap
fn drive(
    transport: &dyn Transport,
    target: &Target,
    credential: &Credential,
    script: &str,
    sink: &mut dyn OutputSink,
    shared: &Shared,
) -> Result<SessionOutcome> {
    let machine = target.machine.as_str();
    let result = relay(transport, target, credential, script, sink, shared);
    sink.finish();

    match &result {
        Ok(outcome) if outcome.cancelled => shared.set(SessionStatus::Cancelled),
        Ok(outcome) => {
            log::info!("{machine}: session finished with exit code {}", outcome.exit_code);
            shared.set(SessionStatus::Finished);
        }
        Err(e) => {
            log::warn!("{e}");
            shared.set(SessionStatus::Failed);
        }
    }
    result
}

fn relay(
    transport: &dyn Transport,
    target: &Target,
    credential: &Credential,
    script: &str,
    sink: &mut dyn OutputSink,
    shared: &Shared,
) -> Result<SessionOutcome> {
    let mut session = transport.open(target, credential)?;
    shared.set(SessionStatus::Running);
    if let Err(e) = session.send(script) {
        abandon(&target.machine, session.as_mut());
        return Err(e);
    }

    let mut report = None;
    let mut cancelled = false;
    loop {
        if shared.cancel.load(Ordering::SeqCst) {
            if let Err(e) = session.kill() {
                abandon(&target.machine, session.as_mut());
                return Err(e);
            }
            cancelled = true;
            break;
        }
        match session.next_output(POLL_INTERVAL) {
            Output::Line(line) => {
                if line.stream == Stream::Stdout
                    && let Some(parsed) = ScriptReport::parse_line(&line.text)
                {
                    report = Some(parsed);
                }
                sink.line(&line);
            }
            Output::Pending => {}
            Output::Closed => break,
        }
    }

    let exit_code = session.wait()?;
    Ok(SessionOutcome {
        machine: target.machine.clone(),
        exit_code,
        report,
        cancelled,
    })
}

/// Reap a session that failed halfway through
fn abandon(machine: &str, session: &mut dyn Session) {
    if let Err(e) = session.kill() {
        log::debug!("{machine}: kill after failure: {e}");
    }
    if let Err(e) = session.wait() {
        log::debug!("{machine}: wait after failure: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::Secret;
    use crate::sink::{CaptureSink, OutputLine};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use unitscript::{Action, Machine, Network, Orchestrator, Phase, ProfileNode, Role, StructuredProfile, Unit};

    /// Echoes the script back line by line, then a footer
    #[derive(Default)]
    struct MockTransport {
        opens: AtomicUsize,
        refuse: bool,
        hang: bool,
        broken_pipe: bool,
        stuck: bool,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl MockTransport {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    struct MockSession {
        lines: VecDeque<OutputLine>,
        hang: bool,
        killed: bool,
        broken_pipe: bool,
        stuck: bool,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Transport for MockTransport {
        fn open(&self, target: &Target, _credential: &Credential) -> Result<Box<dyn Session>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.refuse {
                return Err(TransportError::Authentication {
                    machine: target.machine.clone(),
                    message: "Permission denied".into(),
                });
            }
            Ok(Box::new(MockSession {
                lines: VecDeque::new(),
                hang: self.hang,
                killed: false,
                broken_pipe: self.broken_pipe,
                stuck: self.stuck,
                calls: Arc::clone(&self.calls),
            }))
        }
    }

    impl Session for MockSession {
        fn send(&mut self, script: &str) -> Result<()> {
            self.calls.lock().unwrap().push("send");
            if self.broken_pipe {
                return Err(TransportError::io(
                    "r1",
                    std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"),
                ));
            }
            let sections = script.lines().filter(|l| l.starts_with("#====")).count();
            self.lines.push_back(OutputLine::stdout(format!("sections={sections}")));
            self.lines.push_back(OutputLine::stderr("warning: noise"));
            self.lines
                .push_back(OutputLine::stdout(format!("pass={sections} fail=0 failed:")));
            Ok(())
        }

        fn next_output(&mut self, wait: Duration) -> Output {
            if self.hang && !self.killed {
                std::thread::sleep(wait.min(Duration::from_millis(5)));
                return Output::Pending;
            }
            self.lines.pop_front().map_or(Output::Closed, Output::Line)
        }

        fn wait(&mut self) -> Result<i32> {
            self.calls.lock().unwrap().push("wait");
            Ok(if self.killed { -1 } else { 0 })
        }

        fn kill(&mut self) -> Result<()> {
            self.calls.lock().unwrap().push("kill");
            if self.stuck {
                return Err(TransportError::io("r1", std::io::Error::other("kill refused")));
            }
            self.killed = true;
            Ok(())
        }
    }

    fn script() -> CompiledScript {
        let network = Network::new("n").with("r1", Role::Router);
        let source = |m: &Machine| -> anyhow::Result<Box<dyn ProfileNode>> {
            Ok(Box::new(
                StructuredProfile::new(&m.label)
                    .with(Phase::Install, Unit::new("a", "proceed", "", "echo ok", "ok"))
                    .with(Phase::Install, Unit::new("b", "a", "", "echo ok", "ok")),
            ))
        };
        Orchestrator::initialize(&network, &source)
            .unwrap()
            .compile("r1", Action::Audit)
            .unwrap()
    }

    fn credential() -> Credential {
        Credential::new("r1", Secret::new("pw"))
    }

    #[test]
    fn test_blocking_run_relays_and_reports() {
        let transport = Arc::new(MockTransport::default());
        let executor = RemoteExecutor::new(transport.clone());
        let capture = CaptureSink::new();

        let run = executor
            .run(&Target::new("r1"), credential(), &script(), Box::new(capture.clone()), Mode::Blocking)
            .unwrap();
        let Run::Completed(outcome) = run else {
            panic!("blocking run must complete");
        };

        assert_eq!(transport.opens.load(Ordering::SeqCst), 1);
        assert!(outcome.is_success());
        assert_eq!(outcome.report.unwrap().pass, 2);
        assert_eq!(capture.lines().len(), 3);
        assert_eq!(capture.stdout(), "sections=2\npass=2 fail=0 failed:\n");
    }

    #[test]
    fn test_non_blocking_run_returns_handle() {
        let transport = Arc::new(MockTransport::default());
        let executor = RemoteExecutor::new(transport.clone());
        let capture = CaptureSink::new();

        let run = executor
            .run(&Target::new("r1"), credential(), &script(), Box::new(capture.clone()), Mode::NonBlocking)
            .unwrap();
        let Run::Detached(handle) = run else {
            panic!("non-blocking run must detach");
        };
        assert_eq!(handle.machine(), "r1");

        let outcome = handle.wait().unwrap();
        assert!(outcome.is_success());
        assert_eq!(transport.opens.load(Ordering::SeqCst), 1);
        assert_eq!(capture.lines().len(), 3);
    }

    #[test]
    fn test_authentication_failure_is_transport_error() {
        let transport = Arc::new(MockTransport {
            refuse: true,
            ..MockTransport::default()
        });
        let executor = RemoteExecutor::new(transport);
        let capture = CaptureSink::new();

        let err = executor
            .run_blocking(&Target::new("r1"), &credential(), &script(), Box::new(capture.clone()))
            .unwrap_err();
        assert!(matches!(err, TransportError::Authentication { .. }));
        assert!(err.is_pre_send());
        assert!(capture.lines().is_empty());

        let handle = executor
            .spawn(Target::new("r1"), credential(), script().into_text(), Box::new(CaptureSink::new()))
            .unwrap();
        assert!(handle.wait().is_err());
    }

    #[test]
    fn test_cancel_stops_a_hanging_session() {
        let transport = Arc::new(MockTransport {
            hang: true,
            ..MockTransport::default()
        });
        let executor = RemoteExecutor::new(transport);
        let handle = executor
            .spawn(Target::new("r1"), credential(), script().into_text(), Box::new(CaptureSink::new()))
            .unwrap();

        handle.cancel();
        let shared = Arc::clone(&handle.shared);
        let outcome = handle.wait().unwrap();
        assert!(outcome.cancelled);
        assert!(!outcome.is_success());
        assert_eq!(outcome.exit_code, -1);
        assert_eq!(shared.get(), SessionStatus::Cancelled);
    }

    #[test]
    fn test_failed_send_reaps_the_session() {
        let transport = Arc::new(MockTransport {
            broken_pipe: true,
            ..MockTransport::default()
        });
        let executor = RemoteExecutor::new(transport.clone());
        let capture = CaptureSink::new();

        let err = executor
            .run_blocking(&Target::new("r1"), &credential(), &script(), Box::new(capture.clone()))
            .unwrap_err();
        assert!(matches!(err, TransportError::Io { .. }));
        assert_eq!(transport.calls(), ["send", "kill", "wait"]);
        assert!(capture.lines().is_empty());
    }

    #[test]
    fn test_failed_kill_still_waits() {
        let transport = Arc::new(MockTransport {
            hang: true,
            stuck: true,
            ..MockTransport::default()
        });
        let executor = RemoteExecutor::new(transport.clone());
        let handle = executor
            .spawn(Target::new("r1"), credential(), script().into_text(), Box::new(CaptureSink::new()))
            .unwrap();

        handle.cancel();
        let shared = Arc::clone(&handle.shared);
        assert!(handle.wait().is_err());
        assert_eq!(shared.get(), SessionStatus::Failed);
        assert_eq!(transport.calls().last(), Some(&"wait"));
    }

    #[test]
    fn test_concurrent_sessions_are_independent() {
        let transport = Arc::new(MockTransport::default());
        let executor = RemoteExecutor::new(transport.clone());
        let sinks: Vec<CaptureSink> = (0..4).map(|_| CaptureSink::new()).collect();

        let handles: Vec<SessionHandle> = sinks
            .iter()
            .enumerate()
            .map(|(i, sink)| {
                executor
                    .spawn(
                        Target::new(format!("m{i}")),
                        Credential::new(format!("m{i}"), Secret::new("pw")),
                        script().into_text(),
                        Box::new(sink.clone()),
                    )
                    .unwrap()
            })
            .collect();

        for handle in handles {
            assert!(handle.wait().unwrap().is_success());
        }
        assert_eq!(transport.opens.load(Ordering::SeqCst), 4);
        for sink in &sinks {
            assert_eq!(sink.lines().len(), 3);
        }
    }
}
