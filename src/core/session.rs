//! Session management
//!
//! A [`Session`] wires one transport to the decoder, the screen model and the
//! automation engine. Everything runs on the thread that calls
//! [`Session::tick`]; only the transport's I/O threads run elsewhere.

use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::automation::{AutomationEngine, AutomationRule, ResponseSchedule};
use super::pty::{self, native_backend, PtyBackend, SpawnSpec, Transport, TransportError, TransportEvent};
use super::term::{Decoder, ScreenModel, ScreenSnapshot};

/// Most bytes processed by one tick before yielding to the front end
pub const TICK_BYTE_BUDGET: usize = 256 * 1024;
/// Default snapshot cadence
pub const DEFAULT_RENDER_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Spawn(#[from] TransportError),

    #[error("Session is still running")]
    AlreadyRunning,
}

/// Lifecycle state reported to the renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Exited(u32),
    Errored(String),
    Stopped,
}

impl SessionStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, SessionStatus::Running)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Running => write!(f, "running"),
            SessionStatus::Exited(code) => write!(f, "exited ({})", code),
            SessionStatus::Errored(message) => write!(f, "error: {}", message),
            SessionStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Receives what the session publishes
pub trait RenderSink {
    fn on_snapshot(&mut self, snapshot: Arc<ScreenSnapshot>);
    fn on_status_change(&mut self, status: &SessionStatus);
}

/// Message form of [`RenderSink`] calls, for handing across threads
#[derive(Debug, Clone)]
pub enum RenderUpdate {
    Snapshot(Arc<ScreenSnapshot>),
    Status(SessionStatus),
}

impl RenderSink for Sender<RenderUpdate> {
    fn on_snapshot(&mut self, snapshot: Arc<ScreenSnapshot>) {
        let _ = self.send(RenderUpdate::Snapshot(snapshot));
    }

    fn on_status_change(&mut self, status: &SessionStatus) {
        let _ = self.send(RenderUpdate::Status(status.clone()));
    }
}

/// Canned command sent by a key binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub label: String,
    pub command: String,
}

impl Preset {
    /// Bytes to send: the command, terminated with CRLF unless it already
    /// ends in a line break.
    pub fn payload(&self) -> Vec<u8> {
        let mut bytes = self.command.as_bytes().to_vec();
        if !self.command.ends_with(['\r', '\n']) {
            bytes.extend_from_slice(b"\r\n");
        }
        bytes
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub spawn: SpawnSpec,
    pub cols: u16,
    pub rows: u16,
    pub render_interval: Duration,
    pub match_window_bytes: usize,
}

impl SessionOptions {
    pub fn new(spawn: SpawnSpec, cols: u16, rows: u16) -> Self {
        Self {
            spawn,
            cols,
            rows,
            render_interval: DEFAULT_RENDER_INTERVAL,
            match_window_bytes: super::automation::window::DEFAULT_CAPACITY,
        }
    }
}

/// Creates the backend for each (re)start
pub type Launcher = Box<dyn FnMut(&SpawnSpec, u16, u16) -> pty::Result<Arc<dyn PtyBackend>> + Send>;

/// One hosted child process and everything derived from its output
pub struct Session<S: RenderSink> {
    options: SessionOptions,
    launcher: Launcher,
    transport: Option<Transport>,
    decoder: Decoder,
    screen: ScreenModel,
    automation: AutomationEngine,
    schedule: ResponseSchedule,
    sink: S,
    status: SessionStatus,
    dirty: bool,
    last_publish: Option<Instant>,
    /// The last tick stopped at the byte budget with events left over
    backlogged: bool,
}

impl<S: RenderSink> Session<S> {
    /// Spawn `options.spawn` on the native pseudo-terminal.
    pub fn start(options: SessionOptions, rules: Vec<AutomationRule>, sink: S) -> Result<Self, SessionError> {
        Self::with_launcher(options, rules, sink, Box::new(native_backend))
    }

    /// Run over an existing backend. The session cannot be restarted.
    pub fn with_backend(
        options: SessionOptions,
        rules: Vec<AutomationRule>,
        sink: S,
        backend: Arc<dyn PtyBackend>,
    ) -> Self {
        let mut backend = Some(backend);
        let launcher: Launcher = Box::new(move |spec, _, _| {
            backend.take().ok_or_else(|| TransportError::Spawn {
                program: spec.program.clone(),
                reason: "backend cannot be restarted".to_string(),
            })
        });
        let mut session = Self::new(options, rules, sink, launcher);
        if let Err(e) = session.launch() {
            tracing::error!("Failed to attach backend: {}", e);
        }
        session
    }

    /// Start with a custom backend factory, used again by `restart`.
    pub fn with_launcher(
        options: SessionOptions,
        rules: Vec<AutomationRule>,
        sink: S,
        launcher: Launcher,
    ) -> Result<Self, SessionError> {
        let mut session = Self::new(options, rules, sink, launcher);
        session.launch()?;
        Ok(session)
    }

    fn new(options: SessionOptions, rules: Vec<AutomationRule>, sink: S, launcher: Launcher) -> Self {
        let screen = ScreenModel::new(options.cols, options.rows);
        let automation = AutomationEngine::new(rules, options.match_window_bytes);
        Self {
            options,
            launcher,
            transport: None,
            decoder: Decoder::new(),
            screen,
            automation,
            schedule: ResponseSchedule::new(),
            sink,
            status: SessionStatus::Stopped,
            dirty: true,
            last_publish: None,
            backlogged: false,
        }
    }

    fn launch(&mut self) -> Result<(), SessionError> {
        let (cols, rows) = self.screen.size();
        let backend = (self.launcher)(&self.options.spawn, cols, rows)?;
        self.transport = Some(Transport::with_backend(backend, cols, rows));
        tracing::info!("Session started: {}", self.options.spawn.display());
        self.set_status(SessionStatus::Running);
        self.dirty = true;
        Ok(())
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    pub fn spawn_spec(&self) -> &SpawnSpec {
        &self.options.spawn
    }

    pub fn screen(&self) -> &ScreenModel {
        &self.screen
    }

    pub fn automation(&self) -> &AutomationEngine {
        &self.automation
    }

    /// Delayed responses not yet sent
    pub fn pending_responses(&self) -> usize {
        self.schedule.len()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Process transport output, release due responses and publish a
    /// snapshot if the cadence allows.
    pub fn tick(&mut self, now: Instant) {
        let mut budget = TICK_BYTE_BUDGET;
        self.backlogged = false;

        loop {
            if budget == 0 {
                self.backlogged = true;
                break;
            }
            let Some(event) = self.transport.as_mut().and_then(Transport::poll_event) else {
                break;
            };
            match event {
                TransportEvent::Data(bytes) => {
                    budget = budget.saturating_sub(bytes.len());
                    self.process_output(&bytes, now);
                }
                TransportEvent::Exit(code) => {
                    self.finish(SessionStatus::Exited(code), now);
                    break;
                }
                TransportEvent::Error(message) => {
                    tracing::warn!("Transport error: {}", message);
                    self.finish(SessionStatus::Errored(message), now);
                    break;
                }
            }
        }

        for due in self.schedule.take_due(now) {
            tracing::debug!("Sending delayed response of rule `{}`", due.rule);
            self.write_transport(&due.bytes);
        }

        if self.dirty && self.status.is_running() && self.cadence_elapsed(now) {
            self.publish(now);
        }
    }

    /// When the front end should call `tick` again at the latest
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        if self.backlogged {
            return Some(now);
        }
        let render = (self.dirty && self.status.is_running()).then(|| {
            self.last_publish
                .map_or(now, |last| last + self.options.render_interval)
        });
        match (render, self.schedule.next_due()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn cadence_elapsed(&self, now: Instant) -> bool {
        self.last_publish
            .map_or(true, |last| now.saturating_duration_since(last) >= self.options.render_interval)
    }

    fn process_output(&mut self, bytes: &[u8], now: Instant) {
        for event in self.decoder.feed(bytes) {
            self.screen.apply(&event);
        }
        self.dirty = true;

        for reply in self.screen.take_replies() {
            self.write_transport(&reply.to_bytes());
        }

        if let Some(request) = self.automation.observe(bytes) {
            match request.delay {
                Some(delay) => self.schedule.schedule(now + delay, request.rule, request.bytes),
                None => {
                    self.write_transport(&request.bytes);
                }
            }
        }
    }

    fn publish(&mut self, now: Instant) {
        self.sink.on_snapshot(self.screen.snapshot());
        self.dirty = false;
        self.last_publish = Some(now);
    }

    /// Flush the last screen state, then report the terminal status.
    fn finish(&mut self, status: SessionStatus, now: Instant) {
        if self.dirty {
            self.publish(now);
        }
        tracing::info!("Session {}", status);
        self.set_status(status);
    }

    fn set_status(&mut self, status: SessionStatus) {
        if self.status != status {
            self.status = status;
            self.sink.on_status_change(&self.status);
        }
    }

    fn write_transport(&self, bytes: &[u8]) -> bool {
        match &self.transport {
            Some(transport) => match transport.write(bytes) {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!("Dropped {} bytes of input: {}", bytes.len(), e);
                    false
                }
            },
            None => false,
        }
    }

    /// Forward keyboard or preset input to the child. Input never passes
    /// through the automation engine. Returns false once the session ended.
    pub fn send_input(&mut self, bytes: &[u8]) -> bool {
        if !self.status.is_running() {
            tracing::debug!("Ignoring {} bytes of input: session {}", bytes.len(), self.status);
            return false;
        }
        self.write_transport(bytes)
    }

    pub fn send_preset(&mut self, preset: &Preset) -> bool {
        tracing::debug!("Sending preset `{}`", preset.label);
        self.send_input(&preset.payload())
    }

    /// Resize the child's terminal and the screen together.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        if self.screen.resize(cols, rows) {
            self.dirty = true;
        }
        let (cols, rows) = self.screen.size();
        if let Some(transport) = self.transport.as_mut() {
            match transport.resize(cols, rows) {
                Ok(()) | Err(TransportError::Closed) => {}
                Err(e) => tracing::warn!("Failed to resize PTY: {}", e),
            }
        }
    }

    /// Replace the rule set between chunks. Every rule starts armed.
    pub fn reload_rules(&mut self, rules: Vec<AutomationRule>) {
        self.automation.replace_rules(rules);
    }

    /// Start the same command again after it exited, failed or was stopped.
    pub fn restart(&mut self) -> Result<(), SessionError> {
        if self.status.is_running() {
            return Err(SessionError::AlreadyRunning);
        }
        if let Some(mut transport) = self.transport.take() {
            transport.stop();
        }
        self.decoder.reset();
        self.screen.reset();
        self.automation.reset();
        self.schedule.clear();
        self.last_publish = None;
        tracing::info!("Restarting session");
        self.launch()
    }

    /// Kill the child and cancel pending delayed responses.
    pub fn stop(&mut self) {
        let cancelled = self.schedule.clear();
        if cancelled > 0 {
            tracing::debug!("Cancelled {} delayed responses", cancelled);
        }
        if let Some(transport) = self.transport.as_mut() {
            transport.stop();
        }
        if self.status.is_running() {
            self.set_status(SessionStatus::Stopped);
        }
    }
}

impl<S: RenderSink> Drop for Session<S> {
    fn drop(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            transport.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::automation::RuleSpec;
    use crate::core::pty::{ScriptStep, ScriptedBackend};
    use pretty_assertions::assert_eq;
    use std::thread;

    #[derive(Default)]
    struct Recorder {
        updates: Vec<RenderUpdate>,
    }

    impl Recorder {
        fn snapshots(&self) -> Vec<Arc<ScreenSnapshot>> {
            self.updates
                .iter()
                .filter_map(|u| match u {
                    RenderUpdate::Snapshot(s) => Some(s.clone()),
                    RenderUpdate::Status(_) => None,
                })
                .collect()
        }

        fn statuses(&self) -> Vec<SessionStatus> {
            self.updates
                .iter()
                .filter_map(|u| match u {
                    RenderUpdate::Status(s) => Some(s.clone()),
                    RenderUpdate::Snapshot(_) => None,
                })
                .collect()
        }
    }

    impl RenderSink for Recorder {
        fn on_snapshot(&mut self, snapshot: Arc<ScreenSnapshot>) {
            self.updates.push(RenderUpdate::Snapshot(snapshot));
        }

        fn on_status_change(&mut self, status: &SessionStatus) {
            self.updates.push(RenderUpdate::Status(status.clone()));
        }
    }

    fn options() -> SessionOptions {
        SessionOptions::new(SpawnSpec::new("scripted"), 40, 10)
    }

    fn rules(specs: &[RuleSpec]) -> Vec<AutomationRule> {
        AutomationRule::compile_all(specs).unwrap()
    }

    fn session(steps: Vec<ScriptStep>, specs: &[RuleSpec]) -> (Session<Recorder>, Arc<ScriptedBackend>) {
        let backend = ScriptedBackend::new(steps);
        let session = Session::with_backend(options(), rules(specs), Recorder::default(), backend.clone());
        (session, backend)
    }

    /// Tick with real time until `done` holds or five seconds pass.
    fn pump(session: &mut Session<Recorder>, mut done: impl FnMut(&Session<Recorder>) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(session) && Instant::now() < deadline {
            session.tick(Instant::now());
            thread::sleep(Duration::from_millis(2));
        }
        assert!(done(session), "condition not reached in time");
    }

    #[test]
    fn test_exit_flushes_snapshot_then_reports_status() {
        let (mut session, _) = session(vec![ScriptStep::output("hello"), ScriptStep::Exit(0)], &[]);
        pump(&mut session, |s| !s.is_running());

        assert_eq!(session.status(), &SessionStatus::Exited(0));
        let updates = &session.sink().updates;
        assert!(matches!(updates.last(), Some(RenderUpdate::Status(SessionStatus::Exited(0)))));
        let snapshots = session.sink().snapshots();
        assert_eq!(snapshots.last().map(|s| s.row_text(0)), Some("hello".to_string()));

        let published = snapshots.len();
        assert!(!session.send_input(b"ls\r"));
        session.resize(20, 5);
        for _ in 0..5 {
            session.tick(Instant::now() + Duration::from_secs(1));
        }
        assert_eq!(session.sink().snapshots().len(), published);
        assert_eq!(
            session.sink().statuses(),
            vec![SessionStatus::Running, SessionStatus::Exited(0)]
        );
    }

    #[test]
    fn test_rule_answers_prompt_once() {
        let (mut session, backend) = session(
            vec![
                ScriptStep::output("Proceed? [Y/N] "),
                ScriptStep::AwaitInput(b"Y\n".to_vec()),
                ScriptStep::output("Y\r\nProceed? [Y/N] "),
                ScriptStep::Pause(Duration::from_millis(50)),
                ScriptStep::Exit(0),
            ],
            &[RuleSpec::new(r"\[Y/N\]", "Y\n")],
        );
        pump(&mut session, |s| !s.is_running());
        assert_eq!(backend.written(), b"Y\n".to_vec());
        assert_eq!(session.automation().fired_count(), 1);
    }

    #[test]
    fn test_delayed_response_waits_for_due_time() {
        let (mut session, backend) = session(
            vec![ScriptStep::output("ready")],
            &[RuleSpec {
                delay_ms: 60,
                ..RuleSpec::new("ready", "go\r")
            }],
        );
        pump(&mut session, |s| s.pending_responses() == 1);
        assert!(backend.written().is_empty());

        pump(&mut session, |s| s.pending_responses() == 0);
        let deadline = Instant::now() + Duration::from_secs(5);
        while backend.written().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(backend.written(), b"go\r".to_vec());
    }

    #[test]
    fn test_stop_cancels_delayed_response() {
        let (mut session, backend) = session(
            vec![ScriptStep::output("ready")],
            &[RuleSpec {
                delay_ms: 10_000,
                ..RuleSpec::new("ready", "go\r")
            }],
        );
        pump(&mut session, |s| s.pending_responses() == 1);
        session.stop();
        session.stop();
        assert_eq!(session.pending_responses(), 0);
        assert_eq!(session.status(), &SessionStatus::Stopped);
        assert!(backend.was_killed());
        session.tick(Instant::now() + Duration::from_secs(20));
        assert!(backend.written().is_empty());
        assert!(!session.send_input(b"x"));
    }

    #[test]
    fn test_read_error_ends_session() {
        let (mut session, _) = session(vec![ScriptStep::output("x"), ScriptStep::fail("gone")], &[]);
        pump(&mut session, |s| !s.is_running());

        let statuses = session.sink().statuses();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0], SessionStatus::Running);
        assert!(matches!(&statuses[1], SessionStatus::Errored(reason) if reason.contains("gone")));
        assert!(matches!(session.sink().updates.last(), Some(RenderUpdate::Status(_))));
        let snapshots = session.sink().snapshots();
        assert_eq!(snapshots.last().map(|s| s.row_text(0)), Some("x".to_string()));

        assert!(!session.send_input(b"y"));
        for _ in 0..3 {
            session.tick(Instant::now() + Duration::from_secs(1));
        }
        assert_eq!(session.sink().snapshots().len(), snapshots.len());
        assert_eq!(session.sink().statuses().len(), 2);
    }

    #[test]
    fn test_delayed_response_after_exit_is_dropped() {
        let (mut session, backend) = session(
            vec![
                ScriptStep::output("ready"),
                ScriptStep::Pause(Duration::from_millis(20)),
                ScriptStep::Exit(0),
            ],
            &[RuleSpec {
                delay_ms: 1_000,
                ..RuleSpec::new("ready", "go\r")
            }],
        );
        pump(&mut session, |s| !s.is_running());
        assert_eq!(session.pending_responses(), 1);

        session.tick(Instant::now() + Duration::from_secs(5));
        assert_eq!(session.pending_responses(), 0);
        assert!(backend.written().is_empty());
        assert_eq!(session.status(), &SessionStatus::Exited(0));
        assert_eq!(
            session.sink().statuses(),
            vec![SessionStatus::Running, SessionStatus::Exited(0)]
        );
    }

    #[test]
    fn test_cursor_report_is_answered() {
        let (mut session, backend) = session(vec![ScriptStep::output("ab\x1b[6n")], &[]);
        let deadline = Instant::now() + Duration::from_secs(5);
        while backend.written().is_empty() && Instant::now() < deadline {
            session.tick(Instant::now());
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(backend.written(), b"\x1b[1;3R".to_vec());
    }

    #[test]
    fn test_input_bypasses_automation() {
        let (mut session, backend) = session(vec![], &[RuleSpec::new("secret", "leak\r")]);
        assert!(session.send_input(b"secret"));
        let deadline = Instant::now() + Duration::from_secs(5);
        while backend.written().len() < 6 && Instant::now() < deadline {
            session.tick(Instant::now());
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(backend.written(), b"secret".to_vec());
        assert_eq!(session.automation().fired_count(), 0);
    }

    #[test]
    fn test_snapshots_are_coalesced() {
        let mut steps = vec![ScriptStep::AwaitInput(b"go".to_vec())];
        steps.extend((0..20).map(|i| ScriptStep::output(format!("line {}\r\n", i))));
        let (mut session, _) = session(steps, &[]);
        let t0 = Instant::now();
        session.tick(t0);
        let initial = session.sink().snapshots().len();
        assert_eq!(initial, 1);
        assert!(session.send_input(b"go"));

        // Let the output arrive while the cadence window is still open
        let deadline = Instant::now() + Duration::from_secs(5);
        while !session.screen().snapshot().text().contains("line 19") && Instant::now() < deadline {
            session.tick(t0 + Duration::from_millis(1));
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(session.sink().snapshots().len(), initial);
        assert!(session.next_deadline(t0).is_some());

        session.tick(t0 + Duration::from_millis(20));
        assert_eq!(session.sink().snapshots().len(), initial + 1);
        assert!(session.sink().snapshots()[1].text().contains("line 19"));
    }

    #[test]
    fn test_resize_updates_screen_and_pty() {
        let (mut session, backend) = session(vec![], &[]);
        session.resize(100, 30);
        session.resize(100, 30);
        assert_eq!(session.screen().size(), (100, 30));
        assert_eq!(backend.resizes(), vec![(100, 30)]);
    }

    #[test]
    fn test_send_preset_appends_line_break() {
        let (mut session, backend) = session(vec![], &[]);
        assert!(session.send_preset(&Preset {
            label: "status".into(),
            command: "git status".into(),
        }));
        assert!(session.send_preset(&Preset {
            label: "raw".into(),
            command: "q\n".into(),
        }));
        let deadline = Instant::now() + Duration::from_secs(5);
        while backend.written().len() < 14 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(backend.written(), b"git status\r\nq\n".to_vec());
    }

    #[test]
    fn test_restart_only_after_exit() {
        let launches = Arc::new(std::sync::Mutex::new(0));
        let counter = launches.clone();
        let launcher: Launcher = Box::new(move |_, _, _| {
            *counter.lock().unwrap() += 1;
            let backend: Arc<dyn PtyBackend> =
                ScriptedBackend::new(vec![ScriptStep::output("hi"), ScriptStep::Exit(5)]);
            Ok(backend)
        });
        let mut session = Session::with_launcher(
            options(),
            rules(&[RuleSpec::new("hi", "x")]),
            Recorder::default(),
            launcher,
        )
        .unwrap();
        assert!(matches!(session.restart(), Err(SessionError::AlreadyRunning)));

        pump(&mut session, |s| !s.is_running());
        assert_eq!(session.status(), &SessionStatus::Exited(5));
        assert_eq!(session.automation().fired_count(), 1);

        session.restart().unwrap();
        assert!(session.is_running());
        assert_eq!(session.automation().fired_count(), 0);
        assert_eq!(*launches.lock().unwrap(), 2);
        pump(&mut session, |s| !s.is_running());
        assert_eq!(session.automation().fired_count(), 1);
    }

    #[test]
    fn test_with_backend_cannot_restart() {
        let (mut session, _) = session(vec![ScriptStep::Exit(0)], &[]);
        pump(&mut session, |s| !s.is_running());
        assert!(matches!(session.restart(), Err(SessionError::Spawn(_))));
    }

    #[test]
    fn test_reload_rules_rearms() {
        let (mut session, _) = session(vec![], &[RuleSpec::new("a", "b")]);
        session.reload_rules(rules(&[RuleSpec::new("c", "d"), RuleSpec::new("e", "f")]));
        assert_eq!(session.automation().rules().len(), 2);
        assert_eq!(session.automation().armed_count(), 2);
    }

    #[test]
    fn test_preset_payload() {
        let preset = |command: &str| Preset {
            label: String::new(),
            command: command.to_string(),
        };
        assert_eq!(preset("ls").payload(), b"ls\r\n".to_vec());
        assert_eq!(preset("ls\r").payload(), b"ls\r".to_vec());
        assert_eq!(preset("").payload(), b"\r\n".to_vec());
    }
}
