//! Byte transport
//!
//! Owns the pseudo-terminal and the child process. Platform specifics live in
//! the backends; [`Transport`] runs the reader and writer threads and hands
//! everything the child produces to its owner through one ordered channel.
//!
//! ```text
//! Transport
//! ├── reader thread ── PtyBackend::read ──> events (Data*, then Exit | Error)
//! ├── writer thread <── input queue <── Transport::write
//! └── Arc<dyn PtyBackend>
//!     ├── ConPtyBackend  (Windows)
//!     ├── UnixPtyBackend (POSIX, portable-pty)
//!     └── ScriptedBackend (replays a scripted timeline)
//! ```

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;

#[cfg(windows)]
pub mod conpty;
pub mod scripted;
#[cfg(unix)]
pub mod unix;

#[cfg(windows)]
pub use conpty::ConPtyBackend;
pub use scripted::{ScriptStep, ScriptedBackend};
#[cfg(unix)]
pub use unix::UnixPtyBackend;

/// Size of one read from the PTY
const READ_CHUNK: usize = 4096;
/// Sleep between polls when a non-blocking backend has nothing to read
const IDLE_POLL: Duration = Duration::from_millis(5);
/// How long to wait for an exit status once the PTY reports end of stream
const EXIT_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to spawn `{program}`: {reason}")]
    Spawn { program: String, reason: String },

    #[error("PTY I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Transport is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// What to run behind the pseudo-terminal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Variables added to (or overriding) the inherited environment
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl SpawnSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program and arguments as a single Windows command line
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote_windows_arg)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Program followed by its arguments, for display
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Quote one argument following the MSVC runtime parsing rules.
fn quote_windows_arg(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains([' ', '\t', '\n', '\u{b}', '"']) {
        return arg.to_string();
    }

    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    let mut backslashes = 0;
    for ch in arg.chars() {
        match ch {
            '\\' => backslashes += 1,
            '"' => {
                quoted.extend(std::iter::repeat('\\').take(backslashes * 2 + 1));
                quoted.push('"');
                backslashes = 0;
            }
            _ => {
                quoted.extend(std::iter::repeat('\\').take(backslashes));
                quoted.push(ch);
                backslashes = 0;
            }
        }
    }
    quoted.extend(std::iter::repeat('\\').take(backslashes * 2));
    quoted.push('"');
    quoted
}

/// Result of one read attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were placed in the buffer
    Data(usize),
    /// Nothing available right now (non-blocking backends only)
    Idle,
    /// The child side of the terminal is closed
    Eof,
}

/// Platform pseudo-terminal with a child process attached.
///
/// All methods take `&self`: the reader thread, the writer thread and the
/// owner call into the backend concurrently.
pub trait PtyBackend: Send + Sync {
    /// Read output from the child. May block.
    fn read(&self, buf: &mut [u8]) -> io::Result<ReadOutcome>;

    /// Write all of `data` to the child's input.
    fn write_all(&self, data: &[u8]) -> io::Result<()>;

    fn resize(&self, cols: u16, rows: u16) -> io::Result<()>;

    /// Exit code if the child has exited, without blocking.
    fn try_exit_code(&self) -> io::Result<Option<u32>>;

    /// Terminate the child.
    fn kill(&self);

    /// Unblock a reader stuck in `read`, where the platform allows it.
    fn cancel_read(&self) {}
}

/// Output of a running transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Data(Vec<u8>),
    /// The child exited with this code
    Exit(u32),
    /// Reading or writing failed; the transport is stopped
    Error(String),
}

impl TransportEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransportEvent::Data(_))
    }
}

/// Spawn `spec` on the platform's native pseudo-terminal.
pub fn native_backend(spec: &SpawnSpec, cols: u16, rows: u16) -> Result<Arc<dyn PtyBackend>> {
    #[cfg(windows)]
    {
        Ok(Arc::new(ConPtyBackend::spawn(spec, cols, rows)?))
    }
    #[cfg(unix)]
    {
        Ok(Arc::new(UnixPtyBackend::spawn(spec, cols, rows)?))
    }
    #[cfg(not(any(windows, unix)))]
    {
        let _ = (cols, rows);
        Err(TransportError::Spawn {
            program: spec.program.clone(),
            reason: "no pseudo-terminal support on this platform".to_string(),
        })
    }
}

/// Running PTY session with its I/O threads
pub struct Transport {
    backend: Arc<dyn PtyBackend>,
    events: Receiver<TransportEvent>,
    input: Option<Sender<Vec<u8>>>,
    /// Cleared when the worker threads should wind down
    alive: Arc<AtomicBool>,
    stopped: bool,
    /// A terminal event was handed out
    finished: bool,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
    size: (u16, u16),
}

impl Transport {
    /// Spawn a child on the native pseudo-terminal and start the I/O threads.
    pub fn spawn(spec: &SpawnSpec, cols: u16, rows: u16) -> Result<Self> {
        let backend = native_backend(spec, cols, rows)?;
        tracing::info!("Spawned `{}` ({}x{})", spec.display(), cols, rows);
        Ok(Self::with_backend(backend, cols, rows))
    }

    /// Start the I/O threads over an already spawned backend.
    pub fn with_backend(backend: Arc<dyn PtyBackend>, cols: u16, rows: u16) -> Self {
        let alive = Arc::new(AtomicBool::new(true));
        let (event_tx, events) = mpsc::channel::<TransportEvent>();
        let (input, input_rx) = mpsc::channel::<Vec<u8>>();

        let reader = {
            let backend = backend.clone();
            let alive = alive.clone();
            let event_tx = event_tx.clone();
            thread::Builder::new()
                .name("pty-reader".into())
                .spawn(move || reader_loop(backend.as_ref(), &alive, &event_tx))
                .map_err(|e| tracing::error!("Failed to start PTY reader thread: {}", e))
                .ok()
        };

        let writer = {
            let backend = backend.clone();
            let alive = alive.clone();
            thread::Builder::new()
                .name("pty-writer".into())
                .spawn(move || writer_loop(backend.as_ref(), &alive, &event_tx, input_rx))
                .map_err(|e| tracing::error!("Failed to start PTY writer thread: {}", e))
                .ok()
        };

        Self {
            backend,
            events,
            input: Some(input),
            alive,
            stopped: false,
            finished: false,
            reader,
            writer,
            size: (cols, rows),
        }
    }

    /// True until the child exits, an error occurs, or `stop` is called.
    pub fn is_running(&self) -> bool {
        !self.stopped && !self.finished
    }

    pub fn size(&self) -> (u16, u16) {
        self.size
    }

    /// Queue bytes for the child. Never blocks; writes are applied in order.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        if !self.is_running() {
            return Err(TransportError::Closed);
        }
        let input = self.input.as_ref().ok_or(TransportError::Closed)?;
        input
            .send(bytes.to_vec())
            .map_err(|_| TransportError::Closed)
    }

    /// Change the terminal size. Repeating the current size does nothing.
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        if (cols, rows) == self.size {
            return Ok(());
        }
        if self.stopped {
            return Err(TransportError::Closed);
        }
        self.backend.resize(cols, rows)?;
        self.size = (cols, rows);
        Ok(())
    }

    /// Next event, if one is ready.
    ///
    /// Returns nothing after `stop`, and nothing after the first `Exit` or
    /// `Error` has been returned.
    pub fn poll_event(&mut self) -> Option<TransportEvent> {
        if self.stopped || self.finished {
            return None;
        }
        match self.events.try_recv() {
            Ok(event) => {
                if event.is_terminal() {
                    self.finish();
                }
                Some(event)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.finish();
                Some(TransportEvent::Error("PTY threads stopped unexpectedly".into()))
            }
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.alive.store(false, Ordering::SeqCst);
        self.input = None;
    }

    /// Kill the child and shut the I/O threads down. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.alive.store(false, Ordering::SeqCst);
        self.input = None;

        if !self.finished {
            self.backend.kill();
        }
        self.backend.cancel_read();

        for handle in [self.reader.take(), self.writer.take()].into_iter().flatten() {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                // Blocked in the OS; it exits once the child side closes.
                tracing::debug!("Detaching PTY worker thread {:?}", handle.thread().name());
            }
        }
        tracing::info!("Transport stopped");
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Send a terminal event unless something else ended the transport first.
fn finish_with(alive: &AtomicBool, tx: &Sender<TransportEvent>, event: TransportEvent) {
    if alive.swap(false, Ordering::SeqCst) {
        let _ = tx.send(event);
    }
}

fn reader_loop(backend: &dyn PtyBackend, alive: &AtomicBool, tx: &Sender<TransportEvent>) {
    let mut buffer = vec![0u8; READ_CHUNK];

    while alive.load(Ordering::SeqCst) {
        match backend.read(&mut buffer) {
            Ok(ReadOutcome::Data(n)) => {
                if tx.send(TransportEvent::Data(buffer[..n].to_vec())).is_err() {
                    break;
                }
            }
            Ok(ReadOutcome::Idle) => match backend.try_exit_code() {
                Ok(Some(code)) => {
                    // Output written just before exit may still be queued
                    drain(backend, &mut buffer, tx);
                    tracing::info!("Child exited with code {}", code);
                    finish_with(alive, tx, TransportEvent::Exit(code));
                    break;
                }
                Ok(None) => thread::sleep(IDLE_POLL),
                Err(e) => {
                    finish_with(alive, tx, TransportEvent::Error(e.to_string()));
                    break;
                }
            },
            Ok(ReadOutcome::Eof) => {
                let event = match wait_for_exit(backend, alive) {
                    Some(code) => {
                        tracing::info!("Child exited with code {}", code);
                        TransportEvent::Exit(code)
                    }
                    None => TransportEvent::Error("PTY closed without an exit status".into()),
                };
                finish_with(alive, tx, event);
                break;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                // A read error right after exit is how some platforms report EOF
                let event = match backend.try_exit_code() {
                    Ok(Some(code)) => TransportEvent::Exit(code),
                    _ => {
                        tracing::warn!("PTY read failed: {}", e);
                        TransportEvent::Error(format!("Failed to read from PTY: {}", e))
                    }
                };
                finish_with(alive, tx, event);
                break;
            }
        }
    }
}

fn drain(backend: &dyn PtyBackend, buffer: &mut [u8], tx: &Sender<TransportEvent>) {
    while let Ok(ReadOutcome::Data(n)) = backend.read(buffer) {
        if tx.send(TransportEvent::Data(buffer[..n].to_vec())).is_err() {
            return;
        }
    }
}

fn wait_for_exit(backend: &dyn PtyBackend, alive: &AtomicBool) -> Option<u32> {
    let deadline = Instant::now() + EXIT_STATUS_TIMEOUT;
    while alive.load(Ordering::SeqCst) && Instant::now() < deadline {
        match backend.try_exit_code() {
            Ok(Some(code)) => return Some(code),
            Ok(None) => thread::sleep(IDLE_POLL),
            Err(_) => return None,
        }
    }
    None
}

fn writer_loop(
    backend: &dyn PtyBackend,
    alive: &AtomicBool,
    tx: &Sender<TransportEvent>,
    input: Receiver<Vec<u8>>,
) {
    for data in input {
        if !alive.load(Ordering::SeqCst) {
            break;
        }
        if let Err(e) = backend.write_all(&data) {
            // After exit the reader reports the exit; the failed write is moot.
            if !matches!(backend.try_exit_code(), Ok(Some(_))) {
                tracing::warn!("PTY write failed: {}", e);
                finish_with(alive, tx, TransportEvent::Error(format!("Failed to write to PTY: {}", e)));
            }
            break;
        }
    }
}
