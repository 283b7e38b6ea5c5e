//! Scripted backend
//!
//! Stands in for a child process by replaying a fixed timeline of output,
//! pauses and an exit. Input written to it is recorded, and a step can wait
//! for specific input before the script continues.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::{PtyBackend, ReadOutcome};

/// Exit code reported for a killed script
const KILLED_EXIT_CODE: u32 = 1;

/// One step of a scripted child
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Produce output
    Output(Vec<u8>),
    /// Produce nothing for a while
    Pause(Duration),
    /// Wait until the written input contains these bytes
    AwaitInput(Vec<u8>),
    /// Exit with a code
    Exit(u32),
    /// Fail the next read with an I/O error
    Fail(String),
}

impl ScriptStep {
    pub fn output(text: impl AsRef<[u8]>) -> Self {
        Self::Output(text.as_ref().to_vec())
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    steps: VecDeque<ScriptStep>,
    pending: VecDeque<u8>,
    pause_until: Option<Instant>,
    /// Position in `written` already matched by `AwaitInput`
    input_seen: usize,
    written: Vec<u8>,
    resizes: Vec<(u16, u16)>,
    exit_code: Option<u32>,
    killed: bool,
}

/// Fake PTY backend driven by a script
#[derive(Debug)]
pub struct ScriptedBackend {
    state: Mutex<ScriptState>,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<ScriptStep>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ScriptState {
                steps: steps.into(),
                ..ScriptState::default()
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Everything written to the child so far
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Every size change applied, in order
    pub fn resizes(&self) -> Vec<(u16, u16)> {
        self.lock().resizes.clone()
    }

    pub fn was_killed(&self) -> bool {
        self.lock().killed
    }
}

impl PtyBackend for ScriptedBackend {
    fn read(&self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        let mut state = self.lock();

        loop {
            if !state.pending.is_empty() {
                let n = buf.len().min(state.pending.len());
                for (slot, byte) in buf.iter_mut().zip(state.pending.drain(..n)) {
                    *slot = byte;
                }
                return Ok(ReadOutcome::Data(n));
            }
            if state.exit_code.is_some() {
                return Ok(ReadOutcome::Eof);
            }

            let Some(step) = state.steps.front().cloned() else {
                return Ok(ReadOutcome::Idle);
            };
            match step {
                ScriptStep::Output(bytes) => {
                    state.steps.pop_front();
                    state.pending.extend(bytes);
                }
                ScriptStep::Pause(duration) => {
                    let until = *state.pause_until.get_or_insert_with(|| Instant::now() + duration);
                    if Instant::now() < until {
                        return Ok(ReadOutcome::Idle);
                    }
                    state.pause_until = None;
                    state.steps.pop_front();
                }
                ScriptStep::AwaitInput(needle) => {
                    let start = state.input_seen;
                    let found = state.written[start..]
                        .windows(needle.len().max(1))
                        .position(|w| w == needle.as_slice());
                    match found {
                        Some(pos) => {
                            state.input_seen = start + pos + needle.len();
                            state.steps.pop_front();
                        }
                        None => return Ok(ReadOutcome::Idle),
                    }
                }
                ScriptStep::Exit(code) => {
                    state.steps.pop_front();
                    state.exit_code = Some(code);
                }
                ScriptStep::Fail(message) => {
                    state.steps.pop_front();
                    return Err(io::Error::new(io::ErrorKind::Other, message));
                }
            }
        }
    }

    fn write_all(&self, data: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        if state.exit_code.is_some() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "child has exited"));
        }
        state.written.extend_from_slice(data);
        Ok(())
    }

    fn resize(&self, cols: u16, rows: u16) -> io::Result<()> {
        self.lock().resizes.push((cols, rows));
        Ok(())
    }

    fn try_exit_code(&self) -> io::Result<Option<u32>> {
        Ok(self.lock().exit_code)
    }

    fn kill(&self) {
        let mut state = self.lock();
        state.killed = true;
        state.exit_code.get_or_insert(KILLED_EXIT_CODE);
    }
}
