//! POSIX pseudo-terminal backend
//!
//! Uses `portable-pty` to open the master/slave pair and spawn the child on
//! the slave side. Reads block on a dedicated thread.

use std::io::{self, Read, Write};
use std::sync::{Mutex, MutexGuard};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

use super::{PtyBackend, ReadOutcome, SpawnSpec, TransportError};

/// Linux reports EIO on the master once every slave descriptor is closed
const EIO: i32 = 5;

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn pty_size(cols: u16, rows: u16) -> PtySize {
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// PTY pair plus the child running on it
pub struct UnixPtyBackend {
    master: Mutex<Box<dyn MasterPty + Send>>,
    reader: Mutex<Box<dyn Read + Send>>,
    writer: Mutex<Box<dyn Write + Send>>,
    child: Mutex<Box<dyn Child + Send + Sync>>,
}

impl UnixPtyBackend {
    pub fn spawn(spec: &SpawnSpec, cols: u16, rows: u16) -> Result<Self, TransportError> {
        let spawn_error = |reason: String| TransportError::Spawn {
            program: spec.program.clone(),
            reason,
        };

        let pair = native_pty_system()
            .openpty(pty_size(cols, rows))
            .map_err(|e| spawn_error(format!("failed to open PTY: {}", e)))?;

        let mut cmd = CommandBuilder::new(&spec.program);
        cmd.args(&spec.args);
        cmd.env("TERM", "xterm-256color");
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        if let Some(cwd) = &spec.cwd {
            cmd.cwd(cwd);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| spawn_error(e.to_string()))?;
        // Only the child keeps the slave open, so EOF arrives when it exits
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| spawn_error(format!("failed to get PTY reader: {}", e)))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| spawn_error(format!("failed to get PTY writer: {}", e)))?;

        tracing::debug!("PTY child pid: {:?}", child.process_id());

        Ok(Self {
            master: Mutex::new(pair.master),
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            child: Mutex::new(child),
        })
    }
}

impl PtyBackend for UnixPtyBackend {
    fn read(&self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        match lock(&self.reader).read(buf) {
            Ok(0) => Ok(ReadOutcome::Eof),
            Ok(n) => Ok(ReadOutcome::Data(n)),
            Err(e) if e.raw_os_error() == Some(EIO) => Ok(ReadOutcome::Eof),
            Err(e) => Err(e),
        }
    }

    fn write_all(&self, data: &[u8]) -> io::Result<()> {
        let mut writer = lock(&self.writer);
        writer.write_all(data)?;
        writer.flush()
    }

    fn resize(&self, cols: u16, rows: u16) -> io::Result<()> {
        lock(&self.master)
            .resize(pty_size(cols, rows))
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
    }

    fn try_exit_code(&self) -> io::Result<Option<u32>> {
        Ok(lock(&self.child).try_wait()?.map(|status| status.exit_code()))
    }

    fn kill(&self) {
        let mut child = lock(&self.child);
        if matches!(child.try_wait(), Ok(None)) {
            if let Err(e) = child.kill() {
                tracing::debug!("Failed to kill PTY child: {}", e);
            }
            // Reap it so it does not linger as a zombie
            let _ = child.try_wait();
        }
    }
}
