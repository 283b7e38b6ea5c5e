//! ConPTY backend for Windows
//!
//! Wraps a Windows pseudo console (ConPTY) and the process attached to it.
//! Output is read by peeking the pipe first so reads never block.

use std::ffi::c_void;
use std::io;

use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0};
use windows::Win32::Storage::FileSystem::{ReadFile, WriteFile};
use windows::Win32::System::Console::{
    ClosePseudoConsole, CreatePseudoConsole, ResizePseudoConsole, COORD, HPCON,
};
use windows::Win32::System::Pipes::{CreatePipe, PeekNamedPipe};
use windows::Win32::System::Threading::{
    CreateProcessW, DeleteProcThreadAttributeList, GetExitCodeProcess,
    InitializeProcThreadAttributeList, TerminateProcess, UpdateProcThreadAttribute,
    WaitForSingleObject, CREATE_UNICODE_ENVIRONMENT, EXTENDED_STARTUPINFO_PRESENT,
    LPPROC_THREAD_ATTRIBUTE_LIST, PROCESS_INFORMATION, STARTUPINFOEXW,
};
use windows::Win32::System::IO::CancelIoEx;

use super::{PtyBackend, ReadOutcome, SpawnSpec, TransportError};

const PROC_THREAD_ATTRIBUTE_PSEUDOCONSOLE: usize = 0x00020016;

fn win_to_io(e: windows::core::Error) -> io::Error {
    io::Error::from_raw_os_error(e.code().0)
}

fn coord(cols: u16, rows: u16) -> COORD {
    COORD {
        X: cols.min(i16::MAX as u16) as i16,
        Y: rows.min(i16::MAX as u16) as i16,
    }
}

/// Environment block for CreateProcessW: inherited variables with the
/// overrides applied, sorted, `KEY=VALUE\0` entries ending in an extra `\0`.
fn environment_block(overrides: &[(String, String)]) -> Vec<u16> {
    let mut vars: Vec<(String, String)> = std::env::vars()
        .filter(|(key, _)| !overrides.iter().any(|(k, _)| k.eq_ignore_ascii_case(key)))
        .collect();
    vars.extend(overrides.iter().cloned());
    vars.sort_by_key(|(key, _)| key.to_uppercase());

    let mut block = Vec::new();
    for (key, value) in vars {
        block.extend(format!("{}={}", key, value).encode_utf16());
        block.push(0);
    }
    block.push(0);
    block
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// ConPTY handle wrapper
pub struct ConPtyBackend {
    hpc: HPCON,
    input_write: HANDLE,
    output_read: HANDLE,
    process: PROCESS_INFORMATION,
}

// Safety: the handles are only used through Win32 calls that are safe to
// issue from any thread; the pseudo console lives until Drop.
unsafe impl Send for ConPtyBackend {}
unsafe impl Sync for ConPtyBackend {}

impl ConPtyBackend {
    /// Create a pseudo console and start `spec` attached to it
    pub fn spawn(spec: &SpawnSpec, cols: u16, rows: u16) -> Result<Self, TransportError> {
        let spawn_error = |stage: &str, e: windows::core::Error| TransportError::Spawn {
            program: spec.program.clone(),
            reason: format!("{}: {}", stage, e),
        };

        unsafe {
            let mut pty_input_read = HANDLE::default();
            let mut pty_input_write = HANDLE::default();
            let mut pty_output_read = HANDLE::default();
            let mut pty_output_write = HANDLE::default();

            // Input pipe (we write, PTY reads)
            CreatePipe(&mut pty_input_read, &mut pty_input_write, None, 0)
                .map_err(|e| spawn_error("failed to create pipe", e))?;

            // Output pipe (PTY writes, we read)
            CreatePipe(&mut pty_output_read, &mut pty_output_write, None, 0)
                .map_err(|e| spawn_error("failed to create pipe", e))?;

            let hpc = CreatePseudoConsole(coord(cols, rows), pty_input_read, pty_output_write, 0)
                .map_err(|e| spawn_error("failed to create pseudo console", e))?;

            // The pseudo console holds its own references now
            let _ = CloseHandle(pty_input_read);
            let _ = CloseHandle(pty_output_write);

            let mut backend = ConPtyBackend {
                hpc,
                input_write: pty_input_write,
                output_read: pty_output_read,
                process: PROCESS_INFORMATION::default(),
            };
            backend.process = Self::create_process(spec, hpc).map_err(|e| spawn_error("failed to start process", e))?;
            Ok(backend)
        }
    }

    unsafe fn create_process(spec: &SpawnSpec, hpc: HPCON) -> windows::core::Result<PROCESS_INFORMATION> {
        let mut attr_list_size: usize = 0;
        let _ = InitializeProcThreadAttributeList(
            LPPROC_THREAD_ATTRIBUTE_LIST::default(),
            1,
            0,
            &mut attr_list_size,
        );

        let mut attr_list_buffer = vec![0u8; attr_list_size];
        let attr_list = LPPROC_THREAD_ATTRIBUTE_LIST(attr_list_buffer.as_mut_ptr() as *mut _);
        InitializeProcThreadAttributeList(attr_list, 1, 0, &mut attr_list_size)?;

        UpdateProcThreadAttribute(
            attr_list,
            0,
            PROC_THREAD_ATTRIBUTE_PSEUDOCONSOLE,
            Some(hpc.0 as *const _),
            std::mem::size_of::<HPCON>(),
            None,
            None,
        )?;

        let mut startup_info = STARTUPINFOEXW {
            StartupInfo: std::mem::zeroed(),
            lpAttributeList: attr_list,
        };
        startup_info.StartupInfo.cb = std::mem::size_of::<STARTUPINFOEXW>() as u32;

        let mut cmd_wide = wide(&spec.command_line());
        let cwd_wide = spec.cwd.as_ref().map(|p| wide(&p.to_string_lossy()));
        let env_block = (!spec.env.is_empty()).then(|| environment_block(&spec.env));

        let mut flags = EXTENDED_STARTUPINFO_PRESENT;
        if env_block.is_some() {
            flags |= CREATE_UNICODE_ENVIRONMENT;
        }

        let mut process_info = PROCESS_INFORMATION::default();
        let result = CreateProcessW(
            PCWSTR::null(),
            PWSTR(cmd_wide.as_mut_ptr()),
            None,
            None,
            false,
            flags,
            env_block.as_ref().map(|b| b.as_ptr() as *const c_void),
            cwd_wide
                .as_ref()
                .map_or(PCWSTR::null(), |w| PCWSTR(w.as_ptr())),
            &startup_info.StartupInfo,
            &mut process_info,
        );

        DeleteProcThreadAttributeList(attr_list);
        result.map(|()| process_info)
    }

    fn has_exited(&self) -> bool {
        unsafe { WaitForSingleObject(self.process.hProcess, 0) == WAIT_OBJECT_0 }
    }
}

impl PtyBackend for ConPtyBackend {
    /// Non-blocking: peeks the pipe and reports `Idle` when empty
    fn read(&self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        let mut available: u32 = 0;

        unsafe {
            if PeekNamedPipe(self.output_read, None, 0, None, Some(&mut available), None).is_err() {
                // Pipe closed - the pseudo console is gone
                return Ok(ReadOutcome::Eof);
            }
        }

        if available == 0 {
            return Ok(ReadOutcome::Idle);
        }

        let to_read = (available as usize).min(buf.len());
        let mut read: u32 = 0;
        unsafe {
            ReadFile(self.output_read, Some(&mut buf[..to_read]), Some(&mut read), None)
                .map_err(win_to_io)?;
        }

        Ok(ReadOutcome::Data(read as usize))
    }

    fn write_all(&self, mut data: &[u8]) -> io::Result<()> {
        while !data.is_empty() {
            let mut written: u32 = 0;
            unsafe {
                WriteFile(self.input_write, Some(data), Some(&mut written), None)
                    .map_err(win_to_io)?;
            }
            if written == 0 {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "PTY accepted no bytes"));
            }
            data = &data[written as usize..];
        }
        Ok(())
    }

    fn resize(&self, cols: u16, rows: u16) -> io::Result<()> {
        unsafe { ResizePseudoConsole(self.hpc, coord(cols, rows)).map_err(win_to_io) }
    }

    fn try_exit_code(&self) -> io::Result<Option<u32>> {
        if !self.has_exited() {
            return Ok(None);
        }
        let mut exit_code: u32 = 0;
        unsafe {
            GetExitCodeProcess(self.process.hProcess, &mut exit_code).map_err(win_to_io)?;
        }
        Ok(Some(exit_code))
    }

    fn kill(&self) {
        if self.has_exited() {
            return;
        }
        unsafe {
            if let Err(e) = TerminateProcess(self.process.hProcess, 1) {
                tracing::debug!("Failed to terminate process: {}", e);
            }
        }
    }

    /// Cancel pending read operations (to unblock the reader thread)
    fn cancel_read(&self) {
        unsafe {
            let _ = CancelIoEx(self.output_read, None);
        }
    }
}

impl Drop for ConPtyBackend {
    fn drop(&mut self) {
        unsafe {
            // Close the pseudo console first
            ClosePseudoConsole(self.hpc);

            let _ = CloseHandle(self.input_write);
            let _ = CloseHandle(self.output_read);
            if !self.process.hProcess.is_invalid() {
                let _ = CloseHandle(self.process.hProcess);
                let _ = CloseHandle(self.process.hThread);
            }
        }
    }
}
