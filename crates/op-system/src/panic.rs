//! Crash trace capture and one-shot boot replay
//!
//! A fatal error writes a fixed-layout record into memory that survives a
//! soft reset; the next boot replays it once as a recovery dialog. The
//! layout is byte-stable so external diagnostics tooling can read the raw
//! region. Nothing on the record path may allocate: the allocator itself
//! may be what failed.

use crate::platform::Platform;
use bytemuck::{Pod, Zeroable};
use std::ptr::{self, NonNull};
use std::sync::atomic::{compiler_fence, AtomicBool, Ordering};
use std::sync::Arc;

/// Validity marker; any other value in the magic word means "no trace"
pub const TRACE_MAGIC: u32 = 0x12345678;

/// Capacity of each text field, including the null terminator
pub const TRACE_TEXT_LEN: usize = 128;

/// Maximum captured return addresses
pub const TRACE_DEPTH: usize = 32;

/// Numeric fault class stored alongside the trace
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    Panic = 0,
    OutOfMemory = 1,
    Assertion = 2,
}

/// Fixed-layout crash record
///
/// The magic word comes first and is written last, so a partially-written
/// record never looks valid. Text fields are null-terminated and truncated
/// on overflow; unused backtrace entries are zero.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct PanicTrace {
    pub magic: u32,
    pub error_code: u32,
    pub message: [u8; TRACE_TEXT_LEN],
    pub function: [u8; TRACE_TEXT_LEN],
    pub file: [u8; TRACE_TEXT_LEN],
    pub backtrace: [u32; TRACE_DEPTH],
}

/// Owned copy of a consumed trace, ready for display
#[derive(Debug, Clone)]
pub struct PanicReport {
    pub error_code: u32,
    pub message: String,
    pub function: String,
    pub file: String,
    pub backtrace: Vec<u32>,
}

/// Writes and replays panic traces in the platform's retained region
pub struct PanicRecorder {
    platform: Arc<dyn Platform>,
    region: NonNull<PanicTrace>,
    recording: AtomicBool,
}

// Safety: the region points into platform-owned retained memory that lives
// for the whole process; all writes happen on the single panicking thread
// guarded by the `recording` flag.
unsafe impl Send for PanicRecorder {}
unsafe impl Sync for PanicRecorder {}

impl PanicRecorder {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        let region = platform.retained_trace();
        Self {
            platform,
            region,
            recording: AtomicBool::new(false),
        }
    }

    /// Capture a trace for a fatal error.
    ///
    /// Truncates text fields, walks the stack through the platform, and
    /// commits the magic word last. If a fault occurs while a trace is
    /// already being recorded, the recorder gives up and hard-restarts
    /// instead of looping.
    pub fn record(&self, code: FaultCode, message: &str, function: &str, file: &str) {
        if self.recording.swap(true, Ordering::SeqCst) {
            self.platform.restart();
        }

        let trace = self.region.as_ptr();
        // Safety: the platform guarantees the region is valid, exclusive to
        // this recorder, and properly aligned for `PanicTrace`.
        unsafe {
            ptr::write_volatile(ptr::addr_of_mut!((*trace).magic), 0);
            (*trace).error_code = code as u32;
            write_text(&mut (*trace).message, message);
            write_text(&mut (*trace).function, function);
            write_text(&mut (*trace).file, file);

            let depth = self.platform.capture_backtrace(&mut (*trace).backtrace);
            for entry in (&mut (*trace).backtrace)[depth..].iter_mut() {
                *entry = 0;
            }

            // The record must be fully visible before it becomes valid
            compiler_fence(Ordering::SeqCst);
            ptr::write_volatile(ptr::addr_of_mut!((*trace).magic), TRACE_MAGIC);
        }
    }

    /// Replay and invalidate a pending trace.
    ///
    /// Returns the trace left by the previous session, if any, and clears
    /// the magic word so the same trace is never replayed twice.
    pub fn consume(&self) -> Option<PanicReport> {
        let trace = self.region.as_ptr();
        // Safety: same region contract as `record`.
        unsafe {
            if ptr::read_volatile(ptr::addr_of!((*trace).magic)) != TRACE_MAGIC {
                return None;
            }

            let copy: PanicTrace = *trace;
            ptr::write_volatile(ptr::addr_of_mut!((*trace).magic), 0);

            let depth = copy
                .backtrace
                .iter()
                .position(|&addr| addr == 0)
                .unwrap_or(TRACE_DEPTH);

            Some(PanicReport {
                error_code: copy.error_code,
                message: read_text(&copy.message),
                function: read_text(&copy.function),
                file: read_text(&copy.file),
                backtrace: copy.backtrace[..depth].to_vec(),
            })
        }
    }
}

/// Copy `text` into a fixed field, truncated and null-terminated
fn write_text(buf: &mut [u8; TRACE_TEXT_LEN], text: &str) {
    let len = text.len().min(TRACE_TEXT_LEN - 1);
    buf[..len].copy_from_slice(&text.as_bytes()[..len]);
    for byte in buf[len..].iter_mut() {
        *byte = 0;
    }
}

/// Read a null-terminated field back out, lossily
fn read_text(buf: &[u8; TRACE_TEXT_LEN]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(TRACE_TEXT_LEN);
    String::from_utf8_lossy(&buf[..end]).into_owned()
}
