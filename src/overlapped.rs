//! Begin/End overlapped read and write.
//!
//! [`begin_read`] / [`begin_write`] queue a transfer and hand back a
//! [`Token`] that owns the in-flight operation: the platform context record,
//! the transfer buffer and the completion signal. [`Token::end`] is the only
//! consuming operation. It waits (bounded by a [`Timeout`]), collects the
//! byte count and returns the buffer.
//!
//! A Token releases its signal on every path, including being dropped
//! without `end`. What happens to an operation still in flight at that point
//! is governed by its [`TimeoutPolicy`].

use std::time::Duration;

use metrics::counter;
use serde::Deserialize;

use crate::platform::{
    release_signal, OperationKind, Platform, SignalGuard, Submit, Timeout, WaitOutcome,
};
use crate::status::{from_win32, win32, TeeError, TeeResult};
use crate::tee_log;
use log::Level;

/// What to do with an operation that is still in flight when its Token is
/// released (End timed out, the wait failed, or the Token was dropped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutPolicy {
    /// Cancel the operation and wait up to [`CANCEL_GRACE`] for the
    /// cancellation to land before freeing the record and buffer. An
    /// operation that does not settle in time is abandoned.
    #[default]
    Cancel,
    /// Leave the operation running. The record and buffer are leaked so a
    /// late completion still targets live memory.
    Abandon,
}

/// How long a cancelled operation may take to settle before its record is
/// abandoned instead.
pub const CANCEL_GRACE: Timeout = Timeout::After(Duration::from_millis(500));

/// Heap record shared with the platform while the operation is in flight.
struct Record<C> {
    ctx: C,
    buffer: Vec<u8>,
}

/// A finished transfer: the byte count and the buffer it used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    bytes: usize,
    buffer: Vec<u8>,
}

impl Completion {
    /// Bytes the platform reported as transferred.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// The transferred prefix of the buffer.
    pub fn data(&self) -> &[u8] {
        &self.buffer[..self.bytes.min(self.buffer.len())]
    }

    /// The whole buffer, as originally passed to Begin.
    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }
}

/// One in-flight overlapped operation.
///
/// Never reused: one Token is one operation. Must be finished with
/// [`Token::end`]; dropping it instead cancels or abandons the operation
/// according to its policy.
///
/// A Token is `Send` whenever the platform's handle, signal and context are,
/// so Begin and End may run on different threads.
#[must_use = "an overlapped operation must be finished with `end`"]
pub struct Token<'p, P: Platform> {
    platform: &'p P,
    handle: P::Handle,
    kind: OperationKind,
    signal: Option<P::Signal>,
    record: Option<Box<Record<P::Context>>>,
    in_flight: bool,
    policy: TimeoutPolicy,
}

/// Queue an overlapped read into `buffer`.
pub fn begin_read<P: Platform>(
    platform: &P,
    handle: P::Handle,
    buffer: Vec<u8>,
) -> TeeResult<Token<'_, P>> {
    begin(platform, OperationKind::Read, handle, buffer)
}

/// Queue an overlapped write of `buffer`.
pub fn begin_write<P: Platform>(
    platform: &P,
    handle: P::Handle,
    buffer: Vec<u8>,
) -> TeeResult<Token<'_, P>> {
    begin(platform, OperationKind::Write, handle, buffer)
}

/// Shared body of Begin-Read / Begin-Write.
pub fn begin<P: Platform>(
    platform: &P,
    kind: OperationKind,
    handle: P::Handle,
    buffer: Vec<u8>,
) -> TeeResult<Token<'_, P>> {
    tee_log!(Level::Trace, "overlapped", "begin {} ({} bytes)", kind.as_str(), buffer.len());

    if !platform.is_valid_handle(handle) {
        tee_log!(Level::Error, "overlapped", "begin {}: invalid handle", kind.as_str());
        return Err(TeeError::InvalidParameter);
    }
    if buffer.is_empty() {
        tee_log!(Level::Error, "overlapped", "begin {}: empty buffer", kind.as_str());
        return Err(TeeError::InvalidParameter);
    }
    if u32::try_from(buffer.len()).is_err() {
        tee_log!(Level::Error, "overlapped", "begin {}: buffer exceeds 4 GiB", kind.as_str());
        return Err(TeeError::InvalidParameter);
    }

    let mut record = Box::new(Record { ctx: platform.new_context(), buffer });

    let signal = SignalGuard::create(platform).map_err(|err| {
        tee_log!(Level::Error, "overlapped", "signal creation failed, error: {}", err);
        TeeError::InternalError
    })?;
    signal.arm(&mut record.ctx);

    let Record { ctx, buffer } = &mut *record;
    // SAFETY: `record` is boxed and moves into the Token below; the Token
    // drains or leaks it before the allocation can be freed.
    let submitted = unsafe { platform.submit_transfer(handle, kind, buffer, ctx) };

    match submitted {
        Submit::Completed(n) => {
            tee_log!(Level::Debug, "overlapped", "{} completed inline ({} bytes)", kind.as_str(), n);
        }
        Submit::Pending => {
            tee_log!(Level::Debug, "overlapped", "{} pending", kind.as_str());
        }
        Submit::Failed(err) => {
            tee_log!(Level::Error, "overlapped", "{} submission failed, error: {}", kind.as_str(), err);
            // `signal` guard and `record` drop here; nothing is in flight.
            return Err(from_win32(err));
        }
    }

    counter!("teeio_operations_started", "kind" => kind.as_str()).increment(1);

    Ok(Token {
        platform,
        handle,
        kind,
        signal: signal.into_inner(),
        record: Some(record),
        in_flight: true,
        policy: TimeoutPolicy::default(),
    })
}

impl<'p, P: Platform> Token<'p, P> {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn policy(&self) -> TimeoutPolicy {
        self.policy
    }

    /// Choose how an unfinished operation is handled on release.
    pub fn with_timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Wait up to `timeout` for the operation, then release the Token.
    ///
    /// Resources are released whatever the outcome. On `Timeout` the
    /// operation is cancelled or abandoned per [`TimeoutPolicy`].
    pub fn end(mut self, timeout: Timeout) -> TeeResult<Completion> {
        let kind = self.kind.as_str();
        tee_log!(Level::Trace, "overlapped", "end {} (timeout {})", kind, timeout);

        let Some(signal) = self.signal.as_ref() else {
            return Err(TeeError::InternalError);
        };

        match self.platform.wait_signal(signal, timeout) {
            WaitOutcome::Signaled => {}
            WaitOutcome::TimedOut => {
                tee_log!(Level::Warn, "overlapped", "{} timed out after {}", kind, timeout);
                counter!("teeio_operations_timed_out", "kind" => kind).increment(1);
                return Err(TeeError::Timeout);
            }
            WaitOutcome::Failed(err) => {
                tee_log!(Level::Error, "overlapped", "wait on {} failed, error: {}", kind, err);
                return Err(from_win32(err));
            }
        }

        let Some(mut record) = self.record.take() else {
            return Err(TeeError::InternalError);
        };
        // The signal fired, so this returns without blocking in practice.
        let result = self.platform.overlapped_result(self.handle, &mut record.ctx, true);
        self.in_flight = false;

        let bytes = result.map_err(|err| {
            tee_log!(Level::Error, "overlapped", "{} result failed, error: {}", kind, err);
            from_win32(err)
        })?;

        counter!("teeio_operations_completed", "kind" => kind).increment(1);
        tee_log!(Level::Trace, "overlapped", "end {}: {} bytes", kind, bytes);

        Ok(Completion { bytes: bytes as usize, buffer: record.buffer })
    }

    /// Settle an operation that may still be in flight, then free what is safe to free.
    fn release(&mut self) {
        if let Some(mut record) = self.record.take() {
            if self.in_flight {
                match self.policy {
                    TimeoutPolicy::Cancel if self.cancel_and_drain(&mut record) => {}
                    _ => {
                        tee_log!(Level::Warn, "overlapped", "abandoning in-flight {}", self.kind.as_str());
                        counter!("teeio_operations_abandoned").increment(1);
                        let _leaked = Box::leak(record);
                    }
                }
            }
        }
        self.in_flight = false;

        if let Some(signal) = self.signal.take() {
            release_signal(self.platform, signal);
        }
    }

    /// `true` once the platform is done with `record`.
    ///
    /// A driver may accept the cancel and still never complete the request,
    /// so the drain waits at most [`CANCEL_GRACE`] and then only polls.
    fn cancel_and_drain(&self, record: &mut Record<P::Context>) -> bool {
        let kind = self.kind.as_str();
        match self.platform.cancel(self.handle, &mut record.ctx) {
            Ok(()) => {
                counter!("teeio_operations_cancelled").increment(1);
            }
            // Already finished: nothing left to cancel, the drain returns at once.
            Err(win32::ERROR_NOT_FOUND) => {}
            Err(err) => {
                tee_log!(Level::Error, "overlapped", "cancel {} failed, error: {}", kind, err);
                return false;
            }
        }

        if let Some(signal) = self.signal.as_ref() {
            if let WaitOutcome::Failed(err) = self.platform.wait_signal(signal, CANCEL_GRACE) {
                tee_log!(Level::Debug, "overlapped", "wait for cancelled {} failed, error: {}", kind, err);
            }
        }

        match self.platform.overlapped_result(self.handle, &mut record.ctx, false) {
            Ok(n) => {
                tee_log!(Level::Debug, "overlapped", "{} finished before cancel ({} bytes dropped)", kind, n);
            }
            Err(win32::ERROR_IO_INCOMPLETE) => {
                tee_log!(Level::Warn, "overlapped", "{} still pending {} after cancel", kind, CANCEL_GRACE);
                return false;
            }
            Err(win32::ERROR_OPERATION_ABORTED) => {
                tee_log!(Level::Debug, "overlapped", "{} cancelled", kind);
            }
            Err(err) => {
                tee_log!(Level::Debug, "overlapped", "{} drained with error: {}", kind, err);
            }
        }
        true
    }
}

impl<P: Platform> Drop for Token<'_, P> {
    fn drop(&mut self) {
        self.release();
    }
}
