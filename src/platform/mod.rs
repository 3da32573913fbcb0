//! OS seam for the overlapped I/O core.
//!
//! The core never calls the operating system directly. Everything it needs
//! (completion signals, overlapped submission, waiting, result retrieval,
//! cancellation and the device interface registry) goes through
//! [`Platform`], so the lifecycle logic in `overlapped`, `control` and
//! `devpath` is the same for the Win32 backend and for instrumented test
//! doubles.
//!
//! Error values crossing this seam are raw Win32 codes (`u32`); callers
//! translate them with [`crate::status::from_win32`].

#[cfg(windows)]
pub mod win32;

use std::fmt;
use std::time::Duration;

use crate::interface::InterfaceId;

/// Which transfer primitive a begun operation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Read,
    Write,
}

impl OperationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            OperationKind::Read => "read",
            OperationKind::Write => "write",
        }
    }
}

/// How long End-Operation may block on a completion signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    #[default]
    Infinite,
    After(Duration),
}

impl Timeout {
    /// Win32 `INFINITE`.
    pub const INFINITE_MS: u32 = u32::MAX;

    /// Milliseconds for a platform wait; finite values saturate just below
    /// [`Timeout::INFINITE_MS`] so a long timeout never turns into "forever".
    pub fn as_millis(self) -> u32 {
        match self {
            Timeout::Infinite => Self::INFINITE_MS,
            Timeout::After(d) => {
                u32::try_from(d.as_millis()).map_or(Self::INFINITE_MS - 1, |ms| {
                    ms.min(Self::INFINITE_MS - 1)
                })
            }
        }
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Timeout::After(d)
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeout::Infinite => f.write_str("infinite"),
            Timeout::After(d) => write!(f, "{}", humantime::format_duration(*d)),
        }
    }
}

/// Immediate outcome of handing an overlapped request to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submit {
    /// Satisfied synchronously; the signal is set and the result is ready.
    Completed(u32),
    /// Queued (`ERROR_IO_PENDING`).
    Pending,
    /// Rejected; nothing is in flight.
    Failed(u32),
}

/// Outcome of waiting on a completion signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Signaled,
    TimedOut,
    Failed(u32),
}

/// Operating-system primitives used by the core.
///
/// `Signal` is a manual-reset, initially unset completion event. `Context`
/// is the per-operation asynchronous record (`OVERLAPPED` on Windows); once
/// submitted, the platform may write to it and to the transfer buffers until
/// the result has been drained with [`Platform::overlapped_result`].
pub trait Platform {
    type Handle: Copy + fmt::Debug;
    type Signal;
    type Context;

    /// `false` for the invalid-handle sentinel (and null).
    fn is_valid_handle(&self, handle: Self::Handle) -> bool;

    fn create_signal(&self) -> Result<Self::Signal, u32>;

    fn close_signal(&self, signal: Self::Signal);

    /// A zeroed context record.
    fn new_context(&self) -> Self::Context;

    /// Attach `signal` as the completion signal of `ctx`.
    fn arm(&self, ctx: &mut Self::Context, signal: &Self::Signal);

    /// Queue a read or write of `buffer` against `handle`.
    ///
    /// # Safety
    /// Unless this returns [`Submit::Failed`], `ctx` and `buffer` must stay
    /// alive and at the same address until [`Platform::overlapped_result`]
    /// has reported the operation finished (or they are leaked).
    unsafe fn submit_transfer(
        &self,
        handle: Self::Handle,
        kind: OperationKind,
        buffer: &mut [u8],
        ctx: &mut Self::Context,
    ) -> Submit;

    /// Queue a device control request.
    ///
    /// # Safety
    /// Same contract as [`Platform::submit_transfer`], for `ctx`, `input`
    /// and `output`.
    unsafe fn submit_control(
        &self,
        handle: Self::Handle,
        code: u32,
        input: &[u8],
        output: &mut [u8],
        ctx: &mut Self::Context,
    ) -> Submit;

    fn wait_signal(&self, signal: &Self::Signal, timeout: Timeout) -> WaitOutcome;

    /// Transferred byte count of the operation tracked by `ctx`.
    /// With `block`, waits for the operation to finish first.
    fn overlapped_result(
        &self,
        handle: Self::Handle,
        ctx: &mut Self::Context,
        block: bool,
    ) -> Result<u32, u32>;

    /// Request cancellation of exactly the operation tracked by `ctx`.
    fn cancel(&self, handle: Self::Handle, ctx: &mut Self::Context) -> Result<(), u32>;

    /// Size in bytes of the multi-string list of present interface paths,
    /// including the list terminator.
    fn interface_list_size(&self, id: &InterfaceId) -> Result<u32, u32>;

    /// Fill `list` with the multi-string list of present interface paths.
    fn interface_list(&self, id: &InterfaceId, list: &mut [u8]) -> Result<(), u32>;
}

/// Scoped owner of a completion signal: closed on drop unless handed off.
pub(crate) struct SignalGuard<'p, P: Platform> {
    platform: &'p P,
    signal: Option<P::Signal>,
}

impl<'p, P: Platform> SignalGuard<'p, P> {
    pub(crate) fn create(platform: &'p P) -> Result<Self, u32> {
        let signal = platform.create_signal()?;
        metrics::counter!("teeio_signals_created").increment(1);
        Ok(Self { platform, signal: Some(signal) })
    }

    /// Attach the guarded signal to `ctx`.
    pub(crate) fn arm(&self, ctx: &mut P::Context) {
        if let Some(signal) = &self.signal {
            self.platform.arm(ctx, signal);
        }
    }

    pub(crate) fn into_inner(mut self) -> Option<P::Signal> {
        self.signal.take()
    }
}

impl<P: Platform> Drop for SignalGuard<'_, P> {
    fn drop(&mut self) {
        if let Some(signal) = self.signal.take() {
            release_signal(self.platform, signal);
        }
    }
}

pub(crate) fn release_signal<P: Platform>(platform: &P, signal: P::Signal) {
    platform.close_signal(signal);
    metrics::counter!("teeio_signals_released").increment(1);
}
