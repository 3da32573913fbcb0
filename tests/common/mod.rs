//! Instrumented in-memory `Platform` for the integration tests.
//!
//! Stands in for the Win32 backend: operations complete according to a
//! per-submission script, completion signals are real blocking events, and
//! every signal and context record is counted so tests can assert that
//! nothing leaks and nothing is released twice.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use teeio::platform::{OperationKind, Platform, Submit, Timeout, WaitOutcome};
use teeio::status::win32;
use teeio::InterfaceId;

pub const VALID: u32 = 7;
pub const INVALID: u32 = u32::MAX;

/// Byte pattern the mock "device" reads into buffers.
pub const FILL: u8 = 0xA5;

/// How the next submitted operation behaves.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Completes inline with this many bytes (capped at the buffer size).
    Complete(u32),
    /// Pending, completed by another thread after the delay.
    Later(Duration, u32),
    /// Pending forever unless cancelled.
    Never,
    /// Pending forever; cancel is accepted but has no effect.
    IgnoresCancel,
    /// Rejected at submission.
    Fail(u32),
    /// Pending, then finishes with this error.
    CompleteWithError(u32),
}

#[derive(Default)]
pub struct Counters {
    pub signals_created: AtomicUsize,
    pub signals_closed: AtomicUsize,
    pub contexts_created: AtomicUsize,
    pub contexts_dropped: AtomicUsize,
    pub cancels: AtomicUsize,
    pub submissions: AtomicUsize,
}

/// Manual-reset event.
pub struct MockEvent {
    set: Mutex<bool>,
    cv: Condvar,
    closed: AtomicBool,
}

impl MockEvent {
    fn new() -> Self {
        Self { set: Mutex::new(false), cv: Condvar::new(), closed: AtomicBool::new(false) }
    }

    fn set(&self) {
        *self.set.lock().unwrap() = true;
        self.cv.notify_all();
    }

    fn wait(&self, timeout: Timeout) -> bool {
        let guard = self.set.lock().unwrap();
        match timeout {
            Timeout::Infinite => *self.cv.wait_while(guard, |set| !*set).unwrap(),
            Timeout::After(d) => *self.cv.wait_timeout_while(guard, d, |set| !*set).unwrap().0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpState {
    Pending,
    Done(Result<u32, u32>),
    Cancelled,
}

struct Op {
    state: Mutex<OpState>,
    honours_cancel: bool,
}

pub struct MockContext {
    signal: Option<Arc<MockEvent>>,
    op: Option<Arc<Op>>,
    counters: Arc<Counters>,
}

impl Drop for MockContext {
    fn drop(&mut self) {
        self.counters.contexts_dropped.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct State {
    script: VecDeque<Behavior>,
    signal_error: Option<u32>,
    wait_error: Option<u32>,
    cancel_error: Option<u32>,
    written: Vec<u8>,
    control_reply: Vec<u8>,
    last_control: Option<(u32, Vec<u8>)>,
    interfaces: HashMap<InterfaceId, Vec<u8>>,
    list_size_error: Option<u32>,
    list_error: Option<u32>,
}

#[derive(Default)]
pub struct MockPlatform {
    pub counters: Arc<Counters>,
    state: Mutex<State>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, behaviors: impl IntoIterator<Item = Behavior>) {
        self.state.lock().unwrap().script.extend(behaviors);
    }

    pub fn fail_signal_creation(&self, code: u32) {
        self.state.lock().unwrap().signal_error = Some(code);
    }

    pub fn fail_wait(&self, code: u32) {
        self.state.lock().unwrap().wait_error = Some(code);
    }

    pub fn fail_cancel(&self, code: u32) {
        self.state.lock().unwrap().cancel_error = Some(code);
    }

    pub fn set_control_reply(&self, reply: &[u8]) {
        self.state.lock().unwrap().control_reply = reply.to_vec();
    }

    pub fn last_control(&self) -> Option<(u32, Vec<u8>)> {
        self.state.lock().unwrap().last_control.clone()
    }

    pub fn written(&self) -> Vec<u8> {
        self.state.lock().unwrap().written.clone()
    }

    /// Register the present device paths for `id`.
    pub fn add_interface(&self, id: InterfaceId, paths: &[&str]) {
        let mut list = Vec::new();
        for p in paths {
            list.extend_from_slice(p.as_bytes());
            list.push(0);
        }
        list.push(0);
        self.state.lock().unwrap().interfaces.insert(id, list);
    }

    pub fn fail_list_size(&self, cr: u32) {
        self.state.lock().unwrap().list_size_error = Some(cr);
    }

    pub fn fail_list(&self, cr: u32) {
        self.state.lock().unwrap().list_error = Some(cr);
    }

    pub fn signals_created(&self) -> usize {
        self.counters.signals_created.load(Ordering::SeqCst)
    }

    pub fn signals_closed(&self) -> usize {
        self.counters.signals_closed.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.counters.cancels.load(Ordering::SeqCst)
    }

    /// Context records never freed (created minus dropped).
    pub fn live_contexts(&self) -> usize {
        self.counters.contexts_created.load(Ordering::SeqCst)
            - self.counters.contexts_dropped.load(Ordering::SeqCst)
    }

    pub fn contexts_created(&self) -> usize {
        self.counters.contexts_created.load(Ordering::SeqCst)
    }

    fn next_behavior(&self, default: Behavior) -> Behavior {
        self.state.lock().unwrap().script.pop_front().unwrap_or(default)
    }

    /// Start tracking an operation on `ctx` and return the submission result.
    fn start(&self, ctx: &mut MockContext, behavior: Behavior, len: u32) -> Submit {
        self.counters.submissions.fetch_add(1, Ordering::SeqCst);
        let signal = ctx.signal.clone();

        let state = match behavior {
            Behavior::Fail(code) => return Submit::Failed(code),
            Behavior::Complete(n) => OpState::Done(Ok(n.min(len))),
            Behavior::CompleteWithError(code) => OpState::Done(Err(code)),
            Behavior::Later(..) | Behavior::Never | Behavior::IgnoresCancel => OpState::Pending,
        };
        let honours_cancel = !matches!(behavior, Behavior::IgnoresCancel);
        let op = Arc::new(Op { state: Mutex::new(state), honours_cancel });
        ctx.op = Some(op.clone());

        match behavior {
            Behavior::Complete(n) => {
                if let Some(s) = &signal {
                    s.set();
                }
                Submit::Completed(n.min(len))
            }
            Behavior::CompleteWithError(_) => {
                if let Some(s) = &signal {
                    s.set();
                }
                Submit::Pending
            }
            Behavior::Later(delay, n) => {
                thread::spawn(move || {
                    thread::sleep(delay);
                    let mut st = op.state.lock().unwrap();
                    if *st == OpState::Pending {
                        *st = OpState::Done(Ok(n.min(len)));
                    }
                    drop(st);
                    if let Some(s) = signal {
                        s.set();
                    }
                });
                Submit::Pending
            }
            Behavior::Never | Behavior::IgnoresCancel | Behavior::Fail(_) => Submit::Pending,
        }
    }
}

impl Platform for MockPlatform {
    type Handle = u32;
    type Signal = Arc<MockEvent>;
    type Context = MockContext;

    fn is_valid_handle(&self, handle: u32) -> bool {
        handle != INVALID && handle != 0
    }

    fn create_signal(&self) -> Result<Arc<MockEvent>, u32> {
        if let Some(code) = self.state.lock().unwrap().signal_error {
            return Err(code);
        }
        self.counters.signals_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockEvent::new()))
    }

    fn close_signal(&self, signal: Arc<MockEvent>) {
        assert!(!signal.closed.swap(true, Ordering::SeqCst), "signal closed twice");
        self.counters.signals_closed.fetch_add(1, Ordering::SeqCst);
    }

    fn new_context(&self) -> MockContext {
        self.counters.contexts_created.fetch_add(1, Ordering::SeqCst);
        MockContext { signal: None, op: None, counters: self.counters.clone() }
    }

    fn arm(&self, ctx: &mut MockContext, signal: &Arc<MockEvent>) {
        ctx.signal = Some(signal.clone());
    }

    unsafe fn submit_transfer(
        &self,
        _handle: u32,
        kind: OperationKind,
        buffer: &mut [u8],
        ctx: &mut MockContext,
    ) -> Submit {
        let behavior = self.next_behavior(Behavior::Complete(buffer.len() as u32));
        if !matches!(behavior, Behavior::Fail(_)) {
            match kind {
                OperationKind::Read => buffer.fill(FILL),
                OperationKind::Write => self.state.lock().unwrap().written.extend_from_slice(buffer),
            }
        }
        self.start(ctx, behavior, buffer.len() as u32)
    }

    unsafe fn submit_control(
        &self,
        _handle: u32,
        code: u32,
        input: &[u8],
        output: &mut [u8],
        ctx: &mut MockContext,
    ) -> Submit {
        let reply = {
            let mut st = self.state.lock().unwrap();
            st.last_control = Some((code, input.to_vec()));
            st.control_reply.clone()
        };
        if output.len() < reply.len() {
            return Submit::Failed(win32::ERROR_INSUFFICIENT_BUFFER);
        }
        let behavior = self.next_behavior(Behavior::Complete(reply.len() as u32));
        if !matches!(behavior, Behavior::Fail(_)) {
            output[..reply.len()].copy_from_slice(&reply);
        }
        self.start(ctx, behavior, reply.len() as u32)
    }

    fn wait_signal(&self, signal: &Arc<MockEvent>, timeout: Timeout) -> WaitOutcome {
        if let Some(code) = self.state.lock().unwrap().wait_error {
            return WaitOutcome::Failed(code);
        }
        if signal.wait(timeout) {
            WaitOutcome::Signaled
        } else {
            WaitOutcome::TimedOut
        }
    }

    fn overlapped_result(&self, _handle: u32, ctx: &mut MockContext, block: bool) -> Result<u32, u32> {
        let Some(op) = ctx.op.clone() else {
            return Err(win32::ERROR_INVALID_PARAMETER);
        };
        // Blocking mode waits for the operation like the real call does,
        // however long that takes.
        let pending = *op.state.lock().unwrap() == OpState::Pending;
        if pending && block {
            if let Some(s) = &ctx.signal {
                s.wait(Timeout::Infinite);
            }
        }
        match *op.state.lock().unwrap() {
            OpState::Done(result) => result,
            OpState::Cancelled => Err(win32::ERROR_OPERATION_ABORTED),
            OpState::Pending => Err(win32::ERROR_IO_INCOMPLETE),
        }
    }

    fn cancel(&self, _handle: u32, ctx: &mut MockContext) -> Result<(), u32> {
        if let Some(code) = self.state.lock().unwrap().cancel_error {
            return Err(code);
        }
        self.counters.cancels.fetch_add(1, Ordering::SeqCst);
        let Some(op) = &ctx.op else {
            return Err(win32::ERROR_NOT_FOUND);
        };
        let mut st = op.state.lock().unwrap();
        if *st != OpState::Pending {
            return Err(win32::ERROR_NOT_FOUND);
        }
        if !op.honours_cancel {
            return Ok(());
        }
        *st = OpState::Cancelled;
        if let Some(s) = &ctx.signal {
            s.set();
        }
        Ok(())
    }

    fn interface_list_size(&self, id: &InterfaceId) -> Result<u32, u32> {
        let st = self.state.lock().unwrap();
        if let Some(cr) = st.list_size_error {
            return Err(cr);
        }
        Ok(st.interfaces.get(id).map_or(1, |l| l.len() as u32))
    }

    fn interface_list(&self, id: &InterfaceId, list: &mut [u8]) -> Result<(), u32> {
        let st = self.state.lock().unwrap();
        if let Some(cr) = st.list_error {
            return Err(cr);
        }
        let src = st.interfaces.get(id).map_or(&[0u8][..], |l| l.as_slice());
        let n = src.len().min(list.len());
        list[..n].copy_from_slice(&src[..n]);
        Ok(())
    }
}
