//! `Device`: a platform, an open handle and the configured settings.
//!
//! The handle is owned by the caller; `Device` only borrows it as the target
//! of its operations.

use crate::config::DeviceSettings;
use crate::control;
use crate::overlapped::{self, Token};
use crate::platform::{OperationKind, Platform};
use crate::status::TeeResult;

pub struct Device<'p, P: Platform> {
    platform: &'p P,
    handle: P::Handle,
    settings: DeviceSettings,
}

impl<'p, P: Platform> Device<'p, P> {
    pub fn new(platform: &'p P, handle: P::Handle, settings: DeviceSettings) -> Self {
        Self { platform, handle, settings }
    }

    pub fn handle(&self) -> P::Handle {
        self.handle
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    /// Begin-Read with the configured timeout policy.
    pub fn begin_read(&self, buffer: Vec<u8>) -> TeeResult<Token<'p, P>> {
        self.begin(OperationKind::Read, buffer)
    }

    /// Begin-Write with the configured timeout policy.
    pub fn begin_write(&self, buffer: Vec<u8>) -> TeeResult<Token<'p, P>> {
        self.begin(OperationKind::Write, buffer)
    }

    fn begin(&self, kind: OperationKind, buffer: Vec<u8>) -> TeeResult<Token<'p, P>> {
        overlapped::begin(self.platform, kind, self.handle, buffer)
            .map(|token| token.with_timeout_policy(self.settings.on_timeout))
    }

    /// Read up to `len` bytes, waiting at most the configured timeout.
    pub fn read(&self, len: usize) -> TeeResult<Vec<u8>> {
        let done = self.begin_read(vec![0; len])?.end(self.settings.timeout)?;
        let bytes = done.bytes();
        let mut data = done.into_buffer();
        data.truncate(bytes);
        Ok(data)
    }

    /// Write `data`, waiting at most the configured timeout.
    /// Returns the number of bytes written.
    pub fn write(&self, data: &[u8]) -> TeeResult<usize> {
        let done = self.begin_write(data.to_vec())?.end(self.settings.timeout)?;
        Ok(done.bytes())
    }

    /// Blocking control call; see [`control::control`].
    pub fn control(&self, code: u32, input: &[u8], output: &mut [u8]) -> TeeResult<usize> {
        control::control(self.platform, self.handle, code, input, output)
    }
}
