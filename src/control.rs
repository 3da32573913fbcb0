//! Synchronous device control call built on the overlapped primitives.
//!
//! No Token escapes: the completion signal and the context record live for
//! the duration of the call, and the call blocks without a ceiling until the
//! platform reports the request finished.

use log::Level;
use metrics::counter;

use crate::platform::{Platform, SignalGuard, Submit};
use crate::status::{from_win32, TeeError, TeeResult};
use crate::tee_log;

/// Send control code `code` with `input`, receive into `output`.
///
/// Returns the number of bytes the device wrote to `output`.
pub fn control<P: Platform>(
    platform: &P,
    handle: P::Handle,
    code: u32,
    input: &[u8],
    output: &mut [u8],
) -> TeeResult<usize> {
    tee_log!(Level::Trace, "control", "control 0x{:08x} (in {} / out {} bytes)", code, input.len(), output.len());

    if !platform.is_valid_handle(handle) {
        tee_log!(Level::Error, "control", "control 0x{:08x}: invalid handle", code);
        return Err(TeeError::InvalidParameter);
    }
    if u32::try_from(input.len()).is_err() || u32::try_from(output.len()).is_err() {
        tee_log!(Level::Error, "control", "control 0x{:08x}: buffer exceeds 4 GiB", code);
        return Err(TeeError::InvalidParameter);
    }

    let signal = SignalGuard::create(platform).map_err(|err| {
        tee_log!(Level::Error, "control", "signal creation failed, error: {}", err);
        from_win32(err)
    })?;
    let mut ctx = platform.new_context();
    signal.arm(&mut ctx);

    counter!("teeio_control_calls").increment(1);

    // SAFETY: `ctx`, `input` and `output` outlive the blocking result
    // retrieval below, which only returns once the request has finished.
    match unsafe { platform.submit_control(handle, code, input, output, &mut ctx) } {
        Submit::Completed(_) => {}
        Submit::Pending => {
            tee_log!(Level::Debug, "control", "control 0x{:08x} pending", code);
        }
        Submit::Failed(err) => {
            tee_log!(Level::Error, "control", "control 0x{:08x} failed, error: {}", code, err);
            return Err(from_win32(err));
        }
    }

    let bytes = platform.overlapped_result(handle, &mut ctx, true).map_err(|err| {
        tee_log!(Level::Error, "control", "control 0x{:08x} result failed, error: {}", code, err);
        from_win32(err)
    })?;

    tee_log!(Level::Trace, "control", "control 0x{:08x}: {} bytes", code, bytes);
    Ok(bytes as usize)
}
