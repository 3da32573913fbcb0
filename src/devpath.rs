//! Device path discovery through the device interface registry.
//!
//! Paths come back from the platform as a multi-string: NUL-terminated
//! entries followed by one extra NUL. An empty list is just that final NUL.

use log::Level;

use crate::interface::InterfaceId;
use crate::platform::Platform;
use crate::status::{TeeError, TeeResult};
use crate::tee_log;

/// Write the path of the first present device exposing `id` into `path`,
/// NUL-terminated, and return its length (without the terminator).
///
/// `path[0]` is cleared before anything else, so on failure the buffer
/// holds an empty string. A path that does not fit is an error, never
/// truncated.
pub fn resolve_device_path<P: Platform>(
    platform: &P,
    id: &InterfaceId,
    path: &mut [u8],
) -> TeeResult<usize> {
    tee_log!(Level::Trace, "devpath", "resolve {} into {} bytes", id, path.len());

    let Some(first) = path.first_mut() else {
        tee_log!(Level::Error, "devpath", "resolve {}: empty output buffer", id);
        return Err(TeeError::InternalError);
    };
    *first = 0;

    let list = present_interfaces(platform, id)?;
    let found = first_entry(&list).ok_or(TeeError::DeviceNotFound)?;

    if found.len() + 1 > path.len() {
        tee_log!(
            Level::Error,
            "devpath",
            "device path needs {} bytes, buffer holds {}",
            found.len() + 1,
            path.len()
        );
        return Err(TeeError::InternalError);
    }
    path[..found.len()].copy_from_slice(found);
    path[found.len()] = 0;

    tee_log!(Level::Debug, "devpath", "{} -> {}", id, String::from_utf8_lossy(found));
    Ok(found.len())
}

/// Path of the first present device exposing `id`.
pub fn device_path<P: Platform>(platform: &P, id: &InterfaceId) -> TeeResult<String> {
    let list = present_interfaces(platform, id)?;
    let found = first_entry(&list).ok_or(TeeError::DeviceNotFound)?;
    String::from_utf8(found.to_vec()).map_err(|_| {
        tee_log!(Level::Error, "devpath", "device path for {} is not valid UTF-8", id);
        TeeError::InternalError
    })
}

/// Fetch the raw multi-string list of present interface paths for `id`.
fn present_interfaces<P: Platform>(platform: &P, id: &InterfaceId) -> TeeResult<Vec<u8>> {
    let size = platform.interface_list_size(id).map_err(|cr| {
        tee_log!(Level::Error, "devpath", "error 0x{:x} retrieving device interface list size", cr);
        TeeError::InternalError
    })? as usize;

    if size <= 1 {
        tee_log!(Level::Debug, "devpath", "no present device exposes {}", id);
        return Err(TeeError::DeviceNotFound);
    }

    let mut list = Vec::new();
    list.try_reserve_exact(size).map_err(|_| {
        tee_log!(Level::Error, "devpath", "cannot allocate {} bytes for device interface list", size);
        TeeError::InternalError
    })?;
    list.resize(size, 0);

    platform.interface_list(id, &mut list).map_err(|cr| {
        tee_log!(Level::Error, "devpath", "error 0x{:x} retrieving device interface list", cr);
        TeeError::InternalError
    })?;
    Ok(list)
}

/// First entry of a multi-string, `None` if the list is empty.
fn first_entry(list: &[u8]) -> Option<&[u8]> {
    let end = list.iter().position(|&b| b == 0).unwrap_or(list.len());
    let entry = &list[..end];
    (!entry.is_empty()).then_some(entry)
}
