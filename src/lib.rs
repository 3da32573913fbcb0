// src/lib.rs
// ────────────────────────────────────────────────────────────────────────────
// Public library entry point.  Re-export everything for both `main.rs` and
// integration tests.

mod macros;

#[doc(hidden)]
pub use log;

pub mod config;
pub mod control;
pub mod device;
pub mod devpath;
pub mod interface;
pub mod logging;
pub mod overlapped;
pub mod platform;
pub mod status;

pub use control::control;
pub use device::Device;
pub use devpath::{device_path, resolve_device_path};
pub use interface::InterfaceId;
pub use overlapped::{begin_read, begin_write, Completion, TimeoutPolicy, Token};
pub use platform::{OperationKind, Platform, Timeout};
pub use status::{from_win32, status_code, TeeError, TeeResult};
