//! Win32 backend: event objects, overlapped `ReadFile` / `WriteFile` /
//! `DeviceIoControl`, and the configuration manager's interface list.

use std::{ffi::CString, io, mem, ptr};

use windows_sys::core::GUID;
use windows_sys::Win32::{
    Devices::DeviceAndDriverInstallation::{
        CM_Get_Device_Interface_ListA, CM_Get_Device_Interface_List_SizeA,
        CM_GET_DEVICE_INTERFACE_LIST_PRESENT, CR_SUCCESS,
    },
    Foundation::{
        CloseHandle, GetLastError, GENERIC_READ, GENERIC_WRITE, HANDLE, INVALID_HANDLE_VALUE,
        WAIT_OBJECT_0, WAIT_TIMEOUT,
    },
    Storage::FileSystem::{
        CreateFileA, ReadFile, WriteFile, FILE_FLAG_OVERLAPPED, FILE_SHARE_READ, FILE_SHARE_WRITE,
        OPEN_EXISTING,
    },
    System::{
        Threading::{CreateEventW, WaitForSingleObject},
        IO::{CancelIoEx, DeviceIoControl, GetOverlappedResult, OVERLAPPED},
    },
};

use super::{OperationKind, Platform, Submit, Timeout, WaitOutcome};
use crate::interface::InterfaceId;
use crate::status::win32::ERROR_IO_PENDING;

/// A Win32 object handle: a device file or an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHandle(pub HANDLE);

// Kernel object handles are process-wide and usable from any thread.
unsafe impl Send for RawHandle {}
unsafe impl Sync for RawHandle {}

/// The OVERLAPPED block of one operation. Lives in the Token's boxed record.
pub struct Overlapped(OVERLAPPED);

// Only the owning Token touches it; the kernel writes it from no particular thread.
unsafe impl Send for Overlapped {}

/// The Win32 implementation of [`Platform`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32;

fn guid(id: &InterfaceId) -> GUID {
    let (data1, data2, data3, data4) = id.fields();
    GUID { data1, data2, data3, data4 }
}

/// Map a BOOL-returning overlapped submission onto [`Submit`].
fn submitted(ok: i32, transferred: u32) -> Submit {
    if ok != 0 {
        return Submit::Completed(transferred);
    }
    match unsafe { GetLastError() } {
        ERROR_IO_PENDING => Submit::Pending,
        err => Submit::Failed(err),
    }
}

impl Platform for Win32 {
    type Handle = RawHandle;
    type Signal = RawHandle;
    type Context = Overlapped;

    fn is_valid_handle(&self, RawHandle(handle): RawHandle) -> bool {
        !handle.is_null() && handle != INVALID_HANDLE_VALUE
    }

    fn create_signal(&self) -> Result<RawHandle, u32> {
        // manual reset, initially unset
        let event = unsafe { CreateEventW(ptr::null(), 1, 0, ptr::null()) };
        if event.is_null() {
            Err(unsafe { GetLastError() })
        } else {
            Ok(RawHandle(event))
        }
    }

    fn close_signal(&self, RawHandle(signal): RawHandle) {
        unsafe { CloseHandle(signal) };
    }

    fn new_context(&self) -> Overlapped {
        // SAFETY: OVERLAPPED is plain data; all-zero is its documented initial state.
        Overlapped(unsafe { mem::zeroed() })
    }

    fn arm(&self, ctx: &mut Overlapped, signal: &RawHandle) {
        ctx.0.hEvent = signal.0;
    }

    unsafe fn submit_transfer(
        &self,
        RawHandle(handle): RawHandle,
        kind: OperationKind,
        buffer: &mut [u8],
        Overlapped(ctx): &mut Overlapped,
    ) -> Submit {
        let mut transferred = 0u32;
        let len = buffer.len() as u32;
        let ok = unsafe {
            match kind {
                OperationKind::Read => {
                    ReadFile(handle, buffer.as_mut_ptr(), len, &mut transferred, ctx)
                }
                OperationKind::Write => {
                    WriteFile(handle, buffer.as_ptr(), len, &mut transferred, ctx)
                }
            }
        };
        submitted(ok, transferred)
    }

    unsafe fn submit_control(
        &self,
        RawHandle(handle): RawHandle,
        code: u32,
        input: &[u8],
        output: &mut [u8],
        Overlapped(ctx): &mut Overlapped,
    ) -> Submit {
        let mut returned = 0u32;
        let in_ptr = if input.is_empty() { ptr::null() } else { input.as_ptr().cast() };
        let out_ptr = if output.is_empty() { ptr::null_mut() } else { output.as_mut_ptr().cast() };
        let ok = unsafe {
            DeviceIoControl(
                handle,
                code,
                in_ptr,
                input.len() as u32,
                out_ptr,
                output.len() as u32,
                &mut returned,
                ctx,
            )
        };
        submitted(ok, returned)
    }

    fn wait_signal(&self, signal: &RawHandle, timeout: Timeout) -> WaitOutcome {
        match unsafe { WaitForSingleObject(signal.0, timeout.as_millis()) } {
            WAIT_OBJECT_0 => WaitOutcome::Signaled,
            WAIT_TIMEOUT => WaitOutcome::TimedOut,
            _ => WaitOutcome::Failed(unsafe { GetLastError() }),
        }
    }

    fn overlapped_result(
        &self,
        RawHandle(handle): RawHandle,
        Overlapped(ctx): &mut Overlapped,
        block: bool,
    ) -> Result<u32, u32> {
        let mut transferred = 0u32;
        let ok = unsafe { GetOverlappedResult(handle, ctx, &mut transferred, block as i32) };
        if ok == 0 {
            Err(unsafe { GetLastError() })
        } else {
            Ok(transferred)
        }
    }

    fn cancel(&self, RawHandle(handle): RawHandle, Overlapped(ctx): &mut Overlapped) -> Result<(), u32> {
        if unsafe { CancelIoEx(handle, ctx) } == 0 {
            Err(unsafe { GetLastError() })
        } else {
            Ok(())
        }
    }

    fn interface_list_size(&self, id: &InterfaceId) -> Result<u32, u32> {
        let class = guid(id);
        let mut len = 0u32;
        let cr = unsafe {
            CM_Get_Device_Interface_List_SizeA(
                &mut len,
                &class,
                ptr::null(),
                CM_GET_DEVICE_INTERFACE_LIST_PRESENT,
            )
        };
        if cr == CR_SUCCESS { Ok(len) } else { Err(cr) }
    }

    fn interface_list(&self, id: &InterfaceId, list: &mut [u8]) -> Result<(), u32> {
        let class = guid(id);
        let cr = unsafe {
            CM_Get_Device_Interface_ListA(
                &class,
                ptr::null(),
                list.as_mut_ptr(),
                list.len() as u32,
                CM_GET_DEVICE_INTERFACE_LIST_PRESENT,
            )
        };
        if cr == CR_SUCCESS { Ok(()) } else { Err(cr) }
    }
}

/// Thin RAII wrapper: opens a device path for overlapped I/O on
/// construction, closes the handle on drop.
pub struct DeviceFile {
    handle: RawHandle,
}

impl DeviceFile {
    /// Open `path` (as returned by the device path resolver) read/write,
    /// shared, with `FILE_FLAG_OVERLAPPED`.
    pub fn open(path: &str) -> io::Result<Self> {
        let c_path = CString::new(path)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let handle = unsafe {
            CreateFileA(
                c_path.as_ptr().cast(),
                GENERIC_READ | GENERIC_WRITE,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                ptr::null(),
                OPEN_EXISTING,
                FILE_FLAG_OVERLAPPED,
                ptr::null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { handle: RawHandle(handle) })
    }

    pub fn handle(&self) -> RawHandle {
        self.handle
    }
}

impl Drop for DeviceFile {
    fn drop(&mut self) {
        unsafe { CloseHandle(self.handle.0) };
    }
}
