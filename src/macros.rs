/// Logs a record for one component of the crate through the `log` facade.
///
/// The component becomes the record target (`teeio::<component>`), so the
/// consumer's logger decides where each part of the core's output goes.
/// Usage:
/// ```rust
/// use log::Level;
/// teeio::tee_log!(Level::Debug, "overlapped", "read pending");
/// teeio::tee_log!(Level::Error, "devpath", "query failed: 0x{:x}", 0x1a);
/// ```
#[macro_export]
macro_rules! tee_log {
    ($level:expr, $component:literal, $($arg:tt)+) => {
        $crate::log::log!(target: concat!("teeio::", $component), $level, $($arg)+)
    };
}
