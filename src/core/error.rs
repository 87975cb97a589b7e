// Fatal error path for programmer errors

/// Log a programmer error with its location and abort the current thread.
///
/// Used for contract violations the runtime cannot recover from: reading a
/// container before it is ready, a resource key reused with another type,
/// a native handle that failed to allocate.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)+) => {{
        let message = format!($($arg)+);
        log::error!("{}:{}: {}", file!(), line!(), message);
        panic!("{}", message)
    }};
}
