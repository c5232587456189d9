// src/macros.rs

//
// Crate-internal logging macros
//
// All levels funnel through `log_event!`:
//   `logging` enabled  → a tracing event under the `uplink_rpc` target
//   `logging` disabled → errors go to stderr, other levels only type-check
//                        their arguments
//
// Every expansion is a single expression, so a macro call can stand as a
// match arm.
//

#![allow(unused_macros)]

#[cfg(feature = "logging")]
macro_rules! log_event {
    ($level:ident, $($arg:tt)*) => {
        tracing::$level!(target: "uplink_rpc", $($arg)*)
    };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_event {
    (error, $($arg:tt)*) => {
        eprintln!("uplink_rpc: {}", format_args!($($arg)*))
    };
    ($level:ident, $($arg:tt)*) => {{
        let _ = format_args!($($arg)*);
    }};
}

macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::macros::log_event!(error, $($arg)*)
    };
}

macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::macros::log_event!(warn, $($arg)*)
    };
}

macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::macros::log_event!(info, $($arg)*)
    };
}

macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::macros::log_event!(debug, $($arg)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_error;
pub(crate) use log_event;
pub(crate) use log_info;
pub(crate) use log_warn;

#[cfg(test)]
mod tests {
    // ---
    #[test]
    fn test_log_macros_are_expressions() {
        // ---
        let failed: Option<&str> = None;
        for value in [Some(7), None] {
            let _: () = match value {
                Some(n) => log_debug!("value {n}"),
                None => log_warn!("no value, last failure {failed:?}"),
            };
        }
        log_error!("errors still reach the sink");
        log_info!("info");
    }
}
