//! Opt-in diagnostic tracing, gated by the `LCFS_BUILD_LOG` environment
//! variable. Mirrors the teacher crate's `FXFSP_IO_LOG` style: no logging
//! framework, just an env-checked `eprintln!`.

use std::sync::OnceLock;

fn enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var_os("LCFS_BUILD_LOG").is_some())
}

/// Emit a diagnostic line if `LCFS_BUILD_LOG` is set. Cheap no-op otherwise.
macro_rules! trace {
    ($($arg:tt)*) => {
        if $crate::diag::diag_enabled() {
            eprintln!("[lcfs] {}", format!($($arg)*));
        }
    };
}

pub(crate) fn diag_enabled() -> bool {
    enabled()
}

pub(crate) use trace;
