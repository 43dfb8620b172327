// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Trace output for the decoders.
//!
//! A DWARF decode that goes wrong is hard to diagnose from the final error
//! value alone, so the decoders narrate unit headers, DIEs and dropped line
//! rows through [`debug`]. The narration stays off unless a caller flips
//! [`set_enabled`]. A `log`/`tracing` subscriber stack would buy nothing
//! here: there is one verbosity level and one consumer, stderr.

use std::sync::atomic::{AtomicBool, Ordering};

// Re-exported so the macro is documented next to its switch.
pub use crate::debug;

static ENABLED: AtomicBool = AtomicBool::new(false);

/// Turns decoder trace output on or off.
pub fn set_enabled(on: bool) {
    ENABLED.store(on, Ordering::Relaxed);
}

/// Tells whether trace output is currently on.
pub fn enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Writes one trace line to stderr when tracing is on.
///
/// Accepts the same arguments as [`eprintln`].
#[macro_export]
macro_rules! debug {
    ( $($args:tt)* ) => {
        if $crate::dbglog::enabled() {
            ::std::eprintln!( $($args)* );
        }
    }
}
