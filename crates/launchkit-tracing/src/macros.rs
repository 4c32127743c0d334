//! Convenience macros for launch instrumentation

/// Start a [`crate::timing::LaunchTimer`] with optional extra span fields.
///
/// ```rust
/// use launchkit_tracing::launch_span;
///
/// {
///     let _timer = launch_span!("saxpy", device = 1, grids = 4);
///     // ... launch ...
/// }
/// ```
#[macro_export]
macro_rules! launch_span {
    ($kernel:expr) => {{
        $crate::timing::LaunchTimer::new($kernel, None)
    }};
    ($kernel:expr, $($field:tt = $value:expr),+ $(,)?) => {{
        let timer = $crate::timing::LaunchTimer::new($kernel, None);
        {
            let _entered = timer.enter();
            $crate::debug!($($field = $value),+, "launch_started");
        }
        timer
    }};
}

/// Run a block and return `(result, duration_us)`, logging the duration.
#[macro_export]
macro_rules! timed_block {
    ($name:expr, $block:block) => {{
        let start = std::time::Instant::now();
        let result = $block;
        let duration_us = start.elapsed().as_micros() as u64;
        $crate::trace!(operation = $name, duration_us = duration_us, "timed_block_complete");
        (result, duration_us)
    }};
}
