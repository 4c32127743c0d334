//! Launch timing and standard dispatch events
//!
//! Every dispatch-related event carries an `event` field so log pipelines
//! can filter on it without parsing messages.
//!
//! ```rust
//! use launchkit_tracing::timing::{LaunchTimer, record_barrier};
//!
//! let timer = LaunchTimer::new("vector_add", Some(100));
//! // ... validate, bind, enqueue ...
//! drop(timer); // logged only if the launch took >= 100us
//!
//! record_barrier("pre", 4, 12);
//! ```

use std::time::Instant;

/// RAII guard that measures a launch and logs its duration on drop.
pub struct LaunchTimer {
    kernel: String,
    threshold_us: Option<u64>,
    start_time: Instant,
    span: tracing::Span,
}

impl LaunchTimer {
    /// Start timing a launch of `kernel`; durations below `threshold_us` are not logged.
    pub fn new(kernel: impl Into<String>, threshold_us: Option<u64>) -> Self {
        let kernel = kernel.into();
        let span = tracing::debug_span!("launch", kernel = %kernel);
        Self {
            kernel,
            threshold_us,
            start_time: Instant::now(),
            span,
        }
    }

    pub fn elapsed_us(&self) -> u64 {
        self.start_time.elapsed().as_micros() as u64
    }

    /// Enter the timer's span so nested events are attributed to this launch.
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    pub fn kernel(&self) -> &str {
        &self.kernel
    }
}

impl Drop for LaunchTimer {
    fn drop(&mut self) {
        let elapsed_us = self.elapsed_us();
        if self.threshold_us.is_none_or(|t| elapsed_us >= t) {
            let _entered = self.span.enter();
            tracing::debug!(event = "launch", duration_us = elapsed_us, "launch_complete");
        }
    }
}

/// Record a dispatch unit being handed to its queue.
pub fn record_dispatch(kernel: &str, device: u32, global_elements: u64, profiling: bool) {
    tracing::debug!(
        event = "dispatch",
        kernel = kernel,
        device = device,
        global_elements = global_elements,
        profiling = profiling,
        "dispatch_enqueued"
    );
}

/// Record a multi-device barrier (`phase` is `"pre"` or `"post"`).
pub fn record_barrier(phase: &str, queues: usize, duration_us: u64) {
    tracing::debug!(
        event = "barrier",
        phase = phase,
        queues = queues,
        duration_us = duration_us,
        duration_ms = duration_us as f64 / 1000.0,
        "barrier_drained"
    );
}
