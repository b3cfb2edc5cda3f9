use std::time::Instant;

/// Severity of a message sent to the host log sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Services the engine may request from whoever embeds it.
///
/// The engine never touches the file system, the network or a wall clock on its own; all
/// of that goes through this trait. Messages are raw bytes (UTF-8 by convention) so the
/// sink can be a pointer/length import on the other side of an isolation boundary.
pub trait Host {
    /// Receives a log line.
    fn log(&mut self, level: LogLevel, message: &[u8]);

    /// Milliseconds from an arbitrary, fixed origin. Must never go backwards.
    fn monotonic_millis(&mut self) -> u64;

    /// Progress of the running operation, `0..=100`, reported after every chunk.
    fn progress(&mut self, _percent: u8) {}

    /// Polled before every chunk; returning `true` aborts with `Cancelled`.
    fn cancel_requested(&mut self) -> bool {
        false
    }

    /// `true` if [`Host::log`] ends up in the same `tracing` subscriber the engine already
    /// reports to. The engine then skips host lines that would repeat its own events.
    fn is_tracing_sink(&self) -> bool {
        false
    }
}

impl<H: Host + ?Sized> Host for &mut H {
    fn log(&mut self, level: LogLevel, message: &[u8]) {
        (**self).log(level, message);
    }

    fn monotonic_millis(&mut self) -> u64 {
        (**self).monotonic_millis()
    }

    fn progress(&mut self, percent: u8) {
        (**self).progress(percent);
    }

    fn cancel_requested(&mut self) -> bool {
        (**self).cancel_requested()
    }

    fn is_tracing_sink(&self) -> bool {
        (**self).is_tracing_sink()
    }
}

/// Host that forwards log lines to `tracing` and reads the clock from [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct TracingHost {
    epoch: Instant,
}

impl TracingHost {
    #[must_use]
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for TracingHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for TracingHost {
    fn log(&mut self, level: LogLevel, message: &[u8]) {
        let message = String::from_utf8_lossy(message);
        match level {
            LogLevel::Error => tracing::error!(target: "fv_vault::host", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "fv_vault::host", "{message}"),
            LogLevel::Info => tracing::info!(target: "fv_vault::host", "{message}"),
            LogLevel::Debug => tracing::debug!(target: "fv_vault::host", "{message}"),
            LogLevel::Trace => tracing::trace!(target: "fv_vault::host", "{message}"),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn monotonic_millis(&mut self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn is_tracing_sink(&self) -> bool {
        true
    }
}
