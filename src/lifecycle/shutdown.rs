//! Shutdown event accounting.
//!
//! Consumed shutdown signals and client disconnects share a single counter:
//! whichever mix of the two reaches the threshold first ends the server.

/// A qualifying shutdown event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownEvent {
    /// A shutdown signal was consumed.
    Signal,
    /// The active connection went away.
    Disconnect,
}

impl ShutdownEvent {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownEvent::Signal => "signal",
            ShutdownEvent::Disconnect => "disconnect",
        }
    }
}

/// Monotonic counter of qualifying events with a fixed threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownCounter {
    threshold: u32,
    signals: u32,
    disconnects: u32,
}

impl ShutdownCounter {
    /// Create a counter that trips after `threshold` events.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            signals: 0,
            disconnects: 0,
        }
    }

    /// Record one event. Returns `true` once the threshold is reached.
    pub fn record(&mut self, event: ShutdownEvent) -> bool {
        match event {
            ShutdownEvent::Signal => self.signals = self.signals.saturating_add(1),
            ShutdownEvent::Disconnect => self.disconnects = self.disconnects.saturating_add(1),
        }
        self.is_reached()
    }

    /// Total events recorded so far.
    pub fn total(&self) -> u32 {
        self.signals.saturating_add(self.disconnects)
    }

    pub fn signals(&self) -> u32 {
        self.signals
    }

    pub fn disconnects(&self) -> u32 {
        self.disconnects
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Events still needed before shutdown.
    pub fn remaining(&self) -> u32 {
        self.threshold.saturating_sub(self.total())
    }

    pub fn is_reached(&self) -> bool {
        self.total() >= self.threshold
    }
}
