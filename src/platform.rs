//! Platform-abstraction capability traits.
//!
//! The core calls out to three capabilities supplied by the host at
//! [`crate::engine::Engine::new`]: a packet sink, a logger, and an optional
//! metrics sink. Each capability owns whatever context it needs (a channel
//! sender, a buffer, a file handle) instead of the core threading an opaque
//! `user_context` pointer through every call, the way the original C-style
//! callback set would.

use crate::engine::StatsSnapshot;
use crate::packet::Packet;

/// Log severity, mirroring the four levels the `log` crate exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Receives a short diagnostic message from the core.
///
/// Implementations must not block or allocate unboundedly; `tick` and
/// `receive` call into this synchronously.
pub trait Logger {
    fn log(&mut self, level: LogLevel, message: &str);
}

/// A logger that discards everything. Used where diagnostics are not wanted.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&mut self, _level: LogLevel, _message: &str) {}
}

/// Bridges the core's [`Logger`] capability to the `log` crate's global
/// dispatcher, the way the simulator's host application logs today. Only
/// available with the `std` feature since it assumes a process-global logger
/// has been installed (e.g. via `env_logger`).
#[cfg(feature = "std")]
#[derive(Debug, Default, Clone, Copy)]
pub struct StdLogger;

#[cfg(feature = "std")]
impl Logger for StdLogger {
    fn log(&mut self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => log::debug!("{message}"),
            LogLevel::Info => log::info!("{message}"),
            LogLevel::Warning => log::warn!("{message}"),
            LogLevel::Error => log::error!("{message}"),
        }
    }
}

/// Emits a packet the engine has decided to transmit.
///
/// The host may buffer it, hand it to a radio driver, or discard it; the core
/// never inspects what happens after `send` returns.
pub trait PacketSink {
    fn send(&mut self, packet: &Packet);
}

/// A sink that drops every packet. Useful in tests that only care about
/// engine state, not transmitted bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl PacketSink for NullSink {
    fn send(&mut self, _packet: &Packet) {}
}

/// Receives a snapshot of engine statistics at the end of each cycle.
///
/// Optional: a host that does not care about metrics can pass [`NullMetrics`].
pub trait MetricsSink {
    fn report(&mut self, snapshot: &StatsSnapshot);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetrics;

impl MetricsSink for NullMetrics {
    fn report(&mut self, _snapshot: &StatsSnapshot) {}
}
