//! Reconnect controller (spec §4.H).
//!
//! A state machine with exponential backoff, independent of the actual
//! connect function so it can be unit tested without a socket. The caller
//! drives it: [`ReconnectController::next_delay`] on each failed attempt,
//! [`ReconnectController::on_connected`]/[`on_disconnected`] on transitions.

use std::time::Duration;

use vpn_core::constants::{
    RECONNECT_BACKOFF_MULTIPLIER, RECONNECT_INITIAL_DELAY_SECS, RECONNECT_MAX_DELAY_SECS,
};

/// Adds up to 25% jitter on top of the base delay, capped at the maximum
/// backoff so a jittered final attempt never waits longer than an
/// unjittered one would.
fn jittered(base: Duration) -> Duration {
    let extra_ms = base.as_millis() as u64 / 4;
    let jitter_ms = if extra_ms == 0 { 0 } else { fastrand::u64(0..=extra_ms) };
    (base + Duration::from_millis(jitter_ms)).min(Duration::from_secs(RECONNECT_MAX_DELAY_SECS))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectState {
    Idle,
    Waiting,
    Connecting,
    Connected,
    Failed,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconnectStatistics {
    pub attempts: u32,
    pub total_reconnects: u64,
}

/// Tracks reconnect state and backoff delay; does not itself own a socket
/// or spawn tasks, so the engine stays in control of the actual retry loop.
pub struct ReconnectController {
    enabled: bool,
    state: ReconnectState,
    current_delay: Duration,
    attempts: u32,
    total_reconnects: u64,
    observer: Option<Box<dyn FnMut(ReconnectState) + Send>>,
}

impl Default for ReconnectController {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconnectController {
    pub fn new() -> Self {
        Self {
            enabled: false,
            state: ReconnectState::Idle,
            current_delay: Duration::from_secs(RECONNECT_INITIAL_DELAY_SECS),
            attempts: 0,
            total_reconnects: 0,
            observer: None,
        }
    }

    /// Registers a callback invoked on every state transition (spec §4.H:
    /// "emits state changes to an observer for telemetry"). Replaces any
    /// previously registered observer.
    pub fn set_observer(&mut self, observer: impl FnMut(ReconnectState) + Send + 'static) {
        self.observer = Some(Box::new(observer));
    }

    fn transition(&mut self, state: ReconnectState) {
        self.state = state;
        if let Some(observer) = self.observer.as_mut() {
            observer(state);
        }
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
        self.transition(ReconnectState::Idle);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> ReconnectState {
        self.state
    }

    /// Called once a connection attempt succeeds: resets backoff and moves
    /// to `Connected`.
    pub fn on_connected(&mut self) {
        if self.attempts > 0 {
            self.total_reconnects += 1;
        }
        self.attempts = 0;
        self.current_delay = Duration::from_secs(RECONNECT_INITIAL_DELAY_SECS);
        self.transition(ReconnectState::Connected);
    }

    /// Called when the connection drops or a connect attempt fails.
    /// Returns the delay the caller should wait before the next attempt,
    /// or `None` if reconnect is disabled.
    pub fn on_disconnected(&mut self) -> Option<Duration> {
        if !self.enabled {
            self.transition(ReconnectState::Idle);
            return None;
        }
        self.transition(ReconnectState::Failed);
        let delay = if self.attempts == 0 {
            Duration::ZERO
        } else {
            jittered(self.current_delay)
        };
        self.attempts += 1;
        self.current_delay = Duration::from_secs_f64(
            (self.current_delay.as_secs_f64() * RECONNECT_BACKOFF_MULTIPLIER)
                .min(RECONNECT_MAX_DELAY_SECS as f64),
        );
        self.transition(ReconnectState::Waiting);
        Some(delay)
    }

    pub fn mark_connecting(&mut self) {
        self.transition(ReconnectState::Connecting);
    }

    pub fn statistics(&self) -> ReconnectStatistics {
        ReconnectStatistics {
            attempts: self.attempts,
            total_reconnects: self.total_reconnects,
        }
    }
}
