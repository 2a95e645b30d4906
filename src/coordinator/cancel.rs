use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

struct SignalState {
    token: CancellationToken,
    stops_in_progress: usize,
}

/// Cooperative stop request for one lock group.
///
/// Commands snapshot [`StopSignal::token`] after taking their group lock and
/// check it at each suspension point. A stop cancels the current token for as
/// long as its [`StopGuard`] lives; the last guard to drop arms a fresh token.
pub struct StopSignal {
    state: Mutex<SignalState>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SignalState {
                token: CancellationToken::new(),
                stops_in_progress: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SignalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn token(&self) -> CancellationToken {
        self.state().token.clone()
    }

    pub fn is_stopping(&self) -> bool {
        self.state().stops_in_progress > 0
    }

    pub fn raise(&self) -> StopGuard<'_> {
        let mut state = self.state();
        state.stops_in_progress += 1;
        state.token.cancel();
        StopGuard { signal: self }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

pub struct StopGuard<'a> {
    signal: &'a StopSignal,
}

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.signal.state();
        state.stops_in_progress -= 1;
        if state.stops_in_progress == 0 {
            state.token = CancellationToken::new();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_cancels_snapshot() {
        let signal = StopSignal::new();
        let token = signal.token();
        assert!(!signal.is_stopping());

        let guard = signal.raise();
        assert!(token.is_cancelled());
        assert!(signal.is_stopping());
        assert!(signal.token().is_cancelled());

        drop(guard);
        assert!(!signal.is_stopping());
        assert!(!signal.token().is_cancelled());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_overlapping_stops_rearm_once() {
        let signal = StopSignal::new();
        let first = signal.raise();
        let second = signal.raise();

        drop(first);
        assert!(signal.is_stopping());
        assert!(signal.token().is_cancelled());

        drop(second);
        assert!(!signal.token().is_cancelled());
    }
}
