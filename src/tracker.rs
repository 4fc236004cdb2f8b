use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::info;

use crate::messages::Transition;

/// Written only by the [`StateTracker`].
#[derive(Debug, Default)]
pub struct PresenceState {
    present: AtomicBool,
}

impl PresenceState {
    pub fn new(present: bool) -> Arc<Self> {
        Arc::new(PresenceState {
            present: AtomicBool::new(present),
        })
    }

    pub fn is_present(&self) -> bool {
        self.present.load(Ordering::Acquire)
    }

    fn store(&self, present: bool) {
        self.present.store(present, Ordering::Release);
    }
}

/// Edge detector over raw presence readings.
///
/// The committed state advances on every edge, whatever happens to the
/// delivery that follows it. A failed delivery is therefore never resent;
/// the next differing reading produces a fresh edge.
pub struct StateTracker {
    state: Arc<PresenceState>,
}

impl StateTracker {
    pub fn new(state: Arc<PresenceState>) -> Self {
        StateTracker { state }
    }

    pub fn current(&self) -> bool {
        self.state.is_present()
    }

    /// Returns the edge if `reading` differs from the committed state, and
    /// commits it. Identical readings leave everything untouched.
    pub fn observe(&mut self, reading: bool) -> Option<Transition> {
        let previous = self.state.is_present();
        if reading == previous {
            return None;
        }
        self.state.store(reading);
        let transition = Transition {
            from: previous,
            to: reading,
        };
        info!("Presence changed: {}", transition);
        Some(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(readings: &[bool]) -> Vec<Transition> {
        let mut tracker = StateTracker::new(PresenceState::new(false));
        readings
            .iter()
            .filter_map(|r| tracker.observe(*r))
            .collect()
    }

    #[test]
    fn test_scenario_two_edges() {
        let transitions = run(&[false, false, true, true, false]);
        assert_eq!(
            transitions,
            vec![
                Transition {
                    from: false,
                    to: true
                },
                Transition {
                    from: true,
                    to: false
                },
            ]
        );
    }

    #[test]
    fn test_repeated_readings_never_retrigger() {
        assert!(run(&[false; 50]).is_empty());
        assert_eq!(run(&[true; 50]).len(), 1);
    }

    #[test]
    fn test_edge_iff_reading_differs() {
        // Pseudo-random but fixed sequence.
        let mut seed: u32 = 0x2545_f491;
        let readings: Vec<bool> = (0..500)
            .map(|_| {
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                seed & 1 == 1
            })
            .collect();

        let mut tracker = StateTracker::new(PresenceState::new(false));
        let mut previous = false;
        for reading in readings {
            let edge = tracker.observe(reading);
            assert_eq!(edge.is_some(), reading != previous);
            if let Some(t) = edge {
                assert_eq!(t.from, previous);
                assert_eq!(t.to, reading);
            }
            previous = reading;
            assert_eq!(tracker.current(), reading);
        }
    }

    #[test]
    fn test_shared_state_follows_commits() {
        let state = PresenceState::new(false);
        let mut tracker = StateTracker::new(state.clone());
        tracker.observe(true);
        assert!(state.is_present());
        tracker.observe(false);
        assert!(!state.is_present());
    }
}
