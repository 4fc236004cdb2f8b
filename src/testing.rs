//! In-memory stand-ins for the network, collector, LED and sensor.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::connectivity::NetworkLink;
use crate::delivery::{Indicator, Transport};
use crate::error::TransportError;
use crate::messages::PresenceEvent;
use crate::sampler::PresenceSampler;

pub struct StaticLink {
    up: bool,
}

impl StaticLink {
    pub fn new(up: bool) -> Self {
        StaticLink { up }
    }
}

impl NetworkLink for StaticLink {
    fn begin_association(&mut self) {}

    async fn poll(&mut self) -> bool {
        self.up
    }

    async fn check(&mut self) -> bool {
        self.up
    }
}

/// Replays scripted results, then fails with a connect error forever.
///
/// Clones share the same script and record.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Result<u16, TransportError>>>>,
    sent: Arc<Mutex<Vec<u8>>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<u16, TransportError>>) -> Self {
        ScriptedTransport {
            script: Arc::new(Mutex::new(script.into())),
            sent: Arc::default(),
        }
    }

    /// Payload values of every attempt, in order.
    pub fn sent(&self) -> Vec<u8> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&mut self, event: &PresenceEvent) -> Result<u16, TransportError> {
        self.sent.lock().unwrap().push(event.value);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connect("unreachable".into())))
    }
}

/// Counts off-to-on edges. Clones share the count.
#[derive(Clone, Default)]
pub struct CountingIndicator {
    state: Arc<Mutex<(bool, u32)>>,
}

impl CountingIndicator {
    pub fn pulses(&self) -> u32 {
        self.state.lock().unwrap().1
    }

    pub fn is_on(&self) -> bool {
        self.state.lock().unwrap().0
    }
}

impl Indicator for CountingIndicator {
    fn set(&mut self, on: bool) {
        let mut state = self.state.lock().unwrap();
        if on && !state.0 {
            state.1 += 1;
        }
        state.0 = on;
    }
}

/// Yields the given readings, then repeats the last one.
pub struct ScriptedSampler {
    readings: VecDeque<bool>,
    last: bool,
}

impl ScriptedSampler {
    pub fn new(readings: &[bool]) -> Self {
        ScriptedSampler {
            readings: readings.iter().copied().collect(),
            last: false,
        }
    }
}

impl PresenceSampler for ScriptedSampler {
    async fn sample(&mut self) -> bool {
        if let Some(reading) = self.readings.pop_front() {
            self.last = reading;
        }
        self.last
    }
}
