//! Per-device polling state and the retry decision machine
//!
//! The scheduler records every attempt outcome here and acts on the returned
//! decision. Transitions are pure so retry counting and slot accounting can
//! be tested without timers.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::models::{Device, DevicePollStatus};

/// Outcome of one poll attempt against one device
#[derive(Debug, Clone)]
pub(crate) enum AttemptOutcome {
    Success,
    Failure(String),
}

/// What the scheduler must do for a device after recording an attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NextAction {
    /// Success. `recovered_from` is the failure streak this success ended.
    Settle { recovered_from: u32 },
    /// Failure with retry budget left. Poll again after the retry delay
    /// without giving up the admission slot.
    Retry { attempt: u32 },
    /// Failure at or beyond the retry budget. Mark the device offline and
    /// release the slot. `announce` is true only for the failure that
    /// crossed the budget, so one outage produces one warning.
    GiveUp { failures: u32, announce: bool },
}

/// Where a device currently sits in its poll lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollPhase {
    /// No attempt underway
    Idle,
    /// An attempt is executing against the device
    InFlight,
    /// The last attempt failed and the next one is waiting out the retry
    /// delay. The admission slot stays held.
    RetryPending,
}

#[derive(Debug)]
struct PollState {
    name: String,
    phase: PollPhase,
    last_polled: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    last_error: Option<String>,
}

impl PollState {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            phase: PollPhase::Idle,
            last_polled: None,
            consecutive_failures: 0,
            last_error: None,
        }
    }

    fn in_flight(&self) -> bool {
        self.phase != PollPhase::Idle
    }
}

/// Scheduler-owned polling state, one entry per managed device. Rebuilt
/// empty on restart.
#[derive(Debug)]
pub(crate) struct PollRegistry {
    max_retries: u32,
    states: HashMap<i64, PollState>,
}

impl PollRegistry {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.max(1),
            states: HashMap::new(),
        }
    }

    /// Reconcile tracked state with the current device list: new devices get
    /// a fresh entry, removed devices are dropped once they are idle.
    pub fn sync_devices(&mut self, devices: &[Device]) {
        for device in devices {
            self.states
                .entry(device.id)
                .and_modify(|state| state.name = device.name.clone())
                .or_insert_with(|| PollState::new(&device.name));
        }
        self.states.retain(|id, state| {
            state.in_flight() || devices.iter().any(|d| d.id == *id)
        });
    }

    /// Devices eligible for admission this tick: everything idle, never
    /// polled first, then oldest successful poll first.
    pub fn eligible_order(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .states
            .iter()
            .filter(|(_, state)| !state.in_flight())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_by_key(|id| (self.states[id].last_polled, *id));
        ids
    }

    pub fn active_in_flight(&self) -> usize {
        self.states.values().filter(|s| s.in_flight()).count()
    }

    /// Move a device into the in-flight phase. Covers both fresh admission
    /// and the attempt that follows a retry delay.
    pub fn begin_attempt(&mut self, device_id: i64) {
        if let Some(state) = self.states.get_mut(&device_id) {
            state.phase = PollPhase::InFlight;
        }
    }

    /// Record an attempt outcome and decide what happens next. Terminal
    /// outcomes return the device to idle; a pending retry keeps the slot.
    pub fn record(&mut self, device_id: i64, outcome: &AttemptOutcome) -> NextAction {
        let Some(state) = self.states.get_mut(&device_id) else {
            // Device vanished mid-poll; nothing to track, release the slot.
            return NextAction::Settle { recovered_from: 0 };
        };

        match outcome {
            AttemptOutcome::Success => {
                let recovered_from = state.consecutive_failures;
                state.consecutive_failures = 0;
                state.last_error = None;
                state.last_polled = Some(Utc::now());
                state.phase = PollPhase::Idle;
                NextAction::Settle { recovered_from }
            }
            AttemptOutcome::Failure(error) => {
                state.consecutive_failures += 1;
                state.last_error = Some(error.clone());
                let failures = state.consecutive_failures;

                if failures < self.max_retries {
                    state.phase = PollPhase::RetryPending;
                    NextAction::Retry { attempt: failures }
                } else {
                    state.phase = PollPhase::Idle;
                    NextAction::GiveUp {
                        failures,
                        announce: failures == self.max_retries,
                    }
                }
            }
        }
    }

    /// Return a device to idle after its poll task died without recording a
    /// terminal outcome. The failure streak is left alone; only real device
    /// failures count toward the warning threshold.
    pub fn abandon(&mut self, device_id: i64, error: &str) {
        if let Some(state) = self.states.get_mut(&device_id) {
            state.phase = PollPhase::Idle;
            state.last_error = Some(error.to_string());
        }
    }

    pub fn failures_for(&self, device_id: i64) -> u32 {
        self.states
            .get(&device_id)
            .map_or(0, |s| s.consecutive_failures)
    }

    /// Point-in-time view of every tracked device, ordered by id.
    pub fn snapshot(&self) -> Vec<DevicePollStatus> {
        let mut devices: Vec<DevicePollStatus> = self
            .states
            .iter()
            .map(|(id, state)| DevicePollStatus {
                device_id: *id,
                name: state.name.clone(),
                in_flight: state.in_flight(),
                consecutive_failures: state.consecutive_failures,
                last_polled: state.last_polled,
                last_error: state.last_error.clone(),
            })
            .collect();
        devices.sort_by_key(|d| d.device_id);
        devices
    }
}
