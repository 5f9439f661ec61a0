use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::mpsc::{channel, Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticationState {
    Searching,
    Positioning,
    Verifying,
    Success,
    Failure,
    LockedOut,
    NotEnrolled,
}

impl fmt::Display for AuthenticationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthenticationState::Searching => "searching",
            AuthenticationState::Positioning => "positioning",
            AuthenticationState::Verifying => "verifying",
            AuthenticationState::Success => "success",
            AuthenticationState::Failure => "failure",
            AuthenticationState::LockedOut => "locked-out",
            AuthenticationState::NotEnrolled => "not-enrolled",
        };
        f.write_str(s)
    }
}

/// Failed verification attempts for one session.
///
/// The count only goes up; the only ways back to zero are a successful
/// verification or an explicit restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutCounter {
    failed_attempts: u32,
    locked: bool,
}

impl LockoutCounter {
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Records one failure; returns true if this failure tripped the lockout.
    pub fn record_failure(&mut self, max_attempts: u32) -> bool {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        if !self.locked && self.failed_attempts >= max_attempts {
            self.locked = true;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One observable transition. Emitted on every state write, including writes
/// that keep the state but change the message.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub previous: AuthenticationState,
    pub current: AuthenticationState,
    /// Short actionable text for the primary status line.
    pub message: String,
    /// Coarse technical detail for secondary status text.
    pub detail: Option<String>,
    /// Whether the periodic scanning indicator should be shown.
    pub scanning: bool,
}

/// Fan-out of state changes to any number of subscribers. Subscribers that
/// have hung up are pruned on the next emit.
#[derive(Debug, Default)]
pub struct StateObservers {
    senders: Vec<Sender<StateChange>>,
}

impl StateObservers {
    pub fn subscribe(&mut self) -> Receiver<StateChange> {
        let (tx, rx) = channel();
        self.senders.push(tx);
        rx
    }

    pub fn emit(&mut self, change: &StateChange) {
        self.senders.retain(|tx| tx.send(change.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}
