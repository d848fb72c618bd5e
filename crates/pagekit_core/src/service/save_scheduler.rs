//! Debounced persistence scheduling.
//!
//! # Responsibility
//! - Turn a stream of document mutations into trailing-edge debounced
//!   save requests.
//! - Track the observable save status (`idle | saving | saved | error`).
//!
//! # Invariants
//! - A mutation restarts the quiet-period timer; it never stacks a second
//!   pending save.
//! - At most one save is in flight. A save that comes due meanwhile waits
//!   in the single pending slot and is issued after the in-flight one
//!   finishes, with the state current at that moment.
//! - Completions for cancelled or superseded tickets are ignored.
//!
//! Time is a host-supplied logical clock in milliseconds, which keeps the
//! state machine deterministic under test.

use crate::config::EditorConfig;
use log::{debug, warn};

/// Observable persistence status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveState {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

impl SaveState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Saving => "saving",
            Self::Saved => "saved",
            Self::Error => "error",
        }
    }
}

/// Handle for one issued save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveTicket {
    pub id: u64,
    /// 0 for the first attempt, `n` for the n-th retry.
    pub attempt: u32,
}

/// Debounce/retry state machine for one open page.
#[derive(Debug, Clone)]
pub struct PersistenceScheduler {
    quiet_period_ms: u64,
    max_retries: u32,
    retry_base_delay_ms: u64,
    state: SaveState,
    deadline_ms: Option<u64>,
    in_flight: Option<SaveTicket>,
    attempt: u32,
    dirty: bool,
    next_ticket: u64,
    last_error: Option<String>,
    blocked: bool,
}

impl PersistenceScheduler {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            quiet_period_ms: config.save_quiet_period_ms,
            max_retries: config.max_save_retries,
            retry_base_delay_ms: config.retry_base_delay_ms,
            state: SaveState::Idle,
            deadline_ms: None,
            in_flight: None,
            attempt: 0,
            dirty: false,
            next_ticket: 0,
            last_error: None,
            blocked: false,
        }
    }

    pub fn state(&self) -> SaveState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// When the next save is scheduled, if any.
    pub fn deadline_ms(&self) -> Option<u64> {
        self.deadline_ms
    }

    pub fn in_flight(&self) -> Option<SaveTicket> {
        self.in_flight
    }

    /// Whether mutations exist that no successful save has covered yet.
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty || self.deadline_ms.is_some()
    }

    /// Restarts the quiet-period timer.
    pub fn record_mutation(&mut self, now_ms: u64) {
        self.dirty = true;
        self.attempt = 0;
        self.deadline_ms = Some(now_ms.saturating_add(self.quiet_period_ms));
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        !self.blocked
            && self.in_flight.is_none()
            && self.deadline_ms.is_some_and(|deadline| now_ms >= deadline)
    }

    /// Makes any unsaved change due immediately.
    pub fn flush(&mut self, now_ms: u64) {
        if self.has_unsaved_changes() {
            self.deadline_ms = Some(now_ms);
        }
    }

    /// Starts a save if one is due. The caller snapshots the document right
    /// after this returns and reports back through `finish_save`.
    pub fn begin_save(&mut self, now_ms: u64) -> Option<SaveTicket> {
        if !self.is_due(now_ms) {
            return None;
        }
        self.next_ticket += 1;
        let ticket = SaveTicket {
            id: self.next_ticket,
            attempt: self.attempt,
        };
        self.in_flight = Some(ticket);
        self.deadline_ms = None;
        self.dirty = false;
        self.state = SaveState::Saving;
        debug!(
            "event=save_begin module=scheduler status=start ticket={} attempt={}",
            ticket.id, ticket.attempt
        );
        Some(ticket)
    }

    /// Records the outcome of an issued save. Returns `false` for stale
    /// tickets, which leave the state untouched.
    pub fn finish_save(
        &mut self,
        ticket: SaveTicket,
        outcome: Result<(), String>,
        now_ms: u64,
    ) -> bool {
        if self.in_flight != Some(ticket) {
            debug!(
                "event=save_finish module=scheduler status=stale ticket={}",
                ticket.id
            );
            return false;
        }
        self.in_flight = None;

        match outcome {
            Ok(()) => {
                self.attempt = 0;
                self.last_error = None;
                self.state = SaveState::Saved;
            }
            Err(message) => {
                self.dirty = true;
                if ticket.attempt < self.max_retries {
                    self.attempt = ticket.attempt + 1;
                    let delay = self.retry_delay_ms(self.attempt);
                    // A newer mutation already scheduled a save of fresher state.
                    if self.deadline_ms.is_none() {
                        self.deadline_ms = Some(now_ms.saturating_add(delay));
                    }
                    warn!(
                        "event=save_finish module=scheduler status=retry ticket={} attempt={} delay_ms={}",
                        ticket.id, self.attempt, delay
                    );
                } else {
                    self.attempt = 0;
                    self.state = SaveState::Error;
                    warn!(
                        "event=save_finish module=scheduler status=error ticket={} attempts={}",
                        ticket.id,
                        ticket.attempt + 1
                    );
                }
                self.last_error = Some(message);
            }
        }
        true
    }

    /// Drops the timer and forgets any in-flight ticket (page switch or
    /// teardown). Unsaved changes are reported by the return value.
    pub fn cancel(&mut self) -> bool {
        let had_unsaved = self.has_unsaved_changes();
        self.deadline_ms = None;
        self.in_flight = None;
        self.attempt = 0;
        self.dirty = false;
        if self.state == SaveState::Saving {
            self.state = SaveState::Idle;
        }
        had_unsaved
    }

    /// Blocks further saves after the document could not be loaded, so a
    /// default document never overwrites stored data.
    pub fn mark_blocked(&mut self, message: impl Into<String>) {
        self.cancel();
        self.blocked = true;
        self.state = SaveState::Error;
        self.last_error = Some(message.into());
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    fn retry_delay_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1).min(16);
        self.retry_base_delay_ms.saturating_mul(1_u64 << exponent)
    }
}
