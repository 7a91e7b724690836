//! Countdown/arming state machine for a single SOS control.
//!
//! ```text
//!  request_trigger          countdown reaches 0         dispatch_completed
//! Idle ──────────► Arming ─────────────────► Dispatching ───────────────► Cooldown
//!  ▲                 │ cancel                    │ dispatch_failed           │
//!  └─────────────────┴───────────────────────────┘                          │
//!  ▲                     dismiss / confirmation window elapsed              │
//!  └────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The machine never performs I/O. Each operation returns the [`Effect`]s the
//! caller must carry out. The countdown and the location re-sample schedule
//! live inside the `Arming` phase, so leaving that phase by any path drops
//! both; there is no separate timer handle that could outlive its session.

use std::mem;

use crate::{AlertError, AlertSession, AlertState, Location, Position, SessionId, Timings, User};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CloseReason {
    Dismissed,
    Expired,
    /// A new trigger arrived while the confirmation was showing.
    Superseded,
}

#[derive(Clone, PartialEq, Debug)]
pub enum Effect {
    Armed { session: SessionId, countdown: u32 },
    /// Ask the location collaborator for a fix. Results come back through
    /// [`AlertMachine::location_resolved`].
    SampleLocation { session: SessionId },
    Countdown { session: SessionId, remaining: u32 },
    /// Notify every contact of `user` now, then report back with
    /// `dispatch_completed` or `dispatch_failed`.
    Dispatch { session: AlertSession, user: User },
    ConfirmationShown { session: SessionId, until_ms: u64 },
    ConfirmationClosed { session: SessionId, reason: CloseReason },
    Cancelled { session: SessionId, remaining: u32 },
    Blocked(AlertError),
}

enum Phase {
    Idle,
    Arming {
        session: AlertSession,
        next_tick_ms: u64,
        next_sample_ms: u64,
    },
    Dispatching {
        session: AlertSession,
    },
    Cooldown {
        session: AlertSession,
        until_ms: u64,
    },
}

pub struct AlertMachine {
    timings: Timings,
    phase: Phase,
    last_id: u64,
}

impl AlertMachine {
    pub fn new(timings: Timings) -> Self {
        let timings = Timings {
            countdown_secs: timings.countdown_secs.max(1),
            tick_ms: timings.tick_ms.max(1),
            location_poll_ms: timings.location_poll_ms.max(1),
            ..timings
        };
        Self {
            timings,
            phase: Phase::Idle,
            last_id: 0,
        }
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn state(&self) -> AlertState {
        match self.phase {
            Phase::Idle => AlertState::Idle,
            Phase::Arming { .. } => AlertState::Arming,
            Phase::Dispatching { .. } => AlertState::Dispatching,
            Phase::Cooldown { .. } => AlertState::Cooldown,
        }
    }

    pub fn session(&self) -> Option<&AlertSession> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Arming { session, .. }
            | Phase::Dispatching { session }
            | Phase::Cooldown { session, .. } => Some(session),
        }
    }

    pub fn countdown_remaining(&self) -> u32 {
        match &self.phase {
            Phase::Arming { session, .. } => session.countdown_remaining,
            _ => 0,
        }
    }

    /// True while anything time-driven is outstanding.
    pub fn needs_ticks(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    /// Accept a trigger from any input source.
    ///
    /// A no-op (empty effects) while a countdown or dispatch is in progress,
    /// so overlapping sources collapse into a single session.
    pub fn request_trigger(&mut self, now_ms: u64, user: &User) -> Vec<Effect> {
        if matches!(self.phase, Phase::Arming { .. } | Phase::Dispatching { .. }) {
            return Vec::new();
        }
        if !user.has_contacts() {
            return vec![Effect::Blocked(AlertError::NoEmergencyContacts)];
        }

        let mut effects = Vec::new();
        if let Phase::Cooldown { session, .. } = &self.phase {
            effects.push(Effect::ConfirmationClosed {
                session: session.id,
                reason: CloseReason::Superseded,
            });
        }

        self.last_id += 1;
        let id = SessionId(self.last_id);
        let session = AlertSession {
            id,
            countdown_remaining: self.timings.countdown_secs,
            started_at_ms: now_ms,
            last_known: Location::Unavailable,
            state: AlertState::Arming,
        };
        effects.push(Effect::Armed {
            session: id,
            countdown: session.countdown_remaining,
        });
        effects.push(Effect::SampleLocation { session: id });

        self.phase = Phase::Arming {
            session,
            next_tick_ms: now_ms.saturating_add(self.timings.tick_ms),
            next_sample_ms: now_ms.saturating_add(self.timings.location_poll_ms),
        };
        effects
    }

    /// Advance time. Safe to call at any cadence; missed steps are caught up
    /// one second at a time.
    pub fn tick(&mut self, now_ms: u64, user: &User) -> Vec<Effect> {
        let mut effects = Vec::new();
        let tick_ms = self.timings.tick_ms;
        let poll_ms = self.timings.location_poll_ms;

        let mut reached_zero = false;
        let mut expired = false;
        match &mut self.phase {
            Phase::Arming {
                session,
                next_tick_ms,
                next_sample_ms,
            } => {
                while session.countdown_remaining > 0 && now_ms >= *next_tick_ms {
                    session.countdown_remaining -= 1;
                    *next_tick_ms = next_tick_ms.saturating_add(tick_ms);
                    effects.push(Effect::Countdown {
                        session: session.id,
                        remaining: session.countdown_remaining,
                    });
                }
                if session.countdown_remaining == 0 {
                    reached_zero = true;
                } else if now_ms >= *next_sample_ms {
                    effects.push(Effect::SampleLocation { session: session.id });
                    *next_sample_ms = now_ms.saturating_add(poll_ms);
                }
            }
            Phase::Cooldown { until_ms, .. } => {
                expired = now_ms >= *until_ms;
            }
            Phase::Idle | Phase::Dispatching { .. } => {}
        }

        if reached_zero {
            if let Phase::Arming { mut session, .. } = mem::replace(&mut self.phase, Phase::Idle) {
                if user.has_contacts() {
                    session.state = AlertState::Dispatching;
                    self.phase = Phase::Dispatching {
                        session: session.clone(),
                    };
                    effects.push(Effect::Dispatch {
                        session,
                        user: user.clone(),
                    });
                } else {
                    effects.push(Effect::Blocked(AlertError::NoEmergencyContacts));
                }
            }
        } else if expired {
            if let Phase::Cooldown { session, .. } = mem::replace(&mut self.phase, Phase::Idle) {
                effects.push(Effect::ConfirmationClosed {
                    session: session.id,
                    reason: CloseReason::Expired,
                });
            }
        }
        effects
    }

    pub fn dispatch_completed(&mut self, now_ms: u64) -> Vec<Effect> {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Dispatching { mut session } => {
                let until_ms = now_ms.saturating_add(self.timings.confirmation_ms);
                session.state = AlertState::Cooldown;
                let id = session.id;
                self.phase = Phase::Cooldown { session, until_ms };
                vec![Effect::ConfirmationShown { session: id, until_ms }]
            }
            other => {
                self.phase = other;
                Vec::new()
            }
        }
    }

    pub fn dispatch_failed(&mut self, err: AlertError) -> Vec<Effect> {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Dispatching { .. } => vec![Effect::Blocked(err)],
            other => {
                self.phase = other;
                Vec::new()
            }
        }
    }

    /// User cancel. Only meaningful during the countdown.
    pub fn cancel(&mut self) -> Vec<Effect> {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Arming { session, .. } => vec![Effect::Cancelled {
                session: session.id,
                remaining: session.countdown_remaining,
            }],
            other => {
                self.phase = other;
                Vec::new()
            }
        }
    }

    /// Manual close of the confirmation. A second call is a no-op.
    pub fn dismiss(&mut self) -> Vec<Effect> {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Cooldown { session, .. } => vec![Effect::ConfirmationClosed {
                session: session.id,
                reason: CloseReason::Dismissed,
            }],
            other => {
                self.phase = other;
                Vec::new()
            }
        }
    }

    /// Apply a location result. Results for any session other than the one
    /// currently arming or dispatching are dropped, and a failed sample
    /// never erases an earlier fix.
    pub fn location_resolved(&mut self, id: SessionId, fix: Option<Position>) -> bool {
        match &mut self.phase {
            Phase::Arming { session, .. } | Phase::Dispatching { session } if session.id == id => {
                match fix {
                    Some(p) => {
                        session.last_known = Location::Known(p);
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }
}
