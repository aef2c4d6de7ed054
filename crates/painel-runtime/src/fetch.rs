#![forbid(unsafe_code)]

//! Request sequencing with last-write-wins resolution.
//!
//! Data fetches resolve asynchronously and out of order. When a list reload
//! is triggered again before the previous fetch resolved, the later request
//! must win. The coordinator does not cancel anything; it hands out
//! monotonic [`FetchToken`]s and discards a resolving response whose token is
//! no longer the newest one.
//!
//! # Design Principles
//!
//! 1. **Monotonic tokens**: every request gets a token greater than all
//!    previous ones. Token 0 is reserved for "no request".
//! 2. **Staleness prevention**: a result is applied only if its token is the
//!    newest issued token and it has not resolved before.
//! 3. **Event tracing**: every lifecycle step is recorded so tests can assert
//!    on the exact sequence and compare checksums.

use std::collections::VecDeque;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};

use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// FetchToken
// ---------------------------------------------------------------------------

/// A monotonically increasing request sequence number.
///
/// # Invariants
///
/// - Tokens are strictly monotonic per coordinator.
/// - Token 0 is reserved for "no request".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FetchToken(u64);

impl FetchToken {
    /// The null token.
    pub const NONE: Self = Self(0);

    /// Create a token from a raw value (for tests and host bookkeeping).
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Raw token value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whether this is the null token.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for FetchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// FetchEvent / FetchTrace
// ---------------------------------------------------------------------------

/// One step in a request's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FetchEvent {
    /// A request was issued.
    Started { token: FetchToken },
    /// An in-flight request was superseded by a newer one.
    Superseded {
        token: FetchToken,
        superseded_by: FetchToken,
    },
    /// A response arrived (applied or not).
    Completed { token: FetchToken, ok: bool },
    /// The response was applied.
    Applied { token: FetchToken },
    /// The response was discarded because a newer request exists or the
    /// token already resolved.
    StaleDiscarded {
        token: FetchToken,
        current_token: FetchToken,
    },
}

impl FetchEvent {
    /// Token the event refers to.
    #[must_use]
    pub fn token(&self) -> FetchToken {
        match self {
            Self::Started { token }
            | Self::Superseded { token, .. }
            | Self::Completed { token, .. }
            | Self::Applied { token }
            | Self::StaleDiscarded { token, .. } => *token,
        }
    }

    /// Stable event type name.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Superseded { .. } => "superseded",
            Self::Completed { .. } => "completed",
            Self::Applied { .. } => "applied",
            Self::StaleDiscarded { .. } => "stale_discarded",
        }
    }
}

/// Ordered log of fetch events.
#[derive(Debug, Clone, Default)]
pub struct FetchTrace {
    events: Vec<FetchEvent>,
}

impl FetchTrace {
    /// Create an empty trace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, event: FetchEvent) {
        self.events.push(event);
    }

    /// All events in order.
    #[must_use]
    pub fn events(&self) -> &[FetchEvent] {
        &self.events
    }

    /// Whether an event of `event_type` was recorded for `token`.
    #[must_use]
    pub fn contains_event_type(&self, token: FetchToken, event_type: &str) -> bool {
        self.events
            .iter()
            .any(|e| e.token() == token && e.event_type() == event_type)
    }

    /// Events recorded for one token.
    #[must_use]
    pub fn events_for_token(&self, token: FetchToken) -> Vec<&FetchEvent> {
        self.events.iter().filter(|e| e.token() == token).collect()
    }

    /// Deterministic checksum of the event sequence.
    #[must_use]
    pub fn checksum(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.events.hash(&mut hasher);
        hasher.finish()
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the trace is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop all events.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Check trace invariants; returns one description per violation.
    ///
    /// - Started tokens are strictly increasing.
    /// - No token is applied more than once.
    /// - No token is applied after a newer token started.
    #[must_use]
    pub fn verify_invariants(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let mut newest = FetchToken::NONE;
        let mut applied: Vec<FetchToken> = Vec::new();

        for event in &self.events {
            match event {
                FetchEvent::Started { token } => {
                    if *token <= newest {
                        violations.push(format!("{token} started after {newest}"));
                    }
                    newest = *token;
                }
                FetchEvent::Applied { token } => {
                    if applied.contains(token) {
                        violations.push(format!("{token} applied twice"));
                    }
                    if *token != newest {
                        violations.push(format!("{token} applied while {newest} is newest"));
                    }
                    applied.push(*token);
                }
                _ => {}
            }
        }
        violations
    }
}

// ---------------------------------------------------------------------------
// FetchCoordinator
// ---------------------------------------------------------------------------

/// Issues request tokens and decides which responses may be applied.
#[derive(Debug, Clone)]
pub struct FetchCoordinator {
    label: &'static str,
    next_token: u64,
    current_token: FetchToken,
    in_flight: VecDeque<FetchToken>,
    trace: FetchTrace,
}

impl Default for FetchCoordinator {
    fn default() -> Self {
        Self::new("fetch")
    }
}

impl FetchCoordinator {
    /// Create a coordinator; `label` tags log lines.
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            next_token: 1,
            current_token: FetchToken::NONE,
            in_flight: VecDeque::new(),
            trace: FetchTrace::new(),
        }
    }

    /// Issue a new token, superseding every in-flight request.
    pub fn start(&mut self) -> FetchToken {
        let token = FetchToken(self.next_token);
        self.next_token += 1;

        for old in self.in_flight.drain(..) {
            self.trace.push(FetchEvent::Superseded {
                token: old,
                superseded_by: token,
            });
        }
        self.in_flight.push_back(token);
        self.current_token = token;
        self.trace.push(FetchEvent::Started { token });
        debug!(label = self.label, %token, "request started");
        token
    }

    /// Record a response and decide whether it may be applied.
    ///
    /// Returns `true` only for the newest token's first resolution.
    pub fn try_apply(&mut self, token: FetchToken, ok: bool) -> bool {
        self.trace.push(FetchEvent::Completed { token, ok });

        let was_in_flight = self.in_flight.contains(&token);
        self.in_flight.retain(|t| *t != token);

        if token != self.current_token || !was_in_flight {
            self.trace.push(FetchEvent::StaleDiscarded {
                token,
                current_token: self.current_token,
            });
            warn!(label = self.label, %token, current = %self.current_token, "stale response discarded");
            return false;
        }

        self.trace.push(FetchEvent::Applied { token });
        true
    }

    /// The newest issued token.
    #[must_use]
    pub fn current_token(&self) -> FetchToken {
        self.current_token
    }

    /// Whether `token` is the newest token and still unresolved.
    #[must_use]
    pub fn is_pending(&self, token: FetchToken) -> bool {
        token == self.current_token && self.in_flight.contains(&token)
    }

    /// Number of unresolved requests.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether any request is unresolved.
    #[must_use]
    pub fn has_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// The event trace.
    #[must_use]
    pub fn trace(&self) -> &FetchTrace {
        &self.trace
    }

    /// Clear the trace.
    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    /// Verify trace invariants.
    pub fn verify_trace(&self) -> Result<(), Vec<String>> {
        let violations = self.trace.verify_invariants();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}
