//! Session orchestration: the phase machine tying the pieces together.
//!
//! A session moves through four phases: picking a locale and difficulty
//! (`Selecting`), negotiating a scenario (`Proposed`), talking to the
//! character (`Conversing`), and reviewing the outcome (`Concluded`).
//! [`Session`] is a plain value mutated only through [`Session::apply`];
//! [`SessionOrchestrator`] wraps it with the collaborators, single-flight
//! enforcement, and staleness handling, and is what callers interact with.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::api::TutorApi;
use crate::conversation::{Conversation, ConversationEngine};
use crate::error::SessionError;
use crate::locale::{FALLBACK_LOCALE, Language, LocaleCatalog};
use crate::scenario::{ScenarioNegotiator, ScenarioProposal};

/// Phase of a session. Transitions only happen through [`Session::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Choosing locale, difficulty, and optional preferences.
    Selecting,
    /// A scenario proposal is on the table, awaiting accept/modify/reject.
    Proposed,
    /// The conversation with the character is underway.
    Conversing,
    /// The conversation reached a resolution; only a restart is possible.
    Concluded,
}

/// State changes applied to a [`Session`]. Each variant carries the full
/// result of an already-completed operation, so applying one never fails
/// for a reason other than being in the wrong phase.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A fresh proposal arrived for the given selection.
    ProposalReceived {
        locale: String,
        difficulty: String,
        preferences: Option<String>,
        proposal: ScenarioProposal,
    },
    /// The current proposal was replaced (modification or rejection).
    ProposalReplaced(ScenarioProposal),
    /// The learner accepted the current proposal.
    ProposalAccepted,
    /// A conversation turn finished; the carried state supersedes the old.
    TurnCompleted(Conversation),
    /// The learner abandoned the session for a fresh one.
    Restarted,
}

/// The complete state of one learning session.
#[derive(Debug, Clone)]
pub struct Session {
    phase: Phase,
    locale: String,
    difficulty: String,
    preferences: Option<String>,
    proposal: Option<ScenarioProposal>,
    conversation: Conversation,
    last_error: Option<String>,
    generation: u64,
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: Phase::Selecting,
            locale: FALLBACK_LOCALE.to_string(),
            difficulty: "A1".to_string(),
            preferences: None,
            proposal: None,
            conversation: Conversation::empty(),
            last_error: None,
            generation: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn difficulty(&self) -> &str {
        &self.difficulty
    }

    pub fn preferences(&self) -> Option<&str> {
        self.preferences.as_deref()
    }

    pub fn proposal(&self) -> Option<&ScenarioProposal> {
        self.proposal.as_ref()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// The message of the most recent failed operation, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Monotonic counter bumped on every restart. Results produced under an
    /// older generation are discarded instead of applied.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn record_error(&mut self, message: String) {
        self.last_error = Some(message);
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Applies one event, enforcing phase legality.
    pub fn apply(&mut self, event: SessionEvent) -> Result<(), SessionError> {
        match event {
            SessionEvent::ProposalReceived {
                locale,
                difficulty,
                preferences,
                proposal,
            } => {
                if !matches!(self.phase, Phase::Selecting | Phase::Proposed) {
                    return Err(SessionError::InvalidTransition {
                        phase: self.phase,
                        event: "receive proposal",
                    });
                }
                self.locale = locale;
                self.difficulty = difficulty;
                self.preferences = preferences;
                self.proposal = Some(proposal);
                self.phase = Phase::Proposed;
            }
            SessionEvent::ProposalReplaced(proposal) => {
                if self.phase != Phase::Proposed {
                    return Err(SessionError::InvalidTransition {
                        phase: self.phase,
                        event: "replace proposal",
                    });
                }
                self.proposal = Some(proposal);
            }
            SessionEvent::ProposalAccepted => {
                if self.phase != Phase::Proposed {
                    return Err(SessionError::InvalidTransition {
                        phase: self.phase,
                        event: "accept proposal",
                    });
                }
                let proposal =
                    self.proposal
                        .as_ref()
                        .ok_or(SessionError::InvalidTransition {
                            phase: self.phase,
                            event: "accept proposal",
                        })?;
                self.conversation = Conversation::start(proposal);
                self.phase = Phase::Conversing;
            }
            SessionEvent::TurnCompleted(conversation) => {
                if self.phase != Phase::Conversing {
                    return Err(SessionError::InvalidTransition {
                        phase: self.phase,
                        event: "complete turn",
                    });
                }
                let concluded = conversation.is_complete();
                self.conversation = conversation;
                if concluded {
                    self.phase = Phase::Concluded;
                }
            }
            SessionEvent::Restarted => {
                if !matches!(self.phase, Phase::Conversing | Phase::Concluded) {
                    return Err(SessionError::InvalidTransition {
                        phase: self.phase,
                        event: "restart",
                    });
                }
                let generation = self.generation;
                *self = Session::new();
                self.generation = generation + 1;
            }
        }
        self.last_error = None;
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the in-flight flag when dropped, including on early return.
struct FlightGuard<'a> {
    busy: &'a AtomicBool,
}

impl<'a> FlightGuard<'a> {
    fn acquire(busy: &'a AtomicBool) -> Result<Self, SessionError> {
        match busy.compare_exchange(false, true, Ordering::Acquire, Ordering::Acquire) {
            Ok(_) => Ok(Self { busy }),
            Err(_) => Err(SessionError::RequestInFlight),
        }
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Drives a [`Session`] through its phases.
///
/// At most one oracle-bound operation runs at a time; a second request while
/// one is in flight is rejected with [`SessionError::RequestInFlight`]
/// rather than queued. Restarting is the one exception: it supersedes any
/// in-flight work, whose result is then discarded on arrival.
pub struct SessionOrchestrator {
    catalog: LocaleCatalog,
    negotiator: ScenarioNegotiator,
    engine: ConversationEngine,
    session: Mutex<Session>,
    busy: AtomicBool,
}

impl SessionOrchestrator {
    pub fn new(api: Arc<dyn TutorApi>) -> Self {
        Self {
            catalog: LocaleCatalog::new(api.clone()),
            negotiator: ScenarioNegotiator::new(api.clone()),
            engine: ConversationEngine::new(api),
            session: Mutex::new(Session::new()),
            busy: AtomicBool::new(false),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A point-in-time copy of the session state.
    pub fn snapshot(&self) -> Session {
        self.session().clone()
    }

    /// The locale catalog. Not subject to single-flight: browsing languages
    /// never conflicts with session operations.
    pub async fn languages(&self) -> Result<&[Language], SessionError> {
        self.catalog.languages().await
    }

    /// Requests a scenario for the given selection. Valid while selecting,
    /// or while a proposal is on the table (re-generating with new inputs).
    pub async fn generate(
        &self,
        locale: &str,
        difficulty: &str,
        preferences: Option<String>,
    ) -> Result<Session, SessionError> {
        let _flight = FlightGuard::acquire(&self.busy)?;
        let generation = {
            let session = self.session();
            if !matches!(session.phase(), Phase::Selecting | Phase::Proposed) {
                return Err(SessionError::InvalidTransition {
                    phase: session.phase(),
                    event: "generate scenario",
                });
            }
            session.generation()
        };

        let result = self
            .negotiator
            .propose(difficulty, locale, preferences.clone(), None)
            .await;
        self.finish(generation, result, |proposal| SessionEvent::ProposalReceived {
            locale: locale.to_string(),
            difficulty: difficulty.to_string(),
            preferences,
            proposal,
        })
    }

    /// Asks for a targeted rework of the current proposal.
    pub async fn modify(&self, modification_request: &str) -> Result<Session, SessionError> {
        let _flight = FlightGuard::acquire(&self.busy)?;
        let (generation, current) = {
            let session = self.session();
            if session.phase() != Phase::Proposed {
                return Err(SessionError::InvalidTransition {
                    phase: session.phase(),
                    event: "modify scenario",
                });
            }
            let current = session.proposal().cloned().ok_or(
                SessionError::InvalidTransition {
                    phase: session.phase(),
                    event: "modify scenario",
                },
            )?;
            (session.generation(), current)
        };

        let result = self.negotiator.modify(&current, modification_request).await;
        self.finish(generation, result, SessionEvent::ProposalReplaced)
    }

    /// Rejects the current proposal and requests a replacement.
    pub async fn request_new(
        &self,
        veto_reason: Option<String>,
    ) -> Result<Session, SessionError> {
        let _flight = FlightGuard::acquire(&self.busy)?;
        let (generation, current) = {
            let session = self.session();
            if session.phase() != Phase::Proposed {
                return Err(SessionError::InvalidTransition {
                    phase: session.phase(),
                    event: "reject scenario",
                });
            }
            let current = session.proposal().cloned().ok_or(
                SessionError::InvalidTransition {
                    phase: session.phase(),
                    event: "reject scenario",
                },
            )?;
            (session.generation(), current)
        };

        let result = self
            .negotiator
            .reject_and_regenerate(&current, veto_reason)
            .await;
        self.finish(generation, result, SessionEvent::ProposalReplaced)
    }

    /// Accepts the current proposal and opens the conversation.
    pub fn accept(&self) -> Result<Session, SessionError> {
        let _flight = FlightGuard::acquire(&self.busy)?;
        let mut session = self.session();
        session.apply(SessionEvent::ProposalAccepted)?;
        info!(phase = ?session.phase(), "scenario accepted");
        Ok(session.clone())
    }

    /// Sends one learner message and applies the oracle's reply.
    pub async fn send_message(&self, text: &str) -> Result<Session, SessionError> {
        let _flight = FlightGuard::acquire(&self.busy)?;
        let (generation, mut conversation, scenario) = {
            let session = self.session();
            if session.phase() != Phase::Conversing {
                return Err(SessionError::InvalidTransition {
                    phase: session.phase(),
                    event: "send message",
                });
            }
            let scenario = session.proposal().cloned().ok_or(
                SessionError::InvalidTransition {
                    phase: session.phase(),
                    event: "send message",
                },
            )?;
            (
                session.generation(),
                session.conversation().clone(),
                scenario,
            )
        };

        // The turn runs against a private copy; the session only sees it
        // when the oracle succeeds.
        let result = self
            .engine
            .send_turn(&mut conversation, &scenario, text)
            .await
            .map(|_| conversation);
        self.finish(generation, result, SessionEvent::TurnCompleted)
    }

    /// Abandons the current scenario or conversation for a fresh session.
    ///
    /// Deliberately not subject to single-flight: restarting supersedes
    /// whatever is in flight, and the superseded result is discarded when it
    /// lands under the old generation.
    pub fn new_session(&self) -> Result<Session, SessionError> {
        let mut session = self.session();
        session.apply(SessionEvent::Restarted)?;
        info!(generation = session.generation(), "session restarted");
        Ok(session.clone())
    }

    /// Clears the recorded error after the caller has shown it.
    pub fn clear_error(&self) {
        self.session().clear_error();
    }

    /// Common tail: re-checks the generation, applies the event on success,
    /// records the error on failure. Results and failures from a superseded
    /// generation are both discarded without touching the session.
    fn finish<T>(
        &self,
        generation: u64,
        result: Result<T, SessionError>,
        event: impl FnOnce(T) -> SessionEvent,
    ) -> Result<Session, SessionError> {
        let mut session = self.session();
        if session.generation() != generation {
            debug!(
                stale = generation,
                current = session.generation(),
                outcome = if result.is_ok() { "result" } else { "failure" },
                "discarding outcome from a superseded session"
            );
            return match result {
                Ok(_) => Ok(session.clone()),
                Err(e) => Err(e),
            };
        }
        match result {
            Ok(value) => {
                session.apply(event(value))?;
                Ok(session.clone())
            }
            Err(e) => {
                session.record_error(e.to_string());
                Err(e)
            }
        }
    }
}
