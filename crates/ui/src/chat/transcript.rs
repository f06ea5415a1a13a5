use chrono::{DateTime, Utc};

/// Fixed content of the in-flight placeholder entry.
pub const PENDING_MARKER: &str = "⏳";

/// Fixed transcript entry shown when the agent call fails.
pub const AGENT_ERROR_MESSAGE: &str = "Error generating response. Please try again.";

/// Identifier for one submission round-trip.
///
/// This must change on every submit so stale settlements can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Creates a typed request identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Chat speaker side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryRole {
    User,
    Model,
}

/// Rendering kind for one entry. `Loading` marks the transient placeholder
/// standing in for an in-flight reply; it never leaves the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Text,
    Loading,
}

/// One transcript entry. Never mutated after creation; a `Loading` entry is
/// replaced wholesale once the remote call settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub role: EntryRole,
    pub kind: EntryKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatEntry {
    /// Creates an entry with explicit role and kind.
    pub fn new(
        role: EntryRole,
        kind: EntryKind,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            role,
            kind,
            content: content.into(),
            created_at,
        }
    }

    /// Creates the user half of an optimistic exchange.
    pub fn user_text(content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self::new(EntryRole::User, EntryKind::Text, content, created_at)
    }

    /// Creates a settled model entry.
    pub fn model_text(content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self::new(EntryRole::Model, EntryKind::Text, content, created_at)
    }

    /// Creates the placeholder half of an optimistic exchange.
    pub fn pending_model(created_at: DateTime<Utc>) -> Self {
        Self::new(
            EntryRole::Model,
            EntryKind::Loading,
            PENDING_MARKER,
            created_at,
        )
    }

    /// Creates the fixed agent-failure entry.
    pub fn agent_error(created_at: DateTime<Utc>) -> Self {
        Self::model_text(AGENT_ERROR_MESSAGE, created_at)
    }

    pub fn is_loading(&self) -> bool {
        self.kind == EntryKind::Loading
    }
}

/// Rejection reason for a transcript mutation that would break the
/// single-placeholder invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptRejection {
    /// A placeholder is already in flight; a second pair may not be appended.
    PlaceholderAlreadyPresent,
    /// The pair is not a `User`/`Text` entry followed by a `Model`/`Loading` one.
    MalformedExchange,
    /// `replace_last` on an empty transcript.
    EmptyTranscript,
    /// `replace_last` may only settle a placeholder, never install one.
    ReplacementIsLoading,
}

/// Submit lifecycle: idle, or exactly one in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitState {
    #[default]
    Idle,
    Submitting(RequestId),
}

/// State transition input for the submit lifecycle. Success and failure both
/// settle back to idle; the distinction lives in the transcript entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTransition {
    Begin(RequestId),
    Settle(RequestId),
}

/// Rejection reason for illegal submit transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    AlreadySubmitting {
        active: RequestId,
        attempted: RequestId,
    },
    NoActiveRequest {
        attempted: RequestId,
    },
    RequestMismatch {
        active: RequestId,
        attempted: RequestId,
    },
}

pub type SubmitTransitionResult = Result<SubmitState, SubmitRejection>;

impl SubmitState {
    pub fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting(_))
    }

    /// Returns the active request if and only if one is in flight.
    pub fn active_request(&self) -> Option<RequestId> {
        match self {
            Self::Submitting(request_id) => Some(*request_id),
            Self::Idle => None,
        }
    }

    /// Applies one transition deterministically. A begin while submitting
    /// and a settle that does not match the active request are rejected.
    pub fn apply(&self, transition: SubmitTransition) -> SubmitTransitionResult {
        match transition {
            SubmitTransition::Begin(attempted) => match self {
                Self::Idle => Ok(Self::Submitting(attempted)),
                Self::Submitting(active) => Err(SubmitRejection::AlreadySubmitting {
                    active: *active,
                    attempted,
                }),
            },
            SubmitTransition::Settle(attempted) => match self {
                Self::Submitting(active) if *active == attempted => Ok(Self::Idle),
                Self::Submitting(active) => Err(SubmitRejection::RequestMismatch {
                    active: *active,
                    attempted,
                }),
                Self::Idle => Err(SubmitRejection::NoActiveRequest { attempted }),
            },
        }
    }
}

/// Ordered, append-only transcript for the active session plus its submit
/// lifecycle. Sole source of truth for on-screen chat order; discarded with
/// the process, never persisted client-side.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<ChatEntry>,
    submit_state: SubmitState,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn submit_state(&self) -> SubmitState {
        self.submit_state
    }

    /// Applies a submit transition against the aggregate's state.
    pub fn apply_submit_transition(
        &mut self,
        transition: SubmitTransition,
    ) -> SubmitTransitionResult {
        let next_state = self.submit_state.apply(transition)?;
        self.submit_state = next_state;
        Ok(next_state)
    }

    /// True when the final entry is the in-flight placeholder. The invariant
    /// keeps any placeholder at the tail, so scanning is unnecessary.
    pub fn has_placeholder(&self) -> bool {
        self.entries.last().is_some_and(ChatEntry::is_loading)
    }

    /// Appends one optimistic user/placeholder pair as a single mutation.
    pub fn append_exchange(
        &mut self,
        user: ChatEntry,
        placeholder: ChatEntry,
    ) -> Result<(), TranscriptRejection> {
        if self.has_placeholder() {
            return Err(TranscriptRejection::PlaceholderAlreadyPresent);
        }

        let user_shape_ok = user.role == EntryRole::User && user.kind == EntryKind::Text;
        let placeholder_shape_ok = placeholder.role == EntryRole::Model && placeholder.is_loading();
        if !user_shape_ok || !placeholder_shape_ok {
            return Err(TranscriptRejection::MalformedExchange);
        }

        self.entries.push(user);
        self.entries.push(placeholder);
        Ok(())
    }

    /// Replaces the final entry wholesale. The placeholder is never edited
    /// in place; settlement swaps it for a text entry.
    pub fn replace_last(&mut self, entry: ChatEntry) -> Result<(), TranscriptRejection> {
        if entry.is_loading() {
            return Err(TranscriptRejection::ReplacementIsLoading);
        }

        let Some(last) = self.entries.last_mut() else {
            return Err(TranscriptRejection::EmptyTranscript);
        };

        *last = entry;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, seconds).unwrap()
    }

    fn optimistic_pair(content: &str) -> (ChatEntry, ChatEntry) {
        (
            ChatEntry::user_text(content, at(0)),
            ChatEntry::pending_model(at(0)),
        )
    }

    #[test]
    fn append_exchange_appends_user_then_placeholder() {
        let mut transcript = Transcript::new();
        let (user, placeholder) = optimistic_pair("hello there");

        transcript
            .append_exchange(user, placeholder)
            .expect("first exchange accepted");

        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.entries()[0].role, EntryRole::User);
        assert_eq!(transcript.entries()[0].kind, EntryKind::Text);
        assert_eq!(transcript.entries()[0].content, "hello there");
        assert_eq!(transcript.entries()[1].role, EntryRole::Model);
        assert!(transcript.entries()[1].is_loading());
        assert_eq!(transcript.entries()[1].content, PENDING_MARKER);
        assert!(transcript.has_placeholder());
    }

    #[test]
    fn second_exchange_is_rejected_while_placeholder_is_pending() {
        let mut transcript = Transcript::new();
        let (user, placeholder) = optimistic_pair("first");
        transcript.append_exchange(user, placeholder).unwrap();

        let (user, placeholder) = optimistic_pair("second");
        assert_eq!(
            transcript.append_exchange(user, placeholder),
            Err(TranscriptRejection::PlaceholderAlreadyPresent)
        );
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn malformed_pairs_are_rejected() {
        let mut transcript = Transcript::new();

        // Placeholder on the user side.
        assert_eq!(
            transcript.append_exchange(
                ChatEntry::new(EntryRole::User, EntryKind::Loading, "x", at(0)),
                ChatEntry::pending_model(at(0)),
            ),
            Err(TranscriptRejection::MalformedExchange)
        );

        // Settled entry where the placeholder belongs.
        assert_eq!(
            transcript.append_exchange(
                ChatEntry::user_text("x", at(0)),
                ChatEntry::model_text("y", at(0)),
            ),
            Err(TranscriptRejection::MalformedExchange)
        );

        assert!(transcript.is_empty());
    }

    #[test]
    fn successful_settlement_replaces_the_placeholder_in_place() {
        let mut transcript = Transcript::new();
        let (user, placeholder) = optimistic_pair("question");
        transcript.append_exchange(user, placeholder).unwrap();

        transcript
            .replace_last(ChatEntry::model_text("answer", at(3)))
            .expect("settlement accepted");

        assert_eq!(transcript.len(), 2);
        let last = transcript.entries().last().unwrap();
        assert_eq!(last.role, EntryRole::Model);
        assert_eq!(last.kind, EntryKind::Text);
        assert_eq!(last.content, "answer");
        assert_eq!(last.created_at, at(3));
        assert!(!transcript.has_placeholder());
        assert!(
            transcript.entries().iter().all(|entry| !entry.is_loading()),
            "no loading entry survives settlement"
        );
    }

    #[test]
    fn failed_settlement_installs_the_fixed_error_entry() {
        let mut transcript = Transcript::new();
        let (user, placeholder) = optimistic_pair("question");
        transcript.append_exchange(user, placeholder).unwrap();

        transcript
            .replace_last(ChatEntry::agent_error(at(5)))
            .expect("error settlement accepted");

        assert_eq!(transcript.len(), 2);
        let last = transcript.entries().last().unwrap();
        assert_eq!(last.content, AGENT_ERROR_MESSAGE);
        assert_eq!(last.kind, EntryKind::Text);
        assert!(!transcript.has_placeholder());
    }

    #[test]
    fn replace_last_rejects_empty_transcript_and_loading_replacement() {
        let mut transcript = Transcript::new();
        assert_eq!(
            transcript.replace_last(ChatEntry::model_text("x", at(0))),
            Err(TranscriptRejection::EmptyTranscript)
        );

        let (user, placeholder) = optimistic_pair("q");
        transcript.append_exchange(user, placeholder).unwrap();
        assert_eq!(
            transcript.replace_last(ChatEntry::pending_model(at(1))),
            Err(TranscriptRejection::ReplacementIsLoading)
        );
    }

    #[test]
    fn submit_state_walks_begin_then_settle() {
        let mut transcript = Transcript::new();
        let request = RequestId::new(1);

        assert_eq!(transcript.submit_state(), SubmitState::Idle);
        assert_eq!(
            transcript.apply_submit_transition(SubmitTransition::Begin(request)),
            Ok(SubmitState::Submitting(request))
        );
        assert!(transcript.submit_state().is_submitting());
        assert_eq!(transcript.submit_state().active_request(), Some(request));

        assert_eq!(
            transcript.apply_submit_transition(SubmitTransition::Settle(request)),
            Ok(SubmitState::Idle)
        );
        assert_eq!(transcript.submit_state(), SubmitState::Idle);
    }

    #[test]
    fn begin_while_submitting_is_rejected() {
        let mut transcript = Transcript::new();
        let first = RequestId::new(1);
        let second = RequestId::new(2);
        transcript
            .apply_submit_transition(SubmitTransition::Begin(first))
            .unwrap();

        assert_eq!(
            transcript.apply_submit_transition(SubmitTransition::Begin(second)),
            Err(SubmitRejection::AlreadySubmitting {
                active: first,
                attempted: second,
            })
        );
        assert_eq!(transcript.submit_state(), SubmitState::Submitting(first));
    }

    #[test]
    fn stale_settlements_are_rejected() {
        let mut transcript = Transcript::new();
        let active = RequestId::new(7);
        let stale = RequestId::new(6);

        assert_eq!(
            transcript.apply_submit_transition(SubmitTransition::Settle(stale)),
            Err(SubmitRejection::NoActiveRequest { attempted: stale })
        );

        transcript
            .apply_submit_transition(SubmitTransition::Begin(active))
            .unwrap();
        assert_eq!(
            transcript.apply_submit_transition(SubmitTransition::Settle(stale)),
            Err(SubmitRejection::RequestMismatch {
                active,
                attempted: stale,
            })
        );
        assert!(transcript.submit_state().is_submitting());
    }
}
