use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gpui::*;
use gpui_component::{ActiveTheme, v_flex};
use gpui_tokio_bridge::Tokio;

use crate::chat::events::Submit;
use crate::chat::transcript::{ChatEntry, EntryRole, RequestId, SubmitTransition, Transcript};
use crate::chat::{Composer, EntryList};
use parley_backend::{
    AgentReply, AgentTurn, BackendClient, BackendResult, ExchangeUpload, MODEL_ROLE,
    ReplyCallHandle, StoredMessage, USER_ROLE,
};

/// In-flight request metadata kept outside the domain model. The user entry
/// is retained so the settled exchange can be persisted as a pair.
#[derive(Debug, Clone)]
struct ActiveRequest {
    request_id: RequestId,
    user_entry: ChatEntry,
}

/// Coordinator for the chat route: owns the transcript, wires the composer
/// to the backend, and reconciles the optimistic placeholder on settlement.
pub struct ChatView {
    composer: Entity<Composer>,
    entry_list: Entity<EntryList>,
    transcript: Transcript,
    client: Arc<BackendClient>,
    agent_deadline: Option<Duration>,
    /// Backend identity for persistence calls. Stays empty when minting
    /// fails; persistence then targets `/users/` unvalidated.
    identity: String,
    next_request_id: u64,
    active_request: Option<ActiveRequest>,
    identity_task: Option<Task<()>>,
    reply_worker_task: Option<Task<Result<(), gpui_tokio_bridge::JoinError>>>,
    reply_reader_task: Option<Task<()>>,
}

impl ChatView {
    pub fn new(
        client: Arc<BackendClient>,
        agent_deadline: Option<Duration>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let composer = cx.new(|cx| Composer::new(window, cx));
        let entry_list = cx.new(EntryList::new);

        cx.subscribe(&composer, |this, _, event: &Submit, cx| {
            this.handle_submit(event.clone(), cx);
        })
        .detach();

        let mut this = Self {
            composer,
            entry_list,
            transcript: Transcript::new(),
            client,
            agent_deadline,
            identity: String::new(),
            next_request_id: 1,
            active_request: None,
            identity_task: None,
            reply_worker_task: None,
            reply_reader_task: None,
        };

        this.reserve_next_request(cx);
        this.spawn_identity_mint(cx);
        this
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// One identity per chat-view construction. Failure is logged and leaves
    /// the identity empty; nothing blocks on it.
    fn spawn_identity_mint(&mut self, cx: &mut Context<Self>) {
        let client = self.client.clone();
        let minted = Tokio::spawn(cx, async move { client.mint_identity().await });

        self.identity_task = Some(cx.spawn(async move |this, cx| {
            match minted.await {
                Ok(Ok(identity)) => {
                    tracing::info!(id = %identity.id, "minted backend identity");
                    let _ = this.update(cx, |this, _cx| {
                        this.identity = identity.id;
                    });
                }
                Ok(Err(error)) => {
                    tracing::error!(error = %error, "failed to mint backend identity");
                }
                Err(join_error) => {
                    tracing::error!(error = %join_error, "identity worker aborted");
                }
            }
        }));
    }

    fn handle_submit(&mut self, event: Submit, cx: &mut Context<Self>) {
        if self.active_request.is_some() {
            // The composer disables itself while busy; ignore any stray submit.
            return;
        }

        let content = event.content.trim().to_string();
        if content.is_empty() {
            return;
        }

        if self
            .transcript
            .apply_submit_transition(SubmitTransition::Begin(event.request_id))
            .is_err()
        {
            return;
        }

        let submitted_at = Utc::now();
        let user_entry = ChatEntry::user_text(content.clone(), submitted_at);
        let placeholder = ChatEntry::pending_model(submitted_at);

        if let Err(rejection) = self
            .transcript
            .append_exchange(user_entry.clone(), placeholder)
        {
            tracing::error!(
                rejection = ?rejection,
                "optimistic append rejected; rolling back submit state"
            );
            let _ = self
                .transcript
                .apply_submit_transition(SubmitTransition::Settle(event.request_id));
            return;
        }

        self.active_request = Some(ActiveRequest {
            request_id: event.request_id,
            user_entry,
        });

        self.composer.update(cx, |composer, cx| {
            composer.set_busy(true, cx);
        });

        // The optimistic pair must be on screen before the call is issued.
        self.sync_entries(cx);

        // Reserve the next request id immediately so follow-up submissions
        // never reuse a target.
        self.next_request_id = self.next_request_id.saturating_add(1);
        self.reserve_next_request(cx);

        let turn = AgentTurn::user(content, submitted_at);
        let ReplyCallHandle { mut call, worker } =
            self.client.begin_reply(turn, self.agent_deadline);

        self.reply_worker_task = Some(Tokio::spawn(cx, worker));

        let request_id = event.request_id;
        self.reply_reader_task = Some(cx.spawn(async move |this, cx| {
            let outcome = call.settle().await;
            let _ = this.update(cx, |this, cx| {
                this.handle_reply_settled(request_id, outcome, cx);
            });
        }));

        cx.notify();
    }

    fn handle_reply_settled(
        &mut self,
        request_id: RequestId,
        outcome: BackendResult<AgentReply>,
        cx: &mut Context<Self>,
    ) {
        match self.active_request.as_ref() {
            Some(active) if active.request_id == request_id => {}
            // Settlement for a request this view no longer tracks.
            _ => return,
        }
        let Some(active_request) = self.active_request.take() else {
            return;
        };

        self.reply_worker_task = None;
        self.reply_reader_task = None;

        let settled_model_entry = match outcome {
            Ok(reply) => {
                let model_entry = ChatEntry::model_text(reply.content, reply.created_at);
                if let Err(rejection) = self.transcript.replace_last(model_entry.clone()) {
                    tracing::error!(rejection = ?rejection, "failed to install the model reply");
                }
                Some(model_entry)
            }
            Err(error) => {
                tracing::error!(error = %error, "agent call failed");
                if let Err(rejection) = self
                    .transcript
                    .replace_last(ChatEntry::agent_error(Utc::now()))
                {
                    tracing::error!(rejection = ?rejection, "failed to install the error entry");
                }
                None
            }
        };

        let _ = self
            .transcript
            .apply_submit_transition(SubmitTransition::Settle(request_id));

        self.composer.update(cx, |composer, cx| {
            composer.set_busy(false, cx);
        });
        self.sync_entries(cx);

        // A failed exchange is never persisted.
        if let Some(model_entry) = settled_model_entry {
            self.spawn_persist_exchange(&active_request.user_entry, &model_entry, cx);
        }

        cx.notify();
    }

    fn spawn_persist_exchange(
        &self,
        user_entry: &ChatEntry,
        model_entry: &ChatEntry,
        cx: &mut Context<Self>,
    ) {
        let upload = ExchangeUpload::new(entry_to_stored(user_entry), entry_to_stored(model_entry));
        let client = self.client.clone();
        let identity = self.identity.clone();

        let persisted =
            Tokio::spawn(cx, async move { client.persist_exchange(&identity, &upload).await });

        // Fire-and-forget: failures are logged and never resurface, so the
        // on-screen transcript and the stored one can silently diverge.
        cx.spawn(async move |_this, _cx| match persisted.await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::warn!(error = %error, "failed to persist exchange");
            }
            Err(join_error) => {
                tracing::warn!(error = %join_error, "persistence worker aborted");
            }
        })
        .detach();
    }

    fn reserve_next_request(&mut self, cx: &mut Context<Self>) {
        let request_id = RequestId::new(self.next_request_id);
        self.composer.update(cx, |composer, cx| {
            composer.set_request_id(request_id, cx);
        });
    }

    fn sync_entries(&mut self, cx: &mut Context<Self>) {
        let entries = self.transcript.entries().to_vec();
        self.entry_list.update(cx, |list, cx| {
            list.set_entries(entries, cx);
        });
    }
}

fn entry_to_stored(entry: &ChatEntry) -> StoredMessage {
    StoredMessage {
        created_at: entry.created_at,
        content: entry.content.clone(),
        role: match entry.role {
            EntryRole::User => USER_ROLE.to_string(),
            EntryRole::Model => MODEL_ROLE.to_string(),
        },
    }
}

impl Render for ChatView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .id("chat-view")
            .relative()
            .size_full()
            .min_h_0()
            .overflow_hidden()
            .bg(theme.background)
            .child(
                div()
                    .id("chat-view-entry-list")
                    .flex_1()
                    .min_h_0()
                    .child(self.entry_list.clone()),
            )
            .child(
                div()
                    .id("chat-view-composer")
                    .flex_shrink_0()
                    .w_full()
                    .border_t_1()
                    .border_color(theme.border)
                    .child(self.composer.clone()),
            )
    }
}
