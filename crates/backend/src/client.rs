use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use snafu::ResultExt;
use tokio::sync::oneshot;

use crate::error::{
    BackendResult, CancelledSnafu, DeadlineElapsedSnafu, DecodeResponseSnafu, TransportSnafu,
    UnexpectedStatusSnafu,
};
use crate::types::{AgentReply, AgentTurn, ExchangeUpload, MintedIdentity, SessionRecord};

/// Backend address used when the settings file provides none.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";

/// Strips whitespace and trailing slashes so path joins stay predictable.
/// An empty value falls back to [`DEFAULT_ENDPOINT`].
pub fn normalize_endpoint(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_ENDPOINT.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Typed client for the chat backend's four endpoints.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    endpoint: String,
}

impl BackendClient {
    pub fn new(endpoint: impl AsRef<str>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: normalize_endpoint(endpoint.as_ref()),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// `POST /users` — mints the identity used for persistence calls.
    pub async fn mint_identity(&self) -> BackendResult<MintedIdentity> {
        let response = self
            .http
            .post(self.url("/users"))
            .send()
            .await
            .context(TransportSnafu {
                stage: "mint-identity",
            })?;

        decode_json(response, "mint-identity").await
    }

    /// `POST /agent` — one user turn in, the model reply out. Prefer
    /// [`BackendClient::begin_reply`] from the UI so the call carries a
    /// cancel channel and an optional deadline.
    pub async fn generate_reply(&self, turn: &AgentTurn) -> BackendResult<AgentReply> {
        let response = self
            .http
            .post(self.url("/agent"))
            .json(turn)
            .send()
            .await
            .context(TransportSnafu {
                stage: "generate-reply",
            })?;

        decode_json(response, "generate-reply").await
    }

    /// `PUT /users/{identity}` — appends one exchange to the identity's
    /// stored session. The response body is not consumed.
    pub async fn persist_exchange(
        &self,
        identity: &str,
        upload: &ExchangeUpload,
    ) -> BackendResult<()> {
        let response = self
            .http
            .put(self.url(&format!("/users/{identity}")))
            .json(upload)
            .send()
            .await
            .context(TransportSnafu {
                stage: "persist-exchange",
            })?;

        expect_success(response, "persist-exchange").await.map(drop)
    }

    /// `GET /chats` — every persisted session, in backend order.
    pub async fn list_sessions(&self) -> BackendResult<Vec<SessionRecord>> {
        let response = self
            .http
            .get(self.url("/chats"))
            .send()
            .await
            .context(TransportSnafu {
                stage: "list-sessions",
            })?;

        decode_json(response, "list-sessions").await
    }

    /// Starts one cancellable agent invocation. The returned worker future
    /// must be spawned on the tokio runtime; the call half settles exactly
    /// once and signals cancellation to the worker when dropped.
    pub fn begin_reply(&self, turn: AgentTurn, deadline: Option<Duration>) -> ReplyCallHandle {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let worker: CallWorker = Box::pin(run_reply_worker(
            self.clone(),
            turn,
            deadline,
            outcome_tx,
            cancel_rx,
        ));

        ReplyCallHandle {
            call: ReplyCall::new(outcome_rx, cancel_tx),
            worker,
        }
    }
}

pub type CallWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Outcome half of one agent invocation.
pub struct ReplyCall {
    outcome: oneshot::Receiver<BackendResult<AgentReply>>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

/// Pairs the outcome half with the worker future that drives the HTTP call.
pub struct ReplyCallHandle {
    pub call: ReplyCall,
    pub worker: CallWorker,
}

impl ReplyCall {
    pub(crate) fn new(
        outcome: oneshot::Receiver<BackendResult<AgentReply>>,
        cancel_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            outcome,
            cancel_tx: Some(cancel_tx),
        }
    }

    /// Waits for the worker to settle. A worker that disappears without
    /// reporting is treated as cancelled.
    pub async fn settle(&mut self) -> BackendResult<AgentReply> {
        match (&mut self.outcome).await {
            Ok(outcome) => outcome,
            Err(_) => CancelledSnafu {
                stage: "reply-settle",
            }
            .fail(),
        }
    }

    /// Signals cancellation to the worker. Returns false when the worker is
    /// already gone or cancellation was already requested.
    pub fn cancel(&mut self) -> bool {
        self.cancel_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }
}

impl Drop for ReplyCall {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }
}

async fn run_reply_worker(
    client: BackendClient,
    turn: AgentTurn,
    deadline: Option<Duration>,
    outcome_tx: oneshot::Sender<BackendResult<AgentReply>>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let outcome = tokio::select! {
        _ = &mut cancel_rx => {
            tracing::debug!("agent call cancelled before settlement");
            CancelledSnafu { stage: "reply-worker" }.fail()
        }
        outcome = bounded_reply(&client, &turn, deadline) => outcome,
    };

    if let Err(error) = &outcome {
        tracing::debug!(error = %error, "agent call settled with an error");
    }

    // The receiving side may already be gone; nothing left to report to.
    let _ = outcome_tx.send(outcome);
}

async fn bounded_reply(
    client: &BackendClient,
    turn: &AgentTurn,
    deadline: Option<Duration>,
) -> BackendResult<AgentReply> {
    match deadline {
        Some(deadline) => match tokio::time::timeout(deadline, client.generate_reply(turn)).await {
            Ok(outcome) => outcome,
            Err(_) => DeadlineElapsedSnafu {
                stage: "reply-deadline",
                deadline_secs: deadline.as_secs(),
            }
            .fail(),
        },
        None => client.generate_reply(turn).await,
    }
}

async fn expect_success(
    response: reqwest::Response,
    stage: &'static str,
) -> BackendResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    UnexpectedStatusSnafu {
        stage,
        status: status.as_u16(),
        body,
    }
    .fail()
}

async fn decode_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    stage: &'static str,
) -> BackendResult<T> {
    let response = expect_success(response, stage).await?;
    response.json().await.context(DecodeResponseSnafu { stage })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use chrono::Utc;

    #[test]
    fn endpoint_normalization_strips_slashes_and_falls_back() {
        assert_eq!(
            normalize_endpoint("http://localhost:8000/"),
            "http://localhost:8000"
        );
        assert_eq!(
            normalize_endpoint("  http://example.test//  "),
            "http://example.test"
        );
        assert_eq!(normalize_endpoint(""), DEFAULT_ENDPOINT);
        assert_eq!(normalize_endpoint("   "), DEFAULT_ENDPOINT);
    }

    #[test]
    fn urls_join_the_fixed_paths() {
        let client = BackendClient::new("http://localhost:8000/");
        assert_eq!(client.url("/users"), "http://localhost:8000/users");
        assert_eq!(client.url("/agent"), "http://localhost:8000/agent");
        assert_eq!(client.url("/chats"), "http://localhost:8000/chats");
        assert_eq!(
            client.url(&format!("/users/{}", "abc")),
            "http://localhost:8000/users/abc"
        );
    }

    #[test]
    fn url_with_empty_identity_targets_the_bare_users_path() {
        // Identity minting can fail and leave the id empty; persistence then
        // PUTs to /users/ without client-side validation.
        let client = BackendClient::new("http://localhost:8000");
        assert_eq!(
            client.url(&format!("/users/{}", "")),
            "http://localhost:8000/users/"
        );
    }

    #[tokio::test]
    async fn settle_maps_a_vanished_worker_to_cancellation() {
        let (outcome_tx, outcome_rx) = oneshot::channel::<BackendResult<AgentReply>>();
        let (cancel_tx, _cancel_rx) = oneshot::channel();
        let mut call = ReplyCall::new(outcome_rx, cancel_tx);

        drop(outcome_tx);

        assert!(matches!(
            call.settle().await,
            Err(BackendError::Cancelled { .. })
        ));
    }

    #[tokio::test]
    async fn dropping_the_call_signals_the_cancel_channel() {
        let (_outcome_tx, outcome_rx) = oneshot::channel::<BackendResult<AgentReply>>();
        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        let call = ReplyCall::new(outcome_rx, cancel_tx);

        drop(call);

        assert!(cancel_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn pre_cancelled_worker_settles_as_cancelled() {
        let client = BackendClient::new("http://127.0.0.1:1");
        let ReplyCallHandle { mut call, worker } =
            client.begin_reply(AgentTurn::user("hi", Utc::now()), None);

        assert!(call.cancel());
        worker.await;

        assert!(matches!(
            call.settle().await,
            Err(BackendError::Cancelled { .. })
        ));
    }
}
