pub mod client;
pub mod error;
pub mod types;

pub use client::{
    BackendClient, CallWorker, DEFAULT_ENDPOINT, ReplyCall, ReplyCallHandle, normalize_endpoint,
};
pub use error::{BackendError, BackendResult};
pub use types::{
    AgentReply, AgentTurn, ExchangeUpload, MODEL_ROLE, MintedIdentity, SessionRecord,
    StoredMessage, USER_ROLE,
};
