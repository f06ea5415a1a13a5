use crate::chat::transcript::RequestId;

/// Emitted when the user submits a message for a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submit {
    pub request_id: RequestId,
    pub content: String,
}

impl Submit {
    /// Creates a submit event bound to the request id reserved for it.
    pub fn new(request_id: RequestId, content: impl Into<String>) -> Self {
        Self {
            request_id,
            content: content.into(),
        }
    }
}
