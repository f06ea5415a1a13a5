use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BackendError {
    #[snafu(display("backend request failed on `{stage}`: {source}"))]
    Transport {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("backend returned status {status} on `{stage}`: {body}"))]
    UnexpectedStatus {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to decode backend response on `{stage}`: {source}"))]
    DecodeResponse {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("agent call exceeded its {deadline_secs}s deadline"))]
    DeadlineElapsed {
        stage: &'static str,
        deadline_secs: u64,
    },
    #[snafu(display("agent call was cancelled before settlement"))]
    Cancelled { stage: &'static str },
}

pub type BackendResult<T> = Result<T, BackendError>;
