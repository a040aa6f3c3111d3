use bacbrowse_client::ClientError;
use bacbrowse_datalink::DataLinkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("settings io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings format error: {0}")]
    Format(#[from] serde_json::Error),
    #[error("settings store rejected the write: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum BrowseError {
    #[error("no active BACnet client")]
    NotRunning,
    #[error("unknown device {0}")]
    DeviceNotFound(String),
    #[error("invalid object key {0:?}")]
    InvalidObjectKey(String),
    #[error("request timed out")]
    Timeout,
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("failed to bind BACnet client: {0}")]
    Bind(DataLinkError),
    #[error("transport error: {0}")]
    Transport(ClientError),
}

impl From<ClientError> for BrowseError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Timeout => Self::Timeout,
            ClientError::Closed => Self::NotRunning,
            ClientError::Decode(err) => Self::MalformedResponse(err.to_string()),
            ClientError::UnsupportedResponse => {
                Self::MalformedResponse("unexpected response shape".into())
            }
            other => Self::Transport(other),
        }
    }
}
