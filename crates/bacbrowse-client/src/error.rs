use bacbrowse_datalink::DataLinkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("datalink error: {0}")]
    DataLink(#[from] DataLinkError),
    #[error("encode error: {0}")]
    Encode(#[from] bacbrowse_core::EncodeError),
    #[error("decode error: {0}")]
    Decode(#[from] bacbrowse_core::DecodeError),
    #[error("request timed out")]
    Timeout,
    #[error("client is shut down")]
    Closed,
    #[error("remote service error for service choice {service_choice} (class {error_class:?}, code {error_code:?})")]
    RemoteServiceError {
        service_choice: u8,
        error_class: Option<u32>,
        error_code: Option<u32>,
    },
    #[error("remote reject reason {reason}")]
    RemoteReject { reason: u8 },
    #[error("remote abort reason {reason} (server={server})")]
    RemoteAbort { reason: u8, server: bool },
    #[error("response payload exceeded {limit} bytes")]
    ResponseTooLarge { limit: usize },
    #[error("unsupported response")]
    UnsupportedResponse,
}
