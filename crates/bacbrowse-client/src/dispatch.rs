//! Receive-side demultiplexing for [`BacnetClient`](crate::BacnetClient).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bacbrowse_core::apdu::{
    AbortPdu, ApduType, ComplexAckHeader, ErrorPdu, RejectPdu, SegmentAck,
    UnconfirmedRequestHeader,
};
use bacbrowse_core::encoding::{reader::Reader, writer::Writer};
use bacbrowse_core::npdu::Npdu;
use bacbrowse_core::services::i_am::{IAmRequest, SERVICE_I_AM};
use bacbrowse_datalink::{DataLink, DataLinkAddress, DataLinkError};
use tokio::sync::{mpsc, oneshot};

use crate::{ClientError, DiscoveredDevice};

pub(crate) const MAX_NPDU_LEN: usize = 1600;
pub(crate) const MAX_COMPLEX_ACK_REASSEMBLY_BYTES: usize = 1024 * 1024;

pub(crate) type PendingKey = (DataLinkAddress, u8);
pub(crate) type Reply = Result<Vec<u8>, ClientError>;

pub(crate) struct PendingRequest {
    pub(crate) service_choice: u8,
    pub(crate) reply: oneshot::Sender<Reply>,
    segments: Option<Reassembly>,
}

impl PendingRequest {
    pub(crate) fn new(service_choice: u8, reply: oneshot::Sender<Reply>) -> Self {
        Self {
            service_choice,
            reply,
            segments: None,
        }
    }
}

#[derive(Default)]
struct Reassembly {
    next_sequence: u8,
    payload: Vec<u8>,
}

enum SegmentStep {
    Accepted { last: bool },
    Repeat,
    Drop,
    TooLarge,
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the client handle and its receive task.
pub(crate) struct Shared<D> {
    pub(crate) datalink: D,
    pub(crate) pending: Mutex<HashMap<PendingKey, PendingRequest>>,
    announcements: Mutex<Option<mpsc::UnboundedSender<DiscoveredDevice>>>,
    closed: AtomicBool,
}

impl<D: DataLink> Shared<D> {
    pub(crate) fn new(datalink: D, announcements: mpsc::UnboundedSender<DiscoveredDevice>) -> Self {
        Self {
            datalink,
            pending: Mutex::new(HashMap::new()),
            announcements: Mutex::new(Some(announcements)),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Marks the client closed, fails every waiting request with
    /// [`ClientError::Closed`] and ends the discovery stream.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let drained: Vec<_> = lock(&self.pending).drain().collect();
        for (_, request) in drained {
            let _ = request.reply.send(Err(ClientError::Closed));
        }
        lock(&self.announcements).take();
    }

    fn complete(&self, key: PendingKey, service_choice: Option<u8>, reply: Reply) {
        let mut pending = lock(&self.pending);
        let matches = pending
            .get(&key)
            .is_some_and(|p| service_choice.map_or(true, |s| s == p.service_choice));
        if !matches {
            return;
        }
        if let Some(request) = pending.remove(&key) {
            let _ = request.reply.send(reply);
        }
    }

    async fn handle_frame(&self, frame: &[u8], source: DataLinkAddress) {
        let mut r = Reader::new(frame);
        let npdu = match Npdu::decode(&mut r) {
            Ok(npdu) => npdu,
            Err(err) => {
                log::debug!("ignoring frame from {source}: {err}");
                return;
            }
        };
        if npdu.is_network_message() {
            return;
        }
        let apdu = r.rest();
        let outcome = match ApduType::of(apdu) {
            Some(ApduType::UnconfirmedRequest) => self.handle_unconfirmed(apdu, source),
            Some(ApduType::ComplexAck) => self.handle_complex_ack(apdu, source).await,
            Some(ApduType::Error) => ErrorPdu::decode(&mut Reader::new(apdu)).map(|err| {
                self.complete(
                    (source, err.invoke_id),
                    Some(err.service_choice),
                    Err(ClientError::RemoteServiceError {
                        service_choice: err.service_choice,
                        error_class: err.error_class,
                        error_code: err.error_code,
                    }),
                )
            }),
            Some(ApduType::Reject) => RejectPdu::decode(&mut Reader::new(apdu)).map(|rej| {
                self.complete(
                    (source, rej.invoke_id),
                    None,
                    Err(ClientError::RemoteReject { reason: rej.reason }),
                )
            }),
            Some(ApduType::Abort) => AbortPdu::decode(&mut Reader::new(apdu)).map(|abort| {
                self.complete(
                    (source, abort.invoke_id),
                    None,
                    Err(ClientError::RemoteAbort {
                        reason: abort.reason,
                        server: abort.server,
                    }),
                )
            }),
            _ => Ok(()),
        };
        if let Err(err) = outcome {
            log::debug!("ignoring malformed apdu from {source}: {err}");
        }
    }

    fn handle_unconfirmed(
        &self,
        apdu: &[u8],
        source: DataLinkAddress,
    ) -> Result<(), bacbrowse_core::DecodeError> {
        let mut r = Reader::new(apdu);
        let header = UnconfirmedRequestHeader::decode(&mut r)?;
        if header.service_choice != SERVICE_I_AM {
            return Ok(());
        }
        let i_am = IAmRequest::decode_after_header(&mut r)?;
        log::debug!(
            "i-am from {source}: device {}",
            i_am.device_id.instance()
        );
        if let Some(tx) = lock(&self.announcements).as_ref() {
            let _ = tx.send(DiscoveredDevice::from_i_am(source, i_am));
        }
        Ok(())
    }

    async fn handle_complex_ack(
        &self,
        apdu: &[u8],
        source: DataLinkAddress,
    ) -> Result<(), bacbrowse_core::DecodeError> {
        let mut r = Reader::new(apdu);
        let header = ComplexAckHeader::decode(&mut r)?;
        let body = r.rest();
        let key = (source, header.invoke_id);

        let segment_ack = {
            let mut pending = lock(&self.pending);
            let Some(request) = pending.get_mut(&key) else {
                return Ok(());
            };
            if request.service_choice != header.service_choice {
                return Ok(());
            }
            if !header.segmented {
                if let Some(request) = pending.remove(&key) {
                    let _ = request.reply.send(Ok(body.to_vec()));
                }
                return Ok(());
            }

            let sequence = header.sequence_number.unwrap_or(0);
            let window = header.proposed_window_size.unwrap_or(1);
            let step = {
                let state = request.segments.get_or_insert_with(Reassembly::default);
                if sequence != state.next_sequence {
                    // Duplicate of the last accepted segment: acknowledge it
                    // again. Anything else is out of order and dropped.
                    if state.next_sequence != 0 && sequence == state.next_sequence.wrapping_sub(1)
                    {
                        SegmentStep::Repeat
                    } else {
                        SegmentStep::Drop
                    }
                } else if state.payload.len() + body.len() > MAX_COMPLEX_ACK_REASSEMBLY_BYTES {
                    SegmentStep::TooLarge
                } else {
                    state.payload.extend_from_slice(body);
                    state.next_sequence = sequence.wrapping_add(1);
                    SegmentStep::Accepted {
                        last: !header.more_follows,
                    }
                }
            };

            match step {
                SegmentStep::Drop => return Ok(()),
                SegmentStep::TooLarge => {
                    if let Some(request) = pending.remove(&key) {
                        let _ = request.reply.send(Err(ClientError::ResponseTooLarge {
                            limit: MAX_COMPLEX_ACK_REASSEMBLY_BYTES,
                        }));
                    }
                    return Ok(());
                }
                SegmentStep::Accepted { last: true } => {
                    if let Some(mut request) = pending.remove(&key) {
                        let payload = request
                            .segments
                            .take()
                            .map(|s| s.payload)
                            .unwrap_or_default();
                        let _ = request.reply.send(Ok(payload));
                    }
                }
                SegmentStep::Accepted { last: false } | SegmentStep::Repeat => {}
            }
            SegmentAck {
                negative_ack: false,
                sent_by_server: false,
                invoke_id: header.invoke_id,
                sequence_number: sequence,
                actual_window_size: window,
            }
        };

        let mut w = Writer::new();
        Npdu::local(false).encode(&mut w);
        segment_ack.encode(&mut w);
        if let Err(err) = self.datalink.send(source, w.as_written()).await {
            log::warn!("failed to send segment ack to {source}: {err}");
        }
        Ok(())
    }
}

/// Receive loop. Runs until aborted or until the data link reports
/// [`DataLinkError::Closed`].
pub(crate) async fn run<D: DataLink + 'static>(shared: Arc<Shared<D>>) {
    let mut buf = vec![0u8; MAX_NPDU_LEN];
    loop {
        match shared.datalink.recv(&mut buf).await {
            Ok((n, source)) => shared.handle_frame(&buf[..n], source).await,
            Err(DataLinkError::Closed) => break,
            Err(DataLinkError::Io(err)) => {
                log::warn!("receive failed: {err}");
                tokio::task::yield_now().await;
            }
            Err(err) => log::debug!("dropping frame: {err}"),
        }
    }
}
