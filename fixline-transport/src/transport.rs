/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Message transport bound to one duplex connection.
//!
//! A [`MsgTransport`] splits the connection into a receiver task, which frames
//! inbound bytes and publishes [`TransportEvent`]s in arrival order, and a
//! writer task, which pipes every buffer the [`MsgTransmitter`] produces into
//! the writable half until the transport ends.

use crate::codec::{ReceivedMsg, WireCodec};
use crate::config::{SubProtocol, TransportConfig};
use crate::transmitter::MsgTransmitter;
use bytes::Bytes;
use fixline_core::error::TransportError;
use fixline_core::message::MsgType;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, warn};

/// Capacity of the inbound event channel.
const EVENT_BUFFER: usize = 1024;

/// Event published by a transport's receiver and writer.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A message was framed; carries its log form.
    Decoded {
        /// MsgType of the message.
        msg_type: MsgType,
        /// Log form of the message.
        text: String,
        /// Bytes consumed from the connection.
        len: usize,
    },
    /// A framed message ready for dispatch.
    Msg(ReceivedMsg),
    /// The peer closed the connection.
    End,
    /// The receiver failed.
    RxError(TransportError),
    /// The writer failed.
    TxError(TransportError),
}

type Outcome = Option<Result<u32, TransportError>>;

/// Records the first outcome; later ones are dropped.
fn settle(outcome: &watch::Sender<Outcome>, result: Result<u32, TransportError>) {
    outcome.send_if_modified(|current| {
        if current.is_some() {
            return false;
        }
        *current = Some(result);
        true
    });
}

/// Receiver and transmitter bound to one duplex connection.
#[derive(Debug)]
pub struct MsgTransport {
    id: u32,
    protocol: SubProtocol,
    transmitter: MsgTransmitter,
    events: Option<mpsc::Receiver<TransportEvent>>,
    outcome: watch::Receiver<Outcome>,
    outcome_tx: watch::Sender<Outcome>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    ended: bool,
}

impl MsgTransport {
    /// Binds a transport to `duplex` and starts its receiver and writer tasks.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Arguments
    /// * `id` - Locally unique transport id
    /// * `config` - Transport configuration
    /// * `duplex` - The connection
    ///
    /// # Errors
    /// Returns `TransportError::Config` if the sub protocol is unknown or no
    /// delimiter is configured.
    pub fn new<S>(id: u32, config: &TransportConfig, duplex: S) -> Result<Self, TransportError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (protocol, _) = config.resolve()?;
        let codec = WireCodec::from_config(config)?;
        let mut transmitter = MsgTransmitter::new(config)?;

        let (read_half, write_half) = tokio::io::split(duplex);
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (bytes_tx, bytes_rx) = mpsc::channel::<Bytes>(config.write_buffer.max(1));
        let (outcome_tx, outcome) = watch::channel(None);
        transmitter.connect(bytes_tx);

        let reader = tokio::spawn(receive(
            id,
            FramedRead::new(read_half, codec.clone()),
            event_tx.clone(),
            outcome_tx.clone(),
        ));
        let writer = tokio::spawn(write(
            id,
            FramedWrite::new(write_half, codec),
            bytes_rx,
            event_tx,
            outcome_tx.clone(),
        ));

        debug!(transport_id = id, %protocol, "transport started");

        Ok(Self {
            id,
            protocol,
            transmitter,
            events: Some(event_rx),
            outcome,
            outcome_tx,
            reader,
            writer,
            ended: false,
        })
    }

    /// Returns the transport id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Returns the sub protocol in use.
    #[must_use]
    pub const fn protocol(&self) -> SubProtocol {
        self.protocol
    }

    /// Takes the event stream; only the first call returns it.
    pub fn subscribe(&mut self) -> Option<mpsc::Receiver<TransportEvent>> {
        self.events.take()
    }

    /// Returns the transmitter.
    #[must_use]
    pub const fn transmitter(&self) -> &MsgTransmitter {
        &self.transmitter
    }

    /// Returns the transmitter for sending.
    pub fn transmitter_mut(&mut self) -> &mut MsgTransmitter {
        &mut self.transmitter
    }

    /// Returns true once [`MsgTransport::end`] was called.
    #[must_use]
    pub const fn is_ended(&self) -> bool {
        self.ended
    }

    /// Waits for the transport to finish.
    ///
    /// # Returns
    /// The transport id when the peer closed cleanly or the transport was ended.
    ///
    /// # Errors
    /// Returns the first receiver or writer error.
    pub async fn wait(&self) -> Result<u32, TransportError> {
        let mut outcome = self.outcome.clone();
        let settled = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| TransportError::Closed)?;
        settled.clone().unwrap_or(Err(TransportError::Closed))
    }

    /// Closes the connection. Safe to call more than once.
    ///
    /// Queued outbound bytes are flushed before the writable half shuts down.
    pub fn end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.transmitter.disconnect();
        self.reader.abort();
        settle(&self.outcome_tx, Ok(self.id));
        debug!(transport_id = self.id, "transport ended");
    }

    /// Waits until the writer has flushed and shut down the connection.
    pub async fn closed(&mut self) {
        if !self.writer.is_finished() {
            let _ = (&mut self.writer).await;
        }
    }
}

impl Drop for MsgTransport {
    fn drop(&mut self) {
        self.end();
    }
}

async fn receive<R>(
    id: u32,
    mut framed: FramedRead<R, WireCodec>,
    events: mpsc::Sender<TransportEvent>,
    outcome: watch::Sender<Outcome>,
) where
    R: AsyncRead + Unpin,
{
    while let Some(next) = framed.next().await {
        match next {
            Ok(msg) => {
                let decoded = TransportEvent::Decoded {
                    msg_type: msg.msg_type().clone(),
                    text: msg.text().to_string(),
                    len: msg.wire_len(),
                };
                if events.send(decoded).await.is_err()
                    || events.send(TransportEvent::Msg(msg)).await.is_err()
                {
                    return;
                }
            }
            Err(e) => {
                warn!(transport_id = id, error = %e, "receiver error");
                settle(&outcome, Err(e.clone()));
                let _ = events.send(TransportEvent::RxError(e)).await;
                return;
            }
        }
    }
    debug!(transport_id = id, "receiver reached end of stream");
    settle(&outcome, Ok(id));
    let _ = events.send(TransportEvent::End).await;
}

async fn write<W>(
    id: u32,
    mut framed: FramedWrite<W, WireCodec>,
    mut bytes: mpsc::Receiver<Bytes>,
    events: mpsc::Sender<TransportEvent>,
    outcome: watch::Sender<Outcome>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(buf) = bytes.recv().await {
        if let Err(e) = framed.send(buf).await {
            warn!(transport_id = id, error = %e, "writer error");
            settle(&outcome, Err(e.clone()));
            let _ = events.send(TransportEvent::TxError(e)).await;
            return;
        }
    }
    if let Err(e) = framed.close().await {
        debug!(transport_id = id, error = %e, "shutdown after end failed");
    }
}
