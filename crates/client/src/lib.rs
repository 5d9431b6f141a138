//! The catalog client: secure connection, paced dispatch loop, and the
//! asynchronous request surface the UI drives.
//!
//! One connection carries many outstanding requests. Requests are packed by
//! the protocol crate, sealed and queued here; a background task drains the
//! queue at the configured refresh rate and feeds at most one inbound
//! message per iteration through the response router, which completes the
//! oneshot channel registered under the request's echo code.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use models::{Drawing, DrawingSummary, Registries};
use protocol::{
    ComponentInsert, ComponentInsertData, ComponentInsertResponse, DatabaseBackup, DrawingInsert,
    DrawingRequest, DrawingType, Envelope, InsertResponse, NextDrawing, RequestType, Response,
    SearchQuery,
};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub mod config;
pub use config::ClientMeta;

pub mod crypto;
pub mod frame;
pub mod logging;

mod handshake;
pub use handshake::{AuthMode, ConnectionResponse, Credentials};

mod pending;
use pending::{PendingTable, SingleSlot};

use crypto::{ClientKeys, SessionCrypto, REPEAT_TOKEN_LEN};
use frame::{Deframer, FrameKind};

/// Why a connection could not be established.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("no connection to the server")]
    NoConnection(#[source] std::io::Error),
    #[error("credential exchange with the server failed: {0}")]
    CredsExchangeFailed(String),
    #[error("the server rejected the supplied JWT")]
    InvalidJwt,
    #[error("the server rejected the stored repeat token")]
    InvalidRepeatToken,
    #[error("refresh rate must be positive, got {0}")]
    InvalidRefreshRate(f32),
    #[error("configuration error: {0}")]
    Config(String),
}

/// Why a request could not be submitted.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("drawing failed validation (build warnings {warnings:#06x})")]
    InvalidDrawing { warnings: u32 },
    #[error("a drawing component list exceeds 255 entries")]
    TooManyEntries,
}

struct Inner {
    crypto: SessionCrypto,
    registries: Arc<Registries>,
    send_queue: Mutex<VecDeque<Bytes>>,
    running: AtomicBool,
    disconnecting: AtomicBool,
    full_access: bool,
    refresh_interval: Duration,
    repeat_token_path: Option<PathBuf>,

    pending_drawings: PendingTable<DrawingRequest>,
    pending_inserts: PendingTable<InsertResponse>,
    search_slot: SingleSlot<Vec<DrawingSummary>>,
    component_insert_slot: SingleSlot<ComponentInsertResponse>,
    backup_slot: SingleSlot<protocol::BackupResponse>,
    next_drawing_slot: SingleSlot<Option<String>>,
    repeat_token_slot: SingleSlot<[u8; REPEAT_TOKEN_LEN]>,
    email_slot: SingleSlot<String>,
}

impl Inner {
    fn enqueue_envelope(&self, envelope: &impl Envelope) {
        self.enqueue_body(&envelope.to_bytes());
    }

    fn enqueue_tag(&self, tag: RequestType) {
        let mut body = BytesMut::with_capacity(RequestType::WIRE_SIZE);
        tag.write(&mut body);
        self.enqueue_body(&body);
    }

    fn enqueue_body(&self, body: &[u8]) {
        let framed = frame::encode(FrameKind::Aes, &self.crypto.seal_request(body));
        self.send_queue.lock().unwrap().push_back(framed);
    }

    /// Routes one decrypted inbound message. Undecodable messages are
    /// dropped with a log; responses nobody is waiting for likewise.
    fn route(&self, plaintext: Vec<u8>) {
        let response = match protocol::decode_response(&plaintext, &self.registries) {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(%err, "dropping undecodable message");
                return;
            }
        };

        match response {
            Response::SearchResults(results) => {
                tracing::debug!(results = results.len(), "search results received");
                if !self.search_slot.complete(results) {
                    tracing::debug!("dropping unsolicited search results");
                }
            }
            Response::Drawing(details) => {
                let echo_code = details.echo_code;
                if !self.pending_drawings.complete(echo_code, details) {
                    tracing::debug!(echo_code, "dropping drawing response with no waiter");
                }
            }
            Response::InsertResult {
                response,
                echo_code,
            } => {
                if !self.pending_inserts.complete(echo_code, response) {
                    tracing::debug!(echo_code, "dropping insert response with no waiter");
                }
            }
            Response::ComponentInsertResult {
                response,
                source_table,
            } => {
                // A successful insert invalidates the cached table, so pull
                // a fresh copy straight away.
                if response == ComponentInsertResponse::Success {
                    if let Some(table) = source_table {
                        self.enqueue_tag(table);
                    }
                }
                self.component_insert_slot.complete(response);
            }
            Response::BackupResult(response) => {
                self.backup_slot.complete(response);
            }
            Response::NextDrawingNumber {
                drawing_number, ..
            } => {
                self.next_drawing_slot.complete(drawing_number);
            }
            Response::RepeatToken(token) => {
                if let Some(path) = &self.repeat_token_path {
                    match crypto::write_repeat_token(path, &token) {
                        Ok(()) => tracing::info!(path = %path.display(), "stored repeat token"),
                        Err(err) => tracing::warn!(%err, "failed to store repeat token"),
                    }
                }
                self.repeat_token_slot.complete(token);
            }
            Response::UserEmail(address) => {
                self.email_slot.complete(address);
            }
            Response::TableSourced { .. } => {}
        }
    }
}

/// A connected catalog client. Dropping it abandons the connection; call
/// [`Client::disconnect`] for an orderly shutdown.
pub struct Client {
    inner: Arc<Inner>,
    loop_task: Option<JoinHandle<()>>,
    reader_task: Option<JoinHandle<()>>,
}

impl Client {
    /// Connects using the stored repeat token when one exists, falling back
    /// to the supplied JWT if the server rejects it.
    pub async fn connect(
        meta: &ClientMeta,
        registries: Arc<Registries>,
        jwt: impl Into<String>,
    ) -> Result<Self, ConnectError> {
        if let Some(path) = &meta.repeat_token_path {
            if let Some(token) = crypto::read_repeat_token(path) {
                match Self::connect_with(meta, registries.clone(), Credentials::RepeatToken(token))
                    .await
                {
                    Err(ConnectError::InvalidRepeatToken) => {
                        tracing::warn!("stored repeat token rejected; falling back to JWT login");
                    }
                    other => return other,
                }
            }
        }
        Self::connect_with(meta, registries, Credentials::Jwt(jwt.into())).await
    }

    /// Connects with explicit credentials, performs the handshake, and
    /// starts the dispatch loop.
    pub async fn connect_with(
        meta: &ClientMeta,
        registries: Arc<Registries>,
        credentials: Credentials,
    ) -> Result<Self, ConnectError> {
        let refresh_rate = meta.refresh_rate();
        if refresh_rate <= 0.0 {
            return Err(ConnectError::InvalidRefreshRate(refresh_rate));
        }

        let keys = ClientKeys::load(meta).map_err(|err| ConnectError::Config(format!("{err:#}")))?;

        let mut stream = TcpStream::connect((meta.server_address.as_str(), meta.server_port))
            .await
            .map_err(ConnectError::NoConnection)?;

        let session = handshake::establish(&mut stream, &keys, &credentials).await?;

        Ok(Self::start(
            stream,
            session.crypto,
            session.full_access,
            refresh_rate,
            registries,
            meta.repeat_token_path.clone(),
        ))
    }

    fn start(
        stream: TcpStream,
        crypto: SessionCrypto,
        full_access: bool,
        refresh_rate: f32,
        registries: Arc<Registries>,
        repeat_token_path: Option<PathBuf>,
    ) -> Self {
        let inner = Arc::new(Inner {
            crypto,
            registries,
            send_queue: Mutex::new(VecDeque::new()),
            running: AtomicBool::new(true),
            disconnecting: AtomicBool::new(false),
            full_access,
            refresh_interval: Duration::from_secs_f32(1.0 / refresh_rate),
            repeat_token_path,
            pending_drawings: PendingTable::default(),
            pending_inserts: PendingTable::default(),
            search_slot: SingleSlot::default(),
            component_insert_slot: SingleSlot::default(),
            backup_slot: SingleSlot::default(),
            next_drawing_slot: SingleSlot::default(),
            repeat_token_slot: SingleSlot::default(),
            email_slot: SingleSlot::default(),
        });

        let (read_half, write_half) = stream.into_split();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let reader_task = tokio::spawn(read_frames(read_half, inbound_tx));
        let loop_task = tokio::spawn(dispatch_loop(inner.clone(), write_half, inbound_rx));

        Self {
            inner,
            loop_task: Some(loop_task),
            reader_task: Some(reader_task),
        }
    }

    /// Whether the server granted administrative access at login.
    pub fn has_full_access(&self) -> bool {
        self.inner.full_access
    }

    pub fn registries(&self) -> &Arc<Registries> {
        &self.inner.registries
    }

    /// Submits a search; the receiver resolves with the summaries.
    pub fn search(&self, query: &SearchQuery) -> oneshot::Receiver<Vec<DrawingSummary>> {
        let rx = self.inner.search_slot.register();
        self.inner.enqueue_envelope(query);
        rx
    }

    /// Requests the full drawing for a search hit. The echo code is the
    /// caller's; it must be unique among its outstanding drawing requests.
    pub fn request_drawing(
        &self,
        mat_id: u32,
        echo_code: u32,
    ) -> oneshot::Receiver<DrawingRequest> {
        let rx = self.inner.pending_drawings.register(echo_code);
        self.inner
            .enqueue_envelope(&DrawingRequest::new(mat_id, echo_code));
        rx
    }

    /// Validates and submits a drawing insert. A `DrawingExists` response
    /// is advisory; resubmit with `force` after user confirmation.
    pub fn insert_drawing(
        &self,
        drawing: Drawing,
        echo_code: u32,
        force: bool,
    ) -> Result<oneshot::Receiver<InsertResponse>, RequestError> {
        let warnings = drawing.validate(&self.inner.registries);
        if warnings != 0 {
            return Err(RequestError::InvalidDrawing { warnings });
        }
        if !drawing.wire_counts_ok() {
            return Err(RequestError::TooManyEntries);
        }

        let rx = self.inner.pending_inserts.register(echo_code);
        self.inner
            .enqueue_envelope(&DrawingInsert::new(drawing, echo_code, force));
        Ok(rx)
    }

    pub fn insert_component(
        &self,
        data: ComponentInsertData,
    ) -> oneshot::Receiver<ComponentInsertResponse> {
        let rx = self.inner.component_insert_slot.register();
        self.inner.enqueue_envelope(&ComponentInsert::new(data));
        rx
    }

    pub fn backup_database(
        &self,
        name: impl Into<String>,
    ) -> oneshot::Receiver<protocol::BackupResponse> {
        let rx = self.inner.backup_slot.register();
        self.inner.enqueue_envelope(&DatabaseBackup::new(name));
        rx
    }

    pub fn next_drawing_number(
        &self,
        drawing_type: DrawingType,
    ) -> oneshot::Receiver<Option<String>> {
        let rx = self.inner.next_drawing_slot.register();
        self.inner.enqueue_envelope(&NextDrawing::new(drawing_type));
        rx
    }

    /// Asks the server for a repeat token. When a token path is configured
    /// the token is also persisted for the next run.
    pub fn request_repeat_token(&self) -> oneshot::Receiver<[u8; REPEAT_TOKEN_LEN]> {
        let rx = self.inner.repeat_token_slot.register();
        self.inner.enqueue_tag(RequestType::RepeatTokenRequest);
        rx
    }

    pub fn request_user_email(&self) -> oneshot::Receiver<String> {
        let rx = self.inner.email_slot.register();
        self.inner.enqueue_tag(RequestType::UserEmailRequest);
        rx
    }

    /// Queues a bare heartbeat frame so the server can see the client is
    /// alive across idle spells.
    pub fn heartbeat(&self) {
        let framed = frame::encode(FrameKind::Heartbeat, &[]);
        self.inner.send_queue.lock().unwrap().push_back(framed);
    }

    /// Requests a fresh copy of one component table.
    pub fn source_table(&self, table: RequestType) {
        debug_assert!(table.is_source_table());
        self.inner.enqueue_tag(table);
    }

    /// Requests every component table, as done once at startup.
    pub fn source_all_tables(&self) {
        for table in [
            RequestType::SourceProductTable,
            RequestType::SourceApertureTable,
            RequestType::SourceApertureShapeTable,
            RequestType::SourceMaterialTable,
            RequestType::SourceSideIronTable,
            RequestType::SourceMachineTable,
            RequestType::SourceMachineDeckTable,
            RequestType::SourceExtraPricesTable,
            RequestType::SourceSideIronPricesTable,
            RequestType::SourceBackingStripTable,
            RequestType::SourceStrapTable,
            RequestType::SourceLabourTimesTable,
            RequestType::SourcePowderCoatingPricesTable,
        ] {
            self.inner.enqueue_tag(table);
        }
    }

    /// Stops the dispatch loop without notifying the server.
    pub async fn stop(&mut self) {
        self.inner.running.store(false, Ordering::Release);
        self.join_tasks().await;
    }

    /// Sends one final disconnect frame, discarding anything still queued,
    /// then stops.
    pub async fn disconnect(&mut self) {
        self.inner.disconnecting.store(true, Ordering::Release);
        self.join_tasks().await;
    }

    async fn join_tasks(&mut self) {
        if let Some(task) = self.loop_task.take() {
            let _ = task.await;
        }
        if let Some(task) = self.reader_task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

/// Reads frames off the socket and forwards AES payloads to the dispatch
/// loop. Runs until the peer closes or the client is dropped.
async fn read_frames(mut read_half: OwnedReadHalf, inbound: mpsc::UnboundedSender<Bytes>) {
    use tokio::io::AsyncReadExt;

    let mut deframer = Deframer::new();
    let mut chunk = BytesMut::with_capacity(16 * 1024);

    loop {
        loop {
            match deframer.next_frame() {
                Ok(Some(frame)) => match frame.kind {
                    FrameKind::Aes => {
                        if inbound.send(frame.payload).is_err() {
                            return;
                        }
                    }
                    FrameKind::Disconnect => {
                        tracing::info!("server requested disconnect");
                        return;
                    }
                    FrameKind::Heartbeat => {}
                    other => {
                        tracing::warn!(kind = ?other, "dropping unexpected frame");
                    }
                },
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(%err, "closing reader on corrupt stream");
                    return;
                }
            }
        }

        chunk.clear();
        match read_half.read_buf(&mut chunk).await {
            Ok(0) => {
                tracing::info!("server closed the connection");
                return;
            }
            Ok(_) => deframer.extend(&chunk),
            Err(err) => {
                tracing::warn!(%err, "socket read failed");
                return;
            }
        }
    }
}

/// The paced dispatch loop: drain the send queue, process at most one
/// inbound message, sleep out the remainder of the frame.
async fn dispatch_loop(
    inner: Arc<Inner>,
    mut write_half: OwnedWriteHalf,
    mut inbound: mpsc::UnboundedReceiver<Bytes>,
) {
    use tokio::sync::mpsc::error::TryRecvError;

    while inner.running.load(Ordering::Acquire) {
        let started = tokio::time::Instant::now();

        if inner.disconnecting.load(Ordering::Acquire) {
            inner.send_queue.lock().unwrap().clear();
            let goodbye = frame::encode(FrameKind::Disconnect, &[]);
            if let Err(err) = write_half.write_all(&goodbye).await {
                tracing::warn!(%err, "disconnect frame was not delivered");
            }
            break;
        }

        // Send everything queued, in enqueue order. On failure the
        // remainder goes back to the front of the queue for next time.
        let outbound: Vec<Bytes> = {
            let mut queue = inner.send_queue.lock().unwrap();
            queue.drain(..).collect()
        };
        for (index, message) in outbound.iter().enumerate() {
            if let Err(err) = write_half.write_all(message).await {
                tracing::warn!(%err, "send failed; retrying next iteration");
                let mut queue = inner.send_queue.lock().unwrap();
                for unsent in outbound[index..].iter().rev() {
                    queue.push_front(unsent.clone());
                }
                break;
            }
        }

        match inbound.try_recv() {
            Ok(sealed) => match inner.crypto.open(&sealed) {
                Ok(plaintext) => inner.route(plaintext),
                Err(err) => tracing::warn!(%err, "dropping message that failed decryption"),
            },
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                // The reader is gone; keep pacing so stop() still works,
                // but there is nothing left to receive.
            }
        }

        let elapsed = started.elapsed();
        if elapsed < inner.refresh_interval {
            tokio::time::sleep(inner.refresh_interval - elapsed).await;
        }
    }
}
