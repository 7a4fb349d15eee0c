use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt as _;
use tokio::sync::{mpsc, watch};
use tracing::{Instrument as _, debug, error, info, info_span};

use crate::config::ClientConfig;
use crate::driver::state_updates;
use crate::errors::ClientError;
use crate::request::ResearchRequest;
use crate::state::{CANCELLED_MESSAGE, StreamState, TRANSPORT_FAILURE_MESSAGE};
use crate::transport::{HttpTransport, Transport};

/// Handle used to cancel a running request.
#[derive(Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// The response body is released and the run settles with
    /// `SettledError` carrying [`CANCELLED_MESSAGE`].
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

/// Client for the research workflow service. Runs one request at a time.
#[derive(Clone)]
pub struct ResearchClient {
    transport: Arc<dyn Transport>,
    stream_buffer_capacity: usize,
    in_flight: Arc<AtomicBool>,
}

impl ResearchClient {
    /// Creates a client over any transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            stream_buffer_capacity: ClientConfig::default().stream_buffer_capacity,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates a client that talks HTTP to the configured service.
    pub fn from_config(config: ClientConfig) -> Result<Self, ClientError> {
        let capacity = config.stream_buffer_capacity;
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(Arc::new(transport)).stream_buffer_capacity(capacity))
    }

    /// Sets how many snapshots may wait between the stream task and the
    /// consumer. Zero is treated as one.
    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.stream_buffer_capacity = capacity.max(1);
        self
    }

    /// Whether a request is currently in flight.
    pub fn is_active(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Validates and submits a request, returning a handle to its states.
    ///
    /// Fails with [`ClientError::Busy`] while a previous run has not
    /// finished.
    pub async fn submit(&self, request: ResearchRequest) -> Result<ResearchRun, ClientError> {
        let request = request.validate()?;
        let guard = InFlightGuard::acquire(&self.in_flight)?;

        let (tx, rx) = mpsc::channel(self.stream_buffer_capacity);
        let (abort_tx, abort_rx) = watch::channel(false);
        let request_id = uuid::Uuid::new_v4();
        let span = info_span!("research_request", %request_id, mode = request.mode());

        tokio::spawn(
            run_task(self.transport.clone(), request, tx, abort_rx, guard).instrument(span),
        );

        Ok(ResearchRun {
            request_id,
            rx,
            abort_handle: AbortHandle { tx: abort_tx },
            latest: None,
        })
    }
}

/// Handle to one submitted request.
///
/// `next_state()` yields a snapshot after every accepted event; the last
/// snapshot is settled. Dropping the handle cancels the request.
pub struct ResearchRun {
    request_id: uuid::Uuid,
    rx: mpsc::Receiver<StreamState>,
    abort_handle: AbortHandle,
    latest: Option<StreamState>,
}

impl ResearchRun {
    pub fn request_id(&self) -> uuid::Uuid {
        self.request_id
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Most recent snapshot received so far.
    pub fn latest(&self) -> Option<&StreamState> {
        self.latest.as_ref()
    }

    /// Waits for the next snapshot. Returns `None` once the run is over.
    pub async fn next_state(&mut self) -> Option<StreamState> {
        let state = self.rx.recv().await?;
        self.latest = Some(state.clone());
        Some(state)
    }

    /// Drains the remaining snapshots and returns the settled one.
    pub async fn finish(mut self) -> Result<StreamState, ClientError> {
        while self.next_state().await.is_some() {}
        match self.latest.take() {
            Some(state) if state.is_settled() => Ok(state),
            _ => Err(ClientError::protocol_msg(format!(
                "request {} ended without a settled state",
                self.request_id
            ))),
        }
    }
}

struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, ClientError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ClientError::Busy)?;
        Ok(Self(flag.clone()))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn run_task(
    transport: Arc<dyn Transport>,
    request: ResearchRequest,
    tx: mpsc::Sender<StreamState>,
    abort_rx: watch::Receiver<bool>,
    guard: InFlightGuard,
) {
    drive(transport, request, &tx, abort_rx).await;
    // The flag must clear before the channel closes: a consumer that saw
    // the end of the run may submit again right away.
    drop(guard);
    drop(tx);
}

async fn drive(
    transport: Arc<dyn Transport>,
    request: ResearchRequest,
    tx: &mpsc::Sender<StreamState>,
    mut abort_rx: watch::Receiver<bool>,
) {
    let mut latest = StreamState::active();
    let outcome = forward_states(transport, request, tx, &mut abort_rx, &mut latest).await;
    // The response body has been dropped by now.
    match outcome {
        Ok(()) => {}
        Err(Interrupt::Cancelled) => {
            info!("research request cancelled");
            latest.settle_error(CANCELLED_MESSAGE);
            let _ = tx.send(latest).await;
        }
        Err(Interrupt::Gone) => debug!("consumer dropped, releasing stream"),
    }
}

/// Why a run stopped before settling on its own.
#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    Cancelled,
    Gone,
}

/// Publishes the ACTIVE snapshot, opens the body and forwards every state it
/// produces until the run settles.
async fn forward_states(
    transport: Arc<dyn Transport>,
    request: ResearchRequest,
    tx: &mpsc::Sender<StreamState>,
    abort_rx: &mut watch::Receiver<bool>,
    latest: &mut StreamState,
) -> Result<(), Interrupt> {
    deliver(tx, abort_rx, latest.clone()).await?;
    info!("research request submitted");

    let opened = tokio::select! {
        interrupt = interrupted(tx, abort_rx) => return Err(interrupt),
        opened = transport.open(&request) => opened,
    };
    let bytes = match opened {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(error = %err, "failed to open workflow stream");
            latest.settle_error(TRANSPORT_FAILURE_MESSAGE);
            return deliver(tx, abort_rx, latest.clone()).await;
        }
    };

    let mut updates = std::pin::pin!(state_updates(bytes));
    loop {
        let next = tokio::select! {
            interrupt = interrupted(tx, abort_rx) => return Err(interrupt),
            next = updates.next() => next,
        };
        let Some(state) = next else {
            return Ok(());
        };
        *latest = state.clone();
        deliver(tx, abort_rx, state).await?;
        if latest.is_settled() {
            info!(
                phase = ?latest.phase,
                progress = latest.progress_log.len(),
                has_final = latest.final_result.is_some(),
                "research request settled"
            );
            return Ok(());
        }
    }
}

/// Waits for channel capacity and sends `state`, unless the run is
/// interrupted first.
async fn deliver(
    tx: &mpsc::Sender<StreamState>,
    abort_rx: &mut watch::Receiver<bool>,
    state: StreamState,
) -> Result<(), Interrupt> {
    tokio::select! {
        permit = tx.reserve() => {
            permit.map_err(|_| Interrupt::Gone)?.send(state);
            Ok(())
        }
        interrupt = interrupted(tx, abort_rx) => Err(interrupt),
    }
}

/// Resolves on an abort request, or once the consumer has dropped its
/// receiver.
async fn interrupted(
    tx: &mpsc::Sender<StreamState>,
    abort_rx: &mut watch::Receiver<bool>,
) -> Interrupt {
    tokio::select! {
        () = tx.closed() => Interrupt::Gone,
        cancelled = wait_for_abort(abort_rx) => {
            if cancelled {
                Interrupt::Cancelled
            } else {
                Interrupt::Gone
            }
        }
    }
}

/// Resolves `true` on an abort request and `false` once every handle is
/// gone.
async fn wait_for_abort(abort_rx: &mut watch::Receiver<bool>) -> bool {
    loop {
        if *abort_rx.borrow_and_update() {
            return true;
        }
        if abort_rx.changed().await.is_err() {
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransportError;
    use crate::state::Phase;
    use crate::transport::ByteStream;
    use futures::stream;
    use std::sync::atomic::AtomicUsize;

    enum FakeBehavior {
        OpenError(TransportError),
        Chunks(Vec<Result<&'static str, TransportError>>),
        Pending,
    }

    struct FakeTransport {
        opens: Arc<AtomicUsize>,
        behavior: FakeBehavior,
    }

    #[async_trait::async_trait]
    impl Transport for FakeTransport {
        async fn open(&self, _request: &ResearchRequest) -> Result<ByteStream, TransportError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                FakeBehavior::OpenError(err) => Err(err.clone()),
                FakeBehavior::Chunks(chunks) => Ok(Box::pin(stream::iter(
                    chunks
                        .iter()
                        .map(|chunk| {
                            chunk
                                .clone()
                                .map(|text| bytes::Bytes::from_static(text.as_bytes()))
                        })
                        .collect::<Vec<_>>(),
                ))),
                FakeBehavior::Pending => Ok(Box::pin(stream::pending())),
            }
        }
    }

    fn client(behavior: FakeBehavior) -> (ResearchClient, Arc<AtomicUsize>) {
        let opens = Arc::new(AtomicUsize::new(0));
        let transport = FakeTransport {
            opens: opens.clone(),
            behavior,
        };
        (ResearchClient::new(Arc::new(transport)), opens)
    }

    fn request() -> ResearchRequest {
        ResearchRequest::manual("monday.com", vec!["Maya Asher".into()])
    }

    #[tokio::test]
    async fn publishes_active_then_each_event_then_settled() {
        let (client, _) = client(FakeBehavior::Chunks(vec![
            Ok("{\"type\":\"progress\",\"data\":{\"type\":\"search\",\"message\":\"Searching calendar\"}}\n{\"type\":\"fi"),
            Ok("nal\",\"data\":{\"message\":\"Done\"}}\n"),
        ]));
        let mut run = client.submit(request()).await.expect("submit");

        let mut phases = Vec::new();
        while let Some(state) = run.next_state().await {
            phases.push(state.phase);
        }
        assert_eq!(
            phases,
            vec![Phase::Active, Phase::Active, Phase::Active, Phase::SettledOk]
        );
        let last = run.latest().expect("latest");
        assert_eq!(last.progress_log, vec!["Searching calendar"]);
        assert_eq!(last.final_result.as_deref(), Some("Done"));
    }

    #[tokio::test]
    async fn open_failure_settles_with_error() {
        let (client, opens) = client(FakeBehavior::OpenError(TransportError::request(
            "connection refused",
        )));
        let state = client
            .submit(request())
            .await
            .expect("submit")
            .finish()
            .await
            .expect("settled");
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(state.phase, Phase::SettledError);
        assert_eq!(state.error_message.as_deref(), Some(TRANSPORT_FAILURE_MESSAGE));
        assert!(state.progress_log.is_empty());
    }

    #[tokio::test]
    async fn mid_stream_failure_keeps_progress() {
        let (client, _) = client(FakeBehavior::Chunks(vec![
            Ok("{\"type\":\"progress\",\"data\":{\"type\":\"init\",\"message\":\"started\"}}\n"),
            Err(TransportError::read("reset")),
        ]));
        let state = client
            .submit(request())
            .await
            .expect("submit")
            .finish()
            .await
            .expect("settled");
        assert_eq!(state.phase, Phase::SettledError);
        assert_eq!(state.progress_log, vec!["started"]);
        assert!(state.error_message.is_some());
    }

    #[tokio::test]
    async fn second_submit_while_active_is_rejected() {
        let (client, _) = client(FakeBehavior::Pending);
        let run = client.submit(request()).await.expect("first");
        assert!(client.is_active());
        assert!(matches!(
            client.submit(request()).await,
            Err(ClientError::Busy)
        ));
        run.abort_handle().abort();
        let state = run.finish().await.expect("settled");
        assert_eq!(state.error_message.as_deref(), Some(CANCELLED_MESSAGE));
        assert!(!client.is_active());
        let again = client.submit(request()).await.expect("free again");
        again.abort_handle().abort();
        let _ = again.finish().await;
    }

    #[tokio::test]
    async fn abort_releases_pending_stream() {
        let (client, _) = client(FakeBehavior::Pending);
        let mut run = client.submit(request()).await.expect("submit");
        let first = run.next_state().await.expect("active");
        assert_eq!(first.phase, Phase::Active);

        run.abort_handle().abort();
        let state = run.finish().await.expect("settled");
        assert_eq!(state.phase, Phase::SettledError);
        assert_eq!(state.error_message.as_deref(), Some(CANCELLED_MESSAGE));
    }

    #[tokio::test]
    async fn dropping_run_frees_the_client() {
        let (client, _) = client(FakeBehavior::Pending);
        let run = client.submit(request()).await.expect("submit");
        drop(run);
        for _ in 0..100 {
            if !client.is_active() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!client.is_active());
    }

    #[tokio::test]
    async fn dropping_run_frees_the_client_while_an_abort_handle_is_kept() {
        let (client, _) = client(FakeBehavior::Pending);
        let mut run = client.submit(request()).await.expect("submit");
        let _kept = run.abort_handle();
        let first = run.next_state().await.expect("active");
        assert_eq!(first.phase, Phase::Active);

        drop(run);
        for _ in 0..100 {
            if !client.is_active() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!client.is_active());
        let again = client.submit(request()).await.expect("free again");
        again.abort_handle().abort();
        let _ = again.finish().await;
    }

    #[tokio::test]
    async fn abort_is_seen_while_the_consumer_lags() {
        let (client, _) = client(FakeBehavior::Chunks(vec![
            Ok("{\"type\":\"progress\",\"data\":{\"type\":\"init\",\"message\":\"one\"}}\n"),
            Ok("{\"type\":\"progress\",\"data\":{\"type\":\"init\",\"message\":\"two\"}}\n"),
            Ok("{\"type\":\"progress\",\"data\":{\"type\":\"init\",\"message\":\"three\"}}\n"),
            Ok("{\"type\":\"final\",\"data\":{\"message\":\"Done\"}}\n"),
        ]));
        let client = client.stream_buffer_capacity(1);
        let run = client.submit(request()).await.expect("submit");
        run.abort_handle().abort();

        let state = run.finish().await.expect("settled");
        assert_eq!(state.phase, Phase::SettledError);
        assert_eq!(state.error_message.as_deref(), Some(CANCELLED_MESSAGE));
        assert!(state.final_result.is_none());
        assert!(!client.is_active());
    }

    #[tokio::test]
    async fn validation_failure_does_not_open_transport() {
        let (client, opens) = client(FakeBehavior::Pending);
        let err = client
            .submit(ResearchRequest::manual("  ", vec![]))
            .await;
        assert!(matches!(err, Err(ClientError::Validation(_))));
        assert_eq!(opens.load(Ordering::SeqCst), 0);
        assert!(!client.is_active());
    }
}
