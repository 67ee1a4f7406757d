//! Long-lived event stream consumer with managed lifecycle.

use super::backoff::Backoff;
use super::decode::event_stream;
use super::error::{ListenerError, ListenerResult};
use super::sink::EventSink;
use super::state::ListenerState;
use crate::config::{unix_seconds, ListenerConfig};
use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt};
use reqwest::{
    header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE},
    Client, StatusCode, Url,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Consumes a server-sent-events endpoint and hands every event to a sink.
///
/// # Example
///
/// ```rust,ignore
/// use sse_sentinel::{EventListener, ListenerConfig, TracingSink};
///
/// let handle = EventListener::new(ListenerConfig::default(), TracingSink)?.spawn();
/// // ... later
/// handle.shutdown().await?;
/// ```
pub struct EventListener {
    config: ListenerConfig,
    url: Url,
    client: Client,
    sink: Arc<dyn EventSink>,
}

/// How one connection ended.
enum SessionEnd {
    Cancelled,
    Failed(ListenerError),
}

#[derive(Default)]
struct SessionStats {
    delivered: u64,
    retry_hint: Option<Duration>,
}

impl EventListener {
    /// Create a listener. Fails if the configured URL cannot be parsed.
    pub fn new(config: ListenerConfig, sink: impl EventSink + 'static) -> ListenerResult<Self> {
        let url = Url::parse(&config.url).map_err(|e| ListenerError::InvalidUrl {
            url: config.url.clone(),
            reason: e.to_string(),
        })?;
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(ListenerError::Connection)?;

        Ok(Self {
            config,
            url,
            client,
            sink: Arc::new(sink),
        })
    }

    /// Run the listener as a background task.
    ///
    /// The returned handle does not keep the runtime alive by itself; drop it
    /// to detach, or use it to cancel and join.
    pub fn spawn(self) -> ListenerHandle {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(ListenerState::Connecting { attempt: 1 });
        let task = tokio::spawn(self.run(cancel.clone(), state_tx));

        ListenerHandle {
            cancel,
            state: state_rx,
            task,
        }
    }

    /// Drive the connect / stream / retry loop until cancelled or failed.
    ///
    /// Returns `Ok(())` only when cancelled. Terminal failures are logged
    /// once and published as [`ListenerState::Failed`] before returning.
    pub async fn run(
        self,
        cancel: CancellationToken,
        state: watch::Sender<ListenerState>,
    ) -> ListenerResult<()> {
        let mut backoff = Backoff::new(
            self.config.backoff_initial,
            self.config.backoff_max,
            self.config.max_retries,
        );

        loop {
            let attempt = backoff.attempts() + 1;
            state.send_replace(ListenerState::Connecting { attempt });
            debug!(url = %self.url, attempt, "connecting to event stream");

            let mut stats = SessionStats::default();
            let end = self.session(&cancel, &state, &mut stats).await;

            let err = match end {
                SessionEnd::Cancelled => {
                    self.stop(&state);
                    return Ok(());
                }
                SessionEnd::Failed(err) => err,
            };

            if let Some(hint) = stats.retry_hint {
                backoff.set_initial(hint);
            }
            // Only delivered events restore the budget, and never on a frame error:
            // a remote that keeps sending the same oversized block must run out.
            if stats.delivered > 0 && !matches!(err, ListenerError::MalformedFrame(_)) {
                backoff.reset();
            }

            if !err.is_retryable() {
                return Err(self.fail(&state, err));
            }

            let Some(delay) = backoff.next_delay() else {
                let err = ListenerError::RetriesExhausted {
                    attempts: backoff.attempts() + 1,
                    last: Box::new(err),
                };
                return Err(self.fail(&state, err));
            };

            let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            warn!(
                url = %self.url,
                attempt = backoff.attempts(),
                delay_ms,
                delivered = stats.delivered,
                error = %err,
                "event stream lost, retrying"
            );
            state.send_replace(ListenerState::Retrying {
                attempt: backoff.attempts(),
                delay_ms,
            });

            tokio::select! {
                _ = cancel.cancelled() => {
                    self.stop(&state);
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One connection: request, validate, then pump the body through the decoder.
    async fn session(
        &self,
        cancel: &CancellationToken,
        state: &watch::Sender<ListenerState>,
        stats: &mut SessionStats,
    ) -> SessionEnd {
        let mut request = self
            .client
            .get(self.url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(token) = &self.config.token {
            request = request.header(AUTHORIZATION, token.header_value());
        }

        let response = tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Cancelled,
            sent = request.send() => match sent {
                Ok(response) => response,
                Err(e) => return SessionEnd::Failed(ListenerError::Connection(e)),
            },
        };

        if let Err(err) = self.check_response(&response) {
            return SessionEnd::Failed(err);
        }

        info!(url = %self.url, status = %response.status(), "event stream connected");
        state.send_replace(ListenerState::Streaming);

        let mut events = std::pin::pin!(event_stream(
            self.body(response),
            self.config.max_frame_bytes
        ));

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return SessionEnd::Cancelled,
                next = events.next() => next,
            };

            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(err)) => return SessionEnd::Failed(err),
                None => {
                    return SessionEnd::Failed(ListenerError::StreamInterrupted(
                        "remote closed the stream".to_string(),
                    ))
                }
            };

            if let Some(hint) = event.retry {
                stats.retry_hint = Some(hint);
            }
            // A block carrying only `retry:` or `id:` is not an event.
            if event.data.is_empty() {
                continue;
            }
            stats.delivered += 1;
            self.sink.deliver(event);
        }
    }

    /// Response body as a chunk stream, failing once it stays silent past the
    /// idle timeout.
    fn body(&self, response: reqwest::Response) -> BoxStream<'static, ListenerResult<Bytes>> {
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ListenerError::StreamInterrupted(e.to_string())));

        match self.config.idle_timeout {
            Some(limit) => tokio_stream::StreamExt::timeout(chunks, limit)
                .map(move |read| {
                    read.unwrap_or_else(|_| {
                        Err(ListenerError::StreamInterrupted(format!(
                            "no data for {limit:?}"
                        )))
                    })
                })
                .boxed(),
            None => chunks.boxed(),
        }
    }

    fn check_response(&self, response: &reqwest::Response) -> ListenerResult<()> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ListenerError::Authentication {
                status,
                expired_at: self.config.token.as_ref().and_then(|t| t.expires_at()),
            });
        }
        if !status.is_success() {
            return Err(ListenerError::RemoteRejected { status });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !content_type.starts_with("text/event-stream") {
            warn!(url = %self.url, content_type, "unexpected content type, reading as event stream");
        }
        Ok(())
    }

    fn stop(&self, state: &watch::Sender<ListenerState>) {
        info!(url = %self.url, "event listener stopped");
        state.send_replace(ListenerState::Stopped);
    }

    fn fail(&self, state: &watch::Sender<ListenerState>, err: ListenerError) -> ListenerError {
        match &err {
            ListenerError::Authentication { status, expired_at } => error!(
                url = %self.url,
                status = %status,
                token_expired_at = expired_at.map(unix_seconds),
                "stream credential rejected, listener stopped"
            ),
            _ => error!(url = %self.url, error = %err, "event listener failed"),
        }
        state.send_replace(ListenerState::Failed {
            reason: err.to_string(),
        });
        err
    }
}

/// Handle to a spawned [`EventListener`].
pub struct ListenerHandle {
    cancel: CancellationToken,
    state: watch::Receiver<ListenerState>,
    task: JoinHandle<ListenerResult<()>>,
}

impl ListenerHandle {
    /// Ask the listener to stop. Unblocks any pending read or backoff sleep.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Subscribe to state changes.
    pub fn state(&self) -> watch::Receiver<ListenerState> {
        self.state.clone()
    }

    /// Whether the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to exit and return its outcome.
    pub async fn join(self) -> ListenerResult<()> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(ListenerError::TaskAborted(e.to_string())),
        }
    }

    /// Cancel, then join.
    pub async fn shutdown(self) -> ListenerResult<()> {
        self.cancel();
        self.join().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BearerToken;
    use crate::listener::StreamEvent;
    use axum::{
        body::Body,
        extract::State,
        http::{header, HeaderMap},
        response::{
            sse::{Event, Sse},
            IntoResponse,
        },
        routing::get,
        Router,
    };
    use futures::{stream, Stream};
    use std::convert::Infallible;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;
    use tracing_subscriber::layer::{Context, SubscriberExt};

    #[derive(Default)]
    struct Upstream {
        hits: AtomicUsize,
        authorization: Mutex<Option<String>>,
    }

    impl Upstream {
        fn record(&self, headers: &HeaderMap) {
            self.hits.fetch_add(1, Ordering::SeqCst);
            *self.authorization.lock().unwrap() = headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
        }

        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    async fn spawn_upstream(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        addr
    }

    fn test_config(addr: SocketAddr) -> ListenerConfig {
        ListenerConfig {
            url: format!("http://{addr}/stream"),
            token: Some(BearerToken::new("secret123")),
            max_retries: 2,
            backoff_initial: Duration::from_millis(10),
            backoff_max: Duration::from_millis(50),
            connect_timeout: Duration::from_secs(1),
            idle_timeout: Some(Duration::from_secs(5)),
            ..ListenerConfig::default()
        }
    }

    fn channel_sink() -> (impl EventSink, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = move |event: StreamEvent| {
            let _ = tx.send(event);
        };
        (sink, rx)
    }

    async fn open_stream(
        State(upstream): State<Arc<Upstream>>,
        headers: HeaderMap,
    ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
        upstream.record(&headers);
        let events = vec![
            Ok(Event::default().data("hello")),
            Ok(Event::default().event("update").id("7").data("a\nb")),
        ];
        Sse::new(stream::iter(events).chain(stream::pending()))
    }

    async fn silent_stream(
        State(upstream): State<Arc<Upstream>>,
        headers: HeaderMap,
    ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
        upstream.record(&headers);
        Sse::new(stream::pending())
    }

    async fn empty_stream(
        State(upstream): State<Arc<Upstream>>,
        headers: HeaderMap,
    ) -> impl IntoResponse {
        upstream.record(&headers);
        ([(header::CONTENT_TYPE, "text/event-stream")], "")
    }

    async fn unauthorized(
        State(upstream): State<Arc<Upstream>>,
        headers: HeaderMap,
    ) -> impl IntoResponse {
        upstream.record(&headers);
        (StatusCode::UNAUTHORIZED, "token expired")
    }

    async fn zero_retry_hint(
        State(upstream): State<Arc<Upstream>>,
        headers: HeaderMap,
    ) -> impl IntoResponse {
        upstream.record(&headers);
        ([(header::CONTENT_TYPE, "text/event-stream")], "retry: 0\n\n")
    }

    async fn oversized_frame(
        State(upstream): State<Arc<Upstream>>,
        headers: HeaderMap,
    ) -> impl IntoResponse {
        upstream.record(&headers);
        let chunks = stream::iter(vec![
            Ok::<_, Infallible>("data: ok\n\n"),
            Ok("data: this block is far longer than eight bytes\n\n"),
        ]);
        (
            [(header::CONTENT_TYPE, "text/event-stream")],
            Body::from_stream(chunks),
        )
    }

    /// Counts `ERROR` records emitted by this crate.
    struct ErrorCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for ErrorCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let meta = event.metadata();
            if *meta.level() == tracing::Level::ERROR && meta.target().starts_with("sse_sentinel") {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn upstream_router<H, T>(handler: H) -> (Router, Arc<Upstream>)
    where
        H: axum::handler::Handler<T, Arc<Upstream>>,
        T: 'static,
    {
        let upstream = Arc::new(Upstream::default());
        let router = Router::new()
            .route("/stream", get(handler))
            .with_state(upstream.clone());
        (router, upstream)
    }

    async fn recv(rx: &mut mpsc::UnboundedReceiver<StreamEvent>) -> StreamEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("sink channel closed")
    }

    #[tokio::test]
    async fn test_delivers_events_with_bearer_token() {
        let (router, upstream) = upstream_router(open_stream);
        let addr = spawn_upstream(router).await;
        let (sink, mut rx) = channel_sink();

        let handle = EventListener::new(test_config(addr), sink).unwrap().spawn();

        assert_eq!(recv(&mut rx).await, StreamEvent::new("hello"));
        let second = recv(&mut rx).await;
        assert_eq!(second.data, "a\nb");
        assert_eq!(second.event.as_deref(), Some("update"));
        assert_eq!(second.id.as_deref(), Some("7"));

        assert_eq!(
            upstream.authorization.lock().unwrap().as_deref(),
            Some("Bearer secret123")
        );
        assert_eq!(*handle.state().borrow(), ListenerState::Streaming);

        let state = handle.state();
        handle.shutdown().await.unwrap();
        assert_eq!(*state.borrow(), ListenerState::Stopped);
    }

    #[tokio::test]
    async fn test_cancel_unblocks_pending_read() {
        let (router, _upstream) = upstream_router(silent_stream);
        let addr = spawn_upstream(router).await;
        let (sink, _rx) = channel_sink();

        let handle = EventListener::new(test_config(addr), sink).unwrap().spawn();
        let mut state = handle.state();
        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| *s == ListenerState::Streaming),
        )
        .await
        .unwrap()
        .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .expect("shutdown should not hang");
        assert!(result.is_ok());
        assert_eq!(*state.borrow(), ListenerState::Stopped);
    }

    #[tokio::test]
    async fn test_reconnects_after_drop_then_gives_up() {
        let (router, upstream) = upstream_router(empty_stream);
        let addr = spawn_upstream(router).await;
        let (sink, _rx) = channel_sink();

        let handle = EventListener::new(test_config(addr), sink).unwrap().spawn();
        let state = handle.state();
        let result = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .unwrap();

        match result {
            Err(ListenerError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, ListenerError::StreamInterrupted(_)));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(upstream.hits(), 3);
        assert!(matches!(*state.borrow(), ListenerState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_idle_timeout_counts_as_interruption() {
        let (router, upstream) = upstream_router(silent_stream);
        let addr = spawn_upstream(router).await;
        let (sink, _rx) = channel_sink();
        let config = ListenerConfig {
            max_retries: 1,
            idle_timeout: Some(Duration::from_millis(100)),
            ..test_config(addr)
        };

        let handle = EventListener::new(config, sink).unwrap().spawn();
        let result = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .unwrap();

        assert!(matches!(
            result,
            Err(ListenerError::RetriesExhausted { attempts: 2, .. })
        ));
        assert_eq!(upstream.hits(), 2);
    }

    #[tokio::test]
    async fn test_unauthorized_is_terminal() {
        let (router, upstream) = upstream_router(unauthorized);
        let addr = spawn_upstream(router).await;
        let (sink, _rx) = channel_sink();
        let config = ListenerConfig {
            max_retries: 5,
            ..test_config(addr)
        };

        let handle = EventListener::new(config, sink).unwrap().spawn();
        let state = handle.state();
        let result = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .unwrap();

        assert!(matches!(
            result,
            Err(ListenerError::Authentication {
                status: StatusCode::UNAUTHORIZED,
                ..
            })
        ));
        assert_eq!(upstream.hits(), 1);
        assert_eq!(
            *state.borrow(),
            ListenerState::Failed {
                reason: "credential rejected with HTTP 401 Unauthorized".to_string()
            }
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_unauthorized_is_reported_once() {
        let errors = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorCounter(errors.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        let (router, _upstream) = upstream_router(unauthorized);
        let addr = spawn_upstream(router).await;
        let (sink, _rx) = channel_sink();

        let handle = EventListener::new(test_config(addr), sink).unwrap().spawn();
        let result = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .unwrap();

        assert!(matches!(result, Err(ListenerError::Authentication { .. })));
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_retry_hint_does_not_loop_forever() {
        let (router, upstream) = upstream_router(zero_retry_hint);
        let addr = spawn_upstream(router).await;
        let (sink, mut rx) = channel_sink();
        let config = ListenerConfig {
            max_retries: 1,
            ..test_config(addr)
        };

        let handle = EventListener::new(config, sink).unwrap().spawn();
        let result = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .unwrap();

        assert!(matches!(
            result,
            Err(ListenerError::RetriesExhausted { attempts: 2, .. })
        ));
        assert_eq!(upstream.hits(), 2);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed_frame_spends_the_budget() {
        let (router, upstream) = upstream_router(oversized_frame);
        let addr = spawn_upstream(router).await;
        let (sink, _rx) = channel_sink();
        let config = ListenerConfig {
            max_retries: 1,
            max_frame_bytes: 8,
            ..test_config(addr)
        };

        let handle = EventListener::new(config, sink).unwrap().spawn();
        let result = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .unwrap();

        match result {
            Err(ListenerError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, ListenerError::MalformedFrame(_)));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(upstream.hits(), 2);
    }

    #[tokio::test]
    async fn test_connection_refused_is_retried() {
        // Bind then drop to find a port nobody listens on.
        let addr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let (sink, _rx) = channel_sink();

        let handle = EventListener::new(test_config(addr), sink).unwrap().spawn();
        let result = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .unwrap();

        match result {
            Err(ListenerError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, ListenerError::Connection(_)));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let config = ListenerConfig {
            url: "not a url".to_string(),
            ..ListenerConfig::default()
        };
        let result = EventListener::new(config, |_: StreamEvent| {});
        assert!(matches!(result, Err(ListenerError::InvalidUrl { .. })));
    }
}
