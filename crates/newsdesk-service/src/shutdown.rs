use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};

use http::{Request, Response, StatusCode};
use http_body::Body;
use pin_project::pin_project;
use tokio::sync::Notify;
use tower::{Layer, Service};

/// Shared handle for coordinating shutdown with in-flight requests.
#[derive(Clone)]
pub struct ShutdownState {
    inner: Arc<StateInner>,
}

struct StateInner {
    shutting_down: AtomicBool,
    in_flight: AtomicUsize,
    idle: Notify,
}

impl ShutdownState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StateInner {
                shutting_down: AtomicBool::new(false),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    /// Flips the service into draining mode; new requests get 503.
    pub fn start_shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Resolves once no requests remain in flight. Pair with a
    /// timeout; a stuck handler would otherwise hold this forever.
    pub async fn drained(&self) {
        loop {
            if self.in_flight_count() == 0 {
                return;
            }
            let notified = self.inner.idle.notified();
            // Re-check: the last request may have finished between the
            // count read and registering for the notification.
            if self.in_flight_count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Counts one in-flight request for as long as it exists. Dropping the
/// guard, including when the request future is cancelled mid-poll,
/// releases the slot and wakes any drain waiters.
struct RequestGuard {
    state: ShutdownState,
}

impl RequestGuard {
    fn register(state: &ShutdownState) -> Self {
        state.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        Self {
            state: state.clone(),
        }
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.state.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.state.inner.idle.notify_waiters();
    }
}

/// Tower layer that rejects new requests during shutdown and tracks
/// the ones already running.
#[derive(Clone)]
pub struct GracefulShutdownLayer {
    state: ShutdownState,
}

impl GracefulShutdownLayer {
    pub fn new(state: ShutdownState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for GracefulShutdownLayer {
    type Service = GracefulShutdownService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GracefulShutdownService {
            inner,
            state: self.state.clone(),
        }
    }
}

#[derive(Clone)]
pub struct GracefulShutdownService<S> {
    inner: S,
    state: ShutdownState,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for GracefulShutdownService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    ResBody: Body + Default,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = GracefulShutdownFuture<S::Future, ResBody, S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        if self.state.is_shutting_down() {
            let response = Response::builder()
                .status(StatusCode::SERVICE_UNAVAILABLE)
                .body(ResBody::default())
                .expect("building empty response should not fail");

            return GracefulShutdownFuture {
                kind: FutureKind::Immediate(Some(Ok(response))),
            };
        }

        let guard = RequestGuard::register(&self.state);
        GracefulShutdownFuture {
            kind: FutureKind::Inner {
                future: self.inner.call(req),
                _guard: guard,
            },
        }
    }
}

#[pin_project]
pub struct GracefulShutdownFuture<F, B, E> {
    #[pin]
    kind: FutureKind<F, B, E>,
}

#[pin_project(project = FutureKindProj)]
enum FutureKind<F, B, E> {
    Inner {
        #[pin]
        future: F,
        _guard: RequestGuard,
    },
    Immediate(Option<Result<Response<B>, E>>),
}

impl<F, B, E> Future for GracefulShutdownFuture<F, B, E>
where
    F: Future<Output = Result<Response<B>, E>>,
    B: Body,
{
    type Output = Result<Response<B>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        match this.kind.project() {
            FutureKindProj::Inner { future, _guard } => future.poll(cx),
            FutureKindProj::Immediate(response) => {
                // Only polled once; the slot is always Some here
                Poll::Ready(response.take().unwrap())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Empty;
    use std::time::Duration;
    use tower::{ServiceBuilder, ServiceExt};

    #[derive(Clone)]
    struct QuickService;

    impl Service<Request<Empty<Bytes>>> for QuickService {
        type Response = Response<Empty<Bytes>>;
        type Error = std::convert::Infallible;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: Request<Empty<Bytes>>) -> Self::Future {
            Box::pin(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Response::new(Empty::new()))
            })
        }
    }

    /// Never completes; used to park a request in flight.
    #[derive(Clone)]
    struct StalledService;

    impl Service<Request<Empty<Bytes>>> for StalledService {
        type Response = Response<Empty<Bytes>>;
        type Error = std::convert::Infallible;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: Request<Empty<Bytes>>) -> Self::Future {
            Box::pin(std::future::pending())
        }
    }

    #[tokio::test]
    async fn normal_requests_pass_through() {
        let state = ShutdownState::new();
        let service = ServiceBuilder::new()
            .layer(GracefulShutdownLayer::new(state.clone()))
            .service(QuickService);

        let req = Request::builder().body(Empty::new()).unwrap();
        let response = service.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(state.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn rejects_requests_once_draining() {
        let state = ShutdownState::new();
        let service = ServiceBuilder::new()
            .layer(GracefulShutdownLayer::new(state.clone()))
            .service(QuickService);

        state.start_shutdown();

        let req = Request::builder().body(Empty::new()).unwrap();
        let response = service.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        assert_eq!(state.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn tracks_in_flight_requests() {
        let state = ShutdownState::new();
        let service = ServiceBuilder::new()
            .layer(GracefulShutdownLayer::new(state.clone()))
            .service(QuickService);

        let mut handles = vec![];
        for _ in 0..3 {
            let req = Request::builder().body(Empty::new()).unwrap();
            let svc = service.clone();
            handles.push(tokio::spawn(async move { svc.oneshot(req).await }));
        }

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(state.in_flight_count(), 3);

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(state.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn in_flight_requests_finish_during_shutdown() {
        let state = ShutdownState::new();
        let service = ServiceBuilder::new()
            .layer(GracefulShutdownLayer::new(state.clone()))
            .service(QuickService);

        let req1 = Request::builder().body(Empty::new()).unwrap();
        let handle1 = tokio::spawn({
            let svc = service.clone();
            async move { svc.oneshot(req1).await }
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(state.in_flight_count(), 1);

        state.start_shutdown();

        // New work is turned away while the old request finishes
        let req2 = Request::builder().body(Empty::new()).unwrap();
        let response = service.clone().oneshot(req2).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response1 = handle1.await.unwrap().unwrap();
        assert_eq!(response1.status(), StatusCode::OK);

        assert_eq!(state.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_request_releases_its_slot() {
        let state = ShutdownState::new();
        let service = ServiceBuilder::new()
            .layer(GracefulShutdownLayer::new(state.clone()))
            .service(StalledService);

        let req = Request::builder().body(Empty::new()).unwrap();
        let handle = tokio::spawn({
            let svc = service.clone();
            async move { svc.oneshot(req).await }
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(state.in_flight_count(), 1);

        // Cancelling the task drops the request future mid-flight
        handle.abort();
        let _ = handle.await;

        assert_eq!(state.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn drained_waits_for_last_request() {
        let state = ShutdownState::new();
        let service = ServiceBuilder::new()
            .layer(GracefulShutdownLayer::new(state.clone()))
            .service(QuickService);

        let req = Request::builder().body(Empty::new()).unwrap();
        let handle = tokio::spawn({
            let svc = service.clone();
            async move { svc.oneshot(req).await }
        });

        tokio::time::sleep(Duration::from_millis(2)).await;
        state.start_shutdown();

        tokio::time::timeout(Duration::from_secs(1), state.drained())
            .await
            .expect("drain should finish once the request completes");

        handle.await.unwrap().unwrap();
        assert_eq!(state.in_flight_count(), 0);
    }
}
