//! Loopback HTTP server replaying a recorded session

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::LimitsConfig;
use crate::replay::{Cursor, Replayer};
use crate::{ReplayError, Result};

use super::{HttpHandler, SHUTDOWN_TIMEOUT_MS};

/// Shared between the accept loop and every connection
struct ServerState {
    replayer: Mutex<Replayer>,
    failure: Mutex<Option<ReplayError>>,
    prefix: String,
    limits: LimitsConfig,
}

impl ServerState {
    async fn handle<B>(&self, request: hyper::Request<B>) -> hyper::Response<Full<Bytes>>
    where
        B: hyper::body::Body,
        B::Error: std::fmt::Display,
    {
        let outcome = match HttpHandler::into_request(request, &self.prefix, &self.limits).await {
            Ok(request) => self.replayer.lock().await.replay(&request),
            Err(e) => Err(e),
        };

        match outcome.and_then(|response| HttpHandler::into_hyper_response(&response)) {
            Ok(response) => response,
            Err(e) => {
                error!("Mock request failed: {}", e);
                let response = HttpHandler::error_response(&e);
                let mut failure = self.failure.lock().await;
                if failure.is_none() {
                    *failure = Some(e);
                }
                response
            }
        }
    }
}

/// Mock HTTP endpoint bound for the duration of one test case
///
/// The first failure is answered with an error status and retained until
/// [`MockHttpServer::shutdown`], which reports it to the owning test.
/// Dropping the server without calling `shutdown` still releases the listener.
pub struct MockHttpServer {
    local_addr: SocketAddr,
    prefix: String,
    state: Arc<ServerState>,
    shutdown_tx: broadcast::Sender<()>,
    accept_task: Option<JoinHandle<()>>,
}

impl MockHttpServer {
    /// Bind `bind` and start serving `replayer` under `prefix`
    ///
    /// # Errors
    ///
    /// Returns error if the address cannot be bound
    pub async fn start(
        bind: SocketAddr,
        prefix: &str,
        replayer: Replayer,
        limits: LimitsConfig,
    ) -> Result<Self> {
        let listener = TcpListener::bind(bind).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        info!(
            "Mock server listening on {}{} (session: {}, {} messages)",
            local_addr,
            prefix,
            replayer.session().name(),
            replayer.session().len()
        );

        let state = Arc::new(ServerState {
            replayer: Mutex::new(replayer),
            failure: Mutex::new(None),
            prefix: prefix.to_string(),
            limits,
        });

        let accept_task = tokio::spawn(accept_loop(listener, Arc::clone(&state), shutdown_rx));

        Ok(Self {
            local_addr,
            prefix: prefix.to_string(),
            state,
            shutdown_tx,
            accept_task: Some(accept_task),
        })
    }

    /// Bound address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// URI the code under test should use instead of the real service
    pub fn base_uri(&self) -> String {
        format!("http://{}{}", self.local_addr, self.prefix)
    }

    /// Current position in the session
    pub async fn cursor(&self) -> Cursor {
        self.state.replayer.lock().await.cursor()
    }

    /// Stop serving and report the outcome
    ///
    /// # Errors
    ///
    /// Returns the first failure observed while serving
    pub async fn shutdown(mut self) -> Result<Cursor> {
        self.stop().await;

        if let Some(failure) = self.state.failure.lock().await.take() {
            return Err(failure);
        }

        Ok(self.state.replayer.lock().await.cursor())
    }

    async fn stop(&mut self) {
        self.shutdown_tx.send(()).ok();

        if let Some(mut task) = self.accept_task.take() {
            let timeout = Duration::from_millis(SHUTDOWN_TIMEOUT_MS);
            if tokio::time::timeout(timeout, &mut task).await.is_err() {
                warn!("Mock server did not stop in time, aborting");
                task.abort();
            }
        }

        info!("Mock server on {} stopped", self.local_addr);
    }
}

impl Drop for MockHttpServer {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.take() {
            self.shutdown_tx.send(()).ok();
            task.abort();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    state: Arc<ServerState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer_addr)) => {
                        debug!("Accepted connection from {}", peer_addr);
                        connections.spawn(serve_connection(stream, Arc::clone(&state)));
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            _ = shutdown_rx.recv() => {
                break;
            }
        }
    }

    connections.shutdown().await;
}

async fn serve_connection(stream: TcpStream, state: Arc<ServerState>) {
    let service = service_fn(move |request: hyper::Request<Incoming>| {
        let state = Arc::clone(&state);
        async move { Ok::<_, Infallible>(state.handle(request).await) }
    });

    if let Err(e) = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        debug!("Connection closed with error: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Request, Response};
    use crate::recording::HttpSession;

    fn empty_replayer() -> Replayer {
        Replayer::new(Arc::new(HttpSession::new("empty").unwrap()))
    }

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let server = MockHttpServer::start(loopback(), "/", empty_replayer(), LimitsConfig::default())
            .await
            .unwrap();

        assert_ne!(server.local_addr().port(), 0);
        assert!(server.base_uri().starts_with("http://127.0.0.1:"));

        let cursor = server.shutdown().await.unwrap();
        assert!(cursor.is_exhausted());
    }

    #[tokio::test]
    async fn test_drop_releases_listener() {
        let server = MockHttpServer::start(loopback(), "/", empty_replayer(), LimitsConfig::default())
            .await
            .unwrap();
        let addr = server.local_addr();
        drop(server);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let rebound = TcpListener::bind(addr).await;
        assert!(rebound.is_ok());
    }

    #[tokio::test]
    async fn test_failure_reported_on_shutdown() {
        let mut session = HttpSession::new("one").unwrap();
        session.record(Request::new("GET", "/"), Response::new(200));
        let server = MockHttpServer::start(
            loopback(),
            "/",
            Replayer::new(Arc::new(session)),
            LimitsConfig::default(),
        )
        .await
        .unwrap();

        let request = hyper::Request::builder()
            .method("DELETE")
            .uri("/")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = server.state.handle(request).await;
        assert_eq!(response.status(), hyper::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(server.cursor().await.position(), 0);

        let result = server.shutdown().await;
        assert!(matches!(result, Err(ReplayError::RequestMismatch { .. })));
    }
}
