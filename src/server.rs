use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::server::conn::Http;
use hyper::service::service_fn;
use hyper::{Body, Method, Request, Response, StatusCode};
use log::{debug, info, warn};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};

use crate::tracker::PresenceState;

pub const MAX_CONNECTIONS: usize = 8;
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: &'static str,
}

/// `GET /stream` answers the committed presence as `"1"` or `"0"`.
pub fn route(method: &Method, path: &str, state: &PresenceState) -> Reply {
    let (status, body) = match (method, path) {
        (&Method::GET, "/stream") => (StatusCode::OK, if state.is_present() { "1" } else { "0" }),
        (_, "/stream") => (StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
        _ => (StatusCode::NOT_FOUND, "not found"),
    };
    Reply { status, body }
}

async fn answer(req: Request<Body>, state: Arc<PresenceState>) -> Result<Response<Body>, Infallible> {
    debug!("{} {}", req.method(), req.uri());
    let reply = route(req.method(), req.uri().path(), &state);
    let mut response = Response::new(Body::from(reply.body));
    *response.status_mut() = reply.status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    Ok(response)
}

pub async fn bind(addr: SocketAddr) -> io::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!("Status server listening on {}", listener.local_addr()?);
    Ok(listener)
}

pub async fn serve(listener: TcpListener, state: Arc<PresenceState>) {
    serve_with_limit(listener, state, MAX_CONNECTIONS).await
}

/// Accepts until the task is dropped. At most `limit` connections are open
/// at once; further clients wait in the listen backlog.
pub async fn serve_with_limit(listener: TcpListener, state: Arc<PresenceState>, limit: usize) {
    let slots = Arc::new(Semaphore::new(limit.max(1)));
    loop {
        let Ok(permit) = slots.clone().acquire_owned().await else {
            return;
        };
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!("Status server accept failed: {}", err);
                sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        let state = state.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req| answer(req, state.clone()));
            let conn = Http::new()
                .http1_only(true)
                .http1_keep_alive(false)
                .serve_connection(stream, service);
            match timeout(CONNECTION_TIMEOUT, conn).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => debug!("Status request from {} failed: {}", peer, err),
                Err(_) => debug!("Status request from {} timed out", peer),
            }
            drop(permit);
        });
    }
}
