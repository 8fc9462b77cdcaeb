//! Metrics and health endpoints

use http_body_util::Full;
use hyper::{
    body::{Bytes, Incoming},
    header::CONTENT_TYPE,
    server::conn::http1,
    service::service_fn,
    Method, Request, Response, StatusCode,
};
use hyper_util::rt::tokio::TokioIo;
use rtsync_core::{ControllerMetrics, ControllerState};
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

#[derive(Clone)]
pub struct StatusService {
    metrics: ControllerMetrics,
    state: watch::Receiver<ControllerState>,
}

impl StatusService {
    pub fn new(metrics: ControllerMetrics, state: watch::Receiver<ControllerState>) -> Self {
        Self { metrics, state }
    }

    /// Ready once the node cache synced and until the loop stops
    fn is_ready(&self) -> bool {
        !matches!(
            *self.state.borrow(),
            ControllerState::Syncing | ControllerState::Stopped
        )
    }

    pub fn respond(&self, method: &Method, path: &str) -> Response<Full<Bytes>> {
        if method != Method::GET {
            return text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
        }
        match path {
            "/metrics" => match self.metrics.gather() {
                Ok(body) => Response::builder()
                    .status(StatusCode::OK)
                    .header(CONTENT_TYPE, TEXT_FORMAT)
                    .body(Full::new(Bytes::from(body)))
                    .unwrap_or_else(|_| text(StatusCode::INTERNAL_SERVER_ERROR, "encoding failed")),
                Err(e) => {
                    warn!(error = %e, "Failed to encode metrics");
                    text(StatusCode::INTERNAL_SERVER_ERROR, "encoding failed")
                }
            },
            "/healthz" => text(StatusCode::OK, "ok"),
            "/readyz" => {
                if self.is_ready() {
                    text(StatusCode::OK, "ok")
                } else {
                    let state = *self.state.borrow();
                    text(StatusCode::SERVICE_UNAVAILABLE, &state.to_string())
                }
            }
            _ => text(StatusCode::NOT_FOUND, "not found"),
        }
    }

    async fn handle(self, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
        debug!("{} {}", req.method(), req.uri().path());
        Ok(self.respond(req.method(), req.uri().path()))
    }
}

fn text(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(body.to_string())));
    *resp.status_mut() = status;
    resp
}

/// Accept connections until shutdown
pub async fn serve(
    addr: SocketAddr,
    service: StatusService,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("Status server listening on {}", addr);

    loop {
        let (stream, peer_addr) = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Error accepting connection: {}", e);
                    continue;
                }
            },
        };
        let io = TokioIo::new(stream);
        let service = service.clone();

        tokio::task::spawn(async move {
            let svc = service_fn(move |req| service.clone().handle(req));
            if let Err(e) = http1::Builder::new().serve_connection(io, svc).await {
                debug!("Error serving connection from {}: {}", peer_addr, e);
            }
        });
    }

    info!("Status server stopped");
    Ok(())
}
