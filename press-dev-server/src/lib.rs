use anyhow::{Context, Result};
use axum::{
    Router,
    extract::Request,
    handler::HandlerWithoutStateExt,
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
};
use std::{future::{Future, IntoFuture}, net::SocketAddr, path::PathBuf, time::Duration};
use tokio::{net::TcpListener, sync::oneshot};
use tower_http::services::ServeDir;

/// How long open connections may drain after shutdown is requested.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Configuration for the development server
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to serve on, 0 picks a free one
    pub port: u16,
    /// Directory to serve
    pub root: PathBuf,
    /// Auto-open browser
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            root: PathBuf::from("build"),
            open: false,
        }
    }
}

/// A static file server over the build output
pub struct DevServer {
    config: DevServerConfig,
    listener: TcpListener,
}

impl DevServer {
    pub async fn bind(config: DevServerConfig) -> Result<Self> {
        if !config.root.exists() {
            return Err(anyhow::anyhow!(
                "Root directory does not exist: {}",
                config.root.display()
            ));
        }

        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("could not bind {}", addr))?;

        Ok(Self { config, listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves until `shutdown` resolves, then gives open connections
    /// [`SHUTDOWN_GRACE`] to finish before returning.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        let url = format!("http://{}", addr);

        log::info!(target: "server", "Serving {} at {}", self.config.root.display(), url);

        if self.config.open {
            if let Err(e) = open::that(&url) {
                log::warn!(target: "server", "Failed to open browser: {}", e);
            }
        }

        let (draining_tx, draining_rx) = oneshot::channel::<()>();
        let signal = async move {
            shutdown.await;
            log::info!(target: "server", "Shutting down");
            let _ = draining_tx.send(());
        };

        let server = axum::serve(self.listener, router(self.config.root))
            .with_graceful_shutdown(signal)
            .into_future();
        tokio::pin!(server);

        let deadline = async {
            let _ = draining_rx.await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        };

        tokio::select! {
            res = &mut server => res?,
            _ = deadline => {
                log::warn!(
                    target: "server",
                    "Connections still open after {:?}, closing them",
                    SHUTDOWN_GRACE
                );
            }
        }

        Ok(())
    }
}

fn router(root: PathBuf) -> Router {
    async fn handle_404() -> (StatusCode, &'static str) {
        (StatusCode::NOT_FOUND, "Not found")
    }

    let serve_dir = ServeDir::new(root).not_found_service(handle_404.into_service());

    Router::new()
        .fallback_service(serve_dir)
        .layer(middleware::from_fn(log_request))
}

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let res = next.run(req).await;

    log::info!(target: "server", "{} {} {}", method, uri, res.status().as_u16());
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_serves_files_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hello from press").unwrap();

        let server = DevServer::bind(DevServerConfig {
            port: 0,
            root: dir.path().to_path_buf(),
            ..Default::default()
        })
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run(async move {
            let _ = stop_rx.await;
        }));

        let ok = get(addr, "/hello.txt").await;
        assert!(ok.starts_with("HTTP/1.1 200"), "{}", ok);
        assert!(ok.ends_with("hello from press"));

        let missing = get(addr, "/nope.html").await;
        assert!(missing.starts_with("HTTP/1.1 404"), "{}", missing);

        stop_tx.send(()).unwrap();
        let res = tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(res.is_ok());
    }

    #[tokio::test]
    async fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let res = DevServer::bind(DevServerConfig {
            port: 0,
            root: dir.path().join("nope"),
            ..Default::default()
        })
        .await;
        assert!(res.is_err());
    }
}
