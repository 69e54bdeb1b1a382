//! TCP listener and accept loop.

use crate::config::ServerConfig;
use crate::matchmaker::Lobby;
use derive_more::{Display, Error};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, instrument, warn};

/// Pause after a failed accept, so a persistent fault (e.g. out of file
/// descriptors) does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Server error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Server error: {} at {}:{}", message, file, line)]
pub struct ServerError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ServerError {
    /// Creates a new server error with caller location tracking.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<std::io::Error> for ServerError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        Self::new(format!("I/O error: {}", err))
    }
}

/// Accepts connections and pairs them into sessions.
#[derive(Debug)]
pub struct GameServer {
    listener: TcpListener,
}

impl GameServer {
    /// Binds the listening socket.
    #[instrument(skip(config), fields(addr = %config.addr()))]
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.addr()).await.map_err(|e| {
            ServerError::new(format!("Failed to bind {}: {}", config.addr(), e))
        })?;
        info!(addr = %listener.local_addr()?, "Listening");
        Ok(Self { listener })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs the accept loop forever.
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// Running sessions are not interrupted by shutdown; only accepting
    /// stops. A participant still waiting in the lobby is disconnected.
    #[instrument(skip_all)]
    pub async fn run_until(self, shutdown: impl std::future::Future<Output = ()>) {
        let mut lobby: Lobby<TcpStream> = Lobby::new();
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                () = &mut shutdown => {
                    info!(half_open = lobby.is_half_open(), "Shutting down accept loop");
                    return;
                }
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(%peer, error = %e, "Could not disable Nagle");
                    }
                    info!(%peer, "Accepted connection");
                    if let Some(pairing) = lobby.seat(stream, Some(peer)) {
                        pairing.start();
                    }
                }
                Err(e) => back_off(&e).await,
            }
        }
    }
}

/// Logs a failed accept and pauses before the next one.
async fn back_off(error: &std::io::Error) {
    warn!(error = %error, "Accept failed, backing off");
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    /// Records the level of every event it sees.
    #[derive(Clone, Default)]
    struct Levels(Arc<Mutex<Vec<Level>>>);

    impl<S: Subscriber> Layer<S> for Levels {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            self.0.lock().unwrap().push(*event.metadata().level());
        }
    }

    #[tokio::test]
    async fn test_accept_failure_logs_a_warning() {
        let levels = Levels::default();
        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(levels.clone()));

        back_off(&std::io::Error::other("too many open files")).await;

        assert_eq!(*levels.0.lock().unwrap(), vec![Level::WARN]);
    }
}
