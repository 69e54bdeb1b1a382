//! Arrival-order pairing of connections into sessions.

use crate::games::tictactoe::Mark;
use crate::handler::{ParticipantHandler, Seat};
use crate::session::{GameSession, SessionId};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, instrument};

/// Two handlers wired to one fresh session, ready to be started.
#[derive(Debug)]
pub struct Pairing<S> {
    /// The shared session.
    pub session: Arc<GameSession>,
    /// Handler for the participant playing X.
    pub x: ParticipantHandler<S>,
    /// Handler for the participant playing O.
    pub o: ParticipantHandler<S>,
}

/// Matchmaking state: at most one seated participant waiting for a partner.
///
/// A lobby with a waiting seat is a half-open session. The waiting seat has
/// already been welcomed and told to wait; nothing else is said to it until
/// its partner arrives.
#[derive(Debug)]
pub struct Lobby<S> {
    waiting: Option<Seat<S>>,
    next_session: u64,
}

impl<S> Lobby<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Creates an empty lobby.
    pub fn new() -> Self {
        Self {
            waiting: None,
            next_session: 1,
        }
    }

    /// True while a participant waits for a partner.
    pub fn is_half_open(&self) -> bool {
        self.waiting.is_some()
    }

    /// Seats an accepted connection.
    ///
    /// The first of each pair plays X and waits. The second plays O and
    /// completes the pair: a session is built with X to move and both
    /// handlers are returned, each with its pairing lines already queued.
    #[instrument(skip(self, stream))]
    pub fn seat(&mut self, stream: S, peer: Option<SocketAddr>) -> Option<Pairing<S>> {
        let Some(x_seat) = self.waiting.take() else {
            self.waiting = Some(Seat::new(stream, Mark::X, peer, false));
            return None;
        };

        let o_seat = Seat::new(stream, Mark::O, peer, true);
        let id = SessionId::from(self.next_session);
        self.next_session += 1;

        let session = Arc::new(GameSession::new(id, x_seat.outbox(), o_seat.outbox()));
        info!(session_id = %id, x = ?x_seat.peer(), o = ?o_seat.peer(), "Paired participants");

        Some(Pairing {
            x: x_seat.join(Arc::clone(&session)),
            o: o_seat.join(Arc::clone(&session)),
            session,
        })
    }
}

impl<S> Default for Lobby<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Pairing<S>
where
    S: AsyncRead + AsyncWrite + Send + Sync + 'static,
{
    /// Starts both handlers as independent tasks.
    pub fn start(self) {
        tokio::spawn(self.x.run());
        tokio::spawn(self.o.run());
    }
}
