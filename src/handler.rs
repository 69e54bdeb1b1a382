//! Per-connection protocol loop.
//!
//! Each accepted connection becomes a [`Seat`] right away: its write half is
//! handed to a writer task that drains the participant's [`Outbox`], so
//! lines can be sent before the opponent arrives. Once paired, the seat is
//! promoted to a [`ParticipantHandler`] that reads commands and drives the
//! shared [`GameSession`].
//!
//! Outboxes are bounded. A participant that stops reading first fills its
//! socket, then its outbox, and then its own handler stops reading commands
//! until the writer catches up.

use crate::games::tictactoe::Mark;
use crate::protocol::{ALL_CONNECTED, ClientCommand, ServerMessage, WAITING_FOR_OPPONENT, YOUR_TURN};
use crate::session::{GameSession, OUTBOX_CAPACITY, Outbox};
use derive_getters::Getters;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf,
    WriteHalf,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Longest command line accepted, newline included.
pub const MAX_LINE_BYTES: u64 = 256;

/// Lifecycle of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum HandlerPhase {
    /// Seated, no opponent yet.
    WaitingForOpponent,
    /// Paired and reading commands.
    AwaitingCommand,
    /// Loop exited, connection closing.
    Terminated,
}

/// Why the command loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Participant sent `QUIT`.
    Quit,
    /// Peer closed the connection.
    Disconnected,
    /// Peer sent a line longer than [`MAX_LINE_BYTES`].
    LineTooLong,
}

/// Queues a line without waiting. Only used where the outbox cannot be full.
fn queue(outbox: &Outbox, mark: Mark, msg: ServerMessage) {
    if let Err(e) = outbox.try_send(msg) {
        debug!(%mark, error = %e, "Dropping line");
    }
}

/// An accepted connection with its mark, not yet part of a session.
#[derive(Debug, Getters)]
pub struct Seat<S> {
    /// Mark assigned at accept time.
    mark: Mark,
    /// Remote address, when the transport has one.
    peer: Option<SocketAddr>,
    #[getter(skip)]
    reader: BufReader<ReadHalf<S>>,
    #[getter(skip)]
    outbox: Outbox,
    #[getter(skip)]
    writer: JoinHandle<()>,
}

impl<S> Seat<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Seats a connection: starts its writer and sends `WELCOME`.
    ///
    /// When `opponent_present` is false the participant is also told to wait.
    /// Must be called inside a tokio runtime.
    #[instrument(skip(stream))]
    pub fn new(stream: S, mark: Mark, peer: Option<SocketAddr>, opponent_present: bool) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        let (outbox, rx) = mpsc::channel(OUTBOX_CAPACITY);
        let writer = tokio::spawn(write_lines(write_half, rx, mark));

        queue(&outbox, mark, ServerMessage::Welcome(mark));
        if !opponent_present {
            queue(&outbox, mark, ServerMessage::message(WAITING_FOR_OPPONENT));
        }
        info!(%mark, ?peer, "Participant seated");

        Self {
            mark,
            peer,
            reader: BufReader::new(read_half),
            outbox,
            writer,
        }
    }

    /// A second handle on this seat's outbox, for wiring into a session.
    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    /// Phase of a seat is always [`HandlerPhase::WaitingForOpponent`].
    pub fn phase(&self) -> HandlerPhase {
        HandlerPhase::WaitingForOpponent
    }

    /// Promotes the seat into a handler bound to `session`.
    ///
    /// Queues the pairing announcement, plus the first turn prompt for X,
    /// before any handler of the session can run, so these lines always
    /// precede the opponent's first move.
    pub fn join(self, session: Arc<GameSession>) -> ParticipantHandler<S> {
        queue(&self.outbox, self.mark, ServerMessage::message(ALL_CONNECTED));
        if self.mark == Mark::FIRST {
            queue(&self.outbox, self.mark, ServerMessage::message(YOUR_TURN));
        }
        ParticipantHandler {
            mark: self.mark,
            peer: self.peer,
            session,
            reader: self.reader,
            outbox: self.outbox,
            writer: self.writer,
            phase: HandlerPhase::WaitingForOpponent,
        }
    }
}

/// Drains an outbox onto the connection, one flushed line per message.
///
/// Ends once every sender is dropped, then shuts the write side down.
async fn write_lines<W>(
    mut writer: WriteHalf<W>,
    mut rx: mpsc::Receiver<ServerMessage>,
    mark: Mark,
) where
    W: AsyncWrite,
{
    while let Some(msg) = rx.recv().await {
        let line = format!("{msg}\n");
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            warn!(%mark, error = %e, "Write failed, dropping connection output");
            return;
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!(%mark, error = %e, "Shutdown after last line failed");
    }
}

/// Drives one participant's connection for the length of a session.
#[derive(Debug)]
pub struct ParticipantHandler<S> {
    mark: Mark,
    peer: Option<SocketAddr>,
    session: Arc<GameSession>,
    reader: BufReader<ReadHalf<S>>,
    outbox: Outbox,
    writer: JoinHandle<()>,
    phase: HandlerPhase,
}

impl<S> ParticipantHandler<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// This handler's mark.
    pub fn mark(&self) -> Mark {
        self.mark
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> HandlerPhase {
        self.phase
    }

    /// Waits for room in the outbox, which stalls the command loop while
    /// the peer is not reading.
    async fn send(&self, msg: ServerMessage) {
        if self.outbox.send(msg).await.is_err() {
            debug!(mark = %self.mark, "Writer gone, dropping line");
        }
    }

    /// Runs the session from this participant's side until it leaves.
    ///
    /// Always leaves the session and waits for the connection to close,
    /// whatever ended the loop.
    #[instrument(skip(self), fields(session_id = %self.session.id(), mark = %self.mark, peer = ?self.peer))]
    pub async fn run(mut self) -> LoopExit {
        self.phase = HandlerPhase::AwaitingCommand;

        let exit = match self.command_loop().await {
            Ok(exit) => {
                info!(?exit, "Participant finished");
                exit
            }
            Err(e) => {
                warn!(error = %e, "Connection failed");
                LoopExit::Disconnected
            }
        };

        self.phase = HandlerPhase::Terminated;
        self.session.leave(self.mark);

        let Self { outbox, writer, .. } = self;
        drop(outbox);
        if let Err(e) = writer.await {
            warn!(error = %e, "Writer task panicked");
        }
        debug!("Connection closed");
        exit
    }

    async fn command_loop(&mut self) -> std::io::Result<LoopExit> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = (&mut self.reader)
                .take(MAX_LINE_BYTES)
                .read_line(&mut line)
                .await?;
            if read == 0 {
                return Ok(LoopExit::Disconnected);
            }
            if read as u64 == MAX_LINE_BYTES && !line.ends_with('\n') {
                warn!(limit = MAX_LINE_BYTES, "Command line too long");
                return Ok(LoopExit::LineTooLong);
            }

            match ClientCommand::parse(&line) {
                Ok(ClientCommand::Move(cell)) => self.handle_move(cell).await,
                Ok(ClientCommand::Quit) => return Ok(LoopExit::Quit),
                Err(e) => {
                    debug!(error = %e, "Malformed command");
                    self.send(ServerMessage::message(e.to_string())).await;
                }
            }
        }
    }

    async fn handle_move(&self, cell: usize) {
        // On success the session has already queued our lines.
        match self.session.attempt_move(cell, self.mark) {
            Ok(outcome) => debug!(cell, ?outcome, "Move accepted"),
            Err(e) => {
                debug!(cell, error = %e, "Move rejected");
                self.send(ServerMessage::message(e.to_string())).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionId;
    use std::time::Duration;
    use tokio::io::{DuplexStream, Lines};
    use tokio::time::timeout;

    struct Peer {
        lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
        write: WriteHalf<DuplexStream>,
    }

    impl Peer {
        fn new(stream: DuplexStream) -> Self {
            let (r, w) = tokio::io::split(stream);
            Self {
                lines: BufReader::new(r).lines(),
                write: w,
            }
        }

        async fn send(&mut self, line: &str) {
            self.write.write_all(format!("{line}\n").as_bytes()).await.unwrap();
        }

        async fn recv(&mut self) -> Option<String> {
            self.lines.next_line().await.unwrap()
        }

        async fn expect(&mut self, expected: &[&str]) {
            for want in expected {
                assert_eq!(self.recv().await.as_deref(), Some(*want));
            }
        }
    }

    fn pair() -> (Peer, Peer, ParticipantHandler<DuplexStream>, ParticipantHandler<DuplexStream>) {
        let (client_x, server_x) = tokio::io::duplex(1024);
        let (client_o, server_o) = tokio::io::duplex(1024);
        let seat_x = Seat::new(server_x, Mark::X, None, false);
        let seat_o = Seat::new(server_o, Mark::O, None, true);
        assert_eq!(seat_x.phase(), HandlerPhase::WaitingForOpponent);
        let session = Arc::new(GameSession::new(SessionId::from(7), seat_x.outbox(), seat_o.outbox()));
        (
            Peer::new(client_x),
            Peer::new(client_o),
            seat_x.join(Arc::clone(&session)),
            seat_o.join(session),
        )
    }

    #[tokio::test]
    async fn test_greeting_sequence() {
        let (mut x, mut o, hx, ho) = pair();
        tokio::spawn(hx.run());
        tokio::spawn(ho.run());

        x.expect(&["WELCOME X", "MESSAGE Waiting for opponent to connect", "MESSAGE All players connected", "MESSAGE Your turn"]).await;
        o.expect(&["WELCOME O", "MESSAGE All players connected"]).await;
    }

    #[tokio::test]
    async fn test_rejections_go_to_mover_only() {
        let (mut x, mut o, hx, ho) = pair();
        tokio::spawn(hx.run());
        tokio::spawn(ho.run());
        x.expect(&["WELCOME X", "MESSAGE Waiting for opponent to connect", "MESSAGE All players connected", "MESSAGE Your turn"]).await;
        o.expect(&["WELCOME O", "MESSAGE All players connected"]).await;

        o.send("MOVE 0").await;
        o.expect(&["MESSAGE Not your turn"]).await;
        x.send("MOVE 9").await;
        x.expect(&["MESSAGE Cell 9 is off the board (expected 0-8)"]).await;
        x.send("DANCE").await;
        x.expect(&["MESSAGE Unknown command: DANCE"]).await;
        x.send("MOVE 4").await;
        x.expect(&["VALID_MOVE", ""]).await;
        // O sees the move and nothing about X's bad attempts.
        o.expect(&["OPPONENT_MOVED 4", ""]).await;
    }

    #[tokio::test]
    async fn test_quit_closes_connection_and_tells_opponent() {
        let (mut x, mut o, hx, ho) = pair();
        let x_task = tokio::spawn(hx.run());
        tokio::spawn(ho.run());
        x.expect(&["WELCOME X", "MESSAGE Waiting for opponent to connect", "MESSAGE All players connected", "MESSAGE Your turn"]).await;
        o.expect(&["WELCOME O", "MESSAGE All players connected"]).await;

        x.send("QUIT").await;
        assert_eq!(x_task.await.unwrap(), LoopExit::Quit);
        assert_eq!(x.recv().await, None);

        o.expect(&["MESSAGE Opponent disconnected"]).await;
        o.send("MOVE 0").await;
        o.expect(&["MESSAGE Opponent disconnected"]).await;
    }

    #[tokio::test]
    async fn test_dropped_peer_terminates_handler() {
        let (x, mut o, hx, ho) = pair();
        let x_task = tokio::spawn(hx.run());
        tokio::spawn(ho.run());
        o.expect(&["WELCOME O", "MESSAGE All players connected"]).await;
        drop(x);

        assert_eq!(x_task.await.unwrap(), LoopExit::Disconnected);
        o.expect(&["MESSAGE Opponent disconnected"]).await;
    }

    #[tokio::test]
    async fn test_overlong_line_drops_connection() {
        let (mut x, mut o, hx, ho) = pair();
        let x_task = tokio::spawn(hx.run());
        tokio::spawn(ho.run());
        x.expect(&["WELCOME X", "MESSAGE Waiting for opponent to connect", "MESSAGE All players connected", "MESSAGE Your turn"]).await;
        o.expect(&["WELCOME O", "MESSAGE All players connected"]).await;

        let junk = "A".repeat(MAX_LINE_BYTES as usize + 44);
        x.write.write_all(junk.as_bytes()).await.unwrap();

        assert_eq!(x_task.await.unwrap(), LoopExit::LineTooLong);
        assert_eq!(x.recv().await, None);
        o.expect(&["MESSAGE Opponent disconnected"]).await;
    }

    #[tokio::test]
    async fn test_line_at_limit_is_accepted() {
        let (mut x, _o, hx, _ho) = pair();
        tokio::spawn(hx.run());
        x.expect(&["WELCOME X", "MESSAGE Waiting for opponent to connect", "MESSAGE All players connected", "MESSAGE Your turn"]).await;

        // "MOVE" + padding + " 4" + newline fills the limit exactly.
        let padding = " ".repeat(MAX_LINE_BYTES as usize - "MOVE 4\n".len());
        x.send(&format!("MOVE{padding} 4")).await;
        x.expect(&["VALID_MOVE", ""]).await;
    }

    #[tokio::test]
    async fn test_unread_replies_stop_command_reads() {
        let (mut x, _o, hx, _ho) = pair();
        tokio::spawn(hx.run());

        // Never read: rejections pile up until the handler stops reading and
        // our writes stall.
        let flood = timeout(Duration::from_secs(1), async {
            for _ in 0..10_000 {
                x.send("MOVE 9").await;
            }
        })
        .await;
        assert!(flood.is_err(), "10 000 unread commands were all accepted");
    }
}
