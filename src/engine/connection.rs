// src/engine/connection.rs
// Connection task: owns the socket and all reconnect timing. Events go
// out to the reducer channel; commands come in and are written to the
// open socket.

use std::cmp;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::SocketConfig;
use crate::engine::command::HudCommand;
use crate::engine::event::GestureEvent;
use crate::engine::reducer::ReducerMsg;
use crate::error::HudError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a live session ended
enum SessionEnd {
    Closed,
    Errored,
    Shutdown,
}

pub(crate) struct ConnectionTask {
    config: SocketConfig,
    reducer_tx: mpsc::Sender<ReducerMsg>,
    command_rx: mpsc::Receiver<HudCommand>,
    shutdown_rx: watch::Receiver<bool>,
    commands_open: bool,
}

impl ConnectionTask {
    pub(crate) fn new(
        config: SocketConfig,
        reducer_tx: mpsc::Sender<ReducerMsg>,
        command_rx: mpsc::Receiver<HudCommand>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            reducer_tx,
            command_rx,
            shutdown_rx,
            commands_open: true,
        }
    }

    pub(crate) async fn run(mut self) {
        // Consecutive failures since the last successful open
        let mut attempt: u32 = 0;
        loop {
            let result = tokio::select! {
                result = connect_async(self.config.endpoint.as_str()) => result,
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        break;
                    }
                    continue;
                }
            };

            match result {
                Ok((ws, _response)) => {
                    info!("connected to {}", self.config.endpoint);
                    attempt = 0;
                    self.shed_stale_commands();
                    if self.reducer_tx.send(ReducerMsg::ConnectionUp).await.is_err() {
                        break;
                    }
                    let end = self.drive(ws).await;
                    let _ = self.reducer_tx.send(ReducerMsg::ConnectionDown).await;
                    if matches!(end, SessionEnd::Shutdown) {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{}", HudError::Transport(e));
                }
            }

            if attempt >= self.config.max_retries {
                warn!(
                    "giving up on {} after {} failed attempts",
                    self.config.endpoint, attempt
                );
                let _ = self.reducer_tx.send(ReducerMsg::GaveUp).await;
                break;
            }
            let delay = backoff_delay(
                self.config.reconnect_delay_ms,
                attempt,
                self.config.backoff_cap_ms,
            );
            attempt += 1;
            debug!("reconnecting in {:?} (attempt {attempt})", delay);
            if !self.wait_before_retry(delay).await {
                break;
            }
        }
        debug!("connection task stopped");
    }

    /// Commands sent while disconnected are dropped, not replayed
    fn shed_stale_commands(&mut self) {
        while let Ok(cmd) = self.command_rx.try_recv() {
            debug!("dropping stale command {:?}", cmd);
        }
    }

    /// Serve one open socket until it drops or the engine shuts down
    async fn drive(&mut self, ws: WsStream) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => match GestureEvent::parse(&text) {
                        Ok(event) => {
                            if self.reducer_tx.send(ReducerMsg::Event(event)).await.is_err() {
                                return SessionEnd::Shutdown;
                            }
                        }
                        Err(e) => warn!("dropping frame: {e}"),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        info!("gesture socket closed by peer");
                        return SessionEnd::Closed;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("{}", HudError::Transport(e));
                        return SessionEnd::Errored;
                    }
                },
                cmd = self.command_rx.recv(), if self.commands_open => match cmd {
                    Some(cmd) => match serde_json::to_string(&cmd) {
                        Ok(json) => {
                            if let Err(e) = sink.send(Message::Text(json.into())).await {
                                warn!("{}", HudError::Transport(e));
                                return SessionEnd::Errored;
                            }
                        }
                        Err(e) => warn!("failed to serialize command: {e}"),
                    },
                    None => self.commands_open = false,
                },
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        let _ = sink.send(Message::Close(None)).await;
                        return SessionEnd::Shutdown;
                    }
                }
            }
        }
    }

    /// Returns false when shutdown arrived during the wait
    async fn wait_before_retry(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                cmd = self.command_rx.recv(), if self.commands_open => match cmd {
                    Some(cmd) => debug!("socket not open, dropping command {:?}", cmd),
                    None => self.commands_open = false,
                },
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        return false;
                    }
                }
            }
        }
    }
}

/// Exponential backoff: base * 2^attempt, capped
pub(crate) fn backoff_delay(base_ms: u64, attempt: u32, cap_ms: u64) -> Duration {
    let factor = 1u64 << attempt.min(16);
    Duration::from_millis(cmp::min(base_ms.saturating_mul(factor), cap_ms))
}
