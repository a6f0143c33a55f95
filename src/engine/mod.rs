// src/engine/mod.rs
// Engine wiring: spawns the connection and reducer tasks and hands out
// the read/command surface.

pub mod command;
mod connection;
pub mod event;
pub mod projector;
mod reducer;
pub mod state;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::SocketConfig;
use crate::engine::command::{CommandSender, HudCommand};
use crate::engine::connection::ConnectionTask;
use crate::engine::reducer::ReducerTask;
use crate::engine::state::{CameraState, HudSnapshot, HudState, Marker};
use crate::error::HudResult;

/// Observer notifications emitted as events are applied
#[derive(Debug, Clone)]
pub enum HudNotice {
    CameraMoved(CameraState),
    MarkerPlaced(Marker),
}

/// Start the sync engine against the configured endpoint. The returned
/// handle is the only way to read or talk to the engine; dropping it
/// stops both tasks.
pub fn spawn(config: SocketConfig) -> HudResult<HudHandle> {
    config.validate()?;

    let (reducer_tx, reducer_rx) = mpsc::channel(100);
    let (command_tx, command_rx) = mpsc::channel(100);
    let (snapshot_tx, snapshot_rx) = watch::channel(HudSnapshot::default());
    let (notice_tx, _) = broadcast::channel(100);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    info!("starting gesture sync engine against {}", config.endpoint);

    let reducer = ReducerTask {
        state: HudState::new(),
        rx: reducer_rx,
        timer_tx: reducer_tx.clone(),
        snapshot_tx,
        notice_tx: notice_tx.clone(),
        shutdown_rx: shutdown_rx.clone(),
    };
    let reducer_task = tokio::spawn(reducer.run());

    let connection = ConnectionTask::new(config, reducer_tx, command_rx, shutdown_rx);
    let connection_task = tokio::spawn(connection.run());

    Ok(HudHandle {
        commands: CommandSender::new(command_tx, snapshot_rx.clone()),
        snapshot_rx,
        notice_tx,
        shutdown_tx,
        connection_task,
        reducer_task,
    })
}

/// Client surface of the running engine
pub struct HudHandle {
    commands: CommandSender,
    snapshot_rx: watch::Receiver<HudSnapshot>,
    notice_tx: broadcast::Sender<HudNotice>,
    shutdown_tx: watch::Sender<bool>,
    connection_task: JoinHandle<()>,
    reducer_task: JoinHandle<()>,
}

impl HudHandle {
    /// Latest view state; cheap enough to clone once per frame
    pub fn snapshot(&self) -> HudSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Subscribe to snapshot changes
    pub fn watch(&self) -> watch::Receiver<HudSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Subscribe to camera/marker observer notifications
    pub fn notices(&self) -> broadcast::Receiver<HudNotice> {
        self.notice_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.snapshot_rx.borrow().phase.is_connected()
    }

    pub fn start_listening(&self) {
        self.commands.send(HudCommand::StartListening);
    }

    pub fn stop_listening(&self, transcription: Option<String>) {
        self.commands.send(HudCommand::StopListening { transcription });
    }

    pub fn drop_marker(&self, lat: f64, lon: f64) {
        self.commands.send(HudCommand::DropMarker { lat, lon });
    }

    /// Stop both tasks, cancelling any pending reconnect and closing the
    /// socket. No reconnect attempt fires after this returns.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.connection_task.await;
        let _ = self.reducer_task.await;
    }
}
