use session::{SessionId, SessionOutput};
use tokio::sync::mpsc;

/// Messages from the network layer to the tick thread.
#[derive(Debug)]
pub enum NetToTick {
    NewConnection { session_id: SessionId },
    /// One JSON packet received from the client.
    Packet { session_id: SessionId, text: String },
    Disconnected { session_id: SessionId },
}

/// Sender from network tasks to the tick thread.
pub type PlayerTx = mpsc::UnboundedSender<NetToTick>;
/// Receiver in the tick thread for player events.
pub type PlayerRx = mpsc::UnboundedReceiver<NetToTick>;

/// Sender from tick thread to the output router.
pub type OutputTx = mpsc::UnboundedSender<SessionOutput>;
/// Receiver in the output router for session outputs.
pub type OutputRx = mpsc::UnboundedReceiver<SessionOutput>;

/// Per-session write channel (tick thread -> output router -> session task).
pub type SessionWriteTx = mpsc::UnboundedSender<String>;
pub type SessionWriteRx = mpsc::UnboundedReceiver<String>;

/// Registration message for the output router.
#[derive(Debug)]
pub struct RegisterSession {
    pub session_id: SessionId,
    pub write_tx: SessionWriteTx,
}

pub type RegisterTx = mpsc::UnboundedSender<RegisterSession>;
pub type RegisterRx = mpsc::UnboundedReceiver<RegisterSession>;

pub type UnregisterTx = mpsc::UnboundedSender<SessionId>;
pub type UnregisterRx = mpsc::UnboundedReceiver<SessionId>;

/// Network-side ends: handed to the transport.
pub struct NetEnds {
    pub player_tx: PlayerTx,
    pub register_tx: RegisterTx,
    pub unregister_tx: UnregisterTx,
}

/// Router-side ends: handed to `run_output_router`.
pub struct RouterEnds {
    pub output_rx: OutputRx,
    pub register_rx: RegisterRx,
    pub unregister_rx: UnregisterRx,
}

/// Tick-side ends: owned by the simulation thread.
pub struct TickEnds {
    pub player_rx: PlayerRx,
    pub output_tx: OutputTx,
}

/// Create every channel between transport, router and tick thread.
pub fn wire_channels() -> (NetEnds, RouterEnds, TickEnds) {
    let (player_tx, player_rx) = mpsc::unbounded_channel();
    let (output_tx, output_rx) = mpsc::unbounded_channel();
    let (register_tx, register_rx) = mpsc::unbounded_channel();
    let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
    (
        NetEnds {
            player_tx,
            register_tx,
            unregister_tx,
        },
        RouterEnds {
            output_rx,
            register_rx,
            unregister_rx,
        },
        TickEnds {
            player_rx,
            output_tx,
        },
    )
}
