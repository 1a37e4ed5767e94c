use std::collections::HashMap;

use session::SessionId;
use tokio::sync::watch;

use crate::channels::{RouterEnds, SessionWriteTx};

/// Routes SessionOutput messages to the correct per-session write channel
/// until every input closes or `shutdown` flips to true.
pub async fn run_output_router(ends: RouterEnds, mut shutdown: watch::Receiver<bool>) -> usize {
    let RouterEnds {
        mut output_rx,
        mut register_rx,
        mut unregister_rx,
    } = ends;
    let mut writers: HashMap<SessionId, SessionWriteTx> = HashMap::new();
    let mut delivered = 0usize;

    loop {
        tokio::select! {
            Some(reg) = register_rx.recv() => {
                tracing::debug!(session = %reg.session_id, "output router: session registered");
                writers.insert(reg.session_id, reg.write_tx);
            }
            Some(session_id) = unregister_rx.recv() => {
                tracing::debug!(session = %session_id, "output router: session unregistered");
                writers.remove(&session_id);
            }
            Some(output) = output_rx.recv() => {
                let Some(tx) = writers.get(&output.session_id) else {
                    continue;
                };
                if tx.send(output.text).is_err() {
                    tracing::debug!(session = %output.session_id, "output router: write channel closed");
                    writers.remove(&output.session_id);
                    continue;
                }
                delivered += 1;
                if output.disconnect {
                    tracing::debug!(session = %output.session_id, "output router: disconnect requested");
                    writers.remove(&output.session_id);
                }
            }
            Ok(()) = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            else => break,
        }
    }

    tracing::info!(delivered, "output router shutting down");
    delivered
}
