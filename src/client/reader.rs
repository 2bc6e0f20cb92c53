//! Session event stream reader
//!
//! Owns the single server-push connection of one session. Decoded events are
//! forwarded to the controller's channel in arrival order; the reader stops on
//! the terminal report, on a transport failure, or when closed.

use crate::runtime::ResearchApi;
use crate::state_machine::state::SessionId;
use crate::state_machine::Event;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Handle to a running reader task; dropping it closes the stream
#[derive(Debug)]
pub struct EventStreamReader {
    session_id: SessionId,
    cancel: CancellationToken,
}

impl EventStreamReader {
    /// Subscribe to `session_id` and start forwarding events to `event_tx`
    pub fn open<A>(api: Arc<A>, session_id: SessionId, event_tx: mpsc::Sender<Event>) -> Self
    where
        A: ResearchApi + ?Sized + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let id = session_id.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    tracing::debug!(session_id = %id, "Event stream closed");
                }
                () = pump(api, &id, &event_tx) => {}
            }
        });

        Self { session_id, cancel }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for EventStreamReader {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn pump<A>(api: Arc<A>, session_id: &SessionId, event_tx: &mpsc::Sender<Event>)
where
    A: ResearchApi + ?Sized,
{
    let mut stream = match api.subscribe(session_id).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "Failed to open event stream");
            let _ = event_tx
                .send(Event::StreamFailed {
                    reason: e.to_string(),
                })
                .await;
            return;
        }
    };

    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => {
                let terminal = event.is_terminal();
                if event_tx.send(Event::Server(event)).await.is_err() {
                    // controller is gone
                    return;
                }
                if terminal {
                    tracing::debug!(session_id = %session_id, "Terminal event received, closing stream");
                    return;
                }
            }
            Err(e) if !e.is_fatal() => {
                tracing::warn!(session_id = %session_id, error = %e, "Skipping undecodable event");
            }
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Event stream failed");
                let _ = event_tx
                    .send(Event::StreamFailed {
                        reason: e.to_string(),
                    })
                    .await;
                return;
            }
        }
    }

    // Streams from `ResearchApi` report early EOF themselves; this covers ones that just stop
    let _ = event_tx
        .send(Event::StreamFailed {
            reason: "Stream ended without a final report".to_string(),
        })
        .await;
}
