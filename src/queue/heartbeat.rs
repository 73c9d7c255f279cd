//! SSE heartbeat ticker for streaming tasks. Races a 3-second interval
//! against the adapter's generate future with `tokio::select!`, the same
//! interval-vs-completion shape a crawl dispatch loop uses around its own
//! main loop.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::adapter::GenerateOutcome;
use crate::config::KeepaliveMode;

const HEARTBEAT_PERIOD: Duration = Duration::from_secs(3);

fn keepalive_frame(mode: KeepaliveMode) -> Bytes {
    match mode {
        KeepaliveMode::Comment => Bytes::from_static(b": keepalive\n\n"),
        KeepaliveMode::Content => {
            Bytes::from(r#"data: {"choices":[{"delta":{"content":""}}]}"#.to_string() + "\n\n")
        }
    }
}

/// Frame carrying the final content delta.
#[must_use]
pub fn content_chunk(content: &str) -> Bytes {
    let payload = serde_json::json!({
        "choices": [{"delta": {"content": content}, "index": 0, "finish_reason": null}],
    });
    Bytes::from(format!("data: {payload}\n\n"))
}

/// The terminal `[DONE]` marker.
#[must_use]
pub fn done_frame() -> Bytes {
    Bytes::from_static(b"data: [DONE]\n\n")
}

/// Runs `outcome_future` to completion while emitting a keep-alive frame on
/// every tick. Returns `None` the moment a send fails (the client closed
/// the socket) — the in-flight adapter call is *not* cancelled, per the
/// cancellation model: it keeps running and its result is simply discarded.
pub async fn drive_with_heartbeat<F>(
    mode: KeepaliveMode,
    tx: &mpsc::Sender<Bytes>,
    outcome_future: F,
) -> Option<GenerateOutcome>
where
    F: Future<Output = GenerateOutcome>,
{
    let mut ticker = tokio::time::interval(HEARTBEAT_PERIOD);
    ticker.tick().await; // first tick fires immediately; the real cadence starts after
    tokio::pin!(outcome_future);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if tx.send(keepalive_frame(mode)).await.is_err() {
                    return None;
                }
            }
            outcome = &mut outcome_future => {
                return Some(outcome);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_without_any_ticks_when_fast() {
        let (tx, mut rx) = mpsc::channel(8);
        let outcome = drive_with_heartbeat(KeepaliveMode::Comment, &tx, async { GenerateOutcome::text("done") }).await;
        assert!(outcome.is_some());
        drop(tx);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn stops_emitting_once_receiver_drops() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let outcome = drive_with_heartbeat(
            KeepaliveMode::Comment,
            &tx,
            async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                GenerateOutcome::text("too late")
            },
        )
        .await;
        assert!(outcome.is_none());
    }
}
