//! Stream demultiplexer — one upstream read, two independent downstream
//! cursors.
//!
//! A background task performs the single pass over the response stream and
//! fans each increment out: text content into one queue, tool-call fragment
//! groups into the other. Queues are unbounded so neither consumer can stall
//! the reader or deadlock the other; a whole response is bounded by the
//! model's output limit. A source failure is forwarded to both queues at the
//! point each consumer would have received its next item.

use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use colloquy_core::types::UsageInfo;

use crate::traits::{CallFragment, ClientError, ResponseDelta};

/// The two demultiplexed sequences plus the end-of-stream usage report.
pub struct StreamHalves {
    /// Content deltas, in emission order.
    pub content: mpsc::UnboundedReceiver<Result<String, ClientError>>,
    /// Tool-call fragment groups, in emission order.
    pub calls: mpsc::UnboundedReceiver<Result<Vec<CallFragment>, ClientError>>,
    /// Usage totals reported at stream end; `None` if the endpoint sent none
    /// or the stream failed.
    pub usage: oneshot::Receiver<Option<UsageInfo>>,
}

/// Split a response stream into independently consumable halves.
///
/// Each increment is pulled from `stream` exactly once. An increment with
/// content goes to the content queue, one with fragments to the call queue,
/// one with both to both; increments carrying neither are dropped.
pub fn split<S>(stream: S) -> StreamHalves
where
    S: Stream<Item = Result<ResponseDelta, ClientError>> + Send + 'static,
{
    let (content_tx, content_rx) = mpsc::unbounded_channel();
    let (calls_tx, calls_rx) = mpsc::unbounded_channel();
    let (usage_tx, usage_rx) = oneshot::channel();

    tokio::spawn(async move {
        let mut stream = std::pin::pin!(stream);
        let mut usage: Option<UsageInfo> = None;
        let mut increments = 0usize;

        while let Some(item) = stream.next().await {
            increments += 1;
            match item {
                Ok(delta) => {
                    if let Some(text) = delta.content {
                        if !text.is_empty() {
                            let _ = content_tx.send(Ok(text));
                        }
                    }
                    if !delta.fragments.is_empty() {
                        let _ = calls_tx.send(Ok(delta.fragments));
                    }
                    if let Some(u) = delta.usage {
                        usage = Some(u);
                    }
                }
                Err(e) => {
                    let _ = content_tx.send(Err(e.clone()));
                    let _ = calls_tx.send(Err(e));
                    break;
                }
            }
        }

        debug!(increments, "response stream drained");
        let _ = usage_tx.send(usage);
        // Senders drop here; both queues end after their buffered items.
    });

    StreamHalves {
        content: content_rx,
        calls: calls_rx,
        usage: usage_rx,
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn frag(slot: usize, args: &str) -> CallFragment {
        CallFragment {
            slot,
            id: None,
            name: None,
            arguments: Some(args.to_string()),
        }
    }

    async fn drain<T>(mut rx: mpsc::UnboundedReceiver<Result<T, ClientError>>) -> Vec<Result<T, ClientError>> {
        let mut items = Vec::new();
        while let Some(item) = rx.recv().await {
            items.push(item);
        }
        items
    }

    #[tokio::test]
    async fn partitions_content_and_fragments_without_loss() {
        let deltas = vec![
            Ok(ResponseDelta::content("Hel")),
            Ok(ResponseDelta::fragments(vec![frag(0, "{\"pa")])),
            Ok(ResponseDelta::content("lo")),
            Ok(ResponseDelta::fragments(vec![frag(0, "th\":1}")])),
        ];
        let halves = split(stream::iter(deltas));

        let content: Vec<String> = drain(halves.content)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        let calls: Vec<Vec<CallFragment>> = drain(halves.calls)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(content, vec!["Hel", "lo"]);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0][0].arguments.as_deref(), Some("{\"pa"));
        assert_eq!(calls[1][0].arguments.as_deref(), Some("th\":1}"));
    }

    #[tokio::test]
    async fn increment_with_both_goes_to_both() {
        let delta = ResponseDelta {
            content: Some("text".into()),
            fragments: vec![frag(0, "{}")],
            usage: None,
        };
        let halves = split(stream::iter(vec![Ok(delta)]));

        assert_eq!(drain(halves.content).await.len(), 1);
        assert_eq!(drain(halves.calls).await.len(), 1);
    }

    #[tokio::test]
    async fn empty_increments_are_dropped_from_both() {
        let deltas = vec![
            Ok(ResponseDelta::default()),
            Ok(ResponseDelta::content("")),
            Ok(ResponseDelta::content("x")),
        ];
        let halves = split(stream::iter(deltas));

        assert_eq!(drain(halves.content).await.len(), 1);
        assert!(drain(halves.calls).await.is_empty());
    }

    #[tokio::test]
    async fn usage_is_delivered_at_stream_end() {
        let usage = UsageInfo {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        };
        let deltas = vec![
            Ok(ResponseDelta::content("hi")),
            Ok(ResponseDelta::usage(usage)),
        ];
        let halves = split(stream::iter(deltas));

        drain(halves.content).await;
        assert_eq!(halves.usage.await.unwrap(), Some(usage));
    }

    #[tokio::test]
    async fn no_usage_yields_none() {
        let halves = split(stream::iter(vec![Ok(ResponseDelta::content("hi"))]));
        drain(halves.content).await;
        assert_eq!(halves.usage.await.unwrap(), None);
    }

    #[tokio::test]
    async fn source_error_surfaces_on_both_queues() {
        let err = ClientError::Network("connection reset".into());
        let deltas = vec![
            Ok(ResponseDelta::content("partial")),
            Err(err.clone()),
            // Never reached: the single pass stops at the failure.
            Ok(ResponseDelta::content("after")),
        ];
        let halves = split(stream::iter(deltas));

        let content = drain(halves.content).await;
        assert_eq!(content.len(), 2);
        assert_eq!(content[0].as_deref().unwrap(), "partial");
        assert_eq!(content[1].clone().unwrap_err(), err);

        let calls = drain(halves.calls).await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].clone().unwrap_err(), err);
    }

    #[tokio::test]
    async fn consumers_advance_independently() {
        // Drain the call queue completely before touching the content queue;
        // the unbounded buffering must not deadlock the reader.
        let deltas: Vec<Result<ResponseDelta, ClientError>> = (0..100)
            .map(|i| {
                if i % 2 == 0 {
                    Ok(ResponseDelta::content(format!("c{i}")))
                } else {
                    Ok(ResponseDelta::fragments(vec![frag(0, "x")]))
                }
            })
            .collect();
        let halves = split(stream::iter(deltas));

        let calls = drain(halves.calls).await;
        assert_eq!(calls.len(), 50);

        let content = drain(halves.content).await;
        assert_eq!(content.len(), 50);
        assert_eq!(content[0].as_deref().unwrap(), "c0");
        assert_eq!(content[49].as_deref().unwrap(), "c98");
    }

    #[tokio::test]
    async fn ordering_within_each_queue_matches_emission_order() {
        let deltas: Vec<Result<ResponseDelta, ClientError>> = (0..20)
            .map(|i| Ok(ResponseDelta::content(format!("{i}"))))
            .collect();
        let halves = split(stream::iter(deltas));

        let content: Vec<String> = drain(halves.content)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        let expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        assert_eq!(content, expected);
    }
}
