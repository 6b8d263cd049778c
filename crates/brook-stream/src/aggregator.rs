//! Multi-stream aggregation
//!
//! Multiplexes N independent per-stream sources into one merged feed.
//! Each registered source gets its own background producer pushing into a
//! bounded queue (producers block when a consumer stalls; the queues
//! never grow unbounded), and the merged feed is a fan-in select over
//! those queues. Per-stream ordering is preserved; interleaving across
//! streams is unordered.

use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt, StreamMap};
use tracing::{debug, warn};

/// Internal queue item. `End` is the exactly-once per-stream terminator;
/// it deregisters the stream and is never forwarded.
#[derive(Debug)]
enum StreamItem {
    Event(Value),
    Error(String),
    End,
}

#[derive(Default)]
struct AggregatorState {
    /// Queues registered but not yet picked up by the merged feed
    pending: Vec<(String, mpsc::Receiver<StreamItem>)>,
    /// Streams registered and not yet ended
    active: usize,
    closed: bool,
}

/// Fan-in of independently produced event streams
pub struct StreamAggregator {
    state: Arc<Mutex<AggregatorState>>,
    notify: Arc<Notify>,
    queue_capacity: usize,
}

impl StreamAggregator {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(AggregatorState::default())),
            notify: Arc::new(Notify::new()),
            queue_capacity,
        }
    }

    /// Register a source and start its background producer. The producer
    /// runs to completion at its own pace, pushes an error item if the
    /// source fails, and always terminates the queue with the end marker.
    pub async fn add_stream(
        &self,
        stream_id: impl Into<String>,
        source: impl Stream<Item = Result<Value, anyhow::Error>> + Send + 'static,
    ) {
        let stream_id = stream_id.into();
        let (item_tx, item_rx) = mpsc::channel(self.queue_capacity);

        {
            let mut state = self.state.lock().await;
            state.pending.push((stream_id.clone(), item_rx));
            state.active += 1;
        }
        self.notify.notify_one();

        tokio::spawn(async move {
            let mut source = Box::pin(source);
            while let Some(item) = source.next().await {
                let sent = match item {
                    Ok(event) => item_tx.send(StreamItem::Event(event)).await,
                    Err(e) => {
                        warn!("Stream {} failed: {}", stream_id, e);
                        let _ = item_tx.send(StreamItem::Error(e.to_string())).await;
                        break;
                    }
                };
                if sent.is_err() {
                    // Queue dropped by close_all; keep going is pointless
                    break;
                }
            }
            // Exactly once regardless of outcome. A send into a dropped
            // queue is harmless.
            let _ = item_tx.send(StreamItem::End).await;
            debug!("Stream {} producer finished", stream_id);
        });
    }

    /// The merged feed. Items are annotated with their `stream_id` and an
    /// aggregation timestamp; end markers silently deregister their
    /// stream. The feed terminates once no registered streams remain.
    pub fn aggregated_events(&self) -> impl Stream<Item = Value> + Send + use<> {
        let state = Arc::clone(&self.state);
        let notify = Arc::clone(&self.notify);
        let (out_tx, out_rx) = mpsc::channel(self.queue_capacity);

        tokio::spawn(async move {
            let mut queues: StreamMap<String, ReceiverStream<StreamItem>> = StreamMap::new();

            loop {
                {
                    let mut st = state.lock().await;
                    if st.closed {
                        break;
                    }
                    for (stream_id, rx) in st.pending.drain(..) {
                        queues.insert(stream_id, ReceiverStream::new(rx));
                    }
                }

                if queues.is_empty() {
                    let st = state.lock().await;
                    if st.pending.is_empty() {
                        break; // fully drained
                    }
                    continue;
                }

                tokio::select! {
                    // A registration (or close) happened; rescan
                    _ = notify.notified() => continue,
                    item = queues.next() => match item {
                        Some((stream_id, StreamItem::End)) => {
                            queues.remove(&stream_id);
                            let mut st = state.lock().await;
                            st.active = st.active.saturating_sub(1);
                        }
                        Some((stream_id, StreamItem::Error(error))) => {
                            let event = json!({"type": "error", "error": error});
                            if out_tx.send(annotate(event, &stream_id)).await.is_err() {
                                break;
                            }
                        }
                        Some((stream_id, StreamItem::Event(event))) => {
                            if out_tx.send(annotate(event, &stream_id)).await.is_err() {
                                break;
                            }
                        }
                        None => continue,
                    }
                }
            }
        });

        ReceiverStream::new(out_rx)
    }

    /// Number of registered streams that have not ended yet
    pub async fn active_stream_count(&self) -> usize {
        self.state.lock().await.active
    }

    /// Force-deregister every stream without waiting for producers. A
    /// still-running producer keeps writing into its unreferenced queue
    /// until it notices the closed channel.
    pub async fn close_all(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        state.pending.clear();
        state.active = 0;
        drop(state);
        self.notify.notify_one();
    }
}

/// Stamp an item with its origin and aggregation time
fn annotate(event: Value, stream_id: &str) -> Value {
    let mut object = match event {
        Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("event".to_string(), other);
            map
        }
    };
    object.insert("stream_id".to_string(), json!(stream_id));
    object.insert(
        "timestamp".to_string(),
        json!(chrono::Utc::now().to_rfc3339()),
    );
    Value::Object(object)
}

/// Per-stream item accounting, handy for tests and the stats endpoint
pub fn count_by_stream(items: &[Value]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for item in items {
        if let Some(stream_id) = item["stream_id"].as_str() {
            *counts.entry(stream_id.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn ok_events(n: usize) -> Vec<Result<Value, anyhow::Error>> {
        (0..n)
            .map(|i| Ok(json!({"type": "text-delta", "seq": i})))
            .collect()
    }

    #[tokio::test]
    async fn merged_feed_carries_every_item_from_every_stream() {
        let aggregator = StreamAggregator::new(64);
        aggregator.add_stream("a", stream::iter(ok_events(3))).await;
        aggregator.add_stream("b", stream::iter(ok_events(5))).await;
        aggregator.add_stream("c", stream::iter(ok_events(1))).await;

        let items: Vec<Value> = aggregator.aggregated_events().collect().await;
        assert_eq!(items.len(), 9);

        let counts = count_by_stream(&items);
        assert_eq!(counts["a"], 3);
        assert_eq!(counts["b"], 5);
        assert_eq!(counts["c"], 1);

        // All streams deregistered once the feed drained
        assert_eq!(aggregator.active_stream_count().await, 0);
    }

    #[tokio::test]
    async fn items_are_annotated_and_sentinels_are_not_forwarded() {
        let aggregator = StreamAggregator::new(16);
        aggregator.add_stream("solo", stream::iter(ok_events(2))).await;

        let items: Vec<Value> = aggregator.aggregated_events().collect().await;
        assert_eq!(items.len(), 2);
        for item in &items {
            assert_eq!(item["stream_id"], "solo");
            assert!(item["timestamp"].is_string());
            assert_ne!(item["type"], "stream_end");
        }
    }

    #[tokio::test]
    async fn per_stream_order_is_preserved() {
        let aggregator = StreamAggregator::new(16);
        aggregator.add_stream("ordered", stream::iter(ok_events(10))).await;
        aggregator.add_stream("other", stream::iter(ok_events(10))).await;

        let items: Vec<Value> = aggregator.aggregated_events().collect().await;
        let seqs: Vec<u64> = items
            .iter()
            .filter(|item| item["stream_id"] == "ordered")
            .map(|item| item["seq"].as_u64().unwrap())
            .collect();
        assert_eq!(seqs, (0..10).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn a_failing_stream_reports_one_error_and_spares_the_others() {
        let aggregator = StreamAggregator::new(16);
        aggregator
            .add_stream(
                "bad",
                stream::iter(vec![
                    Ok(json!({"type": "text-delta"})),
                    Err(anyhow::anyhow!("upstream exploded")),
                ]),
            )
            .await;
        aggregator.add_stream("good", stream::iter(ok_events(4))).await;

        let items: Vec<Value> = aggregator.aggregated_events().collect().await;

        let bad_items: Vec<&Value> = items
            .iter()
            .filter(|item| item["stream_id"] == "bad")
            .collect();
        assert_eq!(bad_items.len(), 2);
        assert_eq!(bad_items[1]["type"], "error");
        assert_eq!(bad_items[1]["error"], "upstream exploded");

        let good_count = items
            .iter()
            .filter(|item| item["stream_id"] == "good")
            .count();
        assert_eq!(good_count, 4);
        assert_eq!(aggregator.active_stream_count().await, 0);
    }

    #[tokio::test]
    async fn feed_with_no_streams_terminates_immediately() {
        let aggregator = StreamAggregator::new(16);
        let items: Vec<Value> = aggregator.aggregated_events().collect().await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn close_all_deregisters_without_waiting() {
        let aggregator = StreamAggregator::new(4);
        // A source that never ends on its own
        aggregator
            .add_stream("endless", stream::iter(ok_events(2)).chain(stream::pending()))
            .await;
        assert_eq!(aggregator.active_stream_count().await, 1);

        aggregator.close_all().await;
        assert_eq!(aggregator.active_stream_count().await, 0);

        let items: Vec<Value> = aggregator.aggregated_events().collect().await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn streams_added_while_draining_are_picked_up() {
        let aggregator = StreamAggregator::new(16);
        // Slow stream keeps the feed alive while the second registers
        let slow = stream::iter(ok_events(3)).then(|item| async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            item
        });
        aggregator.add_stream("slow", slow).await;

        let feed = aggregator.aggregated_events();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        aggregator.add_stream("late", stream::iter(ok_events(2))).await;

        let items: Vec<Value> = feed.collect().await;
        let counts = count_by_stream(&items);
        assert_eq!(counts["slow"], 3);
        assert_eq!(counts["late"], 2);
    }
}
