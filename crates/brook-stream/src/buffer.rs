//! Buffered stream processing
//!
//! Coalesces an irregular raw-chunk sequence into bounded output chunks:
//! a flush happens once the pending buffer reaches the size threshold or
//! the flush interval has elapsed, whichever comes first (checked as each
//! chunk arrives). Whatever remains when the source ends is always
//! flushed — concatenating the outputs reproduces the input exactly.

use futures_util::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug)]
struct BufferState {
    pending: String,
    last_flush: Instant,
}

/// Coalesces irregular chunk streams by size and time
#[derive(Debug, Clone)]
pub struct BufferedStreamProcessor {
    buffer_size: usize,
    flush_interval: Duration,
    state: Arc<Mutex<BufferState>>,
}

impl BufferedStreamProcessor {
    /// `buffer_size` is measured in bytes of pending output
    pub fn new(buffer_size: usize, flush_interval: Duration) -> Self {
        Self {
            buffer_size,
            flush_interval,
            state: Arc::new(Mutex::new(BufferState {
                pending: String::new(),
                last_flush: Instant::now(),
            })),
        }
    }

    /// Wrap `source`, yielding coalesced chunks. The output ends when the
    /// source ends, after flushing any pending remainder.
    pub fn process_stream<S>(&self, source: S) -> impl Stream<Item = String> + Send + use<S>
    where
        S: Stream<Item = String> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let buffer_size = self.buffer_size;
        let flush_interval = self.flush_interval;
        let (out_tx, out_rx) = mpsc::channel(16);

        tokio::spawn(async move {
            let mut source = Box::pin(source);

            while let Some(chunk) = source.next().await {
                let flushed = {
                    let mut buffer = state.lock().await;
                    buffer.pending.push_str(&chunk);
                    let due = buffer.pending.len() >= buffer_size
                        || buffer.last_flush.elapsed() >= flush_interval;
                    if due && !buffer.pending.is_empty() {
                        buffer.last_flush = Instant::now();
                        Some(std::mem::take(&mut buffer.pending))
                    } else {
                        None
                    }
                };
                if let Some(out) = flushed {
                    if out_tx.send(out).await.is_err() {
                        return; // consumer gone
                    }
                }
            }

            // Source exhausted: no data loss, flush the remainder
            let remainder = {
                let mut buffer = state.lock().await;
                buffer.last_flush = Instant::now();
                std::mem::take(&mut buffer.pending)
            };
            if !remainder.is_empty() {
                let _ = out_tx.send(remainder).await;
            }
        });

        ReceiverStream::new(out_rx)
    }

    /// Clear the pending buffer and the flush clock. Safe to call between
    /// reuses of the same instance.
    pub async fn reset(&self) {
        let mut buffer = self.state.lock().await;
        buffer.pending.clear();
        buffer.last_flush = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    async fn run(
        processor: &BufferedStreamProcessor,
        chunks: Vec<&str>,
    ) -> Vec<String> {
        let owned: Vec<String> = chunks.into_iter().map(|s| s.to_string()).collect();
        let source = stream::iter(owned);
        processor.process_stream(source).collect().await
    }

    #[tokio::test]
    async fn concatenation_is_preserved_for_arbitrary_splits() {
        let processor = BufferedStreamProcessor::new(8, Duration::from_secs(60));
        let input = vec!["ab", "cde", "", "fghijklmno", "p"];
        let expected: String = input.concat();

        let out = run(&processor, input).await;
        assert_eq!(out.concat(), expected);
    }

    #[tokio::test]
    async fn size_threshold_triggers_a_flush() {
        let processor = BufferedStreamProcessor::new(4, Duration::from_secs(60));
        let out = run(&processor, vec!["ab", "cd", "e"]).await;

        // "abcd" crosses the threshold, "e" is the remainder flush
        assert_eq!(out, vec!["abcd".to_string(), "e".to_string()]);
    }

    #[tokio::test]
    async fn one_huge_chunk_is_passed_through_whole() {
        let processor = BufferedStreamProcessor::new(4, Duration::from_secs(60));
        let big = "x".repeat(1000);
        let out = run(&processor, vec![big.as_str()]).await;
        assert_eq!(out, vec![big]);
    }

    #[tokio::test]
    async fn pending_remainder_is_flushed_at_source_end() {
        let processor = BufferedStreamProcessor::new(1024, Duration::from_secs(60));
        let out = run(&processor, vec!["never", " reaches", " threshold"]).await;
        assert_eq!(out, vec!["never reaches threshold".to_string()]);
    }

    #[tokio::test]
    async fn elapsed_interval_triggers_a_flush() {
        let processor = BufferedStreamProcessor::new(usize::MAX, Duration::from_millis(0));
        // Zero interval: every chunk is due immediately
        let out = run(&processor, vec!["a", "b"]).await;
        assert_eq!(out, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn empty_source_yields_nothing() {
        let processor = BufferedStreamProcessor::new(4, Duration::from_millis(10));
        let out = run(&processor, vec![]).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn reset_allows_clean_reuse() {
        let processor = BufferedStreamProcessor::new(1024, Duration::from_secs(60));
        let out = run(&processor, vec!["first run"]).await;
        assert_eq!(out, vec!["first run".to_string()]);

        processor.reset().await;

        let out = run(&processor, vec!["second", " run"]).await;
        assert_eq!(out, vec!["second run".to_string()]);
    }
}
