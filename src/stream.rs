//! Batch conversion API: convert many inputs, emit each as it completes.
//!
//! Each input is resolved (downloaded or read) and then converted on the
//! blocking pool; up to [`BatchConfig::concurrency`] documents are in flight
//! at once. Outcomes arrive in completion order; `index` gives the position
//! in the input list for callers that need the original order.
//!
//! One failing input never stops the batch: its error is carried in its own
//! [`DocumentOutcome`]. Dropping the stream cancels pending work.

use crate::classify::StreamInfo;
use crate::config::{BatchConfig, ConversionConfig};
use crate::convert::convert_input;
use crate::error::MarkItUpError;
use crate::output::ConversionResult;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::{info, warn};

/// Result of converting one input of a batch.
#[derive(Debug)]
pub struct DocumentOutcome {
    /// Position of the input in the list passed to [`convert_stream`].
    pub index: usize,
    pub input: String,
    pub result: Result<(ConversionResult, StreamInfo), MarkItUpError>,
}

/// A boxed stream of per-document outcomes.
pub type DocumentStream = Pin<Box<dyn Stream<Item = DocumentOutcome> + Send>>;

/// Convert every input, streaming outcomes as documents finish.
///
/// Progress events go to `batch.progress`: `on_batch_start` fires
/// immediately, `on_batch_complete` once the stream is exhausted.
pub fn convert_stream<I, S>(inputs: I, config: &ConversionConfig, batch: &BatchConfig) -> DocumentStream
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let inputs: Vec<String> = inputs.into_iter().map(Into::into).collect();
    let total = inputs.len();
    info!(
        "Starting batch conversion: {} inputs, concurrency {}",
        total, batch.concurrency
    );
    if let Some(ref cb) = batch.progress {
        cb.on_batch_start(total);
    }

    let succeeded = Arc::new(AtomicUsize::new(0));
    let concurrency = batch.concurrency.max(1);

    let documents = {
        let config = config.clone();
        let batch = batch.clone();
        let succeeded = Arc::clone(&succeeded);
        stream::iter(inputs.into_iter().enumerate().map(move |(index, input)| {
            let config = config.clone();
            let batch = batch.clone();
            let succeeded = Arc::clone(&succeeded);
            async move {
                if let Some(ref cb) = batch.progress {
                    cb.on_document_start(&input);
                }
                let result = convert_input(&input, &config, &batch).await;
                match &result {
                    Ok((converted, _)) => {
                        succeeded.fetch_add(1, Ordering::SeqCst);
                        if let Some(ref cb) = batch.progress {
                            cb.on_document_complete(&input, converted.markdown.len());
                        }
                    }
                    Err(e) => {
                        warn!("Failed to convert {}: {}", input, e);
                        if let Some(ref cb) = batch.progress {
                            cb.on_document_error(&input, &e.to_string());
                        }
                    }
                }
                DocumentOutcome {
                    index,
                    input,
                    result,
                }
            }
        }))
        .buffer_unordered(concurrency)
    };

    let progress = batch.progress.clone();
    let finished = stream::once(async move {
        let ok = succeeded.load(Ordering::SeqCst);
        info!("Batch complete: {}/{} documents converted", ok, total);
        if let Some(cb) = progress {
            cb.on_batch_complete(total, ok);
        }
        None
    });

    Box::pin(
        documents
            .map(Some)
            .chain(finished)
            .filter_map(|outcome| async move { outcome }),
    )
}

/// Convert every input and collect the outcomes in input order.
pub async fn convert_batch<I, S>(
    inputs: I,
    config: &ConversionConfig,
    batch: &BatchConfig,
) -> Vec<DocumentOutcome>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut outcomes: Vec<DocumentOutcome> = convert_stream(inputs, config, batch).collect().await;
    outcomes.sort_by_key(|o| o.index);
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ConversionProgressCallback;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ConversionProgressCallback for Recorder {
        fn on_batch_start(&self, total: usize) {
            self.events.lock().unwrap().push(format!("start {total}"));
        }
        fn on_document_complete(&self, _input: &str, _len: usize) {
            self.events.lock().unwrap().push("ok".into());
        }
        fn on_document_error(&self, _input: &str, _error: &str) {
            self.events.lock().unwrap().push("err".into());
        }
        fn on_batch_complete(&self, total: usize, ok: usize) {
            self.events.lock().unwrap().push(format!("done {ok}/{total}"));
        }
    }

    #[tokio::test]
    async fn batch_keeps_going_after_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.csv");
        std::fs::write(&a, "alpha").unwrap();
        std::fs::write(&b, "x,y\n1,2\n").unwrap();
        let missing = dir.path().join("missing.txt");

        let recorder = Arc::new(Recorder::default());
        let batch = BatchConfig::default().concurrency(2).progress(recorder.clone());
        let inputs = [&a, &missing, &b].map(|p| p.to_string_lossy().into_owned());

        let outcomes = convert_batch(inputs, &ConversionConfig::default(), &batch).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].result.as_ref().unwrap().0.markdown, "alpha\n");
        assert!(matches!(outcomes[1].result, Err(MarkItUpError::FileNotFound { .. })));
        let (csv, info) = outcomes[2].result.as_ref().unwrap();
        assert_eq!(info.mimetype, "text/csv");
        assert!(csv.markdown.starts_with("| x | y |"));

        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(events.first().map(String::as_str), Some("start 3"));
        assert_eq!(events.last().map(String::as_str), Some("done 2/3"));
        assert_eq!(events.iter().filter(|e| *e == "err").count(), 1);
    }

    #[tokio::test]
    async fn empty_batch() {
        let outcomes = convert_batch(Vec::<String>::new(), &ConversionConfig::default(), &BatchConfig::default()).await;
        assert!(outcomes.is_empty());
    }
}
