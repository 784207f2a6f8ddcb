//! Debounced writer that coalesces rapid saves into single commits.

use std::time::Duration;

use {
    async_channel::{Receiver, Sender, unbounded},
    tokio::{
        sync::oneshot,
        task::JoinHandle,
        time::{Instant, timeout_at},
    },
    tracing::debug,
};

use crate::{
    config::StoreConfig,
    error::{ErrorReporter, StoreError},
    store::{
        backend::Backend, preference_store::PreferenceStore, snapshot::Snapshot,
        value::PrimitiveValue,
    },
};

/// Configuration for debounced writes.
#[derive(Debug, Clone)]
pub struct DebounceConfig {
    /// Time between the first pending save and its commit.
    pub delay: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(300),
        }
    }
}

impl From<&StoreConfig> for DebounceConfig {
    fn from(config: &StoreConfig) -> Self {
        Self {
            delay: Duration::from_millis(config.debounce_delay_ms),
        }
    }
}

enum WriterCommand {
    Put { key: String, value: PrimitiveValue },
    Flush(oneshot::Sender<Result<(), StoreError>>),
}

/// Coalesces saves and commits them together after a delay.
///
/// Saves submitted within one delay window are committed in a single
/// transaction, keeping only the last value per key and kind. A failed
/// commit keeps its entries pending and is retried after another delay.
pub struct DebouncedWriter {
    /// Sender for queued commands.
    sender: Sender<WriterCommand>,
    /// Processing task.
    task: JoinHandle<()>,
}

impl DebouncedWriter {
    /// Starts a writer on the store's I/O runtime.
    ///
    /// # Arguments
    ///
    /// * `store` - Store the entries are committed to.
    /// * `config` - Debounce timing.
    pub fn spawn<B: Backend>(store: PreferenceStore<B>, config: DebounceConfig) -> Self {
        let (sender, receiver) = unbounded();
        let task = store
            .io_handle()
            .clone()
            .spawn(process_commands(store, receiver, config.delay));

        Self { sender, task }
    }

    /// Queues `value` for `key`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::WriterClosed` if the writer has stopped.
    pub fn submit(
        &self,
        key: impl Into<String>,
        value: impl Into<PrimitiveValue>,
    ) -> Result<(), StoreError> {
        self.sender
            .try_send(WriterCommand::Put {
                key: key.into(),
                value: value.into(),
            })
            .map_err(|_| StoreError::WriterClosed)
    }

    /// Commits everything submitted so far and waits for the commit.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the commit fails or the writer has stopped.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(WriterCommand::Flush(reply))
            .await
            .map_err(|_| StoreError::WriterClosed)?;
        response.await.map_err(|_| StoreError::WriterClosed)?
    }

    /// Flushes pending entries and stops the writer.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the final commit fails.
    pub async fn close(self) -> Result<(), StoreError> {
        let result = self.flush().await;
        self.sender.close();
        self.task.await?;
        result
    }
}

/// Processing loop: collects entries until the deadline, a flush, or shutdown.
async fn process_commands<B: Backend>(
    store: PreferenceStore<B>,
    receiver: Receiver<WriterCommand>,
    delay: Duration,
) {
    let mut pending = Snapshot::new();
    let mut deadline: Option<Instant> = None;

    loop {
        let received = match deadline {
            None => receiver.recv().await.ok(),
            Some(at) => match timeout_at(at, receiver.recv()).await {
                Ok(result) => result.ok(),
                Err(_) => {
                    deadline = commit_pending(&store, &mut pending)
                        .await
                        .err()
                        .map(|_| Instant::now() + delay);
                    continue;
                }
            },
        };

        match received {
            Some(WriterCommand::Put { key, value }) => {
                pending.set(key, value);
                deadline.get_or_insert_with(|| Instant::now() + delay);
            }
            Some(WriterCommand::Flush(reply)) => {
                let result = commit_pending(&store, &mut pending).await;
                // A failed batch is retried after another delay
                deadline = result.is_err().then(|| Instant::now() + delay);
                let _ = reply.send(result);
            }
            None => {
                let _ = commit_pending(&store, &mut pending).await;
                debug!(store = %store.name(), "Debounced writer stopped");
                break;
            }
        }
    }
}

async fn commit_pending<B: Backend>(
    store: &PreferenceStore<B>,
    pending: &mut Snapshot,
) -> Result<(), StoreError> {
    if pending.is_empty() {
        return Ok(());
    }

    let batch = std::mem::take(pending);
    let entries = batch
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()));

    let result = store.save_all(entries).await;
    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            ErrorReporter::detached_write(store.name(), batch.len(), &e);
            *pending = batch;
            Err(e)
        }
    }
}
