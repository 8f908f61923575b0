use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::config::ProbeConfig;
use crate::error::Result;
use crate::record::CallRecord;

/// Upper bound on a single delivery attempt; keeps dead collectors from
/// piling up tasks.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Destination for accepted records.
///
/// `emit` is called on the instrumented call's completion path, so it must
/// return promptly and must not fail outward.
pub trait RecordSink: Send + Sync {
    fn emit(&self, record: CallRecord);
}

// ─── HTTP collector delivery ─────────────────────────────────────

/// Posts each record to `<agentUrl>/api/calls` on a detached task.
///
/// Uses its own client, separate from every instrumented transport, so
/// delivery traffic is never itself measured.
pub struct HttpEmitter {
    client: reqwest::Client,
    endpoint: String,
    log: bool,
}

impl HttpEmitter {
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &ProbeConfig) -> Self {
        Self {
            client,
            endpoint: config.calls_endpoint(),
            log: config.enable_logging,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl RecordSink for HttpEmitter {
    fn emit(&self, record: CallRecord) {
        let Ok(handle) = Handle::try_current() else {
            if self.log {
                warn!(id = %record.id, "no async runtime; dropping call record");
            }
            return;
        };

        let request = self.client.post(&self.endpoint).json(&record);
        let log = self.log;
        let id = record.id;

        // One best-effort attempt; the task owns its own error boundary.
        handle.spawn(async move {
            match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    if log {
                        debug!(%id, status = %resp.status(), "call record delivered");
                    }
                }
                Ok(resp) => {
                    if log {
                        warn!(%id, status = %resp.status(), "collector rejected call record");
                    }
                }
                Err(err) => {
                    if log {
                        warn!(%id, error = %err, "failed to deliver call record");
                    }
                }
            }
        });
    }
}

// ─── In-memory sink ──────────────────────────────────────────────

/// Collects records in memory. Handy for tests and for embedding the probe
/// in a process that ships records some other way.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<CallRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<CallRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Drain everything collected so far.
    pub fn take(&self) -> Vec<CallRecord> {
        std::mem::take(&mut *self.records.lock())
    }
}

impl RecordSink for MemorySink {
    fn emit(&self, record: CallRecord) {
        self.records.lock().push(record);
    }
}
