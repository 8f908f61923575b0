use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use http::Method;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ProbeConfig;
use crate::emitter::RecordSink;
use crate::error::Result;
use crate::filter::FilterPipeline;
use crate::record::{Outcome, RecordBuilder};

/// Start-of-call clock readings. Read once; latency is always measured
/// against this same `Instant`.
#[derive(Debug, Clone, Copy)]
pub struct CallClock {
    started: Instant,
    wall: DateTime<Utc>,
}

impl CallClock {
    pub fn now() -> Self {
        Self {
            started: Instant::now(),
            wall: Utc::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    pub fn wall(&self) -> DateTime<Utc> {
        self.wall
    }
}

/// Per-call identity for a call that passed the admission filter.
///
/// Consumed by [`Pipeline::finish`], which is what keeps a call from
/// producing two records.
#[derive(Debug, Clone)]
pub struct CallTicket {
    pub id: String,
    pub url: String,
    pub method: Method,
    clock: CallClock,
}

/// The shared filter → build → emit chain every adapter funnels into.
/// One instance per installation.
pub struct Pipeline {
    filter: FilterPipeline,
    builder: RecordBuilder,
    sink: Arc<dyn RecordSink>,
    log: bool,
}

impl Pipeline {
    pub fn new(config: &ProbeConfig, sink: Arc<dyn RecordSink>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            filter: FilterPipeline::new(&config.filter)?,
            builder: RecordBuilder::new(config.filter.min_latency_threshold_ms),
            sink,
            log: config.enable_logging,
        })
    }

    /// Start measuring a call now. `None` means the call was sampled out or
    /// filtered out and nothing more will happen for it.
    pub fn begin(&self, url: &str, method: &Method) -> Option<CallTicket> {
        self.begin_at(url, method, CallClock::now())
    }

    /// Like [`begin`](Self::begin) but with a clock captured earlier, for
    /// transports whose URL is only known after the call object exists.
    pub fn begin_at(&self, url: &str, method: &Method, clock: CallClock) -> Option<CallTicket> {
        let admitted = catch_unwind(AssertUnwindSafe(|| self.filter.decide(url))).unwrap_or(false);
        if !admitted {
            return None;
        }
        Some(CallTicket {
            id: Uuid::new_v4().to_string(),
            url: url.to_string(),
            method: method.clone(),
            clock,
        })
    }

    /// Close out an admitted call. Applies the latency threshold and hands
    /// the record to the sink; any panic in here is contained.
    pub fn finish(&self, ticket: CallTicket, outcome: Outcome) {
        let latency_ms = ticket.clock.elapsed_ms();

        let result = catch_unwind(AssertUnwindSafe(|| {
            let record = self.builder.build(
                &ticket.id,
                &ticket.url,
                ticket.method.as_str(),
                latency_ms,
                outcome,
                ticket.clock.wall(),
            );
            match record {
                Some(record) => {
                    if self.log {
                        debug!(
                            id = %record.id,
                            endpoint = %record.endpoint,
                            status = record.status_code,
                            latency_ms = record.latency,
                            "emitting call record"
                        );
                    }
                    self.sink.emit(record);
                }
                None => {
                    if self.log {
                        debug!(id = %ticket.id, latency_ms, "call below latency threshold");
                    }
                }
            }
        }));

        if result.is_err() && self.log {
            warn!(id = %ticket.id, "instrumentation failed; call record skipped");
        }
    }
}
