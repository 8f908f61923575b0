//! Transparent latency instrumentation for outbound API calls.
//!
//! Adapters sit in front of four transport shapes (promise-style fetch,
//! XHR-style event objects, node-style callback requests and interceptor
//! chains), time every call, run it through a shared sampling/filter policy
//! and hand accepted [`CallRecord`]s to a fire-and-forget emitter. The host
//! sees exactly the result it would have seen uninstrumented.
//!
//! ```no_run
//! use latency_probe::{install, FetchRequest, ProbeConfig, TransportRegistry, Transports};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let _probe = install(ProbeConfig::default(), Transports::all())?;
//! let response = TransportRegistry::global()
//!     .fetch()
//!     .fetch(FetchRequest::get("http://localhost:3001/api/users"))
//!     .await?;
//! println!("status {}", response.status);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod config;
pub mod controller;
pub mod emitter;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod record;
pub mod transport;

pub use adapters::{Adapter, Transports};
pub use config::{FilterConfig, ProbeConfig};
pub use controller::{install, Instrumentation};
pub use emitter::{HttpEmitter, MemorySink, RecordSink};
pub use error::ProbeError;
pub use filter::FilterPipeline;
pub use pipeline::{CallClock, CallTicket, Pipeline};
pub use record::{extract_endpoint, CallRecord, Outcome, RecordBuilder};
pub use transport::{
    FetchRequest, FetchResponse, FetchTransport, RequestOptions, RequestTarget, TransportError,
    TransportKind, TransportRegistry,
};
