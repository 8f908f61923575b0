//! One adapter per transport shape. Each translates its transport's
//! completion mechanism into an [`Outcome`](crate::record::Outcome) for the
//! shared [`Pipeline`], and leaves the host-visible result untouched.

pub mod chain;
pub mod event_object;
pub mod fetch;
pub mod socket;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::pipeline::Pipeline;
use crate::transport::{TransportKind, TransportRegistry};

pub use chain::ChainAdapter;
pub use event_object::EventObjectAdapter;
pub use fetch::FetchAdapter;
pub use socket::SocketAdapter;

/// Install/restore lifecycle shared by all four adapters.
///
/// `install` snapshots the registry's current entry point before patching
/// it; `restore` puts that exact value back. Both are idempotent.
pub trait Adapter: Send {
    fn kind(&self) -> TransportKind;
    fn install(&mut self, registry: &TransportRegistry, pipeline: Arc<Pipeline>);
    fn restore(&mut self, registry: &TransportRegistry);
    fn is_installed(&self) -> bool;
}

/// Which transports an installation covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transports {
    pub fetch: bool,
    pub socket_requests: bool,
    pub event_objects: bool,
    pub interceptor_chain: bool,
}

impl Transports {
    pub fn all() -> Self {
        Self {
            fetch: true,
            socket_requests: true,
            event_objects: true,
            interceptor_chain: true,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::none()
    }

    /// Fresh, not-yet-installed adapters for the selected transports.
    pub fn adapters(&self) -> Vec<Box<dyn Adapter>> {
        let mut adapters: Vec<Box<dyn Adapter>> = Vec::new();
        if self.fetch {
            adapters.push(Box::new(FetchAdapter::new()));
        }
        if self.socket_requests {
            adapters.push(Box::new(SocketAdapter::new()));
        }
        if self.event_objects {
            adapters.push(Box::new(EventObjectAdapter::new()));
        }
        if self.interceptor_chain {
            adapters.push(Box::new(ChainAdapter::new()));
        }
        adapters
    }
}
