use std::sync::Arc;

use futures::future::BoxFuture;

use super::Adapter;
use crate::pipeline::Pipeline;
use crate::record::Outcome;
use crate::transport::{
    FetchRequest, FetchResponse, FetchTransport, TransportError, TransportKind, TransportRegistry,
};

/// Promise-call adapter: wraps the registry's fetch slot.
#[derive(Default)]
pub struct FetchAdapter {
    original: Option<Arc<dyn FetchTransport>>,
}

impl FetchAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Adapter for FetchAdapter {
    fn kind(&self) -> TransportKind {
        TransportKind::Fetch
    }

    fn install(&mut self, registry: &TransportRegistry, pipeline: Arc<Pipeline>) {
        if self.original.is_some() {
            return;
        }
        let original = registry.fetch();
        registry.replace_fetch(Arc::new(InstrumentedFetch {
            inner: original.clone(),
            pipeline,
        }));
        self.original = Some(original);
    }

    fn restore(&mut self, registry: &TransportRegistry) {
        if let Some(original) = self.original.take() {
            registry.replace_fetch(original);
        }
    }

    fn is_installed(&self) -> bool {
        self.original.is_some()
    }
}

struct InstrumentedFetch {
    inner: Arc<dyn FetchTransport>,
    pipeline: Arc<Pipeline>,
}

impl FetchTransport for InstrumentedFetch {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'static, Result<FetchResponse, TransportError>> {
        let url = request.target.to_url_string();
        let ticket = self.pipeline.begin(&url, &request.method);
        let call = self.inner.fetch(request);

        let Some(ticket) = ticket else {
            return call;
        };
        let pipeline = self.pipeline.clone();

        // Dropping this future before it resolves drops the ticket: no record.
        Box::pin(async move {
            let result = call.await;
            let outcome = match &result {
                Ok(response) => Outcome::Success {
                    status: response.status,
                },
                Err(err) => Outcome::failure(err.to_string()),
            };
            pipeline.finish(ticket, outcome);
            result
        })
    }
}
