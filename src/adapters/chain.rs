use std::sync::Arc;

use super::Adapter;
use crate::pipeline::{CallTicket, Pipeline};
use crate::record::Outcome;
use crate::transport::{
    ChainRequest, ChainResponse, InterceptorId, RequestInterceptor, ResponseInterceptor,
    TransportError, TransportKind, TransportRegistry,
};

/// Interceptor-chain adapter. Nothing is swapped: a request interceptor
/// stashes the call's ticket in the request extensions and a response
/// interceptor settles it. Restore ejects both by id.
#[derive(Default)]
pub struct ChainAdapter {
    registered: Option<(InterceptorId, InterceptorId)>,
}

impl ChainAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Adapter for ChainAdapter {
    fn kind(&self) -> TransportKind {
        TransportKind::InterceptorChain
    }

    fn install(&mut self, registry: &TransportRegistry, pipeline: Arc<Pipeline>) {
        if self.registered.is_some() {
            return;
        }
        let client = registry.interceptor_client();
        let request_id = client.add_request_interceptor(Arc::new(StartTimer {
            pipeline: pipeline.clone(),
        }));
        let response_id = client.add_response_interceptor(Arc::new(StopTimer { pipeline }));
        self.registered = Some((request_id, response_id));
    }

    fn restore(&mut self, registry: &TransportRegistry) {
        if let Some((request_id, response_id)) = self.registered.take() {
            let client = registry.interceptor_client();
            client.eject_request_interceptor(request_id);
            client.eject_response_interceptor(response_id);
        }
    }

    fn is_installed(&self) -> bool {
        self.registered.is_some()
    }
}

struct StartTimer {
    pipeline: Arc<Pipeline>,
}

impl RequestInterceptor for StartTimer {
    fn on_request(&self, request: &mut ChainRequest) -> Result<(), TransportError> {
        if let Some(ticket) = self.pipeline.begin(&request.url, &request.method) {
            request.extensions.insert(ticket);
        }
        Ok(())
    }
}

struct StopTimer {
    pipeline: Arc<Pipeline>,
}

impl ResponseInterceptor for StopTimer {
    fn on_response(
        &self,
        request: &mut ChainRequest,
        response: ChainResponse,
    ) -> Result<ChainResponse, TransportError> {
        if let Some(ticket) = request.extensions.remove::<CallTicket>() {
            self.pipeline.finish(ticket, Outcome::Success {
                status: response.status,
            });
        }
        Ok(response)
    }

    fn on_error(
        &self,
        request: &mut ChainRequest,
        error: TransportError,
    ) -> Result<ChainResponse, TransportError> {
        if let Some(ticket) = request.extensions.remove::<CallTicket>() {
            self.pipeline.finish(ticket, Outcome::failure(error.to_string()));
        }
        Err(error)
    }
}
