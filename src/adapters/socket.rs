use std::sync::Arc;

use parking_lot::Mutex;

use super::Adapter;
use crate::pipeline::{CallTicket, Pipeline};
use crate::record::Outcome;
use crate::transport::{
    ClientRequest, RequestErrorListener, RequestOptions, ResponseCallback, SocketRequestApi,
    SocketResponse, TransportError, TransportKind, TransportRegistry,
};

/// Callback-socket adapter: wraps the registry's request API.
#[derive(Default)]
pub struct SocketAdapter {
    original: Option<Arc<dyn SocketRequestApi>>,
}

impl SocketAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Adapter for SocketAdapter {
    fn kind(&self) -> TransportKind {
        TransportKind::SocketRequest
    }

    fn install(&mut self, registry: &TransportRegistry, pipeline: Arc<Pipeline>) {
        if self.original.is_some() {
            return;
        }
        let original = registry.socket_requests();
        registry.replace_socket_requests(Arc::new(InstrumentedSocketApi {
            inner: original.clone(),
            pipeline,
        }));
        self.original = Some(original);
    }

    fn restore(&mut self, registry: &TransportRegistry) {
        if let Some(original) = self.original.take() {
            registry.replace_socket_requests(original);
        }
    }

    fn is_installed(&self) -> bool {
        self.original.is_some()
    }
}

struct InstrumentedSocketApi {
    inner: Arc<dyn SocketRequestApi>,
    pipeline: Arc<Pipeline>,
}

/// The completion callback and the error listener race for one ticket;
/// whichever takes it first settles the call.
type SharedTicket = Arc<Mutex<Option<CallTicket>>>;

fn settle(ticket: &SharedTicket, pipeline: &Pipeline, outcome: Outcome) {
    let taken = ticket.lock().take();
    if let Some(ticket) = taken {
        pipeline.finish(ticket, outcome);
    }
}

impl SocketRequestApi for InstrumentedSocketApi {
    fn request(&self, options: RequestOptions, callback: ResponseCallback) -> Box<dyn ClientRequest> {
        let url = options.to_url_string();
        let ticket: SharedTicket = Arc::new(Mutex::new(self.pipeline.begin(&url, &options.method)));

        let (on_done, pipeline) = (ticket.clone(), self.pipeline.clone());
        let wrapped: ResponseCallback = Box::new(move |response: SocketResponse| {
            settle(&on_done, &pipeline, Outcome::Success {
                status: response.status,
            });
            callback(response);
        });

        let mut inner = self.inner.request(options, wrapped);

        let (on_fail, pipeline) = (ticket.clone(), self.pipeline.clone());
        inner.on_error(Box::new(move |err: &TransportError| {
            settle(&on_fail, &pipeline, Outcome::failure(err.to_string()));
        }));

        Box::new(InstrumentedClientRequest { inner, ticket })
    }
}

struct InstrumentedClientRequest {
    inner: Box<dyn ClientRequest>,
    ticket: SharedTicket,
}

impl ClientRequest for InstrumentedClientRequest {
    fn on_error(&mut self, listener: RequestErrorListener) {
        self.inner.on_error(listener);
    }

    fn abort(&mut self) {
        self.ticket.lock().take();
        self.inner.abort();
    }
}
