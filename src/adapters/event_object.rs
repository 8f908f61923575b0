use std::sync::Arc;

use http::Method;
use parking_lot::Mutex;

use super::Adapter;
use crate::pipeline::{CallClock, CallTicket, Pipeline};
use crate::record::Outcome;
use crate::transport::{
    ErrorHandler, EventObject, EventObjectFactory, EventResponse, LoadHandler, TransportError,
    TransportKind, TransportRegistry,
};

/// Event-based-object adapter: swaps the registry's object factory for one
/// that hands out measuring wrappers.
#[derive(Default)]
pub struct EventObjectAdapter {
    original: Option<Arc<dyn EventObjectFactory>>,
}

impl EventObjectAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Adapter for EventObjectAdapter {
    fn kind(&self) -> TransportKind {
        TransportKind::EventObject
    }

    fn install(&mut self, registry: &TransportRegistry, pipeline: Arc<Pipeline>) {
        if self.original.is_some() {
            return;
        }
        let original = registry.event_objects();
        registry.replace_event_objects(Arc::new(InstrumentedFactory {
            inner: original.clone(),
            pipeline,
        }));
        self.original = Some(original);
    }

    fn restore(&mut self, registry: &TransportRegistry) {
        if let Some(original) = self.original.take() {
            registry.replace_event_objects(original);
        }
    }

    fn is_installed(&self) -> bool {
        self.original.is_some()
    }
}

struct InstrumentedFactory {
    inner: Arc<dyn EventObjectFactory>,
    pipeline: Arc<Pipeline>,
}

impl EventObjectFactory for InstrumentedFactory {
    fn create(&self) -> Box<dyn EventObject> {
        let clock = CallClock::now();
        Box::new(InstrumentedEventObject {
            inner: self.inner.create(),
            pipeline: self.pipeline.clone(),
            clock: Some(clock),
            in_flight: false,
            request: None,
            ticket: Arc::new(Mutex::new(None)),
            onload: Arc::new(Mutex::new(None)),
            onerror: Arc::new(Mutex::new(None)),
        })
    }
}

/// Host handlers live in shared slots so they can be (re)assigned at any
/// point, including after `send`, without losing the measurement hook that
/// sits in front of them on the inner object.
struct InstrumentedEventObject {
    inner: Box<dyn EventObject>,
    pipeline: Arc<Pipeline>,
    /// Construction-time start, consumed by the first accepted send.
    clock: Option<CallClock>,
    /// A send was accepted and has not been aborted. Further sends go
    /// straight to the inner object.
    in_flight: bool,
    request: Option<(Method, String)>,
    ticket: Arc<Mutex<Option<CallTicket>>>,
    onload: Arc<Mutex<Option<LoadHandler>>>,
    onerror: Arc<Mutex<Option<ErrorHandler>>>,
}

impl InstrumentedEventObject {
    fn settle(ticket: &Mutex<Option<CallTicket>>, pipeline: &Pipeline, outcome: Outcome) {
        let taken = ticket.lock().take();
        if let Some(ticket) = taken {
            pipeline.finish(ticket, outcome);
        }
    }

    /// Put the measuring hooks in the inner object's slots. They settle the
    /// shared ticket, then forward to whatever host handler is set by then.
    fn arm_handlers(&mut self) {
        let (ticket, pipeline, host) = (self.ticket.clone(), self.pipeline.clone(), self.onload.clone());
        self.inner.set_onload(Some(Box::new(move |response: &EventResponse| {
            Self::settle(&ticket, &pipeline, Outcome::Success {
                status: response.status,
            });
            if let Some(handler) = host.lock().as_mut() {
                handler(response);
            }
        })));

        let (ticket, pipeline, host) = (self.ticket.clone(), self.pipeline.clone(), self.onerror.clone());
        self.inner.set_onerror(Some(Box::new(move |err: &TransportError| {
            Self::settle(&ticket, &pipeline, Outcome::failure(err.to_string()));
            if let Some(handler) = host.lock().as_mut() {
                handler(err);
            }
        })));
    }
}

impl EventObject for InstrumentedEventObject {
    fn open(&mut self, method: Method, url: &str) {
        self.request = Some((method.clone(), url.to_string()));
        self.inner.open(method, url);
    }

    fn send(&mut self, body: Option<Vec<u8>>) -> Result<(), TransportError> {
        if self.in_flight {
            // The ticket belongs to the call already running.
            return self.inner.send(body);
        }

        let clock = self.clock.take().unwrap_or_else(CallClock::now);
        let ticket = match &self.request {
            Some((method, url)) => self.pipeline.begin_at(url, method, clock),
            None => None,
        };
        self.arm_handlers();
        *self.ticket.lock() = ticket;

        let sent = self.inner.send(body);
        match &sent {
            Ok(()) => self.in_flight = true,
            Err(_) => {
                // Rejected before reaching the network: not a call attempt.
                self.ticket.lock().take();
                self.clock = Some(clock);
            }
        }
        sent
    }

    fn set_onload(&mut self, handler: Option<LoadHandler>) {
        *self.onload.lock() = handler;
    }

    fn set_onerror(&mut self, handler: Option<ErrorHandler>) {
        *self.onerror.lock() = handler;
    }

    fn abort(&mut self) {
        self.ticket.lock().take();
        self.in_flight = false;
        self.inner.abort();
    }
}
