use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use super::chain::InterceptorClient;
use super::event_object::{EventObjectFactory, HttpEventObjectFactory};
use super::fetch::{FetchTransport, ReqwestFetch};
use super::socket::{ReqwestSocketApi, SocketRequestApi};
use crate::error::{ProbeError, Result};

static GLOBAL: Lazy<Arc<TransportRegistry>> =
    Lazy::new(|| Arc::new(TransportRegistry::builder().build()));

/// Process-wide entry points for outbound calls.
///
/// Host code fetches the current transport from here for every call, which
/// is what lets an installed adapter sit in front of it. The interceptor
/// client is never replaced; adapters hook into its chain instead.
pub struct TransportRegistry {
    fetch: RwLock<Arc<dyn FetchTransport>>,
    socket_requests: RwLock<Arc<dyn SocketRequestApi>>,
    event_objects: RwLock<Arc<dyn EventObjectFactory>>,
    interceptor_client: Arc<InterceptorClient>,
    owner: Mutex<Option<Uuid>>,
}

impl TransportRegistry {
    /// The shared instance used by [`crate::install`].
    pub fn global() -> Arc<TransportRegistry> {
        GLOBAL.clone()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn fetch(&self) -> Arc<dyn FetchTransport> {
        self.fetch.read().clone()
    }

    pub fn socket_requests(&self) -> Arc<dyn SocketRequestApi> {
        self.socket_requests.read().clone()
    }

    pub fn event_objects(&self) -> Arc<dyn EventObjectFactory> {
        self.event_objects.read().clone()
    }

    pub fn interceptor_client(&self) -> Arc<InterceptorClient> {
        self.interceptor_client.clone()
    }

    // ── Slot mutation (controller only) ─────────────────────────

    /// Replace the fetch slot, returning what was there.
    pub(crate) fn replace_fetch(&self, next: Arc<dyn FetchTransport>) -> Arc<dyn FetchTransport> {
        std::mem::replace(&mut *self.fetch.write(), next)
    }

    pub(crate) fn replace_socket_requests(
        &self,
        next: Arc<dyn SocketRequestApi>,
    ) -> Arc<dyn SocketRequestApi> {
        std::mem::replace(&mut *self.socket_requests.write(), next)
    }

    pub(crate) fn replace_event_objects(
        &self,
        next: Arc<dyn EventObjectFactory>,
    ) -> Arc<dyn EventObjectFactory> {
        std::mem::replace(&mut *self.event_objects.write(), next)
    }

    // ── Ownership ───────────────────────────────────────────────

    /// Claim the registry for one controller. Re-acquiring with the same
    /// token succeeds; a different token fails while the claim is held.
    pub(crate) fn acquire(&self, token: Uuid) -> Result<()> {
        let mut owner = self.owner.lock();
        match *owner {
            Some(existing) if existing != token => Err(ProbeError::RegistryBusy),
            _ => {
                *owner = Some(token);
                Ok(())
            }
        }
    }

    pub(crate) fn release(&self, token: Uuid) {
        let mut owner = self.owner.lock();
        if *owner == Some(token) {
            *owner = None;
        }
    }

    pub fn is_instrumented(&self) -> bool {
        self.owner.lock().is_some()
    }
}

/// Assembles a registry; unset slots get reqwest-backed defaults sharing
/// one client.
#[derive(Default)]
pub struct RegistryBuilder {
    client: Option<reqwest::Client>,
    fetch: Option<Arc<dyn FetchTransport>>,
    socket_requests: Option<Arc<dyn SocketRequestApi>>,
    event_objects: Option<Arc<dyn EventObjectFactory>>,
    interceptor_client: Option<Arc<InterceptorClient>>,
}

impl RegistryBuilder {
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn fetch(mut self, fetch: Arc<dyn FetchTransport>) -> Self {
        self.fetch = Some(fetch);
        self
    }

    pub fn socket_requests(mut self, api: Arc<dyn SocketRequestApi>) -> Self {
        self.socket_requests = Some(api);
        self
    }

    pub fn event_objects(mut self, factory: Arc<dyn EventObjectFactory>) -> Self {
        self.event_objects = Some(factory);
        self
    }

    pub fn interceptor_client(mut self, client: Arc<InterceptorClient>) -> Self {
        self.interceptor_client = Some(client);
        self
    }

    pub fn build(self) -> TransportRegistry {
        let client = self.client.unwrap_or_default();
        let fetch = self
            .fetch
            .unwrap_or_else(|| Arc::new(ReqwestFetch::new(client.clone())));

        // The chain client keeps the fetch it was built with, not the live
        // slot, so one call is never measured by two adapters.
        let interceptor_client = self
            .interceptor_client
            .unwrap_or_else(|| Arc::new(InterceptorClient::new(fetch.clone())));

        TransportRegistry {
            socket_requests: RwLock::new(
                self.socket_requests
                    .unwrap_or_else(|| Arc::new(ReqwestSocketApi::new(client.clone()))),
            ),
            event_objects: RwLock::new(
                self.event_objects
                    .unwrap_or_else(|| Arc::new(HttpEventObjectFactory::new(client))),
            ),
            fetch: RwLock::new(fetch),
            interceptor_client,
            owner: Mutex::new(None),
        }
    }
}
