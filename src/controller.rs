use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::adapters::{Adapter, Transports};
use crate::config::ProbeConfig;
use crate::emitter::{HttpEmitter, RecordSink};
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::transport::{TransportKind, TransportRegistry};

/// Owns one installation of the probe on a registry.
///
/// Installing claims the registry exclusively; restoring (explicitly or on
/// drop) returns every patched entry point to the value captured at install.
pub struct Instrumentation {
    registry: Arc<TransportRegistry>,
    config: ProbeConfig,
    sink: Arc<dyn RecordSink>,
    token: Uuid,
    adapters: Vec<Box<dyn Adapter>>,
}

impl Instrumentation {
    /// Records are posted to the collector at `config.agent_url`.
    pub fn new(registry: Arc<TransportRegistry>, config: ProbeConfig) -> Result<Self> {
        config.validate()?;
        let sink = Arc::new(HttpEmitter::new(&config)?);
        Self::with_sink(registry, config, sink)
    }

    /// Records go to `sink` instead of the HTTP collector.
    pub fn with_sink(
        registry: Arc<TransportRegistry>,
        config: ProbeConfig,
        sink: Arc<dyn RecordSink>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            config,
            sink,
            token: Uuid::new_v4(),
            adapters: Vec::new(),
        })
    }

    /// Patch the selected transports.
    ///
    /// A second call while installed is a no-op: adapters never stack. Fails
    /// with [`ProbeError::RegistryBusy`](crate::ProbeError::RegistryBusy) if
    /// another controller holds the registry.
    pub fn install(&mut self, which: Transports) -> Result<()> {
        if self.is_installed() {
            debug!("instrumentation already installed; ignoring install");
            return Ok(());
        }
        if which.is_empty() {
            return Ok(());
        }

        // Fresh pipeline per installation; nothing carries over from a
        // previous install/restore cycle.
        let pipeline = Arc::new(Pipeline::new(&self.config, self.sink.clone())?);
        self.registry.acquire(self.token)?;

        let mut adapters = which.adapters();
        for adapter in adapters.iter_mut() {
            adapter.install(&self.registry, pipeline.clone());
            debug!(transport = ?adapter.kind(), "adapter installed");
        }
        self.adapters = adapters;
        Ok(())
    }

    /// Put back every original entry point and release the registry.
    /// Safe to call when nothing is installed.
    pub fn restore(&mut self) {
        if self.adapters.is_empty() {
            return;
        }
        for mut adapter in self.adapters.drain(..).rev() {
            adapter.restore(&self.registry);
            debug!(transport = ?adapter.kind(), "adapter restored");
        }
        self.registry.release(self.token);
    }

    pub fn is_installed(&self) -> bool {
        !self.adapters.is_empty()
    }

    pub fn installed_kinds(&self) -> Vec<TransportKind> {
        self.adapters
            .iter()
            .filter(|a| a.is_installed())
            .map(|a| a.kind())
            .collect()
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TransportRegistry> {
        &self.registry
    }
}

impl Drop for Instrumentation {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Install on the process-wide registry, posting records to the collector.
/// Keep the returned guard alive for as long as calls should be measured.
pub fn install(config: ProbeConfig, which: Transports) -> Result<Instrumentation> {
    let mut instrumentation = Instrumentation::new(TransportRegistry::global(), config)?;
    instrumentation.install(which)?;
    Ok(instrumentation)
}
