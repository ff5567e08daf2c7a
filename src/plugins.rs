//! Plugin discovery and bus registration
//!
//! A plugin is a `Registrar`: a unit that subscribes one or more bus topics
//! and attaches a callback. Discovery enumerates a static built-in table
//! plus operator-declared subscription units from config, so the handler
//! set can grow without recompiling the core.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::bus::MessageBus;
use crate::config::PluginsConfig;
use crate::dispatch::ActionDispatcher;

/// A (plugin, topic) subscription that lives for the process lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRegistration {
    pub plugin: String,
    pub topic: String,
}

/// A loadable unit exposing a single capability: subscribe to the bus
#[async_trait::async_trait]
pub trait Registrar: Send + Sync {
    fn name(&self) -> &str;

    /// Subscribe topics and attach the plugin's callback
    async fn register(&self, bus: &dyn MessageBus) -> Result<Vec<PluginRegistration>>;
}

/// Outcome of registering a set of plugins
#[derive(Debug, Default)]
pub struct RegistrationReport {
    pub registered: Vec<PluginRegistration>,
    /// (plugin name, error) per isolated failure
    pub failures: Vec<(String, String)>,
}

pub struct PluginRegistry;

impl PluginRegistry {
    /// Enumerate the built-in plugin table plus config-declared units
    pub fn discover(
        cfg: &PluginsConfig,
        dispatcher: Option<Arc<ActionDispatcher>>,
    ) -> Vec<Box<dyn Registrar>> {
        let mut registrars: Vec<Box<dyn Registrar>> = vec![Box::new(VibeShiftPlugin)];

        for sub in &cfg.subscriptions {
            registrars.push(Box::new(ForwardingPlugin {
                name: sub.plugin.clone(),
                topic: sub.topic.clone(),
                action: sub.action.clone(),
                dispatcher: dispatcher.clone(),
            }));
        }

        registrars
    }

    /// Register every plugin, isolating failures per plugin
    ///
    /// One broken plugin never prevents the rest from registering; each
    /// failure is reported individually. Zero plugins is valid.
    pub async fn register_all(
        bus: &dyn MessageBus,
        registrars: &[Box<dyn Registrar>],
    ) -> RegistrationReport {
        let mut report = RegistrationReport::default();

        if registrars.is_empty() {
            info!("No plugins to register");
            return report;
        }

        for registrar in registrars {
            match registrar.register(bus).await {
                Ok(registrations) => {
                    for r in &registrations {
                        info!("Plugin '{}' subscribed to {}", r.plugin, r.topic);
                    }
                    report.registered.extend(registrations);
                }
                Err(e) => {
                    error!("Plugin '{}' failed to register: {:#}", registrar.name(), e);
                    report.failures.push((registrar.name().to_string(), format!("{e:#}")));
                }
            }
        }

        info!(
            "Plugin registration complete: {} subscription(s), {} failure(s)",
            report.registered.len(),
            report.failures.len()
        );

        report
    }
}

/// Built-in effector plugin for ambience changes
///
/// Listens for vibe-shift intents and applies the requested lights and
/// sound settings.
pub struct VibeShiftPlugin;

const VIBE_SHIFT_TOPIC: &str = "external.intents.vibe_shift";

#[async_trait::async_trait]
impl Registrar for VibeShiftPlugin {
    fn name(&self) -> &str {
        "vibe_shift"
    }

    async fn register(&self, bus: &dyn MessageBus) -> Result<Vec<PluginRegistration>> {
        let mut rx = bus.subscribe(VIBE_SHIFT_TOPIC).await?;

        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match serde_json::from_slice::<serde_json::Value>(&msg.payload) {
                    Ok(data) => {
                        info!(
                            "Shifting vibe: {} / lights: {} / sound: {}",
                            data.get("vibe").and_then(|v| v.as_str()).unwrap_or("?"),
                            data.get("lights").and_then(|v| v.as_str()).unwrap_or("?"),
                            data.get("sound").and_then(|v| v.as_str()).unwrap_or("?"),
                        );
                    }
                    Err(e) => warn!("Ignoring malformed vibe-shift payload: {}", e),
                }
            }
        });

        Ok(vec![PluginRegistration {
            plugin: self.name().to_string(),
            topic: VIBE_SHIFT_TOPIC.to_string(),
        }])
    }
}

/// Config-declared plugin: forwards inbound messages to an action, or logs
/// them when no action is configured
struct ForwardingPlugin {
    name: String,
    topic: String,
    action: Option<String>,
    dispatcher: Option<Arc<ActionDispatcher>>,
}

#[async_trait::async_trait]
impl Registrar for ForwardingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn register(&self, bus: &dyn MessageBus) -> Result<Vec<PluginRegistration>> {
        let mut rx = bus.subscribe(&self.topic).await?;

        let name = self.name.clone();
        let action = self.action.clone();
        let dispatcher = self.dispatcher.clone();

        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match (&action, &dispatcher) {
                    (Some(action), Some(dispatcher)) => {
                        // dispatch() spawns the handler, so delivery stays prompt
                        dispatcher.dispatch(action).await;
                    }
                    _ => {
                        info!(
                            "[{}] Received on {}: {}",
                            name,
                            msg.topic,
                            String::from_utf8_lossy(&msg.payload)
                        );
                    }
                }
            }
        });

        Ok(vec![PluginRegistration {
            plugin: self.name.clone(),
            topic: self.topic.clone(),
        }])
    }
}
