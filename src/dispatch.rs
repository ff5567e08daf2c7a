//! Table-driven action dispatch
//!
//! Actions run off the calling path: each dispatch spawns an independent
//! task so a slow handler (media playback) never stalls the capture loop.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::bus::{ActionMessage, MessageBus};
use crate::config::{ActionConfig, ActionKind};

/// A side effect bound to an action identifier
#[async_trait::async_trait]
pub trait ActionHandler: Send + Sync {
    async fn run(&self) -> Result<()>;
}

/// Maps action identifiers to handlers and runs them as background tasks
pub struct ActionDispatcher {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
    tasks: Mutex<JoinSet<()>>,
}

impl ActionDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Build the dispatch table from the `[[actions]]` config entries
    ///
    /// Bus-forwarding actions are skipped when no bus is wired in.
    pub fn from_config(actions: &[ActionConfig], bus: Option<Arc<dyn MessageBus>>) -> Self {
        let mut dispatcher = Self::new();

        for action in actions {
            match action.kind {
                ActionKind::Media => {
                    dispatcher.register(
                        &action.id,
                        Arc::new(MediaHandler {
                            path: action.target.clone(),
                        }),
                    );
                }
                ActionKind::File => {
                    dispatcher.register(
                        &action.id,
                        Arc::new(FileHandler {
                            path: action.target.clone(),
                        }),
                    );
                }
                ActionKind::Bus => match &bus {
                    Some(bus) => {
                        dispatcher.register(
                            &action.id,
                            Arc::new(BusForwardHandler {
                                bus: Arc::clone(bus),
                                topic: action.target.clone(),
                                action: action.id.clone(),
                            }),
                        );
                    }
                    None => {
                        warn!(
                            "Action '{}' forwards to the bus but no bus is connected; skipping",
                            action.id
                        );
                    }
                },
            }
        }

        dispatcher
    }

    pub fn register(&mut self, id: &str, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(id.to_string(), handler);
    }

    /// Fire-and-forget execution of an action
    ///
    /// Unknown ids are logged and ignored; the routing pipeline must not
    /// fail merely because an action mapping is missing.
    pub async fn dispatch(&self, action_id: &str) {
        let Some(handler) = self.handlers.get(action_id) else {
            warn!("No handler registered for action '{}', ignoring", action_id);
            return;
        };

        info!("Dispatching action '{}'", action_id);

        let handler = Arc::clone(handler);
        let id = action_id.to_string();

        let mut tasks = self.tasks.lock().await;
        // Reap tasks that already finished so the set does not grow unbounded
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            if let Err(e) = handler.run().await {
                error!("Action '{}' failed: {:#}", id, e);
            }
        });
    }

    /// Wait for in-flight action tasks, aborting any still running after the
    /// grace period
    pub async fn shutdown(&self, grace: Duration) {
        let mut tasks = self.tasks.lock().await;
        if tasks.is_empty() {
            return;
        }

        info!("Waiting up to {:?} for in-flight actions", grace);
        let drained = tokio::time::timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!("Grace period elapsed, aborting {} action task(s)", tasks.len());
            tasks.abort_all();
        }
    }
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Plays a media file with the local player
struct MediaHandler {
    path: String,
}

#[async_trait::async_trait]
impl ActionHandler for MediaHandler {
    async fn run(&self) -> Result<()> {
        let status = tokio::process::Command::new("ffplay")
            .arg("-autoexit")
            .arg(&self.path)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
            .with_context(|| format!("failed to launch player for {}", self.path))?;

        if !status.success() {
            anyhow::bail!("player exited with status {} for {}", status, self.path);
        }
        Ok(())
    }
}

/// Opens a local file with the platform opener
struct FileHandler {
    path: String,
}

#[async_trait::async_trait]
impl ActionHandler for FileHandler {
    async fn run(&self) -> Result<()> {
        let opener = if cfg!(target_os = "macos") {
            "open"
        } else {
            "xdg-open"
        };

        tokio::process::Command::new(opener)
            .arg(&self.path)
            .status()
            .await
            .with_context(|| format!("failed to open {}", self.path))?;
        Ok(())
    }
}

/// Forwards the action id over the pub/sub bus
struct BusForwardHandler {
    bus: Arc<dyn MessageBus>,
    topic: String,
    action: String,
}

#[async_trait::async_trait]
impl ActionHandler for BusForwardHandler {
    async fn run(&self) -> Result<()> {
        let message = ActionMessage {
            action: self.action.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        self.bus
            .publish(&self.topic, serde_json::to_vec(&message)?)
            .await
            .with_context(|| format!("failed to forward action '{}' to {}", self.action, self.topic))
    }
}
