//! Entry point for embedding: start one server at a time in send, receive,
//! or clipboard mode and stop it again.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use axum::Router;

use crate::clipboard::{ClipboardBackend, ClipboardRelay};
use crate::common::{AppConfig, SharedEventSink};
use crate::receive::ReceiveAppState;
use crate::send::session::{SessionInfo, SessionPolicy, SessionState};
use crate::send::SendAppState;
use crate::server::routes;
use crate::server::shutdown::{ShutdownCoordinator, ShutdownReason, Termination};
use crate::transport::local::{bind_available, get_local_ip, start_local_server, BindScope};

/// Handle to a server that is accepting connections.
pub struct RunningServer {
    pub url: String,
    pub port: u16,
    /// Set in send mode
    pub session: Option<SessionInfo>,
    coordinator: Arc<ShutdownCoordinator>,
}

impl RunningServer {
    pub fn coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.coordinator
    }

    /// Resolves once the server has fully stopped, whatever stopped it.
    pub async fn wait(&self) -> Termination {
        self.coordinator.wait().await
    }

    /// Request an explicit stop and wait for it to finish.
    pub async fn stop(&self) -> Termination {
        self.coordinator.trigger(ShutdownReason::Explicit).await;
        self.coordinator.wait().await
    }
}

pub struct ServerHost {
    config: AppConfig,
    events: SharedEventSink,
    scope: BindScope,
    session: SessionState,
    clipboard: ClipboardRelay,
    active: Mutex<Option<Arc<ShutdownCoordinator>>>,
}

impl ServerHost {
    pub fn new(
        config: AppConfig,
        events: SharedEventSink,
        clipboard_backend: Arc<dyn ClipboardBackend>,
    ) -> Self {
        let clipboard = ClipboardRelay::new(
            clipboard_backend,
            config.clipboard.history_capacity,
            events.clone(),
        );
        Self {
            config,
            events,
            scope: BindScope::AllInterfaces,
            session: SessionState::new(),
            clipboard,
            active: Mutex::new(None),
        }
    }

    /// Listen on loopback only instead of every interface.
    pub fn with_scope(mut self, scope: BindScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn clipboard(&self) -> &ClipboardRelay {
        &self.clipboard
    }

    fn active(&self) -> MutexGuard<'_, Option<Arc<ShutdownCoordinator>>> {
        match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Server host lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Share `paths` for download.
    pub async fn start_send(
        &self,
        paths: Vec<PathBuf>,
        policy: SessionPolicy,
    ) -> Result<RunningServer> {
        self.stop().await;

        let info = self
            .session
            .start(paths, policy)
            .await
            .context("Failed to prepare share")?;

        let handle = axum_server::Handle::new();
        let coordinator = ShutdownCoordinator::new(
            handle.clone(),
            Some((self.session.clone(), info.id)),
            self.config.drain_timeout(),
            self.events.clone(),
        );
        let state = SendAppState {
            session: self.session.clone(),
            shutdown: coordinator.clone(),
            events: self.events.clone(),
            grace_delay: self.config.grace_delay(),
        };
        let app = routes::create_send_router(&state, &self.clipboard);

        let mut running = match self.launch(app, handle, coordinator.clone()) {
            Ok(running) => running,
            Err(err) => {
                self.session.stop_session(info.id);
                return Err(err);
            }
        };

        if let Some(expiry) = info.expiry {
            coordinator.arm_expiry(expiry);
        }
        running.session = Some(info);
        Ok(running)
    }

    /// Accept browser uploads into an existing directory.
    pub async fn start_receive(&self, save_dir: PathBuf) -> Result<RunningServer> {
        self.stop().await;

        let metadata = tokio::fs::metadata(&save_dir)
            .await
            .with_context(|| format!("Save directory {} does not exist", save_dir.display()))?;
        anyhow::ensure!(
            metadata.is_dir(),
            "Save location {} is not a directory",
            save_dir.display()
        );

        let handle = axum_server::Handle::new();
        let coordinator = ShutdownCoordinator::new(
            handle.clone(),
            None,
            self.config.drain_timeout(),
            self.events.clone(),
        );
        let state = ReceiveAppState::new(save_dir, self.events.clone());
        let app = routes::create_receive_router(&state, &self.clipboard, self.config.upload_limit());

        self.launch(app, handle, coordinator)
    }

    /// Serve only the shared clipboard.
    pub async fn start_clipboard(&self) -> Result<RunningServer> {
        self.stop().await;

        let handle = axum_server::Handle::new();
        let coordinator = ShutdownCoordinator::new(
            handle.clone(),
            None,
            self.config.drain_timeout(),
            self.events.clone(),
        );
        let app = routes::create_clipboard_router(&self.clipboard);

        self.launch(app, handle, coordinator)
    }

    /// Stop the running server, if any. Returns whether one was stopped.
    pub async fn stop(&self) -> bool {
        let active = self.active().take();
        match active {
            Some(coordinator) => {
                coordinator.trigger(ShutdownReason::Explicit).await;
                coordinator.wait().await;
                true
            }
            None => false,
        }
    }

    fn launch(
        &self,
        app: Router,
        handle: axum_server::Handle,
        coordinator: Arc<ShutdownCoordinator>,
    ) -> Result<RunningServer> {
        let listener = bind_available(
            self.scope,
            self.config.server.port,
            self.config.server.port_attempts,
        )?;
        let (port, task) = start_local_server(app, listener, handle)?;

        let closed = coordinator.listener_closed_token();
        let watcher = coordinator.clone();
        tokio::spawn(async move {
            let result = task.await;
            closed.cancel();
            let failure = match result {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err.to_string()),
                Err(err) => Some(err.to_string()),
            };
            if let Some(err) = failure {
                tracing::error!("Server error: {}", err);
                watcher.trigger(ShutdownReason::ListenerError(err)).await;
            } else {
                tracing::debug!("listener closed");
            }
        });

        self.clipboard
            .spawn_poll_loop(self.config.poll_interval(), coordinator.timers_token());

        let host = match self.scope {
            BindScope::Loopback => "127.0.0.1".to_string(),
            BindScope::AllInterfaces => {
                get_local_ip().unwrap_or_else(|_| "127.0.0.1".to_string())
            }
        };
        let url = format!("http://{host}:{port}");
        tracing::info!(%url, "server listening");

        *self.active() = Some(coordinator.clone());

        Ok(RunningServer {
            url,
            port,
            session: None,
            coordinator,
        })
    }
}
