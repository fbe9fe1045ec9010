//! Application driver.
//!
//! One task runs everything: key presses, resizes, view messages, store
//! change notifications (through the subscription service) and shutdown
//! signals are multiplexed with `tokio::select!`, and after each event a
//! render pass repaints whatever became dirty.

use std::sync::Arc;

use ratatui::layout::{Rect, Size};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crossterm::event::KeyEvent;
use taskdeck_core::{Result, TaskEventSource, TaskRepository, ViewerConfig};

use crate::controller::{Controller, ControllerOptions};
use crate::subscription::TaskSubscriptionService;
use crate::terminal::{CrosstermSurface, EventListener, TerminalSurface};
use crate::view::ViewMessage;

/// The task viewer application.
pub struct App {
    config: ViewerConfig,
    repository: Arc<dyn TaskRepository>,
    events: Arc<dyn TaskEventSource>,
}

impl App {
    pub fn new(
        config: ViewerConfig,
        repository: Arc<dyn TaskRepository>,
        events: Arc<dyn TaskEventSource>,
    ) -> Self {
        Self {
            config,
            repository,
            events,
        }
    }

    /// Take over the terminal and run until the user quits or a signal
    /// arrives. The terminal is restored on every exit path.
    pub async fn run(&self) -> Result<()> {
        let surface = CrosstermSurface::acquire(
            self.config.min_terminal_width,
            self.config.min_terminal_height,
        )?;
        self.run_with_surface(Box::new(surface)).await
    }

    /// Run on an already-acquired surface.
    pub async fn run_with_surface(&self, mut surface: Box<dyn TerminalSurface>) -> Result<()> {
        let mut keys = surface.on_key_press();
        let mut resizes = surface.on_resize();

        let subscriptions = Arc::new(TaskSubscriptionService::new(Arc::clone(&self.repository)));
        let listener = subscriptions.spawn_listener(self.events.subscribe());

        let (mut controller, mut messages) = Controller::new(
            surface,
            Arc::clone(&self.repository),
            subscriptions,
            ControllerOptions::from_config(&self.config),
        );

        let result = drive(&mut controller, &mut keys, &mut resizes, &mut messages).await;

        listener.abort();
        controller.dispose();
        match &result {
            Ok(()) => info!("viewer exited"),
            Err(e) => warn!(error = %e, "viewer exited with error"),
        }
        result
    }
}

async fn drive(
    controller: &mut Controller,
    keys: &mut EventListener<KeyEvent>,
    resizes: &mut EventListener<Size>,
    messages: &mut UnboundedReceiver<ViewMessage>,
) -> Result<()> {
    controller.initialize().await?;
    render_frame(controller)?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    while !controller.should_quit() {
        tokio::select! {
            key = keys.recv() => match key {
                Some(key) => {
                    controller.handle_key(key).await;
                }
                None => break,
            },
            size = resizes.recv() => match size {
                Some(size) => controller.handle_resize(size),
                None => break,
            },
            Some(message) = messages.recv() => controller.handle_message(message).await,
            () = &mut shutdown => {
                info!("shutdown signal received");
                controller.quit();
            }
        }

        if !controller.should_quit() {
            render_frame(controller)?;
        }
    }
    Ok(())
}

/// Render every dirty view in z-order, then refresh the surface once.
///
/// A view painted over an area another view already repainted this pass is
/// invalidated first so overlays stay on top. Returns whether anything was
/// painted; the surface is refreshed only in that case.
pub fn render_frame(controller: &mut Controller) -> Result<bool> {
    if controller.is_disposed() {
        return Ok(false);
    }
    let (mut views, surface) = controller.render_targets();
    let mut painted: Vec<Rect> = Vec::new();

    for view in views.iter_mut() {
        if view.is_visible() && painted.iter().any(|area| area.intersects(view.area())) {
            view.invalidate();
        }
        if view.render(surface)? {
            debug!(view = view.name(), "painted");
            painted.push(view.area());
        }
    }

    if painted.is_empty() {
        return Ok(false);
    }
    surface.refresh()?;
    Ok(true)
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            warn!(error = %e, "cannot listen for SIGINT");
                            std::future::pending::<()>().await;
                        }
                    }
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                wait_for_ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for SIGINT");
        std::future::pending::<()>().await;
    }
}
