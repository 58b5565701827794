//! Async driver for [`CascadingSelector`].
//!
//! Each fetch runs in its own spawned task that reports back over an mpsc
//! channel, tagged with the request it answers. Events are applied one at a
//! time through `&mut self`, so two selection changes never interleave;
//! staleness is decided by the selector's generation check, not by aborting
//! tasks.

use super::cascade::{
    CascadingSelector, DependentRequest, OpenMode, PrimaryRequest, SelectionError,
};
use crate::catalog::{OptionsProvider, ProviderError, SelectOption};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Completion events from fetch tasks.
#[derive(Debug)]
pub enum FormEvent {
    PrimaryLoaded {
        request: PrimaryRequest,
        result: Result<Vec<SelectOption>, ProviderError>,
    },
    DependentLoaded {
        request: DependentRequest,
        result: Result<Vec<SelectOption>, ProviderError>,
    },
}

/// Which list an applied event belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Primary,
    Dependent,
}

/// Result of processing one [`FormEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventOutcome {
    pub list: ListKind,
    /// False when the response was stale and discarded.
    pub applied: bool,
}

pub struct CascadeController {
    selector: CascadingSelector,
    provider: Arc<dyn OptionsProvider>,
    event_tx: mpsc::Sender<FormEvent>,
    event_rx: mpsc::Receiver<FormEvent>,
    in_flight: usize,
    tasks: Vec<JoinHandle<()>>,
}

impl CascadeController {
    /// Open a dialog: load the primary list and, in edit mode, the dependent
    /// list for the record's primary id.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(provider: Arc<dyn OptionsProvider>, mode: OpenMode) -> Self {
        let (selector, dependent_request) = CascadingSelector::initialize(mode);
        let (event_tx, event_rx) = mpsc::channel(32);
        let mut controller = Self {
            selector,
            provider,
            event_tx,
            event_rx,
            in_flight: 0,
            tasks: Vec::new(),
        };

        let primary_request = controller.selector.begin_primary_load();
        controller.spawn_primary(primary_request);
        if let Some(request) = dependent_request {
            controller.spawn_dependent(request);
        }
        controller
    }

    pub fn selector(&self) -> &CascadingSelector {
        &self.selector
    }

    /// Number of spawned fetches whose results have not been processed.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn select_primary(&mut self, raw: &str) {
        if let Some(request) = self.selector.select_primary(raw) {
            self.spawn_dependent(request);
        }
    }

    pub fn select_dependent(&mut self, raw: &str) -> Result<(), SelectionError> {
        self.selector.select_dependent(raw)
    }

    /// Retry the dependent list for the current primary id.
    ///
    /// Returns false when there is no primary selection.
    pub fn reload_dependent(&mut self) -> bool {
        match self.selector.reload_dependent() {
            Some(request) => {
                self.spawn_dependent(request);
                true
            }
            None => false,
        }
    }

    /// Wait for one fetch to complete and apply it.
    ///
    /// Returns `None` immediately when nothing is in flight.
    pub async fn next_event(&mut self) -> Option<EventOutcome> {
        if self.in_flight == 0 {
            return None;
        }
        let event = self.event_rx.recv().await?;
        self.in_flight -= 1;
        Some(self.handle_event(event))
    }

    /// Process events until no fetch is in flight.
    pub async fn settle(&mut self) {
        while self.next_event().await.is_some() {}
    }

    fn handle_event(&mut self, event: FormEvent) -> EventOutcome {
        match event {
            FormEvent::PrimaryLoaded { request, result } => EventOutcome {
                list: ListKind::Primary,
                applied: self.selector.apply_primary(request, result),
            },
            FormEvent::DependentLoaded { request, result } => EventOutcome {
                list: ListKind::Dependent,
                applied: self.selector.apply_dependent(request, result),
            },
        }
    }

    fn spawn_primary(&mut self, request: PrimaryRequest) {
        let provider = Arc::clone(&self.provider);
        let tx = self.event_tx.clone();
        self.track(tokio::spawn(async move {
            let result = catch_task_panic(provider.fetch_primary_options())
                .await
                .unwrap_or_else(|panic_msg| {
                    tracing::error!(task = "primary_load", error = %panic_msg, "Fetch task panicked");
                    Err(ProviderError::Aborted(panic_msg))
                });
            if let Err(e) = tx.send(FormEvent::PrimaryLoaded { request, result }).await {
                tracing::warn!(error = %e, event = "PrimaryLoaded", "Channel send failed (receiver dropped)");
            }
        }));
    }

    fn spawn_dependent(&mut self, request: DependentRequest) {
        let provider = Arc::clone(&self.provider);
        let tx = self.event_tx.clone();
        tracing::debug!(
            primary_id = %request.primary_id,
            generation = request.generation,
            "Spawning dependent options fetch"
        );
        self.track(tokio::spawn(async move {
            let result = catch_task_panic(provider.fetch_dependent_options(&request.primary_id))
                .await
                .unwrap_or_else(|panic_msg| {
                    tracing::error!(task = "dependent_load", error = %panic_msg, "Fetch task panicked");
                    Err(ProviderError::Aborted(panic_msg))
                });
            if let Err(e) = tx.send(FormEvent::DependentLoaded { request, result }).await {
                tracing::warn!(error = %e, event = "DependentLoaded", "Channel send failed (receiver dropped)");
            }
        }));
    }

    fn track(&mut self, handle: JoinHandle<()>) {
        self.tasks.retain(|h| !h.is_finished());
        self.tasks.push(handle);
        self.in_flight += 1;
    }
}

impl Drop for CascadeController {
    /// Closing the dialog abandons outstanding fetches.
    fn drop(&mut self) {
        for handle in self.tasks.drain(..) {
            handle.abort();
        }
    }
}

/// Run a future, converting a panic into its message.
async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            }
        })
}
