//! Typed publish/subscribe between the viewer, the confidence controls and
//! the highlight engine.
//!
//! Dispatch is synchronous. Handlers for one event kind run in registration
//! order; a handler that fails or panics is logged and skipped.

use std::{
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard, Weak},
};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    db::ScoreId,
    highlights::{
        controller::ControllerInner, geometry::CanvasSize, Confidence, HighlightController,
    },
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HighlightEvent {
    ScoreSelected { score_id: ScoreId },
    PageChanged { page: u32 },
    ConfidenceChanged { confidence: Option<Confidence> },
    LayoutChanged { zoom: f64, canvas: CanvasSize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ScoreSelected,
    PageChanged,
    ConfidenceChanged,
    LayoutChanged,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::ScoreSelected => "score-selected",
            EventKind::PageChanged => "page-changed",
            EventKind::ConfidenceChanged => "confidence-changed",
            EventKind::LayoutChanged => "layout-changed",
        }
    }
}

impl HighlightEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HighlightEvent::ScoreSelected { .. } => EventKind::ScoreSelected,
            HighlightEvent::PageChanged { .. } => EventKind::PageChanged,
            HighlightEvent::ConfidenceChanged { .. } => EventKind::ConfidenceChanged,
            HighlightEvent::LayoutChanged { .. } => EventKind::LayoutChanged,
        }
    }
}

pub type EventHandler = Arc<dyn Fn(&HighlightEvent) -> Result<()> + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<HashMap<EventKind, Vec<EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn listeners(&self) -> MutexGuard<'_, HashMap<EventKind, Vec<EventHandler>>> {
        match self.listeners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Adds `handler` after the existing ones. Registering the same handler
    /// twice is a no-op and returns `false`.
    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) -> bool {
        let mut listeners = self.listeners();
        let handlers = listeners.entry(kind).or_default();
        if handlers.iter().any(|existing| Arc::ptr_eq(existing, &handler)) {
            log_debug!("Handler already subscribed to {}", kind.name());
            return false;
        }
        handlers.push(handler);
        true
    }

    pub fn unsubscribe(&self, kind: EventKind, handler: &EventHandler) -> bool {
        let mut listeners = self.listeners();
        let Some(handlers) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|existing| !Arc::ptr_eq(existing, handler));
        handlers.len() != before
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.listeners().get(&kind).map_or(0, Vec::len)
    }

    /// Runs every handler for the event's kind. Returns how many succeeded.
    pub fn publish(&self, event: &HighlightEvent) -> usize {
        let kind = event.kind();
        // Snapshot so handlers may publish or subscribe without deadlocking.
        let handlers = self.listeners().get(&kind).cloned().unwrap_or_default();

        let mut succeeded = 0;
        for handler in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => succeeded += 1,
                Ok(Err(err)) => log_error!("{} handler failed: {err:#}", kind.name()),
                Err(_) => log_error!("{} handler panicked", kind.name()),
            }
        }
        succeeded
    }
}

fn upgrade(weak: &Weak<ControllerInner>) -> Result<HighlightController> {
    weak.upgrade()
        .map(HighlightController::from_inner)
        .ok_or_else(|| anyhow!("highlight controller was dropped"))
}

impl HighlightController {
    /// Connects the four viewer events to this controller. Binding again,
    /// to the same or another bus, reuses the same handlers, so nothing fires
    /// twice. Returns the number of new subscriptions.
    pub fn bind(&self, bus: &EventBus) -> usize {
        let weak = self.downgrade();
        let handlers = self.handlers(|| {
            let score_weak = weak.clone();
            let score_selected: EventHandler =
                Arc::new(move |event: &HighlightEvent| -> Result<()> {
                    let HighlightEvent::ScoreSelected { score_id } = event else {
                        return Ok(());
                    };
                    let controller = upgrade(&score_weak)?;
                    if let Some(ticket) = controller.begin_score_selection(score_id.clone()) {
                        let runtime = tokio::runtime::Handle::try_current()
                            .context("score selection needs a tokio runtime")?;
                        runtime.spawn(async move {
                            controller.rehydrate(ticket).await;
                        });
                    }
                    Ok(())
                });

            let page_weak = weak.clone();
            let page_changed: EventHandler =
                Arc::new(move |event: &HighlightEvent| -> Result<()> {
                    if let HighlightEvent::PageChanged { page } = event {
                        upgrade(&page_weak)?.on_page_changed(*page);
                    }
                    Ok(())
                });

            let confidence_weak = weak.clone();
            let confidence_changed: EventHandler =
                Arc::new(move |event: &HighlightEvent| -> Result<()> {
                    if let HighlightEvent::ConfidenceChanged { confidence } = event {
                        upgrade(&confidence_weak)?.on_confidence_changed(*confidence);
                    }
                    Ok(())
                });

            let layout_weak = weak.clone();
            let layout_changed: EventHandler =
                Arc::new(move |event: &HighlightEvent| -> Result<()> {
                    if let HighlightEvent::LayoutChanged { zoom, canvas } = event {
                        upgrade(&layout_weak)?.on_layout_changed(*zoom, *canvas);
                    }
                    Ok(())
                });

            [score_selected, page_changed, confidence_changed, layout_changed]
        });

        let kinds = [
            EventKind::ScoreSelected,
            EventKind::PageChanged,
            EventKind::ConfidenceChanged,
            EventKind::LayoutChanged,
        ];
        let mut added = 0;
        for (kind, handler) in kinds.into_iter().zip(handlers) {
            if bus.subscribe(kind, handler) {
                added += 1;
            }
        }
        added
    }
}
