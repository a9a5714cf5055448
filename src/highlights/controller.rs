//! Owns the visual highlight elements of the active score.
//!
//! All engine state sits behind one mutex that is never held across an
//! `.await`. Async work (loading, saving) re-locks afterwards and checks that
//! the score it started for is still the active one.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, OnceLock},
};

use serde::Serialize;

use super::{
    confidence::Confidence,
    context::{AppContext, Viewport},
    geometry::{to_fraction, to_pixels, CanvasSize, FractionRect, Point},
    overlay::{ElementId, HighlightElement, OverlaySink, OverlayUpdate, SaveState},
    selection::{DiscardReason, Finalized, PointerEffect, SelectionConfig, SelectionMachine},
    store::{HighlightStore, StoreError},
};
use crate::{
    db::{HighlightId, HighlightPatch, NewHighlight, ScoreId},
    events::EventHandler,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Identifies one rehydration request. Results are applied only while both the
/// score and the generation still match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RehydrationTicket {
    score_id: ScoreId,
    generation: u64,
}

impl RehydrationTicket {
    pub fn score_id(&self) -> &str {
        &self.score_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "count", rename_all = "camelCase")]
pub enum RehydrationOutcome {
    /// Number of elements created.
    Applied(usize),
    /// Score was already active and fully loaded.
    AlreadyCurrent,
    /// Another score selection happened while loading.
    Stale,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum DragResolution {
    /// No drag was active.
    Ignored,
    Discarded { reason: DiscardReason },
    Created { element: HighlightElement },
    /// The element was removed before its save finished; nothing is kept.
    Removed { element_id: ElementId },
}

/// Storage work left over once a save has been reconciled with the elements.
enum FollowUp {
    None,
    /// Recolored while the first save was in flight.
    Recolor(HighlightId, Confidence),
    /// Removed while the first save was in flight.
    Delete(HighlightId),
}

struct EngineState {
    context: AppContext,
    viewport: Viewport,
    selection: SelectionMachine,
    elements: Vec<HighlightElement>,
    generation: u64,
    rehydrated: bool,
    next_element_id: u64,
    /// Elements removed while their save was still pending.
    removed_in_flight: HashSet<ElementId>,
}

impl EngineState {
    fn accepts(&self, ticket: &RehydrationTicket) -> bool {
        self.generation == ticket.generation && self.context.is_current(&ticket.score_id)
    }

    fn position(&self, element_id: ElementId) -> Option<usize> {
        self.elements
            .iter()
            .position(|element| element.element_id == element_id)
    }

    fn knows_highlight(&self, highlight_id: &str) -> bool {
        self.elements
            .iter()
            .any(|element| element.highlight_id.as_deref() == Some(highlight_id))
    }

    fn build_element(
        &mut self,
        highlight_id: Option<HighlightId>,
        score_id: ScoreId,
        page: u32,
        confidence: Confidence,
        fraction: FractionRect,
        save_state: SaveState,
    ) -> HighlightElement {
        let element_id = ElementId(self.next_element_id);
        self.next_element_id += 1;

        HighlightElement {
            element_id,
            highlight_id,
            score_id,
            page,
            confidence,
            color: confidence.color(),
            fill: confidence.color().hex().to_string(),
            fraction,
            rect: to_pixels(&fraction, self.viewport.canvas),
            visible: page == self.viewport.page,
            save_state,
        }
    }
}

/// A save finished for an element that is no longer attached: either the
/// score was switched away (the row stays) or the element was removed (the
/// row goes).
fn settle_detached(
    state: &mut EngineState,
    mut element: HighlightElement,
    result: Result<HighlightId, StoreError>,
) -> (DragResolution, FollowUp) {
    let element_id = element.element_id;
    let removed = state.removed_in_flight.remove(&element_id);

    match result {
        Ok(id) if removed => (DragResolution::Removed { element_id }, FollowUp::Delete(id)),
        Err(_) if removed => (DragResolution::Removed { element_id }, FollowUp::None),
        Ok(id) => {
            log_debug!(
                "Highlight save for score {} finished after its elements were cleared",
                element.score_id
            );
            element.highlight_id = Some(id);
            element.save_state = SaveState::Saved;
            (DragResolution::Created { element }, FollowUp::None)
        }
        Err(err) => {
            log_error!("Failed to save highlight: {err:?}");
            element.save_state = SaveState::Unsaved;
            (DragResolution::Created { element }, FollowUp::None)
        }
    }
}

struct Bindings {
    score_selected: EventHandler,
    page_changed: EventHandler,
    confidence_changed: EventHandler,
    layout_changed: EventHandler,
}

pub(crate) struct ControllerInner {
    state: Mutex<EngineState>,
    store: HighlightStore,
    overlay: Arc<dyn OverlaySink>,
    bindings: OnceLock<Bindings>,
}

#[derive(Clone)]
pub struct HighlightController {
    inner: Arc<ControllerInner>,
}

impl HighlightController {
    pub fn new(
        store: HighlightStore,
        overlay: Arc<dyn OverlaySink>,
        config: SelectionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                state: Mutex::new(EngineState {
                    context: AppContext::new(),
                    viewport: Viewport::default(),
                    selection: SelectionMachine::new(config),
                    elements: Vec::new(),
                    generation: 0,
                    rehydrated: false,
                    next_element_id: 1,
                    removed_in_flight: HashSet::new(),
                }),
                store,
                overlay,
                bindings: OnceLock::new(),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> std::sync::Weak<ControllerInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Arc<ControllerInner>) -> Self {
        Self { inner }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn emit(&self, update: OverlayUpdate) {
        self.inner.overlay.apply(update);
    }

    pub fn store(&self) -> &HighlightStore {
        &self.inner.store
    }

    pub fn context(&self) -> AppContext {
        self.lock().context.clone()
    }

    pub fn viewport(&self) -> Viewport {
        self.lock().viewport
    }

    pub fn active_confidence(&self) -> Option<Confidence> {
        self.lock().context.active_confidence
    }

    pub fn current_score(&self) -> Option<ScoreId> {
        self.lock().context.current_score.clone()
    }

    pub fn is_rehydrated(&self) -> bool {
        self.lock().rehydrated
    }

    pub fn is_dragging(&self) -> bool {
        self.lock().selection.is_dragging()
    }

    pub fn elements(&self) -> Vec<HighlightElement> {
        self.lock().elements.clone()
    }

    pub fn visible_elements(&self) -> Vec<HighlightElement> {
        self.lock()
            .elements
            .iter()
            .filter(|element| element.visible)
            .cloned()
            .collect()
    }

    pub fn set_selection_config(&self, config: SelectionConfig) {
        self.lock().selection.set_config(config);
    }

    // ---- score selection -------------------------------------------------

    /// Synchronous half of a score selection: clears the old score's elements
    /// and makes `score_id` current. Returns `None` when the score is already
    /// current and fully loaded.
    pub fn begin_score_selection(&self, score_id: ScoreId) -> Option<RehydrationTicket> {
        let mut state = self.lock();
        if state.context.is_current(&score_id) && state.rehydrated {
            log_debug!("Score {score_id} already active; skipping rehydration");
            return None;
        }

        if state.selection.cancel() {
            self.emit(OverlayUpdate::SelectionHidden);
            self.emit(OverlayUpdate::PointerReleased);
        }

        state.elements.clear();
        self.emit(OverlayUpdate::Cleared);

        state.context.current_score = Some(score_id.clone());
        state.generation += 1;
        state.rehydrated = false;

        log_info!(
            "Selected score {score_id} (generation {})",
            state.generation
        );

        Some(RehydrationTicket {
            score_id,
            generation: state.generation,
        })
    }

    /// Loads the ticket's highlights and turns them into elements, unless the
    /// selection moved on while loading.
    pub async fn rehydrate(&self, ticket: RehydrationTicket) -> RehydrationOutcome {
        let loaded = match self.inner.store.load_for_score(&ticket.score_id).await {
            Ok(highlights) => highlights,
            Err(err) => {
                log_error!(
                    "Failed to load highlights for score {}: {err:?}",
                    ticket.score_id
                );
                return RehydrationOutcome::Failed;
            }
        };

        let mut state = self.lock();
        if !state.accepts(&ticket) {
            log_debug!(
                "Dropping stale rehydration for score {} (generation {}, now {})",
                ticket.score_id,
                ticket.generation,
                state.generation
            );
            return RehydrationOutcome::Stale;
        }

        let mut created = 0;
        for highlight in loaded {
            if state.knows_highlight(&highlight.id) {
                continue;
            }
            let element = state.build_element(
                Some(highlight.id),
                highlight.score_id,
                highlight.page,
                highlight.confidence,
                highlight.rect,
                SaveState::Saved,
            );
            self.emit(OverlayUpdate::ElementAttached {
                element: element.clone(),
            });
            state.elements.push(element);
            created += 1;
        }
        state.rehydrated = true;

        log_info!(
            "Rehydrated {created} highlights for score {}",
            ticket.score_id
        );
        RehydrationOutcome::Applied(created)
    }

    pub async fn on_score_selected(&self, score_id: ScoreId) -> RehydrationOutcome {
        match self.begin_score_selection(score_id) {
            Some(ticket) => self.rehydrate(ticket).await,
            None => RehydrationOutcome::AlreadyCurrent,
        }
    }

    /// Forgets the active score, e.g. after it was deleted.
    pub fn clear_score(&self) {
        let mut state = self.lock();
        if state.selection.cancel() {
            self.emit(OverlayUpdate::SelectionHidden);
            self.emit(OverlayUpdate::PointerReleased);
        }
        state.elements.clear();
        state.context.current_score = None;
        state.generation += 1;
        state.rehydrated = false;
        self.emit(OverlayUpdate::Cleared);
    }

    /// Deletes every stored highlight of `score_id`, e.g. when the score
    /// itself is deleted. Closes the score first if it is open; saves still
    /// in flight for it are deleted when they land. Returns the rows removed.
    pub async fn discard_score(&self, score_id: &str) -> Result<usize, StoreError> {
        let is_current = {
            let mut state = self.lock();
            let in_flight: Vec<ElementId> = state
                .elements
                .iter()
                .filter(|element| {
                    element.score_id == score_id
                        && element.highlight_id.is_none()
                        && element.save_state == SaveState::Pending
                })
                .map(|element| element.element_id)
                .collect();
            state.removed_in_flight.extend(in_flight);
            state.context.is_current(score_id)
        };

        if is_current {
            self.clear_score();
        }
        let removed = self.inner.store.delete_for_score(score_id).await?;
        log_info!("Discarded {removed} highlights of score {score_id}");
        Ok(removed)
    }

    // ---- viewer notifications --------------------------------------------

    pub fn on_page_changed(&self, page: u32) {
        let mut state = self.lock();
        let page = page.max(1);
        state.viewport.page = page;
        let canvas = state.viewport.canvas;

        for element in state.elements.iter_mut() {
            let visible = element.page == page;
            let rect = if visible {
                to_pixels(&element.fraction, canvas)
            } else {
                element.rect
            };
            if visible != element.visible || rect != element.rect {
                element.visible = visible;
                element.rect = rect;
                self.emit(OverlayUpdate::ElementUpdated {
                    element: element.clone(),
                });
            }
        }
    }

    /// Zoom or container resize. `canvas` is the rendered size after zoom.
    pub fn on_layout_changed(&self, zoom: f64, canvas: CanvasSize) {
        let mut state = self.lock();
        state.viewport.zoom = zoom;
        state.viewport.canvas = canvas;

        for element in state.elements.iter_mut().filter(|element| element.visible) {
            let rect = to_pixels(&element.fraction, canvas);
            if rect != element.rect {
                element.rect = rect;
                self.emit(OverlayUpdate::ElementUpdated {
                    element: element.clone(),
                });
            }
        }
    }

    pub fn on_confidence_changed(&self, level: Option<Confidence>) {
        self.lock().context.active_confidence = level;
        match level {
            Some(level) => log_debug!("Active confidence set to {}", level.as_str()),
            None => log_debug!("Active confidence cleared"),
        }
    }

    /// Turning highlighting off clears the active confidence and drops any
    /// drag in progress.
    pub fn set_highlighting_enabled(&self, enabled: bool) {
        let mut state = self.lock();
        state.context.highlighting_enabled = enabled;
        if enabled {
            return;
        }

        state.context.active_confidence = None;
        if state.selection.cancel() {
            self.emit(OverlayUpdate::SelectionHidden);
            self.emit(OverlayUpdate::PointerReleased);
        }
    }

    // ---- pointer input ---------------------------------------------------

    pub fn pointer_down(&self, at: Point) -> bool {
        let mut state = self.lock();
        let enabled = state.context.highlighting_enabled;
        match state.selection.pointer_down(at, enabled) {
            PointerEffect::Started { overlay } => {
                self.emit(OverlayUpdate::PointerCaptured);
                self.emit(OverlayUpdate::SelectionShown { rect: overlay });
                true
            }
            _ => false,
        }
    }

    pub fn pointer_move(&self, to: Point) {
        let mut state = self.lock();
        if let PointerEffect::Resized { overlay } = state.selection.pointer_move(to) {
            self.emit(OverlayUpdate::SelectionShown { rect: overlay });
        }
    }

    pub async fn pointer_up(&self, at: Point) -> DragResolution {
        let effect = {
            let mut state = self.lock();
            let confidence = state.context.active_confidence;
            state.selection.pointer_up(at, confidence)
        };
        self.complete_drag(effect).await
    }

    pub async fn pointer_leave(&self) -> DragResolution {
        let effect = {
            let mut state = self.lock();
            let confidence = state.context.active_confidence;
            state.selection.pointer_leave(confidence)
        };
        self.complete_drag(effect).await
    }

    async fn complete_drag(&self, effect: PointerEffect) -> DragResolution {
        let element = match self.attach_candidate(effect) {
            Ok(element) => element,
            Err(resolution) => return resolution,
        };
        self.persist(element).await
    }

    /// Turns a finished drag into an attached, pending element.
    fn attach_candidate(&self, effect: PointerEffect) -> Result<HighlightElement, DragResolution> {
        let PointerEffect::Finished(finalized) = effect else {
            return Err(DragResolution::Ignored);
        };

        let mut state = self.lock();
        self.emit(OverlayUpdate::SelectionHidden);
        self.emit(OverlayUpdate::PointerReleased);

        let (rect, confidence) = match finalized {
            Finalized::Candidate { rect, confidence } => (rect, confidence),
            Finalized::Discarded { reason, .. } => {
                if reason == DiscardReason::NoActiveConfidence {
                    log_warn!("No active confidence selected; discarding highlight");
                }
                return Err(DragResolution::Discarded { reason });
            }
        };

        let Some(score_id) = state.context.current_score.clone() else {
            log_warn!("No active score; discarding highlight");
            return Err(DragResolution::Discarded {
                reason: DiscardReason::NoActiveScore,
            });
        };

        let fraction = to_fraction(&rect, state.viewport.canvas);
        if !fraction.has_area() {
            return Err(DragResolution::Discarded {
                reason: DiscardReason::InvalidCoordinates,
            });
        }

        let page = state.viewport.page;
        let element =
            state.build_element(None, score_id, page, confidence, fraction, SaveState::Pending);
        self.emit(OverlayUpdate::ElementAttached {
            element: element.clone(),
        });
        state.elements.push(element.clone());
        Ok(element)
    }

    /// Saves an element's highlight and records the outcome on the element if
    /// it is still attached. Failed saves leave the element on screen marked
    /// `Unsaved`.
    async fn persist(&self, element: HighlightElement) -> DragResolution {
        let draft = NewHighlight {
            score_id: element.score_id.clone(),
            page: element.page,
            confidence: element.confidence,
            rect: element.fraction,
        };
        let result = self.inner.store.save(&draft).await;

        let (resolution, follow_up) = {
            let mut state = self.lock();
            match state.position(element.element_id) {
                Some(index) => self.settle_attached(&mut state, index, result, &draft),
                None => settle_detached(&mut state, element, result),
            }
        };

        match follow_up {
            FollowUp::None => {}
            FollowUp::Recolor(id, level) => {
                if let Err(err) = self
                    .inner
                    .store
                    .update(&id, HighlightPatch::confidence(level))
                    .await
                {
                    log_error!("Failed to store new confidence for highlight {id}: {err:?}");
                }
            }
            FollowUp::Delete(id) => {
                if let Err(err) = self.inner.store.delete(&id).await {
                    log_error!("Failed to delete removed highlight {id}: {err:?}");
                }
            }
        }

        resolution
    }

    fn settle_attached(
        &self,
        state: &mut EngineState,
        index: usize,
        result: Result<HighlightId, StoreError>,
        draft: &NewHighlight,
    ) -> (DragResolution, FollowUp) {
        match result {
            Ok(id) if state.knows_highlight(&id) => {
                // A rehydration that ran during the save already attached it.
                let removed = state.elements.remove(index);
                self.emit(OverlayUpdate::ElementRemoved {
                    element_id: removed.element_id,
                });
                let existing = state
                    .elements
                    .iter()
                    .find(|candidate| candidate.highlight_id.as_deref() == Some(id.as_str()))
                    .cloned()
                    .unwrap_or(removed);
                (DragResolution::Created { element: existing }, FollowUp::None)
            }
            Ok(id) => {
                let attached = &mut state.elements[index];
                attached.highlight_id = Some(id.clone());
                attached.save_state = SaveState::Saved;
                self.emit(OverlayUpdate::ElementUpdated {
                    element: attached.clone(),
                });
                let follow_up = if attached.confidence != draft.confidence {
                    FollowUp::Recolor(id, attached.confidence)
                } else {
                    FollowUp::None
                };
                let element = attached.clone();
                (DragResolution::Created { element }, follow_up)
            }
            Err(err) => {
                log_error!(
                    "Failed to save highlight on page {} of score {}: {err:?}",
                    draft.page,
                    draft.score_id
                );
                let attached = &mut state.elements[index];
                attached.save_state = SaveState::Unsaved;
                self.emit(OverlayUpdate::ElementUpdated {
                    element: attached.clone(),
                });
                let element = attached.clone();
                (DragResolution::Created { element }, FollowUp::None)
            }
        }
    }

    // ---- editing ---------------------------------------------------------

    /// Re-attempts every `Unsaved` element of the active score. Returns how
    /// many are saved now.
    pub async fn retry_unsaved(&self) -> usize {
        let pending: Vec<HighlightElement> = {
            let mut state = self.lock();
            let mut pending = Vec::new();
            for element in state
                .elements
                .iter_mut()
                .filter(|element| element.save_state == SaveState::Unsaved)
            {
                element.save_state = SaveState::Pending;
                self.emit(OverlayUpdate::ElementUpdated {
                    element: element.clone(),
                });
                pending.push(element.clone());
            }
            pending
        };

        let mut saved = 0;
        for element in pending {
            if let DragResolution::Created { element } = self.persist(element).await {
                if element.save_state == SaveState::Saved {
                    saved += 1;
                }
            }
        }
        saved
    }

    /// Changes an element's confidence. Returns whether the element exists.
    pub async fn recolor(
        &self,
        element_id: ElementId,
        level: Confidence,
    ) -> Result<bool, StoreError> {
        let highlight_id = {
            let mut state = self.lock();
            let Some(index) = state.position(element_id) else {
                return Ok(false);
            };
            let element = &mut state.elements[index];
            element.confidence = level;
            element.color = level.color();
            element.fill = level.color().hex().to_string();
            self.emit(OverlayUpdate::ElementUpdated {
                element: element.clone(),
            });
            element.highlight_id.clone()
        };

        // Not saved yet: the pending or retried save carries the new level.
        let Some(highlight_id) = highlight_id else {
            return Ok(true);
        };

        self.inner
            .store
            .update(&highlight_id, HighlightPatch::confidence(level))
            .await?;
        Ok(true)
    }

    /// Detaches an element and deletes its stored highlight. Returns whether
    /// the element existed.
    pub async fn remove(&self, element_id: ElementId) -> Result<bool, StoreError> {
        let highlight_id = {
            let mut state = self.lock();
            let Some(index) = state.position(element_id) else {
                return Ok(false);
            };
            let removed = state.elements.remove(index);
            self.emit(OverlayUpdate::ElementRemoved { element_id });
            if removed.highlight_id.is_none() && removed.save_state == SaveState::Pending {
                // The in-flight save deletes the row once it has an id.
                state.removed_in_flight.insert(element_id);
            }
            removed.highlight_id
        };

        if let Some(highlight_id) = highlight_id {
            self.inner.store.delete(&highlight_id).await?;
        }
        Ok(true)
    }

    // ---- event bus -------------------------------------------------------

    pub(crate) fn handlers(
        &self,
        build: impl FnOnce() -> [EventHandler; 4],
    ) -> [EventHandler; 4] {
        let bindings = self.inner.bindings.get_or_init(|| {
            let [score_selected, page_changed, confidence_changed, layout_changed] = build();
            Bindings {
                score_selected,
                page_changed,
                confidence_changed,
                layout_changed,
            }
        });
        [
            bindings.score_selected.clone(),
            bindings.page_changed.clone(),
            bindings.confidence_changed.clone(),
            bindings.layout_changed.clone(),
        ]
    }
}
