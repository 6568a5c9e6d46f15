use crate::board::{derive_board, BoardView, PLACEHOLDER_CELL};
use crate::completion::CompletionControl;
use crate::errors::WorkboardError;
use crate::hotkeys::{action_for_key, HotkeyAction};
use crate::runtime::{Clock, Terminal};
use crate::service::WorkerService;
use crate::tui::render_dashboard;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopSignal {
    Continue,
    Quit,
}

#[derive(Debug, Clone)]
pub struct LoopOptions {
    pub refresh_interval: Duration,
    /// `Some(n)` renders n frames and exits (headless mode).
    pub frames: Option<u32>,
    pub width: u16,
    pub height: u16,
}

/// Interactive shell around the board: the current derived view, a
/// completion-control arena keyed by worker id, and a selection cursor over
/// the rows that carry an action.
pub struct DashboardApp {
    service: Arc<dyn WorkerService>,
    view: BoardView,
    controls: HashMap<String, CompletionControl>,
    selected: Option<String>,
}

impl DashboardApp {
    pub fn new(service: Arc<dyn WorkerService>) -> Self {
        Self {
            service,
            view: BoardView::empty(),
            controls: HashMap::new(),
            selected: None,
        }
    }

    pub fn view(&self) -> &BoardView {
        &self.view
    }

    pub fn selected_worker(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn control(&self, worker_id: &str) -> Option<&CompletionControl> {
        self.controls.get(worker_id)
    }

    /// Re-reads the list and the freeze flag, re-derives the view, and
    /// reconciles the control arena with the rows now showing an action.
    pub fn refresh(&mut self) -> Result<(), WorkboardError> {
        let workers = self.service.list_workers()?;
        let frozen = self.service.is_frozen()?;
        self.view = derive_board(&workers, frozen);
        self.sync_controls();
        Ok(())
    }

    fn sync_controls(&mut self) {
        let action_ids = self.view.action_row_ids();
        // A worker that left the failed view loses its control; coming back
        // gets a fresh one, so pending/error state never survives remount.
        self.controls.retain(|id, _| action_ids.contains(id));
        for id in &action_ids {
            self.controls
                .entry(id.clone())
                .or_insert_with(|| CompletionControl::new(id.clone()));
        }
        match &self.selected {
            Some(id) if action_ids.contains(id) => {}
            _ => self.selected = action_ids.first().cloned(),
        }
    }

    /// Drains outcome channels of every in-flight completion.
    pub fn poll_completions(&mut self) {
        for control in self.controls.values_mut() {
            control.poll();
        }
    }

    pub fn handle_key(&mut self, key: char) -> Result<LoopSignal, WorkboardError> {
        match action_for_key(key) {
            Some(action) => self.handle_action(action),
            None => Ok(LoopSignal::Continue),
        }
    }

    pub fn handle_action(&mut self, action: HotkeyAction) -> Result<LoopSignal, WorkboardError> {
        match action {
            HotkeyAction::Quit => return Ok(LoopSignal::Quit),
            HotkeyAction::SelectNext => self.move_selection(1),
            HotkeyAction::SelectPrev => self.move_selection(-1),
            HotkeyAction::CompleteSelected => {
                if let Some(id) = self.selected.clone() {
                    if let Some(control) = self.controls.get_mut(&id) {
                        // The disabled-while-pending guard lives here, at
                        // the interaction surface.
                        if !control.is_pending() {
                            control.activate(&self.service);
                        }
                    }
                }
            }
            HotkeyAction::ToggleFreeze => {
                // Fire-and-forget: no pending/error state is kept for the
                // toggle, and a failure propagates to the loop's caller.
                self.service.set_frozen(!self.view.frozen)?;
            }
        }
        Ok(LoopSignal::Continue)
    }

    fn move_selection(&mut self, delta: isize) {
        let action_ids = self.view.action_row_ids();
        if action_ids.is_empty() {
            self.selected = None;
            return;
        }
        let current = self
            .selected
            .as_ref()
            .and_then(|id| action_ids.iter().position(|candidate| candidate == id))
            .unwrap_or(0);
        let last = action_ids.len() as isize - 1;
        let next = (current as isize + delta).clamp(0, last) as usize;
        self.selected = Some(action_ids[next].clone());
    }

    /// Action-column text per row: the completion trigger label (plus any
    /// inline error) for failed rows, the placeholder otherwise.
    pub fn action_cells(&self) -> Vec<String> {
        self.view
            .rows
            .iter()
            .map(|row| {
                let Some(worker_id) = row.worker_id() else {
                    return PLACEHOLDER_CELL.to_string();
                };
                if !row.has_action() {
                    return PLACEHOLDER_CELL.to_string();
                }
                match self.controls.get(worker_id) {
                    Some(control) => match control.last_error() {
                        Some(error) => format!("{}  {error}", control.trigger_label()),
                        None => control.trigger_label().to_string(),
                    },
                    None => "Complete".to_string(),
                }
            })
            .collect()
    }

    pub fn selected_row_index(&self) -> Option<usize> {
        let selected = self.selected.as_deref()?;
        self.view
            .rows
            .iter()
            .position(|row| row.worker_id() == Some(selected))
    }

    pub fn render(&self, width: u16, height: u16) -> String {
        render_dashboard(
            &self.view,
            &self.action_cells(),
            self.selected_row_index(),
            width,
            height,
        )
    }
}

/// Drives the dashboard until quit (interactive) or for a fixed frame count
/// (headless). Each iteration settles completion outcomes, re-reads the
/// service, and redraws; the key poll is the only wait.
pub fn run_dashboard_loop(
    app: &mut DashboardApp,
    clock: &dyn Clock,
    terminal: &dyn Terminal,
    options: &LoopOptions,
) -> Result<(), WorkboardError> {
    if let Some(frames) = options.frames {
        for frame in 0..frames {
            app.poll_completions();
            app.refresh()?;
            terminal.draw(&app.render(options.width, options.height))?;
            if frame + 1 < frames {
                clock.sleep_until(clock.now() + options.refresh_interval)?;
            }
        }
        return Ok(());
    }

    loop {
        app.poll_completions();
        app.refresh()?;
        terminal.draw(&app.render(options.width, options.height))?;
        if let Some(key) = terminal.poll_key(options.refresh_interval)? {
            if app.handle_key(key)? == LoopSignal::Quit {
                return Ok(());
            }
        }
    }
}
