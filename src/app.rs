//! Application state management for prefpop.
//!
//! This module contains the core `App` struct holding the prefecture
//! directory, the user's selection and category, the display cache and UI
//! state. Every state change that affects what must be fetched publishes a
//! fresh `PassPlan` to the orchestrator task; results come back as
//! `PassEvent`s drained once per UI tick.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::cache::PopulationCache;
use crate::config::Config;
use crate::models::{CachedSeries, Category, Region};
use crate::orchestrator::{Orchestrator, PassEvent, PassPlan};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background event channel.
const CHANNEL_BUFFER_SIZE: usize = 64;

const DIRECTORY_LOADING_MESSAGE: &str = "都道府県一覧を取得中...";

/// Number of columns in the prefecture grid.
pub const GRID_COLUMNS: usize = 6;

// ============================================================================
// UI State Types
// ============================================================================

/// Which selector has keyboard focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Regions,
    Categories,
}

impl Focus {
    pub fn toggle(&self) -> Self {
        match self {
            Focus::Regions => Focus::Categories,
            Focus::Categories => Focus::Regions,
        }
    }
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ShowingHelp,
    ConfirmingQuit,
    Quitting,
}

/// What the main content area shows
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContentView {
    /// A pass is running; progress is in [0, 1]
    Loading { progress: f64 },
    Chart,
    /// Nothing selected yet
    Prompt,
}

/// Checked prefecture codes. Membership is what matters; iteration follows
/// the order in which codes were checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    codes: Vec<u32>,
}

impl SelectionSet {
    /// Returns false if already present
    pub fn insert(&mut self, code: u32) -> bool {
        if self.contains(code) {
            return false;
        }
        self.codes.push(code);
        true
    }

    /// Returns false if not present
    pub fn remove(&mut self, code: u32) -> bool {
        let before = self.codes.len();
        self.codes.retain(|&c| c != code);
        self.codes.len() != before
    }

    pub fn contains(&self, code: u32) -> bool {
        self.codes.contains(&code)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn clear(&mut self) {
        self.codes.clear();
    }
}

// ============================================================================
// Main Application Struct
// ============================================================================

/// Main application state container
pub struct App {
    pub config: Config,
    api: ApiClient,

    // UI state
    pub state: AppState,
    pub focus: Focus,
    pub region_cursor: usize,
    pub category_cursor: Category,
    pub status_message: Option<String>,

    // Domain state
    pub regions: Arc<Vec<Region>>,
    pub directory_loading: bool,
    pub selection: SelectionSet,
    pub category: Category,
    pub cache: PopulationCache,
    pub loading: bool,

    // Orchestrator plumbing
    generation: u64,
    epoch: u64,
    directory_request: u64,
    plan_tx: watch::Sender<PassPlan>,
    plan_rx: Option<watch::Receiver<PassPlan>>,
    event_tx: mpsc::Sender<PassEvent>,
    event_rx: mpsc::Receiver<PassEvent>,
}

impl App {
    /// Create a new application instance. No tasks are spawned until `start`.
    pub fn new(config: Config, api: ApiClient) -> Self {
        let (plan_tx, plan_rx) = watch::channel(PassPlan::default());
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let status_message = if api.has_api_key() {
            None
        } else {
            warn!("No API key configured");
            Some(format!("{} が設定されていません", crate::config::API_KEY_ENV))
        };

        Self {
            config,
            api,

            state: AppState::Normal,
            focus: Focus::Regions,
            region_cursor: 0,
            category_cursor: Category::default(),
            status_message,

            regions: Arc::new(Vec::new()),
            directory_loading: false,
            selection: SelectionSet::default(),
            category: Category::default(),
            cache: PopulationCache::new(),
            loading: false,

            generation: 0,
            epoch: 0,
            directory_request: 0,
            plan_tx,
            plan_rx: Some(plan_rx),
            event_tx,
            event_rx,
        }
    }

    /// Spawn the orchestrator and begin loading the prefecture directory.
    pub fn start(&mut self) {
        self.spawn_orchestrator();
        self.reload_directory();
    }

    fn spawn_orchestrator(&mut self) {
        let Some(plans) = self.plan_rx.take() else {
            warn!("Orchestrator already running");
            return;
        };
        let orchestrator = Orchestrator::new(self.api.clone(), self.config.request_interval());
        let events = self.event_tx.clone();
        tokio::spawn(orchestrator.run(plans, events));
    }

    /// Ask the orchestrator to (re)load the prefecture directory
    pub fn reload_directory(&mut self) {
        info!("Loading prefecture directory");
        self.directory_loading = true;
        if self.status_message.is_none() {
            self.status_message = Some(DIRECTORY_LOADING_MESSAGE.to_string());
        }
        self.directory_request += 1;
        self.notify_changed();
    }

    /// Take the plan receiver instead of spawning the orchestrator.
    #[cfg(test)]
    pub fn take_plan_receiver(&mut self) -> Option<watch::Receiver<PassPlan>> {
        self.plan_rx.take()
    }

    // =========================================================================
    // State change notification
    // =========================================================================

    /// Publish the current state as a new pass plan.
    fn notify_changed(&mut self) {
        self.generation += 1;
        let plan = PassPlan {
            generation: self.generation,
            epoch: self.epoch,
            selection: self.selection.as_slice().to_vec(),
            category: self.category,
            directory: Arc::clone(&self.regions),
            directory_request: self.directory_request,
        };
        debug!(
            generation = plan.generation,
            epoch = plan.epoch,
            selected = plan.selection.len(),
            category = %plan.category,
            "Publishing pass plan"
        );
        self.plan_tx.send_replace(plan);
    }

    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // =========================================================================
    // Selection
    // =========================================================================

    pub fn set_region_selected(&mut self, code: u32, selected: bool) {
        let changed = if selected {
            self.selection.insert(code)
        } else {
            self.selection.remove(code)
        };
        if changed {
            self.notify_changed();
        }
    }

    pub fn toggle_region(&mut self, code: u32) {
        let selected = !self.selection.contains(code);
        self.set_region_selected(code, selected);
    }

    pub fn toggle_region_at_cursor(&mut self) {
        if let Some(code) = self.regions.get(self.region_cursor).map(|r| r.code) {
            self.toggle_region(code);
        }
    }

    /// Select every known prefecture, keeping existing selection order first
    pub fn select_all(&mut self) {
        let mut changed = false;
        for region in self.regions.iter() {
            changed |= self.selection.insert(region.code);
        }
        if changed {
            self.notify_changed();
        }
    }

    pub fn clear_all(&mut self) {
        if !self.selection.is_empty() {
            self.selection.clear();
            self.notify_changed();
        }
    }

    /// Switch category. The cache is cleared so every selected prefecture
    /// is refetched under the new category.
    pub fn set_category(&mut self, category: Category) {
        self.category_cursor = category;
        if category == self.category {
            return;
        }
        info!(from = %self.category, to = %category, "Category changed");
        self.category = category;
        if !self.cache.is_empty() {
            debug!(dropped = self.cache.len(), "Clearing cached series");
            self.cache.clear();
        }
        self.epoch += 1;
        self.notify_changed();
    }

    // =========================================================================
    // Cursor movement
    // =========================================================================

    /// Move the grid cursor by whole cells, clamped to the directory.
    pub fn move_region_cursor(&mut self, dx: isize, dy: isize) {
        if self.regions.is_empty() {
            self.region_cursor = 0;
            return;
        }
        let max = self.regions.len() as isize - 1;
        let target = self.region_cursor as isize + dx + dy * GRID_COLUMNS as isize;
        self.region_cursor = target.clamp(0, max) as usize;
    }

    // =========================================================================
    // Derived view state
    // =========================================================================

    /// Fraction of selected prefectures with a valid cached series
    pub fn progress(&self) -> f64 {
        self.cache.progress(self.selection.as_slice(), self.category)
    }

    pub fn content_view(&self) -> ContentView {
        if self.loading {
            ContentView::Loading {
                progress: self.progress(),
            }
        } else if !self.selection.is_empty() {
            ContentView::Chart
        } else {
            ContentView::Prompt
        }
    }

    /// Series to draw, in selection order. Uncached prefectures are omitted.
    pub fn chart_series(&self) -> Vec<&CachedSeries> {
        self.selection
            .as_slice()
            .iter()
            .filter_map(|&code| self.cache.get_valid(code, self.category))
            .collect()
    }

    // =========================================================================
    // Background events
    // =========================================================================

    /// Drain and apply every pending background event
    pub fn check_background_tasks(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            self.process_event(event);
        }
    }

    /// Apply a single background event to application state.
    pub fn process_event(&mut self, event: PassEvent) {
        match event {
            PassEvent::Directory(regions) => {
                self.directory_loading = false;
                if regions.is_empty() {
                    self.status_message =
                        Some("都道府県一覧を取得できませんでした ([r] 再読み込み)".to_string());
                } else if self.status_message.as_deref() == Some(DIRECTORY_LOADING_MESSAGE) {
                    self.status_message = None;
                }
                self.regions = Arc::new(regions);
                self.region_cursor = self.region_cursor.min(self.regions.len().saturating_sub(1));
                self.notify_changed();
            }
            PassEvent::Started { generation } => {
                debug!(generation, "Pass started");
                self.loading = true;
            }
            PassEvent::Cached { epoch, code, series } => {
                if epoch == self.epoch {
                    self.cache.insert(code, series);
                } else {
                    debug!(code, epoch, current = self.epoch, "Discarding stale series");
                }
            }
            PassEvent::Failed { epoch, code, name } => {
                if epoch == self.epoch {
                    debug!(code, "Fetch failed, will retry on next change");
                    self.status_message = Some(format!("{}のデータ取得に失敗しました", name));
                }
            }
            PassEvent::Finished { generation, outcome } => {
                debug!(generation, ?outcome, "Pass finished");
                if generation == self.generation {
                    self.loading = false;
                }
            }
        }
    }

    /// Short summary for the status bar
    pub fn selection_summary(&self) -> String {
        format!(
            "選択 {} / 取得済み {} · 更新 {}",
            self.selection.len(),
            self.cache.valid_count(self.selection.as_slice(), self.category),
            self.cache.last_updated()
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
