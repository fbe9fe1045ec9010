//! Viewer controller.
//!
//! Owns the surface, the views and the current [`Layout`], and routes
//! input: keys go to the focused view first, and only keys it declines are
//! treated as global shortcuts. View messages and subscription updates come
//! back in as [`ViewMessage`]s on the controller's channel.
//!
//! The controller never paints. It changes visibility, focus, geometry and
//! content; an external render pass repaints whatever became dirty.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use crossterm::event::{KeyEvent, KeyEventKind};
use ratatui::layout::{Rect, Size};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use taskdeck_core::{
    Pagination, Result, Task, TaskDeckError, TaskFilter, TaskId, TaskRepository, TaskStatus,
    ViewerConfig,
};

use crate::detail_view::DetailView;
use crate::edit_view::{EditView, TaskDraft};
use crate::event::{global_action, AppEvent};
use crate::fuzzy::{task_search_fields, FuzzyOptions, FuzzySearch};
use crate::layout::{edit_area, search_area, Layout, LayoutKind, Pane};
use crate::list_view::ListView;
use crate::search_view::SearchView;
use crate::subscription::{SubscriptionHandle, TaskSubscriptionService};
use crate::terminal::TerminalSurface;
use crate::view::{
    SearchHit, SearchPane, TaskDetailPane, TaskEditPane, TaskListPane, ViewComponent,
    ViewMessage,
};
use crate::view_model::{TaskViewModel, ViewModelMapper};

/// Order the `f` key steps through; `None` shows everything.
const FILTER_CYCLE: [Option<TaskStatus>; 6] = [
    None,
    Some(TaskStatus::Pending),
    Some(TaskStatus::InProgress),
    Some(TaskStatus::Completed),
    Some(TaskStatus::Blocked),
    Some(TaskStatus::Cancelled),
];

/// Controller settings.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub page_size: usize,
    pub layout: LayoutKind,
    pub fuzzy: FuzzyOptions,
    pub result_limit: usize,
    pub debounce: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::from_config(&ViewerConfig::default())
    }
}

impl ControllerOptions {
    pub fn from_config(config: &ViewerConfig) -> Self {
        Self {
            page_size: config.page_size,
            layout: config.default_layout.into(),
            fuzzy: FuzzyOptions::from(&config.search),
            result_limit: config.search.result_limit,
            debounce: Duration::from_millis(config.search.debounce_ms),
        }
    }
}

/// The views the controller drives.
pub struct Views {
    pub list: Box<dyn TaskListPane>,
    pub detail: Box<dyn TaskDetailPane>,
    pub search: Box<dyn SearchPane>,
    pub edit: Box<dyn TaskEditPane>,
}

/// Coordinates views, layout, search and subscriptions.
pub struct Controller {
    surface: Box<dyn TerminalSurface>,
    repository: Arc<dyn TaskRepository>,
    subscriptions: Arc<TaskSubscriptionService>,
    list: Box<dyn TaskListPane>,
    detail: Box<dyn TaskDetailPane>,
    search: Box<dyn SearchPane>,
    edit: Box<dyn TaskEditPane>,
    layout: Layout,
    searching: bool,
    editing: bool,
    status_filter: Option<TaskStatus>,
    engine: FuzzySearch,
    options: ControllerOptions,
    messages: UnboundedSender<ViewMessage>,
    list_subscription: Option<SubscriptionHandle>,
    detail_subscription: Option<SubscriptionHandle>,
    /// Tasks behind the current list, used to resolve subtasks
    loaded: Vec<Task>,
    should_quit: bool,
    disposed: bool,
}

impl Controller {
    /// Build a controller with the standard views.
    ///
    /// Returns the receiving end of the message channel the views and
    /// subscriptions report on; the driver feeds it back through
    /// [`Controller::handle_message`].
    pub fn new(
        surface: Box<dyn TerminalSurface>,
        repository: Arc<dyn TaskRepository>,
        subscriptions: Arc<TaskSubscriptionService>,
        options: ControllerOptions,
    ) -> (Self, UnboundedReceiver<ViewMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let views = Views {
            list: Box::new(ListView::new(tx.clone())),
            detail: Box::new(DetailView::new()),
            search: Box::new(SearchView::new(tx.clone(), options.debounce)),
            edit: Box::new(EditView::new(tx.clone())),
        };
        let controller = Self::with_views(surface, repository, subscriptions, views, tx, options);
        (controller, rx)
    }

    /// Build a controller around caller-supplied views.
    pub fn with_views(
        surface: Box<dyn TerminalSurface>,
        repository: Arc<dyn TaskRepository>,
        subscriptions: Arc<TaskSubscriptionService>,
        views: Views,
        messages: UnboundedSender<ViewMessage>,
        options: ControllerOptions,
    ) -> Self {
        Self {
            surface,
            repository,
            subscriptions,
            list: views.list,
            detail: views.detail,
            search: views.search,
            edit: views.edit,
            layout: Layout::new(options.layout, Pane::List),
            searching: false,
            editing: false,
            status_filter: None,
            engine: FuzzySearch::new(options.fuzzy.clone()),
            options,
            messages,
            list_subscription: None,
            detail_subscription: None,
            loaded: Vec::new(),
            should_quit: false,
            disposed: false,
        }
    }

    /// Initialize the views, load the first page of tasks, and lay out.
    ///
    /// A failed load is fatal: [`TaskDeckError::InitialLoad`].
    pub async fn initialize(&mut self) -> Result<()> {
        self.list.initialize().await?;
        self.detail.initialize().await?;
        self.search.initialize().await?;
        self.edit.initialize().await?;

        let tasks = self
            .load_page()
            .await
            .map_err(|e| TaskDeckError::InitialLoad {
                message: e.to_string(),
            })?;
        info!(count = tasks.len(), "initial tasks loaded");
        self.apply_tasks(tasks);
        self.subscribe_list();
        self.apply_layout();
        Ok(())
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn status_filter(&self) -> Option<TaskStatus> {
        self.status_filter
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn list(&self) -> &dyn TaskListPane {
        self.list.as_ref()
    }

    pub fn detail(&self) -> &dyn TaskDetailPane {
        self.detail.as_ref()
    }

    pub fn search(&self) -> &dyn SearchPane {
        self.search.as_ref()
    }

    pub fn edit(&self) -> &dyn TaskEditPane {
        self.edit.as_ref()
    }

    pub fn surface(&self) -> &dyn TerminalSurface {
        self.surface.as_ref()
    }

    /// Views in paint order (bottom first) plus the surface to paint on.
    pub fn render_targets(&mut self) -> ([&mut dyn ViewComponent; 4], &mut dyn TerminalSurface) {
        (
            [
                self.list.as_mut(),
                self.detail.as_mut(),
                self.search.as_mut(),
                self.edit.as_mut(),
            ],
            self.surface.as_mut(),
        )
    }

    /// Route a key press. Returns true if anything handled it.
    pub async fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press || self.disposed {
            return false;
        }
        if self.focused_view().on_key_press(key.code, key.modifiers) {
            return true;
        }
        self.handle_action(global_action(&key)).await
    }

    fn focused_view(&mut self) -> &mut dyn ViewComponent {
        if self.editing {
            return self.edit.as_mut();
        }
        if self.searching {
            return self.search.as_mut();
        }
        match self.layout.active_pane {
            Pane::List => self.list.as_mut(),
            Pane::Detail => self.detail.as_mut(),
        }
    }

    async fn handle_action(&mut self, action: AppEvent) -> bool {
        match action {
            AppEvent::OpenSearch => self.enter_search(),
            AppEvent::SwitchFocus => self.switch_focus(),
            AppEvent::SetLayout(kind) => {
                self.set_layout(kind);
                true
            }
            AppEvent::Back => self.back(),
            AppEvent::Refresh => {
                self.reload().await;
                true
            }
            AppEvent::CycleFilter => {
                self.cycle_filter().await;
                true
            }
            AppEvent::ToggleStatus => self.toggle_selected_status().await,
            AppEvent::EditTask => self.enter_edit().await,
            AppEvent::Quit | AppEvent::ForceQuit => {
                self.quit();
                true
            }
            AppEvent::None => false,
        }
    }

    /// Adopt a new terminal size and recompute pane geometry.
    pub fn handle_resize(&mut self, size: Size) {
        debug!(width = size.width, height = size.height, "resize");
        self.surface.resize(size);
        self.apply_layout();
    }

    /// Switch arrangement, keeping the active pane.
    pub fn set_layout(&mut self, kind: LayoutKind) {
        self.layout = self.layout.with_kind(kind);
        self.apply_layout();
    }

    /// Process a message from a view or subscription.
    pub async fn handle_message(&mut self, message: ViewMessage) {
        match message {
            ViewMessage::TaskHighlighted(id) => self.show_in_detail(&id).await,
            ViewMessage::TaskSelected(id) => {
                self.show_in_detail(&id).await;
                self.activate(Pane::Detail);
            }
            ViewMessage::SearchRequested { seq, query } => self.run_search(seq, &query).await,
            ViewMessage::SearchResultSelected(id) => {
                self.exit_search();
                if !self.list.select_task(&id) {
                    debug!(task_id = %id, "selected result is not in the current list");
                }
                self.show_in_detail(&id).await;
            }
            ViewMessage::SearchClosed => self.exit_search(),
            ViewMessage::EditSubmitted { id, draft } => self.save_edit(&id, draft).await,
            ViewMessage::EditCancelled => self.exit_edit(),
            ViewMessage::TasksChanged(tasks) => {
                let mut tasks = tasks;
                tasks.truncate(self.options.page_size);
                self.apply_tasks(tasks);
            }
            ViewMessage::TaskChanged { id, task } => self.task_changed(&id, task),
        }
    }

    /// Reload the current page. Failures are logged and the list is kept.
    pub async fn reload(&mut self) {
        match self.load_page().await {
            Ok(tasks) => {
                debug!(count = tasks.len(), "tasks reloaded");
                self.apply_tasks(tasks);
            }
            Err(e) => warn!(error = %e, "reload failed, keeping current list"),
        }
    }

    /// Mark the controller for exit and release everything it holds.
    pub fn quit(&mut self) {
        info!("quit requested");
        self.should_quit = true;
        self.dispose();
    }

    /// Release subscriptions, views and the surface. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        for handle in [self.list_subscription.take(), self.detail_subscription.take()]
            .into_iter()
            .flatten()
        {
            handle.unsubscribe();
        }
        self.list.dispose();
        self.detail.dispose();
        self.search.dispose();
        self.edit.dispose();
        if let Err(e) = self.surface.dispose() {
            warn!(error = %e, "surface dispose failed");
        }
        debug!("controller disposed");
    }

    async fn load_page(&self) -> Result<Vec<Task>> {
        let filter = self.status_filter.map(TaskFilter::with_status);
        let page = self
            .repository
            .find_all(
                filter.as_ref(),
                None,
                Some(Pagination::first(self.options.page_size)),
            )
            .await?;
        Ok(page.items)
    }

    /// Replace the list contents and refresh the detail pane from them.
    fn apply_tasks(&mut self, tasks: Vec<Task>) {
        let mapper = ViewModelMapper::new(&tasks);
        self.list.set_tasks(mapper.map_all(&tasks));

        let shown = self.detail.task().map(|t| t.id.clone());
        match shown.and_then(|id| tasks.iter().find(|t| t.id == id)) {
            Some(task) => self.detail.set_task(Some(mapper.map(task))),
            None if self.detail.task().is_none() => {
                if let Some(selected) = self.list.selected_task().cloned() {
                    self.watch_detail(selected);
                }
            }
            None => {}
        }
        self.loaded = tasks;
    }

    async fn show_in_detail(&mut self, id: &TaskId) {
        if let Some(task) = self.loaded.iter().find(|t| &t.id == id) {
            let model = ViewModelMapper::new(&self.loaded).map(task);
            self.watch_detail(model);
            return;
        }
        match self.repository.find_by_id(id).await {
            Ok(Some(task)) => {
                let model = ViewModelMapper::new(&self.loaded).map(&task);
                self.watch_detail(model);
            }
            Ok(None) => debug!(task_id = %id, "task vanished before it could be shown"),
            Err(e) => warn!(task_id = %id, error = %e, "task lookup failed"),
        }
    }

    /// Show `model` in the detail pane and follow its changes.
    fn watch_detail(&mut self, model: TaskViewModel) {
        let already_watching = self.detail.task().map(|t| &t.id) == Some(&model.id)
            && self.detail_subscription.is_some();
        let id = model.id.clone();
        self.detail.set_task(Some(model));
        if already_watching {
            return;
        }

        if let Some(handle) = self.detail_subscription.take() {
            handle.unsubscribe();
        }
        let tx = self.messages.clone();
        let watched = id.clone();
        self.detail_subscription = Some(self.subscriptions.subscribe_to_task(id, move |task| {
            tx.send(ViewMessage::TaskChanged {
                id: watched.clone(),
                task: task.cloned(),
            })
            .map_err(|_| anyhow::anyhow!("viewer is gone"))
        }));
    }

    fn task_changed(&mut self, id: &TaskId, task: Option<Task>) {
        if self.detail.task().map(|t| &t.id) != Some(id) {
            return;
        }
        match task {
            Some(task) => {
                let model = ViewModelMapper::new(&self.loaded).map(&task);
                self.detail.set_task(Some(model));
            }
            None => {
                debug!(task_id = %id, "watched task deleted");
                if let Some(handle) = self.detail_subscription.take() {
                    handle.unsubscribe();
                }
                self.detail.set_task(None);
                let fallback = self.list.selected_task().filter(|t| &t.id != id).cloned();
                if let Some(selected) = fallback {
                    self.watch_detail(selected);
                }
            }
        }
    }

    fn subscribe_list(&mut self) {
        if let Some(handle) = self.list_subscription.take() {
            handle.unsubscribe();
        }
        let tx = self.messages.clone();
        let forward = move |tasks: &[Task]| {
            tx.send(ViewMessage::TasksChanged(tasks.to_vec()))
                .map_err(|_| anyhow::anyhow!("viewer is gone"))
        };
        let handle = match self.status_filter {
            Some(status) => self
                .subscriptions
                .subscribe_to_filtered_tasks(move |t| t.status == status, forward),
            None => self.subscriptions.subscribe_to_all_tasks(forward),
        };
        self.list_subscription = Some(handle);
    }

    async fn cycle_filter(&mut self) {
        let current = FILTER_CYCLE
            .iter()
            .position(|f| *f == self.status_filter)
            .unwrap_or(0);
        self.status_filter = FILTER_CYCLE[(current + 1) % FILTER_CYCLE.len()];
        info!(filter = ?self.status_filter, "status filter changed");
        self.list
            .set_filter_label(self.status_filter.map(|s| s.label().to_string()));
        self.subscribe_list();
        self.reload().await;
    }

    async fn toggle_selected_status(&mut self) -> bool {
        let Some(id) = self.list.selected_task().map(|t| t.id.clone()) else {
            return false;
        };
        match self.repository.find_by_id(&id).await {
            Ok(Some(mut task)) => {
                let next = task.status.toggled();
                task.set_status(next, Utc::now());
                match self.repository.save(task).await {
                    Ok(_) => info!(task_id = %id, status = %next, "status toggled"),
                    Err(e) => warn!(task_id = %id, error = %e, "status toggle failed"),
                }
            }
            Ok(None) => debug!(task_id = %id, "task vanished before toggle"),
            Err(e) => warn!(task_id = %id, error = %e, "task lookup failed"),
        }
        true
    }

    async fn run_search(&mut self, seq: u64, query: &str) {
        if !self.searching || !self.search.begin_query(seq) {
            debug!(seq, "skipping superseded search");
            return;
        }
        match self.execute_search(query).await {
            Ok(hits) => {
                debug!(seq, query, results = hits.len(), "search finished");
                self.search.apply_results(seq, hits);
            }
            Err(e) => {
                warn!(seq, query, error = %e, "search failed");
                self.search.abandon_query(seq);
            }
        }
    }

    async fn execute_search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let page = self.repository.find_all(None, None, None).await?;
        let mapper = ViewModelMapper::new(&page.items);
        let fields = task_search_fields();
        let hits = self
            .engine
            .search(&page.items, query, &fields)
            .into_iter()
            .take(self.options.result_limit)
            .map(|result| SearchHit {
                task: mapper.map(result.item),
                score: result.score,
                title_spans: result.spans_for("title").to_vec(),
            })
            .collect();
        Ok(hits)
    }

    fn enter_search(&mut self) -> bool {
        if self.searching {
            return false;
        }
        self.searching = true;
        self.list.blur();
        self.detail.blur();
        self.search.open();
        self.search.set_area(search_area(self.surface.dimensions()));
        self.search.show();
        self.search.focus();
        debug!("search opened");
        true
    }

    fn exit_search(&mut self) {
        if !self.searching {
            return;
        }
        self.searching = false;
        self.search.close();
        self.search.blur();
        self.search.hide();
        if let Err(e) = self.surface.hide_cursor() {
            warn!(error = %e, "hide cursor failed");
        }
        self.apply_layout();
        debug!("search closed");
    }

    /// Open the editor on the detail pane's task when it is active,
    /// otherwise on the list selection.
    async fn enter_edit(&mut self) -> bool {
        if self.searching || self.editing {
            return false;
        }
        let target = match self.layout.active_pane {
            Pane::Detail => self.detail.task(),
            Pane::List => self.list.selected_task(),
        };
        let Some(id) = target.map(|t| t.id.clone()) else {
            return false;
        };
        let task = match self.repository.find_by_id(&id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                debug!(task_id = %id, "task vanished before edit");
                return true;
            }
            Err(e) => {
                warn!(task_id = %id, error = %e, "task lookup failed");
                return true;
            }
        };
        self.editing = true;
        self.list.blur();
        self.detail.blur();
        self.edit.open(&task);
        self.edit.set_area(edit_area(self.surface.dimensions()));
        self.edit.show();
        self.edit.focus();
        debug!(task_id = %id, "editor opened");
        true
    }

    fn exit_edit(&mut self) {
        if !self.editing {
            return;
        }
        self.editing = false;
        self.edit.close();
        self.edit.blur();
        self.edit.hide();
        if let Err(e) = self.surface.hide_cursor() {
            warn!(error = %e, "hide cursor failed");
        }
        self.apply_layout();
        debug!("editor closed");
    }

    /// Close the editor and save `draft` into task `id`. The subscriptions
    /// carry the change back to the list; the detail pane is updated here
    /// as well so it shows the edit immediately.
    async fn save_edit(&mut self, id: &TaskId, draft: TaskDraft) {
        if self.edit.editing() != Some(id) {
            debug!(task_id = %id, "ignoring edit for a closed editor");
            return;
        }
        self.exit_edit();
        let mut task = match self.repository.find_by_id(id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                debug!(task_id = %id, "task vanished before save");
                return;
            }
            Err(e) => {
                warn!(task_id = %id, error = %e, "task lookup failed");
                return;
            }
        };
        draft.apply(&mut task, Utc::now());
        match self.repository.save(task).await {
            Ok(saved) => {
                info!(task_id = %id, "task edited");
                let model = ViewModelMapper::new(&self.loaded).map(&saved);
                self.watch_detail(model);
            }
            Err(e) => warn!(task_id = %id, error = %e, "task save failed"),
        }
    }

    fn switch_focus(&mut self) -> bool {
        if !self.layout.kind.is_split() {
            return false;
        }
        self.activate(self.layout.active_pane.other());
        true
    }

    fn back(&mut self) -> bool {
        if self.editing {
            self.exit_edit();
            return true;
        }
        if self.searching {
            self.exit_search();
            return true;
        }
        if self.layout.active_pane == Pane::Detail {
            self.activate(Pane::List);
            return true;
        }
        false
    }

    fn activate(&mut self, pane: Pane) {
        if self.layout.active_pane == pane {
            return;
        }
        self.layout = self.layout.with_active(pane);
        self.apply_layout();
    }

    /// Push the current layout's geometry, visibility and focus to the views.
    fn apply_layout(&mut self) {
        let size = self.surface.dimensions();
        let geometry = self.layout.geometry(size);

        place(self.list.as_mut(), geometry.list);
        place(self.detail.as_mut(), geometry.detail);
        self.search.set_area(search_area(size));
        self.edit.set_area(edit_area(size));

        if self.searching || self.editing {
            return;
        }
        match self.layout.active_pane {
            Pane::List => {
                self.detail.blur();
                self.list.focus();
            }
            Pane::Detail => {
                self.list.blur();
                self.detail.focus();
            }
        }
    }
}

fn place(view: &mut dyn ViewComponent, area: Option<Rect>) {
    match area {
        Some(area) => {
            view.set_area(area);
            view.show();
        }
        None => view.hide(),
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.dispose();
    }
}
