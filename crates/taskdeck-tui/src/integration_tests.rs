//! End-to-end tests for the viewer.
//!
//! These drive a real [`Controller`] over an in-memory store and a
//! headless surface:
//! - initial load and first paint
//! - list and detail navigation, layouts and resizes
//! - debounced search through to result selection
//! - editing a task through the repository
//! - live updates from store changes
//! - the full application loop with injected keys

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::backend::TestBackend;
    use ratatui::buffer::Buffer;
    use ratatui::layout::{Rect, Size};
    use tokio::sync::broadcast;
    use tokio::sync::mpsc::UnboundedReceiver;

    use taskdeck_core::{
        InMemoryTaskStore, Page, Pagination, Result, Task, TaskDeckError, TaskEvent, TaskEventSource,
        TaskFilter, TaskId, TaskPriority, TaskRepository, TaskSort, TaskStatus, ViewerConfig,
    };

    use crate::app::{render_frame, App};
    use crate::controller::{Controller, ControllerOptions};
    use crate::detail_view::DetailSection;
    use crate::layout::{LayoutKind, Pane};
    use crate::search_view::SearchState;
    use crate::subscription::TaskSubscriptionService;
    use crate::terminal::RatatuiSurface;
    use crate::view::ViewMessage;

    // ============================================================
    // Test Helpers
    // ============================================================

    fn sample_tasks() -> Vec<Task> {
        vec![
            Task::new("t-1", "Fix authentication bug")
                .with_priority(TaskPriority::High)
                .with_tags(["backend"])
                .with_description("Login fails for SSO users"),
            Task::new("t-2", "Write release notes").with_status(TaskStatus::InProgress),
            Task::new("t-3", "Refactor parser").with_subtasks(["t-4", "t-5"]),
            Task::new("t-4", "Split lexer")
                .with_status(TaskStatus::Completed)
                .with_parent("t-3"),
            Task::new("t-5", "Add error spans").with_parent("t-3"),
        ]
    }

    /// Convert buffer to string for searching.
    fn buffer_to_string(buffer: &Buffer) -> String {
        let area = buffer.area;
        let mut result = String::new();
        for y in 0..area.height {
            for x in 0..area.width {
                result.push_str(buffer[(x, y)].symbol());
            }
            result.push('\n');
        }
        result
    }

    struct Harness {
        controller: Controller,
        messages: UnboundedReceiver<ViewMessage>,
        store: Arc<InMemoryTaskStore>,
        service: Arc<TaskSubscriptionService>,
        events: broadcast::Receiver<TaskEvent>,
    }

    impl Harness {
        async fn new(width: u16, height: u16, layout: LayoutKind) -> Self {
            let store = Arc::new(InMemoryTaskStore::with_tasks(sample_tasks()));
            let events = store.subscribe();
            let service = Arc::new(TaskSubscriptionService::new(store.clone()));
            let surface = RatatuiSurface::new(TestBackend::new(width, height)).unwrap();
            let options = ControllerOptions {
                layout,
                ..ControllerOptions::default()
            };
            let (mut controller, messages) =
                Controller::new(Box::new(surface), store.clone(), service.clone(), options);
            controller.initialize().await.unwrap();
            render_frame(&mut controller).unwrap();
            Self {
                controller,
                messages,
                store,
                service,
                events,
            }
        }

        async fn press(&mut self, code: KeyCode) -> bool {
            self.press_with(code, KeyModifiers::NONE).await
        }

        async fn press_with(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
            let handled = self.controller.handle_key(KeyEvent::new(code, modifiers)).await;
            self.pump().await;
            handled
        }

        async fn type_text(&mut self, text: &str) {
            for c in text.chars() {
                self.controller
                    .handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
                    .await;
            }
        }

        /// Feed queued view messages back into the controller.
        async fn pump(&mut self) {
            while let Ok(message) = self.messages.try_recv() {
                self.controller.handle_message(message).await;
            }
        }

        /// Deliver pending store events to subscribers, then pump.
        async fn sync_store(&mut self) {
            while let Ok(event) = self.events.try_recv() {
                self.service.handle_event(&event).await;
            }
            self.pump().await;
        }

        fn render(&mut self) -> bool {
            render_frame(&mut self.controller).unwrap()
        }

        fn screen(&self) -> String {
            buffer_to_string(self.controller.surface().buffer())
        }

        fn selected_id(&self) -> Option<String> {
            self.controller
                .list()
                .selected_task()
                .map(|t| t.id.to_string())
        }

        fn detail_id(&self) -> Option<String> {
            self.controller.detail().task().map(|t| t.id.to_string())
        }
    }

    /// Repository whose reads can be switched to fail.
    struct FlakyRepository {
        inner: InMemoryTaskStore,
        failing: AtomicBool,
    }

    impl FlakyRepository {
        fn new(tasks: Vec<Task>, failing: bool) -> Self {
            Self {
                inner: InMemoryTaskStore::with_tasks(tasks),
                failing: AtomicBool::new(failing),
            }
        }

        fn check(&self) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(TaskDeckError::repository("read", "storage offline"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TaskRepository for FlakyRepository {
        async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>> {
            self.check()?;
            self.inner.find_by_id(id).await
        }

        async fn find_all(
            &self,
            filter: Option<&TaskFilter>,
            sort: Option<&TaskSort>,
            pagination: Option<Pagination>,
        ) -> Result<Page<Task>> {
            self.check()?;
            self.inner.find_all(filter, sort, pagination).await
        }

        async fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<Task>> {
            self.check()?;
            self.inner.search(query, limit).await
        }

        async fn save(&self, task: Task) -> Result<Task> {
            self.inner.save(task).await
        }

        async fn delete(&self, id: &TaskId) -> Result<bool> {
            self.inner.delete(id).await
        }
    }

    fn flaky_controller(repo: Arc<FlakyRepository>) -> (Controller, UnboundedReceiver<ViewMessage>) {
        let service = Arc::new(TaskSubscriptionService::new(repo.clone()));
        let surface = RatatuiSurface::new(TestBackend::new(80, 24)).unwrap();
        Controller::new(Box::new(surface), repo, service, ControllerOptions::default())
    }

    // ============================================================
    // Startup
    // ============================================================

    #[tokio::test]
    async fn test_initial_render_split_horizontal() {
        let h = Harness::new(80, 24, LayoutKind::SplitHorizontal).await;
        let screen = h.screen();
        assert!(screen.contains("Tasks (5)"));
        assert!(screen.contains("Fix authentication bug"));
        assert!(screen.contains("Details"));
        assert_eq!(h.selected_id().as_deref(), Some("t-1"));
        assert_eq!(h.detail_id().as_deref(), Some("t-1"));
        assert!(h.controller.list().is_focused());
        assert!(!h.controller.detail().is_focused());
    }

    #[tokio::test]
    async fn test_nothing_dirty_means_no_refresh() {
        let mut h = Harness::new(80, 24, LayoutKind::SplitHorizontal).await;
        assert!(!h.render());
    }

    #[tokio::test]
    async fn test_initial_load_failure_is_fatal() {
        let repo = Arc::new(FlakyRepository::new(sample_tasks(), true));
        let (mut controller, _rx) = flaky_controller(repo);
        let err = controller.initialize().await.unwrap_err();
        assert!(matches!(err, TaskDeckError::InitialLoad { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_empty_store_shows_empty_state() {
        let store = Arc::new(InMemoryTaskStore::new());
        let service = Arc::new(TaskSubscriptionService::new(store.clone()));
        let surface = RatatuiSurface::new(TestBackend::new(80, 24)).unwrap();
        let (mut controller, _rx) =
            Controller::new(Box::new(surface), store, service, ControllerOptions::default());
        controller.initialize().await.unwrap();
        render_frame(&mut controller).unwrap();
        let screen = buffer_to_string(controller.surface().buffer());
        assert!(screen.contains("No tasks"));
        assert!(screen.contains("No task selected"));
    }

    // ============================================================
    // Navigation and layout
    // ============================================================

    #[tokio::test]
    async fn test_list_navigation_updates_detail() {
        let mut h = Harness::new(80, 24, LayoutKind::SplitHorizontal).await;
        for _ in 0..4 {
            h.press(KeyCode::Char('j')).await;
        }
        h.press(KeyCode::Char('k')).await;
        assert_eq!(h.controller.list().selected_index(), Some(3));
        assert_eq!(h.detail_id().as_deref(), Some("t-4"));
        assert!(h.render());
        assert!(h.screen().contains("Split lexer"));
    }

    #[tokio::test]
    async fn test_tab_switches_focus_then_cycles_sections() {
        let mut h = Harness::new(80, 24, LayoutKind::SplitHorizontal).await;
        h.press(KeyCode::Tab).await;
        assert_eq!(h.controller.layout().active_pane, Pane::Detail);
        assert!(h.controller.detail().is_focused());

        for expected in [
            DetailSection::Description,
            DetailSection::Metadata,
            DetailSection::Subtasks,
            DetailSection::Overview,
        ] {
            h.press(KeyCode::Tab).await;
            assert_eq!(h.controller.detail().active_section(), expected);
            assert_eq!(h.controller.detail().scroll_offset(), 0);
        }

        h.press(KeyCode::Esc).await;
        assert_eq!(h.controller.layout().active_pane, Pane::List);
        assert!(h.controller.list().is_focused());
    }

    #[tokio::test]
    async fn test_resize_recomputes_split() {
        let mut h = Harness::new(80, 24, LayoutKind::SplitHorizontal).await;
        assert_eq!(h.controller.list().area(), Rect::new(0, 0, 40, 24));

        h.controller.handle_resize(Size::new(120, 40));
        assert_eq!(h.controller.surface().dimensions(), Size::new(120, 40));
        assert_eq!(h.controller.list().area(), Rect::new(0, 0, 60, 40));
        assert_eq!(h.controller.detail().area(), Rect::new(60, 0, 60, 40));
        assert!(h.controller.list().is_visible());
        assert!(h.controller.detail().is_visible());
        assert!(h.render());
        assert!(h.screen().contains("Tasks (5)"));
    }

    #[tokio::test]
    async fn test_layout_switch_is_idempotent() {
        let mut h = Harness::new(80, 24, LayoutKind::SplitHorizontal).await;
        h.press(KeyCode::Char('3')).await;
        let first = (h.controller.list().area(), h.controller.detail().area());
        assert_eq!(first, (Rect::new(0, 0, 80, 12), Rect::new(0, 12, 80, 12)));

        h.press(KeyCode::Char('3')).await;
        let second = (h.controller.list().area(), h.controller.detail().area());
        assert_eq!(first, second);
        assert_eq!(h.controller.layout().kind, LayoutKind::SplitVertical);
    }

    #[tokio::test]
    async fn test_single_layout_enter_and_back() {
        let mut h = Harness::new(80, 24, LayoutKind::SplitHorizontal).await;
        h.press(KeyCode::Char('1')).await;
        assert!(h.controller.list().is_visible());
        assert!(!h.controller.detail().is_visible());
        assert!(!h.press(KeyCode::Tab).await);

        h.press(KeyCode::Char('j')).await;
        h.press(KeyCode::Enter).await;
        assert_eq!(h.controller.layout().active_pane, Pane::Detail);
        assert!(h.controller.detail().is_visible());
        assert!(!h.controller.list().is_visible());
        assert_eq!(h.controller.detail().area(), Rect::new(0, 0, 80, 24));
        assert_eq!(h.detail_id().as_deref(), Some("t-2"));
        assert!(h.render());
        assert!(h.screen().contains("Write release notes"));

        h.press(KeyCode::Esc).await;
        assert_eq!(h.controller.layout().active_pane, Pane::List);
        assert!(h.controller.list().is_visible());
    }

    // ============================================================
    // Search
    // ============================================================

    #[tokio::test(start_paused = true)]
    async fn test_debounced_search_to_selection() {
        let mut h = Harness::new(80, 24, LayoutKind::SplitHorizontal).await;
        h.press(KeyCode::Char('/')).await;
        assert!(h.controller.is_searching());
        assert!(h.controller.search().is_focused());
        assert!(!h.controller.list().is_focused());

        h.type_text("auth").await;
        assert!(h.messages.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(350)).await;
        let mut requests = Vec::new();
        while let Ok(message) = h.messages.try_recv() {
            requests.push(message);
        }
        assert_eq!(
            requests,
            vec![ViewMessage::SearchRequested {
                seq: 4,
                query: "auth".into()
            }]
        );
        for message in requests {
            h.controller.handle_message(message).await;
        }

        let results = h.controller.search().results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].task.id.as_str(), "t-1");
        assert_eq!(results[0].title_spans, vec![(4, 8)]);
        assert!(h.render());
        assert!(h.screen().contains("1 result(s)"));

        h.press(KeyCode::Enter).await;
        assert!(!h.controller.is_searching());
        assert_eq!(h.controller.search().search_state(), SearchState::Closed);
        assert!(!h.controller.search().is_visible());
        assert_eq!(h.detail_id().as_deref(), Some("t-1"));
        assert!(h.controller.list().is_focused());
    }

    #[tokio::test]
    async fn test_escape_closes_search() {
        let mut h = Harness::new(80, 24, LayoutKind::SplitHorizontal).await;
        h.press(KeyCode::Char('/')).await;
        h.press(KeyCode::Esc).await;
        assert!(!h.controller.is_searching());
        assert!(h.controller.list().is_focused());
        assert!(h.render());
        assert!(!h.screen().contains("Search"));
    }

    #[tokio::test]
    async fn test_overlay_repainted_over_dirty_pane() {
        let mut h = Harness::new(80, 24, LayoutKind::SplitHorizontal).await;
        h.press(KeyCode::Char('/')).await;
        h.render();
        assert_eq!(h.controller.surface().buffer()[(16, 6)].symbol(), "┌");

        h.store.save(Task::new("t-6", "Brand new")).await.unwrap();
        h.sync_store().await;
        assert_eq!(h.controller.list().tasks().len(), 6);
        assert!(h.render());
        assert_eq!(h.controller.surface().buffer()[(16, 6)].symbol(), "┌");
        assert!(h.screen().contains("Search"));
    }

    #[tokio::test]
    async fn test_search_failure_keeps_state() {
        let repo = Arc::new(FlakyRepository::new(sample_tasks(), false));
        let (mut controller, mut rx) = flaky_controller(repo.clone());
        controller.initialize().await.unwrap();
        controller
            .handle_key(KeyEvent::new(KeyCode::Char('/'), KeyModifiers::NONE))
            .await;
        controller
            .handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))
            .await;

        repo.failing.store(true, Ordering::SeqCst);
        while let Ok(message) = rx.try_recv() {
            controller.handle_message(message).await;
        }
        assert!(controller.is_searching());
        assert_eq!(controller.search().search_state(), SearchState::Editing);
        assert!(controller.search().results().is_empty());
    }

    // ============================================================
    // Editing
    // ============================================================

    #[tokio::test]
    async fn test_edit_saves_through_repository() {
        let mut h = Harness::new(80, 24, LayoutKind::SplitHorizontal).await;
        assert!(h.press(KeyCode::Char('e')).await);
        assert!(h.controller.is_editing());
        assert_eq!(h.controller.edit().editing(), Some(&TaskId::new("t-1")));
        assert!(!h.controller.list().is_focused());
        h.render();
        assert_eq!(h.controller.surface().buffer()[(10, 6)].symbol(), "┌");
        assert!(h.screen().contains("Edit t-1"));

        h.type_text(" now").await;
        for _ in 0..3 {
            h.press(KeyCode::Tab).await;
        }
        h.press(KeyCode::Right).await;
        h.press(KeyCode::Enter).await;
        assert!(!h.controller.is_editing());
        assert!(h.controller.list().is_focused());

        let task = h.store.find_by_id(&"t-1".into()).await.unwrap().unwrap();
        assert_eq!(task.title, "Fix authentication bug now");
        assert_eq!(task.status, TaskStatus::InProgress);

        h.sync_store().await;
        let listed = h
            .controller
            .list()
            .tasks()
            .iter()
            .find(|t| t.id.as_str() == "t-1")
            .map(|t| t.title.clone());
        assert_eq!(listed.as_deref(), Some("Fix authentication bug now"));
        assert_eq!(
            h.controller.detail().task().map(|t| t.status),
            Some(TaskStatus::InProgress)
        );
        assert!(h.render());
        assert!(!h.screen().contains("Edit t-1"));
    }

    #[tokio::test]
    async fn test_edit_is_modal_and_validates() {
        let mut h = Harness::new(80, 24, LayoutKind::SplitHorizontal).await;
        h.press(KeyCode::Char('e')).await;
        h.press_with(KeyCode::Char('u'), KeyModifiers::CONTROL).await;
        // Global shortcuts become text while the editor is open
        h.press(KeyCode::Char('q')).await;
        assert!(!h.controller.should_quit());
        assert_eq!(h.controller.edit().draft().title, "q");

        h.press_with(KeyCode::Char('u'), KeyModifiers::CONTROL).await;
        h.press(KeyCode::Enter).await;
        assert!(h.controller.is_editing());
        assert_eq!(h.controller.edit().error(), Some("Title is required"));

        h.press(KeyCode::Esc).await;
        assert!(!h.controller.is_editing());
        let task = h.store.find_by_id(&"t-1".into()).await.unwrap().unwrap();
        assert_eq!(task.title, "Fix authentication bug");
        assert!(h.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_edit_targets_detail_task_when_detail_active() {
        let mut h = Harness::new(80, 24, LayoutKind::SplitHorizontal).await;
        h.press(KeyCode::Down).await;
        h.press(KeyCode::Tab).await;
        assert!(h.controller.detail().is_focused());
        h.press(KeyCode::Char('e')).await;
        assert_eq!(h.controller.edit().editing(), Some(&TaskId::new("t-2")));

        h.press(KeyCode::Esc).await;
        assert!(h.controller.detail().is_focused());

        // Inside search, `e` is part of the query
        h.press(KeyCode::Char('/')).await;
        h.press(KeyCode::Char('e')).await;
        assert!(!h.controller.is_editing());
        assert_eq!(h.controller.search().query(), "e");
    }

    // ============================================================
    // Live updates
    // ============================================================

    #[tokio::test]
    async fn test_store_changes_reach_list() {
        let mut h = Harness::new(80, 24, LayoutKind::SplitHorizontal).await;
        h.store
            .save(Task::new("t-6", "Triage inbox").with_priority(TaskPriority::Critical))
            .await
            .unwrap();
        h.sync_store().await;
        assert_eq!(h.controller.list().tasks().len(), 6);
        assert!(h.render());
        assert!(h.screen().contains("Triage inbox"));
    }

    #[tokio::test]
    async fn test_deleted_detail_task_falls_back_to_selection() {
        let mut h = Harness::new(80, 24, LayoutKind::SplitHorizontal).await;
        assert_eq!(h.detail_id().as_deref(), Some("t-1"));
        h.store.delete(&"t-1".into()).await.unwrap();
        h.sync_store().await;
        assert_eq!(h.controller.list().tasks().len(), 4);
        assert_eq!(h.selected_id().as_deref(), Some("t-2"));
        assert_eq!(h.detail_id().as_deref(), Some("t-2"));
    }

    #[tokio::test]
    async fn test_space_toggles_status() {
        let mut h = Harness::new(80, 24, LayoutKind::SplitHorizontal).await;
        assert!(h.press(KeyCode::Char(' ')).await);
        let task = h.store.find_by_id(&"t-1".into()).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);

        h.sync_store().await;
        assert_eq!(
            h.controller.detail().task().map(|t| t.status),
            Some(TaskStatus::InProgress)
        );
    }

    #[tokio::test]
    async fn test_filter_cycle_and_filtered_updates() {
        let mut h = Harness::new(80, 24, LayoutKind::SplitHorizontal).await;
        h.press(KeyCode::Char('f')).await;
        assert_eq!(h.controller.status_filter(), Some(TaskStatus::Pending));
        let ids: Vec<String> = h
            .controller
            .list()
            .tasks()
            .iter()
            .map(|t| t.id.to_string())
            .collect();
        assert_eq!(ids, vec!["t-1", "t-3", "t-5"]);
        assert!(h.render());
        assert!(h.screen().contains("[Pending]"));

        h.press(KeyCode::Char(' ')).await;
        h.sync_store().await;
        assert_eq!(h.controller.list().tasks().len(), 2);

        for _ in 0..5 {
            h.press(KeyCode::Char('f')).await;
        }
        assert_eq!(h.controller.status_filter(), None);
        assert_eq!(h.controller.list().tasks().len(), 5);
    }

    #[tokio::test]
    async fn test_reload_picks_up_changes() {
        let mut h = Harness::new(80, 24, LayoutKind::SplitHorizontal).await;
        h.store.save(Task::new("t-6", "Quiet change")).await.unwrap();
        h.press(KeyCode::Char('r')).await;
        assert_eq!(h.controller.list().tasks().len(), 6);
    }

    // ============================================================
    // Quit
    // ============================================================

    #[tokio::test]
    async fn test_quit_disposes_everything() {
        let mut h = Harness::new(80, 24, LayoutKind::SplitHorizontal).await;
        assert!(h.service.subscription_count() > 0);
        h.press(KeyCode::Char('q')).await;
        assert!(h.controller.should_quit());
        assert!(h.controller.is_disposed());
        assert!(h.controller.surface().is_disposed());
        assert_eq!(h.service.subscription_count(), 0);
        assert!(!h.render());
    }

    #[tokio::test]
    async fn test_ctrl_q_quits_from_search() {
        let mut h = Harness::new(80, 24, LayoutKind::SplitHorizontal).await;
        h.press(KeyCode::Char('/')).await;
        h.press_with(KeyCode::Char('q'), KeyModifiers::CONTROL).await;
        assert!(h.controller.should_quit());
    }

    #[tokio::test]
    async fn test_app_loop_with_injected_keys() {
        let store = Arc::new(InMemoryTaskStore::with_tasks(sample_tasks()));
        let app = App::new(ViewerConfig::default(), store.clone(), store.clone());
        let surface = RatatuiSurface::new(TestBackend::new(80, 24)).unwrap();
        let input = surface.listeners();

        let keys = async {
            input.dispatch_key(KeyEvent::new(KeyCode::Char('j'), KeyModifiers::NONE));
            input.dispatch_key(KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE));
            input.dispatch_key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL));
        };
        let (result, ()) = tokio::join!(app.run_with_surface(Box::new(surface)), keys);
        result.unwrap();

        let task = store.find_by_id(&"t-2".into()).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.completed_at.is_some());
    }
}
