//! Live task subscriptions.
//!
//! The service listens to store change events and re-delivers fresh data to
//! registered handlers: a single task, the whole collection, or a filtered
//! collection. Handlers are independent; one failing is logged and never
//! stops the others.
//!
//! Each event costs at most two repository reads: one lookup of the event's
//! task shared by its per-task subscribers, and one collection fetch shared
//! by all collection subscribers (plain and filtered).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use taskdeck_core::{Task, TaskEvent, TaskId, TaskRepository};

type TaskHandler = Arc<dyn Fn(Option<&Task>) -> anyhow::Result<()> + Send + Sync>;
type CollectionHandler = Arc<dyn Fn(&[Task]) -> anyhow::Result<()> + Send + Sync>;
type TaskPredicate = Arc<dyn Fn(&Task) -> bool + Send + Sync>;

/// Identifier of one subscription.
pub type SubscriptionId = u64;

enum Subscription {
    Task { id: TaskId, handler: TaskHandler },
    All { handler: CollectionHandler },
    Filtered { predicate: TaskPredicate, handler: CollectionHandler },
}

#[derive(Default)]
struct Registry {
    next_id: SubscriptionId,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
}

type SharedRegistry = Arc<Mutex<Registry>>;

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle returned by the subscribe calls.
///
/// Unsubscribing is explicit; dropping the handle keeps the subscription.
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    registry: Weak<Mutex<Registry>>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => lock(&registry).subscriptions.remove(&self.id).is_some(),
            None => false,
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

/// Outcome of dispatching one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Re-delivers task data to subscribers when the store changes.
pub struct TaskSubscriptionService {
    repository: Arc<dyn TaskRepository>,
    registry: SharedRegistry,
}

impl TaskSubscriptionService {
    pub fn new(repository: Arc<dyn TaskRepository>) -> Self {
        Self {
            repository,
            registry: Arc::default(),
        }
    }

    fn register(&self, subscription: Subscription) -> SubscriptionHandle {
        let mut registry = lock(&self.registry);
        registry.next_id += 1;
        let id = registry.next_id;
        registry.subscriptions.insert(id, subscription);
        SubscriptionHandle {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Watch one task. The handler receives `None` once it is deleted.
    pub fn subscribe_to_task<F>(&self, id: TaskId, handler: F) -> SubscriptionHandle
    where
        F: Fn(Option<&Task>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Subscription::Task {
            id,
            handler: Arc::new(handler),
        })
    }

    /// Watch the whole collection.
    pub fn subscribe_to_all_tasks<F>(&self, handler: F) -> SubscriptionHandle
    where
        F: Fn(&[Task]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Subscription::All {
            handler: Arc::new(handler),
        })
    }

    /// Watch the tasks matching `predicate`.
    pub fn subscribe_to_filtered_tasks<P, F>(&self, predicate: P, handler: F) -> SubscriptionHandle
    where
        P: Fn(&Task) -> bool + Send + Sync + 'static,
        F: Fn(&[Task]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Subscription::Filtered {
            predicate: Arc::new(predicate),
            handler: Arc::new(handler),
        })
    }

    pub fn subscription_count(&self) -> usize {
        lock(&self.registry).subscriptions.len()
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        lock(&self.registry).subscriptions.clear();
    }

    /// Deliver fresh data for `event` to every affected subscriber.
    pub async fn handle_event(&self, event: &TaskEvent) -> DeliveryReport {
        let mut task_handlers = Vec::new();
        let mut collection_handlers = Vec::new();
        {
            let registry = lock(&self.registry);
            for (id, subscription) in &registry.subscriptions {
                match subscription {
                    Subscription::Task { id: task_id, handler } if task_id == &event.task_id => {
                        task_handlers.push((*id, Arc::clone(handler)));
                    }
                    Subscription::Task { .. } => {}
                    Subscription::All { handler } => {
                        collection_handlers.push((*id, None, Arc::clone(handler)));
                    }
                    Subscription::Filtered { predicate, handler } => {
                        collection_handlers.push((
                            *id,
                            Some(Arc::clone(predicate)),
                            Arc::clone(handler),
                        ));
                    }
                }
            }
        }

        let mut report = DeliveryReport::default();

        if !task_handlers.is_empty() {
            match self.repository.find_by_id(&event.task_id).await {
                Ok(task) => {
                    for (id, handler) in task_handlers {
                        report.record(id, handler(task.as_ref()));
                    }
                }
                Err(e) => {
                    warn!(task_id = %event.task_id, error = %e, "task refetch failed");
                    report.failed += task_handlers.len();
                }
            }
        }

        if !collection_handlers.is_empty() {
            match self.repository.find_all(None, None, None).await {
                Ok(page) => {
                    for (id, predicate, handler) in collection_handlers {
                        let result = match predicate {
                            Some(predicate) => {
                                let matching: Vec<Task> = page
                                    .items
                                    .iter()
                                    .filter(|&task| predicate(task))
                                    .cloned()
                                    .collect();
                                handler(&matching)
                            }
                            None => handler(&page.items),
                        };
                        report.record(id, result);
                    }
                }
                Err(e) => {
                    warn!(event = %event.kind, error = %e, "collection refetch failed");
                    report.failed += collection_handlers.len();
                }
            }
        }

        debug!(
            event = %event.kind,
            task_id = %event.task_id,
            delivered = report.delivered,
            failed = report.failed,
            "event dispatched"
        );
        report
    }

    /// Forward store events into [`TaskSubscriptionService::handle_event`]
    /// until the channel closes.
    pub fn spawn_listener(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<TaskEvent>,
    ) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        service.handle_event(&event).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "subscription listener lagged behind store events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            info!("store event stream closed");
        })
    }
}

impl DeliveryReport {
    fn record(&mut self, id: SubscriptionId, result: anyhow::Result<()>) {
        match result {
            Ok(()) => self.delivered += 1,
            Err(e) => {
                warn!(subscription = id, error = %e, "subscription handler failed");
                self.failed += 1;
            }
        }
    }
}
