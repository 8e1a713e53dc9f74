use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use chrono::{DateTime, Local};
use dashmap::DashMap;
use log::{error, info};
use tokio::{
    sync::{Semaphore, mpsc, oneshot, watch},
    task::JoinHandle,
};

use crate::{
    analysis::{AnalysisInvoker, AnalysisRequest},
    batch::{
        BatchConfig,
        task::{CompletionLogEntry, CompletionRecord, ProgressPulse, Task, TaskStatus},
    },
    llm,
};

pub(super) struct WorkerEntry {
    pub symbol: String,
    pub handle: JoinHandle<()>,
}

/// State shared between the submission path, the workers and the aggregator
pub(super) struct Shared {
    pub config: BatchConfig,
    pub run_flag: AtomicBool,
    pub staged: Mutex<VecDeque<Task>>,
    pub active_workers: DashMap<String, WorkerEntry>,
    pub semaphore: Arc<Semaphore>,
    pub completion_tx: mpsc::UnboundedSender<CompletionRecord>,
    pub completion_rx: Mutex<mpsc::UnboundedReceiver<CompletionRecord>>,
    pub last_activity: Mutex<Option<DateTime<Local>>>,
    pub completion_log: Mutex<Vec<CompletionLogEntry>>,
    pub submitted_total: AtomicUsize,
    pub completed_total: AtomicUsize,
    pub pulse_tx: watch::Sender<ProgressPulse>,
}

impl Shared {
    pub fn new(config: BatchConfig) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (pulse_tx, _) = watch::channel(ProgressPulse::default());
        let semaphore = Arc::new(Semaphore::new(config.max_concurrency));

        Self {
            config,
            run_flag: AtomicBool::new(false),
            staged: Mutex::new(VecDeque::new()),
            active_workers: DashMap::new(),
            semaphore,
            completion_tx,
            completion_rx: Mutex::new(completion_rx),
            last_activity: Mutex::new(None),
            completion_log: Mutex::new(Vec::new()),
            submitted_total: AtomicUsize::new(0),
            completed_total: AtomicUsize::new(0),
            pulse_tx,
        }
    }

    pub fn touch_activity(&self) {
        let mut last_activity = self
            .last_activity
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        *last_activity = Some(Local::now());
    }

    pub fn publish_pulse(&self) {
        self.pulse_tx.send_replace(ProgressPulse {
            submitted: self.submitted_total.load(Ordering::SeqCst),
            running: self.active_workers.len(),
            completed: self.completed_total.load(Ordering::SeqCst),
        });
    }

    fn log_completion(&self, task: &Task) {
        let completed_at = task.end_time.unwrap_or_else(Local::now);
        let duration_secs = match (task.start_time, task.end_time) {
            (Some(start), Some(end)) => {
                end.signed_duration_since(start).num_milliseconds() as f64 / 1000.0
            }
            _ => 0.0,
        };

        let mut log = self
            .completion_log
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        log.push(CompletionLogEntry {
            task_id: task.task_id.clone(),
            symbol: task.symbol.clone(),
            completed_at,
            duration_secs,
        });
    }
}

pub(super) fn spawn_worker<I: AnalysisInvoker>(invoker: Arc<I>, shared: Arc<Shared>, task: Task) {
    let task_id = task.task_id.clone();
    let symbol = task.symbol.clone();

    shared.submitted_total.fetch_add(1, Ordering::SeqCst);

    // The worker must not outrun its own registration, or its self-removal
    // would leave a stale entry behind for the dead-worker sweep to trip on
    let (registered_tx, registered_rx) = oneshot::channel();

    let handle = tokio::spawn(run_worker(invoker, shared.clone(), task, registered_rx));
    shared
        .active_workers
        .insert(task_id.clone(), WorkerEntry { symbol, handle });
    shared.publish_pulse();
    let _ = registered_tx.send(());

    info!("Launched analysis worker (ID: {task_id})");
}

async fn run_worker<I: AnalysisInvoker>(
    invoker: Arc<I>,
    shared: Arc<Shared>,
    mut task: Task,
    registered: oneshot::Receiver<()>,
) {
    let _ = registered.await;

    let Ok(_permit) = shared.semaphore.clone().acquire_owned().await else {
        return;
    };

    // A stop requested while this worker queued for a permit discards it
    // before any work happens, leaving no completion record
    if !shared.run_flag.load(Ordering::SeqCst) {
        shared.active_workers.remove(&task.task_id);
        shared.submitted_total.fetch_sub(1, Ordering::SeqCst);
        shared.publish_pulse();
        info!(
            "Discarded queued task before launch: {} (ID: {})",
            task.symbol, task.task_id
        );
        return;
    }

    info!("Starting analysis task: {} (ID: {})", task.symbol, task.task_id);
    task.status = TaskStatus::Running;
    task.start_time = Some(Local::now());

    let route = llm::resolve_route(
        task.llm_config
            .as_ref()
            .and_then(|cfg| cfg.llm_provider.as_deref()),
        task.llm_config
            .as_ref()
            .and_then(|cfg| cfg.llm_model.as_deref()),
    );
    info!(
        "Using LLM route: provider={}, model={}",
        route.provider, route.model
    );

    let request = AnalysisRequest {
        symbol: task.symbol.clone(),
        params: task.params.clone(),
        llm_provider: route.provider,
        llm_model: route.model,
    };

    match invoker.run(&request).await {
        Ok(report) => {
            task.status = TaskStatus::Completed;
            task.end_time = Some(Local::now());
            task.result = Some(report);

            shared.touch_activity();
            shared.log_completion(&task);

            info!(
                "Completed analysis task: {} (ID: {})",
                task.symbol, task.task_id
            );
        }
        Err(err) => {
            task.status = TaskStatus::Failed;
            task.end_time = Some(Local::now());
            task.error = Some(err.to_string());

            shared.touch_activity();

            error!(
                "Analysis task failed: {} (ID: {}) - {}",
                task.symbol, task.task_id, err
            );
        }
    }

    let task_id = task.task_id.clone();
    let _ = shared.completion_tx.send(CompletionRecord::from(task));
    shared.completed_total.fetch_add(1, Ordering::SeqCst);
    shared.active_workers.remove(&task_id);
    shared.publish_pulse();
}
