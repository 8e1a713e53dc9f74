use std::{
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

use log::{info, warn};
use tokio::sync::watch;

use crate::{
    analysis::{AnalysisInvoker, AnalysisParams, LlmOverride, ParamsValidator},
    batch::{
        engine::Shared,
        task::{CompletionLogEntry, ProgressPulse, ProgressSnapshot, Task},
    },
    symbol,
};

pub mod task;

mod engine;
mod progress;

#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Max analyses running at once, excess workers queue for a permit
    pub max_concurrency: usize,

    /// How long after the last activity an idle batch is considered done
    pub quiescence: Duration,

    /// How long `stop_all_tasks` waits for each worker before abandoning it
    pub stop_join_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            quiescence: Duration::from_secs(5),
            stop_join_timeout: Duration::from_secs(1),
        }
    }
}

/// Facade over the batch engine. Construct one and pass it around, there is
/// no ambient instance.
pub struct BatchController<I, V> {
    invoker: Arc<I>,
    validator: V,
    shared: Arc<Shared>,
}

impl<I: AnalysisInvoker, V: ParamsValidator> BatchController<I, V> {
    pub fn new(invoker: I, validator: V, config: BatchConfig) -> Self {
        Self {
            invoker: Arc::new(invoker),
            validator,
            shared: Arc::new(Shared::new(config)),
        }
    }

    pub fn parse_symbols(&self, text: &str) -> Vec<String> {
        symbol::parse_symbols(text)
    }

    /// Launch one worker per symbol that passes validation and return the
    /// accepted task ids. Rejected symbols are logged and skipped, they never
    /// abort the rest of the batch.
    pub fn start_batch_analysis(
        &self,
        symbols: &[String],
        params: &AnalysisParams,
        llm_config: Option<LlmOverride>,
    ) -> Vec<String> {
        if symbols.is_empty() {
            return vec![];
        }

        info!("Starting batch analysis of {} symbols", symbols.len());

        let mut task_ids = vec![];
        for symbol in symbols {
            if let Err(err) = self.validator.validate(symbol, params) {
                warn!("Symbol '{symbol}' was rejected: {err}");
                continue;
            }

            let task = Task::new(symbol, params.clone(), llm_config.clone());
            let task_id = task.task_id.clone();

            // Stage then immediately claim, so a stop request can discard
            // work that has not launched yet
            {
                let mut staged = self.shared.staged.lock().unwrap_or_else(|err| err.into_inner());
                staged.push_back(task);
            }
            let claimed = self
                .shared
                .staged
                .lock()
                .unwrap_or_else(|err| err.into_inner())
                .pop_front();
            let Some(task) = claimed else {
                continue;
            };

            if task_ids.is_empty() {
                self.shared.run_flag.store(true, Ordering::SeqCst);
            }

            engine::spawn_worker(self.invoker.clone(), self.shared.clone(), task);
            task_ids.push(task_id);
        }

        task_ids
    }

    /// Non-blocking progress snapshot. Drained completion records are
    /// consumed by this call, accumulate them across polls.
    pub fn get_progress_status(&self) -> ProgressSnapshot {
        progress::snapshot(&self.shared)
    }

    /// Push-style companion to `get_progress_status`, fires on every task
    /// transition
    pub fn subscribe(&self) -> watch::Receiver<ProgressPulse> {
        self.shared.pulse_tx.subscribe()
    }

    pub fn completion_log(&self) -> Vec<CompletionLogEntry> {
        self.shared
            .completion_log
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    /// Cooperative stop: queued tasks are discarded, running workers get a
    /// bounded join and are then abandoned. An in-flight analysis call is
    /// never interrupted.
    pub async fn stop_all_tasks(&self) {
        info!("Stopping all batch analysis tasks");
        self.shared.run_flag.store(false, Ordering::SeqCst);

        let discarded = {
            let mut staged = self.shared.staged.lock().unwrap_or_else(|err| err.into_inner());
            let count = staged.len();
            staged.clear();
            count
        };
        if discarded > 0 {
            info!("Discarded {discarded} staged tasks");
        }

        let task_ids: Vec<String> = self
            .shared
            .active_workers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        for task_id in task_ids {
            if let Some((_, mut entry)) = self.shared.active_workers.remove(&task_id) {
                if tokio::time::timeout(self.shared.config.stop_join_timeout, &mut entry.handle)
                    .await
                    .is_err()
                {
                    warn!("Worker {task_id} did not stop within the timeout, abandoning it");
                }
            }
        }

        self.shared.publish_pulse();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::{
            Mutex as StdMutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use super::{task::*, *};
    use crate::{
        analysis::{AnalysisReport, AnalysisRequest, Prospect},
        error::{SbResult, StockbatchError},
    };

    #[derive(Default)]
    struct InvokerProbe {
        calls: StdMutex<Vec<String>>,
        concurrent: AtomicUsize,
        peak: AtomicUsize,
    }

    impl InvokerProbe {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    struct MockInvoker {
        delay: Duration,
        fail: HashSet<String>,
        die: HashSet<String>,
        probe: Arc<InvokerProbe>,
    }

    impl MockInvoker {
        fn new(delay_ms: u64) -> Self {
            Self {
                delay: Duration::from_millis(delay_ms),
                fail: HashSet::new(),
                die: HashSet::new(),
                probe: Arc::new(InvokerProbe::default()),
            }
        }

        fn failing(mut self, symbol: &str) -> Self {
            self.fail.insert(symbol.to_string());
            self
        }

        fn dying(mut self, symbol: &str) -> Self {
            self.die.insert(symbol.to_string());
            self
        }

        fn probe(&self) -> Arc<InvokerProbe> {
            self.probe.clone()
        }
    }

    impl AnalysisInvoker for MockInvoker {
        async fn run(&self, request: &AnalysisRequest) -> SbResult<AnalysisReport> {
            self.probe
                .calls
                .lock()
                .unwrap()
                .push(request.symbol.clone());

            let concurrent = self.probe.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            self.probe.peak.fetch_max(concurrent, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;
            self.probe.concurrent.fetch_sub(1, Ordering::SeqCst);

            if self.die.contains(&request.symbol) {
                panic!("worker killed");
            }
            if self.fail.contains(&request.symbol) {
                return Err(StockbatchError::NoData(
                    "NO_DATA",
                    format!("No data for {}", request.symbol),
                ));
            }

            Ok(AnalysisReport {
                prospect: Prospect::Neutral,
                rating: 50,
                summary: "ok".to_string(),
            })
        }
    }

    struct MockValidator {
        reject: HashSet<String>,
    }

    impl MockValidator {
        fn accept_all() -> Self {
            Self {
                reject: HashSet::new(),
            }
        }

        fn rejecting(symbol: &str) -> Self {
            Self {
                reject: HashSet::from([symbol.to_string()]),
            }
        }
    }

    impl ParamsValidator for MockValidator {
        fn validate(&self, symbol: &str, _params: &AnalysisParams) -> SbResult<()> {
            if self.reject.contains(symbol) {
                Err(StockbatchError::Invalid(
                    "SYMBOL_INVALID",
                    format!("Symbol '{symbol}' was rejected"),
                ))
            } else {
                Ok(())
            }
        }
    }

    fn test_config() -> BatchConfig {
        BatchConfig {
            max_concurrency: 8,
            quiescence: Duration::from_millis(200),
            stop_join_timeout: Duration::from_millis(200),
        }
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    async fn collect_records<I: AnalysisInvoker, V: ParamsValidator>(
        controller: &BatchController<I, V>,
        want: usize,
    ) -> Vec<CompletionRecord> {
        let mut records = vec![];
        for _ in 0..500 {
            records.extend(controller.get_progress_status().drained);
            if records.len() >= want {
                return records;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        panic!(
            "timed out waiting for {want} completion records, got {}",
            records.len()
        );
    }

    #[tokio::test]
    async fn test_rejected_symbol_skipped_without_aborting_batch() {
        let invoker = MockInvoker::new(10);
        let probe = invoker.probe();
        let controller =
            BatchController::new(invoker, MockValidator::rejecting("BAD"), test_config());

        let task_ids = controller.start_batch_analysis(
            &symbols(&["AAPL", "BAD", "MSFT"]),
            &AnalysisParams::default(),
            None,
        );
        assert_eq!(task_ids.len(), 2);

        let records = collect_records(&controller, 2).await;
        assert_eq!(records.len(), 2);

        let calls = probe.calls();
        assert_eq!(calls.len(), 2);
        assert!(!calls.contains(&"BAD".to_string()));
    }

    #[tokio::test]
    async fn test_invoker_called_exactly_once_per_task() {
        let invoker = MockInvoker::new(10).failing("TSLA");
        let probe = invoker.probe();
        let controller =
            BatchController::new(invoker, MockValidator::accept_all(), test_config());

        let batch = symbols(&["AAPL", "TSLA", "MSFT", "GOOGL", "NVDA"]);
        let task_ids =
            controller.start_batch_analysis(&batch, &AnalysisParams::default(), None);
        assert_eq!(task_ids.len(), 5);

        collect_records(&controller, 5).await;

        let calls = probe.calls();
        assert_eq!(calls.len(), 5);
        let called: HashSet<String> = calls.into_iter().collect();
        let expected: HashSet<String> = batch.into_iter().collect();
        assert_eq!(called, expected);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_its_task() {
        let invoker = MockInvoker::new(10).failing("B");
        let controller =
            BatchController::new(invoker, MockValidator::accept_all(), test_config());

        controller.start_batch_analysis(&symbols(&["A", "B", "C"]), &AnalysisParams::default(), None);
        let records = collect_records(&controller, 3).await;

        for record in &records {
            if record.symbol == "B" {
                assert_eq!(record.status, TaskStatus::Failed);
                assert!(record.error.is_some());
                assert!(record.result.is_none());
            } else {
                assert_eq!(record.status, TaskStatus::Completed);
                assert!(record.result.is_some());
                assert!(record.error.is_none());
                assert!(record.duration_secs().is_some());
            }
        }

        // Only successful completions reach the log
        let log = controller.completion_log();
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|entry| entry.symbol != "B"));
    }

    #[tokio::test]
    async fn test_progress_reaches_quiescent_completion() {
        let controller = BatchController::new(
            MockInvoker::new(20),
            MockValidator::accept_all(),
            test_config(),
        );

        controller.start_batch_analysis(&symbols(&["AAPL", "MSFT"]), &AnalysisParams::default(), None);
        collect_records(&controller, 2).await;

        let status = controller.get_progress_status();
        assert_eq!(status.running_tasks, 0);
        assert_eq!(status.total_tasks, 2);
        assert_eq!(status.completed_tasks, 2);
        assert_eq!(status.progress_percentage, 100.0);

        // The finish heuristic holds the running state until the quiescence
        // window has elapsed
        let mut finished = false;
        for _ in 0..100 {
            if !controller.get_progress_status().is_running {
                finished = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(finished);
    }

    #[tokio::test]
    async fn test_dead_worker_yields_unknown_record() {
        let controller = BatchController::new(
            MockInvoker::new(10).dying("AAPL"),
            MockValidator::accept_all(),
            test_config(),
        );

        let task_ids =
            controller.start_batch_analysis(&symbols(&["AAPL"]), &AnalysisParams::default(), None);
        assert_eq!(task_ids.len(), 1);

        let mut synthetic = None;
        let mut last_status = None;
        for _ in 0..500 {
            let status = controller.get_progress_status();
            if let Some(record) = status.drained.first() {
                synthetic = Some(record.clone());
                last_status = Some(status);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let record = synthetic.expect("no synthetic record for the dead worker");
        assert_eq!(record.task_id, task_ids[0]);
        assert_eq!(record.status, TaskStatus::Unknown);
        assert!(record.auto_detected);
        assert!(record.result.is_none());

        let status = last_status.unwrap();
        assert!(status.dead_workers_detected >= 1);
        assert!(status.force_completion);
        assert!(!status.is_running);
        assert_eq!(status.completed_tasks, 1);
    }

    #[tokio::test]
    async fn test_stop_is_cooperative() {
        let invoker = MockInvoker::new(5_000);
        let probe = invoker.probe();
        let controller =
            BatchController::new(invoker, MockValidator::accept_all(), test_config());

        controller.start_batch_analysis(&symbols(&["AAPL", "MSFT"]), &AnalysisParams::default(), None);

        // Let both workers enter the invoker before stopping
        for _ in 0..100 {
            if probe.calls().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        controller.stop_all_tasks().await;

        let status = controller.get_progress_status();
        assert!(!status.is_running);
        assert_eq!(status.running_tasks, 0);
        // Abandoned workers never got to report
        assert!(status.drained.is_empty());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let invoker = MockInvoker::new(30);
        let probe = invoker.probe();
        let config = BatchConfig {
            max_concurrency: 1,
            ..test_config()
        };
        let controller = BatchController::new(invoker, MockValidator::accept_all(), config);

        controller.start_batch_analysis(
            &symbols(&["AAPL", "MSFT", "GOOGL"]),
            &AnalysisParams::default(),
            None,
        );
        collect_records(&controller, 3).await;

        assert_eq!(probe.peak.load(Ordering::SeqCst), 1);
        assert_eq!(probe.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_records_are_consumed_exactly_once() {
        let controller = BatchController::new(
            MockInvoker::new(10),
            MockValidator::accept_all(),
            test_config(),
        );

        controller.start_batch_analysis(&symbols(&["AAPL", "MSFT"]), &AnalysisParams::default(), None);
        let records = collect_records(&controller, 2).await;
        assert_eq!(records.len(), 2);

        // Already-drained records never come back, the durable totals do
        let status = controller.get_progress_status();
        assert!(status.drained.is_empty());
        assert_eq!(status.completed_tasks, 2);
        assert_eq!(status.total_tasks, 2);
    }

    #[tokio::test]
    async fn test_pulse_reports_transitions() {
        let controller = BatchController::new(
            MockInvoker::new(10),
            MockValidator::accept_all(),
            test_config(),
        );
        let mut pulses = controller.subscribe();

        controller.start_batch_analysis(&symbols(&["AAPL", "MSFT"]), &AnalysisParams::default(), None);

        let observed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if pulses.changed().await.is_err() {
                    panic!("pulse channel closed");
                }
                let pulse = *pulses.borrow_and_update();
                if pulse.completed == 2 {
                    return pulse;
                }
            }
        })
        .await
        .expect("no completion pulse within timeout");

        assert_eq!(observed.submitted, 2);
        assert_eq!(observed.completed, 2);
    }

    #[tokio::test]
    async fn test_empty_and_fully_rejected_submissions() {
        let controller = BatchController::new(
            MockInvoker::new(10),
            MockValidator::rejecting("BAD"),
            test_config(),
        );

        assert!(
            controller
                .start_batch_analysis(&[], &AnalysisParams::default(), None)
                .is_empty()
        );

        let task_ids =
            controller.start_batch_analysis(&symbols(&["BAD"]), &AnalysisParams::default(), None);
        assert!(task_ids.is_empty());

        // Nothing was accepted, so the batch never enters the running state
        let status = controller.get_progress_status();
        assert!(!status.is_running);
        assert_eq!(status.total_tasks, 0);
        assert_eq!(status.progress_percentage, 0.0);
    }
}
