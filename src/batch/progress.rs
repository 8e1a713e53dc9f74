use std::sync::atomic::Ordering;

use chrono::Local;
use log::{debug, info, warn};

use crate::batch::{
    engine::Shared,
    task::{CompletionRecord, ProgressSnapshot},
};

/// Drain the completion channel, sweep dead workers and derive the
/// point-in-time snapshot. Never blocks, never errors.
pub(super) fn snapshot(shared: &Shared) -> ProgressSnapshot {
    let mut drained: Vec<CompletionRecord> = vec![];
    {
        let mut receiver = shared
            .completion_rx
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        while let Ok(record) = receiver.try_recv() {
            drained.push(record);
        }
    }
    if !drained.is_empty() {
        debug!("Drained {} completion records", drained.len());
    }

    // Workers normally remove themselves from the map right after reporting.
    // An entry whose handle is finished belongs to a worker that died without
    // reporting (panic or abort) and gets a synthetic record instead.
    let mut dead: Vec<(String, String)> = vec![];
    shared.active_workers.retain(|task_id, entry| {
        if entry.handle.is_finished() {
            dead.push((task_id.clone(), entry.symbol.clone()));
            false
        } else {
            true
        }
    });

    for (task_id, symbol) in &dead {
        info!("Detected dead worker: {task_id}");

        if !drained.iter().any(|record| &record.task_id == task_id) {
            warn!("Worker {task_id} ({symbol}) terminated without reporting, outcome unknown");
            drained.push(CompletionRecord::unknown(task_id, symbol));
            shared.completed_total.fetch_add(1, Ordering::SeqCst);
        }
    }
    let dead_workers_detected = dead.len();
    if dead_workers_detected > 0 {
        shared.publish_pulse();
    }

    let running_tasks = shared.active_workers.len();
    let total_tasks = shared.submitted_total.load(Ordering::SeqCst);
    let completed_tasks = shared.completed_total.load(Ordering::SeqCst);

    let last_activity_time = *shared
        .last_activity
        .lock()
        .unwrap_or_else(|err| err.into_inner());
    let time_since_last_activity = last_activity_time.map(|at| {
        Local::now()
            .signed_duration_since(at)
            .num_milliseconds()
            .max(0) as f64
            / 1000.0
    });

    let mut is_running = shared.run_flag.load(Ordering::SeqCst) && running_tasks > 0;
    let mut force_completion = false;

    if shared.run_flag.load(Ordering::SeqCst) && running_tasks == 0 {
        if dead_workers_detected > 0 {
            // Dead workers with nothing left running settle the batch
            // immediately, no quiescence wait
            shared.run_flag.store(false, Ordering::SeqCst);
            force_completion = true;
            info!("All tasks settled after detecting {dead_workers_detected} dead workers");
        } else if completed_tasks > 0 {
            let elapsed = time_since_last_activity.unwrap_or(f64::MAX);
            let quiescence = shared.config.quiescence.as_secs_f64();

            if elapsed > quiescence {
                shared.run_flag.store(false, Ordering::SeqCst);
                info!(
                    "All tasks completed: {completed_tasks} total, last activity {elapsed:.1}s ago"
                );
            } else {
                // Debounce against the race between a worker's final report
                // and the engine's bookkeeping
                is_running = true;
                debug!(
                    "Waiting to confirm completion, {completed_tasks} done, last activity {elapsed:.1}s ago"
                );
            }
        }
    }

    let progress_percentage = if total_tasks > 0 {
        completed_tasks as f64 / total_tasks as f64 * 100.0
    } else {
        0.0
    };

    let completion_log_count = shared
        .completion_log
        .lock()
        .unwrap_or_else(|err| err.into_inner())
        .len();

    ProgressSnapshot {
        total_tasks,
        running_tasks,
        completed_tasks,
        drained,
        is_running,
        progress_percentage,
        last_activity_time,
        time_since_last_activity,
        completion_log_count,
        dead_workers_detected,
        force_completion,
    }
}
