use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tally::Metric;
use tokio::runtime::Handle;

use crate::core::constants::RANDOM_VALUE;

/// Process and async runtime statistics for the agent itself
pub struct RuntimeSampler {
    system: Arc<Mutex<System>>,
    pid: Option<Pid>,
}

impl RuntimeSampler {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!(error = %e, "Process statistics unavailable");
                None
            }
        };
        Self {
            system: Arc::new(Mutex::new(System::new())),
            pid,
        }
    }

    pub async fn sample(&self) -> Vec<Metric> {
        let mut metrics = self.process_sample().await;
        metrics.extend(runtime_sample());
        metrics.push(Metric::gauge(RANDOM_VALUE, rand::random::<f64>()));
        metrics
    }

    async fn process_sample(&self) -> Vec<Metric> {
        let Some(pid) = self.pid else {
            return Vec::new();
        };
        let system = Arc::clone(&self.system);

        let sampled = tokio::task::spawn_blocking(move || {
            let mut system = system.lock();
            system.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[pid]),
                true,
                ProcessRefreshKind::everything(),
            );
            system.process(pid).map(|process| {
                let disk = process.disk_usage();
                vec![
                    Metric::gauge("ProcessResidentMemory", process.memory() as f64),
                    Metric::gauge("ProcessVirtualMemory", process.virtual_memory() as f64),
                    Metric::gauge("ProcessCPUUsage", f64::from(process.cpu_usage())),
                    Metric::gauge("ProcessRunTime", process.run_time() as f64),
                    Metric::gauge("ProcessStartTime", process.start_time() as f64),
                    Metric::gauge("ProcessDiskReadBytes", disk.read_bytes as f64),
                    Metric::gauge("ProcessDiskWrittenBytes", disk.written_bytes as f64),
                    Metric::gauge("ProcessDiskTotalReadBytes", disk.total_read_bytes as f64),
                    Metric::gauge(
                        "ProcessDiskTotalWrittenBytes",
                        disk.total_written_bytes as f64,
                    ),
                    Metric::gauge(
                        "ProcessThreads",
                        process.tasks().map_or(1, |tasks| tasks.len().max(1)) as f64,
                    ),
                ]
            })
        })
        .await;

        match sampled {
            Ok(Some(metrics)) => metrics,
            Ok(None) => {
                tracing::warn!(pid = %pid, "Agent process not found in process table");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Process sampling task failed");
                Vec::new()
            }
        }
    }
}

/// Scheduler statistics of the tokio runtime the agent runs on
fn runtime_sample() -> Vec<Metric> {
    let runtime = Handle::current().metrics();
    let workers = runtime.num_workers();

    let mut busy = Duration::ZERO;
    let mut max_busy = Duration::ZERO;
    let mut parks = 0u64;
    for worker in 0..workers {
        let worker_busy = runtime.worker_total_busy_duration(worker);
        busy += worker_busy;
        max_busy = max_busy.max(worker_busy);
        parks += runtime.worker_park_count(worker);
    }

    vec![
        Metric::gauge("RuntimeWorkers", workers as f64),
        Metric::gauge("RuntimeAliveTasks", runtime.num_alive_tasks() as f64),
        Metric::gauge(
            "RuntimeGlobalQueueDepth",
            runtime.global_queue_depth() as f64,
        ),
        Metric::gauge("RuntimeBusySeconds", busy.as_secs_f64()),
        Metric::gauge("RuntimeMaxWorkerBusySeconds", max_busy.as_secs_f64()),
        Metric::gauge("RuntimeParkCount", parks as f64),
    ]
}

impl Default for RuntimeSampler {
    fn default() -> Self {
        Self::new()
    }
}
