use std::sync::Arc;

use parking_lot::Mutex;
use sysinfo::System;
use tally::Metric;

/// Host memory and per-core CPU utilization
pub struct HostSampler {
    system: Arc<Mutex<System>>,
}

impl HostSampler {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
        }
    }

    pub async fn sample(&self) -> Vec<Metric> {
        let system = Arc::clone(&self.system);
        let sampled = tokio::task::spawn_blocking(move || {
            let mut system = system.lock();
            system.refresh_memory();
            system.refresh_cpu_usage();

            let mut metrics = vec![
                Metric::gauge("TotalMemory", system.total_memory() as f64),
                Metric::gauge("FreeMemory", system.free_memory() as f64),
            ];
            let cpus = system.cpus();
            if cpus.is_empty() {
                tracing::warn!("No CPU statistics available, skipping utilization");
            }
            metrics.extend(cpus.iter().enumerate().map(|(i, cpu)| {
                Metric::gauge(format!("CPUutilization{}", i + 1), f64::from(cpu.cpu_usage()))
            }));
            metrics
        })
        .await;

        match sampled {
            Ok(metrics) => metrics,
            Err(e) => {
                tracing::warn!(error = %e, "Host sampling task failed");
                Vec::new()
            }
        }
    }
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sample_reports_memory_and_cores() {
        let metrics = HostSampler::new().sample().await;
        let ids: Vec<_> = metrics.iter().map(Metric::id).collect();

        assert!(ids.contains(&"TotalMemory"));
        assert!(ids.contains(&"FreeMemory"));
        assert!(ids.iter().all(|id| *id != "CPUutilization0"));
        if ids.iter().any(|id| id.starts_with("CPUutilization")) {
            assert!(ids.contains(&"CPUutilization1"));
        }
    }
}
