use std::time::{Instant, SystemTime, UNIX_EPOCH};

use mesh_metrics::{LabelSet, Registry, RegistryManager};
use tracing::debug;

/// Populates registries with metrics gathered from outside of the instrumented code.
///
/// Collectors are run by a [`PrometheusSink`](crate::PrometheusSink) right before it renders, so
/// the values they write are as fresh as the output.
pub trait Collector: Send + Sync {
    /// Collects the current values into registries of `manager`.
    fn collect(&self, manager: &RegistryManager);
}

fn set_gauge(registry: &Registry, key: &str, value: i64) {
    match registry.gauge(key) {
        Ok(gauge) => gauge.update(value),
        Err(e) => debug!(error = %e, key, "failed to update collected gauge"),
    }
}

fn saturating_i64<T: TryInto<i64>>(value: T) -> i64 {
    value.try_into().unwrap_or(i64::MAX)
}

/// Collects metrics about the current process.
///
/// Values are written as gauges into the `process` registry, which has no labels:
///
/// - `start_time_seconds`: when the collector was created, in seconds since the Unix epoch
/// - `uptime_seconds`: seconds elapsed since the collector was created
///
/// On Linux, the following are also read from `/proc/self`:
///
/// - `resident_memory_bytes`
/// - `virtual_memory_bytes`
/// - `threads`
/// - `open_fds`
#[derive(Debug)]
pub struct ProcessCollector {
    start_time: SystemTime,
    started: Instant,
}

impl ProcessCollector {
    /// Type name of the registry this collector writes to.
    pub const TYPE_NAME: &'static str = "process";

    /// Creates a new `ProcessCollector`.
    pub fn new() -> Self {
        ProcessCollector { start_time: SystemTime::now(), started: Instant::now() }
    }
}

impl Default for ProcessCollector {
    fn default() -> Self {
        ProcessCollector::new()
    }
}

impl Collector for ProcessCollector {
    fn collect(&self, manager: &RegistryManager) {
        let registry = match manager.new_or_existing(Self::TYPE_NAME, LabelSet::empty()) {
            Ok(registry) => registry,
            Err(e) => {
                debug!(error = %e, "failed to get process registry");
                return;
            }
        };

        let start_time = self.start_time.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
        set_gauge(&registry, "start_time_seconds", saturating_i64(start_time));
        set_gauge(&registry, "uptime_seconds", saturating_i64(self.started.elapsed().as_secs()));

        #[cfg(target_os = "linux")]
        procfs::collect(&registry);
    }
}

#[cfg(target_os = "linux")]
mod procfs {
    use std::{fs, io};

    use mesh_metrics::Registry;
    use tracing::debug;

    use super::{saturating_i64, set_gauge};

    #[derive(Debug, Default, PartialEq, Eq)]
    pub(super) struct Status {
        pub resident_bytes: Option<u64>,
        pub virtual_bytes: Option<u64>,
        pub threads: Option<u64>,
    }

    pub(super) fn collect(registry: &Registry) {
        match fs::read_to_string("/proc/self/status") {
            Ok(contents) => {
                let status = parse_status(&contents);
                if let Some(bytes) = status.resident_bytes {
                    set_gauge(registry, "resident_memory_bytes", saturating_i64(bytes));
                }
                if let Some(bytes) = status.virtual_bytes {
                    set_gauge(registry, "virtual_memory_bytes", saturating_i64(bytes));
                }
                if let Some(threads) = status.threads {
                    set_gauge(registry, "threads", saturating_i64(threads));
                }
            }
            Err(e) => debug!(error = %e, "failed to read /proc/self/status"),
        }

        match count_open_fds() {
            Ok(count) => set_gauge(registry, "open_fds", saturating_i64(count)),
            Err(e) => debug!(error = %e, "failed to read /proc/self/fd"),
        }
    }

    fn count_open_fds() -> io::Result<usize> {
        // The directory handle used for reading shows up as an entry of its own.
        let count = fs::read_dir("/proc/self/fd")?.count();
        Ok(count.saturating_sub(1))
    }

    pub(super) fn parse_status(contents: &str) -> Status {
        let mut status = Status::default();
        for line in contents.lines() {
            let Some((field, rest)) = line.split_once(':') else {
                continue;
            };
            let mut parts = rest.split_whitespace();
            let value = parts.next().and_then(|v| v.parse::<u64>().ok());
            let scale = match parts.next() {
                Some("kB") => 1024,
                _ => 1,
            };

            match field {
                "VmRSS" => status.resident_bytes = value.map(|v| v.saturating_mul(scale)),
                "VmSize" => status.virtual_bytes = value.map(|v| v.saturating_mul(scale)),
                "Threads" => status.threads = value,
                _ => {}
            }
        }
        status
    }
}

/// Collects metrics about the Tokio runtime.
///
/// Values are written as gauges into the `runtime` registry, which has no labels:
///
/// - `workers`: number of worker threads
/// - `alive_tasks`: number of tasks currently alive
/// - `global_queue_depth`: number of tasks waiting in the global queue
///
/// The runtime is the one that was current when the collector was created, or failing that, the
/// one current at collection time.  Outside of any runtime, collecting does nothing.
#[cfg(feature = "async-runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "async-runtime")))]
#[derive(Debug)]
pub struct RuntimeCollector {
    handle: Option<tokio::runtime::Handle>,
}

#[cfg(feature = "async-runtime")]
impl RuntimeCollector {
    /// Type name of the registry this collector writes to.
    pub const TYPE_NAME: &'static str = "runtime";

    /// Creates a new `RuntimeCollector`.
    pub fn new() -> Self {
        RuntimeCollector { handle: tokio::runtime::Handle::try_current().ok() }
    }
}

#[cfg(feature = "async-runtime")]
impl Default for RuntimeCollector {
    fn default() -> Self {
        RuntimeCollector::new()
    }
}

#[cfg(feature = "async-runtime")]
impl Collector for RuntimeCollector {
    fn collect(&self, manager: &RegistryManager) {
        let handle = match &self.handle {
            Some(handle) => handle.clone(),
            None => match tokio::runtime::Handle::try_current() {
                Ok(handle) => handle,
                Err(_) => return,
            },
        };

        let registry = match manager.new_or_existing(Self::TYPE_NAME, LabelSet::empty()) {
            Ok(registry) => registry,
            Err(e) => {
                debug!(error = %e, "failed to get runtime registry");
                return;
            }
        };

        let metrics = handle.metrics();
        set_gauge(&registry, "workers", saturating_i64(metrics.num_workers()));
        set_gauge(&registry, "alive_tasks", saturating_i64(metrics.num_alive_tasks()));
        set_gauge(&registry, "global_queue_depth", saturating_i64(metrics.global_queue_depth()));
    }
}
