use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use sysinfo::{Disks, Networks, System};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::now_millis;
use crate::core::uplink::EventHub;

/// Fast fields (CPU, memory) refresh on every tick.
pub const SAMPLE_INTERVAL_MS: u64 = 3000;
/// Disk/network aggregates and the cache file refresh on every third tick;
/// those syscalls are an order of magnitude heavier.
pub const SLOW_TICK_EVERY: u64 = 3;

const METRICS_CACHE_FILE: &str = "metrics.json";
const TOKEN_CACHE_FILE: &str = "token_metrics.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuMetrics {
    pub usage: f64,
    pub cores: usize,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryMetrics {
    pub total: u64,
    pub free: u64,
    pub used: u64,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskMetrics {
    pub total: u64,
    pub free: u64,
    pub used: u64,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMetrics {
    pub bytes_received: u64,
    pub bytes_sent: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSnapshot {
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub uptime: u64,
    pub server_uptime: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk: Option<DiskMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkMetrics>,
    pub timestamp: u64,
}

impl Default for SystemSnapshot {
    fn default() -> Self {
        Self {
            cpu: CpuMetrics {
                usage: 0.0,
                cores: 0,
                model: String::new(),
            },
            memory: MemoryMetrics {
                total: 0,
                free: 0,
                used: 0,
                usage_percent: 0.0,
            },
            uptime: 0,
            server_uptime: 0,
            disk: None,
            network: None,
            timestamp: 0,
        }
    }
}

/// Monotonic lifetime token counters; reset only by process restart plus
/// cache-file deletion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetrics {
    pub total_processed: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub by_model: HashMap<String, u64>,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenUsage {
    pub model: Option<String>,
    pub total: u64,
    pub input: Option<u64>,
    pub output: Option<u64>,
}

/// Periodic system sampler plus token accounting. One instance per process;
/// each mutation happens from a single logical writer (the interval task or
/// a request handler), locks only bridge the two.
pub struct MetricsSampler {
    system: Mutex<System>,
    snapshot: RwLock<SystemSnapshot>,
    tokens: RwLock<TokenMetrics>,
    started: Instant,
    ticks: AtomicU64,
    cache_dir: PathBuf,
    events: EventHub,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MetricsSampler {
    /// Build a sampler, reloading warm-restart snapshots from `cache_dir`
    /// when the files parse.
    pub fn new(cache_dir: PathBuf, events: EventHub) -> Arc<Self> {
        let snapshot = load_cache::<SystemSnapshot>(&cache_dir.join(METRICS_CACHE_FILE))
            .unwrap_or_default();
        let tokens =
            load_cache::<TokenMetrics>(&cache_dir.join(TOKEN_CACHE_FILE)).unwrap_or_default();

        Arc::new(Self {
            system: Mutex::new(System::new_all()),
            snapshot: RwLock::new(snapshot),
            tokens: RwLock::new(tokens),
            started: Instant::now(),
            ticks: AtomicU64::new(0),
            cache_dir,
            events,
            task: Mutex::new(None),
        })
    }

    /// Start the interval task. Re-arming replaces any running task.
    pub fn start(self: &Arc<Self>, interval_ms: u64) {
        self.stop();
        let sampler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(interval_ms.max(250)));
            loop {
                interval.tick().await;
                sampler.tick();
            }
        });
        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        info!("Metrics sampler started ({} ms interval)", interval_ms);
    }

    /// The only stop path; there is no timeout or drain.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
            info!("Metrics sampler stopped");
        }
    }

    pub fn restart(self: &Arc<Self>, interval_ms: u64) {
        self.start(interval_ms);
    }

    /// One sampling round: cheap fields always, expensive fields and the
    /// cache file every [`SLOW_TICK_EVERY`] rounds.
    pub fn tick(&self) {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed);
        let slow = tick % SLOW_TICK_EVERY == 0;

        let (cpu, memory, uptime) = {
            let mut sys = self.system.lock().unwrap_or_else(|e| e.into_inner());
            sys.refresh_cpu_usage();
            sys.refresh_memory();

            let cpu = CpuMetrics {
                usage: round1((sys.global_cpu_usage() as f64).clamp(0.0, 100.0)),
                cores: sys.cpus().len(),
                model: sys
                    .cpus()
                    .first()
                    .map(|c| c.brand().to_string())
                    .unwrap_or_else(|| "Unknown CPU".to_string()),
            };
            let total = sys.total_memory();
            let free = sys.available_memory();
            let memory = MemoryMetrics {
                total,
                free,
                used: total.saturating_sub(free),
                usage_percent: memory_usage_percent(total, free),
            };
            (cpu, memory, System::uptime())
        };

        let (disk, network) = if slow { (sample_disk(), sample_network()) } else { (None, None) };

        let snapshot = {
            let mut current = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
            current.cpu = cpu;
            current.memory = memory;
            current.uptime = uptime;
            current.server_uptime = self.started.elapsed().as_secs();
            current.timestamp = now_millis();
            if slow {
                current.disk = disk;
                current.network = network;
            }
            current.clone()
        };

        if slow {
            self.persist(&snapshot);
        }

        if let Ok(data) = serde_json::to_value(&snapshot) {
            self.events.emit("metrics_update", data);
        }
        if let Ok(data) = serde_json::to_value(self.tokens_snapshot()) {
            self.events.emit("token_metrics_update", data);
        }
    }

    pub fn snapshot(&self) -> SystemSnapshot {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn tokens_snapshot(&self) -> TokenMetrics {
        self.tokens
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Accumulate a token-usage delta from a request handler.
    pub fn update_tokens(&self, usage: &TokenUsage) -> TokenMetrics {
        let updated = {
            let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
            tokens.total_processed = tokens.total_processed.saturating_add(usage.total);
            tokens.input_tokens = tokens.input_tokens.saturating_add(usage.input.unwrap_or(0));
            tokens.output_tokens = tokens.output_tokens.saturating_add(usage.output.unwrap_or(0));
            tokens.timestamp = now_millis();
            if let Some(model) = &usage.model {
                let counter = tokens.by_model.entry(model.clone()).or_insert(0);
                *counter = counter.saturating_add(usage.total);
            }
            tokens.clone()
        };

        if let Ok(data) = serde_json::to_value(&updated) {
            self.events.emit("token_metrics_update", data);
        }
        updated
    }

    fn persist(&self, snapshot: &SystemSnapshot) {
        if let Err(e) = std::fs::create_dir_all(&self.cache_dir) {
            warn!("Cannot create cache dir {}: {}", self.cache_dir.display(), e);
            return;
        }
        write_cache(&self.cache_dir.join(METRICS_CACHE_FILE), snapshot);
        write_cache(&self.cache_dir.join(TOKEN_CACHE_FILE), &self.tokens_snapshot());
    }
}

impl Drop for MetricsSampler {
    fn drop(&mut self) {
        if let Some(handle) = self.task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
    }
}

/// `(total-free)/total*100`, one decimal, always within 0..=100.
pub fn memory_usage_percent(total: u64, free: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let used = total.saturating_sub(free) as f64;
    round1((used / total as f64 * 100.0).clamp(0.0, 100.0))
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn sample_disk() -> Option<DiskMetrics> {
    let disks = Disks::new_with_refreshed_list();
    let (total, free) = disks.list().iter().fold((0u64, 0u64), |(t, f), disk| {
        (
            t.saturating_add(disk.total_space()),
            f.saturating_add(disk.available_space()),
        )
    });
    if total == 0 {
        return None;
    }
    Some(DiskMetrics {
        total,
        free,
        used: total.saturating_sub(free),
        usage_percent: memory_usage_percent(total, free),
    })
}

fn sample_network() -> Option<NetworkMetrics> {
    let networks = Networks::new_with_refreshed_list();
    let (rx, tx) = networks.iter().fold((0u64, 0u64), |(r, t), (_, data)| {
        (
            r.saturating_add(data.total_received()),
            t.saturating_add(data.total_transmitted()),
        )
    });
    Some(NetworkMetrics {
        bytes_received: rx,
        bytes_sent: tx,
    })
}

fn load_cache<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Option<T> {
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(value) => {
            debug!("Warm-restart cache loaded from {}", path.display());
            Some(value)
        }
        Err(e) => {
            warn!("Ignoring unparseable cache file {}: {}", path.display(), e);
            None
        }
    }
}

fn write_cache<T: Serialize>(path: &std::path::Path, value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            if let Err(e) = std::fs::write(path, json) {
                warn!("Cannot write cache file {}: {}", path.display(), e);
            }
        }
        Err(e) => warn!("Cannot serialize cache payload: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::uplink::EventHub;

    fn sampler_in(dir: &std::path::Path) -> Arc<MetricsSampler> {
        MetricsSampler::new(dir.to_path_buf(), EventHub::new())
    }

    #[test]
    fn usage_percent_matches_formula() {
        assert_eq!(memory_usage_percent(1000, 250), 75.0);
        assert_eq!(memory_usage_percent(3, 1), 66.7);
        assert_eq!(memory_usage_percent(0, 0), 0.0);
        assert_eq!(memory_usage_percent(100, 100), 0.0);
        assert_eq!(memory_usage_percent(100, 0), 100.0);
    }

    #[test]
    fn usage_percent_stays_in_bounds() {
        for (total, free) in [(1u64, 0u64), (u64::MAX, 0), (u64::MAX, u64::MAX), (7, 13)] {
            let p = memory_usage_percent(total, free);
            assert!((0.0..=100.0).contains(&p), "{} out of bounds", p);
        }
    }

    #[tokio::test]
    async fn token_updates_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = sampler_in(dir.path());

        let usage = TokenUsage {
            model: Some("gpt-4".to_string()),
            total: 100,
            input: Some(40),
            output: Some(60),
        };
        sampler.update_tokens(&usage);
        let tokens = sampler.update_tokens(&usage);

        assert_eq!(tokens.total_processed, 200);
        assert_eq!(tokens.input_tokens, 80);
        assert_eq!(tokens.output_tokens, 120);
        assert_eq!(tokens.by_model.get("gpt-4"), Some(&200));
    }

    #[tokio::test]
    async fn token_counters_saturate_instead_of_overflowing() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = sampler_in(dir.path());

        let huge = TokenUsage {
            model: Some("llama3".to_string()),
            total: u64::MAX,
            input: Some(u64::MAX),
            output: Some(u64::MAX),
        };
        sampler.update_tokens(&huge);
        let tokens = sampler.update_tokens(&huge);

        assert_eq!(tokens.total_processed, u64::MAX);
        assert_eq!(tokens.input_tokens, u64::MAX);
        assert_eq!(tokens.output_tokens, u64::MAX);
        assert_eq!(tokens.by_model.get("llama3"), Some(&u64::MAX));
    }

    #[tokio::test]
    async fn tick_produces_bounded_snapshot_and_persists_on_slow_tick() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = sampler_in(dir.path());

        // First tick is a slow tick (tick 0), so the cache file appears.
        sampler.tick();
        let snap = sampler.snapshot();
        assert!(snap.memory.total > 0);
        assert!((0.0..=100.0).contains(&snap.memory.usage_percent));
        assert!((0.0..=100.0).contains(&snap.cpu.usage));
        assert!(snap.timestamp > 0);
        assert!(dir.path().join("metrics.json").exists());
        assert!(dir.path().join("token_metrics.json").exists());
    }

    #[tokio::test]
    async fn token_counters_survive_restart_via_cache_file() {
        let dir = tempfile::tempdir().unwrap();
        {
            let sampler = sampler_in(dir.path());
            sampler.update_tokens(&TokenUsage {
                model: Some("llama3".to_string()),
                total: 42,
                input: None,
                output: None,
            });
            sampler.tick(); // slow tick persists token cache
        }

        let revived = sampler_in(dir.path());
        assert_eq!(revived.tokens_snapshot().total_processed, 42);
        assert_eq!(revived.tokens_snapshot().by_model.get("llama3"), Some(&42));
    }

    #[tokio::test]
    async fn ticks_broadcast_metrics_events() {
        let dir = tempfile::tempdir().unwrap();
        let hub = EventHub::new();
        let mut rx = hub.subscribe();
        let sampler = MetricsSampler::new(dir.path().to_path_buf(), hub);

        sampler.tick();
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let kinds = [first.kind.as_str(), second.kind.as_str()];
        assert!(kinds.contains(&"metrics_update"));
        assert!(kinds.contains(&"token_metrics_update"));
    }
}
