//! Benchmarks: wall-clock and memory measurements keyed by test method.
//!
//! A [`Benchmark`] records the wall time between `start` and `stop` plus the
//! process resident memory sampled at each end. Memory is read through a
//! [`MemoryProbe`]; [`ProcessMemory`] samples the current process with
//! `sysinfo`.

use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BenchmarkError {
    #[error("benchmark not found: {name}")]
    NotFound { name: String },
}

pub type BenchmarkResult<T> = Result<T, BenchmarkError>;

// ============================================================================
// Memory Probes
// ============================================================================

/// Source of a memory reading in bytes.
pub trait MemoryProbe {
    fn memory(&mut self) -> u64;
}

/// Reads the resident memory of the current process.
pub struct ProcessMemory {
    system: System,
    pid: Pid,
}

impl ProcessMemory {
    pub fn new() -> Self {
        ProcessMemory {
            system: System::new(),
            pid: Pid::from_u32(std::process::id()),
        }
    }
}

impl Default for ProcessMemory {
    fn default() -> Self {
        ProcessMemory::new()
    }
}

impl MemoryProbe for ProcessMemory {
    fn memory(&mut self) -> u64 {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::everything(),
        );
        self.system
            .process(self.pid)
            .map(|process| process.memory())
            .unwrap_or(0)
    }
}

// ============================================================================
// Benchmark
// ============================================================================

/// A start/stop timer with memory counters.
#[derive(Debug, Clone, Default)]
pub struct Benchmark {
    started: Option<Instant>,
    elapsed: Duration,
    started_at: Option<SystemTime>,
    stopped_at: Option<SystemTime>,
    start_memory: u64,
    stop_memory: u64,
}

impl Benchmark {
    pub fn new() -> Self {
        Benchmark::default()
    }

    /// Start timing. Restarting discards any previous measurement.
    pub fn start(&mut self, probe: &mut dyn MemoryProbe) -> &mut Self {
        *self = Benchmark::default();
        self.start_memory = probe.memory();
        self.started_at = Some(SystemTime::now());
        self.started = Some(Instant::now());
        self
    }

    /// Stop timing. Stopping a benchmark that is not running is a no-op.
    pub fn stop(&mut self, probe: &mut dyn MemoryProbe) -> &mut Self {
        if let Some(started) = self.started.take() {
            self.elapsed = started.elapsed();
            self.stopped_at = Some(SystemTime::now());
            self.stop_memory = probe.memory();
        }
        self
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Elapsed wall time of the last completed measurement.
    pub fn time(&self) -> Duration {
        self.elapsed
    }

    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    pub fn stopped_at(&self) -> Option<SystemTime> {
        self.stopped_at
    }

    pub fn start_memory(&self) -> u64 {
        self.start_memory
    }

    pub fn stop_memory(&self) -> u64 {
        self.stop_memory
    }

    /// Memory growth between start and stop, in bytes.
    pub fn memory(&self) -> u64 {
        self.stop_memory.saturating_sub(self.start_memory)
    }

    pub fn summary(&self) -> BenchmarkSummary {
        BenchmarkSummary {
            time_secs: self.elapsed.as_secs_f64(),
            start_memory: self.start_memory,
            stop_memory: self.stop_memory,
            memory: self.memory(),
        }
    }
}

/// Serializable view of a benchmark.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkSummary {
    pub time_secs: f64,
    pub start_memory: u64,
    pub stop_memory: u64,
    pub memory: u64,
}

// ============================================================================
// Benchmark Collection
// ============================================================================

/// A named benchmark.
#[derive(Debug, Clone)]
pub struct BenchmarkEntry {
    pub name: String,
    pub benchmark: Benchmark,
}

/// Benchmarks keyed by name, kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkCollection {
    entries: Vec<BenchmarkEntry>,
}

impl BenchmarkCollection {
    pub fn new() -> Self {
        BenchmarkCollection::default()
    }

    /// Add a benchmark. An existing entry with the same name is replaced in place.
    pub fn add(&mut self, name: impl Into<String>, benchmark: Benchmark) -> &mut Self {
        let name = name.into();
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.benchmark = benchmark,
            None => self.entries.push(BenchmarkEntry { name, benchmark }),
        }
        self
    }

    /// Append a benchmark without looking for an existing entry. `get` finds the first
    /// entry with a given name.
    pub fn push(&mut self, name: impl Into<String>, benchmark: Benchmark) -> &mut Self {
        self.entries.push(BenchmarkEntry {
            name: name.into(),
            benchmark,
        });
        self
    }

    pub fn get(&self, name: &str) -> BenchmarkResult<&Benchmark> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.benchmark)
            .ok_or_else(|| BenchmarkError::NotFound {
                name: name.to_string(),
            })
    }

    pub fn get_mut(&mut self, name: &str) -> BenchmarkResult<&mut Benchmark> {
        self.entries
            .iter_mut()
            .find(|e| e.name == name)
            .map(|e| &mut e.benchmark)
            .ok_or_else(|| BenchmarkError::NotFound {
                name: name.to_string(),
            })
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Benchmark)> {
        self.entries.iter().map(|e| (e.name.as_str(), &e.benchmark))
    }

    /// Sum of all recorded times.
    pub fn total_time(&self) -> Duration {
        self.entries.iter().map(|e| e.benchmark.time()).sum()
    }

    /// Sum of all recorded memory growth.
    pub fn total_memory(&self) -> u64 {
        self.entries.iter().map(|e| e.benchmark.memory()).sum()
    }
}

impl Extend<BenchmarkEntry> for BenchmarkCollection {
    fn extend<I: IntoIterator<Item = BenchmarkEntry>>(&mut self, iter: I) {
        for entry in iter {
            self.add(entry.name, entry.benchmark);
        }
    }
}

impl IntoIterator for BenchmarkCollection {
    type Item = BenchmarkEntry;
    type IntoIter = std::vec::IntoIter<BenchmarkEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
