// ABOUTME: Process memory limit and usage reporting
// ABOUTME: Feeds the batch sizing of table dumps

/// Reports how much memory the process may use and currently uses, in bytes
pub trait MemoryInfo: Send + Sync {
    /// Memory limit in bytes; 0 means unlimited
    fn memory_limit(&self) -> u64;

    fn memory_usage(&self) -> u64;
}

/// Memory info of the running process
///
/// The limit comes from configuration; usage is the resident set size.
#[derive(Debug, Clone, Copy)]
pub struct ProcessMemory {
    limit: u64,
}

impl ProcessMemory {
    pub fn new(limit: u64) -> Self {
        Self { limit }
    }
}

impl MemoryInfo for ProcessMemory {
    fn memory_limit(&self) -> u64 {
        self.limit
    }

    fn memory_usage(&self) -> u64 {
        resident_set_size().unwrap_or(0)
    }
}

#[cfg(target_os = "linux")]
fn resident_set_size() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss(&status)
}

#[cfg(not(target_os = "linux"))]
fn resident_set_size() -> Option<u64> {
    None
}

/// Extract `VmRSS` (reported in kB) from a `/proc/<pid>/status` document, in bytes
fn parse_vm_rss(status: &str) -> Option<u64> {
    status
        .lines()
        .find(|line| line.starts_with("VmRSS:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}

/// Constant memory figures
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedMemory {
    pub limit: u64,
    pub usage: u64,
}

impl FixedMemory {
    pub fn new(limit: u64, usage: u64) -> Self {
        Self { limit, usage }
    }

    pub fn unlimited() -> Self {
        Self::default()
    }
}

impl MemoryInfo for FixedMemory {
    fn memory_limit(&self) -> u64 {
        self.limit
    }

    fn memory_usage(&self) -> u64 {
        self.usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vm_rss() {
        let status = "Name:\tsliced\nVmPeak:\t  9000 kB\nVmRSS:\t    2048 kB\nThreads:\t4\n";
        assert_eq!(parse_vm_rss(status), Some(2048 * 1024));
        assert_eq!(parse_vm_rss("Name:\tsliced\n"), None);
    }

    #[test]
    fn test_process_memory_reports_configured_limit() {
        let memory = ProcessMemory::new(64 * 1024 * 1024);
        assert_eq!(memory.memory_limit(), 64 * 1024 * 1024);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_process_memory_usage_is_nonzero_on_linux() {
        assert!(ProcessMemory::new(0).memory_usage() > 0);
    }
}
