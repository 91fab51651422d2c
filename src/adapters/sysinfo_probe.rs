use crate::ports::memory::MemoryProbe;
use sysinfo::System;

/// System memory utilization via sysinfo. A fresh snapshot is taken on
/// every call; the batch gate must see live pressure, not a cached value.
pub struct SysinfoProbe;

impl SysinfoProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoProbe {
    fn utilization_percent(&self) -> f32 {
        let mut system = System::new();
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return 0.0;
        }
        // sysinfo reports bytes
        (system.used_memory() as f64 / total as f64 * 100.0) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utilization_is_a_sane_percentage() {
        let probe = SysinfoProbe::new();
        let sample = probe.utilization_percent();
        assert!((0.0..=100.0).contains(&sample), "got {sample}");
    }
}
