//! Controller-process resource sampling, consumed once per scaling tick.

use sysinfo::System;

/// Samples CPU and memory utilization for the current process.
pub struct ResourceSampler {
    system: System,
    pid: sysinfo::Pid,
}

impl Default for ResourceSampler {
    fn default() -> Self {
        let pid = sysinfo::get_current_pid().unwrap_or(sysinfo::Pid::from(0));
        let mut system = System::new_all();
        system.refresh_all();
        Self { system, pid }
    }
}

impl ResourceSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh and return `(cpu_percent, memory_percent)` for this process.
    /// Falls back to `(0.0, 0.0)` if the process cannot be found, which can
    /// happen transiently right after start.
    pub fn sample(&mut self) -> (f32, f32) {
        self.system.refresh_all();

        let Some(process) = self.system.process(self.pid) else {
            return (0.0, 0.0);
        };

        let cpu_percent = process.cpu_usage();
        let total_memory = self.system.total_memory();
        let memory_percent = if total_memory > 0 {
            (process.memory() as f64 / total_memory as f64 * 100.0) as f32
        } else {
            0.0
        };

        (cpu_percent, memory_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_returns_non_negative_values() {
        let mut sampler = ResourceSampler::new();
        let (cpu, mem) = sampler.sample();
        assert!(cpu >= 0.0);
        assert!(mem >= 0.0);
    }
}
