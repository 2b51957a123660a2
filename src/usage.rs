use sysinfo::System;

/// Measures CPU usage between `start` and `finish`.
pub struct UsageProbe {
    sys: System,
}

/// Average usage, in percent, over the probed interval.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageSample {
    pub global: f32,
    pub per_cpu: Vec<f32>,
}

impl UsageProbe {
    pub fn start() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        Self { sys }
    }

    pub fn finish(mut self) -> UsageSample {
        self.sys.refresh_cpu_usage();
        UsageSample {
            global: self.sys.global_cpu_usage(),
            per_cpu: self.sys.cpus().iter().map(|cpu| cpu.cpu_usage()).collect(),
        }
    }
}

impl UsageSample {
    /// Mean usage of the given processors; `None` if none of them were reported.
    pub fn mean_of(&self, processors: &[usize]) -> Option<f32> {
        let seen: Vec<f32> = processors
            .iter()
            .filter_map(|&i| self.per_cpu.get(i).copied())
            .collect();
        if seen.is_empty() {
            None
        } else {
            Some(seen.iter().sum::<f32>() / seen.len() as f32)
        }
    }

    pub fn log(&self, processors: &[usize]) {
        match self.mean_of(processors) {
            Some(pinned) => tracing::info!(
                global = format_args!("{:.1}%", self.global),
                pinned = format_args!("{:.1}%", pinned),
                "observed CPU usage"
            ),
            None => tracing::info!(
                global = format_args!("{:.1}%", self.global),
                "observed CPU usage"
            ),
        }
    }
}
