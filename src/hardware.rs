use sysinfo::System;

/// Get CPU model name
pub fn get_cpu_info() -> String {
    let mut sys = System::new();
    sys.refresh_cpu();

    if let Some(cpu) = sys.cpus().first() {
        cpu.brand().trim().to_string()
    } else {
        "Unknown CPU".to_string()
    }
}

/// Get core count (returns physical cores, logical threads)
pub fn get_core_count() -> (usize, usize) {
    let physical = num_cpus::get_physical();
    let logical = num_cpus::get();
    (physical, logical)
}

/// Host load at one point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostSnapshot {
    /// Global CPU usage in percent
    pub cpu_percent: f32,
    pub ram_used_mb: u64,
    pub ram_total_mb: u64,
}

/// Sample host CPU and RAM usage.
///
/// CPU usage needs two refreshes, so this blocks for the minimum update
/// interval.
pub fn host_snapshot() -> HostSnapshot {
    let mut sys = System::new();
    sys.refresh_cpu();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu();
    sys.refresh_memory();

    HostSnapshot {
        cpu_percent: sys.global_cpu_info().cpu_usage(),
        ram_used_mb: sys.used_memory() / 1_048_576,
        ram_total_mb: sys.total_memory() / 1_048_576,
    }
}

/// Label for baselines when no GPU name is available
pub fn host_label() -> String {
    let (physical, logical) = get_core_count();
    format!("{} ({}C/{}T)", get_cpu_info(), physical, logical)
}

/// Display hardware information
pub fn display_hardware_info(gpu: Option<&str>) {
    println!("Hardware:");
    println!("  CPU:      {}", get_cpu_info());

    let (physical, logical) = get_core_count();
    println!("  Cores:    {} physical ({} logical)", physical, logical);

    let mut sys = System::new();
    sys.refresh_memory();
    let total_mem_gb = sys.total_memory() as f64 / 1_073_741_824.0;
    println!("  Memory:   {:.1}GB", total_mem_gb);
    println!("  GPU:      {}", gpu.unwrap_or("none detected"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_count() {
        let (physical, logical) = get_core_count();
        assert!(physical >= 1);
        assert!(logical >= 1);
    }

    #[test]
    fn test_host_snapshot() {
        let snap = host_snapshot();
        assert!(snap.ram_total_mb > 0);
        assert!(snap.ram_used_mb <= snap.ram_total_mb);
    }

    #[test]
    fn test_host_label_mentions_cores() {
        assert!(host_label().contains('C'));
    }
}
