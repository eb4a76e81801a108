// Linux-specific helpers: /proc/cpuinfo, cpufreq sysfs.

/// Read first "model name" from /proc/cpuinfo (Linux). Prefer over sysinfo
/// when it returns "cpu0" etc.
pub(super) fn read_cpu_model() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/cpuinfo").ok()?;
        for line in content.lines() {
            if line.starts_with("model name") {
                let name = line
                    .find(": ")
                    .map(|i| line[i + 2..].trim())
                    .filter(|s| !s.is_empty() && *s != "cpu0")?;
                return Some(name.to_string());
            }
        }
    }
    None
}

/// Read a cpufreq bound from /sys/devices/system/cpu/cpu0/cpufreq/<file>
/// (kHz on disk, returned as MHz). None where the platform has no cpufreq.
pub(super) fn read_cpufreq_mhz(file: &str) -> Option<f64> {
    #[cfg(target_os = "linux")]
    {
        let path = format!("/sys/devices/system/cpu/cpu0/cpufreq/{}", file);
        let content = std::fs::read_to_string(&path).ok()?;
        let khz = content.trim().parse::<u64>().ok()?;
        if khz > 0 {
            return Some(khz as f64 / 1_000.0);
        }
    }
    #[cfg(not(target_os = "linux"))]
    let _ = file;
    None
}
