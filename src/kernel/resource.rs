//! Resource accounting for completed children.
//!
//! Selection happens once at startup: `getrusage(RUSAGE_CHILDREN)` where the
//! platform has it, a zero-filled sampler everywhere else. Sampling never
//! fails; accounting is observability, not a correctness requirement.

use crate::config::types::ResourceUsage;

pub trait ResourceSampler: Send + Sync {
    fn name(&self) -> &'static str;
    /// Cumulative usage of all children reaped so far
    fn sample(&self) -> ResourceUsage;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplerType {
    Rusage,
    Null,
}

/// Detect the accounting capability of this platform
pub fn detect_sampler() -> SamplerType {
    if cfg!(unix) {
        SamplerType::Rusage
    } else {
        SamplerType::Null
    }
}

/// Create the sampler for this platform
pub fn create_resource_sampler() -> Box<dyn ResourceSampler> {
    let detected = detect_sampler();
    log::debug!("Resource sampler selection: detected={:?}", detected);

    match detected {
        #[cfg(unix)]
        SamplerType::Rusage => Box::new(RusageSampler),
        _ => {
            log::info!("Resource accounting unavailable, reporting zero usage");
            Box::new(NullSampler)
        }
    }
}

/// `getrusage(RUSAGE_CHILDREN)` backed sampler
#[cfg(unix)]
#[derive(Debug, Default)]
pub struct RusageSampler;

#[cfg(unix)]
impl ResourceSampler for RusageSampler {
    fn name(&self) -> &'static str {
        "rusage"
    }

    fn sample(&self) -> ResourceUsage {
        use nix::sys::resource::{getrusage, UsageWho};

        match getrusage(UsageWho::RUSAGE_CHILDREN) {
            Ok(usage) => {
                let user = usage.user_time();
                let system = usage.system_time();
                ResourceUsage {
                    user_time_seconds: user.tv_sec() as f64 + user.tv_usec() as f64 / 1_000_000.0,
                    system_time_seconds: system.tv_sec() as f64
                        + system.tv_usec() as f64 / 1_000_000.0,
                    max_memory_kb: max_rss_kb(usage.max_rss()),
                }
            }
            Err(e) => {
                log::warn!("getrusage(RUSAGE_CHILDREN) failed, reporting zero usage: {}", e);
                ResourceUsage::default()
            }
        }
    }
}

// ru_maxrss is bytes on macOS, KiB elsewhere.
#[cfg(all(unix, any(target_os = "macos", target_os = "ios")))]
fn max_rss_kb(max_rss: libc::c_long) -> u64 {
    (max_rss.max(0) as u64) / 1024
}

#[cfg(all(unix, not(any(target_os = "macos", target_os = "ios"))))]
fn max_rss_kb(max_rss: libc::c_long) -> u64 {
    max_rss.max(0) as u64
}

/// Fallback sampler for platforms without child accounting
#[derive(Debug, Default)]
pub struct NullSampler;

impl ResourceSampler for NullSampler {
    fn name(&self) -> &'static str {
        "null"
    }

    fn sample(&self) -> ResourceUsage {
        ResourceUsage::default()
    }
}
