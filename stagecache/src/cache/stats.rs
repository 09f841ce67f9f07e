//! Staging cache statistics.

use std::time::{Duration, Instant};

/// Counters describing a caching session so far.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub files_staged: u64,
    pub bytes_staged: u64,
    pub files_reclaimed: u64,
    pub bytes_reclaimed: u64,
    /// Entries handed to consumers
    pub claims: u64,
    /// Completion reports that matched at least one resident entry
    pub completions: u64,
    /// Completion reports for names no longer (or never) resident
    pub unmatched_completions: u64,
    /// Highest resident byte total observed
    pub peak_resident_bytes: u64,
    pub created_at: Instant,
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStats {
    pub fn new() -> Self {
        Self {
            files_staged: 0,
            bytes_staged: 0,
            files_reclaimed: 0,
            bytes_reclaimed: 0,
            claims: 0,
            completions: 0,
            unmatched_completions: 0,
            peak_resident_bytes: 0,
            created_at: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Record an admitted file; `resident_bytes` is the total after admission.
    pub fn record_staged(&mut self, size: u64, resident_bytes: u64) {
        self.files_staged += 1;
        self.bytes_staged += size;
        self.peak_resident_bytes = self.peak_resident_bytes.max(resident_bytes);
    }

    pub fn record_reclaimed(&mut self, size: u64) {
        self.files_reclaimed += 1;
        self.bytes_reclaimed += size;
    }

    pub fn record_claim(&mut self) {
        self.claims += 1;
    }

    pub fn record_completion(&mut self, matched: bool) {
        if matched {
            self.completions += 1;
        } else {
            self.unmatched_completions += 1;
        }
    }

    /// Average copy throughput since the session started, in bytes per second.
    pub fn staging_throughput(&self) -> f64 {
        let secs = self.uptime().as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            self.bytes_staged as f64 / secs
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stats_are_zero() {
        let stats = CacheStats::new();
        assert_eq!(stats.files_staged, 0);
        assert_eq!(stats.bytes_reclaimed, 0);
        assert_eq!(stats.claims, 0);
        assert_eq!(stats.peak_resident_bytes, 0);
    }

    #[test]
    fn test_peak_tracks_highest_total() {
        let mut stats = CacheStats::new();
        stats.record_staged(300, 300);
        stats.record_reclaimed(300);
        stats.record_staged(100, 100);
        assert_eq!(stats.files_staged, 2);
        assert_eq!(stats.bytes_staged, 400);
        assert_eq!(stats.peak_resident_bytes, 300);
        assert_eq!(stats.files_reclaimed, 1);
    }

    #[test]
    fn test_completion_split() {
        let mut stats = CacheStats::new();
        stats.record_completion(true);
        stats.record_completion(false);
        stats.record_completion(false);
        assert_eq!(stats.completions, 1);
        assert_eq!(stats.unmatched_completions, 2);
    }
}
