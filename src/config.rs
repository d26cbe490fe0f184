// Configuration for atomidx
// Reads from environment variables with sensible defaults

use std::env;
use std::str::FromStr;

/// Indexing configuration, owned by a run and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upper bound on worker threads (ATOMIDX_WORKERS); 0 means no cap
    pub workers: usize,

    /// Cores left free for the coordinator and the OS (ATOMIDX_RESERVED_CORES)
    pub reserved_cores: usize,

    /// Smallest slice a worker is started for (ATOMIDX_MIN_FILES_PER_WORKER)
    pub min_files_per_worker: usize,

    /// Rows per multi-row insert statement (ATOMIDX_BATCH_ROWS)
    pub batch_rows: usize,

    /// Database connection pool size (ATOMIDX_POOL_SIZE)
    pub pool_size: u32,

    /// Database connection pool minimum idle connections (ATOMIDX_POOL_MIN_IDLE)
    pub pool_min_idle: u32,

    /// Files above this size are skipped (ATOMIDX_MAX_FILE_SIZE_MB)
    pub max_file_size_mb: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 0,
            reserved_cores: 2,
            min_files_per_worker: 8,
            batch_rows: 50,
            pool_size: 10,
            pool_min_idle: 2,
            max_file_size_mb: 10,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Config::default();
        read_var("ATOMIDX_WORKERS", &mut config.workers);
        read_var("ATOMIDX_RESERVED_CORES", &mut config.reserved_cores);
        read_var("ATOMIDX_MIN_FILES_PER_WORKER", &mut config.min_files_per_worker);
        read_var("ATOMIDX_BATCH_ROWS", &mut config.batch_rows);
        read_var("ATOMIDX_POOL_SIZE", &mut config.pool_size);
        read_var("ATOMIDX_POOL_MIN_IDLE", &mut config.pool_min_idle);
        read_var("ATOMIDX_MAX_FILE_SIZE_MB", &mut config.max_file_size_mb);
        if config.batch_rows == 0 {
            config.batch_rows = 1;
        }
        if config.min_files_per_worker == 0 {
            config.min_files_per_worker = 1;
        }
        config
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    /// Worker count for `file_count` files on a machine with `cores` cores.
    pub fn worker_count(&self, file_count: usize, cores: usize) -> usize {
        let mut workers = cores.saturating_sub(self.reserved_cores).max(1);
        if self.workers > 0 {
            workers = workers.min(self.workers);
        }
        let by_files = file_count.div_ceil(self.min_files_per_worker.max(1)).max(1);
        workers.min(by_files)
    }
}

fn read_var<T>(key: &str, slot: &mut T)
where
    T: FromStr + std::fmt::Display,
{
    if let Ok(val) = env::var(key) {
        if let Ok(parsed) = val.parse() {
            *slot = parsed;
        } else {
            tracing::warn!("invalid {key} value: {val}, using default: {slot}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.reserved_cores, 2);
        assert_eq!(config.batch_rows, 50);
        assert_eq!(config.pool_size, 10);
        assert_eq!(config.pool_min_idle, 2);
        assert_eq!(config.max_file_size_bytes(), 10 * 1024 * 1024);
    }

    #[test]
    fn worker_count_reserves_cores_and_respects_small_repos() {
        let config = Config::default();
        assert_eq!(config.worker_count(1000, 8), 6);
        assert_eq!(config.worker_count(1000, 2), 1);
        assert_eq!(config.worker_count(10, 16), 2);
        assert_eq!(config.worker_count(0, 16), 1);

        let capped = Config {
            workers: 3,
            ..Config::default()
        };
        assert_eq!(capped.worker_count(1000, 32), 3);
    }
}
