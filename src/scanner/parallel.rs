//! Parallel file scanning with a producer/consumer worker pool.
//!
//! Workers pull file paths from a bounded channel and push indexed results
//! back; the collector reassembles them in input order so a parallel scan
//! produces exactly the same file ordering as a sequential one.

use anyhow::Result;
use crossbeam::channel::bounded;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::results::FileResult;

use super::Scanner;

impl Scanner {
    /// Scan files across a worker pool, preserving input order.
    pub(super) fn scan_files_parallel(&self, files: &[PathBuf]) -> Result<Vec<FileResult>> {
        let workers = self.calculate_optimal_workers(files.len());
        debug!(workers, files = files.len(), "starting parallel scan");

        let (work_tx, work_rx) = bounded::<(usize, &Path)>(workers * 2);
        let (result_tx, result_rx) = bounded::<(usize, FileResult)>(workers * 4);

        let mut slots: Vec<Option<FileResult>> = Vec::new();
        slots.resize_with(files.len(), || None);

        std::thread::scope(|s| {
            for _ in 0..workers {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                s.spawn(move || {
                    while let Ok((index, path)) = work_rx.recv() {
                        let result = self.scan_file(path);
                        if result_tx.send((index, result)).is_err() {
                            break;
                        }
                    }
                });
            }

            s.spawn(move || {
                for (index, path) in files.iter().enumerate() {
                    if work_tx.send((index, path)).is_err() {
                        break;
                    }
                }
            });

            // Workers hold the remaining sender clones; this drop lets the
            // collector loop end once they all finish.
            drop(result_tx);

            for (index, result) in result_rx.iter() {
                slots[index] = Some(result);
            }
        });

        let mut results = Vec::with_capacity(files.len());
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(result) => results.push(result),
                None => anyhow::bail!(
                    "worker produced no result for {}",
                    files[index].display()
                ),
            }
        }
        Ok(results)
    }

    /// Worker count from config: a hard cap when `max_threads` is set,
    /// otherwise a share of the CPU cores, never more workers than files.
    pub(super) fn calculate_optimal_workers(&self, file_count: usize) -> usize {
        let cpu_cores = num_cpus::get();
        let max_by_percentage =
            std::cmp::max(1, (cpu_cores * self.config.thread_percentage as usize) / 100);

        let max_workers = if self.config.max_threads > 0 {
            std::cmp::min(self.config.max_threads, max_by_percentage)
        } else {
            max_by_percentage
        };

        std::cmp::min(max_workers, file_count.max(1))
    }
}
