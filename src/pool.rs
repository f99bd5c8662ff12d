//! Bounded parallel parsing of tile texts.
//!
//! Workers claim indices from a shared atomic counter and report
//! `(index, result)` pairs back to the calling thread, which stores each result
//! in its reserved slot. Output order therefore always matches input order.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};

use rayon::ThreadPoolBuilder;
use tracing::{debug, info};

use crate::error::{IngestError, ParseError, TileFailure};
use crate::model::TileRecord;
use crate::parser::parse_tile;

pub const DEFAULT_POOL_SIZE: usize = 4;

/// Shared flag telling workers to stop claiming new tiles.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct IngestionPool {
    pool_size: usize,
    cancel: CancelFlag,
}

impl Default for IngestionPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

impl IngestionPool {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Parses every text, returning records in submission order.
    ///
    /// Fails with every per-tile error when any tile fails; partial results are
    /// never returned.
    pub fn parse_all<S>(
        &self,
        texts: &[S],
        sea_level_as_zero: bool,
    ) -> Result<Vec<TileRecord>, IngestError>
    where
        S: AsRef<str> + Sync,
    {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let workers = self.pool_size.clamp(1, texts.len());
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("tile-parser-{i}"))
            .build()?;

        info!(
            "Parsing {} XML texts with {} workers",
            texts.len(),
            workers
        );

        let next_index = AtomicUsize::new(0);
        let mut slots: Vec<Option<Result<TileRecord, ParseError>>> =
            (0..texts.len()).map(|_| None).collect();

        pool.in_place_scope(|scope| {
            let (sender, receiver) = mpsc::channel();

            for _ in 0..workers {
                let sender = sender.clone();
                let next_index = &next_index;
                let cancel = &self.cancel;

                scope.spawn(move |_| loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let index = next_index.fetch_add(1, Ordering::SeqCst);
                    let Some(text) = texts.get(index) else {
                        break;
                    };
                    let result = parse_tile(text.as_ref(), sea_level_as_zero);
                    if sender.send((index, result)).is_err() {
                        break;
                    }
                });
            }
            drop(sender);

            for (index, result) in receiver {
                debug!("Tile {} finished", index);
                slots[index] = Some(result);
            }
        });

        let completed = slots.iter().filter(|slot| slot.is_some()).count();
        if completed < texts.len() {
            return Err(IngestError::Cancelled {
                completed,
                total: texts.len(),
            });
        }

        let mut records = Vec::with_capacity(texts.len());
        let mut failures = Vec::new();
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(Ok(record)) => records.push(record),
                Some(Err(error)) => failures.push(TileFailure { index, error }),
                None => {}
            }
        }

        if !failures.is_empty() {
            return Err(IngestError::Tiles(failures));
        }

        info!("Parsed {} tiles", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tests::build_dem_xml;

    fn tile_text(i: usize) -> String {
        let mesh = format!("{}", 53394600 + i);
        let first = i.to_string();
        build_dem_xml(
            &mesh,
            "35.0 135.0",
            "35.01 135.01",
            "1 1",
            "0 0",
            &[
                ("地表面", first.as_str()),
                ("地表面", "1"),
                ("地表面", "2"),
                ("地表面", "3"),
            ],
        )
    }

    #[test]
    fn test_results_follow_submission_order() {
        let texts: Vec<String> = (0..10).map(tile_text).collect();
        let records = IngestionPool::new(4).parse_all(&texts, false).unwrap();

        assert_eq!(records.len(), 10);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.mesh_code(), 53394600 + i as u64);
            assert_eq!(record.elevation.items[0], i.to_string());
        }
    }

    #[test]
    fn test_empty_input() {
        let texts: Vec<String> = Vec::new();
        let records = IngestionPool::default().parse_all(&texts, false).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_pool_larger_than_input_and_zero_pool() {
        let texts = vec![tile_text(0), tile_text(1)];
        assert_eq!(IngestionPool::new(16).parse_all(&texts, false).unwrap().len(), 2);
        assert_eq!(IngestionPool::new(0).parse_all(&texts, false).unwrap().len(), 2);
    }

    #[test]
    fn test_all_failures_are_reported() {
        let texts = vec![
            tile_text(0),
            "<broken".to_string(),
            tile_text(2),
            "<Dataset/>".to_string(),
        ];
        let err = IngestionPool::new(2).parse_all(&texts, false).unwrap_err();

        let IngestError::Tiles(failures) = &err else {
            panic!("unexpected error: {err}");
        };
        let indices: Vec<usize> = failures.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![1, 3]);
        assert!(matches!(failures[1].error, ParseError::StructureMissing("DEM")));

        let message = err.to_string();
        assert!(message.contains("tile 1:"));
        assert!(message.contains("tile 3:"));
    }

    #[test]
    fn test_cancelled_before_start() {
        let texts: Vec<String> = (0..3).map(tile_text).collect();
        let pool = IngestionPool::new(2);
        pool.cancel_flag().cancel();

        let err = pool.parse_all(&texts, false).unwrap_err();
        assert!(matches!(
            err,
            IngestError::Cancelled {
                completed: 0,
                total: 3
            }
        ));
    }
}
