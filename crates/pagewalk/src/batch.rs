//! Runs the query phase, optionally fanning translations out over a thread pool.

use paging::{PagingContext, PhysicalMemory, Translation, VirtualAddress};
use rayon::prelude::*;

/// How queries are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Translate one query at a time on the calling thread.
    Sequential,
    /// Translate `batch_size` queries at a time in parallel, then emit them in order.
    Parallel { batch_size: usize },
}

/// Counts of each outcome over a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    /// Queries that resolved to a physical address.
    pub mapped: u64,
    /// Queries that ended in a fault.
    pub faults: u64,
}

impl Summary {
    fn record(&mut self, translation: &Translation) {
        if translation.is_fault() {
            self.faults += 1;
        } else {
            self.mapped += 1;
        }
    }
}

/// Translates every query and passes each result to `emit` in input order.
///
/// Stops at the first error returned by `emit`.
pub fn run<M, F, E>(
    context: &PagingContext<M>,
    queries: &[VirtualAddress],
    schedule: Schedule,
    mut emit: F,
) -> Result<Summary, E>
where
    M: PhysicalMemory + Sync,
    F: FnMut(&Translation) -> Result<(), E>,
{
    let mut summary = Summary::default();

    match schedule {
        Schedule::Sequential => {
            for &address in queries {
                let translation = context.translate(address);
                summary.record(&translation);
                emit(&translation)?;
            }
        }
        Schedule::Parallel { batch_size } => {
            for batch in queries.chunks(batch_size.max(1)) {
                let results: Vec<Translation> = batch
                    .par_iter()
                    .map(|&address| context.translate(address))
                    .collect();

                for translation in &results {
                    summary.record(translation);
                    emit(translation)?;
                }
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use paging::{MemoryCell, MemorySnapshot, PhysicalAddress};

    fn context() -> PagingContext {
        PagingContext::new(
            PhysicalAddress::new(0x1000),
            MemorySnapshot::from_cells([
                MemoryCell::new(0x1000, 0x2001),
                MemoryCell::new(0x2000, 0x3001),
                MemoryCell::new(0x3000, 0x4001),
                MemoryCell::new(0x4000, 0x5001),
                MemoryCell::new(0x4008, 0x9001),
            ]),
        )
    }

    fn queries() -> Vec<VirtualAddress> {
        (0..1000u64)
            .map(|i| VirtualAddress::new((i % 3) * 0x1000 + i % 0x1000))
            .collect()
    }

    fn collect(schedule: Schedule) -> (Vec<Translation>, Summary) {
        let context = context();
        let mut out = Vec::new();
        let summary = run(&context, &queries(), schedule, |translation| {
            out.push(*translation);
            Ok::<_, ()>(())
        })
        .unwrap();
        (out, summary)
    }

    #[test]
    fn parallel_matches_sequential() {
        let (sequential, sequential_summary) = collect(Schedule::Sequential);

        for batch_size in [1, 7, 64, 4096] {
            let (parallel, parallel_summary) = collect(Schedule::Parallel { batch_size });
            assert_eq!(parallel, sequential, "batch size {batch_size}");
            assert_eq!(parallel_summary, sequential_summary);
        }
    }

    #[test]
    fn counts_outcomes() {
        let (results, summary) = collect(Schedule::Sequential);
        assert_eq!(results.len(), 1000);
        assert_eq!(summary.mapped + summary.faults, 1000);
        // Every third query uses PT index 2, which is not mapped.
        assert_eq!(summary.faults, 333);
    }

    #[test]
    fn zero_batch_size_still_runs() {
        let (results, _) = collect(Schedule::Parallel { batch_size: 0 });
        assert_eq!(results.len(), 1000);
    }

    #[test]
    fn stops_on_emit_error() {
        let context = context();
        let mut emitted = 0;
        let result = run(
            &context,
            &queries(),
            Schedule::Parallel { batch_size: 16 },
            |_| {
                emitted += 1;
                if emitted == 20 {
                    Err("sink closed")
                } else {
                    Ok(())
                }
            },
        );

        assert_eq!(result, Err("sink closed"));
        assert_eq!(emitted, 20);
    }
}
