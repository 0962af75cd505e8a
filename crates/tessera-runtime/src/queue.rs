use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::task::CompileTask;

/// High-priority dispatches allowed in a row while low-priority work waits.
pub const DEFAULT_HIGH_PRIORITY_QUOTA: i32 = 2;

struct Queued {
    key: f64,
    seq: u64,
    task: CompileTask,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    // Reversed so the max-heap yields the nearest, then the oldest.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .total_cmp(&self.key)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// The two priority tiers plus the fairness quota. Owned by the coordinator thread.
pub(crate) struct TaskQueues {
    high: BinaryHeap<Queued>,
    low: BinaryHeap<Queued>,
    quota: i32,
    quota_reset: i32,
    next_seq: u64,
}

impl TaskQueues {
    pub(crate) fn new(quota: i32) -> Self {
        Self {
            high: BinaryHeap::new(),
            low: BinaryHeap::new(),
            quota,
            quota_reset: quota,
            next_seq: 0,
        }
    }

    pub(crate) fn push(&mut self, task: CompileTask) {
        let entry = Queued {
            key: task.priority_key(),
            seq: self.next_seq,
            task,
        };
        self.next_seq += 1;
        if entry.task.is_high_priority() {
            self.high.push(entry);
        } else {
            self.low.push(entry);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.high.len() + self.low.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.high.is_empty() && self.low.is_empty()
    }

    /// Next task to dispatch. Once the quota is spent a waiting low-priority task goes
    /// first; an empty high tier also refills the quota.
    pub(crate) fn pop_next(&mut self) -> Option<CompileTask> {
        if self.quota <= 0 {
            if let Some(task) = Self::pop_live(&mut self.low) {
                self.quota = self.quota_reset;
                return Some(task);
            }
        }
        if let Some(task) = Self::pop_live(&mut self.high) {
            self.quota -= 1;
            return Some(task);
        }
        self.quota = self.quota_reset;
        Self::pop_live(&mut self.low)
    }

    /// Removes every queued task, high tier first.
    pub(crate) fn drain(&mut self) -> Vec<CompileTask> {
        let mut out: Vec<CompileTask> = Vec::with_capacity(self.len());
        out.extend(self.high.drain().map(|q| q.task));
        out.extend(self.low.drain().map(|q| q.task));
        out
    }

    fn pop_live(heap: &mut BinaryHeap<Queued>) -> Option<CompileTask> {
        while let Some(q) = heap.pop() {
            if q.task.is_cancelled() {
                log::trace!(target: "scheduler", "dropping cancelled {:?}", q.task);
                continue;
            }
            return Some(q.task);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tessera_chunk::SectionPos;
    use tessera_geom::Vec3;

    use super::*;
    use crate::globals::GlobalRenderables;
    use crate::section::Section;

    fn task(globals: &Arc<GlobalRenderables>, i: usize, high: bool) -> CompileTask {
        let section = Section::new(i, SectionPos::new(i as i32, 0, 0), globals.clone());
        section.create_compile_task(None, Vec3::ZERO, high)
    }

    fn order(q: &mut TaskQueues) -> Vec<(usize, bool)> {
        std::iter::from_fn(|| q.pop_next())
            .map(|t| (t.section().index(), t.is_high_priority()))
            .collect()
    }

    #[test]
    fn at_most_two_high_in_a_row_while_low_waits() {
        let g = Arc::new(GlobalRenderables::new());
        let mut q = TaskQueues::new(DEFAULT_HIGH_PRIORITY_QUOTA);
        for i in 0..6 {
            q.push(task(&g, i, true));
        }
        for i in 6..9 {
            q.push(task(&g, i, false));
        }
        let tiers: Vec<bool> = order(&mut q).into_iter().map(|(_, h)| h).collect();
        assert_eq!(
            tiers,
            vec![true, true, false, true, true, false, true, true, false]
        );
    }

    #[test]
    fn nearest_first_within_tier() {
        let g = Arc::new(GlobalRenderables::new());
        let mut q = TaskQueues::new(DEFAULT_HIGH_PRIORITY_QUOTA);
        q.push(task(&g, 3, false));
        q.push(task(&g, 1, false));
        q.push(task(&g, 2, false));
        let idx: Vec<usize> = order(&mut q).into_iter().map(|(i, _)| i).collect();
        assert_eq!(idx, vec![1, 2, 3]);
    }

    #[test]
    fn equal_keys_keep_insertion_order() {
        let g = Arc::new(GlobalRenderables::new());
        let mut q = TaskQueues::new(DEFAULT_HIGH_PRIORITY_QUOTA);
        for i in [5usize, 2, 7] {
            let section = Section::new(i, SectionPos::new(1, 0, 0), g.clone());
            q.push(section.create_compile_task(None, Vec3::ZERO, true));
        }
        let idx: Vec<usize> = order(&mut q).into_iter().map(|(i, _)| i).collect();
        assert_eq!(idx, vec![5, 2, 7]);
    }

    #[test]
    fn cancelled_tasks_are_skipped() {
        let g = Arc::new(GlobalRenderables::new());
        let mut q = TaskQueues::new(DEFAULT_HIGH_PRIORITY_QUOTA);
        let a = task(&g, 0, true);
        a.cancel();
        q.push(a);
        q.push(task(&g, 1, false));
        assert_eq!(q.len(), 2);
        let next = q.pop_next().unwrap();
        assert_eq!(next.section().index(), 1);
        assert!(q.is_empty());
    }

    #[test]
    fn empty_high_tier_refills_quota() {
        let g = Arc::new(GlobalRenderables::new());
        let mut q = TaskQueues::new(DEFAULT_HIGH_PRIORITY_QUOTA);
        q.push(task(&g, 0, true));
        q.push(task(&g, 1, true));
        assert_eq!(order(&mut q).len(), 2);
        q.push(task(&g, 2, false));
        assert_eq!(q.pop_next().map(|t| t.section().index()), Some(2));
        for i in 3..6 {
            q.push(task(&g, i, true));
        }
        q.push(task(&g, 6, false));
        let tiers: Vec<bool> = order(&mut q).into_iter().map(|(_, h)| h).collect();
        assert_eq!(tiers, vec![true, true, false, true]);
    }
}
