//! VMTF decision queue
//!
//! A doubly linked list over variable indices, ordered by bump time. The
//! most recently bumped variable sits at the tail. The `unassigned` cursor
//! is a lower bound for the search of the next decision: every variable
//! strictly behind it (toward the tail) is assigned, so the search for an
//! unassigned variable starts there and walks `prev` links, memoizing the
//! position it ends at.

use crate::literal::Variable;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const NIL: u32 = u32::MAX;

/// VMTF queue with bump stamps and the next-unassigned cursor
#[derive(Debug)]
pub struct Queue {
    prev: Vec<u32>,
    next: Vec<u32>,
    bumped: Vec<i64>,
    first: u32,
    last: u32,
    stamp: i64,
    unassigned: u32,
    unassigned_bumped: i64,
    searched: u64,
    shuffles: u64,
}

impl Queue {
    /// Create a queue over `num_vars` variables in index order
    /// (largest index at the tail, so it is picked first)
    pub fn new(num_vars: usize, reverse: bool) -> Self {
        let mut queue = Queue {
            prev: Vec::new(),
            next: Vec::new(),
            bumped: Vec::new(),
            first: NIL,
            last: NIL,
            stamp: 0,
            unassigned: NIL,
            unassigned_bumped: 0,
            searched: 0,
            shuffles: 0,
        };
        queue.init(num_vars, reverse);
        queue
    }

    /// Append variables up to `new_num_vars` with fresh stamps; with
    /// `reverse` new variables are prepended instead, so smaller indices
    /// keep the later (preferred) positions
    pub fn init(&mut self, new_num_vars: usize, reverse: bool) {
        let old = self.prev.len();
        if new_num_vars <= old {
            return;
        }
        self.prev.resize(new_num_vars, NIL);
        self.next.resize(new_num_vars, NIL);
        self.bumped.resize(new_num_vars, 0);

        for idx in old as u32..new_num_vars as u32 {
            if reverse {
                self.push_front(idx);
                if self.unassigned == NIL {
                    self.unassigned = self.last;
                    self.unassigned_bumped = self.bumped[self.last as usize];
                }
            } else {
                self.push_back(idx);
                self.stamp += 1;
                self.bumped[idx as usize] = self.stamp;
                self.unassigned = self.last;
                self.unassigned_bumped = self.bumped[self.last as usize];
            }
        }
    }

    /// Number of variables in the queue
    pub fn len(&self) -> usize {
        self.prev.len()
    }

    /// True when the queue holds no variables
    pub fn is_empty(&self) -> bool {
        self.prev.is_empty()
    }

    /// Bump stamp of a variable
    #[inline]
    pub fn bumped(&self, var: Variable) -> i64 {
        self.bumped[var.index()]
    }

    /// Total prev-link steps taken by `next_unassigned`
    pub fn searched(&self) -> u64 {
        self.searched
    }

    /// Move a variable to the tail and give it a fresh maximal stamp.
    /// A variable already at the tail stays put. If the variable is
    /// unassigned the cursor follows it, keeping its invariant.
    pub fn bump(&mut self, var: Variable, is_unassigned: bool) {
        let idx = var.0;
        if idx == self.last {
            return;
        }
        self.dequeue(idx);
        self.push_back(idx);
        self.stamp += 1;
        self.bumped[idx as usize] = self.stamp;
        if is_unassigned {
            self.unassigned = idx;
            self.unassigned_bumped = self.stamp;
        }
    }

    /// Find the most recently bumped unassigned variable, starting at the
    /// cursor and walking toward older entries; the cursor is moved to the
    /// result so the walk is amortized
    pub fn next_unassigned(&mut self, values: &[Option<bool>]) -> Variable {
        let mut idx = self.unassigned;
        let mut searched = 0u64;
        while values[idx as usize].is_some() {
            idx = self.prev[idx as usize];
            searched += 1;
        }
        if searched > 0 {
            self.searched += searched;
            self.unassigned = idx;
            self.unassigned_bumped = self.bumped[idx as usize];
        }
        Variable(idx)
    }

    /// Restore the cursor invariant after `var` became unassigned: if it
    /// sits behind the cursor (later stamp), the cursor moves onto it
    #[inline]
    pub fn update_on_unassign(&mut self, var: Variable) {
        let stamp = self.bumped[var.index()];
        if self.unassigned == NIL || stamp > self.unassigned_bumped {
            self.unassigned = var.0;
            self.unassigned_bumped = stamp;
        }
    }

    /// Rebuild the queue order, either from a seeded random permutation or
    /// by reversing the current order, and reassign strictly increasing
    /// stamps. The cursor is reset to the tail.
    pub fn shuffle(&mut self, seed: u64, random: bool) {
        let n = self.prev.len();
        if n == 0 {
            return;
        }
        self.shuffles += 1;

        let mut order: Vec<u32> = Vec::with_capacity(n);
        if random {
            order.extend((0..n as u32).rev());
            let mut rng = ChaCha8Rng::seed_from_u64(seed ^ self.shuffles);
            order.shuffle(&mut rng);
        } else {
            let mut idx = self.last;
            while idx != NIL {
                order.push(idx);
                idx = self.prev[idx as usize];
            }
        }

        self.first = NIL;
        self.last = NIL;
        for &idx in &order {
            self.prev[idx as usize] = NIL;
            self.next[idx as usize] = NIL;
            self.push_back(idx);
            self.stamp += 1;
            self.bumped[idx as usize] = self.stamp;
        }
        self.unassigned = self.last;
        self.unassigned_bumped = self.bumped[self.last as usize];
    }

    fn dequeue(&mut self, idx: u32) {
        let prev = self.prev[idx as usize];
        let next = self.next[idx as usize];
        if prev != NIL {
            self.next[prev as usize] = next;
        } else {
            self.first = next;
        }
        if next != NIL {
            self.prev[next as usize] = prev;
        } else {
            self.last = prev;
        }
        self.prev[idx as usize] = NIL;
        self.next[idx as usize] = NIL;
    }

    fn push_back(&mut self, idx: u32) {
        self.prev[idx as usize] = self.last;
        self.next[idx as usize] = NIL;
        if self.last != NIL {
            self.next[self.last as usize] = idx;
        } else {
            self.first = idx;
        }
        self.last = idx;
    }

    fn push_front(&mut self, idx: u32) {
        self.next[idx as usize] = self.first;
        self.prev[idx as usize] = NIL;
        if self.first != NIL {
            self.prev[self.first as usize] = idx;
            self.bumped[idx as usize] = self.bumped[self.first as usize] - 1;
        } else {
            self.last = idx;
            self.bumped[idx as usize] = 0;
        }
        self.first = idx;
    }

    /// Queue order from oldest to newest (testing only)
    #[cfg(test)]
    pub(crate) fn order(&self) -> Vec<Variable> {
        let mut out = Vec::new();
        let mut idx = self.first;
        while idx != NIL {
            out.push(Variable(idx));
            idx = self.next[idx as usize];
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_initial_order_prefers_large_index() {
        let mut queue = Queue::new(4, false);
        let values = vec![None; 4];
        // Largest index was enqueued last and is picked first.
        assert_eq!(queue.next_unassigned(&values), Variable(3));
    }

    #[test]
    fn test_reverse_initial_order() {
        let mut queue = Queue::new(4, true);
        let values = vec![None; 4];
        assert_eq!(queue.order(), vec![Variable(3), Variable(2), Variable(1), Variable(0)]);
        assert_eq!(queue.next_unassigned(&values), Variable(0));
    }

    #[test]
    fn test_bump_moves_to_tail() {
        let mut queue = Queue::new(4, false);
        queue.bump(Variable(1), true);
        let values = vec![None; 4];
        assert_eq!(queue.next_unassigned(&values), Variable(1));
        assert_eq!(queue.order().last(), Some(&Variable(1)));
    }

    #[test]
    fn test_cursor_skips_assigned() {
        let mut queue = Queue::new(3, false);
        let values = vec![None, None, Some(true)];
        assert_eq!(queue.next_unassigned(&values), Variable(1));
        // Memoized: asking again does not re-walk.
        let before = queue.searched();
        assert_eq!(queue.next_unassigned(&values), Variable(1));
        assert_eq!(queue.searched(), before);
    }

    #[test]
    fn test_unassign_moves_cursor_right() {
        let mut queue = Queue::new(3, false);
        // Bump 0 while it is assigned; cursor stays behind.
        queue.bump(Variable(0), false);
        let assigned = vec![Some(true), None, None];
        assert_eq!(queue.next_unassigned(&assigned), Variable(2));
        // Unassigning 0 (now the newest stamp) pulls the cursor onto it.
        queue.update_on_unassign(Variable(0));
        let values = vec![None, None, None];
        assert_eq!(queue.next_unassigned(&values), Variable(0));
    }

    #[test]
    fn test_shuffle_reverse_and_stamps() {
        let mut queue = Queue::new(5, false);
        let before = queue.order();
        queue.shuffle(0, false);
        let after = queue.order();
        let reversed: Vec<_> = before.into_iter().rev().collect();
        assert_eq!(after, reversed);
        // Stamps strictly increase along the queue.
        for pair in after.windows(2) {
            assert!(queue.bumped(pair[0]) < queue.bumped(pair[1]));
        }
    }

    #[test]
    fn test_shuffle_random_deterministic() {
        let mut a = Queue::new(16, false);
        let mut b = Queue::new(16, false);
        a.shuffle(42, true);
        b.shuffle(42, true);
        assert_eq!(a.order(), b.order());

        let mut c = Queue::new(16, false);
        c.shuffle(43, true);
        assert_ne!(a.order(), c.order());
    }

    proptest! {
        /// Stamp order and queue order agree after arbitrary bump sequences
        #[test]
        fn prop_stamps_match_order(bumps in proptest::collection::vec(0u32..8, 0..64)) {
            let mut queue = Queue::new(8, false);
            for &v in &bumps {
                queue.bump(Variable(v), true);
            }
            let order = queue.order();
            for pair in order.windows(2) {
                prop_assert!(queue.bumped(pair[0]) < queue.bumped(pair[1]));
            }
            // Every variable appears exactly once.
            let mut seen: Vec<_> = order.iter().map(|v| v.0).collect();
            seen.sort_unstable();
            prop_assert_eq!(seen, (0..8).collect::<Vec<_>>());
        }
    }
}
