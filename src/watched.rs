//! 2-watched literal scheme
//!
//! Every clause of size two or more is watched through its first two
//! literals; the watch for a clause lives in the watch lists of those two
//! literals. When a literal `l` is assigned true, propagation walks the
//! watch list of `-l`.

use crate::clause::ClauseRef;
use crate::literal::Literal;

/// A watcher entry (8 bytes)
///
/// The blocking literal is a satisfaction hint: if it is true the clause
/// is satisfied and never dereferenced. For binary clauses the blocker
/// *is* the other literal, so the clause body is never touched during
/// propagation at all. The binary property is packed into the high bit of
/// the clause reference.
#[derive(Debug, Clone, Copy)]
pub struct Watcher {
    clause: ClauseRef,
    blocker: Literal,
}

impl Watcher {
    const BINARY_FLAG: u32 = 0x8000_0000;

    /// Create a watcher for a binary clause; `other` is the second literal
    #[inline]
    pub fn binary(clause: ClauseRef, other: Literal) -> Self {
        Watcher {
            clause: ClauseRef(clause.0 | Self::BINARY_FLAG),
            blocker: other,
        }
    }

    /// Create a watcher for a clause with three or more literals
    #[inline]
    pub fn long(clause: ClauseRef, blocker: Literal) -> Self {
        debug_assert!(clause.0 & Self::BINARY_FLAG == 0, "ClauseRef too large");
        Watcher { clause, blocker }
    }

    /// Check if this watches a binary clause
    #[inline]
    pub fn is_binary(&self) -> bool {
        self.clause.0 & Self::BINARY_FLAG != 0
    }

    /// Get the clause reference (strips the binary flag)
    #[inline]
    pub fn clause_ref(&self) -> ClauseRef {
        ClauseRef(self.clause.0 & !Self::BINARY_FLAG)
    }

    /// Get the blocking literal
    #[inline]
    pub fn blocker(&self) -> Literal {
        self.blocker
    }

    /// Rewrite the blocking literal in place
    #[inline]
    pub fn set_blocker(&mut self, lit: Literal) {
        self.blocker = lit;
    }
}

/// Per-literal watch lists
#[derive(Debug, Default)]
pub struct WatchLists {
    lists: Vec<Vec<Watcher>>,
}

impl WatchLists {
    /// Create watch lists for `num_vars` variables (two slots per variable)
    pub fn new(num_vars: usize) -> Self {
        WatchLists {
            lists: vec![Vec::new(); num_vars * 2],
        }
    }

    /// Grow the tables so literals of `num_vars` variables can be indexed
    pub fn ensure_num_vars(&mut self, num_vars: usize) {
        let target = num_vars.saturating_mul(2);
        if self.lists.len() < target {
            self.lists.resize_with(target, Vec::new);
        }
    }

    /// Clear every list, keeping the outer allocation
    pub fn clear(&mut self) {
        for list in &mut self.lists {
            list.clear();
        }
    }

    /// Add a watcher to a literal's list
    #[inline]
    pub fn add(&mut self, lit: Literal, watcher: Watcher) {
        self.lists[lit.index()].push(watcher);
    }

    /// Watchers of a literal
    #[inline]
    pub fn get(&self, lit: Literal) -> &[Watcher] {
        &self.lists[lit.index()]
    }

    /// Mutable list of a literal, for in-place editing during propagation
    #[inline]
    pub fn get_mut(&mut self, lit: Literal) -> &mut Vec<Watcher> {
        &mut self.lists[lit.index()]
    }

    /// Drop the watcher of `clause` from `lit`'s list
    pub fn remove(&mut self, lit: Literal, clause: ClauseRef) {
        self.lists[lit.index()].retain(|w| w.clause_ref() != clause);
    }

    /// Count how many lists reference a clause (invariant checking)
    pub fn count_for_clause(&self, clause: ClauseRef) -> usize {
        self.lists
            .iter()
            .flatten()
            .filter(|w| w.clause_ref() == clause)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Variable;
    use proptest::prelude::*;

    proptest! {
        /// Adding a watch increases the count by one
        #[test]
        fn prop_add_increases_count(var_idx in 0u32..10) {
            let mut watches = WatchLists::new(10);
            let lit = Literal::positive(Variable(var_idx));
            let blocker = Literal::negative(Variable(var_idx));

            let before = watches.get(lit).len();
            watches.add(lit, Watcher::long(ClauseRef(0), blocker));
            prop_assert_eq!(watches.get(lit).len(), before + 1);
        }

        /// Watcher fields survive insertion
        #[test]
        fn prop_watcher_preserved(
            var1 in 0u32..10,
            var2 in 0u32..10,
            clause_id in 0u32..100
        ) {
            let mut watches = WatchLists::new(10);
            let lit = Literal::positive(Variable(var1));
            let blocker = Literal::negative(Variable(var2));
            let clause = ClauseRef(clause_id);

            watches.add(lit, Watcher::long(clause, blocker));
            let ws = watches.get(lit);
            prop_assert_eq!(ws.len(), 1);
            prop_assert_eq!(ws[0].clause_ref(), clause);
            prop_assert_eq!(ws[0].blocker(), blocker);
            prop_assert!(!ws[0].is_binary());
        }

        /// Binary flag round-trips independently of the blocker
        #[test]
        fn prop_binary_flag(clause_id in 0u32..1000, var in 0u32..1000) {
            let other = Literal::positive(Variable(var));
            let w = Watcher::binary(ClauseRef(clause_id), other);
            prop_assert!(w.is_binary());
            prop_assert_eq!(w.clause_ref(), ClauseRef(clause_id));
            prop_assert_eq!(w.blocker(), other);
        }
    }

    #[test]
    fn test_set_blocker_keeps_flags() {
        let mut w = Watcher::binary(ClauseRef(7), Literal(3));
        w.set_blocker(Literal(9));
        assert!(w.is_binary());
        assert_eq!(w.clause_ref(), ClauseRef(7));
        assert_eq!(w.blocker(), Literal(9));
    }

    #[test]
    fn test_remove() {
        let mut watches = WatchLists::new(4);
        let lit = Literal::positive(Variable(1));
        watches.add(lit, Watcher::long(ClauseRef(0), Literal(0)));
        watches.add(lit, Watcher::long(ClauseRef(1), Literal(0)));
        watches.remove(lit, ClauseRef(0));
        assert_eq!(watches.get(lit).len(), 1);
        assert_eq!(watches.get(lit)[0].clause_ref(), ClauseRef(1));
    }

    #[test]
    fn test_count_for_clause() {
        let mut watches = WatchLists::new(4);
        let a = Literal::positive(Variable(0));
        let b = Literal::negative(Variable(2));
        watches.add(a, Watcher::long(ClauseRef(5), b));
        watches.add(b, Watcher::long(ClauseRef(5), a));
        assert_eq!(watches.count_for_clause(ClauseRef(5)), 2);
        assert_eq!(watches.count_for_clause(ClauseRef(6)), 0);
    }
}
