//! Conflict analysis bookkeeping
//!
//! The analyzer owns the transient per-variable flags (`seen` during the
//! 1UIP derivation, `keep`/`poison`/`removable` during minimization), the
//! learned-clause buffer, and the list of decision levels contributing to
//! the conflict. All of it is reusable storage: every marking has a
//! matching clearing path so no allocation happens per conflict.

use crate::literal::{Literal, Variable};

/// Transient per-variable analysis flags
#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    seen: bool,
    keep: bool,
    poison: bool,
    removable: bool,
}

/// Reusable conflict-analysis state
#[derive(Debug, Default)]
pub struct Analyzer {
    flags: Vec<Flags>,
    /// Literals marked `seen` in the current analysis, for clearing
    pub analyzed: Vec<Literal>,
    /// The learned clause under construction
    pub clause: Vec<Literal>,
    /// Decision levels contributing to the conflict
    pub levels: Vec<u32>,
    /// Variables with minimization flags set, for clearing
    pub minimized: Vec<Variable>,
    gtab: Vec<u64>,
    gstamp: u64,
}

impl Analyzer {
    /// Create an analyzer for `num_vars` variables
    pub fn new(num_vars: usize) -> Self {
        Analyzer {
            flags: vec![Flags::default(); num_vars],
            ..Analyzer::default()
        }
    }

    /// Grow the flag tables to `num_vars`
    pub fn ensure_num_vars(&mut self, num_vars: usize) {
        if self.flags.len() < num_vars {
            self.flags.resize(num_vars, Flags::default());
        }
    }

    /// Was the variable marked seen in this analysis?
    #[inline]
    pub fn seen(&self, var: Variable) -> bool {
        self.flags[var.index()].seen
    }

    /// Mark a literal seen and remember it for clearing
    #[inline]
    pub fn mark_seen(&mut self, lit: Literal) {
        self.flags[lit.variable().index()].seen = true;
        self.analyzed.push(lit);
    }

    /// Clear the seen flag of one variable
    #[inline]
    pub fn unmark_seen(&mut self, var: Variable) {
        self.flags[var.index()].seen = false;
    }

    /// Minimization: literal known to stay in the clause
    #[inline]
    pub fn is_keep(&self, var: Variable) -> bool {
        self.flags[var.index()].keep
    }

    /// Minimization: literal known not to be removable
    #[inline]
    pub fn is_poison(&self, var: Variable) -> bool {
        self.flags[var.index()].poison
    }

    /// Minimization: literal known to be removable
    #[inline]
    pub fn is_removable(&self, var: Variable) -> bool {
        self.flags[var.index()].removable
    }

    /// Mark a clause literal as kept during minimization
    #[inline]
    pub fn mark_keep(&mut self, var: Variable) {
        self.flags[var.index()].keep = true;
        self.minimized.push(var);
    }

    /// Cache a failed minimization attempt
    #[inline]
    pub fn mark_poison(&mut self, var: Variable) {
        self.flags[var.index()].poison = true;
        self.minimized.push(var);
    }

    /// Cache a successful minimization attempt
    #[inline]
    pub fn mark_removable(&mut self, var: Variable) {
        self.flags[var.index()].removable = true;
        self.minimized.push(var);
    }

    /// Clear all seen flags recorded in `analyzed`
    pub fn clear_analyzed(&mut self) {
        for i in 0..self.analyzed.len() {
            let var = self.analyzed[i].variable();
            debug_assert!(self.flags[var.index()].seen);
            self.flags[var.index()].seen = false;
        }
        self.analyzed.clear();
    }

    /// Clear all minimization flags recorded in `minimized`
    pub fn clear_minimized(&mut self) {
        for i in 0..self.minimized.len() {
            let idx = self.minimized[i].index();
            self.flags[idx].keep = false;
            self.flags[idx].poison = false;
            self.flags[idx].removable = false;
        }
        self.minimized.clear();
    }

    /// Count the distinct nonzero assignment levels among `lits`, using a
    /// stamped level table so no per-call clearing is needed
    pub fn glue_of(&mut self, lits: &[Literal], levels: &[u32]) -> u32 {
        self.gstamp += 1;
        let stamp = self.gstamp;
        let mut glue = 0u32;
        for &lit in lits {
            let level = levels[lit.variable().index()] as usize;
            if level == 0 {
                continue;
            }
            if self.gtab.len() <= level {
                self.gtab.resize(level + 1, 0);
            }
            if self.gtab[level] != stamp {
                self.gtab[level] = stamp;
                glue += 1;
            }
        }
        glue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(v: u32) -> Literal {
        Literal::positive(Variable(v))
    }

    #[test]
    fn test_seen_marking_and_clearing() {
        let mut analyzer = Analyzer::new(4);
        analyzer.mark_seen(lit(0));
        analyzer.mark_seen(lit(2));
        assert!(analyzer.seen(Variable(0)));
        assert!(!analyzer.seen(Variable(1)));
        assert!(analyzer.seen(Variable(2)));

        analyzer.clear_analyzed();
        assert!(!analyzer.seen(Variable(0)));
        assert!(!analyzer.seen(Variable(2)));
        assert!(analyzer.analyzed.is_empty());
    }

    #[test]
    fn test_minimize_flags_cleared_together() {
        let mut analyzer = Analyzer::new(4);
        analyzer.mark_keep(Variable(0));
        analyzer.mark_poison(Variable(1));
        analyzer.mark_removable(Variable(2));
        analyzer.clear_minimized();
        for v in 0..4 {
            assert!(!analyzer.is_keep(Variable(v)));
            assert!(!analyzer.is_poison(Variable(v)));
            assert!(!analyzer.is_removable(Variable(v)));
        }
    }

    #[test]
    fn test_glue_counts_distinct_nonzero_levels() {
        let mut analyzer = Analyzer::new(5);
        let levels = vec![0, 1, 1, 3, 2];
        let lits: Vec<Literal> = (0..5).map(lit).collect();
        assert_eq!(analyzer.glue_of(&lits, &levels), 3);
        // Stamping means an immediate second call still works.
        assert_eq!(analyzer.glue_of(&lits[..3], &levels), 1);
    }
}
