//! CDCL search core
//!
//! The main loop is decide → propagate → (conflict ⇒ analyze ⇒ backjump).
//! The solver owns all mutable search state: the assignment tables, the
//! trail and control stack, the watch lists, the clause arena, and the two
//! decision indexes (VMTF queue for focused mode, EVSIDS heap for stable
//! mode). Restart and reduce scheduling live outside; the hooks they need
//! (`backtrack`, `collect_garbage`, the shuffles, `set_stable`) are public.

use crate::clause::{ClauseDb, ClauseRef, KEEP_GLUE};
use crate::conflict::Analyzer;
use crate::gates::{Gate, GateExtractor, GateStats, Occurrences};
use crate::literal::{Literal, Variable};
use crate::options::Options;
use crate::proof::ProofWriter;
use crate::queue::Queue;
use crate::sort::sort_by_rank;
use crate::vsids::ScoreHeap;
use crate::watched::{WatchLists, Watcher};
use std::io::Write;

/// Solver verdict, with the conventional exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// A satisfying assignment was found (code 10)
    Satisfiable,
    /// The formula (or the assumptions) are unsatisfiable (code 20)
    Unsatisfiable,
    /// Undecided, e.g. interrupted (code 0)
    Unknown,
}

impl Status {
    /// Conventional exit code: 10 for SAT, 20 for UNSAT, 0 otherwise
    pub fn code(self) -> i32 {
        match self {
            Status::Satisfiable => 10,
            Status::Unsatisfiable => 20,
            Status::Unknown => 0,
        }
    }
}

/// Why a variable is assigned
///
/// With chronological backtracking a unit can be assigned while the
/// decision level is positive (its assignment level is still zero), so
/// units and decisions need distinct tags; a null-like reason alone
/// cannot tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// Decision, no antecedent
    Decision,
    /// Unit derived at assignment level zero
    Unit,
    /// Forced by a clause
    Clause(ClauseRef),
}

/// One control-stack frame per decision level. `trail` is the trail
/// height just before the decision; the `seen` pair tracks, per conflict,
/// how many literals of this level were analyzed and the earliest trail
/// position among them.
#[derive(Debug)]
struct Frame {
    decision: Option<Literal>,
    trail: usize,
    seen_count: u32,
    seen_trail: usize,
}

impl Frame {
    fn new(decision: Option<Literal>, trail: usize) -> Self {
        Frame {
            decision,
            trail,
            seen_count: 0,
            seen_trail: usize::MAX,
        }
    }
}

/// Lucky pre-solver counters, one per strategy
#[derive(Debug, Clone, Default)]
pub struct LuckyStats {
    /// Pre-solver invocations
    pub tried: u64,
    /// Invocations that solved the formula
    pub succeeded: u64,
    /// All-false assignments
    pub constant_zero: u64,
    /// All-true assignments
    pub constant_one: u64,
    /// Forward index order, false phase
    pub forward_zero: u64,
    /// Forward index order, true phase
    pub forward_one: u64,
    /// Backward index order, false phase
    pub backward_zero: u64,
    /// Backward index order, true phase
    pub backward_one: u64,
    /// Positive horn assignments
    pub horn_positive: u64,
    /// Negative horn assignments
    pub horn_negative: u64,
}

/// Search statistics
#[derive(Debug, Clone, Default)]
pub struct SearchStats {
    /// Conflicts analyzed
    pub conflicts: u64,
    /// Decisions taken
    pub decisions: u64,
    /// Trail literals propagated
    pub propagations: u64,
    /// Variables fixed at assignment level zero
    pub fixed: u64,
    /// Learned clauses of size two or more
    pub learned_clauses: u64,
    /// Learned unit clauses
    pub learned_units: u64,
    /// Learned binary clauses
    pub learned_binaries: u64,
    /// Chronological backtracks
    pub chrono_backtracks: u64,
    /// Clause promotions to a lower glue
    pub promoted: u64,
    /// Eager subsumption attempts
    pub eager_tried: u64,
    /// Clauses removed by eager subsumption
    pub eager_subsumed: u64,
    /// Shuffle rounds
    pub shuffled: u64,
    /// Lucky pre-solver counters
    pub lucky: LuckyStats,
}

/// The CDCL search core
pub struct Solver<W: Write = Vec<u8>> {
    opts: Options,
    num_vars: usize,
    db: ClauseDb,
    watches: WatchLists,
    queue: Queue,
    scores: ScoreHeap,
    analyzer: Analyzer,
    gate_extractor: GateExtractor,

    values: Vec<Option<bool>>,
    levels: Vec<u32>,
    reasons: Vec<Reason>,
    trail_pos: Vec<usize>,
    saved_phase: Vec<Option<bool>>,
    target_phase: Vec<Option<bool>>,
    target_trail_len: usize,

    trail: Vec<Literal>,
    control: Vec<Frame>,
    propagated: usize,
    conflict: Option<ClauseRef>,
    unsat: bool,
    stable: bool,
    searching_lucky_phases: bool,
    watching: bool,

    assumptions: Vec<Literal>,
    failed_assumption: Option<Literal>,

    marks: Vec<i8>,
    marked: Vec<Literal>,

    proof: Option<ProofWriter<W>>,
    deferred_deletions: Vec<Vec<Literal>>,

    model: Vec<bool>,
    stats: SearchStats,
}

impl Solver<Vec<u8>> {
    /// Create a solver over `num_vars` variables with default options
    pub fn new(num_vars: usize) -> Self {
        Self::with_options(num_vars, Options::default())
    }

    /// Create a solver with explicit options
    pub fn with_options(num_vars: usize, opts: Options) -> Self {
        Self::build(num_vars, opts, None)
    }
}

impl<W: Write> Solver<W> {
    /// Create a solver that traces derived and deleted clauses to a proof
    pub fn with_proof(num_vars: usize, opts: Options, proof: ProofWriter<W>) -> Self {
        Self::build(num_vars, opts, Some(proof))
    }

    fn build(num_vars: usize, opts: Options, proof: Option<ProofWriter<W>>) -> Self {
        let clauses_capacity = num_vars.saturating_mul(4).min(100_000);
        Solver {
            num_vars,
            db: ClauseDb::with_capacity(clauses_capacity, clauses_capacity * 3),
            watches: WatchLists::new(num_vars),
            queue: Queue::new(num_vars, opts.reverse),
            scores: ScoreHeap::new(num_vars),
            analyzer: Analyzer::new(num_vars),
            gate_extractor: GateExtractor::new(num_vars),
            values: vec![None; num_vars],
            levels: vec![0; num_vars],
            reasons: vec![Reason::Decision; num_vars],
            trail_pos: vec![usize::MAX; num_vars],
            saved_phase: vec![None; num_vars],
            target_phase: vec![None; num_vars],
            target_trail_len: 0,
            trail: Vec::with_capacity(num_vars),
            control: vec![Frame::new(None, 0)],
            propagated: 0,
            conflict: None,
            unsat: false,
            stable: false,
            searching_lucky_phases: false,
            watching: false,
            assumptions: Vec::new(),
            failed_assumption: None,
            marks: vec![0; num_vars],
            marked: Vec::new(),
            proof,
            deferred_deletions: Vec::new(),
            model: Vec::new(),
            stats: SearchStats::default(),
            opts,
        }
    }

    /// Number of variables
    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    /// Search statistics
    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    /// Gate extraction statistics
    pub fn gate_stats(&self) -> &GateStats {
        self.gate_extractor.stats()
    }

    /// Current options
    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// Switch between focused mode (VMTF) and stable mode (EVSIDS).
    /// Driven by the external restart scheduler.
    pub fn set_stable(&mut self, stable: bool) {
        self.stable = stable;
    }

    /// The assumption that failed the last assumption-based solve
    pub fn failed_assumption(&self) -> Option<Literal> {
        self.failed_assumption
    }

    /// The satisfying assignment recorded by the last successful solve
    pub fn model(&self) -> &[bool] {
        &self.model
    }

    /// Value of a variable under the current assignment
    pub fn value(&self, var: Variable) -> Option<bool> {
        self.values[var.index()]
    }

    /// Current decision level
    #[inline]
    pub fn level(&self) -> u32 {
        (self.control.len() - 1) as u32
    }

    /// Decision literal of a level, if that level holds a real decision.
    /// Used by external restart schedulers to inspect the trail prefix.
    pub fn decision_of_level(&self, level: u32) -> Option<Literal> {
        self.control.get(level as usize).and_then(|f| f.decision)
    }

    /// Grow all per-variable tables to `num_vars`
    pub fn ensure_num_vars(&mut self, num_vars: usize) {
        if num_vars <= self.num_vars {
            return;
        }
        self.values.resize(num_vars, None);
        self.levels.resize(num_vars, 0);
        self.reasons.resize(num_vars, Reason::Decision);
        self.trail_pos.resize(num_vars, usize::MAX);
        self.saved_phase.resize(num_vars, None);
        self.target_phase.resize(num_vars, None);
        self.marks.resize(num_vars, 0);
        self.watches.ensure_num_vars(num_vars);
        self.queue.init(num_vars, self.opts.reverse);
        self.scores.init(num_vars);
        self.analyzer.ensure_num_vars(num_vars);
        self.gate_extractor.ensure_num_vars(num_vars);
        self.num_vars = num_vars;
    }

    /// Add an original clause. Adding the empty clause makes the formula
    /// unsatisfiable on the spot.
    pub fn add_clause(&mut self, literals: &[Literal]) {
        if self.unsat {
            return;
        }
        if literals.is_empty() {
            self.unsat = true;
            return;
        }
        if let Some(max) = literals.iter().map(|l| l.variable().0).max() {
            self.ensure_num_vars(max as usize + 1);
        }
        if self.watching {
            // Clauses added after watches were connected force a rebuild.
            self.backtrack(0);
            self.watching = false;
        }
        self.db.add(literals, false);
    }

    // ======================================================================
    // Assignment
    // ======================================================================

    #[inline]
    fn lit_value(&self, lit: Literal) -> Option<bool> {
        self.values[lit.variable().index()].map(|v| v == lit.is_positive())
    }

    /// With chronological backtracking the assignment level of a forced
    /// literal is the maximum level among the other reason literals,
    /// which can be below the current decision level.
    fn assignment_level(&self, lit: Literal, reason: ClauseRef) -> u32 {
        let mut res = 0;
        for &other in self.db.literals(reason) {
            if other == lit {
                continue;
            }
            debug_assert!(self.lit_value(other).is_some());
            let level = self.levels[other.variable().index()];
            if level > res {
                res = level;
            }
        }
        res
    }

    fn search_assign(&mut self, lit: Literal, reason: Reason) {
        let idx = lit.variable().index();
        debug_assert!(self.values[idx].is_none());

        let mut reason = reason;
        let lit_level = match reason {
            Reason::Unit => 0,
            Reason::Decision => self.level(),
            Reason::Clause(c) => {
                if self.opts.chrono > 0 {
                    self.assignment_level(lit, c)
                } else {
                    self.level()
                }
            }
        };
        if lit_level == 0 {
            reason = Reason::Unit;
            self.learn_unit(lit);
        }

        self.levels[idx] = lit_level;
        self.trail_pos[idx] = self.trail.len();
        self.reasons[idx] = reason;
        self.values[idx] = Some(lit.is_positive());
        if !self.searching_lucky_phases {
            self.saved_phase[idx] = Some(lit.is_positive());
        }
        self.trail.push(lit);
        log::trace!("assign {} @ {}", lit.to_dimacs(), lit_level);
    }

    /// Assume `lit` as a decision: open a new level and assign it
    pub fn assume_decision(&mut self, lit: Literal) {
        debug_assert_eq!(self.propagated, self.trail.len());
        self.control.push(Frame::new(Some(lit), self.trail.len()));
        self.search_assign(lit, Reason::Decision);
    }

    fn learn_unit(&mut self, lit: Literal) {
        self.stats.fixed += 1;
        if let Some(proof) = &mut self.proof {
            let _ = proof.add_derived_unit(lit);
        }
    }

    fn learn_empty(&mut self) {
        if self.unsat {
            return;
        }
        log::debug!("learned empty clause");
        if let Some(proof) = &mut self.proof {
            let _ = proof.add_empty_clause();
        }
        self.unsat = true;
    }

    // ======================================================================
    // Backtracking
    // ======================================================================

    /// Undo the trail down to `target`. Variables above the target level
    /// are unassigned (their phase was saved at assignment); with
    /// chronological backtracking, kept out-of-order literals are
    /// compacted toward the front and re-propagated.
    pub fn backtrack(&mut self, target: u32) {
        debug_assert!(target <= self.level());
        if !self.searching_lucky_phases {
            self.update_target_phases();
        }
        if self.level() <= target {
            return;
        }

        // Blocks at or below the target hold only assignment levels at or
        // below the target, so the scan starts above them.
        let assigned_limit = self.control[target as usize + 1].trail;
        let mut write = assigned_limit;
        for read in assigned_limit..self.trail.len() {
            let lit = self.trail[read];
            let idx = lit.variable().index();
            if self.levels[idx] > target {
                self.values[idx] = None;
                self.trail_pos[idx] = usize::MAX;
                self.scores.push(lit.variable());
                self.queue.update_on_unassign(lit.variable());
            } else {
                self.trail[write] = lit;
                self.trail_pos[idx] = write;
                write += 1;
            }
        }
        self.trail.truncate(write);
        self.control.truncate(target as usize + 1);
        if self.propagated > assigned_limit {
            self.propagated = assigned_limit;
        }
    }

    fn update_target_phases(&mut self) {
        if self.trail.len() > self.target_trail_len {
            self.target_trail_len = self.trail.len();
            self.target_phase.copy_from_slice(&self.values);
        }
    }

    // ======================================================================
    // Propagation
    // ======================================================================

    /// Propagate all pending trail literals through the watch lists.
    /// Returns true on fixpoint, false on conflict (stored for `analyze`).
    pub fn propagate(&mut self) -> bool {
        debug_assert!(self.conflict.is_none());
        let mut conflict = None;

        'trail: while self.propagated < self.trail.len() {
            let p = self.trail[self.propagated];
            self.propagated += 1;
            self.stats.propagations += 1;
            let false_lit = p.negated();

            let mut ws = std::mem::take(self.watches.get_mut(false_lit));
            let total = ws.len();
            let mut i = 0;
            let mut j = 0;

            while i < total {
                let w = ws[i];
                i += 1;
                ws[j] = w;
                j += 1;

                let blocker_val = self.lit_value(w.blocker());
                if blocker_val == Some(true) {
                    continue;
                }

                let c = w.clause_ref();
                if w.is_binary() {
                    // The clause body is never dereferenced, so garbage
                    // binaries keep propagating until physically reclaimed;
                    // their proof deletion is deferred accordingly.
                    if blocker_val == Some(false) {
                        conflict = Some(c);
                        while i < total {
                            ws[j] = ws[i];
                            i += 1;
                            j += 1;
                        }
                        break;
                    }
                    self.search_assign(w.blocker(), Reason::Clause(c));
                    continue;
                }

                if self.db.header(c).is_garbage() {
                    j -= 1;
                    continue;
                }

                // Force the falsified literal into the second slot.
                let lit0 = self.db.literal(c, 0);
                let lit1 = self.db.literal(c, 1);
                let other = Literal(lit0.0 ^ lit1.0 ^ false_lit.0);
                {
                    let lits = self.db.literals_mut(c);
                    lits[0] = other;
                    lits[1] = false_lit;
                }

                let u = self.lit_value(other);
                if u == Some(true) {
                    ws[j - 1].set_blocker(other);
                    continue;
                }

                // Search for a replacement watch, resuming at the saved
                // position and wrapping around to the first non-watched slot.
                let size = self.db.header(c).len();
                let mut pos = self.db.header(c).pos();
                if !(2..=size).contains(&pos) {
                    pos = 2;
                }
                let mut replacement = None;
                for k in pos..size {
                    let r = self.db.literal(c, k);
                    let v = self.lit_value(r);
                    if v != Some(false) {
                        replacement = Some((k, r, v));
                        break;
                    }
                }
                if replacement.is_none() {
                    for k in 2..pos {
                        let r = self.db.literal(c, k);
                        let v = self.lit_value(r);
                        if v != Some(false) {
                            replacement = Some((k, r, v));
                            break;
                        }
                    }
                }
                self.db
                    .header_mut(c)
                    .set_pos(replacement.map_or(size, |(k, _, _)| k));

                match replacement {
                    Some((_, r, Some(true))) => {
                        // Satisfied elsewhere, just remember the satisfier.
                        ws[j - 1].set_blocker(r);
                    }
                    Some((k, r, None)) => {
                        // Move the unassigned replacement into the watch.
                        let lits = self.db.literals_mut(c);
                        lits[1] = r;
                        lits[k] = false_lit;
                        self.watches.add(r, Watcher::long(c, false_lit));
                        j -= 1;
                    }
                    Some((_, _, Some(false))) => unreachable!(),
                    None if u.is_none() => {
                        // All other literals false: unit.
                        self.search_assign(other, Reason::Clause(c));
                        if self.opts.chrono >= 2 {
                            // The forcing level can exceed the falsified
                            // watch's level; rewatch a literal of the
                            // forcing level instead.
                            let other_level = self.levels[other.variable().index()];
                            if other_level > self.levels[false_lit.variable().index()] {
                                let mut at = 0usize;
                                for k in 2..size {
                                    let s = self.db.literal(c, k);
                                    if self.levels[s.variable().index()] == other_level {
                                        at = k;
                                        break;
                                    }
                                }
                                debug_assert!(at >= 2);
                                if at >= 2 {
                                    let s = self.db.literal(c, at);
                                    let lits = self.db.literals_mut(c);
                                    lits[1] = s;
                                    lits[at] = false_lit;
                                    self.watches.add(s, Watcher::long(c, other));
                                    j -= 1;
                                }
                            }
                        }
                    }
                    None => {
                        debug_assert_eq!(u, Some(false));
                        conflict = Some(c);
                        while i < total {
                            ws[j] = ws[i];
                            i += 1;
                            j += 1;
                        }
                        break;
                    }
                }
            }

            ws.truncate(j);
            *self.watches.get_mut(false_lit) = ws;
            if conflict.is_some() {
                break 'trail;
            }
        }

        if let Some(c) = conflict {
            log::trace!("conflict in clause {}", c.0);
        }
        self.conflict = conflict;
        conflict.is_none()
    }

    // ======================================================================
    // Conflict analysis
    // ======================================================================

    /// Analyze the pending conflict: derive the first-UIP clause, bump,
    /// minimize, learn the driving clause, pick the backtrack level, jump
    /// and assert the flipped UIP. With chronological backtracking the
    /// conflict is first normalized to its actual conflict level.
    pub fn analyze(&mut self) {
        let Some(conflict_ref) = self.conflict else {
            debug_assert!(false, "analyze without a conflict");
            return;
        };

        if self.opts.chrono > 0 {
            let (conflict_level, forced) = self.find_conflict_level(conflict_ref);
            if let Some(forced) = forced {
                // A single literal at the highest level: the conflicting
                // clause itself drives it, no new clause is needed.
                self.backtrack(conflict_level - 1);
                self.search_assign(forced, Reason::Clause(conflict_ref));
                self.conflict = None;
                return;
            }
            self.backtrack(conflict_level);
        }

        if self.level() == 0 {
            self.learn_empty();
            self.conflict = None;
            return;
        }
        self.stats.conflicts += 1;

        // First-UIP derivation: resolve reasons of seen literals on the
        // current level, walking the trail backwards, until a single open
        // literal remains.
        debug_assert!(self.analyzer.clause.is_empty());
        let mut reason_ref = conflict_ref;
        let mut uip: Option<Literal> = None;
        let mut open: u32 = 0;
        let mut index = self.trail.len();
        loop {
            self.analyze_reason(uip, reason_ref, &mut open);
            let next = loop {
                debug_assert!(index > 0);
                index -= 1;
                let lit = self.trail[index];
                if !self.analyzer.seen(lit.variable()) {
                    continue;
                }
                if self.levels[lit.variable().index()] == self.level() {
                    break lit;
                }
            };
            uip = Some(next);
            open -= 1;
            if open == 0 {
                break;
            }
            reason_ref = match self.reasons[next.variable().index()] {
                Reason::Clause(c) => c,
                _ => unreachable!("resolved literal must have a clause reason"),
            };
        }
        let uip = uip.expect("conflict has a literal on the conflict level");
        self.analyzer.clause.push(uip.negated());

        if self.opts.bump {
            self.bump_variables();
        }

        if self.opts.minimize && self.analyzer.clause.len() > 1 {
            self.minimize_clause();
        }

        let size = self.analyzer.clause.len();
        match size {
            1 => self.stats.learned_units += 1,
            2 => self.stats.learned_binaries += 1,
            _ => {}
        }

        let glue = self.analyzer.glue_of_clause(&self.levels);
        let (jump, driving) = self.new_driving_clause(glue);
        let new_level = self.determine_backtrack_level(jump);
        self.backtrack(new_level);

        match driving {
            Some(c) => self.search_assign(uip.negated(), Reason::Clause(c)),
            None if size == 1 => self.search_assign(uip.negated(), Reason::Unit),
            None => self.learn_empty(),
        }

        // Clean up all transient analysis state.
        self.analyzer.clear_analyzed();
        for i in 0..self.analyzer.levels.len() {
            let l = self.analyzer.levels[i] as usize;
            if l < self.control.len() {
                self.control[l].seen_count = 0;
                self.control[l].seen_trail = usize::MAX;
            }
        }
        self.analyzer.levels.clear();
        self.analyzer.clause.clear();
        self.conflict = None;

        if let Some(c) = driving {
            if self.opts.eager_subsume {
                self.eagerly_subsume_recently_learned(c);
            }
        }
    }

    /// Find the highest assignment level in the conflicting clause and
    /// the forced literal if that level holds exactly one literal. Also
    /// repairs the watches so the two highest-level literals are watched.
    fn find_conflict_level(&mut self, conflict: ClauseRef) -> (u32, Option<Literal>) {
        let mut res = 0;
        let mut count = 0;
        let mut forced = None;

        let size = self.db.header(conflict).len();
        for k in 0..size {
            let lit = self.db.literal(conflict, k);
            let level = self.levels[lit.variable().index()];
            if level > res {
                res = level;
                forced = Some(lit);
                count = 1;
            } else if level == res {
                count += 1;
                if res == self.level() && count > 1 {
                    break;
                }
            }
        }

        // Move the two highest-level literals into the watched slots,
        // relocating the watches accordingly.
        for i in 0..2usize.min(size) {
            let lit = self.db.literal(conflict, i);
            let mut highest_pos = i;
            let mut highest_lit = lit;
            let mut highest_level = self.levels[highest_lit.variable().index()];
            for k in i + 1..size {
                let candidate = self.db.literal(conflict, k);
                let level = self.levels[candidate.variable().index()];
                if highest_level >= level {
                    continue;
                }
                highest_lit = candidate;
                highest_pos = k;
                highest_level = level;
                if highest_level == res {
                    break;
                }
                if i > 0 && highest_level == res - 1 {
                    break;
                }
            }
            if highest_pos < 2 {
                continue;
            }
            self.watches.remove(lit, conflict);
            self.db.swap_literals(conflict, i, highest_pos);
            let blocker = self.db.literal(conflict, usize::from(i == 0));
            self.watches
                .add(highest_lit, Watcher::long(conflict, blocker));
        }

        if count != 1 {
            forced = None;
        }
        (res, forced)
    }

    fn analyze_reason(&mut self, skip: Option<Literal>, reason: ClauseRef, open: &mut u32) {
        self.bump_clause(reason);
        for k in 0..self.db.header(reason).len() {
            let lit = self.db.literal(reason, k);
            if Some(lit) != skip {
                self.analyze_literal(lit, open);
            }
        }
    }

    /// A not-yet-seen literal either joins the learned clause (lower
    /// level), is dropped (level zero), or opens one more resolution on
    /// the current level. Per-level seen accounting feeds minimization.
    fn analyze_literal(&mut self, lit: Literal, open: &mut u32) {
        let var = lit.variable();
        if self.analyzer.seen(var) {
            return;
        }
        let level = self.levels[var.index()];
        if level == 0 {
            return;
        }
        debug_assert_eq!(self.lit_value(lit), Some(false));
        debug_assert!(level <= self.level());
        if level < self.level() {
            self.analyzer.clause.push(lit);
        }
        let frame = &mut self.control[level as usize];
        if frame.seen_count == 0 {
            self.analyzer.levels.push(level);
        }
        frame.seen_count += 1;
        let pos = self.trail_pos[var.index()];
        if pos < frame.seen_trail {
            frame.seen_trail = pos;
        }
        self.analyzer.mark_seen(lit);
        if level == self.level() {
            *open += 1;
        }
    }

    /// Mark a clause used; learned clauses get their glue recomputed and
    /// are promoted when it dropped, or move to the middle tier.
    fn bump_clause(&mut self, c: ClauseRef) {
        let header = self.db.header(c);
        let was_used = header.used();
        let glue = header.glue();
        let skip = header.is_keep() || header.is_hyper() || !header.is_redundant();
        self.db.header_mut(c).set_used(1);
        if skip {
            return;
        }
        let new_glue = {
            let lits = self.db.literals(c);
            self.analyzer.glue_of(lits, &self.levels)
        };
        if new_glue < glue {
            self.stats.promoted += 1;
            log::trace!("promoting clause {} to glue {}", c.0, new_glue);
            self.db.promote(c, new_glue);
        } else if was_used > 0 && glue <= self.opts.reduce_tier2_glue {
            self.db.header_mut(c).set_used(2);
        }
    }

    fn bump_variables(&mut self) {
        if self.opts.bump_reason {
            self.bump_also_all_reason_literals();
        }
        if self.use_scores() {
            for i in 0..self.analyzer.analyzed.len() {
                let var = self.analyzer.analyzed[i].variable();
                self.scores.bump(var);
            }
            self.scores.bump_increment(self.opts.score_factor);
        } else {
            // Bump in ascending stamp order so the queue keeps the
            // relative order of the bumped variables.
            let mut analyzed = std::mem::take(&mut self.analyzer.analyzed);
            sort_by_rank(
                &mut analyzed,
                |lit| (self.queue.bumped(lit.variable()) as u64) ^ (1u64 << 63),
                self.opts.radix_sort_limit,
            );
            for &lit in &analyzed {
                let var = lit.variable();
                let unassigned = self.values[var.index()].is_none();
                self.queue.bump(var, unassigned);
            }
            self.analyzer.analyzed = analyzed;
        }
    }

    /// Also mark the literals of the reason clauses of learned-clause
    /// literals, transitively up to the configured depth, so they get
    /// bumped with everything else.
    fn bump_also_all_reason_literals(&mut self) {
        debug_assert!(self.opts.bump_reason_depth > 0);
        for i in 0..self.analyzer.clause.len() {
            let lit = self.analyzer.clause[i];
            self.bump_also_reason_literals(lit.negated(), self.opts.bump_reason_depth);
        }
    }

    fn bump_also_reason_literals(&mut self, lit: Literal, depth: u32) {
        let idx = lit.variable().index();
        if self.levels[idx] == 0 {
            return;
        }
        let Reason::Clause(reason) = self.reasons[idx] else {
            return;
        };
        for k in 0..self.db.header(reason).len() {
            let other = self.db.literal(reason, k);
            if other == lit {
                continue;
            }
            let var = other.variable();
            if self.analyzer.seen(var) || self.levels[var.index()] == 0 {
                continue;
            }
            self.analyzer.mark_seen(other);
            if depth > 1 {
                self.bump_also_reason_literals(other.negated(), depth - 1);
            }
        }
    }

    // ======================================================================
    // Learned-clause minimization
    // ======================================================================

    /// Remove literals whose reason chain is covered by the rest of the
    /// clause, caching poison/removable verdicts per variable.
    fn minimize_clause(&mut self) {
        let clause = std::mem::take(&mut self.analyzer.clause);
        for &lit in &clause {
            self.analyzer.mark_keep(lit.variable());
        }
        let mut kept = Vec::with_capacity(clause.len());
        for &lit in &clause {
            if self.minimize_literal(lit.negated(), 0) {
                log::trace!("minimized away {}", lit.to_dimacs());
            } else {
                kept.push(lit);
            }
        }
        self.analyzer.clear_minimized();
        self.analyzer.clause = kept;
    }

    /// True if the (assigned-true) literal is redundant with respect to
    /// the clause: fixed at level zero, or every antecedent of its reason
    /// is itself redundant or already in the clause.
    fn minimize_literal(&mut self, lit: Literal, depth: u32) -> bool {
        let var = lit.variable();
        let idx = var.index();
        let level = self.levels[idx];

        if level == 0 || self.analyzer.is_removable(var) {
            return true;
        }
        if depth > 0 && self.analyzer.is_keep(var) {
            return true;
        }
        if self.analyzer.is_poison(var) || level == self.level() {
            return false;
        }
        let Reason::Clause(reason) = self.reasons[idx] else {
            return false;
        };
        if depth > self.opts.minimize_depth {
            return false;
        }
        // A literal whose level contributes no other analyzed literal, or
        // which precedes the earliest analyzed literal of its level,
        // cannot resolve away through the clause.
        if depth > 0 {
            let frame = &self.control[level as usize];
            if frame.seen_count < 2 || self.trail_pos[idx] < frame.seen_trail {
                self.analyzer.mark_poison(var);
                return false;
            }
        }

        for k in 0..self.db.header(reason).len() {
            let other = self.db.literal(reason, k);
            if other == lit {
                continue;
            }
            if !self.minimize_literal(other.negated(), depth + 1) {
                self.analyzer.mark_poison(var);
                return false;
            }
        }
        self.analyzer.mark_removable(var);
        true
    }

    // ======================================================================
    // Driving clause and backjumping
    // ======================================================================

    /// Sort the learned clause by descending (level, trail) so the two
    /// watched slots hold the UIP and the next-highest literal, allocate
    /// it, and return the jump level.
    fn new_driving_clause(&mut self, glue: u32) -> (u32, Option<ClauseRef>) {
        let size = self.analyzer.clause.len();
        if size <= 1 {
            return (0, None);
        }

        let mut clause = std::mem::take(&mut self.analyzer.clause);
        sort_by_rank(
            &mut clause,
            |lit| {
                let idx = lit.variable().index();
                let key =
                    ((self.levels[idx] as u64) << 32) | (self.trail_pos[idx] as u64 & 0xffff_ffff);
                !key
            },
            self.opts.radix_sort_limit,
        );
        let jump = self.levels[clause[1].variable().index()];

        if let Some(proof) = &mut self.proof {
            let _ = proof.add_clause(&clause);
        }
        let c = self.db.add(&clause, true);
        let header = self.db.header_mut(c);
        header.set_glue(glue);
        header.set_used(if glue <= self.opts.reduce_tier2_glue { 2 } else { 1 });
        if glue <= KEEP_GLUE {
            header.set_keep();
        }
        self.stats.learned_clauses += 1;

        let lit0 = clause[0];
        let lit1 = clause[1];
        if clause.len() == 2 {
            self.watches.add(lit0, Watcher::binary(c, lit1));
            self.watches.add(lit1, Watcher::binary(c, lit0));
        } else {
            self.watches.add(lit0, Watcher::long(c, lit1));
            self.watches.add(lit1, Watcher::long(c, lit0));
        }

        log::debug!(
            "learned glue {} size {} clause, jump level {}",
            glue,
            clause.len(),
            jump
        );
        self.analyzer.clause = clause;
        (jump, Some(c))
    }

    /// Decide between the jump level and a chronological target, possibly
    /// reusing the trail up to the most valuable assigned variable.
    fn determine_backtrack_level(&mut self, jump: u32) -> u32 {
        let level = self.level();
        debug_assert!(level > jump);

        if self.opts.chrono == 0 {
            jump
        } else if self.opts.chrono_always {
            self.stats.chrono_backtracks += 1;
            level - 1
        } else if jump >= level - 1 {
            jump
        } else if (jump as usize) < self.assumptions.len() {
            jump
        } else if level - jump > self.opts.chrono_level_limit {
            self.stats.chrono_backtracks += 1;
            level - 1
        } else if self.opts.chrono_reuse_trail {
            let start = self.control[jump as usize + 1].trail;
            let mut best_var = self.trail[start].variable();
            let mut best_pos = start;
            for i in start + 1..self.trail.len() {
                let var = self.trail[i].variable();
                let better = if self.use_scores() {
                    let (s, b) = (self.scores.score(var), self.scores.score(best_var));
                    s > b || (s == b && var.0 > best_var.0)
                } else {
                    self.queue.bumped(var) > self.queue.bumped(best_var)
                };
                if better {
                    best_var = var;
                    best_pos = i;
                }
            }
            let mut res = jump;
            while res < level - 1 && self.control[res as usize + 1].trail <= best_pos {
                res += 1;
            }
            if res > jump {
                self.stats.chrono_backtracks += 1;
            }
            res
        } else {
            jump
        }
    }

    // ======================================================================
    // Eager subsumption
    // ======================================================================

    /// Scan recently learned clauses and flag those whose literal set is a
    /// superset of the new clause, within a bounded number of attempts.
    fn eagerly_subsume_recently_learned(&mut self, c: ClauseRef) {
        for k in 0..self.db.header(c).len() {
            let lit = self.db.literal(c, k);
            self.mark_sub(lit);
        }
        let limit = self.stats.eager_tried + self.opts.eager_subsume_limit as u64;
        let c_size = self.db.header(c).len();

        for idx in (0..self.db.len() as u32).rev() {
            if self.stats.eager_tried > limit {
                break;
            }
            self.stats.eager_tried += 1;
            let d = ClauseRef(idx);
            if d == c {
                continue;
            }
            let header = self.db.header(d);
            if header.is_garbage() || !header.is_redundant() {
                continue;
            }
            let mut needed = c_size;
            for k in 0..self.db.header(d).len() {
                let lit = self.db.literal(d, k);
                if self.marked_sub(lit) > 0 {
                    needed -= 1;
                    if needed == 0 {
                        break;
                    }
                }
            }
            if needed == 0 {
                log::trace!("eagerly subsumed clause {}", d.0);
                self.stats.eager_subsumed += 1;
                self.mark_garbage(d);
            }
        }
        self.unmark_sub();
    }

    #[inline]
    fn mark_sub(&mut self, lit: Literal) {
        self.marks[lit.variable().index()] = if lit.is_positive() { 1 } else { -1 };
        self.marked.push(lit);
    }

    #[inline]
    fn marked_sub(&self, lit: Literal) -> i8 {
        let mark = self.marks[lit.variable().index()];
        if lit.is_positive() {
            mark
        } else {
            -mark
        }
    }

    fn unmark_sub(&mut self) {
        for i in 0..self.marked.len() {
            self.marks[self.marked[i].variable().index()] = 0;
        }
        self.marked.clear();
    }

    // ======================================================================
    // Garbage
    // ======================================================================

    /// Flag a clause garbage, tracing its deletion. Binary deletions are
    /// deferred until physical reclamation so the proof stays sound while
    /// their watches keep being traversed.
    pub fn mark_garbage(&mut self, c: ClauseRef) {
        if self.db.header(c).is_garbage() {
            return;
        }
        self.trace_deleted(c);
        self.db.mark_garbage(c);
    }

    fn trace_deleted(&mut self, c: ClauseRef) {
        if self.proof.is_none() {
            return;
        }
        let lits = self.db.literals(c).to_vec();
        if lits.len() == 2 {
            self.deferred_deletions.push(lits);
        } else if let Some(proof) = &mut self.proof {
            let _ = proof.delete_clause(&lits);
        }
    }

    /// Physically reclaim garbage clauses and rebuild the watch lists.
    /// Deferred binary deletions are emitted now. Must run at level zero.
    pub fn collect_garbage(&mut self) {
        debug_assert_eq!(self.level(), 0);
        debug_assert!(self.conflict.is_none());

        let deferred = std::mem::take(&mut self.deferred_deletions);
        if let Some(proof) = &mut self.proof {
            for lits in &deferred {
                let _ = proof.delete_clause(lits);
            }
        }

        let _remap = self.db.compact();
        // Root-level reasons are all units, nothing references clauses.
        debug_assert!(self
            .trail
            .iter()
            .all(|l| !matches!(self.reasons[l.variable().index()], Reason::Clause(_))));

        self.watches.clear();
        self.connect_watches();
    }

    /// Connect watches for every non-garbage clause of size two or more,
    /// binaries first. At level zero a falsified watched literal rewinds
    /// the propagation cursor so the clause is revisited.
    fn connect_watches(&mut self) {
        for idx in 0..self.db.len() {
            let c = ClauseRef(idx as u32);
            let header = self.db.header(c);
            if header.is_garbage() || header.len() != 2 {
                continue;
            }
            let lit0 = self.db.literal(c, 0);
            let lit1 = self.db.literal(c, 1);
            self.watches.add(lit0, Watcher::binary(c, lit1));
            self.watches.add(lit1, Watcher::binary(c, lit0));
        }
        for idx in 0..self.db.len() {
            let c = ClauseRef(idx as u32);
            let header = self.db.header(c);
            if header.is_garbage() || header.len() < 3 {
                continue;
            }
            let lit0 = self.db.literal(c, 0);
            let lit1 = self.db.literal(c, 1);
            self.watches.add(lit0, Watcher::long(c, lit1));
            self.watches.add(lit1, Watcher::long(c, lit0));
            if self.level() == 0 {
                for lit in [lit0, lit1] {
                    if self.lit_value(lit) == Some(false) {
                        let pos = self.trail_pos[lit.variable().index()];
                        if pos < self.propagated {
                            self.propagated = pos;
                        }
                    }
                }
            }
        }
    }

    // ======================================================================
    // Deciding
    // ======================================================================

    #[inline]
    fn use_scores(&self) -> bool {
        self.stable
    }

    /// Take the next decision. Pending assumptions come first: a falsified
    /// assumption fails the solve, a satisfied one only opens a pseudo
    /// level. Otherwise the mode's heuristic picks the variable and the
    /// phase chain picks its polarity.
    pub fn decide(&mut self) -> Status {
        debug_assert!(!self.satisfied());
        if (self.level() as usize) < self.assumptions.len() {
            let lit = self.assumptions[self.level() as usize];
            match self.lit_value(lit) {
                Some(false) => {
                    log::debug!("assumption {} falsified", lit.to_dimacs());
                    self.failed_assumption = Some(lit);
                    return Status::Unsatisfiable;
                }
                Some(true) => {
                    self.control.push(Frame::new(None, self.trail.len()));
                }
                None => {
                    self.assume_decision(lit);
                }
            }
            return Status::Unknown;
        }

        self.stats.decisions += 1;
        let var = if self.use_scores() {
            self.scores
                .next_unassigned_top(&self.values)
                .expect("an unassigned variable remains")
        } else {
            self.queue.next_unassigned(&self.values)
        };
        let lit = self.decide_phase(var);
        self.assume_decision(lit);
        Status::Unknown
    }

    /// Phase priority: forced saved phase, forced initial phase, target
    /// phase in stable mode, saved phase, initial phase.
    fn decide_phase(&self, var: Variable) -> Literal {
        let idx = var.index();
        let mut phase = None;
        if self.opts.force_saved_phase {
            phase = self.saved_phase[idx];
        }
        if phase.is_none() && self.opts.force_phase {
            phase = Some(self.opts.phase);
        }
        if phase.is_none() && self.opts.stabilize_phase && self.stable {
            phase = self.target_phase[idx];
        }
        if phase.is_none() {
            phase = self.saved_phase[idx];
        }
        if phase.unwrap_or(self.opts.phase) {
            Literal::positive(var)
        } else {
            Literal::negative(var)
        }
    }

    /// All variables assigned, propagation complete, and every assumption
    /// has its level
    pub fn satisfied(&self) -> bool {
        self.propagated == self.trail.len()
            && (self.level() as usize) >= self.assumptions.len()
            && self.trail.len() == self.num_vars
    }

    // ======================================================================
    // Lucky phases
    // ======================================================================

    /// Try eight cheap satisfiability attempts before real search. Each is
    /// transactional: any conflict rolls back to the root and the next
    /// attempt starts. Phase saving is suspended throughout.
    pub fn lucky_phases(&mut self) -> Status {
        debug_assert_eq!(self.level(), 0);
        if !self.opts.lucky || !self.assumptions.is_empty() {
            return Status::Unknown;
        }
        self.stats.lucky.tried += 1;
        debug_assert!(!self.searching_lucky_phases);
        self.searching_lucky_phases = true;

        let sat = if self.trivially_false_satisfiable() {
            self.stats.lucky.constant_zero += 1;
            true
        } else if self.trivially_true_satisfiable() {
            self.stats.lucky.constant_one += 1;
            true
        } else if self.forward_true_satisfiable() {
            self.stats.lucky.forward_one += 1;
            true
        } else if self.forward_false_satisfiable() {
            self.stats.lucky.forward_zero += 1;
            true
        } else if self.backward_false_satisfiable() {
            self.stats.lucky.backward_zero += 1;
            true
        } else if self.backward_true_satisfiable() {
            self.stats.lucky.backward_one += 1;
            true
        } else if self.positive_horn_satisfiable() {
            self.stats.lucky.horn_positive += 1;
            true
        } else if self.negative_horn_satisfiable() {
            self.stats.lucky.horn_negative += 1;
            true
        } else {
            false
        };

        self.searching_lucky_phases = false;
        if sat {
            self.stats.lucky.succeeded += 1;
            self.report('l');
            Status::Satisfiable
        } else {
            Status::Unknown
        }
    }

    fn lucky_failed(&mut self) -> bool {
        debug_assert!(self.level() > 0);
        self.conflict = None;
        self.backtrack(0);
        false
    }

    /// Decide the remaining unassigned variables with the given phase in
    /// the given index order, propagating each; false on any conflict
    fn lucky_assign_all(&mut self, positive: bool, forward: bool) -> bool {
        let mut idx = 0;
        while idx < self.num_vars {
            let var_idx = if forward { idx } else { self.num_vars - 1 - idx };
            idx += 1;
            if self.values[var_idx].is_some() {
                continue;
            }
            let var = Variable(var_idx as u32);
            let lit = if positive {
                Literal::positive(var)
            } else {
                Literal::negative(var)
            };
            self.assume_decision(lit);
            if !self.propagate() {
                return self.lucky_failed();
            }
        }
        true
    }

    /// Every not-yet-satisfied original clause has an unassigned negative
    /// literal, so assigning everything false is promising
    fn trivially_false_satisfiable(&mut self) -> bool {
        debug_assert_eq!(self.level(), 0);
        for idx in 0..self.db.len() {
            let c = ClauseRef(idx as u32);
            let header = self.db.header(c);
            if header.is_garbage() || header.is_redundant() {
                continue;
            }
            let mut satisfied = false;
            let mut found_negative = false;
            for &lit in self.db.literals(c) {
                match self.lit_value(lit) {
                    Some(true) => {
                        satisfied = true;
                        break;
                    }
                    Some(false) => continue,
                    None => {
                        if !lit.is_positive() {
                            found_negative = true;
                            break;
                        }
                    }
                }
            }
            if !satisfied && !found_negative {
                return false;
            }
        }
        self.lucky_assign_all(false, true)
    }

    /// Dual of `trivially_false_satisfiable`
    fn trivially_true_satisfiable(&mut self) -> bool {
        debug_assert_eq!(self.level(), 0);
        for idx in 0..self.db.len() {
            let c = ClauseRef(idx as u32);
            let header = self.db.header(c);
            if header.is_garbage() || header.is_redundant() {
                continue;
            }
            let mut satisfied = false;
            let mut found_positive = false;
            for &lit in self.db.literals(c) {
                match self.lit_value(lit) {
                    Some(true) => {
                        satisfied = true;
                        break;
                    }
                    Some(false) => continue,
                    None => {
                        if lit.is_positive() {
                            found_positive = true;
                            break;
                        }
                    }
                }
            }
            if !satisfied && !found_positive {
                return false;
            }
        }
        self.lucky_assign_all(true, true)
    }

    fn forward_true_satisfiable(&mut self) -> bool {
        self.lucky_assign_all(true, true)
    }

    fn forward_false_satisfiable(&mut self) -> bool {
        self.lucky_assign_all(false, true)
    }

    fn backward_false_satisfiable(&mut self) -> bool {
        self.lucky_assign_all(false, false)
    }

    fn backward_true_satisfiable(&mut self) -> bool {
        self.lucky_assign_all(true, false)
    }

    /// Satisfy each original clause through its first unassigned positive
    /// literal, then assign the rest false
    fn positive_horn_satisfiable(&mut self) -> bool {
        for idx in 0..self.db.len() {
            let c = ClauseRef(idx as u32);
            let header = self.db.header(c);
            if header.is_garbage() || header.is_redundant() {
                continue;
            }
            let mut satisfied = false;
            let mut positive = None;
            for &lit in self.db.literals(c) {
                match self.lit_value(lit) {
                    Some(true) => {
                        satisfied = true;
                        break;
                    }
                    Some(false) => continue,
                    None => {
                        if lit.is_positive() {
                            positive = Some(lit);
                            break;
                        }
                    }
                }
            }
            if satisfied {
                continue;
            }
            let Some(lit) = positive else {
                if self.level() > 0 {
                    self.backtrack(0);
                }
                debug_assert!(self.conflict.is_none());
                return false;
            };
            self.assume_decision(lit);
            if !self.propagate() {
                return self.lucky_failed();
            }
        }
        self.lucky_assign_all(false, true)
    }

    /// Dual of `positive_horn_satisfiable`
    fn negative_horn_satisfiable(&mut self) -> bool {
        for idx in 0..self.db.len() {
            let c = ClauseRef(idx as u32);
            let header = self.db.header(c);
            if header.is_garbage() || header.is_redundant() {
                continue;
            }
            let mut satisfied = false;
            let mut negative = None;
            for &lit in self.db.literals(c) {
                match self.lit_value(lit) {
                    Some(true) => {
                        satisfied = true;
                        break;
                    }
                    Some(false) => continue,
                    None => {
                        if !lit.is_positive() {
                            negative = Some(lit);
                            break;
                        }
                    }
                }
            }
            if satisfied {
                continue;
            }
            let Some(lit) = negative else {
                if self.level() > 0 {
                    self.backtrack(0);
                }
                debug_assert!(self.conflict.is_none());
                return false;
            };
            self.assume_decision(lit);
            if !self.propagate() {
                return self.lucky_failed();
            }
        }
        self.lucky_assign_all(true, true)
    }

    // ======================================================================
    // Gate extraction
    // ======================================================================

    /// Look for a gate definition around `pivot` at the root. A hyper
    /// unary resolvent found during the scan is assigned and propagated
    /// instead (returning `None`); the scan can simply be retried.
    pub fn extract_gate(&mut self, pivot: Variable) -> Option<Gate> {
        debug_assert_eq!(self.level(), 0);
        if self.unsat {
            return None;
        }
        let occs = Occurrences::build(&self.db, self.num_vars);
        let mut extractor = std::mem::take(&mut self.gate_extractor);
        let scan =
            extractor.find_gate_clauses(pivot, &mut self.db, &occs, &self.values, &self.opts);
        self.gate_extractor = extractor;

        for i in 0..scan.garbage.len() {
            self.trace_deleted(scan.garbage[i]);
        }
        if let Some(unit) = scan.unit {
            match self.lit_value(unit) {
                Some(false) => self.learn_empty(),
                Some(true) => {}
                None => {
                    self.search_assign(unit, Reason::Unit);
                    if !self.propagate() {
                        self.conflict = None;
                        self.learn_empty();
                    }
                }
            }
            return None;
        }
        scan.gate
    }

    /// Drop the `gate` flags a previous extraction set
    pub fn clear_gate(&mut self, gate: &Gate) {
        gate.clear_marks(&mut self.db);
    }

    // ======================================================================
    // Shuffling
    // ======================================================================

    /// Rebuild the VMTF queue order (rephasing hook)
    pub fn shuffle_queue(&mut self) {
        if !self.opts.shuffle || !self.opts.shuffle_queue {
            return;
        }
        self.stats.shuffled += 1;
        self.queue.shuffle(self.opts.seed, self.opts.shuffle_random);
    }

    /// Rebuild the EVSIDS heap order (rephasing hook)
    pub fn shuffle_scores(&mut self) {
        if !self.opts.shuffle || !self.opts.shuffle_scores {
            return;
        }
        debug_assert_eq!(self.level(), 0);
        self.stats.shuffled += 1;
        self.scores.shuffle(self.opts.seed, self.opts.shuffle_random);
    }

    // ======================================================================
    // Solving
    // ======================================================================

    /// Connect watches and assign the root units. Returns `Unsatisfiable`
    /// if the formula is already contradictory, `Unknown` otherwise.
    pub fn prepare(&mut self) -> Status {
        if self.unsat {
            return Status::Unsatisfiable;
        }
        if !self.watching {
            self.watches.clear();
            self.connect_watches();
            self.watching = true;
            for idx in 0..self.db.len() {
                let c = ClauseRef(idx as u32);
                let header = self.db.header(c);
                if header.is_garbage() || header.len() != 1 {
                    continue;
                }
                let lit = self.db.literal(c, 0);
                match self.lit_value(lit) {
                    Some(false) => {
                        self.learn_empty();
                        return Status::Unsatisfiable;
                    }
                    Some(true) => {}
                    None => self.search_assign(lit, Reason::Clause(c)),
                }
            }
            if !self.propagate() {
                self.conflict = None;
                self.learn_empty();
                return Status::Unsatisfiable;
            }
        }
        Status::Unknown
    }

    /// Run the search to completion
    pub fn solve(&mut self) -> Status {
        self.solve_interruptible(|| false)
    }

    /// Run the search, checking `should_stop` between decisions; on abort
    /// the internal state stays intact and solving can resume later
    pub fn solve_interruptible<F: FnMut() -> bool>(&mut self, mut should_stop: F) -> Status {
        if self.prepare() == Status::Unsatisfiable {
            return Status::Unsatisfiable;
        }

        if self.level() == 0 && self.lucky_phases() == Status::Satisfiable {
            self.save_model();
            return Status::Satisfiable;
        }

        loop {
            if !self.propagate() {
                self.analyze();
                if self.unsat {
                    self.report('u');
                    return Status::Unsatisfiable;
                }
            } else if self.satisfied() {
                self.save_model();
                self.report('s');
                return Status::Satisfiable;
            } else {
                if should_stop() {
                    return Status::Unknown;
                }
                if self.decide() == Status::Unsatisfiable {
                    self.report('u');
                    return Status::Unsatisfiable;
                }
            }
        }
    }

    /// Solve under temporary assumptions, decided before any free
    /// decision. Unsatisfiability under assumptions reports the failing
    /// assumption through [`Solver::failed_assumption`].
    pub fn solve_with_assumptions(&mut self, assumptions: &[Literal]) -> Status {
        self.assumptions = assumptions.to_vec();
        self.failed_assumption = None;
        let res = self.solve_interruptible(|| false);
        self.assumptions.clear();
        if !self.unsat {
            self.backtrack(0);
        }
        res
    }

    fn save_model(&mut self) {
        self.model.clear();
        self.model
            .extend(self.values.iter().map(|v| v.unwrap_or(false)));
    }

    fn report(&self, tag: char) {
        log::debug!(
            "{} conflicts {} decisions {} propagations {} fixed {}",
            tag,
            self.stats.conflicts,
            self.stats.decisions,
            self.stats.propagations,
            self.stats.fixed
        );
    }
}

// The final glue needs the solver's level table together with the clause
// buffer the analyzer owns; keep the coupling in one small helper.
impl Analyzer {
    fn glue_of_clause(&mut self, levels: &[u32]) -> u32 {
        let clause = std::mem::take(&mut self.clause);
        let glue = self.glue_of(&clause, levels);
        self.clause = clause;
        glue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(l: i32) -> Literal {
        Literal::from_dimacs(l)
    }

    fn solver_of(num_vars: usize, clauses: &[&[i32]]) -> Solver {
        let mut solver = Solver::new(num_vars);
        for c in clauses {
            let lits: Vec<Literal> = c.iter().map(|&l| lit(l)).collect();
            solver.add_clause(&lits);
        }
        solver
    }

    fn check_watch_invariant(solver: &Solver) {
        for idx in 0..solver.db.len() {
            let c = ClauseRef(idx as u32);
            let header = solver.db.header(c);
            if header.is_garbage() || header.len() < 2 {
                continue;
            }
            let lit0 = solver.db.literal(c, 0);
            let lit1 = solver.db.literal(c, 1);
            assert!(
                solver.watches.get(lit0).iter().any(|w| w.clause_ref() == c),
                "clause {} not watched by its first literal",
                c.0
            );
            assert!(
                solver.watches.get(lit1).iter().any(|w| w.clause_ref() == c),
                "clause {} not watched by its second literal",
                c.0
            );
        }
    }

    fn check_no_falsified_clause(solver: &Solver) {
        for idx in 0..solver.db.len() {
            let c = ClauseRef(idx as u32);
            if solver.db.header(c).is_garbage() {
                continue;
            }
            assert!(
                solver
                    .db
                    .literals(c)
                    .iter()
                    .any(|&l| solver.lit_value(l) != Some(false)),
                "clause {} fully falsified after propagation fixpoint",
                c.0
            );
        }
    }

    #[test]
    fn test_unit_propagation_chain() {
        // {1}, {-1, 2}, {-2, 3}: pure propagation, no decisions.
        let mut solver = solver_of(3, &[&[1], &[-1, 2], &[-2, 3]]);
        assert_eq!(solver.solve(), Status::Satisfiable);
        assert_eq!(solver.model(), &[true, true, true]);
        assert_eq!(solver.stats().decisions, 0);
        assert_eq!(solver.stats().conflicts, 0);
    }

    #[test]
    fn test_immediate_conflict() {
        let mut solver = solver_of(1, &[&[1], &[-1]]);
        assert_eq!(solver.solve(), Status::Unsatisfiable);
    }

    #[test]
    fn test_one_decision_sat() {
        // {1, 2}, {-1, 2}: deciding variable 1 first propagates 2.
        let opts = Options {
            lucky: false,
            reverse: true,
            ..Options::default()
        };
        let mut solver = Solver::with_options(2, opts);
        solver.add_clause(&[lit(1), lit(2)]);
        solver.add_clause(&[lit(-1), lit(2)]);
        assert_eq!(solver.solve(), Status::Satisfiable);
        assert_eq!(solver.stats().decisions, 1);
        assert!(solver.model()[1]);
    }

    #[test]
    fn test_first_uip_unit_learning() {
        // Deciding 1 propagates 2, 3 and conflicts {-2, -3, 4} against the
        // root unit -4; the learned clause is the unit {-1}.
        let mut solver = solver_of(4, &[&[-1, 2], &[-1, 3], &[-2, -3, 4], &[-4]]);
        assert_eq!(solver.prepare(), Status::Unknown);
        assert_eq!(solver.value(Variable(3)), Some(false));

        solver.assume_decision(lit(1));
        assert!(!solver.propagate());
        solver.analyze();

        assert_eq!(solver.stats().learned_units, 1);
        assert_eq!(solver.level(), 0);
        assert_eq!(solver.value(Variable(0)), Some(false));
        // The flipped UIP is a unit at assignment level zero.
        assert_eq!(solver.levels[0], 0);
        assert!(solver.propagate());
        check_no_falsified_clause(&solver);
    }

    #[test]
    fn test_learned_clause_shape_and_glue() {
        // Decide 1, then 2: {-1, -2, 3} forces 3 and {-1, -2, -3} conflicts.
        // The learned clause is {-2, -1} with exactly one literal at the
        // conflict level and a glue of two.
        let opts = Options {
            lucky: false,
            ..Options::default()
        };
        let mut solver = Solver::with_options(3, opts);
        solver.add_clause(&[lit(-1), lit(-2), lit(3)]);
        solver.add_clause(&[lit(-1), lit(-2), lit(-3)]);
        assert_eq!(solver.prepare(), Status::Unknown);

        solver.assume_decision(lit(1));
        assert!(solver.propagate());
        solver.assume_decision(lit(2));
        assert!(!solver.propagate());
        solver.analyze();

        assert_eq!(solver.stats().learned_binaries, 1);
        let learned = ClauseRef((solver.db.len() - 1) as u32);
        let header = solver.db.header(learned);
        assert!(header.is_redundant());
        assert_eq!(header.glue(), 2);
        // The flipped UIP is the single conflict-level literal and sorts
        // first; the level-1 literal follows.
        assert_eq!(solver.db.literals(learned), &[lit(-2), lit(-1)]);
        // The solver backjumped to the second-highest level and asserted
        // the flipped UIP there.
        assert_eq!(solver.level(), 1);
        assert_eq!(solver.value(Variable(1)), Some(false));
    }

    #[test]
    fn test_first_uip_under_assumption() {
        let mut solver = solver_of(4, &[&[-1, 2], &[-1, 3], &[-2, -3, 4], &[-4]]);
        assert_eq!(
            solver.solve_with_assumptions(&[lit(1)]),
            Status::Unsatisfiable
        );
        assert_eq!(solver.failed_assumption(), Some(lit(1)));
        // The formula itself stays satisfiable, with variable 1 forced off.
        assert_eq!(solver.solve(), Status::Satisfiable);
        assert!(!solver.model()[0]);
    }

    #[test]
    fn test_lucky_trivially_false() {
        // Every clause carries a negative literal.
        let mut solver = solver_of(3, &[&[-1, 2], &[-2, -3], &[-1, -3]]);
        assert_eq!(solver.solve(), Status::Satisfiable);
        assert_eq!(solver.stats().lucky.constant_zero, 1);
        assert_eq!(solver.stats().lucky.succeeded, 1);
        assert_eq!(solver.stats().conflicts, 0);
    }

    #[test]
    fn test_lucky_disabled() {
        let opts = Options {
            lucky: false,
            ..Options::default()
        };
        let mut solver = Solver::with_options(3, opts);
        solver.add_clause(&[lit(-1), lit(2)]);
        solver.add_clause(&[lit(-2), lit(-3)]);
        assert_eq!(solver.solve(), Status::Satisfiable);
        assert_eq!(solver.stats().lucky.tried, 0);
    }

    #[test]
    fn test_lucky_preserves_saved_phases() {
        let mut solver = solver_of(2, &[&[-1, 2]]);
        assert_eq!(solver.prepare(), Status::Unknown);
        assert_eq!(solver.lucky_phases(), Status::Satisfiable);
        // Lucky assignments do not pollute phase saving.
        assert!(solver.saved_phase.iter().all(|p| p.is_none()));
    }

    #[test]
    fn test_watch_invariant_after_solve() {
        let mut solver = solver_of(
            5,
            &[
                &[1, 2, 3],
                &[-1, -2],
                &[-2, -3],
                &[-1, -3],
                &[2, 3, 4],
                &[-4, 5],
                &[-5, -1],
            ],
        );
        assert_eq!(solver.solve(), Status::Satisfiable);
        check_watch_invariant(&solver);
        check_no_falsified_clause(&solver);
    }

    #[test]
    fn test_backtrack_restores_state() {
        let opts = Options {
            lucky: false,
            ..Options::default()
        };
        let mut solver = Solver::with_options(4, opts);
        solver.add_clause(&[lit(1), lit(2)]);
        solver.add_clause(&[lit(3), lit(4)]);
        assert_eq!(solver.prepare(), Status::Unknown);

        solver.assume_decision(lit(-1));
        assert!(solver.propagate());
        solver.assume_decision(lit(-3));
        assert!(solver.propagate());
        assert_eq!(solver.level(), 2);
        assert_eq!(solver.decision_of_level(1), Some(lit(-1)));
        assert_eq!(solver.decision_of_level(2), Some(lit(-3)));
        let assigned: Vec<Variable> = solver.trail.iter().map(|l| l.variable()).collect();
        assert_eq!(assigned.len(), 4);

        solver.backtrack(0);
        assert_eq!(solver.level(), 0);
        assert_eq!(solver.control.len(), 1);
        for var in assigned {
            assert_eq!(solver.value(var), None);
            // Phase saving kept the pre-backtrack polarity: decisions were
            // negative, the binary propagations positive.
            let expected = var == Variable(1) || var == Variable(3);
            assert_eq!(solver.saved_phase[var.index()], Some(expected));
            assert!(solver.scores.contains(var));
        }
    }

    #[test]
    fn test_assignment_reason_invariant() {
        let opts = Options {
            lucky: false,
            ..Options::default()
        };
        let mut solver = Solver::with_options(3, opts);
        solver.add_clause(&[lit(-1), lit(2)]);
        solver.add_clause(&[lit(-2), lit(3)]);
        assert_eq!(solver.prepare(), Status::Unknown);
        solver.assume_decision(lit(1));
        assert!(solver.propagate());

        for &l in &solver.trail {
            if let Reason::Clause(c) = solver.reasons[l.variable().index()] {
                let lits = solver.db.literals(c);
                assert!(lits.contains(&l));
                for &other in lits {
                    if other != l {
                        assert_eq!(solver.lit_value(other), Some(false));
                        assert!(
                            solver.levels[other.variable().index()]
                                <= solver.levels[l.variable().index()]
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_deterministic_solve() {
        let clauses: &[&[i32]] = &[
            &[1, 2, -3],
            &[-1, 3, 4],
            &[-2, -4, 5],
            &[3, -5, -1],
            &[-3, 2, -5],
            &[4, 5, 1],
        ];
        let mut a = solver_of(5, clauses);
        let mut b = solver_of(5, clauses);
        let ra = a.solve();
        let rb = b.solve();
        assert_eq!(ra, rb);
        assert_eq!(a.model(), b.model());
        assert_eq!(a.stats().decisions, b.stats().decisions);
        assert_eq!(a.stats().conflicts, b.stats().conflicts);
    }

    #[test]
    fn test_chrono_variants_agree() {
        let clauses: &[&[i32]] = &[
            &[1, 2, -3],
            &[-1, 3, 4],
            &[-2, -4, 5],
            &[3, -5, -1],
            &[-3, 2, -5],
            &[-4, -5],
            &[-1, -2, -3, -4],
        ];
        let mut plain = Solver::with_options(
            5,
            Options {
                chrono: 0,
                ..Options::default()
            },
        );
        let mut chrono = Solver::with_options(
            5,
            Options {
                chrono: 2,
                chrono_always: true,
                ..Options::default()
            },
        );
        for c in clauses {
            let lits: Vec<Literal> = c.iter().map(|&l| lit(l)).collect();
            plain.add_clause(&lits);
            chrono.add_clause(&lits);
        }
        assert_eq!(plain.solve(), chrono.solve());
    }

    #[test]
    fn test_pigeonhole_unsat() {
        // Three pigeons, two holes: p(i,j) = variable 2*i + j + 1.
        let mut solver = Solver::new(6);
        let p = |i: i32, j: i32| lit(2 * i + j + 1);
        for i in 0..3 {
            solver.add_clause(&[p(i, 0), p(i, 1)]);
        }
        for j in 0..2 {
            for i in 0..3 {
                for k in (i + 1)..3 {
                    solver.add_clause(&[p(i, j).negated(), p(k, j).negated()]);
                }
            }
        }
        assert_eq!(solver.solve(), Status::Unsatisfiable);
        assert!(solver.stats().conflicts > 0);
    }

    #[test]
    fn test_proof_emission_unsat() {
        let mut solver =
            Solver::with_proof(2, Options::default(), ProofWriter::new_text(Vec::new()));
        solver.add_clause(&[lit(1), lit(2)]);
        solver.add_clause(&[lit(1), lit(-2)]);
        solver.add_clause(&[lit(-1), lit(2)]);
        solver.add_clause(&[lit(-1), lit(-2)]);
        assert_eq!(solver.solve(), Status::Unsatisfiable);
        let proof = solver.proof.take().unwrap();
        assert!(proof.added() > 0);
        let text = String::from_utf8(proof.into_inner()).unwrap();
        // The proof ends with the empty clause.
        assert_eq!(text.lines().last(), Some("0"));
    }

    #[test]
    fn test_model_satisfies_formula() {
        let clauses: Vec<Vec<i32>> = vec![
            vec![1, -2, 4],
            vec![-1, 3, -4],
            vec![2, 3, 5],
            vec![-3, -5, 1],
            vec![-2, -4, -5],
            vec![4, 5, 2],
        ];
        let refs: Vec<&[i32]> = clauses.iter().map(|c| c.as_slice()).collect();
        let mut solver = solver_of(5, &refs);
        assert_eq!(solver.solve(), Status::Satisfiable);
        let model = solver.model();
        for clause in &clauses {
            assert!(clause.iter().any(|&l| {
                let val = model[(l.unsigned_abs() - 1) as usize];
                if l > 0 {
                    val
                } else {
                    !val
                }
            }));
        }
    }

    #[test]
    fn test_solver_reusable_after_sat() {
        let mut solver = solver_of(2, &[&[1, 2]]);
        assert_eq!(solver.solve(), Status::Satisfiable);
        // Adding clauses and re-solving works on the same instance.
        solver.add_clause(&[lit(-1)]);
        solver.add_clause(&[lit(-2)]);
        assert_eq!(solver.solve(), Status::Unsatisfiable);
    }

    #[test]
    fn test_interrupt_returns_unknown() {
        let opts = Options {
            lucky: false,
            ..Options::default()
        };
        let mut solver = Solver::with_options(3, opts);
        solver.add_clause(&[lit(1), lit(2), lit(3)]);
        solver.add_clause(&[lit(-1), lit(-2)]);
        solver.add_clause(&[lit(-2), lit(-3)]);
        assert_eq!(solver.solve_interruptible(|| true), Status::Unknown);
        // State is intact: the same instance finishes the solve.
        assert_eq!(solver.solve(), Status::Satisfiable);
    }

    #[test]
    fn test_eager_subsume_flags_superset() {
        let mut solver = solver_of(4, &[&[1, 2]]);
        let wide = solver.db.add(&[lit(1), lit(3), lit(4)], true);
        let narrow = solver.db.add(&[lit(1), lit(3)], true);
        solver.eagerly_subsume_recently_learned(narrow);
        assert_eq!(solver.stats().eager_subsumed, 1);
        assert!(solver.db.header(wide).is_garbage());
        assert!(!solver.db.header(narrow).is_garbage());
    }

    #[test]
    fn test_collect_garbage_defers_binary_deletion() {
        let mut solver =
            Solver::with_proof(3, Options::default(), ProofWriter::new_text(Vec::new()));
        solver.add_clause(&[lit(1), lit(2)]);
        solver.add_clause(&[lit(1), lit(3), lit(-2)]);
        assert_eq!(solver.prepare(), Status::Unknown);

        solver.mark_garbage(ClauseRef(0));
        // Binary deletion deferred, long deletion immediate.
        assert_eq!(solver.proof.as_ref().unwrap().deleted(), 0);
        solver.mark_garbage(ClauseRef(1));
        assert_eq!(solver.proof.as_ref().unwrap().deleted(), 1);

        solver.collect_garbage();
        assert_eq!(solver.proof.as_ref().unwrap().deleted(), 2);
        assert_eq!(solver.db.len(), 0);
    }

    #[test]
    fn test_stable_mode_uses_scores() {
        let mut solver = solver_of(3, &[&[1, 2], &[-1, 2, 3], &[-3, -2, 1]]);
        solver.set_stable(true);
        assert_eq!(solver.solve(), Status::Satisfiable);
    }

    #[test]
    fn test_xor_gate_scenario() {
        let mut solver = solver_of(3, &[&[1, 2, 3], &[1, -2, -3], &[-1, 2, -3], &[-1, -2, 3]]);
        let gate = solver.extract_gate(Variable(0)).expect("XOR gate expected");
        assert_eq!(gate.kind, crate::gates::GateKind::Xor);
        assert_eq!(gate.clauses.len(), 4);
        for &c in &gate.clauses {
            assert!(solver.db.header(c).is_gate());
        }
        solver.clear_gate(&gate);
        for idx in 0..solver.db.len() {
            assert!(!solver.db.header(ClauseRef(idx as u32)).is_gate());
        }
    }

    #[test]
    fn test_and_gate_scenario() {
        let mut solver = solver_of(4, &[&[-1, 2], &[-1, 3], &[-1, 4], &[1, -2, -3, -4]]);
        let gate = solver.extract_gate(Variable(0)).expect("AND gate expected");
        assert_eq!(gate.kind, crate::gates::GateKind::And);
        assert_eq!(gate.clauses.len(), 4);
        for &c in &gate.clauses {
            assert!(solver.db.header(c).is_gate());
        }
    }

    #[test]
    fn test_gate_unit_propagates() {
        // {1, 2} and {1, -2} hyper-resolve to the unit 1.
        let mut solver = solver_of(3, &[&[1, 2], &[1, -2], &[-1, 3]]);
        assert_eq!(solver.prepare(), Status::Unknown);
        assert!(solver.extract_gate(Variable(0)).is_none());
        assert_eq!(solver.value(Variable(0)), Some(true));
        assert_eq!(solver.value(Variable(2)), Some(true));
    }
}
