//! Gate extraction
//!
//! Recognizes Boolean gate structure around a pivot variable in the
//! irredundant clauses: equivalences, AND gates (tried for both pivot
//! polarities, the encoding is asymmetric), if-then-else, and XOR of
//! arbitrary arity up to a limit. A recognized gate restricts bounded
//! variable elimination to resolvents between gate and non-gate clauses;
//! resolvents among definitions are tautological and resolvents among
//! non-gates are redundant.
//!
//! The binary-partner scan doubles as hyper unary resolution: seeing both
//! `{p, x}` and `{p, -x}` yields the unit `p`, which aborts the scan and
//! is surfaced to the caller for assignment and propagation. Duplicate
//! binary clauses found along the way are flagged garbage.
//!
//! All literal marks and clause `gate` flags set here are transient and
//! cleared on every exit path.

use crate::clause::{ClauseDb, ClauseRef};
use crate::literal::{Literal, Variable};
use crate::options::Options;
use rustc_hash::FxHashSet;

/// Occurrence lists over the irredundant, non-garbage clauses
#[derive(Debug, Default)]
pub struct Occurrences {
    occs: Vec<Vec<ClauseRef>>,
}

impl Occurrences {
    /// Build occurrence lists for all literals of `num_vars` variables
    pub fn build(db: &ClauseDb, num_vars: usize) -> Self {
        let mut occs = vec![Vec::new(); num_vars * 2];
        for c in db.refs() {
            let header = db.header(c);
            if header.is_garbage() || header.is_redundant() {
                continue;
            }
            for &lit in db.literals(c) {
                occs[lit.index()].push(c);
            }
        }
        Occurrences { occs }
    }

    /// Clauses containing a literal
    #[inline]
    pub fn get(&self, lit: Literal) -> &[ClauseRef] {
        &self.occs[lit.index()]
    }
}

/// Kinds of recognized gates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    /// `pivot ≡ x`
    Equiv,
    /// `pivot ≡ x₁ ∧ x₂ ∧ …`
    And,
    /// `pivot ≡ (c ? t : e)`
    Ite,
    /// `pivot ≡ x₁ ⊕ x₂ ⊕ …`
    Xor,
}

/// A recognized gate definition
#[derive(Debug, Clone)]
pub struct Gate {
    /// Output literal the definition was found for
    pub pivot: Literal,
    /// Gate kind
    pub kind: GateKind,
    /// Input literals
    pub inputs: Vec<Literal>,
    /// The defining clauses, each flagged `gate` in the database
    pub clauses: Vec<ClauseRef>,
}

impl Gate {
    /// Clear the `gate` flags this definition set
    pub fn clear_marks(&self, db: &mut ClauseDb) {
        for &c in &self.clauses {
            debug_assert!(db.header(c).is_gate());
            db.header_mut(c).set_gate(false);
        }
    }

    /// Occurrences of the pivot variable that are not part of the
    /// definition; only these need to be resolved against the gate
    /// clauses during elimination
    pub fn non_gate_clauses(&self, occs: &Occurrences) -> Vec<ClauseRef> {
        let defining: FxHashSet<ClauseRef> = self.clauses.iter().copied().collect();
        let var = self.pivot.variable();
        let mut out = Vec::new();
        for lit in [Literal::positive(var), Literal::negative(var)] {
            for &c in occs.get(lit) {
                if !defining.contains(&c) {
                    out.push(c);
                }
            }
        }
        out
    }
}

/// Gate extraction statistics
#[derive(Debug, Clone, Default)]
pub struct GateStats {
    /// Extraction attempts
    pub calls: u64,
    /// Equivalences found
    pub equivalences: u64,
    /// AND gates found
    pub ands: u64,
    /// If-then-else gates found
    pub ites: u64,
    /// XOR gates found
    pub xors: u64,
    /// Hyper unary resolvents found
    pub units: u64,
    /// Duplicate binary clauses flagged garbage
    pub duplicates: u64,
}

impl GateStats {
    /// Total gates of all kinds
    pub fn total(&self) -> u64 {
        self.equivalences + self.ands + self.ites + self.xors
    }
}

/// Outcome of one extraction attempt
#[derive(Debug, Default)]
pub struct GateScan {
    /// The recognized gate, if any
    pub gate: Option<Gate>,
    /// A hyper unary resolvent; the caller must assign and propagate it,
    /// after which the scan can be retried
    pub unit: Option<Literal>,
    /// Clauses flagged garbage during the scan (satisfied binaries and
    /// duplicates); the caller owns their deletion events
    pub garbage: Vec<ClauseRef>,
}

enum Scan {
    Gate(Gate),
    Unit(Literal),
    Nothing,
}

/// Gate extraction engine
#[derive(Debug, Default)]
pub struct GateExtractor {
    marks: Vec<i8>,
    marked_lits: Vec<Literal>,
    stats: GateStats,
}

impl GateExtractor {
    /// Create an extractor for `num_vars` variables
    pub fn new(num_vars: usize) -> Self {
        GateExtractor {
            marks: vec![0; num_vars],
            marked_lits: Vec::new(),
            stats: GateStats::default(),
        }
    }

    /// Grow the mark table to `num_vars`
    pub fn ensure_num_vars(&mut self, num_vars: usize) {
        if self.marks.len() < num_vars {
            self.marks.resize(num_vars, 0);
        }
    }

    /// Extraction statistics
    pub fn stats(&self) -> &GateStats {
        &self.stats
    }

    /// Try the gate kinds in order for `pivot`; the first match wins.
    ///
    /// The defining clauses of a found gate are flagged `gate`; use
    /// [`Gate::clear_marks`] when done with them.
    pub fn find_gate_clauses(
        &mut self,
        pivot: Variable,
        db: &mut ClauseDb,
        occs: &Occurrences,
        values: &[Option<bool>],
        opts: &Options,
    ) -> GateScan {
        let mut scan = GateScan::default();
        if !opts.elim_subst || values[pivot.index()].is_some() {
            return scan;
        }
        self.stats.calls += 1;

        let pos = Literal::positive(pivot);
        let neg = Literal::negative(pivot);

        let mut result = Scan::Nothing;
        if opts.elim_equivs {
            result = self.find_equivalence(pivot, db, occs, values, &mut scan.garbage);
        }
        if matches!(result, Scan::Nothing) && opts.elim_ands {
            result = self.find_and_gate(pos, db, occs, values, &mut scan.garbage);
        }
        if matches!(result, Scan::Nothing) && opts.elim_ands {
            result = self.find_and_gate(neg, db, occs, values, &mut scan.garbage);
        }
        if matches!(result, Scan::Nothing) && opts.elim_ites {
            result = self.find_if_then_else(pivot, db, occs, values);
        }
        if matches!(result, Scan::Nothing) && opts.elim_xors {
            result = self.find_xor_gate(pivot, db, occs, values, opts);
        }

        match result {
            Scan::Gate(mut gate) => {
                let mut recorded = Vec::with_capacity(gate.clauses.len());
                for &c in &gate.clauses {
                    if !db.header(c).is_gate() {
                        db.header_mut(c).set_gate(true);
                        recorded.push(c);
                    }
                }
                gate.clauses = recorded;
                match gate.kind {
                    GateKind::Equiv => self.stats.equivalences += 1,
                    GateKind::And => self.stats.ands += 1,
                    GateKind::Ite => self.stats.ites += 1,
                    GateKind::Xor => self.stats.xors += 1,
                }
                log::debug!(
                    "found {:?} gate for {} with {} defining clauses",
                    gate.kind,
                    gate.pivot.to_dimacs(),
                    gate.clauses.len()
                );
                scan.gate = Some(gate);
            }
            Scan::Unit(lit) => {
                self.stats.units += 1;
                scan.unit = Some(lit);
            }
            Scan::Nothing => {}
        }
        scan
    }

    /// Equivalence `pivot ≡ x`, encoded as `{pivot, -x}` and `{-pivot, x}`.
    /// Matching marks with the same sign instead yield a resolved unit.
    fn find_equivalence(
        &mut self,
        pivot: Variable,
        db: &mut ClauseDb,
        occs: &Occurrences,
        values: &[Option<bool>],
        garbage: &mut Vec<ClauseRef>,
    ) -> Scan {
        let pos = Literal::positive(pivot);
        let neg = Literal::negative(pivot);

        if let Some(unit) = self.mark_binary_partners(pos, db, occs, values, garbage) {
            self.unmark_all();
            return Scan::Unit(unit);
        }

        let mut result = Scan::Nothing;
        for &c in occs.get(neg) {
            if db.header(c).is_garbage() {
                continue;
            }
            let Some(second) = second_literal_in_binary(db, values, c, neg, garbage) else {
                continue;
            };
            let mark = self.marked(second);
            if mark > 0 {
                // {pivot, second} and {-pivot, second} resolve to the unit.
                result = Scan::Unit(second);
                break;
            }
            if mark >= 0 {
                continue;
            }
            // {pivot, -second} and {-pivot, second}: pivot ≡ second.
            let mut partner = None;
            for &d in occs.get(pos) {
                if db.header(d).is_garbage() {
                    continue;
                }
                if second_literal_in_binary(db, values, d, pos, garbage) == Some(second.negated())
                {
                    partner = Some(d);
                    break;
                }
            }
            debug_assert!(partner.is_some());
            if let Some(d) = partner {
                result = Scan::Gate(Gate {
                    pivot: pos,
                    kind: GateKind::Equiv,
                    inputs: vec![second],
                    clauses: vec![c, d],
                });
            }
            break;
        }

        self.unmark_all();
        result
    }

    /// AND gate for the pivot literal `q = pivot_lit`: the binaries
    /// `{q, xᵢ}` together with the long clause `{-q, -x₁, …, -xₙ}` encode
    /// `-q ≡ x₁ ∧ … ∧ xₙ`. The encoding is asymmetric, so the caller
    /// tries both polarities.
    fn find_and_gate(
        &mut self,
        pivot_lit: Literal,
        db: &mut ClauseDb,
        occs: &Occurrences,
        values: &[Option<bool>],
        garbage: &mut Vec<ClauseRef>,
    ) -> Scan {
        if let Some(unit) = self.mark_binary_partners(pivot_lit, db, occs, values, garbage) {
            self.unmark_all();
            return Scan::Unit(unit);
        }

        let neg = pivot_lit.negated();
        let mut result = Scan::Nothing;
        'clauses: for &c in occs.get(neg) {
            let header = db.header(c);
            if header.is_garbage() || header.len() < 3 {
                continue;
            }

            let mut inputs = Vec::new();
            for k in 0..db.header(c).len() {
                let lit = db.literal(c, k);
                if lit == neg {
                    continue;
                }
                debug_assert!(lit != pivot_lit);
                match value_of(values, lit) {
                    Some(true) => continue 'clauses,
                    Some(false) => continue,
                    None => {}
                }
                if self.marked(lit) < 0 {
                    inputs.push(lit.negated());
                } else {
                    continue 'clauses;
                }
            }
            if inputs.is_empty() {
                continue;
            }

            // Double the marks of the long clause's inputs so the binary
            // side clauses can be told apart from unrelated binaries.
            for k in 0..db.header(c).len() {
                let lit = db.literal(c, k);
                if lit == neg || value_of(values, lit).is_some() {
                    continue;
                }
                debug_assert!(self.marked(lit) < 0);
                self.marks[lit.variable().index()] *= 2;
            }

            let mut clauses = vec![c];
            for &d in occs.get(pivot_lit) {
                if db.header(d).is_garbage() {
                    continue;
                }
                let Some(other) = second_literal_in_binary(db, values, d, pivot_lit, garbage)
                else {
                    continue;
                };
                if self.marked(other) == 2 {
                    clauses.push(d);
                }
            }
            debug_assert!(clauses.len() > inputs.len());

            result = Scan::Gate(Gate {
                pivot: neg,
                kind: GateKind::And,
                inputs,
                clauses,
            });
            break;
        }

        self.unmark_all();
        result
    }

    /// If-then-else: `{p, b, c}`, `{p, -b, c'}` with the matching
    /// `{-p, b, -c}` and `{-p, -b, -c'}` encode `p ≡ (-b ? -c : -c')`.
    fn find_if_then_else(
        &mut self,
        pivot: Variable,
        db: &ClauseDb,
        occs: &Occurrences,
        values: &[Option<bool>],
    ) -> Scan {
        let pos = Literal::positive(pivot);
        let neg = Literal::negative(pivot);

        let os = occs.get(pos);
        for (i, &di) in os.iter().enumerate() {
            let Some((ai, bi, ci)) = get_ternary_clause(db, values, di) else {
                continue;
            };
            let (_, bi, ci) = rotate_to_front(pos, ai, bi, ci);
            for &dj in &os[i + 1..] {
                let Some((aj, bj, cj)) = get_ternary_clause(db, values, dj) else {
                    continue;
                };
                let (_, mut bj, mut cj) = rotate_to_front(pos, aj, bj, cj);
                if bi.variable() == cj.variable() {
                    std::mem::swap(&mut bj, &mut cj);
                }
                if ci.variable() == cj.variable() {
                    continue;
                }
                if bi != bj.negated() {
                    continue;
                }
                let Some(d1) = find_ternary_clause(db, occs, values, neg, bi, ci.negated()) else {
                    continue;
                };
                let Some(d2) = find_ternary_clause(db, occs, values, neg, bj, cj.negated()) else {
                    continue;
                };
                return Scan::Gate(Gate {
                    pivot: pos,
                    kind: GateKind::Ite,
                    inputs: vec![bi.negated(), ci.negated(), cj.negated()],
                    clauses: vec![di, dj, d1, d2],
                });
            }
        }
        Scan::Nothing
    }

    /// XOR of arity `size - 1`: starting from a clause `d` containing the
    /// pivot, all `2^arity` even-parity sign variants of `d` must exist.
    /// Sign patterns are enumerated by incrementing a counter until its
    /// popcount is even; candidates are looked up through the shortest
    /// occurrence list.
    fn find_xor_gate(
        &mut self,
        pivot: Variable,
        db: &ClauseDb,
        occs: &Occurrences,
        values: &[Option<bool>],
        opts: &Options,
    ) -> Scan {
        let pos = Literal::positive(pivot);
        let mut lits: Vec<Literal> = Vec::new();

        for &d in occs.get(pos) {
            if !get_clause(db, values, d, &mut lits) {
                continue;
            }
            let size = lits.len();
            if size < 3 {
                continue;
            }
            let arity = (size - 1) as u32;
            if arity > opts.elim_xor_limit {
                continue;
            }

            let mut found: Vec<ClauseRef> = Vec::new();
            let mut needed = (1u32 << arity) - 1;
            let mut signs: u32 = 0;
            let mut complete = true;
            while needed > 0 {
                let prev = signs;
                loop {
                    signs += 1;
                    if signs.count_ones() & 1 == 0 {
                        break;
                    }
                }
                let diff = prev ^ signs;
                for (j, lit) in lits.iter_mut().enumerate() {
                    if diff & (1u32 << j) != 0 {
                        *lit = lit.negated();
                    }
                }
                match find_clause(db, occs, values, &lits) {
                    Some(e) => found.push(e),
                    None => {
                        complete = false;
                        break;
                    }
                }
                needed -= 1;
            }
            if !complete {
                continue;
            }
            found.push(d);
            debug_assert_eq!(found.len(), 1usize << arity);

            let mut inputs = Vec::new();
            get_clause(db, values, d, &mut lits);
            for &lit in &lits {
                if lit != pos {
                    debug_assert!(lit != pos.negated());
                    inputs.push(lit);
                }
            }

            return Scan::Gate(Gate {
                pivot: pos,
                kind: GateKind::Xor,
                inputs,
                clauses: found,
            });
        }
        Scan::Nothing
    }

    /// Mark the binary partners of `first`: for every clause reducing to
    /// `{first, x}`, mark `x`. Seeing `x` marked with the opposite sign
    /// yields the hyper unary resolvent `first`; seeing it marked with the
    /// same sign flags the duplicate clause garbage.
    fn mark_binary_partners(
        &mut self,
        first: Literal,
        db: &mut ClauseDb,
        occs: &Occurrences,
        values: &[Option<bool>],
        garbage: &mut Vec<ClauseRef>,
    ) -> Option<Literal> {
        debug_assert!(self.marked_lits.is_empty());
        for &c in occs.get(first) {
            if db.header(c).is_garbage() {
                continue;
            }
            let Some(second) = second_literal_in_binary(db, values, c, first, garbage) else {
                continue;
            };
            let mark = self.marked(second);
            if mark < 0 {
                // {first, x} and {first, -x} resolve to the unit `first`.
                return Some(first);
            }
            if mark > 0 {
                self.stats.duplicates += 1;
                db.mark_garbage(c);
                garbage.push(c);
                continue;
            }
            self.mark(second);
        }
        None
    }

    #[inline]
    fn mark(&mut self, lit: Literal) {
        self.marks[lit.variable().index()] = if lit.is_positive() { 1 } else { -1 };
        self.marked_lits.push(lit);
    }

    #[inline]
    fn marked(&self, lit: Literal) -> i8 {
        let mark = self.marks[lit.variable().index()];
        if lit.is_positive() {
            mark
        } else {
            -mark
        }
    }

    fn unmark_all(&mut self) {
        for i in 0..self.marked_lits.len() {
            self.marks[self.marked_lits[i].variable().index()] = 0;
        }
        self.marked_lits.clear();
    }
}

#[inline]
fn value_of(values: &[Option<bool>], lit: Literal) -> Option<bool> {
    values[lit.variable().index()].map(|v| v == lit.is_positive())
}

/// If `c`, which contains `first`, reduces to the binary `{first, x}`
/// after dropping falsified literals, return `x`. A satisfied clause is
/// flagged garbage on the way.
fn second_literal_in_binary(
    db: &mut ClauseDb,
    values: &[Option<bool>],
    c: ClauseRef,
    first: Literal,
    garbage: &mut Vec<ClauseRef>,
) -> Option<Literal> {
    debug_assert!(!db.header(c).is_garbage());
    let mut second = None;
    for k in 0..db.header(c).len() {
        let lit = db.literal(c, k);
        if lit == first {
            continue;
        }
        match value_of(values, lit) {
            Some(false) => continue,
            Some(true) => {
                db.mark_garbage(c);
                garbage.push(c);
                return None;
            }
            None => {
                if second.is_some() {
                    return None;
                }
                second = Some(lit);
            }
        }
    }
    second
}

/// Rotate a ternary clause's literals so `pivot` comes first
fn rotate_to_front(
    pivot: Literal,
    a: Literal,
    b: Literal,
    c: Literal,
) -> (Literal, Literal, Literal) {
    if a == pivot {
        (a, b, c)
    } else if b == pivot {
        (b, a, c)
    } else {
        debug_assert_eq!(c, pivot);
        (c, b, a)
    }
}

/// Extract the unassigned literals of `c` if there are exactly three
fn get_ternary_clause(
    db: &ClauseDb,
    values: &[Option<bool>],
    c: ClauseRef,
) -> Option<(Literal, Literal, Literal)> {
    let header = db.header(c);
    if header.is_garbage() || header.len() < 3 {
        return None;
    }
    let mut out = [Literal(0); 3];
    let mut found = 0;
    for &lit in db.literals(c) {
        if value_of(values, lit).is_some() {
            continue;
        }
        if found == 3 {
            return None;
        }
        out[found] = lit;
        found += 1;
    }
    (found == 3).then_some((out[0], out[1], out[2]))
}

/// True if the unassigned part of `c` is exactly `{a, b, cc}`
fn match_ternary_clause(
    db: &ClauseDb,
    values: &[Option<bool>],
    c: ClauseRef,
    a: Literal,
    b: Literal,
    cc: Literal,
) -> bool {
    if db.header(c).is_garbage() {
        return false;
    }
    let mut found = 0;
    for &lit in db.literals(c) {
        if value_of(values, lit).is_some() {
            continue;
        }
        if lit != a && lit != b && lit != cc {
            return false;
        }
        found += 1;
    }
    found == 3
}

/// Look up the ternary clause `{a, b, c}`, scanning the shortest of the
/// three occurrence lists
fn find_ternary_clause(
    db: &ClauseDb,
    occs: &Occurrences,
    values: &[Option<bool>],
    mut a: Literal,
    mut b: Literal,
    mut c: Literal,
) -> Option<ClauseRef> {
    if occs.get(b).len() > occs.get(c).len() {
        std::mem::swap(&mut b, &mut c);
    }
    if occs.get(a).len() > occs.get(b).len() {
        std::mem::swap(&mut a, &mut b);
    }
    occs.get(a)
        .iter()
        .copied()
        .find(|&d| match_ternary_clause(db, values, d, a, b, c))
}

/// Fill `out` with the unassigned literals of `c`; false for garbage
fn get_clause(db: &ClauseDb, values: &[Option<bool>], c: ClauseRef, out: &mut Vec<Literal>) -> bool {
    if db.header(c).is_garbage() {
        return false;
    }
    out.clear();
    for &lit in db.literals(c) {
        if value_of(values, lit).is_none() {
            out.push(lit);
        }
    }
    true
}

/// True if the unassigned part of `c` consists of exactly the given literals
fn is_clause(db: &ClauseDb, values: &[Option<bool>], c: ClauseRef, lits: &[Literal]) -> bool {
    let header = db.header(c);
    if header.is_garbage() || header.len() < lits.len() {
        return false;
    }
    let mut found = 0;
    for &lit in db.literals(c) {
        if value_of(values, lit).is_some() {
            continue;
        }
        if !lits.contains(&lit) {
            return false;
        }
        found += 1;
        if found > lits.len() {
            return false;
        }
    }
    found == lits.len()
}

/// Look up a clause with exactly the given unassigned literals, scanning
/// the shortest occurrence list among them
fn find_clause(
    db: &ClauseDb,
    occs: &Occurrences,
    values: &[Option<bool>],
    lits: &[Literal],
) -> Option<ClauseRef> {
    let mut best = None;
    let mut best_len = usize::MAX;
    for &lit in lits {
        let len = occs.get(lit).len();
        if len < best_len {
            best_len = len;
            best = Some(lit);
        }
    }
    let best = best?;
    occs.get(best)
        .iter()
        .copied()
        .find(|&c| is_clause(db, values, c, lits))
}
