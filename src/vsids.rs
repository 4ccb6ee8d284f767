//! EVSIDS score heap
//!
//! Exponential VSIDS as pioneered by MiniSat: a global increment `scinc`
//! grows geometrically after every conflict, bumping adds the current
//! increment, and the whole table is rescaled once any value approaches
//! the ceiling. The heap is a binary max-heap with a position table so
//! score updates re-heapify in O(log n).

use crate::literal::Variable;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const NO_POS: u32 = u32::MAX;

/// Rescale ceiling. IEEE-754 doubles top out near 1.8e308, so triggering
/// at 1e150 leaves plenty of headroom for one more addition.
const SCORE_LIMIT: f64 = 1e150;

/// Max-heap of variables keyed by EVSIDS score
#[derive(Debug)]
pub struct ScoreHeap {
    score: Vec<f64>,
    heap: Vec<u32>,
    pos: Vec<u32>,
    scinc: f64,
    rescored: u64,
    shuffles: u64,
}

impl ScoreHeap {
    /// Create a heap over `num_vars` variables, all present with score
    /// zero and smaller indices ranked first
    pub fn new(num_vars: usize) -> Self {
        let mut heap = ScoreHeap {
            score: Vec::new(),
            heap: Vec::new(),
            pos: Vec::new(),
            scinc: 1.0,
            rescored: 0,
            shuffles: 0,
        };
        heap.init(num_vars);
        heap
    }

    /// Grow the heap to `new_num_vars`, pushing the new variables
    pub fn init(&mut self, new_num_vars: usize) {
        let old = self.score.len();
        if new_num_vars <= old {
            return;
        }
        self.score.resize(new_num_vars, 0.0);
        self.pos.resize(new_num_vars, NO_POS);
        for idx in old as u32..new_num_vars as u32 {
            self.push(Variable(idx));
        }
    }

    /// Current score of a variable
    #[inline]
    pub fn score(&self, var: Variable) -> f64 {
        self.score[var.index()]
    }

    /// Current score increment
    #[inline]
    pub fn increment(&self) -> f64 {
        self.scinc
    }

    /// Number of rescales performed
    pub fn rescored(&self) -> u64 {
        self.rescored
    }

    /// True if the variable is on the heap
    #[inline]
    pub fn contains(&self, var: Variable) -> bool {
        self.pos[var.index()] != NO_POS
    }

    /// Add `scinc` to a variable's score, rescaling first if the sum
    /// would cross the ceiling, and re-heapify
    pub fn bump(&mut self, var: Variable) {
        let idx = var.index();
        debug_assert!(self.score[idx] < SCORE_LIMIT);
        let mut new_score = self.score[idx] + self.scinc;
        if new_score > SCORE_LIMIT {
            self.rescale();
            new_score = self.score[idx] + self.scinc;
        }
        debug_assert!(new_score <= SCORE_LIMIT);
        self.score[idx] = new_score;
        if self.pos[idx] != NO_POS {
            self.sift_up(self.pos[idx] as usize);
        }
    }

    /// Grow the increment after a conflict: `scinc *= 1000 / score_factor`
    pub fn bump_increment(&mut self, score_factor: f64) {
        debug_assert!(self.scinc < SCORE_LIMIT);
        let factor = 1e3 / score_factor;
        let mut new_scinc = self.scinc * factor;
        if new_scinc > SCORE_LIMIT {
            self.rescale();
            new_scinc = self.scinc * factor;
        }
        self.scinc = new_scinc;
    }

    /// Divide every score and the increment by the same divider, chosen so
    /// all values end up at most one; relative order is untouched
    fn rescale(&mut self) {
        self.rescored += 1;
        let mut divider = self.scinc;
        for &s in &self.score {
            if s > divider {
                divider = s;
            }
        }
        debug_assert!(divider > 0.0);
        let factor = 1.0 / divider;
        for s in &mut self.score {
            *s *= factor;
        }
        self.scinc *= factor;
        log::debug!(
            "rescored scores by 1/{:e}, new increment {:e}",
            divider,
            self.scinc
        );
    }

    /// Push a variable onto the heap if absent (backtrack re-insertion)
    pub fn push(&mut self, var: Variable) {
        let idx = var.index();
        if self.pos[idx] != NO_POS {
            return;
        }
        let at = self.heap.len();
        self.heap.push(idx as u32);
        self.pos[idx] = at as u32;
        self.sift_up(at);
    }

    /// Highest-score variable, if any
    #[inline]
    pub fn front(&self) -> Option<Variable> {
        self.heap.first().map(|&idx| Variable(idx))
    }

    /// Remove and return the highest-score variable
    pub fn pop_front(&mut self) -> Option<Variable> {
        let &root = self.heap.first()?;
        self.remove_at(0);
        Some(Variable(root))
    }

    /// Re-heapify after an external score change
    pub fn update(&mut self, var: Variable) {
        let at = self.pos[var.index()];
        if at == NO_POS {
            return;
        }
        self.sift_up(at as usize);
        self.sift_down(self.pos[var.index()] as usize);
    }

    /// Pop assigned variables off the root until the top is unassigned and
    /// return it; the returned variable stays on the heap
    pub fn next_unassigned_top(&mut self, values: &[Option<bool>]) -> Option<Variable> {
        while let Some(var) = self.front() {
            if values[var.index()].is_none() {
                return Some(var);
            }
            self.pop_front();
        }
        None
    }

    /// Rebuild with a fresh monotone score assignment, either over a
    /// seeded random permutation of all variables or over the current heap
    /// order (which reverses the priorities)
    pub fn shuffle(&mut self, seed: u64, random: bool) {
        self.shuffles += 1;
        let mut order: Vec<u32> = Vec::new();
        if random {
            self.heap.clear();
            self.pos.fill(NO_POS);
            order.extend((0..self.score.len() as u32).rev());
            let mut rng = ChaCha8Rng::seed_from_u64(seed ^ self.shuffles);
            order.shuffle(&mut rng);
        } else {
            while let Some(var) = self.pop_front() {
                order.push(var.0);
            }
        }
        self.scinc = 0.0;
        for &idx in &order {
            self.score[idx as usize] = self.scinc;
            self.scinc += 1.0;
            self.push(Variable(idx));
        }
        if self.scinc == 0.0 {
            self.scinc = 1.0;
        }
    }

    /// True if `a` ranks above `b`: higher score wins, ties go to the
    /// smaller index
    #[inline]
    fn ranks_above(&self, a: usize, b: usize) -> bool {
        let (sa, sb) = (self.score[a], self.score[b]);
        sa > sb || (sa == sb && a < b)
    }

    fn remove_at(&mut self, at: usize) {
        let idx = self.heap[at] as usize;
        let last = self.heap.len() - 1;
        if at == last {
            self.heap.pop();
            self.pos[idx] = NO_POS;
            return;
        }
        let moved = self.heap[last] as usize;
        self.heap[at] = moved as u32;
        self.pos[moved] = at as u32;
        self.heap.pop();
        self.pos[idx] = NO_POS;
        self.sift_up(at);
        self.sift_down(self.pos[moved] as usize);
    }

    fn sift_up(&mut self, mut at: usize) {
        while at > 0 {
            let parent = (at - 1) / 2;
            let var = self.heap[at] as usize;
            let parent_var = self.heap[parent] as usize;
            if !self.ranks_above(var, parent_var) {
                break;
            }
            self.heap[at] = parent_var as u32;
            self.heap[parent] = var as u32;
            self.pos[var] = parent as u32;
            self.pos[parent_var] = at as u32;
            at = parent;
        }
    }

    fn sift_down(&mut self, mut at: usize) {
        loop {
            let left = 2 * at + 1;
            let right = 2 * at + 2;
            let mut best = at;
            if left < self.heap.len()
                && self.ranks_above(self.heap[left] as usize, self.heap[best] as usize)
            {
                best = left;
            }
            if right < self.heap.len()
                && self.ranks_above(self.heap[right] as usize, self.heap[best] as usize)
            {
                best = right;
            }
            if best == at {
                break;
            }
            let var = self.heap[at] as usize;
            let best_var = self.heap[best] as usize;
            self.heap[at] = best_var as u32;
            self.heap[best] = var as u32;
            self.pos[var] = best as u32;
            self.pos[best_var] = at as u32;
            at = best;
        }
    }
}
