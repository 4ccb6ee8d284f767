//! Search configuration
//!
//! Every field is a behavioral knob of the search core, not a cosmetic
//! setting; defaults follow the tuned values of mature CDCL solvers.

/// Configuration for the search core
#[derive(Debug, Clone)]
pub struct Options {
    /// Bump variables during conflict analysis
    pub bump: bool,
    /// Also bump literals in reason clauses of learned-clause literals
    pub bump_reason: bool,
    /// Transitive depth of reason-side bumping
    pub bump_reason_depth: u32,
    /// Chronological backtracking: 0 = off, 1 = on, 2 = additionally
    /// rewatch a higher-level literal when a forced literal's assignment
    /// level exceeds the falsified watch's level
    pub chrono: u32,
    /// Always backtrack to `level - 1` after a conflict
    pub chrono_always: bool,
    /// Maximum non-chronological jump distance before falling back to
    /// chronological backtracking
    pub chrono_level_limit: u32,
    /// Pick the backtrack level that reuses the most valuable trail prefix
    pub chrono_reuse_trail: bool,
    /// Shrink learned clauses by recursive self-subsumption
    pub minimize: bool,
    /// Recursion depth limit for minimization
    pub minimize_depth: u32,
    /// Default initial phase (true = positive)
    pub phase: bool,
    /// Force the initial phase, overriding saved and target phases
    pub force_phase: bool,
    /// Prefer the saved phase over everything else (used by rephasing)
    pub force_saved_phase: bool,
    /// Use target phases while in stable mode
    pub stabilize_phase: bool,
    /// EVSIDS growth divisor: the increment grows by `1000 / score_factor`
    /// per conflict
    pub score_factor: f64,
    /// Master switch for the shuffle hooks
    pub shuffle: bool,
    /// Shuffle the VMTF queue when shuffling
    pub shuffle_queue: bool,
    /// Shuffle the EVSIDS heap when shuffling
    pub shuffle_scores: bool,
    /// Shuffle randomly instead of reversing
    pub shuffle_random: bool,
    /// Seed for randomized shuffling
    pub seed: u64,
    /// Build the initial VMTF queue in reverse index order
    pub reverse: bool,
    /// Master switch for gate extraction
    pub elim_subst: bool,
    /// Extract equivalence gates
    pub elim_equivs: bool,
    /// Extract AND gates
    pub elim_ands: bool,
    /// Extract if-then-else gates
    pub elim_ites: bool,
    /// Extract XOR gates
    pub elim_xors: bool,
    /// Maximum XOR arity considered
    pub elim_xor_limit: u32,
    /// Subsume recently learned clauses against each new learned clause
    pub eager_subsume: bool,
    /// Attempt budget per eager-subsumption round
    pub eager_subsume_limit: u32,
    /// Run the lucky pre-solver before search
    pub lucky: bool,
    /// Slice length at which rank sorting switches from merge to radix
    pub radix_sort_limit: usize,
    /// Glue threshold for promotion into the middle clause tier
    pub reduce_tier2_glue: u32,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            bump: true,
            bump_reason: true,
            bump_reason_depth: 1,
            chrono: 1,
            chrono_always: false,
            chrono_level_limit: 100,
            chrono_reuse_trail: true,
            minimize: true,
            minimize_depth: 1000,
            phase: true,
            force_phase: false,
            force_saved_phase: false,
            stabilize_phase: true,
            score_factor: 950.0,
            shuffle: false,
            shuffle_queue: true,
            shuffle_scores: true,
            shuffle_random: false,
            seed: 0,
            reverse: false,
            elim_subst: true,
            elim_equivs: true,
            elim_ands: true,
            elim_ites: true,
            elim_xors: true,
            elim_xor_limit: 5,
            eager_subsume: true,
            eager_subsume_limit: 20,
            lucky: true,
            radix_sort_limit: 32,
            reduce_tier2_glue: 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_sane() {
        let opts = Options::default();
        assert!(opts.bump);
        assert!(opts.chrono >= 1);
        assert!(opts.score_factor > 500.0 && opts.score_factor <= 1000.0);
        assert!(opts.elim_xor_limit < 31);
    }
}
