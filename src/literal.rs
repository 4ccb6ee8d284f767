//! Literal and variable representation

/// A variable identifier, indexed from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(kani, derive(kani::Arbitrary))]
pub struct Variable(pub u32);

/// A literal (variable with polarity)
///
/// Encoded as: positive literal = 2*var, negative literal = 2*var + 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(kani, derive(kani::Arbitrary))]
pub struct Literal(pub u32);

impl Literal {
    /// Create a positive literal
    #[inline]
    pub fn positive(var: Variable) -> Self {
        Literal(var.0 << 1)
    }

    /// Create a negative literal
    #[inline]
    pub fn negative(var: Variable) -> Self {
        Literal((var.0 << 1) | 1)
    }

    /// Get the variable
    #[inline]
    pub fn variable(self) -> Variable {
        Variable(self.0 >> 1)
    }

    /// Check if positive
    #[inline]
    pub fn is_positive(self) -> bool {
        (self.0 & 1) == 0
    }

    /// Get the negation
    #[inline]
    pub fn negated(self) -> Self {
        Literal(self.0 ^ 1)
    }

    /// Get the index for literal-addressed tables (watch lists, occurrences)
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Create a literal from its table index (inverse of `index()`)
    #[inline]
    pub fn from_index(idx: usize) -> Self {
        Literal(idx as u32)
    }

    /// Build a literal from a signed DIMACS-style integer (1-based, nonzero).
    #[inline]
    pub fn from_dimacs(lit: i32) -> Self {
        debug_assert!(lit != 0);
        let var = Variable(lit.unsigned_abs() - 1);
        if lit > 0 {
            Literal::positive(var)
        } else {
            Literal::negative(var)
        }
    }

    /// Render this literal as a signed DIMACS-style integer (1-based).
    #[inline]
    pub fn to_dimacs(self) -> i32 {
        let v = (self.variable().0 + 1) as i32;
        if self.is_positive() {
            v
        } else {
            -v
        }
    }
}

impl Variable {
    /// Get the index
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[cfg(kani)]
mod verification {
    use super::*;

    /// Negating twice returns the original literal
    #[kani::proof]
    fn literal_negation_involutive() {
        let lit: Literal = kani::any();
        kani::assume(lit.0 < 1_000_000);
        assert_eq!(lit.negated().negated(), lit);
    }

    /// Building positive/negative literals preserves the variable
    #[kani::proof]
    fn literal_variable_roundtrip() {
        let var: Variable = kani::any();
        kani::assume(var.0 < 500_000);

        let pos = Literal::positive(var);
        let neg = Literal::negative(var);

        assert_eq!(pos.variable(), var);
        assert_eq!(neg.variable(), var);
        assert!(pos.is_positive());
        assert!(!neg.is_positive());
        assert_eq!(pos.negated(), neg);
    }

    /// Table indices are dense and consecutive per variable
    #[kani::proof]
    fn literal_index_consistent() {
        let var: Variable = kani::any();
        kani::assume(var.0 < 500_000);

        assert_eq!(Literal::positive(var).index(), (var.0 as usize) * 2);
        assert_eq!(Literal::negative(var).index(), (var.0 as usize) * 2 + 1);
    }
}
