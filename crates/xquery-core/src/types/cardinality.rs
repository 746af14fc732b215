use core::fmt;

bitflags::bitflags! {
    /// Static bounds on the length of a sequence.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Cardinality: u8 {
        const ALLOWS_ZERO = 0b001;
        const ALLOWS_ONE = 0b010;
        const ALLOWS_MANY = 0b100;
    }
}

impl Cardinality {
    pub const EMPTY: Self = Self::ALLOWS_ZERO;
    pub const EXACTLY_ONE: Self = Self::ALLOWS_ONE;
    pub const ZERO_OR_ONE: Self = Self::ALLOWS_ZERO.union(Self::ALLOWS_ONE);
    pub const ONE_OR_MORE: Self = Self::ALLOWS_ONE.union(Self::ALLOWS_MANY);
    pub const ZERO_OR_MORE: Self = Self::ALLOWS_ZERO
        .union(Self::ALLOWS_ONE)
        .union(Self::ALLOWS_MANY);

    pub fn allows_zero(self) -> bool {
        self.contains(Self::ALLOWS_ZERO)
    }

    pub fn allows_one(self) -> bool {
        self.contains(Self::ALLOWS_ONE)
    }

    pub fn allows_many(self) -> bool {
        self.contains(Self::ALLOWS_MANY)
    }

    pub fn is_exactly_one(self) -> bool {
        self == Self::EXACTLY_ONE
    }

    /// True when the only permitted length is zero.
    pub fn is_empty_only(self) -> bool {
        self == Self::EMPTY
    }

    /// At most one item (`?`, `1` or empty).
    pub fn at_most_one(self) -> bool {
        !self.allows_many()
    }

    /// Whether every sequence accepted by `other` is also accepted by `self`.
    pub fn subsumes(self, other: Self) -> bool {
        self.contains(other)
    }

    /// Cardinality of `for $x in A return B` given the cardinalities of `A` and `B`.
    pub fn multiply(self, other: Self) -> Self {
        if self.is_empty_only() || other.is_empty_only() {
            return Self::EMPTY;
        }
        let mut out = Self::empty();
        if self.allows_zero() || other.allows_zero() {
            out |= Self::ALLOWS_ZERO;
        }
        if self.allows_one() && other.allows_one() {
            out |= Self::ALLOWS_ONE;
        }
        if self.allows_many() || other.allows_many() {
            out |= Self::ALLOWS_MANY;
        }
        out
    }

    /// Cardinality of the concatenation `(A, B)`.
    pub fn sum(self, other: Self) -> Self {
        if self.is_empty_only() {
            return other;
        }
        if other.is_empty_only() {
            return self;
        }
        let mut out = Self::ALLOWS_MANY;
        if self.allows_zero() && other.allows_zero() {
            out |= Self::ALLOWS_ZERO;
        }
        if (self.allows_zero() && other.allows_one()) || (self.allows_one() && other.allows_zero()) {
            out |= Self::ALLOWS_ONE;
        }
        out
    }

    pub fn from_count(n: usize) -> Self {
        match n {
            0 => Self::EMPTY,
            1 => Self::EXACTLY_ONE,
            _ => Self::ALLOWS_MANY,
        }
    }

    /// Occurrence indicator as written in a sequence type.
    pub fn indicator(self) -> &'static str {
        if self == Self::ZERO_OR_ONE {
            "?"
        } else if self == Self::ZERO_OR_MORE {
            "*"
        } else if self == Self::ONE_OR_MORE {
            "+"
        } else {
            ""
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = if *self == Self::EMPTY {
            "empty"
        } else if *self == Self::EXACTLY_ONE {
            "exactly one"
        } else if *self == Self::ZERO_OR_ONE {
            "zero or one"
        } else if *self == Self::ONE_OR_MORE {
            "one or more"
        } else if *self == Self::ZERO_OR_MORE {
            "zero or more"
        } else if *self == Self::ALLOWS_MANY {
            "more than one"
        } else {
            "unknown"
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::Cardinality;

    #[test]
    fn multiply_propagates_empty() {
        assert_eq!(Cardinality::EXACTLY_ONE.multiply(Cardinality::EMPTY), Cardinality::EMPTY);
        assert_eq!(
            Cardinality::ZERO_OR_ONE.multiply(Cardinality::EXACTLY_ONE),
            Cardinality::ZERO_OR_ONE
        );
        assert_eq!(
            Cardinality::ONE_OR_MORE.multiply(Cardinality::ZERO_OR_ONE),
            Cardinality::ZERO_OR_MORE
        );
    }

    #[test]
    fn sum_of_two_singletons_is_many() {
        let s = Cardinality::EXACTLY_ONE.sum(Cardinality::EXACTLY_ONE);
        assert!(!s.allows_zero() && !s.allows_one() && s.allows_many());
        assert_eq!(Cardinality::ZERO_OR_ONE.sum(Cardinality::ZERO_OR_ONE), Cardinality::ZERO_OR_MORE);
    }
}
