//! Per-subproblem variable bound overrides

/// Bound state of a single decision variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VariableBound {
    /// Relaxed to the interval `[0, 1]`
    #[default]
    Free,
    FixedZero,
    FixedOne,
}

impl VariableBound {
    pub fn lower(&self) -> f64 {
        match self {
            VariableBound::FixedOne => 1.0,
            VariableBound::Free | VariableBound::FixedZero => 0.0,
        }
    }

    pub fn upper(&self) -> f64 {
        match self {
            VariableBound::FixedZero => 0.0,
            VariableBound::Free | VariableBound::FixedOne => 1.0,
        }
    }

    pub fn is_fixed(&self) -> bool {
        !matches!(self, VariableBound::Free)
    }
}

/// Bound overrides layered on top of the immutable problem model.
///
/// Branching never touches the model itself; every subproblem carries its own
/// overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundOverlay {
    bounds: Vec<VariableBound>,
    fixed: usize,
}

impl BoundOverlay {
    /// Create an overlay with every variable free
    pub fn new(num_variables: usize) -> Self {
        Self {
            bounds: vec![VariableBound::Free; num_variables],
            fixed: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Bound of `variable`
    ///
    /// # Panics
    ///
    /// Panics if `variable` is out of range.
    pub fn get(&self, variable: usize) -> VariableBound {
        self.bounds[variable]
    }

    /// Override the bound of `variable` in place
    pub fn set(&mut self, variable: usize, bound: VariableBound) {
        let previous = std::mem::replace(&mut self.bounds[variable], bound);
        match (previous.is_fixed(), bound.is_fixed()) {
            (false, true) => self.fixed += 1,
            (true, false) => self.fixed -= 1,
            _ => {}
        }
    }

    /// Copy of this overlay with `variable` set to `bound`
    pub fn with(&self, variable: usize, bound: VariableBound) -> Self {
        let mut child = self.clone();
        child.set(variable, bound);
        child
    }

    /// Number of variables that are not free
    pub fn num_fixed(&self) -> usize {
        self.fixed
    }

    pub fn is_free(&self, variable: usize) -> bool {
        !self.bounds[variable].is_fixed()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, VariableBound)> + '_ {
        self.bounds.iter().copied().enumerate()
    }

    /// Indices of the variables fixed to one, in ascending order
    pub fn fixed_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.iter()
            .filter(|(_, bound)| *bound == VariableBound::FixedOne)
            .map(|(variable, _)| variable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_tracks_fixed_count() {
        let mut overlay = BoundOverlay::new(4);
        assert_eq!(overlay.num_fixed(), 0);

        overlay.set(1, VariableBound::FixedOne);
        overlay.set(3, VariableBound::FixedZero);
        assert_eq!(overlay.num_fixed(), 2);

        // Re-fixing an already fixed variable does not double count
        overlay.set(1, VariableBound::FixedZero);
        assert_eq!(overlay.num_fixed(), 2);

        overlay.set(3, VariableBound::Free);
        assert_eq!(overlay.num_fixed(), 1);
        assert!(overlay.is_free(3));
    }

    #[test]
    fn test_with_leaves_parent_untouched() {
        let parent = BoundOverlay::new(3);
        let child = parent.with(2, VariableBound::FixedOne);

        assert_eq!(parent.get(2), VariableBound::Free);
        assert_eq!(child.get(2), VariableBound::FixedOne);
        assert_eq!(child.fixed_ones().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_bound_intervals() {
        assert_eq!(VariableBound::Free.lower(), 0.0);
        assert_eq!(VariableBound::Free.upper(), 1.0);
        assert_eq!(VariableBound::FixedOne.lower(), 1.0);
        assert_eq!(VariableBound::FixedZero.upper(), 0.0);
    }
}
