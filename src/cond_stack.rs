//! Gate tracking for nested conditional regions.

/// A condition stack that never materializes its booleans.
///
/// Conceptually a vector of bools, one per nested IF/NOTIF level, telling
/// whether each level took its active arm. Execution only ever needs to know
/// whether the stack is empty and whether any false is present, so it is
/// enough to store the would-be size and the position of the first false.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionStack {
    size: usize,
    first_false: Option<usize>,
}

impl ConditionStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn all_true(&self) -> bool {
        self.first_false.is_none()
    }

    pub fn push(&mut self, v: bool) {
        if !v && self.first_false.is_none() {
            self.first_false = Some(self.size);
        }
        self.size += 1;
    }

    /// Returns `false` if the stack was empty. The popped value itself is
    /// never observable.
    pub fn pop(&mut self) -> bool {
        if self.size == 0 {
            return false;
        }
        self.size -= 1;
        if self.first_false == Some(self.size) {
            self.first_false = None;
        }
        true
    }

    /// Flips the top value (OP_ELSE). Returns `false` if the stack was empty.
    ///
    /// Toggling anything but the first false is unobservable, so only the
    /// all-true and false-on-top cases change state.
    pub fn toggle_top(&mut self) -> bool {
        if self.size == 0 {
            return false;
        }
        match self.first_false {
            None => self.first_false = Some(self.size - 1),
            Some(pos) if pos == self.size - 1 => self.first_false = None,
            Some(_) => {}
        }
        true
    }
}
