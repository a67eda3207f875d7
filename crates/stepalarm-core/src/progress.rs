use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Counts unit events towards a goal. The count only moves up; it is
/// reset when an alarm starts a new ring cycle and at no other time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressTracker {
    goal: u32,
    count: u32,
}

impl ProgressTracker {
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidGoal`] when `goal` is zero.
    pub fn new(goal: u32) -> Result<Self, ValidationError> {
        if goal == 0 {
            return Err(ValidationError::InvalidGoal { goal });
        }
        Ok(Self { goal, count: 0 })
    }

    /// Add exactly one unit and return the new count.
    pub fn record_unit(&mut self) -> u32 {
        self.count = self.count.saturating_add(1);
        self.count
    }

    pub fn is_goal_reached(&self) -> bool {
        self.count >= self.goal
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn goal(&self) -> u32 {
        self.goal
    }

    /// Units still missing, zero once the goal is met.
    pub fn remaining(&self) -> u32 {
        self.goal.saturating_sub(self.count)
    }

    pub(crate) fn reset(&mut self) {
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_goal_is_rejected() {
        assert_eq!(
            ProgressTracker::new(0),
            Err(ValidationError::InvalidGoal { goal: 0 })
        );
    }

    #[test]
    fn goal_reached_after_enough_units() {
        let mut p = ProgressTracker::new(2).unwrap();
        assert!(!p.is_goal_reached());
        assert_eq!(p.record_unit(), 1);
        assert_eq!(p.remaining(), 1);
        assert_eq!(p.record_unit(), 2);
        assert!(p.is_goal_reached());
        assert_eq!(p.remaining(), 0);
    }

    #[test]
    fn reset_returns_to_zero() {
        let mut p = ProgressTracker::new(5).unwrap();
        p.record_unit();
        p.reset();
        assert_eq!(p.count(), 0);
        assert_eq!(p.goal(), 5);
    }
}
