use serde::{Deserialize, Serialize};

/// Weights used to order entries waiting for a class seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistConfig {
    pub returning_student_bonus: u32,
    pub sibling_bonus: u32,
    pub daily_wait_bonus: u32,
    pub max_wait_bonus: u32,
}

impl Default for WaitlistConfig {
    fn default() -> Self {
        Self {
            returning_student_bonus: 30,
            sibling_bonus: 20,
            daily_wait_bonus: 1,
            max_wait_bonus: 30,
        }
    }
}
