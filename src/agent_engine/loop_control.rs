/// Step budget for one task.
pub struct LoopController {
    max_steps: u32,
    steps_taken: u32,
}

impl LoopController {
    pub fn new(max_steps: u32) -> Self {
        Self {
            max_steps,
            steps_taken: 0,
        }
    }

    /// Index of the step about to run (0-based).
    pub fn current_step(&self) -> u32 {
        self.steps_taken
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn record_step(&mut self) {
        self.steps_taken += 1;
    }

    pub fn should_stop(&self) -> bool {
        self.steps_taken >= self.max_steps
    }
}
