//! Simulation clock for time-of-day tracking
//!
//! Steps are the unit of simulation time. The clock maps them onto a
//! day/minute calendar so schedules expressed in minutes can be converted.

use serde::{Deserialize, Serialize};

use crate::core::types::Step;

const MINUTES_PER_DAY: u64 = 24 * 60;

/// Simulation clock with a fixed step length in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimClock {
    step: Step,
    seconds_per_step: u64,
    start_minute_of_day: u64,
}

impl SimClock {
    pub fn new(seconds_per_step: u64, start_minute_of_day: u64) -> Self {
        Self {
            step: 0,
            seconds_per_step: seconds_per_step.max(1),
            start_minute_of_day: start_minute_of_day % MINUTES_PER_DAY,
        }
    }

    /// Rebuild a clock at a persisted step
    pub fn at_step(seconds_per_step: u64, start_minute_of_day: u64, step: Step) -> Self {
        let mut clock = Self::new(seconds_per_step, start_minute_of_day);
        clock.step = step;
        clock
    }

    pub fn advance(&mut self) {
        self.step += 1;
    }

    pub fn current_step(&self) -> Step {
        self.step
    }

    pub fn seconds_per_step(&self) -> u64 {
        self.seconds_per_step
    }

    pub fn start_minute_of_day(&self) -> u64 {
        self.start_minute_of_day
    }

    fn elapsed_minutes(&self, step: Step) -> u64 {
        self.start_minute_of_day + step * self.seconds_per_step / 60
    }

    pub fn current_day(&self) -> u64 {
        self.elapsed_minutes(self.step) / MINUTES_PER_DAY
    }

    pub fn minute_of_day(&self) -> u64 {
        self.elapsed_minutes(self.step) % MINUTES_PER_DAY
    }

    /// Convert a duration in minutes to whole steps (rounded up, at least one)
    pub fn minutes_to_steps(&self, minutes: u32) -> Step {
        let seconds = minutes as u64 * 60;
        seconds.div_ceil(self.seconds_per_step).max(1)
    }

    /// First step of the next simulated day
    pub fn next_day_start(&self) -> Step {
        let steps_per_day = (MINUTES_PER_DAY * 60).div_ceil(self.seconds_per_step);
        let minutes_into_day = self.minute_of_day();
        let steps_into_day = minutes_into_day * 60 / self.seconds_per_step;
        self.step + steps_per_day.saturating_sub(steps_into_day).max(1)
    }

    /// "Day 1, 08:30"
    pub fn time_label(&self) -> String {
        let minute = self.minute_of_day();
        format!(
            "Day {}, {:02}:{:02}",
            self.current_day() + 1,
            minute / 60,
            minute % 60
        )
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(10, 0)
    }
}
