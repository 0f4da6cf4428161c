/// Deterministic clock that advances through a sorted series of
/// timestamps. Scenario runs merge their event times with uniform
/// accrual ticks so every state change happens at an explicit instant.
pub struct SimClock {
    timestamps: Vec<u64>,
    current_idx: usize,
}

impl SimClock {
    pub fn new(mut timestamps: Vec<u64>) -> Self {
        timestamps.sort();
        timestamps.dedup();
        Self {
            timestamps,
            current_idx: 0,
        }
    }

    /// Evenly spaced ticks from `start` to `end` every `step` seconds.
    pub fn uniform(start: u64, end: u64, step: u64) -> Self {
        let timestamps: Vec<u64> = (start..=end).step_by(step.max(1) as usize).collect();
        Self {
            timestamps,
            current_idx: 0,
        }
    }

    /// Uniform ticks plus extra instants (scenario action times).
    pub fn uniform_with(start: u64, end: u64, step: u64, extra: &[u64]) -> Self {
        let mut timestamps: Vec<u64> = (start..=end).step_by(step.max(1) as usize).collect();
        timestamps.extend(extra.iter().copied().filter(|t| *t >= start && *t <= end));
        Self::new(timestamps)
    }

    pub fn current_timestamp(&self) -> u64 {
        self.timestamps.get(self.current_idx).copied().unwrap_or(0)
    }

    /// Advance to the next tick. Returns false when exhausted.
    pub fn advance(&mut self) -> bool {
        if self.current_idx + 1 < self.timestamps.len() {
            self.current_idx += 1;
            true
        } else {
            false
        }
    }

    /// Seconds elapsed since the previous tick (0 for the first tick).
    pub fn dt_seconds(&self) -> u64 {
        if self.current_idx == 0 {
            return 0;
        }
        self.timestamps[self.current_idx] - self.timestamps[self.current_idx - 1]
    }

    pub fn tick_index(&self) -> usize {
        self.current_idx
    }

    pub fn total_ticks(&self) -> usize {
        self.timestamps.len()
    }

    pub fn last_timestamp(&self) -> u64 {
        self.timestamps.last().copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_and_dedups_event_times() {
        let clock = SimClock::uniform_with(0, 100, 50, &[75, 50, 300]);
        let mut seen = vec![clock.current_timestamp()];
        let mut c = clock;
        while c.advance() {
            seen.push(c.current_timestamp());
        }
        assert_eq!(seen, vec![0, 50, 75, 100]);
    }

    #[test]
    fn dt_tracks_gaps() {
        let mut clock = SimClock::new(vec![10, 40, 41]);
        assert_eq!(clock.dt_seconds(), 0);
        clock.advance();
        assert_eq!(clock.dt_seconds(), 30);
        clock.advance();
        assert_eq!(clock.dt_seconds(), 1);
        assert!(!clock.advance());
    }
}
