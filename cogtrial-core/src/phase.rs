use std::time::Duration;

/// A named step of a timed presentation sequence.
pub trait Phase: Copy + Clone + PartialEq + std::fmt::Debug {
    fn label(&self) -> &'static str;
}

/// Finite, ordered list of phases, each held for a fixed duration.
///
/// The sequence is driven by elapsed time only: `poll` reports every phase
/// whose start has been reached since the previous poll, in order, so a late
/// wakeup never skips a phase.
#[derive(Debug, Clone)]
pub struct PhaseSequence<P: Phase> {
    steps: Vec<(P, Duration)>,
    started_at: Option<Duration>,
    entered: usize,
}

impl<P: Phase> PhaseSequence<P> {
    pub fn new(steps: Vec<(P, Duration)>) -> Self {
        Self {
            steps,
            started_at: None,
            entered: 0,
        }
    }

    /// Anchors the sequence at `now`. Phases are entered on the next `poll`.
    pub fn start(&mut self, now: Duration) {
        self.started_at = Some(now);
        self.entered = 0;
    }

    /// Phases entered since the last poll.
    pub fn poll(&mut self, now: Duration) -> Vec<P> {
        let mut entered = Vec::new();
        while let Some(boundary) = self.next_boundary() {
            if boundary > now {
                break;
            }
            entered.push(self.steps[self.entered].0);
            self.entered += 1;
        }
        entered
    }

    /// Absolute time the next phase starts.
    pub fn next_boundary(&self) -> Option<Duration> {
        let start = self.started_at?;
        if self.is_exhausted() {
            return None;
        }
        let offset: Duration = self.steps[..self.entered].iter().map(|(_, d)| *d).sum();
        Some(start + offset)
    }

    pub fn current(&self) -> Option<P> {
        self.entered.checked_sub(1).map(|i| self.steps[i].0)
    }

    /// True once the last phase has been entered.
    pub fn is_exhausted(&self) -> bool {
        self.entered >= self.steps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Light {
        Red,
        Green,
        Amber,
    }

    impl Phase for Light {
        fn label(&self) -> &'static str {
            match self {
                Light::Red => "red",
                Light::Green => "green",
                Light::Amber => "amber",
            }
        }
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn lights() -> PhaseSequence<Light> {
        PhaseSequence::new(vec![
            (Light::Red, ms(100)),
            (Light::Green, ms(200)),
            (Light::Amber, ms(50)),
        ])
    }

    #[test]
    fn unstarted_sequence_has_no_boundary() {
        let seq = lights();
        assert_eq!(seq.next_boundary(), None);
        assert_eq!(seq.current(), None);
    }

    #[test]
    fn phases_are_entered_at_cumulative_offsets() {
        let mut seq = lights();
        seq.start(ms(1000));
        assert_eq!(seq.poll(ms(1000)), vec![Light::Red]);
        assert_eq!(seq.next_boundary(), Some(ms(1100)));
        assert!(seq.poll(ms(1099)).is_empty());
        assert_eq!(seq.poll(ms(1100)), vec![Light::Green]);
        assert_eq!(seq.next_boundary(), Some(ms(1300)));
        assert_eq!(seq.poll(ms(1300)), vec![Light::Amber]);
        assert!(seq.is_exhausted());
        assert_eq!(seq.next_boundary(), None);
    }

    #[test]
    fn late_poll_reports_every_skipped_phase() {
        let mut seq = lights();
        seq.start(ms(0));
        assert_eq!(
            seq.poll(ms(10_000)),
            vec![Light::Red, Light::Green, Light::Amber]
        );
        assert_eq!(seq.current(), Some(Light::Amber));
    }

    #[test]
    fn phases_have_labels() {
        assert_eq!(Light::Green.label(), "green");
    }
}
