//! Recursion governor.
//!
//! Counts renders a mount runs on its own (state set from inside the
//! function, effects, timers) within one host tick. Past the limit the mount
//! is suspended for the rest of the tick; the host is asked to render it
//! again on a later tick, and an external call lifts the suspension at once.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Verdict {
    Proceed,
    /// The limit was crossed by this render.
    Tripped,
    Suspended,
}

#[derive(Debug)]
pub(crate) struct Governor {
    limit: u32,
    tick: u64,
    nested: u32,
    suspended: bool,
}

impl Governor {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            tick: 0,
            nested: 0,
            suspended: false,
        }
    }

    /// An external call starts a fresh budget.
    pub fn reset(&mut self, tick: u64) {
        self.tick = tick;
        self.nested = 0;
        self.suspended = false;
    }

    pub fn enter_nested(&mut self, tick: u64) -> Verdict {
        if tick != self.tick {
            self.reset(tick);
        }
        if self.suspended {
            return Verdict::Suspended;
        }
        self.nested += 1;
        if self.nested > self.limit {
            self.suspended = true;
            Verdict::Tripped
        } else {
            Verdict::Proceed
        }
    }

    pub fn is_suspended(&self, tick: u64) -> bool {
        self.suspended && self.tick == tick
    }

    #[cfg(test)]
    pub fn nested(&self) -> u32 {
        self.nested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_once_past_limit() {
        let mut g = Governor::new(3);
        g.reset(1);
        for _ in 0..3 {
            assert_eq!(g.enter_nested(1), Verdict::Proceed);
        }
        assert_eq!(g.enter_nested(1), Verdict::Tripped);
        assert_eq!(g.enter_nested(1), Verdict::Suspended);
        assert!(g.is_suspended(1));
    }

    #[test]
    fn new_tick_lifts_suspension() {
        let mut g = Governor::new(1);
        g.reset(7);
        g.enter_nested(7);
        assert_eq!(g.enter_nested(7), Verdict::Tripped);

        assert!(!g.is_suspended(8));
        assert_eq!(g.enter_nested(8), Verdict::Proceed);
        assert_eq!(g.nested(), 1);
    }

    #[test]
    fn external_call_resets_budget() {
        let mut g = Governor::new(1);
        g.enter_nested(0);
        g.enter_nested(0);
        assert!(g.is_suspended(0));
        g.reset(0);
        assert!(!g.is_suspended(0));
        assert_eq!(g.enter_nested(0), Verdict::Proceed);
    }
}
