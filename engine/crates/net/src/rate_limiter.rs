/// Per-session token-bucket command throttle on the world's millisecond clock.
#[derive(Debug, Clone)]
pub struct CommandThrottle {
    max_per_second: u32,
    tokens: u32,
    last_refill: u64,
}

impl CommandThrottle {
    pub fn new(max_per_second: u32, now: u64) -> Self {
        Self {
            max_per_second,
            tokens: max_per_second,
            last_refill: now,
        }
    }

    /// Try to consume one command token. Returns true if allowed.
    pub fn try_consume(&mut self, now: u64) -> bool {
        self.refill(now);
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    fn refill(&mut self, now: u64) {
        let elapsed = now.saturating_sub(self.last_refill);
        let new_tokens = (elapsed * self.max_per_second as u64 / 1000) as u32;
        if new_tokens > 0 {
            self.tokens = self.tokens.saturating_add(new_tokens).min(self.max_per_second);
            self.last_refill = now;
        }
    }
}
