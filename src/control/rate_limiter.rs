/// Slew-rate limiter: the output follows its input but never moves faster
/// than `limit` units per second.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limit: f32,
    y: f32,
}

impl RateLimiter {
    pub fn new(limit: f32) -> Self {
        Self { limit, y: 0. }
    }

    pub fn rate_limit(&mut self, t_s: f32, u: f32) -> f32 {
        let rate = (u - self.y) / t_s;

        self.y = if rate > self.limit {
            // Limit rising rate
            self.y + t_s * self.limit
        } else if rate < -self.limit {
            // Limit falling rate
            self.y - t_s * self.limit
        } else {
            u
        };

        self.y
    }

    /// Restart the ramp from `y`.
    pub fn reset(&mut self, y: f32) {
        self.y = y;
    }

    pub fn value(&self) -> f32 {
        self.y
    }
}
