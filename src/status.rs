use std::time::{Duration, Instant};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Transient message for the footer. Whether it is shown depends only on how
/// long ago it was set; a newer message simply replaces the older one.
#[derive(Debug, Clone)]
pub struct Status {
    timeout: Duration,
    text: String,
    created_at: Option<Instant>,
}

impl Status {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            text: String::new(),
            created_at: None,
        }
    }

    pub fn set<S: Into<String>>(&mut self, text: S) {
        self.set_at(text, Instant::now());
    }

    pub fn set_at<S: Into<String>>(&mut self, text: S, now: Instant) {
        self.text = text.into();
        self.created_at = Some(now);
    }

    pub fn is_visible(&self, now: Instant) -> bool {
        self.created_at
            .map(|created| now.saturating_duration_since(created) < self.timeout)
            .unwrap_or(false)
    }

    pub fn text(&self, now: Instant) -> Option<&str> {
        self.is_visible(now).then_some(self.text.as_str())
    }

    /// Hides an outdated message. Returns true when the screen needs a redraw.
    pub fn expire(&mut self, now: Instant) -> bool {
        if self.created_at.is_some() && !self.is_visible(now) {
            self.created_at = None;
            true
        } else {
            false
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}
