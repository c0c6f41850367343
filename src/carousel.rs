//! Slideshow state machine for card carousels.
//!
//! The carousel shows a window of `per_view` cards and moves one page at a
//! time. Pages are clamped at both ends: the last page is aligned so the
//! window ends on the last card, and navigating past it is a no-op.

use std::time::Duration;

/// Autoplay interval
pub const AUTOPLAY_INTERVAL: Duration = Duration::from_secs(5);

/// Cards per view for a viewport width in pixels.
pub fn per_view_for_width(width: u32) -> usize {
    if width < 720 {
        2
    } else if width < 980 {
        3
    } else {
        4
    }
}

#[derive(Debug, Clone)]
struct Autoplay {
    interval: Duration,
    elapsed: Duration,
    paused: bool,
}

#[derive(Debug, Clone)]
pub struct Carousel {
    total: usize,
    per_view: usize,
    page: usize,
    autoplay: Autoplay,
}

impl Carousel {
    pub fn new(total: usize, per_view: usize) -> Self {
        Self {
            total,
            per_view: per_view.max(1),
            page: 0,
            autoplay: Autoplay {
                interval: AUTOPLAY_INTERVAL,
                elapsed: Duration::ZERO,
                paused: false,
            },
        }
    }

    /// Carousel sized for a viewport width.
    pub fn for_width(total: usize, width: u32) -> Self {
        Self::new(total, per_view_for_width(width))
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.autoplay.interval = interval;
        self
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn per_view(&self) -> usize {
        self.per_view
    }

    /// Number of pages (one dot each), at least 1.
    pub fn pages(&self) -> usize {
        self.total.div_ceil(self.per_view).max(1)
    }

    /// Current page index, also the active dot.
    pub fn page(&self) -> usize {
        self.page
    }

    /// Index of the first visible card.
    pub fn offset(&self) -> usize {
        let ceiling = self.total.saturating_sub(self.per_view);
        (self.page * self.per_view).min(ceiling)
    }

    /// Indices of the visible cards.
    pub fn visible(&self) -> std::ops::Range<usize> {
        let start = self.offset();
        start..(start + self.per_view).min(self.total)
    }

    pub fn at_end(&self) -> bool {
        self.page + 1 >= self.pages()
    }

    /// Active flag per dot.
    pub fn dots(&self) -> Vec<bool> {
        (0..self.pages()).map(|i| i == self.page).collect()
    }

    /// Jump to a page (user navigation). Out-of-range pages are clamped.
    pub fn go(&mut self, page: usize) {
        self.page = page.min(self.pages() - 1);
        self.autoplay.elapsed = Duration::ZERO;
    }

    pub fn next(&mut self) {
        self.go(self.page + 1);
    }

    pub fn prev(&mut self) {
        self.go(self.page.saturating_sub(1));
    }

    /// Recompute cards per view after a viewport change and re-clamp.
    pub fn resize(&mut self, width: u32) {
        let per_view = per_view_for_width(width);
        if per_view != self.per_view {
            self.per_view = per_view;
            self.page = self.page.min(self.pages() - 1);
        }
    }

    /// Pointer entered the carousel.
    pub fn hover(&mut self) {
        self.autoplay.paused = true;
    }

    /// Pointer left: resume with a fresh timer.
    pub fn leave(&mut self) {
        self.autoplay.paused = false;
        self.autoplay.elapsed = Duration::ZERO;
    }

    pub fn is_paused(&self) -> bool {
        self.autoplay.paused
    }

    /// Advance the autoplay clock. Returns `true` when the carousel moved.
    pub fn tick(&mut self, elapsed: Duration) -> bool {
        if self.autoplay.paused || self.autoplay.interval.is_zero() {
            return false;
        }

        self.autoplay.elapsed += elapsed;
        let mut moved = false;
        while self.autoplay.elapsed >= self.autoplay.interval {
            self.autoplay.elapsed -= self.autoplay.interval;
            if self.at_end() {
                continue;
            }
            self.page += 1;
            moved = true;
        }
        moved
    }
}
