//! # Gallery State
//!
//! Carousel index with wrap-around, touch swipe detection and the lightbox
//! keyboard model.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Horizontal drag needed to change image
pub const SWIPE_THRESHOLD_PX: f64 = 100.0;

/// Delay between automatic advances
pub const AUTOPLAY_INTERVAL: Duration = Duration::from_secs(5);

/// Active image of a fixed-length list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Carousel {
    len: usize,
    index: usize,
}

impl Carousel {
    pub fn new(len: usize) -> Self {
        Self { len, index: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Jump to `index`; out-of-range values are ignored
    pub fn select(&mut self, index: usize) {
        if index < self.len {
            self.index = index;
        }
    }

    pub fn next(&mut self) -> usize {
        if self.len > 0 {
            self.index = (self.index + 1) % self.len;
        }
        self.index
    }

    pub fn prev(&mut self) -> usize {
        if self.len > 0 {
            self.index = if self.index == 0 { self.len - 1 } else { self.index - 1 };
        }
        self.index
    }

    /// Apply a finished swipe
    pub fn swipe(&mut self, direction: Option<SwipeDirection>) -> usize {
        match direction {
            Some(SwipeDirection::Next) => self.next(),
            Some(SwipeDirection::Previous) => self.prev(),
            None => self.index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeDirection {
    Next,
    Previous,
}

impl SwipeDirection {
    /// Classify a horizontal delta (`end - start`). Dragging left shows the
    /// next image.
    pub fn from_delta(dx: f64) -> Option<Self> {
        if dx < -SWIPE_THRESHOLD_PX {
            Some(Self::Next)
        } else if dx > SWIPE_THRESHOLD_PX {
            Some(Self::Previous)
        } else {
            None
        }
    }
}

/// Tracks one touch gesture
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SwipeTracker {
    start_x: Option<f64>,
    last_x: Option<f64>,
}

impl SwipeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch_start(&mut self, x: f64) {
        self.start_x = Some(x);
        self.last_x = Some(x);
    }

    pub fn touch_move(&mut self, x: f64) {
        if self.start_x.is_some() {
            self.last_x = Some(x);
        }
    }

    /// End the gesture and classify it
    pub fn touch_end(&mut self) -> Option<SwipeDirection> {
        let start = self.start_x.take()?;
        let end = self.last_x.take()?;
        SwipeDirection::from_delta(end - start)
    }
}

/// Keys the lightbox reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Escape,
    Other,
}

impl Key {
    /// Map a DOM `KeyboardEvent.key` name
    pub fn from_name(name: &str) -> Self {
        match name {
            "ArrowLeft" => Self::ArrowLeft,
            "ArrowRight" => Self::ArrowRight,
            "Escape" => Self::Escape,
            _ => Self::Other,
        }
    }
}

/// Full-screen viewer over a carousel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lightbox {
    carousel: Carousel,
    open: bool,
}

impl Lightbox {
    pub fn new(len: usize) -> Self {
        Self {
            carousel: Carousel::new(len),
            open: false,
        }
    }

    pub fn open_at(&mut self, index: usize) {
        if !self.carousel.is_empty() {
            self.carousel.select(index);
            self.open = true;
        }
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn index(&self) -> usize {
        self.carousel.index()
    }

    /// Handle a key press. Returns true when the key was consumed.
    pub fn handle_key(&mut self, key: Key) -> bool {
        if !self.open {
            return false;
        }
        match key {
            Key::ArrowLeft => {
                self.carousel.prev();
                true
            }
            Key::ArrowRight => {
                self.carousel.next();
                true
            }
            Key::Escape => {
                self.close();
                true
            }
            Key::Other => false,
        }
    }
}
