//! # UI State
//!
//! Pure state logic behind the site's interactive components: the booking
//! quote and the image carousel, swipe and lightbox. Nothing here renders.

pub mod booking;
pub mod gallery;

pub use booking::{nights_between, parse_stay_date, BookingError, Quote};
pub use gallery::{Carousel, Key, Lightbox, SwipeDirection, SwipeTracker, AUTOPLAY_INTERVAL, SWIPE_THRESHOLD_PX};
