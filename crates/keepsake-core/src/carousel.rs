use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    pub src: String,
    #[serde(default)]
    pub caption: String,
}

/// Image carousel with autoplay that pauses while the pointer hovers it.
#[derive(Debug, Clone)]
pub struct Carousel {
    slides: Vec<Slide>,
    current: usize,
    autoplay: bool,
}

impl Carousel {
    pub fn new(slides: Vec<Slide>) -> Self {
        Self {
            slides,
            current: 0,
            autoplay: true,
        }
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&Slide> {
        self.slides.get(self.current)
    }

    pub fn is_autoplaying(&self) -> bool {
        self.autoplay
    }

    /// Horizontal translation of the slide strip, in percent.
    pub fn offset_percent(&self) -> usize {
        self.current * 100
    }

    /// Past the end snaps to the first slide, before the start to the last.
    pub fn move_to(&mut self, index: isize) {
        if self.slides.is_empty() {
            return;
        }
        let count = self.slides.len() as isize;
        self.current = if index >= count {
            0
        } else if index < 0 {
            (count - 1) as usize
        } else {
            index as usize
        };
    }

    pub fn next(&mut self) {
        self.move_to(self.current as isize + 1);
    }

    pub fn previous(&mut self) {
        self.move_to(self.current as isize - 1);
    }

    /// Autoplay timer fired. Returns whether the slide advanced.
    pub fn tick(&mut self) -> bool {
        if !self.autoplay || self.slides.is_empty() {
            return false;
        }
        self.next();
        true
    }

    pub fn hover_enter(&mut self) {
        self.autoplay = false;
    }

    pub fn hover_leave(&mut self) {
        self.autoplay = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn carousel(n: usize) -> Carousel {
        Carousel::new(
            (0..n)
                .map(|i| Slide {
                    src: format!("s{}.jpg", i),
                    caption: String::new(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_move_to_snaps_out_of_range() {
        let mut c = carousel(4);
        c.move_to(4);
        assert_eq!(c.current_index(), 0);
        c.move_to(-1);
        assert_eq!(c.current_index(), 3);
        c.move_to(9);
        assert_eq!(c.current_index(), 0);
        c.move_to(2);
        assert_eq!(c.offset_percent(), 200);
    }

    #[test]
    fn test_next_previous_wrap() {
        let mut c = carousel(3);
        c.previous();
        assert_eq!(c.current_index(), 2);
        c.next();
        assert_eq!(c.current_index(), 0);
    }

    #[test]
    fn test_hover_pauses_autoplay() {
        let mut c = carousel(3);
        assert!(c.tick());
        assert_eq!(c.current_index(), 1);

        c.hover_enter();
        assert!(!c.tick());
        assert_eq!(c.current_index(), 1);

        c.hover_leave();
        assert!(c.tick());
        assert_eq!(c.current_index(), 2);
    }

    #[test]
    fn test_empty_carousel_is_inert() {
        let mut c = carousel(0);
        c.next();
        c.move_to(-3);
        assert!(!c.tick());
        assert!(c.current().is_none());
        assert_eq!(c.current_index(), 0);
    }
}
