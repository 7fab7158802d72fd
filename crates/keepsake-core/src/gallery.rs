use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryImage {
    pub src: String,
    #[serde(default)]
    pub caption: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightboxKey {
    Escape,
    ArrowLeft,
    ArrowRight,
}

impl LightboxKey {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Escape" | "esc" => Some(Self::Escape),
            "ArrowLeft" | "left" => Some(Self::ArrowLeft),
            "ArrowRight" | "right" => Some(Self::ArrowRight),
            _ => None,
        }
    }
}

/// Full-screen viewer over the gallery images.
#[derive(Debug, Clone)]
pub struct Lightbox {
    images: Vec<GalleryImage>,
    current: usize,
    open: bool,
}

impl Lightbox {
    pub fn new(images: Vec<GalleryImage>) -> Self {
        Self {
            images,
            current: 0,
            open: false,
        }
    }

    pub fn images(&self) -> &[GalleryImage] {
        &self.images
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Page scrolling is locked while the lightbox is showing.
    pub fn scroll_locked(&self) -> bool {
        self.open
    }

    pub fn current(&self) -> Option<&GalleryImage> {
        self.images.get(self.current)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Open on the image at `index`. Out-of-range indices are ignored.
    pub fn open(&mut self, index: usize) -> Option<&GalleryImage> {
        if index >= self.images.len() {
            return None;
        }
        self.current = index;
        self.open = true;
        self.images.get(index)
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn show_next(&mut self) {
        if self.images.is_empty() {
            return;
        }
        self.current = (self.current + 1) % self.images.len();
    }

    pub fn show_previous(&mut self) {
        if self.images.is_empty() {
            return;
        }
        let len = self.images.len();
        self.current = (self.current + len - 1) % len;
    }

    /// Keys only act while the lightbox is open. Returns whether it did.
    pub fn handle_key(&mut self, key: LightboxKey) -> bool {
        if !self.open {
            return false;
        }
        match key {
            LightboxKey::Escape => self.close(),
            LightboxKey::ArrowLeft => self.show_previous(),
            LightboxKey::ArrowRight => self.show_next(),
        }
        true
    }

    /// Neighbours worth fetching ahead of time: `[previous, next]`.
    pub fn preload_indices(&self) -> Vec<usize> {
        let len = self.images.len();
        if len == 0 {
            return Vec::new();
        }
        vec![(self.current + len - 1) % len, (self.current + 1) % len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lightbox(n: usize) -> Lightbox {
        Lightbox::new(
            (0..n)
                .map(|i| GalleryImage {
                    src: format!("img{}.jpg", i),
                    caption: format!("Photo {}", i),
                })
                .collect(),
        )
    }

    #[test]
    fn test_open_and_navigate() {
        let mut lb = lightbox(3);
        assert_eq!(lb.open(2).unwrap().caption, "Photo 2");
        assert!(lb.scroll_locked());

        lb.show_next();
        assert_eq!(lb.current_index(), 0);
        lb.show_previous();
        assert_eq!(lb.current_index(), 2);
        assert_eq!(lb.preload_indices(), vec![1, 0]);
    }

    #[test]
    fn test_keys_ignored_while_closed() {
        let mut lb = lightbox(3);
        assert!(!lb.handle_key(LightboxKey::ArrowRight));
        assert_eq!(lb.current_index(), 0);

        lb.open(0);
        assert!(lb.handle_key(LightboxKey::ArrowRight));
        assert_eq!(lb.current_index(), 1);
        assert!(lb.handle_key(LightboxKey::Escape));
        assert!(!lb.is_open());
        assert!(!lb.scroll_locked());
    }

    #[test]
    fn test_empty_gallery() {
        let mut lb = lightbox(0);
        assert!(lb.open(0).is_none());
        lb.show_next();
        lb.show_previous();
        assert!(lb.preload_indices().is_empty());
        assert!(!lb.is_open());
    }

    #[test]
    fn test_key_names() {
        assert_eq!(LightboxKey::from_name("Escape"), Some(LightboxKey::Escape));
        assert_eq!(LightboxKey::from_name("left"), Some(LightboxKey::ArrowLeft));
        assert_eq!(LightboxKey::from_name("Enter"), None);
    }
}
