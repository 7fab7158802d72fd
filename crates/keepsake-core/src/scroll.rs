//! Scroll-driven page behavior: active nav section, reveal-once animations
//! and the back-to-top button.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Fraction of an element that must be visible before it animates in.
pub const REVEAL_THRESHOLD: f64 = 0.1;
/// Extra look-ahead below the header when picking the active section.
pub const ACTIVE_SECTION_OFFSET: f64 = 50.0;
pub const BACK_TO_TOP_AFTER: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub height: f64,
}

impl Section {
    pub fn new(id: impl Into<String>, height: f64) -> Self {
        Self {
            id: id.into(),
            height,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedSection {
    pub id: String,
    pub top: f64,
    pub height: f64,
}

/// Sections stacked top to bottom in page order.
#[derive(Debug, Clone)]
pub struct PageLayout {
    header_height: f64,
    sections: Vec<PlacedSection>,
}

impl PageLayout {
    pub fn new(header_height: f64, sections: &[Section]) -> Self {
        let mut top = 0.0;
        let sections = sections
            .iter()
            .map(|s| {
                let placed = PlacedSection {
                    id: s.id.clone(),
                    top,
                    height: s.height,
                };
                top += s.height;
                placed
            })
            .collect();
        Self {
            header_height,
            sections,
        }
    }

    pub fn sections(&self) -> &[PlacedSection] {
        &self.sections
    }

    pub fn active_section(&self, scroll_y: f64) -> Option<&str> {
        active_section(&self.sections, scroll_y, self.header_height)
    }

    /// Visible fraction of `section` for a viewport starting at `scroll_y`.
    pub fn visible_ratio(section: &PlacedSection, scroll_y: f64, viewport_height: f64) -> f64 {
        if section.height <= 0.0 {
            return 0.0;
        }
        let top = section.top.max(scroll_y);
        let bottom = (section.top + section.height).min(scroll_y + viewport_height);
        ((bottom - top).max(0.0) / section.height).min(1.0)
    }
}

/// The last section whose span contains the probe point
/// `scroll_y + header_height + ACTIVE_SECTION_OFFSET`.
pub fn active_section(
    sections: &[PlacedSection],
    scroll_y: f64,
    header_height: f64,
) -> Option<&str> {
    let position = scroll_y + header_height + ACTIVE_SECTION_OFFSET;
    sections
        .iter()
        .rev()
        .find(|s| position >= s.top && position < s.top + s.height)
        .map(|s| s.id.as_str())
}

pub fn back_to_top_visible(scroll_y: f64) -> bool {
    scroll_y > BACK_TO_TOP_AFTER
}

/// Tracks which elements have already played their entrance animation.
#[derive(Debug, Clone, Default)]
pub struct RevealTracker {
    revealed: BTreeSet<String>,
}

impl RevealTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true exactly once per element: the first time it is at least
    /// `REVEAL_THRESHOLD` visible. Afterwards the element is no longer watched.
    pub fn observe(&mut self, id: &str, visible_ratio: f64) -> bool {
        if visible_ratio < REVEAL_THRESHOLD || self.revealed.contains(id) {
            return false;
        }
        self.revealed.insert(id.to_string());
        true
    }

    pub fn is_revealed(&self, id: &str) -> bool {
        self.revealed.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> PageLayout {
        PageLayout::new(
            80.0,
            &[
                Section::new("home", 600.0),
                Section::new("story", 1000.0),
                Section::new("gallery", 400.0),
            ],
        )
    }

    #[test]
    fn test_sections_stack() {
        let l = layout();
        assert_eq!(l.sections()[1].top, 600.0);
        assert_eq!(l.sections()[2].top, 1600.0);
    }

    #[test]
    fn test_active_section_uses_header_offset() {
        let l = layout();
        assert_eq!(l.active_section(0.0), Some("home"));
        // 470 + 80 + 50 = 600 -> start of story
        assert_eq!(l.active_section(469.0), Some("home"));
        assert_eq!(l.active_section(470.0), Some("story"));
        assert_eq!(l.active_section(1500.0), Some("gallery"));
        assert_eq!(l.active_section(5000.0), None);
    }

    #[test]
    fn test_reveal_fires_once_past_threshold() {
        let mut tracker = RevealTracker::new();
        assert!(!tracker.observe("story", 0.05));
        assert!(tracker.observe("story", 0.1));
        assert!(!tracker.observe("story", 1.0));
        assert!(tracker.is_revealed("story"));
    }

    #[test]
    fn test_visible_ratio() {
        let l = layout();
        let story = &l.sections()[1];
        assert_eq!(PageLayout::visible_ratio(story, 0.0, 600.0), 0.0);
        assert_eq!(PageLayout::visible_ratio(story, 0.0, 700.0), 0.1);
        assert_eq!(PageLayout::visible_ratio(story, 600.0, 2000.0), 1.0);
    }

    #[test]
    fn test_back_to_top() {
        assert!(!back_to_top_visible(100.0));
        assert!(back_to_top_visible(100.5));
    }
}
