use serde::{Deserialize, Serialize};

/// Hearts spawned when a verse becomes liked.
pub const HEART_BURST: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verse {
    #[serde(default)]
    pub title: String,
    pub lines: Vec<String>,
    #[serde(skip)]
    pub liked: bool,
}

impl Verse {
    pub fn new(title: impl Into<String>, lines: &[&str]) -> Self {
        Self {
            title: title.into(),
            lines: lines.iter().map(|l| l.to_string()).collect(),
            liked: false,
        }
    }

    /// Text placed on the clipboard: one line per paragraph, trimmed.
    pub fn clipboard_text(&self) -> String {
        let mut text = String::new();
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text.trim().to_string()
    }

    /// Flip the liked state. Returns the number of hearts to burst, which
    /// is zero when un-liking.
    pub fn toggle_like(&mut self) -> usize {
        self.liked = !self.liked;
        if self.liked {
            HEART_BURST
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clipboard_text_joins_lines() {
        let verse = Verse::new(
            "Brontë",
            &["  Whatever our souls are made of,", "his and mine are the same.  "],
        );
        assert_eq!(
            verse.clipboard_text(),
            "Whatever our souls are made of,\nhis and mine are the same."
        );
        assert_eq!(Verse::new("empty", &[]).clipboard_text(), "");
    }

    #[test]
    fn test_like_toggles_with_burst() {
        let mut verse = Verse::new("v", &["line"]);
        assert_eq!(verse.toggle_like(), HEART_BURST);
        assert!(verse.liked);
        assert_eq!(verse.toggle_like(), 0);
        assert!(!verse.liked);
    }
}
