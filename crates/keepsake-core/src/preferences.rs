use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::storage::{KeyValueStore, StorageError, KEY_LANGUAGE, KEY_THEME};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Red,
    Aqua,
}

/// Colors handed to the background particle effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticlePalette {
    pub particle: &'static str,
    pub line: &'static str,
}

impl Theme {
    pub const ALL: [Theme; 4] = [Theme::Light, Theme::Dark, Theme::Red, Theme::Aqua];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::Red => "red",
            Self::Aqua => "aqua",
        }
    }

    pub fn palette(&self) -> ParticlePalette {
        match self {
            Self::Light => ParticlePalette {
                particle: "#6a11cb",
                line: "#2575fc",
            },
            Self::Dark => ParticlePalette {
                particle: "#bb86fc",
                line: "#bb86fc",
            },
            Self::Red => ParticlePalette {
                particle: "#ff414d",
                line: "#ff414d",
            },
            Self::Aqua => ParticlePalette {
                particle: "#07DEE6",
                line: "#07DEE6",
            },
        }
    }

    fn from_system(prefers_dark: bool) -> Self {
        if prefers_dark {
            Self::Dark
        } else {
            Self::Light
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown theme: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ur,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDirection {
    Ltr,
    Rtl,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ur => "ur",
        }
    }

    pub fn direction(&self) -> TextDirection {
        match self {
            Self::En => TextDirection::Ltr,
            Self::Ur => TextDirection::Rtl,
        }
    }

    pub fn font_stack(&self) -> &'static str {
        match self {
            Self::En => "'Poppins', sans-serif",
            Self::Ur => "'Noto Nastaliq Urdu', 'Poppins', sans-serif",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" => Ok(Self::En),
            "ur" => Ok(Self::Ur),
            other => Err(format!("unknown language: {}", other)),
        }
    }
}

/// Theme and language choices shared by the whole page.
pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
    theme: Theme,
    language: Language,
}

impl Preferences {
    /// A saved theme wins over the system preference. The system-derived
    /// theme is applied but not saved, so later system changes still apply.
    pub fn load(store: Arc<dyn KeyValueStore>, prefers_dark: bool) -> Self {
        let theme = store
            .get(KEY_THEME)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_else(|| Theme::from_system(prefers_dark));
        let language = store
            .get(KEY_LANGUAGE)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default();
        Self {
            store,
            theme,
            language,
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<(), StorageError> {
        self.theme = theme;
        self.store.set(KEY_THEME, theme.as_str())
    }

    pub fn set_language(&mut self, language: Language) -> Result<(), StorageError> {
        self.language = language;
        self.store.set(KEY_LANGUAGE, language.code())
    }

    /// Follow the system color scheme unless the user picked a theme.
    /// Returns whether the theme changed.
    pub fn on_system_theme_change(&mut self, prefers_dark: bool) -> bool {
        if self.store.get(KEY_THEME).is_some() {
            return false;
        }
        let theme = Theme::from_system(prefers_dark);
        let changed = theme != self.theme;
        self.theme = theme;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_system_preference_is_applied_but_not_saved() {
        let store = Arc::new(MemoryStore::new());
        let mut prefs = Preferences::load(store.clone(), true);
        assert_eq!(prefs.theme(), Theme::Dark);
        assert_eq!(store.get(KEY_THEME), None);

        assert!(prefs.on_system_theme_change(false));
        assert_eq!(prefs.theme(), Theme::Light);
    }

    #[test]
    fn test_explicit_theme_is_saved_and_pins_theme() {
        let store = Arc::new(MemoryStore::new());
        let mut prefs = Preferences::load(store.clone(), false);
        prefs.set_theme(Theme::Aqua).unwrap();
        assert_eq!(store.get(KEY_THEME).as_deref(), Some("aqua"));

        assert!(!prefs.on_system_theme_change(true));
        assert_eq!(prefs.theme(), Theme::Aqua);

        let reloaded = Preferences::load(store, true);
        assert_eq!(reloaded.theme(), Theme::Aqua);
    }

    #[test]
    fn test_language_defaults_to_english_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let mut prefs = Preferences::load(store.clone(), false);
        assert_eq!(prefs.language(), Language::En);
        assert_eq!(prefs.language().direction(), TextDirection::Ltr);

        prefs.set_language(Language::Ur).unwrap();
        let reloaded = Preferences::load(store, false);
        assert_eq!(reloaded.language(), Language::Ur);
        assert_eq!(reloaded.language().direction(), TextDirection::Rtl);
        assert!(reloaded.language().font_stack().starts_with("'Noto Nastaliq Urdu'"));
    }

    #[test]
    fn test_unknown_saved_values_fall_back() {
        let store = Arc::new(MemoryStore::new());
        store.set(KEY_THEME, "neon").unwrap();
        store.set(KEY_LANGUAGE, "fr").unwrap();
        let prefs = Preferences::load(store, false);
        assert_eq!(prefs.theme(), Theme::Light);
        assert_eq!(prefs.language(), Language::En);
    }

    #[test]
    fn test_palettes() {
        assert_eq!(Theme::Light.palette().line, "#2575fc");
        assert_eq!(Theme::Aqua.palette().particle, "#07DEE6");
        assert_eq!("RED".parse::<Theme>().unwrap(), Theme::Red);
        assert!("".parse::<Theme>().is_err());
    }
}
