use keepsake_core::gallery::LightboxKey;
use keepsake_core::preferences::{Language, Theme};

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Empty,
    Ask(String),
    Play,
    Pause,
    Toggle,
    Next,
    Prev,
    /// Normalized to 0.0..=1.0.
    Volume(f32),
    Theme(Theme),
    Lang(Language),
    Slide(SlideAction),
    Hover(bool),
    Gallery(GalleryAction),
    Scroll(f64),
    Copy(usize),
    Like(usize),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideAction {
    Next,
    Prev,
    Show,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryAction {
    Open(usize),
    Next,
    Prev,
    Close,
    Key(LightboxKey),
}

pub const HELP: &str = "\
commands:
  ask <text>            ask about the story (plain text works too)
  play | pause | toggle | next | prev
  volume <0-100>
  theme <light|dark|red|aqua>    lang <en|ur>
  slide <next|prev|show>         hover <on|off>
  gallery <open N|next|prev|close|key NAME>
  scroll <px>           copy <N>    like <N>
  status | help | quit";

impl ShellCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Self::Empty);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let cmd = match word.to_lowercase().as_str() {
            "ask" if !rest.is_empty() => Self::Ask(rest.to_string()),
            "ask" => return Err("usage: ask <text>".into()),
            "play" => Self::Play,
            "pause" => Self::Pause,
            "toggle" => Self::Toggle,
            "next" => Self::Next,
            "prev" | "previous" => Self::Prev,
            "volume" | "vol" => {
                let percent: f32 = rest
                    .parse()
                    .map_err(|_| "usage: volume <0-100>".to_string())?;
                if !(0.0..=100.0).contains(&percent) {
                    return Err("volume must be between 0 and 100".into());
                }
                Self::Volume(percent / 100.0)
            }
            "theme" => Self::Theme(rest.parse()?),
            "lang" | "language" => Self::Lang(rest.parse()?),
            "slide" => Self::Slide(match rest {
                "next" => SlideAction::Next,
                "prev" => SlideAction::Prev,
                "" | "show" => SlideAction::Show,
                _ => return Err("usage: slide <next|prev|show>".into()),
            }),
            "hover" => Self::Hover(match rest {
                "on" => true,
                "off" => false,
                _ => return Err("usage: hover <on|off>".into()),
            }),
            "gallery" => Self::Gallery(parse_gallery(rest)?),
            "scroll" => Self::Scroll(
                rest.parse()
                    .map_err(|_| "usage: scroll <px>".to_string())?,
            ),
            "copy" => Self::Copy(parse_index(rest, "copy")?),
            "like" => Self::Like(parse_index(rest, "like")?),
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => Self::Ask(line.to_string()),
        };
        Ok(cmd)
    }
}

fn parse_gallery(rest: &str) -> Result<GalleryAction, String> {
    let (action, arg) = match rest.split_once(char::is_whitespace) {
        Some((action, arg)) => (action, arg.trim()),
        None => (rest, ""),
    };
    match action {
        "open" => Ok(GalleryAction::Open(parse_index(arg, "gallery open")?)),
        "next" => Ok(GalleryAction::Next),
        "prev" => Ok(GalleryAction::Prev),
        "close" => Ok(GalleryAction::Close),
        "key" => LightboxKey::from_name(arg)
            .map(GalleryAction::Key)
            .ok_or_else(|| "keys: Escape, ArrowLeft, ArrowRight".to_string()),
        _ => Err("usage: gallery <open N|next|prev|close|key NAME>".into()),
    }
}

/// Commands count from 1 on screen; indices are 0-based internally.
fn parse_index(arg: &str, usage: &str) -> Result<usize, String> {
    match arg.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("usage: {} <N>", usage)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_question() {
        assert_eq!(
            ShellCommand::parse("tell me about their dream").unwrap(),
            ShellCommand::Ask("tell me about their dream".into())
        );
        assert_eq!(
            ShellCommand::parse("ask   how did they meet ").unwrap(),
            ShellCommand::Ask("how did they meet".into())
        );
        assert_eq!(ShellCommand::parse("   ").unwrap(), ShellCommand::Empty);
        assert!(ShellCommand::parse("ask").is_err());
    }

    #[test]
    fn test_player_commands() {
        assert_eq!(ShellCommand::parse("NEXT").unwrap(), ShellCommand::Next);
        assert_eq!(ShellCommand::parse("volume 75").unwrap(), ShellCommand::Volume(0.75));
        assert!(ShellCommand::parse("volume 150").is_err());
        assert!(ShellCommand::parse("volume loud").is_err());
    }

    #[test]
    fn test_page_commands() {
        assert_eq!(
            ShellCommand::parse("theme aqua").unwrap(),
            ShellCommand::Theme(Theme::Aqua)
        );
        assert_eq!(
            ShellCommand::parse("lang ur").unwrap(),
            ShellCommand::Lang(Language::Ur)
        );
        assert!(ShellCommand::parse("theme neon").is_err());
        assert_eq!(
            ShellCommand::parse("gallery open 2").unwrap(),
            ShellCommand::Gallery(GalleryAction::Open(1))
        );
        assert_eq!(
            ShellCommand::parse("gallery key Escape").unwrap(),
            ShellCommand::Gallery(GalleryAction::Key(LightboxKey::Escape))
        );
        assert!(ShellCommand::parse("gallery open 0").is_err());
        assert_eq!(ShellCommand::parse("slide").unwrap(), ShellCommand::Slide(SlideAction::Show));
        assert_eq!(ShellCommand::parse("scroll 420").unwrap(), ShellCommand::Scroll(420.0));
        assert_eq!(ShellCommand::parse("copy 1").unwrap(), ShellCommand::Copy(0));
    }
}
