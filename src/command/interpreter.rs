//! Utterance normalization and classification

use serde::{Deserialize, Serialize};

/// Trigger substrings in priority order
pub const TRIGGERS: [(&str, Command); 4] = [
    ("start", Command::Start),
    ("next", Command::Next),
    ("back", Command::Back),
    ("end", Command::End),
];

/// A navigation command selected from an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "slide", rename_all = "snake_case")]
pub enum Command {
    /// Begin the slideshow, attaching first if needed
    Start,
    /// Advance one slide
    Next,
    /// Go back one slide
    Back,
    /// End the slideshow
    End,
    /// Jump to an absolute, 1-based slide index
    GoToSlide(u32),
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Start => write!(f, "start"),
            Command::Next => write!(f, "next"),
            Command::Back => write!(f, "back"),
            Command::End => write!(f, "end"),
            Command::GoToSlide(n) => write!(f, "go to slide {}", n),
        }
    }
}

/// Result of classifying one utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation {
    Command(Command),
    /// The utterance was a number outside `1..=slide_count`
    SlideOutOfRange { slide: i64, slide_count: u32 },
    /// Nothing matched; carries the utterance verbatim
    Unrecognized(String),
}

/// Lower-case a transcript and strip its trailing periods
pub fn normalize(raw: &str) -> String {
    raw.to_lowercase().trim_end_matches('.').to_string()
}

/// Classify a normalized utterance against the current slide count
///
/// Keywords win over numbers: a trigger substring anywhere in the
/// utterance selects that command, the first trigger in [`TRIGGERS`]
/// order when several are present. Only when no trigger matches is the
/// whole trimmed utterance parsed as an integer.
pub fn interpret(utterance: &str, slide_count: u32) -> Interpretation {
    if let Some((_, command)) = TRIGGERS
        .iter()
        .find(|(trigger, _)| utterance.contains(trigger))
    {
        return Interpretation::Command(*command);
    }

    // Numbers beyond 32 bits are not slide numbers at all.
    match utterance.trim().parse::<i32>().map(i64::from) {
        Ok(slide) if slide >= 1 && slide <= i64::from(slide_count) => {
            // Bounded by slide_count, so the narrowing cannot fail.
            Interpretation::Command(Command::GoToSlide(slide as u32))
        }
        Ok(slide) => Interpretation::SlideOutOfRange { slide, slide_count },
        Err(_) => Interpretation::Unrecognized(utterance.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Next."), "next");
        assert_eq!(normalize("Go Back..."), "go back");
        assert_eq!(normalize("12"), "12");
    }

    #[test]
    fn test_keyword_anywhere_in_utterance() {
        assert_eq!(
            interpret("please go back now", 10),
            Interpretation::Command(Command::Back)
        );
        assert_eq!(interpret("next", 10), Interpretation::Command(Command::Next));
        assert_eq!(
            interpret("let's start", 0),
            Interpretation::Command(Command::Start)
        );
        assert_eq!(
            interpret("that's the end", 10),
            Interpretation::Command(Command::End)
        );
    }

    #[test]
    fn test_keyword_is_substring_match() {
        // "weekend" contains "end"
        assert_eq!(
            interpret("see you at the weekend", 10),
            Interpretation::Command(Command::End)
        );
        // A trigger beats the trailing number
        assert_eq!(
            interpret("next 5", 10),
            Interpretation::Command(Command::Next)
        );
    }

    #[test]
    fn test_first_trigger_in_priority_order_wins() {
        assert_eq!(
            interpret("go back to start", 10),
            Interpretation::Command(Command::Start)
        );
        assert_eq!(
            interpret("the end, next", 10),
            Interpretation::Command(Command::Next)
        );
    }

    #[test]
    fn test_slide_number_in_range() {
        assert_eq!(
            interpret("5", 10),
            Interpretation::Command(Command::GoToSlide(5))
        );
        assert_eq!(
            interpret(" 10 ", 10),
            Interpretation::Command(Command::GoToSlide(10))
        );
        assert_eq!(
            interpret("1", 1),
            Interpretation::Command(Command::GoToSlide(1))
        );
    }

    #[test]
    fn test_slide_number_out_of_range() {
        assert_eq!(
            interpret("15", 10),
            Interpretation::SlideOutOfRange {
                slide: 15,
                slide_count: 10
            }
        );
        assert_eq!(
            interpret("0", 10),
            Interpretation::SlideOutOfRange {
                slide: 0,
                slide_count: 10
            }
        );
        assert_eq!(
            interpret("-3", 10),
            Interpretation::SlideOutOfRange {
                slide: -3,
                slide_count: 10
            }
        );
        // Nothing attached yet
        assert_eq!(
            interpret("3", 0),
            Interpretation::SlideOutOfRange {
                slide: 3,
                slide_count: 0
            }
        );
    }

    #[test]
    fn test_unrecognized_is_echoed_verbatim() {
        assert_eq!(
            interpret("xyz123abc", 10),
            Interpretation::Unrecognized("xyz123abc".to_string())
        );
        assert_eq!(
            interpret("slide 4", 10),
            Interpretation::Unrecognized("slide 4".to_string())
        );
        assert_eq!(interpret("", 10), Interpretation::Unrecognized(String::new()));
    }

    #[test]
    fn test_number_too_large_is_unrecognized() {
        assert!(matches!(
            interpret("99999999999999999999999", 10),
            Interpretation::Unrecognized(_)
        ));
        assert_eq!(
            interpret("3000000000", 10),
            Interpretation::Unrecognized("3000000000".to_string())
        );
        assert_eq!(
            interpret("2147483647", 10),
            Interpretation::SlideOutOfRange {
                slide: 2_147_483_647,
                slide_count: 10
            }
        );
    }

    #[test]
    fn test_command_serialization() {
        let json = serde_json::to_string(&Command::GoToSlide(3)).unwrap();
        assert!(json.contains("go_to_slide"));
        assert!(json.contains('3'));
    }
}
