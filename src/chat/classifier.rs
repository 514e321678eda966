//! Best-effort intent classification for the send path.

use once_cell::sync::Lazy;
use regex::Regex;

/// An action verb followed (anywhere later in the input) by a media noun.
static IMAGE_REQUEST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(generate|create|draw|make|show)\b.*\b(image|picture|photo|illustration)\b")
        .expect("valid pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    ImageGeneration,
    Conversational,
}

/// One-shot heuristic. False negatives fall through to conversation;
/// false positives route an ordinary question to image generation.
pub fn classify(input: &str) -> Intent {
    if IMAGE_REQUEST.is_match(input) {
        Intent::ImageGeneration
    } else {
        Intent::Conversational
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_then_noun_is_image_request() {
        assert_eq!(classify("generate an image of a cat"), Intent::ImageGeneration);
        assert_eq!(classify("Could you DRAW me a nice PICTURE?"), Intent::ImageGeneration);
        assert_eq!(
            classify("draw something, anything really, as long as it is a picture"),
            Intent::ImageGeneration
        );
    }

    #[test]
    fn test_verb_without_media_noun_is_conversational() {
        assert_eq!(classify("generate a report about cats"), Intent::Conversational);
        assert_eq!(classify("make me a sandwich"), Intent::Conversational);
    }

    #[test]
    fn test_noun_before_verb_is_conversational() {
        assert_eq!(
            classify("the image quality you generate reports about"),
            Intent::Conversational
        );
    }

    #[test]
    fn test_substrings_do_not_match() {
        // "imagery" and "showing" only match on word boundaries.
        assert_eq!(classify("showcase the imagery"), Intent::Conversational);
    }
}
