//! crates/storybook_core/src/parser.rs
//!
//! Splits raw model output into ordered page texts.

use crate::prompt::PAGE_DELIMITER;

/// Splits a raw model response on every literal page delimiter, trims each
/// segment, and drops the empty ones. Deliberately permissive: a response
/// with no delimiter at all is a single page, and a trailing delimiter does
/// not produce an empty tail page.
///
/// An empty result means the response had no usable content; callers must
/// treat that as a generation failure rather than create a zero-page story.
pub fn parse_story_pages(raw_response: &str) -> Vec<String> {
    raw_response
        .split(PAGE_DELIMITER)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_every_delimiter() {
        assert_eq!(
            parse_story_pages("A---PAGE---B---PAGE---C"),
            vec!["A", "B", "C"]
        );
    }

    #[test]
    fn blank_input_yields_no_pages() {
        assert_eq!(parse_story_pages("   "), Vec::<String>::new());
        assert_eq!(parse_story_pages(""), Vec::<String>::new());
    }

    #[test]
    fn no_delimiter_is_a_single_page() {
        assert_eq!(parse_story_pages("only one page"), vec!["only one page"]);
    }

    #[test]
    fn trailing_delimiter_drops_the_empty_tail() {
        assert_eq!(parse_story_pages("A---PAGE---"), vec!["A"]);
    }

    #[test]
    fn segments_are_trimmed() {
        let raw = "  The fox woke up.  \n---PAGE---\n  She found a red leaf.  \n";
        assert_eq!(
            parse_story_pages(raw),
            vec!["The fox woke up.", "She found a red leaf."]
        );
    }

    #[test]
    fn consecutive_delimiters_produce_no_blank_pages() {
        assert_eq!(
            parse_story_pages("A---PAGE------PAGE---B"),
            vec!["A", "B"]
        );
    }
}
