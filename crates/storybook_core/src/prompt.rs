//! crates/storybook_core/src/prompt.rs
//!
//! Pure prompt construction: maps a story request onto the instruction
//! strings sent to the text and image models. The per-level table is the
//! single source of truth for vocabulary, sentence length, page count,
//! and illustration style.

use crate::domain::ReadingLevel;

/// The literal token the text model is instructed to place between pages.
/// The page parser splits on exactly this string.
pub const PAGE_DELIMITER: &str = "---PAGE---";

/// Guidance attached to one grade band.
#[derive(Debug, Clone, Copy)]
pub struct ReadingLevelProfile {
    /// Display name, e.g. "1st Grade (Ages 6-7)".
    pub name: &'static str,
    pub vocabulary_guidance: &'static str,
    pub sentence_guidance: &'static str,
    pub suggested_pages: u32,
    /// Art direction handed to the image model for this band.
    pub art_style: &'static str,
}

/// Profile lookup for a reading level.
pub fn level_profile(level: ReadingLevel) -> &'static ReadingLevelProfile {
    match level {
        ReadingLevel::Kindergarten => &ReadingLevelProfile {
            name: "Kindergarten (Ages 4-6)",
            vocabulary_guidance:
                "Use only simple sight words and very basic vocabulary that a 5-year-old would understand",
            sentence_guidance: "Keep sentences very short, 3-6 words each",
            suggested_pages: 8,
            art_style:
                "bright, colorful, simple shapes, friendly cartoon style, very playful and whimsical",
        },
        ReadingLevel::Grade1 => &ReadingLevelProfile {
            name: "1st Grade (Ages 6-7)",
            vocabulary_guidance: "Use basic vocabulary with simple phonetic words",
            sentence_guidance: "Keep sentences short, 5-8 words each",
            suggested_pages: 10,
            art_style: "warm watercolor illustration, friendly characters, soft colors, storybook style",
        },
        ReadingLevel::Grade2 => &ReadingLevelProfile {
            name: "2nd Grade (Ages 7-8)",
            vocabulary_guidance: "Use expanding vocabulary with some descriptive words",
            sentence_guidance: "Sentences can be 6-10 words",
            suggested_pages: 10,
            art_style: "vibrant digital illustration, expressive characters, dynamic scenes",
        },
        ReadingLevel::Grade3 => &ReadingLevelProfile {
            name: "3rd Grade (Ages 8-9)",
            vocabulary_guidance: "Use grade-level vocabulary with more complex words",
            sentence_guidance: "Sentences can be 8-12 words with varied structure",
            suggested_pages: 12,
            art_style: "detailed storybook illustration, rich colors, engaging compositions",
        },
        ReadingLevel::Grade4 => &ReadingLevelProfile {
            name: "4th Grade (Ages 9-10)",
            vocabulary_guidance: "Use more sophisticated vocabulary and descriptive language",
            sentence_guidance: "Sentences can be 10-15 words with compound structures",
            suggested_pages: 12,
            art_style: "polished book illustration, realistic yet stylized, atmospheric lighting",
        },
        ReadingLevel::Grade5 => &ReadingLevelProfile {
            name: "5th Grade (Ages 10-11)",
            vocabulary_guidance: "Use advanced vocabulary appropriate for pre-teens",
            sentence_guidance: "Sentences can be 12-18 words with complex structures",
            suggested_pages: 14,
            art_style: "sophisticated children's book art, detailed environments, expressive characters",
        },
    }
}

/// Builds the full-story instruction prompt. The formatting rules require the
/// model to separate pages with [`PAGE_DELIMITER`] and emit nothing but the
/// story text itself.
pub fn build_story_prompt(title: &str, outline: &str, level: ReadingLevel) -> String {
    let profile = level_profile(level);

    format!(
        r#"You are a children's book author. Write a complete story based on the following information.

TITLE: {title}

STORY OUTLINE:
{outline}

REQUIREMENTS:
- Reading level: {name}
- Vocabulary: {vocabulary}
- Sentence length: {sentences}
- Target length: {pages} pages (one paragraph per page)

CRITICAL FORMATTING RULES:
- Write exactly one paragraph per page
- Each paragraph should describe a single scene or moment
- Separate each page with the exact text "{delimiter}" on its own line
- Do NOT include page numbers
- Do NOT include any markdown formatting
- Do NOT include the title in the output
- Write ONLY the story text, nothing else

EXAMPLE OUTPUT FORMAT:
Once upon a time, there was a little rabbit named Lily who loved to explore the forest.
{delimiter}
One sunny morning, Lily hopped out of her cozy burrow and looked around with excitement.
{delimiter}
She saw a beautiful butterfly with rainbow wings dancing in the air.

BEGIN STORY:"#,
        title = title,
        outline = outline,
        name = profile.name,
        vocabulary = profile.vocabulary_guidance,
        sentences = profile.sentence_guidance,
        pages = profile.suggested_pages,
        delimiter = PAGE_DELIMITER,
    )
}

/// Builds the illustration prompt for a single page. The hard constraints
/// (no embedded text, child-appropriate, landscape) are non-negotiable for
/// every level; only the art style varies.
pub fn build_image_prompt(
    page_text: &str,
    story_title: &str,
    level: ReadingLevel,
    page_number: u32,
) -> String {
    let profile = level_profile(level);

    format!(
        r#"Create a beautiful children's book illustration for a story titled "{title}".

This is page {page_number} of the story. The page text reads:
"{page_text}"

Art Style: {style}

Requirements:
- Create a scene that captures the key moment or emotion from this page text
- Child-friendly and age-appropriate for {name} readers
- DO NOT include any text, words, letters, or numbers in the image
- Focus on the main characters and action described in the text
- Use bright, engaging colors that appeal to young readers
- The illustration should be warm and inviting
- Horizontal/landscape orientation suitable for a book page
- No scary, violent, or inappropriate content"#,
        title = story_title,
        page_number = page_number,
        page_text = page_text,
        style = profile.art_style,
        name = profile.name,
    )
}
