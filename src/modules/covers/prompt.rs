//! Prompt construction for the image generator.
//!
//! One template covers every wording variant: `Emphasis` decides how much
//! "do not alter the text" scaffolding surrounds the request, `LayoutBands`
//! decides the vertical split. Title and author are always embedded
//! verbatim.

use std::fmt::Write as _;

use bookcover_kernel::settings::PromptSettings;

pub use bookcover_kernel::settings::Emphasis;

use super::models::CoverRequest;

/// Vertical split of the cover, in percent of its height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutBands {
    pub title: u8,
    pub artwork: u8,
    pub author: u8,
}

impl Default for LayoutBands {
    fn default() -> Self {
        Self {
            title: 20,
            artwork: 60,
            author: 20,
        }
    }
}

/// Portrait proportions every prompt asks for.
pub const ASPECT_RATIO: &str = "6:9";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub emphasis: Emphasis,
    pub bands: LayoutBands,
    pub placeholder_author: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::from(&PromptSettings::default())
    }
}

impl From<&PromptSettings> for PromptTemplate {
    fn from(settings: &PromptSettings) -> Self {
        Self {
            emphasis: settings.emphasis,
            bands: LayoutBands {
                title: settings.title_band_percent,
                artwork: settings.artwork_band_percent,
                author: settings.author_band_percent,
            },
            placeholder_author: settings.placeholder_author.clone(),
        }
    }
}

impl PromptTemplate {
    pub fn with_emphasis(mut self, emphasis: Emphasis) -> Self {
        self.emphasis = emphasis;
        self
    }
}

/// Turns a [`CoverRequest`] into the instruction string sent upstream.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    template: PromptTemplate,
}

impl PromptBuilder {
    pub fn new(template: PromptTemplate) -> Self {
        Self { template }
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Author text as it will appear on the cover.
    pub fn author_text<'a>(&'a self, request: &'a CoverRequest) -> &'a str {
        request
            .author
            .as_deref()
            .unwrap_or(&self.template.placeholder_author)
    }

    pub fn build(&self, request: &CoverRequest) -> String {
        let template = &self.template;
        let title = request.title.as_str();
        let author = self.author_text(request);
        let strict = template.emphasis != Emphasis::Standard;

        let mut out = String::new();

        if strict {
            out.push_str("CRITICAL TEXT TRANSCRIPTION TASK - ZERO ERROR TOLERANCE\n\n");
        } else {
            let _ = writeln!(
                out,
                "Create a professional book cover in {} portrait format.\n",
                ASPECT_RATIO
            );
        }

        if template.emphasis == Emphasis::CharacterMap {
            out.push_str("======= MANDATORY TEXT ANALYSIS =======\n");
            let _ = writeln!(out, "TITLE CHARACTER MAP: {}", character_map(title));
            let _ = writeln!(out, "AUTHOR CHARACTER MAP: {}\n", character_map(author));
        }

        if strict {
            out.push_str("======= ABSOLUTE TEXT REQUIREMENTS =======\n");
            out.push_str("RULE 1: NEVER add letters that don't exist in the original\n");
            out.push_str("RULE 2: NEVER remove letters that exist in the original\n");
            out.push_str("RULE 3: NEVER change any letter to a different letter\n");
            out.push_str("RULE 4: NEVER add decorative symbols, dots, or extra characters\n");
            out.push_str("RULE 5: NEVER use fonts that distort letter shapes\n");
            out.push_str("RULE 6: Count every character - output must match input exactly\n\n");
            out.push_str("======= EXACT TEXT TO DISPLAY =======\n");
            let _ = writeln!(out, "TITLE (copy character-by-character): \"{}\"", title);
            let _ = writeln!(out, "AUTHOR (copy character-by-character): {}\n", author);
            out.push_str("VERIFICATION: Before placing text, confirm:\n");
            let _ = writeln!(out, "- Title has exactly {} characters", title.chars().count());
            let _ = writeln!(out, "- Author has exactly {} characters", author.chars().count());
            out.push_str("- No extra letters, no missing letters, no changed letters\n\n");
            out.push_str("======= STRICT LAYOUT TEMPLATE =======\n");
        } else {
            out.push_str("TEXT TO DISPLAY EXACTLY AS WRITTEN:\n");
            let _ = writeln!(out, "Title: \"{}\"", title);
            let _ = writeln!(out, "Author: {}\n", author);
            out.push_str("LAYOUT:\n");
        }

        let _ = writeln!(
            out,
            "TOP SECTION ({}% of cover): TITLE TEXT ONLY",
            template.bands.title
        );
        out.push_str("- Bold, large, high-contrast lettering centered horizontally\n");
        let _ = writeln!(
            out,
            "MIDDLE SECTION ({}% of cover): ARTWORK/DESIGN",
            template.bands.artwork
        );
        let _ = writeln!(out, "Genre: {}", request.genre);
        for (label, value) in clauses(request) {
            let _ = writeln!(out, "{}: {}", label, value);
        }
        let _ = writeln!(
            out,
            "BOTTOM SECTION ({}% of cover): AUTHOR TEXT ONLY",
            template.bands.author
        );
        out.push_str("- Regular weight, medium size, high-contrast lettering centered horizontally\n");

        if strict {
            out.push_str("\n======= FINAL QUALITY CHECK =======\n");
            let _ = writeln!(
                out,
                "✓ Title displays: \"{}\" ({} chars)",
                title,
                title.chars().count()
            );
            let _ = writeln!(
                out,
                "✓ Author displays: {} ({} chars)",
                author,
                author.chars().count()
            );
            out.push_str("✓ Layout: Title TOP, Author BOTTOM\n");
            out.push_str("✓ No extra characters anywhere in text\n");
            let _ = writeln!(out, "✓ {} portrait book cover format\n", ASPECT_RATIO);
            out.push_str("GENERATE COVER WITH PERFECT TEXT ACCURACY.");
        } else {
            let _ = write!(
                out,
                "\nUse a {} portrait aspect ratio. Reproduce the title and author exactly as written, with no added, missing, or changed characters.",
                ASPECT_RATIO
            );
        }

        out
    }
}

/// Labeled clauses for the optional fields that are present, in form order.
fn clauses(request: &CoverRequest) -> impl Iterator<Item = (&'static str, &str)> {
    [
        ("Mood", request.mood.as_deref()),
        ("Colors", request.colors.as_deref()),
        ("Art Style", request.art_style.as_deref()),
        ("Visual Elements", request.visual_elements.as_deref()),
        ("Target Audience", request.target_audience.as_deref()),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.map(|value| (label, value)))
}

/// `Position 1: "T", Position 2: "h", ...`
fn character_map(text: &str) -> String {
    text.chars()
        .enumerate()
        .map(|(index, ch)| format!("Position {}: \"{}\"", index + 1, ch))
        .collect::<Vec<_>>()
        .join(", ")
}
