use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Genres the form accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Genre {
    Fantasy,
    Romance,
    #[serde(rename = "Mystery/Thriller")]
    MysteryThriller,
    #[serde(rename = "Science Fiction")]
    ScienceFiction,
    Horror,
    #[serde(rename = "Literary Fiction")]
    LiteraryFiction,
    #[serde(rename = "Young Adult")]
    YoungAdult,
    #[serde(rename = "Children's")]
    Childrens,
    #[serde(rename = "Non-Fiction")]
    NonFiction,
    Biography,
    #[serde(rename = "Self-Help")]
    SelfHelp,
    Business,
    History,
    Poetry,
    Other,
}

impl Genre {
    pub const ALL: [Genre; 15] = [
        Genre::Fantasy,
        Genre::Romance,
        Genre::MysteryThriller,
        Genre::ScienceFiction,
        Genre::Horror,
        Genre::LiteraryFiction,
        Genre::YoungAdult,
        Genre::Childrens,
        Genre::NonFiction,
        Genre::Biography,
        Genre::SelfHelp,
        Genre::Business,
        Genre::History,
        Genre::Poetry,
        Genre::Other,
    ];

    /// Display name, as shown in the form and written into prompts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Fantasy => "Fantasy",
            Genre::Romance => "Romance",
            Genre::MysteryThriller => "Mystery/Thriller",
            Genre::ScienceFiction => "Science Fiction",
            Genre::Horror => "Horror",
            Genre::LiteraryFiction => "Literary Fiction",
            Genre::YoungAdult => "Young Adult",
            Genre::Childrens => "Children's",
            Genre::NonFiction => "Non-Fiction",
            Genre::Biography => "Biography",
            Genre::SelfHelp => "Self-Help",
            Genre::Business => "Business",
            Genre::History => "History",
            Genre::Poetry => "Poetry",
            Genre::Other => "Other",
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown genre '{0}'")]
pub struct UnknownGenre(pub String);

impl FromStr for Genre {
    type Err = UnknownGenre;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim();
        Genre::ALL
            .into_iter()
            .find(|genre| genre.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownGenre(value.to_string()))
    }
}

/// Mood presets offered next to the free-text field.
pub const MOOD_SUGGESTIONS: [&str; 10] = [
    "Dark & Mysterious",
    "Bright & Uplifting",
    "Romantic & Dreamy",
    "Bold & Dramatic",
    "Minimalist & Clean",
    "Vintage & Classic",
    "Modern & Sleek",
    "Whimsical & Fun",
    "Elegant & Sophisticated",
    "Gritty & Raw",
];

/// Art style presets offered next to the free-text field.
pub const ART_STYLE_SUGGESTIONS: [&str; 12] = [
    "Photorealistic",
    "Digital Art",
    "Watercolor",
    "Oil Painting",
    "Vector Art",
    "Hand-drawn Illustration",
    "Typography-focused",
    "Collage",
    "Minimalist Design",
    "Vintage Poster Style",
    "Comic Book Style",
    "Abstract Art",
];

/// Names one field of the cover form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    Title,
    Author,
    Genre,
    Mood,
    Colors,
    ArtStyle,
    VisualElements,
    TargetAudience,
}

impl FormField {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormField::Title => "title",
            FormField::Author => "author",
            FormField::Genre => "genre",
            FormField::Mood => "mood",
            FormField::Colors => "colors",
            FormField::ArtStyle => "art_style",
            FormField::VisualElements => "visual_elements",
            FormField::TargetAudience => "target_audience",
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormField {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "title" => Ok(FormField::Title),
            "author" => Ok(FormField::Author),
            "genre" => Ok(FormField::Genre),
            "mood" => Ok(FormField::Mood),
            "colors" => Ok(FormField::Colors),
            "art_style" => Ok(FormField::ArtStyle),
            "visual_elements" => Ok(FormField::VisualElements),
            "target_audience" => Ok(FormField::TargetAudience),
            other => Err(format!("unknown form field '{}'", other)),
        }
    }
}

/// Raw form state, exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverForm {
    /// Book title, reproduced character for character on the cover
    pub title: String,
    /// Author name; the placeholder is shown when left empty
    pub author: String,
    /// Genre display name, one of [`Genre::ALL`]
    pub genre: String,
    /// Free-text mood, e.g. one of [`MOOD_SUGGESTIONS`]
    pub mood: String,
    /// Color scheme description
    pub colors: String,
    /// Free-text art style, e.g. one of [`ART_STYLE_SUGGESTIONS`]
    pub art_style: String,
    /// Imagery the artwork should include
    pub visual_elements: String,
    /// Intended readership
    pub target_audience: String,
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoverFormPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    pub mood: Option<String>,
    pub colors: Option<String>,
    pub art_style: Option<String>,
    pub visual_elements: Option<String>,
    pub target_audience: Option<String>,
}

impl CoverForm {
    fn slot(&mut self, field: FormField) -> &mut String {
        match field {
            FormField::Title => &mut self.title,
            FormField::Author => &mut self.author,
            FormField::Genre => &mut self.genre,
            FormField::Mood => &mut self.mood,
            FormField::Colors => &mut self.colors,
            FormField::ArtStyle => &mut self.art_style,
            FormField::VisualElements => &mut self.visual_elements,
            FormField::TargetAudience => &mut self.target_audience,
        }
    }

    pub fn get(&self, field: FormField) -> &str {
        match field {
            FormField::Title => &self.title,
            FormField::Author => &self.author,
            FormField::Genre => &self.genre,
            FormField::Mood => &self.mood,
            FormField::Colors => &self.colors,
            FormField::ArtStyle => &self.art_style,
            FormField::VisualElements => &self.visual_elements,
            FormField::TargetAudience => &self.target_audience,
        }
    }

    pub fn set(&mut self, field: FormField, value: impl Into<String>) {
        *self.slot(field) = value.into();
    }

    pub fn apply(&mut self, patch: CoverFormPatch) {
        let updates = [
            (FormField::Title, patch.title),
            (FormField::Author, patch.author),
            (FormField::Genre, patch.genre),
            (FormField::Mood, patch.mood),
            (FormField::Colors, patch.colors),
            (FormField::ArtStyle, patch.art_style),
            (FormField::VisualElements, patch.visual_elements),
            (FormField::TargetAudience, patch.target_audience),
        ];
        for (field, value) in updates {
            if let Some(value) = value {
                self.set(field, value);
            }
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Validate and freeze the form into a request.
    ///
    /// A title made only of whitespace counts as missing, same as an empty
    /// one, so a cover is never generated with a blank title line.
    pub fn snapshot(&self) -> Result<CoverRequest, ValidationError> {
        let mut issues = Vec::new();

        if is_blank(&self.title) {
            issues.push(FieldIssue::new(FormField::Title, "title is required"));
        }

        let genre = if is_blank(&self.genre) {
            issues.push(FieldIssue::new(FormField::Genre, "genre is required"));
            None
        } else {
            match self.genre.parse::<Genre>() {
                Ok(genre) => Some(genre),
                Err(err) => {
                    issues.push(FieldIssue::new(FormField::Genre, err.to_string()));
                    None
                }
            }
        };

        match genre {
            Some(genre) if issues.is_empty() => Ok(CoverRequest {
                title: self.title.clone(),
                author: optional(&self.author),
                genre,
                mood: optional(&self.mood),
                colors: optional(&self.colors),
                art_style: optional(&self.art_style),
                visual_elements: optional(&self.visual_elements),
                target_audience: optional(&self.target_audience),
            }),
            _ => Err(ValidationError { issues }),
        }
    }

    /// Character counts shown back to the user while typing.
    pub fn echo(&self, placeholder_author: &str) -> TextEcho {
        let author = if is_blank(&self.author) {
            placeholder_author
        } else {
            &self.author
        };
        TextEcho {
            title_chars: self.title.chars().count(),
            author_chars: author.chars().count(),
        }
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn optional(value: &str) -> Option<String> {
    if is_blank(value) {
        None
    } else {
        Some(value.to_string())
    }
}

/// Character counts of the text that will be rendered on the cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextEcho {
    pub title_chars: usize,
    pub author_chars: usize,
}

/// Validated snapshot of the form, read once per generation attempt.
///
/// Obtain one through [`CoverForm::snapshot`]; `title` is non-blank and
/// optional fields are `None` rather than empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverRequest {
    /// Title as typed, never trimmed
    pub title: String,
    /// Author name, `None` when the form left it blank
    pub author: Option<String>,
    /// Parsed genre
    pub genre: Genre,
    /// Mood clause
    pub mood: Option<String>,
    /// Colors clause
    pub colors: Option<String>,
    /// Art style clause
    pub art_style: Option<String>,
    /// Visual elements clause
    pub visual_elements: Option<String>,
    /// Target audience clause
    pub target_audience: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: FormField,
    pub problem: String,
}

impl FieldIssue {
    fn new(field: FormField, problem: impl Into<String>) -> Self {
        Self {
            field,
            problem: problem.into(),
        }
    }
}

/// A required field is missing or unusable; generation must not start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cover request is incomplete: {}", summarize(.issues))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

fn summarize(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.problem.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Opaque locator of a generated image, passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of the latest generation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationResult {
    Image {
        #[serde(rename = "imageUrl")]
        image_url: ImageRef,
    },
    Failed {
        message: String,
    },
}

impl GenerationResult {
    pub fn image(&self) -> Option<&ImageRef> {
        match self {
            GenerationResult::Image { image_url } => Some(image_url),
            GenerationResult::Failed { .. } => None,
        }
    }
}
