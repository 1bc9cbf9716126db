use thiserror::Error;
use url::Url;

use crate::models::UNKNOWN_AUTHOR;

pub const TITLE_MAX_CHARS: usize = 255;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;

/// Story validation failures, ordered by rule priority. The enum
/// messages are the user-facing strings returned by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Title is required")]
    MissingTitle,
    #[error("URL is required")]
    MissingUrl,
    #[error("Invalid URL format")]
    InvalidUrl,
    #[error("Category is required")]
    MissingCategory,
    #[error("Title must be 255 characters or fewer")]
    TitleTooLong,
    #[error("Description must be 1000 characters or fewer")]
    DescriptionTooLong,
}

/// A story that has passed field validation and is ready to persist.
/// Construction trims every field, applies the author sentinel, and
/// drops empty optionals to NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryDraft {
    pub title: String,
    pub url: String,
    pub category: String,
    pub author: String,
    pub description: Option<String>,
    pub publication_month: Option<i32>,
    pub publication_year: Option<i32>,
}

impl StoryDraft {
    pub fn new(
        title: &str,
        url: &str,
        category: &str,
        author: Option<&str>,
        description: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let title = title.trim();
        let url = url.trim();
        let category = category.trim();
        let author = author.map(str::trim).filter(|a| !a.is_empty());
        let description = description.map(str::trim).filter(|d| !d.is_empty());

        if let Some(violation) = violations(title, url, category, description).into_iter().next() {
            return Err(violation);
        }

        Ok(StoryDraft {
            title: title.to_string(),
            url: url.to_string(),
            category: category.to_string(),
            author: author.unwrap_or(UNKNOWN_AUTHOR).to_string(),
            description: description.map(str::to_string),
            publication_month: None,
            publication_year: None,
        })
    }

    pub fn with_publication(mut self, month: Option<i32>, year: Option<i32>) -> Self {
        self.publication_month = month;
        self.publication_year = year;
        self
    }
}

/// Evaluates every rule against already-trimmed input and returns all
/// violations in priority order; callers that want a single message
/// take the first.
pub fn violations(
    title: &str,
    url: &str,
    category: &str,
    description: Option<&str>,
) -> Vec<ValidationError> {
    let mut found = Vec::new();

    if title.is_empty() {
        found.push(ValidationError::MissingTitle);
    }
    if url.is_empty() {
        found.push(ValidationError::MissingUrl);
    } else if Url::parse(url).is_err() {
        found.push(ValidationError::InvalidUrl);
    }
    if category.is_empty() {
        found.push(ValidationError::MissingCategory);
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        found.push(ValidationError::TitleTooLong);
    }
    if let Some(description) = description {
        if description.chars().count() > DESCRIPTION_MAX_CHARS {
            found.push(ValidationError::DescriptionTooLong);
        }
    }

    found
}
