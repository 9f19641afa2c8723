//! Request adaptation: urlencoded bodies and query strings to domain inputs.

use serde::Deserialize;
use thiserror::Error;

use super::models::BookInput;
use super::search::SearchQuery;

/// Value an HTML checkbox submits when ticked.
const CHECKBOX_ON: &str = "on";

/// Interpret an HTML checkbox field. Only the literal `on` counts as ticked;
/// an absent field or any other value is unticked.
pub fn checkbox_checked(value: Option<&str>) -> bool {
    value == Some(CHECKBOX_ON)
}

/// Body of the add and edit forms.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub isbn: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub available: Option<String>,
}

impl BookForm {
    /// Title and author must be present once surrounding whitespace is ignored.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();
        if self.title.trim().is_empty() {
            errors.push(FieldError::required("title"));
        }
        if self.author.trim().is_empty() {
            errors.push(FieldError::required("author"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { errors })
        }
    }

    pub fn into_input(self) -> BookInput {
        BookInput {
            available: checkbox_checked(self.available.as_deref()),
            title: self.title,
            author: self.author,
            isbn: self.isbn,
            genre: self.genre,
        }
    }
}

/// Query string of `GET /search`. A missing `q` searches for the empty string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

impl From<SearchParams> for SearchQuery {
    fn from(params: SearchParams) -> Self {
        SearchQuery::new(params.q)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} {message}")]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn required(field: &'static str) -> Self {
        Self {
            field,
            message: "is required".to_string(),
        }
    }
}

/// Input rejected before it reaches the repository.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid book: {}", join_errors(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// One human-readable line per offending field.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(available: Option<&str>) -> BookForm {
        BookForm {
            title: "Dune".to_string(),
            author: "Herbert".to_string(),
            available: available.map(str::to_string),
            ..BookForm::default()
        }
    }

    #[test]
    fn only_on_ticks_the_checkbox() {
        assert!(checkbox_checked(Some("on")));
        assert!(!checkbox_checked(None));
        for other in ["", "off", "true", "ON", "1", " on"] {
            assert!(!checkbox_checked(Some(other)), "value {other:?}");
        }
    }

    #[test]
    fn into_input_coerces_availability() {
        assert!(form(Some("on")).into_input().available);
        assert!(!form(None).into_input().available);
        assert!(!form(Some("yes")).into_input().available);
    }

    #[test]
    fn into_input_keeps_text_untouched() {
        let input = BookForm {
            title: "  Emma ".to_string(),
            author: "Austen".to_string(),
            isbn: "".to_string(),
            genre: "Romance".to_string(),
            available: None,
        }
        .into_input();

        assert_eq!(input, BookInput::new("  Emma ", "Austen").genre("Romance"));
    }

    #[test]
    fn blank_title_and_author_are_rejected() {
        let err = BookForm {
            title: "   ".to_string(),
            ..BookForm::default()
        }
        .validate()
        .unwrap_err();

        assert_eq!(
            err.messages(),
            vec!["title is required", "author is required"]
        );
        assert_eq!(
            err.to_string(),
            "invalid book: title is required, author is required"
        );
    }

    #[test]
    fn complete_form_is_valid() {
        assert!(form(None).validate().is_ok());
    }

    #[test]
    fn missing_query_param_is_empty_search() {
        let query: SearchQuery = SearchParams::default().into();
        assert_eq!(query.text, "");
    }
}
