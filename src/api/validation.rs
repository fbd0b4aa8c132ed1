// Request validation - field rules that collect every failure before rejecting

use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;

use crate::error::{AppError, AppResult, FieldErrors};
use crate::infrastructure::blob_store::{Upload, UploadKind};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .expect("email regex is valid")
});

/// "first_name" -> "first name"
fn label(field: &str) -> String {
    field.replace('_', " ")
}

pub fn is_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

/// Accumulates field errors; [`Rules::finish`] turns them into a 422.
#[derive(Debug, Default)]
pub struct Rules {
    errors: FieldErrors,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required<'a>(&mut self, field: &str, value: Option<&'a str>) -> Option<&'a str> {
        if value.is_none() {
            self.errors
                .add(field, format!("The {} field is required.", label(field)));
        }
        value
    }

    pub fn max_chars(&mut self, field: &str, value: Option<&str>, max: usize) {
        if value.is_some_and(|v| v.chars().count() > max) {
            self.errors.add(
                field,
                format!("The {} may not be greater than {} characters.", label(field), max),
            );
        }
    }

    pub fn min_chars(&mut self, field: &str, value: Option<&str>, min: usize) {
        if value.is_some_and(|v| v.chars().count() < min) {
            self.errors.add(
                field,
                format!("The {} must be at least {} characters.", label(field), min),
            );
        }
    }

    pub fn email(&mut self, field: &str, value: Option<&str>) {
        if value.is_some_and(|v| !is_email(v)) {
            self.errors.add(
                field,
                format!("The {} must be a valid email address.", label(field)),
            );
        }
    }

    /// `<field>_confirmation` must repeat the value.
    pub fn confirmed(&mut self, field: &str, value: Option<&str>, confirmation: Option<&str>) {
        if value.is_some() && value != confirmation {
            self.errors.add(
                field,
                format!("The {} confirmation does not match.", label(field)),
            );
        }
    }

    pub fn different(&mut self, field: &str, value: Option<&str>, other_field: &str, other: Option<&str>) {
        if value.is_some() && value == other {
            self.errors.add(
                field,
                format!(
                    "The {} and {} must be different.",
                    label(field),
                    label(other_field)
                ),
            );
        }
    }

    /// Parse into one of a closed set of values.
    pub fn one_of<T: FromStr>(&mut self, field: &str, value: Option<&str>) -> Option<T> {
        let value = value?;
        match value.parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                self.errors
                    .add(field, format!("The selected {} is invalid.", label(field)));
                None
            }
        }
    }

    pub fn boolean(&mut self, field: &str, value: Option<&str>) -> Option<bool> {
        match value? {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => {
                self.errors.add(
                    field,
                    format!("The {} field must be true or false.", label(field)),
                );
                None
            }
        }
    }

    /// Record an error produced elsewhere, e.g. by upload checks.
    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.into_entries() {
            for message in messages {
                self.errors.add(&field, message);
            }
        }
    }

    /// Type and size checks for an optional upload.
    pub fn upload(&mut self, upload: Option<&Upload>, kind: UploadKind) -> AppResult<()> {
        match upload.map(|upload| upload.validate(kind)) {
            Some(Err(AppError::Validation(errors))) => {
                self.merge(errors);
                Ok(())
            }
            Some(Err(other)) => Err(other),
            Some(Ok(_)) | None => Ok(()),
        }
    }

    pub fn finish(self) -> AppResult<()> {
        self.errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Visibility;

    #[test]
    fn test_email_shapes() {
        assert!(is_email("ada@example.com"));
        assert!(is_email("a.b+tag@mail.example.org"));
        assert!(!is_email("ada@"));
        assert!(!is_email("not an email"));
        assert!(!is_email("ada@localhost"));
    }

    #[test]
    fn test_rules_collect_all_failures() {
        let mut rules = Rules::new();
        rules.required("first_name", None);
        let password = rules.required("password", Some("short"));
        rules.min_chars("password", password, 8);
        rules.confirmed("password", password, Some("other"));
        let visibility: Option<Visibility> = rules.one_of("post_visibility", Some("friends"));
        assert!(visibility.is_none());

        match rules.finish() {
            Err(AppError::Validation(errors)) => {
                assert_eq!(
                    errors.get("first_name").unwrap()[0],
                    "The first name field is required."
                );
                assert_eq!(errors.get("password").unwrap().len(), 2);
                assert_eq!(
                    errors.get("post_visibility").unwrap()[0],
                    "The selected post visibility is invalid."
                );
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_boolean_and_different() {
        let mut rules = Rules::new();
        assert_eq!(rules.boolean("like", Some("0")), Some(false));
        assert_eq!(rules.boolean("like", Some("true")), Some(true));
        assert_eq!(rules.boolean("like", None), None);
        rules.different("password", Some("same"), "old_password", Some("other"));
        assert!(rules.finish().is_ok());

        let mut rules = Rules::new();
        rules.boolean("follow", Some("yes"));
        rules.different("password", Some("same"), "old_password", Some("same"));
        assert!(rules.finish().is_err());
    }

    #[test]
    fn test_upload_errors_join_field_errors() {
        let mut rules = Rules::new();
        let avatar = Upload {
            file_name: "me.gif".to_string(),
            content_type: None,
            bytes: vec![0; 4],
        };
        rules.upload(Some(&avatar), UploadKind::ProfilePicture).unwrap();
        rules.upload(None, UploadKind::CoverPhoto).unwrap();

        match rules.finish() {
            Err(AppError::Validation(errors)) => {
                assert!(errors.get("profile_picture").is_some());
                assert!(errors.get("cover_photo").is_none());
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
