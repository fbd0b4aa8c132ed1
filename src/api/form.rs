// Form extractor - one shape for multipart, urlencoded and JSON bodies

use axum::{
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde_json::Value;
use std::collections::HashMap;

use crate::{error::AppError, infrastructure::blob_store::Upload};

fn malformed(detail: impl std::fmt::Display) -> AppError {
    tracing::debug!("Rejected request body: {}", detail);
    AppError::BadRequest("Malformed request body".to_string())
}

/// Text fields and uploaded files of a request body.
///
/// Text values are trimmed, and empty strings read as absent, so
/// `text("bio")` is `None` both for a missing and a blank field.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, Upload>,
}

impl FormData {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into().trim().to_string()))
                .collect(),
            files: HashMap::new(),
        }
    }

    fn from_json(value: Value) -> Result<Self, AppError> {
        let Value::Object(map) = value else {
            return Err(malformed("JSON body is not an object"));
        };

        let pairs = map.into_iter().map(|(key, value)| {
            let text = match value {
                Value::Null => String::new(),
                Value::String(s) => s,
                Value::Bool(b) => b.to_string(),
                other => other.to_string(),
            };
            (key, text)
        });
        Ok(Self::from_pairs(pairs))
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            match field.file_name().map(str::to_owned) {
                // A file input left empty still sends a part with no name.
                Some(file_name) if !file_name.is_empty() => {
                    let content_type = field.content_type().map(str::to_owned);
                    let bytes = field.bytes().await.map_err(malformed)?;
                    form.files.insert(
                        name,
                        Upload {
                            file_name,
                            content_type,
                            bytes: bytes.to_vec(),
                        },
                    );
                }
                Some(_) => {}
                None => {
                    let text = field.text().await.map_err(malformed)?;
                    form.fields.insert(name, text.trim().to_string());
                }
            }
        }
        Ok(form)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// True when the key was sent at all, even blank.
    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn take_file(&mut self, key: &str) -> Option<Upload> {
        self.files.remove(key)
    }
}

impl<S> FromRequest<S> for FormData
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state).await.map_err(malformed)?;
            Self::from_multipart(multipart).await
        } else if content_type.starts_with("application/json") {
            let Json(value) = Json::<Value>::from_request(req, state)
                .await
                .map_err(malformed)?;
            Self::from_json(value)
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(malformed)?;
            Ok(Self::from_pairs(pairs))
        } else {
            Ok(Self::default())
        }
    }
}
