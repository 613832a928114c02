use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::Multipart;
use axum::http::StatusCode;
use bytes::Bytes;

/// Multipart body split into text fields and file fields.
#[derive(Debug, Default)]
pub struct MultipartForm {
    texts: HashMap<String, String>,
    files: HashMap<String, Bytes>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, StatusCode> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|_| StatusCode::BAD_REQUEST)?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if field.file_name().is_some() {
                let data = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                form.files.insert(name, data);
            } else {
                let value = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                form.texts.insert(name, value);
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.texts.get(name).map(String::as_str)
    }

    pub fn require_text(&self, name: &str) -> Result<&str, StatusCode> {
        self.text(name).ok_or(StatusCode::BAD_REQUEST)
    }

    /// Parse an optional text field; a present but malformed value is a 400.
    pub fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>, StatusCode> {
        self.text(name)
            .map(|raw| raw.trim().parse().map_err(|_| StatusCode::BAD_REQUEST))
            .transpose()
    }

    pub fn require<T: FromStr>(&self, name: &str) -> Result<T, StatusCode> {
        self.parse(name)?.ok_or(StatusCode::BAD_REQUEST)
    }

    pub fn take_file(&mut self, name: &str) -> Option<Bytes> {
        self.files.remove(name)
    }

    pub fn require_file(&mut self, name: &str) -> Result<Bytes, StatusCode> {
        self.take_file(name).ok_or(StatusCode::BAD_REQUEST)
    }
}
