use bytes::Bytes;

use crate::models::Attachment;

use super::error::ApiError;

#[derive(Debug, Clone)]
pub enum PartValue {
    Text(String),
    File(Attachment),
}

#[derive(Debug, Clone)]
pub struct FormPart {
    pub name: String,
    pub value: PartValue,
}

/// Transport-independent multipart form.
#[derive(Debug, Clone, Default)]
pub struct Form {
    parts: Vec<FormPart>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.parts.push(FormPart {
            name: name.to_string(),
            value: PartValue::Text(value.into()),
        });
        self
    }

    pub fn file(mut self, name: &str, attachment: Attachment) -> Self {
        self.parts.push(FormPart {
            name: name.to_string(),
            value: PartValue::File(attachment),
        });
        self
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|p| match &p.value {
            PartValue::Text(v) if p.name == name => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn file_value(&self, name: &str) -> Option<&Attachment> {
        self.parts.iter().find_map(|p| match &p.value {
            PartValue::File(a) if p.name == name => Some(a),
            _ => None,
        })
    }

    pub fn into_reqwest(self) -> Result<reqwest::multipart::Form, ApiError> {
        let mut form = reqwest::multipart::Form::new();
        for part in self.parts {
            form = match part.value {
                PartValue::Text(value) => form.text(part.name, value),
                PartValue::File(file) => {
                    let data: Bytes = file.data;
                    let body = reqwest::multipart::Part::bytes(data.to_vec())
                        .file_name(file.file_name)
                        .mime_str(&file.mime_type)
                        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
                    form.part(part.name, body)
                }
            };
        }
        Ok(form)
    }
}
