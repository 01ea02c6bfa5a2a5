/// Request body extractor shared by the form-style endpoints
///
/// Sign-up, sign-in and the profile image upload accept the same fields as
/// JSON, as `application/x-www-form-urlencoded`, or as `multipart/form-data`
/// (the only way to attach a file). [`FormPayload`] reads any of the three
/// into one shape: a map of scalar fields plus the uploaded files.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use serde_json::{Map, Value};

use crate::error::ApiError;

/// One uploaded file from a multipart body
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Form field name
    pub field: String,
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

/// Scalar fields and files of a request body
#[derive(Debug, Clone, Default)]
pub struct FormPayload {
    pub fields: Map<String, Value>,
    pub files: Vec<UploadedFile>,
}

impl FormPayload {
    /// True when `key` was sent, even with an empty value
    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Field as text; numbers and booleans are rendered, `null` is absent
    pub fn text(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Field as trimmed text
    pub fn trimmed(&self, key: &str) -> Option<String> {
        self.text(key).map(|s| s.trim().to_string())
    }

    /// Boolean field: JSON `true`/`false`, or `1`/`0`, `true`/`false`, `on`/`off` as text
    pub fn flag(&self, key: &str) -> Result<Option<bool>, ApiError> {
        match self.fields.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(0) => Ok(Some(false)),
                Some(1) => Ok(Some(true)),
                _ => Err(ApiError::invalid(format!("'{}' must be a boolean", key), key)),
            },
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Some(true)),
                "0" | "false" | "no" | "off" | "" => Ok(Some(false)),
                _ => Err(ApiError::invalid(format!("'{}' must be a boolean", key), key)),
            },
            Some(_) => Err(ApiError::invalid(format!("'{}' must be a boolean", key), key)),
        }
    }

    /// Removes and returns the file uploaded under `field`
    pub fn take_file(&mut self, field: &str) -> Option<UploadedFile> {
        let index = self.files.iter().position(|f| f.field == field)?;
        Some(self.files.remove(index))
    }

    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let fields = pairs
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        Self {
            fields,
            files: Vec::new(),
        }
    }
}

#[async_trait]
impl<S> FromRequest<S> for FormPayload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::InvalidOperator {
                    message: e.body_text(),
                    field: None,
                })?;
            return read_multipart(multipart).await;
        }

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::InvalidOperator {
                message: e.body_text(),
                field: None,
            })?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(FormPayload::default());
        }

        if content_type.starts_with("application/json") {
            return match serde_json::from_slice::<Value>(&body) {
                Ok(Value::Object(fields)) => Ok(FormPayload {
                    fields,
                    files: Vec::new(),
                }),
                Ok(_) => Err(ApiError::InvalidOperator {
                    message: "Expected a JSON object".to_string(),
                    field: None,
                }),
                Err(e) => Err(ApiError::InvalidOperator {
                    message: format!("Malformed JSON: {}", e),
                    field: None,
                }),
            };
        }

        serde_urlencoded::from_bytes::<Vec<(String, String)>>(&body)
            .map(FormPayload::from_pairs)
            .map_err(|e| ApiError::InvalidOperator {
                message: format!("Malformed form body: {}", e),
                field: None,
            })
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<FormPayload, ApiError> {
    let mut payload = FormPayload::default();

    let malformed = |e: axum::extract::multipart::MultipartError| ApiError::InvalidOperator {
        message: e.body_text(),
        field: None,
    };

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();

        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let bytes = field.bytes().await.map_err(malformed)?;
                payload.files.push(UploadedFile {
                    field: name,
                    file_name: Some(file_name),
                    bytes,
                });
            }
            None => {
                let text = field.text().await.map_err(malformed)?;
                payload.fields.insert(name, Value::String(text));
            }
        }
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    async fn extract(content_type: Option<&str>, body: impl Into<Body>) -> Result<FormPayload, ApiError> {
        let mut builder = HttpRequest::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        FormPayload::from_request(builder.body(body.into()).unwrap(), &()).await
    }

    #[tokio::test]
    async fn test_json_body() {
        let payload = extract(
            Some("application/json"),
            r#"{"email": "a@example.com", "all_day": true, "count": 3}"#,
        )
        .await
        .unwrap();

        assert_eq!(payload.text("email").as_deref(), Some("a@example.com"));
        assert_eq!(payload.flag("all_day").unwrap(), Some(true));
        assert_eq!(payload.text("count").as_deref(), Some("3"));
        assert!(payload.files.is_empty());
    }

    #[tokio::test]
    async fn test_json_must_be_object() {
        let result = extract(Some("application/json"), "[1, 2]").await;
        assert!(matches!(result, Err(ApiError::InvalidOperator { .. })));

        let result = extract(Some("application/json"), "{oops").await;
        assert!(matches!(result, Err(ApiError::InvalidOperator { .. })));
    }

    #[tokio::test]
    async fn test_urlencoded_body() {
        let payload = extract(
            Some("application/x-www-form-urlencoded"),
            "email=a%40example.com&first_name=+Ada+&repeat=1",
        )
        .await
        .unwrap();

        assert_eq!(payload.text("email").as_deref(), Some("a@example.com"));
        assert_eq!(payload.trimmed("first_name").as_deref(), Some("Ada"));
        assert_eq!(payload.flag("repeat").unwrap(), Some(true));
        assert!(!payload.has("password"));
    }

    #[tokio::test]
    async fn test_empty_body_is_empty_payload() {
        let payload = extract(None, Body::empty()).await.unwrap();

        assert!(payload.fields.is_empty());
    }

    #[tokio::test]
    async fn test_multipart_body() {
        let body = concat!(
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"email\"\r\n\r\n",
            "a@example.com\r\n",
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"original\"; filename=\"me.png\"\r\n",
            "Content-Type: image/png\r\n\r\n",
            "PNGDATA\r\n",
            "--XBOUNDARY--\r\n",
        );

        let mut payload = extract(Some("multipart/form-data; boundary=XBOUNDARY"), body)
            .await
            .unwrap();

        assert_eq!(payload.text("email").as_deref(), Some("a@example.com"));
        let file = payload.take_file("original").expect("file should be present");
        assert_eq!(file.file_name.as_deref(), Some("me.png"));
        assert_eq!(&file.bytes[..], b"PNGDATA");
        assert!(payload.take_file("original").is_none());
    }

    #[test]
    fn test_flag_rejects_garbage() {
        let mut payload = FormPayload::default();
        payload
            .fields
            .insert("all_day".to_string(), Value::String("sometimes".to_string()));

        assert!(payload.flag("all_day").is_err());
        assert_eq!(payload.flag("missing").unwrap(), None);
    }
}
