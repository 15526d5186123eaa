use serde::Serialize;

pub const HTTP_VERSION: &str = "HTTP/1.1";

/// A single-entry HAR log, `{log: {entries: [{request}]}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Har {
    log: HarLog,
}

impl Har {
    pub fn new(request: HarRequest) -> Self {
        Self {
            log: HarLog {
                entries: vec![HarEntry { request }],
            },
        }
    }

    /// The request of the log's only entry.
    pub fn request(&self) -> &HarRequest {
        &self.log.entries[0].request
    }

    pub fn entries(&self) -> &[HarEntry] {
        &self.log.entries
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarLog {
    pub entries: Vec<HarEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarEntry {
    pub request: HarRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarRequest {
    pub method: String,
    pub url: String,
    pub http_version: String,
    pub cookies: Vec<HarParam>,
    pub headers: Vec<HarParam>,
    pub query_string: Vec<HarParam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_data: Option<PostData>,
    pub headers_size: i64,
    pub body_size: i64,
}

impl HarRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            http_version: String::from(HTTP_VERSION),
            cookies: vec![],
            headers: vec![],
            query_string: vec![],
            post_data: None,
            headers_size: 0,
            body_size: 0,
        }
    }
}

/// A `{name, value}` pair, optionally carrying file metadata for multipart parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarParam {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl HarParam {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            file_name: None,
            content_type: None,
        }
    }

    pub(crate) fn with_metadata(mut self, metadata: Option<&FileMetadata>) -> Self {
        if let Some(metadata) = metadata {
            self.file_name = metadata.file_name.clone();
            self.content_type = metadata.content_type.clone();
        }
        self
    }
}

/// File name and content type recovered from an uploaded data URL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileMetadata {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostData {
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<HarParam>>,
}

impl PostData {
    pub fn text(mime_type: impl Into<String>, text: Option<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            text,
            params: None,
        }
    }

    pub fn params(mime_type: impl Into<String>, params: Vec<HarParam>) -> Self {
        Self {
            mime_type: mime_type.into(),
            text: None,
            params: Some(params),
        }
    }

    /// Neither text nor params were produced.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.params.is_none()
    }
}

#[cfg(test)]
mod test {
    use crate::types::har::{Har, HarParam, HarRequest, PostData};
    use serde_json::json;

    #[test]
    fn test_har_serializes_with_camel_case_and_without_post_data() {
        let mut request = HarRequest::new("GET", "https://example.com/pets");
        request.query_string.push(HarParam::new("limit", "10"));
        let har = Har::new(request);
        assert_eq!(har.entries().len(), 1);
        assert_eq!(har.request().url, "https://example.com/pets");
        let serialized = serde_json::to_value(&har).unwrap();
        assert_eq!(
            serialized,
            json!({
                "log": {
                    "entries": [{
                        "request": {
                            "method": "GET",
                            "url": "https://example.com/pets",
                            "httpVersion": "HTTP/1.1",
                            "cookies": [],
                            "headers": [],
                            "queryString": [{"name": "limit", "value": "10"}],
                            "headersSize": 0,
                            "bodySize": 0
                        }
                    }]
                }
            })
        );
    }

    #[test]
    fn test_post_data_serializes_params_with_file_metadata() {
        let mut param = HarParam::new("file", "data:text/plain;name=a.txt;base64,YQ==");
        param.file_name = Some("a.txt".to_string());
        param.content_type = Some("text/plain".to_string());
        let post_data = PostData::params("multipart/form-data", vec![param]);
        let serialized = serde_json::to_value(&post_data).unwrap();
        assert_eq!(
            serialized,
            json!({
                "mimeType": "multipart/form-data",
                "params": [{
                    "name": "file",
                    "value": "data:text/plain;name=a.txt;base64,YQ==",
                    "fileName": "a.txt",
                    "contentType": "text/plain"
                }]
            })
        );
    }
}
