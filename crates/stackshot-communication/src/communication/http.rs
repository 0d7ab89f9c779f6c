//! HTTP transport to the camera
//!
//! Each request carries a short connect and read timeout so that a camera
//! that dropped off the network produces a bounded failure instead of a hang.

use crate::firmware::ccapi::{ErrorMessage, BUSY_STATUS, OK_STATUS};
use serde::de::DeserializeOwned;
use serde_json::Value;
use stackshot_core::{CameraError, Error, Result};
use std::fmt;
use std::time::Duration;

/// HTTP verbs used by the camera API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Read a resource
    Get,
    /// Command a resource
    Post,
    /// Remove a resource
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Delete => write!(f, "DELETE"),
        }
    }
}

/// One request against a camera resource
#[derive(Debug, Clone, PartialEq)]
pub struct CameraRequest {
    /// HTTP verb
    pub method: HttpMethod,
    /// Resource path relative to the base URL (query string included)
    pub resource: String,
    /// JSON body for POST requests
    pub body: Option<Value>,
}

impl CameraRequest {
    /// GET request
    pub fn get(resource: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            resource: resource.into(),
            body: None,
        }
    }

    /// POST request with a JSON body
    pub fn post(resource: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            resource: resource.into(),
            body: Some(body),
        }
    }

    /// DELETE request
    pub fn delete(resource: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Delete,
            resource: resource.into(),
            body: None,
        }
    }
}

/// Status and raw body of a camera response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: Vec<u8>,
}

impl CameraResponse {
    /// Create a response
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Request accepted
    pub fn is_success(&self) -> bool {
        self.status == OK_STATUS
    }

    /// Device busy with a previous operation
    pub fn is_busy(&self) -> bool {
        self.status == BUSY_STATUS
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Device supplied error message, if the body carries one
    pub fn message(&self) -> Option<String> {
        self.json::<ErrorMessage>().ok().and_then(|m| m.message)
    }
}

/// Request/response transport to the camera
pub trait CameraTransport: Send {
    /// Execute one request
    ///
    /// Returns `Err` only when no HTTP response was obtained at all.
    fn execute(
        &mut self,
        request: &CameraRequest,
    ) -> std::result::Result<CameraResponse, CameraError>;
}

/// Blocking HTTP transport using reqwest
pub struct HttpCameraTransport {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpCameraTransport {
    /// Build a client against `base_url` with bounded timeouts
    pub fn new(base_url: &str, connect_timeout: Duration, read_timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()
            .map_err(|e| Error::other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL all resources are relative to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn classify(resource: &str, err: reqwest::Error) -> CameraError {
        if err.is_timeout() {
            CameraError::Timeout {
                resource: resource.to_string(),
            }
        } else {
            CameraError::Unreachable {
                resource: resource.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

impl CameraTransport for HttpCameraTransport {
    fn execute(
        &mut self,
        request: &CameraRequest,
    ) -> std::result::Result<CameraResponse, CameraError> {
        let url = format!("{}{}", self.base_url, request.resource);
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .map_err(|e| Self::classify(&request.resource, e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| Self::classify(&request.resource, e))?;

        Ok(CameraResponse::new(status, body.to_vec()))
    }
}
