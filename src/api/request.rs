use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    #[cfg(test)]
    pub fn is_mutating(self) -> bool {
        !matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        })
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(format!("unsupported method '{other}'")),
        }
    }
}

/// A logical HTTP request: method, path, decoded query string and an
/// optional JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            method,
            path,
            query,
            body: None,
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new(Method::Get, target)
    }

    pub fn post(target: &str, body: Value) -> Self {
        Self::new(Method::Post, target).with_body(body)
    }

    pub fn patch(target: &str, body: Value) -> Self {
        Self::new(Method::Patch, target).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Decodes the body into a typed payload. A missing body reads as `{}`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let body = self.body.clone().unwrap_or_else(|| json!({}));
        serde_json::from_value(body)
            .map_err(|err| ApiError::Validation(format!("Invalid request body: {err}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn json<T: Serialize>(status: u16, body: &T) -> Result<Self, ApiError> {
        Ok(Self {
            status,
            body: serde_json::to_value(body)?,
        })
    }

    pub fn ok<T: Serialize>(body: &T) -> Result<Self, ApiError> {
        Self::json(200, body)
    }

    pub fn created<T: Serialize>(body: &T) -> Result<Self, ApiError> {
        Self::json(201, body)
    }

    pub fn no_content() -> Self {
        Self {
            status: 204,
            body: Value::Null,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The `message` of an error body, if there is one.
    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }
}

fn split_target(target: &str) -> (String, HashMap<String, String>) {
    let (path, query_str) = target.split_once('?').unwrap_or((target, ""));
    let query = url::form_urlencoded::parse(query_str.as_bytes())
        .into_owned()
        .collect();
    (path.to_string(), query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_target_decodes_query() {
        let req = ApiRequest::get("/jobs?search=backend%20dev&page=2&status=");
        assert_eq!(req.path, "/jobs");
        assert_eq!(req.query.get("search").map(String::as_str), Some("backend dev"));
        assert_eq!(req.query.get("page").map(String::as_str), Some("2"));
        assert_eq!(req.query.get("status").map(String::as_str), Some(""));
    }

    #[test]
    fn test_plus_decodes_to_space() {
        let req = ApiRequest::get("/candidates?search=ada+lovelace");
        assert_eq!(req.query["search"], "ada lovelace");
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("patch".parse::<Method>().unwrap(), Method::Patch);
        assert!("TRACE".parse::<Method>().is_err());
        assert!(!Method::Get.is_mutating());
        assert!(Method::Delete.is_mutating());
    }

    #[test]
    fn test_json_body_errors_are_validation() {
        let req = ApiRequest::patch("/jobs/1/reorder", json!({"fromOrder": "x"}));
        let err = req
            .json::<crate::models::ReorderRequest>()
            .unwrap_err();
        assert_eq!(err.status(), 400);
        assert!(err.to_string().starts_with("Invalid request body"));
    }
}
