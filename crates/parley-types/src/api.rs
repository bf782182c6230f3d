use serde::{Deserialize, Serialize};

// -- Users --

/// Full user row as stored. The login response returns this verbatim,
/// plaintext password included; clients depend on the shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub profile_pic: Option<String>,
    pub usb_key: Option<String>,
}

// -- Auth --

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RegisterResponse {
    pub fn ok() -> Self {
        Self { success: true, message: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, message: Some(message.into()) }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Client asserts the second-factor key is plugged in.
    #[serde(default)]
    pub usb_present: bool,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LoginResponse {
    pub fn ok(user: User) -> Self {
        Self { success: true, user: Some(user), message: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, user: None, message: Some(message.into()) }
    }
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub sender: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageRecord {
    pub id: i64,
    pub sender: String,
    pub message: String,
    pub timestamp: String,
}

// -- Generic failure envelope --

/// Body for store-level failures surfaced to the client. Details stay in
/// the server logs.
#[derive(Debug, Serialize)]
pub struct ApiFailure {
    pub success: bool,
    pub message: String,
}

impl ApiFailure {
    pub fn server_error() -> Self {
        Self { success: false, message: "server error".into() }
    }
}
