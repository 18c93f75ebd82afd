//! Request and response bodies of the auth endpoints.

use serde::{Deserialize, Serialize};

/// Token pair minted by login, signup and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: i64,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn signup_omits_absent_department() {
        let body = serde_json::to_value(SignupRequest {
            email: "a@b.io".into(),
            password: "pw".into(),
            full_name: "A B".into(),
            department: None,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({ "email": "a@b.io", "password": "pw", "full_name": "A B" })
        );
    }

    #[test]
    fn token_response_defaults() {
        let tokens: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r"
        }))
        .unwrap();
        assert_eq!(tokens.token_type, "bearer");
        assert_eq!(tokens.expires_in, 0);
    }
}
