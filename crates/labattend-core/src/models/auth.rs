use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::de::{self, KeyGroup};

const USER_KEYS: &[KeyGroup] = &[("id", &["_id"])];
const LOGIN_KEYS: &[KeyGroup] = &[("token", &["accessToken"])];

/// The authenticated admin account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", rename_all = "camelCase")]
pub struct AuthUser {
    #[serde(deserialize_with = "de::string_or_number")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub nama: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl<'de> Deserialize<'de> for AuthUser {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        de::with_aliases(deserializer, USER_KEYS, |value| AuthUser::deserialize(value))
    }
}

impl Serialize for AuthUser {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        AuthUser::serialize(self, serializer)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(remote = "Self", rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

impl<'de> Deserialize<'de> for LoginResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        de::with_aliases(deserializer, LOGIN_KEYS, |value| LoginResponse::deserialize(value))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nama: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}
