// src/platforms/mod.rs
//! Target platforms
//!
//! Each platform is data: a [`Flow`] of named steps plus the content it
//! falls back to when generation fails. Adding a platform means adding a
//! module with a `flow()` function and a [`Platform`] variant.

pub mod lumina;
pub mod mednext;

use crate::runtime::flow::{Flow, StepContext};
use crate::target::{TargetError, TargetResponse};
use crate::utils::errors::EngineError;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Session key holding the signed-in user's id
pub const USER_ID: &str = "user_id";

/// Platforms the engine can drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Lumina,
    Mednext,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Lumina, Platform::Mednext];

    /// Label used for agent names, env prefixes and stored runs
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Lumina => "lumina",
            Platform::Mednext => "mednext",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Lumina => "LUMINA",
            Platform::Mednext => "MedNext-Healthcare",
        }
    }

    pub fn flow(&self) -> Flow {
        match self {
            Platform::Lumina => lumina::flow(),
            Platform::Mednext => mednext::flow(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Platform {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lumina" => Ok(Platform::Lumina),
            "mednext" | "mednext-healthcare" => Ok(Platform::Mednext),
            other => Err(EngineError::UnknownPlatform(other.to_string())),
        }
    }
}

/// Sign up, or sign in when the account already exists (409)
///
/// `extra` fields are merged into the signup body.
pub(crate) async fn signup_or_login(
    ctx: &StepContext,
    domain: &str,
    password: &str,
    extra: Value,
) -> Result<Value, TargetError> {
    let email = format!("{}@{}", ctx.agent_name().to_lowercase(), domain);
    let mut body = json!({
        "email": email,
        "password": password,
        "name": ctx.persona().name,
    });
    if let (Some(fields), Value::Object(extra)) = (body.as_object_mut(), extra) {
        fields.extend(extra);
    }

    ctx.log().info(&format!("Attempting signup/login as {}", email));

    let response = match ctx.post("/api/auth/signup", body).await {
        Ok(response) => response,
        Err(err) if err.status == Some(409) => {
            ctx.log().info("Account exists, signing in");
            ctx.post("/api/auth/signin", json!({ "email": email, "password": password }))
                .await?
        }
        Err(err) => return Err(err),
    };

    let user_id = response.str_at("/user/id").map(str::to_string);
    if let Some(id) = &user_id {
        ctx.remember(USER_ID, id.as_str());
    }
    Ok(json!({ "email": email, "userId": user_id }))
}

/// Identifier the service must return at `pointer`
pub(crate) fn required_id(
    response: &TargetResponse,
    pointer: &str,
    endpoint: &str,
) -> Result<String, TargetError> {
    response
        .str_at(pointer)
        .map(str::to_string)
        .ok_or_else(|| {
            TargetError::new(format!("Response has no {}", pointer))
                .with_kind("INVALID_RESPONSE")
                .with_endpoint(endpoint)
        })
}

/// Length of the array at `pointer`, 0 when absent
pub(crate) fn count_at(response: &TargetResponse, pointer: &str) -> usize {
    response
        .body
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}

/// RFC 3339 timestamp one day from now
pub(crate) fn tomorrow() -> String {
    (chrono::Utc::now() + chrono::Duration::days(1)).to_rfc3339()
}
