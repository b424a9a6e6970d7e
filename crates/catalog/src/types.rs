//! Listing payloads.

use platup_transport::{ApiError, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version reported for applications whose payload omits one.
pub const DEFAULT_APP_VERSION: &str = "1.0.0";

/// An organization the user belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OrganizationPayload")]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An application hosted under an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ApplicationPayload")]
pub struct Application {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
}

// Wire forms. Records may carry `id`, `_id` or both, ids may be numbers,
// and any field may be `null`.

#[derive(Deserialize)]
struct OrganizationPayload {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default, rename = "_id")]
    object_id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct ApplicationPayload {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default, rename = "_id")]
    object_id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

impl From<OrganizationPayload> for Organization {
    fn from(p: OrganizationPayload) -> Self {
        Self {
            id: pick_id(p.id, p.object_id),
            name: p.name.unwrap_or_default(),
            description: p.description,
        }
    }
}

impl From<ApplicationPayload> for Application {
    fn from(p: ApplicationPayload) -> Self {
        Self {
            id: pick_id(p.id, p.object_id),
            name: p.name.unwrap_or_default(),
            description: p.description.unwrap_or_default(),
            version: p
                .version
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_APP_VERSION.to_string()),
        }
    }
}

/// First usable id, `id` before `_id`. Empty when neither is present.
fn pick_id(id: Option<Value>, object_id: Option<Value>) -> String {
    [id, object_id]
        .into_iter()
        .flatten()
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

/// Shapes the server has been seen to wrap lists in.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Bare(Vec<T>),
    Items { items: Vec<T> },
    Organizations { organizations: Vec<T> },
    Applications { applications: Vec<T> },
    Data { data: Vec<T> },
}

impl<T> ListBody<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Bare(v)
            | Self::Items { items: v }
            | Self::Organizations { organizations: v }
            | Self::Applications { applications: v }
            | Self::Data { data: v } => v,
        }
    }
}

/// Parses a list response into a vector, whatever its wrapper.
///
/// Server order is preserved.
pub fn normalize_list<T: DeserializeOwned>(resp: &Response) -> Result<Vec<T>, ApiError> {
    resp.json::<ListBody<T>>()
        .map(ListBody::into_vec)
        .map_err(|e| match e {
            ApiError::Parse { status, body, .. } => ApiError::Parse {
                status,
                reason: "expected a list or an object wrapping one".into(),
                body,
            },
            other => other,
        })
}
