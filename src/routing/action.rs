//! Action metadata: HTTP verbs, the standard CRUD set, and declared custom actions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[serde(alias = "get")]
    Get,
    #[serde(alias = "post")]
    Post,
    #[serde(alias = "put")]
    Put,
    #[serde(alias = "patch")]
    Patch,
    #[serde(alias = "delete")]
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Methods that carry a request body and may be validate-only.
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }

    pub fn from_http(method: &axum::http::Method) -> Option<Self> {
        method.as_str().parse().ok()
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(format!("unsupported method: {}", other)),
        }
    }
}

/// The six standard operations. Custom actions delegate to one of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardAction {
    List,
    Create,
    Retrieve,
    #[serde(alias = "update")]
    Replace,
    #[serde(alias = "partial_update")]
    Modify,
    Destroy,
}

impl StandardAction {
    pub const ALL: [StandardAction; 6] = [
        StandardAction::List,
        StandardAction::Create,
        StandardAction::Retrieve,
        StandardAction::Replace,
        StandardAction::Modify,
        StandardAction::Destroy,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StandardAction::List => "list",
            StandardAction::Create => "create",
            StandardAction::Retrieve => "retrieve",
            StandardAction::Replace => "replace",
            StandardAction::Modify => "modify",
            StandardAction::Destroy => "destroy",
        }
    }

    pub fn method(&self) -> HttpMethod {
        match self {
            StandardAction::List | StandardAction::Retrieve => HttpMethod::Get,
            StandardAction::Create => HttpMethod::Post,
            StandardAction::Replace => HttpMethod::Put,
            StandardAction::Modify => HttpMethod::Patch,
            StandardAction::Destroy => HttpMethod::Delete,
        }
    }

    pub fn is_detail(&self) -> bool {
        !matches!(self, StandardAction::List | StandardAction::Create)
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self,
            StandardAction::Create | StandardAction::Replace | StandardAction::Modify
        )
    }

    /// Operations a singleton child exposes. Creation and deletion follow the parent.
    pub fn allowed_on_singleton(&self) -> bool {
        matches!(
            self,
            StandardAction::Retrieve | StandardAction::Replace | StandardAction::Modify
        )
    }

    /// Accepts the canonical names plus the `update` / `partial_update` aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "list" => Some(StandardAction::List),
            "create" => Some(StandardAction::Create),
            "retrieve" => Some(StandardAction::Retrieve),
            "replace" | "update" => Some(StandardAction::Replace),
            "modify" | "partial_update" => Some(StandardAction::Modify),
            "destroy" => Some(StandardAction::Destroy),
            _ => None,
        }
    }
}

/// Query stages a custom action runs in addition to the resource defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Ordering,
    BatchGet,
    Search,
    PathVariable,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ActionKind {
    Standard(StandardAction),
    Custom {
        delegate: StandardAction,
        filters: Vec<FilterKind>,
        /// Fields writable through this action; `None` means the resource's writable fields.
        writable_fields: Option<Vec<String>>,
    },
}

/// Static description of one action, built at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct Action {
    pub name: String,
    pub methods: Vec<HttpMethod>,
    pub detail: bool,
    pub custom_method: bool,
    pub url_path: String,
    pub kind: ActionKind,
}

impl Action {
    pub fn standard(action: StandardAction) -> Self {
        Action {
            name: action.name().to_string(),
            methods: vec![action.method()],
            detail: action.is_detail(),
            custom_method: false,
            url_path: String::new(),
            kind: ActionKind::Standard(action),
        }
    }

    /// The standard operation that executes this action.
    pub fn operation(&self) -> StandardAction {
        match &self.kind {
            ActionKind::Standard(a) => *a,
            ActionKind::Custom { delegate, .. } => *delegate,
        }
    }

    pub fn is_standard(&self) -> bool {
        matches!(self.kind, ActionKind::Standard(_))
    }
}
