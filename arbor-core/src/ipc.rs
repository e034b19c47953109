use serde::{Deserialize, Serialize};

use crate::models::{
    AutoLinkRequest, BranchFilter, BranchPatch, CreateBranch, FragmentFilters, FragmentPatch,
    NewFragment, VisualizationRequest,
};

pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Every request except `ping`/`health` is scoped to an `owner`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ArborRequest {
    Ping,
    Health,
    CreateFragment {
        owner: String,
        fragment: NewFragment,
    },
    GetFragment {
        owner: String,
        id: String,
    },
    ListFragments {
        owner: String,
        #[serde(default)]
        filters: FragmentFilters,
    },
    UpdateFragment {
        owner: String,
        id: String,
        patch: FragmentPatch,
    },
    DeleteFragment {
        owner: String,
        id: String,
    },
    CreateBranch {
        owner: String,
        branch: CreateBranch,
    },
    GetBranch {
        owner: String,
        id: String,
    },
    ListBranches {
        owner: String,
        #[serde(default)]
        filter: BranchFilter,
    },
    UpdateBranch {
        owner: String,
        id: String,
        patch: BranchPatch,
    },
    DeleteBranch {
        owner: String,
        id: String,
    },
    AutoLink {
        owner: String,
        #[serde(default)]
        options: AutoLinkRequest,
    },
    MemoryTree {
        owner: String,
    },
    Visualize {
        owner: String,
        #[serde(default)]
        request: VisualizationRequest,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ArborResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    /// Machine-readable error kind (`not_found`, `invalid_input`, ...)
    #[serde(default)]
    pub code: Option<String>,
    pub version: String,
}

impl ArborResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            code: None,
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            code: None,
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn from_error(error: &crate::error::ArborError) -> Self {
        Self {
            code: Some(error.code().to_string()),
            ..Self::err(error.to_string())
        }
    }

    pub fn pong() -> Self {
        Self::ok(serde_json::json!({"pong": true}))
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}
