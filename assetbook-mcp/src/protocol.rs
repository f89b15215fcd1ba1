//! JSON-RPC framing and method dispatch

use assetbook::{Assetbook, RunPreview};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};

pub const PROTOCOL_VERSION: &str = "2025-11-25";
const SERVER_NAME: &str = "assetbook";

/// Previews kept for `apply_run`; the oldest is dropped beyond this
pub const MAX_STORED_PREVIEWS: usize = 16;

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

#[derive(Debug, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    pub id: Option<JsonValue>,
    pub method: String,
    #[serde(default)]
    pub params: Option<JsonValue>,
}

#[derive(Debug, Serialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

impl McpResponse {
    fn reply(id: Option<JsonValue>, result: Result<JsonValue, McpError>) -> Self {
        match result {
            Ok(r) => Self { jsonrpc: "2.0".to_string(), id, result: Some(r), error: None },
            Err(e) => Self { jsonrpc: "2.0".to_string(), id, result: None, error: Some(e) },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct McpError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
}

impl McpError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    pub fn with_data(mut self, data: JsonValue) -> Self {
        self.data = Some(data);
        self
    }
}

/// Server state: the engine plus previews waiting to be applied
pub struct Server {
    pub(crate) book: Assetbook,
    previews: HashMap<String, RunPreview>,
    /// Stored preview ids, oldest first
    preview_order: VecDeque<String>,
    next_preview: u64,
}

impl Server {
    pub fn new(book: Assetbook) -> Self {
        Self { book, previews: HashMap::new(), preview_order: VecDeque::new(), next_preview: 1 }
    }

    /// Keep a preview for a later `apply_run`, evicting the oldest when full
    pub(crate) fn store_preview(&mut self, preview: RunPreview) -> String {
        let id = format!("preview-{}", self.next_preview);
        self.next_preview += 1;
        self.previews.insert(id.clone(), preview);
        self.preview_order.push_back(id.clone());

        while self.preview_order.len() > MAX_STORED_PREVIEWS {
            if let Some(oldest) = self.preview_order.pop_front() {
                self.previews.remove(&oldest);
                debug!(preview_id = %oldest, "Evicted stored preview");
            }
        }
        id
    }

    /// Remove and return a stored preview
    pub(crate) fn take_preview(&mut self, id: &str) -> Option<RunPreview> {
        let preview = self.previews.remove(id)?;
        self.preview_order.retain(|stored| stored != id);
        Some(preview)
    }

    /// Handle one input line. `None` for notifications.
    pub async fn handle_line(&mut self, line: &str) -> Option<McpResponse> {
        let request: McpRequest = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                warn!("Error parsing request: {}", e);
                return Some(McpResponse::reply(
                    None,
                    Err(McpError::new(PARSE_ERROR, format!("Parse error: {}", e))),
                ));
            }
        };

        debug!(method = %request.method, "Processing");
        let response = self.handle_request(&request).await;

        if request.id.is_none() {
            debug!(method = %request.method, "Notification processed (no response)");
            return None;
        }
        Some(response)
    }

    pub async fn handle_request(&mut self, request: &McpRequest) -> McpResponse {
        if request.jsonrpc != "2.0" {
            return McpResponse::reply(
                request.id.clone(),
                Err(McpError::new(INVALID_REQUEST, format!("Unsupported jsonrpc version: {}", request.jsonrpc))),
            );
        }

        let result = match request.method.as_str() {
            // Lifecycle
            "initialize" => handle_initialize(&request.params),
            "initialized" | "notifications/initialized" => Ok(json!({})),
            "ping" => Ok(json!({})),

            // Tools
            "tools/list" => Ok(tools_list()),
            "tools/call" => self.handle_tool_call(&request.params).await,

            _ => Err(McpError::new(METHOD_NOT_FOUND, format!("Method not found: {}", request.method))),
        };

        McpResponse::reply(request.id.clone(), result)
    }

    async fn handle_tool_call(&mut self, params: &Option<JsonValue>) -> Result<JsonValue, McpError> {
        let params = params.as_ref().ok_or_else(|| McpError::invalid_params("Missing params"))?;

        let name = params
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| McpError::invalid_params("Missing tool name"))?;

        let args = params.get("arguments").cloned().unwrap_or(json!({}));
        if !args.is_object() {
            return Err(McpError::invalid_params("Tool arguments must be an object"));
        }

        self.call_tool(name, &args).await
    }
}

fn handle_initialize(params: &Option<JsonValue>) -> Result<JsonValue, McpError> {
    let client_info = params
        .as_ref()
        .and_then(|p| p.get("clientInfo"))
        .and_then(|c| c.get("name"))
        .and_then(|n| n.as_str())
        .unwrap_or("unknown");

    // Echo the client's protocol version
    let client_protocol = params
        .as_ref()
        .and_then(|p| p.get("protocolVersion"))
        .and_then(|v| v.as_str())
        .unwrap_or(PROTOCOL_VERSION);

    info!(client = client_info, protocol = client_protocol, "Client connected");

    Ok(json!({
        "protocolVersion": client_protocol,
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Monthly straight-line depreciation over a fixed-asset register"
        },
        "capabilities": {
            "tools": {
                "listChanged": false
            }
        },
        "instructions": "Always call preview_run first and show the operator every asset with its outcome. Only call apply_run with that previewId after the operator confirms."
    }))
}

fn tools_list() -> JsonValue {
    json!({
        "tools": [
            {
                "name": "preview_run",
                "description": "Classify every in-service asset for a month without writing anything. Returns a previewId for apply_run.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "month": {
                            "type": "string",
                            "description": "Reference month YYYY-MM (default: current month)"
                        },
                        "useAcquisitionMonth": {
                            "type": "boolean",
                            "description": "Start depreciating in the in-service month instead of the month after"
                        }
                    }
                }
            },
            {
                "name": "apply_run",
                "description": "Commit a stored preview as one batch. Each preview can be applied once; only the most recent previews are kept.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "previewId": {
                            "type": "string",
                            "description": "Id returned by preview_run"
                        }
                    },
                    "required": ["previewId"]
                }
            },
            {
                "name": "asset_schedule",
                "description": "Month-by-month depreciation plan of one asset, with months already run marked.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "assetId": { "type": "string" },
                        "basis": {
                            "type": "string",
                            "enum": ["fiscal", "corporate"],
                            "description": "Useful-life track (default: fiscal)"
                        }
                    },
                    "required": ["assetId"]
                }
            },
            {
                "name": "reset_asset",
                "description": "Set accumulated depreciation to zero and clear the last run date.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "assetId": { "type": "string" }
                    },
                    "required": ["assetId"]
                }
            },
            {
                "name": "set_depreciation_status",
                "description": "Pause or resume depreciation runs for one asset.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "assetId": { "type": "string" },
                        "status": {
                            "type": "string",
                            "enum": ["active", "paused", "toggle"]
                        }
                    },
                    "required": ["assetId", "status"]
                }
            },
            {
                "name": "yearly_summary",
                "description": "Depreciation per class and month for a calendar year.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "year": { "type": "integer" },
                        "basis": { "type": "string", "enum": ["fiscal", "corporate"] },
                        "view": {
                            "type": "string",
                            "enum": ["realized", "projected"],
                            "description": "realized: only months covered by runs (default); projected: the full plan"
                        }
                    },
                    "required": ["year"]
                }
            },
            {
                "name": "class_positions",
                "description": "Cost, accumulated depreciation and net value per asset class as of a month.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "basis": { "type": "string", "enum": ["fiscal", "corporate"] },
                        "month": {
                            "type": "string",
                            "description": "Reference month YYYY-MM (default: current month)"
                        }
                    }
                }
            }
        ]
    })
}
