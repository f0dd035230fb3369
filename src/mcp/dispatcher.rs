use crate::common::errors::AppError;
use crate::common::json::JsonUtil;
use crate::tools;
use serde_json::{json, Value};

pub struct Dispatcher;

impl Dispatcher {
    pub fn dispatch(method: &str, params: Option<Value>) -> Result<Value, AppError> {
        match method {
            // MCP initialization handshake.
            "initialize" => Ok(Self::initialize_result()),
            // Notification can arrive with or without namespace depending on the client.
            "initialized" | "notifications/initialized" => Ok(Value::Null),
            "tools/list" => Ok(Self::tools_list_result()),
            "tools/call" => Self::dispatch_tools_call(params),
            // Keep direct tool-name calls for manual CLI testing and existing tests.
            _ => Self::dispatch_direct_tool(method, params.unwrap_or(Value::Null)),
        }
    }

    fn dispatch_tools_call(params: Option<Value>) -> Result<Value, AppError> {
        let payload = params.ok_or_else(|| AppError::InvalidInput("missing params".to_string()))?;
        let name = payload
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::InvalidInput("missing tool name".to_string()))?;
        let arguments = payload.get("arguments").cloned().unwrap_or(Value::Null);

        let result = Self::dispatch_direct_tool(name, arguments)?;
        let text = JsonUtil::to_pretty_text(&result);

        Ok(json!({
            "content": [
                {
                    "type": "text",
                    "text": text
                }
            ],
            "structuredContent": result,
            "isError": false
        }))
    }

    fn dispatch_direct_tool(tool_name: &str, args: Value) -> Result<Value, AppError> {
        match tool_name {
            "generate_report" => tools::generate_report::handle(args),
            "list_layouts" => tools::list_layouts::handle(args),
            "inspect_template" => tools::inspect_template::handle(args),
            _ => Err(AppError::InvalidInput(format!(
                "unknown method/tool: {tool_name}"
            ))),
        }
    }

    fn initialize_result() -> Value {
        json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": "xlsx-report-mcp",
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    fn tools_list_result() -> Value {
        json!({
            "tools": [
                {
                    "name": "generate_report",
                    "description": "Fill an .xlsx report template and write the result to output_path.",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "layout": Self::layout_selector_schema(),
                            "template_path": {
                                "type": "string",
                                "description": "Template file or name; defaults to the layout's template"
                            },
                            "payload": {
                                "type": "object",
                                "properties": {
                                    "header": { "type": "object" },
                                    "items": { "type": "array", "items": { "type": "object" } },
                                    "footer": { "type": "object" }
                                }
                            },
                            "output_path": { "type": "string" },
                            "overwrite": { "type": "boolean", "default": false }
                        },
                        "required": ["layout", "output_path"]
                    }
                },
                {
                    "name": "list_layouts",
                    "description": "List the built-in report layouts with their item capacity.",
                    "inputSchema": {
                        "type": "object",
                        "properties": {}
                    }
                },
                {
                    "name": "inspect_template",
                    "description": "Describe a template: sheets, merges, drawing anchors and label cells.",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "path": { "type": "string" },
                            "sheet": Self::sheet_selector_schema()
                        },
                        "required": ["path"]
                    }
                }
            ]
        })
    }

    fn layout_selector_schema() -> Value {
        json!({
            "oneOf": [
                {
                    "type": "string",
                    "description": "Built-in layout name, see list_layouts"
                },
                {
                    "type": "object",
                    "description": "Inline layout descriptor",
                    "properties": {
                        "name": { "type": "string" },
                        "template": { "type": "string" },
                        "sheet": {},
                        "item_block": { "type": "object" },
                        "header": { "type": "array" },
                        "footer": { "type": "array" },
                        "shapes": { "type": "array" },
                        "clear_cells": { "type": "array", "items": { "type": "string" } }
                    },
                    "required": ["name", "template"]
                }
            ]
        })
    }

    fn sheet_selector_schema() -> Value {
        json!({
            "oneOf": [
                {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" }
                    },
                    "required": ["name"]
                },
                {
                    "type": "object",
                    "properties": {
                        "index": { "type": "integer", "minimum": 0 }
                    },
                    "required": ["index"]
                },
                {
                    "type": "string",
                    "description": "Sheet name or JSON string like {\"name\":\"Hoja1\"} or {\"index\":0}"
                }
            ]
        })
    }
}
