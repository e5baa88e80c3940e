use crate::errors::ToolError;
use crate::mcp::catalog::{HttpMethod, OperationDef, ParamDef, ParamKind, Placement, TemplatePart};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::PathBuf;
use url::form_urlencoded::byte_serialize;

/// Transient description of one upstream call. Built fresh per invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub method: HttpMethod,
    /// Endpoint with identifiers substituted, e.g. `get_results_for_case/3/7`.
    pub path: String,
    /// Already-encoded `(key, value)` pairs in declaration order.
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Local file for attachment uploads; such requests carry no JSON body.
    pub attachment: Option<PathBuf>,
}

impl UpstreamRequest {
    /// Path plus filters joined with `&`, ready to append after `?/api/v2/`.
    pub fn endpoint(&self) -> String {
        let mut out = self.path.clone();
        for (key, value) in &self.query {
            out.push('&');
            out.push_str(key);
            out.push('=');
            out.push_str(value);
        }
        out
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Turn an operation descriptor and a loose argument bag into an upstream
/// request. Pure: never touches the network.
pub fn build_request(op: &OperationDef, args: &Value) -> Result<UpstreamRequest, ToolError> {
    let empty = Map::new();
    let args = match args {
        Value::Null => &empty,
        Value::Object(map) => map,
        other => {
            return Err(ToolError::invalid_argument(format!(
                "Arguments for {} must be an object, got {}",
                op.name,
                value_type_name(other)
            )))
        }
    };

    let path = render_path(op, args)?;
    let query = render_query(op, args)?;

    let mut consumed: HashSet<&str> = op
        .params
        .iter()
        .filter(|p| p.placement != Placement::Body)
        .map(|p| p.name.as_str())
        .collect();

    if op.upload {
        let file = present(args, "file_path")
            .ok_or_else(|| ToolError::missing_argument(&op.name, "file_path"))?;
        let file = file
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ToolError::invalid_argument(format!(
                    "Argument 'file_path' for {} must be a non-empty string",
                    op.name
                ))
            })?;
        return Ok(UpstreamRequest {
            method: op.method,
            path,
            query,
            body: None,
            attachment: Some(PathBuf::from(file)),
        });
    }

    let body = match op.method {
        HttpMethod::Get => None,
        HttpMethod::Post => {
            consumed.insert("file_path");
            Some(Value::Object(render_body(op, args, &consumed)?))
        }
    };

    Ok(UpstreamRequest {
        method: op.method,
        path,
        query,
        body,
        attachment: None,
    })
}

/// A key holding JSON `null` counts as absent.
fn present<'a>(args: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    args.get(name).filter(|v| !v.is_null())
}

fn render_path(op: &OperationDef, args: &Map<String, Value>) -> Result<String, ToolError> {
    let mut out = String::with_capacity(op.path.len() + 16);
    for part in op.template_parts() {
        match part {
            TemplatePart::Literal(text) => out.push_str(text),
            TemplatePart::Placeholder(name) => {
                let param = op.param(name).ok_or_else(|| {
                    ToolError::internal(format!(
                        "{}: placeholder '{}' has no declared param",
                        op.name, name
                    ))
                })?;
                match present(args, name) {
                    Some(value) => out.push_str(&render_path_value(op, param, value)?),
                    None if param.required => {
                        return Err(ToolError::missing_argument(&op.name, name))
                    }
                    None => {
                        if out.ends_with('/') {
                            out.pop();
                        }
                    }
                }
            }
        }
    }
    Ok(out)
}

fn render_path_value(op: &OperationDef, param: &ParamDef, value: &Value) -> Result<String, ToolError> {
    match param.kind {
        ParamKind::Integer => integer_text(value).ok_or_else(|| type_mismatch(op, param)),
        ParamKind::String => {
            let text = value.as_str().ok_or_else(|| type_mismatch(op, param))?;
            if text.trim().is_empty() {
                return Err(ToolError::invalid_argument(format!(
                    "Argument '{}' for {} must not be empty",
                    param.name, op.name
                )));
            }
            Ok(encode(text))
        }
        _ => Err(type_mismatch(op, param)),
    }
}

fn render_query(
    op: &OperationDef,
    args: &Map<String, Value>,
) -> Result<Vec<(String, String)>, ToolError> {
    let mut query = Vec::new();
    for param in op.params_in(Placement::Query) {
        let Some(value) = present(args, &param.name) else {
            continue;
        };
        let rendered = match param.kind {
            ParamKind::Integer => Some(integer_text(value).ok_or_else(|| type_mismatch(op, param))?),
            ParamKind::Boolean => {
                let flag = value.as_bool().ok_or_else(|| type_mismatch(op, param))?;
                Some(if flag { "1" } else { "0" }.to_string())
            }
            ParamKind::String => {
                let text = value.as_str().ok_or_else(|| type_mismatch(op, param))?;
                Some(encode(text))
            }
            ParamKind::IntegerArray => {
                let items = value.as_array().ok_or_else(|| type_mismatch(op, param))?;
                let parts = items
                    .iter()
                    .map(integer_text)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| type_mismatch(op, param))?;
                join_non_empty(parts)
            }
            ParamKind::StringArray => {
                let items = value.as_array().ok_or_else(|| type_mismatch(op, param))?;
                let parts = items
                    .iter()
                    .map(|item| item.as_str().map(encode))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| type_mismatch(op, param))?;
                join_non_empty(parts)
            }
            ParamKind::Object | ParamKind::ObjectArray => {
                return Err(ToolError::internal(format!(
                    "{}: '{}' cannot be sent as a query parameter",
                    op.name, param.name
                )))
            }
        };
        if let Some(rendered) = rendered {
            query.push((param.name.clone(), rendered));
        }
    }
    Ok(query)
}

fn render_body(
    op: &OperationDef,
    args: &Map<String, Value>,
    consumed: &HashSet<&str>,
) -> Result<Map<String, Value>, ToolError> {
    let mut body = Map::new();
    for (key, value) in args {
        if consumed.contains(key.as_str()) {
            continue;
        }
        if let Some(param) = op.param(key) {
            if !value.is_null() && !kind_matches(param.kind, value) {
                return Err(type_mismatch(op, param));
            }
        }
        body.insert(key.clone(), value.clone());
    }
    Ok(body)
}

fn kind_matches(kind: ParamKind, value: &Value) -> bool {
    match kind {
        ParamKind::Integer => integer_text(value).is_some(),
        ParamKind::String => value.is_string(),
        ParamKind::Boolean => value.is_boolean(),
        ParamKind::IntegerArray => value
            .as_array()
            .map(|items| items.iter().all(|v| integer_text(v).is_some()))
            .unwrap_or(false),
        ParamKind::StringArray => value
            .as_array()
            .map(|items| items.iter().all(Value::is_string))
            .unwrap_or(false),
        ParamKind::Object => value.is_object(),
        ParamKind::ObjectArray => value
            .as_array()
            .map(|items| items.iter().all(Value::is_object))
            .unwrap_or(false),
    }
}

fn integer_text(value: &Value) -> Option<String> {
    if value.is_i64() || value.is_u64() {
        return Some(value.to_string());
    }
    let float = value.as_f64()?;
    if float.is_finite() && float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
        return Some((float as i64).to_string());
    }
    None
}

fn join_non_empty(parts: Vec<String>) -> Option<String> {
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(","))
    }
}

fn encode(text: &str) -> String {
    byte_serialize(text.as_bytes()).collect()
}

fn type_mismatch(op: &OperationDef, param: &ParamDef) -> ToolError {
    ToolError::invalid_argument(format!(
        "Argument '{}' for {} must be {}",
        param.name,
        op.name,
        param.kind.label()
    ))
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
