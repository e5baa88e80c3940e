use crate::errors::ToolError;
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Integer,
    String,
    Boolean,
    IntegerArray,
    StringArray,
    Object,
    ObjectArray,
}

impl ParamKind {
    pub fn label(self) -> &'static str {
        match self {
            ParamKind::Integer => "integer",
            ParamKind::String => "string",
            ParamKind::Boolean => "boolean",
            ParamKind::IntegerArray => "array of integers",
            ParamKind::StringArray => "array of strings",
            ParamKind::Object => "object",
            ParamKind::ObjectArray => "array of objects",
        }
    }

    pub fn is_scalar_like(self) -> bool {
        !matches!(self, ParamKind::Object | ParamKind::ObjectArray)
    }

    fn json_schema(self, items: Option<&Value>) -> Map<String, Value> {
        let schema = match self {
            ParamKind::Integer => serde_json::json!({"type": "integer"}),
            ParamKind::String => serde_json::json!({"type": "string"}),
            ParamKind::Boolean => serde_json::json!({"type": "boolean"}),
            ParamKind::IntegerArray => {
                serde_json::json!({"type": "array", "items": {"type": "integer"}})
            }
            ParamKind::StringArray => {
                serde_json::json!({"type": "array", "items": {"type": "string"}})
            }
            ParamKind::Object => match items {
                Some(Value::Object(nested)) => {
                    let mut out = nested.clone();
                    out.insert("type".to_string(), Value::String("object".to_string()));
                    Value::Object(out)
                }
                _ => serde_json::json!({"type": "object"}),
            },
            ParamKind::ObjectArray => serde_json::json!({
                "type": "array",
                "items": items.cloned().unwrap_or_else(|| serde_json::json!({"type": "object"})),
            }),
        };
        match schema {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Path,
    Query,
    Body,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    #[serde(rename = "in")]
    pub placement: Placement,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
    /// Nested schema: the item schema for `object_array`, the property
    /// schema for `object`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Value>,
}

/// One upstream endpoint and the rules for turning arguments into a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationDef {
    pub name: String,
    pub description: String,
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub upload: bool,
    #[serde(default)]
    pub params: Vec<ParamDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplatePart<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

impl OperationDef {
    pub fn param(&self, name: &str) -> Option<&ParamDef> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn params_in(&self, placement: Placement) -> impl Iterator<Item = &ParamDef> {
        self.params.iter().filter(move |p| p.placement == placement)
    }

    pub fn required_params(&self) -> impl Iterator<Item = &ParamDef> {
        self.params.iter().filter(|p| p.required)
    }

    /// The path template split into literal text and `{name}` placeholders.
    pub fn template_parts(&self) -> Vec<TemplatePart<'_>> {
        let mut parts = Vec::new();
        let mut last = 0;
        for caps in PLACEHOLDER_RE.captures_iter(&self.path) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > last {
                parts.push(TemplatePart::Literal(&self.path[last..whole.start()]));
            }
            parts.push(TemplatePart::Placeholder(name.as_str()));
            last = whole.end();
        }
        if last < self.path.len() {
            parts.push(TemplatePart::Literal(&self.path[last..]));
        }
        parts
    }

    /// Placeholder names referenced by the path template, in order.
    pub fn placeholders(&self) -> Vec<&str> {
        PLACEHOLDER_RE
            .captures_iter(&self.path)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }

    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let mut schema = param.kind.json_schema(param.items.as_ref());
            if !param.description.is_empty() {
                schema.insert(
                    "description".to_string(),
                    Value::String(param.description.clone()),
                );
            }
            properties.insert(param.name.clone(), Value::Object(schema));
        }
        let required: Vec<Value> = self
            .required_params()
            .map(|p| Value::String(p.name.clone()))
            .collect();
        let mut schema = Map::new();
        schema.insert("type".to_string(), Value::String("object".to_string()));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        Value::Object(schema)
    }

    fn check(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let placeholders = self.placeholders();
        let mut seen = HashSet::new();
        for param in &self.params {
            if !seen.insert(param.name.as_str()) {
                problems.push(format!("{}: duplicate param '{}'", self.name, param.name));
            }
            if param.placement == Placement::Path && !placeholders.contains(&param.name.as_str()) {
                problems.push(format!(
                    "{}: path param '{}' is not in the path template",
                    self.name, param.name
                ));
            }
            if param.required && param.placement != Placement::Path {
                problems.push(format!(
                    "{}: required param '{}' must be a path param",
                    self.name, param.name
                ));
            }
            let placeable = match param.placement {
                Placement::Path => matches!(param.kind, ParamKind::Integer | ParamKind::String),
                Placement::Query => param.kind.is_scalar_like(),
                Placement::Body => true,
            };
            if !placeable {
                problems.push(format!(
                    "{}: param '{}' of type {} cannot be placed in the {:?}",
                    self.name,
                    param.name,
                    param.kind.label(),
                    param.placement
                ));
            }
            if self.method == HttpMethod::Get && param.placement == Placement::Body {
                problems.push(format!(
                    "{}: GET operation declares body param '{}'",
                    self.name, param.name
                ));
            }
        }
        for placeholder in placeholders {
            let declared = self
                .param(placeholder)
                .map(|p| p.placement == Placement::Path)
                .unwrap_or(false);
            if !declared {
                problems.push(format!(
                    "{}: placeholder '{{{}}}' has no path param",
                    self.name, placeholder
                ));
            }
        }
        if self.upload && self.param("file_path").is_none() {
            problems.push(format!("{}: upload operation needs 'file_path'", self.name));
        }
        problems
    }
}

/// Shape returned by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

static BUILTIN_OPERATIONS: Lazy<Result<Vec<OperationDef>, String>> = Lazy::new(|| {
    let raw = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/operation_catalog.json"
    ));
    serde_json::from_str(raw).map_err(|err| format!("operation_catalog.json: {}", err))
});

pub fn builtin_operations() -> Result<&'static [OperationDef], ToolError> {
    BUILTIN_OPERATIONS
        .as_ref()
        .map(|ops| ops.as_slice())
        .map_err(|err| ToolError::internal(err.clone()))
}

/// Registry of dispatchable operations. Built once at startup, read-only after.
pub struct Catalog {
    operations: Vec<OperationDef>,
    index: HashMap<String, usize>,
    validators: HashMap<String, JSONSchema>,
    ignored_allow_list: Vec<String>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("operations", &self.operations.len())
            .field("ignored_allow_list", &self.ignored_allow_list)
            .finish()
    }
}

impl Catalog {
    pub fn builtin(allow_list: Option<&[String]>) -> Result<Self, ToolError> {
        Self::from_operations(builtin_operations()?.to_vec(), allow_list)
    }

    pub fn from_operations(
        operations: Vec<OperationDef>,
        allow_list: Option<&[String]>,
    ) -> Result<Self, ToolError> {
        let mut problems = Vec::new();
        let mut names = HashSet::new();
        for op in &operations {
            if !names.insert(op.name.clone()) {
                problems.push(format!("duplicate operation '{}'", op.name));
            }
            problems.extend(op.check());
        }
        if !problems.is_empty() {
            problems.sort();
            return Err(ToolError::internal(format!(
                "Operation catalog is invalid: {}",
                problems.join("; ")
            ))
            .with_hint("Every operation needs a unique name and path params matching its template."));
        }

        let mut ignored_allow_list = Vec::new();
        let operations = match allow_list {
            Some(allowed) => {
                let allowed: HashSet<&str> = allowed.iter().map(|s| s.as_str()).collect();
                for name in &allowed {
                    if !names.contains(*name) {
                        ignored_allow_list.push((*name).to_string());
                    }
                }
                ignored_allow_list.sort();
                operations
                    .into_iter()
                    .filter(|op| allowed.contains(op.name.as_str()))
                    .collect()
            }
            None => operations,
        };

        let mut index = HashMap::new();
        let mut validators = HashMap::new();
        for (idx, op) in operations.iter().enumerate() {
            index.insert(op.name.clone(), idx);
            let schema = op.input_schema();
            let compiled = JSONSchema::compile(&schema).map_err(|err| {
                ToolError::internal(format!("{}: input schema does not compile: {}", op.name, err))
            })?;
            validators.insert(op.name.clone(), compiled);
        }

        Ok(Self {
            operations,
            index,
            validators,
            ignored_allow_list,
        })
    }

    pub fn list_operations(&self) -> &[OperationDef] {
        &self.operations
    }

    pub fn find_operation(&self, name: &str) -> Option<&OperationDef> {
        self.index.get(name).map(|idx| &self.operations[*idx])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operations.iter().map(|op| op.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Allow-list entries that matched no known operation.
    pub fn ignored_allow_list(&self) -> &[String] {
        &self.ignored_allow_list
    }

    pub fn tool_definitions(&self) -> Vec<ToolDef> {
        self.operations
            .iter()
            .map(|op| ToolDef {
                name: op.name.clone(),
                description: op.description.clone(),
                input_schema: op.input_schema(),
            })
            .collect()
    }

    /// Structural check of `args` against the operation's declared schema.
    /// Top-level `null` values count as absent, so a missing or null required
    /// argument is reported as `MissingArgument`.
    pub fn validate_args(&self, op: &OperationDef, args: &Value) -> Result<(), ToolError> {
        let Some(schema) = self.validators.get(&op.name) else {
            return Ok(());
        };
        let present = match args {
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            other => other.clone(),
        };
        let errors = match schema.validate(&present) {
            Ok(()) => return Ok(()),
            Err(errors) => errors,
        };

        let mut rendered = Vec::new();
        for err in errors.take(10) {
            let instance_path = err.instance_path.to_string();
            match &err.kind {
                jsonschema::error::ValidationErrorKind::Required { property } => {
                    let prop = property
                        .as_str()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| property.to_string());
                    if instance_path.is_empty() {
                        return Err(ToolError::missing_argument(&op.name, &prop));
                    }
                    rendered.push(format!(
                        "{}: missing required field '{}'",
                        instance_path, prop
                    ));
                }
                jsonschema::error::ValidationErrorKind::Type { kind } => {
                    rendered.push(format!(
                        "{}: expected {}",
                        display_path(&instance_path),
                        format_type_kind(kind)
                    ));
                }
                _ => rendered.push(format!("{}: {}", display_path(&instance_path), err)),
            }
        }

        let mut lines = vec![format!("Invalid arguments for {}", op.name)];
        lines.extend(rendered.iter().map(|line| format!("- {}", line)));
        Err(ToolError::invalid_argument(lines.join("\n")))
    }
}

fn display_path(instance_path: &str) -> &str {
    if instance_path.is_empty() {
        "(root)"
    } else {
        instance_path
    }
}

fn format_type_kind(kind: &jsonschema::error::TypeKind) -> String {
    match kind {
        jsonschema::error::TypeKind::Single(primitive) => primitive.to_string(),
        jsonschema::error::TypeKind::Multiple(types) => {
            let list: Vec<String> = (*types).into_iter().map(|t| t.to_string()).collect();
            if list.is_empty() {
                "unknown".to_string()
            } else {
                list.join(" | ")
            }
        }
    }
}
