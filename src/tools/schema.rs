//! 输入 Schema：生成与调用前校验
//!
//! 能力参数 schema 由 schemars 从参数结构体自动生成；validate 在调用前按 JSON Schema 的常用子集
//! （type / properties / required / additionalProperties / enum / items / minimum / maximum /
//! $ref / allOf / anyOf / oneOf）检查参数。$ref 相对根 schema 解析（schemars 把嵌套结构体放在
//! definitions 下）；整数 format（uint8、int32 等）按对应取值范围检查。不认识的关键字一律放行。

use schemars::{schema_for, JsonSchema};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// 工具调用请求格式：与 Planner 解析的 `{"tool": "...", "args": {...}}` 一致（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    /// 能力名，如 write_mail、router_update
    pub tool: String,
    /// 能力参数，依能力不同而不同
    pub args: HashMap<String, Value>,
}

/// 返回工具调用的 JSON Schema 字符串，可拼入 system prompt
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| String::new())
}

/// 由参数结构体生成输入 schema（供 Capability::input_schema 使用）
pub fn schema_for_args<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
}

/// 校验参数；失败时返回第一处不匹配的描述（带 JSON 路径）
pub fn validate(schema: &Value, args: &Value) -> Result<(), String> {
    Validator { root: schema }.validate_at(schema, args, "$", 0)
}

/// $ref 链的最大深度，防止自引用 schema 无限递归
const MAX_DEPTH: usize = 64;

struct Validator<'a> {
    root: &'a Value,
}

impl<'a> Validator<'a> {
    fn validate_at(&self, schema: &Value, value: &Value, path: &str, depth: usize) -> Result<(), String> {
        if depth > MAX_DEPTH {
            return Err(format!("{path}: schema nesting too deep"));
        }
        let Some(schema) = schema.as_object() else {
            // `true` / 空 schema 接受任何值；`false` 拒绝
            return match schema {
                Value::Bool(false) => Err(format!("{path}: no value is allowed here")),
                _ => Ok(()),
            };
        };

        if let Some(Value::String(reference)) = schema.get("$ref") {
            let target = self
                .resolve(reference)
                .ok_or_else(|| format!("{path}: unresolvable schema reference {reference}"))?;
            self.validate_at(target, value, path, depth + 1)?;
        }

        if let Some(Value::Array(all)) = schema.get("allOf") {
            for sub in all {
                self.validate_at(sub, value, path, depth + 1)?;
            }
        }

        if let Some(Value::Array(any)) = schema.get("anyOf") {
            let mut last_err = None;
            let matched = any.iter().any(|sub| match self.validate_at(sub, value, path, depth + 1) {
                Ok(()) => true,
                Err(e) => {
                    last_err = Some(e);
                    false
                }
            });
            if !matched {
                return Err(last_err.unwrap_or_else(|| format!("{path}: no allowed schema")));
            }
        }

        if let Some(Value::Array(one)) = schema.get("oneOf") {
            let matched = one
                .iter()
                .filter(|sub| self.validate_at(sub, value, path, depth + 1).is_ok())
                .count();
            if matched != 1 {
                return Err(format!("{path}: value matches {matched} schemas, expected exactly one"));
            }
        }

        if let Some(expected) = schema.get("type") {
            check_type(expected, value, path)?;
        }

        if let Some(Value::Array(allowed)) = schema.get("enum") {
            if !allowed.contains(value) {
                return Err(format!("{path}: value {value} is not one of {}", Value::Array(allowed.clone())));
            }
        }

        if value.is_number() {
            check_bounds(schema, value, path)?;
        }

        if let Value::Object(obj) = value {
            self.validate_object(schema, obj, path, depth)?;
        }

        if let (Value::Array(items), Some(item_schema)) = (value, schema.get("items")) {
            for (i, item) in items.iter().enumerate() {
                self.validate_at(item_schema, item, &format!("{path}[{i}]"), depth + 1)?;
            }
        }

        Ok(())
    }

    /// 只支持文档内引用，如 `#/definitions/Inner`
    fn resolve(&self, reference: &str) -> Option<&'a Value> {
        let pointer = reference.strip_prefix('#')?;
        self.root.pointer(pointer)
    }

    fn validate_object(
        &self,
        schema: &Map<String, Value>,
        obj: &Map<String, Value>,
        path: &str,
        depth: usize,
    ) -> Result<(), String> {
        if let Some(Value::Array(required)) = schema.get("required") {
            for key in required.iter().filter_map(|k| k.as_str()) {
                if !obj.contains_key(key) {
                    return Err(format!("{path}: missing required property '{key}'"));
                }
            }
        }

        let properties = schema.get("properties").and_then(|p| p.as_object());
        for (key, v) in obj {
            let child = format!("{path}.{key}");
            match properties.and_then(|p| p.get(key)) {
                Some(prop_schema) => self.validate_at(prop_schema, v, &child, depth + 1)?,
                None => match schema.get("additionalProperties") {
                    Some(Value::Bool(false)) => {
                        return Err(format!("{path}: unexpected property '{key}'"));
                    }
                    Some(extra @ Value::Object(_)) => self.validate_at(extra, v, &child, depth + 1)?,
                    _ => {}
                },
            }
        }
        Ok(())
    }
}

fn check_bounds(schema: &Map<String, Value>, value: &Value, path: &str) -> Result<(), String> {
    let Some(n) = value.as_f64() else {
        return Ok(());
    };
    let bound = |key: &str| schema.get(key).and_then(Value::as_f64);

    if let Some(min) = bound("minimum") {
        if n < min {
            return Err(format!("{path}: {value} is less than minimum {min}"));
        }
    }
    if let Some(max) = bound("maximum") {
        if n > max {
            return Err(format!("{path}: {value} is greater than maximum {max}"));
        }
    }
    if let Some(min) = bound("exclusiveMinimum") {
        if n <= min {
            return Err(format!("{path}: {value} must be greater than {min}"));
        }
    }
    if let Some(max) = bound("exclusiveMaximum") {
        if n >= max {
            return Err(format!("{path}: {value} must be less than {max}"));
        }
    }
    if let Some(format) = schema.get("format").and_then(Value::as_str) {
        if let Some((lo, hi)) = integer_format_range(format) {
            if n < lo || n > hi {
                return Err(format!("{path}: {value} is out of range for {format}"));
            }
        }
    }
    Ok(())
}

/// schemars 为整数类型生成的 format 及其取值范围
fn integer_format_range(format: &str) -> Option<(f64, f64)> {
    let range = match format {
        "uint8" => (0.0, u8::MAX as f64),
        "int8" => (i8::MIN as f64, i8::MAX as f64),
        "uint16" => (0.0, u16::MAX as f64),
        "int16" => (i16::MIN as f64, i16::MAX as f64),
        "uint32" => (0.0, u32::MAX as f64),
        "int32" => (i32::MIN as f64, i32::MAX as f64),
        "uint64" | "uint" => (0.0, u64::MAX as f64),
        "int64" | "int" => (i64::MIN as f64, i64::MAX as f64),
        _ => return None,
    };
    Some(range)
}

fn check_type(expected: &Value, value: &Value, path: &str) -> Result<(), String> {
    let matches = match expected {
        Value::String(t) => type_matches(t, value),
        Value::Array(types) => types
            .iter()
            .filter_map(|t| t.as_str())
            .any(|t| type_matches(t, value)),
        _ => true,
    };
    if matches {
        Ok(())
    } else {
        Err(format!("{path}: expected {expected}, got {}", type_name(value)))
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "number" => value.is_number(),
        "integer" => {
            value.is_i64()
                || value.is_u64()
                || value.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false)
        }
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct MailArgs {
        to: String,
        subject: String,
        cc: Option<String>,
        priority: u8,
    }

    #[test]
    fn test_tool_call_schema_mentions_fields() {
        let s = tool_call_schema_json();
        assert!(s.contains("\"tool\""));
        assert!(s.contains("\"args\""));
    }

    #[test]
    fn test_derived_schema_accepts_valid_args() {
        let schema = schema_for_args::<MailArgs>();
        let args = json!({"to": "noc@example.com", "subject": "Outage", "priority": 2});
        assert!(validate(&schema, &args).is_ok());
        let args = json!({"to": "a", "subject": "b", "cc": null, "priority": 1});
        assert!(validate(&schema, &args).is_ok());
    }

    #[test]
    fn test_derived_schema_rejects_missing_required() {
        let schema = schema_for_args::<MailArgs>();
        let err = validate(&schema, &json!({"to": "a", "priority": 1})).unwrap_err();
        assert!(err.contains("subject"), "{err}");
    }

    #[test]
    fn test_wrong_type_reports_path() {
        let schema = schema_for_args::<MailArgs>();
        let err = validate(&schema, &json!({"to": 5, "subject": "b", "priority": 1})).unwrap_err();
        assert!(err.starts_with("$.to"), "{err}");
    }

    #[test]
    fn test_non_object_args_rejected() {
        let schema = json!({"type": "object", "properties": {}});
        assert!(validate(&schema, &json!("text")).is_err());
        assert!(validate(&schema, &json!({})).is_ok());
    }

    #[test]
    fn test_additional_properties_false() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "string"}},
            "additionalProperties": false
        });
        assert!(validate(&schema, &json!({"a": "x"})).is_ok());
        let err = validate(&schema, &json!({"a": "x", "b": 1})).unwrap_err();
        assert!(err.contains("'b'"));
    }

    #[test]
    fn test_enum_and_items() {
        let schema = json!({
            "type": "array",
            "items": {"type": "string", "enum": ["up", "down"]}
        });
        assert!(validate(&schema, &json!(["up", "down"])).is_ok());
        let err = validate(&schema, &json!(["up", "sideways"])).unwrap_err();
        assert!(err.starts_with("$[1]"), "{err}");
    }

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct InterfaceArgs {
        priority: u8,
        inner: LinkSettings,
        fallback: Option<LinkSettings>,
    }

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct LinkSettings {
        mtu: u16,
    }

    #[test]
    fn test_nested_struct_checked_through_definitions() {
        let schema = schema_for_args::<InterfaceArgs>();
        let ok = json!({"priority": 1, "inner": {"mtu": 1500}});
        assert!(validate(&schema, &ok).is_ok());
        assert!(serde_json::from_value::<InterfaceArgs>(ok).is_ok());

        let bad = json!({"priority": 1, "inner": {"mtu": "not a number"}});
        let err = validate(&schema, &bad).unwrap_err();
        assert!(err.starts_with("$.inner.mtu"), "{err}");

        let bad = json!({"priority": 1, "inner": {}});
        let err = validate(&schema, &bad).unwrap_err();
        assert!(err.contains("'mtu'"), "{err}");

        let bad = json!({"priority": 1, "inner": {"mtu": 1500}, "fallback": {"mtu": -1}});
        assert!(validate(&schema, &bad).is_err());
        let ok = json!({"priority": 1, "inner": {"mtu": 1500}, "fallback": null});
        assert!(validate(&schema, &ok).is_ok());
    }

    #[test]
    fn test_unsigned_fields_are_range_checked() {
        let schema = schema_for_args::<InterfaceArgs>();
        let err = validate(&schema, &json!({"priority": 300, "inner": {"mtu": 1500}})).unwrap_err();
        assert!(err.starts_with("$.priority"), "{err}");
        let err = validate(&schema, &json!({"priority": -1, "inner": {"mtu": 1500}})).unwrap_err();
        assert!(err.starts_with("$.priority"), "{err}");
        let err = validate(&schema, &json!({"priority": 1, "inner": {"mtu": 70000}})).unwrap_err();
        assert!(err.starts_with("$.inner.mtu"), "{err}");
    }

    #[test]
    fn test_explicit_minimum_and_maximum() {
        let schema = json!({"type": "number", "minimum": 1, "maximum": 10});
        assert!(validate(&schema, &json!(1)).is_ok());
        assert!(validate(&schema, &json!(10)).is_ok());
        assert!(validate(&schema, &json!(0.5)).is_err());
        assert!(validate(&schema, &json!(11)).is_err());
    }

    #[test]
    fn test_unresolvable_reference_is_reported() {
        let schema = json!({"$ref": "#/definitions/Missing"});
        let err = validate(&schema, &json!({})).unwrap_err();
        assert!(err.contains("Missing"), "{err}");
    }

    #[test]
    fn test_integer_accepts_whole_floats_only() {
        let schema = json!({"type": "integer"});
        assert!(validate(&schema, &json!(3)).is_ok());
        assert!(validate(&schema, &json!(3.0)).is_ok());
        assert!(validate(&schema, &json!(3.5)).is_err());
    }
}
