use std::collections::HashMap;

use super::{Args, CallContext, FuncError, Function, Param};
use crate::{
    path::{extract_path, lookup_json},
    value::Value,
};

const JSON_PARAMS: &[Param] = &[
    Param::required("input"),
    Param::required("json_path"),
    Param::optional("new_key"),
];

/// `json(input, json_path, [new_key])`
pub struct Json;

impl Function for Json {
    fn name(&self) -> &'static str {
        "json"
    }

    fn params(&self) -> &'static [Param] {
        JSON_PARAMS
    }

    fn summary(&self) -> &'static str {
        "Extract the value at `json_path` from the JSON text in `input`; stored under `new_key` (default: the path as written)."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let input = args.key(0)?;
        let path_node = args.node(1)?;
        let path = extract_path(path_node).map_err(|_| FuncError::ArgType {
            function: "json",
            param: "json_path",
            expected: "a key path",
            found: path_node.kind(),
        })?;
        let new_key = match args.opt_key(2)? {
            Some(key) => key,
            None => args.key(1)?,
        };

        let text = ctx.text(&input)?;
        let doc: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| FuncError::runtime("json", format!("`{}` is not valid JSON: {}", input, e)))?;

        let found = lookup_json(&doc, &path).ok_or_else(|| {
            FuncError::runtime("json", format!("path `{}` not found in `{}`", path_node, input))
        })?;

        if found.is_null() {
            return Ok(());
        }
        ctx.record.set(new_key, Value::from(found.clone()));
        Ok(())
    }
}

/// `json_all()`
///
/// Replaces the record with the flattened raw input: object members become
/// `parent.child` keys and array elements `parent[i]` keys. A top-level
/// array yields keys `0`, `1`, ...
pub struct JsonAll;

impl Function for JsonAll {
    fn name(&self) -> &'static str {
        "json_all"
    }

    fn params(&self) -> &'static [Param] {
        &[]
    }

    fn summary(&self) -> &'static str {
        "Replace the record with the flattened JSON of the raw input."
    }

    fn call(&self, _args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let doc: serde_json::Value = serde_json::from_str(ctx.record.raw())
            .map_err(|e| FuncError::runtime("json_all", format!("input is not valid JSON: {}", e)))?;

        if !doc.is_object() && !doc.is_array() {
            return Err(FuncError::runtime(
                "json_all",
                "input is not a JSON object or array",
            ));
        }

        let mut fields = HashMap::new();
        flatten(doc, String::new(), &mut fields);
        ctx.record.replace_fields(fields);
        Ok(())
    }
}

fn flatten(value: serde_json::Value, prefix: String, out: &mut HashMap<String, Value>) {
    match value {
        serde_json::Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k
                } else {
                    format!("{}.{}", prefix, k)
                };
                flatten(v, key, out);
            }
        }
        serde_json::Value::Array(items) => {
            for (i, v) in items.into_iter().enumerate() {
                let key = if prefix.is_empty() {
                    i.to_string()
                } else {
                    format!("{}[{}]", prefix, i)
                };
                flatten(v, key, out);
            }
        }
        leaf => {
            out.insert(prefix, Value::from(leaf));
        }
    }
}
