use thiserror::Error;

use crate::ast::Node;

/// A segment in a navigable path used to walk JSON documents.
///
/// Paths are extracted from the key-path arguments of functions such as
/// `json()` and used to locate values inside the parsed JSON text.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// Object field access by name
    ///
    /// # Examples
    /// - `status` → `Field("status")`
    /// - `a.b` → `[Field("a"), Field("b")]`
    Field(String),

    /// Array element access by index
    ///
    /// # Examples
    /// - `items[0]` → `[Field("items"), Index(0)]`
    /// - `items[-1]` → `[Field("items"), Index(-1)]` (counts from the end)
    Index(i64),
}

/// A sequence of path segments, e.g. `x.y[1].z` →
/// `[Field("x"), Field("y"), Index(1), Field("z")]`.
pub type Path = Vec<PathSegment>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathError {
    #[error("`{0}` is not a key path")]
    NotAPath(String),
}

/// Extract a navigable path from a key-path node.
///
/// # Examples
/// ```text
/// a.second        → [Field("a"), Field("second")]
/// x.y[1][2].z     → [Field("x"), Field("y"), Index(1), Index(2), Field("z")]
/// .[2].x          → [Index(2), Field("x")]
/// "a.b"           → [Field("a.b")]
/// ```
pub fn extract_path(node: &Node) -> Result<Path, PathError> {
    let mut segments = Vec::new();
    extract_path_recursive(node, &mut segments)?;
    Ok(segments)
}

fn extract_path_recursive(node: &Node, segments: &mut Path) -> Result<(), PathError> {
    match node {
        Node::Identifier(name) => {
            segments.push(PathSegment::Field(name.clone()));
            Ok(())
        }

        Node::String(s) => {
            // quoted keys are never split
            segments.push(PathSegment::Field(s.clone()));
            Ok(())
        }

        Node::Attr { object, attr } => {
            extract_path_recursive(object, segments)?;
            extract_path_recursive(attr, segments)
        }

        Node::Index { object, indices } => {
            if let Some(object) = object {
                extract_path_recursive(object, segments)?;
            }
            segments.extend(indices.iter().map(|i| PathSegment::Index(*i)));
            Ok(())
        }

        other => Err(PathError::NotAPath(other.to_string())),
    }
}

/// Walk a parsed JSON document along `path`.
///
/// Missing fields, out-of-range indices and type mismatches all yield `None`.
pub fn lookup_json<'a>(doc: &'a serde_json::Value, path: &[PathSegment]) -> Option<&'a serde_json::Value> {
    let mut current = doc;

    for segment in path {
        current = match (current, segment) {
            (serde_json::Value::Object(map), PathSegment::Field(name)) => map.get(name)?,
            (serde_json::Value::Array(arr), PathSegment::Index(n)) => {
                let index = if *n < 0 {
                    // -1 = last, -2 = second to last
                    let back = n.unsigned_abs() as usize;
                    arr.len().checked_sub(back)?
                } else {
                    *n as usize
                };
                arr.get(index)?
            }
            _ => return None,
        };
    }

    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_negative_index() {
        let doc = json!({"items": [1, 2, 3]});
        let path = vec![PathSegment::Field("items".into()), PathSegment::Index(-1)];
        assert_eq!(lookup_json(&doc, &path), Some(&json!(3)));

        let path = vec![PathSegment::Field("items".into()), PathSegment::Index(-4)];
        assert_eq!(lookup_json(&doc, &path), None);
    }

    #[test]
    fn test_field_on_array_misses() {
        let doc = json!({"items": [1, 2, 3]});
        let path = vec![PathSegment::Field("items".into()), PathSegment::Field("x".into())];
        assert_eq!(lookup_json(&doc, &path), None);
    }
}
