//! Walks a flat type tree and the object bytes in lock-step.
//!
//! The schema is a pre-order node list; a node's children are the nodes
//! after it with a deeper level. The walk keeps an explicit cursor into the
//! list and slices out sub-schemas for array elements and map entries, so
//! each element decode restarts at a fixed index inside its slice.

use indexmap::IndexMap;
use tracing::debug;

use super::value::Value;
use crate::serialized::schema::{node_path, subtree_len};
use crate::serialized::{ObjectReader, TypeTree, TypeTreeNode};
use crate::stream::EndianReader;
use crate::util::{Error, Result};

/// What to do with `TypelessData` payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypelessMode {
    /// Record offset and size only.
    #[default]
    Skip,
    /// Copy the bytes into the tree.
    Capture,
}

/// Result of a schema walk.
#[derive(Debug, Clone)]
pub struct TreeRead {
    /// Root record. Partial when `complete` is false.
    pub value: Value,
    /// Bytes consumed from the start of the object.
    pub consumed: usize,
    /// Every node decoded and the byte count matched.
    pub complete: bool,
}

/// Index of the element schema inside an array slice: `[vector, Array, size, data]`.
const ARRAY_ELEMENT: usize = 3;

/// Index of the key schema inside a map slice: `[map, Array, size, pair, first]`.
const MAP_KEY: usize = 4;

/// Decode the object under `r` with its schema.
pub fn read_object_tree(r: &mut ObjectReader<'_>, tree: &TypeTree, mode: TypelessMode) -> TreeRead {
    r.reset();
    let expected = r.byte_size() as usize;
    read_tree(tree, r, expected, mode)
}

/// Decode a record from `r`'s current position.
///
/// Failures and byte-count drift are not errors: the walk stops, the fields
/// read so far are returned and the result is marked incomplete.
pub fn read_tree(tree: &TypeTree, r: &mut EndianReader<'_>, expected: usize, mode: TypelessMode) -> TreeRead {
    let start = r.position();
    let nodes = &tree.nodes;
    let mut fields = IndexMap::new();
    let mut failure = None;

    let mut i = 1;
    while i < nodes.len() {
        let name = nodes[i].name.clone();
        match read_value(nodes, r, &mut i, mode) {
            Ok(value) => {
                fields.insert(name, value);
            }
            Err(e) => {
                failure = Some((name, e));
                break;
            }
        }
        i += 1;
    }

    let consumed = r.position() - start;
    if let Some((field, e)) = &failure {
        debug!(
            "type tree {} stopped at field {field} ({e}); read {consumed} bytes but expected {expected} bytes",
            tree.root_type().unwrap_or("?")
        );
    } else if consumed != expected {
        debug!(
            "type tree {}: read {consumed} bytes but expected {expected} bytes",
            tree.root_type().unwrap_or("?")
        );
    }
    TreeRead { value: Value::Record(fields), consumed, complete: failure.is_none() && consumed == expected }
}

/// Check that `tree` has the node shapes the walk relies on.
///
/// Levels must nest one step at a time below a single root. Arrays need an
/// element schema, maps a key and a value, `TypelessData` a size and data.
pub fn check_schema(tree: &TypeTree) -> Result<()> {
    let nodes = &tree.nodes;
    for (i, node) in nodes.iter().enumerate() {
        if let Some(prev) = i.checked_sub(1).map(|p| nodes[p].level) {
            if node.level == 0 || u16::from(node.level) > u16::from(prev) + 1 {
                return Err(schema_error(nodes, i, format!("level {} follows level {prev}", node.level)));
            }
        }
        let len = subtree_len(nodes, i);
        match node.type_name.as_str() {
            "string" => {}
            "map" => map_value_index(nodes, i).map(|_| ())?,
            "TypelessData" if len < 3 => return Err(schema_error(nodes, i, "typeless data has no size and data")),
            _ if next_is_array(nodes, i) && len <= ARRAY_ELEMENT => {
                return Err(schema_error(nodes, i, "array has no element schema"));
            }
            _ => {}
        }
    }
    Ok(())
}

fn schema_error(nodes: &[TypeTreeNode], index: usize, reason: impl Into<String>) -> Error {
    Error::InvalidSchema { node: node_path(nodes, index), reason: reason.into() }
}

/// Index of the value schema inside the map at `nodes[index]`, relative to the map.
fn map_value_index(nodes: &[TypeTreeNode], index: usize) -> Result<usize> {
    let len = subtree_len(nodes, index);
    if len <= MAP_KEY {
        return Err(schema_error(nodes, index, "map has no pair schema"));
    }
    let value = MAP_KEY + subtree_len(nodes, index + MAP_KEY);
    if value >= len {
        return Err(schema_error(nodes, index + MAP_KEY - 1, "map pair has no value schema"));
    }
    Ok(value)
}

fn sub_nodes(nodes: &[TypeTreeNode], index: usize) -> &[TypeTreeNode] {
    let end = index + subtree_len(nodes, index);
    nodes.get(index..end).unwrap_or_default()
}

fn next_is_array(nodes: &[TypeTreeNode], i: usize) -> bool {
    nodes.get(i + 1).is_some_and(|n| n.type_name == "Array")
}

fn read_value(nodes: &[TypeTreeNode], r: &mut EndianReader<'_>, i: &mut usize, mode: TypelessMode) -> Result<Value> {
    let at = *i;
    let node = nodes.get(at).ok_or_else(|| schema_error(nodes, at, "schema ends before the field"))?;
    let mut align = node.needs_align();

    let value = match node.type_name.as_str() {
        "SInt8" => Value::Int(r.read_i8()? as i64),
        "UInt8" => Value::UInt(r.read_u8()? as u64),
        "char" => Value::String((r.read_u8()? as char).to_string()),
        "short" | "SInt16" => Value::Int(r.read_i16()? as i64),
        "UInt16" | "unsigned short" => Value::UInt(r.read_u16()? as u64),
        "int" | "SInt32" => Value::Int(r.read_i32()? as i64),
        "UInt32" | "unsigned int" | "Type*" => Value::UInt(r.read_u32()? as u64),
        "long long" | "SInt64" => Value::Int(r.read_i64()?),
        "UInt64" | "unsigned long long" | "FileSize" => Value::UInt(r.read_u64()?),
        "float" => Value::Float(r.read_f32()?),
        "double" => Value::Double(r.read_f64()?),
        "bool" => Value::Bool(r.read_bool()?),
        "string" => {
            // the align bit sits on the inner Array node in most schemas
            if next_is_array(nodes, *i) && nodes[*i + 1].needs_align() {
                align = true;
            }
            let s = r.read_string()?;
            *i += subtree_len(nodes, *i) - 1;
            Value::String(s)
        }
        "map" => {
            if nodes.get(*i + 1).is_some_and(TypeTreeNode::needs_align) {
                align = true;
            }
            let map = sub_nodes(nodes, at);
            *i += map.len() - 1;
            let value_at = map_value_index(nodes, at)?;
            let key = sub_nodes(map, MAP_KEY);
            let value = sub_nodes(map, value_at);
            let count = r.read_count(0)?;
            let mut pairs = Vec::with_capacity(count.min(r.remaining()));
            for _ in 0..count {
                let (mut k, mut v) = (0, 0);
                pairs.push((read_value(key, r, &mut k, mode)?, read_value(value, r, &mut v, mode)?));
            }
            Value::Map(pairs)
        }
        "TypelessData" => {
            if subtree_len(nodes, at) < 3 {
                return Err(schema_error(nodes, at, "typeless data has no size and data"));
            }
            let size = r.read_count(1)?;
            let offset = r.position() as u64;
            let bytes = r.take(size)?;
            *i += 2;
            match mode {
                TypelessMode::Skip => Value::Blob { offset, size: size as u64 },
                TypelessMode::Capture => Value::Bytes(bytes.to_vec()),
            }
        }
        _ if next_is_array(nodes, *i) => {
            if nodes[*i + 1].needs_align() {
                align = true;
            }
            let vector = sub_nodes(nodes, *i);
            *i += vector.len() - 1;
            let element = vector
                .get(ARRAY_ELEMENT)
                .ok_or_else(|| schema_error(nodes, at, "array has no element schema"))?;
            let count = r.read_count(element.byte_size.max(0) as usize)?;
            if element.type_name == "UInt8" && vector.len() == ARRAY_ELEMENT + 1 {
                Value::Bytes(r.take(count)?.to_vec())
            } else {
                let mut items = Vec::with_capacity(count.min(r.remaining()));
                for _ in 0..count {
                    let mut j = ARRAY_ELEMENT;
                    items.push(read_value(vector, r, &mut j, mode)?);
                }
                Value::Array(items)
            }
        }
        _ => {
            let class = sub_nodes(nodes, *i);
            *i += class.len() - 1;
            let mut fields = IndexMap::with_capacity(class.len());
            let mut j = 1;
            while j < class.len() {
                let name = class[j].name.clone();
                fields.insert(name, read_value(class, r, &mut j, mode)?);
                j += 1;
            }
            Value::Record(fields)
        }
    };

    if align {
        r.align(4)?;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialized::schema::FLAG_ALIGN;
    use crate::stream::Endian;

    fn n(level: u8, ty: &str, name: &str, size: i32, meta: i32) -> TypeTreeNode {
        TypeTreeNode::new(level, ty, name, size, meta)
    }

    fn string_nodes(level: u8, name: &str) -> Vec<TypeTreeNode> {
        vec![
            n(level, "string", name, -1, 0),
            n(level + 1, "Array", "Array", -1, FLAG_ALIGN),
            n(level + 2, "int", "size", 4, 0),
            n(level + 2, "char", "data", 1, 0),
        ]
    }

    /// `{int m_Id, string m_Name, vector<float> m_Weights, map<string,int> m_Lookup}`
    fn sample_tree() -> TypeTree {
        let mut nodes = vec![n(0, "Sample", "Base", -1, 0), n(1, "int", "m_Id", 4, 0)];
        nodes.extend(string_nodes(1, "m_Name"));
        nodes.extend([
            n(1, "vector", "m_Weights", -1, 0),
            n(2, "Array", "Array", -1, FLAG_ALIGN),
            n(3, "int", "size", 4, 0),
            n(3, "float", "data", 4, 0),
            n(1, "map", "m_Lookup", -1, 0),
            n(2, "Array", "Array", -1, FLAG_ALIGN),
            n(3, "int", "size", 4, 0),
            n(3, "pair", "data", -1, 0),
        ]);
        nodes.extend(string_nodes(4, "first"));
        nodes.push(n(4, "int", "second", 4, 0));
        TypeTree::new(nodes)
    }

    fn put_string(out: &mut Vec<u8>, s: &str) {
        out.extend_from_slice(&(s.len() as i32).to_le_bytes());
        out.extend_from_slice(s.as_bytes());
        while out.len() % 4 != 0 {
            out.push(0);
        }
    }

    fn sample_bytes() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&42i32.to_le_bytes());
        put_string(&mut out, "hero");
        out.extend_from_slice(&2i32.to_le_bytes());
        out.extend_from_slice(&0.25f32.to_le_bytes());
        out.extend_from_slice(&(-1.5f32).to_le_bytes());
        out.extend_from_slice(&2i32.to_le_bytes());
        put_string(&mut out, "a");
        out.extend_from_slice(&1i32.to_le_bytes());
        put_string(&mut out, "bcdef");
        out.extend_from_slice(&2i32.to_le_bytes());
        out
    }

    #[test]
    fn test_record_roundtrip() {
        let bytes = sample_bytes();
        let mut r = EndianReader::new(&bytes, Endian::Little);
        let read = read_tree(&sample_tree(), &mut r, bytes.len(), TypelessMode::Skip);

        assert!(read.complete);
        assert_eq!(read.consumed, bytes.len());
        let v = &read.value;
        assert_eq!(v.field("m_Id").unwrap().as_i32().unwrap(), 42);
        assert_eq!(v.field("m_Name").unwrap().as_str().unwrap(), "hero");
        let weights: Vec<f32> = v.field("m_Weights").unwrap().as_array().unwrap().iter().map(|w| w.as_f32().unwrap()).collect();
        assert_eq!(weights, [0.25, -1.5]);
        let lookup = v.field("m_Lookup").unwrap().as_map().unwrap();
        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup[1].0.as_str().unwrap(), "bcdef");
        assert_eq!(lookup[1].1.as_i32().unwrap(), 2);
    }

    #[test]
    fn test_drift_keeps_partial_tree() {
        let mut bytes = sample_bytes();
        bytes.truncate(bytes.len() - 6);
        let mut r = EndianReader::new(&bytes, Endian::Little);
        let read = read_tree(&sample_tree(), &mut r, bytes.len() + 6, TypelessMode::Skip);

        assert!(!read.complete);
        assert_eq!(read.value.field("m_Name").unwrap().as_str().unwrap(), "hero");
        assert!(read.value.get("m_Lookup").is_none());
    }

    #[test]
    fn test_byte_count_mismatch_is_flagged() {
        let mut bytes = sample_bytes();
        bytes.extend_from_slice(&[0; 4]);
        let mut r = EndianReader::new(&bytes, Endian::Little);
        let read = read_tree(&sample_tree(), &mut r, bytes.len(), TypelessMode::Skip);
        assert!(!read.complete);
        assert_eq!(read.consumed, bytes.len() - 4);
    }

    #[test]
    fn test_typeless_and_byte_vector() {
        let tree = TypeTree::new(vec![
            n(0, "Texture2D", "Base", -1, 0),
            n(1, "TypelessData", "image data", -1, 0),
            n(2, "int", "size", 4, 0),
            n(2, "UInt8", "data", 1, 0),
            n(1, "vector", "m_Bytes", -1, 0),
            n(2, "Array", "Array", -1, FLAG_ALIGN),
            n(3, "int", "size", 4, 0),
            n(3, "UInt8", "data", 1, 0),
            n(1, "bool", "m_Flag", 1, FLAG_ALIGN),
        ]);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&3i32.to_le_bytes());
        bytes.extend_from_slice(&[9, 8, 7]);
        bytes.extend_from_slice(&2i32.to_le_bytes());
        bytes.extend_from_slice(&[5, 6]);
        bytes.extend_from_slice(&[0; 3]);
        bytes.push(1);
        bytes.extend_from_slice(&[0; 3]);

        let mut r = EndianReader::new(&bytes, Endian::Little);
        let skipped = read_tree(&tree, &mut r, bytes.len(), TypelessMode::Skip);
        assert!(skipped.complete);
        assert_eq!(skipped.value.field("image data").unwrap(), &Value::Blob { offset: 4, size: 3 });
        assert_eq!(skipped.value.field("m_Bytes").unwrap().as_bytes().unwrap(), &[5, 6]);
        assert!(skipped.value.field("m_Flag").unwrap().as_bool().unwrap());

        let mut r = EndianReader::new(&bytes, Endian::Little);
        let captured = read_tree(&tree, &mut r, bytes.len(), TypelessMode::Capture);
        assert_eq!(captured.value.field("image data").unwrap().as_bytes().unwrap(), &[9, 8, 7]);
    }

    #[test]
    fn test_nested_record_and_big_endian() {
        let tree = TypeTree::new(vec![
            n(0, "Holder", "Base", -1, 0),
            n(1, "PPtr<GameObject>", "m_GameObject", 12, 0),
            n(2, "int", "m_FileID", 4, 0),
            n(2, "SInt64", "m_PathID", 8, 0),
            n(1, "UInt16", "m_Small", 2, 0),
        ]);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0i32.to_be_bytes());
        bytes.extend_from_slice(&77i64.to_be_bytes());
        bytes.extend_from_slice(&513u16.to_be_bytes());
        let mut r = EndianReader::new(&bytes, Endian::Big);
        let read = read_tree(&tree, &mut r, bytes.len(), TypelessMode::Skip);
        assert!(read.complete);
        let p: crate::serialized::PPtr = read.value.field("m_GameObject").unwrap().as_pptr().unwrap();
        assert_eq!(p.path_id, 77);
        assert_eq!(read.value.field("m_Small").unwrap().as_u32().unwrap(), 513);
    }

    /// `{int m_Id, map m_Table}` where the map pair stops after its key.
    fn pair_without_value() -> TypeTree {
        TypeTree::new(vec![
            n(0, "TextAsset", "Base", -1, 0),
            n(1, "int", "m_Id", 4, 0),
            n(1, "map", "m_Table", -1, 0),
            n(2, "Array", "Array", -1, FLAG_ALIGN),
            n(3, "int", "size", 4, 0),
            n(3, "pair", "data", -1, 0),
            n(4, "int", "first", 4, 0),
        ])
    }

    #[test]
    fn test_map_without_value_schema() {
        let tree = pair_without_value();
        let err = check_schema(&tree).unwrap_err();
        match &err {
            Error::InvalidSchema { node, reason } => {
                assert_eq!(node, "m_Table.Array.data");
                assert!(reason.contains("value"));
            }
            other => panic!("unexpected error {other:?}"),
        }

        let mut bytes = Vec::new();
        for v in [7i32, 1, 3, 4] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let mut r = EndianReader::new(&bytes, Endian::Little);
        let read = read_tree(&tree, &mut r, bytes.len(), TypelessMode::Skip);
        assert!(!read.complete);
        assert_eq!(read.value.field("m_Id").unwrap().as_i32().unwrap(), 7);
        assert!(read.value.get("m_Table").is_none());
    }

    #[test]
    fn test_schema_shape_errors() {
        assert!(check_schema(&sample_tree()).is_ok());

        let jump = TypeTree::new(vec![n(0, "Holder", "Base", -1, 0), n(2, "int", "m_Deep", 4, 0)]);
        assert!(matches!(check_schema(&jump), Err(Error::InvalidSchema { node, .. }) if node == "m_Deep"));

        let second_root = TypeTree::new(vec![n(0, "Holder", "Base", -1, 0), n(0, "int", "m_Flat", 4, 0)]);
        assert!(check_schema(&second_root).is_err());

        let bare_array = TypeTree::new(vec![
            n(0, "Holder", "Base", -1, 0),
            n(1, "vector", "m_Items", -1, 0),
            n(2, "Array", "Array", -1, 0),
            n(3, "int", "size", 4, 0),
        ]);
        assert!(matches!(check_schema(&bare_array), Err(Error::InvalidSchema { node, .. }) if node == "m_Items"));
        let bytes = 0i32.to_le_bytes();
        let mut r = EndianReader::new(&bytes, Endian::Little);
        assert!(!read_tree(&bare_array, &mut r, 4, TypelessMode::Skip).complete);

        let short_typeless = TypeTree::new(vec![
            n(0, "Holder", "Base", -1, 0),
            n(1, "TypelessData", "image data", -1, 0),
            n(2, "int", "size", 4, 0),
        ]);
        assert!(check_schema(&short_typeless).is_err());
        let mut r = EndianReader::new(&bytes, Endian::Little);
        assert!(!read_tree(&short_typeless, &mut r, 4, TypelessMode::Skip).complete);
    }
}
