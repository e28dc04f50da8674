//! In-memory spaces for simulated instances
//!
//! Tuples are JSON arrays; the first field is the primary key. Update
//! operations use 0-based field numbers.
use crate::core::IteratorType;
use crate::error::ConnectionError;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

pub const ER_ILLEGAL_PARAMS: u32 = 1;
pub const ER_TUPLE_FOUND: u32 = 3;
pub const ER_READONLY: u32 = 7;
pub const ER_NO_SUCH_PROC: u32 = 33;
pub const ER_UNSUPPORTED: u32 = 5;

/// All spaces of one instance, created on first write.
#[derive(Debug, Default)]
pub struct SpaceStore {
    spaces: HashMap<String, Vec<Value>>,
}

fn space_name(space: &Value) -> String {
    match space {
        Value::String(name) => name.clone(),
        other => other.to_string(),
    }
}

fn primary_key(tuple: &Value) -> Result<&Value, ConnectionError> {
    tuple
        .as_array()
        .and_then(|fields| fields.first())
        .ok_or_else(|| ConnectionError::server(ER_ILLEGAL_PARAMS, "tuple must be a non-empty array"))
}

/// A key is either a bare value or an array whose first part is used.
fn key_part(key: &Value) -> Option<&Value> {
    match key {
        Value::Array(parts) => parts.first(),
        Value::Null => None,
        other => Some(other),
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn matches(iterator: IteratorType, field: &Value, key: &Value) -> bool {
    let ordering = compare(field, key);
    match iterator {
        IteratorType::Eq | IteratorType::Req => ordering == Ordering::Equal,
        IteratorType::All => true,
        IteratorType::Lt => ordering == Ordering::Less,
        IteratorType::Le => ordering != Ordering::Greater,
        IteratorType::Ge => ordering != Ordering::Less,
        IteratorType::Gt => ordering == Ordering::Greater,
    }
}

fn apply_ops(tuple: &mut Value, ops: &Value) -> Result<(), ConnectionError> {
    let ops = ops
        .as_array()
        .ok_or_else(|| ConnectionError::server(ER_ILLEGAL_PARAMS, "update ops must be an array"))?;
    let fields = tuple
        .as_array_mut()
        .ok_or_else(|| ConnectionError::server(ER_ILLEGAL_PARAMS, "tuple must be an array"))?;

    for op in ops {
        let (operator, field, argument) = match op.as_array().map(Vec::as_slice) {
            Some([Value::String(operator), Value::Number(field), argument]) => {
                (operator.as_str(), field.as_u64(), argument)
            }
            _ => {
                return Err(ConnectionError::server(
                    ER_ILLEGAL_PARAMS,
                    format!("malformed update operation: {}", op),
                ))
            }
        };
        // Field 0 is the primary key and stays immutable.
        let index = field
            .map(|field| field as usize)
            .filter(|&index| index > 0)
            .ok_or_else(|| ConnectionError::server(ER_ILLEGAL_PARAMS, "invalid field number"))?;

        match operator {
            "=" if index < fields.len() => fields[index] = argument.clone(),
            "=" if index == fields.len() => fields.push(argument.clone()),
            "+" | "-" if index < fields.len() => {
                let current = fields[index].as_i64();
                let delta = argument.as_i64();
                let (Some(current), Some(delta)) = (current, delta) else {
                    return Err(ConnectionError::server(
                        ER_ILLEGAL_PARAMS,
                        "arithmetic on a non-integer field",
                    ));
                };
                let value = if operator == "+" { current + delta } else { current - delta };
                fields[index] = Value::from(value);
            }
            "=" | "+" | "-" => {
                return Err(ConnectionError::server(
                    ER_ILLEGAL_PARAMS,
                    format!("field {} is out of range", index),
                ))
            }
            other => {
                return Err(ConnectionError::server(
                    ER_UNSUPPORTED,
                    format!("unsupported update operator '{}'", other),
                ))
            }
        }
    }
    Ok(())
}

impl SpaceStore {
    fn position(&self, space: &str, key: &Value) -> Option<usize> {
        self.spaces.get(space).and_then(|tuples| {
            tuples.iter().position(|tuple| {
                primary_key(tuple).map_or(false, |pk| compare(pk, key) == Ordering::Equal)
            })
        })
    }

    pub fn select(
        &self,
        space: &Value,
        key: &Value,
        offset: u32,
        limit: u32,
        iterator: IteratorType,
    ) -> Vec<Value> {
        let Some(tuples) = self.spaces.get(&space_name(space)) else {
            return Vec::new();
        };

        let mut found: Vec<&Value> = match key_part(key) {
            Some(key) => tuples
                .iter()
                .filter(|tuple| {
                    primary_key(tuple).map_or(false, |pk| matches(iterator, pk, key))
                })
                .collect(),
            None => tuples.iter().collect(),
        };
        found.sort_by(|a, b| match (primary_key(a), primary_key(b)) {
            (Ok(a), Ok(b)) => compare(a, b),
            _ => Ordering::Equal,
        });
        if matches!(iterator, IteratorType::Req | IteratorType::Lt | IteratorType::Le) {
            found.reverse();
        }

        found
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect()
    }

    pub fn insert(&mut self, space: &Value, tuple: Value) -> Result<Value, ConnectionError> {
        let name = space_name(space);
        let key = primary_key(&tuple)?.clone();
        if self.position(&name, &key).is_some() {
            return Err(ConnectionError::server(
                ER_TUPLE_FOUND,
                format!("Duplicate key exists in unique index 'primary' in space '{}'", name),
            ));
        }
        self.spaces.entry(name).or_default().push(tuple.clone());
        Ok(tuple)
    }

    pub fn replace(&mut self, space: &Value, tuple: Value) -> Result<Value, ConnectionError> {
        let name = space_name(space);
        let key = primary_key(&tuple)?.clone();
        match self.position(&name, &key) {
            Some(index) => {
                if let Some(tuples) = self.spaces.get_mut(&name) {
                    tuples[index] = tuple.clone();
                }
            }
            None => self.spaces.entry(name).or_default().push(tuple.clone()),
        }
        Ok(tuple)
    }

    pub fn delete(&mut self, space: &Value, key: &Value) -> Option<Value> {
        let name = space_name(space);
        let index = self.position(&name, key_part(key)?)?;
        self.spaces.get_mut(&name).map(|tuples| tuples.remove(index))
    }

    pub fn update(
        &mut self,
        space: &Value,
        key: &Value,
        ops: &Value,
    ) -> Result<Option<Value>, ConnectionError> {
        let name = space_name(space);
        let Some(index) = key_part(key).and_then(|key| self.position(&name, key)) else {
            return Ok(None);
        };
        let Some(tuple) = self.spaces.get_mut(&name).map(|tuples| &mut tuples[index]) else {
            return Ok(None);
        };

        let mut updated = tuple.clone();
        apply_ops(&mut updated, ops)?;
        *tuple = updated.clone();
        Ok(Some(updated))
    }

    pub fn upsert(&mut self, space: &Value, tuple: Value, ops: &Value) -> Result<(), ConnectionError> {
        let key = primary_key(&tuple)?.clone();
        if self.update(space, &key, ops)?.is_none() {
            self.insert(space, tuple)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with(tuples: &[Value]) -> SpaceStore {
        let mut store = SpaceStore::default();
        for tuple in tuples {
            store.insert(&json!("test"), tuple.clone()).unwrap();
        }
        store
    }

    #[test]
    fn test_insert_and_select() {
        let store = store_with(&[json!(["a", "hello"]), json!(["b", "world"])]);

        let found = store.select(&json!("test"), &json!(["b"]), 0, 1, IteratorType::Eq);
        assert_eq!(found, vec![json!(["b", "world"])]);

        let all = store.select(&json!("test"), &json!([]), 0, u32::MAX, IteratorType::All);
        assert_eq!(all.len(), 2);

        let unknown = store.select(&json!("other"), &json!(["a"]), 0, 1, IteratorType::Eq);
        assert!(unknown.is_empty());
    }

    #[test]
    fn test_insert_duplicate_key() {
        let mut store = store_with(&[json!([1, "a"])]);
        let err = store.insert(&json!("test"), json!([1, "b"])).unwrap_err();
        assert!(matches!(err, ConnectionError::Server { code: ER_TUPLE_FOUND, .. }));
    }

    #[test]
    fn test_range_iterators() {
        let store = store_with(&[json!([1]), json!([2]), json!([3]), json!([10])]);
        let keys = |iterator| {
            store
                .select(&json!("test"), &json!([2]), 0, 10, iterator)
                .into_iter()
                .map(|tuple| tuple[0].as_i64().unwrap())
                .collect::<Vec<_>>()
        };

        assert_eq!(keys(IteratorType::Ge), vec![2, 3, 10]);
        assert_eq!(keys(IteratorType::Gt), vec![3, 10]);
        assert_eq!(keys(IteratorType::Lt), vec![1]);
        assert_eq!(keys(IteratorType::Le), vec![2, 1]);
    }

    #[test]
    fn test_replace_and_delete() {
        let mut store = store_with(&[json!(["k", "old"])]);
        store.replace(&json!("test"), json!(["k", "new"])).unwrap();
        store.replace(&json!("test"), json!(["j", "other"])).unwrap();

        assert_eq!(
            store.select(&json!("test"), &json!(["k"]), 0, 1, IteratorType::Eq),
            vec![json!(["k", "new"])]
        );
        assert_eq!(store.delete(&json!("test"), &json!(["k"])), Some(json!(["k", "new"])));
        assert_eq!(store.delete(&json!("test"), &json!(["k"])), None);
    }

    #[test]
    fn test_update_ops() {
        let mut store = store_with(&[json!(["k", "v", 10])]);

        let updated = store
            .update(&json!("test"), &json!(["k"]), &json!([["=", 1, "bye"], ["+", 2, 5]]))
            .unwrap();
        assert_eq!(updated, Some(json!(["k", "bye", 15])));

        let missing = store
            .update(&json!("test"), &json!(["x"]), &json!([["=", 1, "bye"]]))
            .unwrap();
        assert!(missing.is_none());

        let err = store
            .update(&json!("test"), &json!(["k"]), &json!([["#", 1, 1]]))
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Server { code: ER_UNSUPPORTED, .. }));
    }

    #[test]
    fn test_upsert_inserts_then_updates() {
        let mut store = SpaceStore::default();
        let ops = json!([["=", 1, "updated"]]);

        store.upsert(&json!("test"), json!(["u", "inserted"]), &ops).unwrap();
        assert_eq!(
            store.select(&json!("test"), &json!(["u"]), 0, 1, IteratorType::Eq),
            vec![json!(["u", "inserted"])]
        );

        store.upsert(&json!("test"), json!(["u", "inserted"]), &ops).unwrap();
        assert_eq!(
            store.select(&json!("test"), &json!(["u"]), 0, 1, IteratorType::Eq),
            vec![json!(["u", "updated"])]
        );
    }
}
