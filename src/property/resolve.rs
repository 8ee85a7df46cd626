//! Property path resolution against stored objects.

use crate::DataObject;
use crate::Fault;
use crate::FaultResult;
use crate::Field;
use crate::ManagedObject;
use crate::Schema;
use crate::Value;

/// Current value of `field` on `obj`.
///
/// `Ok(None)` means the path is valid but unset or empty. A path the type
/// does not declare, an index into a non-array, or a dotted step through a
/// non-data value is `InvalidProperty`.
pub(crate) fn field_value(
    schema: &Schema,
    obj: &ManagedObject,
    field: &Field,
) -> FaultResult<Option<Value>> {
    let invalid = || Fault::invalid_property(field.to_string());
    let mut segments = field.path.split('.');
    let root = segments.next().unwrap_or(&field.path);

    let Some(top) = obj.get(root) else {
        if schema.contains(obj.kind()) && !schema.declares(obj.kind(), root) {
            return Err(invalid());
        }
        return Ok(None);
    };

    let rest: Vec<&str> = segments.collect();
    let Some(mut value) = descend(schema, top, &rest).map_err(|_| invalid())? else {
        return Ok(None);
    };

    if let Some(key) = &field.key {
        let Value::Array(items) = value else {
            return Err(invalid());
        };
        let Some(element) = items.iter().find(|e| key.selects(e)) else {
            return Ok(None);
        };
        value = element;

        if let Some(item) = &field.item {
            let path: Vec<&str> = item.split('.').collect();
            match descend(schema, value, &path).map_err(|_| invalid())? {
                Some(v) => value = v,
                None => return Ok(None),
            }
        }
    }

    Ok((!value.is_empty()).then(|| value.clone()))
}

/// Follows `path` through nested data objects.
pub(crate) fn descend<'a>(
    schema: &Schema,
    mut value: &'a Value,
    path: &[&str],
) -> FaultResult<Option<&'a Value>> {
    for seg in path {
        let Value::Data(data) = value else {
            return Err(Fault::invalid_property(*seg));
        };
        match data.get(seg) {
            Some(next) => value = next,
            None if undeclared(schema, data, seg) => return Err(Fault::invalid_property(*seg)),
            None => return Ok(None),
        }
    }
    Ok(Some(value))
}

fn undeclared(
    schema: &Schema,
    data: &DataObject,
    field: &str,
) -> bool {
    match data.type_name() {
        Some(kind) => schema.contains(kind) && !schema.declares(kind, field),
        None => false,
    }
}
