use std::collections::BTreeMap;

use rmpv::Value;

use crate::error::{CodecError, Result};
use crate::floats::{pack_floats, unpack_floats};

/// Reserved key: class label → packed `x1,y1,x2,y2` float32 boxes.
pub const BBOXES_KEY: &str = "BBoxes_xyxy";

/// Reserved key: packed float32 embedding vector.
pub const IDENTITY_KEY: &str = "Identity";

const FLOATS_PER_BOX: usize = 4;

/// One value of an [`InferenceResult`].
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Any non-reserved value, exactly as decoded.
    Opaque(Value),
    /// Unpacked float32 array (the `Identity` key).
    Floats(Vec<f32>),
    /// Unpacked float32 arrays per label (the `BBoxes_xyxy` key).
    ///
    /// Labels are unique and re-encode in sorted order.
    LabeledFloats(BTreeMap<String, Vec<f32>>),
}

/// A bounding box in corner form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

/// A decoded inference result: string keys mapped to [`Field`]s.
///
/// Entries keep insertion (wire) order. Reserved keys always hold their
/// unpacked float form; everything else is opaque.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InferenceResult {
    entries: Vec<(String, Field)>,
}

impl InferenceResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a field by key.
    pub fn get(&self, key: &str) -> Option<&Field> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, field)| field)
    }

    /// Insert a raw map value, unpacking it if `key` is reserved.
    ///
    /// Returns the previous field for `key`, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Result<Option<Field>> {
        let key = key.into();
        let field = resolve_field(&key, value)?;
        Ok(self.put(key, field))
    }

    /// Remove a field by key.
    pub fn remove(&mut self, key: &str) -> Option<Field> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Iterate over entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.entries.iter().map(|(k, field)| (k.as_str(), field))
    }

    /// The `BBoxes_xyxy` field, if present.
    pub fn bboxes(&self) -> Option<&BTreeMap<String, Vec<f32>>> {
        match self.get(BBOXES_KEY) {
            Some(Field::LabeledFloats(map)) => Some(map),
            _ => None,
        }
    }

    /// Boxes for one class label. A trailing partial box is ignored.
    pub fn boxes(&self, label: &str) -> impl Iterator<Item = BoundingBox> + '_ {
        self.bboxes()
            .and_then(|map| map.get(label))
            .map(Vec::as_slice)
            .unwrap_or_default()
            .chunks_exact(FLOATS_PER_BOX)
            .map(|c| BoundingBox {
                x1: c[0],
                y1: c[1],
                x2: c[2],
                y2: c[3],
            })
    }

    /// Replace the `BBoxes_xyxy` field.
    pub fn set_bboxes(&mut self, boxes: BTreeMap<String, Vec<f32>>) -> Option<Field> {
        self.put(BBOXES_KEY.to_string(), Field::LabeledFloats(boxes))
    }

    /// The `Identity` embedding, if present.
    pub fn identity(&self) -> Option<&[f32]> {
        match self.get(IDENTITY_KEY) {
            Some(Field::Floats(values)) => Some(values),
            _ => None,
        }
    }

    /// Replace the `Identity` field.
    pub fn set_identity(&mut self, values: Vec<f32>) -> Option<Field> {
        self.put(IDENTITY_KEY.to_string(), Field::Floats(values))
    }

    fn put(&mut self, key: String, field: Field) -> Option<Field> {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, field)),
            None => {
                self.entries.push((key, field));
                None
            }
        }
    }

    pub(crate) fn into_entries(self) -> Vec<(String, Field)> {
        self.entries
    }

    pub(crate) fn from_resolved(entries: Vec<(String, Field)>) -> Self {
        Self { entries }
    }
}

/// Turn a raw map value into its field form, unpacking reserved keys.
pub(crate) fn resolve_field(key: &str, value: Value) -> Result<Field> {
    match key {
        BBOXES_KEY => {
            let Value::Map(pairs) = value else {
                return Err(CodecError::UnexpectedType {
                    key: key.to_string(),
                    expected: "map of label to binary",
                });
            };
            let mut boxes = BTreeMap::new();
            for (label, packed) in pairs {
                let label = match label {
                    Value::String(s) if s.is_str() => s.into_str().unwrap_or_default(),
                    other => return Err(CodecError::NonStringKey(other.to_string())),
                };
                let Value::Binary(packed) = packed else {
                    return Err(CodecError::UnexpectedType {
                        key: format!("{BBOXES_KEY}.{label}"),
                        expected: "binary",
                    });
                };
                if boxes.contains_key(&label) {
                    return Err(CodecError::UnexpectedType {
                        key: format!("{BBOXES_KEY}.{label}"),
                        expected: "label that appears once",
                    });
                }
                let values = unpack_floats(&format!("{BBOXES_KEY}.{label}"), &packed)?;
                boxes.insert(label, values);
            }
            Ok(Field::LabeledFloats(boxes))
        }
        IDENTITY_KEY => {
            let Value::Binary(packed) = value else {
                return Err(CodecError::UnexpectedType {
                    key: key.to_string(),
                    expected: "binary",
                });
            };
            Ok(Field::Floats(unpack_floats(IDENTITY_KEY, &packed)?))
        }
        _ => Ok(Field::Opaque(value)),
    }
}

/// Turn a field back into its raw map value.
pub(crate) fn pack_field(field: Field) -> Value {
    match field {
        Field::Opaque(value) => value,
        Field::Floats(values) => Value::Binary(pack_floats(&values)),
        Field::LabeledFloats(boxes) => Value::Map(
            boxes
                .into_iter()
                .map(|(label, values)| (Value::from(label), Value::Binary(pack_floats(&values))))
                .collect(),
        ),
    }
}
