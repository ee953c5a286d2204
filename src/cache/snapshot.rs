//! JSON Snapshot Module
//!
//! Converts any serializable value into a `serde_json::Value` without
//! assuming it is a tree. A value that contains itself is cut at the point
//! where it loops back and `"[Circular]"` is written there. Parts that refuse
//! to serialize, or sit deeper than the walk allows, become `null`. The
//! conversion therefore always produces something storable.

use serde::ser::{self, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::cache::estimate::{EstimateError, Step, VisitPath, CIRCULAR_PLACEHOLDER};

// == JSON Snapshot ==
/// Cycle-safe replacement for `serde_json::to_value`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSnapshot;

impl JsonSnapshot {
    /// Captures `value` as JSON. Never fails and never recurses forever.
    pub fn capture<T: Serialize + ?Sized>(value: &T) -> Value {
        let mut builder = ValueBuilder::default();
        let captured = builder.visit(value);
        if builder.substituted > 0 {
            debug!(
                substituted = builder.substituted,
                "Unencodable parts of a value were stored as null"
            );
        }
        captured
    }
}

#[derive(Debug, Default)]
struct ValueBuilder {
    path: VisitPath,
    substituted: usize,
}

impl ValueBuilder {
    fn visit<T: Serialize + ?Sized>(&mut self, value: &T) -> Value {
        match self.path.enter(value) {
            Ok(Step::Enter(location)) => {
                let result = value.serialize(&mut *self);
                self.path.leave(location);
                result.unwrap_or_else(|err| self.substitute(err))
            }
            Ok(Step::Cycle) => Value::String(CIRCULAR_PLACEHOLDER.to_string()),
            Err(err) => self.substitute(err),
        }
    }

    fn substitute(&mut self, err: EstimateError) -> Value {
        self.substituted += 1;
        debug!(error = %err, "Replacing unencodable value with null");
        Value::Null
    }
}

/// Wraps `value` as `{"variant": value}` for externally tagged variants.
fn tagged(variant: Option<&'static str>, value: Value) -> Value {
    match variant {
        Some(variant) => {
            let mut map = Map::new();
            map.insert(variant.to_string(), value);
            Value::Object(map)
        }
        None => value,
    }
}

/// Object keys are text; scalars use their JSON spelling.
fn key_text(key: Value) -> String {
    match key {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

fn wide_number<N>(value: N) -> Result<Value, EstimateError>
where
    N: Copy + std::fmt::Display,
    i64: TryFrom<N>,
    u64: TryFrom<N>,
{
    if let Ok(small) = i64::try_from(value) {
        return Ok(Value::from(small));
    }
    if let Ok(small) = u64::try_from(value) {
        return Ok(Value::from(small));
    }
    Err(EstimateError::Custom(format!("{value} does not fit in 64 bits")))
}

/// In-progress array, optionally inside a variant tag.
struct SeqBuilder<'a> {
    builder: &'a mut ValueBuilder,
    variant: Option<&'static str>,
    items: Vec<Value>,
}

impl SeqBuilder<'_> {
    fn push<T: Serialize + ?Sized>(&mut self, value: &T) {
        let item = self.builder.visit(value);
        self.items.push(item);
    }

    fn finish(self) -> Result<Value, EstimateError> {
        Ok(tagged(self.variant, Value::Array(self.items)))
    }
}

/// In-progress object, optionally inside a variant tag.
struct MapBuilder<'a> {
    builder: &'a mut ValueBuilder,
    variant: Option<&'static str>,
    map: Map<String, Value>,
    pending_key: Option<String>,
}

impl MapBuilder<'_> {
    fn insert<T: Serialize + ?Sized>(&mut self, key: String, value: &T) {
        let value = self.builder.visit(value);
        self.map.insert(key, value);
    }

    fn finish(self) -> Result<Value, EstimateError> {
        Ok(tagged(self.variant, Value::Object(self.map)))
    }
}

impl<'a> ser::Serializer for &'a mut ValueBuilder {
    type Ok = Value;
    type Error = EstimateError;

    type SerializeSeq = SeqBuilder<'a>;
    type SerializeTuple = SeqBuilder<'a>;
    type SerializeTupleStruct = SeqBuilder<'a>;
    type SerializeTupleVariant = SeqBuilder<'a>;
    type SerializeMap = MapBuilder<'a>;
    type SerializeStruct = MapBuilder<'a>;
    type SerializeStructVariant = MapBuilder<'a>;

    fn serialize_bool(self, v: bool) -> Result<Value, EstimateError> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, EstimateError> {
        Ok(Value::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, EstimateError> {
        Ok(Value::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, EstimateError> {
        Ok(Value::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, EstimateError> {
        Ok(Value::from(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Value, EstimateError> {
        wide_number(v)
    }

    fn serialize_u8(self, v: u8) -> Result<Value, EstimateError> {
        Ok(Value::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, EstimateError> {
        Ok(Value::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, EstimateError> {
        Ok(Value::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, EstimateError> {
        Ok(Value::from(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, EstimateError> {
        wide_number(v)
    }

    fn serialize_f32(self, v: f32) -> Result<Value, EstimateError> {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, EstimateError> {
        // Non-finite floats have no JSON spelling.
        Ok(Number::from_f64(v).map_or(Value::Null, Value::Number))
    }

    fn serialize_char(self, v: char) -> Result<Value, EstimateError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, EstimateError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, EstimateError> {
        Ok(Value::Array(v.iter().map(|b| Value::from(*b)).collect()))
    }

    fn serialize_none(self) -> Result<Value, EstimateError> {
        Ok(Value::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Value, EstimateError> {
        Ok(self.visit(value))
    }

    fn serialize_unit(self) -> Result<Value, EstimateError> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, EstimateError> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value, EstimateError> {
        Ok(Value::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, EstimateError> {
        Ok(self.visit(value))
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, EstimateError> {
        let inner = self.visit(value);
        Ok(tagged(Some(variant), inner))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder<'a>, EstimateError> {
        Ok(SeqBuilder {
            builder: self,
            variant: None,
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder<'a>, EstimateError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqBuilder<'a>, EstimateError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SeqBuilder<'a>, EstimateError> {
        Ok(SeqBuilder {
            builder: self,
            variant: Some(variant),
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapBuilder<'a>, EstimateError> {
        Ok(MapBuilder {
            builder: self,
            variant: None,
            map: Map::new(),
            pending_key: None,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<MapBuilder<'a>, EstimateError> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<MapBuilder<'a>, EstimateError> {
        Ok(MapBuilder {
            builder: self,
            variant: Some(variant),
            map: Map::new(),
            pending_key: None,
        })
    }
}

impl ser::SerializeSeq for SeqBuilder<'_> {
    type Ok = Value;
    type Error = EstimateError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EstimateError> {
        self.push(value);
        Ok(())
    }

    fn end(self) -> Result<Value, EstimateError> {
        self.finish()
    }
}

impl ser::SerializeTuple for SeqBuilder<'_> {
    type Ok = Value;
    type Error = EstimateError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EstimateError> {
        self.push(value);
        Ok(())
    }

    fn end(self) -> Result<Value, EstimateError> {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for SeqBuilder<'_> {
    type Ok = Value;
    type Error = EstimateError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EstimateError> {
        self.push(value);
        Ok(())
    }

    fn end(self) -> Result<Value, EstimateError> {
        self.finish()
    }
}

impl ser::SerializeTupleVariant for SeqBuilder<'_> {
    type Ok = Value;
    type Error = EstimateError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EstimateError> {
        self.push(value);
        Ok(())
    }

    fn end(self) -> Result<Value, EstimateError> {
        self.finish()
    }
}

impl ser::SerializeMap for MapBuilder<'_> {
    type Ok = Value;
    type Error = EstimateError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), EstimateError> {
        let key = self.builder.visit(key);
        self.pending_key = Some(key_text(key));
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EstimateError> {
        let key = self.pending_key.take().unwrap_or_default();
        self.insert(key, value);
        Ok(())
    }

    fn end(self) -> Result<Value, EstimateError> {
        self.finish()
    }
}

impl ser::SerializeStruct for MapBuilder<'_> {
    type Ok = Value;
    type Error = EstimateError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), EstimateError> {
        self.insert(key.to_string(), value);
        Ok(())
    }

    fn end(self) -> Result<Value, EstimateError> {
        self.finish()
    }
}

impl ser::SerializeStructVariant for MapBuilder<'_> {
    type Ok = Value;
    type Error = EstimateError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), EstimateError> {
        self.insert(key.to_string(), value);
        Ok(())
    }

    fn end(self) -> Result<Value, EstimateError> {
        self.finish()
    }
}
