//! Memory Estimator Module
//!
//! Approximates how many bytes a stored value occupies by measuring the
//! length of its JSON text (two bytes per UTF-16 unit). Measuring happens
//! through a counting serde serializer, so nothing is allocated for the text
//! itself.
//!
//! The walk keeps the memory locations of the values it is currently inside.
//! Reaching one of them again means the value contains itself (an
//! `Rc<RefCell<_>>` cycle), so a fixed placeholder is written instead of
//! recursing. Locations are released on the way back out: a value shared by
//! several fields is measured once per occurrence, the same as in its JSON
//! text. When the walk fails anyway, the estimate falls back to a heuristic
//! based on the value's top-level shape.

use std::collections::HashSet;
use std::fmt::{self, Write as _};

use serde::ser::{self, Serialize, Serializer};
use thiserror::Error;
use tracing::debug;

/// Bytes charged per entry for its timestamps.
pub const ENTRY_OVERHEAD_BYTES: usize = 24;

/// Fallback estimate for values whose shape gives no better hint.
pub const FALLBACK_BYTES: usize = 1000;

/// Fallback estimate per array element.
pub const FALLBACK_BYTES_PER_ELEMENT: usize = 100;

/// Nesting depth past which a walk is abandoned.
pub const MAX_DEPTH: usize = 256;

/// Text written in place of a value that contains itself.
pub(crate) const CIRCULAR_PLACEHOLDER: &str = "[Circular]";

// == Estimate Error ==
#[derive(Debug, Error)]
pub enum EstimateError {
    #[error("value refused to serialize: {0}")]
    Custom(String),

    #[error("nesting exceeds {0} levels")]
    TooDeep(usize),
}

impl ser::Error for EstimateError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        EstimateError::Custom(msg.to_string())
    }
}

// == Shape ==
/// Top-level kind of a value, recorded for the fallback heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Null,
    Text(usize),
    Number,
    Bool,
    Array(usize),
    Other,
}

impl Shape {
    fn fallback_bytes(self) -> usize {
        match self {
            Shape::Null => 0,
            Shape::Text(units) => units * 2,
            Shape::Number => 8,
            Shape::Bool => 4,
            Shape::Array(len) => len * FALLBACK_BYTES_PER_ELEMENT,
            Shape::Other => FALLBACK_BYTES,
        }
    }
}

// == Visit Path ==
/// Address and type of a value being walked.
type Location = (usize, &'static str);

/// Outcome of stepping into a value.
pub(crate) enum Step {
    /// Walk the value, then hand the token back to [`VisitPath::leave`].
    Enter(Option<Location>),
    /// The value is one of its own ancestors.
    Cycle,
}

/// Locations from the root of a walk down to the current value.
#[derive(Debug, Default)]
pub(crate) struct VisitPath {
    open: HashSet<Location>,
    depth: usize,
}

impl VisitPath {
    pub(crate) fn enter<T: ?Sized>(&mut self, value: &T) -> Result<Step, EstimateError> {
        // Zero-sized values share addresses, so they cannot be told apart.
        let location = (std::mem::size_of_val(value) != 0).then(|| {
            (
                (value as *const T).cast::<()>() as usize,
                std::any::type_name::<T>(),
            )
        });

        if let Some(location) = location {
            if self.open.contains(&location) {
                return Ok(Step::Cycle);
            }
        }
        if self.depth >= MAX_DEPTH {
            return Err(EstimateError::TooDeep(MAX_DEPTH));
        }

        if let Some(location) = location {
            self.open.insert(location);
        }
        self.depth += 1;
        Ok(Step::Enter(location))
    }

    pub(crate) fn leave(&mut self, location: Option<Location>) {
        self.depth = self.depth.saturating_sub(1);
        if let Some(location) = location {
            self.open.remove(&location);
        }
    }
}

// == Memory Estimator ==
/// Size estimation for cache values and entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryEstimator;

impl MemoryEstimator {
    /// Estimates the byte size of `value`. Never panics on cyclic data.
    pub fn estimate<T: Serialize + ?Sized>(value: &T) -> usize {
        let mut counter = SizeCounter::default();
        match counter.visit(value) {
            Ok(()) => match counter.shape {
                Some(Shape::Null) => 0,
                _ => counter.units.saturating_mul(2),
            },
            Err(err) => {
                let shape = counter.shape.unwrap_or(Shape::Other);
                debug!(error = %err, ?shape, "Falling back to shape-based size estimate");
                shape.fallback_bytes()
            }
        }
    }

    /// Bytes charged for an entry: key text, value estimate and overhead.
    pub fn entry_footprint(key: &str, value_bytes: usize) -> usize {
        utf16_len(key)
            .saturating_mul(2)
            .saturating_add(value_bytes)
            .saturating_add(ENTRY_OVERHEAD_BYTES)
    }
}

fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

/// UTF-16 units of `s` as a quoted, escaped JSON string.
fn json_str_units(s: &str) -> usize {
    2 + s
        .chars()
        .map(|c| match c {
            '"' | '\\' | '\n' | '\r' | '\t' | '\u{08}' | '\u{0c}' => 2,
            c if (c as u32) < 0x20 => 6,
            c => c.len_utf16(),
        })
        .sum::<usize>()
}

/// Length of a value's `Display` output.
fn display_units(value: impl fmt::Display) -> usize {
    struct Tally(usize);

    impl fmt::Write for Tally {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            self.0 += s.len();
            Ok(())
        }
    }

    let mut tally = Tally(0);
    let _ = write!(tally, "{value}");
    tally.0
}

fn float_units(value: f64) -> usize {
    if value.is_finite() {
        display_units(format_args!("{value:?}"))
    } else {
        4
    }
}

// == Size Counter ==
/// Serializer that tallies JSON text length instead of producing it.
#[derive(Debug, Default)]
struct SizeCounter {
    units: usize,
    path: VisitPath,
    shape: Option<Shape>,
}

impl SizeCounter {
    fn note(&mut self, shape: Shape) {
        if self.shape.is_none() {
            self.shape = Some(shape);
        }
    }

    fn add(&mut self, units: usize) {
        self.units = self.units.saturating_add(units);
    }

    /// Walks into `value` unless it is one of its own ancestors.
    fn visit<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EstimateError> {
        let Step::Enter(location) = self.path.enter(value)? else {
            self.add(json_str_units(CIRCULAR_PLACEHOLDER));
            return Ok(());
        };

        let result = value.serialize(&mut *self);
        self.path.leave(location);
        result
    }

    /// `{"variant":` prefix of externally tagged enum variants.
    fn variant_prefix(variant: &str) -> usize {
        1 + json_str_units(variant) + 1
    }
}

/// In-progress sequence, map or struct.
struct Compound<'a> {
    counter: &'a mut SizeCounter,
    first: bool,
    close: usize,
}

impl<'a> Compound<'a> {
    fn open(counter: &'a mut SizeCounter, shape: Shape, units: usize, close: usize) -> Self {
        counter.note(shape);
        counter.add(units);
        Compound {
            counter,
            first: true,
            close,
        }
    }

    fn separator(&mut self) {
        if self.first {
            self.first = false;
        } else {
            self.counter.add(1);
        }
    }

    fn element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EstimateError> {
        self.separator();
        self.counter.visit(value)
    }

    fn field<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> Result<(), EstimateError> {
        self.separator();
        self.counter.add(json_str_units(name) + 1);
        self.counter.visit(value)
    }

    fn finish(self) -> Result<(), EstimateError> {
        self.counter.add(self.close);
        Ok(())
    }
}

impl<'a> ser::Serializer for &'a mut SizeCounter {
    type Ok = ();
    type Error = EstimateError;

    type SerializeSeq = Compound<'a>;
    type SerializeTuple = Compound<'a>;
    type SerializeTupleStruct = Compound<'a>;
    type SerializeTupleVariant = Compound<'a>;
    type SerializeMap = Compound<'a>;
    type SerializeStruct = Compound<'a>;
    type SerializeStructVariant = Compound<'a>;

    fn serialize_bool(self, v: bool) -> Result<(), EstimateError> {
        self.note(Shape::Bool);
        self.add(if v { 4 } else { 5 });
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<(), EstimateError> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<(), EstimateError> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<(), EstimateError> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<(), EstimateError> {
        self.note(Shape::Number);
        self.add(display_units(v));
        Ok(())
    }

    fn serialize_i128(self, v: i128) -> Result<(), EstimateError> {
        self.note(Shape::Number);
        self.add(display_units(v));
        Ok(())
    }

    fn serialize_u8(self, v: u8) -> Result<(), EstimateError> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<(), EstimateError> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<(), EstimateError> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<(), EstimateError> {
        self.note(Shape::Number);
        self.add(display_units(v));
        Ok(())
    }

    fn serialize_u128(self, v: u128) -> Result<(), EstimateError> {
        self.note(Shape::Number);
        self.add(display_units(v));
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Result<(), EstimateError> {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<(), EstimateError> {
        self.note(Shape::Number);
        self.add(float_units(v));
        Ok(())
    }

    fn serialize_char(self, v: char) -> Result<(), EstimateError> {
        let mut buf = [0u8; 4];
        self.serialize_str(v.encode_utf8(&mut buf))
    }

    fn serialize_str(self, v: &str) -> Result<(), EstimateError> {
        self.note(Shape::Text(utf16_len(v)));
        self.add(json_str_units(v));
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<(), EstimateError> {
        self.note(Shape::Array(v.len()));
        let digits: usize = v.iter().map(|b| display_units(*b)).sum();
        self.add(2 + digits + v.len().saturating_sub(1));
        Ok(())
    }

    fn serialize_none(self) -> Result<(), EstimateError> {
        self.serialize_unit()
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), EstimateError> {
        self.visit(value)
    }

    fn serialize_unit(self) -> Result<(), EstimateError> {
        self.note(Shape::Null);
        self.add(4);
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), EstimateError> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<(), EstimateError> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), EstimateError> {
        self.visit(value)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<(), EstimateError> {
        self.note(Shape::Other);
        self.add(SizeCounter::variant_prefix(variant));
        self.visit(value)?;
        self.add(1);
        Ok(())
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Compound<'a>, EstimateError> {
        Ok(Compound::open(self, Shape::Array(len.unwrap_or(0)), 1, 1))
    }

    fn serialize_tuple(self, len: usize) -> Result<Compound<'a>, EstimateError> {
        Ok(Compound::open(self, Shape::Array(len), 1, 1))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Compound<'a>, EstimateError> {
        Ok(Compound::open(self, Shape::Array(len), 1, 1))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Compound<'a>, EstimateError> {
        let prefix = SizeCounter::variant_prefix(variant) + 1;
        Ok(Compound::open(self, Shape::Other, prefix, 2))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Compound<'a>, EstimateError> {
        Ok(Compound::open(self, Shape::Other, 1, 1))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Compound<'a>, EstimateError> {
        Ok(Compound::open(self, Shape::Other, 1, 1))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Compound<'a>, EstimateError> {
        let prefix = SizeCounter::variant_prefix(variant) + 1;
        Ok(Compound::open(self, Shape::Other, prefix, 2))
    }
}

impl ser::SerializeSeq for Compound<'_> {
    type Ok = ();
    type Error = EstimateError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EstimateError> {
        self.element(value)
    }

    fn end(self) -> Result<(), EstimateError> {
        self.finish()
    }
}

impl ser::SerializeTuple for Compound<'_> {
    type Ok = ();
    type Error = EstimateError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EstimateError> {
        self.element(value)
    }

    fn end(self) -> Result<(), EstimateError> {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for Compound<'_> {
    type Ok = ();
    type Error = EstimateError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EstimateError> {
        self.element(value)
    }

    fn end(self) -> Result<(), EstimateError> {
        self.finish()
    }
}

impl ser::SerializeTupleVariant for Compound<'_> {
    type Ok = ();
    type Error = EstimateError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EstimateError> {
        self.element(value)
    }

    fn end(self) -> Result<(), EstimateError> {
        self.finish()
    }
}

impl ser::SerializeMap for Compound<'_> {
    type Ok = ();
    type Error = EstimateError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), EstimateError> {
        self.element(key)
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EstimateError> {
        self.counter.add(1);
        self.counter.visit(value)
    }

    fn end(self) -> Result<(), EstimateError> {
        self.finish()
    }
}

impl ser::SerializeStruct for Compound<'_> {
    type Ok = ();
    type Error = EstimateError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), EstimateError> {
        self.field(key, value)
    }

    fn end(self) -> Result<(), EstimateError> {
        self.finish()
    }
}

impl ser::SerializeStructVariant for Compound<'_> {
    type Ok = ();
    type Error = EstimateError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), EstimateError> {
        self.field(key, value)
    }

    fn end(self) -> Result<(), EstimateError> {
        self.finish()
    }
}
