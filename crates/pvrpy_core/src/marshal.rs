//! Conversions between Python objects and host values.
//!
//! Rules:
//! - Integers are read through the integer accessor only; floats and
//!   strings are rejected rather than coerced.
//! - A boolean is true only when it *is* the interpreter's `True` object.
//!   No truthiness coercion.
//! - Text is reduced to ASCII by asking Python to encode with `ignore`,
//!   then copied into an owned `String`. Nothing returned from here
//!   borrows interpreter memory.
//! - Every invocation is settled through [`settle`], which polls the
//!   interpreter's error state and turns a pending exception into a
//!   logged, cleared [`BridgeError::RuntimeFault`].
//!
//! Python references are `Bound` values, so each one is released exactly
//! once when it goes out of scope, including on early returns.

use pyo3::prelude::*;
use pyo3::types::{PyBool, PyByteArray, PyBytes, PyDict, PyInt, PyString, PyTuple};
use tracing::error;

use crate::config::AddonConfig;
use crate::error::{BridgeError, BridgeResult, MarshalError};

/// Settle the outcome of a call into the implementation.
///
/// A raised exception, or an error indicator left pending alongside a
/// return value, becomes a [`BridgeError::RuntimeFault`]. The fault is
/// logged with its traceback and cleared; the partial value is dropped.
pub fn settle<'py>(
    py: Python<'py>,
    operation: &'static str,
    result: PyResult<Bound<'py, PyAny>>,
) -> BridgeResult<Bound<'py, PyAny>> {
    match result {
        Ok(value) => match PyErr::take(py) {
            None => Ok(value),
            Some(err) => Err(surface_fault(py, operation, err)),
        },
        Err(err) => Err(surface_fault(py, operation, err)),
    }
}

/// Log a Python exception and convert it into a bridge error.
pub fn surface_fault(py: Python<'_>, operation: &'static str, err: PyErr) -> BridgeError {
    let traceback = err.traceback(py).and_then(|tb| tb.format().ok());
    match traceback {
        Some(tb) => error!(operation, "Python fault: {}\n{}", err, tb.trim_end()),
        None => error!(operation, "Python fault: {}", err),
    }
    BridgeError::runtime_fault(operation, err.to_string())
}

/// Identity check against the canonical `True` object.
pub fn is_true(value: &Bound<'_, PyAny>) -> bool {
    value.as_ptr() == PyBool::new(value.py(), true).as_ptr()
}

/// Read a Python int. `None` for anything that is not an int or does not fit in 64 bits.
pub fn int_value(value: &Bound<'_, PyAny>) -> Option<i64> {
    if !value.is_instance_of::<PyInt>() {
        return None;
    }
    value.extract::<i64>().ok()
}

/// Read text as an owned ASCII string, dropping anything ASCII cannot hold.
///
/// Accepts `str` and `bytes`.
pub fn text_value(value: &Bound<'_, PyAny>) -> Option<String> {
    let raw = if value.is_instance_of::<PyString>() {
        let encoded = value.call_method1("encode", ("ascii", "ignore")).ok()?;
        encoded.downcast::<PyBytes>().ok()?.as_bytes().to_vec()
    } else if let Ok(bytes) = value.downcast::<PyBytes>() {
        bytes.as_bytes().iter().copied().filter(u8::is_ascii).collect()
    } else {
        return None;
    };
    // ASCII only at this point, so this never replaces anything.
    Some(String::from_utf8_lossy(&raw).into_owned())
}

/// Read a binary payload verbatim into an owned buffer.
///
/// `bytes` and `bytearray` are copied as-is; `str` goes through [`text_value`].
pub fn payload_value(value: &Bound<'_, PyAny>) -> Option<Vec<u8>> {
    if let Ok(bytes) = value.downcast::<PyBytes>() {
        return Some(bytes.as_bytes().to_vec());
    }
    if let Ok(array) = value.downcast::<PyByteArray>() {
        return Some(array.to_vec());
    }
    text_value(value).map(String::into_bytes)
}

/// Convert a call result to an integer or report the mismatch.
pub fn to_int(operation: &'static str, value: &Bound<'_, PyAny>) -> BridgeResult<i64> {
    int_value(value).ok_or_else(|| MarshalError::shape(operation, "an int").into())
}

/// Convert a call result to text or report the mismatch.
pub fn to_text(operation: &'static str, value: &Bound<'_, PyAny>) -> BridgeResult<String> {
    text_value(value).ok_or_else(|| MarshalError::shape(operation, "a str").into())
}

/// Split a tuple result into at least `min_len` items.
pub fn tuple_items<'py>(
    operation: &'static str,
    value: &Bound<'py, PyAny>,
    min_len: usize,
    expected: &'static str,
) -> BridgeResult<Vec<Bound<'py, PyAny>>> {
    let tuple = value
        .downcast::<PyTuple>()
        .map_err(|_| MarshalError::shape(operation, expected))?;
    if tuple.len() < min_len {
        return Err(MarshalError::shape(operation, expected).into());
    }
    Ok(tuple.iter().collect())
}

/// Integer narrowing with C assignment semantics.
pub trait Narrow: Sized {
    fn narrow(value: i64) -> Self;
}

impl Narrow for i64 {
    fn narrow(value: i64) -> Self {
        value
    }
}

impl Narrow for i32 {
    fn narrow(value: i64) -> Self {
        value as i32
    }
}

impl Narrow for u32 {
    fn narrow(value: i64) -> Self {
        value as u32
    }
}

/// Reads the named fields of one structured callback argument.
///
/// Objects are read by attribute, dicts by key. Each accessor validates
/// presence and type before copying.
pub struct FieldReader<'a, 'py> {
    source: &'a Bound<'py, PyAny>,
    record: &'static str,
}

impl<'a, 'py> FieldReader<'a, 'py> {
    pub fn new(source: &'a Bound<'py, PyAny>, record: &'static str) -> Self {
        Self { source, record }
    }

    pub fn record(&self) -> &'static str {
        self.record
    }

    fn lookup(&self, field: &'static str) -> Option<Bound<'py, PyAny>> {
        if let Ok(dict) = self.source.downcast::<PyDict>() {
            return dict.get_item(field).ok().flatten();
        }
        self.source.getattr(field).ok()
    }

    fn require(&self, field: &'static str) -> Result<Bound<'py, PyAny>, MarshalError> {
        self.lookup(field)
            .ok_or_else(|| MarshalError::missing(self.record, field))
    }

    /// An integer field narrowed to the host width.
    pub fn int<T: Narrow>(&self, field: &'static str) -> Result<T, MarshalError> {
        let value = self.require(field)?;
        int_value(&value)
            .map(T::narrow)
            .ok_or_else(|| MarshalError::wrong_type(self.record, field, "an int"))
    }

    /// A boolean field; true only for the canonical `True`.
    pub fn flag(&self, field: &'static str) -> Result<bool, MarshalError> {
        let value = self.require(field)?;
        if !value.is_instance_of::<PyBool>() {
            return Err(MarshalError::wrong_type(self.record, field, "a bool"));
        }
        Ok(is_true(&value))
    }

    /// A string field, copied into an owned buffer.
    pub fn text(&self, field: &'static str) -> Result<String, MarshalError> {
        let value = self.require(field)?;
        text_value(&value).ok_or_else(|| MarshalError::wrong_type(self.record, field, "a str"))
    }

    /// A timestamp field. `precomputed` (the `_c`-prefixed epoch seconds an
    /// implementation may provide next to a rich value) wins when present.
    pub fn time(&self, field: &'static str, precomputed: &'static str) -> Result<i64, MarshalError> {
        if self.lookup(precomputed).is_some() {
            return self.int(precomputed);
        }
        self.int(field)
    }
}

/// The configuration mapping handed to the implementation's `ADDON_Create`.
pub fn config_mapping<'py>(py: Python<'py>, config: &AddonConfig) -> PyResult<Bound<'py, PyDict>> {
    let mapping = PyDict::new(py);
    mapping.set_item("userPath", config.user_path.as_str())?;
    mapping.set_item("clientPath", config.client_path.as_str())?;
    mapping.set_item("epgMaxDays", config.epg_max_days)?;
    Ok(mapping)
}
