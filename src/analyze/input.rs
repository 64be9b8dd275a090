// src/analyze/input.rs
//! Accepted input shapes. Anything that is not text becomes `InvalidInput`
//! here, before the pipeline runs.

use std::borrow::Cow;

use serde_json::Value;

use crate::error::{Result, SentimentError};

pub trait TextInput {
    fn as_text(&self) -> Result<Cow<'_, str>>;
}

impl TextInput for str {
    fn as_text(&self) -> Result<Cow<'_, str>> {
        Ok(Cow::Borrowed(self))
    }
}

impl TextInput for String {
    fn as_text(&self) -> Result<Cow<'_, str>> {
        Ok(Cow::Borrowed(self.as_str()))
    }
}

impl<T: TextInput + ?Sized> TextInput for &T {
    fn as_text(&self) -> Result<Cow<'_, str>> {
        (**self).as_text()
    }
}

impl TextInput for [u8] {
    fn as_text(&self) -> Result<Cow<'_, str>> {
        std::str::from_utf8(self)
            .map(Cow::Borrowed)
            .map_err(|e| SentimentError::invalid_input(format!("bytes are not UTF-8: {e}")))
    }
}

impl TextInput for Vec<u8> {
    fn as_text(&self) -> Result<Cow<'_, str>> {
        self.as_slice().as_text()
    }
}

impl TextInput for Value {
    fn as_text(&self) -> Result<Cow<'_, str>> {
        match self {
            Value::String(s) => Ok(Cow::Borrowed(s.as_str())),
            other => Err(SentimentError::invalid_input(format!(
                "expected a string, got {}",
                json_kind(other)
            ))),
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_shapes_pass_through() {
        assert_eq!("hi".as_text().unwrap(), "hi");
        assert_eq!(String::from("hi").as_text().unwrap(), "hi");
        assert_eq!(json!("hi").as_text().unwrap(), "hi");
        assert_eq!(b"hi".as_slice().as_text().unwrap(), "hi");
    }

    #[test]
    fn non_text_is_invalid_input() {
        for v in [json!(12345), json!(null), json!([1]), json!({"a": 1}), json!(true)] {
            let err = v.as_text().unwrap_err();
            assert!(matches!(err, SentimentError::InvalidInput(_)), "{v}");
        }
        let bad = vec![0xff_u8, 0xfe];
        assert!(matches!(
            bad.as_text(),
            Err(SentimentError::InvalidInput(_))
        ));
    }
}
