use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    row::{Decode, DbValue, DecodeError},
    types::Value,
};

/// Decode json document stored in a text value.
///
/// Use [`Json::to_value`] to bind the document as text parameter.
#[derive(Debug)]
pub struct Json<T>(pub T);

impl<T: DeserializeOwned> Decode for Json<T> {
    fn decode(column: DbValue<'_>) -> Result<Self, DecodeError> {
        match column.value() {
            Value::Text(s) => serde_json::from_str(s).map(Json).map_err(Into::into),
            Value::Bytes(b) => serde_json::from_slice(b).map(Json).map_err(Into::into),
            Value::Null => Err(DecodeError::Null),
            _ => Err(DecodeError::TypeMismatch { expect: "Json", found: column.field().data_type() }),
        }
    }
}

impl<T: Serialize> Json<T> {
    /// Serialize into text value.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_string(&self.0).map(Value::Text)
    }
}

impl<T: Serialize> Serialize for Json<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Json<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Self(T::deserialize(deserializer)?))
    }
}
