//! Typed wire values.
//!
//! The backend tags structured values with a `__type` discriminator. Dates travel
//! as `{"__type": "Date", "iso": "..."}` and references to other objects as
//! `{"__type": "Pointer", "className": "...", "objectId": "..."}`. When a query
//! asks the backend to include a referenced object, the pointer arrives with the
//! target's fields inline (the backend tags those `"Object"`; both are accepted).

use crate::{error::Result, Attributes, ClassName, Error, ObjectId};
use serde_json::{json, Value};

/// Discriminator key for typed values.
pub const TYPE_KEY: &str = "__type";
/// Server-assigned id key.
pub const OBJECT_ID: &str = "objectId";
/// Server-assigned creation timestamp key.
pub const CREATED_AT: &str = "createdAt";
/// Server-assigned update timestamp key.
pub const UPDATED_AT: &str = "updatedAt";
/// Keys never sent back to the backend in a write.
pub const PROTECTED_KEYS: [&str; 3] = [OBJECT_ID, CREATED_AT, UPDATED_AT];

/// Local name of the backend's built-in user class.
pub const USER_CLASS: &str = "User";
/// Wire name of the backend's built-in user class.
pub const USER_WIRE_CLASS: &str = "_User";

const DATE_TYPE: &str = "Date";
const POINTER_TYPE: &str = "Pointer";
const OBJECT_TYPE: &str = "Object";
const CLASS_NAME_KEY: &str = "className";
const ISO_KEY: &str = "iso";

/// Map a wire class name to the local class name.
pub fn local_class_name(wire: &str) -> &str {
    if wire == USER_WIRE_CLASS {
        USER_CLASS
    } else {
        wire
    }
}

/// Map a local class name to the name the backend expects inside pointers.
pub fn wire_class_name(local: &str) -> &str {
    if local == USER_CLASS {
        USER_WIRE_CLASS
    } else {
        local
    }
}

/// A reference to an object of another class.
#[derive(Debug, Clone, PartialEq)]
pub struct Pointer {
    /// Local class name of the target
    pub class_name: ClassName,
    /// Target object id
    pub object_id: ObjectId,
    /// The target's fields, when the backend inlined them
    pub included: Option<Attributes>,
}

impl Pointer {
    /// Create a pointer without inlined fields.
    pub fn new(class_name: impl Into<ClassName>, object_id: impl Into<ObjectId>) -> Self {
        let class_name = class_name.into();
        Self {
            class_name: local_class_name(&class_name).to_string(),
            object_id: object_id.into(),
            included: None,
        }
    }

    /// Whether the target's fields arrived inline.
    pub fn is_included(&self) -> bool {
        self.included.is_some()
    }

    /// Encode as the backend's pointer composite.
    ///
    /// Inlined fields are never written back.
    pub fn to_value(&self) -> Value {
        json!({
            TYPE_KEY: POINTER_TYPE,
            CLASS_NAME_KEY: wire_class_name(&self.class_name),
            OBJECT_ID: self.object_id,
        })
    }

    /// The target's confirmed fields for building a record, including its id.
    pub fn included_attributes(&self) -> Option<Attributes> {
        self.included.as_ref().map(|fields| {
            let mut attributes = fields.clone();
            attributes.insert(OBJECT_ID.to_string(), Value::String(self.object_id.clone()));
            attributes
        })
    }

    fn from_object(obj: &Attributes, eager: bool) -> Result<Self> {
        let class_name = obj
            .get(CLASS_NAME_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidPointer("missing className".into()))?;
        let object_id = obj
            .get(OBJECT_ID)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidPointer("missing objectId".into()))?;

        let inlined: Attributes = obj
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), TYPE_KEY | CLASS_NAME_KEY | OBJECT_ID))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut pointer = Pointer::new(class_name, object_id);
        if eager || !inlined.is_empty() {
            pointer.included = Some(inlined);
        }
        Ok(pointer)
    }
}

/// What a raw field value decodes to.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// Any value without a recognised discriminator, returned unchanged
    Scalar(Value),
    /// ISO-8601 timestamp
    Date(String),
    /// Reference to another object
    Pointer(Pointer),
}

impl TypedValue {
    /// Decode a stored value.
    pub fn decode(value: &Value) -> Result<Self> {
        let Some(obj) = value.as_object() else {
            return Ok(TypedValue::Scalar(value.clone()));
        };

        match obj.get(TYPE_KEY).and_then(Value::as_str) {
            Some(DATE_TYPE) => obj
                .get(ISO_KEY)
                .and_then(Value::as_str)
                .map(|iso| TypedValue::Date(iso.to_string()))
                .ok_or_else(|| Error::InvalidPayload("Date without iso".into())),
            Some(POINTER_TYPE) => Ok(TypedValue::Pointer(Pointer::from_object(obj, false)?)),
            Some(OBJECT_TYPE) => Ok(TypedValue::Pointer(Pointer::from_object(obj, true)?)),
            _ => Ok(TypedValue::Scalar(value.clone())),
        }
    }

    /// Encode back into the wire representation.
    pub fn encode(&self) -> Value {
        match self {
            TypedValue::Scalar(v) => v.clone(),
            TypedValue::Date(iso) => date(iso),
            TypedValue::Pointer(p) => p.to_value(),
        }
    }
}

/// Build a Date composite.
pub fn date(iso: impl Into<String>) -> Value {
    json!({ TYPE_KEY: DATE_TYPE, ISO_KEY: iso.into() })
}

/// Whether a raw value is a Date composite.
pub fn is_date(value: &Value) -> bool {
    value.get(TYPE_KEY).and_then(Value::as_str) == Some(DATE_TYPE)
}

/// Whether a raw value is a pointer composite, inlined or not.
pub fn is_pointer(value: &Value) -> bool {
    matches!(
        value.get(TYPE_KEY).and_then(Value::as_str),
        Some(POINTER_TYPE | OBJECT_TYPE)
    )
}
