//! Persistence engine and lazy field resolution.
//!
//! [`Mapper`] drives the record lifecycle against a [`RemoteResource`]:
//!
//! ```text
//! New --save--> Creating --2xx--> Created --save/update--> Updating --2xx--> Created
//!                   |                                          |
//!                   +--400 known code: field error, New        +--400 known code: field error
//!                   +--400 unknown code: Error::Backend        +--transport failure: Error::Transport
//!
//! Created --destroy--> Destroyed (both attribute layers cleared)
//! ```
//!
//! Every call blocks for its round trip. Nothing is cached between calls.

use crate::error::{Error, Result};
use crate::query::QueryBuilder;
use crate::transport::{class_path, object_path, Method, RemoteResource, Request, Response};
use chrono::{DateTime, Utc};
use restmap_engine::{
    Attributes, BackendError, HookPoint, Pointer, Record, RecordState, Registry, TypedValue,
};
use serde_json::Value;

/// Tracing target for persistence operations.
pub const TRACING_TARGET: &str = "restmap_client::mapper";

/// A field value after decoding, with pointers resolved to records.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Scalar(Value),
    /// ISO-8601 timestamp
    Date(String),
    Record(Record),
}

impl FieldValue {
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            FieldValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(v) => v.as_str(),
            FieldValue::Date(iso) => Some(iso),
            FieldValue::Record(_) => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            FieldValue::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            FieldValue::Record(r) => Some(r),
            _ => None,
        }
    }

    /// The date as a UTC timestamp.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Date(iso) => parse_timestamp(iso),
            _ => None,
        }
    }
}

/// Parse a backend timestamp such as `createdAt`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Maps records onto a REST backend.
#[derive(Debug)]
pub struct Mapper<T> {
    transport: T,
    registry: Registry,
}

impl<T: RemoteResource> Mapper<T> {
    pub fn new(transport: T, registry: Registry) -> Self {
        Self {
            transport,
            registry,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// A new, unsaved record.
    pub fn build(&self, class_name: &str) -> Result<Record> {
        Ok(self.registry.construct(class_name)?)
    }

    /// A new, unsaved record with initial values.
    pub fn build_with(&self, class_name: &str, attributes: Attributes) -> Result<Record> {
        let schema = self.registry.get(class_name)?;
        Ok(Record::with_attributes(schema, attributes))
    }

    /// Start a query against a class.
    pub fn query(&self, class_name: &str) -> QueryBuilder<'_, T> {
        QueryBuilder::new(self, class_name)
    }

    /// Build and save in one step. Check `is_persisted`/`errors` on the result.
    pub fn create_with(&self, class_name: &str, attributes: Attributes) -> Result<Record> {
        let mut record = self.build_with(class_name, attributes)?;
        self.save(&mut record)?;
        Ok(record)
    }

    /// Validate, then create or update.
    ///
    /// `Ok(false)` means the record was not saved and `record.errors()` says
    /// why: local validation (no request sent) or a known backend code.
    pub fn save(&self, record: &mut Record) -> Result<bool> {
        if !record.validate() {
            tracing::debug!(
                target: TRACING_TARGET,
                class = record.class_name(),
                errors = record.errors().len(),
                "Validation failed, not saving"
            );
            return Ok(false);
        }

        run_hooks(record, HookPoint::BeforeSave);
        let saved = if record.is_persisted() {
            self.update(record)?
        } else {
            self.create(record)?
        };
        if saved {
            run_hooks(record, HookPoint::AfterSave);
        }
        Ok(saved)
    }

    /// POST pending values to the class endpoint.
    pub fn create(&self, record: &mut Record) -> Result<bool> {
        record.errors_mut().clear();
        run_hooks(record, HookPoint::BeforeCreate);

        let payload = record.attributes().pending_payload();
        let request = Request::new(Method::Post, class_path(record.class_name()))
            .with_body(Value::Object(payload));
        let response = self.transport.execute(&request)?;

        let Some(body) = self.accept(record, response)? else {
            return Ok(false);
        };
        record.apply_response(&body);
        run_hooks(record, HookPoint::AfterCreate);

        tracing::info!(
            target: TRACING_TARGET,
            class = record.class_name(),
            id = record.id().unwrap_or_default(),
            "Created record"
        );
        Ok(true)
    }

    /// PUT pending values, minus server-owned keys, to the object endpoint.
    ///
    /// A transport failure is returned as [`Error::Transport`] and leaves the
    /// record exactly as it was, pending writes included.
    pub fn update(&self, record: &mut Record) -> Result<bool> {
        let id = record
            .id()
            .ok_or_else(|| restmap_engine::Error::NotPersisted(record.class_name().to_string()))?
            .to_string();

        record.errors_mut().clear();
        run_hooks(record, HookPoint::BeforeUpdate);

        let payload = record.attributes().pending_payload();
        let request = Request::new(Method::Put, object_path(record.class_name(), &id))
            .with_body(Value::Object(payload));
        let response = match self.transport.execute(&request) {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    class = record.class_name(),
                    %id,
                    error = %err,
                    "Update did not reach the backend, record unchanged"
                );
                return Err(err.into());
            }
        };

        let Some(body) = self.accept(record, response)? else {
            return Ok(false);
        };
        record.apply_response(&body);
        run_hooks(record, HookPoint::AfterUpdate);

        tracing::debug!(target: TRACING_TARGET, class = record.class_name(), %id, "Updated record");
        Ok(true)
    }

    /// Set several fields and save.
    pub fn update_attributes(&self, record: &mut Record, attributes: Attributes) -> Result<bool> {
        record.set_all(attributes);
        self.save(record)
    }

    /// DELETE the remote object, then drop both attribute layers whatever the
    /// response status. A transport failure is still reported after clearing.
    pub fn destroy(&self, record: &mut Record) -> Result<()> {
        run_hooks(record, HookPoint::BeforeDestroy);

        let outcome = record.id().map(|id| {
            let request = Request::new(Method::Delete, object_path(record.class_name(), id));
            self.transport.execute(&request)
        });

        let class = record.class_name().to_string();
        record.mark_destroyed();
        run_hooks(record, HookPoint::AfterDestroy);

        match outcome {
            Some(Ok(response)) if !response.is_success() => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    %class,
                    status = response.status,
                    "Destroy answered with non-success status"
                );
                Ok(())
            }
            Some(Err(err)) => Err(err.into()),
            _ => Ok(()),
        }
    }

    /// Fetch one object by id.
    pub fn find(&self, class_name: &str, object_id: &str) -> Result<Record> {
        let schema = self.registry.get(class_name)?;
        let confirmed = self.fetch_object(&schema.name, object_id)?;
        Ok(Record::from_confirmed(schema, confirmed))
    }

    /// Replace confirmed values with the server's current copy. Pending writes stay.
    pub fn reload(&self, record: &mut Record) -> Result<()> {
        if record.state() == RecordState::Destroyed {
            return Err(restmap_engine::Error::NotPersisted(record.class_name().to_string()).into());
        }
        let id = record
            .id()
            .ok_or_else(|| restmap_engine::Error::NotPersisted(record.class_name().to_string()))?
            .to_string();
        let confirmed = self.fetch_object(record.class_name(), &id)?;
        record.refresh(confirmed);
        Ok(())
    }

    /// Decode a field, resolving pointers.
    ///
    /// A pointer that arrived with its target's fields inline becomes a record
    /// with no request; a bare pointer costs one lookup, made here and not
    /// before.
    pub fn get(&self, record: &Record, field: &str) -> Result<Option<FieldValue>> {
        let Some(raw) = record.get(field) else {
            return Ok(None);
        };
        let value = match TypedValue::decode(raw)? {
            TypedValue::Scalar(v) => FieldValue::Scalar(v),
            TypedValue::Date(iso) => FieldValue::Date(iso),
            TypedValue::Pointer(pointer) => FieldValue::Record(self.resolve(&pointer)?),
        };
        Ok(Some(value))
    }

    /// Turn a pointer into a record of its class.
    pub fn resolve(&self, pointer: &Pointer) -> Result<Record> {
        match pointer.included_attributes() {
            Some(attributes) => {
                tracing::trace!(
                    target: TRACING_TARGET,
                    class = %pointer.class_name,
                    id = %pointer.object_id,
                    "Resolving included pointer"
                );
                Ok(self.registry.instantiate(&pointer.class_name, attributes)?)
            }
            None => self.find(&pointer.class_name, &pointer.object_id),
        }
    }

    /// Execute a read and return its body, failing on any non-success status.
    pub(crate) fn fetch(&self, request: &Request) -> Result<Value> {
        let response = self.transport.execute(request)?;
        if response.is_success() {
            return Ok(response.body);
        }
        Err(status_error(response))
    }

    fn fetch_object(&self, class_name: &str, object_id: &str) -> Result<Attributes> {
        let request = Request::new(Method::Get, object_path(class_name, object_id));
        let response = self.transport.execute(&request)?;
        let not_found = response.status == 404
            || backend_error(&response).is_some_and(|e| e.code == restmap_engine::translate::OBJECT_NOT_FOUND);
        if not_found {
            return Err(Error::NotFound {
                class: class_name.to_string(),
                id: object_id.to_string(),
            });
        }
        if !response.is_success() {
            return Err(status_error(response));
        }
        expect_object(response.body)
    }

    /// Success body of a write, or `None` after recording a known rejection.
    fn accept(&self, record: &mut Record, response: Response) -> Result<Option<Attributes>> {
        if response.is_success() {
            return expect_object(response.body).map(Some);
        }
        if response.status != 400 {
            return Err(status_error(response));
        }

        let Some(rejection) = backend_error(&response) else {
            return Err(status_error(response));
        };
        match rejection.translate() {
            Some(field_error) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    class = record.class_name(),
                    code = rejection.code,
                    field = %field_error.field,
                    "Backend rejected record"
                );
                record
                    .errors_mut()
                    .add(field_error.field, field_error.message);
                Ok(None)
            }
            None => {
                tracing::error!(
                    target: TRACING_TARGET,
                    class = record.class_name(),
                    code = rejection.code,
                    message = %rejection.message,
                    "Backend rejected record with unmapped code"
                );
                Err(Error::Backend {
                    code: rejection.code,
                    message: rejection.message,
                })
            }
        }
    }
}

fn run_hooks(record: &mut Record, point: HookPoint) {
    for hook in record.schema().hooks_at(point) {
        hook(record);
    }
}

fn backend_error(response: &Response) -> Option<BackendError> {
    serde_json::from_value(response.body.clone()).ok()
}

fn status_error(response: Response) -> Error {
    match (response.status, backend_error(&response)) {
        (400, Some(rejection)) => Error::Backend {
            code: rejection.code,
            message: rejection.message,
        },
        (status, _) => Error::UnexpectedStatus {
            status,
            body: response.body.to_string(),
        },
    }
}

fn expect_object(body: Value) -> Result<Attributes> {
    match body {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Attributes::new()),
        other => Err(Error::InvalidResponse(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}
