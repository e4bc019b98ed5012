//! Filtered lookups against a class endpoint.

use crate::error::{Error, Result};
use crate::mapper::Mapper;
use crate::transport::{class_path, Method, RemoteResource, Request};
use restmap_engine::{Attributes, ClassName, Pointer, Record};
use serde_json::Value;

/// Builder for querying records of one class.
#[derive(Debug)]
pub struct QueryBuilder<'a, T> {
    mapper: &'a Mapper<T>,
    class_name: ClassName,
    constraints: Attributes,
    includes: Vec<String>,
    limit: Option<usize>,
    order: Option<String>,
}

impl<'a, T: RemoteResource> QueryBuilder<'a, T> {
    pub(crate) fn new(mapper: &'a Mapper<T>, class_name: &str) -> Self {
        Self {
            mapper,
            class_name: class_name.to_string(),
            constraints: Attributes::new(),
            includes: Vec::new(),
            limit: None,
            order: None,
        }
    }

    /// Match records whose field equals `value`.
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.constraints.insert(field.into(), value.into());
        self
    }

    /// Match records whose field points at the given object.
    pub fn where_pointer(self, field: impl Into<String>, pointer: &Pointer) -> Self {
        self.where_eq(field, pointer.to_value())
    }

    /// Ask the backend to inline the object a pointer field references.
    pub fn include(mut self, field: impl Into<String>) -> Self {
        self.includes.push(field.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sort by a field; prefix with `-` for descending.
    pub fn order(mut self, field: impl Into<String>) -> Self {
        self.order = Some(field.into());
        self
    }

    fn request(&self) -> Request {
        let mut request = Request::new(Method::Get, class_path(&self.class_name));
        if !self.constraints.is_empty() {
            request = request.with_param("where", Value::Object(self.constraints.clone()).to_string());
        }
        if !self.includes.is_empty() {
            request = request.with_param("include", self.includes.join(","));
        }
        if let Some(order) = &self.order {
            request = request.with_param("order", order.clone());
        }
        request
    }

    /// Get all matching records.
    pub fn all(self) -> Result<Vec<Record>> {
        let mut request = self.request();
        if let Some(limit) = self.limit {
            request = request.with_param("limit", limit.to_string());
        }
        let body = self.mapper.fetch(&request)?;
        let results = match body.get("results") {
            Some(Value::Array(results)) => results,
            _ => return Err(Error::InvalidResponse("missing results array".into())),
        };

        results
            .iter()
            .map(|result| match result {
                Value::Object(fields) => self
                    .mapper
                    .registry()
                    .instantiate(&self.class_name, fields.clone())
                    .map_err(Error::from),
                other => Err(Error::InvalidResponse(format!("result is not an object: {other}"))),
            })
            .collect()
    }

    /// Get the first matching record.
    pub fn first(self) -> Result<Option<Record>> {
        Ok(self.limit(1).all()?.into_iter().next())
    }

    /// Count matching records without fetching them.
    pub fn count(self) -> Result<u64> {
        let request = self
            .request()
            .with_param("count", "1")
            .with_param("limit", "0");
        let body = self.mapper.fetch(&request)?;
        body.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::InvalidResponse("missing count".into()))
    }

    /// Fetch one record of this class by id.
    pub fn get(self, object_id: &str) -> Result<Record> {
        self.mapper.find(&self.class_name, object_id)
    }
}
