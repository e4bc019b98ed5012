//! In-memory backend speaking the same REST dialect as the real one.
//!
//! Used by the test suites and for local experiments. Objects live in
//! `RefCell` maps since the mapper is single-threaded; every request is
//! logged so tests can count round trips.

use crate::transport::{Method, RemoteResource, Request, Response, TransportError};
use chrono::{SecondsFormat, Utc};
use restmap_engine::translate::{
    BackendError, OBJECT_NOT_FOUND, PASSWORD_MISSING, USERNAME_MISSING, USERNAME_TAKEN,
};
use restmap_engine::value::{local_class_name, OBJECT_ID, TYPE_KEY, UPDATED_AT, CREATED_AT};
use restmap_engine::{Attributes, TypedValue};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};

type ClassTable = BTreeMap<String, Attributes>;

/// A scripted reply consumed by the next request.
#[derive(Debug, Clone)]
enum Scripted {
    Fail(TransportError),
    Reply(Response),
}

/// In-memory stand-in for the REST backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    classes: RefCell<HashMap<String, ClassTable>>,
    requests: RefCell<Vec<Request>>,
    scripted: RefCell<VecDeque<Scripted>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next request fail before reaching the backend.
    pub fn fail_next(&self, error: TransportError) {
        self.scripted.borrow_mut().push_back(Scripted::Fail(error));
    }

    /// Make the next request return a structured 400.
    pub fn reject_next(&self, code: i64, message: impl Into<String>) {
        let body = serde_json::to_value(BackendError::new(code, message)).unwrap_or(Value::Null);
        self.reply_next(Response::new(400, body));
    }

    /// Make the next request return an arbitrary response.
    pub fn reply_next(&self, response: Response) {
        self.scripted.borrow_mut().push_back(Scripted::Reply(response));
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.borrow().clone()
    }

    /// Number of requests received with the given method.
    pub fn count(&self, method: Method) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.method == method)
            .count()
    }

    pub fn clear_requests(&self) {
        self.requests.borrow_mut().clear();
    }

    /// Stored fields of an object, as the backend sees them.
    pub fn object(&self, class_name: &str, object_id: &str) -> Option<Attributes> {
        self.classes
            .borrow()
            .get(local_class_name(class_name))
            .and_then(|table| table.get(object_id))
            .cloned()
    }

    /// Insert an object directly, bypassing the request log.
    pub fn seed(&self, class_name: &str, object_id: &str, mut fields: Attributes) {
        let now = timestamp();
        fields.insert(OBJECT_ID.into(), json!(object_id));
        fields.entry(CREATED_AT).or_insert_with(|| json!(now));
        fields.entry(UPDATED_AT).or_insert_with(|| json!(now));
        self.classes
            .borrow_mut()
            .entry(local_class_name(class_name).to_string())
            .or_default()
            .insert(object_id.to_string(), fields);
    }

    fn create(&self, class_name: &str, body: Attributes) -> Response {
        if class_name == "User" {
            if let Some(rejection) = self.check_user(&body) {
                return rejection;
            }
        }

        let object_id = new_object_id();
        let now = timestamp();
        let mut stored = body;
        stored.insert(OBJECT_ID.into(), json!(object_id));
        stored.insert(CREATED_AT.into(), json!(now));
        stored.insert(UPDATED_AT.into(), json!(now));
        self.classes
            .borrow_mut()
            .entry(class_name.to_string())
            .or_default()
            .insert(object_id.clone(), stored);

        Response::new(201, json!({ OBJECT_ID: object_id, CREATED_AT: now }))
    }

    fn check_user(&self, body: &Attributes) -> Option<Response> {
        let username = match body.get("username").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => name,
            _ => return Some(rejection(USERNAME_MISSING, "bad or missing username")),
        };
        if body.get("password").and_then(Value::as_str).is_none() {
            return Some(rejection(PASSWORD_MISSING, "password is required"));
        }
        let taken = self.classes.borrow().get("User").is_some_and(|users| {
            users
                .values()
                .any(|u| u.get("username").and_then(Value::as_str) == Some(username))
        });
        taken.then(|| rejection(USERNAME_TAKEN, format!("username {username} already taken")))
    }

    fn update(&self, class_name: &str, object_id: &str, body: Attributes) -> Response {
        let mut classes = self.classes.borrow_mut();
        let Some(stored) = classes
            .get_mut(class_name)
            .and_then(|table| table.get_mut(object_id))
        else {
            return not_found();
        };

        let now = timestamp();
        for (key, value) in body {
            stored.insert(key, value);
        }
        stored.insert(UPDATED_AT.into(), json!(now));
        Response::new(200, json!({ UPDATED_AT: now }))
    }

    fn fetch(&self, class_name: &str, object_id: &str) -> Response {
        match self.object(class_name, object_id) {
            Some(fields) => Response::new(200, Value::Object(fields)),
            None => not_found(),
        }
    }

    fn delete(&self, class_name: &str, object_id: &str) -> Response {
        let removed = self
            .classes
            .borrow_mut()
            .get_mut(class_name)
            .and_then(|table| table.remove(object_id));
        match removed {
            Some(_) => Response::new(200, json!({})),
            None => not_found(),
        }
    }

    fn find(&self, class_name: &str, request: &Request) -> Response {
        let constraints: Attributes = match request.param("where").map(serde_json::from_str::<Value>) {
            Some(Ok(Value::Object(map))) => map,
            Some(_) => return rejection(102, "invalid where clause"),
            None => Attributes::new(),
        };
        let includes: Vec<&str> = request
            .param("include")
            .map(|raw| raw.split(',').filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let mut matches: Vec<Attributes> = self
            .classes
            .borrow()
            .get(class_name)
            .map(|table| {
                table
                    .values()
                    .filter(|obj| constraints.iter().all(|(k, v)| field_matches(obj.get(k), v)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = request.param("order") {
            let (key, descending) = match order.strip_prefix('-') {
                Some(key) => (key, true),
                None => (order, false),
            };
            matches.sort_by(|a, b| {
                let ord = compare(a.get(key), b.get(key));
                if descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        let total = matches.len();
        if let Some(limit) = request.param("limit").and_then(|l| l.parse::<usize>().ok()) {
            matches.truncate(limit);
        }

        let results: Vec<Value> = matches
            .into_iter()
            .map(|mut obj| {
                for key in &includes {
                    if let Some(inlined) = obj.get(*key).and_then(|v| self.inline(v)) {
                        obj.insert((*key).to_string(), inlined);
                    }
                }
                Value::Object(obj)
            })
            .collect();

        let mut body = json!({ "results": results });
        if request.param("count").is_some() {
            body["count"] = json!(total);
        }
        Response::new(200, body)
    }

    fn inline(&self, value: &Value) -> Option<Value> {
        let TypedValue::Pointer(pointer) = TypedValue::decode(value).ok()? else {
            return None;
        };
        let mut fields = self.object(&pointer.class_name, &pointer.object_id)?;
        let encoded = pointer.to_value();
        fields.insert(TYPE_KEY.into(), json!("Object"));
        fields.insert("className".into(), encoded["className"].clone());
        Some(Value::Object(fields))
    }
}

impl RemoteResource for MemoryBackend {
    fn execute(&self, request: &Request) -> Result<Response, TransportError> {
        self.requests.borrow_mut().push(request.clone());

        if let Some(scripted) = self.scripted.borrow_mut().pop_front() {
            return match scripted {
                Scripted::Fail(err) => Err(err),
                Scripted::Reply(response) => Ok(response),
            };
        }

        let segments: Vec<&str> = request.path.trim_matches('/').split('/').collect();
        let (class_name, object_id) = match segments.as_slice() {
            ["users"] => ("User", None),
            ["users", id] => ("User", Some(*id)),
            ["classes", class] => (local_class_name(class), None),
            ["classes", class, id] => (local_class_name(class), Some(*id)),
            _ => return Ok(Response::new(404, json!({"error": "unknown endpoint"}))),
        };

        let body = match &request.body {
            Some(Value::Object(map)) => map.clone(),
            Some(_) => return Ok(rejection(107, "body must be a JSON object")),
            None => Attributes::new(),
        };

        let response = match (request.method, object_id) {
            (Method::Post, None) => self.create(class_name, body),
            (Method::Get, None) => self.find(class_name, request),
            (Method::Get, Some(id)) => self.fetch(class_name, id),
            (Method::Put, Some(id)) => self.update(class_name, id, body),
            (Method::Delete, Some(id)) => self.delete(class_name, id),
            _ => Response::new(405, json!({"error": "method not allowed"})),
        };
        Ok(response)
    }
}

fn field_matches(stored: Option<&Value>, expected: &Value) -> bool {
    let Some(stored) = stored else {
        return expected.is_null();
    };
    match (TypedValue::decode(stored), TypedValue::decode(expected)) {
        (Ok(TypedValue::Pointer(a)), Ok(TypedValue::Pointer(b))) => {
            a.class_name == b.class_name && a.object_id == b.object_id
        }
        _ => stored == expected,
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(std::cmp::Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        _ => std::cmp::Ordering::Equal,
    }
}

fn rejection(code: i64, message: impl Into<String>) -> Response {
    let body = serde_json::to_value(BackendError::new(code, message)).unwrap_or(Value::Null);
    Response::new(400, body)
}

fn not_found() -> Response {
    let mut response = rejection(OBJECT_NOT_FOUND, "Object not found.");
    response.status = 404;
    response
}

fn new_object_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..10].to_string()
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
