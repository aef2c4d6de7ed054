#![forbid(unsafe_code)]

//! In-memory collaborators for the demo screens.
//!
//! [`InMemorySource`] queues every request instead of answering it, so the
//! driver decides when (and in which order) responses arrive. This is how the
//! scenarios reproduce out-of-order list responses and double submits.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};

use painel::{DataSource, FetchError, FetchToken, ListParams, Navigator};
use serde_json::{Map, Value};
use tracing::trace;

/// One request captured by [`InMemorySource`].
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    List { params: ListParams, token: FetchToken },
    Get { id: String, token: FetchToken },
    Create { payload: Value, token: FetchToken },
    Update { id: String, payload: Value, token: FetchToken },
}

impl Request {
    /// Token the request was issued with.
    #[must_use]
    pub fn token(&self) -> FetchToken {
        match self {
            Self::List { token, .. }
            | Self::Get { token, .. }
            | Self::Create { token, .. }
            | Self::Update { token, .. } => *token,
        }
    }

    /// Short verb for logs and transcripts.
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Self::List { .. } => "list",
            Self::Get { .. } => "get",
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
        }
    }
}

/// A response ready to hand back to the component that issued the token.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub token: FetchToken,
    pub result: Result<Value, FetchError>,
}

/// Record store with deferred answers.
#[derive(Debug)]
pub struct InMemorySource {
    search_key: String,
    unique_key: Option<String>,
    records: RefCell<BTreeMap<u64, Value>>,
    next_id: Cell<u64>,
    pending: RefCell<VecDeque<Request>>,
    failures: RefCell<VecDeque<FetchError>>,
}

impl InMemorySource {
    /// Empty store; list searches match `search_key` case-insensitively.
    #[must_use]
    pub fn new(search_key: impl Into<String>) -> Self {
        Self {
            search_key: search_key.into(),
            unique_key: None,
            records: RefCell::new(BTreeMap::new()),
            next_id: Cell::new(1),
            pending: RefCell::new(VecDeque::new()),
            failures: RefCell::new(VecDeque::new()),
        }
    }

    /// Reject creates and updates that repeat `key` of another record.
    #[must_use]
    pub fn unique(mut self, key: impl Into<String>) -> Self {
        self.unique_key = Some(key.into());
        self
    }

    /// Seed records. Objects without a numeric `id` get the next free one.
    #[must_use]
    pub fn with_records(self, records: impl IntoIterator<Item = Value>) -> Self {
        for record in records {
            self.insert(record);
        }
        self
    }

    fn insert(&self, record: Value) -> Value {
        let mut object = match record {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        let id = match object.get("id").and_then(Value::as_u64) {
            Some(id) => id,
            None => self.next_id.get(),
        };
        self.next_id.set(self.next_id.get().max(id + 1));
        object.insert("id".to_string(), Value::from(id));
        let record = Value::Object(object);
        self.records.borrow_mut().insert(id, record.clone());
        record
    }

    /// Make the next answered request fail with `error`.
    pub fn fail_next(&self, error: FetchError) {
        self.failures.borrow_mut().push_back(error);
    }

    /// Requests waiting for an answer, oldest first.
    #[must_use]
    pub fn pending(&self) -> Vec<Request> {
        self.pending.borrow().iter().cloned().collect()
    }

    /// Number of unanswered requests.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Remove the oldest pending request.
    pub fn take_next(&self) -> Option<Request> {
        self.pending.borrow_mut().pop_front()
    }

    /// Remove the newest pending request.
    pub fn take_last(&self) -> Option<Request> {
        self.pending.borrow_mut().pop_back()
    }

    /// Answer the oldest pending request.
    pub fn answer_next(&self) -> Option<Reply> {
        self.take_next().map(|request| self.answer(&request))
    }

    /// Stored record by id.
    #[must_use]
    pub fn record(&self, id: u64) -> Option<Value> {
        self.records.borrow().get(&id).cloned()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Compute the response to `request` against the current records.
    pub fn answer(&self, request: &Request) -> Reply {
        let token = request.token();
        if let Some(error) = self.failures.borrow_mut().pop_front() {
            return Reply {
                token,
                result: Err(error),
            };
        }
        let result = match request {
            Request::List { params, .. } => Ok(self.list_matching(params)),
            Request::Get { id, .. } => self.lookup(id).map(|(_, record)| record),
            Request::Create { payload, .. } => self
                .check_unique(payload, None)
                .map(|()| self.insert(payload.clone())),
            Request::Update { id, payload, .. } => self.lookup(id).and_then(|(key, _)| {
                self.check_unique(payload, Some(key))?;
                let mut record = payload.clone();
                if let Value::Object(map) = &mut record {
                    map.insert("id".to_string(), Value::from(key));
                }
                Ok(self.insert(record))
            }),
        };
        Reply { token, result }
    }

    fn list_matching(&self, params: &ListParams) -> Value {
        let needle = params.search.as_deref().map(str::to_lowercase);
        let records = self.records.borrow();
        let matched = records.values().filter(|record| {
            let text = record
                .get(&self.search_key)
                .map(attribute_text)
                .unwrap_or_default()
                .to_lowercase();
            needle.as_deref().is_none_or(|n| text.contains(n))
                && params.filters.iter().all(|(key, wanted)| {
                    record.get(key).map(attribute_text).as_deref() == Some(wanted.as_str())
                })
        });
        Value::Array(matched.cloned().collect())
    }

    fn lookup(&self, id: &str) -> Result<(u64, Value), FetchError> {
        id.trim()
            .parse::<u64>()
            .ok()
            .and_then(|key| self.record(key).map(|record| (key, record)))
            .ok_or_else(|| FetchError::not_found(id))
    }

    fn check_unique(&self, payload: &Value, except: Option<u64>) -> Result<(), FetchError> {
        let Some(key) = &self.unique_key else {
            return Ok(());
        };
        let Some(wanted) = payload.get(key).map(attribute_text) else {
            return Ok(());
        };
        let clash = self.records.borrow().iter().any(|(id, record)| {
            Some(*id) != except
                && record
                    .get(key)
                    .map(attribute_text)
                    .is_some_and(|v| v.eq_ignore_ascii_case(&wanted))
        });
        if clash {
            Err(FetchError::Domain {
                code: "duplicate".to_string(),
                message: format!("A record with {key} \"{wanted}\" already exists."),
            })
        } else {
            Ok(())
        }
    }

    fn enqueue(&self, request: Request) {
        trace!(verb = request.verb(), token = %request.token(), "request queued");
        self.pending.borrow_mut().push_back(request);
    }
}

fn attribute_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl DataSource for InMemorySource {
    fn list(&self, params: &ListParams, token: FetchToken) {
        self.enqueue(Request::List {
            params: params.clone(),
            token,
        });
    }

    fn get(&self, id: &str, token: FetchToken) {
        self.enqueue(Request::Get {
            id: id.to_string(),
            token,
        });
    }

    fn create(&self, payload: &Value, token: FetchToken) {
        self.enqueue(Request::Create {
            payload: payload.clone(),
            token,
        });
    }

    fn update(&self, id: &str, payload: &Value, token: FetchToken) {
        self.enqueue(Request::Update {
            id: id.to_string(),
            payload: payload.clone(),
            token,
        });
    }
}

/// Navigator that remembers where it was sent.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    paths: RefCell<Vec<String>>,
}

impl RecordingNavigator {
    /// Every path navigated to, in order.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.paths.borrow().clone()
    }

    /// Most recent path.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.paths.borrow().last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn go_to(&self, path: &str) {
        trace!(path, "navigate");
        self.paths.borrow_mut().push(path.to_string());
    }
}
