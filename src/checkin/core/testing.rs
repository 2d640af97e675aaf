//! Scripted transport shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use super::{SiteHttpClient, SiteHttpError, SiteHttpResponse};

#[derive(Debug, Clone)]
pub struct StubPage {
    status: u16,
    body: Bytes,
}

pub fn page(status: u16, body: impl Into<Bytes>) -> StubPage {
    StubPage {
        status,
        body: body.into(),
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: Url,
    pub form: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Answers requests from per-route queues. The last page of a queue is
/// repeated once the others are used up; unknown routes fail like a dropped
/// connection.
#[derive(Default)]
pub struct ScriptedClient {
    routes: Mutex<HashMap<String, VecDeque<StubPage>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    closes: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a page for `route`. Routes may carry a method prefix
    /// (`"POST /login"`); lookups try the prefixed forms before the bare ones,
    /// and `path?query` before the bare path.
    pub fn route(self, route: &str, stub: StubPage) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(route.to_string())
            .or_default()
            .push_back(stub);
        self
    }

    pub fn close_calls(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn posts_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.method == "POST" && request.url.path() == path)
            .collect()
    }

    fn answer(
        &self,
        method: &'static str,
        url: &Url,
        form: &[(String, String)],
    ) -> Result<SiteHttpResponse, SiteHttpError> {
        if self.is_closed() {
            return Err(SiteHttpError::Closed);
        }

        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            url: url.clone(),
            form: form.to_vec(),
        });

        let full = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        };

        let candidates = [
            format!("{method} {full}"),
            format!("{method} {}", url.path()),
            full.clone(),
            url.path().to_string(),
        ];

        let mut routes = self.routes.lock().unwrap();
        let key = candidates
            .into_iter()
            .find(|key| routes.contains_key(key))
            .ok_or_else(|| SiteHttpError::Transport(format!("no route for {method} {full}")))?;
        let queue = routes
            .get_mut(&key)
            .ok_or_else(|| SiteHttpError::Transport(format!("no route for {method} {full}")))?;

        let stub = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
        .ok_or_else(|| SiteHttpError::Transport(format!("empty route {full}")))?;

        Ok(SiteHttpResponse::new(stub.status, url.clone(), stub.body))
    }
}

#[async_trait]
impl SiteHttpClient for ScriptedClient {
    async fn get(&self, url: &Url) -> Result<SiteHttpResponse, SiteHttpError> {
        self.answer("GET", url, &[])
    }

    async fn post_form(
        &self,
        url: &Url,
        form_fields: &[(String, String)],
    ) -> Result<SiteHttpResponse, SiteHttpError> {
        self.answer("POST", url, form_fields)
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.close_calls() > 0
    }
}
