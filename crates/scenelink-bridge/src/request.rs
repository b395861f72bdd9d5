//! Request context handed to route handlers and request subscribers

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

pub use axum::http::StatusCode;

/// One incoming HTTP request as seen by handlers and subscribers.
///
/// A handler claims the request by calling [`respond_ok`](Self::respond_ok),
/// [`respond`](Self::respond) or [`set_handled`](Self::set_handled); the
/// server then skips every later step (more handlers, static files, the
/// not-found notification).
#[derive(Debug)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    handled: bool,
    response: Option<Response>,
}

impl RequestContext {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
            handled: false,
            response: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request target as received, including the query string
    pub fn path(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri.path())
    }

    /// Path component only
    pub fn uri_path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_handled(&self) -> bool {
        self.handled
    }

    pub fn set_handled(&mut self, handled: bool) {
        self.handled = handled;
    }

    /// Answer 200 with an empty body and mark the request handled
    pub fn respond_ok(&mut self) {
        self.respond(StatusCode::OK, None, Bytes::new());
    }

    /// Answer with `status` and `body`, marking the request handled
    pub fn respond(
        &mut self,
        status: StatusCode,
        content_type: Option<&str>,
        body: impl Into<Bytes>,
    ) {
        let mut builder = Response::builder().status(status);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }

        let response = builder
            .body(Body::from(body.into()))
            .unwrap_or_else(|_| status.into_response());

        self.set_response(response);
    }

    /// Take full control of the response
    pub fn set_response(&mut self, response: Response) {
        self.response = Some(response);
        self.handled = true;
    }

    pub(crate) fn into_response(self) -> Response {
        self.response
            .unwrap_or_else(|| StatusCode::OK.into_response())
    }
}
