use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    api::{
        App, ApiRequest, Method,
        request::TENANT_HEADER,
        response::{ListBody, normalize_list_body},
    },
    core::lines::LineAssignment,
    line::{Line, PatchOp},
    types::ObjectType,
};

use super::{ClientError, Session};

pub type ListResult = ListBody;

/// Query of a list call. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub limit: Option<usize>,
    pub next: Option<String>,
    pub q: Option<String>,
    pub status: Vec<String>,
    /// Endpoint-specific filters such as `checkedIn` or `blockerCode`.
    pub filters: BTreeMap<String, String>,
}

impl ListParams {
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn after(mut self, next: Option<String>) -> Self {
        self.next = next;
        self
    }

    pub fn search(mut self, q: impl Into<String>) -> Self {
        self.q = Some(q.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status.push(status.into());
        self
    }

    pub fn filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(name.into(), value.into());
        self
    }

    fn apply(&self, mut req: ApiRequest) -> ApiRequest {
        if let Some(limit) = self.limit {
            req = req.query_param("limit", limit.to_string());
        }
        if let Some(next) = &self.next {
            req = req.query_param("next", next.clone());
        }
        if let Some(q) = &self.q {
            req = req.query_param("q", q.clone());
        }
        if !self.status.is_empty() {
            req = req.query_param("status", self.status.join(","));
        }
        for (name, value) in &self.filters {
            req = req.query_param(name.clone(), value.clone());
        }
        req
    }
}

/// Response of the patch-lines endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PatchLinesResult {
    pub order: Value,
    pub lines: Vec<Line>,
    #[serde(default)]
    pub created: Vec<LineAssignment>,
}

/// Typed calls against the objects endpoints on behalf of one session.
#[derive(Clone)]
pub struct ObjectsClient {
    app: App,
    session: Session,
}

impl ObjectsClient {
    pub fn new(app: App, session: Session) -> Self {
        Self { app, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    fn request(&self, method: Method, path: String) -> Result<ApiRequest, ClientError> {
        let (token, tenant) = self.session.credentials()?;
        Ok(ApiRequest::new(method, path)
            .header("authorization", format!("Bearer {token}"))
            .header(TENANT_HEADER, tenant))
    }

    async fn send(&self, req: ApiRequest) -> Result<Value, ClientError> {
        let resp = self.app.dispatch(req).await;
        if resp.is_success() {
            return Ok(resp.body);
        }
        let message = resp
            .body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("request failed")
            .to_string();
        Err(ClientError::Api {
            status: resp.status,
            message,
        })
    }

    pub async fn create(&self, object_type: ObjectType, body: Value) -> Result<Value, ClientError> {
        let req = self
            .request(Method::Post, format!("/objects/{object_type}"))?
            .json_body(body);
        self.send(req).await
    }

    pub async fn get(&self, object_type: ObjectType, id: &str) -> Result<Value, ClientError> {
        let req = self.request(Method::Get, format!("/objects/{object_type}/{id}"))?;
        self.send(req).await
    }

    pub async fn update(
        &self,
        object_type: ObjectType,
        id: &str,
        patch: Value,
    ) -> Result<Value, ClientError> {
        let req = self
            .request(Method::Put, format!("/objects/{object_type}/{id}"))?
            .json_body(patch);
        self.send(req).await
    }

    pub async fn delete(&self, object_type: ObjectType, id: &str) -> Result<(), ClientError> {
        let req = self.request(Method::Delete, format!("/objects/{object_type}/{id}"))?;
        self.send(req).await.map(|_| ())
    }

    pub async fn list(
        &self,
        object_type: ObjectType,
        params: &ListParams,
    ) -> Result<ListResult, ClientError> {
        let req = params.apply(self.request(Method::Get, format!("/objects/{object_type}"))?);
        Ok(normalize_list_body(self.send(req).await?))
    }

    pub async fn worklist(
        &self,
        event_id: &str,
        params: &ListParams,
    ) -> Result<ListResult, ClientError> {
        let req = params.apply(
            self.request(Method::Get, format!("/events/{event_id}/checkin-worklist"))?,
        );
        Ok(normalize_list_body(self.send(req).await?))
    }

    /// Sends line ops; an empty op list is not sent and yields `None`.
    pub async fn patch_lines(
        &self,
        object_type: ObjectType,
        id: &str,
        ops: Vec<PatchOp>,
    ) -> Result<Option<PatchLinesResult>, ClientError> {
        if ops.is_empty() {
            debug!(%object_type, id, "no line ops to send");
            return Ok(None);
        }
        let req = self
            .request(Method::Patch, format!("/objects/{object_type}/{id}/lines"))?
            .json_body(json!({ "ops": ops }));
        let body = self.send(req).await?;
        Ok(Some(serde_json::from_value(body)?))
    }
}
