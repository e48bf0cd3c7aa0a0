use std::{sync::Arc, time::Instant};

use serde_json::json;
use tracing::{debug, warn};

use crate::{
    config::ServiceConfig,
    core::{lines::lines_of, store::StoreError},
    cursor::decode_key,
    line::PatchLinesRequest,
    query::ListFilter,
    record::{ObjectDraft, ObjectKey, ObjectPatch},
    runtime::handle::ServiceHandle,
    types::ObjectType,
    worklist::WorklistFilter,
};

use super::{
    error::ApiError,
    params::{parse_bool, parse_csv_set, parse_limit, parse_text},
    request::{ApiRequest, ApiResponse},
    response::list_response_body,
    route::Route,
};

/// Request dispatcher bound to one running service.
#[derive(Clone)]
pub struct App {
    handle: ServiceHandle,
    config: Arc<ServiceConfig>,
}

impl App {
    pub fn new(handle: ServiceHandle, config: ServiceConfig) -> Self {
        Self {
            handle,
            config: Arc::new(config),
        }
    }

    pub fn handle(&self) -> &ServiceHandle {
        &self.handle
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Handles one request. Failures are rendered as error responses.
    pub async fn dispatch(&self, req: ApiRequest) -> ApiResponse {
        let started = Instant::now();
        let method = req.method.as_str();
        match self.try_dispatch(&req).await {
            Ok(resp) => {
                debug!(
                    method,
                    path = %req.path,
                    status = resp.status,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "request handled"
                );
                resp
            }
            Err(err) => {
                if err.status() >= 500 {
                    warn!(method, path = %req.path, status = err.status(), error = %err, "request failed");
                } else {
                    debug!(method, path = %req.path, status = err.status(), error = %err, "request rejected");
                }
                err.into_response()
            }
        }
    }

    async fn try_dispatch(&self, req: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let route = Route::parse(req.method, &req.path)?;
        let tenant = req.tenant_id()?;
        debug!(tenant, route = route.name(), "dispatch");

        match route {
            Route::CreateObject { object_type } => {
                let draft = ObjectDraft::from_body(object_type, req.body_or_empty())?;
                let rec = self.handle.create(tenant, draft).await?;
                Ok(ApiResponse::created(rec.to_json()))
            }
            Route::ListObjects { object_type } => self.list(tenant, object_type, req).await,
            Route::GetObject { object_type, id } => {
                let key = ObjectKey::for_object(tenant, object_type, &id);
                let rec = self
                    .handle
                    .get(key.clone())
                    .await?
                    .ok_or(StoreError::NotFound(key))?;
                Ok(ApiResponse::ok(rec.to_json()))
            }
            Route::UpdateObject { object_type, id } => {
                let patch = ObjectPatch::from_body(req.body_or_empty())?;
                let key = ObjectKey::for_object(tenant, object_type, &id);
                let rec = self.handle.update(key, patch).await?;
                Ok(ApiResponse::ok(rec.to_json()))
            }
            Route::DeleteObject { object_type, id } => {
                let key = ObjectKey::for_object(tenant, object_type, &id);
                let rec = self.handle.delete(key).await?;
                Ok(ApiResponse::ok(json!({ "id": rec.id, "deleted": true })))
            }
            Route::PatchLines { object_type, id } => {
                let key = ObjectKey::for_object(tenant, object_type, &id);
                self.patch_lines(key, object_type, req).await
            }
            Route::CheckinWorklist { event_id } => self.worklist(tenant, &event_id, req).await,
        }
    }

    fn start_key(&self, req: &ApiRequest) -> Option<ObjectKey> {
        decode_key::<ObjectKey>(req.query_value("next"))
    }

    fn limit(&self, req: &ApiRequest) -> usize {
        parse_limit(
            req.query_value("limit"),
            self.config.default_limit,
            self.config.max_limit,
        )
    }

    async fn list(
        &self,
        tenant: &str,
        object_type: ObjectType,
        req: &ApiRequest,
    ) -> Result<ApiResponse, ApiError> {
        let filter = ListFilter {
            q: parse_text(req.query_value("q")),
            status: parse_csv_set(req.query_value("status")),
        };
        let page_req = self.config.page_request(self.limit(req));
        let page = self
            .handle
            .list(tenant, object_type, filter, self.start_key(req), page_req)
            .await?;
        Ok(ApiResponse::ok(list_response_body(page, |rec| rec.to_json())))
    }

    async fn worklist(
        &self,
        tenant: &str,
        event_id: &str,
        req: &ApiRequest,
    ) -> Result<ApiResponse, ApiError> {
        let filter = WorklistFilter {
            status: parse_csv_set(req.query_value("status")),
            checked_in: parse_bool("checkedIn", req.query_value("checkedIn"))?,
            ready: parse_bool("ready", req.query_value("ready"))?,
            blocker_codes: parse_csv_set(req.query_value("blockerCode")),
            q: parse_text(req.query_value("q")),
        };
        let page_req = self.config.page_request(self.limit(req));
        let page = self
            .handle
            .worklist(tenant, event_id, filter, self.start_key(req), page_req)
            .await?;
        Ok(ApiResponse::ok(list_response_body(page, |row| row.to_json())))
    }

    async fn patch_lines(
        &self,
        key: ObjectKey,
        object_type: ObjectType,
        req: &ApiRequest,
    ) -> Result<ApiResponse, ApiError> {
        let body: PatchLinesRequest = serde_json::from_value(req.body_or_empty())
            .map_err(|e| ApiError::bad_request(format!("invalid patch-lines body: {e}")))?;

        if body.ops.is_empty() {
            // nothing to write; echo the current state
            let rec = self
                .handle
                .get(key.clone())
                .await?
                .ok_or(StoreError::NotFound(key))?;
            if !object_type.has_lines() {
                return Err(StoreError::NoLines(object_type).into());
            }
            let lines = lines_of(&rec.body).map_err(StoreError::from)?;
            return Ok(ApiResponse::ok(json!({
                "order": rec.to_json(),
                "lines": lines,
                "created": [],
            })));
        }

        let (rec, outcome) = self.handle.patch_lines(key, body.ops).await?;
        Ok(ApiResponse::ok(json!({
            "order": rec.to_json(),
            "lines": outcome.lines,
            "created": outcome.created,
        })))
    }
}
