use crate::types::{ObjectId, ObjectType};

use super::{error::ApiError, request::Method};

/// Resolved endpoint of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    CreateObject { object_type: ObjectType },
    ListObjects { object_type: ObjectType },
    GetObject { object_type: ObjectType, id: ObjectId },
    UpdateObject { object_type: ObjectType, id: ObjectId },
    DeleteObject { object_type: ObjectType, id: ObjectId },
    PatchLines { object_type: ObjectType, id: ObjectId },
    CheckinWorklist { event_id: String },
}

impl Route {
    pub fn parse(method: Method, path: &str) -> Result<Self, ApiError> {
        let segments: Vec<&str> = path
            .split('?')
            .next()
            .unwrap_or_default()
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        let route = match segments.as_slice() {
            ["objects", ty] => {
                let object_type = parse_type(ty)?;
                match method {
                    Method::Post => Some(Self::CreateObject { object_type }),
                    Method::Get => Some(Self::ListObjects { object_type }),
                    _ => None,
                }
            }
            ["objects", ty, id] => {
                let object_type = parse_type(ty)?;
                let id = id.to_string();
                match method {
                    Method::Get => Some(Self::GetObject { object_type, id }),
                    Method::Put => Some(Self::UpdateObject { object_type, id }),
                    Method::Delete => Some(Self::DeleteObject { object_type, id }),
                    _ => None,
                }
            }
            ["objects", ty, id, "lines"] if method == Method::Patch => Some(Self::PatchLines {
                object_type: parse_type(ty)?,
                id: id.to_string(),
            }),
            ["events", event_id, "checkin-worklist"] if method == Method::Get => {
                Some(Self::CheckinWorklist {
                    event_id: event_id.to_string(),
                })
            }
            _ => None,
        };

        route.ok_or_else(|| ApiError::NotFound(format!("no route for {} {path}", method.as_str())))
    }

    /// Short label for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateObject { .. } => "create",
            Self::ListObjects { .. } => "list",
            Self::GetObject { .. } => "get",
            Self::UpdateObject { .. } => "update",
            Self::DeleteObject { .. } => "delete",
            Self::PatchLines { .. } => "patch_lines",
            Self::CheckinWorklist { .. } => "checkin_worklist",
        }
    }
}

fn parse_type(raw: &str) -> Result<ObjectType, ApiError> {
    ObjectType::parse(raw).ok_or_else(|| ApiError::bad_request(format!("unknown object type: {raw}")))
}
