use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use qdk_schemas::{Request, RequestKind};

use crate::store::RequestStore;

/// Probe order across request kinds. Ids are generated, so a hit in more
/// than one kind is not expected; when it happens the first kind wins.
pub const PROBE_ORDER: [RequestKind; 6] = [
    RequestKind::Other,
    RequestKind::Compression,
    RequestKind::Traction,
    RequestKind::Torsion,
    RequestKind::Wire,
    RequestKind::Grid,
];

/// Finds a request by id without knowing its kind.
#[derive(Clone)]
pub struct RequestResolver {
    store: Arc<dyn RequestStore>,
}

impl RequestResolver {
    pub fn new(store: Arc<dyn RequestStore>) -> Self {
        Self { store }
    }

    /// First match in [`PROBE_ORDER`], owner loaded. Absence is `Ok(None)`.
    pub async fn resolve(&self, id: Uuid) -> Result<Option<Request>> {
        for kind in PROBE_ORDER {
            if let Some(req) = self.store.find(kind, id).await? {
                return Ok(Some(req));
            }
        }
        Ok(None)
    }

    /// Same as [`resolve`](Self::resolve) for a caller-supplied id string.
    /// A malformed id cannot exist, so it resolves to `None`.
    pub async fn resolve_str(&self, id: &str) -> Result<Option<Request>> {
        match Uuid::parse_str(id.trim()) {
            Ok(id) => self.resolve(id).await,
            Err(_) => Ok(None),
        }
    }
}
