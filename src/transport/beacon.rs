//! Fire-and-forget interception
//!
//! There is no response to wait for: the record completes as soon as the
//! transport says whether the payload was queued.

use super::pending::{Outcome, Pending};
use super::BeaconTransport;
use crate::body::RequestBody;
use crate::error::TransportError;
use crate::record::TransportKind;
use crate::session::Core;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

pub(crate) struct BeaconInterceptor {
    inner: Arc<dyn BeaconTransport>,
    core: Weak<Core>,
}

impl BeaconInterceptor {
    pub(crate) fn new(inner: Arc<dyn BeaconTransport>, core: Weak<Core>) -> Self {
        Self { inner, core }
    }
}

impl BeaconTransport for BeaconInterceptor {
    fn send_beacon(&self, url: &str, body: Option<RequestBody>) -> bool {
        let Some(core) = Core::active(&self.core) else {
            return self.inner.send_beacon(url, body);
        };

        let mut headers = BTreeMap::new();
        if let Some(content_type) = body.as_ref().and_then(RequestBody::implied_content_type) {
            headers.insert("content-type".to_string(), content_type.to_string());
        }
        let record = core.partial(TransportKind::Beacon, "POST", url, headers, body.as_ref());
        let pending = Pending::begin(core, record);

        let queued = self.inner.send_beacon(url, body);
        if queued {
            pending.succeed(Outcome {
                status_text: "queued".to_string(),
                ..Outcome::default()
            });
        } else {
            pending.reject(
                "rejected",
                &TransportError::Rejected("payload not queued".to_string()),
            );
        }
        queued
    }
}
