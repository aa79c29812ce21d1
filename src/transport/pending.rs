//! Exactly-once completion of an in-flight capture

use super::{HttpRequest, HttpResponse};
use crate::body::response_preview;
use crate::error::TransportError;
use crate::record::{CapturedRequest, TransportKind};
use crate::session::Core;
use std::sync::Arc;
use std::time::Instant;

/// Response fields filled in at completion
#[derive(Debug, Clone, Default)]
pub(crate) struct Outcome {
    pub status: u16,
    pub status_text: String,
    pub size: u64,
    pub preview: Option<String>,
}

impl Outcome {
    pub(crate) fn from_response(response: &HttpResponse, core: &Core) -> Self {
        let config = core.config();
        Self {
            status: response.status,
            status_text: response.status_text.clone(),
            size: response
                .content_length()
                .unwrap_or(response.body.len() as u64),
            preview: config
                .capture_response_preview
                .then(|| response_preview(&response.body, config.preview_limit)),
        }
    }
}

/// Owns a partial record until its single completion
///
/// Completing consumes the guard. A guard dropped before completion means
/// the caller gave up on the call; the record is then finalized as aborted.
pub(crate) struct Pending {
    core: Arc<Core>,
    record: Option<CapturedRequest>,
    started: Instant,
}

impl Pending {
    pub(crate) fn begin(core: Arc<Core>, record: CapturedRequest) -> Self {
        Self {
            core,
            record: Some(record),
            started: Instant::now(),
        }
    }

    /// Capture the call-time fields of an HTTP request
    pub(crate) fn http(core: Arc<Core>, kind: TransportKind, request: &HttpRequest) -> Self {
        let record = core.partial(
            kind,
            &request.effective_method(),
            &request.url,
            request.headers.normalize(),
            request.body.as_ref(),
        );
        Self::begin(core, record)
    }

    pub(crate) fn core(&self) -> &Core {
        &self.core
    }

    pub(crate) fn succeed(mut self, outcome: Outcome) {
        self.finish(|record| {
            record.status = outcome.status;
            record.status_text = outcome.status_text;
            record.response_size_bytes = outcome.size;
            record.response_preview = outcome.preview;
        });
    }

    pub(crate) fn fail(mut self, error: &TransportError) {
        self.finish(|record| {
            record.status = 0;
            record.error_text = Some(error.to_string());
        });
    }

    /// Fail with a status text, for transports that report one on rejection
    pub(crate) fn reject(mut self, status_text: &str, error: &TransportError) {
        self.finish(|record| {
            record.status = 0;
            record.status_text = status_text.to_string();
            record.error_text = Some(error.to_string());
        });
    }

    fn finish(&mut self, complete: impl FnOnce(&mut CapturedRequest)) {
        let Some(mut record) = self.record.take() else {
            return;
        };
        record.duration_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        complete(&mut record);
        self.core.append(record);
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        self.finish(|record| {
            record.status = 0;
            record.error_text = Some(TransportError::Aborted.to_string());
        });
    }
}
