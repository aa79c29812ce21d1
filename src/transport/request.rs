//! Simple request interception

use super::pending::{Outcome, Pending};
use super::{HttpRequest, HttpResponse, RequestTransport};
use crate::error::TransportError;
use crate::record::TransportKind;
use crate::session::Core;
use futures::future::BoxFuture;
use std::sync::{Arc, Weak};

pub(crate) struct RequestInterceptor {
    inner: Arc<dyn RequestTransport>,
    core: Weak<Core>,
}

impl RequestInterceptor {
    pub(crate) fn new(inner: Arc<dyn RequestTransport>, core: Weak<Core>) -> Self {
        Self { inner, core }
    }
}

impl RequestTransport for RequestInterceptor {
    fn send(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, TransportError>> {
        let Some(core) = Core::active(&self.core) else {
            return self.inner.send(request);
        };

        let pending = Pending::http(core, TransportKind::Request, &request);
        let response = self.inner.send(request);

        Box::pin(async move {
            match response.await {
                Ok(response) => {
                    let outcome = Outcome::from_response(&response, pending.core());
                    pending.succeed(outcome);
                    Ok(response)
                }
                Err(e) => {
                    pending.fail(&e);
                    Err(e)
                }
            }
        })
    }
}
