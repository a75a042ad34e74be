// Recording filters for asserting chain order

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use waypoint_core::{Chain, ChainResult, Filter, HttpRequest, HttpResponse};

/// Shared log of filter invocations.
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, label: &str) {
        self.calls.lock().push(label.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn was_called(&self, label: &str) -> bool {
        self.calls.lock().iter().any(|call| call == label)
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    /// A filter that records `label` and continues the chain.
    pub fn pass(&self, label: &str) -> Arc<dyn Filter> {
        Arc::new(RecordingFilter {
            log: self.clone(),
            label: label.to_string(),
            respond_with: None,
        })
    }

    /// A filter that records `label` and ends the chain with `status`.
    pub fn respond(&self, label: &str, status: u16) -> Arc<dyn Filter> {
        Arc::new(RecordingFilter {
            log: self.clone(),
            label: label.to_string(),
            respond_with: Some(status),
        })
    }
}

impl std::fmt::Debug for CallLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallLog").field("calls", &self.calls()).finish()
    }
}

struct RecordingFilter {
    log: CallLog,
    label: String,
    respond_with: Option<u16>,
}

#[async_trait]
impl Filter for RecordingFilter {
    async fn handle(&self, req: HttpRequest, chain: Chain) -> ChainResult {
        self.log.record(&self.label);
        match self.respond_with {
            Some(status) => Ok(Some(
                HttpResponse::new(status).with_body(self.label.clone().into_bytes()),
            )),
            None => chain.next(req).await,
        }
    }
}
