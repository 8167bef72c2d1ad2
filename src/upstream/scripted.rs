//! Scripted [`FireSource`] for handler and proxy tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::range::RangeKey;

use super::{FireSource, UpstreamError};

/// Replays queued responses in order and counts fetch attempts.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    responses: Mutex<VecDeque<Result<Bytes, UpstreamError>>>,
    requested: Mutex<Vec<RangeKey>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_ok(&self, body: impl Into<Bytes>) {
        self.responses.lock().unwrap().push_back(Ok(body.into()));
    }

    pub(crate) fn push_err(&self, err: UpstreamError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requested(&self) -> Vec<RangeKey> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl FireSource for ScriptedSource {
    async fn fetch_csv(&self, range: RangeKey) -> Result<Bytes, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(range);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(UpstreamError::Status(500)))
    }
}

/// A FIRMS-shaped CSV body comfortably above the sanity threshold.
pub(crate) fn sample_csv(marker: &str) -> String {
    let mut csv = String::from(
        "latitude,longitude,bright_ti4,scan,track,acq_date,acq_time,satellite,confidence,version,bright_ti5,frp,daynight\n",
    );
    csv.push_str(&format!(
        "-12.34567,131.04321,330.1,0.39,0.36,2026-10-18,0412,N,n,2.0NRT,290.4,4.2,D # {marker}\n"
    ));
    csv
}
