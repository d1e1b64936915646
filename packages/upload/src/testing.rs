//! In-memory test doubles for the [`ObjectStore`] and [`ProgressSink`]
//! seams.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use static_deploy_upload_models::{BucketLocation, PutReceipt, UploadParameters};

use crate::StoreError;
use crate::progress::{ProgressSink, Tone};
use crate::store::ObjectStore;

/// One put as seen by [`ScriptedStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPut {
    /// Parameters the put was issued with.
    pub params: UploadParameters,
    /// Region the store was pointed at when the put was issued.
    pub region: String,
}

/// Object store that records every call and fails on cue.
pub struct ScriptedStore {
    bucket: String,
    region: String,
    location: Option<String>,
    failures: Mutex<BTreeMap<String, u32>>,
    stalls: Mutex<BTreeMap<String, u32>>,
    puts: Mutex<Vec<RecordedPut>>,
    location_calls: Mutex<u32>,
}

impl ScriptedStore {
    /// A store whose bucket lives in the configured region.
    #[must_use]
    pub fn new(bucket: &str, region: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            region: region.to_string(),
            location: Some(region.to_string()),
            failures: Mutex::new(BTreeMap::new()),
            stalls: Mutex::new(BTreeMap::new()),
            puts: Mutex::new(Vec::new()),
            location_calls: Mutex::new(0),
        }
    }

    /// Reports the bucket as living in `region`.
    #[must_use]
    pub fn located_in(mut self, region: &str) -> Self {
        self.location = Some(region.to_string());
        self
    }

    /// Makes bucket lookups fail.
    #[must_use]
    pub fn missing_bucket(mut self) -> Self {
        self.location = None;
        self
    }

    /// Fails the next `times` puts of `key`.
    #[must_use]
    pub fn failing(self, key: &str, times: u32) -> Self {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), times);
        self
    }

    /// Hangs the next `times` puts of `key` for a minute.
    #[must_use]
    pub fn stalling(self, key: &str, times: u32) -> Self {
        self.stalls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), times);
        self
    }

    /// Every put issued so far, in order.
    #[must_use]
    pub fn puts(&self) -> Vec<RecordedPut> {
        self.puts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Keys of every put issued so far, in order.
    #[must_use]
    pub fn put_keys(&self) -> Vec<String> {
        self.puts().into_iter().map(|p| p.params.key).collect()
    }

    /// Number of bucket lookups made.
    #[must_use]
    pub fn location_calls(&self) -> u32 {
        *self
            .location_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn take(counter: &Mutex<BTreeMap<String, u32>>, key: &str) -> bool {
        let mut counter = counter.lock().unwrap_or_else(PoisonError::into_inner);
        match counter.get_mut(key) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl ObjectStore for ScriptedStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn set_region(&mut self, region: &str) {
        self.region = region.to_string();
    }

    async fn bucket_location(&self) -> Result<BucketLocation, StoreError> {
        *self
            .location_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner) += 1;
        self.location
            .clone()
            .map(|region| BucketLocation { region })
            .ok_or_else(|| StoreError::Location {
                bucket: self.bucket.clone(),
                source: "NoSuchBucket".into(),
            })
    }

    async fn put_object(
        &self,
        params: &UploadParameters,
        _body: &Path,
    ) -> Result<PutReceipt, StoreError> {
        self.puts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedPut {
                params: params.clone(),
                region: self.region.clone(),
            });

        if Self::take(&self.stalls, &params.key) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }

        if Self::take(&self.failures, &params.key) {
            return Err(StoreError::Put {
                bucket: self.bucket.clone(),
                key: params.key.clone(),
                source: "SlowDown".into(),
            });
        }

        Ok(PutReceipt {
            e_tag: Some(format!("\"{}\"", params.key)),
            version_id: None,
        })
    }
}

/// Everything a [`RecordingProgress`] saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// `start(label, _)`.
    Start(String),
    /// `stop()`.
    Stop,
    /// `write_line(tone, line)`.
    Line(Tone, String),
}

/// Progress sink that keeps every event in memory.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    /// All events so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Lines written with the given tone, in order.
    #[must_use]
    pub fn lines_with(&self, tone: Tone) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Line(t, line) if t == tone => Some(line),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn start(&self, label: &str, _tick: char) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ProgressEvent::Start(label.to_string()));
    }

    fn stop(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ProgressEvent::Stop);
    }

    fn write_line(&self, tone: Tone, line: &str) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ProgressEvent::Line(tone, line.to_string()));
    }
}
