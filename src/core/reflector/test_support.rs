//! Test doubles shared by the reflector tests: a failure-injecting store, a
//! scripted source watcher and a trivial converter.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::reflector::converter::Converter;
use crate::core::reflector::source::{SourceEvent, SourceWatcher};
use crate::core::store::{KeyValueStore, StoreError};

pub(crate) const PREFIX: &str = "/test/k8s/item/";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TestObj {
    pub name: String,
    pub value: String,
    pub mirrored: bool,
}

pub(crate) fn obj(name: &str, value: &str) -> TestObj {
    TestObj {
        name: name.to_string(),
        value: value.to_string(),
        mirrored: true,
    }
}

pub(crate) fn key(name: &str) -> String {
    format!("{PREFIX}{name}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct TestRecord {
    pub value: String,
}

pub(crate) fn encoded(value: &str) -> Vec<u8> {
    serde_json::to_vec(&TestRecord {
        value: value.to_string(),
    })
    .unwrap()
}

#[derive(Default)]
pub(crate) struct TestConverter;

impl Converter for TestConverter {
    type Object = TestObj;
    type Record = TestRecord;

    fn prefix(&self) -> &str {
        PREFIX
    }

    fn convert(&self, obj: &TestObj) -> Option<(String, TestRecord)> {
        if !obj.mirrored {
            return None;
        }
        Some((
            key(&obj.name),
            TestRecord {
                value: obj.value.clone(),
            },
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StoreOp {
    Put(String, Vec<u8>),
    Delete(String),
}

/// In-memory store recording every successful mutation.
#[derive(Default)]
pub(crate) struct MockStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
    ops: Mutex<Vec<StoreOp>>,
    put_failures: Mutex<HashMap<String, usize>>,
    delete_failures: Mutex<HashMap<String, usize>>,
    list_failures: AtomicUsize,
    list_calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl MockStore {
    pub fn with_entries(entries: &[(&str, &str)]) -> Self {
        let store = Self::default();
        {
            let mut map = store.entries.lock().unwrap();
            for (name, value) in entries {
                map.insert(key(name), encoded(value));
            }
        }
        store
    }

    pub fn insert_raw(&self, key: &str, raw: &[u8]) {
        self.entries.lock().unwrap().insert(key.to_string(), raw.to_vec());
    }

    /// Fail the next `times` puts for `key`.
    pub fn fail_put(&self, key: &str, times: usize) {
        self.put_failures.lock().unwrap().insert(key.to_string(), times);
    }

    pub fn fail_delete(&self, key: &str, times: usize) {
        self.delete_failures.lock().unwrap().insert(key.to_string(), times);
    }

    pub fn fail_list(&self, times: usize) {
        self.list_failures.store(times, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().unwrap().clear();
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Decoded `name -> value` view of the stored records.
    pub fn contents(&self) -> BTreeMap<String, String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| {
                let record: TestRecord = serde_json::from_slice(v).unwrap();
                (k.trim_start_matches(PREFIX).to_string(), record.value)
            })
            .collect()
    }

    fn take_failure(map: &Mutex<HashMap<String, usize>>, key: &str) -> bool {
        let mut map = map.lock().unwrap();
        match map.get_mut(key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("mock store down".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MockStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.check_available()?;
        if Self::take_failure(&self.put_failures, key) {
            return Err(StoreError::Unavailable(format!("injected put failure for {key}")));
        }
        self.entries.lock().unwrap().insert(key.to_string(), value.clone());
        self.ops.lock().unwrap().push(StoreOp::Put(key.to_string(), value));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check_available()?;
        if Self::take_failure(&self.delete_failures, key) {
            return Err(StoreError::Unavailable(format!("injected delete failure for {key}")));
        }
        let existed = self.entries.lock().unwrap().remove(key).is_some();
        self.ops.lock().unwrap().push(StoreOp::Delete(key.to_string()));
        Ok(existed)
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let remaining = self.list_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.list_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("injected list failure".to_string()));
        }
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}

/// Source watcher whose cache and event stream are driven by the test.
pub(crate) struct MockWatcher {
    cache: Mutex<Vec<Arc<TestObj>>>,
    synced: AtomicBool,
    feed: tokio::sync::Mutex<Option<mpsc::Receiver<SourceEvent<TestObj>>>>,
}

impl MockWatcher {
    pub fn new(cache: Vec<TestObj>) -> (Arc<Self>, mpsc::Sender<SourceEvent<TestObj>>) {
        let (tx, rx) = mpsc::channel(64);
        let watcher = Arc::new(Self {
            cache: Mutex::new(cache.into_iter().map(Arc::new).collect()),
            synced: AtomicBool::new(true),
            feed: tokio::sync::Mutex::new(Some(rx)),
        });
        (watcher, tx)
    }

    pub fn set_cache(&self, cache: Vec<TestObj>) {
        *self.cache.lock().unwrap() = cache.into_iter().map(Arc::new).collect();
    }

    pub fn set_synced(&self, synced: bool) {
        self.synced.store(synced, Ordering::SeqCst);
    }
}

#[async_trait]
impl SourceWatcher for MockWatcher {
    type Object = TestObj;

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }

    fn list(&self) -> Vec<Arc<TestObj>> {
        self.cache.lock().unwrap().clone()
    }

    async fn run(&self, events: mpsc::Sender<SourceEvent<TestObj>>, shutdown: CancellationToken) {
        let Some(mut feed) = self.feed.lock().await.take() else {
            return;
        };
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                next = feed.recv() => match next {
                    Some(event) => {
                        if events.send(event).await.is_err() {
                            return;
                        }
                    }
                    None => return,
                },
            }
        }
    }
}

/// Poll `check` until it returns true or two seconds pass.
pub(crate) async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}
