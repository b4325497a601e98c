use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use kube::runtime::reflector::{self, store::Writer, ObjectRef, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::reflector::{SourceEvent, SourceWatcher};

/// Watches one Kubernetes resource type, keeping a local cache through a
/// kube-runtime reflector store and translating watch events into
/// [`SourceEvent`]s.
pub struct KubeSourceWatcher<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    api: Api<K>,
    config: watcher::Config,
    reader: Store<K>,
    writer: Mutex<Option<Writer<K>>>,
    synced: AtomicBool,
}

impl<K> KubeSourceWatcher<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    pub fn new(api: Api<K>, config: watcher::Config) -> Self {
        let (reader, writer) = reflector::store();
        Self {
            api,
            config,
            reader,
            writer: Mutex::new(Some(writer)),
            synced: AtomicBool::new(false),
        }
    }

    /// Cluster-wide watch with the default watcher configuration.
    pub fn all(client: Client) -> Self {
        Self::new(Api::all(client), watcher::Config::default())
    }
}

#[async_trait]
impl<K> SourceWatcher for KubeSourceWatcher<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    type Object = K;

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    fn list(&self) -> Vec<Arc<K>> {
        self.reader.state()
    }

    async fn run(&self, events: mpsc::Sender<SourceEvent<K>>, shutdown: CancellationToken) {
        let Some(mut writer) = self.writer.lock().await.take() else {
            warn!("Watcher for {} already running", K::kind(&()));
            return;
        };

        info!("Starting {} watcher...", K::kind(&()));

        let mut stream = watcher(self.api.clone(), self.config.clone())
            .default_backoff()
            .boxed();
        let mut translator = RelistTranslator::default();

        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = stream.next() => next,
            };

            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    // the stream backs off and relists by itself
                    warn!("{} watcher error: {:?}", K::kind(&()), e);
                    continue;
                }
                None => break,
            };

            let translated = translator.translate(&self.reader, &event);
            writer.apply_watcher_event(&event);

            if matches!(event, watcher::Event::InitDone) && !self.synced.swap(true, Ordering::AcqRel) {
                info!("{} cache synced ({} objects)", K::kind(&()), self.reader.state().len());
            }

            for source_event in translated {
                if events.send(source_event).await.is_err() {
                    debug!("{} event receiver closed", K::kind(&()));
                    return;
                }
            }
        }

        info!("{} watcher stopped", K::kind(&()));
    }
}

/// Turns raw watcher events into add/update/delete notifications.
///
/// Must see each event before it is applied to the cache, so that
/// `reader` still holds the previous state of the object. During a relist
/// the cache keeps its pre-relist contents until `InitDone`, at which point
/// everything not seen in the relist is reported as deleted.
struct RelistTranslator<K: Resource<DynamicType = ()>> {
    seen: Option<HashSet<ObjectRef<K>>>,
}

impl<K: Resource<DynamicType = ()>> Default for RelistTranslator<K> {
    fn default() -> Self {
        Self { seen: None }
    }
}

impl<K> RelistTranslator<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    fn translate(&mut self, reader: &Store<K>, event: &watcher::Event<K>) -> Vec<SourceEvent<K>> {
        match event {
            watcher::Event::Apply(obj) => vec![Self::applied(reader, obj)],
            watcher::Event::Delete(obj) => vec![SourceEvent::Deleted(obj.clone())],
            watcher::Event::Init => {
                self.seen = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(obj) => {
                if let Some(seen) = self.seen.as_mut() {
                    seen.insert(ObjectRef::from_obj(obj));
                }
                vec![Self::applied(reader, obj)]
            }
            watcher::Event::InitDone => {
                let seen = self.seen.take().unwrap_or_default();
                reader
                    .state()
                    .into_iter()
                    .filter(|obj| !seen.contains(&ObjectRef::from_obj(&**obj)))
                    .map(|obj| SourceEvent::Deleted((*obj).clone()))
                    .collect()
            }
        }
    }

    fn applied(reader: &Store<K>, obj: &K) -> SourceEvent<K> {
        match reader.get(&ObjectRef::from_obj(obj)) {
            Some(old) => SourceEvent::Updated {
                old: (*old).clone(),
                new: obj.clone(),
            },
            None => SourceEvent::Added(obj.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::kube_resources::{ObjectMeta, Pod};

    fn pod(name: &str, version: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                resource_version: Some(version.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn name_of(event: &SourceEvent<Pod>) -> (&'static str, String) {
        match event {
            SourceEvent::Added(p) => ("added", p.metadata.name.clone().unwrap_or_default()),
            SourceEvent::Updated { new, .. } => ("updated", new.metadata.name.clone().unwrap_or_default()),
            SourceEvent::Deleted(p) => ("deleted", p.metadata.name.clone().unwrap_or_default()),
        }
    }

    fn feed(
        translator: &mut RelistTranslator<Pod>,
        reader: &Store<Pod>,
        writer: &mut Writer<Pod>,
        event: watcher::Event<Pod>,
    ) -> Vec<SourceEvent<Pod>> {
        let out = translator.translate(reader, &event);
        writer.apply_watcher_event(&event);
        out
    }

    #[test]
    fn apply_is_added_then_updated_with_previous_state() {
        let (reader, mut writer) = reflector::store::<Pod>();
        let mut translator = RelistTranslator::default();

        let first = feed(&mut translator, &reader, &mut writer, watcher::Event::Apply(pod("a", "1")));
        assert_eq!(first, vec![SourceEvent::Added(pod("a", "1"))]);

        let second = feed(&mut translator, &reader, &mut writer, watcher::Event::Apply(pod("a", "2")));
        assert_eq!(
            second,
            vec![SourceEvent::Updated {
                old: pod("a", "1"),
                new: pod("a", "2"),
            }]
        );

        let gone = feed(&mut translator, &reader, &mut writer, watcher::Event::Delete(pod("a", "2")));
        assert_eq!(gone, vec![SourceEvent::Deleted(pod("a", "2"))]);
    }

    #[test]
    fn relist_reports_objects_missing_from_the_new_listing_as_deleted() {
        let (reader, mut writer) = reflector::store::<Pod>();
        let mut translator = RelistTranslator::default();

        for event in [
            watcher::Event::Init,
            watcher::Event::InitApply(pod("a", "1")),
            watcher::Event::InitApply(pod("b", "1")),
            watcher::Event::InitDone,
        ] {
            feed(&mut translator, &reader, &mut writer, event);
        }
        assert_eq!(reader.state().len(), 2);

        let mut relisted = Vec::new();
        for event in [
            watcher::Event::Init,
            watcher::Event::InitApply(pod("b", "2")),
            watcher::Event::InitApply(pod("c", "1")),
            watcher::Event::InitDone,
        ] {
            relisted.extend(feed(&mut translator, &reader, &mut writer, event));
        }

        let summary: Vec<_> = relisted.iter().map(name_of).collect();
        assert_eq!(
            summary,
            vec![
                ("updated", "b".to_string()),
                ("added", "c".to_string()),
                ("deleted", "a".to_string()),
            ]
        );
        assert_eq!(reader.state().len(), 2);
    }
}
