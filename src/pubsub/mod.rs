//! Fan-out of recorder messages to subscribers, one topic per resource kind

pub mod message;

use crate::recorder::resource::Resource;
use crate::{RessyncError, Result};
use message::{Added, Deleted, Updated};
use ressync_common::{Metadata, ResourceKind};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

/// Receives lifecycle messages for one resource kind
pub trait ResourceSubscriber<R: Resource>: Send + Sync {
    fn on_batch_added(&self, md: &Metadata, msg: &Added<R::Source>) -> Result<()>;

    fn on_updated(&self, md: &Metadata, msg: &Updated<R::Source, R::FieldsUpdate>) -> Result<()>;

    fn on_batch_deleted(&self, md: &Metadata, msg: &Deleted<R::Source>) -> Result<()>;
}

struct Topic<R: Resource> {
    subscribers: Vec<Arc<dyn ResourceSubscriber<R>>>,
}

#[derive(Default)]
pub struct PubSubHub {
    topics: HashMap<ResourceKind, Box<dyn Any + Send + Sync>>,
}

impl PubSubHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<R: Resource>(&mut self, subscriber: Arc<dyn ResourceSubscriber<R>>) {
        let topic = self.topics.entry(R::KIND).or_insert_with(|| {
            Box::new(Topic::<R> {
                subscribers: Vec::new(),
            })
        });

        match topic.downcast_mut::<Topic<R>>() {
            Some(t) => t.subscribers.push(subscriber),
            None => error!("Topic {} registered with another resource type", R::KIND),
        }
        debug!("Subscriber registered for {}", R::KIND);
    }

    pub fn subscriber_count<R: Resource>(&self) -> usize {
        self.topic::<R>().map(|t| t.subscribers.len()).unwrap_or(0)
    }

    pub fn publish_added<R: Resource>(&self, md: &Metadata, msg: &Added<R::Source>) -> Result<()> {
        if msg.items.is_empty() {
            return Ok(());
        }
        self.notify::<R>("add", |s| s.on_batch_added(md, msg))
    }

    pub fn publish_updated<R: Resource>(
        &self,
        md: &Metadata,
        msg: &Updated<R::Source, R::FieldsUpdate>,
    ) -> Result<()> {
        self.notify::<R>("update", |s| s.on_updated(md, msg))
    }

    pub fn publish_deleted<R: Resource>(
        &self,
        md: &Metadata,
        msg: &Deleted<R::Source>,
    ) -> Result<()> {
        if msg.items.is_empty() {
            return Ok(());
        }
        self.notify::<R>("delete", |s| s.on_batch_deleted(md, msg))
    }

    fn topic<R: Resource>(&self) -> Option<&Topic<R>> {
        self.topics
            .get(&R::KIND)
            .and_then(|t| t.downcast_ref::<Topic<R>>())
    }

    /// Deliver to every subscriber; failures are logged and the first one
    /// is returned once all subscribers ran
    fn notify<R: Resource>(
        &self,
        event: &str,
        deliver: impl Fn(&dyn ResourceSubscriber<R>) -> Result<()>,
    ) -> Result<()> {
        let Some(topic) = self.topic::<R>() else {
            return Ok(());
        };

        let mut first_err: Option<RessyncError> = None;
        for subscriber in &topic.subscribers {
            if let Err(e) = deliver(subscriber.as_ref()) {
                error!("{} {} subscriber failed: {}", R::KIND, event, e);
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubsub::message::{PodIngressFieldsUpdate, Updated};
    use crate::recorder::resource::PodIngresses;
    use ressync_common::model::PodIngress;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        added: AtomicUsize,
        updated: AtomicUsize,
        deleted: AtomicUsize,
        fail: bool,
    }

    impl ResourceSubscriber<PodIngresses> for Counting {
        fn on_batch_added(&self, _md: &Metadata, msg: &Added<PodIngress>) -> Result<()> {
            self.added.fetch_add(msg.items.len(), Ordering::SeqCst);
            if self.fail {
                return Err(RessyncError::StoreError("boom".to_string()));
            }
            Ok(())
        }

        fn on_updated(
            &self,
            _md: &Metadata,
            _msg: &Updated<PodIngress, PodIngressFieldsUpdate>,
        ) -> Result<()> {
            self.updated.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_batch_deleted(&self, _md: &Metadata, msg: &Deleted<PodIngress>) -> Result<()> {
            self.deleted.fetch_add(msg.items.len(), Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let mut hub = PubSubHub::new();
        let a = Arc::new(Counting::default());
        let b = Arc::new(Counting::default());
        hub.subscribe::<PodIngresses>(a.clone());
        hub.subscribe::<PodIngresses>(b.clone());
        assert_eq!(hub.subscriber_count::<PodIngresses>(), 2);

        let md = Metadata::default();
        let added = Added {
            items: vec![PodIngress::default(), PodIngress::default()],
        };
        hub.publish_added::<PodIngresses>(&md, &added).unwrap();

        assert_eq!(a.added.load(Ordering::SeqCst), 2);
        assert_eq!(b.added.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failure_does_not_stop_fan_out() {
        let mut hub = PubSubHub::new();
        let failing = Arc::new(Counting {
            fail: true,
            ..Default::default()
        });
        let healthy = Arc::new(Counting::default());
        hub.subscribe::<PodIngresses>(failing.clone());
        hub.subscribe::<PodIngresses>(healthy.clone());

        let added = Added {
            items: vec![PodIngress::default()],
        };
        let result = hub.publish_added::<PodIngresses>(&Metadata::default(), &added);

        assert!(matches!(result, Err(RessyncError::StoreError(_))));
        assert_eq!(healthy.added.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_batches_are_not_published() {
        let mut hub = PubSubHub::new();
        let sub = Arc::new(Counting::default());
        hub.subscribe::<PodIngresses>(sub.clone());

        let deleted = Deleted {
            items: Vec::<PodIngress>::new(),
            soft_delete: true,
        };
        hub.publish_deleted::<PodIngresses>(&Metadata::default(), &deleted)
            .unwrap();
        assert_eq!(sub.deleted.load(Ordering::SeqCst), 0);
        assert_eq!(sub.updated.load(Ordering::SeqCst), 0);
    }
}
