//! Keyed entity registry shared by services and links.

use crate::domain::{AccessPoint, AccessPoints, ChangeKind, Link, LinkKey, Service};

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Something a registry can key.
pub trait Entity {
    type Key: Ord + Clone + fmt::Debug;

    fn key(&self) -> Self::Key;
}

impl Entity for Service {
    type Key = String;

    fn key(&self) -> String {
        self.id.clone()
    }
}

impl Entity for Link {
    type Key = LinkKey;

    fn key(&self) -> LinkKey {
        Link::key(self)
    }
}

/// Identity -> entity map plus the selected subset.
///
/// Entities are held behind `Arc` so a replay shares them with the frame it
/// copies from instead of cloning.
#[derive(Debug)]
pub struct Registry<E: Entity> {
    entries: BTreeMap<E::Key, Arc<E>>,
    active: BTreeSet<E::Key>,
}

impl<E: Entity> Default for Registry<E> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            active: BTreeSet::new(),
        }
    }
}

impl<E: Entity> Registry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<E>> {
        self.entries.values()
    }

    pub fn by_id<Q>(&self, id: &Q) -> Option<&Arc<E>>
    where
        E::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.get(id)
    }

    pub fn contains<Q>(&self, id: &Q) -> bool
    where
        E::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.contains_key(id)
    }

    /// Replace everything. Selection survives only for ids still present.
    pub fn set(&mut self, entities: impl IntoIterator<Item = Arc<E>>) {
        self.entries = entities.into_iter().map(|e| (e.key(), e)).collect();
        let entries = &self.entries;
        self.active.retain(|k| entries.contains_key(k));
    }

    /// Added and Updated both upsert. Deleting an unknown id does nothing.
    pub fn apply(&mut self, entity: Arc<E>, change: ChangeKind) {
        let key = entity.key();
        match change {
            ChangeKind::Added | ChangeKind::Updated => {
                self.entries.insert(key, entity);
            }
            ChangeKind::Deleted => {
                self.remove(&key);
            }
        }
    }

    pub fn upsert(&mut self, entity: Arc<E>) {
        self.entries.insert(entity.key(), entity);
    }

    pub fn remove(&mut self, key: &E::Key) -> Option<Arc<E>> {
        self.active.remove(key);
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.active.clear();
    }

    pub fn is_active<Q>(&self, id: &Q) -> bool
    where
        E::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.active.contains(id)
    }

    /// Unknown ids cannot be selected; returns whether the id is active now.
    pub fn set_active_state(&mut self, key: &E::Key, active: bool) -> bool {
        if active && self.entries.contains_key(key) {
            self.active.insert(key.clone());
        } else {
            self.active.remove(key);
        }
        self.active.contains(key)
    }

    pub fn toggle_active(&mut self, key: &E::Key) -> bool {
        let next = !self.active.contains(key);
        self.set_active_state(key, next)
    }

    pub fn active_keys(&self) -> impl Iterator<Item = &E::Key> {
        self.active.iter()
    }

    pub fn clear_active(&mut self) {
        self.active.clear();
    }
}

impl Registry<Service> {
    /// Derive access points from `links`: one per destination port and
    /// protocol, only for links whose two endpoints are both registered.
    pub fn extract_access_points<'a>(
        &self,
        links: impl IntoIterator<Item = &'a Link>,
    ) -> AccessPoints {
        let mut aps = AccessPoints::new();
        for link in links {
            if !self.contains(link.source_id.as_str())
                || !self.contains(link.destination_id.as_str())
            {
                continue;
            }
            aps.insert(AccessPoint {
                service_id: link.destination_id.clone(),
                port: link.destination_port,
                protocol: link.protocol,
            });
        }
        aps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::L4Protocol;
    use pretty_assertions::assert_eq;

    fn svc(id: &str) -> Arc<Service> {
        Arc::new(Service::new(id, id))
    }

    fn ids(reg: &Registry<Service>) -> Vec<String> {
        reg.iter().map(|s| s.id.clone()).collect()
    }

    #[test]
    fn added_and_updated_upsert() {
        let mut reg = Registry::new();
        reg.apply(svc("a"), ChangeKind::Added);
        reg.apply(Arc::new(Service::new("a", "renamed")), ChangeKind::Updated);
        reg.apply(svc("b"), ChangeKind::Updated);

        assert_eq!(ids(&reg), vec!["a", "b"]);
        assert_eq!(reg.by_id("a").map(|s| s.name.as_str()), Some("renamed"));
        assert!(reg.by_id("zzz").is_none());
    }

    #[test]
    fn deleting_missing_id_is_noop() {
        let mut reg = Registry::new();
        reg.apply(svc("a"), ChangeKind::Added);
        reg.apply(svc("ghost"), ChangeKind::Deleted);
        reg.apply(svc("ghost"), ChangeKind::Deleted);
        assert_eq!(ids(&reg), vec!["a"]);
    }

    #[test]
    fn set_drops_selection_of_removed_ids() {
        let mut reg = Registry::new();
        reg.set([svc("a"), svc("b")]);
        assert!(reg.set_active_state(&"a".to_string(), true));
        assert!(reg.set_active_state(&"b".to_string(), true));

        reg.set([svc("b"), svc("c")]);
        assert!(!reg.is_active("a"));
        assert!(reg.is_active("b"));
    }

    #[test]
    fn unknown_ids_cannot_be_selected() {
        let mut reg: Registry<Service> = Registry::new();
        assert!(!reg.toggle_active(&"nope".to_string()));
        assert_eq!(reg.active_keys().count(), 0);
    }

    #[test]
    fn access_points_skip_dangling_links_and_are_idempotent() {
        let mut reg = Registry::new();
        reg.set([svc("a"), svc("b")]);
        let links = vec![
            Link::new("a", "b", 80, L4Protocol::Tcp),
            Link::new("a", "b", 80, L4Protocol::Tcp),
            Link::new("a", "b", 53, L4Protocol::Udp),
            Link::new("a", "missing", 443, L4Protocol::Tcp),
        ];

        let first = reg.extract_access_points(&links);
        let second = reg.extract_access_points(&links);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first.for_service("b").count(), 2);
        assert_eq!(first.for_service("missing").count(), 0);
    }
}
