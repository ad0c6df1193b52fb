use crate::integration::support::{Site, DE, ROOT};
use pagepaths::events::{NodeRef, TreeEvent, TreeEventDispatcher, TreeListener};
use pagepaths::notice::NoticeKind;
use pagepaths::{IndexError, Locale};
use std::sync::Arc;

#[test]
fn added_node_is_indexed_with_one_notice() {
    let site = Site::sample();
    site.notifier.take();
    site.tree.insert_node(13, Some(ROOT), "Contact", 2).unwrap();
    site.events
        .dispatch(&TreeEvent::NodeAdded(NodeRef::new(13, Some(ROOT))))
        .unwrap();

    assert_eq!(site.path(13, Locale::Default), Some("contact".to_string()));
    assert_eq!(site.index.is_root_segment("contact").unwrap(), Some(13));
    let notices = site.notifier.take();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, NoticeKind::Completion);
}

#[test]
fn moved_node_leaves_the_root_segments() {
    let site = Site::sample();
    site.tree.move_node(12, 10).unwrap();
    site.events
        .dispatch(&TreeEvent::NodeMoved {
            node: NodeRef::new(12, Some(10)),
            previous_parent: Some(ROOT),
        })
        .unwrap();

    assert_eq!(site.path(12, Locale::Default), Some("about/news".to_string()));
    assert_eq!(site.path(12, DE), Some("unternehmen/news".to_string()));
    assert_eq!(site.index.is_root_segment("news").unwrap(), None);
}

#[test]
fn locale_lifecycle() {
    let site = Site::sample();
    let french = Locale::Named(7);
    site.tree.set_locale_name(ROOT, french, Some("fr")).unwrap();
    site.events.dispatch(&TreeEvent::LocaleAdded(french)).unwrap();
    assert_eq!(site.index.is_root_segment("fr").unwrap(), Some(ROOT));

    site.tree.remove_locale(DE).unwrap();
    site.events.dispatch(&TreeEvent::LocaleRemoved(DE)).unwrap();
    assert_eq!(site.index.store().get_path(10, DE).unwrap(), None);
    assert_eq!(site.index.store().get_path(11, DE).unwrap(), None);
    assert_eq!(site.path(10, DE), Some("about".to_string()));
    assert_eq!(site.path(11, DE), Some("about/team".to_string()));
    assert_eq!(site.index.is_root_segment("de").unwrap(), None);
    assert_eq!(site.path(10, Locale::Default), Some("about".to_string()));
}

struct Failing;

impl TreeListener for Failing {
    fn on_event(&self, event: &TreeEvent) -> Result<(), IndexError> {
        Err(IndexError::ConfigError(format!("rejected {}", event.name())))
    }
}

#[test]
fn failing_listener_does_not_starve_others() {
    let site = Site::sample();
    let dispatcher = TreeEventDispatcher::new();
    dispatcher.subscribe(Arc::new(Failing));
    dispatcher.subscribe(site.index.clone());
    assert_eq!(dispatcher.listener_count(), 2);

    site.tree.rename(12, "Blog").unwrap();
    let err = dispatcher
        .dispatch(&TreeEvent::NodeRenamed(NodeRef::new(12, Some(ROOT))))
        .unwrap_err();
    assert!(matches!(err, IndexError::ConfigError(_)));
    assert_eq!(site.path(12, Locale::Default), Some("blog".to_string()));
}

#[test]
fn deleting_an_unindexed_node_is_harmless() {
    let site = Site::sample();
    site.events
        .dispatch(&TreeEvent::NodeDeleted(NodeRef::new(99, Some(ROOT))))
        .unwrap();
    assert_eq!(site.index.store().row_count().unwrap(), 6);
}
