//! The lifecycle of a small site, one step at a time.

use crate::integration::support::{Site, DE, ROOT};
use pagepaths::events::{NodeRef, TreeEvent};
use pagepaths::{Locale, Operator, PathCondition};

#[test]
fn child_and_grandchild_paths() {
    let site = Site::new();
    site.tree.insert_node(10, Some(ROOT), "about", 2).unwrap();
    site.index.rebuild(None).unwrap();
    assert_eq!(site.path(10, Locale::Default), Some("about".to_string()));

    site.tree.insert_node(11, Some(10), "team", 2).unwrap();
    site.index.rebuild(Some(10)).unwrap();
    assert_eq!(site.path(11, Locale::Default), Some("about/team".to_string()));
}

#[test]
fn rename_updates_descendants_transitively() {
    let site = Site::sample();
    site.tree.rename(10, "company").unwrap();
    site.index.rebuild(Some(10)).unwrap();
    assert_eq!(site.path(10, Locale::Default), Some("company".to_string()));
    assert_eq!(site.path(11, Locale::Default), Some("company/team".to_string()));
}

#[test]
fn locale_names_and_fallback() {
    let site = Site::sample();
    assert_eq!(site.path(10, DE), Some("unternehmen".to_string()));
    assert_eq!(site.path(11, DE), Some("unternehmen/team".to_string()));
    // No German name and no German ancestor: the default path stands in.
    assert_eq!(site.path(12, DE), Some("news".to_string()));
    assert_eq!(site.index.store().get_path(12, DE).unwrap(), None);
    assert_eq!(site.index.get_paths(12).unwrap().resolve(DE), Some("news"));
}

#[test]
fn delete_removes_every_locale() {
    let site = Site::sample();
    site.tree.remove_node(11).unwrap();
    site.events
        .dispatch(&TreeEvent::NodeDeleted(NodeRef::new(11, Some(10))))
        .unwrap();
    assert_eq!(site.path(11, Locale::Default), None);
    assert_eq!(site.path(11, DE), None);
    assert_eq!(site.path(10, Locale::Default), Some("about".to_string()));
    assert_eq!(site.path(10, DE), Some("unternehmen".to_string()));
}

#[test]
fn delete_spares_nodes_sharing_a_locale_prefix() {
    let site = Site::sample();
    let nl = Locale::Named(6);
    site.tree.insert_node(20, Some(ROOT), "ueber", 2).unwrap();
    site.tree.set_locale_name(20, nl, Some("about")).unwrap();
    site.tree.insert_node(21, Some(20), "jobs", 2).unwrap();
    site.index.rebuild(None).unwrap();
    assert_eq!(site.path(21, nl), Some("about/jobs".to_string()));

    site.tree.remove_node(11).unwrap();
    site.tree.remove_node(10).unwrap();
    site.events
        .dispatch(&TreeEvent::NodeDeleted(NodeRef::new(10, Some(ROOT))))
        .unwrap();
    assert_eq!(site.path(11, Locale::Default), None);
    assert_eq!(site.index.store().get_path(21, nl).unwrap(), Some("about/jobs".to_string()));
    assert_eq!(site.index.store().get_path(20, nl).unwrap(), Some("about".to_string()));
}

#[test]
fn root_segments_follow_renames() {
    let site = Site::sample();
    assert_eq!(site.index.is_root_segment("de").unwrap(), Some(ROOT));
    assert_eq!(site.index.is_root_segment("about").unwrap(), Some(10));

    site.tree.rename(10, "company").unwrap();
    site.events
        .dispatch(&TreeEvent::NodeRenamed(NodeRef::new(10, Some(ROOT))))
        .unwrap();
    assert_eq!(site.index.is_root_segment("about").unwrap(), None);
    assert_eq!(site.index.is_root_segment("company").unwrap(), Some(10));
    assert_eq!(site.index.is_root_segment("team").unwrap(), None);
}

#[test]
fn equality_condition_selects_one_node() {
    let site = Site::sample();
    site.tree.rename(10, "company").unwrap();
    site.index.rebuild(Some(10)).unwrap();
    let found = site
        .index
        .find(&[PathCondition::new(Operator::Equal, "company/team")])
        .unwrap();
    assert_eq!(found, vec![11]);
}
