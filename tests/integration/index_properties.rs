//! Invariants that hold for any tree shape.

use crate::integration::support::{Site, DE, ROOT};
use pagepaths::events::{NodeRef, TreeEvent};
use pagepaths::{Locale, TreeSource};
use proptest::prelude::*;

/// Builds a random tree. Node `i + 2` hangs under the root or an earlier node;
/// names carry the id so siblings never collide.
fn grow(site: &Site, shape: &[(usize, String, bool)]) -> Vec<u64> {
    let mut ids = vec![ROOT];
    for (i, (parent_pick, name, german)) in shape.iter().enumerate() {
        let id = i as u64 + 2;
        let parent = ids[parent_pick % ids.len()];
        let name = format!("{} {}", name, id);
        site.tree.insert_node(id, Some(parent), &name, 2).unwrap();
        if *german {
            site.tree
                .set_locale_name(id, DE, Some(&format!("de {}", name)))
                .unwrap();
        }
        ids.push(id);
    }
    ids
}

fn shapes() -> impl Strategy<Value = Vec<(usize, String, bool)>> {
    prop::collection::vec((0usize..32, "[a-z]{1,8}", any::<bool>()), 1..24)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn rebuild_is_idempotent(shape in shapes()) {
        let site = Site::new();
        grow(&site, &shape);
        site.index.rebuild(None).unwrap();
        let first = site.index.store().entries().unwrap();
        site.index.rebuild(None).unwrap();
        prop_assert_eq!(first, site.index.store().entries().unwrap());
    }

    #[test]
    fn child_paths_extend_parent_paths(shape in shapes()) {
        let site = Site::new();
        let ids = grow(&site, &shape);
        let report = site.index.rebuild(None).unwrap();
        prop_assert!(report.is_clean());

        for id in ids.into_iter().filter(|id| *id != ROOT) {
            let node = site.tree.node(id).unwrap().unwrap();
            let parent = node.parent_id.unwrap();
            let paths = site.index.get_paths(id).unwrap();
            for locale in [Locale::Default, DE] {
                let path = paths.resolve(locale).unwrap();
                if parent == ROOT {
                    prop_assert!(!path.contains('/'));
                } else {
                    let parent_paths = site.index.get_paths(parent).unwrap();
                    let prefix = format!("{}/", parent_paths.resolve(locale).unwrap());
                    prop_assert!(path.starts_with(&prefix), "{} under {}", path, prefix);
                }
            }
        }
    }

    #[test]
    fn stored_paths_round_trip(shape in shapes()) {
        let site = Site::new();
        grow(&site, &shape);
        site.index.rebuild(None).unwrap();
        for entry in site.index.store().entries().unwrap() {
            if entry.node_id == ROOT {
                continue;
            }
            let found = site
                .index
                .store()
                .lookup_by_path(&[entry.path.clone()])
                .unwrap();
            prop_assert_eq!(found, Some((entry.node_id, entry.locale)));
        }
    }
}

#[test]
fn paths_stay_unique_per_locale() {
    let site = Site::sample();
    site.tree.insert_node(13, Some(ROOT), "news", 2).unwrap();
    let report = site.index.rebuild(Some(13)).unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].node_id, 13);
    assert_eq!(site.path(13, Locale::Default), None);

    let entries = site.index.store().entries().unwrap();
    let mut seen = std::collections::HashSet::new();
    for entry in &entries {
        assert!(seen.insert((entry.locale, entry.path.clone())), "duplicate {:?}", entry);
    }
}

#[test]
fn swapped_names_are_corrected() {
    let site = Site::sample();
    site.tree.rename(10, "news").unwrap();
    site.tree.rename(12, "about").unwrap();
    let report = site.index.rebuild(Some(10)).unwrap();
    assert!(report.is_clean(), "{:?}", report.failures);
    assert_eq!(site.path(10, Locale::Default), Some("news".to_string()));
    assert_eq!(site.path(11, Locale::Default), Some("news/team".to_string()));
    assert_eq!(site.path(12, Locale::Default), Some("about".to_string()));
}

#[test]
fn deleting_a_subtree_clears_descendants() {
    let site = Site::sample();
    site.tree.remove_node(11).unwrap();
    site.tree.remove_node(10).unwrap();
    site.events
        .dispatch(&TreeEvent::NodeDeleted(NodeRef::new(10, Some(ROOT))))
        .unwrap();
    for node in [10, 11] {
        assert!(site.index.get_paths(node).unwrap().is_empty());
    }
    assert_eq!(site.index.is_root_segment("about").unwrap(), None);
    assert_eq!(site.path(12, Locale::Default), Some("news".to_string()));
}
