use crate::integration::support::{Site, DE};
use pagepaths::query::PathQueryAdapter;
use pagepaths::tree::sqlite::NODES_TABLE;
use pagepaths::{IndexError, Operator, PathCondition, PathSanitizer, QueryError, SelectQuery};
use rusqlite::types::Value;

fn find(site: &Site, conditions: &[PathCondition]) -> Vec<u64> {
    site.index.find(conditions).unwrap()
}

#[test]
fn comparison_operators() {
    let site = Site::sample();
    assert_eq!(
        find(&site, &[PathCondition::any_of(Operator::Equal, ["about", "/News/"])]),
        vec![10, 12]
    );
    assert_eq!(
        find(&site, &[PathCondition::new(Operator::Equal, "about").negated()]),
        vec![1, 11, 12]
    );
    assert_eq!(
        find(&site, &[PathCondition::any_of(Operator::NotEqual, ["about", "about/team"])]),
        vec![1, 12]
    );
    assert_eq!(find(&site, &[PathCondition::new(Operator::EndsWith, "team")]), vec![11]);
    assert_eq!(
        find(&site, &[PathCondition::new(Operator::ContainsPhrase, "about")]),
        vec![10, 11]
    );
}

#[test]
fn conditions_combine_with_and() {
    let site = Site::sample();
    let found = find(
        &site,
        &[
            PathCondition::new(Operator::StartsWith, "about"),
            PathCondition::new(Operator::NotEqual, "about"),
        ],
    );
    assert_eq!(found, vec![11]);
}

#[test]
fn locale_conditions_fall_back_to_default_paths() {
    let site = Site::sample();
    assert_eq!(
        find(&site, &[PathCondition::new(Operator::StartsWith, "unternehmen").in_locale(DE)]),
        vec![10, 11]
    );
    assert_eq!(
        find(&site, &[PathCondition::new(Operator::Equal, "news").in_locale(DE)]),
        vec![12]
    );
}

#[test]
fn adapter_extends_a_host_query() {
    let site = Site::sample();
    let mut query = SelectQuery::new(NODES_TABLE, "id");
    query.where_clause("nodes.type_id = ?", vec![Value::Integer(2)]);
    PathQueryAdapter::new(PathSanitizer::default())
        .apply(&mut query, &PathCondition::new(Operator::ContainsLike, "e"))
        .unwrap();
    let (sql, params) = query.build();
    assert!(sql.contains("LIKE ? ESCAPE"));
    assert_eq!(params.len(), 2);
    assert_eq!(site.index.store().select_node_ids(&query).unwrap(), vec![11, 12]);
}

#[test]
fn usage_errors_are_reported() {
    let site = Site::sample();
    let err = site
        .index
        .find(&[PathCondition::any_of(Operator::ContainsWords, ["a", "b"])])
        .unwrap_err();
    assert!(matches!(
        err,
        IndexError::QueryError(QueryError::MultiValueUnsupported("~="))
    ));

    let err = site
        .index
        .find(&[PathCondition::new(Operator::StartsWith, "a").negated()])
        .unwrap_err();
    assert!(matches!(
        err,
        IndexError::QueryError(QueryError::NegateUnsupported("^="))
    ));

    assert!(matches!(
        "=~".parse::<Operator>(),
        Err(QueryError::UnknownOperator(_))
    ));
}
