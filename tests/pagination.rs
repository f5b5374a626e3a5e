//! Ordering and Pagination Tests

use oakdb::{Base, Oak, Window};
use serde_json::json;

// =============================================================================
// Test Utilities
// =============================================================================

fn scored(base: &mut Base) {
    for (key, score) in [("a", 10), ("b", 20), ("c", 30), ("d", 50)] {
        base.add(json!({"score": score}), Some(key), false).unwrap();
    }
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn test_range_filter_with_default_created_desc() {
    let mut oak = Oak::in_memory().unwrap();
    let base = oak.base("scores").unwrap();
    scored(base);

    let result = base
        .fetch(&json!({"score__range": [20, 40]}), None, Window::default())
        .unwrap();
    assert_eq!(result.keys(), vec!["c", "b"]);
    assert_eq!(result.total, 2);
    assert_eq!(result.limit, 1000);
}

#[test]
fn test_order_by_data_field_and_key() {
    let mut oak = Oak::in_memory().unwrap();
    let base = oak.base("scores").unwrap();
    scored(base);

    let asc = base.fetch(&json!(null), Some("created__asc"), Window::default()).unwrap();
    assert_eq!(asc.keys(), vec!["a", "b", "c", "d"]);

    let by_key = base.fetch(&json!(null), Some("key__desc"), Window::default()).unwrap();
    assert_eq!(by_key.keys(), vec!["d", "c", "b", "a"]);
}

#[test]
fn test_ties_break_by_key_ascending() {
    let mut oak = Oak::in_memory().unwrap();
    let base = oak.base("batch").unwrap();
    base.adds(
        vec![json!({"key": "z"}), json!({"key": "m"}), json!({"key": "b"})],
        false,
    )
    .unwrap();

    let result = base.fetch(&json!(null), None, Window::default()).unwrap();
    assert_eq!(result.keys(), vec!["b", "m", "z"]);
}

#[test]
fn test_invalid_order_tokens() {
    let mut oak = Oak::in_memory().unwrap();
    let base = oak.base("scores").unwrap();
    scored(base);

    for order in ["score__asc", "rank__desc", "distance__asc", "created", "created__up"] {
        let err = base.fetch(&json!(null), Some(order), Window::default()).unwrap_err();
        assert_eq!(err.code(), "OAK_INVALID_ARGUMENT", "{}", order);
    }
}

// =============================================================================
// Pagination
// =============================================================================

#[test]
fn test_pages_concatenate_to_full_result() {
    let mut oak = Oak::in_memory().unwrap();
    let base = oak.base("many").unwrap();
    let values = (0..23).map(|i| json!({"key": format!("k{:02}", i), "n": i})).collect();
    base.adds(values, false).unwrap();

    let full = base
        .fetch(&json!({"n__gte": 3}), Some("key__asc"), Window::new(100, 1))
        .unwrap();
    assert_eq!(full.total, 20);

    let mut collected = Vec::new();
    let first = base
        .fetch(&json!({"n__gte": 3}), Some("key__asc"), Window::new(6, 1))
        .unwrap();
    assert_eq!(first.pages, 4);
    for page in 1..=first.pages {
        let result = base
            .fetch(&json!({"n__gte": 3}), Some("key__asc"), Window::new(6, page))
            .unwrap();
        assert_eq!(result.total, 20);
        assert_eq!(result.page, page);
        collected.extend(result.items.into_iter().map(|item| item.key));
    }

    let expected: Vec<String> = full.items.into_iter().map(|item| item.key).collect();
    assert_eq!(collected, expected);
}

#[test]
fn test_page_past_end_is_empty_but_counted() {
    let mut oak = Oak::in_memory().unwrap();
    let base = oak.base("scores").unwrap();
    scored(base);

    let result = base.fetch(&json!(null), None, Window::new(3, 5)).unwrap();
    assert!(result.items.is_empty());
    assert_eq!(result.total, 4);
    assert_eq!(result.pages, 2);
}

#[test]
fn test_zero_limit_and_page_are_clamped() {
    let mut oak = Oak::in_memory().unwrap();
    let base = oak.base("scores").unwrap();
    scored(base);

    let result = base.fetch(&json!(null), None, Window::new(0, 0)).unwrap();
    assert_eq!(result.limit, 1);
    assert_eq!(result.page, 1);
    assert_eq!(result.keys(), vec!["d"]);
}

#[test]
fn test_empty_base_has_zero_pages() {
    let mut oak = Oak::in_memory().unwrap();
    let base = oak.base("empty").unwrap();
    let result = base.fetch(&json!(null), None, Window::default()).unwrap();
    assert_eq!(result.total, 0);
    assert_eq!(result.pages, 0);
    assert_eq!(result.page, 1);
}
