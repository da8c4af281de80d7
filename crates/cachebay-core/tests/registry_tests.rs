//! Integration tests for resolving caches through the registry.
//!
//! Every behavioural check runs against each adapter that works without an
//! external server.

use cachebay::{AdapterRegistry, Cache, CacheError};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// Started caches for every self-contained adapter.
fn local_caches(registry: &AdapterRegistry, dir: &TempDir) -> Vec<Box<dyn Cache>> {
    let file_config = serde_json::json!({
        "path": dir.path().join("cache.sqlite"),
    })
    .to_string();

    vec![
        registry.new_cache("memory", "").unwrap(),
        registry.new_cache("file", &file_config).unwrap(),
    ]
}

fn with_each_cache(check: impl Fn(&dyn Cache)) {
    let registry = AdapterRegistry::with_builtin_adapters();
    let dir = TempDir::new().expect("Failed to create temp dir");
    for cache in local_caches(&registry, &dir) {
        check(cache.as_ref());
    }
}

#[test]
fn test_never_written_keys_are_absent() {
    with_each_cache(|cache| {
        assert!(cache.get("never-written").is_none(), "{}", cache.name());
        assert!(!cache.is_exist("never-written"), "{}", cache.name());
    });
}

#[test]
fn test_zero_ttl_never_expires() {
    with_each_cache(|cache| {
        cache.put("forever", b"value", Duration::ZERO).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(cache.get("forever"), Some(b"value".to_vec()), "{}", cache.name());
    });
}

#[test]
fn test_positive_ttl_expires() {
    with_each_cache(|cache| {
        cache
            .put("brief", b"value", Duration::from_millis(40))
            .unwrap();
        assert_eq!(cache.get("brief"), Some(b"value".to_vec()), "{}", cache.name());

        thread::sleep(Duration::from_millis(120));
        assert!(cache.get("brief").is_none(), "{}", cache.name());
    });
}

#[test]
fn test_delete_then_get_is_absent() {
    with_each_cache(|cache| {
        cache.put("doomed", b"value", Duration::ZERO).unwrap();
        cache.delete("doomed").unwrap();
        assert!(cache.get("doomed").is_none(), "{}", cache.name());

        cache.delete("never-existed").unwrap();
        assert!(cache.get("never-existed").is_none(), "{}", cache.name());
    });
}

#[test]
fn test_incr_on_numeric_string() {
    with_each_cache(|cache| {
        cache.put("five", b"5", Duration::ZERO).unwrap();
        assert_eq!(cache.incr("five").unwrap(), 6);
        assert_eq!(cache.get("five"), Some(b"6".to_vec()), "{}", cache.name());

        assert_eq!(cache.decr("five").unwrap(), 5);
        assert_eq!(cache.get("five"), Some(b"5".to_vec()), "{}", cache.name());
    });
}

#[test]
fn test_incr_on_non_numeric_fails_without_mutation() {
    with_each_cache(|cache| {
        cache.put("text", b"hello", Duration::ZERO).unwrap();

        let err = cache.incr("text").unwrap_err();
        assert!(matches!(err, CacheError::NotNumeric { .. }), "{}", cache.name());
        assert!(cache.decr("text").is_err());
        assert_eq!(cache.get("text"), Some(b"hello".to_vec()), "{}", cache.name());
    });
}

#[test]
fn test_counter_overflow_is_reported_the_same_way() {
    with_each_cache(|cache| {
        let max = i64::MAX.to_string();
        cache.put("max", max.as_bytes(), Duration::ZERO).unwrap();

        let err = cache.incr("max").unwrap_err();
        assert!(matches!(err, CacheError::Overflow { .. }), "{}", cache.name());
        assert_eq!(cache.get("max"), Some(max.into_bytes()), "{}", cache.name());
    });
}

#[test]
fn test_get_multi_with_gap() {
    with_each_cache(|cache| {
        cache.put("a", b"alpha", Duration::ZERO).unwrap();
        cache.put("c", b"gamma", Duration::ZERO).unwrap();

        let values = cache.get_multi(&["a", "b", "c"]);
        assert_eq!(
            values,
            vec![Some(b"alpha".to_vec()), None, Some(b"gamma".to_vec())],
            "{}",
            cache.name()
        );
        assert!(cache.get_multi(&[]).is_empty());
    });
}

#[test]
fn test_keys_with_whitespace_are_distinct() {
    with_each_cache(|cache| {
        cache.put("a b", b"spaced", Duration::ZERO).unwrap();
        let values = cache.get_multi(&["a b", "a", "b"]);
        assert_eq!(values, vec![Some(b"spaced".to_vec()), None, None]);
    });
}

#[test]
fn test_unknown_backend_is_lookup_error() {
    let registry = AdapterRegistry::with_builtin_adapters();
    let err = registry
        .new_cache("unknown-backend", r#"{"conn":"127.0.0.1:6379"}"#)
        .unwrap_err();

    assert!(matches!(err, CacheError::UnknownAdapter { .. }));
    assert!(!registry.contains("unknown-backend"));
}

#[test]
fn test_missing_conn_is_config_error() {
    let registry = AdapterRegistry::with_builtin_adapters();
    let err = registry
        .new_cache("redis", r#"{"key":"app","dbNum":"1"}"#)
        .unwrap_err();

    assert!(matches!(err, CacheError::Config { .. }));
    assert_eq!(registry.names(), vec!["file", "memory", "redis"]);
}

#[test]
fn test_file_clear_all_removes_other_tenants() {
    let registry = AdapterRegistry::with_builtin_adapters();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shared.sqlite");

    let tenant_a = registry
        .new_cache(
            "file",
            &serde_json::json!({"path": path, "key": "tenant-a"}).to_string(),
        )
        .unwrap();
    let tenant_b = registry
        .new_cache(
            "file",
            &serde_json::json!({"path": path, "key": "tenant-b"}).to_string(),
        )
        .unwrap();

    tenant_a.put("mine", b"1", Duration::ZERO).unwrap();
    tenant_b.put("theirs", b"2", Duration::ZERO).unwrap();
    assert!(!tenant_a.is_exist("theirs"));

    tenant_a.clear_all().unwrap();

    assert!(!tenant_a.is_exist("mine"));
    assert!(!tenant_b.is_exist("theirs"));
}

#[test]
fn test_custom_adapter_registration() {
    let registry = AdapterRegistry::new();
    registry.register("scratch", cachebay::MemoryCache::boxed);

    let cache = registry.new_cache("scratch", r#"{"capacity":"8"}"#).unwrap();
    cache.put("k", b"v", Duration::ZERO).unwrap();
    assert_eq!(cache.get("k"), Some(b"v".to_vec()));
    assert!(matches!(
        registry.new_cache("redis", "{}"),
        Err(CacheError::UnknownAdapter { .. })
    ));
}
