use super::*;

#[test]
fn equality_ignores_read_only() {
    let a = Property::new("ivo://x#title", "Hello", true);
    let b = Property::new("ivo://x#title", "Hello", false);
    assert_eq!(a, b);
}

#[test]
fn delete_property_has_no_value() {
    let d = Property::delete("ivo://x#title");
    assert!(d.is_delete());
}

#[test]
fn sort_orders_by_uri() {
    let mut props = vec![
        Property::new("ivo://x#b", "2", true),
        Property::new("ivo://x#a", "1", true),
    ];
    sort_properties(&mut props);
    assert_eq!(props[0].uri, "ivo://x#a");
    assert_eq!(props[1].uri, "ivo://x#b");
}

#[test]
fn detects_duplicate_uri() {
    let mut props = vec![
        Property::new("ivo://x#a", "1", true),
        Property::new("ivo://x#a", "2", true),
    ];
    sort_properties(&mut props);
    assert_eq!(find_duplicate_uri(&props), Some("ivo://x#a"));
}

#[test]
fn no_duplicate_when_unique() {
    let mut props = vec![
        Property::new("ivo://x#a", "1", true),
        Property::new("ivo://x#b", "2", true),
    ];
    sort_properties(&mut props);
    assert_eq!(find_duplicate_uri(&props), None);
}
