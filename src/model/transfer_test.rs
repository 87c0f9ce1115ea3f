use super::*;

#[test]
fn protocol_kind_uri_roundtrip() {
    for kind in [
        ProtocolKind::HttpPut,
        ProtocolKind::HttpGet,
        ProtocolKind::HttpsPut,
        ProtocolKind::HttpsGet,
    ] {
        assert_eq!(ProtocolKind::parse(&kind.uri()).unwrap(), kind);
    }
}

#[test]
fn protocol_kind_scheme_and_upload() {
    assert_eq!(ProtocolKind::HttpPut.scheme(), "http");
    assert!(ProtocolKind::HttpPut.is_upload());
    assert_eq!(ProtocolKind::HttpsGet.scheme(), "https");
    assert!(!ProtocolKind::HttpsGet.is_upload());
}

#[test]
fn from_parts_builds_push() {
    let t = Transfer::from_parts("vos://x!vospace/a/b", "pushToVoSpace", None, vec![], None).unwrap();
    assert!(matches!(t, Transfer::PushToSpace { .. }));
    assert_eq!(t.target().as_str(), "a/b");
    assert_eq!(t.direction_string(), "pushToVoSpace");
}

#[test]
fn from_parts_builds_copy_and_move() {
    let copy = Transfer::from_parts("a", "b", Some(true), vec![], None).unwrap();
    assert!(matches!(copy, Transfer::Copy { .. }));
    assert_eq!(copy.keep_bytes(), Some(true));

    let mv = Transfer::from_parts("a", "b", Some(false), vec![], None).unwrap();
    assert!(matches!(mv, Transfer::Move { .. }));
    assert_eq!(mv.keep_bytes(), Some(false));
}

#[test]
fn from_parts_rejects_node_transfer_without_keep_bytes() {
    let err = Transfer::from_parts("a", "b", None, vec![], None).unwrap_err();
    assert!(matches!(err, VoSpaceError::InvalidArgument(_)));
}
