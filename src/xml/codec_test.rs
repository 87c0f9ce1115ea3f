use chrono::Utc;

use super::*;
use crate::model::job::Phase;
use crate::model::node::{ChildRef, DataNodeFields, NodeHeader};
use crate::model::path::NodePath;

const SPACE: &str = "example.org";

#[test]
fn container_node_roundtrips() {
    let path = NodePath::parse("test1").unwrap();
    let mut header = NodeHeader::new(path.clone());
    header
        .set_properties(vec![
            Property::new("ivo://ivoa.net/vospace/core#title", "Hello1", false),
            Property::new("ivo://ivoa.net/vospace/core#description", "Hello2", false),
        ])
        .unwrap();
    let node = Node::ContainerNode(header, DataNodeFields::default(), Vec::new());

    let xml = encode_node(&node, SPACE).unwrap();
    let decoded = decode_node(&xml).unwrap();
    assert_eq!(decoded, node);
}

#[test]
fn delete_property_roundtrips_as_nil() {
    let path = NodePath::parse("test1").unwrap();
    let xml = format!(
        r#"<node xmlns="http://www.ivoa.net/xml/VOSpace/v2.1" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" uri="vos://{SPACE}!vospace/test1" xsi:type="vos:ContainerNode" busy="false">
  <properties>
    <property uri="ivo://ivoa.net/vospace/core#description" readOnly="false" xsi:nil="true"></property>
  </properties>
</node>"#
    );
    let decoded = decode_node(&xml).unwrap();
    assert_eq!(decoded.properties().len(), 1);
    assert!(decoded.properties()[0].is_delete());
    let _ = path;
}

#[test]
fn link_node_requires_target() {
    let xml = format!(
        r#"<node xmlns="http://www.ivoa.net/xml/VOSpace/v2.1" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" uri="vos://{SPACE}!vospace/l" xsi:type="vos:LinkNode"></node>"#
    );
    let err = decode_node(&xml).unwrap_err();
    assert!(matches!(err, XmlError::MissingElement("target")));
}

#[test]
fn link_node_roundtrips_with_target() {
    let path = NodePath::parse("a/link").unwrap();
    let header = NodeHeader::new(path);
    let node = Node::LinkNode(header, "http://example.com/somewhere".to_string());
    let xml = encode_node(&node, SPACE).unwrap();
    let decoded = decode_node(&xml).unwrap();
    assert_eq!(decoded, node);
    assert_eq!(decoded.link_target(), Some("http://example.com/somewhere"));
}

#[test]
fn container_with_children_roundtrips() {
    let path = NodePath::parse("a").unwrap();
    let header = NodeHeader::new(path.clone());
    let children = vec![
        ChildRef { path: path.child("b").unwrap(), node_type: NodeType::DataNode, busy: false },
        ChildRef { path: path.child("c").unwrap(), node_type: NodeType::ContainerNode, busy: true },
    ];
    let node = Node::ContainerNode(header, DataNodeFields::default(), children);
    let xml = encode_node(&node, SPACE).unwrap();
    let decoded = decode_node(&xml).unwrap();
    assert_eq!(decoded, node);
    assert_eq!(decoded.children().unwrap().len(), 2);
}

#[test]
fn missing_uri_attribute_is_invalid_uri() {
    let xml = r#"<node xmlns="http://www.ivoa.net/xml/VOSpace/v2.1" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:type="vos:Node"></node>"#;
    let err = decode_node(xml).unwrap_err();
    assert!(matches!(err, XmlError::MissingAttribute { .. }));
}

#[test]
fn unknown_type_is_rejected() {
    let xml = r#"<node xmlns="http://www.ivoa.net/xml/VOSpace/v2.1" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" uri="vos://example.org!vospace/a" xsi:type="vos:Bogus"></node>"#;
    let err = decode_node(xml).unwrap_err();
    assert!(matches!(err, XmlError::Model(_)));
}

#[test]
fn push_to_space_transfer_roundtrips() {
    let transfer = Transfer::PushToSpace {
        target: NodePath::parse("a/data").unwrap(),
        protocols: vec![Protocol::new(ProtocolKind::HttpPut)],
        view: None,
    };
    let xml = encode_transfer(&transfer, SPACE).unwrap();
    let decoded = decode_transfer(&xml).unwrap();
    assert!(matches!(decoded, Transfer::PushToSpace { .. }));
    assert_eq!(decoded.target(), transfer.target());
}

#[test]
fn move_transfer_roundtrips_keep_bytes() {
    let transfer = Transfer::Move {
        target: NodePath::parse("a").unwrap(),
        destination: NodePath::parse("b").unwrap(),
    };
    let xml = encode_transfer(&transfer, SPACE).unwrap();
    let decoded = decode_transfer(&xml).unwrap();
    assert_eq!(decoded.keep_bytes(), Some(false));
}

#[test]
fn protocol_with_endpoint_roundtrips() {
    let transfer = Transfer::PullFromSpace {
        target: NodePath::parse("a/data").unwrap(),
        protocols: vec![Protocol::with_endpoint(
            ProtocolKind::HttpGet,
            Endpoint::new("http://storage.example/a/data"),
        )],
        view: None,
    };
    let xml = encode_transfer(&transfer, SPACE).unwrap();
    let decoded = decode_transfer(&xml).unwrap();
    match decoded {
        Transfer::PullFromSpace { protocols, .. } => {
            assert_eq!(protocols[0].endpoint.as_ref().unwrap().url, "http://storage.example/a/data");
        }
        _ => panic!("expected PullFromSpace"),
    }
}

fn sample_job(phase: Phase, started_at: Option<chrono::DateTime<Utc>>) -> Job {
    Job {
        id: "01ARZ3NDEKTSV4RRFFQ69G5FAV".to_string(),
        owner: "alice".to_string(),
        phase,
        transfer_xml: "<transfer/>".to_string(),
        results: vec![Protocol::with_endpoint(ProtocolKind::HttpPut, Endpoint::new("http://store.example/a"))],
        created_at: Utc::now(),
        started_at,
        ended_at: None,
        error: None,
    }
}

#[test]
fn encode_job_omits_results_before_executing() {
    let job = sample_job(Phase::Pending, None);
    let xml = encode_job(&job).unwrap();
    assert!(xml.contains("<jobId>01ARZ3NDEKTSV4RRFFQ69G5FAV</jobId>"));
    assert!(xml.contains("<phase>PENDING</phase>"));
    assert!(!xml.contains("<results>"));
}

#[test]
fn encode_job_includes_results_once_executing() {
    let job = sample_job(Phase::Completed, Some(Utc::now()));
    let xml = encode_job(&job).unwrap();
    assert!(xml.contains("<results>"));
    assert!(xml.contains("<endpoint>http://store.example/a</endpoint>"));
}

#[test]
fn encode_transfer_details_lists_every_protocol_with_its_endpoint() {
    let results = vec![
        Protocol::with_endpoint(ProtocolKind::HttpPut, Endpoint::new("http://a")),
        Protocol::with_endpoint(ProtocolKind::HttpsGet, Endpoint::new("http://b")),
    ];
    let xml = encode_transfer_details(&results).unwrap();
    assert_eq!(xml.matches("<protocol").count(), 2);
    assert!(xml.contains(r#"uri="ivo://ivoa.net/vospace/core#httpput""#));
    assert!(xml.contains("<endpoint>http://a</endpoint>"));
    assert!(xml.contains("<endpoint>http://b</endpoint>"));
}
