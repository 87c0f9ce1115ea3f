//! Decode and encode the VOSpace 2.1 node and transfer XML dialect.
//!
//! The wire format uses the default namespace
//! `http://www.ivoa.net/xml/VOSpace/v2.1` for every element and the
//! `xsi:` prefix (`http://www.w3.org/2001/XMLSchema-instance`) for the
//! `type` and `nil` attributes (spec §4.A).

use std::collections::HashMap;
use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::model::job::Job;
use crate::model::node::{Capability, ChildRef, DataNodeFields, Node, NodeHeader, NodeType, View};
use crate::model::path::{NodePath, NodeUri};
use crate::model::property::Property;
use crate::model::transfer::{Endpoint, Protocol, ProtocolKind, Transfer};
use crate::xml::error::XmlError;

const VOS_NS: &str = "http://www.ivoa.net/xml/VOSpace/v2.1";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

// ---------------------------------------------------------------------
// Node encoding
// ---------------------------------------------------------------------

/// Encode a node as the `<node>` XML document this system emits.
pub fn encode_node(node: &Node, space: &str) -> Result<String, XmlError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let uri = NodeUri::new(space, node.path().clone()).to_uri_string();
    let mut root = BytesStart::new("node");
    root.push_attribute(("xmlns", VOS_NS));
    root.push_attribute(("xmlns:xsi", XSI_NS));
    root.push_attribute(("uri", uri.as_str()));
    root.push_attribute(("xsi:type", node.node_type().xml_tag()));
    if let Some(data) = node.data_fields() {
        root.push_attribute(("busy", if data.busy { "true" } else { "false" }));
    }
    writer.write_event(Event::Start(root.clone()))?;

    write_properties(&mut writer, node.properties())?;

    if let Some(data) = node.data_fields() {
        write_views(&mut writer, "accepts", &data.accepts)?;
        write_views(&mut writer, "provides", &data.provides)?;
    }

    write_capabilities(&mut writer, &node.header().capabilities)?;

    if let Some(children) = node.children() {
        if !children.is_empty() {
            writer.write_event(Event::Start(BytesStart::new("nodes")))?;
            for child in children {
                let child_uri = NodeUri::new(space, child.path.clone()).to_uri_string();
                let mut child_el = BytesStart::new("node");
                child_el.push_attribute(("uri", child_uri.as_str()));
                child_el.push_attribute(("xsi:type", child.node_type.xml_tag()));
                child_el.push_attribute(("busy", if child.busy { "true" } else { "false" }));
                writer.write_event(Event::Empty(child_el))?;
            }
            writer.write_event(Event::End(BytesEnd::new("nodes")))?;
        }
    }

    if let Some(target) = node.link_target() {
        writer.write_event(Event::Start(BytesStart::new("target")))?;
        writer.write_event(Event::Text(BytesText::new(target)))?;
        writer.write_event(Event::End(BytesEnd::new("target")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("node")))?;

    Ok(String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| XmlError::Malformed(e.to_string()))?)
}

fn write_properties(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    properties: &[Property],
) -> Result<(), XmlError> {
    if properties.is_empty() {
        return Ok(());
    }
    writer.write_event(Event::Start(BytesStart::new("properties")))?;
    for prop in properties {
        let mut el = BytesStart::new("property");
        el.push_attribute(("uri", prop.uri.as_str()));
        el.push_attribute(("readOnly", if prop.read_only { "true" } else { "false" }));
        if prop.is_delete() {
            el.push_attribute(("xsi:nil", "true"));
            writer.write_event(Event::Empty(el))?;
        } else {
            writer.write_event(Event::Start(el))?;
            writer.write_event(Event::Text(BytesText::new(prop.value.as_deref().unwrap_or(""))))?;
            writer.write_event(Event::End(BytesEnd::new("property")))?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new("properties")))?;
    Ok(())
}

fn write_views(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    tag: &str,
    views: &[View],
) -> Result<(), XmlError> {
    if views.is_empty() {
        return Ok(());
    }
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    for view in views {
        let mut el = BytesStart::new("view");
        el.push_attribute(("uri", view.uri.as_str()));
        writer.write_event(Event::Empty(el))?;
    }
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn write_capabilities(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    capabilities: &[Capability],
) -> Result<(), XmlError> {
    if capabilities.is_empty() {
        return Ok(());
    }
    writer.write_event(Event::Start(BytesStart::new("capabilities")))?;
    for cap in capabilities {
        let mut el = BytesStart::new("capability");
        el.push_attribute(("uri", cap.uri.as_str()));
        if let Some(endpoint) = &cap.endpoint {
            el.push_attribute(("endpoint", endpoint.as_str()));
        }
        writer.write_event(Event::Empty(el))?;
    }
    writer.write_event(Event::End(BytesEnd::new("capabilities")))?;
    Ok(())
}

// ---------------------------------------------------------------------
// Node decoding
// ---------------------------------------------------------------------

#[derive(PartialEq, Eq, Clone, Copy)]
enum Section {
    None,
    Properties,
    Accepts,
    Provides,
    Capabilities,
    Nodes,
    Target,
}

/// Decode a `<node>` XML document into a [`Node`].
pub fn decode_node(xml: &str) -> Result<Node, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text = true;
    let mut buf = Vec::new();

    let mut section = Section::None;
    let mut node_path: Option<NodePath> = None;
    let mut node_type: Option<NodeType> = None;
    let mut node_busy = false;

    let mut properties = Vec::new();
    let mut accepts = Vec::new();
    let mut provides = Vec::new();
    let mut capabilities = Vec::new();
    let mut children = Vec::new();
    let mut target_text = String::new();

    let mut current_prop: Option<(String, bool, bool)> = None;
    let mut prop_text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => {
                let local = local_name(&e);
                let attrs = read_attrs(&e)?;

                match local.as_str() {
                    "node" if node_type.is_none() => {
                        let uri = attrs
                            .get("uri")
                            .ok_or(XmlError::MissingAttribute { element: "node", attr: "uri" })?;
                        let type_tok = attrs.get("xsi:type").or_else(|| attrs.get("type")).ok_or(
                            XmlError::MissingAttribute { element: "node", attr: "xsi:type" },
                        )?;
                        node_path = Some(NodeUri::parse(uri)?.path);
                        node_type = Some(NodeType::parse(type_tok)?);
                        node_busy = attrs.get("busy").map(|s| s == "true").unwrap_or(false);
                    }
                    "node" if section == Section::Nodes => {
                        let uri = attrs
                            .get("uri")
                            .ok_or(XmlError::MissingAttribute { element: "node", attr: "uri" })?;
                        let type_tok = attrs.get("xsi:type").or_else(|| attrs.get("type")).ok_or(
                            XmlError::MissingAttribute { element: "node", attr: "xsi:type" },
                        )?;
                        children.push(ChildRef {
                            path: NodeUri::parse(uri)?.path,
                            node_type: NodeType::parse(type_tok)?,
                            busy: attrs.get("busy").map(|s| s == "true").unwrap_or(false),
                        });
                    }
                    "properties" => section = Section::Properties,
                    "accepts" => section = Section::Accepts,
                    "provides" => section = Section::Provides,
                    "capabilities" => section = Section::Capabilities,
                    "nodes" => section = Section::Nodes,
                    "target" => {
                        section = Section::Target;
                        target_text.clear();
                    }
                    "property" => {
                        let uri = attrs.get("uri").ok_or(XmlError::MissingAttribute {
                            element: "property",
                            attr: "uri",
                        })?;
                        let read_only = attrs.get("readOnly").map(|s| s == "true").unwrap_or(true);
                        let nil = attrs.get("xsi:nil").map(|s| s == "true").unwrap_or(false);
                        if nil {
                            properties.push(Property::delete(uri.clone()));
                        } else {
                            current_prop = Some((uri.clone(), read_only, nil));
                            prop_text.clear();
                        }
                    }
                    "view" => {
                        let uri = attrs.get("uri").ok_or(XmlError::MissingAttribute {
                            element: "view",
                            attr: "uri",
                        })?;
                        match section {
                            Section::Accepts => accepts.push(View::new(uri.clone())),
                            Section::Provides => provides.push(View::new(uri.clone())),
                            _ => {}
                        }
                    }
                    "capability" => {
                        let uri = attrs.get("uri").ok_or(XmlError::MissingAttribute {
                            element: "capability",
                            attr: "uri",
                        })?;
                        capabilities.push(Capability {
                            uri: uri.clone(),
                            endpoint: attrs.get("endpoint").cloned(),
                        });
                    }
                    _ => {}
                }
            }
            Event::Text(t) => {
                let text = t.unescape()?.into_owned();
                if current_prop.is_some() {
                    prop_text.push_str(&text);
                } else if section == Section::Target {
                    target_text.push_str(&text);
                }
            }
            Event::End(e) => {
                let local = local_name_end(&e);
                match local.as_str() {
                    "property" => {
                        if let Some((uri, read_only, _)) = current_prop.take() {
                            properties.push(Property::new(uri, prop_text.clone(), read_only));
                        }
                    }
                    "properties" | "accepts" | "provides" | "capabilities" | "nodes"
                    | "target" => section = Section::None,
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let path = node_path.ok_or(XmlError::MissingAttribute { element: "node", attr: "uri" })?;
    let node_type =
        node_type.ok_or(XmlError::MissingAttribute { element: "node", attr: "xsi:type" })?;

    let mut header = NodeHeader::new(path);
    header.set_properties(properties)?;
    header.capabilities = capabilities;

    let node = match node_type {
        NodeType::Node => Node::Node(header),
        NodeType::LinkNode => {
            if target_text.is_empty() {
                return Err(XmlError::MissingElement("target"));
            }
            Node::LinkNode(header, target_text)
        }
        NodeType::ContainerNode => {
            children.sort_by(|a, b| a.path.cmp(&b.path));
            Node::ContainerNode(
                header,
                DataNodeFields { accepts, provides, busy: node_busy },
                children,
            )
        }
        NodeType::DataNode => Node::DataNode(header, DataNodeFields { accepts, provides, busy: node_busy }),
        NodeType::UnstructuredDataNode => {
            Node::UnstructuredDataNode(header, DataNodeFields { accepts, provides, busy: node_busy })
        }
        NodeType::StructuredDataNode => {
            Node::StructuredDataNode(header, DataNodeFields { accepts, provides, busy: node_busy })
        }
    };
    Ok(node)
}

fn local_name(e: &BytesStart) -> String {
    let name = e.name();
    let full = String::from_utf8_lossy(name.as_ref());
    match full.split_once(':') {
        Some((_, local)) => local.to_string(),
        None => full.to_string(),
    }
}

fn local_name_end(e: &BytesEnd) -> String {
    let name = e.name();
    let full = String::from_utf8_lossy(name.as_ref());
    match full.split_once(':') {
        Some((_, local)) => local.to_string(),
        None => full.to_string(),
    }
}

fn read_attrs(e: &BytesStart) -> Result<HashMap<String, String>, XmlError> {
    let mut out = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| XmlError::Malformed(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let key = key.strip_prefix("xmlns:").map(|s| s.to_string()).unwrap_or(key);
        let value = attr.unescape_value()?.into_owned();
        out.insert(key, value);
    }
    Ok(out)
}

// ---------------------------------------------------------------------
// Transfer encoding/decoding
// ---------------------------------------------------------------------

/// Encode a transfer as the `<transfer>` XML document this system emits.
pub fn encode_transfer(transfer: &Transfer, space: &str) -> Result<String, XmlError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("transfer");
    root.push_attribute(("xmlns", VOS_NS));
    writer.write_event(Event::Start(root))?;

    write_text_element(&mut writer, "target", &NodeUri::new(space, transfer.target().clone()).to_uri_string())?;
    write_text_element(&mut writer, "direction", &transfer.direction_string())?;

    if let Some(keep_bytes) = transfer.keep_bytes() {
        write_text_element(&mut writer, "keepBytes", if keep_bytes { "true" } else { "false" })?;
    }

    if let Transfer::PushToSpace { protocols, view, .. } | Transfer::PullFromSpace { protocols, view, .. } = transfer {
        if let Some(view) = view {
            let mut el = BytesStart::new("view");
            el.push_attribute(("uri", view.uri.as_str()));
            writer.write_event(Event::Empty(el))?;
        }
        for protocol in protocols {
            write_protocol(&mut writer, protocol)?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("transfer")))?;

    Ok(String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| XmlError::Malformed(e.to_string()))?)
}

fn write_protocol(writer: &mut Writer<Cursor<Vec<u8>>>, protocol: &Protocol) -> Result<(), XmlError> {
    let mut el = BytesStart::new("protocol");
    el.push_attribute(("uri", protocol.kind.uri().as_str()));
    if let Some(endpoint) = &protocol.endpoint {
        writer.write_event(Event::Start(el))?;
        write_text_element(writer, "endpoint", &endpoint.url)?;
        writer.write_event(Event::End(BytesEnd::new("protocol")))?;
    } else {
        writer.write_event(Event::Empty(el))?;
    }
    Ok(())
}

fn write_text_element(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, text: &str) -> Result<(), XmlError> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// Decode a `<transfer>` XML document into a [`Transfer`].
pub fn decode_transfer(xml: &str) -> Result<Transfer, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text = true;
    let mut buf = Vec::new();

    let mut target: Option<String> = None;
    let mut direction: Option<String> = None;
    let mut keep_bytes: Option<bool> = None;
    let mut view: Option<View> = None;
    let mut protocols = Vec::new();

    let mut current_text_target: Option<&'static str> = None;
    let mut text_buf = String::new();
    let mut current_protocol_uri: Option<String> = None;
    let mut current_protocol_endpoint: Option<String> = None;
    let mut in_protocol = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => {
                let local = local_name(&e);
                let attrs = read_attrs(&e)?;
                match local.as_str() {
                    "target" => {
                        current_text_target = Some("target");
                        text_buf.clear();
                    }
                    "direction" => {
                        current_text_target = Some("direction");
                        text_buf.clear();
                    }
                    "keepBytes" => {
                        current_text_target = Some("keepBytes");
                        text_buf.clear();
                    }
                    "view" => {
                        if let Some(uri) = attrs.get("uri") {
                            view = Some(View::new(uri.clone()));
                        }
                    }
                    "protocol" => {
                        in_protocol = true;
                        current_protocol_uri = attrs.get("uri").cloned();
                        current_protocol_endpoint = None;
                    }
                    "endpoint" if in_protocol => {
                        current_text_target = Some("endpoint");
                        text_buf.clear();
                    }
                    _ => {}
                }
            }
            Event::Text(t) => {
                if current_text_target.is_some() {
                    text_buf.push_str(&t.unescape()?);
                }
            }
            Event::End(e) => {
                let local = local_name_end(&e);
                match local.as_str() {
                    "target" => {
                        target = Some(text_buf.clone());
                        current_text_target = None;
                    }
                    "direction" => {
                        direction = Some(text_buf.clone());
                        current_text_target = None;
                    }
                    "keepBytes" => {
                        keep_bytes = Some(text_buf.trim() == "true");
                        current_text_target = None;
                    }
                    "endpoint" => {
                        current_protocol_endpoint = Some(text_buf.clone());
                        current_text_target = None;
                    }
                    "protocol" => {
                        if let Some(uri) = current_protocol_uri.take() {
                            let kind = ProtocolKind::parse(&uri).map_err(XmlError::Model)?;
                            let protocol = match current_protocol_endpoint.take() {
                                Some(url) => Protocol::with_endpoint(kind, Endpoint::new(url)),
                                None => Protocol::new(kind),
                            };
                            protocols.push(protocol);
                        }
                        in_protocol = false;
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let target = target.ok_or(XmlError::MissingElement("target"))?;
    let direction = direction.ok_or(XmlError::MissingElement("direction"))?;

    Transfer::from_parts(&target, &direction, keep_bytes, protocols, view).map_err(XmlError::Model)
}

// ---------------------------------------------------------------------
// Job encoding
// ---------------------------------------------------------------------

/// Encode a job summary as the `<job>` document returned by
/// `GET /vospace/transfers/{job_id}` (spec §6).
pub fn encode_job(job: &Job) -> Result<String, XmlError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("job");
    root.push_attribute(("xmlns", VOS_NS));
    writer.write_event(Event::Start(root))?;

    write_text_element(&mut writer, "jobId", &job.id)?;
    write_text_element(&mut writer, "ownerId", &job.owner)?;
    write_text_element(&mut writer, "phase", &job.phase.to_string())?;
    if let Some(error) = &job.error {
        write_text_element(&mut writer, "errorSummary", error)?;
    }
    if job.results_visible() {
        write_results(&mut writer, &job.results)?;
    }

    writer.write_event(Event::End(BytesEnd::new("job")))?;

    Ok(String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| XmlError::Malformed(e.to_string()))?)
}

/// Encode a job's assigned protocols as the `<transferDetails>` document
/// returned by `GET /vospace/transfers/{job_id}/results/transferDetails`,
/// and by a non-redirect synchronous transfer response (spec §4.C step
/// (e)): one `<protocol>` element per result, each carrying the endpoint
/// the backend assigned it.
pub fn encode_transfer_details(results: &[Protocol]) -> Result<String, XmlError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("transferDetails");
    root.push_attribute(("xmlns", VOS_NS));
    writer.write_event(Event::Start(root))?;
    write_results(&mut writer, results)?;
    writer.write_event(Event::End(BytesEnd::new("transferDetails")))?;

    Ok(String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| XmlError::Malformed(e.to_string()))?)
}

fn write_results(writer: &mut Writer<Cursor<Vec<u8>>>, results: &[Protocol]) -> Result<(), XmlError> {
    writer.write_event(Event::Start(BytesStart::new("results")))?;
    for protocol in results {
        write_protocol(writer, protocol)?;
    }
    writer.write_event(Event::End(BytesEnd::new("results")))?;
    Ok(())
}

#[cfg(test)]
#[path = "codec_test.rs"]
mod codec_test;
