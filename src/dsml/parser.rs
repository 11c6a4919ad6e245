//! DSML v2 batch request parsing.
//!
//! Turns a `batchRequest` document into an ordered list of protocol
//! operations plus batch-level options. All failures are `MalformedRequest`
//! errors; roxmltree's messages carry the offending line and column.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use roxmltree::{Document, Node};

use crate::ldap::protocol::{
    DerefAliases, MessageId, ModifyChange, ModifyOperation, PartialAttribute, ProtocolOp,
    SearchFilter, SearchRequest, SearchScope,
};
use crate::{GatewayError, Result};

/// What to do after an operation fails (`onError` attribute).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnError {
    Resume,
    #[default]
    Exit,
}

/// Declared processing mode (`processing` attribute). The engine always
/// executes sequentially; `Parallel` only affects request-ID validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Processing {
    #[default]
    Sequential,
    Parallel,
}

/// Declared response ordering (`responseOrder` attribute).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseOrder {
    #[default]
    Sequential,
    Unordered,
}

/// One parsed operation: the DSML `requestID` (0 when absent) plus the
/// protocol operation to send.
#[derive(Debug, Clone, PartialEq)]
pub struct DsmlRequest {
    pub message_id: MessageId,
    pub op: ProtocolOp,
}

/// A fully parsed batch document. Immutable after parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub request_id: Option<String>,
    pub on_error: OnError,
    pub processing: Processing,
    pub response_order: ResponseOrder,
    pub requests: Vec<DsmlRequest>,
}

impl BatchRequest {
    /// A parallel/unordered batch cannot be correlated without request IDs;
    /// reject it before anything is sent.
    pub fn validate(&self) -> Result<()> {
        if self.processing == Processing::Parallel && self.response_order == ResponseOrder::Unordered
        {
            for (index, request) in self.requests.iter().enumerate() {
                if request.message_id == 0 {
                    return Err(GatewayError::MalformedRequest(format!(
                        "operation {} needs a requestID when processing=parallel and responseOrder=unordered",
                        index + 1
                    )));
                }
            }
        }
        Ok(())
    }
}

pub fn parse_batch_request(document: &str) -> Result<BatchRequest> {
    let doc = Document::parse(document)
        .map_err(|e| GatewayError::MalformedRequest(e.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != "batchRequest" {
        return Err(GatewayError::MalformedRequest(format!(
            "expected batchRequest root element, found {}",
            root.tag_name().name()
        )));
    }

    let request_id = attribute(&root, "requestID").map(str::to_string);
    let on_error = match attribute(&root, "onError") {
        None | Some("exit") => OnError::Exit,
        Some("resume") => OnError::Resume,
        Some(other) => {
            return Err(GatewayError::MalformedRequest(format!(
                "invalid onError value '{}'",
                other
            )));
        }
    };
    let processing = match attribute(&root, "processing") {
        None | Some("sequential") => Processing::Sequential,
        Some("parallel") => Processing::Parallel,
        Some(other) => {
            return Err(GatewayError::MalformedRequest(format!(
                "invalid processing value '{}'",
                other
            )));
        }
    };
    let response_order = match attribute(&root, "responseOrder") {
        None | Some("sequential") => ResponseOrder::Sequential,
        Some("unordered") => ResponseOrder::Unordered,
        Some(other) => {
            return Err(GatewayError::MalformedRequest(format!(
                "invalid responseOrder value '{}'",
                other
            )));
        }
    };

    let mut requests = Vec::new();
    for node in root.children().filter(Node::is_element) {
        requests.push(parse_operation(&node)?);
    }

    Ok(BatchRequest {
        request_id,
        on_error,
        processing,
        response_order,
        requests,
    })
}

fn parse_operation(node: &Node) -> Result<DsmlRequest> {
    let message_id = parse_request_id(node)?;
    let op = match node.tag_name().name() {
        "authRequest" => {
            let principal = require_attribute(node, "principal")?;
            // The credential is supplied by the engine configuration; DSML
            // carries only the principal.
            ProtocolOp::BindRequest {
                version: 3,
                dn: principal.to_string(),
                password: String::new(),
            }
        }
        "addRequest" => {
            let dn = require_attribute(node, "dn")?;
            let mut attributes = Vec::new();
            for child in element_children(node) {
                if child.tag_name().name() != "attr" {
                    return unexpected_element(&child, "addRequest");
                }
                let name = require_attribute(&child, "name")?;
                let values = parse_values(&child)?;
                attributes.push(PartialAttribute::new(name, values));
            }
            ProtocolOp::AddRequest {
                dn: dn.to_string(),
                attributes,
            }
        }
        "delRequest" => ProtocolOp::DelRequest {
            dn: require_attribute(node, "dn")?.to_string(),
        },
        "compareRequest" => {
            let dn = require_attribute(node, "dn")?;
            let assertion = element_children(node)
                .find(|child| child.tag_name().name() == "assertion")
                .ok_or_else(|| malformed(node, "compareRequest needs an assertion element"))?;
            let attribute = require_attribute(&assertion, "name")?;
            let mut values = parse_values(&assertion)?;
            if values.len() != 1 {
                return Err(malformed(
                    &assertion,
                    "assertion needs exactly one value element",
                ));
            }
            ProtocolOp::CompareRequest {
                dn: dn.to_string(),
                attribute: attribute.to_string(),
                value: values.remove(0),
            }
        }
        "modifyRequest" => {
            let dn = require_attribute(node, "dn")?;
            let mut changes = Vec::new();
            for child in element_children(node) {
                if child.tag_name().name() != "modification" {
                    return unexpected_element(&child, "modifyRequest");
                }
                let name = require_attribute(&child, "name")?;
                let operation = match require_attribute(&child, "operation")? {
                    "add" => ModifyOperation::Add,
                    "delete" => ModifyOperation::Delete,
                    "replace" => ModifyOperation::Replace,
                    other => {
                        return Err(malformed(
                            &child,
                            &format!("invalid modification operation '{}'", other),
                        ));
                    }
                };
                let values = parse_values(&child)?;
                changes.push(ModifyChange {
                    operation,
                    modification: PartialAttribute::new(name, values),
                });
            }
            ProtocolOp::ModifyRequest {
                dn: dn.to_string(),
                changes,
            }
        }
        "modDNRequest" => {
            let dn = require_attribute(node, "dn")?;
            let new_rdn = require_attribute(node, "newrdn")?;
            let delete_old_rdn = match attribute(node, "deleteoldrdn") {
                None | Some("true") | Some("1") => true,
                Some("false") | Some("0") => false,
                Some(other) => {
                    return Err(malformed(
                        node,
                        &format!("invalid deleteoldrdn value '{}'", other),
                    ));
                }
            };
            ProtocolOp::ModifyDnRequest {
                dn: dn.to_string(),
                new_rdn: new_rdn.to_string(),
                delete_old_rdn,
                new_superior: attribute(node, "newSuperior").map(str::to_string),
            }
        }
        "extendedRequest" => {
            let name = element_children(node)
                .find(|child| child.tag_name().name() == "requestName")
                .ok_or_else(|| malformed(node, "extendedRequest needs a requestName element"))?
                .text()
                .unwrap_or("")
                .trim()
                .to_string();
            if name.is_empty() {
                return Err(malformed(node, "requestName must not be empty"));
            }
            let value = element_children(node)
                .find(|child| child.tag_name().name() == "requestValue")
                .map(|child| element_value(&child))
                .transpose()?;
            ProtocolOp::ExtendedRequest { name, value }
        }
        "searchRequest" => ProtocolOp::SearchRequest(parse_search_request(node)?),
        other => {
            return Err(malformed(
                node,
                &format!("unknown operation element '{}'", other),
            ));
        }
    };
    Ok(DsmlRequest { message_id, op })
}

fn parse_search_request(node: &Node) -> Result<SearchRequest> {
    let base_dn = require_attribute(node, "dn")?.to_string();
    let scope = match require_attribute(node, "scope")? {
        "baseObject" => SearchScope::BaseObject,
        "singleLevel" => SearchScope::SingleLevel,
        "wholeSubtree" => SearchScope::WholeSubtree,
        other => {
            return Err(malformed(node, &format!("invalid scope '{}'", other)));
        }
    };
    let deref_aliases = match require_attribute(node, "derefAliases")? {
        "neverDerefAliases" => DerefAliases::NeverDerefAliases,
        "derefInSearching" => DerefAliases::DerefInSearching,
        "derefFindingBaseObj" => DerefAliases::DerefFindingBaseObj,
        "derefAlways" => DerefAliases::DerefAlways,
        other => {
            return Err(malformed(
                node,
                &format!("invalid derefAliases '{}'", other),
            ));
        }
    };
    let size_limit = parse_numeric_attribute(node, "sizeLimit")?.unwrap_or(0);
    let time_limit = parse_numeric_attribute(node, "timeLimit")?.unwrap_or(0);
    let types_only = match attribute(node, "typesOnly") {
        None | Some("false") | Some("0") => false,
        Some("true") | Some("1") => true,
        Some(other) => {
            return Err(malformed(
                node,
                &format!("invalid typesOnly value '{}'", other),
            ));
        }
    };

    let filter = match element_children(node).find(|child| child.tag_name().name() == "filter") {
        Some(filter_node) => {
            let inner = element_children(&filter_node)
                .next()
                .ok_or_else(|| malformed(&filter_node, "filter element is empty"))?;
            parse_filter(&inner)?
        }
        None => SearchFilter::present_object_class(),
    };

    let mut attributes = Vec::new();
    if let Some(list) = element_children(node).find(|child| child.tag_name().name() == "attributes")
    {
        for child in element_children(&list) {
            if child.tag_name().name() != "attribute" {
                return unexpected_element(&child, "attributes");
            }
            attributes.push(require_attribute(&child, "name")?.to_string());
        }
    }

    Ok(SearchRequest {
        base_dn,
        scope,
        deref_aliases,
        size_limit,
        time_limit,
        types_only,
        filter,
        attributes,
    })
}

fn parse_filter(node: &Node) -> Result<SearchFilter> {
    let filter = match node.tag_name().name() {
        "and" | "or" => {
            let mut filters = Vec::new();
            for child in element_children(node) {
                filters.push(parse_filter(&child)?);
            }
            if filters.is_empty() {
                return Err(malformed(node, "and/or filter needs at least one child"));
            }
            if node.tag_name().name() == "and" {
                SearchFilter::And(filters)
            } else {
                SearchFilter::Or(filters)
            }
        }
        "not" => {
            let inner = element_children(node)
                .next()
                .ok_or_else(|| malformed(node, "not filter needs a child"))?;
            SearchFilter::Not(Box::new(parse_filter(&inner)?))
        }
        "equalityMatch" => {
            let (attribute, value) = parse_assertion(node)?;
            SearchFilter::Equality { attribute, value }
        }
        "greaterOrEqual" => {
            let (attribute, value) = parse_assertion(node)?;
            SearchFilter::GreaterOrEqual { attribute, value }
        }
        "lessOrEqual" => {
            let (attribute, value) = parse_assertion(node)?;
            SearchFilter::LessOrEqual { attribute, value }
        }
        "approxMatch" => {
            let (attribute, value) = parse_assertion(node)?;
            SearchFilter::Approximate { attribute, value }
        }
        "present" => SearchFilter::Present {
            attribute: require_attribute(node, "name")?.to_string(),
        },
        "substrings" => {
            let attribute = require_attribute(node, "name")?.to_string();
            let mut initial = None;
            let mut any = Vec::new();
            let mut final_ = None;
            for child in element_children(node) {
                let text = child.text().unwrap_or("").to_string();
                match child.tag_name().name() {
                    "initial" => initial = Some(text),
                    "any" => any.push(text),
                    "final" => final_ = Some(text),
                    _ => return unexpected_element(&child, "substrings"),
                }
            }
            SearchFilter::Substrings {
                attribute,
                initial,
                any,
                final_,
            }
        }
        "extensibleMatch" => {
            let value = element_children(node)
                .find(|child| child.tag_name().name() == "value")
                .and_then(|child| child.text().map(str::to_string))
                .ok_or_else(|| malformed(node, "extensibleMatch needs a value element"))?;
            SearchFilter::Extensible {
                attribute: attribute(node, "name").map(str::to_string),
                matching_rule: attribute(node, "matchingRule").map(str::to_string),
                value,
                dn_attributes: attribute(node, "dnAttributes") == Some("true"),
            }
        }
        other => {
            return Err(malformed(
                node,
                &format!("unknown filter element '{}'", other),
            ));
        }
    };
    Ok(filter)
}

fn parse_assertion(node: &Node) -> Result<(String, String)> {
    let attribute = require_attribute(node, "name")?.to_string();
    let value = element_children(node)
        .find(|child| child.tag_name().name() == "value")
        .ok_or_else(|| malformed(node, "assertion filter needs a value element"))?;
    let bytes = element_value(&value)?;
    let value = String::from_utf8(bytes)
        .map_err(|_| malformed(node, "filter value must decode to UTF-8"))?;
    Ok((attribute, value))
}

fn parse_request_id(node: &Node) -> Result<MessageId> {
    match attribute(node, "requestID") {
        None => Ok(0),
        Some(raw) => raw.parse::<MessageId>().map_err(|_| {
            malformed(node, &format!("requestID '{}' is not a positive integer", raw))
        }),
    }
}

fn parse_numeric_attribute(node: &Node, name: &str) -> Result<Option<u32>> {
    match attribute(node, name) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u32>()
            .map(Some)
            .map_err(|_| malformed(node, &format!("{} '{}' is not a number", name, raw))),
    }
}

/// Collect the `value` children of `node`, decoding base64 where declared.
fn parse_values(node: &Node) -> Result<Vec<Vec<u8>>> {
    let mut values = Vec::new();
    for child in element_children(node) {
        if child.tag_name().name() != "value" {
            return unexpected_element(&child, node.tag_name().name());
        }
        values.push(element_value(&child)?);
    }
    Ok(values)
}

/// The byte content of a `value`-style element, honoring
/// `xsi:type="xsd:base64Binary"`.
fn element_value(node: &Node) -> Result<Vec<u8>> {
    let text = node.text().unwrap_or("");
    let is_base64 = node
        .attributes()
        .any(|a| a.name() == "type" && a.value().ends_with("base64Binary"));
    if is_base64 {
        BASE64
            .decode(text.trim().as_bytes())
            .map_err(|e| malformed(node, &format!("invalid base64 value: {}", e)))
    } else {
        Ok(text.as_bytes().to_vec())
    }
}

fn element_children<'a, 'input>(
    node: &'a Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

fn attribute<'a>(node: &'a Node, name: &str) -> Option<&'a str> {
    node.attributes()
        .find(|a| a.name() == name)
        .map(|a| a.value())
}

fn require_attribute<'a>(node: &'a Node, name: &str) -> Result<&'a str> {
    attribute(node, name)
        .ok_or_else(|| malformed(node, &format!("missing required attribute '{}'", name)))
}

fn malformed(node: &Node, message: &str) -> GatewayError {
    GatewayError::MalformedRequest(format!("{} in <{}>", message, node.tag_name().name()))
}

fn unexpected_element<T>(node: &Node, parent: &str) -> Result<T> {
    Err(GatewayError::MalformedRequest(format!(
        "unexpected element <{}> in <{}>",
        node.tag_name().name(),
        parent
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_defaults() {
        let batch = parse_batch_request(r#"<batchRequest/>"#).unwrap();
        assert_eq!(batch.request_id, None);
        assert_eq!(batch.on_error, OnError::Exit);
        assert_eq!(batch.processing, Processing::Sequential);
        assert_eq!(batch.response_order, ResponseOrder::Sequential);
        assert!(batch.requests.is_empty());
    }

    #[test]
    fn test_batch_attributes() {
        let batch = parse_batch_request(
            r#"<batchRequest requestID="7" onError="resume" processing="parallel" responseOrder="unordered"/>"#,
        )
        .unwrap();
        assert_eq!(batch.request_id.as_deref(), Some("7"));
        assert_eq!(batch.on_error, OnError::Resume);
        assert_eq!(batch.processing, Processing::Parallel);
        assert_eq!(batch.response_order, ResponseOrder::Unordered);
    }

    #[test]
    fn test_invalid_on_error_value() {
        let err = parse_batch_request(r#"<batchRequest onError="explode"/>"#).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedRequest(_)));
    }

    #[test]
    fn test_malformed_xml_reports_position() {
        let err = parse_batch_request("<batchRequest><delRequest</batchRequest>").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("1:"), "expected position info, got: {}", text);
    }

    #[test]
    fn test_parse_add_request() {
        let batch = parse_batch_request(
            r#"<batchRequest>
                 <addRequest dn="cn=Alice,dc=example,dc=com" requestID="3">
                   <attr name="objectClass"><value>top</value><value>person</value></attr>
                   <attr name="cn"><value>Alice</value></attr>
                 </addRequest>
               </batchRequest>"#,
        )
        .unwrap();
        assert_eq!(batch.requests.len(), 1);
        assert_eq!(batch.requests[0].message_id, 3);
        match &batch.requests[0].op {
            ProtocolOp::AddRequest { dn, attributes } => {
                assert_eq!(dn, "cn=Alice,dc=example,dc=com");
                assert_eq!(attributes.len(), 2);
                assert_eq!(attributes[0].name, "objectClass");
                assert_eq!(attributes[0].values, vec![b"top".to_vec(), b"person".to_vec()]);
            }
            other => panic!("expected AddRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_base64_value() {
        let batch = parse_batch_request(
            r#"<batchRequest xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
                 <addRequest dn="cn=x,dc=example,dc=com">
                   <attr name="userCertificate">
                     <value xsi:type="xsd:base64Binary">AAEC/w==</value>
                   </attr>
                 </addRequest>
               </batchRequest>"#,
        )
        .unwrap();
        match &batch.requests[0].op {
            ProtocolOp::AddRequest { attributes, .. } => {
                assert_eq!(attributes[0].values[0], vec![0x00, 0x01, 0x02, 0xff]);
            }
            other => panic!("expected AddRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_modify_request() {
        let batch = parse_batch_request(
            r#"<batchRequest>
                 <modifyRequest dn="cn=Bob,dc=example,dc=com">
                   <modification name="mail" operation="replace"><value>bob@example.com</value></modification>
                   <modification name="description" operation="delete"/>
                 </modifyRequest>
               </batchRequest>"#,
        )
        .unwrap();
        match &batch.requests[0].op {
            ProtocolOp::ModifyRequest { dn, changes } => {
                assert_eq!(dn, "cn=Bob,dc=example,dc=com");
                assert_eq!(changes.len(), 2);
                assert_eq!(changes[0].operation, ModifyOperation::Replace);
                assert_eq!(changes[1].operation, ModifyOperation::Delete);
                assert!(changes[1].modification.values.is_empty());
            }
            other => panic!("expected ModifyRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_mod_dn_request() {
        let batch = parse_batch_request(
            r#"<batchRequest>
                 <modDNRequest dn="cn=A,dc=example,dc=com" newrdn="cn=B"
                               deleteoldrdn="false" newSuperior="ou=y,dc=example,dc=com"/>
               </batchRequest>"#,
        )
        .unwrap();
        match &batch.requests[0].op {
            ProtocolOp::ModifyDnRequest {
                new_rdn,
                delete_old_rdn,
                new_superior,
                ..
            } => {
                assert_eq!(new_rdn, "cn=B");
                assert!(!delete_old_rdn);
                assert_eq!(new_superior.as_deref(), Some("ou=y,dc=example,dc=com"));
            }
            other => panic!("expected ModifyDnRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_compare_and_del() {
        let batch = parse_batch_request(
            r#"<batchRequest>
                 <compareRequest dn="cn=C,dc=example,dc=com">
                   <assertion name="sn"><value>Smith</value></assertion>
                 </compareRequest>
                 <delRequest dn="cn=D,dc=example,dc=com"/>
               </batchRequest>"#,
        )
        .unwrap();
        assert_eq!(batch.requests.len(), 2);
        match &batch.requests[0].op {
            ProtocolOp::CompareRequest {
                attribute, value, ..
            } => {
                assert_eq!(attribute, "sn");
                assert_eq!(value, b"Smith");
            }
            other => panic!("expected CompareRequest, got {:?}", other),
        }
        assert!(matches!(&batch.requests[1].op, ProtocolOp::DelRequest { dn } if dn == "cn=D,dc=example,dc=com"));
    }

    #[test]
    fn test_parse_extended_request() {
        let batch = parse_batch_request(
            r#"<batchRequest>
                 <extendedRequest>
                   <requestName>1.3.6.1.4.1.4203.1.11.3</requestName>
                   <requestValue xsi:type="xsd:base64Binary" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">AQI=</requestValue>
                 </extendedRequest>
               </batchRequest>"#,
        )
        .unwrap();
        match &batch.requests[0].op {
            ProtocolOp::ExtendedRequest { name, value } => {
                assert_eq!(name, "1.3.6.1.4.1.4203.1.11.3");
                assert_eq!(value.as_deref(), Some(&[0x01u8, 0x02][..]));
            }
            other => panic!("expected ExtendedRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_auth_request() {
        let batch = parse_batch_request(
            r#"<batchRequest>
                 <authRequest principal="cn=manager,dc=example,dc=com"/>
               </batchRequest>"#,
        )
        .unwrap();
        match &batch.requests[0].op {
            ProtocolOp::BindRequest { dn, password, .. } => {
                assert_eq!(dn, "cn=manager,dc=example,dc=com");
                assert!(password.is_empty());
            }
            other => panic!("expected BindRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_search_request_with_filter() {
        let batch = parse_batch_request(
            r#"<batchRequest>
                 <searchRequest dn="dc=example,dc=com" scope="wholeSubtree"
                                derefAliases="neverDerefAliases" sizeLimit="50" typesOnly="true">
                   <filter>
                     <and>
                       <equalityMatch name="objectClass"><value>person</value></equalityMatch>
                       <or>
                         <substrings name="cn"><initial>Jo</initial><any>h</any><final>n</final></substrings>
                         <not><present name="mail"/></not>
                         <greaterOrEqual name="uidNumber"><value>1000</value></greaterOrEqual>
                       </or>
                     </and>
                   </filter>
                   <attributes>
                     <attribute name="cn"/>
                     <attribute name="mail"/>
                   </attributes>
                 </searchRequest>
               </batchRequest>"#,
        )
        .unwrap();
        match &batch.requests[0].op {
            ProtocolOp::SearchRequest(search) => {
                assert_eq!(search.base_dn, "dc=example,dc=com");
                assert_eq!(search.scope, SearchScope::WholeSubtree);
                assert_eq!(search.size_limit, 50);
                assert_eq!(search.time_limit, 0);
                assert!(search.types_only);
                assert_eq!(search.attributes, vec!["cn", "mail"]);
                match &search.filter {
                    SearchFilter::And(children) => {
                        assert_eq!(children.len(), 2);
                        assert!(matches!(&children[0], SearchFilter::Equality { attribute, value }
                            if attribute == "objectClass" && value == "person"));
                        match &children[1] {
                            SearchFilter::Or(inner) => assert_eq!(inner.len(), 3),
                            other => panic!("expected Or, got {:?}", other),
                        }
                    }
                    other => panic!("expected And, got {:?}", other),
                }
            }
            other => panic!("expected SearchRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_search_without_filter_defaults_to_present() {
        let batch = parse_batch_request(
            r#"<batchRequest>
                 <searchRequest dn="dc=example,dc=com" scope="baseObject" derefAliases="derefAlways"/>
               </batchRequest>"#,
        )
        .unwrap();
        match &batch.requests[0].op {
            ProtocolOp::SearchRequest(search) => {
                assert_eq!(search.filter, SearchFilter::present_object_class());
            }
            other => panic!("expected SearchRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_operation_is_malformed() {
        let err = parse_batch_request(
            r#"<batchRequest><frobnicateRequest dn="cn=x"/></batchRequest>"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("frobnicateRequest"));
    }

    #[test]
    fn test_missing_dn_is_malformed() {
        let err = parse_batch_request(r#"<batchRequest><delRequest/></batchRequest>"#).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedRequest(_)));
    }

    #[test]
    fn test_invalid_request_id_is_malformed() {
        let err = parse_batch_request(
            r#"<batchRequest><delRequest dn="cn=x" requestID="abc"/></batchRequest>"#,
        )
        .unwrap_err();
        assert!(matches!(err, GatewayError::MalformedRequest(_)));
    }

    #[test]
    fn test_validate_parallel_unordered_requires_ids() {
        let batch = parse_batch_request(
            r#"<batchRequest processing="parallel" responseOrder="unordered">
                 <delRequest dn="cn=a" requestID="1"/>
                 <delRequest dn="cn=b"/>
               </batchRequest>"#,
        )
        .unwrap();
        let err = batch.validate().unwrap_err();
        assert!(err.to_string().contains("requestID"));

        let ok = parse_batch_request(
            r#"<batchRequest processing="parallel" responseOrder="unordered">
                 <delRequest dn="cn=a" requestID="1"/>
                 <delRequest dn="cn=b" requestID="2"/>
               </batchRequest>"#,
        )
        .unwrap();
        assert!(ok.validate().is_ok());

        // Sequential batches do not need IDs
        let seq = parse_batch_request(
            r#"<batchRequest><delRequest dn="cn=a"/></batchRequest>"#,
        )
        .unwrap();
        assert!(seq.validate().is_ok());
    }

    #[test]
    fn test_namespaced_document_parses() {
        let batch = parse_batch_request(
            r#"<dsml:batchRequest xmlns:dsml="urn:oasis:names:tc:DSML:2:0:core">
                 <dsml:delRequest dn="cn=x,dc=example,dc=com"/>
               </dsml:batchRequest>"#,
        )
        .unwrap();
        assert_eq!(batch.requests.len(), 1);
    }
}
