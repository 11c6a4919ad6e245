//! LDAP response to DSML XML translation.
//!
//! One mapping rule per response variant. The translator does no I/O; a
//! message it cannot map means the codec produced something impossible, and
//! that is reported as an internal error.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::dsml::xml::XmlElement;
use crate::ldap::protocol::{LdapMessage, LdapResult, MessageId, PartialAttribute, ProtocolOp};
use crate::{GatewayError, Result};

/// Envelope error categories reported in place of operation responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorResponseType {
    CouldNotConnect,
    MalformedRequest,
    GatewayInternalError,
}

impl ErrorResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorResponseType::CouldNotConnect => "couldNotConnect",
            ErrorResponseType::MalformedRequest => "malformedRequest",
            ErrorResponseType::GatewayInternalError => "gatewayInternalError",
        }
    }
}

/// Map one response message to its DSML element.
///
/// Request variants cannot appear here on a healthy exchange; they indicate
/// a codec defect and are surfaced as `Internal`.
pub fn response_to_xml(message: &LdapMessage) -> Result<XmlElement> {
    let element = match &message.protocol_op {
        ProtocolOp::BindResponse { result } => result_element("authResponse", result),
        ProtocolOp::AddResponse { result } => result_element("addResponse", result),
        ProtocolOp::DelResponse { result } => result_element("delResponse", result),
        ProtocolOp::ModifyResponse { result } => result_element("modifyResponse", result),
        ProtocolOp::ModifyDnResponse { result } => result_element("modDNResponse", result),
        ProtocolOp::CompareResponse { result } => result_element("compareResponse", result),
        ProtocolOp::ExtendedResponse {
            result,
            name,
            value,
        } => {
            let mut element = result_element("extendedResponse", result);
            if let Some(name) = name {
                element.push_child(XmlElement::new("responseName").text(name));
            }
            if let Some(value) = value {
                element.push_child(value_element("response", value));
            }
            element
        }
        ProtocolOp::SearchResultEntry { dn, attributes } => {
            let mut element = XmlElement::new("searchResultEntry").attr("dn", dn);
            for attribute in attributes {
                element.push_child(attribute_element(attribute));
            }
            element
        }
        ProtocolOp::SearchResultReference { uris } => {
            let mut element = XmlElement::new("searchResultReference");
            for uri in uris {
                element.push_child(XmlElement::new("ref").text(uri));
            }
            element
        }
        ProtocolOp::SearchResultDone { result } => result_element("searchResultDone", result),
        other => {
            return Err(GatewayError::Internal(format!(
                "no DSML mapping for {}",
                other.name()
            )));
        }
    };
    Ok(with_request_id(element, message.message_id))
}

/// Collect one search operation's responses under a single `searchResponse`
/// wrapper, preserving their arrival order.
pub fn search_response_to_xml(
    message_id: MessageId,
    messages: &[LdapMessage],
) -> Result<XmlElement> {
    let mut wrapper = with_request_id(XmlElement::new("searchResponse"), message_id);
    for message in messages {
        wrapper.push_child(response_to_xml(message)?);
    }
    Ok(wrapper)
}

/// Build an envelope error element.
pub fn error_response(kind: ErrorResponseType, message: &str) -> XmlElement {
    XmlElement::new("errorResponse")
        .attr("type", kind.as_str())
        .child(XmlElement::new("message").text(message))
}

fn with_request_id(element: XmlElement, message_id: MessageId) -> XmlElement {
    if message_id != 0 {
        element.attr("requestID", message_id.to_string())
    } else {
        element
    }
}

fn result_element(name: &str, result: &LdapResult) -> XmlElement {
    let mut element = XmlElement::new(name);
    if !result.matched_dn.is_empty() {
        element.set_attr("matchedDN", &result.matched_dn);
    }
    let mut code = XmlElement::new("resultCode").attr("code", result.result_code.code().to_string());
    if let Some(descr) = result.result_code.descr() {
        code.set_attr("descr", descr);
    }
    element.push_child(code);
    if !result.diagnostic_message.is_empty() {
        element.push_child(XmlElement::new("errorMessage").text(&result.diagnostic_message));
    }
    for referral in &result.referrals {
        element.push_child(XmlElement::new("referral").text(referral));
    }
    element
}

fn attribute_element(attribute: &PartialAttribute) -> XmlElement {
    let mut element = XmlElement::new("attr").attr("name", &attribute.name);
    for value in &attribute.values {
        element.push_child(value_element("value", value));
    }
    element
}

/// Values that are valid UTF-8 are emitted as text; anything else is
/// base64-encoded and typed accordingly.
fn value_element(name: &str, value: &[u8]) -> XmlElement {
    match std::str::from_utf8(value) {
        Ok(text) => XmlElement::new(name).text(text),
        Err(_) => XmlElement::new(name)
            .attr("xsi:type", "xsd:base64Binary")
            .text(BASE64.encode(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldap::protocol::ResultCode;

    fn message(message_id: MessageId, protocol_op: ProtocolOp) -> LdapMessage {
        LdapMessage {
            message_id,
            protocol_op,
        }
    }

    #[test]
    fn test_add_response_mapping() {
        let xml = response_to_xml(&message(
            5,
            ProtocolOp::AddResponse {
                result: LdapResult::success(),
            },
        ))
        .unwrap();
        assert_eq!(
            xml.to_fragment(),
            "<addResponse requestID=\"5\"><resultCode code=\"0\" descr=\"success\"/></addResponse>"
        );
    }

    #[test]
    fn test_request_id_zero_is_omitted() {
        let xml = response_to_xml(&message(
            0,
            ProtocolOp::DelResponse {
                result: LdapResult::success(),
            },
        ))
        .unwrap();
        assert_eq!(xml.attribute("requestID"), None);
    }

    #[test]
    fn test_error_result_mapping() {
        let mut result = LdapResult::error(ResultCode::NoSuchObject, "entry missing");
        result.matched_dn = "dc=example,dc=com".to_string();
        result.referrals = vec!["ldap://other.example.com/".to_string()];
        let xml = response_to_xml(&message(2, ProtocolOp::ModifyResponse { result })).unwrap();
        assert_eq!(xml.attribute("matchedDN"), Some("dc=example,dc=com"));
        let fragment = xml.to_fragment();
        assert!(fragment.contains("code=\"32\""));
        assert!(fragment.contains("descr=\"noSuchObject\""));
        assert!(fragment.contains("<errorMessage>entry missing</errorMessage>"));
        assert!(fragment.contains("<referral>ldap://other.example.com/</referral>"));
    }

    #[test]
    fn test_unknown_result_code_has_no_descr() {
        let result = LdapResult::error(ResultCode::Other(118), "odd");
        let xml = response_to_xml(&message(1, ProtocolOp::AddResponse { result })).unwrap();
        let fragment = xml.to_fragment();
        assert!(fragment.contains("code=\"118\""));
        assert!(!fragment.contains("descr"));
    }

    #[test]
    fn test_search_entry_mapping_with_binary_value() {
        let xml = response_to_xml(&message(
            4,
            ProtocolOp::SearchResultEntry {
                dn: "cn=X,dc=example,dc=com".to_string(),
                attributes: vec![
                    PartialAttribute::new("cn", vec![b"X".to_vec()]),
                    PartialAttribute::new("jpegPhoto", vec![vec![0xff, 0xfe]]),
                ],
            },
        ))
        .unwrap();
        let fragment = xml.to_fragment();
        assert!(fragment.contains("<attr name=\"cn\"><value>X</value></attr>"));
        assert!(fragment.contains("xsi:type=\"xsd:base64Binary\""));
        assert!(fragment.contains(&BASE64.encode([0xffu8, 0xfe])));
    }

    #[test]
    fn test_extended_response_mapping() {
        let xml = response_to_xml(&message(
            6,
            ProtocolOp::ExtendedResponse {
                result: LdapResult::success(),
                name: Some("1.3.6.1.4.1.4203.1.11.3".to_string()),
                value: Some(b"dn:cn=admin".to_vec()),
            },
        ))
        .unwrap();
        let fragment = xml.to_fragment();
        assert!(fragment.contains("<responseName>1.3.6.1.4.1.4203.1.11.3</responseName>"));
        assert!(fragment.contains("<response>dn:cn=admin</response>"));
    }

    #[test]
    fn test_search_aggregation_order_and_wrapper() {
        let messages = vec![
            message(
                9,
                ProtocolOp::SearchResultEntry {
                    dn: "cn=1".to_string(),
                    attributes: vec![],
                },
            ),
            message(
                9,
                ProtocolOp::SearchResultEntry {
                    dn: "cn=2".to_string(),
                    attributes: vec![],
                },
            ),
            message(
                9,
                ProtocolOp::SearchResultReference {
                    uris: vec!["ldap://ref/".to_string()],
                },
            ),
            message(
                9,
                ProtocolOp::SearchResultDone {
                    result: LdapResult::success(),
                },
            ),
        ];
        let xml = search_response_to_xml(9, &messages).unwrap();
        assert_eq!(xml.name, "searchResponse");
        assert_eq!(xml.attribute("requestID"), Some("9"));
        let names: Vec<_> = xml.children().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "searchResultEntry",
                "searchResultEntry",
                "searchResultReference",
                "searchResultDone"
            ]
        );
    }

    #[test]
    fn test_request_variant_is_internal_error() {
        let err = response_to_xml(&message(1, ProtocolOp::UnbindRequest)).unwrap_err();
        assert!(matches!(err, GatewayError::Internal(_)));
    }

    #[test]
    fn test_error_response_element() {
        let xml = error_response(ErrorResponseType::CouldNotConnect, "refused");
        assert_eq!(
            xml.to_fragment(),
            "<errorResponse type=\"couldNotConnect\"><message>refused</message></errorResponse>"
        );
    }
}
