//! Binary message codec: in-memory protocol operations to and from their
//! BER wire form (RFC 4511).
//!
//! Both directions are pure transforms. `decode_message` only ever looks at
//! the front of the buffer and reports `Ok(None)` when the buffer holds an
//! incomplete message; syntactically invalid input is a `Decoding` error and
//! fatal to the exchange.

use bytes::{BufMut, BytesMut};

use crate::ldap::ber::{self, BerReader, LengthPeek};
use crate::ldap::protocol::{
    DerefAliases, LdapMessage, LdapResult, MessageId, ModifyChange, ModifyOperation,
    PartialAttribute, ProtocolOp, ResultCode, SearchFilter, SearchRequest, SearchScope,
};
use crate::{GatewayError, Result};

// Application tags (RFC 4511 section 4.1.1)
const APP_BIND_REQUEST: u8 = 0x60;
const APP_BIND_RESPONSE: u8 = 0x61;
const APP_UNBIND_REQUEST: u8 = 0x42;
const APP_SEARCH_REQUEST: u8 = 0x63;
const APP_SEARCH_RESULT_ENTRY: u8 = 0x64;
const APP_SEARCH_RESULT_DONE: u8 = 0x65;
const APP_SEARCH_RESULT_REFERENCE: u8 = 0x73;
const APP_MODIFY_REQUEST: u8 = 0x66;
const APP_MODIFY_RESPONSE: u8 = 0x67;
const APP_ADD_REQUEST: u8 = 0x68;
const APP_ADD_RESPONSE: u8 = 0x69;
const APP_DEL_REQUEST: u8 = 0x4a;
const APP_DEL_RESPONSE: u8 = 0x6b;
const APP_MODDN_REQUEST: u8 = 0x6c;
const APP_MODDN_RESPONSE: u8 = 0x6d;
const APP_COMPARE_REQUEST: u8 = 0x6e;
const APP_COMPARE_RESPONSE: u8 = 0x6f;
const APP_EXTENDED_REQUEST: u8 = 0x77;
const APP_EXTENDED_RESPONSE: u8 = 0x78;

// Context-specific tags
const CTX_SIMPLE_AUTH: u8 = 0x80;
const CTX_NEW_SUPERIOR: u8 = 0x80;
const CTX_EXTENDED_NAME: u8 = 0x80;
const CTX_EXTENDED_VALUE: u8 = 0x81;
const CTX_RESPONSE_NAME: u8 = 0x8a;
const CTX_RESPONSE_VALUE: u8 = 0x8b;
const CTX_REFERRAL: u8 = 0xa3;

// Filter tags
const FILTER_AND: u8 = 0xa0;
const FILTER_OR: u8 = 0xa1;
const FILTER_NOT: u8 = 0xa2;
const FILTER_EQUALITY: u8 = 0xa3;
const FILTER_SUBSTRINGS: u8 = 0xa4;
const FILTER_GREATER_OR_EQUAL: u8 = 0xa5;
const FILTER_LESS_OR_EQUAL: u8 = 0xa6;
const FILTER_PRESENT: u8 = 0x87;
const FILTER_APPROX: u8 = 0xa8;
const FILTER_EXTENSIBLE: u8 = 0xa9;

const SUBSTRING_INITIAL: u8 = 0x80;
const SUBSTRING_ANY: u8 = 0x81;
const SUBSTRING_FINAL: u8 = 0x82;

const EXTENSIBLE_MATCHING_RULE: u8 = 0x81;
const EXTENSIBLE_TYPE: u8 = 0x82;
const EXTENSIBLE_VALUE: u8 = 0x83;
const EXTENSIBLE_DN_ATTRIBUTES: u8 = 0x84;

/// Encode a request operation under the given message ID.
pub fn encode_request(op: &ProtocolOp, message_id: MessageId) -> Result<BytesMut> {
    if !op.is_request() {
        return Err(GatewayError::Encoding(format!(
            "{} is not a request operation",
            op.name()
        )));
    }
    encode_message(&LdapMessage {
        message_id,
        protocol_op: op.clone(),
    })
}

/// Encode one complete LDAPMessage envelope.
pub fn encode_message(message: &LdapMessage) -> Result<BytesMut> {
    let mut content = BytesMut::with_capacity(128);
    ber::put_integer(&mut content, ber::TAG_INTEGER, message.message_id);
    encode_protocol_op(&mut content, &message.protocol_op)?;

    let mut buf = BytesMut::with_capacity(content.len() + 4);
    buf.put_u8(ber::TAG_SEQUENCE);
    ber::put_length(&mut buf, content.len());
    buf.put(content);
    Ok(buf)
}

fn encode_protocol_op(buf: &mut BytesMut, op: &ProtocolOp) -> Result<()> {
    match op {
        ProtocolOp::BindRequest {
            version,
            dn,
            password,
        } => {
            let mut inner = BytesMut::new();
            ber::put_integer(&mut inner, ber::TAG_INTEGER, *version as u32);
            ber::put_octet_string(&mut inner, ber::TAG_OCTET_STRING, dn.as_bytes());
            ber::put_octet_string(&mut inner, CTX_SIMPLE_AUTH, password.as_bytes());
            ber::put_tlv(buf, APP_BIND_REQUEST, &inner);
        }
        ProtocolOp::BindResponse { result } => {
            let inner = encode_result(result);
            ber::put_tlv(buf, APP_BIND_RESPONSE, &inner);
        }
        ProtocolOp::UnbindRequest => {
            ber::put_tlv(buf, APP_UNBIND_REQUEST, &[]);
        }
        ProtocolOp::SearchRequest(search) => {
            let mut inner = BytesMut::new();
            ber::put_octet_string(&mut inner, ber::TAG_OCTET_STRING, search.base_dn.as_bytes());
            ber::put_integer(&mut inner, ber::TAG_ENUMERATED, search.scope as u32);
            ber::put_integer(&mut inner, ber::TAG_ENUMERATED, search.deref_aliases as u32);
            ber::put_integer(&mut inner, ber::TAG_INTEGER, search.size_limit);
            ber::put_integer(&mut inner, ber::TAG_INTEGER, search.time_limit);
            ber::put_boolean(&mut inner, search.types_only);
            encode_filter(&mut inner, &search.filter);
            let mut attrs = BytesMut::new();
            for attribute in &search.attributes {
                ber::put_octet_string(&mut attrs, ber::TAG_OCTET_STRING, attribute.as_bytes());
            }
            ber::put_tlv(&mut inner, ber::TAG_SEQUENCE, &attrs);
            ber::put_tlv(buf, APP_SEARCH_REQUEST, &inner);
        }
        ProtocolOp::SearchResultEntry { dn, attributes } => {
            let mut inner = BytesMut::new();
            ber::put_octet_string(&mut inner, ber::TAG_OCTET_STRING, dn.as_bytes());
            encode_attribute_list(&mut inner, attributes);
            ber::put_tlv(buf, APP_SEARCH_RESULT_ENTRY, &inner);
        }
        ProtocolOp::SearchResultReference { uris } => {
            let mut inner = BytesMut::new();
            for uri in uris {
                ber::put_octet_string(&mut inner, ber::TAG_OCTET_STRING, uri.as_bytes());
            }
            ber::put_tlv(buf, APP_SEARCH_RESULT_REFERENCE, &inner);
        }
        ProtocolOp::SearchResultDone { result } => {
            let inner = encode_result(result);
            ber::put_tlv(buf, APP_SEARCH_RESULT_DONE, &inner);
        }
        ProtocolOp::ModifyRequest { dn, changes } => {
            let mut inner = BytesMut::new();
            ber::put_octet_string(&mut inner, ber::TAG_OCTET_STRING, dn.as_bytes());
            let mut change_list = BytesMut::new();
            for change in changes {
                let mut one = BytesMut::new();
                ber::put_integer(&mut one, ber::TAG_ENUMERATED, change.operation as u32);
                encode_attribute(&mut one, &change.modification);
                ber::put_tlv(&mut change_list, ber::TAG_SEQUENCE, &one);
            }
            ber::put_tlv(&mut inner, ber::TAG_SEQUENCE, &change_list);
            ber::put_tlv(buf, APP_MODIFY_REQUEST, &inner);
        }
        ProtocolOp::ModifyResponse { result } => {
            let inner = encode_result(result);
            ber::put_tlv(buf, APP_MODIFY_RESPONSE, &inner);
        }
        ProtocolOp::AddRequest { dn, attributes } => {
            let mut inner = BytesMut::new();
            ber::put_octet_string(&mut inner, ber::TAG_OCTET_STRING, dn.as_bytes());
            encode_attribute_list(&mut inner, attributes);
            ber::put_tlv(buf, APP_ADD_REQUEST, &inner);
        }
        ProtocolOp::AddResponse { result } => {
            let inner = encode_result(result);
            ber::put_tlv(buf, APP_ADD_RESPONSE, &inner);
        }
        // DelRequest is the one primitive application type: its content is
        // the DN octets themselves.
        ProtocolOp::DelRequest { dn } => {
            ber::put_tlv(buf, APP_DEL_REQUEST, dn.as_bytes());
        }
        ProtocolOp::DelResponse { result } => {
            let inner = encode_result(result);
            ber::put_tlv(buf, APP_DEL_RESPONSE, &inner);
        }
        ProtocolOp::ModifyDnRequest {
            dn,
            new_rdn,
            delete_old_rdn,
            new_superior,
        } => {
            let mut inner = BytesMut::new();
            ber::put_octet_string(&mut inner, ber::TAG_OCTET_STRING, dn.as_bytes());
            ber::put_octet_string(&mut inner, ber::TAG_OCTET_STRING, new_rdn.as_bytes());
            ber::put_boolean(&mut inner, *delete_old_rdn);
            if let Some(superior) = new_superior {
                ber::put_octet_string(&mut inner, CTX_NEW_SUPERIOR, superior.as_bytes());
            }
            ber::put_tlv(buf, APP_MODDN_REQUEST, &inner);
        }
        ProtocolOp::ModifyDnResponse { result } => {
            let inner = encode_result(result);
            ber::put_tlv(buf, APP_MODDN_RESPONSE, &inner);
        }
        ProtocolOp::CompareRequest {
            dn,
            attribute,
            value,
        } => {
            let mut inner = BytesMut::new();
            ber::put_octet_string(&mut inner, ber::TAG_OCTET_STRING, dn.as_bytes());
            let mut ava = BytesMut::new();
            ber::put_octet_string(&mut ava, ber::TAG_OCTET_STRING, attribute.as_bytes());
            ber::put_octet_string(&mut ava, ber::TAG_OCTET_STRING, value);
            ber::put_tlv(&mut inner, ber::TAG_SEQUENCE, &ava);
            ber::put_tlv(buf, APP_COMPARE_REQUEST, &inner);
        }
        ProtocolOp::CompareResponse { result } => {
            let inner = encode_result(result);
            ber::put_tlv(buf, APP_COMPARE_RESPONSE, &inner);
        }
        ProtocolOp::ExtendedRequest { name, value } => {
            let mut inner = BytesMut::new();
            ber::put_octet_string(&mut inner, CTX_EXTENDED_NAME, name.as_bytes());
            if let Some(value) = value {
                ber::put_octet_string(&mut inner, CTX_EXTENDED_VALUE, value);
            }
            ber::put_tlv(buf, APP_EXTENDED_REQUEST, &inner);
        }
        ProtocolOp::ExtendedResponse {
            result,
            name,
            value,
        } => {
            let mut inner = encode_result(result);
            if let Some(name) = name {
                ber::put_octet_string(&mut inner, CTX_RESPONSE_NAME, name.as_bytes());
            }
            if let Some(value) = value {
                ber::put_octet_string(&mut inner, CTX_RESPONSE_VALUE, value);
            }
            ber::put_tlv(buf, APP_EXTENDED_RESPONSE, &inner);
        }
    }
    Ok(())
}

fn encode_result(result: &LdapResult) -> BytesMut {
    let mut buf = BytesMut::new();
    ber::put_integer(&mut buf, ber::TAG_ENUMERATED, result.result_code.code());
    ber::put_octet_string(&mut buf, ber::TAG_OCTET_STRING, result.matched_dn.as_bytes());
    ber::put_octet_string(
        &mut buf,
        ber::TAG_OCTET_STRING,
        result.diagnostic_message.as_bytes(),
    );
    if !result.referrals.is_empty() {
        let mut referral = BytesMut::new();
        for uri in &result.referrals {
            ber::put_octet_string(&mut referral, ber::TAG_OCTET_STRING, uri.as_bytes());
        }
        ber::put_tlv(&mut buf, CTX_REFERRAL, &referral);
    }
    buf
}

fn encode_attribute(buf: &mut BytesMut, attribute: &PartialAttribute) {
    let mut inner = BytesMut::new();
    ber::put_octet_string(&mut inner, ber::TAG_OCTET_STRING, attribute.name.as_bytes());
    let mut values = BytesMut::new();
    for value in &attribute.values {
        ber::put_octet_string(&mut values, ber::TAG_OCTET_STRING, value);
    }
    ber::put_tlv(&mut inner, ber::TAG_SET, &values);
    ber::put_tlv(buf, ber::TAG_SEQUENCE, &inner);
}

fn encode_attribute_list(buf: &mut BytesMut, attributes: &[PartialAttribute]) {
    let mut list = BytesMut::new();
    for attribute in attributes {
        encode_attribute(&mut list, attribute);
    }
    ber::put_tlv(buf, ber::TAG_SEQUENCE, &list);
}

fn encode_filter(buf: &mut BytesMut, filter: &SearchFilter) {
    match filter {
        SearchFilter::And(filters) | SearchFilter::Or(filters) => {
            let tag = if matches!(filter, SearchFilter::And(_)) {
                FILTER_AND
            } else {
                FILTER_OR
            };
            let mut inner = BytesMut::new();
            for child in filters {
                encode_filter(&mut inner, child);
            }
            ber::put_tlv(buf, tag, &inner);
        }
        SearchFilter::Not(child) => {
            let mut inner = BytesMut::new();
            encode_filter(&mut inner, child);
            ber::put_tlv(buf, FILTER_NOT, &inner);
        }
        SearchFilter::Equality { attribute, value } => {
            encode_ava_filter(buf, FILTER_EQUALITY, attribute, value);
        }
        SearchFilter::GreaterOrEqual { attribute, value } => {
            encode_ava_filter(buf, FILTER_GREATER_OR_EQUAL, attribute, value);
        }
        SearchFilter::LessOrEqual { attribute, value } => {
            encode_ava_filter(buf, FILTER_LESS_OR_EQUAL, attribute, value);
        }
        SearchFilter::Approximate { attribute, value } => {
            encode_ava_filter(buf, FILTER_APPROX, attribute, value);
        }
        SearchFilter::Present { attribute } => {
            ber::put_octet_string(buf, FILTER_PRESENT, attribute.as_bytes());
        }
        SearchFilter::Substrings {
            attribute,
            initial,
            any,
            final_,
        } => {
            let mut inner = BytesMut::new();
            ber::put_octet_string(&mut inner, ber::TAG_OCTET_STRING, attribute.as_bytes());
            let mut parts = BytesMut::new();
            if let Some(initial) = initial {
                ber::put_octet_string(&mut parts, SUBSTRING_INITIAL, initial.as_bytes());
            }
            for part in any {
                ber::put_octet_string(&mut parts, SUBSTRING_ANY, part.as_bytes());
            }
            if let Some(final_) = final_ {
                ber::put_octet_string(&mut parts, SUBSTRING_FINAL, final_.as_bytes());
            }
            ber::put_tlv(&mut inner, ber::TAG_SEQUENCE, &parts);
            ber::put_tlv(buf, FILTER_SUBSTRINGS, &inner);
        }
        SearchFilter::Extensible {
            attribute,
            matching_rule,
            value,
            dn_attributes,
        } => {
            let mut inner = BytesMut::new();
            if let Some(rule) = matching_rule {
                ber::put_octet_string(&mut inner, EXTENSIBLE_MATCHING_RULE, rule.as_bytes());
            }
            if let Some(attribute) = attribute {
                ber::put_octet_string(&mut inner, EXTENSIBLE_TYPE, attribute.as_bytes());
            }
            ber::put_octet_string(&mut inner, EXTENSIBLE_VALUE, value.as_bytes());
            if *dn_attributes {
                let mut flag = BytesMut::new();
                flag.put_u8(EXTENSIBLE_DN_ATTRIBUTES);
                flag.put_u8(1);
                flag.put_u8(0xff);
                inner.put(flag);
            }
            ber::put_tlv(buf, FILTER_EXTENSIBLE, &inner);
        }
    }
}

fn encode_ava_filter(buf: &mut BytesMut, tag: u8, attribute: &str, value: &str) {
    let mut inner = BytesMut::new();
    ber::put_octet_string(&mut inner, ber::TAG_OCTET_STRING, attribute.as_bytes());
    ber::put_octet_string(&mut inner, ber::TAG_OCTET_STRING, value.as_bytes());
    ber::put_tlv(buf, tag, &inner);
}

/// Attempt to decode one complete LDAPMessage from the front of `buf`.
///
/// Returns `Ok(None)` when the buffer does not yet hold a full message, and
/// `Ok(Some((message, consumed)))` once it does.
pub fn decode_message(buf: &[u8]) -> Result<Option<(LdapMessage, usize)>> {
    if buf.is_empty() {
        return Ok(None);
    }
    if buf[0] != ber::TAG_SEQUENCE {
        return Err(GatewayError::Decoding(format!(
            "LDAPMessage must start with SEQUENCE, found tag 0x{:02x}",
            buf[0]
        )));
    }
    let (length, header_len) = match ber::peek_length(&buf[1..])? {
        LengthPeek::Definite { value, header_len } => (value, header_len),
        LengthPeek::NeedMore => return Ok(None),
    };
    let total = 1 + header_len + length;
    if buf.len() < total {
        return Ok(None);
    }

    let mut reader = BerReader::new(&buf[1 + header_len..total]);
    let message_id = reader.read_integer()?;
    let (op_tag, op_content) = reader.read_any()?;
    let protocol_op = decode_protocol_op(op_tag, op_content)?;
    // Trailing controls are permitted by the protocol; the gateway carries
    // none on its own requests and does not surface response controls.
    Ok(Some((
        LdapMessage {
            message_id,
            protocol_op,
        },
        total,
    )))
}

fn decode_protocol_op(tag: u8, content: &[u8]) -> Result<ProtocolOp> {
    let mut reader = BerReader::new(content);
    let op = match tag {
        APP_BIND_REQUEST => {
            let version = reader.read_integer()? as u8;
            let dn = reader.read_string()?;
            let password_bytes = reader.read_expected(CTX_SIMPLE_AUTH)?;
            let password = ber::string_from_bytes(password_bytes)?;
            ProtocolOp::BindRequest {
                version,
                dn,
                password,
            }
        }
        APP_BIND_RESPONSE => ProtocolOp::BindResponse {
            result: decode_result(&mut reader)?,
        },
        APP_UNBIND_REQUEST => ProtocolOp::UnbindRequest,
        APP_SEARCH_REQUEST => {
            let base_dn = reader.read_string()?;
            let scope_code = reader.read_enumerated()?;
            let scope = SearchScope::from_code(scope_code).ok_or_else(|| {
                GatewayError::Decoding(format!("invalid search scope {}", scope_code))
            })?;
            let deref_code = reader.read_enumerated()?;
            let deref_aliases = DerefAliases::from_code(deref_code).ok_or_else(|| {
                GatewayError::Decoding(format!("invalid derefAliases {}", deref_code))
            })?;
            let size_limit = reader.read_integer()?;
            let time_limit = reader.read_integer()?;
            let types_only = reader.read_boolean()?;
            let (filter_tag, filter_content) = reader.read_any()?;
            let filter = decode_filter(filter_tag, filter_content)?;
            let attrs_content = reader.read_expected(ber::TAG_SEQUENCE)?;
            let mut attrs_reader = BerReader::new(attrs_content);
            let mut attributes = Vec::new();
            while !attrs_reader.is_empty() {
                attributes.push(attrs_reader.read_string()?);
            }
            ProtocolOp::SearchRequest(SearchRequest {
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
        APP_SEARCH_RESULT_ENTRY => {
            let dn = reader.read_string()?;
            let attributes = decode_attribute_list(&mut reader)?;
            ProtocolOp::SearchResultEntry { dn, attributes }
        }
        APP_SEARCH_RESULT_REFERENCE => {
            let mut uris = Vec::new();
            while !reader.is_empty() {
                uris.push(reader.read_string()?);
            }
            ProtocolOp::SearchResultReference { uris }
        }
        APP_SEARCH_RESULT_DONE => ProtocolOp::SearchResultDone {
            result: decode_result(&mut reader)?,
        },
        APP_MODIFY_REQUEST => {
            let dn = reader.read_string()?;
            let changes_content = reader.read_expected(ber::TAG_SEQUENCE)?;
            let mut changes_reader = BerReader::new(changes_content);
            let mut changes = Vec::new();
            while !changes_reader.is_empty() {
                let one_content = changes_reader.read_expected(ber::TAG_SEQUENCE)?;
                let mut one = BerReader::new(one_content);
                let op_code = one.read_enumerated()?;
                let operation = ModifyOperation::from_code(op_code).ok_or_else(|| {
                    GatewayError::Decoding(format!("invalid modify operation {}", op_code))
                })?;
                let modification = decode_attribute(&mut one)?;
                changes.push(ModifyChange {
                    operation,
                    modification,
                });
            }
            ProtocolOp::ModifyRequest { dn, changes }
        }
        APP_MODIFY_RESPONSE => ProtocolOp::ModifyResponse {
            result: decode_result(&mut reader)?,
        },
        APP_ADD_REQUEST => {
            let dn = reader.read_string()?;
            let attributes = decode_attribute_list(&mut reader)?;
            ProtocolOp::AddRequest { dn, attributes }
        }
        APP_ADD_RESPONSE => ProtocolOp::AddResponse {
            result: decode_result(&mut reader)?,
        },
        APP_DEL_REQUEST => ProtocolOp::DelRequest {
            dn: ber::string_from_bytes(content)?,
        },
        APP_DEL_RESPONSE => ProtocolOp::DelResponse {
            result: decode_result(&mut reader)?,
        },
        APP_MODDN_REQUEST => {
            let dn = reader.read_string()?;
            let new_rdn = reader.read_string()?;
            let delete_old_rdn = reader.read_boolean()?;
            let new_superior = if !reader.is_empty() {
                let bytes = reader.read_expected(CTX_NEW_SUPERIOR)?;
                Some(ber::string_from_bytes(bytes)?)
            } else {
                None
            };
            ProtocolOp::ModifyDnRequest {
                dn,
                new_rdn,
                delete_old_rdn,
                new_superior,
            }
        }
        APP_MODDN_RESPONSE => ProtocolOp::ModifyDnResponse {
            result: decode_result(&mut reader)?,
        },
        APP_COMPARE_REQUEST => {
            let dn = reader.read_string()?;
            let ava_content = reader.read_expected(ber::TAG_SEQUENCE)?;
            let mut ava = BerReader::new(ava_content);
            let attribute = ava.read_string()?;
            let value = ava.read_octet_string()?.to_vec();
            ProtocolOp::CompareRequest {
                dn,
                attribute,
                value,
            }
        }
        APP_COMPARE_RESPONSE => ProtocolOp::CompareResponse {
            result: decode_result(&mut reader)?,
        },
        APP_EXTENDED_REQUEST => {
            let name_bytes = reader.read_expected(CTX_EXTENDED_NAME)?;
            let name = ber::string_from_bytes(name_bytes)?;
            let value = if !reader.is_empty() {
                Some(reader.read_expected(CTX_EXTENDED_VALUE)?.to_vec())
            } else {
                None
            };
            ProtocolOp::ExtendedRequest { name, value }
        }
        APP_EXTENDED_RESPONSE => {
            let result = decode_result(&mut reader)?;
            let mut name = None;
            let mut value = None;
            while !reader.is_empty() {
                let (field_tag, field_content) = reader.read_any()?;
                match field_tag {
                    CTX_RESPONSE_NAME => name = Some(ber::string_from_bytes(field_content)?),
                    CTX_RESPONSE_VALUE => value = Some(field_content.to_vec()),
                    other => {
                        return Err(GatewayError::Decoding(format!(
                            "unexpected field 0x{:02x} in extended response",
                            other
                        )));
                    }
                }
            }
            ProtocolOp::ExtendedResponse {
                result,
                name,
                value,
            }
        }
        other => {
            return Err(GatewayError::Decoding(format!(
                "unsupported protocol operation tag 0x{:02x}",
                other
            )));
        }
    };
    Ok(op)
}

fn decode_result(reader: &mut BerReader<'_>) -> Result<LdapResult> {
    let code = reader.read_enumerated()?;
    let matched_dn = reader.read_string()?;
    let diagnostic_message = reader.read_string()?;
    let mut referrals = Vec::new();
    if !reader.is_empty() && reader.peek_tag()? == CTX_REFERRAL {
        let referral_content = reader.read_expected(CTX_REFERRAL)?;
        let mut referral_reader = BerReader::new(referral_content);
        while !referral_reader.is_empty() {
            referrals.push(referral_reader.read_string()?);
        }
    }
    Ok(LdapResult {
        result_code: ResultCode::from_code(code),
        matched_dn,
        diagnostic_message,
        referrals,
    })
}

fn decode_attribute(reader: &mut BerReader<'_>) -> Result<PartialAttribute> {
    let content = reader.read_expected(ber::TAG_SEQUENCE)?;
    let mut inner = BerReader::new(content);
    let name = inner.read_string()?;
    let values_content = inner.read_expected(ber::TAG_SET)?;
    let mut values_reader = BerReader::new(values_content);
    let mut values = Vec::new();
    while !values_reader.is_empty() {
        values.push(values_reader.read_octet_string()?.to_vec());
    }
    Ok(PartialAttribute { name, values })
}

fn decode_attribute_list(reader: &mut BerReader<'_>) -> Result<Vec<PartialAttribute>> {
    let list_content = reader.read_expected(ber::TAG_SEQUENCE)?;
    let mut list_reader = BerReader::new(list_content);
    let mut attributes = Vec::new();
    while !list_reader.is_empty() {
        attributes.push(decode_attribute(&mut list_reader)?);
    }
    Ok(attributes)
}

fn decode_filter(tag: u8, content: &[u8]) -> Result<SearchFilter> {
    let mut reader = BerReader::new(content);
    let filter = match tag {
        FILTER_AND | FILTER_OR => {
            let mut filters = Vec::new();
            while !reader.is_empty() {
                let (child_tag, child_content) = reader.read_any()?;
                filters.push(decode_filter(child_tag, child_content)?);
            }
            if tag == FILTER_AND {
                SearchFilter::And(filters)
            } else {
                SearchFilter::Or(filters)
            }
        }
        FILTER_NOT => {
            let (child_tag, child_content) = reader.read_any()?;
            SearchFilter::Not(Box::new(decode_filter(child_tag, child_content)?))
        }
        FILTER_EQUALITY | FILTER_GREATER_OR_EQUAL | FILTER_LESS_OR_EQUAL | FILTER_APPROX => {
            let attribute = reader.read_string()?;
            let value = reader.read_string()?;
            match tag {
                FILTER_EQUALITY => SearchFilter::Equality { attribute, value },
                FILTER_GREATER_OR_EQUAL => SearchFilter::GreaterOrEqual { attribute, value },
                FILTER_LESS_OR_EQUAL => SearchFilter::LessOrEqual { attribute, value },
                _ => SearchFilter::Approximate { attribute, value },
            }
        }
        FILTER_PRESENT => SearchFilter::Present {
            attribute: ber::string_from_bytes(content)?,
        },
        FILTER_SUBSTRINGS => {
            let attribute = reader.read_string()?;
            let parts_content = reader.read_expected(ber::TAG_SEQUENCE)?;
            let mut parts_reader = BerReader::new(parts_content);
            let mut initial = None;
            let mut any = Vec::new();
            let mut final_ = None;
            while !parts_reader.is_empty() {
                let (part_tag, part_content) = parts_reader.read_any()?;
                let part = ber::string_from_bytes(part_content)?;
                match part_tag {
                    SUBSTRING_INITIAL => initial = Some(part),
                    SUBSTRING_ANY => any.push(part),
                    SUBSTRING_FINAL => final_ = Some(part),
                    other => {
                        return Err(GatewayError::Decoding(format!(
                            "invalid substring element tag 0x{:02x}",
                            other
                        )));
                    }
                }
            }
            SearchFilter::Substrings {
                attribute,
                initial,
                any,
                final_,
            }
        }
        FILTER_EXTENSIBLE => {
            let mut attribute = None;
            let mut matching_rule = None;
            let mut value = String::new();
            let mut dn_attributes = false;
            while !reader.is_empty() {
                let (field_tag, field_content) = reader.read_any()?;
                match field_tag {
                    EXTENSIBLE_MATCHING_RULE => {
                        matching_rule = Some(ber::string_from_bytes(field_content)?);
                    }
                    EXTENSIBLE_TYPE => {
                        attribute = Some(ber::string_from_bytes(field_content)?);
                    }
                    EXTENSIBLE_VALUE => {
                        value = ber::string_from_bytes(field_content)?;
                    }
                    EXTENSIBLE_DN_ATTRIBUTES => {
                        dn_attributes = field_content.first().copied().unwrap_or(0) != 0;
                    }
                    other => {
                        return Err(GatewayError::Decoding(format!(
                            "invalid extensibleMatch element tag 0x{:02x}",
                            other
                        )));
                    }
                }
            }
            SearchFilter::Extensible {
                attribute,
                matching_rule,
                value,
                dn_attributes,
            }
        }
        other => {
            return Err(GatewayError::Decoding(format!(
                "unsupported filter tag 0x{:02x}",
                other
            )));
        }
    };
    Ok(filter)
}
