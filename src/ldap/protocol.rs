use std::fmt;

pub type MessageId = u32;

/// One complete LDAP protocol message: a message ID plus a protocol operation.
#[derive(Debug, Clone, PartialEq)]
pub struct LdapMessage {
    pub message_id: MessageId,
    pub protocol_op: ProtocolOp,
}

/// Every protocol operation the gateway exchanges with a directory server.
///
/// Request variants are produced by the DSML batch parser and consumed by the
/// encoder; response variants are produced by the decoder and consumed by the
/// DSML translator. Keeping both sides in one tagged union keeps the
/// response-to-XML mapping exhaustive and statically checkable.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolOp {
    BindRequest {
        version: u8,
        dn: String,
        password: String,
    },
    BindResponse {
        result: LdapResult,
    },
    UnbindRequest,
    SearchRequest(SearchRequest),
    SearchResultEntry {
        dn: String,
        attributes: Vec<PartialAttribute>,
    },
    SearchResultReference {
        uris: Vec<String>,
    },
    SearchResultDone {
        result: LdapResult,
    },
    ModifyRequest {
        dn: String,
        changes: Vec<ModifyChange>,
    },
    ModifyResponse {
        result: LdapResult,
    },
    AddRequest {
        dn: String,
        attributes: Vec<PartialAttribute>,
    },
    AddResponse {
        result: LdapResult,
    },
    DelRequest {
        dn: String,
    },
    DelResponse {
        result: LdapResult,
    },
    ModifyDnRequest {
        dn: String,
        new_rdn: String,
        delete_old_rdn: bool,
        new_superior: Option<String>,
    },
    ModifyDnResponse {
        result: LdapResult,
    },
    CompareRequest {
        dn: String,
        attribute: String,
        value: Vec<u8>,
    },
    CompareResponse {
        result: LdapResult,
    },
    ExtendedRequest {
        name: String,
        value: Option<Vec<u8>>,
    },
    ExtendedResponse {
        result: LdapResult,
        name: Option<String>,
        value: Option<Vec<u8>>,
    },
}

impl ProtocolOp {
    /// The LDAPResult carried by a response operation, if it has one.
    pub fn result(&self) -> Option<&LdapResult> {
        match self {
            ProtocolOp::BindResponse { result }
            | ProtocolOp::SearchResultDone { result }
            | ProtocolOp::ModifyResponse { result }
            | ProtocolOp::AddResponse { result }
            | ProtocolOp::DelResponse { result }
            | ProtocolOp::ModifyDnResponse { result }
            | ProtocolOp::CompareResponse { result }
            | ProtocolOp::ExtendedResponse { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(
            self,
            ProtocolOp::BindRequest { .. }
                | ProtocolOp::UnbindRequest
                | ProtocolOp::SearchRequest(_)
                | ProtocolOp::ModifyRequest { .. }
                | ProtocolOp::AddRequest { .. }
                | ProtocolOp::DelRequest { .. }
                | ProtocolOp::ModifyDnRequest { .. }
                | ProtocolOp::CompareRequest { .. }
                | ProtocolOp::ExtendedRequest { .. }
        )
    }

    /// Short operation name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolOp::BindRequest { .. } => "bindRequest",
            ProtocolOp::BindResponse { .. } => "bindResponse",
            ProtocolOp::UnbindRequest => "unbindRequest",
            ProtocolOp::SearchRequest(_) => "searchRequest",
            ProtocolOp::SearchResultEntry { .. } => "searchResultEntry",
            ProtocolOp::SearchResultReference { .. } => "searchResultReference",
            ProtocolOp::SearchResultDone { .. } => "searchResultDone",
            ProtocolOp::ModifyRequest { .. } => "modifyRequest",
            ProtocolOp::ModifyResponse { .. } => "modifyResponse",
            ProtocolOp::AddRequest { .. } => "addRequest",
            ProtocolOp::AddResponse { .. } => "addResponse",
            ProtocolOp::DelRequest { .. } => "delRequest",
            ProtocolOp::DelResponse { .. } => "delResponse",
            ProtocolOp::ModifyDnRequest { .. } => "modDNRequest",
            ProtocolOp::ModifyDnResponse { .. } => "modDNResponse",
            ProtocolOp::CompareRequest { .. } => "compareRequest",
            ProtocolOp::CompareResponse { .. } => "compareResponse",
            ProtocolOp::ExtendedRequest { .. } => "extendedRequest",
            ProtocolOp::ExtendedResponse { .. } => "extendedResponse",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub base_dn: String,
    pub scope: SearchScope,
    pub deref_aliases: DerefAliases,
    pub size_limit: u32,
    pub time_limit: u32,
    pub types_only: bool,
    pub filter: SearchFilter,
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    BaseObject = 0,
    SingleLevel = 1,
    WholeSubtree = 2,
}

impl SearchScope {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(SearchScope::BaseObject),
            1 => Some(SearchScope::SingleLevel),
            2 => Some(SearchScope::WholeSubtree),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerefAliases {
    NeverDerefAliases = 0,
    DerefInSearching = 1,
    DerefFindingBaseObj = 2,
    DerefAlways = 3,
}

impl DerefAliases {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(DerefAliases::NeverDerefAliases),
            1 => Some(DerefAliases::DerefInSearching),
            2 => Some(DerefAliases::DerefFindingBaseObj),
            3 => Some(DerefAliases::DerefAlways),
            _ => None,
        }
    }
}

/// A search filter, mirroring the RFC 4511 Filter CHOICE.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchFilter {
    And(Vec<SearchFilter>),
    Or(Vec<SearchFilter>),
    Not(Box<SearchFilter>),
    Equality {
        attribute: String,
        value: String,
    },
    Substrings {
        attribute: String,
        initial: Option<String>,
        any: Vec<String>,
        final_: Option<String>,
    },
    GreaterOrEqual {
        attribute: String,
        value: String,
    },
    LessOrEqual {
        attribute: String,
        value: String,
    },
    Present {
        attribute: String,
    },
    Approximate {
        attribute: String,
        value: String,
    },
    Extensible {
        attribute: Option<String>,
        matching_rule: Option<String>,
        value: String,
        dn_attributes: bool,
    },
}

impl SearchFilter {
    /// The `(objectClass=*)` filter used when a search request omits one.
    pub fn present_object_class() -> Self {
        SearchFilter::Present {
            attribute: "objectClass".to_string(),
        }
    }
}

/// An attribute with zero or more values. Values are kept as raw bytes since
/// directory attributes are not required to be UTF-8.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialAttribute {
    pub name: String,
    pub values: Vec<Vec<u8>>,
}

impl PartialAttribute {
    pub fn new(name: impl Into<String>, values: Vec<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyOperation {
    Add = 0,
    Delete = 1,
    Replace = 2,
}

impl ModifyOperation {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(ModifyOperation::Add),
            1 => Some(ModifyOperation::Delete),
            2 => Some(ModifyOperation::Replace),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModifyChange {
    pub operation: ModifyOperation,
    pub modification: PartialAttribute,
}

/// The result of a completed LDAP operation (RFC 4511 LDAPResult).
#[derive(Debug, Clone, PartialEq)]
pub struct LdapResult {
    pub result_code: ResultCode,
    pub matched_dn: String,
    pub diagnostic_message: String,
    pub referrals: Vec<String>,
}

impl LdapResult {
    pub fn success() -> Self {
        Self {
            result_code: ResultCode::Success,
            matched_dn: String::new(),
            diagnostic_message: String::new(),
            referrals: Vec::new(),
        }
    }

    pub fn error(code: ResultCode, message: impl Into<String>) -> Self {
        Self {
            result_code: code,
            matched_dn: String::new(),
            diagnostic_message: message.into(),
            referrals: Vec::new(),
        }
    }
}

/// LDAP result codes (RFC 4511 Appendix A).
///
/// Codes the gateway does not know by name are carried through as `Other` so
/// the numeric value still reaches the DSML output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Success,
    OperationsError,
    ProtocolError,
    TimeLimitExceeded,
    SizeLimitExceeded,
    CompareFalse,
    CompareTrue,
    AuthMethodNotSupported,
    StrongerAuthRequired,
    Referral,
    AdminLimitExceeded,
    UnavailableCriticalExtension,
    ConfidentialityRequired,
    SaslBindInProgress,
    NoSuchAttribute,
    UndefinedAttributeType,
    InappropriateMatching,
    ConstraintViolation,
    AttributeOrValueExists,
    InvalidAttributeSyntax,
    NoSuchObject,
    AliasProblem,
    InvalidDnSyntax,
    AliasDereferencingProblem,
    InappropriateAuthentication,
    InvalidCredentials,
    InsufficientAccessRights,
    Busy,
    Unavailable,
    UnwillingToPerform,
    LoopDetect,
    NamingViolation,
    ObjectClassViolation,
    NotAllowedOnNonLeaf,
    NotAllowedOnRdn,
    EntryAlreadyExists,
    ObjectClassModsProhibited,
    AffectsMultipleDsas,
    Other(u32),
}

impl ResultCode {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => ResultCode::Success,
            1 => ResultCode::OperationsError,
            2 => ResultCode::ProtocolError,
            3 => ResultCode::TimeLimitExceeded,
            4 => ResultCode::SizeLimitExceeded,
            5 => ResultCode::CompareFalse,
            6 => ResultCode::CompareTrue,
            7 => ResultCode::AuthMethodNotSupported,
            8 => ResultCode::StrongerAuthRequired,
            10 => ResultCode::Referral,
            11 => ResultCode::AdminLimitExceeded,
            12 => ResultCode::UnavailableCriticalExtension,
            13 => ResultCode::ConfidentialityRequired,
            14 => ResultCode::SaslBindInProgress,
            16 => ResultCode::NoSuchAttribute,
            17 => ResultCode::UndefinedAttributeType,
            18 => ResultCode::InappropriateMatching,
            19 => ResultCode::ConstraintViolation,
            20 => ResultCode::AttributeOrValueExists,
            21 => ResultCode::InvalidAttributeSyntax,
            32 => ResultCode::NoSuchObject,
            33 => ResultCode::AliasProblem,
            34 => ResultCode::InvalidDnSyntax,
            36 => ResultCode::AliasDereferencingProblem,
            48 => ResultCode::InappropriateAuthentication,
            49 => ResultCode::InvalidCredentials,
            50 => ResultCode::InsufficientAccessRights,
            51 => ResultCode::Busy,
            52 => ResultCode::Unavailable,
            53 => ResultCode::UnwillingToPerform,
            54 => ResultCode::LoopDetect,
            64 => ResultCode::NamingViolation,
            65 => ResultCode::ObjectClassViolation,
            66 => ResultCode::NotAllowedOnNonLeaf,
            67 => ResultCode::NotAllowedOnRdn,
            68 => ResultCode::EntryAlreadyExists,
            69 => ResultCode::ObjectClassModsProhibited,
            71 => ResultCode::AffectsMultipleDsas,
            other => ResultCode::Other(other),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            ResultCode::Success => 0,
            ResultCode::OperationsError => 1,
            ResultCode::ProtocolError => 2,
            ResultCode::TimeLimitExceeded => 3,
            ResultCode::SizeLimitExceeded => 4,
            ResultCode::CompareFalse => 5,
            ResultCode::CompareTrue => 6,
            ResultCode::AuthMethodNotSupported => 7,
            ResultCode::StrongerAuthRequired => 8,
            ResultCode::Referral => 10,
            ResultCode::AdminLimitExceeded => 11,
            ResultCode::UnavailableCriticalExtension => 12,
            ResultCode::ConfidentialityRequired => 13,
            ResultCode::SaslBindInProgress => 14,
            ResultCode::NoSuchAttribute => 16,
            ResultCode::UndefinedAttributeType => 17,
            ResultCode::InappropriateMatching => 18,
            ResultCode::ConstraintViolation => 19,
            ResultCode::AttributeOrValueExists => 20,
            ResultCode::InvalidAttributeSyntax => 21,
            ResultCode::NoSuchObject => 32,
            ResultCode::AliasProblem => 33,
            ResultCode::InvalidDnSyntax => 34,
            ResultCode::AliasDereferencingProblem => 36,
            ResultCode::InappropriateAuthentication => 48,
            ResultCode::InvalidCredentials => 49,
            ResultCode::InsufficientAccessRights => 50,
            ResultCode::Busy => 51,
            ResultCode::Unavailable => 52,
            ResultCode::UnwillingToPerform => 53,
            ResultCode::LoopDetect => 54,
            ResultCode::NamingViolation => 64,
            ResultCode::ObjectClassViolation => 65,
            ResultCode::NotAllowedOnNonLeaf => 66,
            ResultCode::NotAllowedOnRdn => 67,
            ResultCode::EntryAlreadyExists => 68,
            ResultCode::ObjectClassModsProhibited => 69,
            ResultCode::AffectsMultipleDsas => 71,
            ResultCode::Other(other) => *other,
        }
    }

    /// The RFC 4511 short name, used for the DSML `descr` attribute.
    pub fn descr(&self) -> Option<&'static str> {
        match self {
            ResultCode::Success => Some("success"),
            ResultCode::OperationsError => Some("operationsError"),
            ResultCode::ProtocolError => Some("protocolError"),
            ResultCode::TimeLimitExceeded => Some("timeLimitExceeded"),
            ResultCode::SizeLimitExceeded => Some("sizeLimitExceeded"),
            ResultCode::CompareFalse => Some("compareFalse"),
            ResultCode::CompareTrue => Some("compareTrue"),
            ResultCode::AuthMethodNotSupported => Some("authMethodNotSupported"),
            ResultCode::StrongerAuthRequired => Some("strongerAuthRequired"),
            ResultCode::Referral => Some("referral"),
            ResultCode::AdminLimitExceeded => Some("adminLimitExceeded"),
            ResultCode::UnavailableCriticalExtension => Some("unavailableCriticalExtension"),
            ResultCode::ConfidentialityRequired => Some("confidentialityRequired"),
            ResultCode::SaslBindInProgress => Some("saslBindInProgress"),
            ResultCode::NoSuchAttribute => Some("noSuchAttribute"),
            ResultCode::UndefinedAttributeType => Some("undefinedAttributeType"),
            ResultCode::InappropriateMatching => Some("inappropriateMatching"),
            ResultCode::ConstraintViolation => Some("constraintViolation"),
            ResultCode::AttributeOrValueExists => Some("attributeOrValueExists"),
            ResultCode::InvalidAttributeSyntax => Some("invalidAttributeSyntax"),
            ResultCode::NoSuchObject => Some("noSuchObject"),
            ResultCode::AliasProblem => Some("aliasProblem"),
            ResultCode::InvalidDnSyntax => Some("invalidDNSyntax"),
            ResultCode::AliasDereferencingProblem => Some("aliasDereferencingProblem"),
            ResultCode::InappropriateAuthentication => Some("inappropriateAuthentication"),
            ResultCode::InvalidCredentials => Some("invalidCredentials"),
            ResultCode::InsufficientAccessRights => Some("insufficientAccessRights"),
            ResultCode::Busy => Some("busy"),
            ResultCode::Unavailable => Some("unavailable"),
            ResultCode::UnwillingToPerform => Some("unwillingToPerform"),
            ResultCode::LoopDetect => Some("loopDetect"),
            ResultCode::NamingViolation => Some("namingViolation"),
            ResultCode::ObjectClassViolation => Some("objectClassViolation"),
            ResultCode::NotAllowedOnNonLeaf => Some("notAllowedOnNonLeaf"),
            ResultCode::NotAllowedOnRdn => Some("notAllowedOnRDN"),
            ResultCode::EntryAlreadyExists => Some("entryAlreadyExists"),
            ResultCode::ObjectClassModsProhibited => Some("objectClassModsProhibited"),
            ResultCode::AffectsMultipleDsas => Some("affectsMultipleDSAs"),
            ResultCode::Other(_) => None,
        }
    }

    /// Whether a batch running with `onError=exit` may continue past an
    /// operation that completed with this code.
    pub fn permits_continuation(&self) -> bool {
        matches!(
            self,
            ResultCode::Success
                | ResultCode::CompareTrue
                | ResultCode::CompareFalse
                | ResultCode::Referral
        )
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.descr() {
            Some(descr) => write!(f, "{} ({})", descr, self.code()),
            None => write!(f, "resultCode {}", self.code()),
        }
    }
}
