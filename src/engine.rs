//! The batch controller: drives a whole DSML batch against one directory
//! server connection.
//!
//! Lifecycle per batch: connect and bind, parse and validate the batch
//! document, then run one request/response exchange at a time in document
//! order. The declared `processing=parallel` mode never dispatches
//! concurrently; it only changes request-ID validation and how correlation
//! is expressed in the output.
//!
//! Every failure mode is converted into a well-formed DSML document; the
//! caller never sees an error escape this module.

use std::collections::VecDeque;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::dsml::parser::{parse_batch_request, DsmlRequest, OnError};
use crate::dsml::translate::{
    error_response, response_to_xml, search_response_to_xml, ErrorResponseType,
};
use crate::dsml::xml::XmlElement;
use crate::ldap::codec;
use crate::ldap::protocol::{LdapMessage, MessageId, ProtocolOp, ResultCode};
use crate::ldap::stream::StreamDecoder;
use crate::transport::{TcpTransport, Transport};
use crate::{GatewayError, Result};

const DSML_NAMESPACE: &str = "urn:oasis:names:tc:DSML:2:0:core";

pub struct DsmlEngine {
    config: GatewayConfig,
}

/// Connection-scoped exchange state: the transport, the streaming decoder
/// and a queue of decoded-but-unconsumed messages. Owned by one batch run.
struct Exchange<T: Transport> {
    transport: T,
    decoder: StreamDecoder,
    queue: VecDeque<LdapMessage>,
    next_message_id: MessageId,
}

impl<T: Transport> Exchange<T> {
    fn new(transport: T) -> Self {
        Self {
            transport,
            decoder: StreamDecoder::new(),
            queue: VecDeque::new(),
            next_message_id: 0,
        }
    }

    fn allocate_id(&mut self) -> MessageId {
        self.next_message_id += 1;
        self.next_message_id
    }

    /// Start a fresh logical exchange: encode, reset decoder state, send.
    async fn send_request(&mut self, op: &ProtocolOp, message_id: MessageId) -> Result<()> {
        let buf = codec::encode_request(op, message_id)?;
        self.decoder.reset();
        self.queue.clear();
        debug!(message_id, op = op.name(), bytes = buf.len(), "sending request");
        self.transport.send(&buf).await
    }

    /// The next decoded message, reading from the transport as needed.
    async fn next_message(&mut self) -> Result<LdapMessage> {
        loop {
            if let Some(message) = self.queue.pop_front() {
                return Ok(message);
            }
            let bytes = self.transport.receive_more().await?;
            self.queue.extend(self.decoder.feed(&bytes)?);
        }
    }
}

impl DsmlEngine {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    /// Run a batch over a new TCP connection to the configured server.
    pub async fn run_batch(&self, document: &str) -> String {
        match TcpTransport::connect(&self.config.host, self.config.port).await {
            Ok(transport) => self.run_batch_on(transport, document).await,
            Err(e) => {
                warn!("connection failed: {}", e);
                self.envelope(None, ErrorResponseType::CouldNotConnect, &e.to_string())
            }
        }
    }

    /// Run a batch supplied as raw bytes with an optional declared encoding.
    pub async fn run_batch_bytes(&self, bytes: &[u8], encoding: Option<&str>) -> String {
        match decode_document(bytes, encoding) {
            Ok(document) => self.run_batch(&document).await,
            Err(e) => self.envelope(None, ErrorResponseType::MalformedRequest, &e.to_string()),
        }
    }

    /// Run a batch read from a file.
    pub async fn run_batch_file(&self, path: &Path) -> String {
        match tokio::fs::read(path).await {
            Ok(bytes) => self.run_batch_bytes(&bytes, None).await,
            Err(e) => self.envelope(
                None,
                ErrorResponseType::MalformedRequest,
                &format!("cannot read {}: {}", path.display(), e),
            ),
        }
    }

    /// Run a batch over an already-connected transport. Used directly by
    /// tests; the public entry points above all funnel through here.
    pub async fn run_batch_on<T: Transport>(&self, transport: T, document: &str) -> String {
        let mut exchange = Exchange::new(transport);

        // Init -> Bound
        if let Err(e) = self.bind(&mut exchange).await {
            warn!("bind failed: {}", e);
            return self.envelope(None, ErrorResponseType::CouldNotConnect, &e.to_string());
        }
        info!("bound as {}", self.config.bind_dn);

        // Parse and validate before anything is sent
        let batch = match parse_batch_request(document).and_then(|batch| {
            batch.validate()?;
            Ok(batch)
        }) {
            Ok(batch) => batch,
            Err(e) => {
                warn!("rejecting batch: {}", e);
                return self.envelope(None, ErrorResponseType::MalformedRequest, &e.to_string());
            }
        };

        let mut doc = self.batch_response_root(batch.request_id.as_deref());

        // Processing -> Exited | Drained
        for (index, request) in batch.requests.iter().enumerate() {
            match self.execute(&mut exchange, request).await {
                Ok((element, result_code)) => {
                    doc.push_child(element);
                    if let Some(code) = result_code {
                        if !code.permits_continuation() && batch.on_error == OnError::Exit {
                            info!(
                                "operation {} finished with {}, exiting batch (onError=exit)",
                                index + 1,
                                code
                            );
                            break;
                        }
                    }
                }
                Err(e) => {
                    // Partial results collected so far are kept.
                    warn!("aborting batch at operation {}: {}", index + 1, e);
                    doc.push_child(error_response(
                        ErrorResponseType::GatewayInternalError,
                        &e.to_string(),
                    ));
                    break;
                }
            }
        }

        // Best-effort unbind so the server sees a clean close.
        let unbind_id = exchange.allocate_id();
        if let Err(e) = exchange.send_request(&ProtocolOp::UnbindRequest, unbind_id).await {
            debug!("unbind failed: {}", e);
        }

        doc.to_document(self.config.pretty)
    }

    async fn bind<T: Transport>(&self, exchange: &mut Exchange<T>) -> Result<()> {
        let op = ProtocolOp::BindRequest {
            version: 3,
            dn: self.config.bind_dn.clone(),
            password: self.config.password.clone(),
        };
        let message_id = exchange.allocate_id();
        exchange.send_request(&op, message_id).await?;
        let message = exchange.next_message().await?;
        match message.protocol_op {
            ProtocolOp::BindResponse { result } => {
                if result.result_code == ResultCode::Success {
                    Ok(())
                } else {
                    Err(GatewayError::BindRejected(format!(
                        "{}: {}",
                        result.result_code, result.diagnostic_message
                    )))
                }
            }
            other => Err(GatewayError::Decoding(format!(
                "expected bindResponse, received {}",
                other.name()
            ))),
        }
    }

    /// Run one request/response exchange and translate the outcome.
    ///
    /// Returns the DSML element for the operation plus the LDAP result code
    /// that feeds the exit-policy check.
    async fn execute<T: Transport>(
        &self,
        exchange: &mut Exchange<T>,
        request: &DsmlRequest,
    ) -> Result<(XmlElement, Option<ResultCode>)> {
        let wire_id = if request.message_id != 0 {
            request.message_id
        } else {
            exchange.allocate_id()
        };

        // An in-batch authRequest carries only the principal; the credential
        // comes from the engine configuration.
        let op = match &request.op {
            ProtocolOp::BindRequest { version, dn, password } if password.is_empty() => {
                ProtocolOp::BindRequest {
                    version: *version,
                    dn: dn.clone(),
                    password: self.config.password.clone(),
                }
            }
            other => other.clone(),
        };

        exchange.send_request(&op, wire_id).await?;

        if matches!(op, ProtocolOp::SearchRequest(_)) {
            self.collect_search_responses(exchange, request.message_id, wire_id)
                .await
        } else {
            let mut message = exchange.next_message().await?;
            if message.message_id != wire_id {
                warn!(
                    expected = wire_id,
                    received = message.message_id,
                    "response message ID does not match request"
                );
            }
            if !response_matches(&op, &message.protocol_op) {
                return Err(GatewayError::Decoding(format!(
                    "received {} in response to {}",
                    message.protocol_op.name(),
                    op.name()
                )));
            }
            let result_code = message.protocol_op.result().map(|r| r.result_code);
            // The output echoes the DSML requestID, never the wire ID the
            // engine assigned on its behalf.
            message.message_id = request.message_id;
            let element = response_to_xml(&message)?;
            Ok((element, result_code))
        }
    }

    /// Drain search responses until the terminating searchResultDone, then
    /// wrap them all under one searchResponse element.
    async fn collect_search_responses<T: Transport>(
        &self,
        exchange: &mut Exchange<T>,
        dsml_id: MessageId,
        wire_id: MessageId,
    ) -> Result<(XmlElement, Option<ResultCode>)> {
        let mut collected = Vec::new();
        let done_code = loop {
            let mut message = exchange.next_message().await?;
            if message.message_id != wire_id {
                warn!(
                    expected = wire_id,
                    received = message.message_id,
                    "search response message ID does not match request"
                );
            }
            message.message_id = dsml_id;
            match &message.protocol_op {
                ProtocolOp::SearchResultEntry { .. } | ProtocolOp::SearchResultReference { .. } => {
                    collected.push(message);
                }
                ProtocolOp::SearchResultDone { result } => {
                    let code = result.result_code;
                    collected.push(message);
                    break code;
                }
                other => {
                    return Err(GatewayError::Decoding(format!(
                        "received {} inside a search exchange",
                        other.name()
                    )));
                }
            }
        };
        debug!(
            responses = collected.len(),
            "search exchange complete with {}", done_code
        );
        let wrapper = search_response_to_xml(dsml_id, &collected)?;
        Ok((wrapper, Some(done_code)))
    }

    fn batch_response_root(&self, request_id: Option<&str>) -> XmlElement {
        let mut root = XmlElement::new("batchResponse").attr("xmlns", DSML_NAMESPACE);
        if let Some(request_id) = request_id {
            root.set_attr("requestID", request_id);
        }
        root
    }

    fn envelope(&self, request_id: Option<&str>, kind: ErrorResponseType, message: &str) -> String {
        self.batch_response_root(request_id)
            .child(error_response(kind, message))
            .to_document(self.config.pretty)
    }
}

fn response_matches(request: &ProtocolOp, response: &ProtocolOp) -> bool {
    matches!(
        (request, response),
        (ProtocolOp::BindRequest { .. }, ProtocolOp::BindResponse { .. })
            | (ProtocolOp::AddRequest { .. }, ProtocolOp::AddResponse { .. })
            | (ProtocolOp::DelRequest { .. }, ProtocolOp::DelResponse { .. })
            | (ProtocolOp::ModifyRequest { .. }, ProtocolOp::ModifyResponse { .. })
            | (
                ProtocolOp::ModifyDnRequest { .. },
                ProtocolOp::ModifyDnResponse { .. }
            )
            | (
                ProtocolOp::CompareRequest { .. },
                ProtocolOp::CompareResponse { .. }
            )
            | (
                ProtocolOp::ExtendedRequest { .. },
                ProtocolOp::ExtendedResponse { .. }
            )
    )
}

/// Decode the raw batch bytes using the declared character encoding.
fn decode_document(bytes: &[u8], encoding: Option<&str>) -> Result<String> {
    let label = encoding.unwrap_or("utf-8").to_ascii_lowercase();
    match label.as_str() {
        "utf-8" | "utf8" => {
            let bytes = bytes.strip_prefix(&[0xef, 0xbb, 0xbf][..]).unwrap_or(bytes);
            String::from_utf8(bytes.to_vec()).map_err(|_| {
                GatewayError::MalformedRequest("document is not valid UTF-8".to_string())
            })
        }
        "iso-8859-1" | "latin1" | "latin-1" => Ok(bytes.iter().map(|&b| b as char).collect()),
        other => Err(GatewayError::MalformedRequest(format!(
            "unsupported character encoding '{}'",
            other
        ))),
    }
}
