pub mod parser;
pub mod translate;
pub mod xml;

pub use parser::{parse_batch_request, BatchRequest, DsmlRequest, OnError, Processing, ResponseOrder};
pub use translate::{error_response, response_to_xml, search_response_to_xml, ErrorResponseType};
pub use xml::XmlElement;
