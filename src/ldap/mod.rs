pub mod ber;
pub mod codec;
pub mod protocol;
pub mod stream;

pub use protocol::{LdapMessage, MessageId, ProtocolOp, ResultCode};
pub use stream::StreamDecoder;
