use self::codec::Codec;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

pub mod codec;
pub mod types;

pub use types::Frame;

pub fn framed<C: AsyncRead + AsyncWrite>(conn: C) -> Framed<C, Codec> {
    Framed::new(conn, Codec::default())
}
