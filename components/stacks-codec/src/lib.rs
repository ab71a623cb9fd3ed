#[macro_use]
mod macros;

pub mod codec;

pub use codec::{BitVec, CodecError, StacksMessageCodec};
