//! Lock-free primitives shared by the producer and sink threads: the
//! byte-addressed SPSC ring buffer, inline format converters, the
//! upstream pipe reader, and the hot-path async log ring.

pub mod convert;
pub mod error;
pub mod format;
pub mod logring;
pub mod pipereader;
pub mod ring;
#[cfg(unix)]
pub mod rtprio;
pub mod spsc;

pub use convert::{DsdConversionMode, S24Align};
pub use error::{CoreError, Result};
pub use format::{AudioFormat, ClockFamily, DsdCarrier, DsdEndianness, FormatHeader, FORMAT_HEADER_LEN, FORMAT_HEADER_MAGIC};
pub use pipereader::PipeReader;
pub use ring::RingBuffer;
