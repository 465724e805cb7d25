//! Error types for bootflash-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate. Every variant maps onto one [`ErrorKind`], the
//! coarse taxonomy callers usually branch on.

use core::fmt;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A flash I/O primitive or the SPI transport failed
    Transport,
    /// Flash content differs from the expected data
    VerifyMismatch,
    /// Device geometry is incompatible with the engine's buffers
    Configuration,
    /// The scratch arena is exhausted
    OutOfMemory,
    /// A parameter was malformed or out of range
    InvalidArgument,
    /// The requested operation is not implemented for this device
    Unsupported,
    /// No usable flash device was found
    Detection,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Transport errors
    /// SPI transfer failed
    SpiTransferFailed,
    /// Flash stayed busy longer than the polling budget
    Timeout,
    /// Read primitive failed
    ReadError {
        /// Linear address of the failed read
        addr: u32,
    },
    /// Page program primitive failed
    WriteError {
        /// Linear address of the failed page write
        addr: u32,
    },
    /// Erase primitive failed
    EraseError {
        /// Linear address of the failed erase
        addr: u32,
    },

    /// Flash content does not match the expected data
    VerifyMismatch {
        /// Linear address of the first differing byte
        addr: u32,
        /// Byte the caller expected
        expected: u8,
        /// Byte read back from flash
        found: u8,
    },

    // Configuration errors
    /// Device page does not fit into the staging buffer
    PageSizeExceedsBuffer {
        /// Page size of the device
        page_size: u32,
        /// Size of the staging buffer
        buffer_size: usize,
    },
    /// Device geometry is inconsistent (zero or non power of two sizes)
    InvalidGeometry,

    /// Arena has not enough room left
    OutOfMemory {
        /// Bytes requested
        requested: usize,
        /// Bytes still free
        available: usize,
    },

    // Argument errors
    /// Bit index outside of a bit vector
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Length of the vector in bits
        len: usize,
    },
    /// Range extends beyond the device
    AddressOutOfBounds,
    /// Malformed argument
    InvalidArgument,

    /// Operation not implemented (chip erase, page erase without opcode)
    Unsupported,

    // Detection errors
    /// No flash answered the JEDEC ID request
    ChipNotFound,
    /// A flash answered but does not describe itself through SFDP
    ChipNotSupported,
}

impl Error {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SpiTransferFailed
            | Self::Timeout
            | Self::ReadError { .. }
            | Self::WriteError { .. }
            | Self::EraseError { .. } => ErrorKind::Transport,
            Self::VerifyMismatch { .. } => ErrorKind::VerifyMismatch,
            Self::PageSizeExceedsBuffer { .. } | Self::InvalidGeometry => {
                ErrorKind::Configuration
            }
            Self::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            Self::IndexOutOfBounds { .. } | Self::AddressOutOfBounds | Self::InvalidArgument => {
                ErrorKind::InvalidArgument
            }
            Self::Unsupported => ErrorKind::Unsupported,
            Self::ChipNotFound | Self::ChipNotSupported => ErrorKind::Detection,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpiTransferFailed => write!(f, "SPI transfer failed"),
            Self::Timeout => write!(f, "flash busy timeout"),
            Self::ReadError { addr } => write!(f, "read failed at address 0x{:08X}", addr),
            Self::WriteError { addr } => write!(f, "write failed at address 0x{:08X}", addr),
            Self::EraseError { addr } => write!(f, "erase failed at address 0x{:08X}", addr),
            Self::VerifyMismatch {
                addr,
                expected,
                found,
            } => write!(
                f,
                "verify error at offset 0x{:08X}: expected 0x{:02X}, found 0x{:02X}",
                addr, expected, found
            ),
            Self::PageSizeExceedsBuffer {
                page_size,
                buffer_size,
            } => write!(
                f,
                "page size {} exceeds staging buffer of {} bytes",
                page_size, buffer_size
            ),
            Self::InvalidGeometry => write!(f, "invalid flash geometry"),
            Self::OutOfMemory {
                requested,
                available,
            } => write!(
                f,
                "arena exhausted: requested {} bytes, {} available",
                requested, available
            ),
            Self::IndexOutOfBounds { index, len } => {
                write!(f, "bit index {} out of bounds (length {})", index, len)
            }
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::Unsupported => write!(f, "operation not supported"),
            Self::ChipNotFound => write!(f, "flash chip not found"),
            Self::ChipNotSupported => write!(f, "flash chip not supported"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(Error::EraseError { addr: 0 }.kind(), ErrorKind::Transport);
        assert_eq!(Error::Timeout.kind(), ErrorKind::Transport);
        assert_eq!(
            Error::VerifyMismatch {
                addr: 1,
                expected: 0xAA,
                found: 0x55
            }
            .kind(),
            ErrorKind::VerifyMismatch
        );
        assert_eq!(
            Error::PageSizeExceedsBuffer {
                page_size: 16384,
                buffer_size: 8192
            }
            .kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::OutOfMemory {
                requested: 8,
                available: 4
            }
            .kind(),
            ErrorKind::OutOfMemory
        );
        assert_eq!(
            Error::IndexOutOfBounds { index: 9, len: 8 }.kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(Error::Unsupported.kind(), ErrorKind::Unsupported);
        assert_eq!(Error::ChipNotFound.kind(), ErrorKind::Detection);
    }

    #[test]
    fn test_display_verify_mismatch() {
        let err = Error::VerifyMismatch {
            addr: 0x1234,
            expected: 0xAA,
            found: 0x00,
        };
        assert_eq!(
            err.to_string(),
            "verify error at offset 0x00001234: expected 0xAA, found 0x00"
        );
    }
}
