use std::fmt::{Display, Error, Formatter};

// Encode error
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum EncodeError {
    CapacityExceeded,
    UnsupportedCharacter,
    InvalidVersion,
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        let msg = match *self {
            Self::CapacityExceeded => "Data doesn't fit in any version at the requested level",
            Self::UnsupportedCharacter => "Character can't be represented in the chosen charset",
            Self::InvalidVersion => "Version must be between 1 and 40",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for EncodeError {}

pub type EncodeResult<T> = Result<T, EncodeError>;

// Decode error
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum DecodeError {
    FinderPatternNotFound,
    LowQualityImage,
    FormatInfoCorrupt,
    UncorrectableBlock,
    MalformedSegment,
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        let msg = match *self {
            Self::FinderPatternNotFound => "No usable finder pattern triple found",
            Self::LowQualityImage => "Image contrast too low to locate a symbol",
            Self::FormatInfoCorrupt => "Both format info copies are unreadable",
            Self::UncorrectableBlock => "Too many errors to correct successfully",
            Self::MalformedSegment => "Invalid mode indicator or segment overruns the stream",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for DecodeError {}

pub type DecodeResult<T> = Result<T, DecodeError>;

// Primitive errors
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum StreamError {
    OutOfData,
}

impl Display for StreamError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        f.write_str("Bit stream exhausted")
    }
}

impl std::error::Error for StreamError {}

impl From<StreamError> for DecodeError {
    fn from(_: StreamError) -> Self {
        Self::MalformedSegment
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum FieldError {
    DivisionByZero,
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        f.write_str("Division by zero in GF(256)")
    }
}

impl std::error::Error for FieldError {}

impl From<FieldError> for DecodeError {
    fn from(_: FieldError) -> Self {
        Self::UncorrectableBlock
    }
}

// Style error
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum StyleError {
    InvalidColor,
    ModuleSizeOutOfRange,
    MarginOutOfRange,
    LowContrast,
}

impl Display for StyleError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        let msg = match *self {
            Self::InvalidColor => "Color must be #rrggbb, rrggbb or #rgb",
            Self::ModuleSizeOutOfRange => "Module size must be between 1 and 64 pixels",
            Self::MarginOutOfRange => "Margin must be between 0 and 8 modules",
            Self::LowContrast => "Foreground and background are too similar to scan",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for StyleError {}
