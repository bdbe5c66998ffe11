use std::error::Error as StdError;
use std::ffi::CStr;
use std::fmt;
use std::path::PathBuf;

/// Stable integer codes reported across the ABI. Discriminants never change once shipped.
#[repr(i32)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorCode {
    Success = 0,
    Capacity = 1,
    MemAlloc = 2,
    TapeError = 3,
    DepthError = 4,
    StringError = 5,
    TAtomError = 6,
    FAtomError = 7,
    NAtomError = 8,
    NumberError = 9,
    Utf8Error = 10,
    Uninitialized = 11,
    Empty = 12,
    UnescapedChars = 13,
    UnclosedString = 14,
    IncorrectType = 15,
    NumberOutOfRange = 16,
    IndexOutOfBounds = 17,
    NoSuchField = 18,
    IoError = 19,
    InvalidJsonPointer = 20,
    UnexpectedError = 21,
    IncompleteArrayOrObject = 22,
    TrailingContent = 23,
}

pub const NUM_ERROR_CODES: i32 = 24;

const UNKNOWN_MESSAGE: &CStr = c"Unknown error code";

impl ErrorCode {
    pub const ALL: [ErrorCode; NUM_ERROR_CODES as usize] = [
        ErrorCode::Success,
        ErrorCode::Capacity,
        ErrorCode::MemAlloc,
        ErrorCode::TapeError,
        ErrorCode::DepthError,
        ErrorCode::StringError,
        ErrorCode::TAtomError,
        ErrorCode::FAtomError,
        ErrorCode::NAtomError,
        ErrorCode::NumberError,
        ErrorCode::Utf8Error,
        ErrorCode::Uninitialized,
        ErrorCode::Empty,
        ErrorCode::UnescapedChars,
        ErrorCode::UnclosedString,
        ErrorCode::IncorrectType,
        ErrorCode::NumberOutOfRange,
        ErrorCode::IndexOutOfBounds,
        ErrorCode::NoSuchField,
        ErrorCode::IoError,
        ErrorCode::InvalidJsonPointer,
        ErrorCode::UnexpectedError,
        ErrorCode::IncompleteArrayOrObject,
        ErrorCode::TrailingContent,
    ];

    pub fn from_i32(code: i32) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn message(self) -> &'static CStr {
        match self {
            ErrorCode::Success => c"No error",
            ErrorCode::Capacity => c"This parser can't support a document that big",
            ErrorCode::MemAlloc => c"Error allocating memory, we're most likely out of memory",
            ErrorCode::TapeError => c"The JSON document has an improper structure: missing or superfluous commas, braces, missing keys, etc.",
            ErrorCode::DepthError => c"The JSON document was too deep (too many nested objects and arrays)",
            ErrorCode::StringError => c"Problem while parsing a string",
            ErrorCode::TAtomError => c"Problem while parsing an atom starting with the letter 't'",
            ErrorCode::FAtomError => c"Problem while parsing an atom starting with the letter 'f'",
            ErrorCode::NAtomError => c"Problem while parsing an atom starting with the letter 'n'",
            ErrorCode::NumberError => c"Problem while parsing a number",
            ErrorCode::Utf8Error => c"The input is not valid UTF-8",
            ErrorCode::Uninitialized => c"Uninitialized: a null handle was passed",
            ErrorCode::Empty => c"Empty: no JSON found",
            ErrorCode::UnescapedChars => c"Within strings, some characters must be escaped, we found unescaped characters",
            ErrorCode::UnclosedString => c"A string is opened, but never closed.",
            ErrorCode::IncorrectType => c"The JSON element does not have the requested type.",
            ErrorCode::NumberOutOfRange => c"The JSON number is too large or too small to fit within the requested type.",
            ErrorCode::IndexOutOfBounds => c"Attempted to access an element of a JSON array that is beyond its length.",
            ErrorCode::NoSuchField => c"The JSON field referenced does not exist in this object.",
            ErrorCode::IoError => c"Error reading the file.",
            ErrorCode::InvalidJsonPointer => c"Invalid JSON pointer syntax.",
            ErrorCode::UnexpectedError => c"Unexpected error, consider reporting this problem as you may have found a bug",
            ErrorCode::IncompleteArrayOrObject => c"The document ends early: an array or object was left unclosed.",
            ErrorCode::TrailingContent => c"Unexpected trailing content after the JSON document.",
        }
    }
}

/// Message for a raw code; codes outside the table get a fixed placeholder.
pub fn message_for(code: i32) -> &'static CStr {
    ErrorCode::from_i32(code)
        .map(ErrorCode::message)
        .unwrap_or(UNKNOWN_MESSAGE)
}

#[derive(Debug)]
pub struct Error {
    code: ErrorCode,
    message: Option<String>,
    path: Option<PathBuf>,
    offset: Option<u64>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: None,
            path: None,
            offset: None,
            source: None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn path(&self) -> Option<&std::path::Path> {
        self.path.as_deref()
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl From<ErrorCode> for Error {
    fn from(code: ErrorCode) -> Self {
        Error::new(code)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.code)?;
        match &self.message {
            Some(message) => write!(f, ": {message}")?,
            None => write!(f, ": {}", self.code.message().to_string_lossy())?,
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        if let Some(offset) = self.offset {
            write!(f, " (offset: {offset})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}
