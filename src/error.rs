use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    BadPath,
    ParameterInPath,
    MissingArgument,
    BadTriggerInput,
    WrongReferenceKind,
    DeleteConfirmationRequired,
    BatchFull,
    UnsupportedQueryOption,
    NotFound,
    TransactionConflict,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadPath => "firesugar/bad-path",
            ErrorCode::ParameterInPath => "firesugar/parameter-in-path",
            ErrorCode::MissingArgument => "firesugar/missing-argument",
            ErrorCode::BadTriggerInput => "firesugar/bad-trigger-input",
            ErrorCode::WrongReferenceKind => "firesugar/wrong-reference-kind",
            ErrorCode::DeleteConfirmationRequired => "firesugar/delete-confirmation-required",
            ErrorCode::BatchFull => "firesugar/batch-full",
            ErrorCode::UnsupportedQueryOption => "firesugar/unsupported-query-option",
            ErrorCode::NotFound => "firesugar/not-found",
            ErrorCode::TransactionConflict => "firesugar/transaction-conflict",
            ErrorCode::Internal => "firesugar/internal",
        }
    }
}

#[derive(Clone, Debug)]
pub struct SugarError {
    pub code: ErrorCode,
    message: String,
}

impl SugarError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for SugarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl Error for SugarError {}

pub type SugarResult<T> = Result<T, SugarError>;

pub fn bad_path(message: impl Into<String>) -> SugarError {
    SugarError::new(ErrorCode::BadPath, message)
}

pub fn parameter_in_path(message: impl Into<String>) -> SugarError {
    SugarError::new(ErrorCode::ParameterInPath, message)
}

pub fn missing_argument(message: impl Into<String>) -> SugarError {
    SugarError::new(ErrorCode::MissingArgument, message)
}

pub fn bad_trigger_input(message: impl Into<String>) -> SugarError {
    SugarError::new(ErrorCode::BadTriggerInput, message)
}

pub fn wrong_reference_kind(message: impl Into<String>) -> SugarError {
    SugarError::new(ErrorCode::WrongReferenceKind, message)
}

pub fn delete_confirmation_required(message: impl Into<String>) -> SugarError {
    SugarError::new(ErrorCode::DeleteConfirmationRequired, message)
}

pub fn batch_full(message: impl Into<String>) -> SugarError {
    SugarError::new(ErrorCode::BatchFull, message)
}

pub fn unsupported_query_option(message: impl Into<String>) -> SugarError {
    SugarError::new(ErrorCode::UnsupportedQueryOption, message)
}

pub fn not_found(message: impl Into<String>) -> SugarError {
    SugarError::new(ErrorCode::NotFound, message)
}

pub fn transaction_conflict(message: impl Into<String>) -> SugarError {
    SugarError::new(ErrorCode::TransactionConflict, message)
}

pub fn internal(message: impl Into<String>) -> SugarError {
    SugarError::new(ErrorCode::Internal, message)
}
