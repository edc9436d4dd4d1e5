//! Runtime exceptions.

use std::fmt;

use makrell_foundation::{Error, ErrorKind};
use thiserror::Error;

use super::value::Value;

/// Built-in exception classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    /// Root of the hierarchy.
    Exception,
    /// Right type, wrong value.
    ValueError,
    /// Operation applied to an unsupported type.
    TypeError,
    /// Missing mapping key.
    KeyError,
    /// Sequence index out of range.
    IndexError,
    /// Division or modulo by zero.
    ZeroDivisionError,
    /// Failed assertion.
    AssertionError,
    /// Unbound name.
    NameError,
    /// Missing attribute.
    AttributeError,
    /// Any other runtime failure.
    RuntimeError,
    /// Exhausted iterator.
    StopIteration,
    /// Unimplemented operation.
    NotImplementedError,
    /// Integer overflow.
    OverflowError,
    /// Call nesting too deep.
    RecursionError,
    /// Unknown module.
    ImportError,
}

impl ExceptionKind {
    /// Every kind, parents before children.
    pub const ALL: [Self; 15] = [
        Self::Exception,
        Self::ValueError,
        Self::TypeError,
        Self::KeyError,
        Self::IndexError,
        Self::ZeroDivisionError,
        Self::AssertionError,
        Self::NameError,
        Self::AttributeError,
        Self::RuntimeError,
        Self::StopIteration,
        Self::NotImplementedError,
        Self::OverflowError,
        Self::RecursionError,
        Self::ImportError,
    ];

    /// Class name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Exception => "Exception",
            Self::ValueError => "ValueError",
            Self::TypeError => "TypeError",
            Self::KeyError => "KeyError",
            Self::IndexError => "IndexError",
            Self::ZeroDivisionError => "ZeroDivisionError",
            Self::AssertionError => "AssertionError",
            Self::NameError => "NameError",
            Self::AttributeError => "AttributeError",
            Self::RuntimeError => "RuntimeError",
            Self::StopIteration => "StopIteration",
            Self::NotImplementedError => "NotImplementedError",
            Self::OverflowError => "OverflowError",
            Self::RecursionError => "RecursionError",
            Self::ImportError => "ImportError",
        }
    }

    /// Parent class, `None` for the root.
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::Exception => None,
            Self::NotImplementedError | Self::RecursionError => Some(Self::RuntimeError),
            _ => Some(Self::Exception),
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An exception propagating through the interpreter.
#[derive(Clone, Debug, Error)]
pub enum RuntimeError {
    /// Raised by the interpreter or a native function.
    #[error("{kind}: {message}")]
    Builtin {
        /// Exception class.
        kind: ExceptionKind,
        /// Message.
        message: String,
    },
    /// Raised by program code.
    #[error("{}: {}", .0.exception_class_name(), .0.exception_message())]
    Raised(Value),
}

impl RuntimeError {
    /// Creates a built-in exception.
    #[must_use]
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self::Builtin {
            kind,
            message: message.into(),
        }
    }

    /// A `TypeError`.
    #[must_use]
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::TypeError, message)
    }

    /// A `ValueError`.
    #[must_use]
    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::ValueError, message)
    }

    /// A `NameError` for an unbound name.
    #[must_use]
    pub fn name_error(name: &str) -> Self {
        Self::new(ExceptionKind::NameError, format!("name '{name}' is not defined"))
    }

    /// An `AttributeError`.
    #[must_use]
    pub fn attribute_error(type_name: &str, attr: &str) -> Self {
        Self::new(
            ExceptionKind::AttributeError,
            format!("'{type_name}' object has no attribute '{attr}'"),
        )
    }

    /// Exception class name.
    #[must_use]
    pub fn class_name(&self) -> String {
        match self {
            Self::Builtin { kind, .. } => kind.name().to_string(),
            Self::Raised(value) => value.exception_class_name(),
        }
    }

    /// Exception message.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Builtin { message, .. } => message.clone(),
            Self::Raised(value) => value.exception_message(),
        }
    }

    /// Returns true for a `StopIteration` of either origin.
    #[must_use]
    pub fn is_stop_iteration(&self) -> bool {
        self.class_name() == ExceptionKind::StopIteration.name()
    }
}

impl From<RuntimeError> for Error {
    fn from(err: RuntimeError) -> Self {
        Self::new(ErrorKind::Uncaught {
            class: err.class_name(),
            message: err.message(),
        })
    }
}
