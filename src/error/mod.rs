//! Error types for every phase: lexing, reading, parsing, compiling and running.
//!
//! Runtime errors deliberately do not print their span as part of the message: the
//! bytecode VM only knows source lines while the tree-walker knows full positions, and
//! both must report the same text for the same failure. Callers render the position
//! from [`RuntimeError::span`].

use crate::interpreter::value::Value;
use crate::span::Span;
use thiserror::Error;

/// Lexer errors.
#[derive(Debug, Error)]
pub enum LexerError {
    #[error("Unexpected character '{0}' at {1}")]
    UnexpectedChar(char, Span),

    #[error("Unterminated string at {0}")]
    UnterminatedString(Span),

    #[error("Invalid escape sequence '\\{0}' at {1}")]
    InvalidEscape(char, Span),

    #[error("Invalid number '{0}' at {1}")]
    InvalidNumber(String, Span),

    #[error("Unsupported character literal '\\{0}' at {1}")]
    InvalidCharacter(String, Span),
}

impl LexerError {
    pub fn unexpected_char(c: char, span: Span) -> Self {
        Self::UnexpectedChar(c, span)
    }

    pub fn unterminated_string(span: Span) -> Self {
        Self::UnterminatedString(span)
    }

    pub fn invalid_escape(c: char, span: Span) -> Self {
        Self::InvalidEscape(c, span)
    }

    pub fn invalid_number(s: impl Into<String>, span: Span) -> Self {
        Self::InvalidNumber(s.into(), span)
    }

    pub fn invalid_character(s: impl Into<String>, span: Span) -> Self {
        Self::InvalidCharacter(s.into(), span)
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedChar(_, span) => *span,
            Self::UnterminatedString(span) => *span,
            Self::InvalidEscape(_, span) => *span,
            Self::InvalidNumber(_, span) => *span,
            Self::InvalidCharacter(_, span) => *span,
        }
    }
}

/// Reader errors: token streams that do not form a datum.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("EOF while reading at {0}")]
    UnexpectedEof(Span),

    #[error("Unmatched delimiter '{0}' at {1}")]
    UnmatchedDelimiter(String, Span),

    #[error("Map literal must contain an even number of forms at {0}")]
    OddMapForms(Span),

    #[error("{0} is not supported at {1}")]
    Unsupported(String, Span),

    #[error("{0}")]
    Lexer(#[from] LexerError),
}

impl ReaderError {
    pub fn unexpected_eof(span: Span) -> Self {
        Self::UnexpectedEof(span)
    }

    pub fn unmatched(delimiter: impl Into<String>, span: Span) -> Self {
        Self::UnmatchedDelimiter(delimiter.into(), span)
    }

    pub fn unsupported(what: impl Into<String>, span: Span) -> Self {
        Self::Unsupported(what.into(), span)
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedEof(span) => *span,
            Self::UnmatchedDelimiter(_, span) => *span,
            Self::OddMapForms(span) => *span,
            Self::Unsupported(_, span) => *span,
            Self::Lexer(err) => err.span(),
        }
    }
}

/// Parser errors: well-formed data that is not a valid program.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("Unexpected form '{found}', expected {expected} at {span}")]
    UnexpectedForm {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("Unable to resolve symbol: {0} in this context at {1}")]
    UnresolvedSymbol(String, Span),

    #[error("Wrong number of args ({got}) passed to {form} at {span}")]
    WrongArity {
        form: String,
        got: usize,
        span: Span,
    },

    #[error("{message} at {span}")]
    General { message: String, span: Span },
}

impl ParserError {
    pub fn unexpected_form(
        expected: impl Into<String>,
        found: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::UnexpectedForm {
            expected: expected.into(),
            found: found.into(),
            span,
        }
    }

    pub fn unresolved_symbol(name: impl Into<String>, span: Span) -> Self {
        Self::UnresolvedSymbol(name.into(), span)
    }

    pub fn wrong_arity(form: impl Into<String>, got: usize, span: Span) -> Self {
        Self::WrongArity {
            form: form.into(),
            got,
            span,
        }
    }

    pub fn general(message: impl Into<String>, span: Span) -> Self {
        Self::General {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedForm { span, .. } => *span,
            Self::UnresolvedSymbol(_, span) => *span,
            Self::WrongArity { span, .. } => *span,
            Self::General { span, .. } => *span,
        }
    }
}

impl From<ReaderError> for ParserError {
    fn from(err: ReaderError) -> Self {
        Self::General {
            message: err.to_string(),
            span: err.span(),
        }
    }
}

impl From<RuntimeError> for ParserError {
    fn from(err: RuntimeError) -> Self {
        Self::General {
            message: format!("Macro expansion failed: {}", err),
            span: err.span(),
        }
    }
}

/// Bytecode compilation errors.
///
/// Every one of these is recoverable: the driver treats a failed compile as
/// "keep this function interpreted".
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("too many constants at {0}")]
    TooManyConstants(Span),

    #[error("too many locals at {0}")]
    TooManyLocals(Span),

    #[error("too many upvalues at {0}")]
    TooManyUpvalues(Span),

    #[error("too many arguments ({0}) at {1}")]
    TooManyArguments(usize, Span),

    #[error("jump too large at {0}")]
    JumpTooLarge(Span),

    #[error("recur used outside of loop at {0}")]
    RecurOutsideLoop(Span),

    #[error("recur expects {expected} args, got {got} at {span}")]
    RecurArity {
        expected: usize,
        got: usize,
        span: Span,
    },

    #[error("unresolved binding '{0}' at {1}")]
    UnresolvedBinding(String, Span),

    #[error("{0} is not supported by the VM at {1}")]
    Unsupported(String, Span),
}

impl CompileError {
    pub fn unsupported(what: impl Into<String>, span: Span) -> Self {
        Self::Unsupported(what.into(), span)
    }

    pub fn unresolved(name: impl Into<String>, span: Span) -> Self {
        Self::UnresolvedBinding(name.into(), span)
    }

    pub fn span(&self) -> Span {
        match self {
            Self::TooManyConstants(span) => *span,
            Self::TooManyLocals(span) => *span,
            Self::TooManyUpvalues(span) => *span,
            Self::TooManyArguments(_, span) => *span,
            Self::JumpTooLarge(span) => *span,
            Self::RecurOutsideLoop(span) => *span,
            Self::RecurArity { span, .. } => *span,
            Self::UnresolvedBinding(_, span) => *span,
            Self::Unsupported(_, span) => *span,
        }
    }
}

/// Runtime errors, shared by the tree-walking evaluator and the bytecode VM.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Wrong number of args ({got}) passed to {name}")]
    WrongArity {
        name: String,
        got: usize,
        span: Span,
    },

    #[error("{type_name} cannot be called as a function")]
    NotCallable { type_name: String, span: Span },

    #[error("Division by zero")]
    DivisionByZero(Span),

    #[error("{message}")]
    TypeError { message: String, span: Span },

    #[error("Unbound var: {0}")]
    UnboundVar(String, Span),

    #[error("Stack overflow")]
    StackOverflow(Span),

    #[error("Stack underflow")]
    StackUnderflow(Span),

    #[error("Too many nested calls (limit {limit})")]
    FrameOverflow { limit: usize, span: Span },

    #[error("Unknown opcode {0}")]
    InvalidOpcode(u8, Span),

    #[error("Step budget of {0} instructions exhausted")]
    StepBudgetExhausted(u64, Span),

    #[error("Index {index} out of bounds for length {length}")]
    IndexOutOfBounds {
        index: i64,
        length: usize,
        span: Span,
    },

    #[error("{message}")]
    Thrown {
        message: String,
        value: Value,
        span: Span,
    },

    #[error("{message}")]
    General { message: String, span: Span },
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self::General {
            message: message.into(),
            span,
        }
    }

    pub fn wrong_arity(name: impl Into<String>, got: usize, span: Span) -> Self {
        Self::WrongArity {
            name: name.into(),
            got,
            span,
        }
    }

    pub fn not_callable(type_name: impl Into<String>, span: Span) -> Self {
        Self::NotCallable {
            type_name: type_name.into(),
            span,
        }
    }

    pub fn division_by_zero(span: Span) -> Self {
        Self::DivisionByZero(span)
    }

    pub fn type_error(message: impl Into<String>, span: Span) -> Self {
        Self::TypeError {
            message: message.into(),
            span,
        }
    }

    pub fn unbound_var(name: impl Into<String>, span: Span) -> Self {
        Self::UnboundVar(name.into(), span)
    }

    pub fn thrown(message: impl Into<String>, value: Value, span: Span) -> Self {
        Self::Thrown {
            message: message.into(),
            value,
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::WrongArity { span, .. } => *span,
            Self::NotCallable { span, .. } => *span,
            Self::DivisionByZero(span) => *span,
            Self::TypeError { span, .. } => *span,
            Self::UnboundVar(_, span) => *span,
            Self::StackOverflow(span) => *span,
            Self::StackUnderflow(span) => *span,
            Self::FrameOverflow { span, .. } => *span,
            Self::InvalidOpcode(_, span) => *span,
            Self::StepBudgetExhausted(_, span) => *span,
            Self::IndexOutOfBounds { span, .. } => *span,
            Self::Thrown { span, .. } => *span,
            Self::General { span, .. } => *span,
        }
    }

    /// Attach a position to an error raised without one (natives and numeric helpers
    /// report `Span::default()`).
    pub fn with_span(mut self, at: Span) -> Self {
        let slot = match &mut self {
            Self::WrongArity { span, .. } => span,
            Self::NotCallable { span, .. } => span,
            Self::DivisionByZero(span) => span,
            Self::TypeError { span, .. } => span,
            Self::UnboundVar(_, span) => span,
            Self::StackOverflow(span) => span,
            Self::StackUnderflow(span) => span,
            Self::FrameOverflow { span, .. } => span,
            Self::InvalidOpcode(_, span) => span,
            Self::StepBudgetExhausted(_, span) => span,
            Self::IndexOutOfBounds { span, .. } => span,
            Self::Thrown { span, .. } => span,
            Self::General { span, .. } => span,
        };
        if slot.line == 0 {
            *slot = at;
        }
        self
    }
}

/// A unified error type for all phases.
#[derive(Debug, Error)]
pub enum JoltError {
    #[error("Lexer error: {0}")]
    Lexer(#[from] LexerError),

    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("Parser error: {0}")]
    Parser(#[from] ParserError),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl JoltError {
    /// Process exit code for the CLI: 65 for bad input, 70 for failures while running.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Lexer(_) | Self::Reader(_) | Self::Parser(_) => 65,
            Self::Compile(_) | Self::Runtime(_) => 70,
            Self::Io(_) => 74,
        }
    }
}
