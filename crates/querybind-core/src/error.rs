//! Parser error reporting
//!
//! Lexer-level syntax errors and builder-level semantic errors share one
//! shape, so callers can surface either with a caret pointing into the
//! statement text.
//!
//! The category labels returned by `ErrorKind::as_str` are shown to users.
//! Do not rename them.

use serde::{Deserialize, Serialize};

/// Error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Raised by the tokenizer/grammar before any binding happens
    Syntax,

    /// Unresolved table, field or ORDER BY target
    Reference,

    /// A name or alias that maps to more than one FROM position
    Ambiguity,

    /// A column-list item of a shape the builder does not accept
    Shape,

    /// Internal invariant violation, never an end-user mistake
    Implementation,

    /// Missing or empty input
    Input,
}

impl ErrorKind {
    /// User-facing category label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Syntax => "Syntax Error",
            Self::Reference => "Reference Error",
            Self::Ambiguity => "Ambiguity Error",
            Self::Shape => "Field List Error",
            Self::Implementation => "Implementation error",
            Self::Input => "Error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The single error recorded for a parse attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserError {
    /// Category
    pub kind: ErrorKind,

    /// Human-readable message, intended for direct display
    pub message: String,

    /// Optional longer explanation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    /// Offending token text (may be empty)
    #[serde(default)]
    pub token: String,

    /// Character offset of the offending token within the statement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

impl ParserError {
    /// Create a new error without location
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            token: String::new(),
            position: None,
        }
    }

    /// Syntax error
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, message)
    }

    /// Unresolved reference
    pub fn reference(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Reference, message)
    }

    /// Ambiguous reference
    pub fn ambiguity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Ambiguity, message)
    }

    /// Invalid column-list shape
    pub fn shape(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Shape, message)
    }

    /// Internal invariant violation
    pub fn implementation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Implementation, message)
    }

    /// Set the longer explanation
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Set token and position
    pub fn at(mut self, token: impl Into<String>, position: Option<usize>) -> Self {
        self.token = token.into();
        self.position = position;
        self
    }

    /// Set token and position unless already located
    pub fn or_at(self, token: impl Into<String>, position: Option<usize>) -> Self {
        if self.position.is_some() {
            self
        } else {
            self.at(token, position)
        }
    }

    /// Whether the error should be shown as an ordinary user mistake
    pub fn is_user_error(&self) -> bool {
        self.kind != ErrorKind::Implementation
    }

    /// Caret line pointing at `position`, e.g. `"       ^"`
    pub fn pointer_line(&self) -> Option<String> {
        self.position.map(|pos| format!("{}^", " ".repeat(pos)))
    }

    /// Statement text followed by a caret line, when the position is known
    pub fn render(&self, statement: &str) -> String {
        let mut out = format!("{}\n", self);
        if let Some(pointer) = self.pointer_line() {
            // Carets only line up on single-line statements
            let flat: String = statement
                .chars()
                .map(|c| if c == '\n' || c == '\r' || c == '\t' { ' ' } else { c })
                .collect();
            out.push_str(&flat);
            out.push('\n');
            out.push_str(&pointer);
            out.push('\n');
        }
        out
    }
}

impl std::fmt::Display for ParserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(details) = &self.details {
            write!(f, ". {}", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParserError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(ErrorKind::Syntax.as_str(), "Syntax Error");
        assert_eq!(ErrorKind::Shape.as_str(), "Field List Error");
        assert_eq!(ErrorKind::Implementation.as_str(), "Implementation error");
    }

    #[test]
    fn display_includes_details() {
        let err = ParserError::ambiguity("Ambiguous \"t.*\" expression")
            .with_details("More than one \"t\" table or alias defined");

        assert_eq!(
            err.to_string(),
            "Ambiguity Error: Ambiguous \"t.*\" expression. More than one \"t\" table or alias defined"
        );
    }

    #[test]
    fn render_points_at_position() {
        let err = ParserError::syntax("Syntax Error near \"FORM\"").at("FORM", Some(9));
        let rendered = err.render("SELECT * FORM t");

        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[1], "SELECT * FORM t");
        assert_eq!(lines[2], "         ^");
    }

    #[test]
    fn or_at_keeps_existing_location() {
        let err = ParserError::reference("x").at("a", Some(3)).or_at("b", Some(7));
        assert_eq!(err.token, "a");
        assert_eq!(err.position, Some(3));

        let err = ParserError::reference("x").or_at("b", Some(7));
        assert_eq!(err.position, Some(7));
    }

    #[test]
    fn error_serialization() {
        let err = ParserError::reference("Table \"x\" does not exist").at("x", Some(14));

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"reference\""));
        assert!(json.contains("\"position\":14"));
        assert!(!json.contains("details"));
    }
}
