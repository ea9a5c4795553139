use std::fmt;

pub type Forge<T> = Result<T, ForgeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForgeErrorKind {
    MalformedNest,         // E0301: input tree is not a perfect loop nest
    UnsupportedExpression, // E0302: expression node the analyzer cannot classify
    Placement,             // E0303: hoist group with no valid wrapping-loop set
}

impl ForgeErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::MalformedNest => "E0301",
            Self::UnsupportedExpression => "E0302",
            Self::Placement => "E0303",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::MalformedNest => "malformed loop nest",
            Self::UnsupportedExpression => "unsupported expression",
            Self::Placement => "invalid hoist placement",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForgeError {
    pub kind: ForgeErrorKind,
    pub message: String,
    // Offending node, pretty-printed at the point of detection.
    pub node: Option<String>,
    pub notes: Vec<String>,
}

impl ForgeError {
    pub fn new(kind: ForgeErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            node: None,
            notes: Vec::new(),
        }
    }

    pub fn with_node(mut self, node: impl fmt::Display) -> Self {
        self.node = Some(node.to_string());
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for ForgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error[{}]: {}: {}",
            self.kind.code(),
            self.kind.title(),
            self.message
        )?;
        if let Some(node) = &self.node {
            write!(f, "\n    in: {}", node.trim_end())?;
        }
        for n in &self.notes {
            write!(f, "\n    note: {}", n)?;
        }
        Ok(())
    }
}

impl std::error::Error for ForgeError {}

#[macro_export]
macro_rules! bail {
    ($kind:expr, $($arg:tt)*) => {
        return Err($crate::error::ForgeError::new($kind, format!($($arg)*)))
    };
}

#[macro_export]
macro_rules! bail_node {
    ($kind:expr, $node:expr, $($arg:tt)*) => {
        return Err(
            $crate::error::ForgeError::new($kind, format!($($arg)*)).with_node($node)
        )
    };
}
