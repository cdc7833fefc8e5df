use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    /// Error during Newick parsing
    #[error("Parse error at line {line}, column {column}: {message}\nSnippet: \"{snippet}\"")]
    ParseError {
        message: String,
        /// 1-based
        line: usize,
        /// 1-based
        column: usize,
        snippet: String,
    },

    /// The requested node does not exist or was deleted
    #[error("Node {0} not found")]
    NodeNotFound(usize),

    /// Logical error (e.g., invalid operation on the structure)
    #[error("Tree logic error: {0}")]
    LogicError(String),
}
