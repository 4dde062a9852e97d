//! docchat - document-grounded chat over a streaming response body
//!
//! A response body arrives as newline-delimited `data: ` frames. The stream
//! decoder turns chunks into frames, the router folds each frame into the
//! conversation, and the turn controller runs one turn at a time against a
//! [`runtime::Transport`].

pub mod config;
pub mod document;
pub mod error;
pub mod runtime;
pub mod state_machine;
pub mod stream;
