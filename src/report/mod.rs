//! Markdown report output.

pub mod markdown;

pub use markdown::write_markdown_file;
