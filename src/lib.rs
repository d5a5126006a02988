pub mod completion;
pub mod config;
pub mod document;
pub mod editor;
pub mod logging;
pub mod metadata;
pub mod parsers;
pub mod project;
