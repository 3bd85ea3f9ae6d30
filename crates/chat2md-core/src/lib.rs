//! Core chat2md library (transcript model, markdown rendering pipeline).

pub mod combine;
pub mod config;
pub mod document;
pub mod extract;
pub mod fences;
pub mod format;
pub mod join;
pub mod lang;
pub mod pipeline;
pub mod text_edit;
pub mod tool_call;
pub mod transcript;
