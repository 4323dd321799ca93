pub mod variable_resolver;

pub use variable_resolver::{extract_placeholders, resolve_json, resolve_text};
