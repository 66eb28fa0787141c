//! Turning model replies into document actions: marker parsing, content cleanup,
//! annotated regions and the executor that applies them.

pub mod annotation;
pub mod executor;
pub mod parser;
pub mod sanitizer;

pub use executor::{validate_removal, MutationExecutor, DEFAULT_NEW_FILE, NO_ACTIVE_FILE};
pub use parser::{IntentParser, MarkerParser, ParsedResponse};
pub use sanitizer::sanitize_content;
