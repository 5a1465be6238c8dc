//! HTML reduction for page captures.
//!
//! Raw captures are too large and noisy for reliable interpretation by a
//! human operator or an AI step-interpreter, so this crate strips them to the
//! test-relevant skeleton: no scripts, no styles, no hidden nodes, attributes
//! pruned to a fixed allow-list, text normalized.
//!
//! Both entry points are purely functional and tolerant of malformed markup.

mod reduce;
mod interactive;

pub use interactive::extract_interactive_elements;
pub use reduce::simplify;
