//! Payment formatting primitives.
//!
//! Free-form text goes in, an ordered list of account identifiers comes out,
//! and each identifier is paired with the amount supplied by the user:
//!
//! ```text
//! "6486714430 Got Invited By Your Url: +3 Rs"  →  ["6486714430"]
//! (["6486714430"], "2.1")                      →  "6486714430 2.1"
//! ```

pub mod extract;
pub mod format;

pub use extract::{extract_identifiers, is_identifier_token, MIN_IDENTIFIER_DIGITS};
pub use format::format_payment_lines;
