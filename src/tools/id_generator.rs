//! Request ids for log correlation.
//!
//! Ids are lowercase Crockford base32 (no `i`, `l`, `o` or `u`), so they read
//! back unambiguously from a log line and are safe in URLs and file names.

const REQUEST_ID_ALPHABET: [char; 32] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'j',
    'k', 'm', 'n', 'p', 'q', 'r', 's', 't', 'v', 'w', 'x', 'y', 'z',
];

/// Length of generated request ids (80 bits).
pub const REQUEST_ID_LEN: usize = 16;

pub fn generate_request_id() -> String {
    nanoid::format(nanoid::rngs::default, &REQUEST_ID_ALPHABET, REQUEST_ID_LEN)
}
