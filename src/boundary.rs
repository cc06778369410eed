//! Multipart boundary generation and validation.
//!
//! Generated boundaries are 30 characters drawn uniformly from a 64-symbol
//! alphabet. Each call seeds its own generator from OS entropy, so builders
//! constructed concurrently never share random state.

use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Symbols a generated boundary is drawn from.
pub const BOUNDARY_ALPHABET: &[u8; 64] =
    b"-_0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of a generated boundary.
pub const BOUNDARY_LEN: usize = 30;

/// Longest boundary RFC 2046 allows.
const MAX_BOUNDARY_LEN: usize = 70;

/// Generates a fresh boundary from a newly seeded generator.
pub fn generate_boundary() -> String {
    let mut rng = StdRng::from_entropy();
    generate_boundary_with(&mut rng)
}

/// Generates a boundary from the given random source.
pub fn generate_boundary_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..BOUNDARY_LEN)
        .map(|_| BOUNDARY_ALPHABET[rng.gen_range(0..BOUNDARY_ALPHABET.len())] as char)
        .collect()
}

/// Checks a caller-supplied boundary against RFC 2046.
pub fn validate_boundary(boundary: &str) -> Result<()> {
    if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LEN {
        return Err(Error::InvalidBoundary(format!(
            "length must be 1-{} characters, got {}",
            MAX_BOUNDARY_LEN,
            boundary.len()
        )));
    }
    if let Some(bad) = boundary.chars().find(|&c| !is_bchar(c)) {
        return Err(Error::InvalidBoundary(format!(
            "invalid boundary character: {:?}",
            bad
        )));
    }
    if boundary.ends_with(' ') {
        return Err(Error::InvalidBoundary(
            "boundary must not end with a space".to_string(),
        ));
    }
    Ok(())
}

/// bchars := bcharsnospace / " "
fn is_bchar(c: char) -> bool {
    c == ' ' || is_bchar_nospace(c)
}

/// bcharsnospace := DIGIT / ALPHA / "'" / "(" / ")" / "+" / "_" / "," / "-" / "." / "/" / ":" / "=" / "?"
fn is_bchar_nospace(c: char) -> bool {
    c.is_ascii_alphanumeric() || "'()+_,-./:=?".contains(c)
}

/// Formats the boundary as a `boundary=` parameter value, quoting it when it
/// is not a plain MIME token.
pub(crate) fn format_boundary_param(boundary: &str) -> String {
    if boundary.chars().all(is_token_char) {
        boundary.to_string()
    } else {
        format!("\"{}\"", boundary)
    }
}

/// token := 1*<any (US-ASCII) CHAR except SPACE, CTLs, or tspecials>
fn is_token_char(c: char) -> bool {
    c > '\x20'
        && c < '\x7f'
        && !matches!(
            c,
            '(' | ')' | '<' | '>' | '@' | ',' | ';' | ':' | '\\' | '"' | '/' | '[' | ']' | '?' | '='
        )
}
