//! Error handling foundation for chatbridge.
//!
//! Only the `Result` alias lives here. Each crate defines its own error
//! enum in its `error` module and wraps it in a rootcause `Report` at its
//! public boundary.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_alias_carries_values() {
        let ok: Result<&str> = Ok("turn");
        assert_eq!(ok.expect("should be ok"), "turn");
    }
}
