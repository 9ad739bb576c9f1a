use crate::errors::DomainError;

/// Renders one `<identifier> <amount>` line per identifier, joined by `\n`.
///
/// The amount is passed through verbatim; it is not required to parse as a number.
pub fn format_payment_lines<S>(identifiers: &[S], amount: &str) -> Result<String, DomainError>
where
    S: AsRef<str>,
{
    if identifiers.is_empty() {
        return Err(DomainError::InvariantViolation(
            "payment formatting requires at least one identifier".to_owned(),
        ));
    }

    Ok(identifiers
        .iter()
        .map(|identifier| format!("{} {amount}", identifier.as_ref()))
        .collect::<Vec<_>>()
        .join("\n"))
}
