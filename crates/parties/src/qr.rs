//! Public lookup codes and the text encoded in a client's QR card.
//!
//! Card content layout (one field per line after the header):
//!
//! ```text
//! CLIENTE_CODE|{public code}|{full name}
//! {sale count}
//! {sales total}
//! ```

use caravan_core::{DomainError, DomainResult, Money};
use uuid::Uuid;

/// Header tag of QR card content.
pub const QR_PREFIX: &str = "CLIENTE_CODE";

const CODE_LEN: usize = 10;

/// Generate a fresh public code such as `C-AB12CD34EF`.
///
/// Built from the random tail of a UUIDv7, so it reveals neither the record
/// id nor the creation time.
pub fn generate_public_code() -> String {
    let hex = Uuid::now_v7().simple().to_string().to_uppercase();
    format!("C-{}", &hex[hex.len() - CODE_LEN..])
}

/// Build QR card content for a client.
pub fn qr_content(public_code: &str, full_name: &str, sale_count: usize, sales_total: Money) -> String {
    let safe_name = full_name.replace('|', "-");
    format!("{QR_PREFIX}|{public_code}|{safe_name}\n{sale_count}\n{sales_total}")
}

/// Extract the public code from QR card content, if it has the expected header.
pub fn extract_public_code(content: &str) -> Option<String> {
    let header = content.lines().next()?;
    let mut parts = header.split('|');
    if parts.next()? != QR_PREFIX {
        return None;
    }
    let code = parts.next()?.trim();
    (!code.is_empty()).then(|| code.to_string())
}

/// What the operator typed or scanned into the lookup box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupQuery {
    public_code: String,
}

impl LookupQuery {
    /// Accepts either full QR content or a bare public code.
    pub fn parse(input: &str) -> DomainResult<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(DomainError::validation("enter a QR code or a client code"));
        }

        let header_len = QR_PREFIX.len() + 1;
        let is_qr = input
            .get(..header_len)
            .is_some_and(|h| h.eq_ignore_ascii_case(&format!("{QR_PREFIX}|")));

        let public_code = if is_qr {
            // Normalize the header casing before extracting.
            let normalized = format!("{QR_PREFIX}|{}", &input[header_len..]);
            extract_public_code(&normalized)
        } else {
            Some(input.to_string())
        };

        match public_code {
            Some(public_code) => Ok(Self { public_code }),
            None => Err(DomainError::validation(
                "unrecognized code format; use the QR content or the client's public code",
            )),
        }
    }

    pub fn public_code(&self) -> &str {
        &self.public_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_have_expected_shape() {
        let code = generate_public_code();
        assert_eq!(code.len(), 2 + CODE_LEN);
        assert!(code.starts_with("C-"));
        assert!(code[2..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        assert_ne!(code, generate_public_code());
    }

    #[test]
    fn content_layout_and_pipe_escaping() {
        let content = qr_content("C-0000000001", "Ana|Pereyra", 2, Money::from_units(3000));
        assert_eq!(content, "CLIENTE_CODE|C-0000000001|Ana-Pereyra\n2\n3000.00");
        assert_eq!(extract_public_code(&content).as_deref(), Some("C-0000000001"));
    }

    #[test]
    fn foreign_content_has_no_code() {
        assert_eq!(extract_public_code("CLIENTE|42|Ana"), None);
        assert_eq!(extract_public_code("CLIENTE_CODE|"), None);
        assert_eq!(extract_public_code(""), None);
    }

    #[test]
    fn lookup_accepts_qr_content_in_any_case() {
        let q = LookupQuery::parse("cliente_code|C-ABCDEF0123|Ana\n0\n0.00").unwrap();
        assert_eq!(q.public_code(), "C-ABCDEF0123");
    }

    #[test]
    fn lookup_accepts_bare_code_and_rejects_blank() {
        assert_eq!(LookupQuery::parse("  C-1 ").unwrap().public_code(), "C-1");
        assert!(matches!(LookupQuery::parse("   "), Err(DomainError::Validation(_))));
        assert!(matches!(
            LookupQuery::parse("CLIENTE_CODE||x"),
            Err(DomainError::Validation(_))
        ));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_name_keeps_the_code_recoverable(
                name in "\\PC{0,40}",
                sales in 0usize..50,
                cents in 0u64..10_000_000,
            ) {
                let code = generate_public_code();
                let content = qr_content(&code, &name, sales, Money::from_cents(cents));
                prop_assert_eq!(extract_public_code(&content), Some(code.clone()));
                let query = LookupQuery::parse(&content).unwrap();
                prop_assert_eq!(query.public_code(), code.as_str());
            }
        }
    }
}
