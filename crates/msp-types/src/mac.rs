use crate::{Result, TypesError};

/// Normalizes any of the accepted MAC representations
/// (`aa:bb:cc:dd:ee:ff`, `AA-BB-CC-DD-EE-FF`, `aabbccddeeff`) into the
/// canonical uppercase colon-separated form.
///
/// This is the single source of truth for invariant I1; every caller that
/// derives an appliance id must route through here first.
pub fn normalize_mac(raw: &str) -> Result<String> {
    let stripped: String = raw
        .chars()
        .filter(|c| *c != ':' && *c != '-')
        .collect();

    if stripped.len() != 12 || !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(TypesError::InvalidMac(raw.to_string()));
    }

    let upper = stripped.to_ascii_uppercase();
    let mut out = String::with_capacity(17);
    for (i, chunk) in upper.as_bytes().chunks(2).enumerate() {
        if i > 0 {
            out.push(':');
        }
        out.push_str(std::str::from_utf8(chunk).unwrap());
    }
    Ok(out)
}

/// Canonical appliance id: `"{site_id}-{normalized_mac}"`.
pub fn appliance_id(site_id: &str, raw_mac: &str) -> Result<String> {
    let mac = normalize_mac(raw_mac)?;
    Ok(format!("{site_id}-{mac}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_all_accepted_forms() {
        let expected = "AA:BB:CC:DD:EE:FF";
        assert_eq!(normalize_mac("aa:bb:cc:dd:ee:ff").unwrap(), expected);
        assert_eq!(normalize_mac("AA-BB-CC-DD-EE-FF").unwrap(), expected);
        assert_eq!(normalize_mac("aabbccddeeff").unwrap(), expected);
        assert_eq!(normalize_mac("AaBbCcDdEeFf").unwrap(), expected);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(normalize_mac("not-a-mac").is_err());
        assert!(normalize_mac("aa:bb:cc:dd:ee").is_err());
    }

    #[test]
    fn builds_canonical_appliance_id() {
        let id = appliance_id("site1", "aa:bb:cc:dd:ee:01").unwrap();
        assert_eq!(id, "site1-AA:BB:CC:DD:EE:01");
    }

    proptest::proptest! {
        // Invariant I1: colon, dash, and bare-hex renderings of the same
        // six octets always normalize to the identical canonical string,
        // regardless of case.
        #[test]
        fn colon_dash_and_bare_forms_agree(octets in proptest::collection::vec(0u8..=255, 6..=6)) {
            let colon = octets.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(":");
            let dash = octets.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join("-");
            let bare = octets.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join("");

            let a = normalize_mac(&colon).unwrap();
            let b = normalize_mac(&dash).unwrap();
            let c = normalize_mac(&bare).unwrap();
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(&a, &c);
            prop_assert!(a.chars().all(|ch| ch == ':' || ch.is_ascii_hexdigit() && !ch.is_ascii_lowercase()));
        }
    }
}
