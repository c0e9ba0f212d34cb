//! Unit tests for payload sealing and tamper detection.

#[cfg(test)]
mod tests {
    use pocketfolio_core::errors::{Error, StorageError};

    use crate::integrity::{fingerprint, seal, unseal};

    #[test]
    fn test_fingerprint_is_deterministic_hex() {
        let a = fingerprint("payload");
        let b = fingerprint("payload");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(fingerprint("payload"), fingerprint("payloae"));
    }

    #[test]
    fn test_seal_and_unseal_round_trip() {
        let sealed = seal(r#"[{"symbol":"AAPL"}]"#).unwrap();
        let payload = unseal(&sealed).unwrap();
        assert_eq!(payload, r#"[{"symbol":"AAPL"}]"#);
    }

    #[test]
    fn test_tampered_payload_is_reported_as_corruption() {
        let sealed = seal("original payload").unwrap();
        let tampered = sealed.replace("original", "attacker");

        let err = unseal(&tampered).unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::Corruption(_))
        ));
    }

    #[test]
    fn test_unsealed_legacy_text_is_reported_as_corruption() {
        // Records written before sealing existed have no envelope at all.
        let err = unseal(r#"[{"symbol":"AAPL"}]"#).unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::Corruption(_))
        ));
    }
}
