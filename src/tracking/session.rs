const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 9;

/// Create a new browser session id of the form `sess_<unix-millis>_<random>`.
///
/// Uniqueness is advisory; ids are not meant to be unguessable.
pub fn generate_session_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let mut entropy: u64 = rand::random();

    let mut suffix = String::with_capacity(SUFFIX_LEN);
    for _ in 0..SUFFIX_LEN {
        suffix.push(ALPHABET[(entropy % 36) as usize] as char);
        entropy /= 36;
    }

    format!("sess_{millis}_{suffix}")
}

/// Loose shape check used before trusting a stored session id
pub fn is_session_id(value: &str) -> bool {
    let Some(rest) = value.strip_prefix("sess_") else {
        return false;
    };
    let Some((timestamp, suffix)) = rest.split_once('_') else {
        return false;
    };

    !timestamp.is_empty()
        && timestamp.bytes().all(|b| b.is_ascii_digit())
        && !suffix.is_empty()
        && suffix.bytes().all(|b| b.is_ascii_alphanumeric())
        && value.len() <= 64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_have_expected_shape() {
        let id = generate_session_id();
        assert!(id.starts_with("sess_"));
        assert!(is_session_id(&id), "{id}");

        let suffix = id.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), SUFFIX_LEN);
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(generate_session_id(), generate_session_id());
    }

    #[test]
    fn test_is_session_id_rejects_foreign_values() {
        assert!(!is_session_id(""));
        assert!(!is_session_id("sess_"));
        assert!(!is_session_id("sess_abc_def"));
        assert!(!is_session_id("session_123_abc"));
        assert!(!is_session_id("sess_123_a;b"));
        assert!(is_session_id("sess_1700000000000_k3j9x0abc"));
    }
}
