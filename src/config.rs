use std::{env, sync::LazyLock};

pub(crate) static ORIGIN: LazyLock<String> =
    LazyLock::new(|| std::env::var("ORIGIN").expect("ORIGIN must be set"));

pub(crate) static PASSKEY_RP_ID: LazyLock<String> = LazyLock::new(|| {
    env::var("PASSKEY_RP_ID").ok().unwrap_or_else(|| {
        ORIGIN
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .split(':')
            .next()
            .map(|s| s.to_string())
            .expect("Could not extract RP ID from ORIGIN")
    })
});

/// Origins accepted alongside `ORIGIN`, comma separated. Native app origins
/// (e.g. `android:apk-key-hash:...`) go here.
pub(crate) static PASSKEY_ADDITIONAL_ORIGINS: LazyLock<Vec<String>> = LazyLock::new(|| {
    env::var("PASSKEY_ADDITIONAL_ORIGINS")
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
});

/// Challenge lifetime in seconds. A consumed or expired challenge is never
/// usable again.
pub(crate) static PASSKEY_CHALLENGE_TIMEOUT: LazyLock<u32> = LazyLock::new(|| {
    env::var("PASSKEY_CHALLENGE_TIMEOUT")
        .map(|v| v.parse::<u32>().unwrap_or(300))
        .unwrap_or(300)
});

/// All origins a ceremony response may claim: the primary origin first, then
/// any additional ones.
pub(crate) fn allowed_origins() -> Vec<String> {
    let mut origins = vec![ORIGIN.clone()];
    origins.extend(PASSKEY_ADDITIONAL_ORIGINS.iter().cloned());
    origins
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_allowed_origins_contains_primary() {
        unsafe {
            std::env::set_var("ORIGIN", "https://example.com");
        }
        let origins = allowed_origins();
        assert_eq!(origins[0], "https://example.com");
    }

    #[test]
    #[serial]
    fn test_challenge_timeout_default() {
        unsafe {
            std::env::remove_var("PASSKEY_CHALLENGE_TIMEOUT");
        }
        assert_eq!(*PASSKEY_CHALLENGE_TIMEOUT, 300);
    }
}
