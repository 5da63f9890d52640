//! The process environment written before every deployment

use tracing::{debug, warn};

pub const SUB_DOMAIN: &str = "test";
pub const PUBLIC_URL: &str = "https://pds.test.waverly.social";

/// The variables and values written by [apply_service_env]
pub const SERVICE_ENV: [(&str, &str); 2] =
    [("SUB_DOMAIN", SUB_DOMAIN), ("PUBLIC_URL", PUBLIC_URL)];

/// Serializes tests that write to the process environment
#[cfg(test)]
pub(crate) static ENV_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

/// If any dash separated segment of `context` starts with "test", as in
/// `prod-test3`
pub fn is_test_context(context: &str) -> bool {
    context.split('-').any(|segment| segment.starts_with("test"))
}

/// Sets `SUB_DOMAIN` and `PUBLIC_URL`. The values are the test ones no matter
/// which `context` is targeted.
pub fn apply_service_env(context: &str) {
    if !is_test_context(context) {
        warn!(
            "context \"{context}\" does not look like a test cluster, but SUB_DOMAIN={SUB_DOMAIN} \
             and PUBLIC_URL={PUBLIC_URL} are still used"
        );
    }
    for (key, val) in SERVICE_ENV {
        debug!("setting {key}={val}");
        std::env::set_var(key, val);
    }
}
