//! Environment flags controlling automatic deployment.
//!
//! Deployment runs implicitly after linking, so users need a way to opt out
//! without touching build files. Flags follow the `CLANG_TOOL_CHAIN_NO_*`
//! convention, with `CLANG_TOOL_CHAIN_NO_AUTO` disabling every automatic
//! feature at once.

use std::env;

/// Aggregate switch disabling all automatic features.
const NO_AUTO_VAR: &str = "CLANG_TOOL_CHAIN_NO_AUTO";

/// Verbose logging switch for the deployment subsystem.
const VERBOSE_VAR: &str = "CLANG_TOOL_CHAIN_DLL_DEPLOY_VERBOSE";

/// Feature suffix disabling all library deployment.
pub const DEPLOY_LIBS: &str = "DEPLOY_LIBS";

/// Feature suffix disabling deployment for shared-library outputs only.
pub const DEPLOY_SHARED_LIB: &str = "DEPLOY_SHARED_LIB";

/// Values treated as "enabled" for boolean environment variables.
const TRUTHY_VALUES: [&str; 3] = ["1", "true", "yes"];

fn is_truthy(value: Option<String>) -> bool {
    value.is_some_and(|v| {
        let lowered = v.to_lowercase();
        TRUTHY_VALUES.contains(&lowered.as_str())
    })
}

/// Returns true if all automatic features are disabled via
/// `CLANG_TOOL_CHAIN_NO_AUTO`.
#[must_use]
pub fn is_auto_disabled() -> bool {
    is_truthy(env::var(NO_AUTO_VAR).ok())
}

/// Returns true if a specific feature is disabled.
///
/// A feature is disabled when either the aggregate `CLANG_TOOL_CHAIN_NO_AUTO`
/// or the specific `CLANG_TOOL_CHAIN_NO_<feature>` variable is truthy.
#[must_use]
pub fn is_feature_disabled(feature: &str) -> bool {
    if is_auto_disabled() {
        return true;
    }
    let var = format!("CLANG_TOOL_CHAIN_NO_{feature}");
    is_truthy(env::var(var).ok())
}

/// Returns true if verbose deployment logging was requested.
#[must_use]
pub fn verbose_requested() -> bool {
    is_truthy(env::var(VERBOSE_VAR).ok())
}
