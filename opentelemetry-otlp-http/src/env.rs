//! Access to configuration environment variables.
//!
//! Configuration is resolved once, when an exporter is built. Resolution goes
//! through [`EnvReader`] so the same fallback chain can be evaluated against
//! the process environment or against a fixed set of values.

use std::collections::HashMap;
use std::fmt::Debug;

/// Read-only view of configuration environment variables.
pub trait EnvReader: Debug {
    /// Returns the value of `key`, or `None` if it is unset or not valid unicode.
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads from the environment of the current process.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl EnvReader for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvReader for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl EnvReader for HashMap<&str, &str> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).map(|value| value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_env_reads_current_process() {
        temp_env::with_var("OTLP_HTTP_ENV_READER_TEST", Some("value"), || {
            assert_eq!(
                ProcessEnv.get("OTLP_HTTP_ENV_READER_TEST"),
                Some("value".to_string())
            );
        });
        temp_env::with_var_unset("OTLP_HTTP_ENV_READER_TEST", || {
            assert_eq!(ProcessEnv.get("OTLP_HTTP_ENV_READER_TEST"), None);
        });
    }

    #[test]
    fn map_reader() {
        let env = HashMap::from([("A", "1")]);
        assert_eq!(EnvReader::get(&env, "A"), Some("1".to_string()));
        assert_eq!(EnvReader::get(&env, "B"), None);
    }
}
