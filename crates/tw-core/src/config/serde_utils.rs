//! Serde helpers shared by the configuration types

/// `Duration` as whole seconds
///
/// Serializes as a plain integer. Deserializes from an integer (`5`) or from
/// a suffixed string (`"5s"`, `"1500ms"`, `"2m"`), so hand-edited config
/// files can use whichever reads better.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Config {
///     #[serde(with = "tw_core::config::serde_utils::duration_secs")]
///     timeout: Duration,
/// }
/// ```
pub mod duration_secs {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => parse(&text).map_err(de::Error::custom),
        }
    }

    /// Parse `"<n>ms"`, `"<n>s"`, `"<n>m"` or a bare number of seconds
    pub fn parse(text: &str) -> Result<Duration, String> {
        let text = text.trim();
        let (digits, scale_ms) = if let Some(n) = text.strip_suffix("ms") {
            (n, 1)
        } else if let Some(n) = text.strip_suffix('s') {
            (n, 1_000)
        } else if let Some(n) = text.strip_suffix('m') {
            (n, 60_000)
        } else {
            (text, 1_000)
        };

        let value: u64 = digits
            .trim()
            .parse()
            .map_err(|_| format!("invalid duration: {:?}", text))?;
        Ok(Duration::from_millis(value.saturating_mul(scale_ms)))
    }
}
