use crate::config::ConfigError;

pub(crate) fn require_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<String, ConfigError> {
    optional_trimmed_var(lookup, key).ok_or_else(|| ConfigError::MissingVar(key.to_string()))
}

pub(crate) fn optional_trimmed_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<String> {
    lookup(key).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

pub(crate) fn parse_u32_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u32,
) -> Result<u32, ConfigError> {
    match optional_trimmed_var(lookup, key) {
        Some(value) => value.parse::<u32>().map_err(|_| ConfigError::ParseInt {
            key: key.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

pub(crate) fn parse_u64_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    Ok(parse_optional_u64_var(lookup, key)?.unwrap_or(default))
}

pub(crate) fn parse_optional_u64_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<u64>, ConfigError> {
    match optional_trimmed_var(lookup, key) {
        Some(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::ParseInt {
                key: key.to_string(),
                value,
            }),
        None => Ok(None),
    }
}

pub(crate) fn parse_f64_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: f64,
) -> Result<f64, ConfigError> {
    match optional_trimmed_var(lookup, key) {
        Some(value) => value.parse::<f64>().map_err(|_| ConfigError::ParseFloat {
            key: key.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

pub(crate) fn parse_list_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Vec<String> {
    optional_trimmed_var(lookup, key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn parse_u16_list_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Vec<u16>, ConfigError> {
    parse_list_var(lookup, key)
        .into_iter()
        .map(|item| {
            item.parse::<u16>()
                .map_err(|_| ConfigError::ParseInt { key: key.to_string(), value: item })
        })
        .collect()
}
