//! Configuration loading and environment parsing.

use super::validation::validate_config;
use super::Config;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Load configuration with the following precedence (highest first):
/// 1) Recognized flat environment variables (`PORT`, `CORS_ORIGIN`,
///    `CORS_METHODS`, `QUIZIZZ_BASE_URL`, `NODE_ENV`)
/// 2) Nested overrides with prefix `MAZE_HUNT__` using `__` as separator,
///    e.g. `MAZE_HUNT__GAME__TAG_DAMAGE=25`
/// 3) File pointed at by `MAZE_HUNT_CONFIG_PATH`
/// 4) `config.json` in the current working directory
/// 5) Defaults compiled into the binary
///
/// Errors while reading or parsing are printed to stderr and the defaults
/// are used. `load()` always returns a `Config`; callers that need a hard
/// failure call [`validate_config`] on the result themselves.
#[must_use]
pub fn load() -> Config {
    use std::env;
    use std::path::PathBuf;

    let defaults = Config::default();
    let mut merged =
        serde_json::to_value(&defaults).unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

    // 3-4) File sources, lowest precedence after defaults.
    merge_file_source(&mut merged, &PathBuf::from("config.json"));
    if let Ok(path) = env::var("MAZE_HUNT_CONFIG_PATH") {
        merge_file_source(&mut merged, &PathBuf::from(path));
    }

    // 2) Nested environment overrides.
    apply_env_overrides(&mut merged);

    // 1) The recognized flat envelope.
    apply_flat_envelope(&mut merged);

    let config = match serde_json::from_value::<Config>(merged) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to deserialize config; using defaults: {e}");
            defaults
        }
    };

    // Warn-only here; main propagates validation errors properly.
    if let Err(e) = validate_config(&config) {
        eprintln!("Configuration validation error: {e}");
    }

    config
}

/// The flat variables the deployment envelope recognizes.
fn apply_flat_envelope(root: &mut Value) {
    if let Ok(port) = std::env::var("PORT") {
        if let Ok(port) = port.trim().parse::<u16>() {
            set_nested_value(root, &["port".into()], Value::from(port));
        } else {
            eprintln!("Ignoring non-numeric PORT value: {port}");
        }
    }
    if let Ok(origins) = std::env::var("CORS_ORIGIN") {
        set_nested_value(
            root,
            &["security".into(), "cors_origins".into()],
            Value::String(origins),
        );
    }
    if let Ok(methods) = std::env::var("CORS_METHODS") {
        set_nested_value(
            root,
            &["security".into(), "cors_methods".into()],
            Value::String(methods),
        );
    }
    if let Ok(base) = std::env::var("QUIZIZZ_BASE_URL") {
        set_nested_value(
            root,
            &["quiz".into(), "base_url".into()],
            Value::String(base),
        );
    }
    if let Ok(env_name) = std::env::var("NODE_ENV") {
        if env_name.trim().eq_ignore_ascii_case("production") {
            set_nested_value(
                root,
                &["security".into(), "production".into()],
                Value::Bool(true),
            );
            // Production defaults to structured JSON logs.
            set_nested_value(
                root,
                &["logging".into(), "format".into()],
                Value::String("json".into()),
            );
        }
    }
}

fn parse_json_document(raw: &str, label: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        return None;
    }

    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            eprintln!("Failed to parse config from {label}: {err}");
            None
        }
    }
}

fn merge_file_source(target: &mut Value, path: &Path) {
    if path.as_os_str().is_empty() || !path.exists() {
        return;
    }

    match fs::read_to_string(path) {
        Ok(contents) => {
            if let Some(value) = parse_json_document(&contents, &format!("file {}", path.display()))
            {
                merge_values(target, value);
            }
        }
        Err(err) => {
            eprintln!("Failed to read config from {}: {}", path.display(), err);
        }
    }
}

fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                match target_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target_slot, source_value) => {
            *target_slot = source_value;
        }
    }
}

fn apply_env_overrides(root: &mut Value) {
    for (key, raw_value) in std::env::vars() {
        let Some(stripped) = key.strip_prefix("MAZE_HUNT__") else {
            continue;
        };

        let segments: Vec<String> = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();

        if segments.is_empty() {
            continue;
        }

        let value = parse_env_value(&raw_value);
        set_nested_value(root, &segments, value);
    }
}

fn parse_env_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::String(String::new());
    }

    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

fn set_nested_value(target: &mut Value, segments: &[String], value: Value) {
    match segments {
        [] => *target = value,
        [leaf] => {
            ensure_object(target).insert(leaf.clone(), value);
        }
        [head, rest @ ..] => {
            let entry = ensure_object(target)
                .entry(head.clone())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            set_nested_value(entry, rest, value);
        }
    }
}

fn ensure_object(value: &mut Value) -> &mut serde_json::Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(serde_json::Map::new());
    }

    // SAFETY: The branch above guarantees `value` is a `Value::Object`, so
    // `as_object_mut()` will always return `Some`.
    #[allow(clippy::expect_used)]
    value
        .as_object_mut()
        .expect("value should be coerced into an object")
}
