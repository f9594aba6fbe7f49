//! 配置校验模块
//!
//! 校验规则：
//! - 字段范围 (derive 规则，见 contracts::TrackerConfig)
//! - fps > 0 且有限
//! - base_name 不含路径分隔符
//! - replay 模式必须提供 replay_path
//! - server.bind 为合法 socket 地址

use std::net::SocketAddr;

use contracts::{ContractError, LandmarkSourceKind, TrackerConfig};
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

/// 校验 TrackerConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &TrackerConfig) -> Result<(), ContractError> {
    validate_field_rules(config)?;
    validate_output(config)?;
    validate_landmarks(config)?;
    validate_server(config)?;
    Ok(())
}

/// 执行 derive 生成的字段规则
fn validate_field_rules(config: &TrackerConfig) -> Result<(), ContractError> {
    match config.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_violation(&errors, "")
                .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
            Err(ContractError::config_validation(field, message))
        }
    }
}

/// 按字段名排序后取第一个叶子错误，保证报错稳定
fn first_violation(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in entries {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(error) = list.first() {
                    return Some((path, describe(error)));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some(found) = first_violation(inner, &path) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    if let Some(found) = first_violation(inner, &format!("{path}[{idx}]")) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

fn describe(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }
    let mut params: Vec<_> = error
        .params
        .iter()
        .filter(|(k, _)| **k != "value")
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    params.sort();
    match error.params.get("value") {
        Some(value) => format!(
            "{} check failed for value {} ({})",
            error.code,
            value,
            params.join(", ")
        ),
        None => format!("{} check failed ({})", error.code, params.join(", ")),
    }
}

/// 校验输出配置
fn validate_output(config: &TrackerConfig) -> Result<(), ContractError> {
    let output = &config.output;

    if !output.fps.is_finite() || output.fps <= 0.0 {
        return Err(ContractError::config_validation(
            "output.fps",
            format!("fps must be > 0, got {}", output.fps),
        ));
    }

    if output.dir.as_os_str().is_empty() {
        return Err(ContractError::config_validation(
            "output.dir",
            "output dir cannot be empty",
        ));
    }

    if output.base_name.contains(['/', '\\']) {
        return Err(ContractError::config_validation(
            "output.base_name",
            format!(
                "base_name '{}' must not contain path separators",
                output.base_name
            ),
        ));
    }

    Ok(())
}

/// 校验 landmark 数据源
fn validate_landmarks(config: &TrackerConfig) -> Result<(), ContractError> {
    let landmarks = &config.landmarks;
    if landmarks.source == LandmarkSourceKind::Replay && landmarks.replay_path.is_none() {
        return Err(ContractError::config_validation(
            "landmarks.replay_path",
            "replay source requires replay_path",
        ));
    }
    Ok(())
}

/// 校验服务端监听地址
fn validate_server(config: &TrackerConfig) -> Result<(), ContractError> {
    config
        .server
        .bind
        .parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|e| {
            ContractError::config_validation(
                "server.bind",
                format!("invalid socket address '{}': {e}", config.server.bind),
            )
        })
}
