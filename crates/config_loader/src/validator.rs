//! 配置校验模块
//!
//! 校验规则：
//! - 字段范围 (validator derive)：settle_delay_ms、timeout_s、车辆参数
//! - timeout_s 必须是有限值且能转换为 Duration
//! - 两个检查点端口互不相同
//! - 轮询间隔必须小于碰撞标志保持时间
//! - sink 名称非空且唯一
//! - http sink 必须提供 endpoint / team_code，file sink 必须提供 path

use std::collections::HashSet;

use contracts::{ContractError, JudgeBlueprint, SinkType};
use validator::Validate;

/// 校验 JudgeBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &JudgeBlueprint) -> Result<(), ContractError> {
    validate_ranges(blueprint)?;
    validate_timing(blueprint)?;
    validate_checkpoint_ports(blueprint)?;
    validate_tick_interval(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// 字段范围校验
fn validate_ranges(blueprint: &JudgeBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|e| ContractError::config_validation("blueprint", e.to_string()))
}

/// NaN 能通过区间校验，这里再按实际转换检查一次
fn validate_timing(blueprint: &JudgeBlueprint) -> Result<(), ContractError> {
    blueprint.timing.timeout().map(|_| ())
}

/// 校验检查点端口
fn validate_checkpoint_ports(blueprint: &JudgeBlueprint) -> Result<(), ContractError> {
    let checkpoints = &blueprint.checkpoints;
    if checkpoints.start_finish_port == checkpoints.mid_port {
        return Err(ContractError::config_validation(
            "checkpoints.mid_port",
            format!(
                "checkpoint ports must differ, both are {}",
                checkpoints.mid_port
            ),
        ));
    }
    Ok(())
}

/// 轮询间隔不能超过保持时间，否则可能漏掉一次碰撞
fn validate_tick_interval(blueprint: &JudgeBlueprint) -> Result<(), ContractError> {
    let tick = blueprint.timing.tick_interval_ms;
    let settle = blueprint.checkpoints.settle_delay_ms;
    if tick >= settle {
        return Err(ContractError::config_validation(
            "timing.tick_interval_ms",
            format!("tick interval {tick}ms must be shorter than settle delay {settle}ms"),
        ));
    }
    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &JudgeBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }

        let required: &[&str] = match sink.sink_type {
            SinkType::Log => &[],
            SinkType::File => &["path"],
            SinkType::Http => &["endpoint", "team_code"],
        };
        for key in required {
            if sink.params.get(*key).map_or(true, |v| v.is_empty()) {
                return Err(ContractError::config_validation(
                    format!("sinks[{}].params.{}", sink.name, key),
                    format!("{:?} sink requires '{}'", sink.sink_type, key),
                ));
            }
        }
    }
    Ok(())
}
