//! 配置校验模块
//!
//! 校验规则：
//! - 至少配置一个 sender
//! - sender name / channel 非空
//! - sender name 唯一
//! - channel 大小写折叠后唯一 (错误信息同时指出两个 sender)
//! - delivery_timeout_ms > 0
//! - workers > 0，队列容量 > 0，max_in_flight > 0

use std::collections::{HashMap, HashSet};

use contracts::{ChannelId, ContractError, RouterBlueprint};

/// 校验 RouterBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &RouterBlueprint) -> Result<(), ContractError> {
    validate_dispatch(blueprint)?;
    validate_ingestion(blueprint)?;
    validate_sender_fields(blueprint)?;
    validate_sender_names(blueprint)?;
    validate_sender_channels(blueprint)?;
    Ok(())
}

/// 校验分发设置
fn validate_dispatch(blueprint: &RouterBlueprint) -> Result<(), ContractError> {
    if blueprint.dispatch.delivery_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "dispatch.delivery_timeout_ms",
            "delivery_timeout_ms must be > 0",
        ));
    }
    Ok(())
}

/// 校验摄取设置
fn validate_ingestion(blueprint: &RouterBlueprint) -> Result<(), ContractError> {
    let ingestion = &blueprint.ingestion;
    if ingestion.workers == 0 {
        return Err(ContractError::config_validation(
            "ingestion.workers",
            "workers must be > 0",
        ));
    }
    if ingestion.queue_capacity == 0 {
        return Err(ContractError::config_validation(
            "ingestion.queue_capacity",
            "queue_capacity must be > 0",
        ));
    }
    Ok(())
}

/// 校验 sender 必填字段与数值范围
fn validate_sender_fields(blueprint: &RouterBlueprint) -> Result<(), ContractError> {
    if blueprint.senders.is_empty() {
        return Err(ContractError::config_validation(
            "senders",
            "at least one sender must be configured",
        ));
    }

    for (idx, sender) in blueprint.senders.iter().enumerate() {
        if sender.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("senders[{}].name", idx),
                "sender name cannot be empty",
            ));
        }
        if sender.channel.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("senders[{}].channel", sender.name),
                "sender channel cannot be empty",
            ));
        }
        if sender.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("senders[{}].queue_capacity", sender.name),
                "queue_capacity must be > 0",
            ));
        }
        if sender.max_in_flight == 0 {
            return Err(ContractError::config_validation(
                format!("senders[{}].max_in_flight", sender.name),
                "max_in_flight must be > 0",
            ));
        }
    }
    Ok(())
}

/// 校验 sender name 唯一性
fn validate_sender_names(blueprint: &RouterBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for sender in &blueprint.senders {
        if !seen.insert(sender.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("senders[name={}]", sender.name),
                "duplicate sender name",
            ));
        }
    }
    Ok(())
}

/// 校验 channel 唯一性 (大小写不敏感)
fn validate_sender_channels(blueprint: &RouterBlueprint) -> Result<(), ContractError> {
    let mut seen: HashMap<ChannelId, &str> = HashMap::new();
    for sender in &blueprint.senders {
        let channel = ChannelId::normalize(&sender.channel);
        if let Some(existing) = seen.get(&channel) {
            return Err(ContractError::config_validation(
                format!("senders[name={}].channel", sender.name),
                format!(
                    "duplicate channel '{}': already served by sender '{}' (declared '{}' by '{}')",
                    channel, existing, sender.channel, sender.name
                ),
            ));
        }
        seen.insert(channel, sender.name.as_str());
    }
    Ok(())
}
