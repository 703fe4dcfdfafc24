//! 输入验证辅助函数
//!
//! - normalize_required / normalize_optional：去除首尾空格并检查非空
//! - parse_choice / parse_optional_choice：字符串枚举值解析（状态、优先级、类别等）
//! - parse_permissions / parse_permission：权限码解析，未知权限码返回 400
//!
//! 失败统一返回 bad_request_error 响应。

use crate::utils::response::bad_request_error;
use axum::response::Response;
use domain::permissions::parse_permission_codes;
use domain::{Permission, UnknownVariant};
use std::collections::BTreeSet;
use std::str::FromStr;

/// 验证必填字段，去除空格并检查非空
pub fn normalize_required(value: String, field: &str) -> Result<String, Response> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(bad_request_error(format!("{field} required")));
    }
    Ok(trimmed.to_string())
}

/// 验证可选字段，如果提供则去除空格并检查非空
pub fn normalize_optional(value: Option<String>, field: &str) -> Result<Option<String>, Response> {
    match value {
        Some(value) => normalize_required(value, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_choice<T>(value: &str) -> Result<T, Response>
where
    T: FromStr<Err = UnknownVariant>,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|err| bad_request_error(err.to_string()))
}

pub fn parse_optional_choice<T>(value: Option<&str>) -> Result<Option<T>, Response>
where
    T: FromStr<Err = UnknownVariant>,
{
    value.map(parse_choice).transpose()
}

pub fn parse_permission(value: &str) -> Result<Permission, Response> {
    value
        .trim()
        .parse::<Permission>()
        .map_err(|err| bad_request_error(err.to_string()))
}

pub fn parse_permissions(values: &[String]) -> Result<BTreeSet<Permission>, Response> {
    parse_permission_codes(values.iter().map(|value| value.trim()))
        .map_err(|err| bad_request_error(err.to_string()))
}
