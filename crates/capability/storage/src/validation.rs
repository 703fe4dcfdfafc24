//! 验证辅助函数
//!
//! 在任何存储写入之前执行的数据一致性校验：
//! - attachment_parent：附件必须且只能关联一个对象
//! - ensure_non_negative_cost：费用不能为负

use crate::error::StorageError;
use crate::models::AttachmentParent;
use rust_decimal::Decimal;

/// 由可选的故障单 / 维修措施 ID 构造附件所属对象。
///
/// 两者都给或都不给时返回 Invalid。
pub fn attachment_parent(
    issue_id: Option<&str>,
    remedy_id: Option<&str>,
) -> Result<AttachmentParent, StorageError> {
    let issue_id = issue_id.map(str::trim).filter(|value| !value.is_empty());
    let remedy_id = remedy_id.map(str::trim).filter(|value| !value.is_empty());
    match (issue_id, remedy_id) {
        (Some(issue_id), None) => Ok(AttachmentParent::Issue(issue_id.to_string())),
        (None, Some(remedy_id)) => Ok(AttachmentParent::Remedy(remedy_id.to_string())),
        _ => Err(StorageError::invalid(
            "attachment must link to exactly one parent",
        )),
    }
}

pub fn ensure_non_negative_cost(
    field: &str,
    value: Option<Decimal>,
) -> Result<(), StorageError> {
    if value.is_some_and(|cost| cost.is_sign_negative() && !cost.is_zero()) {
        return Err(StorageError::invalid(format!("{field} must not be negative")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageErrorKind;

    #[test]
    fn attachment_parent_requires_exactly_one_link() {
        assert_eq!(
            attachment_parent(Some("issue-1"), None).expect("issue parent"),
            AttachmentParent::Issue("issue-1".to_string())
        );
        assert_eq!(
            attachment_parent(None, Some("remedy-1")).expect("remedy parent"),
            AttachmentParent::Remedy("remedy-1".to_string())
        );

        let both = attachment_parent(Some("issue-1"), Some("remedy-1")).expect_err("both");
        assert_eq!(both.kind(), StorageErrorKind::Invalid);
        assert_eq!(both.message(), "attachment must link to exactly one parent");

        let neither = attachment_parent(Some("  "), None).expect_err("blank");
        assert_eq!(neither.kind(), StorageErrorKind::Invalid);
    }

    #[test]
    fn negative_costs_are_rejected() {
        assert!(ensure_non_negative_cost("labor_cost", Some(Decimal::new(-1, 2))).is_err());
        assert!(ensure_non_negative_cost("labor_cost", Some(Decimal::ZERO)).is_ok());
        assert!(ensure_non_negative_cost("labor_cost", None).is_ok());
    }
}
