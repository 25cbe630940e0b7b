pub mod attendance;
pub mod calendar;
pub mod reports;
pub mod sessions;

use crate::{error::AppError, models::principal::Principal, types::StudentId};

pub(crate) fn require_staff(principal: &Principal) -> Result<(), AppError> {
    if principal.is_staff() {
        Ok(())
    } else {
        Err(AppError::Forbidden("staff only".into()))
    }
}

pub(crate) fn require_student(principal: &Principal) -> Result<StudentId, AppError> {
    principal
        .as_student()
        .ok_or_else(|| AppError::Forbidden("student only".into()))
}
