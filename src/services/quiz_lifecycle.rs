//! Quiz time-window rules.
//!
//! Status is a function of `(now, start, end)` except for `cancelled`, which is
//! terminal. The HTTP handlers and the status scheduler both go through
//! [`refresh_status`], so the two paths can never disagree.

use rand::seq::SliceRandom;
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::{EligibilityEntry, Quiz};
use crate::db::types::QuizStatus;
use crate::services::accounts::StudentProfile;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LifecycleError {
    #[error("Start time must be in the future")]
    StartInPast,
    #[error("End time must be after start time")]
    EndBeforeStart,
    #[error("Quiz has already started and can no longer be modified")]
    AlreadyStarted,
    #[error("Quiz has been cancelled")]
    Cancelled,
    #[error("Only scheduled or active quizzes can be cancelled (current status: {})", .0.as_str())]
    NotCancellable(QuizStatus),
    #[error("Quiz is not open for submissions")]
    SubmissionClosed,
}

/// Reasons a student is turned away from a quiz, in the order they are checked.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AccessDenied {
    #[error("You are not eligible for this quiz")]
    NotEligible,
    #[error("Quiz is not currently active")]
    NotActive,
    #[error("Invalid quiz passcode")]
    WrongPasscode,
}

pub(crate) fn derive_status(
    now: PrimitiveDateTime,
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
) -> QuizStatus {
    if now < start {
        QuizStatus::Scheduled
    } else if now <= end {
        QuizStatus::Active
    } else {
        QuizStatus::Completed
    }
}

pub(crate) fn refresh_status(
    current: QuizStatus,
    now: PrimitiveDateTime,
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
) -> QuizStatus {
    if current == QuizStatus::Cancelled {
        return QuizStatus::Cancelled;
    }
    derive_status(now, start, end)
}

pub(crate) fn has_started(now: PrimitiveDateTime, start: PrimitiveDateTime) -> bool {
    now >= start
}

pub(crate) fn is_currently_active(quiz: &Quiz, now: PrimitiveDateTime) -> bool {
    quiz.is_active
        && quiz.status != QuizStatus::Cancelled
        && derive_status(now, quiz.start_time, quiz.end_time) == QuizStatus::Active
}

pub(crate) fn is_student_eligible(
    eligibility: &[EligibilityEntry],
    student: &StudentProfile,
) -> bool {
    eligibility.iter().any(|entry| {
        entry.program == student.program
            && entry.academic_year == student.academic_year
            && entry.semester == student.semester
    })
}

/// Eligibility, then the time window, then the passcode.
pub(crate) fn check_access(
    quiz: &Quiz,
    student: &StudentProfile,
    passcode: &str,
    now: PrimitiveDateTime,
) -> Result<(), AccessDenied> {
    if !is_student_eligible(&quiz.eligibility, student) {
        return Err(AccessDenied::NotEligible);
    }
    if !is_currently_active(quiz, now) {
        return Err(AccessDenied::NotActive);
    }
    if quiz.passcode != passcode {
        return Err(AccessDenied::WrongPasscode);
    }
    Ok(())
}

pub(crate) fn validate_new_window(
    now: PrimitiveDateTime,
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
) -> Result<(), LifecycleError> {
    if start <= now {
        return Err(LifecycleError::StartInPast);
    }
    if end <= start {
        return Err(LifecycleError::EndBeforeStart);
    }
    Ok(())
}

/// Updates and deletes are only allowed before the stored start time.
pub(crate) fn ensure_editable(quiz: &Quiz, now: PrimitiveDateTime) -> Result<(), LifecycleError> {
    if has_started(now, quiz.start_time) {
        return Err(LifecycleError::AlreadyStarted);
    }
    if quiz.status == QuizStatus::Cancelled {
        return Err(LifecycleError::Cancelled);
    }
    Ok(())
}

pub(crate) fn ensure_cancellable(
    quiz: &Quiz,
    now: PrimitiveDateTime,
) -> Result<(), LifecycleError> {
    match refresh_status(quiz.status, now, quiz.start_time, quiz.end_time) {
        QuizStatus::Scheduled | QuizStatus::Active => Ok(()),
        other => Err(LifecycleError::NotCancellable(other)),
    }
}

pub(crate) fn ensure_submission_open(
    quiz: &Quiz,
    now: PrimitiveDateTime,
) -> Result<(), LifecycleError> {
    if !quiz.is_active || quiz.status == QuizStatus::Cancelled || now < quiz.start_time {
        return Err(LifecycleError::SubmissionClosed);
    }
    if now > quiz.end_time && !quiz.allow_late_submission {
        return Err(LifecycleError::SubmissionClosed);
    }
    Ok(())
}

/// Scores are shown straight away, or once the quiz has ended when withheld.
pub(crate) fn results_released(quiz: &Quiz, now: PrimitiveDateTime) -> bool {
    quiz.show_results_immediately
        || refresh_status(quiz.status, now, quiz.start_time, quiz.end_time) == QuizStatus::Completed
}

pub(crate) fn shuffle<T>(items: &mut [T]) {
    items.shuffle(&mut rand::thread_rng());
}
