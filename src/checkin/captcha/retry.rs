//! Bounded attempt loop around a CAPTCHA-guarded submission.
//!
//! Each attempt runs a full fetch → solve → submit cycle and reports a
//! [`AttemptVerdict`]. Retryable rejections move straight to the next attempt
//! with no delay; a fatal verdict or an error ends the loop early.

use std::future::Future;

/// How the remote side (or the solver) judged one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptVerdict {
    Accepted,
    /// Worth another try: unreadable image or "code incorrect".
    Retry(String),
    /// Retrying cannot help, e.g. the credentials were rejected.
    Fatal(String),
}

/// Summary of a finished loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome {
    pub accepted: bool,
    pub attempts: usize,
    /// Reason given by the last rejected attempt.
    pub reason: Option<String>,
}

/// Run `attempt` with indices `1..=max_attempts` until one is accepted or
/// rejected fatally. A ceiling of zero still makes one attempt.
pub async fn run_attempts<F, Fut, E>(max_attempts: usize, mut attempt: F) -> Result<RetryOutcome, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<AttemptVerdict, E>>,
{
    let ceiling = max_attempts.max(1);
    let mut reason = None;

    for index in 1..=ceiling {
        match attempt(index).await? {
            AttemptVerdict::Accepted => {
                return Ok(RetryOutcome {
                    accepted: true,
                    attempts: index,
                    reason: None,
                });
            }
            AttemptVerdict::Retry(why) => {
                log::debug!("attempt {index}/{ceiling} rejected, retrying: {why}");
                reason = Some(why);
            }
            AttemptVerdict::Fatal(why) => {
                return Ok(RetryOutcome {
                    accepted: false,
                    attempts: index,
                    reason: Some(why),
                });
            }
        }
    }

    Ok(RetryOutcome {
        accepted: false,
        attempts: ceiling,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    async fn scripted(verdicts: &[AttemptVerdict], max: usize) -> (RetryOutcome, usize) {
        let calls = Cell::new(0usize);
        let outcome = run_attempts::<_, _, ()>(max, |index| {
            calls.set(calls.get() + 1);
            let verdict = verdicts
                .get(index - 1)
                .cloned()
                .unwrap_or(AttemptVerdict::Retry("exhausted script".into()));
            async move { Ok(verdict) }
        })
        .await
        .unwrap();
        (outcome, calls.get())
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt() {
        let verdicts = [
            AttemptVerdict::Retry("unreadable".into()),
            AttemptVerdict::Retry("code incorrect".into()),
            AttemptVerdict::Accepted,
        ];
        let (outcome, calls) = scripted(&verdicts, 3).await;
        assert!(outcome.accepted);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn stops_at_ceiling() {
        let (outcome, calls) = scripted(&[], 3).await;
        assert!(!outcome.accepted);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls, 3);
        assert_eq!(outcome.reason.as_deref(), Some("exhausted script"));
    }

    #[tokio::test]
    async fn fatal_verdict_stops_early() {
        let verdicts = [
            AttemptVerdict::Retry("code incorrect".into()),
            AttemptVerdict::Fatal("invalid credentials".into()),
            AttemptVerdict::Accepted,
        ];
        let (outcome, calls) = scripted(&verdicts, 3).await;
        assert!(!outcome.accepted);
        assert_eq!(calls, 2);
        assert_eq!(outcome.reason.as_deref(), Some("invalid credentials"));
    }

    #[tokio::test]
    async fn zero_ceiling_still_attempts_once() {
        let (outcome, calls) = scripted(&[AttemptVerdict::Accepted], 0).await;
        assert!(outcome.accepted);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn errors_end_the_loop() {
        let calls = Cell::new(0usize);
        let result = run_attempts(3, |_| {
            calls.set(calls.get() + 1);
            async { Err::<AttemptVerdict, _>("connection reset") }
        })
        .await;
        assert_eq!(result, Err("connection reset"));
        assert_eq!(calls.get(), 1);
    }
}
