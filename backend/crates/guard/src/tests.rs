//! Use-case tests for the guard crate, run against the in-process stores.

fn guard() -> crate::InMemoryGuard {
    crate::InMemoryGuard::in_memory(crate::GuardConfig::default())
}

#[cfg(test)]
mod rate_limit_tests {
    use super::guard;
    use crate::{GuardError, LimiterName};

    #[tokio::test]
    async fn test_login_limiter_rejects_sixth_attempt() {
        let guard = guard();
        let login = guard.limiter(LimiterName::Login);
        let t0 = 1_700_000_000_000;

        for i in 0..5 {
            let result = login.check_at("203.0.113.9", t0 + i).await.unwrap();
            assert_eq!(result.limit, 5);
            assert_eq!(result.remaining, 4 - i as u32);
        }

        let err = login.check_at("203.0.113.9", t0 + 10).await.unwrap_err();
        match err {
            GuardError::RateLimited {
                limiter,
                retry_after_secs,
            } => {
                assert_eq!(limiter, LimiterName::Login);
                // window opened at t0 and lasts 15 minutes
                assert_eq!(retry_after_secs, 900);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_limiters_do_not_share_counters() {
        let guard = guard();
        let t0 = 1_700_000_000_000;

        for _ in 0..5 {
            guard
                .limiter(LimiterName::Login)
                .check_at("198.51.100.1", t0)
                .await
                .unwrap();
        }
        assert!(
            guard
                .limiter(LimiterName::Login)
                .check_at("198.51.100.1", t0)
                .await
                .is_err()
        );

        let chat = guard
            .limiter(LimiterName::Chat)
            .check_at("198.51.100.1", t0)
            .await
            .unwrap();
        assert_eq!(chat.count, 1);
        assert!(
            guard
                .limiter(LimiterName::Login)
                .check_at("198.51.100.2", t0)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_window_elapses_then_admits_again() {
        let guard = guard();
        let register = guard.limiter(LimiterName::Register);
        let t0 = 1_700_000_000_000;

        for _ in 0..3 {
            register.check_at("192.0.2.7", t0).await.unwrap();
        }
        assert!(register.check_at("192.0.2.7", t0 + 1_000).await.is_err());

        let after = t0 + register.config().window_ms() + 1;
        let result = register.check_at("192.0.2.7", after).await.unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.remaining, 2);
    }
}

#[cfg(test)]
mod captcha_tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::guard;
    use crate::GuardError;
    use crate::domain::services::MathQuestion;

    fn question(answer: &str) -> MathQuestion {
        MathQuestion {
            text: "question = ?".into(),
            answer: answer.into(),
        }
    }

    #[tokio::test]
    async fn test_issue_hides_answer_and_sets_ttl() {
        let guard = guard();
        let issued = guard.issue_captcha().await.unwrap();

        assert!(issued.question.ends_with(" = ?"));
        let ttl = issued.expires_at_ms - Utc::now().timestamp_millis();
        assert!(ttl > 290_000 && ttl <= 300_000);

        let json = serde_json::to_value(&issued).unwrap();
        assert!(json.get("answer").is_none());
        assert!(json.get("captchaId").is_some());
    }

    #[tokio::test]
    async fn test_correct_answer_is_single_use() {
        let guard = guard();
        let now = Utc::now();
        let issued = guard
            .captcha_issuer()
            .issue(question("12"), now)
            .await
            .unwrap();
        let id = issued.captcha_id.to_string();
        let now_ms = now.timestamp_millis();

        guard
            .captcha_verifier()
            .execute_at(&id, " 12 ", now_ms)
            .await
            .unwrap();

        let replay = guard
            .captcha_verifier()
            .execute_at(&id, "12", now_ms)
            .await;
        assert!(matches!(replay, Err(GuardError::CaptchaNotFound)));
    }

    #[tokio::test]
    async fn test_mismatch_keeps_challenge() {
        let guard = guard();
        let now = Utc::now();
        let issued = guard
            .captcha_issuer()
            .issue(question("-3"), now)
            .await
            .unwrap();
        let id = issued.captcha_id.to_string();
        let now_ms = now.timestamp_millis();

        let wrong = guard.captcha_verifier().execute_at(&id, "3", now_ms).await;
        assert!(matches!(wrong, Err(GuardError::CaptchaMismatch)));

        guard
            .captcha_verifier()
            .execute_at(&id, "-3", now_ms)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_mismatch_attempts_are_capped() {
        let guard = guard();
        let now = Utc::now();
        let issued = guard
            .captcha_issuer()
            .issue(question("7"), now)
            .await
            .unwrap();
        let id = issued.captcha_id.to_string();
        let now_ms = now.timestamp_millis();
        let max_attempts = guard.config().captcha_policy.max_attempts;

        for _ in 0..max_attempts {
            let result = guard.captcha_verifier().execute_at(&id, "0", now_ms).await;
            assert!(matches!(result, Err(GuardError::CaptchaMismatch)));
        }

        let result = guard.captcha_verifier().execute_at(&id, "7", now_ms).await;
        assert!(matches!(result, Err(GuardError::CaptchaNotFound)));
    }

    #[tokio::test]
    async fn test_expired_challenge_is_removed() {
        let guard = guard();
        let now = Utc::now();
        let issued = guard
            .captcha_issuer()
            .issue(question("5"), now)
            .await
            .unwrap();
        let id = issued.captcha_id.to_string();
        let later = issued.expires_at_ms + 1;

        let expired = guard.captcha_verifier().execute_at(&id, "5", later).await;
        assert!(matches!(expired, Err(GuardError::CaptchaExpired)));

        let again = guard.captcha_verifier().execute_at(&id, "5", later).await;
        assert!(matches!(again, Err(GuardError::CaptchaNotFound)));
    }

    #[tokio::test]
    async fn test_input_validation() {
        let guard = guard();
        let now_ms = Utc::now().timestamp_millis();

        let missing_id = guard.captcha_verifier().execute_at("  ", "1", now_ms).await;
        assert!(matches!(missing_id, Err(GuardError::InvalidInput(_))));

        let missing_answer = guard
            .captcha_verifier()
            .execute_at(&uuid::Uuid::new_v4().to_string(), " ", now_ms)
            .await;
        assert!(matches!(missing_answer, Err(GuardError::InvalidInput(_))));

        let malformed = guard
            .captcha_verifier()
            .execute_at("not-a-uuid", "1", now_ms)
            .await;
        assert!(matches!(malformed, Err(GuardError::CaptchaNotFound)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_correct_answers_pass_once() {
        let guard = Arc::new(guard());
        let now = Utc::now();
        let issued = guard
            .captcha_issuer()
            .issue(question("42"), now)
            .await
            .unwrap();
        let id = issued.captcha_id.to_string();
        let now_ms = now.timestamp_millis();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let guard = guard.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    guard
                        .captcha_verifier()
                        .execute_at(&id, "42", now_ms)
                        .await
                        .is_ok()
                })
            })
            .collect();

        let mut passed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                passed += 1;
            }
        }
        assert_eq!(passed, 1);
    }
}

#[cfg(test)]
mod registration_tests {
    use super::guard;
    use crate::GuardError;
    use crate::domain::value_objects::{RegistrationLimit, RegistrationSubject};

    #[tokio::test]
    async fn test_fourth_registration_from_same_ip_is_rejected() {
        let guard = guard();
        let throttle = guard.registration_throttle();
        let t0 = 1_700_000_000_000;

        for i in 0..3 {
            let subject = RegistrationSubject::new("203.0.113.5", Some(format!("device-{i}")));
            throttle.check_at(&subject, t0).await.unwrap();
            throttle.record_at(&subject, t0).await.unwrap();
        }

        let fourth = RegistrationSubject::new("203.0.113.5", Some("device-new"));
        match throttle.check_at(&fourth, t0 + 60_000).await {
            Err(GuardError::RegistrationThrottled {
                limit,
                retry_after_secs,
            }) => {
                assert_eq!(limit, RegistrationLimit::Ip);
                assert_eq!(retry_after_secs, 3_540);
            }
            other => panic!("expected RegistrationThrottled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_device_limit_applies_across_addresses() {
        let guard = guard();
        let throttle = guard.registration_throttle();
        let t0 = 1_700_000_000_000;

        for i in 0..3 {
            let subject = RegistrationSubject::new(format!("10.0.0.{i}"), Some("same-device"));
            throttle.record_at(&subject, t0).await.unwrap();
        }

        let subject = RegistrationSubject::new("10.0.0.99", Some("same-device"));
        let err = throttle.check_at(&subject, t0).await.unwrap_err();
        assert!(matches!(
            err,
            GuardError::RegistrationThrottled {
                limit: RegistrationLimit::Device,
                ..
            }
        ));

        let without_device = RegistrationSubject::new("10.0.0.99", None::<String>);
        throttle.check_at(&without_device, t0).await.unwrap();
    }

    #[tokio::test]
    async fn test_check_alone_does_not_count() {
        let guard = guard();
        let throttle = guard.registration_throttle();
        let subject = RegistrationSubject::new("192.0.2.1", None::<String>);

        for _ in 0..10 {
            throttle.check_at(&subject, 0).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_registration_window_resets() {
        let guard = guard();
        let throttle = guard.registration_throttle();
        let subject = RegistrationSubject::new("192.0.2.2", None::<String>);
        let t0 = 1_700_000_000_000;

        for _ in 0..3 {
            throttle.record_at(&subject, t0).await.unwrap();
        }
        assert!(throttle.check_at(&subject, t0).await.is_err());
        throttle
            .check_at(&subject, t0 + 3_600_000 + 1)
            .await
            .unwrap();
    }
}

#[cfg(test)]
mod sweep_tests {
    use chrono::Utc;

    use super::guard;
    use crate::LimiterName;
    use crate::domain::services::MathQuestion;
    use crate::domain::value_objects::RegistrationSubject;

    #[tokio::test]
    async fn test_stats_and_sweep() {
        let guard = guard();
        let now = Utc::now();
        let now_ms = now.timestamp_millis();

        guard
            .limiter(LimiterName::Global)
            .check_at("a", now_ms)
            .await
            .unwrap();
        guard
            .limiter(LimiterName::Chat)
            .check_at("a", now_ms)
            .await
            .unwrap();
        guard
            .captcha_issuer()
            .issue(
                MathQuestion {
                    text: "1 + 1 = ?".into(),
                    answer: "2".into(),
                },
                now,
            )
            .await
            .unwrap();
        guard
            .registration_throttle()
            .record_at(&RegistrationSubject::new("a", Some("d")), now_ms)
            .await
            .unwrap();

        let stats = guard.stats().await.unwrap();
        assert_eq!(stats.rate_limit_entries, 2);
        assert_eq!(stats.captcha_entries, 1);
        assert_eq!(stats.registration_entries, 2);

        // past the captcha TTL and the one-minute windows, inside the hour
        let report = guard.sweep_expired_at(now_ms + 6 * 60_000).await.unwrap();
        assert_eq!(report.rate_limits, 2);
        assert_eq!(report.captchas, 1);
        assert_eq!(report.registrations, 0);

        let stats = guard.stats().await.unwrap();
        assert_eq!(stats.rate_limit_entries, 0);
        assert_eq!(stats.registration_entries, 2);
    }

    #[tokio::test]
    async fn test_sweeper_task_can_be_stopped() {
        let guard = std::sync::Arc::new(guard());
        let handle = crate::spawn_sweeper(guard, std::time::Duration::from_millis(5));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}

#[cfg(test)]
mod error_tests {
    use kernel::error::{app_error::AppError, kind::ErrorKind};

    use crate::GuardError;
    use crate::LimiterName;
    use crate::domain::value_objects::RegistrationLimit;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            GuardError::RateLimited {
                limiter: LimiterName::Chat,
                retry_after_secs: 1
            }
            .kind(),
            ErrorKind::TooManyRequests
        );
        assert_eq!(GuardError::CaptchaNotFound.kind(), ErrorKind::Gone);
        assert_eq!(GuardError::CaptchaExpired.kind(), ErrorKind::Gone);
        assert_eq!(
            GuardError::CaptchaMismatch.kind(),
            ErrorKind::UnprocessableEntity
        );
        assert_eq!(
            GuardError::Store("down".into()).kind(),
            ErrorKind::ServiceUnavailable
        );
    }

    #[test]
    fn test_throttle_converts_with_retry_after() {
        let err = GuardError::RegistrationThrottled {
            limit: RegistrationLimit::Device,
            retry_after_secs: 120,
        };
        assert_eq!(err.to_string(), RegistrationLimit::Device.message());

        let app: AppError = err.into();
        assert_eq!(app.status_code(), 429);
        assert_eq!(app.retry_after_secs(), Some(120));
    }
}
