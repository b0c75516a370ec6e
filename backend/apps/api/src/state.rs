//! Application state
//!
//! One explicitly constructed value owning every service. The request
//! layer holds it behind an `Arc` and calls the flows below.

use std::future::Future;
use std::sync::Arc;

use economy::domain::entity::wallet::Wallet;
use economy::domain::repository::EconomyStore;
use economy::{
    AffinityTracker, EconomyConfig, GiftDispatcher, MarketplaceEngine, WalletLedger,
    application::affinity::AffinityOutcome,
};
use guard::{GuardConfig, InMemoryGuard, LimiterName, RegistrationSubject};
use kernel::error::app_error::AppResult;
use kernel::id::{CharacterId, UserId};

/// Sign-up request as seen by the admission flow.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub captcha_id: String,
    pub captcha_answer: String,
    pub ip: String,
    pub device_id: Option<String>,
    pub invite_code: Option<String>,
}

pub struct AppState<S>
where
    S: EconomyStore,
{
    pub ledger: WalletLedger<S>,
    pub marketplace: MarketplaceEngine<S>,
    pub affinity: AffinityTracker<S>,
    pub gifts: GiftDispatcher<S>,
    pub guard: Arc<InMemoryGuard>,
}

impl<S> AppState<S>
where
    S: EconomyStore,
{
    pub fn new(store: Arc<S>, economy: EconomyConfig, guard: GuardConfig) -> Self {
        let economy = Arc::new(economy);
        Self {
            ledger: WalletLedger::new(store.clone(), economy.clone()),
            marketplace: MarketplaceEngine::new(store.clone(), economy.clone()),
            affinity: AffinityTracker::new(store.clone(), economy.clone()),
            gifts: GiftDispatcher::new(store, economy),
            guard: Arc::new(InMemoryGuard::in_memory(guard)),
        }
    }

    /// Admit a sign-up: throttle, then captcha, then account creation by
    /// the identity collaborator, then the seeded wallet. A throttled
    /// attempt leaves the captcha unused. The registration only counts
    /// against the throttle once everything succeeded.
    pub async fn register<F, Fut>(
        &self,
        request: &RegistrationRequest,
        create_user: F,
    ) -> AppResult<Wallet>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<UserId>>,
    {
        self.guard
            .check_rate(LimiterName::Register, &request.ip)
            .await?;
        let subject = RegistrationSubject::new(request.ip.as_str(), request.device_id.as_deref());
        self.guard.check_registration(&subject).await?;
        self.guard
            .verify_captcha(&request.captcha_id, &request.captcha_answer)
            .await?;

        let user_id = create_user().await?;
        let mut wallet = self.ledger.open_wallet(&user_id).await?;
        if let Some(code) = request.invite_code.as_deref() {
            // the account exists by now; a bad code only loses the bonus
            match self.ledger.redeem_invite(&user_id, code).await {
                Ok(_) => {
                    if let Some(rewarded) = self.ledger.get_wallet(&user_id).await? {
                        wallet = rewarded;
                    }
                }
                Err(e) => {
                    tracing::warn!(user_id = %user_id, error = %e, "Invite code not redeemed");
                }
            }
        }
        self.guard.record_registration(&subject).await?;

        tracing::info!(user_id = %user_id, ip = %request.ip, "User registered");
        Ok(wallet)
    }

    /// One chat message: the per-client chat limiter, then the affinity gain.
    pub async fn chat_turn(
        &self,
        client_key: &str,
        user_id: &UserId,
        character_id: &CharacterId,
    ) -> AppResult<AffinityOutcome> {
        self.guard.check_rate(LimiterName::Chat, client_key).await?;
        Ok(self.affinity.record_chat_turn(user_id, character_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use economy::MemoryEconomyStore;
    use economy::domain::entity::character::Character;
    use guard::domain::services::MathQuestion;
    use guard::domain::value_objects::RegistrationLimit;
    use kernel::error::app_error::AppError;
    use kernel::error::kind::ErrorKind;
    use platform::rate_limit::RateLimitConfig;

    use super::*;

    fn state() -> (Arc<MemoryEconomyStore>, AppState<MemoryEconomyStore>) {
        state_with(GuardConfig::default())
    }

    fn state_with(guard: GuardConfig) -> (Arc<MemoryEconomyStore>, AppState<MemoryEconomyStore>) {
        let store = Arc::new(MemoryEconomyStore::new());
        let state = AppState::new(store.clone(), EconomyConfig::default(), guard);
        (store, state)
    }

    /// Endpoint limiter looser than the completed-registration throttle.
    fn loose_endpoint() -> GuardConfig {
        GuardConfig {
            register_limit: RateLimitConfig::new(100, 60 * 60),
            ..GuardConfig::default()
        }
    }

    async fn captcha(state: &AppState<MemoryEconomyStore>) -> String {
        let question = MathQuestion {
            text: "3 + 4 = ?".into(),
            answer: "7".into(),
        };
        state
            .guard
            .captcha_issuer()
            .issue(question, Utc::now())
            .await
            .unwrap()
            .captcha_id
            .to_string()
    }

    fn request(captcha_id: String, answer: &str, device: &str) -> RegistrationRequest {
        RegistrationRequest {
            captcha_id,
            captcha_answer: answer.to_owned(),
            ip: "192.0.2.10".to_owned(),
            device_id: Some(device.to_owned()),
            invite_code: None,
        }
    }

    #[tokio::test]
    async fn test_register_opens_seeded_wallet() {
        let (_, state) = state();
        let id = captcha(&state).await;
        let user = UserId::new();

        let wallet = state
            .register(&request(id, "7", "device-a"), || async { Ok(user) })
            .await
            .unwrap();

        assert_eq!(wallet.user_id, user);
        assert_eq!((wallet.points, wallet.coins), (100, 50));
        assert_eq!(state.guard.stats().await.unwrap().registration_entries, 2);
    }

    #[tokio::test]
    async fn test_wrong_captcha_stops_before_account_creation() {
        let (_, state) = state();
        let id = captcha(&state).await;
        let user = UserId::new();

        let err = state
            .register(&request(id, "8", "device-a"), || async { Ok(user) })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnprocessableEntity);
        assert!(state.ledger.get_wallet(&user).await.unwrap().is_none());
        assert_eq!(state.guard.stats().await.unwrap().registration_entries, 0);
    }

    #[tokio::test]
    async fn test_failed_account_creation_is_not_counted() {
        let (_, state) = state();
        let id = captcha(&state).await;

        let err = state
            .register(&request(id, "7", "device-a"), || async {
                Err(AppError::conflict("Username taken"))
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(state.guard.stats().await.unwrap().registration_entries, 0);
    }

    #[tokio::test]
    async fn test_fourth_sign_up_from_one_address_is_throttled() {
        let (_, state) = state_with(loose_endpoint());
        for device in ["d1", "d2", "d3"] {
            let id = captcha(&state).await;
            state
                .register(&request(id, "7", device), || async { Ok(UserId::new()) })
                .await
                .unwrap();
        }

        let id = captcha(&state).await;
        let user = UserId::new();
        let err = state
            .register(&request(id, "7", "d4"), || async { Ok(user) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooManyRequests);
        assert_eq!(err.message(), RegistrationLimit::Ip.message());
        assert!(err.retry_after_secs().is_some());
        assert!(state.ledger.get_wallet(&user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_endpoint_limit_applies_first() {
        let (_, state) = state();
        for _ in 0..3 {
            let id = captcha(&state).await;
            state
                .register(&request(id, "8", "d1"), || async { Ok(UserId::new()) })
                .await
                .unwrap_err();
        }

        let id = captcha(&state).await;
        let err = state
            .register(&request(id, "7", "d1"), || async { Ok(UserId::new()) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooManyRequests);
        assert_ne!(err.message(), RegistrationLimit::Ip.message());
    }

    #[tokio::test]
    async fn test_throttled_sign_up_keeps_captcha() {
        let (_, state) = state_with(loose_endpoint());
        for device in ["d1", "d2", "d3"] {
            let id = captcha(&state).await;
            state
                .register(&request(id, "7", device), || async { Ok(UserId::new()) })
                .await
                .unwrap();
        }

        let id = captcha(&state).await;
        let err = state
            .register(&request(id.clone(), "7", "d4"), || async { Ok(UserId::new()) })
            .await
            .unwrap_err();
        assert_eq!(err.message(), RegistrationLimit::Ip.message());

        state.guard.verify_captcha(&id, "7").await.unwrap();
    }

    #[tokio::test]
    async fn test_register_redeems_invite_code() {
        let (_, state) = state();
        let inviter = UserId::new();
        state.ledger.open_wallet(&inviter).await.unwrap();
        let code = state.ledger.invite_code(&inviter).await.unwrap().code;

        let id = captcha(&state).await;
        let invitee = UserId::new();
        let invited = RegistrationRequest {
            invite_code: Some(code),
            ..request(id, "7", "device-a")
        };
        let wallet = state.register(&invited, || async { Ok(invitee) }).await.unwrap();
        assert_eq!((wallet.points, wallet.coins), (130, 50));
        assert_eq!(state.ledger.get_balance(&inviter).await.unwrap().points, 150);

        let id = captcha(&state).await;
        let unknown = RegistrationRequest {
            invite_code: Some("NOPE1234".to_owned()),
            ..request(id, "7", "device-b")
        };
        let wallet = state
            .register(&unknown, || async { Ok(UserId::new()) })
            .await
            .unwrap();
        assert_eq!(wallet.points, 100);
    }

    #[tokio::test]
    async fn test_chat_turn_is_rate_limited() {
        let (store, state) = state();
        let user = UserId::new();
        let character = Character::new(UserId::new(), "Mira", Utc::now());
        let character_id = character.id;
        store.insert_character(character).await;

        for _ in 0..30 {
            state.chat_turn("192.0.2.20", &user, &character_id).await.unwrap();
        }
        let err = state
            .chat_turn("192.0.2.20", &user, &character_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooManyRequests);

        let record = state.affinity.get_affinity(&user, &character_id).await.unwrap();
        assert_eq!(record.value, 30);
    }
}
