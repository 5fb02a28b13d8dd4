use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::password::hash_password,
    error::AppError,
    notify::ResetNotifier,
    users::{
        dto::{
            normalize_email_input, ForgotPasswordRequest, Page, PageMeta, ProfileRequest, PublicUser,
            ResetPasswordRequest,
        },
        repo::UserRepository,
        repo_types::{NewUser, User},
    },
    validation::{present, Input, Rule, Validator},
};

pub const RECOMMEND_PAGE_SIZE: i64 = 10;

const EMAIL_RULES: [Rule; 5] = [
    Rule::Required,
    Rule::String,
    Rule::Email,
    Rule::Max(255),
    Rule::Unique,
];
const KNOWN_EMAIL_RULES: [Rule; 5] = [
    Rule::Required,
    Rule::String,
    Rule::Email,
    Rule::Max(255),
    Rule::Exists,
];
const NAME_RULES: [Rule; 3] = [Rule::Required, Rule::String, Rule::Max(255)];
const PASSWORD_RULES: [Rule; 4] = [Rule::Required, Rule::String, Rule::Min(8), Rule::Max(30)];

async fn email_owner(
    repo: &dyn UserRepository,
    email: Option<&Input>,
) -> Result<Option<User>, AppError> {
    match email.and_then(Input::as_text) {
        Some(email) if !email.is_empty() => Ok(repo.find_by_email(email).await?),
        _ => Ok(None),
    }
}

#[instrument(skip(repo, input))]
pub async fn create_user(
    repo: &dyn UserRepository,
    input: ProfileRequest,
) -> Result<PublicUser, AppError> {
    let email = normalize_email_input(input.email.as_ref());
    let owner = email_owner(repo, email.as_ref()).await?;

    Validator::new()
        .email_owner(owner.as_ref())
        .field("name", input.name.as_ref(), &NAME_RULES)
        .field("email", email.as_ref(), &EMAIL_RULES)
        .field("password", input.password.as_ref(), &PASSWORD_RULES)
        .validate()?;

    let user = NewUser {
        name: present(input.name.as_ref(), "name")?.trim().to_string(),
        email: present(email.as_ref(), "email")?.to_string(),
        password_hash: hash_password(present(input.password.as_ref(), "password")?)?,
    };
    let user = repo.save(user).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user.into())
}

/// Only the account holder may change their own profile.
#[instrument(skip(repo, input))]
pub async fn update_user(
    repo: &dyn UserRepository,
    caller: Uuid,
    id: Uuid,
    input: ProfileRequest,
) -> Result<PublicUser, AppError> {
    if caller != id {
        warn!(%caller, target = %id, "profile update of another user refused");
        return Err(AppError::Forbidden(
            "You may only update your own profile".into(),
        ));
    }

    let target = repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let email = normalize_email_input(input.email.as_ref());
    let owner = email_owner(repo, email.as_ref()).await?;

    Validator::new()
        .email_owner(owner.as_ref())
        .ignoring(target.id)
        .field("name", input.name.as_ref(), &NAME_RULES)
        .field("email", email.as_ref(), &EMAIL_RULES)
        .field("password", input.password.as_ref(), &PASSWORD_RULES)
        .validate()?;

    let changed = User {
        name: present(input.name.as_ref(), "name")?.trim().to_string(),
        email: present(email.as_ref(), "email")?.to_string(),
        password_hash: hash_password(present(input.password.as_ref(), "password")?)?,
        ..target
    };
    let user = repo.update(&changed).await?;

    info!(user_id = %user.id, "user profile updated");
    Ok(user.into())
}

#[instrument(skip(repo))]
pub async fn current_user(repo: &dyn UserRepository, id: Uuid) -> Result<PublicUser, AppError> {
    repo.find_by_id(id)
        .await?
        .map(PublicUser::from)
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// A page of users in storage order. The caller is not filtered out.
#[instrument(skip(repo))]
pub async fn recommend_users(
    repo: &dyn UserRepository,
    page: i64,
) -> Result<Page<PublicUser>, AppError> {
    let page = page.max(1);
    let offset = (page - 1).saturating_mul(RECOMMEND_PAGE_SIZE);
    let users = repo.list(RECOMMEND_PAGE_SIZE, offset).await?;
    let total = repo.count().await?;

    Ok(Page {
        data: users.into_iter().map(PublicUser::from).collect(),
        meta: PageMeta {
            current_page: page,
            per_page: RECOMMEND_PAGE_SIZE,
            total,
            last_page: ((total + RECOMMEND_PAGE_SIZE - 1) / RECOMMEND_PAGE_SIZE).max(1),
        },
    })
}

#[instrument(skip(repo, notifier, input))]
pub async fn request_password_reset(
    repo: &dyn UserRepository,
    notifier: &dyn ResetNotifier,
    input: ForgotPasswordRequest,
) -> Result<(), AppError> {
    let email = normalize_email_input(input.email.as_ref());
    let owner = email_owner(repo, email.as_ref()).await?;

    Validator::new()
        .email_owner(owner.as_ref())
        .field("email", email.as_ref(), &KNOWN_EMAIL_RULES)
        .validate()?;

    let user = owner.ok_or_else(|| AppError::NotFound("User not found".into()))?;
    notifier.send_reset_link(&user).await?;
    Ok(())
}

/// Replaces the stored hash once every field validates. Nothing changes otherwise.
#[instrument(skip(repo, input))]
pub async fn reset_password(
    repo: &dyn UserRepository,
    input: ResetPasswordRequest,
) -> Result<(), AppError> {
    let email = normalize_email_input(input.email.as_ref());
    let owner = email_owner(repo, email.as_ref()).await?;

    let outcome = Validator::new()
        .email_owner(owner.as_ref())
        .field("email", email.as_ref(), &KNOWN_EMAIL_RULES)
        .field(
            "old_password",
            input.old_password.as_ref(),
            &[Rule::Required, Rule::String, Rule::Max(30), Rule::CurrentPassword],
        )
        .field(
            "new_password",
            input.new_password.as_ref(),
            &[Rule::Required, Rule::String, Rule::Max(30), Rule::Confirmed],
        )
        .field(
            "new_password_confirmation",
            input.new_password_confirmation.as_ref(),
            &[Rule::Required, Rule::String, Rule::Max(30)],
        )
        .validate();
    if let Err(e) = outcome {
        warn!(email = ?email.as_ref().and_then(Input::as_text), "password reset rejected");
        return Err(e);
    }

    let user = owner.ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let hash = hash_password(present(input.new_password.as_ref(), "new_password")?)?;
    repo.update_password_hash(user.id, &hash).await?;

    info!(user_id = %user.id, "password reset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::{auth::password::verify_password, users::memory::InMemoryUserRepository};

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ResetNotifier for RecordingNotifier {
        async fn send_reset_link(&self, user: &User) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(user.email.clone());
            Ok(())
        }
    }

    fn profile(name: &str, email: &str, password: &str) -> ProfileRequest {
        ProfileRequest {
            name: Some(name.into()),
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    fn reset(old: &str, new: &str, confirmation: &str) -> ResetPasswordRequest {
        ResetPasswordRequest {
            email: Some("a@x.com".into()),
            old_password: Some(old.into()),
            new_password: Some(new.into()),
            new_password_confirmation: Some(confirmation.into()),
        }
    }

    async fn seeded() -> (InMemoryUserRepository, String) {
        let repo = InMemoryUserRepository::new();
        create_user(&repo, profile("Ann", "a@x.com", "CorrectOld1"))
            .await
            .expect("seed user");
        let hash = stored_hash(&repo).await;
        (repo, hash)
    }

    async fn stored_hash(repo: &InMemoryUserRepository) -> String {
        repo.find_by_email("a@x.com")
            .await
            .unwrap()
            .expect("seeded user")
            .password_hash
    }

    fn bag(err: AppError) -> crate::validation::MessageBag {
        match err {
            AppError::Validation(bag) => bag,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_hashes_password_and_normalizes_email() {
        let repo = InMemoryUserRepository::new();
        let user = create_user(&repo, profile("Ann", " A@X.com ", "CorrectOld1"))
            .await
            .unwrap();
        assert_eq!(user.email, "a@x.com");

        let stored = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "CorrectOld1");
        assert!(verify_password("CorrectOld1", &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn create_with_taken_email_fails_and_stores_nothing() {
        let (repo, _) = seeded().await;
        let err = create_user(&repo, profile("Bob", "a@x.com", "Another11"))
            .await
            .unwrap_err();
        assert_eq!(bag(err).get("email"), ["The email has already been taken."]);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn create_reports_every_invalid_field() {
        let repo = InMemoryUserRepository::new();
        let err = create_user(&repo, ProfileRequest::default()).await.unwrap_err();
        let bag = bag(err);
        assert_eq!(bag.fields().collect::<Vec<_>>(), ["name", "email", "password"]);
    }

    #[tokio::test]
    async fn update_unknown_user_is_not_found() {
        let repo = InMemoryUserRepository::new();
        let ghost = Uuid::new_v4();
        let err = update_user(&repo, ghost, ghost, profile("Ann", "a@x.com", "CorrectOld1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_of_another_account_is_forbidden_and_changes_nothing() {
        let (repo, before) = seeded().await;
        let ann = repo.find_by_email("a@x.com").await.unwrap().unwrap();
        let mallory = create_user(&repo, profile("Mallory", "m@x.com", "Mallory11"))
            .await
            .unwrap();

        let err = update_user(&repo, mallory.id, ann.id, profile("Ann", "a@x.com", "Hijacked1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(stored_hash(&repo).await, before);
        assert!(verify_password("CorrectOld1", &before).unwrap());
    }

    #[tokio::test]
    async fn wrongly_typed_password_is_reported_with_the_confirmation_mismatch() {
        let (repo, before) = seeded().await;
        let mut input = reset("CorrectOld1", "NewPass1", "Other1");
        input.old_password = Some(Input::NotText);
        let bag = bag(reset_password(&repo, input).await.unwrap_err());
        assert_eq!(bag.get("old_password"), ["The old password must be a string."]);
        assert_eq!(
            bag.get("new_password"),
            ["The new password confirmation does not match."]
        );
        assert_eq!(stored_hash(&repo).await, before);
    }

    #[tokio::test]
    async fn update_may_keep_own_email_but_not_take_another() {
        let (repo, _) = seeded().await;
        let bob = create_user(&repo, profile("Bob", "b@x.com", "BobsPass1"))
            .await
            .unwrap();

        let kept = update_user(&repo, bob.id, bob.id, profile("Robert", "b@x.com", "BobsPass2"))
            .await
            .unwrap();
        assert_eq!(kept.name, "Robert");

        let err = update_user(&repo, bob.id, bob.id, profile("Robert", "a@x.com", "BobsPass2"))
            .await
            .unwrap_err();
        assert!(bag(err).has("email"));
    }

    #[tokio::test]
    async fn wrong_old_password_leaves_hash_unchanged() {
        let (repo, before) = seeded().await;
        let err = reset_password(&repo, reset("wrong", "NewPass1", "NewPass1"))
            .await
            .unwrap_err();
        let bag = bag(err);
        assert_eq!(bag.fields().collect::<Vec<_>>(), ["old_password"]);
        assert_eq!(bag.get("old_password"), ["The old password is incorrect."]);
        assert_eq!(stored_hash(&repo).await, before);
    }

    #[tokio::test]
    async fn mismatched_confirmation_leaves_hash_unchanged() {
        let (repo, before) = seeded().await;
        let err = reset_password(&repo, reset("CorrectOld1", "NewPass1", "NewPass2"))
            .await
            .unwrap_err();
        assert_eq!(
            bag(err).get("new_password"),
            ["The new password confirmation does not match."]
        );
        assert_eq!(stored_hash(&repo).await, before);
    }

    #[tokio::test]
    async fn reset_reports_all_failures_together() {
        let (repo, before) = seeded().await;
        let err = reset_password(&repo, reset("wrong", "NewPass1", "NewPass2"))
            .await
            .unwrap_err();
        let bag = bag(err);
        assert!(bag.has("old_password"));
        assert!(bag.has("new_password"));
        assert_eq!(stored_hash(&repo).await, before);
    }

    #[tokio::test]
    async fn unknown_email_fails_email_and_old_password() {
        let (repo, _) = seeded().await;
        let mut input = reset("CorrectOld1", "NewPass1", "NewPass1");
        input.email = Some("nobody@x.com".into());
        let bag = bag(reset_password(&repo, input).await.unwrap_err());
        assert_eq!(bag.get("email"), ["The selected email is invalid."]);
        assert!(bag.has("old_password"));
    }

    #[tokio::test]
    async fn successful_reset_swaps_credentials() {
        let (repo, _) = seeded().await;
        reset_password(&repo, reset("CorrectOld1", "NewPass1", "NewPass1"))
            .await
            .expect("reset should succeed");

        let hash = stored_hash(&repo).await;
        assert!(!verify_password("CorrectOld1", &hash).unwrap());
        assert!(verify_password("NewPass1", &hash).unwrap());
    }

    #[tokio::test]
    async fn forgot_password_notifies_known_user_only() {
        let (repo, _) = seeded().await;
        let notifier = RecordingNotifier::default();

        request_password_reset(
            &repo,
            &notifier,
            ForgotPasswordRequest {
                email: Some("A@x.com".into()),
            },
        )
        .await
        .unwrap();

        let err = request_password_reset(
            &repo,
            &notifier,
            ForgotPasswordRequest {
                email: Some("nobody@x.com".into()),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(bag(err).get("email"), ["The selected email is invalid."]);
        assert_eq!(*notifier.sent.lock().unwrap(), ["a@x.com"]);
    }

    #[tokio::test]
    async fn recommend_caps_page_at_ten() {
        let repo = InMemoryUserRepository::new();
        for i in 0..3 {
            repo.save(NewUser {
                name: format!("u{i}"),
                email: format!("u{i}@x.com"),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();
        }
        let page = recommend_users(&repo, 1).await.unwrap();
        assert_eq!(page.data.len(), 3);
        assert_eq!(page.meta.last_page, 1);

        for i in 3..12 {
            repo.save(NewUser {
                name: format!("u{i}"),
                email: format!("u{i}@x.com"),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();
        }
        let first = recommend_users(&repo, 0).await.unwrap();
        assert_eq!(first.data.len(), 10);
        assert_eq!(first.meta.current_page, 1);
        assert_eq!(first.meta.total, 12);
        assert_eq!(first.meta.last_page, 2);
        assert_eq!(recommend_users(&repo, 2).await.unwrap().data.len(), 2);
    }
}
