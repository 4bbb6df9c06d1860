use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{present, Validate};
use crate::access::require_admin;
use crate::auth::{hash_password, issue_tokens, validate_jwt, verify_password, TokenPair};
use crate::config::Config;
use crate::error::AppError;
use crate::ids::{existing_id, RecordId};
use crate::models::{Caller, User};
use crate::storage::Storage;

const USER_NOT_FOUND: &str = "User not found";
const WRONG_CREDENTIALS: &str = "Email or password is wrong";
const EMAIL_IN_USE: &str = "Email in use";
const MIN_PASSWORD: usize = 4;
const MAX_PASSWORD: usize = 22;

pub const AVATAR_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Deserialize, Debug, Clone, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AddUser {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub pm: bool,
}

#[derive(Deserialize, Debug, Clone, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RegisterUser {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize, Debug, Clone, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RefreshBody {
    pub refresh_token: String,
}

/// Profile edit. Empty strings leave the stored value untouched.
#[derive(Deserialize, Debug, Clone, Default, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub admin: Option<bool>,
    pub pm: Option<bool>,
}

#[derive(Serialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tokens {
    pub token: String,
    pub refresh_token: String,
}

impl From<TokenPair> for Tokens {
    fn from(pair: TokenPair) -> Self {
        Self {
            token: pair.token,
            refresh_token: pair.refresh_token,
        }
    }
}

fn valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .map_or(false, |(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}

fn check_email(email: &str) -> Result<(), String> {
    if valid_email(email) {
        Ok(())
    } else {
        Err("\"email\" must be a valid email".to_string())
    }
}

fn check_password(password: &str) -> Result<(), String> {
    let len = password.trim().chars().count();
    if (MIN_PASSWORD..=MAX_PASSWORD).contains(&len) {
        Ok(())
    } else {
        Err(format!(
            "Password must be between {MIN_PASSWORD} and {MAX_PASSWORD} characters long"
        ))
    }
}

impl Validate for AddUser {
    fn validate(&self) -> Result<(), String> {
        check_email(&self.email)?;
        check_password(&self.password)
    }
}

impl Validate for RegisterUser {
    fn validate(&self) -> Result<(), String> {
        check_email(&self.email)?;
        check_password(&self.password)
    }
}

impl Validate for LoginBody {
    fn validate(&self) -> Result<(), String> {
        check_email(&self.email)?;
        check_password(&self.password)
    }
}

impl Validate for RefreshBody {
    fn validate(&self) -> Result<(), String> {
        super::non_empty(&self.refresh_token, "refreshToken")
    }
}

impl Validate for UpdateUser {
    fn validate(&self) -> Result<(), String> {
        if let Some(email) = present(&self.email) {
            check_email(email)?;
        }
        if let Some(password) = present(&self.password) {
            check_password(password)?;
        }
        Ok(())
    }
}

fn mint(id: &RecordId, config: &Config) -> Result<TokenPair, AppError> {
    issue_tokens(id, config).map_err(|e| AppError::Unexpected(format!("token signing failed: {e}")))
}

fn insert_user(storage: &Storage, config: &Config, body: AddUser) -> Result<User, AppError> {
    let now = chrono::Utc::now();
    let user = User {
        id: RecordId::generate(),
        email: body.email.trim().to_string(),
        password: hash_password(body.password.trim(), config.bcrypt_cost)?,
        name: present(&body.name).map(str::to_string),
        phone: present(&body.phone).map(str::to_string),
        avatar_url: None,
        admin: body.admin,
        pm: body.pm,
        token: None,
        refresh_token: None,
        created_at: now,
        updated_at: now,
    };
    if !storage.create_user(&user)? {
        return Err(AppError::Conflict(EMAIL_IN_USE.to_string()));
    }
    tracing::info!(user = %user.id, admin = user.admin, pm = user.pm, "user created");
    Ok(user)
}

/// Admin-only account creation.
pub fn add(storage: &Storage, config: &Config, caller: &Caller, body: AddUser) -> Result<User, AppError> {
    require_admin(caller).into_result()?;
    insert_user(storage, config, body)
}

/// Self-service sign-up. Never grants roles.
pub fn register(storage: &Storage, config: &Config, body: RegisterUser) -> Result<User, AppError> {
    if !config.allow_registration {
        return Err(AppError::AccessDenied("Registration is disabled".to_string()));
    }
    let body = AddUser {
        email: body.email,
        password: body.password,
        name: body.name,
        phone: body.phone,
        admin: false,
        pm: false,
    };
    insert_user(storage, config, body)
}

/// Verifies credentials and opens a new session, replacing any previous one.
pub fn login(storage: &Storage, config: &Config, body: LoginBody) -> Result<(User, TokenPair), AppError> {
    let wrong = || AppError::Unauthenticated(WRONG_CREDENTIALS.to_string());
    let user = storage.find_user_by_email(body.email.trim())?.ok_or_else(wrong)?;
    if !verify_password(body.password.trim(), &user.password)? {
        tracing::debug!(user = %user.id, "password mismatch");
        return Err(wrong());
    }
    let (user, pair) = start_session(storage, config, &user.id)?.ok_or_else(wrong)?;
    tracing::info!(user = %user.id, "user logged in");
    Ok((user, pair))
}

fn start_session(
    storage: &Storage,
    config: &Config,
    id: &RecordId,
) -> Result<Option<(User, TokenPair)>, AppError> {
    let pair = mint(id, config)?;
    let updated = storage.users.update_with(id, |user| {
        user.token = Some(pair.token.clone());
        user.refresh_token = Some(pair.refresh_token.clone());
        user.touch();
        Ok::<_, AppError>(())
    })?;
    Ok(updated.map(|(user, ())| (user, pair)))
}

pub fn logout(storage: &Storage, caller: &Caller) -> Result<(), AppError> {
    storage
        .users
        .update_with(&caller.id, |user| {
            user.token = None;
            user.refresh_token = None;
            user.touch();
            Ok::<_, AppError>(())
        })?
        .ok_or_else(AppError::unauthorized)?;
    tracing::info!(user = %caller.id, "user logged out");
    Ok(())
}

/// Rotates the session. The refresh token must be the one issued last.
pub fn refresh(storage: &Storage, config: &Config, body: RefreshBody) -> Result<TokenPair, AppError> {
    let user = resolve_token(storage, &body.refresh_token, &config.refresh_secret, |u| {
        u.refresh_token.as_deref()
    })?;
    let (_, pair) = start_session(storage, config, &user.id)?.ok_or_else(AppError::unauthorized)?;
    tracing::debug!(user = %user.id, "session refreshed");
    Ok(pair)
}

/// The user owning a bearer access token, if that token is still the live one.
pub fn resolve_session(storage: &Storage, config: &Config, token: &str) -> Result<User, AppError> {
    resolve_token(storage, token, &config.token_secret, |u| u.token.as_deref())
}

fn resolve_token<F>(storage: &Storage, token: &str, secret: &str, stored: F) -> Result<User, AppError>
where
    F: Fn(&User) -> Option<&str>,
{
    let claims = validate_jwt(token, secret).map_err(|e| {
        tracing::debug!(error = %e, "token rejected");
        AppError::unauthorized()
    })?;
    let id: RecordId = claims.id.parse().map_err(|_| AppError::unauthorized())?;
    let user = storage.users.get(&id)?.ok_or_else(AppError::unauthorized)?;
    if stored(&user) != Some(token) {
        return Err(AppError::unauthorized());
    }
    Ok(user)
}

pub fn current(storage: &Storage, caller: &Caller) -> Result<User, AppError> {
    storage.users.get(&caller.id)?.ok_or_else(AppError::unauthorized)
}

/// Edits the caller's own profile. Role flags may only change when the
/// caller is an admin.
pub fn update_self(storage: &Storage, config: &Config, caller: &Caller, body: UpdateUser) -> Result<User, AppError> {
    let escalates = body.admin.map_or(false, |v| v != caller.admin) || body.pm.map_or(false, |v| v != caller.pm);
    if escalates && !caller.admin {
        return Err(AppError::AccessDenied("Access denied: Admin only".to_string()));
    }
    apply_edit(storage, config, &caller.id, body)?.ok_or_else(AppError::unauthorized)
}

/// Admin edit of another account.
pub fn edit(storage: &Storage, config: &Config, caller: &Caller, id: &str, body: UpdateUser) -> Result<User, AppError> {
    let id = existing_id(id, USER_NOT_FOUND)?;
    if id == caller.id {
        return Err(AppError::Conflict("Can't edit current user!".to_string()));
    }
    require_admin(caller).into_result()?;
    apply_edit(storage, config, &id, body)?.ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))
}

fn apply_edit(storage: &Storage, config: &Config, id: &RecordId, body: UpdateUser) -> Result<Option<User>, AppError> {
    let password = match present(&body.password) {
        Some(raw) => Some(hash_password(raw, config.bcrypt_cost)?),
        None => None,
    };
    let new_email = present(&body.email).map(str::to_string);
    if let Some(email) = &new_email {
        if !storage.claim_email(email, id)? {
            return Err(AppError::Conflict(EMAIL_IN_USE.to_string()));
        }
    }

    let mut old_email = None;
    let result = storage.users.update_with(id, |user| {
        if let Some(name) = present(&body.name) {
            user.name = Some(name.to_string());
        }
        if let Some(phone) = present(&body.phone) {
            user.phone = Some(phone.to_string());
        }
        if let Some(email) = &new_email {
            old_email = Some(std::mem::replace(&mut user.email, email.clone()));
        }
        if let Some(hash) = &password {
            user.password = hash.clone();
        }
        if let Some(admin) = body.admin {
            user.admin = admin;
        }
        if let Some(pm) = body.pm {
            user.pm = pm;
        }
        user.touch();
        Ok::<_, AppError>(())
    });

    let committed = matches!(result, Ok(Some(_)));
    if let Some(email) = &new_email {
        // Hand back whichever address the document no longer carries.
        let stale = if committed { old_email.filter(|old| old != email) } else { Some(email.clone()) };
        if let Some(stale) = stale {
            storage.release_email(&stale, id)?;
        }
    }

    let updated = result?.map(|(user, ())| user);
    if let Some(user) = &updated {
        tracing::info!(user = %user.id, "user updated");
    }
    Ok(updated)
}

/// Avatar file name for the caller, from the uploaded file's name.
pub fn avatar_file_name(caller: &Caller, original: &str) -> Result<String, AppError> {
    let ext = original
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| AVATAR_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| {
            AppError::Validation(format!("Avatar must be one of: {}", AVATAR_EXTENSIONS.join(", ")))
        })?;
    Ok(format!("{}_{}.{ext}", caller.id, uuid::Uuid::new_v4().simple()))
}

pub fn set_avatar(storage: &Storage, caller: &Caller, file_name: &str) -> Result<User, AppError> {
    let url = format!("/avatars/{file_name}");
    let (user, ()) = storage
        .users
        .update_with(&caller.id, |user| {
            user.avatar_url = Some(url.clone());
            user.touch();
            Ok::<_, AppError>(())
        })?
        .ok_or_else(AppError::unauthorized)?;
    Ok(user)
}

pub fn all(storage: &Storage, caller: &Caller) -> Result<Vec<User>, AppError> {
    require_admin(caller).into_result()?;
    Ok(storage.users.all()?)
}

pub fn delete(storage: &Storage, caller: &Caller, id: &str) -> Result<User, AppError> {
    let id = existing_id(id, USER_NOT_FOUND)?;
    if id == caller.id {
        return Err(AppError::Conflict("Can't delete current user!".to_string()));
    }
    require_admin(caller).into_result()?;
    let user = storage
        .delete_user(&id)?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))?;
    tracing::info!(user = %user.id, by = %caller.id, "user deleted");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing;

    fn admin(storage: &Storage, config: &Config) -> (User, Caller) {
        let now = chrono::Utc::now();
        let user = User {
            id: RecordId::generate(),
            email: "root@example.com".into(),
            password: hash_password("rootpass", config.bcrypt_cost).unwrap(),
            name: Some("Root".into()),
            phone: None,
            avatar_url: None,
            admin: true,
            pm: false,
            token: None,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        assert!(storage.create_user(&user).unwrap());
        let caller = Caller::from(&user);
        (user, caller)
    }

    fn add_body(email: &str) -> AddUser {
        AddUser {
            email: email.into(),
            password: "secret1".into(),
            name: Some("Dana".into()),
            phone: Some("".into()),
            admin: false,
            pm: true,
        }
    }

    fn login_body(email: &str, password: &str) -> LoginBody {
        LoginBody { email: email.into(), password: password.into() }
    }

    #[test]
    fn validation_rules() {
        assert!(add_body("dana@example.com").validate().is_ok());
        assert!(add_body("not-an-email").validate().is_err());
        assert!(add_body("a@b").validate().is_err());
        let mut short = add_body("dana@example.com");
        short.password = "abc".into();
        assert!(short.validate().is_err());

        let blank = UpdateUser { email: Some("".into()), password: Some(" ".into()), ..Default::default() };
        assert!(blank.validate().is_ok());
        let bad = UpdateUser { password: Some("x".into()), ..Default::default() };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn add_requires_admin_and_unique_email() {
        let storage = Storage::temporary().unwrap();
        let config = testing::config();
        let (_, root) = admin(&storage, &config);

        let pm = testing::caller(false, true);
        let err = add(&storage, &config, &pm, add_body("dana@example.com")).unwrap_err();
        assert!(matches!(err, AppError::AccessDenied(_)));

        let user = add(&storage, &config, &root, add_body("dana@example.com")).unwrap();
        assert!(user.pm);
        assert_eq!(user.phone, None);

        let err = add(&storage, &config, &root, add_body("dana@example.com")).unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg == EMAIL_IN_USE));
    }

    #[test]
    fn register_is_gated_and_never_grants_roles() {
        let storage = Storage::temporary().unwrap();
        let mut config = testing::config();
        let body = RegisterUser {
            email: "new@example.com".into(),
            password: "secret1".into(),
            name: None,
            phone: None,
        };

        let err = register(&storage, &config, body.clone()).unwrap_err();
        assert!(matches!(err, AppError::AccessDenied(_)));

        config.allow_registration = true;
        let user = register(&storage, &config, body).unwrap();
        assert!(!user.admin && !user.pm);
    }

    #[test]
    fn login_issues_a_session_and_logout_ends_it() {
        let storage = Storage::temporary().unwrap();
        let config = testing::config();
        admin(&storage, &config);

        let err = login(&storage, &config, login_body("root@example.com", "wrongpass")).unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(msg) if msg == WRONG_CREDENTIALS));
        let err = login(&storage, &config, login_body("nobody@example.com", "rootpass")).unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));

        let (user, pair) = login(&storage, &config, login_body("root@example.com", "rootpass")).unwrap();
        let resolved = resolve_session(&storage, &config, &pair.token).unwrap();
        assert_eq!(resolved.id, user.id);

        // The refresh token is signed with the other secret.
        assert!(resolve_session(&storage, &config, &pair.refresh_token).is_err());

        logout(&storage, &Caller::from(&user)).unwrap();
        let err = resolve_session(&storage, &config, &pair.token).unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[test]
    fn a_new_login_replaces_the_previous_session() {
        let storage = Storage::temporary().unwrap();
        let config = testing::config();
        admin(&storage, &config);

        let (_, first) = login(&storage, &config, login_body("root@example.com", "rootpass")).unwrap();
        let (_, second) = login(&storage, &config, login_body("root@example.com", "rootpass")).unwrap();
        assert!(resolve_session(&storage, &config, &first.token).is_err());
        assert!(resolve_session(&storage, &config, &second.token).is_ok());
    }

    #[test]
    fn refresh_rotates_both_tokens() {
        let storage = Storage::temporary().unwrap();
        let config = testing::config();
        admin(&storage, &config);
        let (_, pair) = login(&storage, &config, login_body("root@example.com", "rootpass")).unwrap();

        let rotated = refresh(&storage, &config, RefreshBody { refresh_token: pair.refresh_token.clone() }).unwrap();
        assert_ne!(rotated.token, pair.token);
        assert!(resolve_session(&storage, &config, &rotated.token).is_ok());

        // The old refresh token was replaced and cannot be replayed.
        let err = refresh(&storage, &config, RefreshBody { refresh_token: pair.refresh_token }).unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));

        let err = refresh(&storage, &config, RefreshBody { refresh_token: rotated.token }).unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[test]
    fn update_self_ignores_blanks_and_moves_the_email_index() {
        let storage = Storage::temporary().unwrap();
        let config = testing::config();
        let (_, root) = admin(&storage, &config);
        let dana = add(&storage, &config, &root, add_body("dana@example.com")).unwrap();
        let caller = Caller::from(&dana);

        let body = UpdateUser {
            name: Some("".into()),
            email: Some("dana@corp.example.com".into()),
            password: Some("newpass".into()),
            ..Default::default()
        };
        let updated = update_self(&storage, &config, &caller, body).unwrap();
        assert_eq!(updated.name.as_deref(), Some("Dana"));
        assert_eq!(updated.email, "dana@corp.example.com");

        assert!(storage.find_user_by_email("dana@example.com").unwrap().is_none());
        assert!(login(&storage, &config, login_body("dana@corp.example.com", "newpass")).is_ok());

        let taken = UpdateUser { email: Some("root@example.com".into()), ..Default::default() };
        let err = update_self(&storage, &config, &caller, taken).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let root_user = storage.find_user_by_email("root@example.com").unwrap().unwrap();
        assert_eq!(root_user.id, root.id);
    }

    #[test]
    fn non_admins_cannot_change_their_roles() {
        let storage = Storage::temporary().unwrap();
        let config = testing::config();
        let (_, root) = admin(&storage, &config);
        let dana = add(&storage, &config, &root, add_body("dana@example.com")).unwrap();
        let caller = Caller::from(&dana);

        let escalate = UpdateUser { admin: Some(true), ..Default::default() };
        let err = update_self(&storage, &config, &caller, escalate).unwrap_err();
        assert!(matches!(err, AppError::AccessDenied(_)));

        // Restating the current flags is harmless.
        let same = UpdateUser { pm: Some(true), admin: Some(false), ..Default::default() };
        assert!(update_self(&storage, &config, &caller, same).is_ok());
    }

    #[test]
    fn admin_cannot_delete_or_edit_themself() {
        let storage = Storage::temporary().unwrap();
        let config = testing::config();
        let (_, root) = admin(&storage, &config);
        let own = root.id.to_string();

        let err = delete(&storage, &root, &own).unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg == "Can't delete current user!"));
        let err = edit(&storage, &config, &root, &own, UpdateUser::default()).unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg == "Can't edit current user!"));
        assert!(storage.users.get(&root.id).unwrap().is_some());
    }

    #[test]
    fn self_delete_or_edit_conflicts_without_admin() {
        let storage = Storage::temporary().unwrap();
        let config = testing::config();
        let caller = testing::caller(false, true);
        let own = caller.id.to_string();

        let err = delete(&storage, &caller, &own).unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg == "Can't delete current user!"));
        let err = edit(&storage, &config, &caller, &own, UpdateUser::default()).unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg == "Can't edit current user!"));

        let other = RecordId::generate().to_string();
        let err = delete(&storage, &caller, &other).unwrap_err();
        assert!(matches!(err, AppError::AccessDenied(_)));
        let err = edit(&storage, &config, &caller, &other, UpdateUser::default()).unwrap_err();
        assert!(matches!(err, AppError::AccessDenied(_)));
    }

    #[test]
    fn admin_edit_and_delete_other_users() {
        let storage = Storage::temporary().unwrap();
        let config = testing::config();
        let (_, root) = admin(&storage, &config);
        let dana = add(&storage, &config, &root, add_body("dana@example.com")).unwrap();
        let id = dana.id.to_string();

        let promoted = edit(&storage, &config, &root, &id, UpdateUser { admin: Some(true), ..Default::default() }).unwrap();
        assert!(promoted.admin);

        let err = delete(&storage, &root, "garbage").unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let removed = delete(&storage, &root, &id).unwrap();
        assert_eq!(removed.id, dana.id);
        let err = delete(&storage, &root, &id).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(all(&storage, &root).unwrap().len(), 1);
    }

    #[test]
    fn avatar_names_keep_allowed_extensions_only() {
        let caller = testing::caller(false, false);
        let name = avatar_file_name(&caller, "me.PNG").unwrap();
        assert!(name.starts_with(caller.id.as_str()));
        assert!(name.ends_with(".png"));
        assert!(avatar_file_name(&caller, "script.sh").is_err());
        assert!(avatar_file_name(&caller, "noext").is_err());
    }
}
