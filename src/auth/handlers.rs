use crate::{
    auth::{
        auth::unauthorized,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    context::AppContext,
    error::ServiceError,
    model::{
        role::Role,
        user::{NewUser, User},
    },
    models::{LoginReqDto, RefreshReq, RegisterReq, TokenPair, TokenType},
    store::StoreError,
};
use actix_web::{HttpResponse, error::ErrorInternalServerError, web};
use serde_json::json;
use tracing::{debug, error, info, instrument};

const MAX_USERNAME_LEN: usize = 80;

/// true  => username AVAILABLE
/// false => username TAKEN
///
/// Filter miss is a definite "free"; cache hit is a definite "taken";
/// anything else is settled by the database.
pub async fn is_username_available(ctx: &AppContext, username: &str) -> Result<bool, StoreError> {
    if !ctx.username_filter.might_exist(username) {
        return Ok(true);
    }

    if ctx.username_cache.is_taken(username).await {
        return Ok(false);
    }

    let exists = ctx.store.find_user_by_username(username).await?.is_some();
    if exists {
        ctx.username_cache.mark_taken(username).await;
    }
    Ok(!exists)
}

fn issue_tokens(
    user_id: u64,
    username: &str,
    role: Role,
    config: &Config,
) -> actix_web::Result<TokenPair> {
    let access_token = generate_access_token(
        user_id,
        username,
        role,
        &config.jwt_access_secret,
        config.access_token_ttl,
    );
    let refresh_token = generate_refresh_token(
        user_id,
        username,
        role,
        &config.jwt_refresh_secret,
        config.refresh_token_ttl,
    );

    match (access_token, refresh_token) {
        (Ok(access_token), Ok((refresh_token, _))) => Ok(TokenPair {
            access_token,
            refresh_token,
        }),
        (Err(e), _) | (_, Err(e)) => {
            error!(error = %e, user_id, "Failed to sign token");
            Err(ErrorInternalServerError("Internal Server Error"))
        }
    }
}

/// User registration handler
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "User registered", body = Object, example = json!({
            "message": "User registered successfully",
            "id": 1
        })),
        (status = 400, description = "Blank username or password"),
        (status = 409, description = "Username already taken")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip(ctx, user), fields(username = %user.username))]
pub async fn register(
    user: web::Json<RegisterReq>,
    ctx: web::Data<AppContext>,
) -> actix_web::Result<HttpResponse> {
    let RegisterReq {
        username,
        password,
        role,
    } = user.into_inner();
    let username = username.trim().to_string();

    if username.is_empty() || password.is_empty() {
        return Err(
            ServiceError::Validation("username and password must not be empty".into()).into(),
        );
    }

    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ServiceError::Validation(format!(
            "username must be at most {MAX_USERNAME_LEN} characters"
        ))
        .into());
    }

    if !is_username_available(&ctx, &username)
        .await
        .map_err(ServiceError::from)?
    {
        return Err(ServiceError::Conflict("username already taken").into());
    }

    let password_hash = hash_password(&password).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        ErrorInternalServerError("Internal Server Error")
    })?;

    let created = ctx
        .store
        .create_user(NewUser {
            username,
            password_hash,
            role,
        })
        .await
        .map_err(|e| match e {
            StoreError::UniqueViolation => ServiceError::Conflict("username already taken"),
            other => other.into(),
        })?;

    ctx.username_filter.insert(&created.username);
    ctx.username_cache.mark_taken(&created.username).await;
    info!(user_id = created.id, role = %created.role, "User registered");

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "id": created.id
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 400, description = "Blank username or password"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(ctx, config, user), fields(username = %user.username))]
pub async fn login(
    user: web::Json<LoginReqDto>,
    ctx: web::Data<AppContext>,
    config: web::Data<Config>,
) -> actix_web::Result<HttpResponse> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        return Err(ServiceError::Validation("username and password required".into()).into());
    }

    let db_user: User = match ctx
        .store
        .find_user_by_username(user.username.trim())
        .await
        .map_err(ServiceError::from)?
    {
        Some(found) => found,
        None => {
            info!("Invalid credentials: user not found");
            return Err(unauthorized("Invalid credentials"));
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password_hash) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(unauthorized("Invalid credentials"));
    }
    debug!(user_id = db_user.id, "Password verified");

    let tokens = issue_tokens(db_user.id, &db_user.username, db_user.role, &config)?;
    info!(user_id = db_user.id, "Login successful");

    Ok(HttpResponse::Ok().json(tokens))
}

/// Trades a refresh token for a fresh pair. Role is re-read so a changed
/// account is reflected in the new access token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshReq,
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Invalid, expired or wrong kind of token")
    ),
    tag = "Auth"
)]
pub async fn refresh_token(
    body: web::Json<RefreshReq>,
    ctx: web::Data<AppContext>,
    config: web::Data<Config>,
) -> actix_web::Result<HttpResponse> {
    let claims = match verify_token(&body.refresh_token, &config.jwt_refresh_secret) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "Refresh token rejected");
            return Err(unauthorized("Invalid or expired refresh token"));
        }
    };

    if claims.token_type != TokenType::Refresh {
        return Err(unauthorized("Refresh token required"));
    }

    let user = ctx
        .store
        .find_user(claims.user_id)
        .await
        .map_err(ServiceError::from)?
        .ok_or_else(|| unauthorized("Account no longer exists"))?;

    let tokens = issue_tokens(user.id, &user.username, user.role, &config)?;
    Ok(HttpResponse::Ok().json(tokens))
}
