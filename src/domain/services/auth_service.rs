use std::sync::Arc;
use crate::domain::{
    models::{auth::{Claims, RefreshTokenRecord}, user::User},
    ports::RefreshTokenRepository
};
use crate::error::AppError;
use crate::config::Config;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use argon2::{password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString}, Argon2};
use rand::rngs::OsRng;
use uuid::Uuid;
use chrono::{Utc, Duration};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Sha256, Digest};

pub const TOKEN_AUDIENCE: &str = "fitness-studio";

pub struct AuthService {
    tokens: Arc<dyn RefreshTokenRepository>,
    config: Config,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(tokens: Arc<dyn RefreshTokenRepository>, config: Config) -> Result<Self, AppError> {
        let encoding_key = EncodingKey::from_ed_pem(config.jwt_secret_key.as_bytes())
            .map_err(|e| AppError::InternalWithMsg(format!("Invalid JWT private key PEM: {e}")))?;

        let decoding_key = DecodingKey::from_ed_pem(config.jwt_public_key.as_bytes())
            .map_err(|e| AppError::InternalWithMsg(format!("Invalid JWT public key PEM: {e}")))?;

        Ok(Self { tokens, config, encoding_key, decoding_key })
    }

    /// Checks signature, expiry, issuer and audience of an access token.
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_audience(&[TOKEN_AUDIENCE]);
        validation.set_issuer(&[self.config.auth_issuer.as_str()]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthorized)
    }

    pub async fn login(&self, user: &User) -> Result<(String, String), AppError> {
        let family_id = Uuid::new_v4().to_string();
        self.issue_token_pair(user, &family_id, 1).await
    }

    /// Spends a refresh token. Unknown, already used and expired tokens are
    /// all rejected the same way; an expired token is still removed.
    pub async fn redeem(&self, raw_refresh_token: &str) -> Result<RefreshTokenRecord, AppError> {
        let token_hash = self.hash_token(raw_refresh_token);
        let record = self.tokens.consume(&token_hash).await?
            .ok_or(AppError::Unauthorized)?;

        if record.expires_at < Utc::now() {
            return Err(AppError::Unauthorized);
        }
        Ok(record)
    }

    /// Issues the next pair in the family of a redeemed token.
    pub async fn rotate(&self, user: &User, redeemed: &RefreshTokenRecord) -> Result<(String, String), AppError> {
        if redeemed.user_id != user.id {
            return Err(AppError::Unauthorized);
        }
        self.issue_token_pair(user, &redeemed.family_id, redeemed.generation_id + 1).await
    }

    pub async fn logout(&self, raw_refresh_token: &str) -> Result<(), AppError> {
        let token_hash = self.hash_token(raw_refresh_token);
        if let Some(record) = self.tokens.find_by_hash(&token_hash).await? {
            let revoked = self.tokens.revoke_family(&record.family_id).await?;
            tracing::debug!("Revoked {} refresh tokens in family {}", revoked, record.family_id);
        }
        Ok(())
    }

    async fn issue_token_pair(&self, user: &User, family_id: &str, generation_id: i32) -> Result<(String, String), AppError> {
        let now = Utc::now();
        let exp = (now + Duration::minutes(15)).timestamp() as usize;

        let claims = Claims {
            iss: self.config.auth_issuer.clone(),
            sub: user.id.clone(),
            aud: TOKEN_AUDIENCE.to_string(),
            exp,
            iat: now.timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
            email: user.email.clone(),
            role: user.role.clone(),
        };

        let access_token = encode(&Header::new(Algorithm::EdDSA), &claims, &self.encoding_key)
            .map_err(|e| {
                tracing::error!("JWT encoding failed: {}", e);
                AppError::Internal
            })?;

        let refresh_token: String = rand::thread_rng().sample_iter(&Alphanumeric).take(64).map(char::from).collect();

        let refresh_record = RefreshTokenRecord {
            token_hash: self.hash_token(&refresh_token),
            user_id: user.id.clone(),
            family_id: family_id.to_string(),
            generation_id,
            expires_at: now + Duration::days(1),
            created_at: now,
        };

        self.tokens.insert(&refresh_record).await?;
        Ok((access_token, refresh_token))
    }

    fn hash_token(&self, token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalWithMsg(format!("Password hashing failed: {e}")))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<(), AppError> {
    let parsed_hash = PasswordHash::new(password_hash).map_err(|_| AppError::Internal)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::Unauthorized)
}
