use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use serde::{Deserialize, Serialize};

/// Tokens are issued by the identity service; `sign` exists for operators and tests.
const TOKEN_LIFETIME_DAYS: i64 = 7;

/// JWT Claims structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // Email
    pub uid: i32,     // User ID
    pub role: String, // `admin` or `user`
    pub exp: usize,   // Expiration timestamp
}

/// Sign a new JWT token for a user.
pub fn sign(secret: &str, user_id: i32, email: &str, role: &str) -> Result<String, Error> {
    let expiration = (Utc::now() + Duration::days(TOKEN_LIFETIME_DAYS)).timestamp();

    let claims = Claims {
        sub: email.to_owned(),
        uid: user_id,
        role: role.to_owned(),
        exp: expiration as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify and decode a JWT token.
pub fn verify(secret: &str, token: &str) -> Result<Claims, Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}
