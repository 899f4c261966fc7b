mod extract;
pub mod permissions;

pub use extract::CurrentUser;

use std::env;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// 令牌类别
///
/// access 用于携带请求，refresh 只能用于换发 access，不可互换。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn lifetime(self) -> TimeDelta {
        match self {
            TokenKind::Access => TimeDelta::minutes(15),
            TokenKind::Refresh => TimeDelta::days(7),
        }
    }
}

/// JWT 载荷
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// 用户 id
    pub sub: i64,
    /// 过期时间（unix 秒）
    pub exp: i64,
    /// 令牌类别，防止 access/refresh 混用
    pub kind: TokenKind,
}

/// HS256 签发与校验密钥
#[derive(Clone)]
pub struct TokenKeys {
    enc: EncodingKey,
    dec: DecodingKey,
}

impl TokenKeys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            enc: EncodingKey::from_secret(secret),
            dec: DecodingKey::from_secret(secret),
        }
    }

    /// 从环境变量 `BLOGAPI_JWT_SECRET` 构建密钥
    pub fn from_env() -> Self {
        let secret = env::var("BLOGAPI_JWT_SECRET").expect("环境变量: `BLOGAPI_JWT_SECRET`: NotPresent");
        Self::new(secret.as_bytes())
    }

    /// 为用户签发指定类别的令牌
    pub fn issue(&self, user_id: i64, kind: TokenKind) -> Result<String> {
        let claims = Claims {
            sub: user_id,
            exp: (Utc::now() + kind.lifetime()).timestamp(),
            kind,
        };
        Ok(encode(&Header::default(), &claims, &self.enc)?)
    }

    /// 校验令牌签名、有效期与类别
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.dec, &Validation::new(Algorithm::HS256))?;
        if data.claims.kind != kind {
            return Err(jsonwebtoken::errors::Error::from(
                jsonwebtoken::errors::ErrorKind::InvalidToken,
            )
            .into());
        }
        Ok(data.claims)
    }
}

/// 生成随机盐的 argon2id 密码哈希
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// 校验明文密码是否匹配存储的哈希
///
/// 哈希无法解析时视为不匹配，不向调用方暴露原因。
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
