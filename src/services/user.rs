use crate::{
    error::{AppError, Result},
    models::user::{CreateUserRequest, User},
    services::Database,
    utils::validation::validate_username,
};
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use chrono::Utc;
use rand::rngs::OsRng;
use tracing::info;
use validator::Validate;

#[derive(Clone)]
pub struct UserService {
    db: Database,
}

impl UserService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// 创建用户：账号立即激活，密码以 Argon2 哈希保存
    pub fn create_user(&self, request: CreateUserRequest) -> Result<User> {
        request.validate()?;
        validate_username(&request.username)?;

        let password_hash = hash_password(&request.password)?;

        let user = self.db.transaction(|tables| {
            if tables.user_by_username(&request.username).is_some() {
                return Err(AppError::field(
                    "username",
                    "A user with that username already exists.",
                ));
            }

            let user = User {
                id: tables.next_id("user"),
                username: request.username.clone(),
                first_name: request.first_name.clone(),
                last_name: request.last_name.clone(),
                email: request.email.clone().unwrap_or_default(),
                is_staff: request.is_staff,
                is_active: true,
                password_hash,
                date_joined: Utc::now(),
            };
            tables.users.insert(user.id, user.clone());
            Ok(user)
        })?;

        info!("Created user {} ({})", user.username, user.id);
        Ok(user)
    }

    pub fn find_by_username(&self, username: &str) -> Option<User> {
        self.db.read(|t| t.user_by_username(username).cloned())
    }

    /// Creates the bootstrap staff account unless it already exists.
    pub fn ensure_staff_user(&self, username: &str, password: &str) -> Result<User> {
        if let Some(existing) = self.find_by_username(username) {
            return Ok(existing);
        }

        self.create_user(CreateUserRequest {
            first_name: String::new(),
            last_name: String::new(),
            username: username.to_string(),
            email: None,
            password: password.to_string(),
            is_staff: true,
        })
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}
