// tests/common/auth_helper.rs

use billing_backend::utils::jwt::{JwtManager, UserClaims};
use uuid::Uuid;

/// テスト用のユーザー情報（トークンはホストアプリ発行のものを再現）
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub access_token: String,
}

pub fn create_test_user(jwt_manager: &JwtManager) -> TestUser {
    let id = Uuid::new_v4();
    let email = format!("user_{}@example.com", id.simple());
    let access_token = jwt_manager
        .generate_access_token(UserClaims {
            user_id: id,
            email: email.clone(),
            name: Some("Test User".to_string()),
        })
        .expect("generate access token");

    TestUser {
        id,
        email,
        access_token,
    }
}
