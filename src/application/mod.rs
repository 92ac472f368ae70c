/// アプリケーション層: サービスとユースケース
pub mod services;
pub mod use_cases;
