/// ドメイン層: エンティティ、値オブジェクト、純粋なサービス
pub mod entities;
pub mod services;
pub mod value_objects;
