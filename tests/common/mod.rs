//! 統合テスト共通のユーティリティ
//!
//! 実際のgitを起動せずにワークツリーを操作するためのフェイクと、
//! マニフェストやワークツリーを用意するフィクスチャを提供する。

#![allow(dead_code)]

pub mod fake_git;
pub mod fixtures;
