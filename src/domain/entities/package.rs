use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 依存関係のフェーズ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepPhase {
    /// ビルド時
    Build,
    /// 実行時
    Run,
    /// テスト時
    Test,
}

/// フェーズごとの依存関係の名前（宣言順、重複なし）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    #[serde(default)]
    pub build: Vec<String>,
    #[serde(default)]
    pub run: Vec<String>,
    #[serde(default)]
    pub test: Vec<String>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, phase: DepPhase) -> &Vec<String> {
        match phase {
            DepPhase::Build => &self.build,
            DepPhase::Run => &self.run,
            DepPhase::Test => &self.test,
        }
    }

    pub fn get_mut(&mut self, phase: DepPhase) -> &mut Vec<String> {
        match phase {
            DepPhase::Build => &mut self.build,
            DepPhase::Run => &mut self.run,
            DepPhase::Test => &mut self.test,
        }
    }

    /// 依存関係を追加
    pub fn with(mut self, phase: DepPhase, name: impl Into<String>) -> Self {
        self.add(phase, name);
        self
    }

    /// 依存関係を追加（重複は無視）
    pub fn add(&mut self, phase: DepPhase, name: impl Into<String>) {
        let name = name.into();
        let names = self.get_mut(phase);
        if !names.contains(&name) {
            names.push(name);
        }
    }

    /// 指定したフェーズの依存関係の和集合（宣言順を保つ）
    pub fn collect(&self, phases: &[DepPhase]) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for phase in phases {
            for name in self.get(*phase) {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }
}

/// パッケージのソース
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PackageSource {
    /// フィードからの相対、または絶対のローカルディレクトリ
    LocalDir { path: PathBuf },
    /// ダウンロードして展開するアーカイブ
    Archive { url: String },
    /// svnの作業コピー
    Svn { url: String },
    /// toolchainファイルのみを提供するパッケージ
    ToolchainFile,
}

/// ツールチェインのパッケージ
///
/// 実体化した後は変更しない。バージョンの変更は削除と追加で表す。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// パッケージ名
    pub name: String,
    /// バージョン
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// 依存関係
    #[serde(default)]
    pub dependencies: Dependencies,
    /// ソースの種類
    pub source: PackageSource,
    /// 実体化した場所
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// CMakeのtoolchainファイル
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toolchain_file: Option<String>,
    /// sysroot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sysroot: Option<String>,
}

impl Package {
    /// 新しいPackageインスタンスを作成
    pub fn new(name: impl Into<String>, source: PackageSource) -> Self {
        Self {
            name: name.into(),
            version: None,
            dependencies: Dependencies::default(),
            source,
            path: None,
            toolchain_file: None,
            sysroot: None,
        }
    }

    /// バージョンを設定
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// 依存関係を設定
    pub fn with_dependencies(mut self, dependencies: Dependencies) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// 実体化した場所を設定した新しいパッケージ
    pub fn materialized_at(&self, path: PathBuf) -> Self {
        let mut package = self.clone();
        package.path = Some(path);
        package
    }

    pub fn is_svn(&self) -> bool {
        matches!(self.source, PackageSource::Svn { .. })
    }
}

/// ビルドプロジェクト（qiproject.xml）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildProject {
    /// プロジェクト名
    pub name: String,
    /// 依存関係
    #[serde(default)]
    pub dependencies: Dependencies,
}

impl BuildProject {
    /// 新しいBuildProjectインスタンスを作成
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Dependencies::default(),
        }
    }

    /// 依存関係を追加
    pub fn depends_on(mut self, phase: DepPhase, name: impl Into<String>) -> Self {
        self.dependencies = self.dependencies.with(phase, name);
        self
    }
}
