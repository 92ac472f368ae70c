use std::fmt;
use std::path::{Path, PathBuf};

/// コマンドライン引数で指定されたプロジェクトの参照
///
/// 境界で一度だけ解決し、コアロジックの中では再解釈しない。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProjectRef {
    /// ワークツリー内のパス
    Path(PathBuf),
    /// プロジェクト名（マニフェストのproject属性、またはビルドプロジェクト名）
    Name(String),
}

impl ProjectRef {
    /// 引数を解決する
    ///
    /// `base`からの相対パスとして存在するディレクトリ、または区切り文字を含む引数はパス、
    /// それ以外は名前として扱う。
    pub fn from_arg(arg: &str, base: &Path) -> Self {
        let candidate = base.join(arg);
        let looks_like_path = arg.contains('/') || arg.contains(std::path::MAIN_SEPARATOR);
        if looks_like_path || (arg != "." && candidate.is_dir()) || arg == "." {
            Self::Path(candidate)
        } else {
            Self::Name(arg.to_string())
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Path(_) => None,
        }
    }
}

impl fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Name(name) => write!(f, "{}", name),
        }
    }
}
