//! ワークツリーとマニフェストのフィクスチャ

use std::path::Path;
use tempfile::TempDir;
use wtree::common::Context;
use wtree::infrastructure::GitCacheStore;

/// デフォルトグループ`{a, b}`とグループ`extra = {c}`を宣言するマニフェスト
pub const GROUPS_MANIFEST: &str = r#"<manifest>
  <remote name="origin" url="git@example.com:" />
  <branch default="master" />
  <repo project="a.git" remotes="origin" />
  <repo project="b.git" remotes="origin" />
  <repo project="c.git" remotes="origin" />
  <groups>
    <group name="default" default="true">
      <project name="a.git" />
      <project name="b.git" />
    </group>
    <group name="extra">
      <project name="c.git" />
    </group>
  </groups>
</manifest>
"#;

/// 一時ディレクトリ上の初期化済みワークツリー
pub struct TestWorktree {
    pub temp_dir: TempDir,
}

impl TestWorktree {
    /// 設定とマニフェストリポジトリのクローンを用意する
    pub fn new(manifest: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let worktree = Self { temp_dir };
        std::fs::create_dir_all(worktree.metadata_dir()).unwrap();
        std::fs::write(
            worktree.metadata_dir().join("config.yml"),
            "url: git@example.com:manifest.git\nbranch: master\n",
        )
        .unwrap();
        worktree.write_manifest(manifest);
        worktree
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn metadata_dir(&self) -> std::path::PathBuf {
        self.root().join(".qi")
    }

    pub fn context(&self) -> Context {
        Context::new(self.root())
    }

    /// マニフェストを書き換える（リモートへのpushの代わり）
    pub fn write_manifest(&self, manifest: &str) {
        let dir = self.metadata_dir().join("manifests").join("default");
        std::fs::create_dir_all(dir.join(".git")).unwrap();
        std::fs::write(dir.join("manifest.xml"), manifest).unwrap();
    }

    pub fn has_repo(&self, src: &str) -> bool {
        self.root().join(src).join(".git").is_dir()
    }

    /// 追跡中のプロジェクトのsrc（git.xmlの内容）
    pub fn cached_srcs(&self) -> Vec<String> {
        let path = self.metadata_dir().join("git.xml");
        if !path.exists() {
            return Vec::new();
        }
        let xml = std::fs::read_to_string(path).unwrap();
        GitCacheStore::new()
            .parse(&xml)
            .unwrap()
            .into_iter()
            .map(|p| p.src)
            .collect()
    }
}

/// ビルドプロジェクトをワークツリーに書く
pub fn write_project(root: &Path, src: &str, xml: &str) {
    let dir = root.join(src);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("qiproject.xml"), xml).unwrap();
}
