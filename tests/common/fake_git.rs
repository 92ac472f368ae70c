//! スクリプト可能なフェイクgitクライアント
//!
//! 呼び出しはすべて履歴に記録される。スクリプトされていない呼び出しは
//! 空の出力で成功する。一度だけの応答は常時の応答より優先される。`clone`は本物のgitと同じく
//! 空でないクローン先を拒否し、成功するとクローン先に`.git`ディレクトリを作る。

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use wtree::infrastructure::scm::{GitClient, GitOutput};

struct Script {
    /// 引数を空白で連結した文字列の接頭辞
    prefix: String,
    /// 作業ディレクトリの絞り込み
    working_dir: Option<PathBuf>,
    responses: VecDeque<GitOutput>,
    /// 最後の応答を繰り返すか
    sticky: bool,
}

/// テスト用のGitClient
#[derive(Clone, Default)]
pub struct FakeGit {
    scripts: Arc<Mutex<Vec<Script>>>,
    call_history: Arc<Mutex<Vec<String>>>,
    dirs: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    /// `prefix`で始まる呼び出しに一度だけ`output`を返す
    pub fn respond(&self, prefix: &str, output: GitOutput) -> &Self {
        self.push(prefix, None, output, false)
    }

    /// `dir`での`prefix`で始まる呼び出しに一度だけ`output`を返す
    pub fn respond_in(&self, dir: &Path, prefix: &str, output: GitOutput) -> &Self {
        self.push(prefix, Some(dir.to_path_buf()), output, false)
    }

    /// `prefix`で始まる呼び出しに常に`output`を返す
    pub fn always(&self, prefix: &str, output: GitOutput) -> &Self {
        self.push(prefix, None, output, true)
    }

    fn push(&self, prefix: &str, working_dir: Option<PathBuf>, output: GitOutput, sticky: bool) -> &Self {
        self.scripts.lock().unwrap().push(Script {
            prefix: prefix.to_string(),
            working_dir,
            responses: VecDeque::from(vec![output]),
            sticky,
        });
        self
    }

    /// 記録された呼び出し（`git`を除いた引数）
    pub fn calls(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }

    /// `dir`で行われた呼び出し
    pub fn calls_in(&self, dir: &Path) -> Vec<String> {
        let history = self.call_history.lock().unwrap();
        let dirs = self.dirs.lock().unwrap();
        history
            .iter()
            .zip(dirs.iter())
            .filter(|(_, d)| d.as_path() == dir)
            .map(|(call, _)| call.clone())
            .collect()
    }

    /// `prefix`で始まる呼び出しがあったか
    pub fn was_called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    pub fn clear_calls(&self) {
        self.call_history.lock().unwrap().clear();
        self.dirs.lock().unwrap().clear();
    }

    /// 一度だけの応答を常時の応答より優先する
    fn next_response(&self, working_dir: &Path, command: &str) -> Option<GitOutput> {
        let mut scripts = self.scripts.lock().unwrap();
        let matches = |s: &Script| {
            command.starts_with(&s.prefix)
                && s.working_dir.as_deref().map_or(true, |d| d == working_dir)
                && !s.responses.is_empty()
        };
        if let Some(script) = scripts.iter_mut().find(|s| !s.sticky && matches(s)) {
            return script.responses.pop_front();
        }
        scripts
            .iter()
            .find(|s| s.sticky && matches(s))
            .and_then(|s| s.responses.front().cloned())
    }
}

#[async_trait]
impl GitClient for FakeGit {
    async fn call(&self, working_dir: &Path, args: &[&str]) -> GitOutput {
        let command = args.join(" ");
        self.call_history.lock().unwrap().push(command.clone());
        self.dirs.lock().unwrap().push(working_dir.to_path_buf());

        let response = self
            .next_response(working_dir, &command)
            .unwrap_or_else(|| GitOutput::ok(""));
        if args.first() == Some(&"clone") && response.is_ok() {
            if let Some(dest) = args.get(2).map(Path::new) {
                if !is_empty_dir(dest) {
                    return GitOutput::failed(format!(
                        "fatal: destination path '{}' already exists and is not an empty directory.",
                        dest.display()
                    ));
                }
                std::fs::create_dir_all(dest.join(".git")).unwrap();
            }
        }
        response
    }
}

fn is_empty_dir(path: &Path) -> bool {
    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}
