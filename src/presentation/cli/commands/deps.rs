use anyhow::Result;
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::application::use_cases::resolve_deps::{ResolveDepsConfig, ResolveDepsUseCase};
use crate::common::context::Context;
use crate::domain::value_objects::project_ref::ProjectRef;

/// Handler for the deps command
pub struct DepsCommand {
    pub projects: Vec<String>,
    pub runtime: bool,
    pub test: bool,
    pub toolchain: Option<PathBuf>,
    pub strict: bool,
}

impl DepsCommand {
    pub fn new(
        projects: Vec<String>,
        runtime: bool,
        test: bool,
        toolchain: Option<PathBuf>,
        strict: bool,
    ) -> Self {
        Self {
            projects,
            runtime,
            test,
            toolchain,
            strict,
        }
    }

    /// Arguments are resolved relative to `base` before reaching the resolver
    pub async fn execute(&self, ctx: &Context, base: &Path) -> Result<()> {
        let refs = self
            .projects
            .iter()
            .map(|arg| ProjectRef::from_arg(arg, base))
            .collect();
        let mut config = ResolveDepsConfig::new(refs)
            .with_runtime(self.runtime)
            .with_test(self.test)
            .with_strict(self.strict);
        if let Some(dir) = &self.toolchain {
            config = config.with_toolchain_dir(dir.clone());
        }

        let report = ResolveDepsUseCase::new(ctx, config).execute().await?;
        let result = &report.result;

        println!("{}", "Projects:".bold());
        for name in &result.projects {
            println!("  {}", name);
        }
        if !result.packages.is_empty() {
            println!("{}", "Packages:".bold());
            for name in &result.packages {
                println!("  {}", name);
            }
        }
        if !result.not_found.is_empty() {
            println!("{}", "Not found:".yellow().bold());
            for name in &result.not_found {
                println!("  {}", name.yellow());
            }
        }
        if !report.reverse_deps.is_empty() {
            println!("{}", "Required by:".bold());
            for name in &report.reverse_deps {
                println!("  {}", name);
            }
        }
        Ok(())
    }
}
