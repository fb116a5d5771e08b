pub mod init;
pub mod langs;
pub mod list;
pub mod run;
pub mod show;

use std::path::PathBuf;

use judge_core::Config;

use crate::util;

#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct GlobalArgs {
    #[command(subcommand)]
    pub subcmd: Subcommand,

    #[arg(long)]
    pub problems_dir: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
    Init(init::Args),
    Langs(langs::Args),

    #[command(alias("ls"))]
    List(list::Args),

    #[command(alias("r"))]
    Run(run::Args),

    Show(show::Args),
}

pub type SubcmdResult = anyhow::Result<()>;

impl GlobalArgs {
    pub async fn exec_subcmd(&self) -> SubcmdResult {
        use Subcommand::*;
        match &self.subcmd {
            Init(args) => init::exec(args, self),
            Langs(args) => langs::exec(args, self),
            List(args) => list::exec(args, self),
            Run(args) => run::exec(args, self).await,
            Show(args) => show::exec(args, self),
        }
    }

    pub fn load_config(&self) -> anyhow::Result<Config> {
        let GlobalArgs {
            subcmd: _,
            problems_dir,
        } = self;

        let mut cfg = Config::load_or_default(util::current_dir())?;
        if let Some(dir) = problems_dir {
            cfg.judge.problems_dir = dir.clone();
        } else if cfg.judge.problems_dir.is_relative() {
            // A relative problems dir counts from the config file, so that
            // `judge run` works from anywhere below the judge dir.
            if let Some(base) = cfg.source_config_file.as_ref().and_then(|p| p.parent()) {
                cfg.judge.problems_dir = base.join(&cfg.judge.problems_dir);
            }
        }
        Ok(cfg)
    }
}
