use std::io;

use super::{GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg(short, long)]
    pub json: bool,
}

pub fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = global_args.load_config()?;

    if args.json {
        serde_json::to_writer_pretty(io::stdout(), &cfg.language)?;
        println!();
        return Ok(());
    }

    for lang in &cfg.language {
        println!(
            "{:<10} {:<12} {}",
            lang.name,
            lang.pattern.as_str(),
            lang.image
        );
    }
    Ok(())
}
