mod cli;
mod config;
mod db;
mod fetch;
mod init;
mod plan;
mod seed;

pub async fn run(args: Vec<String>) -> anyhow::Result<()> {
    let cmd = cli::parse_args(&args)?;
    match cmd {
        cli::Command::Help(topic) => {
            cli::print_help(topic);
            Ok(())
        }
        cli::Command::Init(args) => init::run(args),
        cli::Command::Plan(args) => plan::run(args),
        cli::Command::Seed(args) => seed::run(args).await,
        cli::Command::Fetch(args) => fetch::run(args).await,
    }
}
