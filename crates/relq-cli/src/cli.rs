use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Root,
    Init,
    Plan,
    Seed,
    Fetch,
}

#[derive(Debug, Clone)]
pub enum Command {
    Help(HelpTopic),
    Init(InitArgs),
    Plan(PlanArgs),
    Seed(SeedArgs),
    Fetch(FetchArgs),
}

#[derive(Debug, Clone)]
pub struct InitArgs {
    pub config: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PlanArgs {
    pub config: PathBuf,
    pub entity: String,
    pub input: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SeedArgs {
    pub config: PathBuf,
    pub database: Option<String>,
    pub entity: String,
    pub input: PathBuf,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct FetchArgs {
    pub config: PathBuf,
    pub database: Option<String>,
    pub entity: String,
    pub relations: String,
    pub filters: Vec<(String, String)>,
    pub limit: Option<u64>,
    pub max_depth: Option<usize>,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1);
    let Some(first) = it.next() else {
        return Ok(Command::Help(HelpTopic::Root));
    };

    let rest = it.map(|s| s.as_str());
    match first.as_str() {
        "-h" | "--help" => Ok(Command::Help(HelpTopic::Root)),
        "init" => parse_init(rest),
        "plan" => parse_plan(rest),
        "seed" => parse_seed(rest),
        "fetch" => parse_fetch(rest),
        _ => anyhow::bail!("unknown command: {first}"),
    }
}

/// Options shared by every subcommand.
#[derive(Default)]
struct Options {
    config: Option<PathBuf>,
    database: Option<String>,
    entity: Option<String>,
    relations: Option<String>,
    filters: Vec<(String, String)>,
    limit: Option<u64>,
    max_depth: Option<usize>,
    dry_run: bool,
    positional: Vec<String>,
    help: bool,
}

impl Options {
    fn config(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from("relq.toml"))
    }

    fn entity(&self, cmd: &str) -> anyhow::Result<String> {
        self.entity
            .clone()
            .ok_or_else(|| anyhow::anyhow!("{cmd} requires --entity <NAME>"))
    }

    fn single_input(&self, cmd: &str) -> anyhow::Result<PathBuf> {
        match self.positional.as_slice() {
            [input] => Ok(PathBuf::from(input)),
            [] => anyhow::bail!("{cmd} requires an input JSON file"),
            [_, extra, ..] => anyhow::bail!("unexpected argument: {extra}"),
        }
    }
}

fn take_value<'a>(
    flag: &str,
    token: &'a str,
    it: &mut impl Iterator<Item = &'a str>,
) -> anyhow::Result<Option<String>> {
    let prefix = format!("{flag}=");
    if token == flag {
        let Some(v) = it.next() else {
            anyhow::bail!("{flag} requires a value");
        };
        return Ok(Some(v.to_string()));
    }
    Ok(token.strip_prefix(prefix.as_str()).map(str::to_string))
}

fn parse_options<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Options> {
    let mut opts = Options::default();

    while let Some(token) = it.next() {
        if token == "-h" || token == "--help" {
            opts.help = true;
            continue;
        }
        if token == "--dry-run" {
            opts.dry_run = true;
            continue;
        }
        if let Some(v) = take_value("--config", token, &mut it)? {
            opts.config = Some(PathBuf::from(v));
            continue;
        }
        if let Some(v) = take_value("--database", token, &mut it)? {
            opts.database = Some(v);
            continue;
        }
        if let Some(v) = take_value("--entity", token, &mut it)? {
            opts.entity = Some(v);
            continue;
        }
        if let Some(v) = take_value("--relations", token, &mut it)? {
            opts.relations = Some(v);
            continue;
        }
        if let Some(v) = take_value("--where", token, &mut it)? {
            let Some((column, value)) = v.split_once('=') else {
                anyhow::bail!("--where expects COLUMN=VALUE, got: {v}");
            };
            opts.filters.push((column.trim().to_string(), value.to_string()));
            continue;
        }
        if let Some(v) = take_value("--limit", token, &mut it)? {
            opts.limit = Some(
                v.parse()
                    .map_err(|_| anyhow::anyhow!("--limit expects a number, got: {v}"))?,
            );
            continue;
        }
        if let Some(v) = take_value("--max-depth", token, &mut it)? {
            opts.max_depth = Some(
                v.parse()
                    .map_err(|_| anyhow::anyhow!("--max-depth expects a number, got: {v}"))?,
            );
            continue;
        }
        if token.starts_with('-') {
            anyhow::bail!("unknown option: {token}");
        }
        opts.positional.push(token.to_string());
    }

    Ok(opts)
}

fn parse_init<'a>(it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let opts = parse_options(it)?;
    if opts.help {
        return Ok(Command::Help(HelpTopic::Init));
    }
    Ok(Command::Init(InitArgs {
        config: opts.config(),
    }))
}

fn parse_plan<'a>(it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let opts = parse_options(it)?;
    if opts.help {
        return Ok(Command::Help(HelpTopic::Plan));
    }
    Ok(Command::Plan(PlanArgs {
        config: opts.config(),
        entity: opts.entity("plan")?,
        input: opts.single_input("plan")?,
    }))
}

fn parse_seed<'a>(it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let opts = parse_options(it)?;
    if opts.help {
        return Ok(Command::Help(HelpTopic::Seed));
    }
    Ok(Command::Seed(SeedArgs {
        config: opts.config(),
        entity: opts.entity("seed")?,
        input: opts.single_input("seed")?,
        database: opts.database,
        dry_run: opts.dry_run,
    }))
}

fn parse_fetch<'a>(it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let opts = parse_options(it)?;
    if opts.help {
        return Ok(Command::Help(HelpTopic::Fetch));
    }
    if let Some(extra) = opts.positional.first() {
        anyhow::bail!("unexpected argument: {extra}");
    }
    Ok(Command::Fetch(FetchArgs {
        config: opts.config(),
        entity: opts.entity("fetch")?,
        relations: opts.relations.clone().unwrap_or_else(|| "[]".to_string()),
        database: opts.database,
        filters: opts.filters,
        limit: opts.limit,
        max_depth: opts.max_depth,
    }))
}

pub fn print_help(topic: HelpTopic) {
    match topic {
        HelpTopic::Root => {
            println!(
                "\
relq - graph seeding and eager fetch for relq

USAGE:
  relq <COMMAND> [OPTIONS]

COMMANDS:
  init          Write a relq.toml template
  plan          Show the insert plan of a JSON graph (no database)
  seed          Insert a JSON graph in one transaction
  fetch         Run a root query and eager-load relations

Run `relq <command> --help` for more."
            );
        }
        HelpTopic::Init => {
            println!(
                "\
USAGE:
  relq init [--config <FILE>]

OPTIONS:
  --config <FILE>       Config file to create (default: relq.toml)"
            );
        }
        HelpTopic::Plan => {
            println!(
                "\
USAGE:
  relq plan --entity <NAME> <INPUT.json> [OPTIONS]

OPTIONS:
  --config <FILE>       Config file path (default: relq.toml)
  --entity <NAME>       Entity type of the top-level objects
  -h, --help            Print help"
            );
        }
        HelpTopic::Seed => {
            println!(
                "\
USAGE:
  relq seed --entity <NAME> <INPUT.json> [OPTIONS]

OPTIONS:
  --config <FILE>       Config file path (default: relq.toml)
  --database <URL>      Override database.url from config
  --entity <NAME>       Entity type of the top-level objects
  --dry-run             Insert, print the report, then roll back
  -h, --help            Print help"
            );
        }
        HelpTopic::Fetch => {
            println!(
                "\
USAGE:
  relq fetch --entity <NAME> [OPTIONS]

OPTIONS:
  --config <FILE>       Config file path (default: relq.toml)
  --database <URL>      Override database.url from config
  --entity <NAME>       Entity type of the root rows
  --relations <EXPR>    Relation expression, e.g. \"[pets, children.^]\"
  --where <COL=VALUE>   Equality filter on the root query (repeatable)
  --limit <N>           Limit root rows
  --max-depth <N>       Override fetch.max_depth from config
  -h, --help            Print help"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("relq")
            .chain(list.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn parse_seed_with_options() {
        let cmd = parse_args(&args(&[
            "seed",
            "--config=conf/relq.toml",
            "--entity",
            "Person",
            "--dry-run",
            "people.json",
        ]))
        .unwrap();
        let Command::Seed(seed) = cmd else {
            panic!("expected seed");
        };

        assert_eq!(seed.config, PathBuf::from("conf/relq.toml"));
        assert_eq!(seed.entity, "Person");
        assert_eq!(seed.input, PathBuf::from("people.json"));
        assert!(seed.dry_run);
        assert!(seed.database.is_none());
    }

    #[test]
    fn parse_fetch_filters_and_limits() {
        let cmd = parse_args(&args(&[
            "fetch",
            "--entity",
            "Person",
            "--relations",
            "[pets, children.^]",
            "--where",
            "last_name=Cooper",
            "--where=age=32",
            "--limit",
            "5",
            "--max-depth",
            "3",
        ]))
        .unwrap();
        let Command::Fetch(fetch) = cmd else {
            panic!("expected fetch");
        };

        assert_eq!(fetch.config, PathBuf::from("relq.toml"));
        assert_eq!(fetch.relations, "[pets, children.^]");
        assert_eq!(
            fetch.filters,
            vec![
                ("last_name".to_string(), "Cooper".to_string()),
                ("age".to_string(), "32".to_string()),
            ]
        );
        assert_eq!(fetch.limit, Some(5));
        assert_eq!(fetch.max_depth, Some(3));
    }

    #[test]
    fn parse_help_topics() {
        assert!(matches!(
            parse_args(&args(&[])).unwrap(),
            Command::Help(HelpTopic::Root)
        ));
        assert!(matches!(
            parse_args(&args(&["plan", "--help"])).unwrap(),
            Command::Help(HelpTopic::Plan)
        ));
    }

    #[test]
    fn plan_requires_entity_and_input() {
        let err = parse_args(&args(&["plan", "people.json"])).unwrap_err();
        assert!(err.to_string().contains("--entity"));

        let err = parse_args(&args(&["plan", "--entity", "Person"])).unwrap_err();
        assert!(err.to_string().contains("input JSON"));
    }

    #[test]
    fn rejects_unknown_options() {
        let err = parse_args(&args(&["seed", "--force"])).unwrap_err();
        assert!(err.to_string().contains("unknown option"));

        let err = parse_args(&args(&["fetch", "--where", "nocolumn"])).unwrap_err();
        assert!(err.to_string().contains("COLUMN=VALUE"));
    }
}
