use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use colored::Colorize;
use env_logger::{Builder, Env, Target};
use linkscout::{
    Engine, EngineConfig, LinkSetRequest, LinkTree, MentionsOptions, MentionsRequest, NodeTag,
    SearchRequest, SourceKind, SourceSpec, DEFAULT_CONFIG_FILE, STDIN_PATH,
};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

/// linkscout - Find where links are mentioned in your notes
#[derive(Parser)]
#[command(name = "linkscout")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log destination: "-" for stderr, "" to disable, otherwise a file to append to
    #[arg(long, global = true, default_value = "-")]
    log: String,

    /// Plain text source file, "-" for stdin (can be repeated)
    #[arg(long, global = true, value_name = "FILE")]
    txt: Vec<String>,

    /// Outline source file (can be repeated)
    #[arg(long, global = true, value_name = "FILE")]
    org: Vec<String>,

    /// Source file, read as an outline if it ends in .org (can be repeated)
    #[arg(short, long = "source", global = true, value_name = "FILE")]
    sources: Vec<String>,

    /// Reject link set queries
    #[arg(long, global = true)]
    disable_link_set: bool,

    /// Extra URL scheme recognized in outline links (can be repeated)
    #[arg(long = "scheme", global = true, value_name = "NAME")]
    schemes: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show where URLs are mentioned
    Mentions {
        /// URLs to look up
        #[arg(required = true)]
        urls: Vec<String>,

        /// Maximum links to show
        #[arg(short = 'n', long, default_value = "8")]
        count: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fuzzy search over all known URLs
    Search {
        /// Query words
        #[arg(required = true)]
        words: Vec<String>,

        /// Maximum results to show (1-99)
        #[arg(short = 'n', long)]
        limit: Option<i64>,

        /// Total typo budget
        #[arg(short, long)]
        tolerance: Option<i64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List distinct links starting with the given prefixes
    Set {
        /// Prefixes such as "mid" or "https://example.org/"
        #[arg(required = true)]
        prefixes: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show corpus statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Call a method with JSON parameters
    Call {
        /// Method name, e.g. urlMentions, search, linkSet
        method: String,

        /// Parameters as a JSON object
        params: Option<String>,
    },

    /// Interactive mode
    Repl,
}

fn main() {
    let matches = Cli::command().get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };
    let sources = command_line_sources(&cli, &matches);

    let result = init_logging(&cli.log, cli.quiet).and_then(|()| run(&cli, sources));

    if let Err(e) = result {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(destination: &str, quiet: bool) -> Result<(), Box<dyn std::error::Error>> {
    if destination.is_empty() {
        return Ok(());
    }
    let default_level = if quiet { "warn" } else { "info" };
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_level));
    builder.format_timestamp(None);
    if destination != "-" {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(destination)?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

/// Sources named by `--txt`, `--org` and `--source`, in the order given.
fn command_line_sources(cli: &Cli, matches: &ArgMatches) -> Vec<SourceSpec> {
    let flags = [
        ("txt", &cli.txt, Some(SourceKind::PlainText)),
        ("org", &cli.org, Some(SourceKind::Outline)),
        ("sources", &cli.sources, None),
    ];

    let mut ordered: Vec<(usize, SourceSpec)> = Vec::new();
    for (id, paths, kind) in flags {
        let indices = matches.indices_of(id).into_iter().flatten();
        for (index, path) in indices.zip(paths) {
            let spec = match kind {
                Some(kind) => SourceSpec::new(path.clone(), kind),
                None => SourceSpec::infer(path.clone()),
            };
            ordered.push((index, spec));
        }
    }
    ordered.sort_by_key(|(index, _)| *index);
    ordered.into_iter().map(|(_, spec)| spec).collect()
}

fn load_engine(cli: &Cli, sources: Vec<SourceSpec>) -> Result<Engine, Box<dyn std::error::Error>> {
    let mut config = EngineConfig::load(&cli.config)?;
    config.sources.extend(sources);
    config.add_schemes(cli.schemes.iter().cloned());
    config.disable_link_set |= cli.disable_link_set;
    Ok(Engine::new(config)?)
}

fn run(cli: &Cli, sources: Vec<SourceSpec>) -> Result<(), Box<dyn std::error::Error>> {
    let engine = load_engine(cli, sources)?;

    match &cli.command {
        Commands::Mentions { urls, count, json } => {
            cmd_mentions(&engine, urls, *count, *json, cli.quiet)
        }
        Commands::Search { words, limit, tolerance, json } => {
            cmd_search(&engine, &words.join(" "), *limit, *tolerance, *json)
        }
        Commands::Set { prefixes, json } => cmd_set(&engine, prefixes, *json),
        Commands::Stats { json } => cmd_stats(&engine, *json),
        Commands::Call { method, params } => cmd_call(&engine, method, params.as_deref()),
        Commands::Repl => cmd_repl(&engine),
    }
}

fn cmd_mentions(
    engine: &Engine,
    urls: &[String],
    count: usize,
    json: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = MentionsRequest {
        variants: urls.to_vec(),
        options: Some(MentionsOptions {
            count_limit: Some(count),
        }),
    };
    let tree = engine.url_mentions(&request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
        return Ok(());
    }

    let attrs = tree.count_attrs().unwrap_or_default();
    if attrs.count == 0 {
        println!("{}", "No mentions found.".yellow());
        return Ok(());
    }

    if !quiet {
        println!(
            "{} of {} mentions of: {}\n",
            attrs.target_count.to_string().green().bold(),
            attrs.count,
            urls.join(" ").cyan()
        );
    }
    for child in tree.children() {
        print_node(child, 0);
    }

    Ok(())
}

fn print_node(node: &LinkTree, depth: usize) {
    let indent = "  ".repeat(depth);
    match node.inner() {
        LinkTree::Leaf(links) => {
            for link in links {
                let line = format!("L{}", link.line_no);
                match &link.description {
                    Some(descr) => println!("{}{} {} {}", indent, line.dimmed(), link.url.cyan(), descr),
                    None => println!("{}{} {}", indent, line.dimmed(), link.url.cyan()),
                }
            }
        }
        LinkTree::Children(children) => {
            let label = match &children.tag {
                Some(NodeTag::File { path }) => path.green().bold().to_string(),
                Some(NodeTag::Heading(heading)) => {
                    format!("{} {}", format!("L{}", heading.line_no).dimmed(), heading.raw_text.bold())
                }
                Some(NodeTag::FileGroup) => "files".bold().to_string(),
                None => "...".dimmed().to_string(),
            };
            match node.count_attrs() {
                Some(attrs) if attrs.target_count < attrs.count => println!(
                    "{}{} {}",
                    indent,
                    label,
                    format!("({} of {})", attrs.target_count, attrs.count).dimmed()
                ),
                _ => println!("{}{}", indent, label),
            }
            for child in &children.children {
                print_node(child, depth + 1);
            }
        }
        LinkTree::Counted(..) => {}
    }
}

fn cmd_search(
    engine: &Engine,
    query: &str,
    limit: Option<i64>,
    tolerance: Option<i64>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let hits = engine.search(&SearchRequest {
        q: query.to_string(),
        limit,
        tol: tolerance,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("{}", "No results found.".yellow());
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        println!("{:>3}. {}", (rank + 1).to_string().dimmed(), hit.url.cyan());
    }

    Ok(())
}

fn cmd_set(engine: &Engine, prefixes: &[String], json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let reply = engine.link_set(&LinkSetRequest {
        prefix: prefixes.to_vec(),
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reply)?);
        return Ok(());
    }

    for url in &reply.urls {
        println!("{}", url);
    }

    Ok(())
}

fn cmd_stats(engine: &Engine, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let stats = engine.stats()?;
    let elapsed = start.elapsed();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let link_set = if engine.config().disable_link_set {
        "disabled"
    } else {
        "enabled"
    };

    println!("{}", "Corpus Statistics".green().bold());
    println!();
    println!("  Sources:           {}", engine.corpus().sources().len().to_string().cyan());
    println!("  Files with links:  {}", stats.files.to_string().cyan());
    println!("  Headings:          {}", stats.headings.to_string().cyan());
    println!("  Total links:       {}", stats.links.to_string().cyan());
    println!("  Unique URLs:       {}", stats.unique_urls.to_string().cyan());
    println!("  Link set:          {}", link_set.dimmed());
    println!("  Built in:          {}", format!("{:?}", elapsed).dimmed());

    Ok(())
}

fn cmd_call(engine: &Engine, method: &str, params: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let params: Value = match params {
        Some(text) => serde_json::from_str(text)?,
        None => Value::Null,
    };
    let reply = engine.call(method, params)?;
    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}

fn report(result: Result<(), Box<dyn std::error::Error>>) {
    if let Err(e) = result {
        eprintln!("{}: {}", "error".red().bold(), e);
    }
}

/// Commands are read from stdin, so it cannot also be a source.
fn check_repl_sources(sources: &[SourceSpec]) -> Result<(), Box<dyn std::error::Error>> {
    if sources.iter().any(|source| source.path == STDIN_PATH) {
        return Err("repl reads commands from stdin; it cannot also be a source".into());
    }
    Ok(())
}

fn cmd_repl(engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
    check_repl_sources(engine.corpus().sources())?;

    println!("{}", "linkscout interactive mode".green().bold());
    println!("Commands: mentions <url...>, search <words...>, set <prefix...>, stats, help, quit\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", ">".cyan().bold());
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        let args: Vec<String> = parts[1..].iter().map(|s| s.to_string()).collect();
        match parts[0] {
            "quit" | "exit" | "q" => break,
            "help" | "?" => {
                println!("  mentions <url...>    - Show where URLs are mentioned");
                println!("  search <words...>    - Fuzzy search over URLs");
                println!("  set <prefix...>      - List links by prefix");
                println!("  stats                - Show statistics");
                println!("  quit                 - Exit");
            }
            "mentions" | "m" => {
                if args.is_empty() {
                    println!("{}", "Usage: mentions <url...>".yellow());
                } else {
                    report(cmd_mentions(engine, &args, 8, false, false));
                }
            }
            "search" | "s" => {
                if args.is_empty() {
                    println!("{}", "Usage: search <words...>".yellow());
                } else {
                    report(cmd_search(engine, &args.join(" "), None, None, false));
                }
            }
            "set" => {
                if args.is_empty() {
                    println!("{}", "Usage: set <prefix...>".yellow());
                } else {
                    report(cmd_set(engine, &args, false));
                }
            }
            "stats" => report(cmd_stats(engine, false)),
            _ => {
                // Treat as search
                report(cmd_search(engine, &parts.join(" "), None, None, false));
            }
        }
        println!();
    }

    Ok(())
}
