use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use phodb::layout::LOG_DIR;
use phodb::views::ViewKind;
use phodb::{commands, logging};

#[derive(Parser)]
#[command(name = "phodb", version, about = "Photo archive with deduplicating import and symlink views")]
struct Cli {
    /// Do not print the logo
    #[arg(long, global = true)]
    nologo: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new archive in an existing, empty directory
    Create { root: PathBuf },

    /// Import all image files found below a directory
    Import {
        root: PathBuf,

        #[arg(short = 'i', long = "import", value_name = "IMPORT_PATH")]
        import_path: PathBuf,
    },

    /// Build symlink views of the archive under sort/
    Link {
        root: PathBuf,

        /// Views to build, comma separated (default from phodb.toml)
        #[arg(short = 'b', long = "by", value_enum, value_delimiter = ',')]
        kinds: Vec<ViewKind>,

        /// Remove each view directory before building it
        #[arg(long)]
        rebuild: bool,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Create { .. } => "create",
            Command::Import { .. } => "import",
            Command::Link { .. } => "link",
        }
    }

    fn root(&self) -> &PathBuf {
        match self {
            Command::Create { root } | Command::Import { root, .. } | Command::Link { root, .. } => root,
        }
    }
}

fn print_logo() {
    println!("phodb {}", env!("CARGO_PKG_VERSION"));
    println!("photo archive: import, deduplicate, link");
}

fn run(command: Command) -> Result<()> {
    let stamp = logging::run_stamp();

    // Before create there is no log/ yet; stderr only
    let log_dir = command.root().join(LOG_DIR);
    let _ = logging::init(log_dir.is_dir().then_some(log_dir.as_path()), &stamp, command.name());

    match command {
        Command::Create { root } => {
            commands::create(&root)?;
        }
        Command::Import { root, import_path } => {
            commands::import(&root, &import_path, &stamp)?;
        }
        Command::Link { root, kinds, rebuild } => {
            commands::link(&root, &kinds, rebuild)?;
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version come through here as well
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    if !cli.nologo {
        print_logo();
    }

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e}");
            let code = e.downcast_ref::<phodb::Error>().map_or(1, |e| e.exit_code());
            ExitCode::from(code)
        }
    }
}
