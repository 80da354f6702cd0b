use clap::{Arg, ArgMatches, Command};

use tracing::{debug, error, info, warn};
use tracing_subscriber::{filter, prelude::*};

use fsmred::kiss::{self, ParseError, TableStream};

const DEFAULT_INPUT: &str = "FSM_table.txt";
const DEFAULT_OUTPUT: &str = "Reducted_FSM_table.txt";

fn cli() -> Command {
    Command::new("fsmred")
        .about("Reduces FSM transition tables by merging behaviorally equivalent states")
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .default_value(DEFAULT_INPUT)
                .help("file holding the run of transition tables"),
        )
        .arg(
            Arg::new("output")
                .value_name("OUTPUT")
                .default_value(DEFAULT_OUTPUT)
                .help("file the reduced tables are written to"),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbosity")
                .num_args(0..=1)
                .require_equals(true)
                .value_parser(["info", "debug", "trace"])
                .default_missing_value("debug"),
        )
}

fn setup_logging(matches: &ArgMatches) {
    let level = match matches
        .try_get_one::<String>("verbosity")
        .ok()
        .flatten()
        .map(|m| m.as_str())
    {
        Some("trace") => filter::LevelFilter::TRACE,
        Some("debug") => filter::LevelFilter::DEBUG,
        _ => filter::LevelFilter::INFO,
    };

    let stdout_log = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(stdout_log.with_filter(level))
        .init();
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("could not access file: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("gave up on {failed} of {declared} tables")]
    Skipped { failed: usize, declared: usize },
}

fn run(input: &str, output: &str) -> Result<(), CliError> {
    info!("reading tables from {input}");
    let src = std::fs::read_to_string(input)?;

    let mut stream = TableStream::new(&src)?;
    let declared = stream.declared();
    info!("number of tables: {declared}");

    // The header carries the declared count and tables are appended as they are
    // reduced, so tables finished before a late failure survive in the output.
    let mut out = String::new();
    kiss::write_header(&mut out, declared).unwrap();

    let mut failed = 0;
    let mut index = 0;
    while let Some(result) = stream.next() {
        index += 1;
        match result {
            Ok(mut table) => {
                info!(
                    "table {index}: .i {} .o {} .s {}",
                    table.input_bits(),
                    table.output_bits(),
                    table.state_count()
                );
                debug!("table {index} as parsed\n{}", table.show());

                let before = table.live_count();
                table.minimize();
                info!(
                    "table {index}: reduced from {before} to {} states",
                    table.live_count()
                );
                debug!("table {index} after reduction\n{}", table.show());

                out.push_str(&table.to_kiss());
                out.push('\n');
            }
            Err(e) if e.is_fatal() => {
                std::fs::write(output, &out)?;
                return Err(e.into());
            }
            Err(e) => {
                warn!("table {index}: {e}");
                failed += 1;
            }
        }
    }

    std::fs::write(output, &out)?;
    info!("wrote reduced tables to {output}");

    if failed > 0 {
        return Err(CliError::Skipped { failed, declared });
    }
    Ok(())
}

pub fn main() {
    let matches = cli().get_matches();

    setup_logging(&matches);

    let input = matches.get_one::<String>("input").unwrap();
    let output = matches.get_one::<String>("output").unwrap();

    if let Err(e) = run(input, output) {
        error!("{e}");
        std::process::exit(1);
    }
}
