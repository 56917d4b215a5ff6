use std::io::Read;
use std::process::ExitCode;
use tracing::{info, span, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: soup [--trace|-t] <FILE|-> <COMMAND> [SELECTOR] [ATTRIBUTE]

commands:
  parse                  print the title and body markup
  select <SELECTOR>      print the outer markup of every match
  first <SELECTOR>       print the outer markup of the first match
  text <SELECTOR>        print the text of all matches
  html <SELECTOR>        print the concatenated markup of all matches
  attrs <SELECTOR> <ATTRIBUTE>
                         print the attribute of every match, one per line
  attr <SELECTOR> <ATTRIBUTE>
                         print the attribute of the first match
  next <SELECTOR>        print the element after the first match";

struct Args {
    pub input: String,
    pub command: String,
    pub selector: Option<String>,
    pub attribute: Option<String>,
    pub trace: bool,
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };
    if args.trace {
        tracing_subscriber::fmt::fmt()
            .with_span_events(FmtSpan::ACTIVE)
            .with_max_level(Level::DEBUG)
            .with_env_filter(EnvFilter::from_default_env())
            .finish()
            .init();
        info!("Logger initialized");
    }

    let page = match read_input(&args.input) {
        Ok(page) => page,
        Err(e) => {
            eprintln!("error: could not read {}: {e}", args.input);
            return ExitCode::FAILURE;
        }
    };
    match run(&args, &page) {
        Some(lines) => {
            for line in lines {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("{USAGE}");
            ExitCode::from(2)
        }
    }
}

fn parse_args() -> Result<Args, pico_args::Error> {
    let mut pargs = pico_args::Arguments::from_env();
    let trace = pargs.contains(["--trace", "-t"]);
    let args = Args {
        input: pargs.free_from_str()?,
        command: pargs.free_from_str()?,
        selector: pargs.opt_free_from_str()?,
        attribute: pargs.opt_free_from_str()?,
        trace,
    };
    Ok(args)
}

fn read_input(path: &str) -> std::io::Result<String> {
    let span = span!(Level::DEBUG, "Loading input", path);
    let _enter = span.enter();
    if path == "-" {
        let mut page = String::new();
        std::io::stdin().read_to_string(&mut page)?;
        Ok(page)
    } else {
        std::fs::read_to_string(path)
    }
}

/// Output lines for a command, or `None` if the command or its arguments are wrong
fn run(args: &Args, page: &str) -> Option<Vec<String>> {
    let selector = args.selector.as_deref();
    let attribute = args.attribute.as_deref();
    let lines = match (args.command.as_str(), selector, attribute) {
        ("parse", None, None) => {
            let result = htmlsoup::parse(page);
            vec![result.title, result.body]
        }
        ("select", Some(selector), None) => htmlsoup::select(page, selector)
            .into_iter()
            .map(|e| e.outer_html)
            .collect(),
        ("first", Some(selector), None) => htmlsoup::select_first(page, selector)
            .into_iter()
            .map(|e| e.outer_html)
            .collect(),
        ("text", Some(selector), None) => vec![htmlsoup::get_text(page, selector)],
        ("html", Some(selector), None) => vec![htmlsoup::get_html(page, selector)],
        ("attrs", Some(selector), Some(attribute)) => {
            htmlsoup::get_attributes_by_query(page, selector, attribute)
        }
        ("attr", Some(selector), Some(attribute)) => {
            vec![htmlsoup::get_attribute_by_query(page, selector, attribute)]
        }
        ("next", Some(selector), None) => htmlsoup::next_sibling(page, selector)
            .into_iter()
            .map(|e| e.outer_html)
            .collect(),
        _ => return None,
    };
    Some(lines)
}
