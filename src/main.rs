use std::env;
use std::process;

use mipscc::{compile, pretty_print};

fn main() {
  let args: Vec<String> = env::args().collect();
  let (pretty, source) = match args.as_slice() {
    [_, flag, source] if flag == "--pretty" => (true, source.as_str()),
    [_, source] if source != "--pretty" => (false, source.as_str()),
    _ => {
      let program = args.first().map(String::as_str).unwrap_or("mipscc");
      eprintln!("usage: {program} [--pretty] <source>");
      process::exit(1);
    }
  };

  let result = if pretty {
    pretty_print(source)
  } else {
    compile(source)
  };

  match result {
    Ok(text) => print!("{text}"),
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  }
}
