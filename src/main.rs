use std::env;
use std::process;

use broadside::{cli, util};

fn main() {
    let args: Vec<String> = env::args().collect();
    util::init_logging(args.iter().any(|arg| arg == "--verbose"));
    process::exit(cli::run_with_args(&args));
}
