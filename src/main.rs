use std::env;
use std::process;

fn main() {
    let config = lc3::Config::parse_from(env::args()).unwrap_or_else(|usage| {
        eprintln!("{}", usage);
        process::exit(2);
    });

    if let Err(e) = lc3::run(config) {
        eprintln!("{}", e);
        process::exit(1);
    }
}
