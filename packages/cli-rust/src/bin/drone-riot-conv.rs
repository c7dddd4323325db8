//! drone-riot-conv - Drone CI conversion extension
//!
//! Without arguments this runs the conversion service, which is the
//! container's default command.

use console::style;

fn main() {
    match drone_riot_conv::run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {e:#}", style("Error:").red().bold());
            std::process::exit(1);
        }
    }
}
