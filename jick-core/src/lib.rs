use colored::Colorize;

pub mod config;
pub mod crawl;
pub mod error;
pub mod output;

pub use error::CoreError;

pub fn print_banner() {
    let banner = r#"
       _ _      _
      (_|_) ___| | __
      | | |/ __| |/ /
      | | | (__|   <
     _/ |_|\___|_|\_\
    |__/"#;
    println!("{}", banner.bright_green().bold());
    println!(
        "    {} {}\n",
        "scoped crawler and form fuzzer".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
