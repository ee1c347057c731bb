//! `transitbox sources`: list the built-in feeds.

use transitbox::config::ConfigFile;
use transitbox::feed::FeedSource;

use crate::error::CliError;

pub fn run() -> Result<(), CliError> {
    let configured = ConfigFile::load().unwrap_or_default().feed.source;

    println!("Built-in Sources");
    println!("================");
    println!();

    for (index, source) in FeedSource::presets().iter().enumerate() {
        let marker = if source.id.eq_ignore_ascii_case(&configured) {
            "*"
        } else {
            " "
        };
        println!("{} [{}] {:<6} {}", marker, index, source.id, source.label);
        println!("         url:   {}", source.url);
        println!("         color: {}", source.color);
        println!(
            "         home:  {} zoom {:.1} pitch {:.0}",
            source.home.center, source.home.zoom, source.home.pitch
        );
    }

    println!();
    println!("Select with --source <index|id>, or use --url for any other feed.");
    Ok(())
}
