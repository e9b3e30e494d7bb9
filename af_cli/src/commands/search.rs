use console::style;

use af_core::{Error, FileSpec, ResolverConfig};
use af_io::Resolver;

use crate::display::format_search_entry;

pub async fn run_search(config: ResolverConfig, file: &FileSpec, json: bool) -> Result<(), Error> {
    let resolver = Resolver::new(config);
    let results = resolver.search(file).await?;

    if json {
        let output = serde_json::to_string_pretty(&results)
            .map_err(|e| Error::file_system("<stdout>", e))?;
        println!("{output}");
        return Ok(());
    }

    if results.is_empty() {
        println!("No artifacts found.");
        return Ok(());
    }

    println!(
        "{} Found {} artifact{}",
        style("==>").cyan().bold(),
        style(results.len()).green().bold(),
        if results.len() == 1 { "" } else { "s" }
    );
    for entry in &results {
        println!("    {}", format_search_entry(entry));
    }
    Ok(())
}
