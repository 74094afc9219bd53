use msgforge::{Error, Pipeline};
use serde_json::json;

/// Print translation coverage of every configured locale.
pub fn print_stats(pipeline: &Pipeline, json_output: bool) -> Result<(), Error> {
    let stats = pipeline.stats()?;

    if json_output {
        let per_locale: Vec<_> = stats
            .iter()
            .map(|s| {
                json!({
                    "locale": s.locale,
                    "total": s.total,
                    "translated": s.translated,
                    "fuzzy": s.fuzzy,
                    "completion_percent": (s.percent() * 100.0).round() / 100.0,
                })
            })
            .collect();
        let body = json!({
            "summary": {
                "domain": pipeline.config().domain,
                "locales": stats.len(),
                "default": pipeline.locales().default_tag(),
            },
            "locales": per_locale,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("=== Stats ===");
    println!("Domain: {}", pipeline.config().domain);
    println!("Locales: {}", stats.len());
    for s in &stats {
        println!("\nLocale: {}", s.locale);
        println!("  Total: {}", s.total);
        println!("  Translated: {}", s.translated);
        println!("  Fuzzy: {}", s.fuzzy);
        println!("  Completion: {:.2}%", s.percent());
    }
    Ok(())
}
