use msgforge::{Error, Pipeline};
use serde_json::json;

use crate::spinner;

/// Run the scan command: extract messages without touching any catalog.
pub fn run_scan_command(pipeline: &Pipeline, json_output: bool) -> Result<(), Error> {
    let progress_bar = spinner("Scanning sources...");
    let entries = match pipeline.scan() {
        Ok(entries) => entries,
        Err(e) => {
            progress_bar.finish_with_message("❌ Scan failed");
            return Err(e);
        }
    };
    progress_bar.finish_and_clear();

    if json_output {
        let messages: Vec<_> = entries
            .values()
            .map(|entry| {
                json!({
                    "context": entry.context,
                    "msgid": entry.msgid,
                    "msgid_plural": entry.msgid_plural,
                    "references": entry
                        .references
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>(),
                })
            })
            .collect();
        let body = json!({
            "domain": pipeline.config().domain,
            "count": messages.len(),
            "messages": messages,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("=== {} messages in domain `{}` ===", entries.len(), pipeline.config().domain);
    for entry in entries.values() {
        println!("\n{}", entry.key());
        if let Some(plural) = &entry.msgid_plural {
            println!("  plural: {}", plural);
        }
        for reference in &entry.references {
            println!("  #: {}", reference);
        }
    }
    Ok(())
}
