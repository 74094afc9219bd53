use msgforge::{Error, FormatType, MergePolicy, Pipeline};

use crate::spinner;

/// Run the refresh command for one locale, or every configured locale.
pub fn run_refresh_command(
    pipeline: &Pipeline,
    locale: Option<String>,
    prune: bool,
) -> Result<(), Error> {
    let policy = if prune {
        MergePolicy::Prune
    } else {
        pipeline.config().merge_policy()
    };

    let progress_bar = spinner("Scanning sources...");
    let extracted = match pipeline.scan() {
        Ok(extracted) => extracted,
        Err(e) => {
            progress_bar.finish_with_message("❌ Scan failed");
            return Err(e);
        }
    };

    let locales: Vec<String> = match locale {
        Some(locale) => vec![locale],
        None => pipeline.locales().iter().map(str::to_string).collect(),
    };

    let mut reports = Vec::with_capacity(locales.len());
    for locale in &locales {
        progress_bar.set_message(format!("Merging {}...", locale));
        match pipeline.refresh_with(locale, &extracted, policy) {
            Ok(report) => reports.push((locale, report)),
            Err(e) => {
                progress_bar.finish_with_message(format!("❌ Refresh of {} failed", locale));
                return Err(e);
            }
        }
    }
    progress_bar.finish_and_clear();

    println!("✅ Extracted {} messages", extracted.len());
    for (locale, report) in reports {
        println!(
            "{}: {} added, {} updated, {} stale kept, {} pruned -> {}",
            locale,
            report.added,
            report.updated,
            report.retained_stale,
            report.pruned,
            pipeline.store().dir_for(locale).display()
        );
    }
    Ok(())
}

/// Run the compile command: rewrite the runtime catalogs from the `.po` file.
pub fn run_compile_command(pipeline: &Pipeline, locale: &str) -> Result<(), Error> {
    let catalog = pipeline.compile(locale)?;
    println!(
        "✅ Compiled {} of {} entries for {}",
        catalog.runtime_entries().count(),
        catalog.len(),
        locale
    );
    for format in FormatType::ALL {
        println!("  {}", pipeline.store().path_for(locale, format).display());
    }
    Ok(())
}
