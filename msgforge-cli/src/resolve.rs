use msgforge::{Error, Pipeline};

/// Run the resolve command and report the active locale.
pub fn run_resolve_command(
    pipeline: &Pipeline,
    persisted: Option<String>,
    override_hint: Option<String>,
    json_output: bool,
) -> Result<(), Error> {
    let resolution = pipeline.resolve(persisted.as_deref(), override_hint.as_deref());
    if json_output {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
    } else if resolution.should_persist {
        println!("{} (persist)", resolution.tag);
    } else {
        println!("{}", resolution.tag);
    }
    Ok(())
}

/// Run the lookup command: translate one message the way a request would.
pub fn run_lookup_command(
    pipeline: &Pipeline,
    locale: &str,
    context: Option<String>,
    count: Option<u64>,
    plural: Option<String>,
    msgid: &str,
) -> Result<(), Error> {
    if !pipeline.locales().contains(locale) {
        return Err(Error::configuration(format!(
            "locale `{}` is not one of the configured locales",
            locale
        )));
    }
    let translator = pipeline.translator(locale)?;
    let text = match (count, plural.as_deref()) {
        (Some(n), Some(plural)) => match context.as_deref() {
            Some(ctx) => translator.npgettext(ctx, msgid, plural, n),
            None => translator.ngettext(msgid, plural, n),
        },
        (count, _) => translator.lookup(context.as_deref(), msgid, count),
    };
    tracing::debug!(locale, msgid, entries = translator.catalog().len(), "looked up message");
    println!("{}", text);
    Ok(())
}

